//! GLSL type table shared by reflection, uniform uploads and the headless
//! compiler.

/// Scalar family of a GLSL type.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Scalar {
    Float,
    Double,
    Int,
    UInt,
    Bool,
    /// Samplers and images: uploaded as a single `int` unit index.
    Sampler,
}

impl Scalar {
    /// Single-character shape code (`f`, `d`, `i`, `u`).
    pub fn shape(self) -> char {
        match self {
            Scalar::Float => 'f',
            Scalar::Double => 'd',
            Scalar::Int | Scalar::Bool | Scalar::Sampler => 'i',
            Scalar::UInt => 'u',
        }
    }

    pub(crate) fn size(self) -> usize {
        match self {
            Scalar::Double => 8,
            _ => 4,
        }
    }
}

/// Shape of one GLSL type as the driver reports it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct GlType {
    pub glsl: &'static str,
    pub gl_type: u32,
    pub scalar: Scalar,
    /// Matrix columns (attribute locations consumed); 1 for vectors.
    pub columns: u32,
    /// Components per column.
    pub rows: u32,
}

impl GlType {
    /// Total scalar components.
    pub fn dimension(&self) -> u32 {
        self.columns * self.rows
    }

    /// Bytes of one element in client memory.
    pub fn element_size(&self) -> usize {
        self.dimension() as usize * self.scalar.size()
    }

    pub fn is_matrix(&self) -> bool {
        self.columns > 1
    }
}

const fn t(glsl: &'static str, gl_type: u32, scalar: Scalar, columns: u32, rows: u32) -> GlType {
    GlType { glsl, gl_type, scalar, columns, rows }
}

const TYPES: &[GlType] = &[
    t("float", glow::FLOAT, Scalar::Float, 1, 1),
    t("vec2", glow::FLOAT_VEC2, Scalar::Float, 1, 2),
    t("vec3", glow::FLOAT_VEC3, Scalar::Float, 1, 3),
    t("vec4", glow::FLOAT_VEC4, Scalar::Float, 1, 4),
    t("double", glow::DOUBLE, Scalar::Double, 1, 1),
    t("dvec2", glow::DOUBLE_VEC2, Scalar::Double, 1, 2),
    t("dvec3", glow::DOUBLE_VEC3, Scalar::Double, 1, 3),
    t("dvec4", glow::DOUBLE_VEC4, Scalar::Double, 1, 4),
    t("int", glow::INT, Scalar::Int, 1, 1),
    t("ivec2", glow::INT_VEC2, Scalar::Int, 1, 2),
    t("ivec3", glow::INT_VEC3, Scalar::Int, 1, 3),
    t("ivec4", glow::INT_VEC4, Scalar::Int, 1, 4),
    t("uint", glow::UNSIGNED_INT, Scalar::UInt, 1, 1),
    t("uvec2", glow::UNSIGNED_INT_VEC2, Scalar::UInt, 1, 2),
    t("uvec3", glow::UNSIGNED_INT_VEC3, Scalar::UInt, 1, 3),
    t("uvec4", glow::UNSIGNED_INT_VEC4, Scalar::UInt, 1, 4),
    t("bool", glow::BOOL, Scalar::Bool, 1, 1),
    t("bvec2", glow::BOOL_VEC2, Scalar::Bool, 1, 2),
    t("bvec3", glow::BOOL_VEC3, Scalar::Bool, 1, 3),
    t("bvec4", glow::BOOL_VEC4, Scalar::Bool, 1, 4),
    t("mat2", glow::FLOAT_MAT2, Scalar::Float, 2, 2),
    t("mat2x3", glow::FLOAT_MAT2x3, Scalar::Float, 2, 3),
    t("mat2x4", glow::FLOAT_MAT2x4, Scalar::Float, 2, 4),
    t("mat3x2", glow::FLOAT_MAT3x2, Scalar::Float, 3, 2),
    t("mat3", glow::FLOAT_MAT3, Scalar::Float, 3, 3),
    t("mat3x4", glow::FLOAT_MAT3x4, Scalar::Float, 3, 4),
    t("mat4x2", glow::FLOAT_MAT4x2, Scalar::Float, 4, 2),
    t("mat4x3", glow::FLOAT_MAT4x3, Scalar::Float, 4, 3),
    t("mat4", glow::FLOAT_MAT4, Scalar::Float, 4, 4),
    t("dmat2", glow::DOUBLE_MAT2, Scalar::Double, 2, 2),
    t("dmat3", glow::DOUBLE_MAT3, Scalar::Double, 3, 3),
    t("dmat4", glow::DOUBLE_MAT4, Scalar::Double, 4, 4),
    t("sampler2D", glow::SAMPLER_2D, Scalar::Sampler, 1, 1),
    t("sampler3D", glow::SAMPLER_3D, Scalar::Sampler, 1, 1),
    t("samplerCube", glow::SAMPLER_CUBE, Scalar::Sampler, 1, 1),
    t("sampler2DShadow", glow::SAMPLER_2D_SHADOW, Scalar::Sampler, 1, 1),
    t("sampler2DArray", glow::SAMPLER_2D_ARRAY, Scalar::Sampler, 1, 1),
    t("sampler2DArrayShadow", glow::SAMPLER_2D_ARRAY_SHADOW, Scalar::Sampler, 1, 1),
    t("samplerCubeShadow", glow::SAMPLER_CUBE_SHADOW, Scalar::Sampler, 1, 1),
    t("sampler2DMS", glow::SAMPLER_2D_MULTISAMPLE, Scalar::Sampler, 1, 1),
    t("isampler2D", glow::INT_SAMPLER_2D, Scalar::Sampler, 1, 1),
    t("isampler3D", glow::INT_SAMPLER_3D, Scalar::Sampler, 1, 1),
    t("isampler2DArray", glow::INT_SAMPLER_2D_ARRAY, Scalar::Sampler, 1, 1),
    t("usampler2D", glow::UNSIGNED_INT_SAMPLER_2D, Scalar::Sampler, 1, 1),
    t("usampler3D", glow::UNSIGNED_INT_SAMPLER_3D, Scalar::Sampler, 1, 1),
    t("usampler2DArray", glow::UNSIGNED_INT_SAMPLER_2D_ARRAY, Scalar::Sampler, 1, 1),
    t("image2D", glow::IMAGE_2D, Scalar::Sampler, 1, 1),
    t("iimage2D", glow::INT_IMAGE_2D, Scalar::Sampler, 1, 1),
    t("uimage2D", glow::UNSIGNED_INT_IMAGE_2D, Scalar::Sampler, 1, 1),
];

/// Looks up a native type enum.
pub fn describe(gl_type: u32) -> Option<&'static GlType> {
    TYPES.iter().find(|ty| ty.gl_type == gl_type)
}

/// Looks up a GLSL type name (`"vec3"`, `"mat4"`, ...).
pub fn by_glsl_name(name: &str) -> Option<&'static GlType> {
    TYPES.iter().find(|ty| ty.glsl == name)
}
