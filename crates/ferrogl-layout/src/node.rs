// ── Kind ──────────────────────────────────────────────────────────────────

/// Attribute family named by a layout token (`f`, `i`, `u`).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Kind {
    Float,
    Int,
    UInt,
}

// ── ScalarType ────────────────────────────────────────────────────────────

/// Storage type of one component inside the vertex buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ScalarType {
    Byte,
    UnsignedByte,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    HalfFloat,
    Float,
    Double,
}

impl ScalarType {
    /// Native GL enum for this scalar type (`GL_FLOAT`, `GL_UNSIGNED_BYTE`, ...).
    pub const fn gl_type(self) -> u32 {
        match self {
            ScalarType::Byte => 0x1400,
            ScalarType::UnsignedByte => 0x1401,
            ScalarType::Short => 0x1402,
            ScalarType::UnsignedShort => 0x1403,
            ScalarType::Int => 0x1404,
            ScalarType::UnsignedInt => 0x1405,
            ScalarType::Float => 0x1406,
            ScalarType::Double => 0x140A,
            ScalarType::HalfFloat => 0x140B,
        }
    }

    /// Size of one component in bytes.
    pub const fn width(self) -> u32 {
        match self {
            ScalarType::Byte | ScalarType::UnsignedByte => 1,
            ScalarType::Short | ScalarType::UnsignedShort | ScalarType::HalfFloat => 2,
            ScalarType::Int | ScalarType::UnsignedInt | ScalarType::Float => 4,
            ScalarType::Double => 8,
        }
    }
}

// ── FormatNode ────────────────────────────────────────────────────────────

/// One bindable attribute slot parsed from a layout token such as `3f4`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FormatNode {
    pub kind: Kind,
    /// Number of components (`3` in `3f4`).
    pub count: u32,
    /// Total bytes this node occupies in one vertex record.
    pub size: u32,
    pub scalar: ScalarType,
    /// Only `f1` is normalized: unsigned bytes read as floats in `0.0..=1.0`.
    pub normalize: bool,
}

impl FormatNode {
    pub(crate) fn new(kind: Kind, count: u32, width: u32) -> Self {
        let scalar = match (kind, width) {
            (Kind::Float, 1) => ScalarType::UnsignedByte,
            (Kind::Float, 2) => ScalarType::HalfFloat,
            (Kind::Float, 8) => ScalarType::Double,
            (Kind::Float, _) => ScalarType::Float,
            (Kind::Int, 1) => ScalarType::Byte,
            (Kind::Int, 2) => ScalarType::Short,
            (Kind::Int, _) => ScalarType::Int,
            (Kind::UInt, 1) => ScalarType::UnsignedByte,
            (Kind::UInt, 2) => ScalarType::UnsignedShort,
            (Kind::UInt, _) => ScalarType::UnsignedInt,
        };
        Self {
            kind,
            count,
            size: count * width,
            scalar,
            normalize: kind == Kind::Float && width == 1,
        }
    }
}

// ── FormatToken ───────────────────────────────────────────────────────────

/// A parsed layout token: either an attribute or padding bytes (`x` tokens).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FormatToken {
    Attribute(FormatNode),
    /// Bytes skipped in the vertex record; no attribute is bound.
    Padding(u32),
}

impl FormatToken {
    /// Bytes this token occupies in one vertex record.
    pub fn size(&self) -> u32 {
        match self {
            FormatToken::Attribute(node) => node.size,
            FormatToken::Padding(bytes) => *bytes,
        }
    }

    pub fn node(&self) -> Option<&FormatNode> {
        match self {
            FormatToken::Attribute(node) => Some(node),
            FormatToken::Padding(_) => None,
        }
    }
}

// ── Divisor ───────────────────────────────────────────────────────────────

/// Advance rate for every attribute of a layout string (`/v`, `/i`, `/r`).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum Divisor {
    /// Advance once per vertex (no suffix or `/v`).
    #[default]
    PerVertex,
    /// Advance once per instance (`/i`).
    PerInstance,
    /// Read the same record for the whole draw call (`/r`).
    PerRender,
}

impl Divisor {
    /// Native attribute divisor value.
    pub const fn value(self) -> u32 {
        match self {
            Divisor::PerVertex => 0,
            Divisor::PerInstance => 1,
            Divisor::PerRender => 0x7fff_ffff,
        }
    }
}
