use crate::gl::{self, Gl};

/// Capability limits read once at device creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Limits {
    pub max_samples: u32,
    pub max_integer_samples: u32,
    pub max_color_attachments: u32,
    /// Combined texture image units across all stages.
    pub max_texture_units: u32,
    /// 1.0 when anisotropic filtering is unavailable.
    pub max_anisotropy: f32,
    pub max_uniform_block_size: u32,
    pub max_texture_size: u32,
}

const ANISOTROPY_EXTENSIONS: [&str; 2] =
    ["GL_EXT_texture_filter_anisotropic", "GL_ARB_texture_filter_anisotropic"];

impl Limits {
    pub(crate) fn query(gl: &dyn Gl, version_code: u32, extensions: &[String]) -> Self {
        let int = |pname| gl.get_parameter_i32(pname).max(0) as u32;
        let anisotropic = version_code >= 460
            || extensions.iter().any(|e| ANISOTROPY_EXTENSIONS.contains(&e.as_str()));
        let max_anisotropy = if anisotropic {
            gl.get_parameter_f32(gl::MAX_TEXTURE_MAX_ANISOTROPY).max(1.0)
        } else {
            1.0
        };
        Self {
            max_samples: int(glow::MAX_SAMPLES),
            max_integer_samples: int(glow::MAX_INTEGER_SAMPLES),
            max_color_attachments: int(glow::MAX_COLOR_ATTACHMENTS),
            max_texture_units: int(glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS),
            max_anisotropy,
            max_uniform_block_size: int(glow::MAX_UNIFORM_BLOCK_SIZE),
            max_texture_size: int(glow::MAX_TEXTURE_SIZE),
        }
    }
}

/// Driver identification strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub vendor: String,
    pub renderer: String,
    pub version: String,
    pub shading_language_version: String,
}

impl DeviceInfo {
    pub(crate) fn query(gl: &dyn Gl) -> Self {
        Self {
            vendor: gl.get_parameter_string(glow::VENDOR),
            renderer: gl.get_parameter_string(glow::RENDERER),
            version: gl.get_parameter_string(glow::VERSION),
            shading_language_version: gl.get_parameter_string(glow::SHADING_LANGUAGE_VERSION),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{HeadlessBackend, HeadlessConfig};

    #[test]
    fn anisotropy_needs_the_extension() {
        let backend = HeadlessBackend::new(HeadlessConfig { extensions: Vec::new(), ..Default::default() });
        assert_eq!(Limits::query(&backend, 330, &[]).max_anisotropy, 1.0);
        let with = vec!["GL_EXT_texture_filter_anisotropic".to_string()];
        assert_eq!(Limits::query(&backend, 330, &with).max_anisotropy, 16.0);
    }

    #[test]
    fn core_460_has_anisotropy_without_extensions() {
        let backend = HeadlessBackend::default();
        assert_eq!(Limits::query(&backend, 460, &[]).max_anisotropy, 16.0);
    }

    #[test]
    fn reads_headless_limits() {
        let backend = HeadlessBackend::default();
        let limits = Limits::query(&backend, 330, &[]);
        assert_eq!(limits.max_samples, 8);
        assert_eq!(limits.max_texture_units, 32);
        assert_eq!(limits.max_color_attachments, 8);
    }
}
