use std::fmt;

use ferrogl_layout::FormatError;

use crate::logging::framebuffer_status_name;

/// Recoverable failures of the object layer.
///
/// Precondition violations (use after release, foreign devices, out of range
/// reads and writes) are not represented here: they panic.
#[derive(Debug, Clone, PartialEq)]
pub enum GlError {
    /// The driver refused to hand out a native object name.
    Allocation { object: &'static str, message: String },
    /// A shader stage failed to compile. `stage` is the stage title used in
    /// the diagnostic banner (`vertex_shader`, `fragment_shader`, ...).
    Compile { stage: &'static str, log: String },
    /// The program failed to link.
    Link { log: String },
    /// `glCheckFramebufferStatus` did not report completeness.
    IncompleteFramebuffer { status: u32 },
    /// A vertex layout string did not parse.
    InvalidLayout(FormatError),
    InvalidArgument(String),
    /// A dtype code that is not in the data type table.
    UnknownDtype(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, GlError>;

impl GlError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        GlError::InvalidArgument(message.into())
    }
}

/// Formats a driver log the way compiler and linker failures are reported:
/// a headline, a title underlined with `=`, then the raw log.
pub(crate) fn banner(headline: &str, title: &str, log: &str) -> String {
    format!("{headline}\n\n{title}\n{}\n{log}\n", "=".repeat(title.len()))
}

impl fmt::Display for GlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlError::Allocation { object, message } => {
                write!(f, "cannot create {object}: {message}")
            }
            GlError::Compile { stage, log } => f.write_str(&banner("GLSL Compiler failed", stage, log)),
            GlError::Link { log } => f.write_str(&banner("GLSL Linker failed", "Program", log)),
            GlError::IncompleteFramebuffer { status } => {
                write!(f, "the framebuffer is not complete ({})", framebuffer_status_name(*status))
            }
            GlError::InvalidLayout(err) => fmt::Display::fmt(err, f),
            GlError::InvalidArgument(message) => f.write_str(message),
            GlError::UnknownDtype(code) => write!(f, "invalid dtype {code:?}"),
        }
    }
}

impl std::error::Error for GlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GlError::InvalidLayout(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FormatError> for GlError {
    fn from(err: FormatError) -> Self {
        GlError::InvalidLayout(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_banner_is_underlined_to_the_title() {
        let err = GlError::Compile { stage: "vertex_shader", log: "0:1: error".into() };
        assert_eq!(
            err.to_string(),
            "GLSL Compiler failed\n\nvertex_shader\n=============\n0:1: error\n"
        );
    }

    #[test]
    fn link_banner_uses_program_title() {
        let err = GlError::Link { log: "undefined varying".into() };
        assert_eq!(err.to_string(), "GLSL Linker failed\n\nProgram\n=======\nundefined varying\n");
    }

    #[test]
    fn incomplete_status_is_named() {
        let err = GlError::IncompleteFramebuffer { status: glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT };
        assert!(err.to_string().contains("GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT"));
    }
}
