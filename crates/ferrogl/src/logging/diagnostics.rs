use crate::gl::Gl;

/// Readable name of a native error code (`GL_INVALID_ENUM`, ...).
pub fn error_name(code: u32) -> &'static str {
    match code {
        glow::NO_ERROR => "GL_NO_ERROR",
        glow::INVALID_ENUM => "GL_INVALID_ENUM",
        glow::INVALID_VALUE => "GL_INVALID_VALUE",
        glow::INVALID_OPERATION => "GL_INVALID_OPERATION",
        glow::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
        glow::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
        glow::STACK_UNDERFLOW => "GL_STACK_UNDERFLOW",
        glow::STACK_OVERFLOW => "GL_STACK_OVERFLOW",
        _ => "GL_UNKNOWN_ERROR",
    }
}

/// Readable name of a `glCheckFramebufferStatus` result.
pub fn framebuffer_status_name(status: u32) -> &'static str {
    match status {
        glow::FRAMEBUFFER_COMPLETE => "GL_FRAMEBUFFER_COMPLETE",
        glow::FRAMEBUFFER_UNDEFINED => "GL_FRAMEBUFFER_UNDEFINED",
        glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => "GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT",
        glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => {
            "GL_FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT"
        }
        glow::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => "GL_FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER",
        glow::FRAMEBUFFER_INCOMPLETE_READ_BUFFER => "GL_FRAMEBUFFER_INCOMPLETE_READ_BUFFER",
        glow::FRAMEBUFFER_UNSUPPORTED => "GL_FRAMEBUFFER_UNSUPPORTED",
        glow::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => "GL_FRAMEBUFFER_INCOMPLETE_MULTISAMPLE",
        glow::FRAMEBUFFER_INCOMPLETE_LAYER_TARGETS => "GL_FRAMEBUFFER_INCOMPLETE_LAYER_TARGETS",
        _ => "GL_FRAMEBUFFER_UNKNOWN_ERROR",
    }
}

/// Empties the native error queue, logging each entry at `warn`.
///
/// Returns the codes in the order the driver reported them. The loop is
/// bounded because a lost context keeps reporting errors forever.
pub(crate) fn drain_errors(gl: &dyn Gl, context: &str) -> Vec<u32> {
    let mut codes = Vec::new();
    while codes.len() < 32 {
        let code = gl.get_error();
        if code == glow::NO_ERROR {
            break;
        }
        log::warn!("{context}: {}", error_name(code));
        codes.push(code);
    }
    codes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::HeadlessBackend;

    #[test]
    fn names_known_codes() {
        assert_eq!(error_name(glow::INVALID_VALUE), "GL_INVALID_VALUE");
        assert_eq!(error_name(0xdead), "GL_UNKNOWN_ERROR");
    }

    #[test]
    fn drain_returns_queued_errors_in_order() {
        let backend = HeadlessBackend::default();
        backend.push_error(glow::INVALID_ENUM);
        backend.push_error(glow::OUT_OF_MEMORY);
        let codes = drain_errors(&backend, "test");
        assert_eq!(codes, vec![glow::INVALID_ENUM, glow::OUT_OF_MEMORY]);
        assert!(drain_errors(&backend, "test").is_empty());
    }
}
