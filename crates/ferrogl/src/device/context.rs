use std::cell::{Cell, RefCell};
use std::rc::Weak;

use super::{DeviceInfo, EnableFlags, Limits};
use crate::framebuffer::{Framebuffer, FramebufferShared};
use crate::gl::Gl;
use crate::logging::drain_errors;

/// Client-side mirror of global render state.
#[derive(Debug)]
pub(crate) struct DeviceState {
    pub enable_flags: EnableFlags,
    /// Last framebuffer made current; the screen when it is gone.
    pub framebuffer: Weak<FramebufferShared>,
    /// `(src_rgb, dst_rgb, src_alpha, dst_alpha)`
    pub blend_func: [u32; 4],
    pub blend_equation: [u32; 2],
    pub depth_func: String,
    pub cull_face: u32,
    pub front_face: u32,
    pub wireframe: bool,
    pub polygon_offset: (f32, f32),
    pub line_width: f32,
    pub provoking_vertex: u32,
    pub patch_vertices: u32,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            enable_flags: EnableFlags::empty(),
            framebuffer: Weak::new(),
            blend_func: [glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA, glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA],
            blend_equation: [glow::FUNC_ADD, glow::FUNC_ADD],
            depth_func: "<".to_string(),
            cull_face: glow::BACK,
            front_face: glow::CCW,
            wireframe: false,
            polygon_offset: (0.0, 0.0),
            line_width: 1.0,
            provoking_vertex: glow::LAST_VERTEX_CONVENTION,
            patch_vertices: 3,
        }
    }
}

/// Shared core of a [`Device`](super::Device). Resources point here weakly.
pub(crate) struct DeviceInner {
    pub(crate) gl: Box<dyn Gl>,
    pub(crate) backend: String,
    pub(crate) version_code: u32,
    pub(crate) limits: Limits,
    pub(crate) info: DeviceInfo,
    pub(crate) extensions: Vec<String>,
    pub(crate) default_texture_unit: u32,
    pub(crate) check_errors: bool,
    pub(crate) released: Cell<bool>,
    pub(crate) state: RefCell<DeviceState>,
    pub(crate) screen: Framebuffer,
}

impl std::fmt::Debug for DeviceInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceInner")
            .field("backend", &self.backend)
            .field("version_code", &self.version_code)
            .field("released", &self.released.get())
            .finish_non_exhaustive()
    }
}

impl DeviceInner {
    /// The native function table of a live device.
    pub(crate) fn gl(&self) -> &dyn Gl {
        assert!(!self.released.get(), "device used after release");
        self.gl.as_ref()
    }

    /// Logs pending native errors after `what` when error checking is on.
    pub(crate) fn check(&self, what: &str) {
        if self.check_errors {
            drain_errors(self.gl(), what);
        }
    }

    pub(crate) fn bound_framebuffer(&self) -> Framebuffer {
        let weak = self.state.borrow().framebuffer.clone();
        Framebuffer::upgrade(&weak).unwrap_or_else(|| self.screen.clone())
    }

    pub(crate) fn set_bound_framebuffer(&self, framebuffer: &Framebuffer) {
        self.state.borrow_mut().framebuffer = framebuffer.downgrade();
    }

    /// Restores the native binding after a temporary framebuffer bind.
    pub(crate) fn rebind_framebuffer(&self) {
        let glo = self.bound_framebuffer().glo();
        self.gl().bind_framebuffer(glow::FRAMEBUFFER, glo);
    }

    /// Binds `glo` on the reserved texture unit.
    pub(crate) fn bind_scratch_texture(&self, target: u32, glo: u32) {
        let gl = self.gl();
        gl.active_texture(self.default_texture_unit);
        gl.bind_texture(target, glo);
    }

    pub(crate) fn enable_flags(&self) -> EnableFlags {
        self.state.borrow().enable_flags
    }

    /// Applies exactly `flags`, disabling every other grouped capability.
    pub(crate) fn enable_only(&self, flags: EnableFlags) {
        let gl = self.gl();
        for (flag, cap) in EnableFlags::CAPS {
            if flags.contains(flag) {
                gl.enable(cap);
            } else {
                gl.disable(cap);
            }
        }
        self.state.borrow_mut().enable_flags = flags;
    }
}
