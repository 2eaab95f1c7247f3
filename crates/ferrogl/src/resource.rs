//! Native handle ownership.
//!
//! Every wrapper owns exactly one [`GlHandle`] per native object. The handle
//! remembers which device created it (weakly, so a resource never keeps a
//! device alive), frees the native object exactly once, and turns any use
//! after release into a panic.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use crate::device::DeviceInner;
use crate::error::{GlError, Result};
use crate::gl::Gl;

/// Native object family, used for deletion and in messages.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum ObjectKind {
    Buffer,
    Texture,
    Renderbuffer,
    Sampler,
    Query,
    Framebuffer,
    Shader,
    Program,
    VertexArray,
}

impl ObjectKind {
    pub(crate) fn name(self) -> &'static str {
        match self {
            ObjectKind::Buffer => "buffer",
            ObjectKind::Texture => "texture",
            ObjectKind::Renderbuffer => "renderbuffer",
            ObjectKind::Sampler => "sampler",
            ObjectKind::Query => "query",
            ObjectKind::Framebuffer => "framebuffer",
            ObjectKind::Shader => "shader",
            ObjectKind::Program => "program",
            ObjectKind::VertexArray => "vertex array",
        }
    }

    fn delete(self, gl: &dyn Gl, glo: u32) {
        match self {
            ObjectKind::Buffer => gl.delete_buffer(glo),
            ObjectKind::Texture => gl.delete_texture(glo),
            ObjectKind::Renderbuffer => gl.delete_renderbuffer(glo),
            ObjectKind::Sampler => gl.delete_sampler(glo),
            ObjectKind::Query => gl.delete_query(glo),
            ObjectKind::Framebuffer => gl.delete_framebuffer(glo),
            ObjectKind::Shader => gl.delete_shader(glo),
            ObjectKind::Program => gl.delete_program(glo),
            ObjectKind::VertexArray => gl.delete_vertex_array(glo),
        }
    }
}

/// Single owner of one native object name.
#[derive(Debug)]
pub(crate) struct GlHandle {
    device: Weak<DeviceInner>,
    glo: u32,
    kind: ObjectKind,
    released: Cell<bool>,
    /// `false` for objects the driver owns (the default framebuffer).
    owned: bool,
}

impl GlHandle {
    pub(crate) fn new(device: Weak<DeviceInner>, kind: ObjectKind, glo: u32) -> Self {
        Self { device, glo, kind, released: Cell::new(false), owned: true }
    }

    /// Wraps a name the driver owns; releasing it never deletes anything.
    pub(crate) fn borrowed(device: Weak<DeviceInner>, kind: ObjectKind, glo: u32) -> Self {
        Self { device, glo, kind, released: Cell::new(false), owned: false }
    }

    pub(crate) fn glo(&self) -> u32 {
        self.glo
    }

    pub(crate) fn released(&self) -> bool {
        self.released.get()
    }

    /// The owning device, asserting that neither side was released.
    pub(crate) fn device(&self) -> Rc<DeviceInner> {
        let name = self.kind.name();
        assert!(!self.released.get(), "{name} {} used after release", self.glo);
        let device = self
            .device
            .upgrade()
            .unwrap_or_else(|| panic!("{name} {} outlived its device", self.glo));
        assert!(!device.released.get(), "{name} {} used after its device was released", self.glo);
        device
    }

    pub(crate) fn belongs_to(&self, device: &Rc<DeviceInner>) -> bool {
        Weak::ptr_eq(&self.device, &Rc::downgrade(device))
    }

    /// Frees the native object. Returns `false` when it was already released.
    pub(crate) fn release(&self) -> bool {
        if self.released.replace(true) {
            return false;
        }
        if !self.owned {
            return true;
        }
        match self.device.upgrade() {
            Some(device) if !device.released.get() => {
                log::trace!("releasing {} {}", self.kind.name(), self.glo);
                self.kind.delete(device.gl.as_ref(), self.glo);
            }
            _ => log::trace!("{} {} dropped after its device", self.kind.name(), self.glo),
        }
        true
    }
}

impl Drop for GlHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// `true` when `len` units starting at `start` end within `limit`.
pub(crate) fn fits(start: usize, len: usize, limit: usize) -> bool {
    start.checked_add(len).is_some_and(|end| end <= limit)
}

/// Creates a native object with `create`, mapping driver refusal to
/// [`GlError::Allocation`].
pub(crate) fn allocate_with(
    device: &Rc<DeviceInner>,
    kind: ObjectKind,
    create: impl FnOnce(&dyn Gl) -> std::result::Result<u32, String>,
) -> Result<GlHandle> {
    match create(device.gl()) {
        Ok(glo) => {
            log::trace!("created {} {glo}", kind.name());
            Ok(GlHandle::new(Rc::downgrade(device), kind, glo))
        }
        Err(message) => {
            log::error!("cannot create {}: {message}", kind.name());
            Err(GlError::Allocation { object: kind.name(), message })
        }
    }
}

pub(crate) fn allocate(device: &Rc<DeviceInner>, kind: ObjectKind) -> Result<GlHandle> {
    allocate_with(device, kind, |gl| match kind {
        ObjectKind::Buffer => gl.create_buffer(),
        ObjectKind::Texture => gl.create_texture(),
        ObjectKind::Renderbuffer => gl.create_renderbuffer(),
        ObjectKind::Sampler => gl.create_sampler(),
        ObjectKind::Query => gl.create_query(),
        ObjectKind::Framebuffer => gl.create_framebuffer(),
        ObjectKind::Program => gl.create_program(),
        ObjectKind::VertexArray => gl.create_vertex_array(),
        ObjectKind::Shader => Err("shaders need a stage".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{HeadlessBackend, HeadlessConfig};
    use crate::Device;

    fn device() -> (Device, HeadlessBackend) {
        Device::headless(HeadlessConfig::default()).unwrap()
    }

    #[test]
    fn release_deletes_once() {
        let (device, backend) = device();
        let handle = allocate(device.inner(), ObjectKind::Buffer).unwrap();
        assert!(handle.release());
        assert!(!handle.release());
        drop(handle);
        assert_eq!(backend.count_calls("delete_buffer"), 1);
    }

    #[test]
    fn borrowed_handles_are_never_deleted() {
        let (device, backend) = device();
        let handle = GlHandle::borrowed(Rc::downgrade(device.inner()), ObjectKind::Framebuffer, 0);
        drop(handle);
        assert_eq!(backend.count_calls("delete_framebuffer"), 0);
    }

    #[test]
    fn allocation_failure_is_an_error() {
        let (device, backend) = device();
        backend.fail_next("texture");
        let err = allocate(device.inner(), ObjectKind::Texture).unwrap_err();
        assert!(matches!(err, GlError::Allocation { object: "texture", .. }));
    }

    #[test]
    #[should_panic(expected = "used after release")]
    fn released_handles_refuse_use() {
        let (device, _backend) = device();
        let handle = allocate(device.inner(), ObjectKind::Sampler).unwrap();
        handle.release();
        handle.device();
    }

    #[test]
    fn released_device_skips_native_deletes() {
        let (device, backend) = device();
        let handle = allocate(device.inner(), ObjectKind::Query).unwrap();
        device.release();
        handle.release();
        assert_eq!(backend.count_calls("delete_query"), 0);
    }
}
