//! Renderbuffers: write-only framebuffer storage.

use std::fmt;
use std::rc::Rc;

use crate::device::{Device, DeviceInner};
use crate::dtype::{self, DataType};
use crate::error::{GlError, Result};
use crate::resource::{allocate, GlHandle, ObjectKind};
use crate::texture::check_samples;

struct RenderbufferShared {
    handle: GlHandle,
    size: (u32, u32),
    components: u32,
    samples: u32,
    dtype: &'static DataType,
    depth: bool,
}

/// Color or depth storage that can only be attached to framebuffers.
#[derive(Clone)]
pub struct Renderbuffer {
    shared: Rc<RenderbufferShared>,
}

impl PartialEq for Renderbuffer {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for Renderbuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderbuffer")
            .field("glo", &self.glo())
            .field("size", &self.shared.size)
            .field("samples", &self.shared.samples)
            .field("depth", &self.shared.depth)
            .finish()
    }
}

impl Device {
    /// Color storage with `components` channels of `dtype`.
    pub fn renderbuffer(&self, size: (u32, u32), components: u32, samples: u32, dtype: &str) -> Result<Renderbuffer> {
        if !(1..=4).contains(&components) {
            return Err(GlError::invalid(format!("components must be 1, 2, 3 or 4 (got {components})")));
        }
        let dt = dtype::lookup(dtype)?;
        Renderbuffer::create(self.inner(), size, components, samples, dt, dt.internal_format[components as usize], false)
    }

    pub fn depth_renderbuffer(&self, size: (u32, u32), samples: u32) -> Result<Renderbuffer> {
        let dt = dtype::lookup("f4")?;
        Renderbuffer::create(self.inner(), size, 1, samples, dt, glow::DEPTH_COMPONENT24, true)
    }
}

impl Renderbuffer {
    fn create(
        device: &Rc<DeviceInner>,
        size: (u32, u32),
        components: u32,
        samples: u32,
        dtype: &'static DataType,
        internal: u32,
        depth: bool,
    ) -> Result<Renderbuffer> {
        if size.0 == 0 || size.1 == 0 {
            return Err(GlError::invalid(format!("invalid renderbuffer size {size:?}")));
        }
        check_samples(device, samples, dtype.float_type)?;
        let handle = allocate(device, ObjectKind::Renderbuffer)?;
        let gl = device.gl();
        gl.bind_renderbuffer(handle.glo());
        gl.renderbuffer_storage(samples as i32, internal, size.0 as i32, size.1 as i32);
        device.check("creating a renderbuffer");
        Ok(Renderbuffer {
            shared: Rc::new(RenderbufferShared { handle, size, components, samples, dtype, depth }),
        })
    }

    pub fn glo(&self) -> u32 {
        self.shared.handle.glo()
    }

    pub fn size(&self) -> (u32, u32) {
        self.shared.size
    }

    pub fn components(&self) -> u32 {
        self.shared.components
    }

    pub fn samples(&self) -> u32 {
        self.shared.samples
    }

    pub fn dtype(&self) -> &'static DataType {
        self.shared.dtype
    }

    pub fn is_depth(&self) -> bool {
        self.shared.depth
    }

    pub(crate) fn belongs_to(&self, device: &Rc<DeviceInner>) -> bool {
        self.shared.handle.belongs_to(device)
    }

    pub fn release(&self) {
        self.shared.handle.release();
    }

    pub fn released(&self) -> bool {
        self.shared.handle.released()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{HeadlessBackend, HeadlessConfig};

    fn device() -> (Device, HeadlessBackend) {
        Device::headless(HeadlessConfig::default()).unwrap()
    }

    #[test]
    fn storage_follows_the_dtype() {
        let (device, backend) = device();
        let rb = device.renderbuffer((8, 4), 2, 0, "f2").unwrap();
        assert_eq!(rb.size(), (8, 4));
        let expected = format!("renderbuffer_storage(0, {:#x}, 8, 4)", glow::RG16F);
        assert_eq!(backend.count_calls(&expected), 1);
    }

    #[test]
    fn integer_storage_uses_the_integer_sample_limit() {
        let backend = HeadlessBackend::new(HeadlessConfig { max_samples: 4, ..Default::default() });
        let loaders: Vec<Box<dyn crate::gl::Loader>> = vec![Box::new(backend)];
        let device = Device::create(crate::DeviceInit::default(), loaders).unwrap();
        assert!(device.renderbuffer((2, 2), 4, 8, "f1").is_err());
        assert!(device.renderbuffer((2, 2), 4, 4, "i4").is_ok());
    }

    #[test]
    fn depth_storage() {
        let (device, _) = device();
        let rb = device.depth_renderbuffer((4, 4), 0).unwrap();
        assert!(rb.is_depth());
        assert_eq!(rb.components(), 1);
    }

    #[test]
    fn release_is_idempotent() {
        let (device, backend) = device();
        let rb = device.renderbuffer((1, 1), 4, 0, "f1").unwrap();
        rb.release();
        rb.release();
        assert!(rb.released());
        assert_eq!(backend.count_calls("delete_renderbuffer"), 1);
    }
}
