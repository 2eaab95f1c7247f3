//! Framebuffers: render targets and their per-target state.
//!
//! Besides the native object a framebuffer owns the state that goes with
//! rendering into it: the viewport, an optional scissor box, a color write mask
//! per draw buffer and the depth write mask. [`Framebuffer::use_`] applies all
//! of it and records the framebuffer as the device's current one.

mod attachment;

pub use attachment::{Attachment, AttachmentKind};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::device::{Device, DeviceInner};
use crate::dtype::{self, check_alignment, row_size};
use crate::error::{GlError, Result};
use crate::gl::Gl;
use crate::logging::framebuffer_status_name;
use crate::resource::{allocate, fits, GlHandle, ObjectKind};

/// Which attachment [`Framebuffer::read`] reads.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ReadBuffer {
    /// Color attachment by index.
    Color(u32),
    Depth,
}

/// Parameters of a pixel read.
#[derive(Debug, Clone, Copy)]
pub struct ReadDesc<'a> {
    /// `(x, y, width, height)`; the whole framebuffer by default.
    pub viewport: Option<[i32; 4]>,
    /// Ignored for depth reads, which always return one float per pixel.
    pub components: u32,
    pub attachment: ReadBuffer,
    pub alignment: usize,
    pub dtype: &'a str,
}

impl Default for ReadDesc<'_> {
    fn default() -> Self {
        Self { viewport: None, components: 3, attachment: ReadBuffer::Color(0), alignment: 1, dtype: "f1" }
    }
}

pub(crate) struct FramebufferShared {
    handle: GlHandle,
    color: Vec<Attachment>,
    depth: Option<Attachment>,
    /// The default framebuffer: never deleted, implicit color and depth.
    screen: bool,
    size: (u32, u32),
    samples: u32,
    draw_buffers: Vec<u32>,
    viewport: Cell<[i32; 4]>,
    scissor: Cell<Option<[i32; 4]>>,
    color_mask: RefCell<Vec<[bool; 4]>>,
    depth_mask: Cell<bool>,
}

/// A render target.
#[derive(Clone)]
pub struct Framebuffer {
    shared: Rc<FramebufferShared>,
}

impl PartialEq for Framebuffer {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Framebuffer")
            .field("glo", &self.glo())
            .field("size", &self.shared.size)
            .field("color", &self.shared.color.len())
            .field("depth", &self.has_depth())
            .finish()
    }
}

impl Device {
    /// Creates a framebuffer over `color_attachments` and an optional depth
    /// attachment.
    ///
    /// Attachments must share one size and sample count. An incomplete
    /// framebuffer is freed and reported as
    /// [`GlError::IncompleteFramebuffer`].
    pub fn framebuffer_from(&self, color_attachments: &[Attachment], depth: Option<Attachment>) -> Result<Framebuffer> {
        let device = self.inner();
        for attachment in color_attachments.iter().chain(depth.as_ref()) {
            assert!(attachment.belongs_to(device), "framebuffer attachment belongs to another device");
        }
        let Some(first) = color_attachments.first().or(depth.as_ref()) else {
            return Err(GlError::invalid("a framebuffer needs at least one attachment"));
        };
        let max = device.limits.max_color_attachments as usize;
        if color_attachments.len() > max {
            return Err(GlError::invalid(format!(
                "too many color attachments ({} > {max})",
                color_attachments.len()
            )));
        }
        if color_attachments.iter().any(Attachment::is_depth) {
            return Err(GlError::invalid("a depth attachment was given as a color attachment"));
        }
        if depth.as_ref().is_some_and(|d| !d.is_depth()) {
            return Err(GlError::invalid("the depth attachment has a color format"));
        }
        let (size, samples) = (first.size(), first.samples());
        for attachment in color_attachments.iter().chain(depth.as_ref()) {
            if attachment.size() != size {
                return Err(GlError::invalid("the attachments have different sizes"));
            }
            if attachment.samples() != samples {
                return Err(GlError::invalid("the attachments have different numbers of samples"));
            }
        }

        let handle = allocate(device, ObjectKind::Framebuffer)?;
        let gl = device.gl();
        gl.bind_framebuffer(glow::FRAMEBUFFER, handle.glo());
        let draw_buffers: Vec<u32> = (0..color_attachments.len() as u32).map(|i| glow::COLOR_ATTACHMENT0 + i).collect();
        for (attachment, point) in color_attachments.iter().zip(&draw_buffers) {
            attachment.attach(gl, *point);
        }
        if let Some(depth) = &depth {
            depth.attach(gl, glow::DEPTH_ATTACHMENT);
        }
        if draw_buffers.is_empty() {
            gl.draw_buffers(&[glow::NONE]);
            gl.read_buffer(glow::NONE);
        } else {
            gl.draw_buffers(&draw_buffers);
            gl.read_buffer(draw_buffers[0]);
        }
        let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
        device.rebind_framebuffer();
        if status != glow::FRAMEBUFFER_COMPLETE {
            log::error!("framebuffer {} is not complete: {}", handle.glo(), framebuffer_status_name(status));
            return Err(GlError::IncompleteFramebuffer { status });
        }
        device.check("creating a framebuffer");

        let (w, h) = (size.0 as i32, size.1 as i32);
        Ok(Framebuffer {
            shared: Rc::new(FramebufferShared {
                handle,
                color: color_attachments.to_vec(),
                depth,
                screen: false,
                size,
                samples,
                color_mask: RefCell::new(vec![[true; 4]; draw_buffers.len()]),
                draw_buffers,
                viewport: Cell::new([0, 0, w, h]),
                scissor: Cell::new(None),
                depth_mask: Cell::new(true),
            }),
        })
    }
}

impl Framebuffer {
    /// Wraps the default framebuffer of a device under construction.
    pub(crate) fn screen(device: Weak<DeviceInner>, viewport: [i32; 4]) -> Self {
        let size = (viewport[2].max(0) as u32, viewport[3].max(0) as u32);
        Framebuffer {
            shared: Rc::new(FramebufferShared {
                handle: GlHandle::borrowed(device, ObjectKind::Framebuffer, 0),
                color: Vec::new(),
                depth: None,
                screen: true,
                size,
                samples: 0,
                draw_buffers: vec![glow::BACK],
                viewport: Cell::new(viewport),
                scissor: Cell::new(None),
                color_mask: RefCell::new(vec![[true; 4]]),
                depth_mask: Cell::new(true),
            }),
        }
    }

    pub(crate) fn upgrade(weak: &Weak<FramebufferShared>) -> Option<Framebuffer> {
        weak.upgrade()
            .filter(|shared| !shared.handle.released())
            .map(|shared| Framebuffer { shared })
    }

    pub(crate) fn downgrade(&self) -> Weak<FramebufferShared> {
        Rc::downgrade(&self.shared)
    }

    // ── identity ──────────────────────────────────────────────────────────

    pub fn glo(&self) -> u32 {
        self.shared.handle.glo()
    }

    pub fn is_screen(&self) -> bool {
        self.shared.screen
    }

    pub fn size(&self) -> (u32, u32) {
        self.shared.size
    }

    pub fn samples(&self) -> u32 {
        self.shared.samples
    }

    pub fn color_attachments(&self) -> &[Attachment] {
        &self.shared.color
    }

    pub fn depth_attachment(&self) -> Option<&Attachment> {
        self.shared.depth.as_ref()
    }

    pub fn has_depth(&self) -> bool {
        self.shared.screen || self.shared.depth.is_some()
    }

    pub(crate) fn belongs_to(&self, device: &Rc<DeviceInner>) -> bool {
        self.shared.handle.belongs_to(device)
    }

    /// Frees the native framebuffer. The screen cannot be released.
    pub fn release(&self) {
        if !self.shared.screen {
            self.shared.handle.release();
        }
    }

    pub fn released(&self) -> bool {
        self.shared.handle.released()
    }

    // ── state ─────────────────────────────────────────────────────────────

    /// Pushes this framebuffer's binding and per-target state to the driver.
    fn apply(&self, gl: &dyn Gl) {
        gl.bind_framebuffer(glow::FRAMEBUFFER, self.glo());
        let [x, y, w, h] = self.shared.viewport.get();
        gl.viewport(x, y, w, h);
        self.apply_scissor(gl, self.shared.scissor.get());
        for (index, mask) in self.shared.color_mask.borrow().iter().enumerate() {
            gl.color_mask_indexed(index as u32, *mask);
        }
        gl.depth_mask(self.shared.depth_mask.get());
    }

    fn apply_scissor(&self, gl: &dyn Gl, scissor: Option<[i32; 4]>) {
        match scissor {
            Some([x, y, w, h]) => {
                gl.enable(glow::SCISSOR_TEST);
                gl.scissor(x, y, w, h);
            }
            None => gl.disable(glow::SCISSOR_TEST),
        }
    }

    /// Whether this framebuffer is the device's current one.
    fn is_current(&self, device: &DeviceInner) -> bool {
        device.bound_framebuffer() == *self
    }

    /// Makes this framebuffer current and applies its state.
    pub fn use_(&self) {
        let device = self.shared.handle.device();
        self.apply(device.gl());
        device.set_bound_framebuffer(self);
    }

    pub fn viewport(&self) -> [i32; 4] {
        self.shared.viewport.get()
    }

    pub fn set_viewport(&self, viewport: [i32; 4]) {
        let device = self.shared.handle.device();
        self.shared.viewport.set(viewport);
        if self.is_current(&device) {
            let [x, y, w, h] = viewport;
            device.gl().viewport(x, y, w, h);
        }
    }

    /// `None` when scissoring is off.
    pub fn scissor(&self) -> Option<[i32; 4]> {
        self.shared.scissor.get()
    }

    pub fn set_scissor(&self, scissor: Option<[i32; 4]>) {
        let device = self.shared.handle.device();
        self.shared.scissor.set(scissor);
        if self.is_current(&device) {
            self.apply_scissor(device.gl(), scissor);
        }
    }

    /// Color write mask of draw buffer `index`.
    pub fn color_mask(&self, index: usize) -> [bool; 4] {
        let masks = self.shared.color_mask.borrow();
        match masks.get(index) {
            Some(mask) => *mask,
            None => panic!("draw buffer {index} is out of range ({} draw buffers)", masks.len()),
        }
    }

    pub fn set_color_mask(&self, index: usize, mask: [bool; 4]) {
        let device = self.shared.handle.device();
        let count = self.shared.color_mask.borrow().len();
        assert!(index < count, "draw buffer {index} is out of range ({count} draw buffers)");
        self.shared.color_mask.borrow_mut()[index] = mask;
        if self.is_current(&device) {
            device.gl().color_mask_indexed(index as u32, mask);
        }
    }

    pub fn depth_mask(&self) -> bool {
        self.shared.depth_mask.get()
    }

    pub fn set_depth_mask(&self, enabled: bool) {
        let device = self.shared.handle.device();
        self.shared.depth_mask.set(enabled);
        if self.is_current(&device) {
            device.gl().depth_mask(enabled);
        }
    }

    // ── commands ──────────────────────────────────────────────────────────

    /// Clears every color target to `color` and the depth target to `depth`.
    ///
    /// With a `region` (`x, y, width, height`) only that rectangle is cleared;
    /// the scissor state is restored afterwards.
    pub fn clear(&self, color: [f32; 4], depth: f32, region: Option<(i32, i32, i32, i32)>) {
        let device = self.shared.handle.device();
        let gl = device.gl();
        self.apply(gl);
        if let Some((x, y, w, h)) = region {
            self.apply_scissor(gl, Some([x, y, w, h]));
        }
        gl.clear_color(color);
        gl.clear_depth(depth);
        let mut mask = glow::COLOR_BUFFER_BIT;
        if self.has_depth() {
            mask |= glow::DEPTH_BUFFER_BIT;
        }
        gl.clear(mask);
        device.bound_framebuffer().apply(gl);
        device.check("framebuffer clear");
    }

    /// Reads pixels back to client memory.
    pub fn read(&self, desc: ReadDesc<'_>) -> Result<Vec<u8>> {
        let (viewport, size) = self.read_extent(&desc)?;
        let mut out = vec![0; size];
        self.read_pixels(&desc, viewport, &mut out)?;
        Ok(out)
    }

    /// Reads pixels into `dst[write_offset..]`.
    pub fn read_into(&self, dst: &mut [u8], desc: ReadDesc<'_>, write_offset: usize) -> Result<()> {
        let (viewport, size) = self.read_extent(&desc)?;
        assert!(
            fits(write_offset, size, dst.len()),
            "read_into: {size} bytes at {write_offset} do not fit the destination of {} bytes",
            dst.len()
        );
        self.read_pixels(&desc, viewport, &mut dst[write_offset..write_offset + size])
    }

    /// Validates a read and returns its rectangle and byte size.
    fn read_extent(&self, desc: &ReadDesc<'_>) -> Result<([i32; 4], usize)> {
        check_alignment(desc.alignment);
        assert!(
            self.shared.samples == 0,
            "multisample framebuffers cannot be read; resolve with copy_framebuffer first"
        );
        let (w, h) = self.shared.size;
        let viewport = desc.viewport.unwrap_or([0, 0, w as i32, h as i32]);
        let [_, _, vw, vh] = viewport;
        assert!(vw >= 0 && vh >= 0, "read viewport {viewport:?} has a negative size");
        let size = match desc.attachment {
            ReadBuffer::Depth => {
                assert!(self.has_depth(), "read: the framebuffer has no depth attachment");
                row_size(vw as u32, 1, dtype::lookup("f4")?, desc.alignment) * vh as usize
            }
            ReadBuffer::Color(index) => {
                let count = if self.shared.screen { 1 } else { self.shared.color.len() as u32 };
                assert!(index < count, "read: color attachment {index} is out of range ({count} attachments)");
                if !(1..=4).contains(&desc.components) {
                    return Err(GlError::invalid(format!("components must be 1, 2, 3 or 4 (got {})", desc.components)));
                }
                row_size(vw as u32, desc.components, dtype::lookup(desc.dtype)?, desc.alignment) * vh as usize
            }
        };
        Ok((viewport, size))
    }

    fn read_pixels(&self, desc: &ReadDesc<'_>, viewport: [i32; 4], out: &mut [u8]) -> Result<()> {
        let (format, ty, source) = match desc.attachment {
            ReadBuffer::Depth => (glow::DEPTH_COMPONENT, glow::FLOAT, None),
            ReadBuffer::Color(index) => {
                let dt = dtype::lookup(desc.dtype)?;
                let source = if self.shared.screen { glow::BACK } else { glow::COLOR_ATTACHMENT0 + index };
                (dt.base_format[desc.components as usize], dt.gl_type, Some(source))
            }
        };
        let device = self.shared.handle.device();
        let gl = device.gl();
        gl.bind_framebuffer(glow::READ_FRAMEBUFFER, self.glo());
        if let Some(source) = source {
            gl.read_buffer(source);
        }
        gl.pixel_store_i32(glow::PACK_ALIGNMENT, desc.alignment as i32);
        let [x, y, w, h] = viewport;
        gl.read_pixels(x, y, w, h, format, ty, out);
        if source.is_some() {
            gl.read_buffer(self.shared.draw_buffers.first().copied().unwrap_or(glow::NONE));
        }
        device.rebind_framebuffer();
        device.check("framebuffer read");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{HeadlessBackend, HeadlessConfig};
    use crate::texture::TextureDesc;

    fn device() -> (Device, HeadlessBackend) {
        Device::headless(HeadlessConfig::default()).unwrap()
    }

    fn rgba(device: &Device, size: (u32, u32)) -> Attachment {
        Attachment::from(&device.texture(size, TextureDesc::default()).unwrap())
    }

    const RGBA: ReadDesc<'static> =
        ReadDesc { viewport: None, components: 4, attachment: ReadBuffer::Color(0), alignment: 1, dtype: "f1" };

    // ── creation ──────────────────────────────────────────────────────────

    #[test]
    fn builds_with_color_and_depth() {
        let (device, backend) = device();
        let depth = device.depth_renderbuffer((4, 4), 0).unwrap();
        let fbo = device
            .framebuffer_from(&[rgba(&device, (4, 4)), rgba(&device, (4, 4))], Some(Attachment::from(&depth)))
            .unwrap();
        assert_eq!(fbo.size(), (4, 4));
        assert!(fbo.has_depth());
        assert_eq!(fbo.color_attachments()[1].kind(), AttachmentKind::Texture2D);
        assert_eq!(backend.draw_framebuffer(), 0, "creation restores the current binding");
    }

    #[test]
    fn mismatched_sizes_are_rejected() {
        let (device, backend) = device();
        let err = device.framebuffer_from(&[rgba(&device, (4, 4)), rgba(&device, (2, 2))], None);
        assert!(matches!(err, Err(GlError::InvalidArgument(_))));
        assert_eq!(backend.count_calls("create_framebuffer"), 0);
    }

    #[test]
    fn incomplete_framebuffers_are_freed() {
        let (device, backend) = device();
        backend.fail_next_framebuffer_check(glow::FRAMEBUFFER_UNSUPPORTED);
        let err = device.framebuffer_from(&[rgba(&device, (4, 4))], None).unwrap_err();
        assert_eq!(err, GlError::IncompleteFramebuffer { status: glow::FRAMEBUFFER_UNSUPPORTED });
        assert_eq!(backend.count_calls("delete_framebuffer"), 1);
    }

    // ── state ─────────────────────────────────────────────────────────────

    #[test]
    fn use_applies_the_target_state() {
        let (device, backend) = device();
        let fbo = device.framebuffer_from(&[rgba(&device, (8, 8))], None).unwrap();
        fbo.set_scissor(Some([1, 1, 2, 2]));
        fbo.set_color_mask(0, [true, false, true, true]);
        assert!(!backend.is_enabled(glow::SCISSOR_TEST), "state is deferred until use");

        fbo.use_();
        assert_eq!(device.framebuffer(), fbo);
        assert_eq!(backend.draw_framebuffer(), fbo.glo());
        assert_eq!(backend.viewport_box(), [0, 0, 8, 8]);
        assert_eq!(backend.scissor_box(), [1, 1, 2, 2]);
        assert_eq!(backend.color_mask(0), [true, false, true, true]);

        fbo.set_scissor(None);
        assert!(!backend.is_enabled(glow::SCISSOR_TEST));
    }

    #[test]
    #[should_panic(expected = "draw buffer 3 is out of range (1 draw buffers)")]
    fn color_mask_index_is_checked() {
        let (device, _) = device();
        let fbo = device.framebuffer_from(&[rgba(&device, (4, 4))], None).unwrap();
        fbo.color_mask(3);
    }

    #[test]
    fn released_current_framebuffer_falls_back_to_the_screen() {
        let (device, _) = device();
        let fbo = device.framebuffer_from(&[rgba(&device, (2, 2))], None).unwrap();
        fbo.use_();
        fbo.release();
        assert_eq!(device.framebuffer(), device.screen());
    }

    #[test]
    fn screen_cannot_be_released() {
        let (device, _) = device();
        device.screen().release();
        assert!(!device.screen().released());
    }

    // ── clear and read ────────────────────────────────────────────────────

    #[test]
    fn clear_region_restores_the_scissor() {
        let (device, backend) = device();
        let fbo = device.framebuffer_from(&[rgba(&device, (2, 2))], None).unwrap();
        fbo.clear([1.0, 0.0, 0.0, 1.0], 1.0, Some((1, 0, 1, 1)));
        assert!(!backend.is_enabled(glow::SCISSOR_TEST));
        assert_eq!(backend.draw_framebuffer(), 0);

        let pixels = fbo.read(RGBA).unwrap();
        assert_eq!(pixels, vec![0, 0, 0, 0, 255, 0, 0, 255, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn depth_reads_return_floats() {
        let (device, _) = device();
        let depth = device.depth_texture((2, 1), None, 0, 1).unwrap();
        let fbo = device.framebuffer_from(&[], Some(Attachment::from(&depth))).unwrap();
        fbo.clear([0.0; 4], 0.5, None);
        let bytes = fbo.read(ReadDesc { attachment: ReadBuffer::Depth, ..Default::default() }).unwrap();
        let values: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);
        assert_eq!(values, vec![0.5, 0.5]);
    }

    #[test]
    fn read_into_honours_the_offset() {
        let (device, _) = device();
        device.screen().clear([0.0, 0.0, 1.0, 1.0], 1.0, None);
        let mut out = vec![7u8; 6];
        let desc = ReadDesc { viewport: Some([0, 0, 1, 1]), ..RGBA };
        device.screen().read_into(&mut out, desc, 2).unwrap();
        assert_eq!(out, vec![7, 7, 0, 0, 255, 255]);
    }

    #[test]
    #[should_panic(expected = "color attachment 1 is out of range")]
    fn reading_a_missing_attachment_is_fatal() {
        let (device, _) = device();
        let fbo = device.framebuffer_from(&[rgba(&device, (2, 2))], None).unwrap();
        let _ = fbo.read(ReadDesc { attachment: ReadBuffer::Color(1), ..RGBA });
    }
}
