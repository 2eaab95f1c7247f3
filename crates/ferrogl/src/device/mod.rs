//! Device: the owner of the native function table and global render state.
//!
//! This module is responsible for:
//! - probing backend loaders and validating the context version
//! - reading capability limits and driver identification
//! - mirroring global state (enable flags, blend/depth/cull settings, the
//!   bound framebuffer) so it can be queried without driver round-trips
//! - device-wide operations: clears, copies, flush/finish, error draining
//!
//! Resource factories (`Device::buffer`, `Device::texture`, ...) live next to
//! the resource they create.

mod context;
mod flags;
mod init;
mod limits;

pub(crate) use context::DeviceInner;
pub use flags::EnableFlags;
pub use init::DeviceInit;
pub use limits::{DeviceInfo, Limits};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use anyhow::Context;

use crate::buffer::Buffer;
use crate::error::{GlError, Result};
use crate::framebuffer::{Attachment, Framebuffer};
use crate::gl::{Gl, HeadlessBackend, HeadlessConfig, Loader};
use crate::logging::{drain_errors, error_name};
use crate::resource::fits;
use crate::texture::{compare_func, Texture, TextureKind};
use context::DeviceState;

/// Handle to one native context and everything created from it.
///
/// Cloning is cheap; clones refer to the same device. Several devices may
/// coexist (for instance one headless device per test).
#[derive(Clone)]
pub struct Device {
    inner: Rc<DeviceInner>,
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl Device {
    /// Creates a device from the first loader that succeeds.
    ///
    /// Loaders are tried in order; each failure is logged at `warn` and the
    /// next one is probed.
    pub fn create<I>(init: DeviceInit, loaders: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = Box<dyn Loader>>,
    {
        let mut last_error = None;
        for mut loader in loaders {
            let name = loader.name().to_string();
            match loader.load() {
                Ok(gl) => {
                    log::info!("loaded {name} backend");
                    return Self::from_gl(init, name.clone(), gl)
                        .with_context(|| format!("failed to initialize the {name} backend"));
                }
                Err(err) => {
                    log::warn!("backend {name} unavailable: {err:#}");
                    last_error = Some(err.context(format!("backend {name} failed to load")));
                }
            }
        }
        match last_error {
            Some(err) => Err(err),
            None => anyhow::bail!("no backend loaders were given"),
        }
    }

    /// Creates a device over a fresh [`HeadlessBackend`] and returns the
    /// backend handle for inspection.
    pub fn headless(config: HeadlessConfig) -> anyhow::Result<(Self, HeadlessBackend)> {
        let backend = HeadlessBackend::new(config);
        let loader: Box<dyn Loader> = Box::new(backend.clone());
        let device = Self::create(DeviceInit::default(), [loader])?;
        Ok((device, backend))
    }

    fn from_gl(init: DeviceInit, backend: String, gl: Box<dyn Gl>) -> anyhow::Result<Self> {
        let major = gl.get_parameter_i32(glow::MAJOR_VERSION);
        let minor = gl.get_parameter_i32(glow::MINOR_VERSION);
        let version_code = (major * 100 + minor * 10).max(0) as u32;
        anyhow::ensure!(
            version_code >= init.required_version,
            "context version {major}.{minor} is older than the required {}",
            init.required_version
        );

        let extensions = gl.extensions();
        let limits = limits::Limits::query(gl.as_ref(), version_code, &extensions);
        let info = limits::DeviceInfo::query(gl.as_ref());
        anyhow::ensure!(limits.max_texture_units > 0, "the driver reports no texture units");

        let default_texture_unit = match init.default_texture_unit {
            Some(unit) => {
                anyhow::ensure!(
                    unit < limits.max_texture_units,
                    "default texture unit {unit} is out of range (max {})",
                    limits.max_texture_units
                );
                unit
            }
            None => limits.max_texture_units - 1,
        };

        let mut viewport = [0; 4];
        gl.get_parameter_i32_slice(glow::VIEWPORT, &mut viewport);

        let inner = Rc::new_cyclic(|weak| DeviceInner {
            gl,
            backend,
            version_code,
            limits,
            info,
            extensions,
            default_texture_unit,
            check_errors: init.check_errors,
            released: Cell::new(false),
            state: RefCell::new(DeviceState::default()),
            screen: Framebuffer::screen(weak.clone(), viewport),
        });

        log::info!(
            "device ready: {} / {} ({}, version code {version_code})",
            inner.info.vendor,
            inner.info.renderer,
            inner.info.version
        );
        Ok(Self { inner })
    }

    pub(crate) fn inner(&self) -> &Rc<DeviceInner> {
        &self.inner
    }

    // ── identification ────────────────────────────────────────────────────

    /// Name of the loader that produced the native function table.
    pub fn backend(&self) -> &str {
        &self.inner.backend
    }

    /// `major * 100 + minor * 10`, e.g. 330 for a 3.3 context.
    pub fn version_code(&self) -> u32 {
        self.inner.version_code
    }

    pub fn limits(&self) -> &Limits {
        &self.inner.limits
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.inner.info
    }

    pub fn extensions(&self) -> &[String] {
        &self.inner.extensions
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.inner.extensions.iter().any(|e| e == name)
    }

    /// Texture unit used for temporary binds during uploads.
    pub fn default_texture_unit(&self) -> u32 {
        self.inner.default_texture_unit
    }

    // ── framebuffers ──────────────────────────────────────────────────────

    /// The default framebuffer. It is never deleted.
    pub fn screen(&self) -> Framebuffer {
        self.inner.screen.clone()
    }

    /// The framebuffer most recently made current.
    pub fn framebuffer(&self) -> Framebuffer {
        self.inner.bound_framebuffer()
    }

    // ── enable flags ──────────────────────────────────────────────────────

    pub fn enable_flags(&self) -> EnableFlags {
        self.inner.enable_flags()
    }

    /// Turns on `flags`, leaving the others as they are.
    pub fn enable(&self, flags: EnableFlags) {
        let gl = self.inner.gl();
        for (flag, cap) in EnableFlags::CAPS {
            if flags.contains(flag) {
                gl.enable(cap);
            }
        }
        self.inner.state.borrow_mut().enable_flags.insert(flags);
    }

    /// Turns off `flags`, leaving the others as they are.
    pub fn disable(&self, flags: EnableFlags) {
        let gl = self.inner.gl();
        for (flag, cap) in EnableFlags::CAPS {
            if flags.contains(flag) {
                gl.disable(cap);
            }
        }
        self.inner.state.borrow_mut().enable_flags.remove(flags);
    }

    /// Turns on exactly `flags` and turns off every other grouped capability.
    pub fn enable_only(&self, flags: EnableFlags) {
        self.inner.enable_only(flags);
    }

    /// Enables a raw native capability outside [`EnableFlags`].
    pub fn enable_direct(&self, cap: u32) {
        self.inner.gl().enable(cap);
    }

    pub fn disable_direct(&self, cap: u32) {
        self.inner.gl().disable(cap);
    }

    // ── fixed-function state ──────────────────────────────────────────────

    pub fn blend_func(&self) -> [u32; 4] {
        self.inner.state.borrow().blend_func
    }

    pub fn set_blend_func(&self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32) {
        self.inner.gl().blend_func_separate(src_rgb, dst_rgb, src_alpha, dst_alpha);
        self.inner.state.borrow_mut().blend_func = [src_rgb, dst_rgb, src_alpha, dst_alpha];
    }

    pub fn blend_equation(&self) -> [u32; 2] {
        self.inner.state.borrow().blend_equation
    }

    pub fn set_blend_equation(&self, mode_rgb: u32, mode_alpha: u32) {
        self.inner.gl().blend_equation_separate(mode_rgb, mode_alpha);
        self.inner.state.borrow_mut().blend_equation = [mode_rgb, mode_alpha];
    }

    /// Depth comparison as one of `<= < >= > == != 0 1`.
    pub fn depth_func(&self) -> String {
        self.inner.state.borrow().depth_func.clone()
    }

    pub fn set_depth_func(&self, func: &str) -> Result<()> {
        let code = compare_func(func).ok_or_else(|| GlError::invalid(format!("invalid depth func {func:?}")))?;
        self.inner.gl().depth_func(code);
        self.inner.state.borrow_mut().depth_func = func.to_string();
        Ok(())
    }

    pub fn cull_face(&self) -> u32 {
        self.inner.state.borrow().cull_face
    }

    /// `glow::FRONT`, `glow::BACK` or `glow::FRONT_AND_BACK`.
    pub fn set_cull_face(&self, face: u32) {
        self.inner.gl().cull_face(face);
        self.inner.state.borrow_mut().cull_face = face;
    }

    pub fn front_face(&self) -> u32 {
        self.inner.state.borrow().front_face
    }

    /// `glow::CCW` or `glow::CW`.
    pub fn set_front_face(&self, mode: u32) {
        self.inner.gl().front_face(mode);
        self.inner.state.borrow_mut().front_face = mode;
    }

    pub fn wireframe(&self) -> bool {
        self.inner.state.borrow().wireframe
    }

    pub fn set_wireframe(&self, enabled: bool) {
        let mode = if enabled { glow::LINE } else { glow::FILL };
        self.inner.gl().polygon_mode(glow::FRONT_AND_BACK, mode);
        self.inner.state.borrow_mut().wireframe = enabled;
    }

    pub fn polygon_offset(&self) -> (f32, f32) {
        self.inner.state.borrow().polygon_offset
    }

    /// A zero offset disables polygon offsetting altogether.
    pub fn set_polygon_offset(&self, factor: f32, units: f32) {
        let gl = self.inner.gl();
        let caps = [glow::POLYGON_OFFSET_POINT, glow::POLYGON_OFFSET_LINE, glow::POLYGON_OFFSET_FILL];
        if factor == 0.0 && units == 0.0 {
            caps.into_iter().for_each(|cap| gl.disable(cap));
        } else {
            caps.into_iter().for_each(|cap| gl.enable(cap));
            gl.polygon_offset(factor, units);
        }
        self.inner.state.borrow_mut().polygon_offset = (factor, units);
    }

    pub fn line_width(&self) -> f32 {
        self.inner.state.borrow().line_width
    }

    pub fn set_line_width(&self, width: f32) {
        self.inner.gl().line_width(width);
        self.inner.state.borrow_mut().line_width = width;
    }

    pub fn provoking_vertex(&self) -> u32 {
        self.inner.state.borrow().provoking_vertex
    }

    /// `glow::FIRST_VERTEX_CONVENTION` or `glow::LAST_VERTEX_CONVENTION`.
    pub fn set_provoking_vertex(&self, mode: u32) {
        self.inner.gl().provoking_vertex(mode);
        self.inner.state.borrow_mut().provoking_vertex = mode;
    }

    pub fn patch_vertices(&self) -> u32 {
        self.inner.state.borrow().patch_vertices
    }

    pub fn set_patch_vertices(&self, vertices: u32) {
        assert!(vertices > 0, "patch vertices must be positive");
        self.inner.gl().patch_parameter_i32(glow::PATCH_VERTICES, vertices as i32);
        self.inner.state.borrow_mut().patch_vertices = vertices;
    }

    // ── commands ──────────────────────────────────────────────────────────

    /// Clears the current framebuffer, or only `region` (`x, y, width,
    /// height`) of it.
    pub fn clear(&self, color: [f32; 4], depth: f32, region: Option<(i32, i32, i32, i32)>) {
        self.framebuffer().clear(color, depth, region);
    }

    pub fn finish(&self) {
        self.inner.gl().finish();
    }

    pub fn flush(&self) {
        self.inner.gl().flush();
    }

    /// Drains the native error queue and names the first error found
    /// (`"GL_NO_ERROR"` when the queue was empty).
    pub fn error(&self) -> &'static str {
        let codes = drain_errors(self.inner.gl(), "device error check");
        codes.first().map_or("GL_NO_ERROR", |code| error_name(*code))
    }

    /// Copies `size` bytes (default: the rest of `src`) between buffers on
    /// the device.
    pub fn copy_buffer(&self, dst: &Buffer, src: &Buffer, size: Option<usize>, read_offset: usize, write_offset: usize) {
        assert!(
            dst.belongs_to(&self.inner) && src.belongs_to(&self.inner),
            "copy_buffer: buffers belong to another device"
        );
        let size = size.unwrap_or_else(|| src.size().saturating_sub(read_offset));
        assert!(fits(read_offset, size, src.size()), "copy_buffer: read range out of bounds");
        assert!(fits(write_offset, size, dst.size()), "copy_buffer: write range out of bounds");
        let gl = self.inner.gl();
        gl.bind_buffer(glow::COPY_READ_BUFFER, src.glo());
        gl.bind_buffer(glow::COPY_WRITE_BUFFER, dst.glo());
        gl.copy_buffer_sub_data(glow::COPY_READ_BUFFER, glow::COPY_WRITE_BUFFER, read_offset, write_offset, size);
        self.inner.check("copy_buffer");
    }

    /// Blits `src` into `dst`, scaling to the destination size.
    pub fn copy_framebuffer(&self, dst: &Framebuffer, src: &Framebuffer) {
        assert!(
            dst.belongs_to(&self.inner) && src.belongs_to(&self.inner),
            "copy_framebuffer: framebuffers belong to another device"
        );
        let (sw, sh) = src.size();
        let (dw, dh) = dst.size();
        let mut mask = glow::COLOR_BUFFER_BIT;
        if src.has_depth() && dst.has_depth() {
            mask |= glow::DEPTH_BUFFER_BIT;
        }
        let gl = self.inner.gl();
        gl.bind_framebuffer(glow::READ_FRAMEBUFFER, src.glo());
        gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, dst.glo());
        gl.blit_framebuffer(
            [0, 0, sw as i32, sh as i32],
            [0, 0, dw as i32, dh as i32],
            mask,
            glow::NEAREST,
        );
        self.inner.rebind_framebuffer();
        self.inner.check("copy_framebuffer");
    }

    /// Blits the first color attachment of `src` into level 0 of a 2D texture.
    pub fn copy_framebuffer_to_texture(&self, dst: &Texture, src: &Framebuffer) -> Result<()> {
        assert_eq!(dst.kind(), TextureKind::Texture2D, "copy_framebuffer_to_texture needs a 2D texture");
        let target = self.framebuffer_from(&[Attachment::from(dst)], None)?;
        self.copy_framebuffer(&target, src);
        target.release();
        Ok(())
    }

    // ── lifetime ──────────────────────────────────────────────────────────

    /// Marks the device released. Every later operation on it, or on a
    /// resource created from it, panics; native deletes are skipped.
    pub fn release(&self) {
        if !self.inner.released.replace(true) {
            log::info!("device released");
        }
    }

    pub fn released(&self) -> bool {
        self.inner.released.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::HeadlessBackend;

    fn device() -> (Device, HeadlessBackend) {
        Device::headless(HeadlessConfig::default()).unwrap()
    }

    struct Broken;

    impl Loader for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn load(&mut self) -> anyhow::Result<Box<dyn Gl>> {
            anyhow::bail!("no display")
        }
    }

    // ── creation ──────────────────────────────────────────────────────────

    #[test]
    fn probes_loaders_in_order() {
        let backend = HeadlessBackend::default();
        let loaders: Vec<Box<dyn Loader>> = vec![Box::new(Broken), Box::new(backend)];
        let device = Device::create(DeviceInit::default(), loaders).unwrap();
        assert_eq!(device.backend(), "headless");
        assert_eq!(device.version_code(), 330);
    }

    #[test]
    fn reports_the_last_loader_failure() {
        let loaders: Vec<Box<dyn Loader>> = vec![Box::new(Broken)];
        let err = Device::create(DeviceInit::default(), loaders).unwrap_err();
        assert!(format!("{err:#}").contains("no display"));
    }

    #[test]
    fn rejects_old_contexts() {
        let backend = HeadlessBackend::new(HeadlessConfig { version: (3, 1), ..Default::default() });
        let loaders: Vec<Box<dyn Loader>> = vec![Box::new(backend)];
        let err = Device::create(DeviceInit::default(), loaders).unwrap_err();
        assert!(format!("{err:#}").contains("older than the required 330"));
    }

    #[test]
    fn default_texture_unit_is_the_last_unit() {
        let (device, _) = device();
        assert_eq!(device.default_texture_unit(), 31);
    }

    #[test]
    fn screen_is_current_after_creation() {
        let (device, _) = device();
        assert_eq!(device.framebuffer(), device.screen());
        assert_eq!(device.screen().size(), (64, 64));
    }

    // ── state ─────────────────────────────────────────────────────────────

    #[test]
    fn enable_flags_reach_the_driver() {
        let (device, backend) = device();
        device.enable(EnableFlags::BLEND | EnableFlags::DEPTH_TEST);
        device.disable(EnableFlags::BLEND);
        assert_eq!(device.enable_flags(), EnableFlags::DEPTH_TEST);
        assert!(backend.is_enabled(glow::DEPTH_TEST));
        assert!(!backend.is_enabled(glow::BLEND));

        device.enable_only(EnableFlags::CULL_FACE);
        assert_eq!(device.enable_flags(), EnableFlags::CULL_FACE);
        assert!(!backend.is_enabled(glow::DEPTH_TEST));
        assert!(backend.is_enabled(glow::CULL_FACE));
    }

    #[test]
    fn depth_func_accepts_comparison_symbols() {
        let (device, backend) = device();
        device.set_depth_func("<=").unwrap();
        assert_eq!(device.depth_func(), "<=");
        assert_eq!(backend.count_calls(&format!("depth_func({:#x})", glow::LEQUAL)), 1);
        assert!(device.set_depth_func("=<").is_err());
        assert_eq!(device.depth_func(), "<=");
    }

    #[test]
    fn zero_polygon_offset_disables_offsetting() {
        let (device, backend) = device();
        device.set_polygon_offset(1.0, 2.0);
        assert!(backend.is_enabled(glow::POLYGON_OFFSET_FILL));
        device.set_polygon_offset(0.0, 0.0);
        assert!(!backend.is_enabled(glow::POLYGON_OFFSET_FILL));
        assert_eq!(device.polygon_offset(), (0.0, 0.0));
    }

    #[test]
    fn error_names_the_first_queued_error() {
        let (device, backend) = device();
        assert_eq!(device.error(), "GL_NO_ERROR");
        backend.push_error(glow::INVALID_VALUE);
        backend.push_error(glow::INVALID_ENUM);
        assert_eq!(device.error(), "GL_INVALID_VALUE");
        assert_eq!(device.error(), "GL_NO_ERROR");
    }

    // ── copies ────────────────────────────────────────────────────────────

    #[test]
    fn copy_buffer_moves_bytes() {
        let (device, _) = device();
        let src = device.buffer(&[1, 2, 3, 4], false).unwrap();
        let dst = device.buffer_reserved(6, false).unwrap();
        device.copy_buffer(&dst, &src, Some(3), 1, 2);
        assert_eq!(dst.read(None, 0), vec![0, 0, 2, 3, 4, 0]);
    }

    #[test]
    #[should_panic(expected = "read range out of bounds")]
    fn copy_buffer_checks_bounds() {
        let (device, _) = device();
        let src = device.buffer(&[1, 2], false).unwrap();
        let dst = device.buffer_reserved(8, false).unwrap();
        device.copy_buffer(&dst, &src, Some(4), 0, 0);
    }

    // ── lifetime ──────────────────────────────────────────────────────────

    #[test]
    #[should_panic(expected = "device used after release")]
    fn released_device_refuses_work() {
        let (device, _) = device();
        device.release();
        device.release();
        assert!(device.released());
        device.flush();
    }
}
