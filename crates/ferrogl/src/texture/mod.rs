//! Textures: 2D (optionally multisampled), 3D, 2D array and cube map images.
//!
//! A single [`Texture`] type covers every kind; the [`TextureKind`] tag picks
//! the native target. Uploads and downloads bind on the device's reserved
//! texture unit so bindings made with [`Texture::use_`] survive them.

mod sampling;

pub(crate) use sampling::{compare_func, Sampling, SamplingTarget};

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::device::{Device, DeviceInner};
use crate::dtype::{self, check_alignment, row_size, DataType};
use crate::error::{GlError, Result};
use crate::gl::Gl;
use crate::resource::{allocate, fits, GlHandle, ObjectKind};

/// Closed set of texture kinds.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TextureKind {
    Texture2D,
    Texture3D,
    TextureArray,
    TextureCube,
}

impl TextureKind {
    fn target(self, samples: u32) -> u32 {
        match self {
            TextureKind::Texture2D if samples > 0 => glow::TEXTURE_2D_MULTISAMPLE,
            TextureKind::Texture2D => glow::TEXTURE_2D,
            TextureKind::Texture3D => glow::TEXTURE_3D,
            TextureKind::TextureArray => glow::TEXTURE_2D_ARRAY,
            TextureKind::TextureCube => glow::TEXTURE_CUBE_MAP,
        }
    }
}

/// Creation parameters shared by every texture factory.
#[derive(Debug, Clone, Copy)]
pub struct TextureDesc<'a> {
    /// 1 to 4.
    pub components: u32,
    /// Initial contents of level 0, rows padded to `alignment`. Cube maps take
    /// the six faces back to back (+X, -X, +Y, -Y, +Z, -Z).
    pub data: Option<&'a [u8]>,
    /// 0 for a single-sampled texture.
    pub samples: u32,
    pub alignment: usize,
    /// Code from the data type table (`"f1"`, `"u2"`, ...).
    pub dtype: &'a str,
}

impl Default for TextureDesc<'_> {
    fn default() -> Self {
        Self { components: 4, data: None, samples: 0, alignment: 1, dtype: "f1" }
    }
}

/// A box inside one mip level. 2D writes use `z = 0` and `depth = 1`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Region {
    pub fn rect(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, z: 0, width, height, depth: 1 }
    }

    pub fn volume(x: u32, y: u32, z: u32, width: u32, height: u32, depth: u32) -> Self {
        Self { x, y, z, width, height, depth }
    }
}

/// Writes sampling parameters to whatever is bound at `target`.
struct BoundTarget(u32);

impl SamplingTarget for BoundTarget {
    fn set_i32(&self, gl: &dyn Gl, pname: u32, value: i32) {
        gl.tex_parameter_i32(self.0, pname, value);
    }

    fn set_f32(&self, gl: &dyn Gl, pname: u32, value: f32) {
        gl.tex_parameter_f32(self.0, pname, value);
    }
}

struct TextureShared {
    handle: GlHandle,
    kind: TextureKind,
    target: u32,
    /// `(width, height, depth or layers)`
    extent: (u32, u32, u32),
    components: u32,
    samples: u32,
    dtype: &'static DataType,
    /// Client pixel format and type used for uploads and downloads.
    format: u32,
    gl_type: u32,
    depth: bool,
    sampling: RefCell<Sampling>,
    swizzle: RefCell<String>,
}

/// A native texture object.
#[derive(Clone)]
pub struct Texture {
    shared: Rc<TextureShared>,
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("glo", &self.glo())
            .field("kind", &self.shared.kind)
            .field("extent", &self.shared.extent)
            .field("dtype", &self.shared.dtype.code)
            .finish_non_exhaustive()
    }
}

impl Device {
    pub fn texture(&self, size: (u32, u32), desc: TextureDesc<'_>) -> Result<Texture> {
        Texture::create(self.inner(), TextureKind::Texture2D, (size.0, size.1, 1), desc, false)
    }

    /// `size` is `(width, height, depth)`.
    pub fn texture3d(&self, size: (u32, u32, u32), desc: TextureDesc<'_>) -> Result<Texture> {
        Texture::create(self.inner(), TextureKind::Texture3D, size, desc, false)
    }

    /// `size` is `(width, height, layers)`.
    pub fn texture_array(&self, size: (u32, u32, u32), desc: TextureDesc<'_>) -> Result<Texture> {
        Texture::create(self.inner(), TextureKind::TextureArray, size, desc, false)
    }

    pub fn texture_cube(&self, size: (u32, u32), desc: TextureDesc<'_>) -> Result<Texture> {
        Texture::create(self.inner(), TextureKind::TextureCube, (size.0, size.1, 1), desc, false)
    }

    /// A single-component float depth texture, compared with `<=` by default.
    pub fn depth_texture(
        &self,
        size: (u32, u32),
        data: Option<&[u8]>,
        samples: u32,
        alignment: usize,
    ) -> Result<Texture> {
        let desc = TextureDesc { components: 1, data, samples, alignment, dtype: "f4" };
        Texture::create(self.inner(), TextureKind::Texture2D, (size.0, size.1, 1), desc, true)
    }
}

/// Validates a sample count against the device limits.
pub(crate) fn check_samples(device: &DeviceInner, samples: u32, float_type: bool) -> Result<()> {
    let limit = if float_type { device.limits.max_samples } else { device.limits.max_integer_samples };
    if samples > 0 && (!samples.is_power_of_two() || samples > limit) {
        return Err(GlError::invalid(format!("the number of samples is invalid ({samples}, max {limit})")));
    }
    Ok(())
}

impl Texture {
    fn create(
        device: &Rc<DeviceInner>,
        kind: TextureKind,
        extent: (u32, u32, u32),
        desc: TextureDesc<'_>,
        depth: bool,
    ) -> Result<Texture> {
        let (width, height, layers) = extent;
        if width == 0 || height == 0 || layers == 0 {
            return Err(GlError::invalid(format!("invalid texture size {extent:?}")));
        }
        if !(1..=4).contains(&desc.components) {
            return Err(GlError::invalid(format!("components must be 1, 2, 3 or 4 (got {})", desc.components)));
        }
        check_alignment(desc.alignment);
        let dtype = dtype::lookup(desc.dtype)?;
        check_samples(device, desc.samples, dtype.float_type)?;
        if desc.samples > 0 && kind != TextureKind::Texture2D {
            return Err(GlError::invalid("only 2D textures can be multisampled"));
        }
        if desc.samples > 0 && desc.data.is_some() {
            return Err(GlError::invalid("multisample textures cannot be initialized with data"));
        }

        let c = desc.components as usize;
        let (format, gl_type, internal) = if depth {
            (glow::DEPTH_COMPONENT, glow::FLOAT, glow::DEPTH_COMPONENT24)
        } else {
            (dtype.base_format[c], dtype.gl_type, dtype.internal_format[c])
        };
        let faces = if kind == TextureKind::TextureCube { 6 } else { 1 };
        let face_size = row_size(width, desc.components, dtype, desc.alignment) * height as usize * layers as usize;
        if let Some(data) = desc.data {
            if data.len() != face_size * faces {
                return Err(GlError::invalid(format!(
                    "data size mismatch: expected {} bytes, got {}",
                    face_size * faces,
                    data.len()
                )));
            }
        }

        let handle = allocate(device, ObjectKind::Texture)?;
        let target = kind.target(desc.samples);
        device.bind_scratch_texture(target, handle.glo());
        let gl = device.gl();
        let (w, h, d) = (width as i32, height as i32, layers as i32);
        if desc.samples > 0 {
            gl.tex_image_2d_multisample(target, desc.samples as i32, internal, w, h);
        } else {
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, desc.alignment as i32);
            match kind {
                TextureKind::Texture2D => gl.tex_image_2d(target, 0, internal, w, h, format, gl_type, desc.data),
                TextureKind::Texture3D | TextureKind::TextureArray => {
                    gl.tex_image_3d(target, 0, internal, w, h, d, format, gl_type, desc.data)
                }
                TextureKind::TextureCube => {
                    for face in 0..6 {
                        let data = desc.data.map(|data| &data[face * face_size..(face + 1) * face_size]);
                        let face_target = glow::TEXTURE_CUBE_MAP_POSITIVE_X + face as u32;
                        gl.tex_image_2d(face_target, 0, internal, w, h, format, gl_type, data);
                    }
                }
            }
        }

        let filter = if dtype.float_type { glow::LINEAR } else { glow::NEAREST };
        let mut sampling = Sampling::new(filter);
        if desc.samples == 0 {
            let bound = BoundTarget(target);
            sampling.set_filter(gl, &bound, filter, filter)?;
            if depth {
                sampling.set_compare_func(gl, &bound, "<=")?;
            }
        }
        device.check("creating a texture");

        Ok(Texture {
            shared: Rc::new(TextureShared {
                handle,
                kind,
                target,
                extent,
                components: desc.components,
                samples: desc.samples,
                dtype,
                format,
                gl_type,
                depth,
                sampling: RefCell::new(sampling),
                swizzle: RefCell::new("RGBA".to_string()),
            }),
        })
    }

    // ── identity ──────────────────────────────────────────────────────────

    pub fn glo(&self) -> u32 {
        self.shared.handle.glo()
    }

    pub fn kind(&self) -> TextureKind {
        self.shared.kind
    }

    /// `(width, height)` of level 0.
    pub fn size(&self) -> (u32, u32) {
        (self.shared.extent.0, self.shared.extent.1)
    }

    /// Depth of a 3D texture or layer count of an array; 1 otherwise.
    pub fn depth(&self) -> u32 {
        self.shared.extent.2
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

    /// Created with [`Device::depth_texture`].
    pub fn is_depth(&self) -> bool {
        self.shared.depth
    }

    pub(crate) fn target(&self) -> u32 {
        self.shared.target
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

    // ── levels ────────────────────────────────────────────────────────────

    fn level_count(&self) -> u32 {
        let (w, h, d) = self.shared.extent;
        let largest = match self.shared.kind {
            TextureKind::Texture3D => w.max(h).max(d),
            _ => w.max(h),
        };
        32 - largest.leading_zeros()
    }

    fn level_extent(&self, level: u32) -> (u32, u32, u32) {
        assert!(
            level < self.level_count(),
            "level {level} is out of range for a texture with {} levels",
            self.level_count()
        );
        let (w, h, d) = self.shared.extent;
        let d = match self.shared.kind {
            TextureKind::Texture3D => (d >> level).max(1),
            _ => d,
        };
        ((w >> level).max(1), (h >> level).max(1), d)
    }

    fn level_bytes(&self, level: u32, alignment: usize) -> usize {
        let (w, h, d) = self.level_extent(level);
        row_size(w, self.shared.components, self.shared.dtype, alignment) * h as usize * d as usize
    }

    fn bind_scratch(&self) -> Rc<DeviceInner> {
        let device = self.shared.handle.device();
        device.bind_scratch_texture(self.shared.target, self.glo());
        device
    }

    // ── reads ─────────────────────────────────────────────────────────────

    /// Reads one whole level, rows padded to `alignment`.
    pub fn read(&self, level: u32, alignment: usize) -> Vec<u8> {
        assert!(self.shared.kind != TextureKind::TextureCube, "read: cube maps are read per face");
        check_alignment(alignment);
        let mut out = vec![0; self.level_bytes(level, alignment)];
        self.read_target(self.shared.target, &mut out, level, alignment);
        out
    }

    /// Reads one level into `dst[write_offset..]`.
    pub fn read_into(&self, dst: &mut [u8], level: u32, alignment: usize, write_offset: usize) {
        assert!(self.shared.kind != TextureKind::TextureCube, "read_into: cube maps are read per face");
        check_alignment(alignment);
        let size = self.level_bytes(level, alignment);
        assert!(
            fits(write_offset, size, dst.len()),
            "read_into: {size} bytes at {write_offset} do not fit the destination of {} bytes",
            dst.len()
        );
        self.read_target(self.shared.target, &mut dst[write_offset..write_offset + size], level, alignment);
    }

    /// Reads one face (0..6, in +X, -X, +Y, -Y, +Z, -Z order) of a cube map.
    pub fn read_face(&self, face: u32, level: u32, alignment: usize) -> Vec<u8> {
        assert!(self.shared.kind == TextureKind::TextureCube, "read_face needs a cube map");
        assert!(face < 6, "cube map face {face} is out of range");
        check_alignment(alignment);
        let mut out = vec![0; self.level_bytes(level, alignment)];
        self.read_target(glow::TEXTURE_CUBE_MAP_POSITIVE_X + face, &mut out, level, alignment);
        out
    }

    fn read_target(&self, target: u32, out: &mut [u8], level: u32, alignment: usize) {
        assert!(self.shared.samples == 0, "multisample textures cannot be read");
        let device = self.bind_scratch();
        let gl = device.gl();
        gl.pixel_store_i32(glow::PACK_ALIGNMENT, alignment as i32);
        gl.get_tex_image(target, level as i32, self.shared.format, self.shared.gl_type, out);
        device.check("texture read");
    }

    // ── writes ────────────────────────────────────────────────────────────

    /// Writes `data` into `region` of `level` (default: the whole level).
    ///
    /// A region outside the level panics; a data length that does not match
    /// the region is an [`GlError::InvalidArgument`].
    pub fn write(&self, data: &[u8], level: u32, region: Option<Region>, alignment: usize) -> Result<()> {
        assert!(self.shared.kind != TextureKind::TextureCube, "write: cube maps are written per face");
        self.write_target(self.shared.target, data, level, region, alignment)
    }

    pub fn write_face(
        &self,
        face: u32,
        data: &[u8],
        level: u32,
        region: Option<Region>,
        alignment: usize,
    ) -> Result<()> {
        assert!(self.shared.kind == TextureKind::TextureCube, "write_face needs a cube map");
        assert!(face < 6, "cube map face {face} is out of range");
        self.write_target(glow::TEXTURE_CUBE_MAP_POSITIVE_X + face, data, level, region, alignment)
    }

    fn write_target(
        &self,
        target: u32,
        data: &[u8],
        level: u32,
        region: Option<Region>,
        alignment: usize,
    ) -> Result<()> {
        assert!(self.shared.samples == 0, "multisample textures cannot be written");
        check_alignment(alignment);
        let (w, h, d) = self.level_extent(level);
        let region = region.unwrap_or(Region::volume(0, 0, 0, w, h, d));
        assert!(
            [(region.x, region.width, w), (region.y, region.height, h), (region.z, region.depth, d)]
                .iter()
                .all(|&(start, len, limit)| start.checked_add(len).is_some_and(|end| end <= limit)),
            "write region {region:?} is outside level {level} ({w}x{h}x{d})"
        );
        let expected = row_size(region.width, self.shared.components, self.shared.dtype, alignment)
            * region.height as usize
            * region.depth as usize;
        if data.len() != expected {
            return Err(GlError::invalid(format!(
                "data size mismatch: expected {expected} bytes, got {}",
                data.len()
            )));
        }

        let device = self.bind_scratch();
        let gl = device.gl();
        gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, alignment as i32);
        let (format, ty) = (self.shared.format, self.shared.gl_type);
        let (x, y, z) = (region.x as i32, region.y as i32, region.z as i32);
        let (rw, rh, rd) = (region.width as i32, region.height as i32, region.depth as i32);
        match self.shared.kind {
            TextureKind::Texture2D | TextureKind::TextureCube => {
                gl.tex_sub_image_2d(target, level as i32, x, y, rw, rh, format, ty, data)
            }
            TextureKind::Texture3D | TextureKind::TextureArray => {
                gl.tex_sub_image_3d(target, level as i32, x, y, z, rw, rh, rd, format, ty, data)
            }
        }
        device.check("texture write");
        Ok(())
    }

    // ── binding ───────────────────────────────────────────────────────────

    /// Binds the texture to texture unit `unit`.
    pub fn use_(&self, unit: u32) {
        let device = self.shared.handle.device();
        assert!(
            unit < device.limits.max_texture_units,
            "texture unit {unit} is out of range (max {})",
            device.limits.max_texture_units
        );
        let gl = device.gl();
        gl.active_texture(unit);
        gl.bind_texture(self.shared.target, self.glo());
    }

    /// Regenerates levels `base + 1..=max_level` from `base` and switches to
    /// trilinear minification.
    pub fn build_mipmaps(&self, base: u32, max_level: u32) {
        assert!(self.shared.samples == 0, "multisample textures have no mipmaps");
        assert!(base <= max_level, "build_mipmaps: base {base} is above max level {max_level}");
        let target = self.shared.target;
        let device = self.bind_scratch();
        let gl = device.gl();
        gl.tex_parameter_i32(target, glow::TEXTURE_BASE_LEVEL, base as i32);
        gl.tex_parameter_i32(target, glow::TEXTURE_MAX_LEVEL, max_level as i32);
        gl.generate_mipmap(target);
        let mut sampling = self.shared.sampling.borrow_mut();
        gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, glow::LINEAR_MIPMAP_LINEAR as i32);
        gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
        sampling.filter = (glow::LINEAR_MIPMAP_LINEAR, glow::LINEAR);
        log::trace!("built mipmaps {base}..={max_level} for texture {}", self.glo());
    }

    // ── sampling ──────────────────────────────────────────────────────────

    fn sampling<R>(&self, f: impl FnOnce(&mut Sampling, &dyn Gl, &BoundTarget, &Rc<DeviceInner>) -> R) -> R {
        let device = self.bind_scratch();
        let target = BoundTarget(self.shared.target);
        let mut sampling = self.shared.sampling.borrow_mut();
        f(&mut sampling, device.gl(), &target, &device)
    }

    /// `(min, mag)` filter.
    pub fn filter(&self) -> (u32, u32) {
        self.shared.sampling.borrow().filter
    }

    pub fn set_filter(&self, min: u32, mag: u32) -> Result<()> {
        self.sampling(|s, gl, target, _| s.set_filter(gl, target, min, mag))
    }

    pub fn repeat_x(&self) -> bool {
        self.shared.sampling.borrow().repeat[0]
    }

    pub fn set_repeat_x(&self, repeat: bool) {
        self.sampling(|s, gl, target, _| s.set_repeat(gl, target, 0, repeat))
    }

    pub fn repeat_y(&self) -> bool {
        self.shared.sampling.borrow().repeat[1]
    }

    pub fn set_repeat_y(&self, repeat: bool) {
        self.sampling(|s, gl, target, _| s.set_repeat(gl, target, 1, repeat))
    }

    pub fn repeat_z(&self) -> bool {
        self.shared.sampling.borrow().repeat[2]
    }

    pub fn set_repeat_z(&self, repeat: bool) {
        self.sampling(|s, gl, target, _| s.set_repeat(gl, target, 2, repeat))
    }

    /// Four characters over `RGBA01`, `"RGBA"` by default.
    pub fn swizzle(&self) -> String {
        self.shared.swizzle.borrow().clone()
    }

    pub fn set_swizzle(&self, swizzle: &str) -> Result<()> {
        let parsed = sampling::parse_swizzle(swizzle)?;
        let device = self.bind_scratch();
        device.gl().tex_parameter_i32_slice(self.shared.target, glow::TEXTURE_SWIZZLE_RGBA, &parsed);
        *self.shared.swizzle.borrow_mut() = swizzle.to_ascii_uppercase();
        Ok(())
    }

    /// One of `<= < >= > == != 0 1`, or empty when comparison is off.
    pub fn compare_func(&self) -> String {
        self.shared.sampling.borrow().compare_func.clone()
    }

    pub fn set_compare_func(&self, func: &str) -> Result<()> {
        self.sampling(|s, gl, target, _| s.set_compare_func(gl, target, func))
    }

    pub fn anisotropy(&self) -> f32 {
        self.shared.sampling.borrow().anisotropy
    }

    /// Clamped to `1.0..=limits().max_anisotropy`.
    pub fn set_anisotropy(&self, value: f32) {
        self.sampling(|s, gl, target, device| {
            s.set_anisotropy(gl, target, value, device.limits.max_anisotropy)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{HeadlessBackend, HeadlessConfig};

    fn device() -> (Device, HeadlessBackend) {
        Device::headless(HeadlessConfig::default()).unwrap()
    }

    fn rgba(data: &[u8]) -> TextureDesc<'_> {
        TextureDesc { data: Some(data), ..Default::default() }
    }

    // ── creation ──────────────────────────────────────────────────────────

    #[test]
    fn uploads_through_the_reserved_unit() {
        let (device, backend) = device();
        let pixels: Vec<u8> = (0..16).collect();
        let texture = device.texture((2, 2), rgba(&pixels)).unwrap();
        assert_eq!(backend.texture_binding(31, glow::TEXTURE_2D), texture.glo());
        assert_eq!(backend.texture_binding(0, glow::TEXTURE_2D), 0);
        assert_eq!(texture.read(0, 1), pixels);
    }

    #[test]
    fn size_mismatch_is_rejected_before_allocation() {
        let (device, backend) = device();
        let err = device.texture((2, 2), rgba(&[0; 15])).unwrap_err();
        assert!(matches!(err, GlError::InvalidArgument(_)));
        assert_eq!(backend.count_calls("create_texture"), 0);
    }

    #[test]
    fn unknown_dtype() {
        let (device, _) = device();
        let desc = TextureDesc { dtype: "f3", ..Default::default() };
        assert_eq!(device.texture((1, 1), desc).unwrap_err(), GlError::UnknownDtype("f3".into()));
    }

    #[test]
    fn integer_textures_default_to_nearest() {
        let (device, backend) = device();
        let texture = device.texture((4, 4), TextureDesc { dtype: "u1", ..Default::default() }).unwrap();
        assert_eq!(texture.filter(), (glow::NEAREST, glow::NEAREST));
        let min = backend.texture_parameter(texture.glo(), glow::TEXTURE_MIN_FILTER);
        assert_eq!(min, Some(vec![glow::NEAREST as f32]));
    }

    #[test]
    fn depth_textures_compare_by_default() {
        let (device, backend) = device();
        let texture = device.depth_texture((4, 4), None, 0, 1).unwrap();
        assert!(texture.is_depth());
        assert_eq!(texture.compare_func(), "<=");
        let func = backend.texture_parameter(texture.glo(), glow::TEXTURE_COMPARE_FUNC);
        assert_eq!(func, Some(vec![glow::LEQUAL as f32]));
        texture.set_compare_func("").unwrap();
        let mode = backend.texture_parameter(texture.glo(), glow::TEXTURE_COMPARE_MODE);
        assert_eq!(mode, Some(vec![glow::NONE as f32]));
    }

    #[test]
    fn multisample_textures_validate_samples() {
        let (device, _) = device();
        let desc = TextureDesc { samples: 3, ..Default::default() };
        assert!(device.texture((4, 4), desc).is_err());
        let desc = TextureDesc { samples: 4, ..Default::default() };
        let texture = device.texture((4, 4), desc).unwrap();
        assert_eq!(texture.samples(), 4);
        assert_eq!(texture.target(), glow::TEXTURE_2D_MULTISAMPLE);
    }

    // ── data ──────────────────────────────────────────────────────────────

    #[test]
    fn rows_follow_the_alignment() {
        let (device, _) = device();
        let padded = [1, 2, 3, 4, 5, 6, 7, 8, 9, 0, 0, 0];
        let desc = TextureDesc { components: 3, data: Some(&padded), alignment: 4, ..Default::default() };
        let texture = device.texture((3, 1), desc).unwrap();
        assert_eq!(texture.read(0, 1), vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(texture.read(0, 4), padded.to_vec());
    }

    #[test]
    fn region_writes_land_in_place() {
        let (device, _) = device();
        let texture = device.texture((2, 2), TextureDesc { components: 1, ..Default::default() }).unwrap();
        texture.write(&[7], 0, Some(Region::rect(1, 1, 1, 1)), 1).unwrap();
        assert_eq!(texture.read(0, 1), vec![0, 0, 0, 7]);
        assert!(texture.write(&[1, 2], 0, Some(Region::rect(0, 0, 1, 1)), 1).is_err());
    }

    #[test]
    #[should_panic(expected = "is outside level 0")]
    fn region_outside_the_level_is_fatal() {
        let (device, _) = device();
        let texture = device.texture((2, 2), TextureDesc::default()).unwrap();
        let _ = texture.write(&[0; 16], 0, Some(Region::rect(1, 1, 2, 2)), 1);
    }

    #[test]
    #[should_panic(expected = "is outside level 0")]
    fn wrapping_regions_are_outside_the_level() {
        let (device, _) = device();
        let texture = device.texture((2, 2), TextureDesc::default()).unwrap();
        let _ = texture.write(&[0; 4], 0, Some(Region::rect(u32::MAX, 0, 1, 1)), 1);
    }

    #[test]
    #[should_panic(expected = "do not fit the destination")]
    fn read_into_rejects_wrapping_offsets() {
        let (device, _) = device();
        let texture = device.texture((2, 2), TextureDesc::default()).unwrap();
        texture.read_into(&mut [0; 16], 0, 1, usize::MAX);
    }

    #[test]
    fn arrays_and_cubes() {
        let (device, _) = device();
        let layers = device.texture_array((2, 2, 3), TextureDesc { components: 1, ..Default::default() }).unwrap();
        assert_eq!(layers.read(0, 1).len(), 12);

        let faces: Vec<u8> = (0..6).flat_map(|f| [f; 4]).collect();
        let cube = device
            .texture_cube((2, 2), TextureDesc { components: 1, data: Some(&faces), ..Default::default() })
            .unwrap();
        assert_eq!(cube.read_face(3, 0, 1), vec![3; 4]);
        cube.write_face(3, &[9; 4], 0, None, 1).unwrap();
        assert_eq!(cube.read_face(3, 0, 1), vec![9; 4]);
    }

    #[test]
    #[should_panic(expected = "multisample textures cannot be read")]
    fn multisample_reads_are_fatal() {
        let (device, _) = device();
        let texture = device.texture((2, 2), TextureDesc { samples: 2, ..Default::default() }).unwrap();
        texture.read(0, 1);
    }

    // ── sampling ──────────────────────────────────────────────────────────

    #[test]
    fn mipmaps_switch_the_filter() {
        let (device, _) = device();
        let texture = device.texture((4, 4), rgba(&[255; 64])).unwrap();
        texture.build_mipmaps(0, 2);
        assert_eq!(texture.filter(), (glow::LINEAR_MIPMAP_LINEAR, glow::LINEAR));
        assert_eq!(texture.read(2, 1), vec![255; 4]);
    }

    #[test]
    fn swizzle_and_anisotropy() {
        let (device, backend) = device();
        let texture = device.texture((1, 1), TextureDesc::default()).unwrap();
        texture.set_swizzle("bgra").unwrap();
        assert_eq!(texture.swizzle(), "BGRA");
        assert!(texture.set_swizzle("xyzw").is_err());
        assert_eq!(texture.swizzle(), "BGRA");

        texture.set_anisotropy(64.0);
        assert_eq!(texture.anisotropy(), 16.0);
        let native = backend.texture_parameter(texture.glo(), crate::gl::TEXTURE_MAX_ANISOTROPY);
        assert_eq!(native, Some(vec![16.0]));
    }

    #[test]
    fn repeat_flags_mirror_the_wrap_mode() {
        let (device, backend) = device();
        let texture = device.texture((1, 1), TextureDesc::default()).unwrap();
        texture.set_repeat_y(false);
        assert!(texture.repeat_x());
        assert!(!texture.repeat_y());
        let wrap = backend.texture_parameter(texture.glo(), glow::TEXTURE_WRAP_T);
        assert_eq!(wrap, Some(vec![glow::CLAMP_TO_EDGE as f32]));
    }

    #[test]
    fn use_binds_the_requested_unit() {
        let (device, backend) = device();
        let texture = device.texture((1, 1), TextureDesc::default()).unwrap();
        texture.use_(3);
        assert_eq!(backend.texture_binding(3, glow::TEXTURE_2D), texture.glo());
    }

    #[test]
    fn release_is_idempotent() {
        let (device, backend) = device();
        let texture = device.texture((1, 1), TextureDesc::default()).unwrap();
        texture.release();
        texture.release();
        assert!(texture.released());
        assert_eq!(backend.count_calls("delete_texture"), 1);
    }
}
