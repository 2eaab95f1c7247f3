//! Software model of the driver state machine.
//!
//! `HeadlessBackend` answers every [`Gl`] call from an in-memory model:
//! names are allocated, buffer and texture bytes are stored, clears and pixel
//! reads work on colour and depth images, and shader sources go through a
//! small declaration scanner so reflection queries return realistic data.
//! Draw calls are recorded but not rasterized.
//!
//! The backend is a cheap handle; clone it before passing it to
//! `Device::create` and keep the clone to inspect driver state from tests.

mod compiler;
mod state;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

pub use state::VertexAttrib;

use super::{ActiveInfo, AttribKind, Gl, Loader};
use crate::program::types;
use compiler::{compile, link};
use state::{components, type_size, AttachRef, FramebufferData, HeadlessState, Image, ProgramData, QueryData, ShaderData};

/// What the headless driver reports about itself.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Context version `(major, minor)`.
    pub version: (u32, u32),
    /// Size of the default framebuffer in pixels.
    pub screen: (u32, u32),
    pub max_samples: i32,
    pub max_color_attachments: i32,
    pub max_texture_units: i32,
    pub max_anisotropy: f32,
    pub extensions: Vec<String>,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            version: (3, 3),
            screen: (64, 64),
            max_samples: 8,
            max_color_attachments: 8,
            max_texture_units: 32,
            max_anisotropy: 16.0,
            extensions: vec!["GL_EXT_texture_filter_anisotropic".to_string()],
        }
    }
}

/// Native function table backed by [`HeadlessState`].
#[derive(Clone)]
pub struct HeadlessBackend {
    state: Rc<RefCell<HeadlessState>>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(HeadlessConfig::default())
    }
}

impl HeadlessBackend {
    pub fn new(config: HeadlessConfig) -> Self {
        Self { state: Rc::new(RefCell::new(HeadlessState::new(config))) }
    }

    fn with<R>(&self, f: impl FnOnce(&mut HeadlessState) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }

    // ── inspection ────────────────────────────────────────────────────────

    /// Every native call made so far, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    /// Drains the call log.
    pub fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut self.state.borrow_mut().calls)
    }

    /// Number of logged calls starting with `prefix`.
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.state.borrow().calls.iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Makes the next `create_<kind>` call fail (`"buffer"`, `"texture"`,
    /// `"framebuffer"`, `"program"`, ...).
    pub fn fail_next(&self, kind: &str) {
        self.with(|s| s.pending_failures.push(kind.to_string()));
    }

    /// Makes the next completeness check report `status`.
    pub fn fail_next_framebuffer_check(&self, status: u32) {
        self.with(|s| s.forced_status = Some(status));
    }

    /// Queues a native error code for `get_error`.
    pub fn push_error(&self, code: u32) {
        self.with(|s| s.error(code));
    }

    pub fn is_enabled(&self, cap: u32) -> bool {
        self.state.borrow().caps.contains(&cap)
    }

    pub fn draw_framebuffer(&self) -> u32 {
        self.state.borrow().draw_framebuffer
    }

    pub fn current_program(&self) -> u32 {
        self.state.borrow().program
    }

    /// Native objects currently alive (the default framebuffer excluded).
    pub fn live_objects(&self) -> usize {
        self.state.borrow().live_objects()
    }

    pub fn buffer_contents(&self, buffer: u32) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&buffer).cloned()
    }

    pub fn texture_binding(&self, unit: u32, target: u32) -> u32 {
        self.state.borrow().texture_units.get(&(unit, target)).copied().unwrap_or(0)
    }

    pub fn sampler_binding(&self, unit: u32) -> u32 {
        self.state.borrow().sampler_units.get(&unit).copied().unwrap_or(0)
    }

    /// `(buffer, offset, size)` bound at an indexed target.
    pub fn indexed_buffer(&self, target: u32, index: u32) -> Option<(u32, usize, usize)> {
        self.state.borrow().indexed_bindings.get(&(target, index)).copied()
    }

    pub fn vertex_attrib(&self, vertex_array: u32, location: u32) -> Option<VertexAttrib> {
        let state = self.state.borrow();
        state.vertex_arrays.get(&vertex_array)?.attribs.get(&location).cloned()
    }

    pub fn element_buffer(&self, vertex_array: u32) -> u32 {
        self.state.borrow().vertex_arrays.get(&vertex_array).map_or(0, |v| v.element_buffer)
    }

    pub fn texture_parameter(&self, texture: u32, pname: u32) -> Option<Vec<f32>> {
        self.state.borrow().textures.get(&texture)?.params.get(&pname).cloned()
    }

    pub fn sampler_parameter(&self, sampler: u32, pname: u32) -> Option<Vec<f32>> {
        self.state.borrow().samplers.get(&sampler)?.get(&pname).cloned()
    }

    /// Bytes last uploaded to one uniform location of `program`.
    pub fn uniform_value(&self, program: u32, location: i32) -> Option<Vec<u8>> {
        self.state.borrow().uniform_values.get(&(program, location)).cloned()
    }

    pub fn scissor_box(&self) -> [i32; 4] {
        self.state.borrow().scissor
    }

    pub fn viewport_box(&self) -> [i32; 4] {
        self.state.borrow().viewport
    }

    pub fn color_mask(&self, draw_buffer: u32) -> [bool; 4] {
        self.state.borrow().color_masks.get(&draw_buffer).copied().unwrap_or([true; 4])
    }

    /// Subroutine indices last selected for `stage` of `program`.
    pub fn selected_subroutines(&self, program: u32, stage: u32) -> Vec<u32> {
        let state = self.state.borrow();
        state
            .programs
            .get(&program)
            .and_then(ProgramData::linked)
            .and_then(|l| l.subroutines.iter().find(|s| s.stage == stage))
            .map(|s| s.selected.clone())
            .unwrap_or_default()
    }
}

impl Loader for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn load(&mut self) -> anyhow::Result<Box<dyn Gl>> {
        Ok(Box::new(self.clone()))
    }
}

fn blank_attrib() -> VertexAttrib {
    VertexAttrib {
        buffer: 0,
        size: 4,
        ty: glow::FLOAT,
        normalized: false,
        stride: 0,
        offset: 0,
        kind: AttribKind::Float,
        divisor: 0,
        enabled: false,
    }
}

fn attrib_slot(s: &mut HeadlessState, location: u32) -> Option<&mut VertexAttrib> {
    let vao = s.vertex_array;
    s.vertex_arrays
        .get_mut(&vao)
        .map(|v| v.attribs.entry(location).or_insert_with(blank_attrib))
}

fn define_image(s: &mut HeadlessState, target: u32, level: i32, mut image: Image, upload: Option<(&[u8], u32, u32)>) {
    if let Some((data, format, ty)) = upload {
        let extent = [image.width, image.height, image.depth];
        let matches = components(format) * type_size(ty) == image.pixel_size();
        if !matches || !image.unpack([0, 0, 0], extent, s.unpack_alignment, data) {
            s.error(glow::INVALID_OPERATION);
        }
    }
    let name = s.bound_texture(target);
    match s.textures.get_mut(&name) {
        Some(texture) => {
            texture.images.insert((target, level), image);
        }
        None => s.error(glow::INVALID_OPERATION),
    }
}

/// Splits `lights[2]` into `("lights", 2)`.
fn split_subscript(name: &str) -> (&str, i32) {
    if let Some(open) = name.rfind('[') {
        if name.ends_with(']') {
            if let Ok(index) = name[open + 1..name.len() - 1].parse() {
                return (&name[..open], index);
            }
        }
    }
    (name, 0)
}

fn read_u32s<const N: usize>(bytes: &[u8]) -> Option<[u32; N]> {
    let mut out = [0u32; N];
    for (slot, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *slot = bytemuck::pod_read_unaligned(chunk);
    }
    (bytes.len() >= N * 4).then_some(out)
}

impl Gl for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    // ── queries ───────────────────────────────────────────────────────────

    fn get_error(&self) -> u32 {
        self.with(|s| s.errors.pop_front().unwrap_or(glow::NO_ERROR))
    }

    fn get_parameter_i32(&self, pname: u32) -> i32 {
        self.with(|s| match pname {
            glow::MAJOR_VERSION => s.config.version.0 as i32,
            glow::MINOR_VERSION => s.config.version.1 as i32,
            glow::MAX_SAMPLES | glow::MAX_INTEGER_SAMPLES => s.config.max_samples,
            glow::MAX_COLOR_ATTACHMENTS | glow::MAX_DRAW_BUFFERS => s.config.max_color_attachments,
            glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS => s.config.max_texture_units,
            glow::MAX_UNIFORM_BLOCK_SIZE => 16384,
            glow::MAX_TEXTURE_SIZE => 16384,
            glow::DRAW_FRAMEBUFFER_BINDING => s.draw_framebuffer as i32,
            glow::READ_FRAMEBUFFER_BINDING => s.read_framebuffer as i32,
            glow::CURRENT_PROGRAM => s.program as i32,
            glow::VERTEX_ARRAY_BINDING => s.vertex_array as i32,
            glow::ACTIVE_TEXTURE => (glow::TEXTURE0 + s.active_unit) as i32,
            glow::PACK_ALIGNMENT => s.pack_alignment as i32,
            glow::UNPACK_ALIGNMENT => s.unpack_alignment as i32,
            cap if s.caps.contains(&cap) => 1,
            _ => 0,
        })
    }

    fn get_parameter_i32_slice(&self, pname: u32, out: &mut [i32]) {
        let values = match pname {
            glow::VIEWPORT => self.with(|s| s.viewport.to_vec()),
            glow::SCISSOR_BOX => self.with(|s| s.scissor.to_vec()),
            _ => vec![self.get_parameter_i32(pname)],
        };
        for (slot, value) in out.iter_mut().zip(values) {
            *slot = value;
        }
    }

    fn get_parameter_f32(&self, pname: u32) -> f32 {
        match pname {
            super::MAX_TEXTURE_MAX_ANISOTROPY => self.with(|s| s.config.max_anisotropy),
            _ => self.get_parameter_i32(pname) as f32,
        }
    }

    fn get_parameter_string(&self, pname: u32) -> String {
        self.with(|s| {
            let (major, minor) = s.config.version;
            match pname {
                glow::VENDOR => "ferrogl".to_string(),
                glow::RENDERER => "headless".to_string(),
                glow::VERSION => format!("{major}.{minor}.0 headless"),
                glow::SHADING_LANGUAGE_VERSION => format!("{major}.{minor}0"),
                _ => String::new(),
            }
        })
    }

    fn extensions(&self) -> Vec<String> {
        self.with(|s| s.config.extensions.clone())
    }

    // ── fixed-function state ──────────────────────────────────────────────

    fn enable(&self, cap: u32) {
        self.with(|s| {
            s.record(format!("enable({cap:#x})"));
            s.caps.insert(cap);
        })
    }

    fn disable(&self, cap: u32) {
        self.with(|s| {
            s.record(format!("disable({cap:#x})"));
            s.caps.remove(&cap);
        })
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.with(|s| {
            s.record(format!("viewport({x}, {y}, {width}, {height})"));
            s.viewport = [x, y, width, height];
        })
    }

    fn scissor(&self, x: i32, y: i32, width: i32, height: i32) {
        self.with(|s| {
            s.record(format!("scissor({x}, {y}, {width}, {height})"));
            s.scissor = [x, y, width, height];
        })
    }

    fn color_mask_indexed(&self, index: u32, mask: [bool; 4]) {
        self.with(|s| {
            s.record(format!("color_mask_indexed({index}, {mask:?})"));
            s.color_masks.insert(index, mask);
        })
    }

    fn depth_mask(&self, flag: bool) {
        self.with(|s| {
            s.record(format!("depth_mask({flag})"));
            s.depth_mask = flag;
        })
    }

    fn clear_color(&self, color: [f32; 4]) {
        self.with(|s| s.clear_color = color)
    }

    fn clear_depth(&self, depth: f32) {
        self.with(|s| s.clear_depth = depth)
    }

    fn clear(&self, mask: u32) {
        self.with(|s| {
            s.record(format!("clear({mask:#x})"));
            s.clear(mask);
        })
    }

    fn blend_func_separate(&self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32) {
        self.with(|s| {
            s.record(format!(
                "blend_func_separate({src_rgb:#x}, {dst_rgb:#x}, {src_alpha:#x}, {dst_alpha:#x})"
            ))
        })
    }

    fn blend_equation_separate(&self, mode_rgb: u32, mode_alpha: u32) {
        self.with(|s| s.record(format!("blend_equation_separate({mode_rgb:#x}, {mode_alpha:#x})")))
    }

    fn depth_func(&self, func: u32) {
        self.with(|s| s.record(format!("depth_func({func:#x})")))
    }

    fn cull_face(&self, face: u32) {
        self.with(|s| s.record(format!("cull_face({face:#x})")))
    }

    fn front_face(&self, mode: u32) {
        self.with(|s| s.record(format!("front_face({mode:#x})")))
    }

    fn polygon_mode(&self, face: u32, mode: u32) {
        self.with(|s| s.record(format!("polygon_mode({face:#x}, {mode:#x})")))
    }

    fn polygon_offset(&self, factor: f32, units: f32) {
        self.with(|s| s.record(format!("polygon_offset({factor}, {units})")))
    }

    fn line_width(&self, width: f32) {
        self.with(|s| s.record(format!("line_width({width})")))
    }

    fn provoking_vertex(&self, mode: u32) {
        self.with(|s| s.record(format!("provoking_vertex({mode:#x})")))
    }

    fn patch_parameter_i32(&self, pname: u32, value: i32) {
        self.with(|s| {
            s.record(format!("patch_parameter_i32({pname:#x}, {value})"));
            if pname == glow::PATCH_VERTICES {
                s.patch_vertices = value.max(1) as u64;
            }
        })
    }

    fn pixel_store_i32(&self, pname: u32, value: i32) {
        self.with(|s| match pname {
            glow::PACK_ALIGNMENT => s.pack_alignment = value.max(1) as usize,
            glow::UNPACK_ALIGNMENT => s.unpack_alignment = value.max(1) as usize,
            _ => {}
        })
    }

    fn flush(&self) {
        self.with(|s| s.record("flush()".to_string()))
    }

    fn finish(&self) {
        self.with(|s| s.record("finish()".to_string()))
    }

    // ── buffers ───────────────────────────────────────────────────────────

    fn create_buffer(&self) -> Result<u32, String> {
        self.with(|s| {
            let name = s.allocate("buffer")?;
            s.buffers.insert(name, Vec::new());
            Ok(name)
        })
    }

    fn delete_buffer(&self, buffer: u32) {
        self.with(|s| {
            s.record(format!("delete_buffer({buffer})"));
            s.buffers.remove(&buffer);
            s.buffer_bindings.retain(|_, b| *b != buffer);
            s.indexed_bindings.retain(|_, (b, _, _)| *b != buffer);
        })
    }

    fn bind_buffer(&self, target: u32, buffer: u32) {
        self.with(|s| {
            s.record(format!("bind_buffer({target:#x}, {buffer})"));
            let vao = s.vertex_array;
            match s.vertex_arrays.get_mut(&vao) {
                Some(v) if target == glow::ELEMENT_ARRAY_BUFFER => v.element_buffer = buffer,
                _ => {
                    s.buffer_bindings.insert(target, buffer);
                }
            }
        })
    }

    fn buffer_data(&self, target: u32, size: usize, data: Option<&[u8]>, _usage: u32) {
        self.with(|s| {
            s.record(format!("buffer_data({target:#x}, {size})"));
            let name = s.bound_buffer(target);
            match s.buffers.get_mut(&name) {
                Some(bytes) => *bytes = data.map_or_else(|| vec![0; size], <[u8]>::to_vec),
                None => s.error(glow::INVALID_OPERATION),
            }
        })
    }

    fn buffer_sub_data(&self, target: u32, offset: usize, data: &[u8]) {
        self.with(|s| {
            s.record(format!("buffer_sub_data({target:#x}, {offset}, {})", data.len()));
            let name = s.bound_buffer(target);
            match s.buffers.get_mut(&name) {
                Some(bytes) if offset + data.len() <= bytes.len() => {
                    bytes[offset..offset + data.len()].copy_from_slice(data)
                }
                _ => s.error(glow::INVALID_VALUE),
            }
        })
    }

    fn get_buffer_sub_data(&self, target: u32, offset: usize, out: &mut [u8]) {
        self.with(|s| {
            let name = s.bound_buffer(target);
            match s.buffers.get(&name) {
                Some(bytes) if offset + out.len() <= bytes.len() => {
                    out.copy_from_slice(&bytes[offset..offset + out.len()])
                }
                _ => s.error(glow::INVALID_VALUE),
            }
        })
    }

    fn copy_buffer_sub_data(
        &self,
        read_target: u32,
        write_target: u32,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    ) {
        self.with(|s| {
            s.record(format!("copy_buffer_sub_data({read_offset}, {write_offset}, {size})"));
            let (src, dst) = (s.bound_buffer(read_target), s.bound_buffer(write_target));
            let chunk = s
                .buffers
                .get(&src)
                .and_then(|b| b.get(read_offset..read_offset + size))
                .map(<[u8]>::to_vec);
            let target = s.buffers.get_mut(&dst).and_then(|b| b.get_mut(write_offset..write_offset + size));
            let copied = match (chunk, target) {
                (Some(chunk), Some(bytes)) => {
                    bytes.copy_from_slice(&chunk);
                    true
                }
                _ => false,
            };
            if !copied {
                s.error(glow::INVALID_VALUE);
            }
        })
    }

    fn bind_buffer_base(&self, target: u32, index: u32, buffer: u32) {
        self.with(|s| {
            s.record(format!("bind_buffer_base({target:#x}, {index}, {buffer})"));
            let size = s.buffers.get(&buffer).map_or(0, Vec::len);
            s.indexed_bindings.insert((target, index), (buffer, 0, size));
            s.buffer_bindings.insert(target, buffer);
        })
    }

    fn bind_buffer_range(&self, target: u32, index: u32, buffer: u32, offset: usize, size: usize) {
        self.with(|s| {
            s.record(format!("bind_buffer_range({target:#x}, {index}, {buffer}, {offset}, {size})"));
            let capacity = s.buffers.get(&buffer).map_or(0, Vec::len);
            if offset + size > capacity {
                s.error(glow::INVALID_VALUE);
                return;
            }
            s.indexed_bindings.insert((target, index), (buffer, offset, size));
            s.buffer_bindings.insert(target, buffer);
        })
    }

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&self) -> Result<u32, String> {
        self.with(|s| {
            let name = s.allocate("texture")?;
            s.textures.insert(name, Default::default());
            Ok(name)
        })
    }

    fn delete_texture(&self, texture: u32) {
        self.with(|s| {
            s.record(format!("delete_texture({texture})"));
            s.textures.remove(&texture);
            s.texture_units.retain(|_, t| *t != texture);
        })
    }

    fn active_texture(&self, unit: u32) {
        self.with(|s| s.active_unit = unit)
    }

    fn bind_texture(&self, target: u32, texture: u32) {
        self.with(|s| {
            s.record(format!("bind_texture({}, {target:#x}, {texture})", s.active_unit));
            let unit = s.active_unit;
            s.texture_units.insert((unit, target), texture);
            if texture == 0 {
                return;
            }
            match s.textures.get_mut(&texture) {
                Some(t) if t.target == 0 => t.target = target,
                Some(_) => {}
                None => s.error(glow::INVALID_OPERATION),
            }
        })
    }

    fn tex_image_2d(
        &self,
        target: u32,
        level: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        data: Option<&[u8]>,
    ) {
        self.with(|s| {
            s.record(format!("tex_image_2d({target:#x}, {level}, {internal_format:#x}, {width}, {height})"));
            let image = Image::new(internal_format, width, height, 1);
            define_image(s, target, level, image, data.map(|d| (d, format, ty)));
        })
    }

    fn tex_image_3d(
        &self,
        target: u32,
        level: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        depth: i32,
        format: u32,
        ty: u32,
        data: Option<&[u8]>,
    ) {
        self.with(|s| {
            s.record(format!(
                "tex_image_3d({target:#x}, {level}, {internal_format:#x}, {width}, {height}, {depth})"
            ));
            let image = Image::new(internal_format, width, height, depth);
            define_image(s, target, level, image, data.map(|d| (d, format, ty)));
        })
    }

    fn tex_image_2d_multisample(
        &self,
        target: u32,
        samples: i32,
        internal_format: u32,
        width: i32,
        height: i32,
    ) {
        self.with(|s| {
            s.record(format!("tex_image_2d_multisample({samples}, {internal_format:#x}, {width}, {height})"));
            if samples > s.config.max_samples {
                s.error(glow::INVALID_VALUE);
            }
            define_image(s, target, 0, Image::new(internal_format, width, height, 1), None);
        })
    }

    fn tex_sub_image_2d(
        &self,
        target: u32,
        level: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        data: &[u8],
    ) {
        self.tex_sub_image_3d(target, level, x, y, 0, width, height, 1, format, ty, data)
    }

    fn tex_sub_image_3d(
        &self,
        target: u32,
        level: i32,
        x: i32,
        y: i32,
        z: i32,
        width: i32,
        height: i32,
        depth: i32,
        format: u32,
        ty: u32,
        data: &[u8],
    ) {
        self.with(|s| {
            s.record(format!("tex_sub_image({target:#x}, {level}, {x}, {y}, {z}, {width}, {height}, {depth})"));
            let align = s.unpack_alignment;
            let px = components(format) * type_size(ty);
            let ok = s.bound_image(target, level).is_some_and(|image| {
                px == image.pixel_size() && image.unpack([x, y, z], [width, height, depth], align, data)
            });
            if !ok {
                s.error(glow::INVALID_OPERATION);
            }
        })
    }

    fn get_tex_image(&self, target: u32, level: i32, format: u32, ty: u32, out: &mut [u8]) {
        self.with(|s| {
            let align = s.pack_alignment;
            let px = components(format) * type_size(ty);
            let ok = s.bound_image(target, level).is_some_and(|image| {
                let extent = [image.width, image.height, image.depth];
                px == image.pixel_size() && image.pack([0, 0, 0], extent, align, out)
            });
            if !ok {
                s.error(glow::INVALID_OPERATION);
            }
        })
    }

    fn tex_parameter_i32(&self, target: u32, pname: u32, value: i32) {
        self.tex_parameter_f32(target, pname, value as f32)
    }

    fn tex_parameter_f32(&self, target: u32, pname: u32, value: f32) {
        self.with(|s| {
            s.record(format!("tex_parameter({target:#x}, {pname:#x}, {value})"));
            let name = s.bound_texture(target);
            match s.textures.get_mut(&name) {
                Some(texture) => {
                    texture.params.insert(pname, vec![value]);
                }
                None => s.error(glow::INVALID_OPERATION),
            }
        })
    }

    fn tex_parameter_i32_slice(&self, target: u32, pname: u32, values: &[i32]) {
        self.with(|s| {
            s.record(format!("tex_parameter({target:#x}, {pname:#x}, {values:?})"));
            let name = s.bound_texture(target);
            if let Some(texture) = s.textures.get_mut(&name) {
                texture.params.insert(pname, values.iter().map(|v| *v as f32).collect());
            }
        })
    }

    fn generate_mipmap(&self, target: u32) {
        self.with(|s| {
            s.record(format!("generate_mipmap({target:#x})"));
            s.generate_mipmap(target);
        })
    }

    // ── renderbuffers ─────────────────────────────────────────────────────

    fn create_renderbuffer(&self) -> Result<u32, String> {
        self.with(|s| {
            let name = s.allocate("renderbuffer")?;
            s.renderbuffers.insert(name, None);
            Ok(name)
        })
    }

    fn delete_renderbuffer(&self, renderbuffer: u32) {
        self.with(|s| {
            s.record(format!("delete_renderbuffer({renderbuffer})"));
            s.renderbuffers.remove(&renderbuffer);
        })
    }

    fn bind_renderbuffer(&self, renderbuffer: u32) {
        self.with(|s| s.renderbuffer = renderbuffer)
    }

    fn renderbuffer_storage(&self, samples: i32, internal_format: u32, width: i32, height: i32) {
        self.with(|s| {
            s.record(format!("renderbuffer_storage({samples}, {internal_format:#x}, {width}, {height})"));
            if samples > s.config.max_samples {
                s.error(glow::INVALID_VALUE);
                return;
            }
            let bound = s.renderbuffer;
            match s.renderbuffers.get_mut(&bound) {
                Some(slot) => *slot = Some(Image::new(internal_format, width, height, 1)),
                None => s.error(glow::INVALID_OPERATION),
            }
        })
    }

    // ── samplers ──────────────────────────────────────────────────────────

    fn create_sampler(&self) -> Result<u32, String> {
        self.with(|s| {
            let name = s.allocate("sampler")?;
            s.samplers.insert(name, Default::default());
            Ok(name)
        })
    }

    fn delete_sampler(&self, sampler: u32) {
        self.with(|s| {
            s.record(format!("delete_sampler({sampler})"));
            s.samplers.remove(&sampler);
            s.sampler_units.retain(|_, b| *b != sampler);
        })
    }

    fn bind_sampler(&self, unit: u32, sampler: u32) {
        self.with(|s| {
            s.record(format!("bind_sampler({unit}, {sampler})"));
            s.sampler_units.insert(unit, sampler);
        })
    }

    fn sampler_parameter_i32(&self, sampler: u32, pname: u32, value: i32) {
        self.sampler_parameter_f32_slice(sampler, pname, &[value as f32])
    }

    fn sampler_parameter_f32(&self, sampler: u32, pname: u32, value: f32) {
        self.sampler_parameter_f32_slice(sampler, pname, &[value])
    }

    fn sampler_parameter_f32_slice(&self, sampler: u32, pname: u32, values: &[f32]) {
        self.with(|s| match s.samplers.get_mut(&sampler) {
            Some(params) => {
                params.insert(pname, values.to_vec());
            }
            None => s.error(glow::INVALID_OPERATION),
        })
    }

    // ── queries ───────────────────────────────────────────────────────────

    fn create_query(&self) -> Result<u32, String> {
        self.with(|s| {
            let name = s.allocate("query")?;
            s.queries.insert(name, QueryData { result: 0, started: None });
            Ok(name)
        })
    }

    fn delete_query(&self, query: u32) {
        self.with(|s| {
            s.record(format!("delete_query({query})"));
            s.queries.remove(&query);
            s.active_queries.retain(|_, q| *q != query);
        })
    }

    fn begin_query(&self, target: u32, query: u32) {
        self.with(|s| {
            s.record(format!("begin_query({target:#x}, {query})"));
            if s.active_queries.contains_key(&target) {
                s.error(glow::INVALID_OPERATION);
                return;
            }
            match s.queries.get_mut(&query) {
                Some(data) => {
                    data.result = 0;
                    data.started = Some(Instant::now());
                    s.active_queries.insert(target, query);
                }
                None => s.error(glow::INVALID_OPERATION),
            }
        })
    }

    fn end_query(&self, target: u32) {
        self.with(|s| {
            s.record(format!("end_query({target:#x})"));
            let Some(query) = s.active_queries.remove(&target) else {
                s.error(glow::INVALID_OPERATION);
                return;
            };
            if let Some(data) = s.queries.get_mut(&query) {
                if target == glow::TIME_ELAPSED {
                    data.result = data.started.map_or(0, |t| t.elapsed().as_nanos() as u64);
                }
            }
        })
    }

    fn get_query_result(&self, query: u32) -> u64 {
        self.with(|s| s.queries.get(&query).map_or(0, |q| q.result))
    }

    // ── framebuffers ──────────────────────────────────────────────────────

    fn create_framebuffer(&self) -> Result<u32, String> {
        self.with(|s| {
            let name = s.allocate("framebuffer")?;
            s.framebuffers.insert(name, FramebufferData::default());
            Ok(name)
        })
    }

    fn delete_framebuffer(&self, framebuffer: u32) {
        if framebuffer == 0 {
            return;
        }
        self.with(|s| {
            s.record(format!("delete_framebuffer({framebuffer})"));
            s.framebuffers.remove(&framebuffer);
            if s.draw_framebuffer == framebuffer {
                s.draw_framebuffer = 0;
            }
            if s.read_framebuffer == framebuffer {
                s.read_framebuffer = 0;
            }
        })
    }

    fn bind_framebuffer(&self, target: u32, framebuffer: u32) {
        self.with(|s| {
            s.record(format!("bind_framebuffer({target:#x}, {framebuffer})"));
            match target {
                glow::DRAW_FRAMEBUFFER => s.draw_framebuffer = framebuffer,
                glow::READ_FRAMEBUFFER => s.read_framebuffer = framebuffer,
                _ => {
                    s.draw_framebuffer = framebuffer;
                    s.read_framebuffer = framebuffer;
                }
            }
        })
    }

    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: u32,
        level: i32,
    ) {
        self.with(|s| {
            s.record(format!("framebuffer_texture_2d({attachment:#x}, {texture_target:#x}, {texture}, {level})"));
            let attached = AttachRef::Texture { name: texture, target: Some(texture_target), level, layer: 0 };
            let fb = s.framebuffer_target(target);
            match s.framebuffers.get_mut(&fb).filter(|_| fb != 0) {
                Some(data) => {
                    data.attachments.insert(attachment, attached);
                }
                None => s.error(glow::INVALID_OPERATION),
            }
        })
    }

    fn framebuffer_texture_layer(
        &self,
        target: u32,
        attachment: u32,
        texture: u32,
        level: i32,
        layer: i32,
    ) {
        self.with(|s| {
            s.record(format!("framebuffer_texture_layer({attachment:#x}, {texture}, {level}, {layer})"));
            let attached = AttachRef::Texture { name: texture, target: None, level, layer };
            let fb = s.framebuffer_target(target);
            match s.framebuffers.get_mut(&fb).filter(|_| fb != 0) {
                Some(data) => {
                    data.attachments.insert(attachment, attached);
                }
                None => s.error(glow::INVALID_OPERATION),
            }
        })
    }

    fn framebuffer_renderbuffer(&self, target: u32, attachment: u32, renderbuffer: u32) {
        self.with(|s| {
            s.record(format!("framebuffer_renderbuffer({attachment:#x}, {renderbuffer})"));
            let fb = s.framebuffer_target(target);
            match s.framebuffers.get_mut(&fb).filter(|_| fb != 0) {
                Some(data) => {
                    data.attachments.insert(attachment, AttachRef::Renderbuffer(renderbuffer));
                }
                None => s.error(glow::INVALID_OPERATION),
            }
        })
    }

    fn check_framebuffer_status(&self, target: u32) -> u32 {
        self.with(|s| {
            let fb = s.framebuffer_target(target);
            s.framebuffer_status(fb)
        })
    }

    fn draw_buffers(&self, buffers: &[u32]) {
        self.with(|s| {
            s.record(format!("draw_buffers({buffers:?})"));
            let fb = s.draw_framebuffer;
            if let Some(data) = s.framebuffers.get_mut(&fb) {
                data.draw_buffers = buffers.to_vec();
            }
        })
    }

    fn read_buffer(&self, source: u32) {
        self.with(|s| {
            let fb = s.read_framebuffer;
            if let Some(data) = s.framebuffers.get_mut(&fb) {
                data.read_buffer = source;
            }
        })
    }

    fn read_pixels(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        out: &mut [u8],
    ) {
        self.with(|s| {
            s.record(format!("read_pixels({x}, {y}, {width}, {height})"));
            let source = s.read_source(format);
            let fb = s.read_framebuffer;
            let align = s.pack_alignment;
            let px = components(format) * type_size(ty);
            let ok = s.attachment_image(fb, source).is_some_and(|(image, slice)| {
                px == image.pixel_size() && image.pack([x, y, slice], [width, height, 1], align, out)
            });
            if !ok {
                s.error(glow::INVALID_OPERATION);
            }
        })
    }

    fn blit_framebuffer(&self, src: [i32; 4], dst: [i32; 4], mask: u32, filter: u32) {
        self.with(|s| {
            s.record(format!("blit_framebuffer({src:?}, {dst:?}, {mask:#x}, {filter:#x})"));
            if !s.blit(src, dst, mask) {
                s.error(glow::INVALID_OPERATION);
            }
        })
    }

    // ── shaders and programs ──────────────────────────────────────────────

    fn create_shader(&self, stage: u32) -> Result<u32, String> {
        self.with(|s| {
            let name = s.allocate("shader")?;
            s.shaders.insert(name, ShaderData { stage, source: String::new(), compiled: None });
            Ok(name)
        })
    }

    fn delete_shader(&self, shader: u32) {
        self.with(|s| {
            s.record(format!("delete_shader({shader})"));
            s.shaders.remove(&shader);
        })
    }

    fn shader_source(&self, shader: u32, source: &str) {
        self.with(|s| {
            if let Some(data) = s.shaders.get_mut(&shader) {
                data.source = source.to_string();
            }
        })
    }

    fn compile_shader(&self, shader: u32) {
        self.with(|s| {
            s.record(format!("compile_shader({shader})"));
            if let Some(data) = s.shaders.get_mut(&shader) {
                data.compiled = Some(compile(&data.source));
            }
        })
    }

    fn shader_compile_status(&self, shader: u32) -> bool {
        self.with(|s| matches!(s.shaders.get(&shader).and_then(|d| d.compiled.as_ref()), Some(Ok(_))))
    }

    fn shader_info_log(&self, shader: u32) -> String {
        self.with(|s| match s.shaders.get(&shader).and_then(|d| d.compiled.as_ref()) {
            Some(Err(log)) => log.clone(),
            _ => String::new(),
        })
    }

    fn create_program(&self) -> Result<u32, String> {
        self.with(|s| {
            let name = s.allocate("program")?;
            s.programs.insert(name, ProgramData::default());
            Ok(name)
        })
    }

    fn delete_program(&self, program: u32) {
        self.with(|s| {
            s.record(format!("delete_program({program})"));
            s.programs.remove(&program);
            s.uniform_values.retain(|(p, _), _| *p != program);
            if s.program == program {
                s.program = 0;
            }
        })
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        self.with(|s| {
            if let Some(data) = s.programs.get_mut(&program) {
                data.shaders.push(shader);
            }
        })
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        self.with(|s| {
            if let Some(data) = s.programs.get_mut(&program) {
                data.shaders.retain(|sh| *sh != shader);
            }
        })
    }

    fn transform_feedback_varyings(&self, program: u32, varyings: &[&str], _buffer_mode: u32) {
        self.with(|s| {
            if let Some(data) = s.programs.get_mut(&program) {
                data.varyings = varyings.iter().map(|v| v.to_string()).collect();
            }
        })
    }

    fn link_program(&self, program: u32) {
        self.with(|s| {
            s.record(format!("link_program({program})"));
            let version = s.config.version.0 * 100 + s.config.version.1 * 10;
            let Some(data) = s.programs.get(&program) else {
                s.error(glow::INVALID_VALUE);
                return;
            };
            let mut stages = Vec::new();
            let mut failure = None;
            for shader in &data.shaders {
                match s.shaders.get(shader).map(|sh| (sh.stage, sh.compiled.as_ref())) {
                    Some((stage, Some(Ok(iface)))) => stages.push((stage, iface)),
                    _ => failure = Some(format!("error: shader {shader} is not compiled")),
                }
            }
            let result = match failure {
                Some(log) => Err(log),
                None => link(&stages, &data.varyings, version),
            };
            if let Some(data) = s.programs.get_mut(&program) {
                data.linked = Some(result);
            }
        })
    }

    fn program_link_status(&self, program: u32) -> bool {
        self.with(|s| s.programs.get(&program).and_then(ProgramData::linked).is_some())
    }

    fn program_info_log(&self, program: u32) -> String {
        self.with(|s| match s.programs.get(&program).and_then(|p| p.linked.as_ref()) {
            Some(Err(log)) => log.clone(),
            _ => String::new(),
        })
    }

    fn use_program(&self, program: u32) {
        self.with(|s| {
            s.record(format!("use_program({program})"));
            s.program = program;
        })
    }

    fn get_program_parameter_i32(&self, program: u32, pname: u32) -> i32 {
        self.with(|s| {
            let Some(linked) = s.programs.get(&program).and_then(ProgramData::linked) else {
                return 0;
            };
            match pname {
                glow::ACTIVE_ATTRIBUTES => linked.attributes.len() as i32,
                glow::ACTIVE_UNIFORMS => linked.uniforms.len() as i32,
                glow::ACTIVE_UNIFORM_BLOCKS => linked.blocks.len() as i32,
                glow::TRANSFORM_FEEDBACK_VARYINGS => linked.varyings.len() as i32,
                glow::GEOMETRY_INPUT_TYPE => linked.geometry.map_or(0, |g| g.0 as i32),
                glow::GEOMETRY_OUTPUT_TYPE => linked.geometry.map_or(0, |g| g.1 as i32),
                glow::GEOMETRY_VERTICES_OUT => linked.geometry.map_or(0, |g| g.2),
                glow::LINK_STATUS => 1,
                _ => 0,
            }
        })
    }

    // ── reflection ────────────────────────────────────────────────────────

    fn active_attribute_count(&self, program: u32) -> u32 {
        self.get_program_parameter_i32(program, glow::ACTIVE_ATTRIBUTES) as u32
    }

    fn get_active_attribute(&self, program: u32, index: u32) -> Option<ActiveInfo> {
        self.with(|s| {
            let linked = s.programs.get(&program)?.linked()?;
            linked.attributes.get(index as usize).map(|(info, _)| info.clone())
        })
    }

    fn get_attrib_location(&self, program: u32, name: &str) -> i32 {
        self.with(|s| {
            let Some(linked) = s.programs.get(&program).and_then(ProgramData::linked) else {
                return -1;
            };
            linked
                .attributes
                .iter()
                .find(|(info, _)| split_subscript(&info.name).0 == name)
                .map_or(-1, |(_, location)| *location)
        })
    }

    fn active_uniform_count(&self, program: u32) -> u32 {
        self.get_program_parameter_i32(program, glow::ACTIVE_UNIFORMS) as u32
    }

    fn get_active_uniform(&self, program: u32, index: u32) -> Option<ActiveInfo> {
        self.with(|s| {
            let linked = s.programs.get(&program)?.linked()?;
            linked.uniforms.get(index as usize).map(|(info, _)| info.clone())
        })
    }

    fn get_uniform_location(&self, program: u32, name: &str) -> i32 {
        let (base, index) = split_subscript(name);
        self.with(|s| {
            let Some(linked) = s.programs.get(&program).and_then(ProgramData::linked) else {
                return -1;
            };
            linked
                .uniforms
                .iter()
                .find(|(info, _)| split_subscript(&info.name).0 == base)
                .filter(|(info, location)| *location >= 0 && index < info.size)
                .map_or(-1, |(_, location)| location + index)
        })
    }

    fn active_uniform_block_count(&self, program: u32) -> u32 {
        self.get_program_parameter_i32(program, glow::ACTIVE_UNIFORM_BLOCKS) as u32
    }

    fn get_active_uniform_block_name(&self, program: u32, index: u32) -> String {
        self.with(|s| {
            s.programs
                .get(&program)
                .and_then(ProgramData::linked)
                .and_then(|l| l.blocks.get(index as usize))
                .map(|b| b.name.clone())
                .unwrap_or_default()
        })
    }

    fn get_active_uniform_block_parameter_i32(&self, program: u32, index: u32, pname: u32) -> i32 {
        self.with(|s| {
            let block = s
                .programs
                .get(&program)
                .and_then(ProgramData::linked)
                .and_then(|l| l.blocks.get(index as usize));
            match (block, pname) {
                (Some(b), glow::UNIFORM_BLOCK_DATA_SIZE) => b.size,
                (Some(b), glow::UNIFORM_BLOCK_BINDING) => b.binding as i32,
                _ => 0,
            }
        })
    }

    fn uniform_block_binding(&self, program: u32, index: u32, binding: u32) {
        self.with(|s| {
            s.record(format!("uniform_block_binding({program}, {index}, {binding})"));
            let block = s
                .programs
                .get_mut(&program)
                .and_then(ProgramData::linked_mut)
                .and_then(|l| l.blocks.get_mut(index as usize));
            match block {
                Some(block) => block.binding = binding,
                None => s.error(glow::INVALID_VALUE),
            }
        })
    }

    fn transform_feedback_varying_count(&self, program: u32) -> u32 {
        self.get_program_parameter_i32(program, glow::TRANSFORM_FEEDBACK_VARYINGS) as u32
    }

    fn get_transform_feedback_varying(&self, program: u32, index: u32) -> Option<ActiveInfo> {
        self.with(|s| {
            let linked = s.programs.get(&program)?.linked()?;
            linked.varyings.get(index as usize).cloned()
        })
    }

    // ── subroutines ───────────────────────────────────────────────────────

    fn get_program_stage_i32(&self, program: u32, stage: u32, pname: u32) -> Result<i32, String> {
        self.with(|s| {
            subroutines_supported(s)?;
            let subs = s
                .programs
                .get(&program)
                .and_then(ProgramData::linked)
                .and_then(|l| l.subroutines.iter().find(|x| x.stage == stage));
            Ok(match (subs, pname) {
                (Some(x), super::ACTIVE_SUBROUTINES) => x.subroutines.len() as i32,
                (Some(x), super::ACTIVE_SUBROUTINE_UNIFORMS)
                | (Some(x), super::ACTIVE_SUBROUTINE_UNIFORM_LOCATIONS) => x.uniforms.len() as i32,
                _ => 0,
            })
        })
    }

    fn get_active_subroutine_name(&self, program: u32, stage: u32, index: u32) -> Result<String, String> {
        self.with(|s| {
            subroutines_supported(s)?;
            Ok(s.programs
                .get(&program)
                .and_then(ProgramData::linked)
                .and_then(|l| l.subroutines.iter().find(|x| x.stage == stage))
                .and_then(|x| x.subroutines.get(index as usize).cloned())
                .unwrap_or_default())
        })
    }

    fn get_active_subroutine_uniform_name(
        &self,
        program: u32,
        stage: u32,
        index: u32,
    ) -> Result<String, String> {
        self.with(|s| {
            subroutines_supported(s)?;
            Ok(s.programs
                .get(&program)
                .and_then(ProgramData::linked)
                .and_then(|l| l.subroutines.iter().find(|x| x.stage == stage))
                .and_then(|x| x.uniforms.get(index as usize).cloned())
                .unwrap_or_default())
        })
    }

    fn uniform_subroutines(&self, stage: u32, indices: &[u32]) -> Result<(), String> {
        self.with(|s| {
            subroutines_supported(s)?;
            s.record(format!("uniform_subroutines({stage:#x}, {indices:?})"));
            let program = s.program;
            let subs = s
                .programs
                .get_mut(&program)
                .and_then(ProgramData::linked_mut)
                .and_then(|l| l.subroutines.iter_mut().find(|x| x.stage == stage));
            match subs {
                Some(x) if x.uniforms.len() == indices.len() => x.selected = indices.to_vec(),
                _ => s.error(glow::INVALID_OPERATION),
            }
            Ok(())
        })
    }

    // ── uniform values ────────────────────────────────────────────────────

    fn uniform_write(&self, location: i32, gl_type: u32, count: i32, data: &[u8]) -> Result<(), String> {
        self.with(|s| {
            s.record(format!("uniform_write({location}, {gl_type:#x}, {count})"));
            if location < 0 {
                return Ok(());
            }
            let program = s.program;
            let Some(ty) = types::describe(gl_type).filter(|_| program != 0) else {
                s.error(glow::INVALID_OPERATION);
                return Ok(());
            };
            let size = ty.element_size();
            for (i, chunk) in data.chunks_exact(size).take(count.max(0) as usize).enumerate() {
                s.uniform_values.insert((program, location + i as i32), chunk.to_vec());
            }
            Ok(())
        })
    }

    fn uniform_read(&self, program: u32, location: i32, _gl_type: u32, out: &mut [u8]) -> Result<(), String> {
        self.with(|s| {
            out.fill(0);
            if let Some(value) = s.uniform_values.get(&(program, location)) {
                let n = value.len().min(out.len());
                out[..n].copy_from_slice(&value[..n]);
            }
            Ok(())
        })
    }

    // ── vertex arrays ─────────────────────────────────────────────────────

    fn create_vertex_array(&self) -> Result<u32, String> {
        self.with(|s| {
            let name = s.allocate("vertex_array")?;
            s.vertex_arrays.insert(name, Default::default());
            Ok(name)
        })
    }

    fn delete_vertex_array(&self, vertex_array: u32) {
        self.with(|s| {
            s.record(format!("delete_vertex_array({vertex_array})"));
            s.vertex_arrays.remove(&vertex_array);
            if s.vertex_array == vertex_array {
                s.vertex_array = 0;
            }
        })
    }

    fn bind_vertex_array(&self, vertex_array: u32) {
        self.with(|s| {
            s.record(format!("bind_vertex_array({vertex_array})"));
            s.vertex_array = vertex_array;
        })
    }

    fn enable_vertex_attrib_array(&self, location: u32) {
        self.with(|s| match attrib_slot(s, location) {
            Some(slot) => slot.enabled = true,
            None => s.error(glow::INVALID_OPERATION),
        })
    }

    fn vertex_attrib_pointer(
        &self,
        location: u32,
        size: i32,
        ty: u32,
        normalized: bool,
        stride: i32,
        offset: usize,
        kind: AttribKind,
    ) {
        self.with(|s| {
            s.record(format!("vertex_attrib_pointer({location}, {size}, {ty:#x}, {stride}, {offset}, {kind:?})"));
            let buffer = s.bound_buffer(glow::ARRAY_BUFFER);
            match attrib_slot(s, location) {
                Some(slot) => {
                    *slot = VertexAttrib { buffer, size, ty, normalized, stride, offset, kind, ..slot.clone() }
                }
                None => s.error(glow::INVALID_OPERATION),
            }
        })
    }

    fn vertex_attrib_divisor(&self, location: u32, divisor: u32) {
        self.with(|s| match attrib_slot(s, location) {
            Some(slot) => slot.divisor = divisor,
            None => s.error(glow::INVALID_OPERATION),
        })
    }

    // ── draws ─────────────────────────────────────────────────────────────

    fn draw_arrays_instanced(&self, mode: u32, first: i32, count: i32, instances: i32) {
        self.with(|s| {
            s.record(format!("draw_arrays_instanced({mode:#x}, {first}, {count}, {instances})"));
            s.count_draw(mode, count.max(0) as u64, instances.max(0) as u64);
        })
    }

    fn draw_elements_instanced(
        &self,
        mode: u32,
        count: i32,
        index_type: u32,
        offset: usize,
        instances: i32,
    ) {
        self.with(|s| {
            s.record(format!(
                "draw_elements_instanced({mode:#x}, {count}, {index_type:#x}, {offset}, {instances})"
            ));
            if s.bound_buffer(glow::ELEMENT_ARRAY_BUFFER) == 0 {
                s.error(glow::INVALID_OPERATION);
                return;
            }
            s.count_draw(mode, count.max(0) as u64, instances.max(0) as u64);
        })
    }

    fn draw_arrays_indirect(&self, mode: u32, offset: usize) {
        self.with(|s| {
            s.record(format!("draw_arrays_indirect({mode:#x}, {offset})"));
            let name = s.bound_buffer(glow::DRAW_INDIRECT_BUFFER);
            let command = s.buffers.get(&name).and_then(|b| b.get(offset..)).and_then(read_u32s::<4>);
            match command {
                Some([count, instances, _, _]) => s.count_draw(mode, count as u64, instances as u64),
                None => s.error(glow::INVALID_OPERATION),
            }
        })
    }

    fn draw_elements_indirect(&self, mode: u32, index_type: u32, offset: usize) {
        self.with(|s| {
            s.record(format!("draw_elements_indirect({mode:#x}, {index_type:#x}, {offset})"));
            let name = s.bound_buffer(glow::DRAW_INDIRECT_BUFFER);
            let command = s.buffers.get(&name).and_then(|b| b.get(offset..)).and_then(read_u32s::<5>);
            match command {
                Some([count, instances, ..]) => s.count_draw(mode, count as u64, instances as u64),
                None => s.error(glow::INVALID_OPERATION),
            }
        })
    }

    fn begin_transform_feedback(&self, primitive: u32) {
        self.with(|s| {
            s.record(format!("begin_transform_feedback({primitive:#x})"));
            if s.transform_feedback.replace(primitive).is_some() {
                s.error(glow::INVALID_OPERATION);
            }
        })
    }

    fn end_transform_feedback(&self) {
        self.with(|s| {
            s.record("end_transform_feedback()".to_string());
            if s.transform_feedback.take().is_none() {
                s.error(glow::INVALID_OPERATION);
            }
        })
    }
}

fn subroutines_supported(s: &HeadlessState) -> Result<(), String> {
    match s.config.version {
        (major, _) if major >= 4 => Ok(()),
        (major, minor) => Err(format!("shader subroutines need a 4.0 context, this one is {major}.{minor}")),
    }
}
