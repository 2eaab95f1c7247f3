//! Driver state owned by [`HeadlessBackend`](super::HeadlessBackend).

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use super::compiler::{Interface, Linked};
use super::HeadlessConfig;
use crate::gl::AttribKind;

// ── pixel formats ─────────────────────────────────────────────────────────

pub(crate) fn components(format: u32) -> usize {
    match format {
        glow::RED | glow::RED_INTEGER | glow::DEPTH_COMPONENT | glow::DEPTH_STENCIL => 1,
        glow::RG | glow::RG_INTEGER => 2,
        glow::RGB | glow::RGB_INTEGER => 3,
        _ => 4,
    }
}

pub(crate) fn type_size(ty: u32) -> usize {
    match ty {
        glow::BYTE | glow::UNSIGNED_BYTE => 1,
        glow::SHORT | glow::UNSIGNED_SHORT | glow::HALF_FLOAT => 2,
        glow::DOUBLE => 8,
        _ => 4,
    }
}

/// Storage layout `(components, component type)` of an internal format.
pub(crate) fn internal_layout(internal: u32) -> (usize, u32) {
    match internal {
        glow::R8 | glow::R8UI => (1, glow::UNSIGNED_BYTE),
        glow::RG8 | glow::RG8UI => (2, glow::UNSIGNED_BYTE),
        glow::RGB8 | glow::RGB8UI => (3, glow::UNSIGNED_BYTE),
        glow::RGBA8 | glow::RGBA8UI | glow::SRGB8_ALPHA8 => (4, glow::UNSIGNED_BYTE),
        glow::R8I | glow::R8_SNORM => (1, glow::BYTE),
        glow::RG8I | glow::RG8_SNORM => (2, glow::BYTE),
        glow::RGB8I | glow::RGB8_SNORM => (3, glow::BYTE),
        glow::RGBA8I | glow::RGBA8_SNORM => (4, glow::BYTE),
        glow::R16 | glow::R16UI => (1, glow::UNSIGNED_SHORT),
        glow::RG16 | glow::RG16UI => (2, glow::UNSIGNED_SHORT),
        glow::RGB16 | glow::RGB16UI => (3, glow::UNSIGNED_SHORT),
        glow::RGBA16 | glow::RGBA16UI => (4, glow::UNSIGNED_SHORT),
        glow::R16I | glow::R16_SNORM => (1, glow::SHORT),
        glow::RG16I | glow::RG16_SNORM => (2, glow::SHORT),
        glow::RGB16I | glow::RGB16_SNORM => (3, glow::SHORT),
        glow::RGBA16I | glow::RGBA16_SNORM => (4, glow::SHORT),
        glow::R16F => (1, glow::HALF_FLOAT),
        glow::RG16F => (2, glow::HALF_FLOAT),
        glow::RGB16F => (3, glow::HALF_FLOAT),
        glow::RGBA16F => (4, glow::HALF_FLOAT),
        glow::R32F => (1, glow::FLOAT),
        glow::RG32F => (2, glow::FLOAT),
        glow::RGB32F => (3, glow::FLOAT),
        glow::RGBA32F => (4, glow::FLOAT),
        glow::R32UI => (1, glow::UNSIGNED_INT),
        glow::RG32UI => (2, glow::UNSIGNED_INT),
        glow::RGB32UI => (3, glow::UNSIGNED_INT),
        glow::RGBA32UI => (4, glow::UNSIGNED_INT),
        glow::R32I => (1, glow::INT),
        glow::RG32I => (2, glow::INT),
        glow::RGB32I => (3, glow::INT),
        glow::RGBA32I => (4, glow::INT),
        // depth is kept as float whatever the requested precision
        glow::DEPTH_COMPONENT
        | glow::DEPTH_COMPONENT16
        | glow::DEPTH_COMPONENT24
        | glow::DEPTH_COMPONENT32F
        | glow::DEPTH24_STENCIL8 => (1, glow::FLOAT),
        _ => (4, glow::UNSIGNED_BYTE),
    }
}

fn f16_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xff) as i32 - 127 + 15;
    let mantissa = ((bits & 0x7f_ffff) >> 13) as u16;
    if value == 0.0 || exp <= 0 {
        sign
    } else if exp >= 31 {
        sign | 0x7c00
    } else {
        sign | ((exp as u16) << 10) | mantissa
    }
}

fn encode_component(ty: u32, value: f32, out: &mut Vec<u8>) {
    match ty {
        glow::UNSIGNED_BYTE => out.push((value.clamp(0.0, 1.0) * 255.0).round() as u8),
        glow::BYTE => out.push((value.clamp(-1.0, 1.0) * 127.0).round() as i8 as u8),
        glow::UNSIGNED_SHORT => {
            out.extend(((value.clamp(0.0, 1.0) * 65535.0).round() as u16).to_ne_bytes())
        }
        glow::SHORT => out.extend(((value.clamp(-1.0, 1.0) * 32767.0).round() as i16).to_ne_bytes()),
        glow::HALF_FLOAT => out.extend(f16_bits(value).to_ne_bytes()),
        glow::INT => out.extend((value as i32).to_ne_bytes()),
        glow::UNSIGNED_INT => out.extend((value as u32).to_ne_bytes()),
        _ => out.extend(value.to_ne_bytes()),
    }
}

fn round_up(value: usize, align: usize) -> usize {
    value.div_ceil(align.max(1)) * align.max(1)
}

// ── images ────────────────────────────────────────────────────────────────

/// One texture level, renderbuffer or screen surface, stored tightly packed.
#[derive(Debug, Clone)]
pub(crate) struct Image {
    pub width: i32,
    pub height: i32,
    pub depth: i32,
    pub components: usize,
    pub ty: u32,
    pub data: Vec<u8>,
}

impl Image {
    pub(crate) fn new(internal: u32, width: i32, height: i32, depth: i32) -> Self {
        let (components, ty) = internal_layout(internal);
        let depth = depth.max(1);
        let texels = (width.max(0) * height.max(0) * depth) as usize;
        Self {
            width,
            height,
            depth,
            components,
            ty,
            data: vec![0; texels * components * type_size(ty)],
        }
    }

    pub(crate) fn pixel_size(&self) -> usize {
        self.components * type_size(self.ty)
    }

    fn offset(&self, x: i32, y: i32, z: i32) -> usize {
        ((z * self.height + y) * self.width + x) as usize * self.pixel_size()
    }

    fn contains(&self, origin: [i32; 3], extent: [i32; 3]) -> bool {
        let dims = [self.width, self.height, self.depth];
        (0..3).all(|i| origin[i] >= 0 && extent[i] >= 0 && origin[i] + extent[i] <= dims[i])
    }

    /// Copies client rows (padded to `align`) into the box at `origin`.
    pub(crate) fn unpack(&mut self, origin: [i32; 3], extent: [i32; 3], align: usize, src: &[u8]) -> bool {
        if !self.contains(origin, extent) {
            return false;
        }
        let row = extent[0] as usize * self.pixel_size();
        let stride = round_up(row, align);
        let rows = (extent[1] * extent[2]) as usize;
        if rows > 0 && src.len() < stride * (rows - 1) + row {
            return false;
        }
        for z in 0..extent[2] {
            for y in 0..extent[1] {
                let from = (z * extent[1] + y) as usize * stride;
                let to = self.offset(origin[0], origin[1] + y, origin[2] + z);
                self.data[to..to + row].copy_from_slice(&src[from..from + row]);
            }
        }
        true
    }

    /// Copies the box at `origin` into client rows padded to `align`.
    pub(crate) fn pack(&self, origin: [i32; 3], extent: [i32; 3], align: usize, out: &mut [u8]) -> bool {
        if !self.contains(origin, extent) {
            return false;
        }
        let row = extent[0] as usize * self.pixel_size();
        let stride = round_up(row, align);
        let rows = (extent[1] * extent[2]) as usize;
        if rows > 0 && out.len() < stride * (rows - 1) + row {
            return false;
        }
        for z in 0..extent[2] {
            for y in 0..extent[1] {
                let from = self.offset(origin[0], origin[1] + y, origin[2] + z);
                let to = (z * extent[1] + y) as usize * stride;
                out[to..to + row].copy_from_slice(&self.data[from..from + row]);
            }
        }
        true
    }

    /// Encodes a clear value in this image's storage type.
    pub(crate) fn encode(&self, values: [f32; 4]) -> Vec<u8> {
        let mut pixel = Vec::with_capacity(self.pixel_size());
        for value in values.iter().take(self.components) {
            encode_component(self.ty, *value, &mut pixel);
        }
        pixel
    }

    /// Writes `pixel` into `rect` (`x, y, w, h`) of one slice, honouring a
    /// per-component write mask.
    pub(crate) fn fill(&mut self, rect: [i32; 4], slice: i32, pixel: &[u8], mask: [bool; 4]) {
        if slice < 0 || slice >= self.depth {
            return;
        }
        let x0 = rect[0].max(0);
        let y0 = rect[1].max(0);
        let x1 = (rect[0] + rect[2]).min(self.width);
        let y1 = (rect[1] + rect[3]).min(self.height);
        let width = type_size(self.ty);
        for y in y0..y1 {
            for x in x0..x1 {
                let at = self.offset(x, y, slice);
                for c in (0..self.components).filter(|c| mask[*c]) {
                    let range = c * width..(c + 1) * width;
                    self.data[at + range.start..at + range.end].copy_from_slice(&pixel[range]);
                }
            }
        }
    }
}

/// Nearest-neighbour copy between two rectangles (`x0, y0, x1, y1`).
pub(crate) fn copy_scaled(
    src: &Image,
    src_rect: [i32; 4],
    src_slice: i32,
    dst: &mut Image,
    dst_rect: [i32; 4],
    dst_slice: i32,
) -> bool {
    let px = src.pixel_size();
    if px != dst.pixel_size() {
        return false;
    }
    let (sw, sh) = (src_rect[2] - src_rect[0], src_rect[3] - src_rect[1]);
    let (dw, dh) = (dst_rect[2] - dst_rect[0], dst_rect[3] - dst_rect[1]);
    if sw <= 0 || sh <= 0 || dw <= 0 || dh <= 0 {
        return true;
    }
    for dy in 0..dh {
        for dx in 0..dw {
            let (tx, ty) = (dst_rect[0] + dx, dst_rect[1] + dy);
            let sx = src_rect[0] + dx * sw / dw;
            let sy = src_rect[1] + dy * sh / dh;
            let inside_dst = tx >= 0 && ty >= 0 && tx < dst.width && ty < dst.height;
            let inside_src = sx >= 0 && sy >= 0 && sx < src.width && sy < src.height;
            if inside_dst && inside_src {
                let from = src.offset(sx, sy, src_slice);
                let to = dst.offset(tx, ty, dst_slice);
                dst.data[to..to + px].copy_from_slice(&src.data[from..from + px]);
            }
        }
    }
    true
}

// ── objects ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct TextureData {
    /// First target the texture was bound to.
    pub target: u32,
    /// Keyed by `(image target, level)`; cube faces use the face target.
    pub images: HashMap<(u32, i32), Image>,
    pub params: HashMap<u32, Vec<f32>>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum AttachRef {
    Texture { name: u32, target: Option<u32>, level: i32, layer: i32 },
    Renderbuffer(u32),
}

#[derive(Debug)]
pub(crate) struct FramebufferData {
    pub attachments: HashMap<u32, AttachRef>,
    pub draw_buffers: Vec<u32>,
    pub read_buffer: u32,
}

impl Default for FramebufferData {
    fn default() -> Self {
        Self {
            attachments: HashMap::new(),
            draw_buffers: vec![glow::COLOR_ATTACHMENT0],
            read_buffer: glow::COLOR_ATTACHMENT0,
        }
    }
}

#[derive(Debug)]
pub(crate) struct ShaderData {
    pub stage: u32,
    pub source: String,
    pub compiled: Option<Result<Interface, String>>,
}

#[derive(Debug, Default)]
pub(crate) struct ProgramData {
    pub shaders: Vec<u32>,
    pub varyings: Vec<String>,
    pub linked: Option<Result<Linked, String>>,
}

impl ProgramData {
    pub(crate) fn linked(&self) -> Option<&Linked> {
        self.linked.as_ref().and_then(|l| l.as_ref().ok())
    }

    pub(crate) fn linked_mut(&mut self) -> Option<&mut Linked> {
        self.linked.as_mut().and_then(|l| l.as_mut().ok())
    }
}

#[derive(Debug)]
pub(crate) struct QueryData {
    pub result: u64,
    pub started: Option<Instant>,
}

/// One vertex attribute slot as the headless driver recorded it.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttrib {
    pub buffer: u32,
    pub size: i32,
    pub ty: u32,
    pub normalized: bool,
    pub stride: i32,
    pub offset: usize,
    pub kind: AttribKind,
    pub divisor: u32,
    pub enabled: bool,
}

#[derive(Debug, Default)]
pub(crate) struct VertexArrayData {
    pub attribs: HashMap<u32, VertexAttrib>,
    pub element_buffer: u32,
}

fn primitive_count(mode: u32, vertices: u64, patch_vertices: u64) -> u64 {
    match mode {
        glow::POINTS => vertices,
        glow::LINES => vertices / 2,
        glow::LINE_STRIP => vertices.saturating_sub(1),
        glow::LINE_LOOP if vertices >= 2 => vertices,
        glow::TRIANGLES => vertices / 3,
        glow::TRIANGLE_STRIP | glow::TRIANGLE_FAN => vertices.saturating_sub(2),
        glow::LINES_ADJACENCY => vertices / 4,
        glow::LINE_STRIP_ADJACENCY => vertices.saturating_sub(3),
        glow::TRIANGLES_ADJACENCY => vertices / 6,
        glow::TRIANGLE_STRIP_ADJACENCY if vertices >= 6 => (vertices - 4) / 2,
        glow::PATCHES => vertices / patch_vertices.max(1),
        _ => 0,
    }
}

// ── state ─────────────────────────────────────────────────────────────────

pub(crate) struct HeadlessState {
    pub config: HeadlessConfig,
    pub calls: Vec<String>,
    pub errors: VecDeque<u32>,
    next_name: u32,
    pub pending_failures: Vec<String>,
    pub forced_status: Option<u32>,

    pub caps: HashSet<u32>,
    pub buffer_bindings: HashMap<u32, u32>,
    pub indexed_bindings: HashMap<(u32, u32), (u32, usize, usize)>,
    pub active_unit: u32,
    pub texture_units: HashMap<(u32, u32), u32>,
    pub sampler_units: HashMap<u32, u32>,
    pub draw_framebuffer: u32,
    pub read_framebuffer: u32,
    pub renderbuffer: u32,
    pub vertex_array: u32,
    pub program: u32,
    pub viewport: [i32; 4],
    pub scissor: [i32; 4],
    pub color_masks: HashMap<u32, [bool; 4]>,
    pub depth_mask: bool,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub pack_alignment: usize,
    pub unpack_alignment: usize,
    pub patch_vertices: u64,
    pub transform_feedback: Option<u32>,

    pub buffers: HashMap<u32, Vec<u8>>,
    pub textures: HashMap<u32, TextureData>,
    pub renderbuffers: HashMap<u32, Option<Image>>,
    pub samplers: HashMap<u32, HashMap<u32, Vec<f32>>>,
    pub queries: HashMap<u32, QueryData>,
    pub active_queries: HashMap<u32, u32>,
    pub framebuffers: HashMap<u32, FramebufferData>,
    pub screen_color: Image,
    pub screen_depth: Image,
    pub shaders: HashMap<u32, ShaderData>,
    pub programs: HashMap<u32, ProgramData>,
    pub vertex_arrays: HashMap<u32, VertexArrayData>,
    pub uniform_values: HashMap<(u32, i32), Vec<u8>>,
}

impl HeadlessState {
    pub(crate) fn new(config: HeadlessConfig) -> Self {
        let (width, height) = (config.screen.0 as i32, config.screen.1 as i32);
        let screen = FramebufferData {
            attachments: HashMap::new(),
            draw_buffers: vec![glow::BACK],
            read_buffer: glow::BACK,
        };
        Self {
            calls: Vec::new(),
            errors: VecDeque::new(),
            next_name: 0,
            pending_failures: Vec::new(),
            forced_status: None,
            caps: HashSet::from([glow::DITHER, glow::MULTISAMPLE]),
            buffer_bindings: HashMap::new(),
            indexed_bindings: HashMap::new(),
            active_unit: 0,
            texture_units: HashMap::new(),
            sampler_units: HashMap::new(),
            draw_framebuffer: 0,
            read_framebuffer: 0,
            renderbuffer: 0,
            vertex_array: 0,
            program: 0,
            viewport: [0, 0, width, height],
            scissor: [0, 0, width, height],
            color_masks: HashMap::new(),
            depth_mask: true,
            clear_color: [0.0; 4],
            clear_depth: 1.0,
            pack_alignment: 4,
            unpack_alignment: 4,
            patch_vertices: 3,
            transform_feedback: None,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            renderbuffers: HashMap::new(),
            samplers: HashMap::new(),
            queries: HashMap::new(),
            active_queries: HashMap::new(),
            framebuffers: HashMap::from([(0, screen)]),
            screen_color: Image::new(glow::RGBA8, width, height, 1),
            screen_depth: Image::new(glow::DEPTH_COMPONENT24, width, height, 1),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            vertex_arrays: HashMap::new(),
            uniform_values: HashMap::new(),
            config,
        }
    }

    pub(crate) fn record(&mut self, call: String) {
        self.calls.push(call);
    }

    pub(crate) fn error(&mut self, code: u32) {
        self.errors.push_back(code);
    }

    /// Hands out a fresh name unless a failure was injected for `kind`.
    pub(crate) fn allocate(&mut self, kind: &str) -> Result<u32, String> {
        if let Some(index) = self.pending_failures.iter().position(|k| k == kind) {
            self.pending_failures.remove(index);
            self.record(format!("create_{kind}() -> failed"));
            return Err(format!("out of memory while creating a {kind}"));
        }
        self.next_name += 1;
        self.record(format!("create_{kind}() -> {}", self.next_name));
        Ok(self.next_name)
    }

    pub(crate) fn live_objects(&self) -> usize {
        self.buffers.len()
            + self.textures.len()
            + self.renderbuffers.len()
            + self.samplers.len()
            + self.queries.len()
            + (self.framebuffers.len() - 1)
            + self.shaders.len()
            + self.programs.len()
            + self.vertex_arrays.len()
    }

    // ── bindings ──────────────────────────────────────────────────────────

    pub(crate) fn bound_buffer(&self, target: u32) -> u32 {
        if target == glow::ELEMENT_ARRAY_BUFFER && self.vertex_array != 0 {
            return self.vertex_arrays.get(&self.vertex_array).map_or(0, |v| v.element_buffer);
        }
        self.buffer_bindings.get(&target).copied().unwrap_or(0)
    }

    pub(crate) fn bound_texture(&self, target: u32) -> u32 {
        let bind = match target {
            glow::TEXTURE_CUBE_MAP_POSITIVE_X..=glow::TEXTURE_CUBE_MAP_NEGATIVE_Z => {
                glow::TEXTURE_CUBE_MAP
            }
            other => other,
        };
        self.texture_units.get(&(self.active_unit, bind)).copied().unwrap_or(0)
    }

    pub(crate) fn bound_image(&mut self, target: u32, level: i32) -> Option<&mut Image> {
        let name = self.bound_texture(target);
        self.textures.get_mut(&name)?.images.get_mut(&(target, level))
    }

    pub(crate) fn framebuffer_target(&self, target: u32) -> u32 {
        match target {
            glow::READ_FRAMEBUFFER => self.read_framebuffer,
            _ => self.draw_framebuffer,
        }
    }

    // ── framebuffer images ────────────────────────────────────────────────

    /// Resolves an attachment point of `framebuffer` to its image and slice.
    pub(crate) fn attachment_image(&mut self, framebuffer: u32, attachment: u32) -> Option<(&mut Image, i32)> {
        if framebuffer == 0 {
            return match attachment {
                glow::DEPTH_ATTACHMENT | glow::DEPTH => Some((&mut self.screen_depth, 0)),
                glow::NONE => None,
                _ => Some((&mut self.screen_color, 0)),
            };
        }
        let attached = *self.framebuffers.get(&framebuffer)?.attachments.get(&attachment)?;
        match attached {
            AttachRef::Renderbuffer(name) => {
                self.renderbuffers.get_mut(&name)?.as_mut().map(|image| (image, 0))
            }
            AttachRef::Texture { name, target, level, layer } => {
                let texture = self.textures.get_mut(&name)?;
                let key = (target.unwrap_or(texture.target), level);
                texture.images.get_mut(&key).map(|image| (image, layer))
            }
        }
    }

    fn attachment_size(&mut self, framebuffer: u32, attachment: u32) -> Option<(i32, i32)> {
        self.attachment_image(framebuffer, attachment)
            .map(|(image, _)| (image.width, image.height))
    }

    pub(crate) fn framebuffer_status(&mut self, framebuffer: u32) -> u32 {
        if let Some(status) = self.forced_status.take() {
            return status;
        }
        if framebuffer == 0 {
            return glow::FRAMEBUFFER_COMPLETE;
        }
        let Some(data) = self.framebuffers.get(&framebuffer) else {
            return glow::FRAMEBUFFER_UNDEFINED;
        };
        let points: Vec<u32> = data.attachments.keys().copied().collect();
        if points.is_empty() {
            return glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT;
        }
        let mut sizes = Vec::new();
        for point in points {
            match self.attachment_size(framebuffer, point) {
                Some(size) => sizes.push(size),
                None => return glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT,
            }
        }
        if sizes.windows(2).any(|w| w[0] != w[1]) {
            return glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
        }
        glow::FRAMEBUFFER_COMPLETE
    }

    pub(crate) fn clear(&mut self, mask: u32) {
        let framebuffer = self.draw_framebuffer;
        let scissor = if self.caps.contains(&glow::SCISSOR_TEST) {
            self.scissor
        } else {
            [0, 0, i32::MAX, i32::MAX]
        };
        if mask & glow::COLOR_BUFFER_BIT != 0 {
            let draw_buffers = self
                .framebuffers
                .get(&framebuffer)
                .map(|f| f.draw_buffers.clone())
                .unwrap_or_default();
            let color = self.clear_color;
            for (index, buffer) in draw_buffers.into_iter().enumerate() {
                let write = self.color_masks.get(&(index as u32)).copied().unwrap_or([true; 4]);
                if let Some((image, slice)) = self.attachment_image(framebuffer, buffer) {
                    let pixel = image.encode(color);
                    image.fill(scissor, slice, &pixel, write);
                }
            }
        }
        if mask & glow::DEPTH_BUFFER_BIT != 0 && self.depth_mask {
            let depth = self.clear_depth;
            if let Some((image, slice)) = self.attachment_image(framebuffer, glow::DEPTH_ATTACHMENT) {
                let pixel = image.encode([depth; 4]);
                image.fill(scissor, slice, &pixel, [true; 4]);
            }
        }
    }

    pub(crate) fn read_source(&self, format: u32) -> u32 {
        if format == glow::DEPTH_COMPONENT {
            return glow::DEPTH_ATTACHMENT;
        }
        self.framebuffers
            .get(&self.read_framebuffer)
            .map_or(glow::NONE, |f| f.read_buffer)
    }

    pub(crate) fn blit(&mut self, src: [i32; 4], dst: [i32; 4], mask: u32) -> bool {
        let (read, draw) = (self.read_framebuffer, self.draw_framebuffer);
        let mut points = Vec::new();
        if mask & glow::COLOR_BUFFER_BIT != 0 {
            let source = self.read_source(glow::RGBA);
            let target = self
                .framebuffers
                .get(&draw)
                .and_then(|f| f.draw_buffers.first().copied())
                .unwrap_or(glow::NONE);
            points.push((source, target));
        }
        if mask & glow::DEPTH_BUFFER_BIT != 0 {
            points.push((glow::DEPTH_ATTACHMENT, glow::DEPTH_ATTACHMENT));
        }
        for (source, target) in points {
            let Some((image, slice)) = self.attachment_image(read, source) else {
                continue;
            };
            let image = image.clone();
            if let Some((out, out_slice)) = self.attachment_image(draw, target) {
                if !copy_scaled(&image, src, slice, out, dst, out_slice) {
                    return false;
                }
            }
        }
        true
    }

    pub(crate) fn generate_mipmap(&mut self, target: u32) {
        let name = self.bound_texture(target);
        let Some(texture) = self.textures.get_mut(&name) else {
            self.error(glow::INVALID_OPERATION);
            return;
        };
        let base = texture
            .params
            .get(&glow::TEXTURE_BASE_LEVEL)
            .and_then(|v| v.first())
            .map_or(0, |v| *v as i32);
        let faces: Vec<u32> = if target == glow::TEXTURE_CUBE_MAP {
            (0..6).map(|f| glow::TEXTURE_CUBE_MAP_POSITIVE_X + f).collect()
        } else {
            vec![target]
        };
        for face in faces {
            let mut level = base;
            while let Some(source) = texture.images.get(&(face, level)).cloned() {
                if source.width <= 1 && source.height <= 1 {
                    break;
                }
                let (w, h) = ((source.width / 2).max(1), (source.height / 2).max(1));
                let d = if target == glow::TEXTURE_3D { (source.depth / 2).max(1) } else { source.depth };
                let mut next = source.clone();
                next.width = w;
                next.height = h;
                next.depth = d;
                next.data = vec![0; (w * h * d) as usize * source.pixel_size()];
                for z in 0..d {
                    let sz = z * source.depth / d;
                    copy_scaled(&source, [0, 0, source.width, source.height], sz, &mut next, [0, 0, w, h], z);
                }
                level += 1;
                texture.images.insert((face, level), next);
            }
        }
    }

    // ── draws ─────────────────────────────────────────────────────────────

    pub(crate) fn count_draw(&mut self, mode: u32, vertices: u64, instances: u64) {
        if self.program == 0 {
            self.error(glow::INVALID_OPERATION);
            return;
        }
        let primitives = primitive_count(mode, vertices, self.patch_vertices) * instances;
        for target in [glow::PRIMITIVES_GENERATED, glow::TRANSFORM_FEEDBACK_PRIMITIVES_WRITTEN] {
            if target == glow::TRANSFORM_FEEDBACK_PRIMITIVES_WRITTEN && self.transform_feedback.is_none() {
                continue;
            }
            if let Some(query) = self.active_queries.get(&target) {
                if let Some(data) = self.queries.get_mut(query) {
                    data.result += primitives;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpack_respects_row_alignment() {
        let mut image = Image::new(glow::RGB8, 1, 2, 1);
        // rows of 3 bytes padded to 4
        let src = [1, 2, 3, 0, 4, 5, 6, 0];
        assert!(image.unpack([0, 0, 0], [1, 2, 1], 4, &src));
        assert_eq!(image.data, vec![1, 2, 3, 4, 5, 6]);
        let mut out = [9u8; 6];
        assert!(image.pack([0, 0, 0], [1, 2, 1], 1, &mut out));
        assert_eq!(out, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn fill_is_clipped_and_masked() {
        let mut image = Image::new(glow::RGBA8, 2, 2, 1);
        let pixel = image.encode([1.0, 0.5, 0.0, 1.0]);
        image.fill([1, 1, 5, 5], 0, &pixel, [true, false, true, true]);
        assert_eq!(&image.data[..12], &[0; 12]);
        assert_eq!(&image.data[12..], &[255, 0, 0, 255]);
    }

    #[test]
    fn half_float_encoding() {
        assert_eq!(f16_bits(1.0), 0x3c00);
        assert_eq!(f16_bits(-2.0), 0xc000);
        assert_eq!(f16_bits(0.0), 0);
    }

    #[test]
    fn primitive_counts() {
        assert_eq!(primitive_count(glow::TRIANGLE_FAN, 5, 3), 3);
        assert_eq!(primitive_count(glow::LINES, 5, 3), 2);
        assert_eq!(primitive_count(glow::PATCHES, 8, 4), 2);
    }
}
