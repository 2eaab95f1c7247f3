use std::ffi::c_void;
use std::num::NonZeroU32;

use anyhow::Result;
use glow::HasContext;

use super::glow_procs::Procs;
use super::{ActiveInfo, AttribKind, Gl, Loader};
use crate::program::types::{self, Scalar};

/// Native function table backed by a real OpenGL context through `glow`.
///
/// The caller owns the context itself (window, surface, make-current); this
/// type only issues calls on it. All methods must run on the context thread.
pub struct GlowBackend {
    gl: glow::Context,
    procs: Procs,
}

impl GlowBackend {
    /// Wraps a context without the entry points glow leaves out: subroutine
    /// and double uniform calls report `Err`. [`GlowLoader`] resolves them.
    pub fn new(gl: glow::Context) -> Self {
        Self { gl, procs: Procs::default() }
    }
}

/// Loader that builds a [`GlowBackend`] from a `get_proc_address` function.
///
/// The windowing layer supplies the function; the context must already be
/// current on the calling thread when [`Loader::load`] runs.
pub struct GlowLoader<F> {
    get_proc_address: Option<F>,
}

impl<F> GlowLoader<F>
where
    F: FnMut(&str) -> *const c_void,
{
    pub fn new(get_proc_address: F) -> Self {
        Self { get_proc_address: Some(get_proc_address) }
    }
}

impl<F> Loader for GlowLoader<F>
where
    F: FnMut(&str) -> *const c_void,
{
    fn name(&self) -> &str {
        "glow"
    }

    fn load(&mut self) -> Result<Box<dyn Gl>> {
        let mut loader = self
            .get_proc_address
            .take()
            .ok_or_else(|| anyhow::anyhow!("glow loader already consumed"))?;
        // SAFETY: the caller guarantees a current context and a valid loader.
        let gl = unsafe { glow::Context::from_loader_function(&mut loader) };
        let version = gl.version();
        let procs = if version.major >= 4 && !version.is_embedded {
            Procs::load(&mut loader)
        } else {
            log::debug!(
                "context {}.{} has no shader subroutines or double uniforms",
                version.major,
                version.minor
            );
            Procs::default()
        };
        Ok(Box::new(GlowBackend { gl, procs }))
    }
}

// ── handle conversion ─────────────────────────────────────────────────────

fn nz(name: u32) -> Option<NonZeroU32> {
    NonZeroU32::new(name)
}

fn buffer(name: u32) -> Option<glow::NativeBuffer> {
    nz(name).map(glow::NativeBuffer)
}

fn texture(name: u32) -> Option<glow::NativeTexture> {
    nz(name).map(glow::NativeTexture)
}

fn renderbuffer(name: u32) -> Option<glow::NativeRenderbuffer> {
    nz(name).map(glow::NativeRenderbuffer)
}

fn sampler(name: u32) -> Option<glow::NativeSampler> {
    nz(name).map(glow::NativeSampler)
}

fn query(name: u32) -> Option<glow::NativeQuery> {
    nz(name).map(glow::NativeQuery)
}

fn framebuffer(name: u32) -> Option<glow::NativeFramebuffer> {
    nz(name).map(glow::NativeFramebuffer)
}

fn shader(name: u32) -> Option<glow::NativeShader> {
    nz(name).map(glow::NativeShader)
}

fn program(name: u32) -> Option<glow::NativeProgram> {
    nz(name).map(glow::NativeProgram)
}

fn vertex_array(name: u32) -> Option<glow::NativeVertexArray> {
    nz(name).map(glow::NativeVertexArray)
}

fn location(loc: i32) -> Option<glow::NativeUniformLocation> {
    u32::try_from(loc).ok().map(glow::NativeUniformLocation)
}

fn f32s(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(4).map(bytemuck::pod_read_unaligned).collect()
}

fn i32s(data: &[u8]) -> Vec<i32> {
    data.chunks_exact(4).map(bytemuck::pod_read_unaligned).collect()
}

fn u32s(data: &[u8]) -> Vec<u32> {
    data.chunks_exact(4).map(bytemuck::pod_read_unaligned).collect()
}

// Every method below forwards to one glow call. SAFETY for all `unsafe`
// blocks: the object layer only passes names it created on this context and
// buffers sized for the requested transfer.
impl Gl for GlowBackend {
    fn name(&self) -> &str {
        "glow"
    }

    // ── queries ───────────────────────────────────────────────────────────

    fn get_error(&self) -> u32 {
        unsafe { self.gl.get_error() }
    }

    fn get_parameter_i32(&self, pname: u32) -> i32 {
        unsafe { self.gl.get_parameter_i32(pname) }
    }

    fn get_parameter_i32_slice(&self, pname: u32, out: &mut [i32]) {
        unsafe { self.gl.get_parameter_i32_slice(pname, out) }
    }

    fn get_parameter_f32(&self, pname: u32) -> f32 {
        unsafe { self.gl.get_parameter_f32(pname) }
    }

    fn get_parameter_string(&self, pname: u32) -> String {
        unsafe { self.gl.get_parameter_string(pname) }
    }

    fn extensions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.gl.supported_extensions().iter().cloned().collect();
        names.sort();
        names
    }

    // ── fixed-function state ──────────────────────────────────────────────

    fn enable(&self, cap: u32) {
        unsafe { self.gl.enable(cap) }
    }

    fn disable(&self, cap: u32) {
        unsafe { self.gl.disable(cap) }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) }
    }

    fn scissor(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.scissor(x, y, width, height) }
    }

    fn color_mask_indexed(&self, index: u32, mask: [bool; 4]) {
        unsafe { self.gl.color_mask_draw_buffer(index, mask[0], mask[1], mask[2], mask[3]) }
    }

    fn depth_mask(&self, flag: bool) {
        unsafe { self.gl.depth_mask(flag) }
    }

    fn clear_color(&self, color: [f32; 4]) {
        unsafe { self.gl.clear_color(color[0], color[1], color[2], color[3]) }
    }

    fn clear_depth(&self, depth: f32) {
        unsafe { self.gl.clear_depth_f32(depth) }
    }

    fn clear(&self, mask: u32) {
        unsafe { self.gl.clear(mask) }
    }

    fn blend_func_separate(&self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32) {
        unsafe { self.gl.blend_func_separate(src_rgb, dst_rgb, src_alpha, dst_alpha) }
    }

    fn blend_equation_separate(&self, mode_rgb: u32, mode_alpha: u32) {
        unsafe { self.gl.blend_equation_separate(mode_rgb, mode_alpha) }
    }

    fn depth_func(&self, func: u32) {
        unsafe { self.gl.depth_func(func) }
    }

    fn cull_face(&self, face: u32) {
        unsafe { self.gl.cull_face(face) }
    }

    fn front_face(&self, mode: u32) {
        unsafe { self.gl.front_face(mode) }
    }

    fn polygon_mode(&self, face: u32, mode: u32) {
        unsafe { self.gl.polygon_mode(face, mode) }
    }

    fn polygon_offset(&self, factor: f32, units: f32) {
        unsafe { self.gl.polygon_offset(factor, units) }
    }

    fn line_width(&self, width: f32) {
        unsafe { self.gl.line_width(width) }
    }

    fn provoking_vertex(&self, mode: u32) {
        unsafe { self.gl.provoking_vertex(mode) }
    }

    fn patch_parameter_i32(&self, pname: u32, value: i32) {
        unsafe { self.gl.patch_parameter_i32(pname, value) }
    }

    fn pixel_store_i32(&self, pname: u32, value: i32) {
        unsafe { self.gl.pixel_store_i32(pname, value) }
    }

    fn flush(&self) {
        unsafe { self.gl.flush() }
    }

    fn finish(&self) {
        unsafe { self.gl.finish() }
    }

    // ── buffers ───────────────────────────────────────────────────────────

    fn create_buffer(&self) -> Result<u32, String> {
        unsafe { self.gl.create_buffer() }.map(|b| b.0.get())
    }

    fn delete_buffer(&self, name: u32) {
        if let Some(b) = buffer(name) {
            unsafe { self.gl.delete_buffer(b) }
        }
    }

    fn bind_buffer(&self, target: u32, name: u32) {
        unsafe { self.gl.bind_buffer(target, buffer(name)) }
    }

    fn buffer_data(&self, target: u32, size: usize, data: Option<&[u8]>, usage: u32) {
        unsafe {
            match data {
                Some(bytes) => self.gl.buffer_data_u8_slice(target, bytes, usage),
                None => self.gl.buffer_data_size(target, size as i32, usage),
            }
        }
    }

    fn buffer_sub_data(&self, target: u32, offset: usize, data: &[u8]) {
        unsafe { self.gl.buffer_sub_data_u8_slice(target, offset as i32, data) }
    }

    fn get_buffer_sub_data(&self, target: u32, offset: usize, out: &mut [u8]) {
        unsafe { self.gl.get_buffer_sub_data(target, offset as i32, out) }
    }

    fn copy_buffer_sub_data(
        &self,
        read_target: u32,
        write_target: u32,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    ) {
        unsafe {
            self.gl.copy_buffer_sub_data(
                read_target,
                write_target,
                read_offset as i32,
                write_offset as i32,
                size as i32,
            )
        }
    }

    fn bind_buffer_base(&self, target: u32, index: u32, name: u32) {
        unsafe { self.gl.bind_buffer_base(target, index, buffer(name)) }
    }

    fn bind_buffer_range(&self, target: u32, index: u32, name: u32, offset: usize, size: usize) {
        unsafe { self.gl.bind_buffer_range(target, index, buffer(name), offset as i32, size as i32) }
    }

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&self) -> Result<u32, String> {
        unsafe { self.gl.create_texture() }.map(|t| t.0.get())
    }

    fn delete_texture(&self, name: u32) {
        if let Some(t) = texture(name) {
            unsafe { self.gl.delete_texture(t) }
        }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) }
    }

    fn bind_texture(&self, target: u32, name: u32) {
        unsafe { self.gl.bind_texture(target, texture(name)) }
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
        unsafe {
            self.gl.tex_image_2d(
                target,
                level,
                internal_format as i32,
                width,
                height,
                0,
                format,
                ty,
                glow::PixelUnpackData::Slice(data),
            )
        }
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
        unsafe {
            self.gl.tex_image_3d(
                target,
                level,
                internal_format as i32,
                width,
                height,
                depth,
                0,
                format,
                ty,
                glow::PixelUnpackData::Slice(data),
            )
        }
    }

    fn tex_image_2d_multisample(
        &self,
        target: u32,
        samples: i32,
        internal_format: u32,
        width: i32,
        height: i32,
    ) {
        unsafe {
            self.gl.tex_image_2d_multisample(
                target,
                samples,
                internal_format as i32,
                width,
                height,
                true,
            )
        }
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
        unsafe {
            self.gl.tex_sub_image_2d(
                target,
                level,
                x,
                y,
                width,
                height,
                format,
                ty,
                glow::PixelUnpackData::Slice(Some(data)),
            )
        }
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
        unsafe {
            self.gl.tex_sub_image_3d(
                target,
                level,
                x,
                y,
                z,
                width,
                height,
                depth,
                format,
                ty,
                glow::PixelUnpackData::Slice(Some(data)),
            )
        }
    }

    fn get_tex_image(&self, target: u32, level: i32, format: u32, ty: u32, out: &mut [u8]) {
        unsafe {
            self.gl
                .get_tex_image(target, level, format, ty, glow::PixelPackData::Slice(Some(out)))
        }
    }

    fn tex_parameter_i32(&self, target: u32, pname: u32, value: i32) {
        unsafe { self.gl.tex_parameter_i32(target, pname, value) }
    }

    fn tex_parameter_f32(&self, target: u32, pname: u32, value: f32) {
        unsafe { self.gl.tex_parameter_f32(target, pname, value) }
    }

    fn tex_parameter_i32_slice(&self, target: u32, pname: u32, values: &[i32]) {
        unsafe { self.gl.tex_parameter_i32_slice(target, pname, values) }
    }

    fn generate_mipmap(&self, target: u32) {
        unsafe { self.gl.generate_mipmap(target) }
    }

    // ── renderbuffers ─────────────────────────────────────────────────────

    fn create_renderbuffer(&self) -> Result<u32, String> {
        unsafe { self.gl.create_renderbuffer() }.map(|r| r.0.get())
    }

    fn delete_renderbuffer(&self, name: u32) {
        if let Some(r) = renderbuffer(name) {
            unsafe { self.gl.delete_renderbuffer(r) }
        }
    }

    fn bind_renderbuffer(&self, name: u32) {
        unsafe { self.gl.bind_renderbuffer(glow::RENDERBUFFER, renderbuffer(name)) }
    }

    fn renderbuffer_storage(&self, samples: i32, internal_format: u32, width: i32, height: i32) {
        unsafe {
            if samples > 0 {
                self.gl.renderbuffer_storage_multisample(
                    glow::RENDERBUFFER,
                    samples,
                    internal_format,
                    width,
                    height,
                )
            } else {
                self.gl
                    .renderbuffer_storage(glow::RENDERBUFFER, internal_format, width, height)
            }
        }
    }

    // ── samplers ──────────────────────────────────────────────────────────

    fn create_sampler(&self) -> Result<u32, String> {
        unsafe { self.gl.create_sampler() }.map(|s| s.0.get())
    }

    fn delete_sampler(&self, name: u32) {
        if let Some(s) = sampler(name) {
            unsafe { self.gl.delete_sampler(s) }
        }
    }

    fn bind_sampler(&self, unit: u32, name: u32) {
        unsafe { self.gl.bind_sampler(unit, sampler(name)) }
    }

    fn sampler_parameter_i32(&self, name: u32, pname: u32, value: i32) {
        if let Some(s) = sampler(name) {
            unsafe { self.gl.sampler_parameter_i32(s, pname, value) }
        }
    }

    fn sampler_parameter_f32(&self, name: u32, pname: u32, value: f32) {
        if let Some(s) = sampler(name) {
            unsafe { self.gl.sampler_parameter_f32(s, pname, value) }
        }
    }

    fn sampler_parameter_f32_slice(&self, name: u32, pname: u32, values: &[f32]) {
        if let Some(s) = sampler(name) {
            unsafe { self.gl.sampler_parameter_f32_slice(s, pname, values) }
        }
    }

    // ── queries ───────────────────────────────────────────────────────────

    fn create_query(&self) -> Result<u32, String> {
        unsafe { self.gl.create_query() }.map(|q| q.0.get())
    }

    fn delete_query(&self, name: u32) {
        if let Some(q) = query(name) {
            unsafe { self.gl.delete_query(q) }
        }
    }

    fn begin_query(&self, target: u32, name: u32) {
        if let Some(q) = query(name) {
            unsafe { self.gl.begin_query(target, q) }
        }
    }

    fn end_query(&self, target: u32) {
        unsafe { self.gl.end_query(target) }
    }

    fn get_query_result(&self, name: u32) -> u64 {
        match query(name) {
            Some(q) => u64::from(unsafe { self.gl.get_query_parameter_u32(q, glow::QUERY_RESULT) }),
            None => 0,
        }
    }

    // ── framebuffers ──────────────────────────────────────────────────────

    fn create_framebuffer(&self) -> Result<u32, String> {
        unsafe { self.gl.create_framebuffer() }.map(|f| f.0.get())
    }

    fn delete_framebuffer(&self, name: u32) {
        if let Some(f) = framebuffer(name) {
            unsafe { self.gl.delete_framebuffer(f) }
        }
    }

    fn bind_framebuffer(&self, target: u32, name: u32) {
        unsafe { self.gl.bind_framebuffer(target, framebuffer(name)) }
    }

    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        name: u32,
        level: i32,
    ) {
        unsafe {
            self.gl
                .framebuffer_texture_2d(target, attachment, texture_target, texture(name), level)
        }
    }

    fn framebuffer_texture_layer(
        &self,
        target: u32,
        attachment: u32,
        name: u32,
        level: i32,
        layer: i32,
    ) {
        unsafe {
            self.gl
                .framebuffer_texture_layer(target, attachment, texture(name), level, layer)
        }
    }

    fn framebuffer_renderbuffer(&self, target: u32, attachment: u32, name: u32) {
        unsafe {
            self.gl.framebuffer_renderbuffer(
                target,
                attachment,
                glow::RENDERBUFFER,
                renderbuffer(name),
            )
        }
    }

    fn check_framebuffer_status(&self, target: u32) -> u32 {
        unsafe { self.gl.check_framebuffer_status(target) }
    }

    fn draw_buffers(&self, buffers: &[u32]) {
        unsafe { self.gl.draw_buffers(buffers) }
    }

    fn read_buffer(&self, source: u32) {
        unsafe { self.gl.read_buffer(source) }
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
        unsafe {
            self.gl
                .read_pixels(x, y, width, height, format, ty, glow::PixelPackData::Slice(Some(out)))
        }
    }

    fn blit_framebuffer(&self, src: [i32; 4], dst: [i32; 4], mask: u32, filter: u32) {
        unsafe {
            self.gl.blit_framebuffer(
                src[0], src[1], src[2], src[3], dst[0], dst[1], dst[2], dst[3], mask, filter,
            )
        }
    }

    // ── shaders and programs ──────────────────────────────────────────────

    fn create_shader(&self, stage: u32) -> Result<u32, String> {
        unsafe { self.gl.create_shader(stage) }.map(|s| s.0.get())
    }

    fn delete_shader(&self, name: u32) {
        if let Some(s) = shader(name) {
            unsafe { self.gl.delete_shader(s) }
        }
    }

    fn shader_source(&self, name: u32, source: &str) {
        if let Some(s) = shader(name) {
            unsafe { self.gl.shader_source(s, source) }
        }
    }

    fn compile_shader(&self, name: u32) {
        if let Some(s) = shader(name) {
            unsafe { self.gl.compile_shader(s) }
        }
    }

    fn shader_compile_status(&self, name: u32) -> bool {
        shader(name).is_some_and(|s| unsafe { self.gl.get_shader_compile_status(s) })
    }

    fn shader_info_log(&self, name: u32) -> String {
        shader(name)
            .map(|s| unsafe { self.gl.get_shader_info_log(s) })
            .unwrap_or_default()
    }

    fn create_program(&self) -> Result<u32, String> {
        unsafe { self.gl.create_program() }.map(|p| p.0.get())
    }

    fn delete_program(&self, name: u32) {
        if let Some(p) = program(name) {
            unsafe { self.gl.delete_program(p) }
        }
    }

    fn attach_shader(&self, prog: u32, sh: u32) {
        if let (Some(p), Some(s)) = (program(prog), shader(sh)) {
            unsafe { self.gl.attach_shader(p, s) }
        }
    }

    fn detach_shader(&self, prog: u32, sh: u32) {
        if let (Some(p), Some(s)) = (program(prog), shader(sh)) {
            unsafe { self.gl.detach_shader(p, s) }
        }
    }

    fn transform_feedback_varyings(&self, prog: u32, varyings: &[&str], buffer_mode: u32) {
        if let Some(p) = program(prog) {
            unsafe { self.gl.transform_feedback_varyings(p, varyings, buffer_mode) }
        }
    }

    fn link_program(&self, prog: u32) {
        if let Some(p) = program(prog) {
            unsafe { self.gl.link_program(p) }
        }
    }

    fn program_link_status(&self, prog: u32) -> bool {
        program(prog).is_some_and(|p| unsafe { self.gl.get_program_link_status(p) })
    }

    fn program_info_log(&self, prog: u32) -> String {
        program(prog)
            .map(|p| unsafe { self.gl.get_program_info_log(p) })
            .unwrap_or_default()
    }

    fn use_program(&self, prog: u32) {
        unsafe { self.gl.use_program(program(prog)) }
    }

    fn get_program_parameter_i32(&self, prog: u32, pname: u32) -> i32 {
        program(prog)
            .map(|p| unsafe { self.gl.get_program_parameter_i32(p, pname) })
            .unwrap_or(0)
    }

    // ── reflection ────────────────────────────────────────────────────────

    fn active_attribute_count(&self, prog: u32) -> u32 {
        program(prog)
            .map(|p| unsafe { self.gl.get_active_attributes(p) })
            .unwrap_or(0)
    }

    fn get_active_attribute(&self, prog: u32, index: u32) -> Option<ActiveInfo> {
        let active = unsafe { self.gl.get_active_attribute(program(prog)?, index) }?;
        Some(ActiveInfo { name: active.name, size: active.size, gl_type: active.atype })
    }

    fn get_attrib_location(&self, prog: u32, name: &str) -> i32 {
        program(prog)
            .and_then(|p| unsafe { self.gl.get_attrib_location(p, name) })
            .map_or(-1, |loc| loc as i32)
    }

    fn active_uniform_count(&self, prog: u32) -> u32 {
        program(prog)
            .map(|p| unsafe { self.gl.get_active_uniforms(p) })
            .unwrap_or(0)
    }

    fn get_active_uniform(&self, prog: u32, index: u32) -> Option<ActiveInfo> {
        let active = unsafe { self.gl.get_active_uniform(program(prog)?, index) }?;
        Some(ActiveInfo { name: active.name, size: active.size, gl_type: active.utype })
    }

    fn get_uniform_location(&self, prog: u32, name: &str) -> i32 {
        program(prog)
            .and_then(|p| unsafe { self.gl.get_uniform_location(p, name) })
            .map_or(-1, |loc| loc.0 as i32)
    }

    fn active_uniform_block_count(&self, prog: u32) -> u32 {
        self.get_program_parameter_i32(prog, glow::ACTIVE_UNIFORM_BLOCKS).max(0) as u32
    }

    fn get_active_uniform_block_name(&self, prog: u32, index: u32) -> String {
        program(prog)
            .map(|p| unsafe { self.gl.get_active_uniform_block_name(p, index) })
            .unwrap_or_default()
    }

    fn get_active_uniform_block_parameter_i32(&self, prog: u32, index: u32, pname: u32) -> i32 {
        program(prog)
            .map(|p| unsafe { self.gl.get_active_uniform_block_parameter_i32(p, index, pname) })
            .unwrap_or(0)
    }

    fn uniform_block_binding(&self, prog: u32, index: u32, binding: u32) {
        if let Some(p) = program(prog) {
            unsafe { self.gl.uniform_block_binding(p, index, binding) }
        }
    }

    fn transform_feedback_varying_count(&self, prog: u32) -> u32 {
        self.get_program_parameter_i32(prog, glow::TRANSFORM_FEEDBACK_VARYINGS).max(0) as u32
    }

    fn get_transform_feedback_varying(&self, prog: u32, index: u32) -> Option<ActiveInfo> {
        let active = unsafe { self.gl.get_transform_feedback_varying(program(prog)?, index) }?;
        Some(ActiveInfo { name: active.name, size: active.size, gl_type: active.tftype })
    }

    // ── subroutines ───────────────────────────────────────────────────────

    fn get_program_stage_i32(&self, prog: u32, stage: u32, pname: u32) -> Result<i32, String> {
        self.procs.program_stage(prog, stage, pname)
    }

    fn get_active_subroutine_name(&self, prog: u32, stage: u32, index: u32) -> Result<String, String> {
        self.procs.subroutine_name(prog, stage, index)
    }

    fn get_active_subroutine_uniform_name(
        &self,
        prog: u32,
        stage: u32,
        index: u32,
    ) -> Result<String, String> {
        self.procs.subroutine_uniform_name(prog, stage, index)
    }

    fn uniform_subroutines(&self, stage: u32, indices: &[u32]) -> Result<(), String> {
        self.procs.select_subroutines(stage, indices)
    }

    // ── uniform values ────────────────────────────────────────────────────

    fn uniform_write(&self, loc: i32, gl_type: u32, count: i32, data: &[u8]) -> Result<(), String> {
        let ty = types::describe(gl_type).ok_or_else(|| format!("unknown uniform type {gl_type:#06x}"))?;
        if ty.scalar == Scalar::Double {
            let values: Vec<f64> = data.chunks_exact(8).map(bytemuck::pod_read_unaligned).collect();
            return self.procs.uniform_doubles(loc, (ty.columns, ty.rows), count, &values);
        }
        let loc = location(loc);
        let loc = loc.as_ref();
        unsafe {
            match (ty.scalar, ty.columns, ty.rows) {
                (Scalar::Float, 1, 1) => self.gl.uniform_1_f32_slice(loc, &f32s(data)),
                (Scalar::Float, 1, 2) => self.gl.uniform_2_f32_slice(loc, &f32s(data)),
                (Scalar::Float, 1, 3) => self.gl.uniform_3_f32_slice(loc, &f32s(data)),
                (Scalar::Float, 1, 4) => self.gl.uniform_4_f32_slice(loc, &f32s(data)),
                (Scalar::Float, 2, 2) => self.gl.uniform_matrix_2_f32_slice(loc, false, &f32s(data)),
                (Scalar::Float, 3, 3) => self.gl.uniform_matrix_3_f32_slice(loc, false, &f32s(data)),
                (Scalar::Float, 4, 4) => self.gl.uniform_matrix_4_f32_slice(loc, false, &f32s(data)),
                (Scalar::Float, 2, 3) => self.gl.uniform_matrix_2x3_f32_slice(loc, false, &f32s(data)),
                (Scalar::Float, 2, 4) => self.gl.uniform_matrix_2x4_f32_slice(loc, false, &f32s(data)),
                (Scalar::Float, 3, 2) => self.gl.uniform_matrix_3x2_f32_slice(loc, false, &f32s(data)),
                (Scalar::Float, 3, 4) => self.gl.uniform_matrix_3x4_f32_slice(loc, false, &f32s(data)),
                (Scalar::Float, 4, 2) => self.gl.uniform_matrix_4x2_f32_slice(loc, false, &f32s(data)),
                (Scalar::Float, 4, 3) => self.gl.uniform_matrix_4x3_f32_slice(loc, false, &f32s(data)),
                (Scalar::Int | Scalar::Bool | Scalar::Sampler, 1, 1) => {
                    self.gl.uniform_1_i32_slice(loc, &i32s(data))
                }
                (Scalar::Int | Scalar::Bool, 1, 2) => self.gl.uniform_2_i32_slice(loc, &i32s(data)),
                (Scalar::Int | Scalar::Bool, 1, 3) => self.gl.uniform_3_i32_slice(loc, &i32s(data)),
                (Scalar::Int | Scalar::Bool, 1, 4) => self.gl.uniform_4_i32_slice(loc, &i32s(data)),
                (Scalar::UInt, 1, 1) => self.gl.uniform_1_u32_slice(loc, &u32s(data)),
                (Scalar::UInt, 1, 2) => self.gl.uniform_2_u32_slice(loc, &u32s(data)),
                (Scalar::UInt, 1, 3) => self.gl.uniform_3_u32_slice(loc, &u32s(data)),
                (Scalar::UInt, 1, 4) => self.gl.uniform_4_u32_slice(loc, &u32s(data)),
                _ => return Err(format!("no upload path for {} uniforms", ty.glsl)),
            }
        }
        Ok(())
    }

    fn uniform_read(&self, prog: u32, loc: i32, gl_type: u32, out: &mut [u8]) -> Result<(), String> {
        let ty = types::describe(gl_type).ok_or_else(|| format!("unknown uniform type {gl_type:#06x}"))?;
        let (Some(p), Some(native)) = (program(prog), location(loc)) else {
            return Ok(());
        };
        let n = ty.dimension() as usize;
        unsafe {
            match ty.scalar {
                Scalar::Float => {
                    let mut values = vec![0.0f32; n];
                    self.gl.get_uniform_f32(p, &native, &mut values);
                    out.copy_from_slice(bytemuck::cast_slice(&values));
                }
                Scalar::Int | Scalar::UInt | Scalar::Bool | Scalar::Sampler => {
                    let mut values = vec![0i32; n];
                    self.gl.get_uniform_i32(p, &native, &mut values);
                    out.copy_from_slice(bytemuck::cast_slice(&values));
                }
                Scalar::Double => {
                    let mut values = vec![0.0f64; n];
                    self.procs.read_doubles(prog, loc, &mut values)?;
                    out.copy_from_slice(bytemuck::cast_slice(&values));
                }
            }
        }
        Ok(())
    }

    // ── vertex arrays ─────────────────────────────────────────────────────

    fn create_vertex_array(&self) -> Result<u32, String> {
        unsafe { self.gl.create_vertex_array() }.map(|v| v.0.get())
    }

    fn delete_vertex_array(&self, name: u32) {
        if let Some(v) = vertex_array(name) {
            unsafe { self.gl.delete_vertex_array(v) }
        }
    }

    fn bind_vertex_array(&self, name: u32) {
        unsafe { self.gl.bind_vertex_array(vertex_array(name)) }
    }

    fn enable_vertex_attrib_array(&self, location: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(location) }
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
        let offset = offset as i32;
        unsafe {
            match kind {
                AttribKind::Float => self
                    .gl
                    .vertex_attrib_pointer_f32(location, size, ty, normalized, stride, offset),
                AttribKind::Integer => {
                    self.gl.vertex_attrib_pointer_i32(location, size, ty, stride, offset)
                }
                AttribKind::Double => {
                    self.gl.vertex_attrib_pointer_f64(location, size, ty, stride, offset)
                }
            }
        }
    }

    fn vertex_attrib_divisor(&self, location: u32, divisor: u32) {
        unsafe { self.gl.vertex_attrib_divisor(location, divisor) }
    }

    // ── draws ─────────────────────────────────────────────────────────────

    fn draw_arrays_instanced(&self, mode: u32, first: i32, count: i32, instances: i32) {
        unsafe { self.gl.draw_arrays_instanced(mode, first, count, instances) }
    }

    fn draw_elements_instanced(
        &self,
        mode: u32,
        count: i32,
        index_type: u32,
        offset: usize,
        instances: i32,
    ) {
        unsafe {
            self.gl
                .draw_elements_instanced(mode, count, index_type, offset as i32, instances)
        }
    }

    fn draw_arrays_indirect(&self, mode: u32, offset: usize) {
        unsafe { self.gl.draw_arrays_indirect_offset(mode, offset as i32) }
    }

    fn draw_elements_indirect(&self, mode: u32, index_type: u32, offset: usize) {
        unsafe { self.gl.draw_elements_indirect_offset(mode, index_type, offset as i32) }
    }

    fn begin_transform_feedback(&self, primitive: u32) {
        unsafe { self.gl.begin_transform_feedback(primitive) }
    }

    fn end_transform_feedback(&self) {
        unsafe { self.gl.end_transform_feedback() }
    }
}
