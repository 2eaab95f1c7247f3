//! Native function table.
//!
//! Everything above this module talks to the driver through the [`Gl`] trait:
//! one method per native entry point the object layer needs. Native objects
//! are plain `u32` names and `0` always means "no object".
//!
//! Two implementations ship with the crate:
//! - [`GlowBackend`]: a real OpenGL 3.3+ context through `glow`
//! - [`HeadlessBackend`]: a software model of the driver state machine, used
//!   by tests and GPU-less tooling

mod glow_backend;
mod glow_procs;
pub mod headless;

pub use glow_backend::{GlowBackend, GlowLoader};
pub use headless::{HeadlessBackend, HeadlessConfig};

// Enums from extensions and 4.x entry points that not every binding exports.
pub const TEXTURE_MAX_ANISOTROPY: u32 = 0x84FE;
pub const MAX_TEXTURE_MAX_ANISOTROPY: u32 = 0x84FF;
pub const ACTIVE_SUBROUTINES: u32 = 0x8DE5;
pub const ACTIVE_SUBROUTINE_UNIFORMS: u32 = 0x8DE6;
pub const ACTIVE_SUBROUTINE_UNIFORM_LOCATIONS: u32 = 0x8E47;
pub const ACTIVE_SUBROUTINE_MAX_LENGTH: u32 = 0x8E48;
pub const ACTIVE_SUBROUTINE_UNIFORM_MAX_LENGTH: u32 = 0x8E49;

/// Reflection record returned by the active attribute/uniform/varying queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveInfo {
    pub name: String,
    /// Array length as reported by the driver (1 for non-arrays).
    pub size: i32,
    pub gl_type: u32,
}

/// Which `glVertexAttrib*Pointer` family an attribute is bound with.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AttribKind {
    /// `glVertexAttribPointer`: converted to float in the shader.
    Float,
    /// `glVertexAttribIPointer`: kept as integers.
    Integer,
    /// `glVertexAttribLPointer`: 64-bit doubles.
    Double,
}

/// The native function table.
///
/// Methods mirror the GL entry points closely; validation belongs to the
/// object layer, not to implementations of this trait. All calls happen on the
/// thread that owns the native context.
pub trait Gl {
    /// Short backend name used in logs.
    fn name(&self) -> &str;

    // ── queries ───────────────────────────────────────────────────────────

    fn get_error(&self) -> u32;
    fn get_parameter_i32(&self, pname: u32) -> i32;
    fn get_parameter_i32_slice(&self, pname: u32, out: &mut [i32]);
    fn get_parameter_f32(&self, pname: u32) -> f32;
    fn get_parameter_string(&self, pname: u32) -> String;
    fn extensions(&self) -> Vec<String>;

    // ── fixed-function state ──────────────────────────────────────────────

    fn enable(&self, cap: u32);
    fn disable(&self, cap: u32);
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn scissor(&self, x: i32, y: i32, width: i32, height: i32);
    fn color_mask_indexed(&self, index: u32, mask: [bool; 4]);
    fn depth_mask(&self, flag: bool);
    fn clear_color(&self, color: [f32; 4]);
    fn clear_depth(&self, depth: f32);
    fn clear(&self, mask: u32);
    fn blend_func_separate(&self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32);
    fn blend_equation_separate(&self, mode_rgb: u32, mode_alpha: u32);
    fn depth_func(&self, func: u32);
    fn cull_face(&self, face: u32);
    fn front_face(&self, mode: u32);
    fn polygon_mode(&self, face: u32, mode: u32);
    fn polygon_offset(&self, factor: f32, units: f32);
    fn line_width(&self, width: f32);
    fn provoking_vertex(&self, mode: u32);
    fn patch_parameter_i32(&self, pname: u32, value: i32);
    fn pixel_store_i32(&self, pname: u32, value: i32);
    fn flush(&self);
    fn finish(&self);

    // ── buffers ───────────────────────────────────────────────────────────

    fn create_buffer(&self) -> Result<u32, String>;
    fn delete_buffer(&self, buffer: u32);
    fn bind_buffer(&self, target: u32, buffer: u32);
    /// Allocates `size` bytes; `data`, when given, is exactly `size` bytes long.
    fn buffer_data(&self, target: u32, size: usize, data: Option<&[u8]>, usage: u32);
    fn buffer_sub_data(&self, target: u32, offset: usize, data: &[u8]);
    fn get_buffer_sub_data(&self, target: u32, offset: usize, out: &mut [u8]);
    fn copy_buffer_sub_data(
        &self,
        read_target: u32,
        write_target: u32,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    );
    fn bind_buffer_base(&self, target: u32, index: u32, buffer: u32);
    fn bind_buffer_range(&self, target: u32, index: u32, buffer: u32, offset: usize, size: usize);

    // ── textures ──────────────────────────────────────────────────────────

    fn create_texture(&self) -> Result<u32, String>;
    fn delete_texture(&self, texture: u32);
    /// Selects texture unit `unit` (zero based, not `GL_TEXTURE0 + unit`).
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, target: u32, texture: u32);
    #[allow(clippy::too_many_arguments)]
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
    );
    #[allow(clippy::too_many_arguments)]
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
    );
    fn tex_image_2d_multisample(
        &self,
        target: u32,
        samples: i32,
        internal_format: u32,
        width: i32,
        height: i32,
    );
    #[allow(clippy::too_many_arguments)]
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
    );
    #[allow(clippy::too_many_arguments)]
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
    );
    fn get_tex_image(&self, target: u32, level: i32, format: u32, ty: u32, out: &mut [u8]);
    fn tex_parameter_i32(&self, target: u32, pname: u32, value: i32);
    fn tex_parameter_f32(&self, target: u32, pname: u32, value: f32);
    fn tex_parameter_i32_slice(&self, target: u32, pname: u32, values: &[i32]);
    fn generate_mipmap(&self, target: u32);

    // ── renderbuffers ─────────────────────────────────────────────────────

    fn create_renderbuffer(&self) -> Result<u32, String>;
    fn delete_renderbuffer(&self, renderbuffer: u32);
    fn bind_renderbuffer(&self, renderbuffer: u32);
    /// `samples == 0` allocates single-sampled storage.
    fn renderbuffer_storage(&self, samples: i32, internal_format: u32, width: i32, height: i32);

    // ── samplers ──────────────────────────────────────────────────────────

    fn create_sampler(&self) -> Result<u32, String>;
    fn delete_sampler(&self, sampler: u32);
    fn bind_sampler(&self, unit: u32, sampler: u32);
    fn sampler_parameter_i32(&self, sampler: u32, pname: u32, value: i32);
    fn sampler_parameter_f32(&self, sampler: u32, pname: u32, value: f32);
    fn sampler_parameter_f32_slice(&self, sampler: u32, pname: u32, values: &[f32]);

    // ── queries ───────────────────────────────────────────────────────────

    fn create_query(&self) -> Result<u32, String>;
    fn delete_query(&self, query: u32);
    fn begin_query(&self, target: u32, query: u32);
    fn end_query(&self, target: u32);
    /// Blocks until the result is available.
    fn get_query_result(&self, query: u32) -> u64;

    // ── framebuffers ──────────────────────────────────────────────────────

    fn create_framebuffer(&self) -> Result<u32, String>;
    fn delete_framebuffer(&self, framebuffer: u32);
    fn bind_framebuffer(&self, target: u32, framebuffer: u32);
    fn framebuffer_texture_2d(
        &self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: u32,
        level: i32,
    );
    fn framebuffer_texture_layer(
        &self,
        target: u32,
        attachment: u32,
        texture: u32,
        level: i32,
        layer: i32,
    );
    fn framebuffer_renderbuffer(&self, target: u32, attachment: u32, renderbuffer: u32);
    fn check_framebuffer_status(&self, target: u32) -> u32;
    fn draw_buffers(&self, buffers: &[u32]);
    fn read_buffer(&self, source: u32);
    #[allow(clippy::too_many_arguments)]
    fn read_pixels(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        out: &mut [u8],
    );
    fn blit_framebuffer(&self, src: [i32; 4], dst: [i32; 4], mask: u32, filter: u32);

    // ── shaders and programs ──────────────────────────────────────────────

    fn create_shader(&self, stage: u32) -> Result<u32, String>;
    fn delete_shader(&self, shader: u32);
    fn shader_source(&self, shader: u32, source: &str);
    fn compile_shader(&self, shader: u32);
    fn shader_compile_status(&self, shader: u32) -> bool;
    fn shader_info_log(&self, shader: u32) -> String;
    fn create_program(&self) -> Result<u32, String>;
    fn delete_program(&self, program: u32);
    fn attach_shader(&self, program: u32, shader: u32);
    fn detach_shader(&self, program: u32, shader: u32);
    fn transform_feedback_varyings(&self, program: u32, varyings: &[&str], buffer_mode: u32);
    fn link_program(&self, program: u32);
    fn program_link_status(&self, program: u32) -> bool;
    fn program_info_log(&self, program: u32) -> String;
    fn use_program(&self, program: u32);
    fn get_program_parameter_i32(&self, program: u32, pname: u32) -> i32;

    // ── reflection ────────────────────────────────────────────────────────

    fn active_attribute_count(&self, program: u32) -> u32;
    fn get_active_attribute(&self, program: u32, index: u32) -> Option<ActiveInfo>;
    /// Returns -1 for names that are not active attributes.
    fn get_attrib_location(&self, program: u32, name: &str) -> i32;
    fn active_uniform_count(&self, program: u32) -> u32;
    fn get_active_uniform(&self, program: u32, index: u32) -> Option<ActiveInfo>;
    /// Returns -1 for block members and eliminated uniforms.
    fn get_uniform_location(&self, program: u32, name: &str) -> i32;
    fn active_uniform_block_count(&self, program: u32) -> u32;
    fn get_active_uniform_block_name(&self, program: u32, index: u32) -> String;
    fn get_active_uniform_block_parameter_i32(&self, program: u32, index: u32, pname: u32) -> i32;
    fn uniform_block_binding(&self, program: u32, index: u32, binding: u32);
    fn transform_feedback_varying_count(&self, program: u32) -> u32;
    fn get_transform_feedback_varying(&self, program: u32, index: u32) -> Option<ActiveInfo>;

    // ── subroutines ───────────────────────────────────────────────────────
    //
    // Shader subroutines are a 4.0 feature. Contexts without them answer
    // every call below with `Err`.

    fn get_program_stage_i32(&self, program: u32, stage: u32, pname: u32) -> Result<i32, String>;
    fn get_active_subroutine_name(&self, program: u32, stage: u32, index: u32) -> Result<String, String>;
    fn get_active_subroutine_uniform_name(&self, program: u32, stage: u32, index: u32)
    -> Result<String, String>;
    fn uniform_subroutines(&self, stage: u32, indices: &[u32]) -> Result<(), String>;

    // ── uniform values ────────────────────────────────────────────────────

    /// Uploads `count` elements of `gl_type` to `location` of the current
    /// program. `Err` when the context has no upload path for the type.
    fn uniform_write(&self, location: i32, gl_type: u32, count: i32, data: &[u8]) -> Result<(), String>;
    /// Reads one element of `gl_type` at `location` of `program`.
    fn uniform_read(&self, program: u32, location: i32, gl_type: u32, out: &mut [u8]) -> Result<(), String>;

    // ── vertex arrays ─────────────────────────────────────────────────────

    fn create_vertex_array(&self) -> Result<u32, String>;
    fn delete_vertex_array(&self, vertex_array: u32);
    fn bind_vertex_array(&self, vertex_array: u32);
    fn enable_vertex_attrib_array(&self, location: u32);
    #[allow(clippy::too_many_arguments)]
    fn vertex_attrib_pointer(
        &self,
        location: u32,
        size: i32,
        ty: u32,
        normalized: bool,
        stride: i32,
        offset: usize,
        kind: AttribKind,
    );
    fn vertex_attrib_divisor(&self, location: u32, divisor: u32);

    // ── draws ─────────────────────────────────────────────────────────────

    fn draw_arrays_instanced(&self, mode: u32, first: i32, count: i32, instances: i32);
    fn draw_elements_instanced(
        &self,
        mode: u32,
        count: i32,
        index_type: u32,
        offset: usize,
        instances: i32,
    );
    fn draw_arrays_indirect(&self, mode: u32, offset: usize);
    fn draw_elements_indirect(&self, mode: u32, index_type: u32, offset: usize);
    fn begin_transform_feedback(&self, primitive: u32);
    fn end_transform_feedback(&self);
}

/// Produces a native function table.
///
/// `Device::create` tries loaders in order and keeps the first success.
pub trait Loader {
    fn name(&self) -> &str;
    fn load(&mut self) -> anyhow::Result<Box<dyn Gl>>;
}
