//! Shader programs: compilation, linking and reflection.
//!
//! A [`Program`] is built from [`ShaderSources`]. Compile and link failures
//! are logged at `error` with the driver log and returned as
//! [`GlError::Compile`] / [`GlError::Link`]; no native object outlives a
//! failed build.
//!
//! After linking, every active member is reflected into a table keyed by its
//! canonical name: a trailing array subscript is stripped, so `lights[0]` is
//! found as `lights` with its array length recorded on the member.

mod members;
mod reflect;
mod sources;
pub mod types;

pub use members::{Attribute, Member, Subroutine, Uniform, UniformBlock, Varying};
pub use sources::{CaptureMode, ShaderSources, Stage};

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::device::{Device, DeviceInner};
use crate::error::{GlError, Result};
use crate::primitive::Primitive;
use crate::resource::{allocate, allocate_with, GlHandle, ObjectKind};

/// Topology declared by a geometry stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Geometry {
    pub input: Primitive,
    pub output: Primitive,
    /// `max_vertices` of the output layout.
    pub vertices: u32,
}

pub(crate) struct ProgramShared {
    pub(crate) handle: GlHandle,
    stages: Vec<Stage>,
    capture: CaptureMode,
    attributes: BTreeMap<String, Attribute>,
    uniforms: BTreeMap<String, Uniform>,
    uniform_blocks: BTreeMap<String, UniformBlock>,
    varyings: BTreeMap<String, Varying>,
    subroutines: BTreeMap<String, Subroutine>,
    subroutine_uniforms: Vec<(Stage, Vec<String>)>,
    geometry: Option<Geometry>,
}

/// A linked program and its reflected interface.
#[derive(Clone)]
pub struct Program {
    shared: Rc<ProgramShared>,
}

impl PartialEq for Program {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("glo", &self.glo())
            .field("stages", &self.shared.stages)
            .field("attributes", &self.shared.attributes.len())
            .field("uniforms", &self.shared.uniforms.len())
            .field("varyings", &self.shared.varyings.len())
            .finish()
    }
}

impl Device {
    /// Compiles every present stage, links them and reflects the result.
    pub fn program(&self, sources: &ShaderSources) -> Result<Program> {
        let device = self.inner();
        let handle = allocate(device, ObjectKind::Program)?;
        let glo = handle.glo();
        let gl = device.gl();

        let mut stages = Vec::new();
        // Dropped (and deleted) on every path out of this function.
        let mut shaders = Vec::new();
        for (stage, source) in sources.stages() {
            let shader = allocate_with(device, ObjectKind::Shader, |gl| gl.create_shader(stage.gl_enum()))?;
            gl.shader_source(shader.glo(), source);
            gl.compile_shader(shader.glo());
            if !gl.shader_compile_status(shader.glo()) {
                let err = GlError::Compile { stage: stage.title(), log: gl.shader_info_log(shader.glo()) };
                log::error!("{err}");
                return Err(err);
            }
            gl.attach_shader(glo, shader.glo());
            stages.push(stage);
            shaders.push(shader);
        }

        if !sources.varyings.is_empty() {
            let names: Vec<&str> = sources.varyings.iter().map(String::as_str).collect();
            gl.transform_feedback_varyings(glo, &names, sources.capture.gl_enum());
        }
        gl.link_program(glo);
        for shader in &shaders {
            gl.detach_shader(glo, shader.glo());
        }
        drop(shaders);
        if !gl.program_link_status(glo) {
            let err = GlError::Link { log: gl.program_info_log(glo) };
            log::error!("{err}");
            return Err(err);
        }

        let subroutine_stages: &[Stage] = if device.version_code >= 400 { &stages } else { &[] };
        let (subroutines, subroutine_uniforms) =
            reflect::subroutines(gl, glo, subroutine_stages).inspect_err(|err| log::error!("{err}"))?;
        let geometry = if stages.contains(&Stage::Geometry) { reflect::geometry(gl, glo) } else { None };
        let shared = Rc::new_cyclic(|owner| ProgramShared {
            attributes: reflect::attributes(gl, glo),
            uniforms: reflect::uniforms(gl, glo, owner),
            uniform_blocks: reflect::uniform_blocks(gl, glo, owner),
            varyings: reflect::varyings(gl, glo),
            subroutines,
            subroutine_uniforms,
            geometry,
            stages,
            capture: sources.capture,
            handle,
        });
        device.check("building a program");
        log::debug!(
            "program {glo}: {} attributes, {} uniforms, {} blocks, {} varyings",
            shared.attributes.len(),
            shared.uniforms.len(),
            shared.uniform_blocks.len(),
            shared.varyings.len()
        );
        Ok(Program { shared })
    }
}

impl Program {
    pub fn glo(&self) -> u32 {
        self.shared.handle.glo()
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

    // ── stages ────────────────────────────────────────────────────────────

    pub fn stages(&self) -> &[Stage] {
        &self.shared.stages
    }

    pub fn has_stage(&self, stage: Stage) -> bool {
        self.shared.stages.contains(&stage)
    }

    /// `true` when there is no fragment stage.
    pub fn is_transform(&self) -> bool {
        !self.has_stage(Stage::Fragment)
    }

    pub fn has_tessellation(&self) -> bool {
        self.has_stage(Stage::TessEvaluation)
    }

    pub fn capture_mode(&self) -> CaptureMode {
        self.shared.capture
    }

    pub fn geometry(&self) -> Option<Geometry> {
        self.shared.geometry
    }

    pub fn geometry_input(&self) -> Option<Primitive> {
        self.shared.geometry.map(|g| g.input)
    }

    pub fn geometry_output(&self) -> Option<Primitive> {
        self.shared.geometry.map(|g| g.output)
    }

    pub fn geometry_vertices(&self) -> Option<u32> {
        self.shared.geometry.map(|g| g.vertices)
    }

    // ── members ───────────────────────────────────────────────────────────

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.shared.attributes.get(name)
    }

    pub fn uniform(&self, name: &str) -> Option<&Uniform> {
        self.shared.uniforms.get(name)
    }

    pub fn uniform_block(&self, name: &str) -> Option<&UniformBlock> {
        self.shared.uniform_blocks.get(name)
    }

    pub fn varying(&self, name: &str) -> Option<&Varying> {
        self.shared.varyings.get(name)
    }

    pub fn subroutine(&self, name: &str) -> Option<&Subroutine> {
        self.shared.subroutines.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.shared.attributes.values()
    }

    pub fn uniforms(&self) -> impl Iterator<Item = &Uniform> {
        self.shared.uniforms.values()
    }

    /// Varyings in capture order.
    pub fn varyings(&self) -> Vec<&Varying> {
        let mut out: Vec<&Varying> = self.shared.varyings.values().collect();
        out.sort_by_key(|v| v.number);
        out
    }

    /// Looks `name` up among attributes, uniforms, uniform blocks, varyings
    /// and subroutines, in that order.
    pub fn member(&self, name: &str) -> Option<Member<'_>> {
        let s = &self.shared;
        s.attributes
            .get(name)
            .map(Member::Attribute)
            .or_else(|| s.uniforms.get(name).map(Member::Uniform))
            .or_else(|| s.uniform_blocks.get(name).map(Member::UniformBlock))
            .or_else(|| s.varyings.get(name).map(Member::Varying))
            .or_else(|| s.subroutines.get(name).map(Member::Subroutine))
    }

    /// Every member name; a name shared by two kinds appears once.
    pub fn names(&self) -> Vec<&str> {
        let s = &self.shared;
        let mut names: Vec<&str> = s
            .attributes
            .keys()
            .chain(s.uniforms.keys())
            .chain(s.uniform_blocks.keys())
            .chain(s.varyings.keys())
            .chain(s.subroutines.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Subroutine uniform names of `stage`, ordered by location.
    pub fn subroutine_uniforms(&self, stage: Stage) -> &[String] {
        self.shared
            .subroutine_uniforms
            .iter()
            .find(|(s, _)| *s == stage)
            .map_or(&[], |(_, names)| names.as_slice())
    }

    /// Total subroutine uniforms across stages: the length of a selection
    /// passed to [`VertexArray::set_subroutines`](crate::VertexArray::set_subroutines).
    pub fn subroutine_uniform_count(&self) -> usize {
        self.shared.subroutine_uniforms.iter().map(|(_, names)| names.len()).sum()
    }

    /// Native stage enum and uniform count per stage, in pipeline order.
    pub(crate) fn subroutine_layout(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.shared.subroutine_uniforms.iter().map(|(stage, names)| (stage.gl_enum(), names.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{HeadlessBackend, HeadlessConfig};

    fn device() -> (Device, HeadlessBackend) {
        Device::headless(HeadlessConfig::default()).unwrap()
    }

    const VS: &str = "
        #version 330
        in vec3 in_vert;
        in mat4 in_model;
        uniform mat4 mvp;
        uniform vec3 lights[4];
        uniform float unused;
        layout(std140) uniform Material { vec4 color; float shininess; };
        out vec3 v_color;
        void main() {
            v_color = lights[0] * color.rgb * shininess;
            gl_Position = mvp * in_model * vec4(in_vert, 1.0);
        }
    ";
    const FS: &str = "
        #version 330
        in vec3 v_color;
        out vec4 f_color;
        void main() { f_color = vec4(v_color, 1.0); }
    ";

    // ── building ──────────────────────────────────────────────────────────

    #[test]
    fn reflects_the_linked_interface() {
        let (device, _) = device();
        let program = device.program(&ShaderSources::new(VS).fragment(FS)).unwrap();
        assert!(!program.is_transform());

        let model = program.attribute("in_model").unwrap();
        assert_eq!((model.dimension(), model.location_span()), (4, 4));
        let lights = program.uniform("lights").unwrap();
        assert_eq!(lights.array_length(), 4);
        assert!(program.uniform("lights[0]").is_none());
        assert!(program.uniform("unused").is_none(), "eliminated uniforms are skipped");
        assert!(program.uniform("color").is_none(), "block members have no location");
        assert_eq!(program.uniform_block("Material").unwrap().size(), 32);
        assert!(matches!(program.member("mvp"), Some(Member::Uniform(_))));
        assert!(program.names().contains(&"in_vert"));
    }

    #[test]
    fn compile_failure_is_reported_and_cleaned_up() {
        let (device, backend) = device();
        let err = device.program(&ShaderSources::new(VS).fragment("#error nope\nvoid main() {}")).unwrap_err();
        match err {
            GlError::Compile { stage, log } => {
                assert_eq!(stage, "fragment_shader");
                assert!(log.contains("error"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(backend.live_objects(), 0);
    }

    #[test]
    fn link_failure_is_reported_and_cleaned_up() {
        let (device, backend) = device();
        let sources = ShaderSources::new(VS).varyings(&["v_missing"]);
        let err = device.program(&sources).unwrap_err();
        assert!(matches!(err, GlError::Link { ref log } if log.contains("v_missing")));
        assert_eq!(backend.live_objects(), 0);
    }

    #[test]
    fn shaders_are_deleted_after_linking() {
        let (device, backend) = device();
        let program = device.program(&ShaderSources::new(VS).fragment(FS)).unwrap();
        assert_eq!(backend.count_calls("delete_shader"), 2);
        program.release();
        assert_eq!(backend.live_objects(), 0);
    }

    // ── members ───────────────────────────────────────────────────────────

    #[test]
    fn partial_array_writes_keep_other_elements() {
        let (device, backend) = device();
        let program = device.program(&ShaderSources::new(VS).fragment(FS)).unwrap();
        let lights = program.uniform("lights").unwrap();
        let all: Vec<f32> = (0..12).map(|i| i as f32).collect();
        lights.set(&all).unwrap();
        lights.set(&[-1.0f32, -1.0, -1.0]).unwrap();

        let values: Vec<f32> = lights.get().unwrap();
        assert_eq!(&values[..3], &[-1.0, -1.0, -1.0]);
        assert_eq!(&values[3..], &all[3..]);
        assert_eq!(backend.current_program(), program.glo());
    }

    #[test]
    fn uniform_size_is_checked() {
        let (device, _) = device();
        let program = device.program(&ShaderSources::new(VS).fragment(FS)).unwrap();
        let mvp = program.uniform("mvp").unwrap();
        assert!(mvp.set(&[0.0f32; 15]).is_err());
        assert!(mvp.set(&[0.0f32; 32]).is_err());
        assert!(mvp.set(&[1.0f32; 16]).is_ok());
    }

    #[test]
    fn block_binding_reaches_the_driver() {
        let (device, backend) = device();
        let program = device.program(&ShaderSources::new(VS).fragment(FS)).unwrap();
        let block = program.uniform_block("Material").unwrap();
        block.set_binding(3);
        assert_eq!(block.binding(), 3);
        let expected = format!("uniform_block_binding({}, {}, 3)", program.glo(), block.index());
        assert_eq!(backend.count_calls(&expected), 1);
    }

    #[test]
    fn varyings_follow_capture_order() {
        let (device, _) = device();
        let vs = "
            in vec3 in_vert;
            out vec3 out_vert;
            out float out_len;
            void main() { out_vert = in_vert; out_len = length(in_vert); }
        ";
        let sources = ShaderSources::new(vs).varyings(&["out_vert", "out_len"]);
        let program = device.program(&sources).unwrap();
        assert!(program.is_transform());
        let names: Vec<&str> = program.varyings().iter().map(|v| v.name()).collect();
        assert_eq!(names, vec!["out_vert", "out_len"]);
        assert_eq!(program.varying("out_vert").unwrap().size(), 12);
    }

    #[test]
    fn geometry_layout_is_captured() {
        let (device, _) = device();
        let gs = "
            #version 330
            layout(triangles) in;
            layout(line_strip, max_vertices = 6) out;
            void main() {}
        ";
        let program = device.program(&ShaderSources::new(VS).geometry(gs).fragment(FS)).unwrap();
        assert_eq!(program.geometry_input(), Some(Primitive::Triangles));
        assert_eq!(program.geometry_output(), Some(Primitive::LineStrip));
        assert_eq!(program.geometry_vertices(), Some(6));
    }

    #[test]
    fn subroutines_need_a_400_context() {
        let fs = "
            #version 400
            subroutine vec4 Shade();
            subroutine(Shade) vec4 red() { return vec4(1.0, 0.0, 0.0, 1.0); }
            subroutine(Shade) vec4 blue() { return vec4(0.0, 0.0, 1.0, 1.0); }
            subroutine uniform Shade shade;
            out vec4 f_color;
            void main() { f_color = shade(); }
        ";
        let (old, _) = device();
        let program = old.program(&ShaderSources::new(VS).fragment(fs)).unwrap();
        assert!(program.subroutine("blue").is_none());

        let (device, _) = Device::headless(HeadlessConfig { version: (4, 1), ..Default::default() }).unwrap();
        let program = device.program(&ShaderSources::new(VS).fragment(fs)).unwrap();
        assert_eq!(program.subroutine("blue").unwrap().index(), 1);
        assert_eq!(program.subroutine_uniforms(Stage::Fragment), ["shade".to_string()]);
        assert_eq!(program.subroutine_uniform_count(), 1);
    }
}
