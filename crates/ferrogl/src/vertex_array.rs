//! Vertex arrays: attribute bindings described by layout strings, draws and
//! transform feedback.
//!
//! A [`VertexArray`] ties one [`Program`] to a set of [`VertexStream`]s. Each
//! stream is a buffer, a layout string (see `ferrogl_layout`) and one
//! attribute name per bindable node of that layout. Names the program does not
//! use are skipped; their bytes still count towards the stride, so one buffer
//! can feed several program variants.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use ferrogl_layout::{Divisor, FormatNode, Kind, VertexFormat};

use crate::buffer::Buffer;
use crate::device::{Device, DeviceInner, EnableFlags};
use crate::error::{GlError, Result};
use crate::gl::AttribKind;
use crate::primitive::Primitive;
use crate::program::{Attribute, Program};
use crate::resource::{allocate, GlHandle, ObjectKind};

/// One buffer bound to a vertex array.
#[derive(Debug, Clone)]
pub struct VertexStream {
    pub buffer: Buffer,
    /// Layout string such as `"3f 2f"` or `"16f/i"`.
    pub layout: String,
    /// One name per non-padding node of `layout`.
    pub attributes: Vec<String>,
}

impl VertexStream {
    pub fn new(buffer: &Buffer, layout: &str, attributes: &[&str]) -> Self {
        Self {
            buffer: buffer.clone(),
            layout: layout.to_string(),
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct IndexBuffer {
    buffer: Buffer,
    element_size: u32,
}

impl IndexBuffer {
    fn gl_type(&self) -> u32 {
        match self.element_size {
            1 => glow::UNSIGNED_BYTE,
            2 => glow::UNSIGNED_SHORT,
            _ => glow::UNSIGNED_INT,
        }
    }

    fn count(&self) -> i32 {
        (self.buffer.size() / self.element_size as usize) as i32
    }
}

struct VertexArrayShared {
    handle: GlHandle,
    program: Program,
    /// Buffers referenced by attribute bindings, kept alive with the array.
    buffers: RefCell<Vec<Buffer>>,
    index: RefCell<Option<IndexBuffer>>,
    vertices: Cell<i32>,
    instances: Cell<i32>,
    subroutines: RefCell<Vec<u32>>,
}

/// A native vertex array bound to one program.
#[derive(Clone)]
pub struct VertexArray {
    shared: Rc<VertexArrayShared>,
}

impl PartialEq for VertexArray {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for VertexArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexArray")
            .field("glo", &self.glo())
            .field("program", &self.shared.program.glo())
            .field("vertices", &self.vertices())
            .field("instances", &self.instances())
            .field("indexed", &self.shared.index.borrow().is_some())
            .finish()
    }
}

fn check_element_size(element_size: u32) -> Result<()> {
    match element_size {
        1 | 2 | 4 => Ok(()),
        _ => Err(GlError::invalid(format!("index element size must be 1, 2 or 4 (got {element_size})"))),
    }
}

/// Logs a build failure before handing it back.
fn reject<T>(err: GlError) -> Result<T> {
    log::error!("cannot build vertex array: {err}");
    Err(err)
}

/// Binds one layout node to `attribute`, one native location per row.
fn bind_node(
    device: &DeviceInner,
    attribute: &Attribute,
    node: &FormatNode,
    buffer: u32,
    offset: usize,
    stride: usize,
    divisor: u32,
) {
    let gl = device.gl();
    let rows = attribute.location_span().max(1);
    let components = (node.count / rows).max(1) as i32;
    let row_size = (node.size / rows) as usize;
    let kind = match (attribute.shape(), node.kind) {
        ('d', _) => AttribKind::Double,
        ('i' | 'u', Kind::Int | Kind::UInt) => AttribKind::Integer,
        _ => AttribKind::Float,
    };
    gl.bind_buffer(glow::ARRAY_BUFFER, buffer);
    for row in 0..rows {
        let location = attribute.location() + row;
        gl.enable_vertex_attrib_array(location);
        gl.vertex_attrib_pointer(
            location,
            components,
            node.scalar.gl_type(),
            node.normalize,
            stride as i32,
            offset + row as usize * row_size,
            kind,
        );
        gl.vertex_attrib_divisor(location, divisor);
    }
}

impl Device {
    /// Builds a vertex array feeding `program` from `streams`.
    ///
    /// Every failure is logged and returned before any native object is
    /// created, so nothing is left half built. `index_element_size` is only
    /// looked at when `index_buffer` is given.
    pub fn vertex_array(
        &self,
        program: &Program,
        streams: &[VertexStream],
        index_buffer: Option<&Buffer>,
        index_element_size: u32,
    ) -> Result<VertexArray> {
        let device = self.inner();
        assert!(program.belongs_to(device), "program {} belongs to another device", program.glo());

        let mut formats: Vec<VertexFormat> = Vec::with_capacity(streams.len());
        for (i, stream) in streams.iter().enumerate() {
            if !stream.buffer.belongs_to(device) {
                return reject(GlError::invalid(format!("stream {i}: the buffer belongs to another device")));
            }
            let format = match ferrogl_layout::parse(&stream.layout) {
                Ok(format) => format,
                Err(err) => return reject(err.into()),
            };
            let nodes = format.info().nodes as usize;
            if nodes != stream.attributes.len() {
                return reject(GlError::invalid(format!(
                    "stream {i}: layout {:?} has {nodes} attributes but {} names were given",
                    stream.layout,
                    stream.attributes.len()
                )));
            }
            formats.push(format);
        }
        let index = match index_buffer {
            Some(buffer) => {
                if let Err(err) = check_element_size(index_element_size) {
                    return reject(err);
                }
                if !buffer.belongs_to(device) {
                    return reject(GlError::invalid("the index buffer belongs to another device"));
                }
                Some(IndexBuffer { buffer: buffer.clone(), element_size: index_element_size })
            }
            None => None,
        };

        let handle = allocate(device, ObjectKind::VertexArray)?;
        let gl = device.gl();
        gl.bind_vertex_array(handle.glo());

        let mut vertices: Option<i32> = None;
        for (stream, format) in streams.iter().zip(&formats) {
            let info = format.info();
            let divisor = format.divisor().value();
            let mut offset = 0usize;
            let mut names = stream.attributes.iter();
            for token in format.tokens() {
                if let Some(node) = token.node() {
                    let name = names.next().map(String::as_str).unwrap_or_default();
                    match program.attribute(name) {
                        Some(attribute) => {
                            bind_node(device, attribute, node, stream.buffer.glo(), offset, info.size as usize, divisor)
                        }
                        None => log::debug!("attribute {name:?} is not used by program {}; skipped", program.glo()),
                    }
                }
                offset += token.size() as usize;
            }
            if format.divisor() == Divisor::PerVertex && info.size > 0 {
                let count = (stream.buffer.size() / info.size as usize) as i32;
                vertices = Some(vertices.map_or(count, |v| v.min(count)));
            }
        }
        if let Some(index) = &index {
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, index.buffer.glo());
            vertices = Some(index.count());
        }
        gl.bind_vertex_array(0);
        device.check("building a vertex array");
        log::trace!("vertex array {} feeds program {}", handle.glo(), program.glo());

        Ok(VertexArray {
            shared: Rc::new(VertexArrayShared {
                handle,
                program: program.clone(),
                buffers: RefCell::new(streams.iter().map(|s| s.buffer.clone()).collect()),
                index: RefCell::new(index),
                vertices: Cell::new(vertices.unwrap_or(0)),
                instances: Cell::new(1),
                subroutines: RefCell::new(Vec::new()),
            }),
        })
    }
}

impl VertexArray {
    pub fn glo(&self) -> u32 {
        self.shared.handle.glo()
    }

    pub fn program(&self) -> &Program {
        &self.shared.program
    }

    pub fn release(&self) {
        self.shared.handle.release();
    }

    pub fn released(&self) -> bool {
        self.shared.handle.released()
    }

    /// Vertices drawn when a draw call does not say.
    pub fn vertices(&self) -> i32 {
        self.shared.vertices.get()
    }

    pub fn set_vertices(&self, vertices: i32) {
        self.shared.vertices.set(vertices);
    }

    /// Instances drawn when a draw call does not say.
    pub fn instances(&self) -> i32 {
        self.shared.instances.get()
    }

    pub fn set_instances(&self, instances: i32) {
        self.shared.instances.set(instances);
    }

    pub fn index_buffer(&self) -> Option<Buffer> {
        self.shared.index.borrow().as_ref().map(|i| i.buffer.clone())
    }

    /// Subroutine selection applied before every draw.
    pub fn subroutines(&self) -> Vec<u32> {
        self.shared.subroutines.borrow().clone()
    }

    /// Selects one subroutine index per subroutine uniform, stages in
    /// pipeline order. An empty selection turns selection off.
    pub fn set_subroutines(&self, indices: &[u32]) -> Result<()> {
        let version = self.shared.handle.device().version_code;
        if !indices.is_empty() && version < 400 {
            return Err(GlError::invalid(format!(
                "shader subroutines need a 4.0 context, this one reports version code {version}"
            )));
        }
        let expected = self.shared.program.subroutine_uniform_count();
        if !indices.is_empty() && indices.len() != expected {
            return Err(GlError::invalid(format!(
                "the program has {expected} subroutine uniforms, {} indices were given",
                indices.len()
            )));
        }
        *self.shared.subroutines.borrow_mut() = indices.to_vec();
        Ok(())
    }

    // ── bindings ──────────────────────────────────────────────────────────

    /// Binds a single-attribute `layout` of `buffer` to `attribute`.
    /// `divisor` overrides the layout's suffix.
    pub fn bind(
        &self,
        attribute: &str,
        buffer: &Buffer,
        layout: &str,
        offset: usize,
        stride: usize,
        divisor: Option<u32>,
    ) -> Result<()> {
        let device = self.shared.handle.device();
        assert!(buffer.belongs_to(&device), "buffer {} belongs to another device", buffer.glo());
        let format = ferrogl_layout::parse(layout)?;
        let mut nodes = format.nodes();
        let (Some(node), None) = (nodes.next(), nodes.next()) else {
            return Err(GlError::invalid(format!("layout {layout:?} must describe exactly one attribute")));
        };
        let Some(attr) = self.shared.program.attribute(attribute) else {
            return Err(GlError::invalid(format!("program {} has no attribute {attribute:?}", self.shared.program.glo())));
        };
        let gl = device.gl();
        gl.bind_vertex_array(self.glo());
        bind_node(&device, attr, node, buffer.glo(), offset, stride, divisor.unwrap_or(format.divisor().value()));
        gl.bind_vertex_array(0);
        device.check("binding an attribute");
        self.shared.buffers.borrow_mut().push(buffer.clone());
        Ok(())
    }

    /// Replaces (or with `None`, removes) the index buffer. The default vertex
    /// count follows the new buffer.
    pub fn set_index_buffer(&self, buffer: Option<&Buffer>, element_size: u32) -> Result<()> {
        let device = self.shared.handle.device();
        let index = match buffer {
            Some(buffer) => {
                check_element_size(element_size)?;
                assert!(buffer.belongs_to(&device), "buffer {} belongs to another device", buffer.glo());
                Some(IndexBuffer { buffer: buffer.clone(), element_size })
            }
            None => None,
        };
        let gl = device.gl();
        gl.bind_vertex_array(self.glo());
        gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, index.as_ref().map_or(0, |i| i.buffer.glo()));
        gl.bind_vertex_array(0);
        if let Some(index) = &index {
            self.shared.vertices.set(index.count());
        }
        *self.shared.index.borrow_mut() = index;
        Ok(())
    }

    // ── draws ─────────────────────────────────────────────────────────────

    fn check_geometry(&self, mode: Primitive) {
        if let Some(input) = self.shared.program.geometry_input() {
            assert!(
                mode.feeds(input),
                "{mode:?} cannot feed program {} whose geometry shader takes {input:?}",
                self.shared.program.glo()
            );
        }
    }

    /// Panics unless the program and every buffer the draw reads or writes
    /// are still alive. `extra` lists buffers passed to this draw only.
    fn check_live(&self, extra: &[&Buffer]) {
        let glo = self.glo();
        let program = &self.shared.program;
        assert!(!program.released(), "vertex array {glo} draws with released program {}", program.glo());
        let streams = self.shared.buffers.borrow();
        let index = self.shared.index.borrow();
        let used = streams.iter().chain(index.as_ref().map(|i| &i.buffer)).chain(extra.iter().copied());
        for buffer in used {
            assert!(!buffer.released(), "vertex array {glo} uses released buffer {}", buffer.glo());
        }
    }

    /// Makes the program current, applies the subroutine selection and binds
    /// the native vertex array.
    fn prepare(&self, extra: &[&Buffer]) -> Rc<DeviceInner> {
        let device = self.shared.handle.device();
        self.check_live(extra);
        let program = &self.shared.program;
        let gl = device.gl();
        gl.use_program(program.glo());
        let selection = self.shared.subroutines.borrow();
        if !selection.is_empty() {
            let mut rest = selection.as_slice();
            for (stage, count) in program.subroutine_layout() {
                let (head, tail) = rest.split_at(count.min(rest.len()));
                if let Err(message) = gl.uniform_subroutines(stage, head) {
                    panic!("vertex array {} cannot select subroutines: {message}", self.glo());
                }
                rest = tail;
            }
        }
        gl.bind_vertex_array(self.glo());
        device
    }

    fn draw(&self, device: &DeviceInner, mode: Primitive, vertices: Option<i32>, first: i32, instances: Option<i32>) {
        let gl = device.gl();
        let count = vertices.unwrap_or_else(|| self.vertices());
        let instances = instances.unwrap_or_else(|| self.instances());
        match self.shared.index.borrow().as_ref() {
            Some(index) => gl.draw_elements_instanced(
                mode.gl_enum(),
                count,
                index.gl_type(),
                first.max(0) as usize * index.element_size as usize,
                instances,
            ),
            None => gl.draw_arrays_instanced(mode.gl_enum(), first, count, instances),
        }
    }

    /// Draws `vertices` vertices (default: [`vertices`](Self::vertices))
    /// starting at `first`, `instances` times (default:
    /// [`instances`](Self::instances)).
    ///
    /// Panics when `mode` cannot feed the program's geometry shader.
    pub fn render(&self, mode: Primitive, vertices: Option<i32>, first: i32, instances: Option<i32>) {
        self.check_geometry(mode);
        let device = self.prepare(&[]);
        self.draw(&device, mode, vertices, first, instances);
        device.check("render");
    }

    /// Issues `count` indirect draws (default: every record after `first`)
    /// read from `buffer`. Records are 16 bytes for array draws and 20 bytes
    /// for indexed draws.
    pub fn render_indirect(&self, buffer: &Buffer, mode: Primitive, count: Option<usize>, first: usize) {
        self.check_geometry(mode);
        let device = self.shared.handle.device();
        assert!(buffer.belongs_to(&device), "buffer {} belongs to another device", buffer.glo());
        let index = self.shared.index.borrow().clone();
        let record = if index.is_some() { 20 } else { 16 };
        let count = count.unwrap_or_else(|| (buffer.size() / record).saturating_sub(first));
        assert!(
            (first + count) * record <= buffer.size(),
            "{count} indirect commands from {first} do not fit a buffer of {} bytes",
            buffer.size()
        );
        let device = self.prepare(&[buffer]);
        let gl = device.gl();
        gl.bind_buffer(glow::DRAW_INDIRECT_BUFFER, buffer.glo());
        for i in first..first + count {
            match &index {
                Some(index) => gl.draw_elements_indirect(mode.gl_enum(), index.gl_type(), i * record),
                None => gl.draw_arrays_indirect(mode.gl_enum(), i * record),
            }
        }
        device.check("indirect render");
    }

    /// Runs the vertex stages and captures the program's varyings into
    /// `outputs` (one buffer when interleaved, one per varying when separate).
    ///
    /// Rasterization is discarded for the duration of the call and the
    /// previous discard state restored afterwards. Panics when the program
    /// captures nothing or `mode` cannot feed its geometry shader; both are
    /// checked before any native call.
    pub fn transform(
        &self,
        outputs: &[&Buffer],
        mode: Primitive,
        vertices: Option<i32>,
        first: i32,
        instances: Option<i32>,
    ) {
        let program = &self.shared.program;
        assert!(!program.varyings().is_empty(), "program {} declares no varyings to capture", program.glo());
        assert!(!outputs.is_empty(), "transform needs at least one output buffer");
        let primitive = match program.geometry() {
            Some(geometry) => {
                self.check_geometry(mode);
                geometry.output.feedback_primitive()
            }
            None if mode == Primitive::Patches => {
                assert!(program.has_tessellation(), "patches need a tessellation stage to be captured");
                Some(glow::TRIANGLES)
            }
            None => mode.feedback_primitive(),
        };
        let Some(primitive) = primitive else {
            panic!("{mode:?} has no transform feedback primitive");
        };

        let device = self.shared.handle.device();
        for buffer in outputs {
            assert!(buffer.belongs_to(&device), "buffer {} belongs to another device", buffer.glo());
        }
        let device = self.prepare(outputs);
        let gl = device.gl();
        let discarding = device.enable_flags().contains(EnableFlags::RASTERIZER_DISCARD);
        gl.enable(glow::RASTERIZER_DISCARD);
        for (binding, buffer) in outputs.iter().enumerate() {
            gl.bind_buffer_base(glow::TRANSFORM_FEEDBACK_BUFFER, binding as u32, buffer.glo());
        }
        gl.begin_transform_feedback(primitive);
        self.draw(&device, mode, vertices, first, instances);
        gl.end_transform_feedback();
        if !discarding {
            gl.disable(glow::RASTERIZER_DISCARD);
        }
        gl.flush();
        device.check("transform");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{HeadlessBackend, HeadlessConfig};
    use crate::program::ShaderSources;

    fn device() -> (Device, HeadlessBackend) {
        Device::headless(HeadlessConfig::default()).unwrap()
    }

    const VS: &str = "
        #version 330
        in vec3 in_vert;
        in vec2 in_uv;
        in mat4 in_model;
        out vec2 v_uv;
        void main() { v_uv = in_uv; gl_Position = in_model * vec4(in_vert, 1.0); }
    ";
    const FS: &str = "
        #version 330
        in vec2 v_uv;
        out vec4 f_color;
        void main() { f_color = vec4(v_uv, 0.0, 1.0); }
    ";

    fn program(device: &Device) -> Program {
        device.program(&ShaderSources::new(VS).fragment(FS)).unwrap()
    }

    // ── building ──────────────────────────────────────────────────────────

    #[test]
    fn layouts_bind_attribute_pointers() {
        let (device, backend) = device();
        let program = program(&device);
        let vbo = device.buffer_reserved(4 * 24, false).unwrap();
        let stream = VertexStream::new(&vbo, "3f 1x4 2f", &["in_vert", "in_uv"]);
        let vao = device.vertex_array(&program, &[stream], None, 4).unwrap();
        assert_eq!(vao.vertices(), 4);

        let uv = program.attribute("in_uv").unwrap().location();
        let attrib = backend.vertex_attrib(vao.glo(), uv).unwrap();
        assert_eq!((attrib.buffer, attrib.size, attrib.stride, attrib.offset), (vbo.glo(), 2, 24, 16));
        assert!(attrib.enabled);
    }

    #[test]
    fn matrices_take_one_location_per_column() {
        let (device, backend) = device();
        let program = program(&device);
        let instances = device.buffer_reserved(64 * 3, false).unwrap();
        let stream = VertexStream::new(&instances, "16f/i", &["in_model"]);
        let vao = device.vertex_array(&program, &[stream], None, 4).unwrap();

        let base = program.attribute("in_model").unwrap().location();
        for column in 0..4 {
            let attrib = backend.vertex_attrib(vao.glo(), base + column).unwrap();
            assert_eq!((attrib.size, attrib.offset, attrib.divisor), (4, column as usize * 16, 1));
        }
        assert_eq!(vao.vertices(), 0, "per-instance streams do not bound the vertex count");
    }

    #[test]
    fn unused_names_are_skipped_but_advance_the_offset() {
        let (device, backend) = device();
        let program = program(&device);
        let vbo = device.buffer_reserved(64, false).unwrap();
        let stream = VertexStream::new(&vbo, "4f 2f", &["in_color", "in_uv"]);
        let vao = device.vertex_array(&program, &[stream], None, 4).unwrap();
        let uv = program.attribute("in_uv").unwrap().location();
        assert_eq!(backend.vertex_attrib(vao.glo(), uv).unwrap().offset, 16);
    }

    #[test]
    fn invalid_streams_fail_without_allocating() {
        let (device, backend) = device();
        let program = program(&device);
        let vbo = device.buffer_reserved(64, false).unwrap();
        let live = backend.live_objects();

        let bad_layout = VertexStream::new(&vbo, "3q", &["in_vert"]);
        assert!(matches!(
            device.vertex_array(&program, &[bad_layout], None, 4),
            Err(GlError::InvalidLayout(_))
        ));
        let bad_names = VertexStream::new(&vbo, "3f 2f", &["in_vert"]);
        assert!(device.vertex_array(&program, &[bad_names], None, 4).is_err());
        let stream = VertexStream::new(&vbo, "3f", &["in_vert"]);
        assert!(device.vertex_array(&program, &[stream], Some(&vbo), 3).is_err());
        assert_eq!(backend.live_objects(), live);
    }

    #[test]
    fn foreign_buffers_are_rejected() {
        let (device, _) = device();
        let (other, _) = self::device();
        let program = program(&device);
        let foreign = other.buffer_reserved(48, false).unwrap();
        let stream = VertexStream::new(&foreign, "3f", &["in_vert"]);
        assert!(device.vertex_array(&program, &[stream], None, 4).is_err());
    }

    // ── draws ─────────────────────────────────────────────────────────────

    #[test]
    fn index_buffer_drives_the_draw() {
        let (device, backend) = device();
        let program = program(&device);
        let vbo = device.buffer_reserved(12 * 4, false).unwrap();
        let ibo = device.buffer_pod(&[0u16, 1, 2, 2, 3, 0], false).unwrap();
        let stream = VertexStream::new(&vbo, "3f", &["in_vert"]);
        let vao = device.vertex_array(&program, &[stream], Some(&ibo), 2).unwrap();
        assert_eq!(backend.element_buffer(vao.glo()), ibo.glo());
        assert_eq!(vao.vertices(), 6);

        backend.take_calls();
        vao.render(Primitive::Triangles, None, 3, None);
        let expected = format!("draw_elements_instanced({:#x}, 6, {:#x}, 6, 1)", glow::TRIANGLES, glow::UNSIGNED_SHORT);
        assert_eq!(backend.count_calls(&expected), 1);
        assert_eq!(backend.current_program(), program.glo());
    }

    #[test]
    fn indirect_draws_issue_one_call_per_record() {
        let (device, backend) = device();
        let program = program(&device);
        let vbo = device.buffer_reserved(12 * 3, false).unwrap();
        let vao = device.vertex_array(&program, &[VertexStream::new(&vbo, "3f", &["in_vert"])], None, 4).unwrap();
        let commands = device.buffer_pod(&[3u32, 1, 0, 0, 3, 2, 0, 0, 3, 1, 0, 0], false).unwrap();
        backend.take_calls();
        vao.render_indirect(&commands, Primitive::Triangles, None, 1);
        assert_eq!(backend.count_calls("draw_arrays_indirect"), 2);
        assert_eq!(backend.count_calls(&format!("draw_arrays_indirect({:#x}, 16)", glow::TRIANGLES)), 1);
    }

    #[test]
    fn subroutine_selection_must_match_the_program() {
        let (device, _) = device();
        let program = program(&device);
        let vbo = device.buffer_reserved(48, false).unwrap();
        let vao = device.vertex_array(&program, &[VertexStream::new(&vbo, "3f", &["in_vert"])], None, 4).unwrap();
        assert!(vao.set_subroutines(&[1]).is_err());
        assert!(vao.set_subroutines(&[]).is_ok());
    }

    const SHADING_FS: &str = "
        #version 400
        subroutine vec4 Shade();
        subroutine(Shade) vec4 red() { return vec4(1.0, 0.0, 0.0, 1.0); }
        subroutine(Shade) vec4 blue() { return vec4(0.0, 0.0, 1.0, 1.0); }
        subroutine uniform Shade shade;
        out vec4 f_color;
        void main() { f_color = shade(); }
    ";

    #[test]
    fn subroutine_selection_needs_a_400_context() {
        let (device, _) = device();
        let program = device.program(&ShaderSources::new(VS).fragment(SHADING_FS)).unwrap();
        let vbo = device.buffer_reserved(48, false).unwrap();
        let vao = device.vertex_array(&program, &[VertexStream::new(&vbo, "3f", &["in_vert"])], None, 4).unwrap();
        let err = vao.set_subroutines(&[0]).unwrap_err();
        assert!(err.to_string().contains("4.0 context"), "{err}");
        assert!(vao.subroutines().is_empty());
    }

    #[test]
    fn subroutine_selection_is_applied_before_each_draw() {
        let (device, backend) = Device::headless(HeadlessConfig { version: (4, 1), ..Default::default() }).unwrap();
        let program = device.program(&ShaderSources::new(VS).fragment(SHADING_FS)).unwrap();
        let vbo = device.buffer_reserved(48, false).unwrap();
        let vao = device.vertex_array(&program, &[VertexStream::new(&vbo, "3f", &["in_vert"])], None, 4).unwrap();
        vao.set_subroutines(&[1]).unwrap();
        backend.take_calls();
        vao.render(Primitive::Triangles, None, 0, None);
        let selected = format!("uniform_subroutines({:#x}, [1])", glow::FRAGMENT_SHADER);
        assert_eq!(backend.count_calls(&selected), 1);
    }

    // ── released resources ────────────────────────────────────────────────

    #[test]
    #[should_panic(expected = "draws with released program")]
    fn rendering_after_program_release_panics() {
        let (device, backend) = device();
        let program = program(&device);
        let vbo = device.buffer_reserved(48, false).unwrap();
        let vao = device.vertex_array(&program, &[VertexStream::new(&vbo, "3f", &["in_vert"])], None, 4).unwrap();
        program.release();
        backend.take_calls();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            vao.render(Primitive::Triangles, None, 0, None)
        }));
        assert_eq!(backend.count_calls("use_program"), 0);
        assert_eq!(backend.count_calls("draw"), 0);
        if let Err(panic) = result {
            std::panic::resume_unwind(panic);
        }
    }

    #[test]
    #[should_panic(expected = "uses released buffer")]
    fn rendering_after_stream_release_panics() {
        let (device, _) = device();
        let program = program(&device);
        let vbo = device.buffer_reserved(48, false).unwrap();
        let vao = device.vertex_array(&program, &[VertexStream::new(&vbo, "3f", &["in_vert"])], None, 4).unwrap();
        vbo.release();
        vao.render(Primitive::Triangles, None, 0, None);
    }

    #[test]
    #[should_panic(expected = "uses released buffer")]
    fn transform_into_a_released_output_panics() {
        let (device, _) = device();
        let (vao, out) = feedback(&device);
        out.release();
        vao.transform(&[&out], Primitive::Triangles, None, 0, None);
    }

    // ── transform feedback ────────────────────────────────────────────────

    const GS: &str = "
        #version 330
        layout(triangles) in;
        layout(points, max_vertices = 3) out;
        out vec3 out_pos;
        void main() {}
    ";

    fn feedback(device: &Device) -> (VertexArray, Buffer) {
        let sources = ShaderSources::new(VS).geometry(GS).varyings(&["out_pos"]);
        let program = device.program(&sources).unwrap();
        let vbo = device.buffer_reserved(12 * 6, false).unwrap();
        let vao = device.vertex_array(&program, &[VertexStream::new(&vbo, "3f", &["in_vert"])], None, 4).unwrap();
        (vao, device.buffer_reserved(12 * 6, false).unwrap())
    }

    #[test]
    fn transform_discards_rasterization_around_the_capture() {
        let (device, backend) = device();
        let (vao, out) = feedback(&device);
        backend.take_calls();
        vao.transform(&[&out], Primitive::TriangleFan, None, 0, None);

        let calls = backend.take_calls();
        let position = |prefix: &str| calls.iter().position(|c| c.starts_with(prefix)).unwrap();
        assert!(position(&format!("enable({:#x})", glow::RASTERIZER_DISCARD)) < position("bind_buffer_base"));
        assert!(position("bind_buffer_base") < position("begin_transform_feedback"));
        assert!(position("begin_transform_feedback") < position("draw_arrays_instanced"));
        assert!(position("end_transform_feedback") < position(&format!("disable({:#x})", glow::RASTERIZER_DISCARD)));
        assert_eq!(calls.last().map(String::as_str), Some("flush()"));
        assert!(calls.iter().any(|c| c == &format!("begin_transform_feedback({:#x})", glow::POINTS)));
        assert!(!backend.is_enabled(glow::RASTERIZER_DISCARD));
    }

    #[test]
    fn transform_keeps_an_enabled_discard() {
        let (device, backend) = device();
        let (vao, out) = feedback(&device);
        device.enable(EnableFlags::RASTERIZER_DISCARD);
        vao.transform(&[&out], Primitive::Triangles, None, 0, None);
        assert!(backend.is_enabled(glow::RASTERIZER_DISCARD));
    }

    #[test]
    #[should_panic(expected = "cannot feed")]
    fn incompatible_modes_panic_before_drawing() {
        let (device, backend) = device();
        let (vao, out) = feedback(&device);
        backend.take_calls();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            vao.transform(&[&out], Primitive::Lines, None, 0, None)
        }));
        assert_eq!(backend.count_calls("draw"), 0);
        assert_eq!(backend.count_calls("begin_transform_feedback"), 0);
        if let Err(panic) = result {
            std::panic::resume_unwind(panic);
        }
    }

    #[test]
    #[should_panic(expected = "declares no varyings")]
    fn transform_needs_varyings() {
        let (device, _) = device();
        let program = program(&device);
        let vbo = device.buffer_reserved(48, false).unwrap();
        let vao = device.vertex_array(&program, &[VertexStream::new(&vbo, "3f", &["in_vert"])], None, 4).unwrap();
        vao.transform(&[&vbo], Primitive::Points, None, 0, None);
    }

    #[test]
    fn release_is_idempotent() {
        let (device, backend) = device();
        let (vao, _) = feedback(&device);
        vao.release();
        vao.release();
        assert!(vao.released());
        assert_eq!(backend.count_calls("delete_vertex_array"), 1);
    }
}
