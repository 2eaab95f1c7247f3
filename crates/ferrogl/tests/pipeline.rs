//! End-to-end drawing through the headless backend.

use ferrogl::gl::{HeadlessBackend, HeadlessConfig};
use ferrogl::{
    Attachment, Device, EnableFlags, Framebuffer, GlError, Primitive, QueryKind, ReadDesc, ScopeDesc, ShaderSources,
    VertexStream,
};

const VS: &str = "
    #version 330
    in vec2 in_vert;
    in vec3 in_color;
    in vec2 in_offset;
    uniform float scale;
    out vec3 v_color;
    void main() {
        v_color = in_color;
        gl_Position = vec4(in_vert * scale + in_offset, 0.0, 1.0);
    }
";

const FS: &str = "
    #version 330
    in vec3 v_color;
    out vec4 f_color;
    void main() { f_color = vec4(v_color, 1.0); }
";

fn device() -> (Device, HeadlessBackend) {
    Device::headless(HeadlessConfig::default()).unwrap()
}

fn offscreen(device: &Device, size: (u32, u32)) -> Framebuffer {
    let color = device.renderbuffer(size, 4, 0, "f1").unwrap();
    let depth = device.depth_renderbuffer(size, 0).unwrap();
    device.framebuffer_from(&[Attachment::from(&color)], Some(Attachment::from(&depth))).unwrap()
}

fn pixel(bytes: &[u8], width: usize, x: usize, y: usize) -> &[u8] {
    let at = (y * width + x) * 4;
    &bytes[at..at + 4]
}

// ── drawing ───────────────────────────────────────────────────────────────

#[test]
fn instanced_triangles_are_counted() {
    let (device, _) = device();
    let program = device.program(&ShaderSources::new(VS).fragment(FS)).unwrap();
    program.uniform("scale").unwrap().set(&[0.5f32]).unwrap();

    let vertices: [f32; 15] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
    let vbo = device.buffer_pod(&vertices, false).unwrap();
    let offsets = device.buffer_pod(&[0.0f32, 0.0, 0.5, 0.5], false).unwrap();
    let streams = [
        VertexStream::new(&vbo, "2f 3f", &["in_vert", "in_color"]),
        VertexStream::new(&offsets, "2f/i", &["in_offset"]),
    ];
    let vao = device.vertex_array(&program, &streams, None, 4).unwrap();
    assert_eq!(vao.vertices(), 3);

    let target = offscreen(&device, (8, 8));
    let query = device.query(&[QueryKind::PrimitivesGenerated]).unwrap();
    let scope = device.scope(ScopeDesc {
        framebuffer: Some(target.clone()),
        enable_flags: Some(EnableFlags::DEPTH_TEST),
        ..Default::default()
    });
    {
        let _active = scope.enter();
        query.run(|| vao.render(Primitive::Triangles, None, 0, Some(2)));
    }
    assert_eq!(query.primitives(), Some(2));
    assert_eq!(device.framebuffer(), device.screen());
    assert_eq!(device.enable_flags(), EnableFlags::empty());
}

#[test]
fn region_clears_only_touch_the_region() {
    let (device, backend) = device();
    let target = offscreen(&device, (4, 4));
    target.clear([0.0, 0.0, 0.0, 1.0], 1.0, None);
    target.clear([1.0, 0.0, 0.0, 1.0], 1.0, Some((0, 0, 2, 2)));
    assert!(!backend.is_enabled(glow::SCISSOR_TEST), "scissoring ends with the clear");

    let bytes = target.read(ReadDesc { components: 4, ..Default::default() }).unwrap();
    assert_eq!(pixel(&bytes, 4, 0, 0), &[255, 0, 0, 255]);
    assert_eq!(pixel(&bytes, 4, 1, 1), &[255, 0, 0, 255]);
    assert_eq!(pixel(&bytes, 4, 3, 3), &[0, 0, 0, 255]);
}

#[test]
fn screen_reads_follow_its_size() {
    let (device, _) = Device::headless(HeadlessConfig { screen: (16, 8), ..Default::default() }).unwrap();
    let screen = device.screen();
    assert_eq!(screen.size(), (16, 8));
    screen.clear([0.0, 1.0, 0.0, 1.0], 1.0, None);
    let bytes = screen.read(ReadDesc { components: 4, ..Default::default() }).unwrap();
    assert_eq!(bytes.len(), 16 * 8 * 4);
    assert_eq!(pixel(&bytes, 16, 15, 7), &[0, 255, 0, 255]);
}

// ── transform feedback ────────────────────────────────────────────────────

const CAPTURE_VS: &str = "
    #version 330
    in vec3 in_vert;
    out vec3 out_vert;
    void main() { out_vert = in_vert; }
";

const CAPTURE_GS: &str = "
    #version 330
    layout(triangles) in;
    layout(triangle_strip, max_vertices = 3) out;
    out vec3 out_vert;
    void main() {}
";

#[test]
fn fans_feed_a_triangle_geometry_stage() {
    let (device, backend) = device();
    let sources = ShaderSources::new(CAPTURE_VS).geometry(CAPTURE_GS).varyings(&["out_vert"]);
    let program = device.program(&sources).unwrap();
    assert_eq!(program.geometry_input(), Some(Primitive::Triangles));

    let vbo = device.buffer_reserved(12 * 5, false).unwrap();
    let out = device.buffer_reserved(12 * 9, false).unwrap();
    let vao = device.vertex_array(&program, &[VertexStream::new(&vbo, "3f", &["in_vert"])], None, 4).unwrap();
    vao.transform(&[&out], Primitive::TriangleFan, None, 0, None);

    let begin = format!("begin_transform_feedback({:#x})", glow::TRIANGLES);
    assert_eq!(backend.count_calls(&begin), 1);
    assert_eq!(backend.indexed_buffer(glow::TRANSFORM_FEEDBACK_BUFFER, 0), Some((out.glo(), 0, out.size())));
}

#[test]
fn line_modes_are_refused_before_any_draw() {
    let (device, backend) = device();
    let sources = ShaderSources::new(CAPTURE_VS).geometry(CAPTURE_GS).varyings(&["out_vert"]);
    let program = device.program(&sources).unwrap();
    let vbo = device.buffer_reserved(12 * 4, false).unwrap();
    let out = device.buffer_reserved(12 * 4, false).unwrap();
    let vao = device.vertex_array(&program, &[VertexStream::new(&vbo, "3f", &["in_vert"])], None, 4).unwrap();
    backend.take_calls();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        vao.transform(&[&out], Primitive::Lines, None, 0, None);
    }));
    assert!(result.is_err());
    assert_eq!(backend.count_calls("draw_"), 0);
    assert!(backend.calls().is_empty(), "no native call precedes the check: {:?}", backend.calls());
}

// ── diagnostics ───────────────────────────────────────────────────────────

#[test]
fn compiler_failures_carry_the_banner() {
    let (device, _) = device();
    let err = device.program(&ShaderSources::new("#error no vertex\nvoid main() {}").fragment(FS)).unwrap_err();
    let text = err.to_string();
    assert!(text.starts_with("GLSL Compiler failed\n\nvertex_shader\n=============\n"), "{text}");
    assert!(matches!(err, GlError::Compile { stage: "vertex_shader", .. }));
}
