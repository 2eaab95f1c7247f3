//! Native handle ownership across resources and devices.

use ferrogl::gl::{HeadlessBackend, HeadlessConfig};
use ferrogl::logging::{init_logging, LoggingConfig};
use ferrogl::{Attachment, Device, GlError, QueryKind, ShaderSources, TextureDesc, VertexStream};

fn device() -> (Device, HeadlessBackend) {
    init_logging(LoggingConfig { native_calls: true, test_capture: true, ..Default::default() });
    Device::headless(HeadlessConfig::default()).unwrap()
}

const VS: &str = "
    #version 330
    in vec3 in_vert;
    void main() { gl_Position = vec4(in_vert, 1.0); }
";

#[test]
fn every_resource_releases_exactly_once() {
    let (device, backend) = device();
    let buffer = device.buffer_reserved(64, false).unwrap();
    let texture = device.texture((4, 4), TextureDesc::default()).unwrap();
    let renderbuffer = device.renderbuffer((4, 4), 4, 0, "f1").unwrap();
    let sampler = device.sampler().unwrap();
    let query = device.query(&[QueryKind::SamplesPassed]).unwrap();
    let framebuffer = device.framebuffer_from(&[Attachment::from(&renderbuffer)], None).unwrap();
    let program = device.program(&ShaderSources::new(VS)).unwrap();
    let vao = device.vertex_array(&program, &[VertexStream::new(&buffer, "3f", &["in_vert"])], None, 4).unwrap();
    assert_eq!(backend.live_objects(), 8);

    for _ in 0..2 {
        vao.release();
        program.release();
        framebuffer.release();
        query.release();
        sampler.release();
        renderbuffer.release();
        texture.release();
        buffer.release();
    }
    assert_eq!(backend.live_objects(), 0);
    for prefix in ["delete_buffer", "delete_texture", "delete_renderbuffer", "delete_sampler", "delete_query"] {
        assert_eq!(backend.count_calls(prefix), 1, "{prefix}");
    }
    assert!(buffer.released() && texture.released() && vao.released() && program.released());
}

#[test]
fn dropping_the_last_clone_releases() {
    let (device, backend) = device();
    let buffer = device.buffer_reserved(16, false).unwrap();
    let shared = buffer.clone();
    drop(buffer);
    assert_eq!(backend.live_objects(), 1);
    drop(shared);
    assert_eq!(backend.live_objects(), 0);
}

#[test]
fn vertex_arrays_keep_their_buffers_alive() {
    let (device, backend) = device();
    let program = device.program(&ShaderSources::new(VS)).unwrap();
    let buffer = device.buffer_reserved(36, false).unwrap();
    let vao = device.vertex_array(&program, &[VertexStream::new(&buffer, "3f", &["in_vert"])], None, 4).unwrap();
    drop(buffer);
    drop(program);
    assert_eq!(backend.live_objects(), 3);
    drop(vao);
    assert_eq!(backend.live_objects(), 0);
}

#[test]
fn failed_allocations_leave_nothing_behind() {
    let (device, backend) = device();
    backend.fail_next("framebuffer");
    let color = device.renderbuffer((4, 4), 4, 0, "f1").unwrap();
    let err = device.framebuffer_from(&[Attachment::from(&color)], None).unwrap_err();
    assert!(matches!(err, GlError::Allocation { .. }));
    assert_eq!(backend.live_objects(), 1);
}

#[test]
fn released_devices_skip_native_deletes() {
    let (device, backend) = device();
    let buffer = device.buffer_reserved(16, false).unwrap();
    device.release();
    drop(buffer);
    assert_eq!(backend.count_calls("delete_buffer"), 0);
}

#[test]
#[should_panic(expected = "used after its device was released")]
fn resources_refuse_work_after_device_release() {
    let (device, _) = device();
    let buffer = device.buffer_reserved(16, false).unwrap();
    device.release();
    buffer.write(&[0; 4], 0);
}

#[test]
#[should_panic(expected = "outlived its device")]
fn resources_refuse_work_after_device_drop() {
    let (device, _backend) = device();
    let buffer = device.buffer_reserved(16, false).unwrap();
    drop(device);
    buffer.read(None, 0);
}

#[test]
#[should_panic(expected = "belongs to another device")]
fn foreign_attachments_are_fatal() {
    let (first, _) = device();
    let (second, _) = device();
    let color = second.renderbuffer((4, 4), 4, 0, "f1").unwrap();
    let _ = first.framebuffer_from(&[Attachment::from(&color)], None);
}

#[test]
fn devices_are_independent() {
    let (first, first_backend) = device();
    let (second, second_backend) = device();
    let a = first.buffer_reserved(8, false).unwrap();
    let b = second.buffer_reserved(8, false).unwrap();
    assert_eq!(a.glo(), b.glo(), "each device hands out its own names");
    drop(a);
    assert_eq!(first_backend.live_objects(), 0);
    assert_eq!(second_backend.live_objects(), 1);
    drop(b);
}
