//! GPU buffers: vertex, index, uniform, storage and transform feedback data.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use bytemuck::Pod;

use crate::device::{Device, DeviceInner};
use crate::error::{GlError, Result};
use crate::resource::{allocate, fits, GlHandle, ObjectKind};

struct BufferShared {
    handle: GlHandle,
    size: Cell<usize>,
    dynamic: bool,
}

/// A native buffer object of fixed size.
///
/// Clones share the native object. All ranges are checked against the
/// current size; out of range access panics.
#[derive(Clone)]
pub struct Buffer {
    shared: Rc<BufferShared>,
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("glo", &self.glo())
            .field("size", &self.size())
            .field("dynamic", &self.shared.dynamic)
            .finish()
    }
}

impl Device {
    /// Creates a buffer holding a copy of `data`.
    pub fn buffer(&self, data: &[u8], dynamic: bool) -> Result<Buffer> {
        Buffer::create(self.inner(), data.len(), Some(data), dynamic)
    }

    pub fn buffer_pod<T: Pod>(&self, data: &[T], dynamic: bool) -> Result<Buffer> {
        self.buffer(bytemuck::cast_slice(data), dynamic)
    }

    /// Creates a zero-filled buffer of `size` bytes.
    pub fn buffer_reserved(&self, size: usize, dynamic: bool) -> Result<Buffer> {
        Buffer::create(self.inner(), size, None, dynamic)
    }
}

fn usage(dynamic: bool) -> u32 {
    if dynamic { glow::DYNAMIC_DRAW } else { glow::STATIC_DRAW }
}

/// Offsets of `count` chunks starting at `start`, `step` bytes apart.
fn chunk_offsets(start: usize, step: isize, count: usize, chunk: usize, size: usize) -> Vec<usize> {
    (0..count)
        .map(|i| {
            let offset = start as isize + step * i as isize;
            assert!(
                offset >= 0 && offset as usize + chunk <= size,
                "chunk {i} at offset {offset} is out of the buffer's {size} bytes"
            );
            offset as usize
        })
        .collect()
}

impl Buffer {
    fn create(device: &Rc<DeviceInner>, size: usize, data: Option<&[u8]>, dynamic: bool) -> Result<Buffer> {
        if size == 0 {
            return Err(GlError::invalid("the buffer cannot be empty"));
        }
        let handle = allocate(device, ObjectKind::Buffer)?;
        let gl = device.gl();
        gl.bind_buffer(glow::ARRAY_BUFFER, handle.glo());
        gl.buffer_data(glow::ARRAY_BUFFER, size, data, usage(dynamic));
        device.check("creating a buffer");
        Ok(Buffer {
            shared: Rc::new(BufferShared { handle, size: Cell::new(size), dynamic }),
        })
    }

    pub fn glo(&self) -> u32 {
        self.shared.handle.glo()
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.shared.size.get()
    }

    pub fn dynamic(&self) -> bool {
        self.shared.dynamic
    }

    pub fn release(&self) {
        self.shared.handle.release();
    }

    pub fn released(&self) -> bool {
        self.shared.handle.released()
    }

    pub(crate) fn belongs_to(&self, device: &Rc<DeviceInner>) -> bool {
        self.shared.handle.belongs_to(device)
    }

    fn bound(&self, target: u32) -> Rc<DeviceInner> {
        let device = self.shared.handle.device();
        device.gl().bind_buffer(target, self.glo());
        device
    }

    fn check_range(&self, what: &str, offset: usize, len: usize) {
        assert!(
            fits(offset, len, self.size()),
            "{what}: {len} bytes at offset {offset} do not fit a buffer of {} bytes",
            self.size()
        );
    }

    // ── writes ────────────────────────────────────────────────────────────

    pub fn write(&self, data: &[u8], offset: usize) {
        self.check_range("write", offset, data.len());
        let device = self.bound(glow::ARRAY_BUFFER);
        device.gl().buffer_sub_data(glow::ARRAY_BUFFER, offset, data);
    }

    pub fn write_pod<T: Pod>(&self, data: &[T], offset: usize) {
        self.write(bytemuck::cast_slice(data), offset);
    }

    /// Splits `data` into `count` equal chunks and writes chunk `i` at
    /// `start + i * step`. `step` may be negative.
    pub fn write_chunks(&self, data: &[u8], start: usize, step: isize, count: usize) {
        assert!(count > 0, "write_chunks: count must be positive");
        assert!(data.len() % count == 0, "write_chunks: {} bytes do not split into {count} chunks", data.len());
        let chunk = data.len() / count;
        let offsets = chunk_offsets(start, step, count, chunk, self.size());
        let device = self.bound(glow::ARRAY_BUFFER);
        let gl = device.gl();
        for (offset, bytes) in offsets.into_iter().zip(data.chunks_exact(chunk)) {
            gl.buffer_sub_data(glow::ARRAY_BUFFER, offset, bytes);
        }
    }

    /// Fills `size` bytes (default: up to the end) at `offset` with zeros or
    /// with repetitions of `chunk`.
    pub fn clear(&self, size: Option<usize>, offset: usize, chunk: Option<&[u8]>) {
        let size = size.unwrap_or_else(|| self.size().saturating_sub(offset));
        self.check_range("clear", offset, size);
        let fill = match chunk {
            Some(chunk) => {
                assert!(
                    !chunk.is_empty() && size % chunk.len() == 0,
                    "clear: the size must be a multiple of the chunk size"
                );
                chunk.repeat(size / chunk.len())
            }
            None => vec![0; size],
        };
        self.write(&fill, offset);
    }

    /// Replaces the storage with fresh, undefined contents of `size` bytes
    /// (default: the current size).
    pub fn orphan(&self, size: Option<usize>) {
        let size = size.unwrap_or_else(|| self.size());
        assert!(size > 0, "orphan: the buffer cannot be empty");
        let device = self.bound(glow::ARRAY_BUFFER);
        device.gl().buffer_data(glow::ARRAY_BUFFER, size, None, usage(self.shared.dynamic));
        self.shared.size.set(size);
    }

    // ── reads ─────────────────────────────────────────────────────────────

    /// Reads `size` bytes (default: up to the end) starting at `offset`.
    pub fn read(&self, size: Option<usize>, offset: usize) -> Vec<u8> {
        let size = size.unwrap_or_else(|| self.size().saturating_sub(offset));
        let mut out = vec![0; size];
        self.read_into(&mut out, Some(size), offset, 0);
        out
    }

    /// Reads into `dst[write_offset..]`.
    pub fn read_into(&self, dst: &mut [u8], size: Option<usize>, offset: usize, write_offset: usize) {
        let size = size.unwrap_or_else(|| self.size().saturating_sub(offset));
        self.check_range("read", offset, size);
        assert!(
            fits(write_offset, size, dst.len()),
            "read_into: {size} bytes at {write_offset} do not fit the destination of {} bytes",
            dst.len()
        );
        let device = self.bound(glow::ARRAY_BUFFER);
        device
            .gl()
            .get_buffer_sub_data(glow::ARRAY_BUFFER, offset, &mut dst[write_offset..write_offset + size]);
    }

    pub fn read_pod<T: Pod>(&self, offset: usize, count: usize) -> Vec<T> {
        let bytes = self.read(Some(count * std::mem::size_of::<T>()), offset);
        bytemuck::pod_collect_to_vec(&bytes)
    }

    /// Reads `count` chunks of `chunk_size` bytes from `start + i * step`.
    pub fn read_chunks(&self, chunk_size: usize, start: usize, step: isize, count: usize) -> Vec<u8> {
        let offsets = chunk_offsets(start, step, count, chunk_size, self.size());
        let mut out = vec![0; chunk_size * count];
        let device = self.bound(glow::ARRAY_BUFFER);
        let gl = device.gl();
        for (offset, dst) in offsets.into_iter().zip(out.chunks_exact_mut(chunk_size.max(1))) {
            gl.get_buffer_sub_data(glow::ARRAY_BUFFER, offset, dst);
        }
        out
    }

    // ── indexed bindings ──────────────────────────────────────────────────

    /// Binds `size` bytes (default: up to the end) at `offset` to uniform
    /// block binding point `binding`.
    pub fn bind_to_uniform_block(&self, binding: u32, offset: usize, size: Option<usize>) {
        self.bind_range(glow::UNIFORM_BUFFER, binding, offset, size);
    }

    pub fn bind_to_storage_buffer(&self, binding: u32, offset: usize, size: Option<usize>) {
        self.bind_range(glow::SHADER_STORAGE_BUFFER, binding, offset, size);
    }

    fn bind_range(&self, target: u32, binding: u32, offset: usize, size: Option<usize>) {
        let size = size.unwrap_or_else(|| self.size().saturating_sub(offset));
        self.check_range("bind", offset, size);
        let device = self.shared.handle.device();
        device.gl().bind_buffer_range(target, binding, self.glo(), offset, size);
    }
}
