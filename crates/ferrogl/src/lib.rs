//! ferrogl: an object layer over an immediate-mode GL driver.
//!
//! The crate owns native object names and their lifetimes, reflects linked
//! programs into name-indexed tables, binds vertex streams described by
//! layout strings (see `ferrogl_layout`), and brackets render state in scopes.
//!
//! Everything hangs off a [`Device`]. The driver itself is reached through the
//! [`gl::Gl`] function table, so the same code runs on a real context
//! ([`gl::GlowBackend`]) or on the software [`gl::HeadlessBackend`].
//!
//! ```rust
//! use ferrogl::{gl::HeadlessConfig, Device};
//!
//! let (device, _backend) = Device::headless(HeadlessConfig::default()).unwrap();
//! let buffer = device.buffer(&[1, 2, 3, 4], false).unwrap();
//! assert_eq!(buffer.read(None, 0), vec![1, 2, 3, 4]);
//! ```

pub mod gl;
pub mod logging;

pub mod error;
mod resource;

pub mod device;
pub mod dtype;

pub mod buffer;
pub mod framebuffer;
pub mod query;
pub mod renderbuffer;
pub mod sampler;
pub mod texture;

pub mod primitive;
pub mod program;
pub mod scope;
pub mod vertex_array;

pub use ferrogl_layout as layout;

pub use buffer::Buffer;
pub use device::{Device, DeviceInfo, DeviceInit, EnableFlags, Limits};
pub use dtype::{from_dtype, DataType};
pub use error::{GlError, Result};
pub use framebuffer::{Attachment, AttachmentKind, Framebuffer, ReadBuffer, ReadDesc};
pub use primitive::Primitive;
pub use program::{CaptureMode, Program, ShaderSources};
pub use query::{Query, QueryKind};
pub use renderbuffer::Renderbuffer;
pub use sampler::Sampler;
pub use scope::{Scope, ScopeDesc, ScopeGuard};
pub use texture::{Region, Texture, TextureDesc, TextureKind};
pub use vertex_array::{VertexArray, VertexStream};
