use std::rc::Rc;

use crate::device::DeviceInner;
use crate::dtype::DataType;
use crate::gl::Gl;
use crate::renderbuffer::Renderbuffer;
use crate::texture::{Texture, TextureKind};

/// Tag of an [`Attachment`], one per attachable object kind.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AttachmentKind {
    Texture2D,
    Texture3D,
    TextureArray,
    TextureCube,
    Renderbuffer,
}

/// Something a framebuffer can render into.
///
/// `layer` selects the slice of a 3D texture or array, or the face of a cube
/// map (0..6). It is ignored for 2D textures.
#[derive(Debug, Clone, PartialEq)]
pub enum Attachment {
    Texture { texture: Texture, level: u32, layer: u32 },
    Renderbuffer(Renderbuffer),
}

impl From<&Texture> for Attachment {
    fn from(texture: &Texture) -> Self {
        Attachment::Texture { texture: texture.clone(), level: 0, layer: 0 }
    }
}

impl From<&Renderbuffer> for Attachment {
    fn from(renderbuffer: &Renderbuffer) -> Self {
        Attachment::Renderbuffer(renderbuffer.clone())
    }
}

impl Attachment {
    /// One level and layer (or cube face) of a texture.
    pub fn layer(texture: &Texture, level: u32, layer: u32) -> Self {
        Attachment::Texture { texture: texture.clone(), level, layer }
    }

    pub fn kind(&self) -> AttachmentKind {
        match self {
            Attachment::Texture { texture, .. } => match texture.kind() {
                TextureKind::Texture2D => AttachmentKind::Texture2D,
                TextureKind::Texture3D => AttachmentKind::Texture3D,
                TextureKind::TextureArray => AttachmentKind::TextureArray,
                TextureKind::TextureCube => AttachmentKind::TextureCube,
            },
            Attachment::Renderbuffer(_) => AttachmentKind::Renderbuffer,
        }
    }

    /// Size of the attached level.
    pub fn size(&self) -> (u32, u32) {
        match self {
            Attachment::Texture { texture, level, .. } => {
                let (w, h) = texture.size();
                ((w >> level).max(1), (h >> level).max(1))
            }
            Attachment::Renderbuffer(rb) => rb.size(),
        }
    }

    pub fn samples(&self) -> u32 {
        match self {
            Attachment::Texture { texture, .. } => texture.samples(),
            Attachment::Renderbuffer(rb) => rb.samples(),
        }
    }

    pub fn components(&self) -> u32 {
        match self {
            Attachment::Texture { texture, .. } => texture.components(),
            Attachment::Renderbuffer(rb) => rb.components(),
        }
    }

    pub fn dtype(&self) -> &'static DataType {
        match self {
            Attachment::Texture { texture, .. } => texture.dtype(),
            Attachment::Renderbuffer(rb) => rb.dtype(),
        }
    }

    pub fn is_depth(&self) -> bool {
        match self {
            Attachment::Texture { texture, .. } => texture.is_depth(),
            Attachment::Renderbuffer(rb) => rb.is_depth(),
        }
    }

    pub(crate) fn belongs_to(&self, device: &Rc<DeviceInner>) -> bool {
        match self {
            Attachment::Texture { texture, .. } => texture.belongs_to(device),
            Attachment::Renderbuffer(rb) => rb.belongs_to(device),
        }
    }

    /// Attaches to `point` of the framebuffer bound at `GL_FRAMEBUFFER`.
    pub(crate) fn attach(&self, gl: &dyn Gl, point: u32) {
        let target = glow::FRAMEBUFFER;
        let (texture, level, layer) = match self {
            Attachment::Renderbuffer(rb) => return gl.framebuffer_renderbuffer(target, point, rb.glo()),
            Attachment::Texture { texture, level, layer } => (texture, *level as i32, *layer),
        };
        match texture.kind() {
            TextureKind::Texture2D => gl.framebuffer_texture_2d(target, point, texture.target(), texture.glo(), level),
            TextureKind::TextureCube => {
                let face = glow::TEXTURE_CUBE_MAP_POSITIVE_X + layer;
                gl.framebuffer_texture_2d(target, point, face, texture.glo(), level)
            }
            TextureKind::Texture3D | TextureKind::TextureArray => {
                gl.framebuffer_texture_layer(target, point, texture.glo(), level, layer as i32)
            }
        }
    }
}
