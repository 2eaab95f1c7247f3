//! Render-state brackets.
//!
//! A [`Scope`] bundles a framebuffer, a set of enable flags and texture,
//! buffer and sampler bindings. [`Scope::begin`] captures the device's current
//! framebuffer and flags and applies the bundle; [`Scope::end`] puts the
//! captured state back.
//!
//! One scope is one level of nesting: beginning a scope that is already
//! active panics. Nest by creating one scope per level.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::buffer::Buffer;
use crate::device::{Device, DeviceInner, EnableFlags};
use crate::framebuffer::Framebuffer;
use crate::sampler::Sampler;
use crate::texture::Texture;

/// What a [`Scope`] applies. Bindings are `(resource, unit or binding point)`.
#[derive(Debug, Clone, Default)]
pub struct ScopeDesc {
    /// `None` keeps whatever framebuffer is bound when the scope begins.
    pub framebuffer: Option<Framebuffer>,
    /// `None` leaves the enable flags alone.
    pub enable_flags: Option<EnableFlags>,
    pub textures: Vec<(Texture, u32)>,
    pub uniform_buffers: Vec<(Buffer, u32)>,
    pub storage_buffers: Vec<(Buffer, u32)>,
    pub samplers: Vec<(Sampler, u32)>,
}

/// State captured by [`Scope::begin`].
struct Saved {
    framebuffer: Framebuffer,
    enable_flags: EnableFlags,
}

pub struct Scope {
    device: Weak<DeviceInner>,
    desc: ScopeDesc,
    saved: RefCell<Option<Saved>>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("desc", &self.desc)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Device {
    /// Creates a scope. Every resource in `desc` must come from this device
    /// and every texture unit must exist; both are checked here.
    pub fn scope(&self, desc: ScopeDesc) -> Scope {
        let device = self.inner();
        let units = device.limits.max_texture_units;
        if let Some(framebuffer) = &desc.framebuffer {
            assert!(framebuffer.belongs_to(device), "framebuffer {} belongs to another device", framebuffer.glo());
        }
        for (texture, unit) in &desc.textures {
            assert!(texture.belongs_to(device), "texture {} belongs to another device", texture.glo());
            assert!(*unit < units, "texture unit {unit} is out of range (max {units})");
        }
        for (buffer, _) in desc.uniform_buffers.iter().chain(&desc.storage_buffers) {
            assert!(buffer.belongs_to(device), "buffer {} belongs to another device", buffer.glo());
        }
        for (sampler, unit) in &desc.samplers {
            assert!(sampler.belongs_to(device), "sampler {} belongs to another device", sampler.glo());
            assert!(*unit < units, "texture unit {unit} is out of range (max {units})");
        }
        Scope { device: Rc::downgrade(device), desc, saved: RefCell::new(None) }
    }
}

impl Scope {
    fn device(&self) -> Rc<DeviceInner> {
        let device = self.device.upgrade().unwrap_or_else(|| panic!("scope outlived its device"));
        assert!(!device.released.get(), "scope used after its device was released");
        device
    }

    pub fn desc(&self) -> &ScopeDesc {
        &self.desc
    }

    /// `true` between [`begin`](Self::begin) and [`end`](Self::end).
    pub fn is_active(&self) -> bool {
        self.saved.borrow().is_some()
    }

    pub fn begin(&self) {
        assert!(!self.is_active(), "scope begun twice without end");
        let device = self.device();
        let saved = Saved { framebuffer: device.bound_framebuffer(), enable_flags: device.enable_flags() };

        if let Some(framebuffer) = &self.desc.framebuffer {
            framebuffer.use_();
        }
        if let Some(flags) = self.desc.enable_flags {
            device.enable_only(flags);
        }
        for (texture, unit) in &self.desc.textures {
            texture.use_(*unit);
        }
        for (buffer, binding) in &self.desc.uniform_buffers {
            buffer.bind_to_uniform_block(*binding, 0, None);
        }
        for (buffer, binding) in &self.desc.storage_buffers {
            buffer.bind_to_storage_buffer(*binding, 0, None);
        }
        for (sampler, unit) in &self.desc.samplers {
            sampler.use_(*unit);
        }
        *self.saved.borrow_mut() = Some(saved);
    }

    /// Restores the framebuffer and enable flags captured by `begin`.
    /// Texture, buffer and sampler bindings are left in place.
    pub fn end(&self) {
        let Some(saved) = self.saved.borrow_mut().take() else {
            panic!("scope ended without begin");
        };
        let device = self.device();
        saved.framebuffer.use_();
        device.enable_only(saved.enable_flags);
    }

    /// Begins the scope; it ends when the guard drops.
    pub fn enter(&self) -> ScopeGuard<'_> {
        self.begin();
        ScopeGuard { scope: self }
    }
}

/// Ends its [`Scope`] on drop.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct ScopeGuard<'a> {
    scope: &'a Scope,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.scope.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{HeadlessBackend, HeadlessConfig};
    use crate::texture::TextureDesc;
    use crate::Attachment;

    fn device() -> (Device, HeadlessBackend) {
        Device::headless(HeadlessConfig::default()).unwrap()
    }

    fn offscreen(device: &Device) -> Framebuffer {
        let color = device.renderbuffer((8, 8), 4, 0, "f1").unwrap();
        device.framebuffer_from(&[Attachment::from(&color)], None).unwrap()
    }

    #[test]
    fn end_restores_framebuffer_and_flags() {
        let (device, backend) = device();
        let first = offscreen(&device);
        let second = offscreen(&device);
        first.use_();
        device.enable_only(EnableFlags::BLEND);

        let scope = device.scope(ScopeDesc {
            framebuffer: Some(second.clone()),
            enable_flags: Some(EnableFlags::DEPTH_TEST | EnableFlags::CULL_FACE),
            ..Default::default()
        });
        scope.begin();
        assert_eq!(device.framebuffer(), second);
        assert_eq!(backend.draw_framebuffer(), second.glo());
        assert!(backend.is_enabled(glow::DEPTH_TEST) && !backend.is_enabled(glow::BLEND));
        scope.end();

        assert_eq!(device.framebuffer(), first);
        assert_eq!(backend.draw_framebuffer(), first.glo());
        assert_eq!(device.enable_flags(), EnableFlags::BLEND);
        assert!(backend.is_enabled(glow::BLEND) && !backend.is_enabled(glow::DEPTH_TEST));
    }

    #[test]
    fn bindings_are_applied() {
        let (device, backend) = device();
        let texture = device.texture((4, 4), TextureDesc::default()).unwrap();
        let ubo = device.buffer_reserved(64, false).unwrap();
        let sampler = device.sampler().unwrap();
        let scope = device.scope(ScopeDesc {
            textures: vec![(texture.clone(), 2)],
            uniform_buffers: vec![(ubo.clone(), 1)],
            samplers: vec![(sampler.clone(), 2)],
            ..Default::default()
        });
        {
            let _guard = scope.enter();
            assert!(scope.is_active());
        }
        assert!(!scope.is_active());
        assert_eq!(backend.texture_binding(2, glow::TEXTURE_2D), texture.glo());
        assert_eq!(backend.indexed_buffer(glow::UNIFORM_BUFFER, 1), Some((ubo.glo(), 0, 64)));
        assert_eq!(backend.sampler_binding(2), sampler.glo());
    }

    #[test]
    fn scopes_nest_by_level() {
        let (device, _) = device();
        let outer_fb = offscreen(&device);
        let inner_fb = offscreen(&device);
        let outer = device.scope(ScopeDesc { framebuffer: Some(outer_fb.clone()), ..Default::default() });
        let inner = device.scope(ScopeDesc { framebuffer: Some(inner_fb.clone()), ..Default::default() });
        {
            let _outer = outer.enter();
            {
                let _inner = inner.enter();
                assert_eq!(device.framebuffer(), inner_fb);
            }
            assert_eq!(device.framebuffer(), outer_fb);
        }
        assert_eq!(device.framebuffer(), device.screen());
    }

    #[test]
    #[should_panic(expected = "scope begun twice")]
    fn reentry_panics() {
        let (device, _) = device();
        let scope = device.scope(ScopeDesc::default());
        scope.begin();
        scope.begin();
    }

    #[test]
    #[should_panic(expected = "scope ended without begin")]
    fn end_without_begin_panics() {
        let (device, _) = device();
        device.scope(ScopeDesc::default()).end();
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn texture_units_are_checked_up_front() {
        let (device, _) = device();
        let texture = device.texture((4, 4), TextureDesc::default()).unwrap();
        device.scope(ScopeDesc { textures: vec![(texture, 99)], ..Default::default() });
    }
}
