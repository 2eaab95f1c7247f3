//! Sampler objects: sampling state detached from any texture.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::device::{Device, DeviceInner};
use crate::error::Result;
use crate::gl::Gl;
use crate::resource::{allocate, GlHandle, ObjectKind};
use crate::texture::{Sampling, SamplingTarget};

struct SamplerObject(u32);

impl SamplingTarget for SamplerObject {
    fn set_i32(&self, gl: &dyn Gl, pname: u32, value: i32) {
        gl.sampler_parameter_i32(self.0, pname, value);
    }

    fn set_f32(&self, gl: &dyn Gl, pname: u32, value: f32) {
        gl.sampler_parameter_f32(self.0, pname, value);
    }
}

struct SamplerShared {
    handle: GlHandle,
    sampling: RefCell<Sampling>,
    border_color: Cell<[f32; 4]>,
    lod: Cell<(f32, f32)>,
}

/// Sampling parameters that override a texture's own when bound to the same
/// unit.
#[derive(Clone)]
pub struct Sampler {
    shared: Rc<SamplerShared>,
}

impl PartialEq for Sampler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sampler")
            .field("glo", &self.glo())
            .field("sampling", &self.shared.sampling.borrow())
            .finish()
    }
}

impl Device {
    /// A sampler with linear filtering and repeat wrapping.
    pub fn sampler(&self) -> Result<Sampler> {
        let device = self.inner();
        let handle = allocate(device, ObjectKind::Sampler)?;
        let mut sampling = Sampling::new(glow::LINEAR);
        sampling.set_filter(device.gl(), &SamplerObject(handle.glo()), glow::LINEAR, glow::LINEAR)?;
        Ok(Sampler {
            shared: Rc::new(SamplerShared {
                handle,
                sampling: RefCell::new(sampling),
                border_color: Cell::new([0.0; 4]),
                lod: Cell::new((-1000.0, 1000.0)),
            }),
        })
    }
}

impl Sampler {
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

    /// Binds the sampler to texture unit `unit`.
    pub fn use_(&self, unit: u32) {
        let device = self.shared.handle.device();
        check_unit(&device, unit);
        device.gl().bind_sampler(unit, self.glo());
    }

    /// Unbinds whatever sampler is on `unit`.
    pub fn clear(&self, unit: u32) {
        let device = self.shared.handle.device();
        check_unit(&device, unit);
        device.gl().bind_sampler(unit, 0);
    }

    fn sampling<R>(&self, f: impl FnOnce(&mut Sampling, &dyn Gl, &SamplerObject, &DeviceInner) -> R) -> R {
        let device = self.shared.handle.device();
        let target = SamplerObject(self.glo());
        let mut sampling = self.shared.sampling.borrow_mut();
        f(&mut sampling, device.gl(), &target, &*device)
    }

    pub fn filter(&self) -> (u32, u32) {
        self.shared.sampling.borrow().filter
    }

    pub fn set_filter(&self, min: u32, mag: u32) -> Result<()> {
        self.sampling(|s, gl, target, _| s.set_filter(gl, target, min, mag))
    }

    pub fn repeat_x(&self) -> bool {
        self.shared.sampling.borrow().repeat[0]
    }

    pub fn set_repeat_x(&self, repeat: bool) {
        self.sampling(|s, gl, target, _| s.set_repeat(gl, target, 0, repeat))
    }

    pub fn repeat_y(&self) -> bool {
        self.shared.sampling.borrow().repeat[1]
    }

    pub fn set_repeat_y(&self, repeat: bool) {
        self.sampling(|s, gl, target, _| s.set_repeat(gl, target, 1, repeat))
    }

    pub fn repeat_z(&self) -> bool {
        self.shared.sampling.borrow().repeat[2]
    }

    pub fn set_repeat_z(&self, repeat: bool) {
        self.sampling(|s, gl, target, _| s.set_repeat(gl, target, 2, repeat))
    }

    /// Empty when depth comparison is off.
    pub fn compare_func(&self) -> String {
        self.shared.sampling.borrow().compare_func.clone()
    }

    pub fn set_compare_func(&self, func: &str) -> Result<()> {
        self.sampling(|s, gl, target, _| s.set_compare_func(gl, target, func))
    }

    pub fn anisotropy(&self) -> f32 {
        self.shared.sampling.borrow().anisotropy
    }

    /// Clamped to `1.0..=limits().max_anisotropy`.
    pub fn set_anisotropy(&self, value: f32) {
        self.sampling(|s, gl, target, device| s.set_anisotropy(gl, target, value, device.limits.max_anisotropy))
    }

    pub fn border_color(&self) -> [f32; 4] {
        self.shared.border_color.get()
    }

    /// Used by the clamp-to-border wrap mode.
    pub fn set_border_color(&self, color: [f32; 4]) {
        let device = self.shared.handle.device();
        device.gl().sampler_parameter_f32_slice(self.glo(), glow::TEXTURE_BORDER_COLOR, &color);
        self.shared.border_color.set(color);
    }

    pub fn min_lod(&self) -> f32 {
        self.shared.lod.get().0
    }

    pub fn set_min_lod(&self, value: f32) {
        let device = self.shared.handle.device();
        device.gl().sampler_parameter_f32(self.glo(), glow::TEXTURE_MIN_LOD, value);
        let (_, max) = self.shared.lod.get();
        self.shared.lod.set((value, max));
    }

    pub fn max_lod(&self) -> f32 {
        self.shared.lod.get().1
    }

    pub fn set_max_lod(&self, value: f32) {
        let device = self.shared.handle.device();
        device.gl().sampler_parameter_f32(self.glo(), glow::TEXTURE_MAX_LOD, value);
        let (min, _) = self.shared.lod.get();
        self.shared.lod.set((min, value));
    }
}

fn check_unit(device: &DeviceInner, unit: u32) {
    let max = device.limits.max_texture_units;
    assert!(unit < max, "texture unit {unit} is out of range (max {max})");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{HeadlessBackend, HeadlessConfig};

    fn device() -> (Device, HeadlessBackend) {
        Device::headless(HeadlessConfig::default()).unwrap()
    }

    #[test]
    fn parameters_reach_the_sampler_object() {
        let (device, backend) = device();
        let sampler = device.sampler().unwrap();
        sampler.set_filter(glow::NEAREST, glow::NEAREST).unwrap();
        sampler.set_repeat_y(false);
        sampler.set_compare_func(">=").unwrap();
        sampler.set_max_lod(4.0);

        let param = |pname| backend.sampler_parameter(sampler.glo(), pname).unwrap();
        assert_eq!(param(glow::TEXTURE_MIN_FILTER), vec![glow::NEAREST as f32]);
        assert_eq!(param(glow::TEXTURE_WRAP_T), vec![glow::CLAMP_TO_EDGE as f32]);
        assert_eq!(param(glow::TEXTURE_COMPARE_FUNC), vec![glow::GEQUAL as f32]);
        assert_eq!(param(glow::TEXTURE_MAX_LOD), vec![4.0]);
        assert!(sampler.repeat_x());
        assert!(!sampler.repeat_y());
        assert_eq!(sampler.compare_func(), ">=");
        assert_eq!((sampler.min_lod(), sampler.max_lod()), (-1000.0, 4.0));
    }

    #[test]
    fn invalid_compare_func_keeps_the_mirror() {
        let (device, _) = device();
        let sampler = device.sampler().unwrap();
        assert!(sampler.set_compare_func("=<").is_err());
        assert_eq!(sampler.compare_func(), "");
    }

    #[test]
    fn border_color_is_mirrored() {
        let (device, backend) = device();
        let sampler = device.sampler().unwrap();
        sampler.set_border_color([1.0, 0.0, 0.0, 1.0]);
        assert_eq!(sampler.border_color(), [1.0, 0.0, 0.0, 1.0]);
        let native = backend.sampler_parameter(sampler.glo(), glow::TEXTURE_BORDER_COLOR).unwrap();
        assert_eq!(native, vec![1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn use_and_clear_bind_the_unit() {
        let (device, backend) = device();
        let sampler = device.sampler().unwrap();
        sampler.use_(2);
        assert_eq!(backend.sampler_binding(2), sampler.glo());
        sampler.clear(2);
        assert_eq!(backend.sampler_binding(2), 0);
    }

    #[test]
    fn anisotropy_is_clamped() {
        let (device, _) = device();
        let sampler = device.sampler().unwrap();
        sampler.set_anisotropy(1000.0);
        assert_eq!(sampler.anisotropy(), device.limits().max_anisotropy.max(1.0));
        sampler.set_anisotropy(0.0);
        assert_eq!(sampler.anisotropy(), 1.0);
    }

    #[test]
    #[should_panic(expected = "used after release")]
    fn released_sampler_cannot_be_bound() {
        let (device, _) = device();
        let sampler = device.sampler().unwrap();
        sampler.release();
        sampler.use_(0);
    }
}
