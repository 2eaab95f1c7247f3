//! Sampling parameters shared by textures and sampler objects.

use crate::error::{GlError, Result};
use crate::gl::{Gl, TEXTURE_MAX_ANISOTROPY};

/// Something sampling parameters can be written to: a bound texture target or
/// a sampler object.
pub(crate) trait SamplingTarget {
    fn set_i32(&self, gl: &dyn Gl, pname: u32, value: i32);
    fn set_f32(&self, gl: &dyn Gl, pname: u32, value: f32);
}

/// Client mirror of the sampling state.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Sampling {
    /// `(min, mag)`
    pub filter: (u32, u32),
    /// Wrap mode per axis: `true` repeats, `false` clamps to the edge.
    pub repeat: [bool; 3],
    /// Empty when depth comparison is off.
    pub compare_func: String,
    pub anisotropy: f32,
}

impl Sampling {
    pub(crate) fn new(filter: u32) -> Self {
        Self { filter: (filter, filter), repeat: [true; 3], compare_func: String::new(), anisotropy: 1.0 }
    }

    pub(crate) fn set_filter(&mut self, gl: &dyn Gl, target: &impl SamplingTarget, min: u32, mag: u32) -> Result<()> {
        check_filter(min, mag)?;
        target.set_i32(gl, glow::TEXTURE_MIN_FILTER, min as i32);
        target.set_i32(gl, glow::TEXTURE_MAG_FILTER, mag as i32);
        self.filter = (min, mag);
        Ok(())
    }

    /// `axis` is 0, 1 or 2 for S, T and R.
    pub(crate) fn set_repeat(&mut self, gl: &dyn Gl, target: &impl SamplingTarget, axis: usize, repeat: bool) {
        let pname = [glow::TEXTURE_WRAP_S, glow::TEXTURE_WRAP_T, glow::TEXTURE_WRAP_R][axis];
        target.set_i32(gl, pname, wrap_mode(repeat));
        self.repeat[axis] = repeat;
    }

    pub(crate) fn set_compare_func(&mut self, gl: &dyn Gl, target: &impl SamplingTarget, func: &str) -> Result<()> {
        if func.is_empty() {
            target.set_i32(gl, glow::TEXTURE_COMPARE_MODE, glow::NONE as i32);
        } else {
            let code = compare_func(func)
                .ok_or_else(|| GlError::invalid(format!("invalid compare func {func:?}")))?;
            target.set_i32(gl, glow::TEXTURE_COMPARE_MODE, glow::COMPARE_REF_TO_TEXTURE as i32);
            target.set_i32(gl, glow::TEXTURE_COMPARE_FUNC, code as i32);
        }
        self.compare_func = func.to_string();
        Ok(())
    }

    /// Clamps to `1.0..=max`. Nothing reaches the driver when anisotropic
    /// filtering is unsupported (`max <= 1.0`).
    pub(crate) fn set_anisotropy(&mut self, gl: &dyn Gl, target: &impl SamplingTarget, value: f32, max: f32) {
        let value = value.clamp(1.0, max.max(1.0));
        if max > 1.0 {
            target.set_f32(gl, TEXTURE_MAX_ANISOTROPY, value);
        }
        self.anisotropy = value;
    }
}

/// Maps a comparison symbol to its native function.
pub(crate) fn compare_func(func: &str) -> Option<u32> {
    Some(match func {
        "<=" => glow::LEQUAL,
        "<" => glow::LESS,
        ">=" => glow::GEQUAL,
        ">" => glow::GREATER,
        "==" => glow::EQUAL,
        "!=" => glow::NOTEQUAL,
        "0" => glow::NEVER,
        "1" => glow::ALWAYS,
        _ => return None,
    })
}

pub(crate) fn wrap_mode(repeat: bool) -> i32 {
    if repeat { glow::REPEAT as i32 } else { glow::CLAMP_TO_EDGE as i32 }
}

fn check_filter(min: u32, mag: u32) -> Result<()> {
    let min_ok = matches!(
        min,
        glow::NEAREST
            | glow::LINEAR
            | glow::NEAREST_MIPMAP_NEAREST
            | glow::LINEAR_MIPMAP_NEAREST
            | glow::NEAREST_MIPMAP_LINEAR
            | glow::LINEAR_MIPMAP_LINEAR
    );
    if !min_ok || !matches!(mag, glow::NEAREST | glow::LINEAR) {
        return Err(GlError::invalid(format!("invalid filter ({min:#x}, {mag:#x})")));
    }
    Ok(())
}

/// Parses a four character swizzle over `RGBA01` (case-insensitive).
pub(crate) fn parse_swizzle(swizzle: &str) -> Result<[i32; 4]> {
    let invalid = || GlError::invalid(format!("invalid swizzle {swizzle:?}"));
    let chars: Vec<char> = swizzle.chars().collect();
    if chars.len() != 4 {
        return Err(invalid());
    }
    let mut out = [0; 4];
    for (slot, c) in out.iter_mut().zip(chars) {
        *slot = match c.to_ascii_uppercase() {
            'R' => glow::RED,
            'G' => glow::GREEN,
            'B' => glow::BLUE,
            'A' => glow::ALPHA,
            '0' => glow::ZERO,
            '1' => glow::ONE,
            _ => return Err(invalid()),
        } as i32;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_symbols() {
        assert_eq!(compare_func("<="), Some(glow::LEQUAL));
        assert_eq!(compare_func("1"), Some(glow::ALWAYS));
        assert_eq!(compare_func("=>"), None);
    }

    #[test]
    fn swizzle_accepts_constants() {
        let parsed = parse_swizzle("bgr1").unwrap();
        assert_eq!(parsed, [glow::BLUE as i32, glow::GREEN as i32, glow::RED as i32, glow::ONE as i32]);
        assert!(parse_swizzle("RGB").is_err());
        assert!(parse_swizzle("RGBX").is_err());
    }

    #[test]
    fn magnification_cannot_use_mipmaps() {
        assert!(check_filter(glow::LINEAR_MIPMAP_LINEAR, glow::LINEAR).is_ok());
        assert!(check_filter(glow::LINEAR, glow::LINEAR_MIPMAP_LINEAR).is_err());
    }
}
