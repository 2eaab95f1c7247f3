use bitflags::bitflags;

bitflags! {
    /// Capabilities toggled as a group by `Device::enable_only` and scopes.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
    pub struct EnableFlags: u32 {
        const BLEND = 1;
        const DEPTH_TEST = 2;
        const CULL_FACE = 4;
        const RASTERIZER_DISCARD = 8;
        const PROGRAM_POINT_SIZE = 16;
    }
}

impl EnableFlags {
    /// Native capability for each flag.
    pub(crate) const CAPS: [(EnableFlags, u32); 5] = [
        (EnableFlags::BLEND, glow::BLEND),
        (EnableFlags::DEPTH_TEST, glow::DEPTH_TEST),
        (EnableFlags::CULL_FACE, glow::CULL_FACE),
        (EnableFlags::RASTERIZER_DISCARD, glow::RASTERIZER_DISCARD),
        (EnableFlags::PROGRAM_POINT_SIZE, glow::PROGRAM_POINT_SIZE),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_flag_has_a_capability() {
        let mapped = EnableFlags::CAPS.iter().fold(EnableFlags::empty(), |acc, (flag, _)| acc | *flag);
        assert_eq!(mapped, EnableFlags::all());
    }
}
