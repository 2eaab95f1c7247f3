/// Initialization parameters for the device layer.
///
/// Keep this structure stable and minimal. Add configuration flags only when a
/// concrete driver requirement exists.
#[derive(Debug, Clone)]
pub struct DeviceInit {
    /// Minimum context version as a version code (`major * 100 + minor * 10`).
    ///
    /// Creation fails when the loaded context reports less.
    pub required_version: u32,

    /// Texture unit reserved for temporary binds during uploads.
    ///
    /// `None` picks the highest unit the driver offers so user bindings on
    /// the lower units survive texture writes.
    pub default_texture_unit: Option<u32>,

    /// Drain the native error queue after object construction and log what
    /// it held at `warn`.
    ///
    /// Costs one driver round-trip per created object.
    pub check_errors: bool,
}

impl Default for DeviceInit {
    fn default() -> Self {
        Self {
            required_version: 330,
            default_texture_unit: None,
            check_errors: false,
        }
    }
}
