//! Dump-time options.

/// Controls pointer follow-through and value rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpConfig {
    /// Dereference pointers one level and show the pointee after the address.
    pub follow_pointers: bool,
    /// Digits after the decimal point for `float` and `double`.
    pub float_precision: usize,
    /// Longest C string read through a followed `char *`.
    pub max_cstring_len: usize,
}

impl Default for DumpConfig {
    fn default() -> Self {
        DumpConfig {
            follow_pointers: false,
            float_precision: 6,
            max_cstring_len: 4096,
        }
    }
}

#[cfg(feature = "serde")]
impl From<crate::serde::DumpConfigDef> for DumpConfig {
    fn from(value: crate::serde::DumpConfigDef) -> Self {
        let defaults = DumpConfig::default();

        DumpConfig {
            follow_pointers: value.follow_pointers.unwrap_or(defaults.follow_pointers),
            float_precision: value.float_precision.unwrap_or(defaults.float_precision),
            max_cstring_len: value.max_cstring_len.unwrap_or(defaults.max_cstring_len),
        }
    }
}

impl DumpConfig {
    pub fn following_pointers() -> Self {
        DumpConfig {
            follow_pointers: true,
            ..Default::default()
        }
    }
}
