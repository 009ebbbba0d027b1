//! Supported DragonBones data version.

/// Data format version produced by the exporter this runtime targets.
pub const DATA_VERSION: &str = "5.5";

/// Older data versions whose runtime semantics are unchanged.
pub const COMPATIBLE_VERSIONS: &[&str] = &["5.0", "5.1", "5.3", "5.5", "5.6"];

pub fn is_compatible_version(version: &str) -> bool {
    COMPATIBLE_VERSIONS.contains(&version)
}
