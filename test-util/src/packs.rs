use std::path::PathBuf;

/// Definition file with every feature kind, group syntax and bound syntax
pub const CLASSIC_PACK_YAML: &str = include_str!("../data/classic.yaml");

/// Three features covering the 10-14 micron window
pub const MINIMAL_PACK_YAML: &str = include_str!("../data/minimal.yaml");

/// Absolute path of a definition file shipped with this crate, e.g. `"classic.yaml"`
pub fn pack_path(name: &str) -> PathBuf {
    [env!("CARGO_MANIFEST_DIR"), "data", name].iter().collect()
}
