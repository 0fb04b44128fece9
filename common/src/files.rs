use std::path::{Path, PathBuf};

pub const ENV_OUTPUT_DIR: &str = "OUTPUT_FILE_PATH";
pub const ENV_MAIN_FILE: &str = "MAIN_OUTPUT_FILE";
pub const ENV_GEORGE_FILE: &str = "GEORGE_OUTPUT_FILE";
pub const ENV_MBR_FILE: &str = "MBR_OUTPUT_FILE";
pub const ENV_MDW_FILE: &str = "MDW_OUTPUT_FILE";
pub const ENV_OCCUPANCY_FILE: &str = "HK_SWITCH_OUTPUT_FILE";
pub const ENV_STATE_FILE: &str = "HEATER_STATE_FILE";
pub const ENV_LOG_FILE: &str = "HEATER_LOG_FILE";
pub const ENV_CONFIG: &str = "HEATD_CONFIG";

/// Joins `name` onto the output directory. Absolute names are kept as-is.
pub fn resolve(dir: &Path, name: &Path) -> PathBuf {
    if name.is_absolute() {
        name.to_path_buf()
    } else {
        dir.join(name)
    }
}

/// Resolves the file named by environment variable `key` against
/// `OUTPUT_FILE_PATH`, or the current directory when that is unset.
pub fn path_from_env(key: &str) -> Option<PathBuf> {
    let name = std::env::var_os(key).filter(|name| !name.is_empty())?;
    let dir = std::env::var_os(ENV_OUTPUT_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    Some(resolve(&dir, Path::new(&name)))
}

/// Every flat file the controller touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPaths {
    pub indoor: PathBuf,
    pub outdoor: PathBuf,
    pub occupancy: PathBuf,
    pub state: PathBuf,
}

impl FeedPaths {
    pub fn in_dir(
        dir: &Path,
        indoor: &Path,
        outdoor: &Path,
        occupancy: &Path,
        state: &Path,
    ) -> Self {
        Self {
            indoor: resolve(dir, indoor),
            outdoor: resolve(dir, outdoor),
            occupancy: resolve(dir, occupancy),
            state: resolve(dir, state),
        }
    }
}
