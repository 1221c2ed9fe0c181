//! Environment knobs.
//!
//! Two optional variables are recognized; the core's behavior does not
//! depend on them:
//!
//! - `OBLIJOIN_DEBUG_LEVEL`: 0..5, default 0. At 3 and above, per-step
//!   table dumps are written (see [`crate::debug`]).
//! - `OBLIJOIN_DEBUG_DIR`: directory for those dumps, default
//!   `oblijoin_debug` under the working directory.

use std::path::PathBuf;
use std::sync::OnceLock;

pub const DEBUG_LEVEL_VAR: &str = "OBLIJOIN_DEBUG_LEVEL";
pub const DEBUG_DIR_VAR: &str = "OBLIJOIN_DEBUG_DIR";

/// Debug dump level at which per-step table dumps are produced.
pub const DUMP_LEVEL: u8 = 3;

#[derive(Debug, Clone)]
pub struct DebugConfig {
    /// 0 = off .. 5 = everything.
    pub level: u8,
    pub dir: PathBuf,
}

impl Default for DebugConfig {
    fn default() -> Self {
        DebugConfig {
            level: 0,
            dir: PathBuf::from("oblijoin_debug"),
        }
    }
}

impl DebugConfig {
    pub fn from_env() -> Self {
        let mut config = DebugConfig::default();
        if let Ok(raw) = std::env::var(DEBUG_LEVEL_VAR) {
            if let Ok(level) = raw.trim().parse::<u8>() {
                config.level = level.min(5);
            }
        }
        if let Ok(dir) = std::env::var(DEBUG_DIR_VAR) {
            if !dir.trim().is_empty() {
                config.dir = PathBuf::from(dir);
            }
        }
        config
    }

    pub fn dumps_enabled(&self) -> bool {
        self.level >= DUMP_LEVEL
    }
}

static CONFIG: OnceLock<DebugConfig> = OnceLock::new();

/// Process-wide config, read from the environment on first use.
pub fn debug_config() -> &'static DebugConfig {
    CONFIG.get_or_init(DebugConfig::from_env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DebugConfig::default();
        assert_eq!(config.level, 0);
        assert!(!config.dumps_enabled());
    }

    #[test]
    fn test_dump_threshold() {
        let mut config = DebugConfig::default();
        config.level = DUMP_LEVEL;
        assert!(config.dumps_enabled());
        config.level = DUMP_LEVEL - 1;
        assert!(!config.dumps_enabled());
    }
}
