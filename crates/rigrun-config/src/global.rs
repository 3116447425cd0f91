//! The process-wide configuration handle.
//!
//! Compatibility glue for singleton consumers: one lock, explicit
//! `set`/`reload`. Prefer constructor injection in new code.

use std::sync::{Arc, OnceLock, RwLock};

use rigrun_core::RigrunHome;

use crate::error::ConfigResult;
use crate::loader;
use crate::types::Config;

static GLOBAL: OnceLock<RwLock<Arc<Config>>> = OnceLock::new();

fn cell() -> &'static RwLock<Arc<Config>> {
    GLOBAL.get_or_init(|| RwLock::new(Arc::new(Config::default())))
}

/// Get the current global configuration.
#[must_use]
pub fn get_global() -> Arc<Config> {
    cell().read().map(|g| Arc::clone(&g)).unwrap_or_default()
}

/// Replace the global configuration.
pub fn set_global(config: Config) {
    if let Ok(mut guard) = cell().write() {
        *guard = Arc::new(config);
    }
}

/// Reload the global configuration from disk.
///
/// On failure the previous configuration stays published.
///
/// # Errors
///
/// Returns the load error without mutating the global.
pub fn reload_global(home: &RigrunHome) -> ConfigResult<Arc<Config>> {
    let config = loader::load(home)?;
    set_global(config);
    Ok(get_global())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that mutate the process-wide configuration.
    static GLOBAL_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_set_and_get() {
        let _guard = GLOBAL_MUTEX.lock().unwrap();
        let mut config = Config::default();
        config.local.default_model = "global-test-model".to_owned();
        set_global(config);
        assert_eq!(get_global().local.default_model, "global-test-model");
    }

    #[test]
    fn test_reload_failure_keeps_previous() {
        let _guard = GLOBAL_MUTEX.lock().unwrap();
        let mut config = Config::default();
        config.local.default_model = "before-reload".to_owned();
        set_global(config);

        let dir = tempfile::tempdir().unwrap();
        let home = RigrunHome::from_path(dir.path());
        home.ensure().unwrap();
        std::fs::write(home.config_toml_path(), "[cache]\nmax_size = 100001\n").unwrap();

        assert!(reload_global(&home).is_err());
        assert_eq!(get_global().local.default_model, "before-reload");
    }
}
