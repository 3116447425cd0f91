//! Configuration loading, migration, environment overrides, and saving.
//!
//! Load order:
//! 1. Read `config.toml` (preferred) or `config.json` from the rigrun home;
//!    missing files yield the embedded defaults.
//! 2. Force file permissions to 0600.
//! 3. Apply migrations (`hybrid` → `auto`, bare TLS versions).
//! 4. Apply environment variable overrides.
//! 5. Validate; an invalid configuration never publishes.

use std::collections::HashMap;
use std::path::Path;

use rigrun_core::RigrunHome;
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate::validate;

/// Environment variables the loader recognizes, applied last.
const ENV_VARS: &[&str] = &[
    "MODEL",
    "OPENROUTER_KEY",
    "PARANOID",
    "OFFLINE",
    "NO_NETWORK",
    "OLLAMA_URL",
    "MODE",
    "MAX_TIER",
    "CLASSIFICATION",
    "POLICY_KEY",
];

/// Load the configuration from the rigrun home.
///
/// # Errors
///
/// Returns a parse error for malformed files or
/// [`ConfigError::ValidationError`] for out-of-range values.
pub fn load(home: &RigrunHome) -> ConfigResult<Config> {
    let mut config = read_config_file(home)?;
    migrate(&mut config);
    apply_env_overrides(&mut config, &collect_env_vars());
    validate(&config)?;
    Ok(config)
}

/// Save the configuration as TOML to the rigrun home, mode 0600.
///
/// Validation runs first; an invalid config aborts the save and leaves
/// on-disk state untouched.
///
/// # Errors
///
/// Returns a validation, encoding, or I/O error.
pub fn save(config: &Config, home: &RigrunHome) -> ConfigResult<()> {
    validate(config)?;
    home.ensure().map_err(ConfigError::Io)?;
    let toml_text = toml::to_string_pretty(config)?;
    rigrun_core::atomic::write(&home.config_toml_path(), toml_text.as_bytes(), 0o600)?;
    Ok(())
}

fn read_config_file(home: &RigrunHome) -> ConfigResult<Config> {
    let toml_path = home.config_toml_path();
    if toml_path.exists() {
        enforce_owner_only(&toml_path);
        let text = std::fs::read_to_string(&toml_path)?;
        return Ok(toml::from_str(&text)?);
    }

    let json_path = home.config_json_path();
    if json_path.exists() {
        enforce_owner_only(&json_path);
        let text = std::fs::read_to_string(&json_path)?;
        return Ok(serde_json::from_str(&text)?);
    }

    debug!("no config file found; using embedded defaults");
    Ok(Config::default())
}

/// Force a config file to mode 0600, warning if that fails.
fn enforce_owner_only(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
            warn!(path = %path.display(), error = %e, "failed to enforce 0600 on config file");
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

/// Rewrite legacy values to their canonical forms.
fn migrate(config: &mut Config) {
    if config.routing.default_mode == "hybrid" {
        debug!("migrating routing.default_mode hybrid -> auto");
        config.routing.default_mode = "auto".to_owned();
    }

    match config.security.tls_min_version.as_str() {
        "1.2" => config.security.tls_min_version = "TLS1.2".to_owned(),
        "1.3" => config.security.tls_min_version = "TLS1.3".to_owned(),
        _ => {},
    }
}

/// Collect the recognized environment variables.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    ENV_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok().map(|v| ((*name).to_owned(), v)))
        .collect()
}

/// Apply environment overrides onto `config`. Later than file values.
pub fn apply_env_overrides(config: &mut Config, env: &HashMap<String, String>) {
    if let Some(model) = env.get("MODEL") {
        config.local.default_model = model.clone();
    }
    if let Some(key) = env.get("OPENROUTER_KEY") {
        config.cloud.api_key = Some(key.clone());
    }
    if let Some(v) = env.get("PARANOID")
        && is_truthy(v)
    {
        config.routing.paranoid = true;
    }
    if env.get("OFFLINE").is_some_and(|v| is_truthy(v))
        || env.get("NO_NETWORK").is_some_and(|v| is_truthy(v))
    {
        config.routing.offline = true;
    }
    if let Some(url) = env.get("OLLAMA_URL") {
        config.local.endpoint = url.clone();
    }
    if let Some(mode) = env.get("MODE") {
        config.routing.default_mode = mode.to_ascii_lowercase();
        if config.routing.default_mode == "hybrid" {
            config.routing.default_mode = "auto".to_owned();
        }
    }
    if let Some(tier) = env.get("MAX_TIER") {
        match tier.parse() {
            Ok(parsed) => config.routing.max_tier = parsed,
            Err(_) => warn!(value = %tier, "ignoring unparseable MAX_TIER override"),
        }
    }
    if let Some(classification) = env.get("CLASSIFICATION") {
        config.security.classification = classification.to_ascii_uppercase().replace('_', " ");
    }
    if let Some(key) = env.get("POLICY_KEY") {
        config.security.policy_key = Some(key.clone());
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "TRUE" | "True")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigrun_core::Tier;

    fn home() -> (tempfile::TempDir, RigrunHome) {
        let dir = tempfile::tempdir().unwrap();
        let home = RigrunHome::from_path(dir.path());
        home.ensure().unwrap();
        (dir, home)
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let (_dir, home) = home();
        let config = load(&home).unwrap();
        assert_eq!(config.routing.default_mode, "auto");
    }

    #[test]
    fn test_load_prefers_toml_over_json() {
        let (_dir, home) = home();
        std::fs::write(
            home.config_toml_path(),
            "[local]\ndefault_model = \"from-toml\"\n",
        )
        .unwrap();
        std::fs::write(
            home.config_json_path(),
            "{\"local\":{\"default_model\":\"from-json\"}}",
        )
        .unwrap();

        let config = load(&home).unwrap();
        assert_eq!(config.local.default_model, "from-toml");
    }

    #[test]
    fn test_load_json_fallback() {
        let (_dir, home) = home();
        std::fs::write(
            home.config_json_path(),
            "{\"local\":{\"default_model\":\"from-json\"}}",
        )
        .unwrap();

        let config = load(&home).unwrap();
        assert_eq!(config.local.default_model, "from-json");
    }

    #[test]
    fn test_hybrid_migrates_to_auto() {
        let (_dir, home) = home();
        std::fs::write(
            home.config_toml_path(),
            "[routing]\ndefault_mode = \"hybrid\"\n",
        )
        .unwrap();

        let config = load(&home).unwrap();
        assert_eq!(config.routing.default_mode, "auto");
    }

    #[test]
    fn test_bare_tls_migrates() {
        let (_dir, home) = home();
        std::fs::write(
            home.config_toml_path(),
            "[security]\ntls_min_version = \"1.3\"\n",
        )
        .unwrap();

        let config = load(&home).unwrap();
        assert_eq!(config.security.tls_min_version, "TLS1.3");
    }

    #[test]
    fn test_invalid_config_rejected_on_load() {
        let (_dir, home) = home();
        std::fs::write(
            home.config_toml_path(),
            "[security]\nsession_timeout_secs = 899\n",
        )
        .unwrap();

        assert!(matches!(
            load(&home),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let (_dir, home) = home();
        let mut config = Config::default();
        config.local.default_model = "mistral:7b".to_owned();
        config.cache.max_size = 42;

        save(&config, &home).unwrap();
        let loaded = load(&home).unwrap();
        assert_eq!(loaded.local.default_model, "mistral:7b");
        assert_eq!(loaded.cache.max_size, 42);
    }

    #[test]
    fn test_save_rejects_invalid_and_leaves_disk_untouched() {
        let (_dir, home) = home();
        save(&Config::default(), &home).unwrap();
        let before = std::fs::read_to_string(home.config_toml_path()).unwrap();

        let mut bad = Config::default();
        bad.cache.max_size = 100_001;
        assert!(save(&bad, &home).is_err());

        let after = std::fs::read_to_string(home.config_toml_path()).unwrap();
        assert_eq!(before, after);
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_config_mode() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, home) = home();
        save(&Config::default(), &home).unwrap();
        let mode = std::fs::metadata(home.config_toml_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        let env: HashMap<String, String> = [
            ("PARANOID", "1"),
            ("NO_NETWORK", "true"),
            ("MODE", "hybrid"),
            ("MAX_TIER", "sonnet"),
            ("CLASSIFICATION", "top_secret"),
            ("OLLAMA_URL", "http://127.0.0.1:11434"),
            ("POLICY_KEY", "0123456789abcdef0123456789abcdef"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();

        apply_env_overrides(&mut config, &env);

        assert!(config.routing.paranoid);
        assert!(config.routing.offline);
        assert_eq!(config.routing.default_mode, "auto");
        assert_eq!(config.routing.max_tier, Tier::Sonnet);
        assert_eq!(config.security.classification, "TOP SECRET");
        assert_eq!(config.local.endpoint, "http://127.0.0.1:11434");
        assert!(config.security.policy_key.is_some());
    }

    #[test]
    fn test_env_paranoid_requires_truthy_value() {
        let mut config = Config::default();
        let env: HashMap<String, String> =
            [("PARANOID".to_owned(), "0".to_owned())].into_iter().collect();
        apply_env_overrides(&mut config, &env);
        assert!(!config.routing.paranoid);
    }
}
