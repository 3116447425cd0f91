//! Load-time configuration validation.
//!
//! Validation runs after parsing, migration, and environment overrides.
//! An invalid configuration aborts the enclosing load or save and leaves
//! on-disk state untouched.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Validate a fully-merged configuration.
///
/// # Errors
///
/// Returns the first [`ConfigError::ValidationError`] found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_routing(config)?;
    validate_security(config)?;
    validate_cache(config)?;
    Ok(())
}

fn validate_routing(config: &Config) -> ConfigResult<()> {
    let r = &config.routing;

    if !matches!(r.default_mode.as_str(), "auto" | "cloud" | "local" | "hybrid") {
        return Err(ConfigError::ValidationError {
            field: "routing.default_mode".to_owned(),
            message: format!(
                "unsupported mode '{}'; expected one of: auto, cloud, local, hybrid",
                r.default_mode
            ),
        });
    }

    if let Some(fallback) = &r.auto_fallback
        && !matches!(fallback.as_str(), "local" | "error")
    {
        return Err(ConfigError::ValidationError {
            field: "routing.auto_fallback".to_owned(),
            message: format!("unsupported fallback '{fallback}'; expected one of: local, error"),
        });
    }

    if !r.auto_max_cost.is_finite() || r.auto_max_cost < 0.0 {
        return Err(ConfigError::ValidationError {
            field: "routing.auto_max_cost".to_owned(),
            message: "auto_max_cost must be a finite non-negative number".to_owned(),
        });
    }

    // max_tier is an enum; every variant is a valid cap.

    Ok(())
}

fn validate_security(config: &Config) -> ConfigResult<()> {
    let s = &config.security;

    if !(900..=1800).contains(&s.session_timeout_secs) {
        return Err(ConfigError::ValidationError {
            field: "security.session_timeout_secs".to_owned(),
            message: format!(
                "session_timeout_secs {} is out of range; must be 900-1800",
                s.session_timeout_secs
            ),
        });
    }

    if !(3..=10).contains(&s.max_login_attempts) {
        return Err(ConfigError::ValidationError {
            field: "security.max_login_attempts".to_owned(),
            message: format!(
                "max_login_attempts {} is out of range; must be 3-10",
                s.max_login_attempts
            ),
        });
    }

    if !(1..=60).contains(&s.lockout_duration_minutes) {
        return Err(ConfigError::ValidationError {
            field: "security.lockout_duration_minutes".to_owned(),
            message: format!(
                "lockout_duration_minutes {} is out of range; must be 1-60",
                s.lockout_duration_minutes
            ),
        });
    }

    if !(1..=24).contains(&s.auth_session_duration_hours) {
        return Err(ConfigError::ValidationError {
            field: "security.auth_session_duration_hours".to_owned(),
            message: format!(
                "auth_session_duration_hours {} is out of range; must be 1-24",
                s.auth_session_duration_hours
            ),
        });
    }

    if !matches!(
        s.tls_min_version.as_str(),
        "1.2" | "1.3" | "TLS1.2" | "TLS1.3"
    ) {
        return Err(ConfigError::ValidationError {
            field: "security.tls_min_version".to_owned(),
            message: format!(
                "unsupported TLS version '{}'; expected one of: 1.2, 1.3, TLS1.2, TLS1.3",
                s.tls_min_version
            ),
        });
    }

    if !matches!(s.spillage_action.as_str(), "warn" | "block" | "sanitize") {
        return Err(ConfigError::ValidationError {
            field: "security.spillage_action".to_owned(),
            message: format!(
                "unsupported spillage_action '{}'; expected one of: warn, block, sanitize",
                s.spillage_action
            ),
        });
    }

    if !matches!(
        s.classification.as_str(),
        "UNCLASSIFIED" | "CUI" | "CONFIDENTIAL" | "SECRET" | "TOP SECRET"
    ) {
        return Err(ConfigError::ValidationError {
            field: "security.classification".to_owned(),
            message: format!(
                "unsupported classification '{}'; expected one of: \
                 UNCLASSIFIED, CUI, CONFIDENTIAL, SECRET, TOP SECRET",
                s.classification
            ),
        });
    }

    Ok(())
}

fn validate_cache(config: &Config) -> ConfigResult<()> {
    let c = &config.cache;

    if c.max_size > 100_000 {
        return Err(ConfigError::ValidationError {
            field: "cache.max_size".to_owned(),
            message: format!("max_size {} is out of range; must be 0-100000", c.max_size),
        });
    }

    if !c.semantic_threshold.is_finite() || !(0.0..=1.0).contains(&c.semantic_threshold) {
        return Err(ConfigError::ValidationError {
            field: "cache.semantic_threshold".to_owned(),
            message: format!(
                "semantic_threshold {} is out of range; must be between 0.0 and 1.0",
                c.semantic_threshold
            ),
        });
    }

    Ok(())
}
