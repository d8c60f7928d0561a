use std::fs;
use std::path::Path;

use crate::config::{Config, EndpointConfig};
use crate::error::{GateError, Result};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| GateError::Config(format!("Failed to read config file: {e}")))?;
    let cfg: Config = toml::from_str(&txt)
        .map_err(|e| GateError::Config(format!("Failed to parse config: {e}")))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> Result<()> {
    let endpoints = [
        ("newsletter", &cfg.endpoints.newsletter),
        ("contact", &cfg.endpoints.contact),
        ("roi_report", &cfg.endpoints.roi_report),
        ("consultation", &cfg.endpoints.consultation),
        ("admin", &cfg.endpoints.admin),
    ];

    for (name, ep) in endpoints {
        validate_endpoint(name, ep)?;
    }

    if let Some(token) = &cfg.admin.token {
        if token.trim().is_empty() {
            return Err(GateError::Config(
                "Admin token must not be blank; omit it to disable the admin surface".to_string(),
            ));
        }
    }

    for origin in &cfg.security.allowed_origins {
        if origin.trim().is_empty() {
            return Err(GateError::Config(
                "Allowed origin entries must not be blank".to_string(),
            ));
        }
    }

    if cfg.sanitize.max_field_len == 0 {
        return Err(GateError::Config(
            "sanitize.max_field_len must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_endpoint(name: &str, ep: &EndpointConfig) -> Result<()> {
    if ep.rate.max_requests == 0 {
        return Err(GateError::Config(format!(
            "Endpoint {name}: rate.max_requests must be greater than zero"
        )));
    }
    if ep.rate.window_secs == 0 {
        return Err(GateError::Config(format!(
            "Endpoint {name}: rate.window_secs must be greater than zero"
        )));
    }
    if ep.max_body_bytes == 0 {
        return Err(GateError::Config(format!(
            "Endpoint {name}: max_body_bytes must be greater than zero"
        )));
    }
    if let Some(crate::config::DedupRule::Windowed { window_hours: 0, .. }) = ep.dedup {
        return Err(GateError::Config(format!(
            "Endpoint {name}: dedup.window_hours must be greater than zero"
        )));
    }
    Ok(())
}
