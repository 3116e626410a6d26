use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::tenancy::{TenantId, TenantRule, TenantTable};

pub const DEFAULT_SETTINGS_FILE: &str = "console.toml";

#[derive(Debug, Clone)]
pub struct Settings {
    pub service_url: String,
    pub request_timeout: Duration,
    /// `None` keeps the built-in tenant table.
    pub tenants: Option<Vec<TenantRuleSettings>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TenantRuleSettings {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub marker: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    service_url: Option<String>,
    request_timeout_secs: Option<u64>,
    tenants: Option<Vec<TenantRuleSettings>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_url: "https://gestion-envios-sz3x.onrender.com".into(),
            request_timeout: Duration::from_secs(15),
            tenants: None,
        }
    }
}

impl Settings {
    pub fn tenant_table(&self) -> anyhow::Result<TenantTable> {
        let Some(tenants) = &self.tenants else {
            return Ok(TenantTable::default());
        };
        let rules = tenants
            .iter()
            .map(|tenant| {
                Ok(TenantRule {
                    tenant_id: TenantId::new(&tenant.id)?,
                    display_name: tenant.name.clone().unwrap_or_else(|| tenant.id.clone()),
                    marker_fragment: tenant.marker.clone(),
                })
            })
            .collect::<Result<Vec<_>, shared::error::OrderError>>()
            .context("invalid tenant rule in settings")?;
        TenantTable::new(rules).context("invalid tenant table in settings")
    }
}

/// Defaults, then the settings file, then environment overrides.
///
/// A missing default file is fine; an explicitly requested one must exist.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (file, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_SETTINGS_FILE), false),
    };
    match fs::read_to_string(&file) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("failed to parse settings file '{}'", file.display()))?,
        Err(err) if required => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", file.display()));
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings.service_url = normalize_service_url(&settings.service_url)?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.service_url {
        settings.service_url = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        if v == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        settings.request_timeout = Duration::from_secs(v);
    }
    if let Some(v) = file_cfg.tenants {
        settings.tenants = Some(v);
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("ORDER_SERVICE_URL") {
        settings.service_url = v;
    }
    if let Some(v) = lookup("APP__SERVICE_URL") {
        settings.service_url = v;
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        match v.parse::<u64>() {
            Ok(parsed) if parsed > 0 => settings.request_timeout = Duration::from_secs(parsed),
            _ => warn!(value = %v, "ignoring invalid APP__REQUEST_TIMEOUT_SECS"),
        }
    }
}

pub fn normalize_service_url(raw: &str) -> anyhow::Result<String> {
    let raw = raw.trim();
    let parsed = Url::parse(raw).with_context(|| format!("invalid service url '{raw}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("service url '{raw}' must use http or https");
    }
    Ok(raw.trim_end_matches('/').to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
