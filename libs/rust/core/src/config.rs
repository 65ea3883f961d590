//! Layered service settings: defaults, optional file, then `SENTIMENT__*` environment.
//!
//! Read once at startup. There is no hot reload.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};

pub const CONFIG_FILE_ENV: &str = "SENTIMENT_CONFIG_FILE";
pub const ENV_PREFIX: &str = "SENTIMENT";

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub api_title: String,
    pub api_version: String,
    /// Mount point of the prediction routes, also the metrics wildcard prefix.
    pub api_prefix: String,
    pub host: String,
    pub port: u16,
    pub model_path: String,
    /// Predictions slower than this are logged at warn level.
    pub latency_threshold_ms: f64,
    pub log_level: String,
    pub log_file: String,
    pub json_log: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_title: "Sentiment Analysis API".into(),
            api_version: "1.0.0".into(),
            api_prefix: "/api/v1".into(),
            host: "0.0.0.0".into(),
            port: 8000,
            model_path: "models/sentiment_model.json".into(),
            latency_threshold_ms: 300.0,
            log_level: "info".into(),
            log_file: "logs/app.log".into(),
            json_log: false,
        }
    }
}

impl Settings {
    /// Load settings, picking up `SENTIMENT_CONFIG_FILE` when it is set.
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok();
        Self::load_from(file.as_deref())
    }

    pub fn load_from(file: Option<&str>) -> Result<Self> {
        let d = Self::default();
        let mut builder = config::Config::builder()
            .set_default("api_title", d.api_title)?
            .set_default("api_version", d.api_version)?
            .set_default("api_prefix", d.api_prefix)?
            .set_default("host", d.host)?
            .set_default("port", i64::from(d.port))?
            .set_default("model_path", d.model_path)?
            .set_default("latency_threshold_ms", d.latency_threshold_ms)?
            .set_default("log_level", d.log_level)?
            .set_default("log_file", d.log_file)?
            .set_default("json_log", d.json_log)?;
        if let Some(file) = file {
            builder = builder.add_source(config::File::with_name(file).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );
        let settings: Settings = builder
            .build()?
            .try_deserialize()
            .context("invalid service settings")?;
        Ok(settings)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("invalid host address {:?}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_sources() {
        let s = Settings::load_from(None).unwrap();
        assert_eq!(s.api_prefix, "/api/v1");
        assert_eq!(s.port, 8000);
        assert_eq!(s.model_path, "models/sentiment_model.json");
        assert!((s.latency_threshold_ms - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("sentiment-settings-{}.yaml", std::process::id()));
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "port: 9100\nmodel_path: /srv/models/m.json\nlog_level: debug").unwrap();
        drop(f);
        let s = Settings::load_from(path.to_str()).unwrap();
        assert_eq!(s.port, 9100);
        assert_eq!(s.model_path, "/srv/models/m.json");
        assert_eq!(s.log_level, "debug");
        assert_eq!(s.host, "0.0.0.0");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_ignored() {
        let s = Settings::load_from(Some("/nonexistent/sentiment-settings.yaml")).unwrap();
        assert_eq!(s, Settings::load_from(None).unwrap());
    }

    #[test]
    fn bind_addr_rejects_hostnames() {
        let mut s = Settings::default();
        assert_eq!(s.bind_addr().unwrap().port(), 8000);
        s.host = "not an ip".into();
        assert!(s.bind_addr().is_err());
    }
}
