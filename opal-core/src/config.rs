//! aggregate configs

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use lease_store::LeaseStatus;
use naas_client::ControllerConfig;

/// default maximum lifetime of an `allocated` lease, in seconds
pub const DEFAULT_MAX_ALLOCATED_SECS: i64 = 2 * 60 * 60;
/// default maximum lifetime of a `provisioned` lease, in seconds
pub const DEFAULT_MAX_PROVISIONED_SECS: i64 = 24 * 60 * 60;
/// how often the expiry sweep scans for leases past their end time
pub const EXPIRY_CHECK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(10);
/// default authority stamped into minted sliver urns
pub const DEFAULT_AUTHORITY: &str = "opal:am";

/// Status-dependent maximum lease lifetimes. Injected into the engine at
/// construction; every extension is capped against these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseDurations {
    /// max lifetime of an `allocated` lease, seconds
    pub max_allocated_secs: i64,
    /// max lifetime of a `provisioned` lease, seconds; provisioned leases
    /// typically outlive allocated ones
    pub max_provisioned_secs: i64,
}

impl Default for LeaseDurations {
    fn default() -> Self {
        Self {
            max_allocated_secs: DEFAULT_MAX_ALLOCATED_SECS,
            max_provisioned_secs: DEFAULT_MAX_PROVISIONED_SECS,
        }
    }
}

impl LeaseDurations {
    pub fn allocated(&self) -> Duration {
        Duration::seconds(self.max_allocated_secs)
    }

    pub fn provisioned(&self) -> Duration {
        Duration::seconds(self.max_provisioned_secs)
    }

    /// the maximum that applies when extending a lease in `status`
    pub fn max_for(&self, status: LeaseStatus) -> Duration {
        match status {
            LeaseStatus::Allocated => self.allocated(),
            _ => self.provisioned(),
        }
    }
}

/// aggregate config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpalConfig {
    /// authority stamped into minted sliver urns
    #[serde(default = "default_authority")]
    pub authority: String,
    #[serde(default)]
    pub durations: LeaseDurations,
    pub controller: ControllerConfig,
    #[serde(skip)]
    path: Option<PathBuf>,
}

fn default_authority() -> String {
    DEFAULT_AUTHORITY.to_owned()
}

impl OpalConfig {
    /// attempts to decode the config first as JSON, then YAML, finally erroring if neither work
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::parse_str(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to find config at {}", &path.display()))?,
        )?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    /// attempts to decode the config first as JSON, then YAML, finally erroring if neither work
    pub fn parse_str<S: AsRef<str>>(s: S) -> Result<Self> {
        let s = s.as_ref();
        match serde_json::from_str(s) {
            Ok(config) => Ok(config),
            Err(json_err) => serde_yaml::from_str(s).map_err(|yaml_err| {
                anyhow!("failed to decode config as JSON ({json_err}) or YAML ({yaml_err})")
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

pub mod trace {
    //! tracing configuration
    use anyhow::Result;
    use tracing_subscriber::{
        filter::EnvFilter,
        fmt::{
            self,
            format::{Format, PrettyFields},
        },
        prelude::__tracing_subscriber_SubscriberExt,
        util::SubscriberInitExt,
    };

    /// log as "json" or "standard" (unstructured)
    static DEFAULT_LOG_FORMAT: &str = "standard";

    /// Set up the global subscriber. Log level comes from `opal_log`, the
    /// format from the `LOG_FORMAT` env var.
    pub fn init(opal_log: &str) -> Result<()> {
        let log_frmt =
            std::env::var("LOG_FORMAT").unwrap_or_else(|_| DEFAULT_LOG_FORMAT.to_owned());

        let filter = EnvFilter::try_new(opal_log)
            .or_else(|_| EnvFilter::try_new("info"))?
            .add_directive("hyper=off".parse()?);

        match &log_frmt[..] {
            "json" => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json())
                    .init();
            }
            "pretty" => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(
                        fmt::layer()
                            .event_format(Format::default().pretty().with_source_location(false))
                            .fmt_fields(PrettyFields::new()),
                    )
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer())
                    .init();
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_with_defaults() {
        let config = OpalConfig::parse_str(
            r#"
controller:
    address: "127.0.0.1"
    port: 8888
    user: "admin"
    password: "123456"
"#,
        )
        .expect("yaml config");

        assert_eq!(config.authority, DEFAULT_AUTHORITY);
        assert_eq!(
            config.durations.max_allocated_secs,
            DEFAULT_MAX_ALLOCATED_SECS
        );
        assert_eq!(config.controller.port, 8888);
    }

    #[test]
    fn parses_json_with_explicit_durations() {
        let config = OpalConfig::parse_str(
            r#"{
                "authority": "lab:am",
                "durations": { "max_allocated_secs": 600, "max_provisioned_secs": 18000 },
                "controller": { "address": "10.0.0.1", "port": 80, "user": "u", "password": "p" }
            }"#,
        )
        .expect("json config");

        assert_eq!(config.authority, "lab:am");
        assert_eq!(config.durations.allocated(), chrono::Duration::seconds(600));
        assert_eq!(
            config.durations.max_for(lease_store::LeaseStatus::Provisioned),
            chrono::Duration::seconds(18000)
        );
    }

    #[test]
    fn garbage_is_refused() {
        assert!(OpalConfig::parse_str(": definitely not a config {").is_err());
    }
}
