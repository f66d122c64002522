use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;

use crate::channel::ChannelKind;
use crate::error::{ConfigError, CoreError, Result};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Default location of the config file, overridable with `TEXTCAST_CONFIG`.
pub fn default_config_path() -> PathBuf {
    env::var("TEXTCAST_CONFIG")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config/config.json"))
}

/// Fixed key names of the configuration source.
pub mod keys {
    pub const API_KEY: &str = "API_KEY";
    pub const APP_ID: &str = "APP_ID";
    pub const ONESIGNAL_API_URL: &str = "ONESIGNAL_API_URL";
    pub const TWILIO_ACCOUNT_SID: &str = "TWILIO_ACCOUNT_SID";
    pub const TWILIO_AUTH_TOKEN: &str = "TWILIO_AUTH_TOKEN";
    pub const TWILIO_PHONE_NUMBER: &str = "TWILIO_PHONE_NUMBER";
    pub const TWILIO_API_URL: &str = "TWILIO_API_URL";
    pub const NEXMO_API_KEY: &str = "NEXMO_API_KEY";
    pub const NEXMO_API_SECRET: &str = "NEXMO_API_SECRET";
    pub const NEXMO_PHONE_NUMBER: &str = "NEXMO_PHONE_NUMBER";
    pub const NEXMO_API_URL: &str = "NEXMO_API_URL";
    pub const SMTP_SERVER: &str = "SMTP_SERVER";
    pub const SMTP_PORT: &str = "SMTP_PORT";
    pub const SMTP_USER: &str = "SMTP_USER";
    pub const SMTP_PASSWORD: &str = "SMTP_PASSWORD";
    pub const SMTP_DELAY: &str = "SMTP_DELAY";
    pub const AWS_ACCESS_KEY: &str = "AWS_ACCESS_KEY";
    pub const AWS_SECRET_KEY: &str = "AWS_SECRET_KEY";
    pub const AWS_REGION: &str = "AWS_REGION";
    pub const AWS_SNS_ENDPOINT_URL: &str = "AWS_SNS_ENDPOINT_URL";
    pub const ENABLE_ONESIGNAL: &str = "ENABLE_ONESIGNAL";
    pub const ENABLE_TWILIO: &str = "ENABLE_TWILIO";
    pub const ENABLE_NEXMO: &str = "ENABLE_NEXMO";
    pub const ENABLE_SMTP: &str = "ENABLE_SMTP";
    pub const ENABLE_AWS_SNS: &str = "ENABLE_AWS_SNS";

    pub const ALL: &[&str] = &[
        API_KEY,
        APP_ID,
        ONESIGNAL_API_URL,
        TWILIO_ACCOUNT_SID,
        TWILIO_AUTH_TOKEN,
        TWILIO_PHONE_NUMBER,
        TWILIO_API_URL,
        NEXMO_API_KEY,
        NEXMO_API_SECRET,
        NEXMO_PHONE_NUMBER,
        NEXMO_API_URL,
        SMTP_SERVER,
        SMTP_PORT,
        SMTP_USER,
        SMTP_PASSWORD,
        SMTP_DELAY,
        AWS_ACCESS_KEY,
        AWS_SECRET_KEY,
        AWS_REGION,
        AWS_SNS_ENDPOINT_URL,
        ENABLE_ONESIGNAL,
        ENABLE_TWILIO,
        ENABLE_NEXMO,
        ENABLE_SMTP,
        ENABLE_AWS_SNS,
    ];
}

pub const DEFAULT_ONESIGNAL_API_URL: &str = "https://onesignal.com";
pub const DEFAULT_TWILIO_API_URL: &str = "https://api.twilio.com";
pub const DEFAULT_NEXMO_API_URL: &str = "https://rest.nexmo.com";
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_secs(1);

// ── Source ────────────────────────────────────────────────────

/// Flat key/value mapping the snapshot is built from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    values: BTreeMap<String, Value>,
}

impl ConfigSource {
    pub fn from_json_str(json: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(map) => Ok(Self {
                values: map.into_iter().collect(),
            }),
            _ => Err(CoreError::NotAnObject),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading config");
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Environment variables named after a known key win over file values.
    pub fn with_env_overrides(mut self) -> Self {
        for key in keys::ALL {
            if let Some(v) = env::var(key).ok().filter(|s| !s.is_empty()) {
                self.values.insert((*key).to_string(), Value::String(v));
            }
        }
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Non-empty string form of a value; numbers are stringified.
    fn string(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn required(&self, key: &'static str) -> std::result::Result<String, ConfigError> {
        self.string(key).ok_or(ConfigError::Missing(key))
    }

    fn secret(&self, key: &'static str) -> std::result::Result<Secret, ConfigError> {
        self.required(key).map(Secret)
    }

    fn flag(&self, key: &'static str) -> std::result::Result<bool, ConfigError> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(v) => Ok(v != 0),
                None => Err(ConfigError::Invalid {
                    key,
                    reason: format!("not a boolean: {n}"),
                }),
            },
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" | "" => Ok(false),
                other => Err(ConfigError::Invalid {
                    key,
                    reason: format!("not a boolean: {other}"),
                }),
            },
            Some(other) => Err(ConfigError::Invalid {
                key,
                reason: format!("not a boolean: {other}"),
            }),
        }
    }

    fn port(&self, key: &'static str) -> std::result::Result<u16, ConfigError> {
        let raw = self.required(key)?;
        raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
            key,
            reason: format!("{raw}: {e}"),
        })
    }

    fn seconds(&self, key: &'static str) -> std::result::Result<Option<Duration>, ConfigError> {
        let Some(raw) = self.string(key) else {
            return Ok(None);
        };
        let secs = raw.parse::<f64>().map_err(|e| ConfigError::Invalid {
            key,
            reason: format!("{raw}: {e}"),
        })?;
        Duration::try_from_secs_f64(secs)
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key,
                reason: format!("{raw}: {e}"),
            })
    }
}

// ── Secrets ───────────────────────────────────────────────────

/// Credential string that never prints its contents.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

// ── Per-channel settings ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct OneSignalSettings {
    pub api_key: Secret,
    pub app_id: String,
    pub api_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TwilioSettings {
    pub account_sid: String,
    pub auth_token: Secret,
    pub from_number: String,
    pub api_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VonageSettings {
    pub api_key: String,
    pub api_secret: Secret,
    pub from_number: String,
    pub api_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub user: String,
    pub password: Secret,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnsSettings {
    pub access_key: String,
    pub secret_key: Secret,
    pub region: String,
    pub endpoint_url: Option<String>,
}

/// One provider's toggle plus its credentials, or the reason they are unusable.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig<T> {
    pub enabled: bool,
    pub settings: std::result::Result<T, ConfigError>,
}

impl<T> ChannelConfig<T> {
    fn build(
        source: &ConfigSource,
        flag: &'static str,
        settings: impl FnOnce(&ConfigSource) -> std::result::Result<T, ConfigError>,
    ) -> Self {
        match source.flag(flag) {
            Ok(enabled) => Self {
                enabled,
                settings: settings(source),
            },
            Err(e) => Self {
                enabled: false,
                settings: Err(e),
            },
        }
    }

    /// Whether credentials were complete, regardless of the toggle.
    pub fn is_configured(&self) -> bool {
        self.settings.is_ok()
    }

    /// The configuration problem, if any.
    pub fn problem(&self) -> Option<&ConfigError> {
        self.settings.as_ref().err()
    }
}

// ── Snapshot ──────────────────────────────────────────────────

/// Immutable bundle of every channel's configuration.
///
/// Never mutated after construction; a reload builds a new snapshot that
/// replaces the old one wholesale (see [`crate::snapshot::SnapshotStore`]).
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSnapshot {
    /// Incremented by the store on each swap.
    pub generation: u64,
    pub onesignal: ChannelConfig<OneSignalSettings>,
    pub twilio: ChannelConfig<TwilioSettings>,
    pub vonage: ChannelConfig<VonageSettings>,
    pub smtp: ChannelConfig<SmtpSettings>,
    pub aws_sns: ChannelConfig<SnsSettings>,
    /// Pause after every send attempt.
    pub send_delay: Duration,
}

impl ConfigSnapshot {
    /// Build a snapshot from a source. Problems with one channel never
    /// prevent the others from being built.
    pub fn from_source(source: &ConfigSource) -> Self {
        let send_delay = match source.seconds(keys::SMTP_DELAY) {
            Ok(Some(d)) => d,
            Ok(None) => DEFAULT_SEND_DELAY,
            Err(e) => {
                tracing::warn!(error = %e, "invalid send delay, using default");
                DEFAULT_SEND_DELAY
            }
        };

        let snapshot = Self {
            generation: 0,
            onesignal: ChannelConfig::build(source, keys::ENABLE_ONESIGNAL, |s| {
                Ok(OneSignalSettings {
                    api_key: s.secret(keys::API_KEY)?,
                    app_id: s.required(keys::APP_ID)?,
                    api_url: s
                        .string(keys::ONESIGNAL_API_URL)
                        .unwrap_or_else(|| DEFAULT_ONESIGNAL_API_URL.to_string()),
                })
            }),
            twilio: ChannelConfig::build(source, keys::ENABLE_TWILIO, |s| {
                Ok(TwilioSettings {
                    account_sid: s.required(keys::TWILIO_ACCOUNT_SID)?,
                    auth_token: s.secret(keys::TWILIO_AUTH_TOKEN)?,
                    from_number: s.required(keys::TWILIO_PHONE_NUMBER)?,
                    api_url: s
                        .string(keys::TWILIO_API_URL)
                        .unwrap_or_else(|| DEFAULT_TWILIO_API_URL.to_string()),
                })
            }),
            vonage: ChannelConfig::build(source, keys::ENABLE_NEXMO, |s| {
                Ok(VonageSettings {
                    api_key: s.required(keys::NEXMO_API_KEY)?,
                    api_secret: s.secret(keys::NEXMO_API_SECRET)?,
                    from_number: s.required(keys::NEXMO_PHONE_NUMBER)?,
                    api_url: s
                        .string(keys::NEXMO_API_URL)
                        .unwrap_or_else(|| DEFAULT_NEXMO_API_URL.to_string()),
                })
            }),
            smtp: ChannelConfig::build(source, keys::ENABLE_SMTP, |s| {
                Ok(SmtpSettings {
                    server: s.required(keys::SMTP_SERVER)?,
                    port: s.port(keys::SMTP_PORT)?,
                    user: s.required(keys::SMTP_USER)?,
                    password: s.secret(keys::SMTP_PASSWORD)?,
                })
            }),
            aws_sns: ChannelConfig::build(source, keys::ENABLE_AWS_SNS, |s| {
                Ok(SnsSettings {
                    access_key: s.required(keys::AWS_ACCESS_KEY)?,
                    secret_key: s.secret(keys::AWS_SECRET_KEY)?,
                    region: s.required(keys::AWS_REGION)?,
                    endpoint_url: s.string(keys::AWS_SNS_ENDPOINT_URL),
                })
            }),
            send_delay,
        };

        for kind in ChannelKind::PRIORITY {
            if let (true, Some(problem)) = (snapshot.is_enabled(kind), snapshot.problem(kind)) {
                tracing::error!(channel = %kind, error = %problem, "enabled channel is misconfigured");
            }
        }

        snapshot
    }

    /// Read the file, apply environment overrides, and build.
    pub fn load(path: &Path) -> Result<Self> {
        let source = ConfigSource::from_file(path)?.with_env_overrides();
        Ok(Self::from_source(&source))
    }

    pub fn is_enabled(&self, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Twilio => self.twilio.enabled,
            ChannelKind::Vonage => self.vonage.enabled,
            ChannelKind::OneSignal => self.onesignal.enabled,
            ChannelKind::Smtp => self.smtp.enabled,
            ChannelKind::AwsSns => self.aws_sns.enabled,
        }
    }

    pub fn problem(&self, kind: ChannelKind) -> Option<&ConfigError> {
        match kind {
            ChannelKind::Twilio => self.twilio.problem(),
            ChannelKind::Vonage => self.vonage.problem(),
            ChannelKind::OneSignal => self.onesignal.problem(),
            ChannelKind::Smtp => self.smtp.problem(),
            ChannelKind::AwsSns => self.aws_sns.problem(),
        }
    }

    /// Enabled channels in priority order.
    pub fn enabled_channels(&self) -> Vec<ChannelKind> {
        ChannelKind::PRIORITY
            .into_iter()
            .filter(|k| self.is_enabled(*k))
            .collect()
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!(generation = self.generation, "Config snapshot loaded:");
        for kind in ChannelKind::PRIORITY {
            tracing::info!(
                "  {:<10} enabled={}, configured={}",
                kind.name(),
                self.is_enabled(kind),
                self.problem(kind).is_none()
            );
        }
        tracing::info!("  send delay: {:?}", self.send_delay);
    }

    /// Return a redacted view safe to print (no secrets).
    pub fn redacted_summary(&self) -> Value {
        fn channel<T>(c: &ChannelConfig<T>, extra: Value) -> Value {
            serde_json::json!({
                "enabled": c.enabled,
                "configured": c.is_configured(),
                "problem": c.problem().map(|e| e.to_string()),
                "details": extra,
            })
        }

        serde_json::json!({
            "generation": self.generation,
            "send_delay_ms": self.send_delay.as_millis() as u64,
            "twilio": channel(&self.twilio, serde_json::json!({
                "from": self.twilio.settings.as_ref().ok().map(|s| s.from_number.clone()),
            })),
            "vonage": channel(&self.vonage, serde_json::json!({
                "from": self.vonage.settings.as_ref().ok().map(|s| s.from_number.clone()),
            })),
            "onesignal": channel(&self.onesignal, serde_json::json!({
                "app_id": self.onesignal.settings.as_ref().ok().map(|s| s.app_id.clone()),
            })),
            "smtp": channel(&self.smtp, serde_json::json!({
                "server": self.smtp.settings.as_ref().ok().map(|s| s.server.clone()),
                "port": self.smtp.settings.as_ref().ok().map(|s| s.port),
            })),
            "aws_sns": channel(&self.aws_sns, serde_json::json!({
                "region": self.aws_sns.settings.as_ref().ok().map(|s| s.region.clone()),
            })),
        })
    }
}
