//! Server configuration, layered with figment.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. `./omw.toml`
//! 3. `OMW_*` environment variables (`OMW_BIND_ADDRESS`, `OMW_LOG_DIR`, `OMW_TWILIO_API_BASE_URL`, ...)
//! 4. `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`, `TWILIO_PHONE_NUMBER`

#![allow(clippy::result_large_err)]

use std::{collections::BTreeMap, fmt, net::SocketAddr, path::PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "omw.toml";
pub const TWILIO_API_BASE_URL: &str = "https://api.twilio.com";

/// Twilio keys read verbatim from the environment.
const TWILIO_CREDENTIAL_KEYS: [&str; 3] = ["account_sid", "auth_token", "phone_number"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    pub log_dir: PathBuf,
    pub tls: Option<TlsConfig>,
    pub twilio: TwilioConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            log_dir: PathBuf::from("server/log"),
            tls: None,
            twilio: TwilioConfig::default(),
        }
    }
}

/// PEM files for serving HTTPS directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number messages are sent from.
    pub phone_number: String,
    pub api_base_url: String,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            phone_number: String::new(),
            api_base_url: TWILIO_API_BASE_URL.to_string(),
        }
    }
}

impl TwilioConfig {
    pub fn is_complete(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty() && !self.phone_number.is_empty()
    }
}

impl fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[redacted]")
            .field("phone_number", &self.phone_number)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

pub fn load_config() -> Result<ServerConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ServerConfig::default()))
        .merge(Toml::file(CONFIG_FILE))
        .merge(env_providers())
        .extract()
}

/// Defaults plus the given TOML, no file or environment lookup.
pub fn load_config_from_str(toml_content: &str) -> Result<ServerConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ServerConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

fn env_providers() -> Figment {
    // Env keys arrive lowercased with the prefix stripped, e.g. OMW_TLS_CERT_PATH -> "tls_cert_path".
    Figment::new()
        .merge(
            Env::prefixed("OMW_")
                .ignore(&["twilio_account_sid", "twilio_auth_token", "twilio_phone_number"])
                .map(|key| {
                    key.as_str()
                        .replacen("twilio_", "twilio.", 1)
                        .replacen("tls_", "tls.", 1)
                        .into()
                }),
        )
        .merge(twilio_credentials_env("OMW_TWILIO_"))
        .merge(twilio_credentials_env("TWILIO_"))
}

/// Credentials stay strings. `Env` would parse `+15550000` or `0123456789` as integers.
fn twilio_credentials_env(prefix: &str) -> Serialized<BTreeMap<String, String>> {
    let credentials = std::env::vars()
        .filter_map(|(key, value)| {
            let key = key.strip_prefix(prefix)?.to_ascii_lowercase();
            TWILIO_CREDENTIAL_KEYS.contains(&key.as_str()).then_some((key, value))
        })
        .collect();

    Serialized::default("twilio", credentials)
}
