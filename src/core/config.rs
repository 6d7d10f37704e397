use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_GEMINI_API_HOSTNAME: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_STATIC_DIR: &str = "./web-ui";

/// Persona sent as the system instruction with every question.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "Eres un experto ingeniero en infraestructura de Cloudflare.
Tu objetivo es explicar de manera entusiasta y técnica por qué Cloudflare es superior al hosting tradicional (servidores en un solo lugar).
Usa un tono profesional pero acogedor. Habla sobre Edge Computing, latencia, seguridad (WAF/DDoS) y escalabilidad global.
Responde siempre en español.";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing API key: set API_KEY or GEMINI_API_KEY")]
    MissingApiKey,

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Clone)]
pub struct AppConfig {
    pub gemini_api_hostname: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub system_instruction: String,
    pub temperature: f32,
    pub request_timeout: Option<Duration>,
    pub static_dir: String,
}

// The API key must never end up in logs
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("gemini_api_hostname", &self.gemini_api_hostname)
            .field("gemini_api_key", &"<redacted>")
            .field("gemini_model", &self.gemini_model)
            .field("system_instruction", &self.system_instruction)
            .field("temperature", &self.temperature)
            .field("request_timeout", &self.request_timeout)
            .field("static_dir", &self.static_dir)
            .finish()
    }
}

impl AppConfig {
    /// Read the configuration from the process environment. Called
    /// once at start up.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from any variable lookup so it can be
    /// exercised without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let gemini_api_key = non_empty("API_KEY")
            .or_else(|| non_empty("GEMINI_API_KEY"))
            .ok_or(ConfigError::MissingApiKey)?;
        let gemini_api_hostname = non_empty("EDGE_GEMINI_HOST")
            .unwrap_or_else(|| DEFAULT_GEMINI_API_HOSTNAME.to_string());
        let gemini_model =
            non_empty("EDGE_GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
        let system_instruction = non_empty("EDGE_SYSTEM_INSTRUCTION")
            .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string());
        let static_dir =
            non_empty("EDGE_STATIC_DIR").unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string());

        let temperature = match non_empty("EDGE_TEMPERATURE") {
            Some(raw) => parse_temperature(&raw)?,
            None => DEFAULT_TEMPERATURE,
        };

        let request_timeout = match non_empty("EDGE_REQUEST_TIMEOUT_SECS") {
            Some(raw) => Some(parse_timeout(&raw)?),
            None => None,
        };

        Ok(Self {
            gemini_api_hostname,
            gemini_api_key,
            gemini_model,
            system_instruction,
            temperature,
            request_timeout,
            static_dir,
        })
    }
}

fn parse_temperature(raw: &str) -> Result<f32, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        name: "EDGE_TEMPERATURE",
        value: raw.to_string(),
    };
    let value: f32 = raw.trim().parse().map_err(|_| invalid())?;
    if !(0.0..=2.0).contains(&value) {
        return Err(invalid());
    }
    Ok(value)
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue {
            name: "EDGE_REQUEST_TIMEOUT_SECS",
            value: raw.to_string(),
        }),
    }
}
