use std::{collections::HashMap, fs, path::Path};

use query_codec::{CipherKind, CodecConfig, QuerySecret};
use tracing::warn;

const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug)]
pub struct Settings {
    pub server_bind: String,
    pub query_secret: Option<String>,
    pub query_cipher: CipherKind,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:3000".into(),
            query_secret: None,
            query_cipher: CipherKind::Passthrough,
        }
    }
}

impl Settings {
    /// Codec configuration with the secret injected explicitly. A missing
    /// secret resolves to the built-in fallback.
    pub fn codec_config(&self) -> CodecConfig {
        CodecConfig {
            secret: QuerySecret::from_optional(self.query_secret.as_deref()),
            cipher: self.query_cipher,
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, String>>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.get("bind_addr") {
                    settings.server_bind = v.clone();
                }
                if let Some(v) = file_cfg.get("query_secret") {
                    settings.query_secret = Some(v.clone());
                }
                if let Some(v) = file_cfg.get("query_cipher") {
                    apply_cipher(&mut settings, v);
                }
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "ignoring unreadable settings file");
            }
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("QUERY_SECRET") {
        settings.query_secret = Some(v);
    }
    if let Some(v) = env("APP__QUERY_SECRET") {
        settings.query_secret = Some(v);
    }

    if let Some(v) = env("APP__QUERY_CIPHER") {
        apply_cipher(&mut settings, &v);
    }

    settings
}

fn apply_cipher(settings: &mut Settings, raw: &str) {
    match raw.parse() {
        Ok(kind) => settings.query_cipher = kind,
        Err(error) => warn!(%error, "keeping {} query cipher", settings.query_cipher),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
