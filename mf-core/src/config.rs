//! Minimal env-keyed configuration, in the `DogConfig`/`app.set`/`app.get`
//! style: a flat string key-value store. Deliberately not a TOML/YAML
//! loader — the gateway binary only needs a handful of scalars (bind
//! address, shared-secret value, TTL hours, part-size limits) and a
//! multi-format config system would be scope creep for this core.

use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct MfConfig {
    values: HashMap<String, String>,
}

impl MfConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `MEDIAFORGE__`-prefixed environment variable, lower-casing
    /// and turning `__` into `.` (`MEDIAFORGE__KV__TABLE` -> `kv.table`).
    pub fn from_env() -> Self {
        let mut cfg = Self::new();
        for (key, value) in std::env::vars() {
            if let Some(stripped) = key.strip_prefix("MEDIAFORGE__") {
                let normalized = stripped.to_lowercase().replace("__", ".");
                cfg.set(normalized, value);
            }
        }
        cfg
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn get_duration_secs(&self, key: &str) -> Option<Duration> {
        self.get_u64(key).map(Duration::from_secs)
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_prefix_normalizes_keys() {
        std::env::set_var("MEDIAFORGE__KV__TABLE_NAME", "sessions");
        let cfg = MfConfig::from_env();
        assert_eq!(cfg.get("kv.table_name"), Some("sessions"));
        std::env::remove_var("MEDIAFORGE__KV__TABLE_NAME");
    }

    #[test]
    fn get_or_falls_back() {
        let cfg = MfConfig::new();
        assert_eq!(cfg.get_or("missing", "default"), "default");
    }
}
