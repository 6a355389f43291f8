use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::paths::AppPaths;
use super::settings::Settings;
use super::validation::validate_config;
use crate::core::errors::ApiError;

/// Environment variables that override individual config keys.
///
/// Earlier entries win when several map to the same key.
const ENV_OVERRIDES: [(&str, &str, &str); 5] = [
    ("CODE_TUTOR_LLM_API_KEY", "llm", "api_key"),
    ("GROQ_API_KEY", "llm", "api_key"),
    ("CODE_TUTOR_LLM_BASE_URL", "llm", "base_url"),
    ("CODE_TUTOR_EMBEDDING_API_KEY", "embedding", "api_key"),
    ("PORT", "server", "port"),
];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("CODE_TUTOR_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Public config deep-merged with secrets, then environment overrides.
    pub fn load_config(&self) -> Result<Value, ApiError> {
        let public_config = load_yaml_file(&self.config_path());
        let secrets_config = load_yaml_file(&self.secrets_path());
        let merged = deep_merge(&public_config, &secrets_config);
        Ok(apply_env_overrides(merged, |key| env::var(key).ok()))
    }

    pub fn load_settings(&self) -> Result<Settings, ApiError> {
        let config = self.load_config()?;
        settings_from_value(config)
    }
}

pub fn settings_from_value(config: Value) -> Result<Settings, ApiError> {
    validate_config(&config)?;
    serde_json::from_value(config)
        .map_err(|e| ApiError::BadRequest(format!("Invalid config: {}", e)))
}

fn load_yaml_file(path: &Path) -> Value {
    if !path.exists() {
        return Value::Object(Map::new());
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Value>(&contents) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => Value::Object(Map::new()),
            Err(err) => {
                tracing::warn!("Ignoring unparsable config {}: {}", path.display(), err);
                Value::Object(Map::new())
            }
        },
        Err(_) => Value::Object(Map::new()),
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn apply_env_overrides(config: Value, lookup: impl Fn(&str) -> Option<String>) -> Value {
    let mut overrides = Map::new();

    for (var, section, key) in ENV_OVERRIDES.iter().rev() {
        let Some(raw) = lookup(var).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        let value = if *key == "port" {
            match raw.trim().parse::<u64>() {
                Ok(port) => json!(port),
                Err(_) => {
                    tracing::warn!("Ignoring non-numeric {}={}", var, raw);
                    continue;
                }
            }
        } else {
            Value::String(raw)
        };

        let entry = overrides
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = entry {
            map.insert(key.to_string(), value);
        }
    }

    deep_merge(&config, &Value::Object(overrides))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "a": 1,
            "b": { "c": 2, "d": 3 },
            "arr": [1, 2]
        });
        let override_value = json!({
            "b": { "c": 99 },
            "arr": [3],
            "e": "x"
        });

        let merged = deep_merge(&base, &override_value);

        assert_eq!(
            merged,
            json!({
                "a": 1,
                "b": { "c": 99, "d": 3 },
                "arr": [3],
                "e": "x"
            })
        );
    }

    #[test]
    fn env_overrides_take_precedence_and_respect_order() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GROQ_API_KEY", "groq-key"),
            ("CODE_TUTOR_LLM_API_KEY", "explicit-key"),
            ("PORT", "9001"),
        ]);
        let config = json!({ "llm": { "model": "m", "api_key": "from-file" } });

        let merged = apply_env_overrides(config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(merged["llm"]["api_key"], "explicit-key");
        assert_eq!(merged["llm"]["model"], "m");
        assert_eq!(merged["server"]["port"], 9001);
    }

    #[test]
    fn non_numeric_port_override_is_ignored() {
        let merged = apply_env_overrides(json!({}), |k| {
            (k == "PORT").then(|| "eighty".to_string())
        });
        assert!(merged.get("server").is_none());
    }

    #[test]
    fn load_config_merges_secrets_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::with_data_dir(tmp.path().to_path_buf(), tmp.path().join("data"));
        fs::write(
            tmp.path().join("config.yml"),
            "llm:\n  model: llama3-8b\nrag:\n  chunk_size: 500\n",
        )
        .expect("write config");
        fs::write(&paths.secrets_path, "llm:\n  api_key: from-secrets\n").expect("write secrets");

        let service = ConfigService::new(Arc::new(paths));
        let config = load_yaml_file(&service.config_path());
        let merged = deep_merge(&config, &load_yaml_file(&service.secrets_path()));

        assert_eq!(merged["llm"]["model"], "llama3-8b");
        assert_eq!(merged["llm"]["api_key"], "from-secrets");
        assert_eq!(merged["rag"]["chunk_size"], 500);
    }
}
