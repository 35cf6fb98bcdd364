use crate::error::{Error, Result};
use crate::traits::ModelSelector;
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};

const CURRENT_MODEL_KEY: &str = "current_model";

/// Admin-selected generation model persisted as `{"current_model": "..."}`.
///
/// The file is re-read on every call so a change made from the admin side is
/// picked up by the next question without a restart. Any problem reading it
/// falls back to the default model.
#[derive(Debug, Clone)]
pub struct JsonModelConfig {
    path: PathBuf,
    default_model: String,
    available: Vec<String>,
}

impl JsonModelConfig {
    pub fn new(path: impl Into<PathBuf>, default_model: impl Into<String>, available: Vec<String>) -> Self {
        Self { path: path.into(), default_model: default_model.into(), available }
    }

    pub fn available_models(&self) -> &[String] {
        &self.available
    }

    /// Persists `model` as the current model. Only models from the available
    /// list are accepted. The write goes through a temp file and a rename so
    /// readers never observe a half-written file.
    pub fn set_current_model(&self, model: &str) -> Result<()> {
        if !self.available.iter().any(|m| m == model) {
            return Err(Error::InvalidConfig(format!(
                "unknown model '{model}', expected one of: {}",
                self.available.join(", ")
            )));
        }
        let mut object = self.read_object().unwrap_or_default();
        object.insert(CURRENT_MODEL_KEY.to_string(), Value::String(model.to_string()));
        let body = serde_json::to_string_pretty(&Value::Object(object))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        info!(model, path = %self.path.display(), "generation model updated");
        Ok(())
    }

    fn read_object(&self) -> Option<Map<String, Value>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "model config not found, using default model");
                return None;
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to read model config");
                return None;
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => {
                error!(path = %self.path.display(), "model config is not a JSON object");
                None
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to parse model config");
                None
            }
        }
    }
}

impl ModelSelector for JsonModelConfig {
    fn current_model(&self) -> String {
        self.read_object()
            .and_then(|mut map| match map.remove(CURRENT_MODEL_KEY) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .unwrap_or_else(|| self.default_model.clone())
    }
}

/// A selector that always answers with the same model.
#[derive(Debug, Clone)]
pub struct FixedModel(pub String);

impl ModelSelector for FixedModel {
    fn current_model(&self) -> String {
        self.0.clone()
    }
}
