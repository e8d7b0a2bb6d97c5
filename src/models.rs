//! Model metadata as reported by the bridge.
//!
//! The bridge forwards the model runner's listing; every field beyond the
//! name is optional since older bridges omit the details block entirely.

use serde::Deserialize;

/// A model entry from `GET /api/models`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub modified_at: Option<String>,
    #[serde(default)]
    pub details: Option<ModelDetails>,
}

/// Nested details block (format, family, parameter count).
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDetails {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub parameter_size: Option<String>,
    #[serde(default)]
    pub quantization_level: Option<String>,
}

impl ModelInfo {
    /// One-line human description: name plus whatever metadata is present.
    pub fn describe(&self) -> String {
        let mut extras = Vec::new();

        if let Some(size) = self.size {
            extras.push(format_size(size));
        }
        if let Some(details) = &self.details {
            if let Some(family) = &details.family {
                extras.push(family.clone());
            }
            if let Some(params) = &details.parameter_size {
                extras.push(params.clone());
            }
        }

        if extras.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, extras.join(", "))
        }
    }
}

/// Formats a byte count as a short decimal-GB/MB string.
fn format_size(bytes: u64) -> String {
    const GB: f64 = 1_000_000_000.0;
    const MB: f64 = 1_000_000.0;

    let bytes = bytes as f64;
    if bytes >= GB {
        format!("{:.1} GB", bytes / GB)
    } else {
        format!("{:.0} MB", bytes / MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_entry() {
        let json = r#"{
            "name": "llama3:8b",
            "modified_at": "2025-11-02T10:00:00Z",
            "size": 4700000000,
            "digest": "sha256:abc",
            "details": {
                "format": "gguf",
                "family": "llama",
                "parameter_size": "8B",
                "quantization_level": "Q4_0"
            }
        }"#;

        let model: ModelInfo = serde_json::from_str(json).unwrap();
        assert_eq!(model.name, "llama3:8b");
        assert_eq!(model.details.as_ref().unwrap().family.as_deref(), Some("llama"));
        assert_eq!(model.describe(), "llama3:8b (4.7 GB, llama, 8B)");
    }

    #[test]
    fn test_deserialize_name_only() {
        let model: ModelInfo = serde_json::from_str(r#"{"name": "phi3"}"#).unwrap();
        assert!(model.details.is_none());
        assert_eq!(model.describe(), "phi3");
    }

    #[test]
    fn test_format_size_below_gigabyte() {
        let model = ModelInfo {
            name: "tiny".to_string(),
            size: Some(350_000_000),
            digest: None,
            modified_at: None,
            details: None,
        };
        assert_eq!(model.describe(), "tiny (350 MB)");
    }
}
