//! Host settings file loading.
//!
//! The host keeps one JSON settings object; the `kodama` top-level key
//! holds this plugin's block. A missing or unparsable file degrades to
//! defaults; the settings route still works, and completion calls
//! then fail with a configuration error at request time.

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use kodama_types::PluginSettings;

#[derive(Debug, Default, Deserialize)]
struct HostSettings {
    #[serde(default)]
    kodama: PluginSettings,
}

/// Load the plugin settings block from the host settings file.
pub fn load_settings(path: &Path) -> PluginSettings {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(path = %path.display(), %err, "settings file not readable, using defaults");
            return PluginSettings::default();
        }
    };
    match serde_json::from_str::<HostSettings>(&raw) {
        Ok(host) => host.kodama,
        Err(err) => {
            warn!(path = %path.display(), %err, "settings file not valid JSON, using defaults");
            PluginSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"kodama": {{"api": "openai", "apiKey": "k", "completion": {{"waitSeconds": 2.0}}}}}}"#
        )
        .unwrap();
        let settings = load_settings(file.path());
        assert_eq!(settings.api.as_deref(), Some("openai"));
        assert_eq!(settings.completion_settings().wait_seconds, 2.0);
    }

    #[test]
    fn test_missing_file_defaults() {
        let settings = load_settings(Path::new("/nonexistent/settings.json"));
        assert_eq!(settings, PluginSettings::default());
    }

    #[test]
    fn test_invalid_json_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let settings = load_settings(file.path());
        assert_eq!(settings, PluginSettings::default());
    }

    #[test]
    fn test_missing_kodama_key_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"other": true}}"#).unwrap();
        let settings = load_settings(file.path());
        assert_eq!(settings, PluginSettings::default());
    }
}
