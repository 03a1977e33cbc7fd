use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::ConfigError;
use crate::static_services::StaticServices;

pub const DEFAULT_SITE_FILE: &str = "wikiconf.toml";
pub const DEFAULT_ARTICLE_PATH: &str = "/wiki/$1";
pub const DEFAULT_SERVER: &str = "http://localhost";
pub const DEFAULT_SCRIPT: &str = "/index.php";
pub const DEFAULT_LANGUAGE_CODE: &str = "en";
pub const DEFAULT_MAX_TEMPLATE_DEPTH: i64 = 100;
pub const DEFAULT_LEGAL_TITLE_CHARS: &str =
    r#" %!"$&'()*,\-.\/0-9:;=?@A-Z\\^_`a-z~\x80-\xFF+"#;
pub const DEFAULT_URL_PROTOCOLS: &[&str] = &[
    "bitcoin:",
    "ftp://",
    "ftps://",
    "geo:",
    "git://",
    "gopher://",
    "http://",
    "https://",
    "irc://",
    "ircs://",
    "magnet:",
    "mailto:",
    "matrix:",
    "mms://",
    "news:",
    "nntp://",
    "redis://",
    "sftp://",
    "sip:",
    "sips:",
    "sms:",
    "ssh://",
    "svn://",
    "tel:",
    "telnet://",
    "urn:",
    "worldwind://",
    "xmpp:",
    "//",
];

/// Read-only view over the merged site settings.
///
/// `get` answers from the merged settings; `get_override` answers from the
/// deployment-local override map only.
pub trait ConfigSource: Send + Sync {
    fn get(&self, name: &str) -> Option<&Value>;
    fn get_override(&self, name: &str) -> Option<&Value>;
}

/// Typed accessors with the light normalization the facade relies on.
pub trait SettingsExt: ConfigSource {
    fn bool_or(&self, name: &str, default: bool) -> bool {
        self.get(name).map(coerce_bool).unwrap_or(default)
    }

    fn string_or(&self, name: &str, default: &str) -> String {
        self.get(name)
            .and_then(coerce_string)
            .unwrap_or_else(|| default.to_string())
    }

    fn optional_string(&self, name: &str) -> Option<String> {
        self.get(name)
            .and_then(coerce_string)
            .filter(|value| !value.is_empty())
    }

    fn string_list(&self, name: &str) -> Vec<String> {
        self.get(name).map(coerce_string_list).unwrap_or_default()
    }

    fn integer_or(&self, name: &str, default: i64) -> Result<i64, ConfigError> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(value) => coerce_integer(value).ok_or_else(|| ConfigError::InvalidSetting {
                name: name.to_string(),
                expected: "an integer",
            }),
        }
    }
}

impl<T: ConfigSource + ?Sized> SettingsExt for T {}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct SiteSettings {
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub overrides: Map<String, Value>,
}

impl SiteSettings {
    pub fn new(settings: Map<String, Value>, overrides: Map<String, Value>) -> Self {
        Self {
            settings,
            overrides,
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.settings.insert(name.to_string(), value.into());
        self
    }

    pub fn with_override(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.overrides.insert(name.to_string(), value.into());
        self
    }

    /// Short stable hash identifying this configuration snapshot.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(Value::Object(self.settings.clone()).to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update(Value::Object(self.overrides.clone()).to_string().as_bytes());
        let digest = hasher.finalize();
        let mut output = String::with_capacity(16);
        for byte in digest.iter().take(8) {
            output.push_str(&format!("{byte:02x}"));
        }
        output
    }
}

impl ConfigSource for SiteSettings {
    fn get(&self, name: &str) -> Option<&Value> {
        self.settings.get(name)
    }

    fn get_override(&self, name: &str) -> Option<&Value> {
        self.overrides.get(name)
    }
}

/// On-disk site description: settings, overrides and the static upstream tables.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SiteFile {
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub overrides: Map<String, Value>,
    #[serde(default)]
    pub services: StaticServices,
}

impl SiteFile {
    pub fn into_parts(self) -> (SiteSettings, StaticServices) {
        (
            SiteSettings::new(self.settings, self.overrides),
            self.services,
        )
    }
}

/// Load a site file (TOML, JSON or YAML by extension). Returns default if file doesn't exist.
pub fn load_site_file(path: &Path) -> Result<SiteFile> {
    if !path.exists() {
        return Ok(SiteFile::default());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    let parsed: SiteFile = match extension.as_deref() {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?,
        Some("yaml" | "yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?,
        _ => toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?,
    };
    Ok(parsed)
}

pub fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => {
            let text = text.trim();
            !(text.is_empty()
                || text == "0"
                || text.eq_ignore_ascii_case("false")
                || text.eq_ignore_ascii_case("no")
                || text.eq_ignore_ascii_case("off"))
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Scalars become a one-element list; falsy values become an empty list.
pub fn coerce_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(coerce_string).collect(),
        Value::Object(map) => map.values().filter_map(coerce_string).collect(),
        Value::String(text) if text.is_empty() => Vec::new(),
        other => coerce_string(other).into_iter().collect(),
    }
}

pub fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|n| n as i64)),
        Value::String(text) => text.trim().parse().ok(),
        Value::Bool(flag) => Some(i64::from(*flag)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn load_site_file_returns_default_for_missing_file() {
        let site = load_site_file(Path::new("/nonexistent/wikiconf.toml")).expect("load site");
        assert!(site.settings.is_empty());
        assert!(site.overrides.is_empty());
    }

    #[test]
    fn load_site_file_parses_toml_sections() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("wikiconf.toml");
        fs::write(
            &path,
            r#"
[settings]
Server = "https://example.wiki"
ArticlePath = "/wiki/$1"
ThumbLimits = [120, 150, 180]
InterwikiMagic = true

[overrides]
GalleryOptions = { mode = "packed" }

[services.language]
code = "en"

[[services.namespaces]]
id = 14
canonical = "Category"
"#,
        )
        .expect("write site");

        let site = load_site_file(&path).expect("load site");
        let (settings, services) = site.into_parts();
        assert_eq!(
            settings.get("Server"),
            Some(&json!("https://example.wiki"))
        );
        assert_eq!(settings.get("ThumbLimits"), Some(&json!([120, 150, 180])));
        assert_eq!(
            settings.get_override("GalleryOptions"),
            Some(&json!({"mode": "packed"}))
        );
        assert!(settings.get_override("Server").is_none());
        assert_eq!(services.namespaces.len(), 1);
        assert_eq!(services.language.code, "en");
    }

    #[test]
    fn load_site_file_accepts_json_and_yaml() {
        let temp = tempdir().expect("tempdir");
        let json_path = temp.path().join("site.json");
        fs::write(&json_path, r#"{"settings": {"LanguageCode": "de"}}"#).expect("write json");
        let yaml_path = temp.path().join("site.yaml");
        fs::write(&yaml_path, "settings:\n  LanguageCode: sr\n").expect("write yaml");

        let from_json = load_site_file(&json_path).expect("load json");
        let from_yaml = load_site_file(&yaml_path).expect("load yaml");
        assert_eq!(from_json.settings.get("LanguageCode"), Some(&json!("de")));
        assert_eq!(from_yaml.settings.get("LanguageCode"), Some(&json!("sr")));
    }

    #[test]
    fn load_site_file_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("wikiconf.toml");
        fs::write(&path, "[settings\nServer = \"oops\"").expect("write site");
        let error = load_site_file(&path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn typed_accessors_normalize_loose_values() {
        let settings = SiteSettings::default()
            .with("Flag", "yes")
            .with("Off", "0")
            .with("Single", "https://images.example/")
            .with("Empty", "")
            .with("Depth", "40")
            .with("Broken", json!({"a": 1}));

        assert!(settings.bool_or("Flag", false));
        assert!(!settings.bool_or("Off", true));
        assert!(settings.bool_or("Missing", true));
        assert_eq!(
            settings.string_list("Single"),
            vec!["https://images.example/".to_string()]
        );
        assert!(settings.string_list("Empty").is_empty());
        assert!(settings.string_list("Missing").is_empty());
        assert_eq!(settings.integer_or("Depth", 100), Ok(40));
        assert_eq!(settings.integer_or("Missing", 100), Ok(100));
        assert!(matches!(
            settings.integer_or("Broken", 0),
            Err(ConfigError::InvalidSetting { .. })
        ));
    }

    #[test]
    fn fingerprint_tracks_settings_and_overrides() {
        let base = SiteSettings::default().with("Server", "https://a.example");
        let same = SiteSettings::default().with("Server", "https://a.example");
        let overridden = base.clone().with_override("Server", "https://b.example");

        assert_eq!(base.fingerprint(), same.fingerprint());
        assert_eq!(base.fingerprint().len(), 16);
        assert_ne!(base.fingerprint(), overridden.fingerprint());
    }
}
