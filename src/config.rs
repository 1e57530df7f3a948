use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::http::Request;

/// Engine configuration.
///
/// The generation tag and origins are explicit configuration rather than
/// ambient globals: two engines with different tags can coexist against
/// the same store backend.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Version tag naming the active cache generation. Changing it creates
  /// a new generation and schedules deletion of all others.
  pub generation: String,
  /// Origin of the host application; own-origin requests get the
  /// cache-first strategy.
  pub origin: String,
  /// Origins of slow-changing static asset CDNs (fonts, stylesheet
  /// hosts); these get stale-while-revalidate.
  #[serde(default)]
  pub static_origins: Vec<String>,
  /// URLs precached at initialization. Relative URLs resolve against
  /// `origin`.
  #[serde(default)]
  pub manifest: Vec<ManifestEntry>,
  /// SQLite store location; None means the default data directory.
  pub store_path: Option<PathBuf>,
}

impl Config {
  /// Minimal programmatic configuration, for embedding.
  pub fn new(generation: impl Into<String>, origin: impl Into<String>) -> Self {
    Self {
      generation: generation.into(),
      origin: origin.into(),
      static_origins: Vec::new(),
      manifest: Vec::new(),
      store_path: None,
    }
  }

  pub fn with_static_origins(mut self, origins: impl IntoIterator<Item = String>) -> Self {
    self.static_origins = origins.into_iter().collect();
    self
  }

  pub fn with_manifest(mut self, manifest: impl IntoIterator<Item = ManifestEntry>) -> Self {
    self.manifest = manifest.into_iter().collect();
    self
  }

  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./cachegate.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/cachegate/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/cachegate/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("cachegate.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("cachegate").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }
}

/// One precache manifest entry: a URL plus an optional fetch mode hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
  pub url: String,
  pub mode: FetchMode,
}

impl ManifestEntry {
  pub fn new(url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      mode: FetchMode::Default,
    }
  }

  pub fn no_cors(url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      mode: FetchMode::NoCors,
    }
  }

  /// Resolve this entry into a prepared request against the given base
  /// origin. Absolute URLs pass through; relative ones join the base.
  pub fn to_request(&self, base: &Url) -> Result<Request> {
    let resolved = base
      .join(&self.url)
      .map_err(|e| eyre!("Invalid manifest URL {}: {}", self.url, e))?;
    Ok(Request::get(resolved.as_str()).with_mode(self.mode))
  }
}

// Manifest entries can be written either as a bare URL string or as a
// {url, mode} map; accept both forms.
impl<'de> Deserialize<'de> for ManifestEntry {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
      Url(String),
      Full {
        url: String,
        #[serde(default)]
        mode: FetchMode,
      },
    }

    Ok(match Raw::deserialize(deserializer)? {
      Raw::Url(url) => ManifestEntry::new(url),
      Raw::Full { url, mode } => ManifestEntry { url, mode },
    })
  }
}

/// Fetch mode hint for cross-origin manifest entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchMode {
  #[default]
  Default,
  /// Fetch without reading CORS headers (opaque cross-origin resources
  /// like fonts referenced from stylesheets).
  NoCors,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_manifest_entry_string_or_map() {
    let yaml = r#"
generation: v3
origin: https://app.example.com
manifest:
  - /
  - /index.html
  - url: https://fonts.example.net/icons.woff2
    mode: no-cors
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.manifest.len(), 3);
    assert_eq!(config.manifest[0], ManifestEntry::new("/"));
    assert_eq!(config.manifest[1].mode, FetchMode::Default);
    assert_eq!(
      config.manifest[2],
      ManifestEntry::no_cors("https://fonts.example.net/icons.woff2")
    );
  }

  #[test]
  fn test_manifest_resolution() {
    let base = Url::parse("https://app.example.com").unwrap();

    let relative = ManifestEntry::new("/index.html").to_request(&base).unwrap();
    assert_eq!(relative.url, "https://app.example.com/index.html");

    let absolute = ManifestEntry::new("https://fonts.example.net/a.woff")
      .to_request(&base)
      .unwrap();
    assert_eq!(absolute.url, "https://fonts.example.net/a.woff");
  }

  #[test]
  fn test_defaults() {
    let yaml = "generation: v1\norigin: https://app.example.com\n";
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    assert!(config.static_origins.is_empty());
    assert!(config.manifest.is_empty());
    assert!(config.store_path.is_none());
  }
}
