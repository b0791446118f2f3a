//! The configuration record.
//!
//! Loaded once at startup from `assetflow.json` (or built-in defaults) and then
//! passed by reference to every component. Keys are camelCase; any key left out
//! of the file keeps its default.
//!
//! ```json
//! {
//!   "mode": "development",
//!   "proxy": "localhost",
//!   "host": "192.168.1.31",
//!   "srcDir": "src",
//!   "distDir": "assets",
//!   "https": { "key": "certs/localhost-key.pem", "cert": "certs/localhost.pem" }
//! }
//! ```

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File name looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE: &str = "assetflow.json";

/// Build mode. Selects the pipeline variant bound to every watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    #[default]
    Production,
}

impl Mode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!(
                "unknown mode '{other}' (expected development or production)"
            )),
        }
    }
}

/// TLS certificate/key pair for the dev server.
///
/// Relative paths are resolved against the base directory. The dev server
/// always serves HTTPS, so both files must exist when it starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpsConfig {
    /// PEM private key.
    pub key: PathBuf,
    /// PEM certificate chain.
    pub cert: PathBuf,
}

impl Default for HttpsConfig {
    fn default() -> Self {
        Self {
            key: PathBuf::from("certs/localhost-key.pem"),
            cert: PathBuf::from("certs/localhost.pem"),
        }
    }
}

impl HttpsConfig {
    /// Anchor relative paths at `base_dir`.
    #[must_use]
    pub fn resolve(&self, base_dir: &Path) -> Self {
        Self {
            key: base_dir.join(&self.key),
            cert: base_dir.join(&self.cert),
        }
    }
}

/// Configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Build mode.
    pub mode: Mode,
    /// Upstream server the dev server forwards to.
    pub proxy: String,
    /// Host/IP the dev server binds to.
    pub host: String,
    /// Port the dev server binds to.
    pub port: u16,

    /// Top-level directory, relative to the base directory.
    pub root_dir: String,
    /// Source directory under the root.
    pub src_dir: String,
    /// SCSS directory under the source directory.
    pub scss_dir: String,
    /// SCSS glob under the SCSS directory.
    pub scss_files: String,
    /// ES6 directory under the source directory.
    pub es6_dir: String,
    /// ES6 glob under the ES6 directory.
    pub es6_files: String,
    /// TypeScript directory under the source directory.
    pub tsc_dir: String,
    /// TypeScript glob under the TypeScript directory.
    pub tsc_files: String,

    /// Output directory under the root.
    pub dist_dir: String,
    /// CSS output directory under the output directory.
    pub css_dist: String,
    /// CSS sourcemap directory under the CSS output directory.
    /// `null` embeds maps inline.
    pub css_map: Option<String>,
    /// JS output directory under the output directory.
    pub js_dist: String,
    /// JS sourcemap directory under the JS output directory.
    /// `null` embeds maps inline.
    pub js_map: Option<String>,

    /// Globs (relative to the root) whose changes force a full browser reload.
    pub reload_files: Vec<String>,
    /// Certificate/key pair the dev server serves HTTPS with.
    pub https: HttpsConfig,
    /// Open a browser once the dev server is up.
    pub open: bool,
    /// Show in-browser notifications.
    pub notify: bool,
    /// Delay used to coalesce bursts of file events.
    pub watch_delay_ms: u64,
    /// Browserslist query the script pipelines compile for, e.g.
    /// `"chrome 80, firefox 75"`. `null` lowers all syntax to ES5.
    pub targets: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Production,
            proxy: "localhost".to_string(),
            host: "192.168.1.31".to_string(),
            port: 3000,
            root_dir: String::new(),
            src_dir: "src".to_string(),
            scss_dir: "scss".to_string(),
            scss_files: "**/*.scss".to_string(),
            es6_dir: "js".to_string(),
            es6_files: "**/*.js".to_string(),
            tsc_dir: "js".to_string(),
            tsc_files: "**/*.ts".to_string(),
            dist_dir: "assets".to_string(),
            css_dist: "css".to_string(),
            css_map: Some(String::new()),
            js_dist: "js".to_string(),
            js_map: Some(String::new()),
            reload_files: vec!["**/*.html".to_string(), "**/*.php".to_string()],
            https: HttpsConfig::default(),
            open: false,
            notify: true,
            watch_delay_ms: 200,
            targets: None,
        }
    }
}

impl Config {
    /// Parse a config from JSON text.
    pub fn from_json(path: &Path, text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read and parse a config file.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(path, &text)
    }

    /// Override the mode.
    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}

/// A loaded config plus the directory its relative paths are anchored to.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    /// Directory containing the config file, or the working directory.
    pub base_dir: PathBuf,
    /// The file the config came from, if any.
    pub source: Option<PathBuf>,
}

/// Load the config.
///
/// With an explicit path the file must exist. Otherwise `assetflow.json` in
/// `cwd` is used when present, and the built-in defaults when not.
pub fn load(cwd: &Path, explicit: Option<&Path>) -> Result<LoadedConfig, Error> {
    let path = match explicit {
        Some(p) if p.is_absolute() => Some(p.to_path_buf()),
        Some(p) => Some(cwd.join(p)),
        None => {
            let candidate = cwd.join(CONFIG_FILE);
            candidate.is_file().then_some(candidate)
        }
    };

    match path {
        Some(path) => {
            let config = Config::from_file(&path)?;
            let base_dir = path
                .parent()
                .map_or_else(|| cwd.to_path_buf(), Path::to_path_buf);
            tracing::debug!(path = %path.display(), mode = %config.mode, "Loaded config");
            Ok(LoadedConfig {
                config,
                base_dir,
                source: Some(path),
            })
        }
        None => Ok(LoadedConfig {
            config: Config::default(),
            base_dir: cwd.to_path_buf(),
            source: None,
        }),
    }
}
