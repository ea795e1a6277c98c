//! Configuration management for bake.
//!
//! Parses `bake.toml` with serde and provides auto-discovery of the config
//! file in the working directory and its parents.
//!
//! Loading happens in layers, each overriding the previous one:
//!
//! 1. built-in defaults
//! 2. top-level tables of `bake.toml`
//! 3. the selected `[presets.<name>]` table
//! 4. the `BAKE_ENV` profile (`production` silences, `development` is verbose)
//! 5. [`CliSettings`]
//!
//! ## Environment Variable Expansion
//!
//! String values support `${VAR}` and `${VAR:-default}`. Expanded fields:
//! - `input.dir`
//! - `output.dir`
//! - `output.base_url`
//! - `renderer.command`

mod expand;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Configuration filename to search for.
pub const CONFIG_FILENAME: &str = "bake.toml";

/// Name of the preset that applies no overlay.
pub const DEFAULT_PRESET: &str = "default";

/// Environment variable selecting the verbosity profile.
pub const PROFILE_ENV_VAR: &str = "BAKE_ENV";

/// Project directory name, created next to the config file.
const PROJECT_DIR: &str = ".bake";

/// Cache database filename inside the project directory.
const CACHE_FILENAME: &str = "render-cache.db";

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Preset to overlay on the base configuration.
    pub preset: Option<String>,
    /// Override verbose logging.
    pub verbose: Option<bool>,
    /// Override the input directory.
    pub input_dir: Option<PathBuf>,
    /// Override the output directory.
    pub output_dir: Option<PathBuf>,
}

/// Renderer theme, passed through to the Mermaid CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Mermaid's light theme. `light` is accepted as an alias.
    #[serde(alias = "light")]
    Default,
    #[default]
    Dark,
    Forest,
    Neutral,
    Base,
}

impl Theme {
    /// Name understood by `mmdc -t`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Dark => "dark",
            Self::Forest => "forest",
            Self::Neutral => "neutral",
            Self::Base => "base",
        }
    }
}

/// Image format written by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Svg,
    Png,
}

impl ImageFormat {
    /// File extension of rendered artifacts.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
        }
    }
}

/// How the diagram source is kept next to its rendered image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStyle {
    /// Drop the source; only the image reference remains.
    None,
    /// Fenced source block directly below the image.
    #[default]
    Inline,
    /// Fenced source block inside a `<details>` disclosure.
    Details,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Requested preset is not defined.
    #[error("Unknown preset '{name}' (available: {available})")]
    UnknownPreset {
        /// Requested preset name.
        name: String,
        /// Comma-separated defined preset names.
        available: String,
    },
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`input.dir`").
        field: String,
        /// Error message (e.g., "${`SITE_ROOT`} not set").
        message: String,
    },
}

/// On-disk shape of `bake.toml`: a base layer plus named preset layers.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    #[serde(flatten)]
    base: Layer,
    presets: BTreeMap<String, Layer>,
}

/// One configuration layer with every value optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Layer {
    verbose: Option<bool>,
    input: InputRaw,
    output: OutputRaw,
    theme: ThemeRaw,
    source: SourceRaw,
    renderer: RendererRaw,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InputRaw {
    dir: Option<String>,
    extension: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OutputRaw {
    dir: Option<String>,
    base_url: Option<String>,
    format: Option<ImageFormat>,
    preserve_tree: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ThemeRaw {
    default: Option<Theme>,
    both: Option<bool>,
    background: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SourceRaw {
    include: Option<bool>,
    style: Option<SourceStyle>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RendererRaw {
    command: Option<String>,
    args: Option<Vec<String>>,
    timeout_secs: Option<u64>,
}

impl Layer {
    /// Overlay `other` on top of `self`; values set in `other` win.
    fn overlay(self, other: Self) -> Self {
        Self {
            verbose: other.verbose.or(self.verbose),
            input: InputRaw {
                dir: other.input.dir.or(self.input.dir),
                extension: other.input.extension.or(self.input.extension),
            },
            output: OutputRaw {
                dir: other.output.dir.or(self.output.dir),
                base_url: other.output.base_url.or(self.output.base_url),
                format: other.output.format.or(self.output.format),
                preserve_tree: other.output.preserve_tree.or(self.output.preserve_tree),
            },
            theme: ThemeRaw {
                default: other.theme.default.or(self.theme.default),
                both: other.theme.both.or(self.theme.both),
                background: other.theme.background.or(self.theme.background),
            },
            source: SourceRaw {
                include: other.source.include.or(self.source.include),
                style: other.source.style.or(self.source.style),
            },
            renderer: RendererRaw {
                command: other.renderer.command.or(self.renderer.command),
                args: other.renderer.args.or(self.renderer.args),
                timeout_secs: other.renderer.timeout_secs.or(self.renderer.timeout_secs),
            },
        }
    }
}

/// Where documents are read from.
#[derive(Debug, Clone)]
pub struct InputConfig {
    /// Root directory scanned recursively.
    pub dir: PathBuf,
    /// File extension selecting documents, without the leading dot.
    pub extension: String,
}

/// Where artifacts are written and how they are addressed.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Directory receiving rendered images.
    pub dir: PathBuf,
    /// URL prefix used in image references.
    pub base_url: String,
    /// Rendered image format.
    pub format: ImageFormat,
    /// Mirror the input sub-directory of each document under `dir`.
    pub preserve_tree: bool,
}

/// Theme selection.
#[derive(Debug, Clone)]
pub struct ThemeConfig {
    /// Theme for single-variant rendering, and the primary variant otherwise.
    pub default: Theme,
    /// Render both a light and a dark variant of every diagram.
    pub both: bool,
    /// Background colour passed to the renderer.
    pub background: String,
}

/// Source retention settings.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Keep the diagram source next to the image at all.
    pub include: bool,
    /// Formatting of the kept source.
    pub style: SourceStyle,
}

/// External renderer invocation.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Program to execute.
    pub command: String,
    /// Arguments placed before the generated `-i/-o/-t/-b` flags.
    pub args: Vec<String>,
    /// Upper bound for a single render.
    pub timeout: Duration,
}

/// Application configuration with every value resolved.
#[derive(Debug, Clone)]
pub struct Config {
    /// Input configuration.
    pub input: InputConfig,
    /// Output configuration.
    pub output: OutputConfig,
    /// Theme configuration.
    pub theme: ThemeConfig,
    /// Source retention configuration.
    pub source: SourceConfig,
    /// Renderer configuration.
    pub renderer: RendererConfig,
    /// Log per-file and per-diagram progress.
    pub verbose: bool,
    /// Project directory for bake data (`.bake/`).
    pub project_dir: PathBuf,
    /// Name of the applied preset.
    pub preset: String,
    /// Path to the config file, if one was loaded.
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_layer(Layer::default(), Path::new("."))
    }
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `bake.toml` in current directory and parents,
    /// falling back to built-in defaults relative to the working directory.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit `config_path` doesn't exist, parsing or
    /// expansion fails, the preset is unknown, or validation fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let discovered = match config_path {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover_config(),
        };

        let (file, base_dir) = match &discovered {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                let file: ConfigFile = toml::from_str(&content)?;
                let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
                (file, dir)
            }
            None => (
                ConfigFile::default(),
                std::env::current_dir().unwrap_or_default(),
            ),
        };

        let preset = cli_settings
            .and_then(|s| s.preset.as_deref())
            .unwrap_or(DEFAULT_PRESET);
        let mut config = Self::from_file(file, preset, &base_dir)?;
        config.config_path = discovered;

        config.apply_env_profile(std::env::var(PROFILE_ENV_VAR).ok().as_deref());
        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        config.validate()?;
        Ok(config)
    }

    /// Cache database path (`.bake/render-cache.db`).
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.project_dir.join(CACHE_FILENAME)
    }

    /// Effective source style, folding `source.include = false` into `None`.
    #[must_use]
    pub fn source_style(&self) -> SourceStyle {
        if self.source.include {
            self.source.style
        } else {
            SourceStyle::None
        }
    }

    /// Build a config from a parsed file, overlaying the named preset.
    fn from_file(file: ConfigFile, preset: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let ConfigFile { base, mut presets } = file;

        let mut layer = if preset == DEFAULT_PRESET {
            base
        } else {
            let overlay = presets.remove(preset).ok_or_else(|| ConfigError::UnknownPreset {
                name: preset.to_owned(),
                available: std::iter::once(DEFAULT_PRESET)
                    .chain(presets.keys().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;
            base.overlay(overlay)
        };

        layer.expand_env_vars()?;

        let mut config = Self::from_layer(layer, base_dir);
        config.preset = preset.to_owned();
        Ok(config)
    }

    /// Resolve a layer against built-in defaults and a base directory.
    fn from_layer(layer: Layer, base_dir: &Path) -> Self {
        let resolve = |path: Option<String>, default: &str| {
            base_dir.join(path.as_deref().unwrap_or(default))
        };

        let extension = layer
            .input
            .extension
            .map_or_else(|| "md".to_owned(), |e| e.trim_start_matches('.').to_owned());

        Self {
            input: InputConfig {
                dir: resolve(layer.input.dir, "public/api/articles"),
                extension,
            },
            output: OutputConfig {
                dir: resolve(layer.output.dir, "public/api/articles"),
                base_url: layer
                    .output
                    .base_url
                    .unwrap_or_else(|| "/api/articles".to_owned()),
                format: layer.output.format.unwrap_or_default(),
                preserve_tree: layer.output.preserve_tree.unwrap_or(false),
            },
            theme: ThemeConfig {
                default: layer.theme.default.unwrap_or_default(),
                both: layer.theme.both.unwrap_or(false),
                background: layer
                    .theme
                    .background
                    .unwrap_or_else(|| "transparent".to_owned()),
            },
            source: SourceConfig {
                include: layer.source.include.unwrap_or(true),
                style: layer.source.style.unwrap_or_default(),
            },
            renderer: RendererConfig {
                command: layer.renderer.command.unwrap_or_else(|| "npx".to_owned()),
                args: layer
                    .renderer
                    .args
                    .unwrap_or_else(|| vec!["mmdc".to_owned()]),
                timeout: Duration::from_secs(layer.renderer.timeout_secs.unwrap_or(60)),
            },
            verbose: layer.verbose.unwrap_or(true),
            project_dir: base_dir.join(PROJECT_DIR),
            preset: DEFAULT_PRESET.to_owned(),
            config_path: None,
        }
    }

    /// Apply the `BAKE_ENV` verbosity profile.
    fn apply_env_profile(&mut self, profile: Option<&str>) {
        match profile {
            Some("production") => self.verbose = false,
            Some("development") => self.verbose = true,
            _ => {}
        }
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(verbose) = settings.verbose {
            self.verbose = verbose;
        }
        if let Some(input_dir) = &settings.input_dir {
            self.input.dir.clone_from(input_dir);
        }
        if let Some(output_dir) = &settings.output_dir {
            self.output.dir.clone_from(output_dir);
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.input.extension, "input.extension")?;
        require_non_empty(&self.renderer.command, "renderer.command")?;
        require_non_empty(&self.theme.background, "theme.background")?;
        if self.renderer.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "renderer.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}
