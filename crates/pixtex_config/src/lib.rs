use dirs::Dirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;

static CONFIG: OnceLock<ConfigInner> = OnceLock::new();

#[derive(Debug)]
struct ConfigInner {
    config: Config,
    file_path: PathBuf,
}

/// Resolves the config file location when none was given on the command line.
///
/// Linux: ~/.config/pixtex/config.toml
/// macOS: ~/Library/Application\ Support/org.vim.Pixtex/config.toml
/// Windows: ~\AppData\Roaming\vim\Pixtex\config\config.toml
fn default_config_file() -> PathBuf {
    let config_file = Dirs::project().config_dir().join("config.toml");

    if !config_file.exists() {
        if let Some(config_dir) = config_file.parent() {
            std::fs::create_dir_all(config_dir).ok();
        }
    }

    config_file
}

fn read_config(config_file: &PathBuf) -> (Config, Option<toml::de::Error>) {
    match std::fs::read_to_string(config_file) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => (config, None),
            // An unparsable file falls back to the default config, the
            // error is handed to the caller for surfacing in the editor.
            Err(err) => (Config::default(), Some(err)),
        },
        // A missing file is the fresh-install case, not an error.
        Err(_) => (Config::default(), None),
    }
}

/// Initializes the global config, once per process.
///
/// Later calls keep the config from the first one. The returned error, if
/// any, describes why the file on disk was ignored in favor of the default.
pub fn load_config_on_startup(
    specified_config_file: Option<PathBuf>,
) -> (&'static Config, Option<toml::de::Error>) {
    let file_path = specified_config_file.unwrap_or_else(default_config_file);
    let (config, maybe_error) = read_config(&file_path);

    let inner = CONFIG.get_or_init(|| ConfigInner { config, file_path });

    (&inner.config, maybe_error)
}

/// Global config access, [`load_config_on_startup`] must have run first.
pub fn config() -> &'static Config {
    &CONFIG.get().expect("Config uninitialized").config
}

/// Path the global config was loaded from, or would have been.
pub fn config_file() -> &'static PathBuf {
    &CONFIG.get().expect("Config uninitialized").file_path
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LogConfig {
    /// Absolute path of the log file.
    pub log_file: Option<String>,

    /// Max log level, e.g. `"debug"` or `"trace"`.
    pub max_level: String,

    /// Per-target filter for narrowing the log output down.
    ///
    /// ```toml
    /// [log]
    /// log-target = "pixtex_core::stdio_server=trace,rpc=debug"
    /// ```
    pub log_target: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            max_level: "debug".into(),
            log_target: "".into(),
        }
    }
}

/// Render pipeline configuration.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Name of the converter process entry used to turn TeX fragments
    /// into images.
    ///
    /// `dvipng` is the only entry registered out of the box.
    pub process: String,

    /// TeX preamble prepended to every generated snippet file.
    pub preamble: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            process: "dvipng".into(),
            preamble: "\\documentclass{article}\n\
                       \\usepackage{amsmath,amssymb}\n\
                       \\pagestyle{empty}"
                .into(),
        }
    }
}

/// TeX math preview plugin.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct TexmathPluginConfig {
    /// Whether to enable this plugin.
    pub enable: bool,
}

impl Default for TexmathPluginConfig {
    fn default() -> Self {
        Self { enable: true }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PluginConfig {
    pub texmath: TexmathPluginConfig,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
    /// Log configuration.
    pub log: LogConfig,

    /// Render pipeline configuration.
    pub render: RenderConfig,

    /// Plugin configuration.
    pub plugin: PluginConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_config_overrides_defaults() {
        let toml_content = r#"
          [log]
          max-level = "trace"
          log-file = "/tmp/pixtex.log"

          [render]
          process = "dvisvgm"

          [plugin.texmath]
          enable = false
"#;
        let user_config: Config = toml::from_str(toml_content).unwrap();

        assert_eq!(user_config.log.max_level, "trace");
        assert_eq!(user_config.log.log_file.as_deref(), Some("/tmp/pixtex.log"));
        assert_eq!(user_config.log.log_target, "");
        assert_eq!(user_config.render.process, "dvisvgm");
        assert_eq!(user_config.render.preamble, RenderConfig::default().preamble);
        assert!(!user_config.plugin.texmath.enable);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = toml::from_str::<Config>("[render]\nresolutoin = 144\n").unwrap_err();
        assert!(err.to_string().contains("resolutoin"));
    }

    #[test]
    fn test_default_config_serializes() {
        toml::to_string_pretty(&Config::default()).unwrap();
    }
}
