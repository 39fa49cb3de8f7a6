use crate::Result;
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

/// The default configuration YAML content, embedded from `default_config.yml`
pub const DEFAULT_CONFIG_YAML: &str = include_str!("../../default_config.yml");

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Base URL of the marketplace API
    #[serde(default = "default_curseforge_base_url")]
    pub curseforge_base_url: String,

    /// Base URL of the dependents lookup service
    #[serde(default = "default_modpack_index_base_url")]
    pub modpack_index_base_url: String,

    /// Files declaring more bytes than this are skipped
    #[serde(default = "default_max_file_length")]
    pub max_file_length: u64,

    /// Size ceiling applied when retrying skipped files
    #[serde(default = "default_retry_max_file_length")]
    pub retry_max_file_length: u64,

    #[serde(default)]
    pub skip_zero_downloads: bool,

    /// Minimum spacing between outbound requests, in milliseconds
    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Dependency store path, relative to the data directory unless absolute
    #[serde(default = "default_dependencies_db")]
    pub dependencies_db: Utf8PathBuf,

    /// Statistics database path, relative to the data directory unless absolute
    #[serde(default = "default_stats_db")]
    pub stats_db: Utf8PathBuf,

    /// Download scratch directory, `<data-dir>/scratch` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<Utf8PathBuf>,
}

fn default_curseforge_base_url() -> String {
    "https://api.curseforge.com".to_string()
}

fn default_modpack_index_base_url() -> String {
    "https://www.modpackindex.com/api".to_string()
}

const fn default_max_file_length() -> u64 {
    40_000_000
}

const fn default_retry_max_file_length() -> u64 {
    500_000_000
}

const fn default_request_interval_ms() -> u64 {
    500
}

const fn default_request_timeout_secs() -> u64 {
    5
}

fn default_dependencies_db() -> Utf8PathBuf {
    Utf8PathBuf::from("dependencies.db")
}

fn default_stats_db() -> Utf8PathBuf {
    Utf8PathBuf::from("mod_stats.db")
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, the first of `modstats.toml`, `modstats.yml`, `modstats.yaml`
    /// and `modstats.json` found in `base_dir` is used.
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<(Self, Vec<String>)> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading modstats configuration from {path}"))?;
            (path.clone(), text)
        } else {
            let candidates = [
                base_dir.join("modstats.toml"),
                base_dir.join("modstats.yml"),
                base_dir.join("modstats.yaml"),
                base_dir.join("modstats.json"),
            ];

            let mut found = None;
            for path in &candidates {
                match fs::read_to_string(path) {
                    Ok(text) => {
                        found = Some((path.clone(), text));
                        break;
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e).into_app_err_with(|| format!("reading modstats configuration from {path}")),
                }
            }

            let Some(result) = found else {
                let config = Self::default();
                let warnings = config.validate();
                return Ok((config, warnings));
            };
            result
        };

        let extension = final_path.extension().unwrap_or_default();
        let config: Self = match extension {
            "toml" => toml::from_str(&text).into_app_err_with(|| format!("parsing TOML configuration from {final_path}"))?,
            "yml" | "yaml" => serde_yaml::from_str(&text).into_app_err_with(|| format!("parsing YAML configuration from {final_path}"))?,
            "json" => serde_json::from_str(&text).into_app_err_with(|| format!("parsing JSON configuration from {final_path}"))?,
            _ => return Err(app_err!("unsupported configuration file extension: {extension}")),
        };

        let warnings = config.validate();
        Ok((config, warnings))
    }

    /// Save configuration to a file
    pub fn save(&self, output_path: &Utf8Path) -> Result<()> {
        let extension = output_path.extension().unwrap_or_default();
        let text = match extension {
            "toml" => toml::to_string_pretty(self)
                .into_app_err_with(|| format!("serializing configuration to TOML for saving to {output_path}"))?,
            "yml" | "yaml" => serde_yaml::to_string(self)
                .into_app_err_with(|| format!("serializing configuration to YAML for saving to {output_path}"))?,
            "json" => serde_json::to_string_pretty(self)
                .into_app_err_with(|| format!("serializing configuration to JSON for saving to {output_path}"))?,
            _ => return Err(app_err!("unsupported configuration file extension: {extension}")),
        };

        fs::write(output_path, text).into_app_err_with(|| format!("writing configuration to {output_path}"))?;
        Ok(())
    }

    /// Save the default configuration to a file, preserving comments for YAML and TOML
    ///
    /// YAML is written verbatim from `default_config.yml`. TOML keeps the same comments with
    /// each value rewritten in TOML syntax. JSON has no comments and is plainly serialized.
    pub fn save_default_with_comments(&self, output_path: &Utf8Path) -> Result<()> {
        let extension = output_path.extension().unwrap_or_default();

        if matches!(extension, "yml" | "yaml") {
            fs::write(output_path, DEFAULT_CONFIG_YAML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        } else if extension == "toml" {
            let toml_content = Self::convert_yaml_to_toml_with_comments(DEFAULT_CONFIG_YAML)?;
            fs::write(output_path, toml_content).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        } else {
            self.save(output_path)?;
        }

        Ok(())
    }

    /// Serialize the configuration found in `yaml_content` as TOML, carrying over the comment
    /// block above each top-level key. Indented lines belong to nested or multi-line values and
    /// never start a new key.
    fn convert_yaml_to_toml_with_comments(yaml_content: &str) -> Result<String> {
        use toml_edit::{DocumentMut, Item};

        let config: Self = serde_yaml::from_str(yaml_content).into_app_err("parsing YAML content")?;
        let mut doc: DocumentMut = toml::to_string(&config)
            .into_app_err("converting configuration to TOML")?
            .parse::<DocumentMut>()
            .into_app_err("re-reading generated TOML")?;

        let mut comments = String::new();
        for line in yaml_content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                comments.push('\n');
                continue;
            }

            if trimmed.starts_with('#') {
                comments.push_str(trimmed);
                comments.push('\n');
                continue;
            }

            if line.starts_with(char::is_whitespace) || trimmed.starts_with('-') {
                continue;
            }

            let Some((key, _)) = trimmed.split_once(':') else {
                continue;
            };
            let key = key.trim().trim_matches(['"', '\'']);

            if let Some(table) = doc.get_mut(key).and_then(Item::as_table_mut) {
                table.decor_mut().set_prefix(core::mem::take(&mut comments));
            } else if let Some(mut toml_key) = doc.as_table_mut().key_mut(key) {
                toml_key.leaf_decor_mut().set_prefix(core::mem::take(&mut comments));
            }
            // A key with no TOML counterpart (an unset optional) passes its comments on
        }

        doc.set_trailing(comments);
        Ok(doc.to_string())
    }

    #[must_use]
    pub const fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn dependencies_db_path(&self, data_dir: &Utf8Path) -> Utf8PathBuf {
        data_dir.join(&self.dependencies_db)
    }

    #[must_use]
    pub fn stats_db_path(&self, data_dir: &Utf8Path) -> Utf8PathBuf {
        data_dir.join(&self.stats_db)
    }

    #[must_use]
    pub fn scratch_dir_path(&self, data_dir: &Utf8Path) -> Utf8PathBuf {
        self.scratch_dir
            .as_ref()
            .map_or_else(|| data_dir.join("scratch"), |dir| data_dir.join(dir))
    }

    /// Detect settings that are valid but almost certainly not what was intended
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (name, value) in [
            ("curseforge_base_url", &self.curseforge_base_url),
            ("modpack_index_base_url", &self.modpack_index_base_url),
        ] {
            if let Err(e) = url::Url::parse(value) {
                warnings.push(format!("{name} '{value}' is not a valid URL: {e}"));
            }
        }

        if self.max_file_length == 0 {
            warnings.push("max_file_length is 0, so no file can ever be resolved".to_string());
        }

        if self.retry_max_file_length < self.max_file_length {
            warnings.push(format!(
                "retry_max_file_length ({}) is lower than max_file_length ({}), so retries of oversized files cannot succeed",
                self.retry_max_file_length, self.max_file_length
            ));
        }

        if self.request_timeout_secs == 0 {
            warnings.push("request_timeout_secs is 0, so every request will time out".to_string());
        }

        if self.dependencies_db == self.stats_db {
            warnings.push(format!("dependencies_db and stats_db both point to '{}'", self.stats_db));
        }

        warnings
    }
}

impl Default for Config {
    fn default() -> Self {
        serde_yaml::from_str(DEFAULT_CONFIG_YAML).expect("default_config.yml should be valid YAML that deserializes to Config")
    }
}
