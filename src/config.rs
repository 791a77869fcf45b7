//! Project configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! overridden by the project's `config.toml`, which only needs the keys it
//! wants to change.
//!
//! ## Config File Location
//!
//! ```text
//! project/
//! ├── config.toml                    # Overrides stock defaults (optional)
//! ├── chagall_download_config.json   # Image catalog
//! ├── chagall_placement_map.json     # Persisted placement map
//! ├── images/                        # Image assets
//! └── texts/                         # Chapter text, <Book>.<Chapter>.json
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! [catalog]
//! path = "chagall_download_config.json"
//! images_dir = "images"
//!
//! [placement]
//! map_path = "chagall_placement_map.json"
//! change_log_limit = 50     # Change-log lines printed verbatim
//! accept_threshold = 0.8    # suggest --accept: minimum confidence
//!
//! [books]
//! sections = ["torah", "prophets", "writings"]
//!
//! [selection]
//! strict = false            # Only explicit mappings; gaps are errors
//!
//! [selection.intro_overrides]
//! Genesis = "chagall_creation.jpg"
//!
//! [selection.chapter_overrides]
//! "Genesis 22" = "chagall_abraham.jpg"
//!
//! [selection.explicit_intros]    # strict mode
//! [selection.explicit_chapters]  # strict mode
//!
//! [text]
//! source_dir = "texts"
//! attempts = 3
//! backoff_ms = 2000
//! delay_ms = 100
//!
//! [output]
//! title = "Tanakh"
//! language = "he"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::reference::Reference;
use crate::registry::{Registry, Section};
use crate::selector::{ExplicitMapping, SelectionRules};
use crate::text::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Project configuration loaded from `config.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub catalog: CatalogConfig,
    pub placement: PlacementConfig,
    pub books: BooksConfig,
    pub selection: SelectionConfig,
    pub text: TextConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// Image catalog JSON, relative to the project root.
    pub path: String,
    /// Directory holding the image files.
    pub images_dir: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: "chagall_download_config.json".to_string(),
            images_dir: "images".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlacementConfig {
    pub map_path: String,
    /// Change-log lines printed before the `... and N more` suffix.
    pub change_log_limit: usize,
    /// Minimum confidence for `suggest --accept` to write a placement.
    pub accept_threshold: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            map_path: "chagall_placement_map.json".to_string(),
            change_log_limit: 50,
            accept_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BooksConfig {
    /// Sections included in planning and generation.
    pub sections: Vec<Section>,
}

impl Default for BooksConfig {
    fn default() -> Self {
        Self {
            sections: vec![Section::Torah, Section::Prophets, Section::Writings],
        }
    }
}

/// Hand-curated selection data. Keys of the chapter maps are `"Book N"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionConfig {
    pub strict: bool,
    pub intro_overrides: BTreeMap<String, String>,
    pub chapter_overrides: BTreeMap<String, String>,
    pub explicit_intros: BTreeMap<String, String>,
    pub explicit_chapters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextConfig {
    /// Directory of `<Book>.<Chapter>.json` files.
    pub source_dir: String,
    /// Attempts per chapter, including the first.
    pub attempts: u32,
    /// Pause after a transient failure, in milliseconds.
    pub backoff_ms: u64,
    /// Pause between chapter requests, in milliseconds.
    pub delay_ms: u64,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            source_dir: "texts".to_string(),
            attempts: 3,
            backoff_ms: 2000,
            delay_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub title: String,
    pub language: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            title: "Tanakh".to_string(),
            language: "he".to_string(),
        }
    }
}

/// Parse a `"Book N"` key and check it against the full registry.
fn parse_chapter_key(key: &str, field: &str, registry: &Registry) -> Result<Reference, ConfigError> {
    let reference = Reference::parse(key).map_err(|_| {
        ConfigError::Validation(format!("{field}: {key:?} is not a \"Book N\" reference"))
    })?;
    match registry.chapter_in_range(&reference.book, reference.chapter) {
        Some(true) => Ok(reference),
        Some(false) => Err(ConfigError::Validation(format!(
            "{field}: {key:?} is outside the book's chapter range"
        ))),
        None => Err(ConfigError::Validation(format!(
            "{field}: unknown book in {key:?}"
        ))),
    }
}

fn check_book_keys(map: &BTreeMap<String, String>, field: &str, registry: &Registry) -> Result<(), ConfigError> {
    match map.keys().find(|book| !registry.contains(book)) {
        Some(book) => Err(ConfigError::Validation(format!("{field}: unknown book {book:?}"))),
        None => Ok(()),
    }
}

fn parse_chapter_map(
    map: &BTreeMap<String, String>,
    field: &str,
    registry: &Registry,
) -> Result<BTreeMap<Reference, String>, ConfigError> {
    map.iter()
        .map(|(key, fname)| Ok((parse_chapter_key(key, field, registry)?, fname.clone())))
        .collect()
}

impl ProjectConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.text.attempts == 0 {
            return Err(ConfigError::Validation(
                "text.attempts must be at least 1".into(),
            ));
        }
        if self.placement.change_log_limit == 0 {
            return Err(ConfigError::Validation(
                "placement.change_log_limit must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.placement.accept_threshold) {
            return Err(ConfigError::Validation(
                "placement.accept_threshold must be between 0 and 1".into(),
            ));
        }
        if self.books.sections.is_empty() {
            return Err(ConfigError::Validation(
                "books.sections must not be empty".into(),
            ));
        }
        self.selection_rules().map(|_| ())
    }

    /// The books this project plans and generates, in canonical order.
    ///
    /// Range checks elsewhere use the full table, not this subset.
    pub fn registry(&self) -> Registry {
        Registry::tanakh().with_sections(&self.books.sections)
    }

    /// Selection inputs for the selector. Strict mode carries the explicit maps.
    pub fn selection_rules(&self) -> Result<SelectionRules, ConfigError> {
        let registry = Registry::tanakh();
        let sel = &self.selection;
        check_book_keys(&sel.intro_overrides, "selection.intro_overrides", &registry)?;
        check_book_keys(&sel.explicit_intros, "selection.explicit_intros", &registry)?;

        let chapter_overrides =
            parse_chapter_map(&sel.chapter_overrides, "selection.chapter_overrides", &registry)?;
        let explicit_chapters =
            parse_chapter_map(&sel.explicit_chapters, "selection.explicit_chapters", &registry)?;

        Ok(SelectionRules {
            intro_overrides: sel.intro_overrides.clone(),
            chapter_overrides,
            explicit: sel.strict.then(|| ExplicitMapping {
                intros: sel.explicit_intros.clone(),
                chapters: explicit_chapters,
            }),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.text.attempts,
            backoff: Duration::from_millis(self.text.backoff_ms),
            delay: Duration::from_millis(self.text.delay_ms),
        }
    }

    pub fn catalog_path(&self, root: &Path) -> PathBuf {
        root.join(&self.catalog.path)
    }

    pub fn images_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.catalog.images_dir)
    }

    pub fn map_path(&self, root: &Path) -> PathBuf {
        root.join(&self.placement.map_path)
    }

    pub fn text_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.text.source_dir)
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ProjectConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no `config.toml`.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ProjectConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ProjectConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the project root.
pub fn load_config(root: &Path) -> Result<ProjectConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(root)?)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# tanakh-gal configuration
# ========================
# All settings are optional. Values shown below are the defaults.
# Paths are relative to the project root (--root).
# Unknown keys will cause an error.

[catalog]
# Image catalog: a JSON array of {filename, url, title, book, page_url}.
path = "chagall_download_config.json"
# Directory holding the image files named in the catalog.
images_dir = "images"

[placement]
# Persisted placement map: filename -> ["Book Chapter", ...].
map_path = "chagall_placement_map.json"
# Change-log lines printed by `normalize` before "... and N more".
change_log_limit = 50
# `suggest --accept` writes the top suggestion at or above this confidence.
accept_threshold = 0.8

[books]
# Sections to plan and generate: "torah", "prophets", "writings".
sections = ["torah", "prophets", "writings"]

[selection]
# Strict mode uses only explicit_intros / explicit_chapters. A book without
# an explicit intro, or an image used twice, aborts generation.
strict = false

[selection.intro_overrides]
# Book id -> filename, preferred for the book's divider page.
# Genesis = "chagall_creation.jpg"

[selection.chapter_overrides]
# "Book Chapter" -> filename, preferred for that chapter.
# "Genesis 22" = "chagall_abraham.jpg"

[selection.explicit_intros]
# Strict mode: book id -> filename. Every planned book needs one.

[selection.explicit_chapters]
# Strict mode: "Book Chapter" -> filename.

[text]
# Chapter text files, one per chapter: <Book>.<Chapter>.json
source_dir = "texts"
# Attempts per chapter on transient failures, including the first.
attempts = 3
# Pause after a transient failure (milliseconds).
backoff_ms = 2000
# Pause between chapter requests (milliseconds).
delay_ms = 100

[output]
# Title of the bundle's table of contents.
title = "Tanakh"
# Document language attribute.
language = "he"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = ProjectConfig::default();
        assert_eq!(config.catalog.path, "chagall_download_config.json");
        assert_eq!(config.placement.change_log_limit, 50);
        assert_eq!(config.placement.accept_threshold, 0.8);
        assert_eq!(config.text.attempts, 3);
        assert_eq!(config.books.sections.len(), 3);
        assert!(!config.selection.strict);
    }

    #[test]
    fn parse_partial_config() {
        let config: ProjectConfig = toml::from_str(
            r#"
[text]
attempts = 5
"#,
        )
        .unwrap();
        assert_eq!(config.text.attempts, 5);
        assert_eq!(config.text.backoff_ms, 2000);
        assert_eq!(config.output.title, "Tanakh");
    }

    #[test]
    fn default_registry_is_full_tanakh() {
        assert_eq!(ProjectConfig::default().registry().len(), 39);
    }

    #[test]
    fn sections_restrict_registry() {
        let config: ProjectConfig = toml::from_str(
            r#"
[books]
sections = ["torah"]
"#,
        )
        .unwrap();
        let books: Vec<String> = config.registry().books().iter().map(|b| b.id.clone()).collect();
        assert_eq!(books, vec!["Genesis", "Exodus", "Leviticus", "Numbers", "Deuteronomy"]);
    }

    #[test]
    fn retry_policy_from_text_section() {
        let policy = ProjectConfig::default().retry_policy();
        assert_eq!(policy, RetryPolicy::default());
    }

    #[test]
    fn paths_resolve_against_root() {
        let config = ProjectConfig::default();
        let root = Path::new("/work");
        assert_eq!(config.map_path(root), Path::new("/work/chagall_placement_map.json"));
        assert_eq!(config.images_dir(root), Path::new("/work/images"));
        assert_eq!(config.text_dir(root), Path::new("/work/texts"));
    }

    // =========================================================================
    // Selection rules
    // =========================================================================

    #[test]
    fn selection_rules_parse_chapter_keys() {
        let config: ProjectConfig = toml::from_str(
            r#"
[selection.intro_overrides]
Genesis = "creation.jpg"

[selection.chapter_overrides]
"Genesis 22" = "abraham.jpg"
"Song of Songs 2" = "lovers.jpg"
"#,
        )
        .unwrap();
        let rules = config.selection_rules().unwrap();

        assert_eq!(rules.intro_overrides["Genesis"], "creation.jpg");
        assert_eq!(
            rules.chapter_overrides[&Reference::new("Genesis", 22)],
            "abraham.jpg"
        );
        assert_eq!(
            rules.chapter_overrides[&Reference::new("Song_of_Songs", 2)],
            "lovers.jpg"
        );
        assert!(!rules.is_strict());
    }

    #[test]
    fn strict_mode_carries_explicit_maps() {
        let config: ProjectConfig = toml::from_str(
            r#"
[selection]
strict = true

[selection.explicit_intros]
Ruth = "naomi.jpg"

[selection.explicit_chapters]
"Ruth 2" = "gleaning.jpg"
"#,
        )
        .unwrap();
        let explicit = config.selection_rules().unwrap().explicit.unwrap();
        assert_eq!(explicit.intros["Ruth"], "naomi.jpg");
        assert_eq!(explicit.chapters[&Reference::new("Ruth", 2)], "gleaning.jpg");
    }

    #[test]
    fn override_with_out_of_range_chapter_rejected() {
        let mut config = ProjectConfig::default();
        config
            .selection
            .chapter_overrides
            .insert("Genesis 51".into(), "x.jpg".into());
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("chapter range"));
    }

    #[test]
    fn override_with_unknown_book_rejected() {
        let mut config = ProjectConfig::default();
        config
            .selection
            .intro_overrides
            .insert("Tobit".into(), "x.jpg".into());
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn malformed_override_key_rejected() {
        let mut config = ProjectConfig::default();
        config
            .selection
            .explicit_chapters
            .insert("Genesis".into(), "x.jpg".into());
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("selection.explicit_chapters"));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(ProjectConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_attempts_zero() {
        let mut config = ProjectConfig::default();
        config.text.attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_change_log_limit_zero() {
        let mut config = ProjectConfig::default();
        config.placement.change_log_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_threshold_bounds() {
        let mut config = ProjectConfig::default();
        config.placement.accept_threshold = 1.0;
        assert!(config.validate().is_ok());
        config.placement.accept_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_sections_empty() {
        let mut config = ProjectConfig::default();
        config.books.sections.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_key_rejected() {
        let result: Result<ProjectConfig, _> = toml::from_str(
            r#"
[text]
atempts = 3
"#,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<ProjectConfig, _> = toml::from_str(
            r#"
[fonts]
hebrew = "Ezra SIL"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_section_name_rejected() {
        let result: Result<ProjectConfig, _> = toml::from_str(
            r#"
[books]
sections = ["apocrypha"]
"#,
        );
        assert!(result.is_err());
    }

    // =========================================================================
    // load_config / resolve_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[output]
title = "Chumash"

[placement]
change_log_limit = 10
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.output.title, "Chumash");
        assert_eq!(config.output.language, "he");
        assert_eq!(config.placement.change_log_limit, 10);
        assert_eq!(config.placement.map_path, "chagall_placement_map.json");
    }

    #[test]
    fn load_config_rejects_unknown_keys() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[placement]
map = "x.json"
"#,
        )
        .unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[text]
attempts = 0
"#,
        )
        .unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn load_raw_config_returns_none_when_no_file() {
        let tmp = TempDir::new().unwrap();
        assert!(load_raw_config(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn resolve_config_with_overlay() {
        let overlay: toml::Value = toml::from_str(
            r#"
[selection.intro_overrides]
Exodus = "bush.jpg"
"#,
        )
        .unwrap();
        let config = resolve_config(stock_defaults_value(), Some(overlay)).unwrap();
        assert_eq!(config.selection.intro_overrides["Exodus"], "bush.jpg");
        assert_eq!(config.text.delay_ms, 100);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(1));
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[t]\nx = 1\ny = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[t]\ny = 5\nz = 6").unwrap();
        let merged = merge_toml(base, overlay);
        let t = merged.get("t").unwrap();
        assert_eq!(t.get("x").unwrap().as_integer(), Some(1));
        assert_eq!(t.get("y").unwrap().as_integer(), Some(5));
        assert_eq!(t.get("z").unwrap().as_integer(), Some(6));
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value = toml::from_str(r#"s = ["torah", "prophets"]"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"s = ["writings"]"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("s").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // stock config tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: ProjectConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in [
            "[catalog]",
            "[placement]",
            "[books]",
            "[selection]",
            "[selection.intro_overrides]",
            "[selection.chapter_overrides]",
            "[selection.explicit_intros]",
            "[selection.explicit_chapters]",
            "[text]",
            "[output]",
        ] {
            assert!(content.contains(section), "missing {section}");
        }
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        assert!(val.is_table());
        for key in ["catalog", "placement", "books", "selection", "text", "output"] {
            assert!(val.get(key).is_some(), "missing {key}");
        }
    }
}
