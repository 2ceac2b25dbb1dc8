//! Global settings loaded from TOML.
//!
//! - `init_custom(toml_content)` sets a custom TOML before first `settings()` call
//! - `settings()` returns `&'static Settings` (lazy-init singleton)
//! - Default values are embedded via `include_str!("default_settings.toml")`
//!
//! Search entry points never read the singleton directly; they take a
//! [`SearchOptions`] snapshot so that a single process can run decodes with
//! different knobs (and tests can pin their own).

use std::sync::OnceLock;

use serde::Deserialize;

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

static CUSTOM_TOML: OnceLock<String> = OnceLock::new();

/// Set custom TOML before first `settings()` call.
pub fn init_custom(toml_content: String) -> Result<(), SettingsError> {
    parse_settings_toml(&toml_content)?;
    CUSTOM_TOML
        .set(toml_content)
        .map_err(|_| SettingsError::AlreadyInitialized)
}

/// Get or initialize the global settings singleton.
pub fn settings() -> &'static Settings {
    static INSTANCE: OnceLock<Settings> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        let toml_str = CUSTOM_TOML
            .get()
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_SETTINGS_TOML);
        parse_settings_toml(toml_str).expect("settings TOML must be valid")
    })
}

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("settings already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub search: StackSettings,
    pub chart: ChartSettings,
    pub tables: TableSettings,
    pub nbest: NBestSettings,
    pub score: ScoreSettings,
    pub batch: BatchSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchAlgorithm {
    Normal,
    CubePruning,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StackSettings {
    pub algorithm: SearchAlgorithm,
    pub stack_size: usize,
    pub beam_width: f32,
    pub pop_limit: usize,
    pub max_distortion: i64,
    pub max_phrase_length: usize,
    pub context_words: usize,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartSettings {
    pub stack_size: usize,
    pub beam_width: f32,
    pub rule_limit: usize,
    pub rule_beam_threshold: f32,
    pub pop_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableSettings {
    pub option_limit: usize,
    pub unknown_word_score: f32,
    pub glue_rules: bool,
    pub glue_score: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NBestSettings {
    pub size: usize,
    pub distinct_nbest: bool,
    pub oversample: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoreSettings {
    pub distortion_weight: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchSettings {
    pub threads: usize,
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let s: Settings = toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    Ok(s)
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
    macro_rules! check_non_positive {
        ($section:ident . $field:ident) => {
            if !(s.$section.$field <= 0.0) {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be zero or negative".to_string(),
                });
            }
        };
    }
    macro_rules! check_positive_usize {
        ($section:ident . $field:ident) => {
            if s.$section.$field == 0 {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        };
    }

    check_non_positive!(search.beam_width);
    check_positive_usize!(search.stack_size);
    check_positive_usize!(search.pop_limit);
    check_positive_usize!(search.max_phrase_length);

    check_non_positive!(chart.beam_width);
    check_non_positive!(chart.rule_beam_threshold);
    check_positive_usize!(chart.stack_size);
    check_positive_usize!(chart.rule_limit);
    check_positive_usize!(chart.pop_limit);

    check_positive_usize!(tables.option_limit);

    check_positive_usize!(nbest.size);
    check_positive_usize!(nbest.oversample);

    check_positive_usize!(batch.threads);

    if !s.tables.unknown_word_score.is_finite() {
        return Err(SettingsError::InvalidValue {
            field: "tables.unknown_word_score".to_string(),
            reason: "must be finite".to_string(),
        });
    }
    if !s.score.distortion_weight.is_finite() || s.score.distortion_weight < 0.0 {
        return Err(SettingsError::InvalidValue {
            field: "score.distortion_weight".to_string(),
            reason: "must be finite and non-negative".to_string(),
        });
    }

    Ok(())
}

/// Per-decode snapshot of the search knobs.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub algorithm: SearchAlgorithm,
    pub stack_size: usize,
    pub beam_width: f32,
    pub pop_limit: usize,
    /// `None` means reordering is unlimited.
    pub max_distortion: Option<usize>,
    pub max_phrase_length: usize,
    pub context_words: usize,
    pub timeout_ms: u64,
    pub chart_stack_size: usize,
    pub chart_beam_width: f32,
    pub rule_limit: usize,
    pub rule_beam_threshold: f32,
    pub chart_pop_limit: usize,
    pub option_limit: usize,
    pub distinct_nbest: bool,
    pub nbest_oversample: usize,
}

impl SearchOptions {
    pub fn from_settings(s: &Settings) -> Self {
        Self {
            algorithm: s.search.algorithm,
            stack_size: s.search.stack_size,
            beam_width: s.search.beam_width,
            pop_limit: s.search.pop_limit,
            max_distortion: usize::try_from(s.search.max_distortion).ok(),
            max_phrase_length: s.search.max_phrase_length,
            context_words: s.search.context_words,
            timeout_ms: s.search.timeout_ms,
            chart_stack_size: s.chart.stack_size,
            chart_beam_width: s.chart.beam_width,
            rule_limit: s.chart.rule_limit,
            rule_beam_threshold: s.chart.rule_beam_threshold,
            chart_pop_limit: s.chart.pop_limit,
            option_limit: s.tables.option_limit,
            distinct_nbest: s.nbest.distinct_nbest,
            nbest_oversample: s.nbest.oversample,
        }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from_settings(settings())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
[search]
algorithm = "normal"
stack_size = 50
beam_width = -5.0
pop_limit = 200
max_distortion = -1
max_phrase_length = 3
context_words = 1
timeout_ms = 0

[chart]
stack_size = 20
beam_width = -5.0
rule_limit = 10
rule_beam_threshold = -3.0
pop_limit = 10

[tables]
option_limit = 5
unknown_word_score = -50.0
glue_rules = false
glue_score = -2.0

[nbest]
size = 5
distinct_nbest = false
oversample = 2

[score]
distortion_weight = 0.5

[batch]
threads = 2
"#;

    #[test]
    fn parse_default_toml() {
        let s = parse_settings_toml(DEFAULT_SETTINGS_TOML).unwrap();
        assert_eq!(s.search.algorithm, SearchAlgorithm::CubePruning);
        assert_eq!(s.search.stack_size, 100);
        assert!((s.search.beam_width + 10.0).abs() < f32::EPSILON);
        assert_eq!(s.search.pop_limit, 1000);
        assert_eq!(s.search.max_distortion, 6);
        assert_eq!(s.search.context_words, 2);
        assert_eq!(s.chart.rule_limit, 100);
        assert_eq!(s.chart.pop_limit, 100);
        assert_eq!(s.tables.option_limit, 20);
        assert!(s.tables.glue_rules);
        assert_eq!(s.nbest.size, 10);
        assert!(s.nbest.distinct_nbest);
        assert_eq!(s.batch.threads, 4);
    }

    #[test]
    fn parse_valid_custom_toml() {
        let s = parse_settings_toml(VALID).unwrap();
        assert_eq!(s.search.algorithm, SearchAlgorithm::Normal);
        assert_eq!(s.search.stack_size, 50);
        assert_eq!(s.chart.rule_limit, 10);
        assert!(!s.tables.glue_rules);

        let opts = SearchOptions::from_settings(&s);
        assert_eq!(opts.max_distortion, None);
        assert_eq!(opts.max_phrase_length, 3);
        assert!(!opts.distinct_nbest);
    }

    #[test]
    fn error_positive_beam_width() {
        let toml = VALID.replace("beam_width = -5.0\npop_limit = 200", "beam_width = 1.0\npop_limit = 200");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue { .. }));
        assert!(err.to_string().contains("search.beam_width"));
    }

    #[test]
    fn error_zero_rule_limit() {
        let toml = VALID.replace("rule_limit = 10", "rule_limit = 0");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("chart.rule_limit"));
    }

    #[test]
    fn error_negative_distortion_weight() {
        let toml = VALID.replace("distortion_weight = 0.5", "distortion_weight = -0.5");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("score.distortion_weight"));
    }

    #[test]
    fn error_unknown_algorithm() {
        let toml = VALID.replace("algorithm = \"normal\"", "algorithm = \"astar\"");
        let err = parse_settings_toml(&toml).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn error_invalid_toml() {
        let err = parse_settings_toml("not valid toml {{{").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn error_missing_section() {
        let toml = r#"
[search]
algorithm = "normal"
stack_size = 50
beam_width = -5.0
pop_limit = 200
max_distortion = -1
max_phrase_length = 3
context_words = 1
timeout_ms = 0
"#;
        let err = parse_settings_toml(toml).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }
}
