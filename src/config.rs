// Configuration loading and validation (config/scoring.toml).

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The policy file, under `config/` and shipped under `defaults/`.
pub const SCORING_FILE: &str = "scoring.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Tolerance used when checking that the composite weights sum to 1.0.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub scoring: ScoringConfig,
    pub salary_rule: SalaryRuleConfig,
    pub data_paths: DataPaths,
}

/// Hex digits kept from the policy digest.
const POLICY_HASH_LEN: usize = 12;

impl Config {
    /// Short SHA-256 fingerprint of the scoring policy and salary rule. Two
    /// outputs carrying the same hash were produced under the same policy.
    /// Data paths do not take part.
    pub fn policy_hash(&self) -> String {
        let mut hasher = Sha256::new();
        let s = &self.scoring;
        let t = &s.tier_thresholds;
        for v in [
            s.contract_clip,
            s.weights.performance,
            s.weights.contract,
            s.weights.fit,
            t.untouchable,
            t.franchise,
            t.all_star,
            t.quality_starter,
            t.rotation,
            s.older_adjustment,
        ] {
            hasher.update(v.to_le_bytes());
        }
        hasher.update((s.age_bands.len() as u64).to_le_bytes());
        for band in &s.age_bands {
            hasher.update(band.max_age.to_le_bytes());
            hasher.update(band.adjustment.to_le_bytes());
        }

        let r = &self.salary_rule;
        hasher.update((r.rule_version.len() as u64).to_le_bytes());
        hasher.update(r.rule_version.as_bytes());
        hasher.update((r.tiers.len() as u64).to_le_bytes());
        for tier in &r.tiers {
            hasher.update(tier.max_outgoing.to_le_bytes());
            hasher.update(tier.multiplier.to_le_bytes());
            hasher.update(tier.cushion.to_le_bytes());
        }
        hasher.update(r.above.multiplier.to_le_bytes());
        hasher.update(r.above.cushion.to_le_bytes());

        let mut digest = format!("{:x}", hasher.finalize());
        digest.truncate(POLICY_HASH_LEN);
        digest
    }
}

/// Raw deserialization target for the entire scoring.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ScoringFile {
    trade_value: TradeValueSection,
    age: AgeSection,
    salary_matching: SalaryRuleConfig,
    data_paths: DataPaths,
}

#[derive(Debug, Clone, Deserialize)]
struct TradeValueSection {
    contract_clip: f64,
    weights: CompositeWeights,
    tier_thresholds: TierThresholds,
}

#[derive(Debug, Clone, Deserialize)]
struct AgeSection {
    bands: Vec<AgeBand>,
    older: f64,
}

// ---------------------------------------------------------------------------
// Scoring policy
// ---------------------------------------------------------------------------

/// Everything the composite scorer needs. Built once at load time; never
/// changed per call.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Upper clip applied to the raw contract score before normalization.
    pub contract_clip: f64,
    pub weights: CompositeWeights,
    pub tier_thresholds: TierThresholds,
    /// Age bands in ascending order of `max_age`.
    pub age_bands: Vec<AgeBand>,
    /// Adjustment for any age above the last band.
    pub older_adjustment: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CompositeWeights {
    pub performance: f64,
    pub contract: f64,
    pub fit: f64,
}

/// Lower bounds (inclusive) of each value tier above TRADEABLE.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TierThresholds {
    pub untouchable: f64,
    pub franchise: f64,
    pub all_star: f64,
    pub quality_starter: f64,
    pub rotation: f64,
}

/// An age band: every age `<= max_age` not claimed by an earlier band gets
/// `adjustment` added to its composite score.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AgeBand {
    pub max_age: u32,
    pub adjustment: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            contract_clip: 5.0,
            weights: CompositeWeights {
                performance: 0.50,
                contract: 0.25,
                fit: 0.25,
            },
            tier_thresholds: TierThresholds {
                untouchable: 85.0,
                franchise: 70.0,
                all_star: 55.0,
                quality_starter: 40.0,
                rotation: 25.0,
            },
            age_bands: vec![
                AgeBand { max_age: 22, adjustment: 5.0 },
                AgeBand { max_age: 24, adjustment: 3.0 },
                AgeBand { max_age: 28, adjustment: 0.0 },
                AgeBand { max_age: 32, adjustment: -2.0 },
            ],
            older_adjustment: -5.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Salary matching rule
// ---------------------------------------------------------------------------

/// Tiered salary-matching rule: each tier caps incoming salary at
/// `multiplier * outgoing + cushion` for outgoing amounts up to
/// `max_outgoing` (inclusive). `above` applies past the last tier.
#[derive(Debug, Clone, Deserialize)]
pub struct SalaryRuleConfig {
    pub rule_version: String,
    pub tiers: Vec<SalaryTier>,
    pub above: SalaryFormula,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SalaryTier {
    pub max_outgoing: f64,
    pub multiplier: f64,
    pub cushion: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SalaryFormula {
    pub multiplier: f64,
    pub cushion: f64,
}

impl Default for SalaryRuleConfig {
    fn default() -> Self {
        Self {
            rule_version: "tiered_2023".into(),
            tiers: vec![
                SalaryTier { max_outgoing: 7.5, multiplier: 2.0, cushion: 0.25 },
                SalaryTier { max_outgoing: 29.0, multiplier: 1.0, cushion: 7.5 },
            ],
            above: SalaryFormula {
                multiplier: 1.25,
                cushion: 0.25,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub players: String,
    pub scenarios_db: String,
    /// Historical trades replayed by `backtest`.
    #[serde(default = "default_trades_path")]
    pub trades: String,
}

fn default_trades_path() -> String {
    "data/historical_trades.csv".into()
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            players: "data/players.csv".into(),
            scenarios_db: "trade-value.db".into(),
            trades: default_trades_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/scoring.toml` relative to
/// `base_dir`. Does not copy defaults; see `load_config()`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(SCORING_FILE);
    let text = read_file(&path)?;
    let config = parse_config(&text).map_err(|e| match e {
        ParseFailure::Toml(source) => ConfigError::ParseError {
            path: path.clone(),
            source,
        },
        ParseFailure::Invalid(e) => e,
    })?;
    tracing::info!("loaded scoring config from {}", path.display());
    Ok(config)
}

enum ParseFailure {
    Toml(toml::de::Error),
    Invalid(ConfigError),
}

fn parse_config(text: &str) -> Result<Config, ParseFailure> {
    let file: ScoringFile = toml::from_str(text).map_err(ParseFailure::Toml)?;

    let config = Config {
        scoring: ScoringConfig {
            contract_clip: file.trade_value.contract_clip,
            weights: file.trade_value.weights,
            tier_thresholds: file.trade_value.tier_thresholds,
            age_bands: file.age.bands,
            older_adjustment: file.age.older,
        },
        salary_rule: file.salary_matching,
        data_paths: file.data_paths,
    };

    validate(&config).map_err(ParseFailure::Invalid)?;
    Ok(config)
}

/// Make sure `config/scoring.toml` exists, seeding it from
/// `defaults/scoring.toml` when missing. Returns the path written, or `None`
/// when a config file was already in place. An existing file is never
/// overwritten.
pub fn ensure_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let source = base_dir.join("defaults").join(SCORING_FILE);
    let config_dir = base_dir.join("config");
    let target = config_dir.join(SCORING_FILE);

    let content = match std::fs::read(&source) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if target.is_file() {
                return Ok(None);
            }
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "no {SCORING_FILE} in defaults/ or config/ under {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        Err(e) => {
            return Err(ConfigError::DefaultsCopyError {
                message: format!("failed to read {}: {e}", source.display()),
            })
        }
    };

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    // create_new fails if another process got there first; that copy wins.
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
    {
        Ok(mut dest) => {
            dest.write_all(&content)
                .map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to write {}: {e}", target.display()),
                })?;
            tracing::info!("seeded {} from defaults", target.display());
            Ok(Some(target))
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {e}", target.display()),
        }),
    }
}

/// Convenience wrapper: loads config relative to `base_dir`, copying default
/// config files first.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_file(base_dir)?;
    load_config_from(base_dir)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scoring(&config.scoring)?;
    validate_salary_rule(&config.salary_rule)
}

pub fn validate_scoring(scoring: &ScoringConfig) -> Result<(), ConfigError> {
    if !scoring.contract_clip.is_finite() || scoring.contract_clip <= 0.0 {
        return Err(invalid(
            "trade_value.contract_clip",
            format!("must be > 0, got {}", scoring.contract_clip),
        ));
    }

    let w = &scoring.weights;
    let weight_fields: &[(&str, f64)] = &[
        ("trade_value.weights.performance", w.performance),
        ("trade_value.weights.contract", w.contract),
        ("trade_value.weights.fit", w.fit),
    ];
    for (name, val) in weight_fields {
        if !val.is_finite() || *val < 0.0 {
            return Err(invalid(name, format!("must be >= 0, got {val}")));
        }
    }
    let sum = w.performance + w.contract + w.fit;
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(invalid(
            "trade_value.weights",
            format!("must sum to 1.0, got {sum}"),
        ));
    }

    // Tier cuts are evaluated top-down, so they must strictly decrease.
    let t = &scoring.tier_thresholds;
    let cuts: &[(&str, f64)] = &[
        ("trade_value.tier_thresholds.untouchable", t.untouchable),
        ("trade_value.tier_thresholds.franchise", t.franchise),
        ("trade_value.tier_thresholds.all_star", t.all_star),
        ("trade_value.tier_thresholds.quality_starter", t.quality_starter),
        ("trade_value.tier_thresholds.rotation", t.rotation),
    ];
    for (name, val) in cuts {
        if !(0.0..=100.0).contains(val) {
            return Err(invalid(name, format!("must be within [0, 100], got {val}")));
        }
    }
    for pair in cuts.windows(2) {
        let (upper_name, upper) = pair[0];
        let (lower_name, lower) = pair[1];
        if lower >= upper {
            return Err(invalid(
                lower_name,
                format!("must be below {upper_name} ({upper}), got {lower}"),
            ));
        }
    }

    if scoring.age_bands.is_empty() {
        return Err(invalid("age.bands", "at least one band is required"));
    }
    for pair in scoring.age_bands.windows(2) {
        if pair[1].max_age <= pair[0].max_age {
            return Err(invalid(
                "age.bands",
                format!(
                    "max_age must strictly increase, got {} after {}",
                    pair[1].max_age, pair[0].max_age
                ),
            ));
        }
    }
    let adjustments = scoring
        .age_bands
        .iter()
        .map(|b| b.adjustment)
        .chain(std::iter::once(scoring.older_adjustment));
    for adj in adjustments {
        if !adj.is_finite() {
            return Err(invalid("age", format!("adjustment must be finite, got {adj}")));
        }
    }

    Ok(())
}

pub fn validate_salary_rule(rule: &SalaryRuleConfig) -> Result<(), ConfigError> {
    if rule.rule_version.trim().is_empty() {
        return Err(invalid("salary_matching.rule_version", "must not be empty"));
    }

    let formulas = rule
        .tiers
        .iter()
        .map(|t| (t.multiplier, t.cushion))
        .chain(std::iter::once((rule.above.multiplier, rule.above.cushion)));
    for (multiplier, cushion) in formulas {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(invalid(
                "salary_matching.multiplier",
                format!("must be > 0, got {multiplier}"),
            ));
        }
        if !cushion.is_finite() || cushion < 0.0 {
            return Err(invalid(
                "salary_matching.cushion",
                format!("must be >= 0, got {cushion}"),
            ));
        }
    }

    for tier in &rule.tiers {
        if !tier.max_outgoing.is_finite() || tier.max_outgoing < 0.0 {
            return Err(invalid(
                "salary_matching.tiers.max_outgoing",
                format!("must be >= 0, got {}", tier.max_outgoing),
            ));
        }
    }
    for pair in rule.tiers.windows(2) {
        if pair[1].max_outgoing <= pair[0].max_outgoing {
            return Err(invalid(
                "salary_matching.tiers",
                format!(
                    "max_outgoing must strictly increase, got {} after {}",
                    pair[1].max_outgoing, pair[0].max_outgoing
                ),
            ));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Helper: returns the crate root, which holds `defaults/`.
    fn project_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    }

    fn assert_validation_field(err: ConfigError, expected: &str) {
        match err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, expected),
            other => panic!("expected ValidationError for {expected}, got {other:?}"),
        }
    }

    #[test]
    fn shipped_defaults_parse_and_match_builtin_defaults() {
        let text = fs::read_to_string(project_root().join("defaults/scoring.toml"))
            .expect("defaults/scoring.toml should exist");
        let Ok(config) = parse_config(&text) else {
            panic!("defaults/scoring.toml should parse and validate");
        };
        let builtin = Config::default();

        assert!((config.scoring.weights.performance - 0.50).abs() < f64::EPSILON);
        assert!((config.scoring.weights.contract - 0.25).abs() < f64::EPSILON);
        assert!((config.scoring.weights.fit - 0.25).abs() < f64::EPSILON);
        assert!((config.scoring.tier_thresholds.untouchable - 85.0).abs() < f64::EPSILON);
        assert!((config.scoring.tier_thresholds.rotation - 25.0).abs() < f64::EPSILON);
        assert_eq!(config.scoring.age_bands, builtin.scoring.age_bands);
        assert!((config.scoring.older_adjustment - -5.0).abs() < f64::EPSILON);
        assert_eq!(config.salary_rule.tiers, builtin.salary_rule.tiers);
        assert_eq!(config.salary_rule.above, builtin.salary_rule.above);
        assert_eq!(config.salary_rule.rule_version, "tiered_2023");
        assert_eq!(config.data_paths.players, "data/players.csv");
        assert_eq!(config.data_paths.trades, "data/historical_trades.csv");
    }

    #[test]
    fn policy_hash_is_stable_and_tracks_policy_changes() {
        let base = Config::default();
        let hash = base.policy_hash();
        assert_eq!(hash.len(), 12);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, Config::default().policy_hash());

        let mut moved_paths = Config::default();
        moved_paths.data_paths.players = "elsewhere.csv".into();
        assert_eq!(moved_paths.policy_hash(), hash);

        let mut new_cut = Config::default();
        new_cut.scoring.tier_thresholds.franchise = 71.0;
        assert_ne!(new_cut.policy_hash(), hash);

        let mut new_rule = Config::default();
        new_rule.salary_rule.rule_version = "tiered_2025".into();
        assert_ne!(new_rule.policy_hash(), hash);
    }

    #[test]
    fn shipped_defaults_hash_like_builtin_defaults() {
        let text = fs::read_to_string(project_root().join("defaults/scoring.toml")).unwrap();
        let Ok(config) = parse_config(&text) else {
            panic!("defaults/scoring.toml should parse and validate");
        };
        assert_eq!(config.policy_hash(), Config::default().policy_hash());
    }

    #[test]
    fn builtin_defaults_are_valid() {
        validate(&Config::default()).expect("default config should validate");
    }

    #[test]
    fn load_config_copies_defaults_into_fresh_dir() {
        let tmp = std::env::temp_dir().join("trade_value_config_copy");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::copy(
            project_root().join("defaults/scoring.toml"),
            tmp.join("defaults/scoring.toml"),
        )
        .unwrap();

        let copied = ensure_config_file(&tmp).unwrap();
        assert_eq!(copied, Some(tmp.join("config/scoring.toml")));
        // Second call finds the file already present.
        assert_eq!(ensure_config_file(&tmp).unwrap(), None);

        let config = load_config(&tmp).expect("copied config should load");
        assert!((config.scoring.contract_clip - 5.0).abs() < f64::EPSILON);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn existing_config_is_never_overwritten() {
        let tmp = std::env::temp_dir().join("trade_value_config_keep");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::copy(
            project_root().join("defaults/scoring.toml"),
            tmp.join("defaults/scoring.toml"),
        )
        .unwrap();
        fs::write(tmp.join("config/scoring.toml"), "# edited by hand\n").unwrap();

        assert_eq!(ensure_config_file(&tmp).unwrap(), None);
        assert_eq!(
            fs::read_to_string(tmp.join("config/scoring.toml")).unwrap(),
            "# edited by hand\n"
        );

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn config_without_defaults_dir_is_accepted() {
        let tmp = std::env::temp_dir().join("trade_value_config_no_defaults");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::copy(
            project_root().join("defaults/scoring.toml"),
            tmp.join("config/scoring.toml"),
        )
        .unwrap();

        assert_eq!(ensure_config_file(&tmp).unwrap(), None);
        assert!(load_config(&tmp).is_ok());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_config_file_is_reported() {
        let tmp = std::env::temp_dir().join("trade_value_config_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn no_defaults_and_no_config_dir_is_an_error() {
        let tmp = std::env::temp_dir().join("trade_value_config_empty");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        let err = ensure_config_file(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::DefaultsCopyError { .. }));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(parse_config("[trade_value"), Err(ParseFailure::Toml(_))));
    }

    #[test]
    fn weights_must_sum_to_one() {
        let mut config = Config::default();
        config.scoring.weights.fit = 0.30;
        assert_validation_field(validate(&config).unwrap_err(), "trade_value.weights");
    }

    #[test]
    fn negative_weight_is_rejected() {
        let mut config = Config::default();
        config.scoring.weights.performance = 1.25;
        config.scoring.weights.contract = -0.5;
        config.scoring.weights.fit = 0.25;
        assert_validation_field(
            validate(&config).unwrap_err(),
            "trade_value.weights.contract",
        );
    }

    #[test]
    fn tier_cuts_must_strictly_decrease() {
        let mut config = Config::default();
        config.scoring.tier_thresholds.all_star = 70.0;
        assert_validation_field(
            validate(&config).unwrap_err(),
            "trade_value.tier_thresholds.all_star",
        );
    }

    #[test]
    fn tier_cut_outside_score_range_is_rejected() {
        let mut config = Config::default();
        config.scoring.tier_thresholds.untouchable = 120.0;
        assert_validation_field(
            validate(&config).unwrap_err(),
            "trade_value.tier_thresholds.untouchable",
        );
    }

    #[test]
    fn age_bands_must_strictly_increase() {
        let mut config = Config::default();
        config.scoring.age_bands[2].max_age = 24;
        assert_validation_field(validate(&config).unwrap_err(), "age.bands");

        config.scoring.age_bands.clear();
        assert_validation_field(validate(&config).unwrap_err(), "age.bands");
    }

    #[test]
    fn salary_tiers_must_strictly_increase() {
        let mut config = Config::default();
        config.salary_rule.tiers[1].max_outgoing = 7.5;
        assert_validation_field(validate(&config).unwrap_err(), "salary_matching.tiers");
    }

    #[test]
    fn salary_multiplier_must_be_positive() {
        let mut config = Config::default();
        config.salary_rule.above.multiplier = 0.0;
        assert_validation_field(
            validate(&config).unwrap_err(),
            "salary_matching.multiplier",
        );
    }
}
