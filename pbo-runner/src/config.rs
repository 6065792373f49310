//! Run configuration for a CSCV/PBO estimate.
//!
//! Serializable so a run can be reproduced from a TOML file:
//!
//! ```toml
//! partitions = 16
//! method = "sharpe"
//! risk_free_rate = 0.0
//! seed = 42
//! rank_ties = "average"
//! threads = 4
//! ```
//!
//! Missing keys take their defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pbo_core::{
    enumerate, CscvError, EvaluationMethod, LambdaParams, PartitionPolicy, RankTieBreak,
    SelectionTieBreak, UnknownTieBreak, DEFAULT_RISK_FREE_RATE,
};

/// What to do with a combination whose scores are undefined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Abort the run on the first missing score.
    #[default]
    FailFast,
    /// Drop the combination, count it, and continue.
    Skip,
}

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid partition count: {0}")]
    Partitions(#[from] CscvError),
    #[error("invalid evaluation method: {0}")]
    Method(CscvError),
    #[error("invalid tie policy: {0}")]
    TieBreak(#[from] UnknownTieBreak),
    #[error("batch_size must be at least 1")]
    ZeroBatchSize,
    #[error("risk_free_rate must be finite, got {0}")]
    NonFiniteRiskFreeRate(f64),
}

/// Configuration of a single CSCV run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CscvConfig {
    /// Number of time blocks S (even, >= 2).
    pub partitions: usize,
    pub method: EvaluationMethod,
    /// Per-period rate subtracted by the Sharpe method.
    pub risk_free_rate: f64,
    /// Master seed for tie-breaks. Drawn at random when absent.
    ///
    /// TOML integers are signed 64-bit, so seeds above `i64::MAX` are
    /// written as strings. Both forms are accepted on load.
    #[serde(default, with = "seed_format", skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub selection_ties: SelectionTieBreak,
    pub rank_ties: RankTieBreak,
    pub partition_policy: PartitionPolicy,
    pub missing_values: MissingValuePolicy,
    /// Worker threads; 0 or 1 runs on the calling thread.
    pub threads: usize,
    /// Combinations materialized at once.
    pub batch_size: usize,
}

mod seed_format {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SeedRepr {
        Int(i64),
        Text(String),
    }

    pub fn serialize<S>(seed: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match seed {
            None => serializer.serialize_none(),
            Some(v) => match i64::try_from(*v) {
                Ok(small) => serializer.serialize_some(&small),
                Err(_) => serializer.serialize_some(&v.to_string()),
            },
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<SeedRepr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(SeedRepr::Int(v)) => u64::try_from(v)
                .map(Some)
                .map_err(|_| D::Error::custom(format!("seed must be non-negative, got {v}"))),
            Some(SeedRepr::Text(text)) => text
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid seed '{text}': {e}"))),
        }
    }
}

impl Default for CscvConfig {
    fn default() -> Self {
        Self {
            partitions: 16,
            method: EvaluationMethod::Average,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            seed: None,
            selection_ties: SelectionTieBreak::Random,
            rank_ties: RankTieBreak::Random,
            partition_policy: PartitionPolicy::AbsorbRemainder,
            missing_values: MissingValuePolicy::FailFast,
            threads: 1,
            batch_size: 256,
        }
    }
}

impl CscvConfig {
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions,
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: EvaluationMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_selection_ties(mut self, policy: SelectionTieBreak) -> Self {
        self.selection_ties = policy;
        self
    }

    pub fn with_rank_ties(mut self, policy: RankTieBreak) -> Self {
        self.rank_ties = policy;
        self
    }

    pub fn with_partition_policy(mut self, policy: PartitionPolicy) -> Self {
        self.partition_policy = policy;
        self
    }

    pub fn with_missing_values(mut self, policy: MissingValuePolicy) -> Self {
        self.missing_values = policy;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Check every field that can be checked without data.
    pub fn validate(&self) -> Result<(), ConfigError> {
        enumerate(self.partitions)?;
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if !self.risk_free_rate.is_finite() {
            return Err(ConfigError::NonFiniteRiskFreeRate(self.risk_free_rate));
        }
        Ok(())
    }

    /// Scoring and tie-break settings for the lambda calculator.
    pub fn lambda_params(&self) -> LambdaParams {
        LambdaParams {
            method: self.method,
            risk_free_rate: self.risk_free_rate,
            selection_ties: self.selection_ties,
            rank_ties: self.rank_ties,
        }
    }

    /// Parse and validate a TOML config.
    ///
    /// Named fields are checked with their `FromStr` parsers first, so an
    /// unknown method or tie policy is reported as such.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(content)?;
        check_name::<EvaluationMethod>(&table, "method").map_err(ConfigError::Method)?;
        check_name::<SelectionTieBreak>(&table, "selection_ties")?;
        check_name::<RankTieBreak>(&table, "rank_ties")?;

        let config: Self = toml::Value::Table(table).try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn check_name<T: FromStr>(table: &toml::Table, key: &str) -> Result<(), T::Err> {
    match table.get(key) {
        Some(toml::Value::String(name)) => name.parse::<T>().map(|_| ()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CscvConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.partitions, 16);
        assert_eq!(config.risk_free_rate, 0.02);
        assert_eq!(config.missing_values, MissingValuePolicy::FailFast);
    }

    #[test]
    fn odd_partitions_rejected() {
        let err = CscvConfig::new(7).validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Partitions(CscvError::OddPartitionCount { partitions: 7 })
        ));
    }

    #[test]
    fn zero_batch_and_bad_rate_rejected() {
        assert!(matches!(
            CscvConfig::new(4).with_batch_size(0).validate(),
            Err(ConfigError::ZeroBatchSize)
        ));
        assert!(matches!(
            CscvConfig::new(4).with_risk_free_rate(f64::NAN).validate(),
            Err(ConfigError::NonFiniteRiskFreeRate(_))
        ));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = CscvConfig::from_toml(
            r#"
            partitions = 10
            method = "sharpe"
            seed = 7
            rank_ties = "average"
            missing_values = "skip"
            "#,
        )
        .unwrap();
        assert_eq!(config.partitions, 10);
        assert_eq!(config.method, EvaluationMethod::Sharpe);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.rank_ties, RankTieBreak::Average);
        assert_eq!(config.missing_values, MissingValuePolicy::Skip);
        assert_eq!(config.selection_ties, SelectionTieBreak::Random);
        assert_eq!(config.batch_size, 256);
    }

    #[test]
    fn unknown_method_is_reported_by_name() {
        let err = CscvConfig::from_toml(r#"method = "sortino""#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Method(CscvError::UnknownEvaluationMethod(ref name)) if name == "sortino"
        ));
    }

    #[test]
    fn method_alias_matches_from_str() {
        let config = CscvConfig::from_toml(r#"method = "Mean""#).unwrap();
        assert_eq!(config.method, "mean".parse::<EvaluationMethod>().unwrap());
        assert_eq!(config.method, EvaluationMethod::Average);
    }

    #[test]
    fn unknown_tie_policy_is_reported_by_name() {
        assert!(matches!(
            CscvConfig::from_toml(r#"rank_ties = "median""#),
            Err(ConfigError::TieBreak(UnknownTieBreak(ref name))) if name == "median"
        ));
        assert!(matches!(
            CscvConfig::from_toml(r#"selection_ties = "last""#),
            Err(ConfigError::TieBreak(_))
        ));
    }

    #[test]
    fn wrongly_typed_method_is_a_parse_error() {
        assert!(matches!(
            CscvConfig::from_toml("method = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn seed_above_i64_max_roundtrips_as_string() {
        let config = CscvConfig::new(4).with_seed(u64::MAX - 5);
        let text = config.to_toml().unwrap();
        assert!(text.contains("18446744073709551610"));
        assert_eq!(CscvConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn seed_accepts_integer_or_string() {
        let small = CscvConfig::from_toml("seed = 42").unwrap();
        assert_eq!(small.seed, Some(42));
        assert!(small.to_toml().unwrap().contains("seed = 42"));

        let quoted = CscvConfig::from_toml(r#"seed = "42""#).unwrap();
        assert_eq!(quoted.seed, Some(42));

        assert!(matches!(
            CscvConfig::from_toml("seed = -1"),
            Err(ConfigError::Parse(_))
        ));
        assert!(CscvConfig::default().to_toml().unwrap().lines().all(|l| !l.starts_with("seed")));
    }

    #[test]
    fn toml_roundtrip() {
        let config = CscvConfig::new(8)
            .with_seed(99)
            .with_method(EvaluationMethod::Sharpe)
            .with_partition_policy(PartitionPolicy::Exact)
            .with_threads(4);
        let text = config.to_toml().unwrap();
        assert_eq!(CscvConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn lambda_params_mirror_config() {
        let config = CscvConfig::new(4)
            .with_rank_ties(RankTieBreak::Max)
            .with_selection_ties(SelectionTieBreak::First)
            .with_risk_free_rate(0.0);
        let params = config.lambda_params();
        assert_eq!(params.rank_ties, RankTieBreak::Max);
        assert_eq!(params.selection_ties, SelectionTieBreak::First);
        assert_eq!(params.risk_free_rate, 0.0);
    }
}
