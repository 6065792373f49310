//! Ranking utilities: tie policies, in-sample argmax, rank correlations.
//!
//! Ranks are 1-based with rank 1 the lowest value. Inputs are assumed free
//! of `NaN`; the lambda calculator rejects missing scores before ranking.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// How to rank a value that ties with other entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RankTieBreak {
    /// Uniformly random position within the tied group.
    #[default]
    Random,
    /// Mean of the tied group's positions (may be fractional).
    Average,
    /// Lowest position of the tied group.
    Min,
    /// Highest position of the tied group.
    Max,
    /// Position by column order within the tied group.
    First,
}

/// How to choose among columns tied for the in-sample maximum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SelectionTieBreak {
    /// Uniformly random among the tied columns.
    #[default]
    Random,
    /// Lowest column index.
    First,
}

/// Error for an unrecognised tie policy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tie-break policy '{0}'")]
pub struct UnknownTieBreak(pub String);

impl FromStr for RankTieBreak {
    type Err = UnknownTieBreak;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(RankTieBreak::Random),
            "average" => Ok(RankTieBreak::Average),
            "min" => Ok(RankTieBreak::Min),
            "max" => Ok(RankTieBreak::Max),
            "first" => Ok(RankTieBreak::First),
            other => Err(UnknownTieBreak(other.to_string())),
        }
    }
}

impl FromStr for SelectionTieBreak {
    type Err = UnknownTieBreak;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(SelectionTieBreak::Random),
            "first" => Ok(SelectionTieBreak::First),
            other => Err(UnknownTieBreak(other.to_string())),
        }
    }
}

impl fmt::Display for RankTieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RankTieBreak::Random => "random",
            RankTieBreak::Average => "average",
            RankTieBreak::Min => "min",
            RankTieBreak::Max => "max",
            RankTieBreak::First => "first",
        };
        f.write_str(name)
    }
}

impl fmt::Display for SelectionTieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionTieBreak::Random => f.write_str("random"),
            SelectionTieBreak::First => f.write_str("first"),
        }
    }
}

impl TryFrom<String> for RankTieBreak {
    type Error = UnknownTieBreak;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<RankTieBreak> for String {
    fn from(policy: RankTieBreak) -> Self {
        policy.to_string()
    }
}

impl TryFrom<String> for SelectionTieBreak {
    type Error = UnknownTieBreak;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<SelectionTieBreak> for String {
    fn from(policy: SelectionTieBreak) -> Self {
        policy.to_string()
    }
}

/// Chosen column and how many columns shared the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    pub tied: usize,
}

/// Index of the maximum of `values`, breaking ties with `policy`.
///
/// Returns `None` for an empty slice.
pub fn select_best<R: Rng + ?Sized>(
    values: &[f64],
    policy: SelectionTieBreak,
    rng: &mut R,
) -> Option<Selection> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let tied: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, &v)| v == max)
        .map(|(i, _)| i)
        .collect();

    let index = match (tied.len(), policy) {
        (0, _) => return None,
        (1, _) | (_, SelectionTieBreak::First) => tied[0],
        (n, SelectionTieBreak::Random) => tied[rng.gen_range(0..n)],
    };

    Some(Selection {
        index,
        tied: tied.len(),
    })
}

/// Rank (1 = lowest) of `values[target]` among all of `values`.
pub fn rank_of<R: Rng + ?Sized>(
    values: &[f64],
    target: usize,
    policy: RankTieBreak,
    rng: &mut R,
) -> f64 {
    let v = values[target];
    let below = values.iter().filter(|&&x| x < v).count();
    let equal = values.iter().filter(|&&x| x == v).count();

    let offset = match policy {
        RankTieBreak::Min => 1.0,
        RankTieBreak::Max => equal as f64,
        RankTieBreak::Average => (equal as f64 + 1.0) / 2.0,
        RankTieBreak::First => {
            let earlier = values[..target].iter().filter(|&&x| x == v).count();
            (earlier + 1) as f64
        }
        RankTieBreak::Random if equal > 1 => (rng.gen_range(0..equal) + 1) as f64,
        RankTieBreak::Random => 1.0,
    };

    below as f64 + offset
}

/// Average ranks (1-based, ties share the mean of their positions).
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // positions start+1 ..= end share their mean
        let shared = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = shared;
        }
        start = end;
    }
    ranks
}

/// Pearson correlation, or `None` if undefined (length < 2 or zero variance).
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    let denom = (var_a * var_b).sqrt();
    if denom > 0.0 {
        Some((cov / denom).clamp(-1.0, 1.0))
    } else {
        None
    }
}

/// Spearman's rho: Pearson correlation of average ranks.
pub fn spearman(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    pearson(&average_ranks(a), &average_ranks(b))
}

/// Kendall's tau-b, which corrects for ties in either vector.
pub fn kendall_tau(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len();
    if n != b.len() || n < 2 {
        return None;
    }

    let (mut concordant, mut discordant) = (0i64, 0i64);
    let (mut tied_a, mut tied_b) = (0i64, 0i64);
    for i in 0..n {
        for j in i + 1..n {
            let da = a[i].partial_cmp(&a[j]).unwrap_or(Ordering::Equal);
            let db = b[i].partial_cmp(&b[j]).unwrap_or(Ordering::Equal);
            if da == Ordering::Equal {
                tied_a += 1;
            }
            if db == Ordering::Equal {
                tied_b += 1;
            }
            match (da, db) {
                (Ordering::Equal, _) | (_, Ordering::Equal) => {}
                _ if da == db => concordant += 1,
                _ => discordant += 1,
            }
        }
    }

    let pairs = (n * (n - 1) / 2) as i64;
    let denom = (((pairs - tied_a) * (pairs - tied_b)) as f64).sqrt();
    if denom > 0.0 {
        Some((concordant - discordant) as f64 / denom)
    } else {
        None
    }
}
