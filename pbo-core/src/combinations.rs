//! Combination enumerator and train/validation pair builder.
//!
//! Enumerates every way to pick S/2 of the S blocks in lexicographic order.
//! Both enumeration and pair construction are lazy: a caller pulls one
//! [`TrainValPair`] at a time, so peak memory is one pair per consumer
//! rather than C(S, S/2) pairs.

use serde::{Deserialize, Serialize};

use crate::error::{CscvError, Result};
use crate::matrix::ObservationMatrix;
use crate::partition::Block;

/// Binomial coefficient C(n, k), or `None` on `u64` overflow.
pub fn binomial(n: usize, k: usize) -> Option<u64> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k) as u64;
    let n = n as u64;
    let mut acc: u64 = 1;
    for i in 0..k {
        // acc * (n - i) is always divisible by (i + 1); the product fits in u128
        let next = u128::from(acc) * u128::from(n - i) / u128::from(i + 1);
        acc = u64::try_from(next).ok()?;
    }
    Some(acc)
}

/// A sorted selection of S/2 distinct block indices out of S.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombinationIndex {
    partitions: usize,
    selected: Vec<usize>,
}

impl CombinationIndex {
    /// Build a selection; indices are sorted and must be distinct and `< partitions`.
    pub fn new(partitions: usize, mut selected: Vec<usize>) -> Result<Self> {
        selected.sort_unstable();
        let distinct = selected.windows(2).all(|w| w[0] != w[1]);
        let in_range = selected.last().map_or(true, |&max| max < partitions);
        if !distinct || !in_range {
            return Err(CscvError::InvalidCombination {
                partitions,
                selected,
            });
        }
        Ok(Self {
            partitions,
            selected,
        })
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Selected (training) block indices, ascending.
    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    /// Block indices not selected (validation side), ascending.
    pub fn complement(&self) -> Vec<usize> {
        let mut chosen = self.selected.iter().peekable();
        (0..self.partitions)
            .filter(|i| {
                if chosen.peek() == Some(&i) {
                    chosen.next();
                    false
                } else {
                    true
                }
            })
            .collect()
    }

    pub fn contains(&self, block: usize) -> bool {
        self.selected.binary_search(&block).is_ok()
    }
}

/// Lazy lexicographic iterator over all k-subsets of `0..n`.
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    next: Option<Vec<usize>>,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        let next = if k <= n { Some((0..k).collect()) } else { None };
        Self { n, next }
    }

    fn advance(&self, current: &[usize]) -> Option<Vec<usize>> {
        let k = current.len();
        let pivot = (0..k).rev().find(|&i| current[i] < self.n - k + i)?;
        let mut next = current.to_vec();
        next[pivot] += 1;
        for j in pivot + 1..k {
            next[j] = next[j - 1] + 1;
        }
        Some(next)
    }
}

impl Iterator for Combinations {
    type Item = CombinationIndex;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = self.advance(&current);
        Some(CombinationIndex {
            partitions: self.n,
            selected: current,
        })
    }
}

/// Validate S and return a lazy enumeration of its C(S, S/2) balanced selections.
pub fn enumerate(partitions: usize) -> Result<Combinations> {
    if partitions % 2 != 0 {
        return Err(CscvError::OddPartitionCount { partitions });
    }
    if partitions < 2 {
        return Err(CscvError::InvalidPartitionCount {
            partitions,
            rows: 0,
        });
    }
    Ok(Combinations::new(partitions, partitions / 2))
}

/// Number of combinations `enumerate(partitions)` yields, or `None` on overflow.
pub fn combination_count(partitions: usize) -> Option<u64> {
    binomial(partitions, partitions / 2)
}

/// Training and validation matrices for one combination.
///
/// Both sides stack their blocks in ascending block order, so chronology is
/// preserved within each side.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainValPair {
    /// Position of the combination in enumeration order.
    pub index: usize,
    pub combination: CombinationIndex,
    pub train: ObservationMatrix,
    pub validation: ObservationMatrix,
}

/// Materialize the train/validation pair for one combination.
pub fn build_pair(
    matrix: &ObservationMatrix,
    blocks: &[Block],
    index: usize,
    combination: &CombinationIndex,
) -> Result<TrainValPair> {
    if combination.partitions() != blocks.len() {
        return Err(CscvError::ShapeMismatch {
            left: combination.partitions(),
            right: blocks.len(),
        });
    }

    let ranges = |ids: &[usize]| -> Vec<(usize, usize)> {
        ids.iter()
            .map(|&i| (blocks[i].start, blocks[i].end))
            .collect()
    };

    let covered = blocks.last().map_or(0, |b| b.end);
    if covered != matrix.rows() {
        return Err(CscvError::InvalidMatrix(format!(
            "blocks cover {covered} rows but the matrix has {}",
            matrix.rows()
        )));
    }

    let stack = |ids: &[usize]| {
        matrix.stack_row_ranges(&ranges(ids)).ok_or_else(|| {
            CscvError::InvalidMatrix(format!(
                "block ranges do not fit a matrix of {} rows",
                matrix.rows()
            ))
        })
    };
    let complement = combination.complement();
    let train = stack(combination.selected())?;
    let validation = stack(&complement[..])?;

    Ok(TrainValPair {
        index,
        combination: combination.clone(),
        train,
        validation,
    })
}

/// Lazy stream of train/validation pairs, one per combination.
pub struct PairStream<'a, I> {
    matrix: &'a ObservationMatrix,
    blocks: &'a [Block],
    combinations: std::iter::Enumerate<I>,
}

impl<I> Iterator for PairStream<'_, I>
where
    I: Iterator<Item = CombinationIndex>,
{
    type Item = Result<TrainValPair>;

    fn next(&mut self) -> Option<Self::Item> {
        let (index, combination) = self.combinations.next()?;
        Some(build_pair(self.matrix, self.blocks, index, &combination))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.combinations.size_hint()
    }
}

/// Build pairs lazily for every combination, in the order given.
pub fn build_pairs<'a, C>(
    matrix: &'a ObservationMatrix,
    blocks: &'a [Block],
    combinations: C,
) -> PairStream<'a, C::IntoIter>
where
    C: IntoIterator<Item = CombinationIndex>,
{
    PairStream {
        matrix,
        blocks,
        combinations: combinations.into_iter().enumerate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{partition, PartitionPolicy};

    #[test]
    fn binomial_known_values() {
        assert_eq!(binomial(4, 2), Some(6));
        assert_eq!(binomial(10, 5), Some(252));
        assert_eq!(binomial(16, 8), Some(12_870));
        assert_eq!(binomial(20, 10), Some(184_756));
        assert_eq!(binomial(3, 5), Some(0));
        assert_eq!(binomial(5, 0), Some(1));
    }

    #[test]
    fn binomial_near_u64_limit() {
        assert_eq!(binomial(64, 32), Some(1_832_624_140_942_590_534));
        assert_eq!(binomial(66, 33), Some(7_219_428_434_016_265_740));
        assert_eq!(binomial(68, 34), None);
    }

    #[test]
    fn enumerate_s4_lexicographic() {
        let all: Vec<Vec<usize>> = enumerate(4)
            .unwrap()
            .map(|c| c.selected().to_vec())
            .collect();
        assert_eq!(
            all,
            vec![
                vec![0, 1],
                vec![0, 2],
                vec![0, 3],
                vec![1, 2],
                vec![1, 3],
                vec![2, 3],
            ]
        );
    }

    #[test]
    fn odd_partition_count_rejected() {
        assert_eq!(
            enumerate(7).unwrap_err(),
            CscvError::OddPartitionCount { partitions: 7 }
        );
        assert!(matches!(
            enumerate(0),
            Err(CscvError::InvalidPartitionCount { .. })
        ));
    }

    #[test]
    fn complement_is_set_difference() {
        let c = CombinationIndex::new(6, vec![4, 0, 2]).unwrap();
        assert_eq!(c.selected(), &[0, 2, 4]);
        assert_eq!(c.complement(), vec![1, 3, 5]);
        assert!(c.contains(2));
        assert!(!c.contains(3));
    }

    #[test]
    fn combination_index_rejects_duplicates_and_out_of_range() {
        assert!(CombinationIndex::new(4, vec![1, 1]).is_err());
        assert!(CombinationIndex::new(4, vec![0, 4]).is_err());
    }

    #[test]
    fn pair_sides_keep_block_order() {
        // 8 rows, 1 column: value == row index
        let m = ObservationMatrix::new(8, 1, (0..8).map(f64::from).collect()).unwrap();
        let blocks = partition(&m, 4, PartitionPolicy::Exact).unwrap();
        let combo = CombinationIndex::new(4, vec![3, 1]).unwrap();
        let pair = build_pair(&m, &blocks, 0, &combo).unwrap();
        assert_eq!(pair.train.as_slice(), &[2.0, 3.0, 6.0, 7.0]);
        assert_eq!(pair.validation.as_slice(), &[0.0, 1.0, 4.0, 5.0]);
    }

    #[test]
    fn build_pairs_streams_every_combination() {
        let m = ObservationMatrix::new(12, 2, vec![1.0; 24]).unwrap();
        let blocks = partition(&m, 4, PartitionPolicy::Exact).unwrap();
        let pairs: Vec<TrainValPair> = build_pairs(&m, &blocks, enumerate(4).unwrap())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(pairs.len(), 6);
        for (i, p) in pairs.iter().enumerate() {
            assert_eq!(p.index, i);
            assert_eq!(p.train.rows(), 6);
            assert_eq!(p.validation.rows(), 6);
        }
    }

    #[test]
    fn build_pair_rejects_mismatched_blocks() {
        let m = ObservationMatrix::new(8, 1, vec![0.0; 8]).unwrap();
        let blocks = partition(&m, 2, PartitionPolicy::Exact).unwrap();
        let combo = CombinationIndex::new(4, vec![0, 1]).unwrap();
        assert!(matches!(
            build_pair(&m, &blocks, 0, &combo),
            Err(CscvError::ShapeMismatch { left: 4, right: 2 })
        ));
    }

    #[test]
    fn build_pair_rejects_blocks_from_another_matrix() {
        let large = ObservationMatrix::new(16, 1, vec![0.0; 16]).unwrap();
        let small = ObservationMatrix::new(8, 1, vec![0.0; 8]).unwrap();
        let blocks = partition(&large, 4, PartitionPolicy::Exact).unwrap();
        let combo = CombinationIndex::new(4, vec![2, 3]).unwrap();
        assert!(matches!(
            build_pair(&small, &blocks, 0, &combo),
            Err(CscvError::InvalidMatrix(_))
        ));
    }

    #[test]
    fn build_pair_rejects_malformed_blocks() {
        let m = ObservationMatrix::new(8, 1, vec![0.0; 8]).unwrap();
        let blocks = [
            Block { index: 0, start: 0, end: 2 },
            Block { index: 1, start: 6, end: 12 },
            Block { index: 2, start: 4, end: 6 },
            Block { index: 3, start: 6, end: 8 },
        ];
        let combo = CombinationIndex::new(4, vec![0, 1]).unwrap();
        assert!(matches!(
            build_pair(&m, &blocks, 0, &combo),
            Err(CscvError::InvalidMatrix(_))
        ));
    }
}
