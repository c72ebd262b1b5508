//! Deterministic fold generation for cross-validation
//!
//! Both split modes are seeded so that a re-run with the same inputs
//! reproduces the exact same folds, and with them the same cross-validation
//! scores. The stratified mode seeds each class's permutation with the
//! class's ordinal position; substituting a single global seed would change
//! which samples land in which fold.

use mapcover_core::{Error, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::warn;

/// One train/test split of the sample index set
#[derive(Debug, Clone)]
pub struct Fold {
    /// Indices used to train this fold's model
    pub train: Vec<usize>,
    /// Indices held out for testing
    pub test: Vec<usize>,
}

/// A complete v-fold partition of the sample indices.
///
/// The test groups are pairwise disjoint and their union is the full index
/// set; each fold's training group is the union of the other folds' test
/// groups.
#[derive(Debug, Clone)]
pub struct FoldPlan {
    folds: Vec<Fold>,
}

impl FoldPlan {
    /// Unstratified split: permute all `n` indices with a fixed seed, then
    /// cut into `v` contiguous chunks of `n / v`, the last chunk absorbing
    /// the remainder.
    pub fn split(n: usize, v: usize, seed: u64) -> Result<Self> {
        validate(n, v)?;

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let chunks = cut_chunks(&indices, v);
        Ok(Self::from_chunk_sets(vec![chunks], v))
    }

    /// Stratified split: each class's indices are permuted with a seed equal
    /// to the class's ordinal position (ascending label order) and cut into
    /// `v` chunks; fold j's test group is the union across classes of
    /// chunk j.
    ///
    /// A class with fewer than `v` members yields empty chunks for all but
    /// the last fold; this is logged as a degenerate-fold condition and the
    /// run continues.
    pub fn split_stratified(labels: &[u8], v: usize) -> Result<Self> {
        validate(labels.len(), v)?;

        let mut distinct: Vec<u8> = labels.to_vec();
        distinct.sort_unstable();
        distinct.dedup();

        let mut per_class_chunks = Vec::with_capacity(distinct.len());
        for (ordinal, &label) in distinct.iter().enumerate() {
            let mut class_indices: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|(_, &y)| y == label)
                .map(|(i, _)| i)
                .collect();

            if class_indices.len() < v {
                warn!(
                    label,
                    count = class_indices.len(),
                    folds = v,
                    "not enough samples to build {} folds for class {}",
                    v,
                    label
                );
            }

            // Seed = class ordinal, so fold assignment survives relabeling
            let mut rng = ChaCha8Rng::seed_from_u64(ordinal as u64);
            class_indices.shuffle(&mut rng);

            per_class_chunks.push(cut_chunks(&class_indices, v));
        }

        Ok(Self::from_chunk_sets(per_class_chunks, v))
    }

    fn from_chunk_sets(chunk_sets: Vec<Vec<Vec<usize>>>, v: usize) -> Self {
        let mut folds = Vec::with_capacity(v);
        for j in 0..v {
            let mut train = Vec::new();
            let mut test = Vec::new();
            for chunks in &chunk_sets {
                for (l, chunk) in chunks.iter().enumerate() {
                    if l == j {
                        test.extend_from_slice(chunk);
                    } else {
                        train.extend_from_slice(chunk);
                    }
                }
            }
            folds.push(Fold { train, test });
        }
        Self { folds }
    }

    /// Number of folds
    pub fn len(&self) -> usize {
        self.folds.len()
    }

    /// Whether the plan holds no folds
    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }

    /// The folds, in order
    pub fn folds(&self) -> &[Fold] {
        &self.folds
    }
}

/// Cut an index slice into `v` chunks of `len / v`, the last chunk taking
/// the remainder.
fn cut_chunks(indices: &[usize], v: usize) -> Vec<Vec<usize>> {
    let step = indices.len() / v;
    (0..v)
        .map(|j| {
            let start = j * step;
            let end = if j < v - 1 { (j + 1) * step } else { indices.len() };
            indices[start..end].to_vec()
        })
        .collect()
}

fn validate(n: usize, v: usize) -> Result<()> {
    if v < 2 {
        return Err(Error::InvalidParameter {
            name: "folds",
            value: v.to_string(),
            reason: "at least 2 folds are required".into(),
        });
    }
    if n == 0 {
        return Err(Error::Algorithm("Cannot split an empty sample set".into()));
    }
    Ok(())
}
