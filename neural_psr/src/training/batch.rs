//! Mini-batch index sampling.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Splits a dataset's configurations into mini-batches, reshuffled every
/// epoch from a seeded RNG.
#[derive(Debug, Clone)]
pub struct ScanBatcher {
    batch_size: usize,
    shuffle: bool,
    rng: StdRng,
}

impl ScanBatcher {
    /// Create a batcher. A batch size of 0 is treated as 1.
    pub fn new(batch_size: usize, shuffle: bool, seed: u64) -> Self {
        Self {
            batch_size: batch_size.max(1),
            shuffle,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Index batches of one epoch over `n` configurations. The last batch
    /// may be short.
    pub fn epoch(&mut self, n: usize) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..n).collect();
        if self.shuffle {
            indices.shuffle(&mut self.rng);
        }
        indices
            .chunks(self.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect()
    }
}
