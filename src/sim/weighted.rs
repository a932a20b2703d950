//! Weighted random choice over a small ordered table
//!
//! Used for the reward base score, peg kind refresh, unit type mix and
//! spawn heading bands. Weights are normalized at construction so a table
//! always sums to 1 and sampling can never fall off the end.

use rand::Rng;

use crate::error::SimError;

/// An ordered list of (weight, value) pairs with precomputed cumulative weights
#[derive(Debug, Clone)]
pub struct WeightedTable<T> {
    values: Vec<T>,
    /// Normalized cumulative weights; last entry is exactly 1.0
    cumulative: Vec<f32>,
}

impl<T> WeightedTable<T> {
    /// Build a table, rejecting empty tables and unusable weights
    pub fn new(entries: impl IntoIterator<Item = (f32, T)>) -> Result<Self, SimError> {
        let mut weights = Vec::new();
        let mut values = Vec::new();
        for (weight, value) in entries {
            if !weight.is_finite() || weight < 0.0 {
                return Err(SimError::InvalidWeightTable(format!(
                    "weight {} is negative or not finite",
                    weight
                )));
            }
            weights.push(weight);
            values.push(value);
        }

        let total: f32 = weights.iter().sum();
        if values.is_empty() || total <= 0.0 {
            return Err(SimError::InvalidWeightTable(
                "table has no positive weight".to_string(),
            ));
        }

        let mut acc = 0.0;
        let mut cumulative: Vec<f32> = weights
            .iter()
            .map(|w| {
                acc += w / total;
                acc
            })
            .collect();
        // Pin the tail so rounding can never leave a gap above the last threshold
        if let Some(last) = cumulative.last_mut() {
            *last = 1.0;
        }

        Ok(Self { values, cumulative })
    }

    /// Draw a value
    pub fn sample<R: Rng>(&self, rng: &mut R) -> &T {
        self.pick(rng.random::<f32>())
    }

    /// Value selected by a roll in [0, 1)
    pub fn pick(&self, roll: f32) -> &T {
        let idx = self
            .cumulative
            .iter()
            .position(|&c| roll < c)
            .unwrap_or(self.values.len() - 1);
        &self.values[idx]
    }

    /// Normalized probability of the entry at `index`
    pub fn probability(&self, index: usize) -> Option<f32> {
        let hi = *self.cumulative.get(index)?;
        let lo = if index == 0 { 0.0 } else { self.cumulative[index - 1] };
        Some(hi - lo)
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn reward_table() -> WeightedTable<u32> {
        WeightedTable::new([(0.15, 0), (0.25, 1), (0.30, 2), (0.20, 4), (0.10, 8)]).unwrap()
    }

    #[test]
    fn test_pick_respects_thresholds() {
        let table = reward_table();
        assert_eq!(*table.pick(0.0), 0);
        assert_eq!(*table.pick(0.149), 0);
        assert_eq!(*table.pick(0.151), 1);
        assert_eq!(*table.pick(0.5), 2);
        assert_eq!(*table.pick(0.85), 4);
        assert_eq!(*table.pick(0.95), 8);
    }

    #[test]
    fn test_never_falls_through() {
        // Weights that do not sum to 1 are normalized
        let table = WeightedTable::new([(0.3, 'a'), (0.3, 'b')]).unwrap();
        assert_eq!(*table.pick(0.9999), 'b');
        assert_eq!(*table.pick(1.0), 'b');
        assert!((table.probability(0).unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_bad_tables() {
        assert!(WeightedTable::<u32>::new([]).is_err());
        assert!(WeightedTable::new([(0.0, 1), (0.0, 2)]).is_err());
        assert!(WeightedTable::new([(-1.0, 1), (2.0, 2)]).is_err());
        assert!(WeightedTable::new([(f32::NAN, 1)]).is_err());
    }

    #[test]
    fn test_sample_distribution_roughly_matches() {
        let table = reward_table();
        let mut rng = Pcg32::seed_from_u64(7);
        let mut counts = [0u32; 5];
        let n = 20_000;
        for _ in 0..n {
            let v = *table.sample(&mut rng);
            let idx = table.values().iter().position(|&x| x == v).unwrap();
            counts[idx] += 1;
        }
        for (i, &count) in counts.iter().enumerate() {
            let expected = table.probability(i).unwrap();
            let observed = count as f32 / n as f32;
            assert!(
                (observed - expected).abs() < 0.02,
                "entry {} observed {} expected {}",
                i,
                observed,
                expected
            );
        }
    }
}
