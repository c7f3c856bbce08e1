//! Per-gene credit history.
//!
//! Each gene carries an affect score in `[0, 1]`: a relative ranking of how
//! much its past changes contributed to fitness gains. Scores feed
//! [`affect_noise`](crate::mutation::affect_noise).

/// Substitute for a zero normalization range.
pub const RANGE_EPSILON: f64 = 1e-12;

fn guarded(range: f64) -> f64 {
    if range.is_finite() && range > RANGE_EPSILON {
        range
    } else {
        RANGE_EPSILON
    }
}

/// Normalized per-gene affect scores.
#[derive(Debug, Clone, PartialEq)]
pub struct Affect {
    scores: Vec<f64>,
    fresh: bool,
}

impl Affect {
    /// A reset affect vector for `len` genes.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            scores: vec![1.0; len],
            fresh: true,
        }
    }

    /// Set every score to 1 and mark the vector uninformative.
    pub fn reset(&mut self) {
        self.scores.fill(1.0);
        self.fresh = true;
    }

    /// True until the first update after a reset.
    #[must_use]
    pub const fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Scores, one per gene.
    #[must_use]
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// Number of genes tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether no genes are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Credit the genes that moved between `prior` and `current`.
    ///
    /// Each gene's change magnitude is normalized to `[0, 1]` across the
    /// vector, scaled by `delta_fitness / fitness_range` and added to its
    /// score. The scores are then renormalized so the lowest is 0 and the
    /// highest 1. Zero ranges are replaced by [`RANGE_EPSILON`], and a
    /// non-finite contribution is dropped. If every score ends up equal, all
    /// of them are set to 1.
    ///
    /// # Panics
    ///
    /// Panics if `prior` or `current` differ in length from the affect vector.
    pub fn update(&mut self, prior: &[f64], current: &[f64], delta_fitness: f64, fitness_range: f64) {
        assert!(
            prior.len() == self.scores.len() && current.len() == self.scores.len(),
            "Affect update length mismatch: expected {}, got {} and {}",
            self.scores.len(),
            prior.len(),
            current.len()
        );
        self.fresh = false;
        if self.scores.is_empty() {
            return;
        }

        let magnitudes: Vec<f64> = prior
            .iter()
            .zip(current)
            .map(|(p, c)| (c - p).abs())
            .collect();
        let (low, high) = bounds(&magnitudes);
        let span = guarded(high - low);
        let scale = delta_fitness / guarded(fitness_range);

        for (score, m) in self.scores.iter_mut().zip(&magnitudes) {
            let change = (m - low) / span * scale;
            if change.is_finite() {
                *score += change;
            }
        }

        let (low, high) = bounds(&self.scores);
        if high - low <= RANGE_EPSILON {
            // No gene stands out.
            self.scores.fill(1.0);
            return;
        }
        let span = high - low;
        for score in &mut self.scores {
            *score = ((*score - low) / span).clamp(0.0, 1.0);
        }
    }
}

fn bounds(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_reset_state() {
        let mut affect = Affect::new(4);
        assert!(affect.is_fresh());
        assert_eq!(affect.scores(), &[1.0; 4]);

        affect.update(&[0.0; 4], &[1.0, 0.0, 0.0, 0.0], 1.0, 1.0);
        assert!(!affect.is_fresh());

        affect.reset();
        assert!(affect.is_fresh());
        assert_eq!(affect.scores(), &[1.0; 4]);
    }

    #[test]
    fn test_moved_gene_gains_credit() {
        let mut affect = Affect::new(3);
        affect.update(&[0.0, 0.0, 0.0], &[0.0, 2.0, 1.0], 0.5, 1.0);

        let scores = affect.scores();
        assert_eq!(scores[0], 0.0);
        assert_eq!(scores[1], 1.0);
        assert!(scores[2] > 0.0 && scores[2] < 1.0);
    }

    #[test]
    fn test_flat_landscape_keeps_uniform_scores() {
        let mut affect = Affect::new(3);
        affect.update(&[1.0; 3], &[1.0; 3], 0.0, 0.0);
        assert_eq!(affect.scores(), &[1.0; 3]);
        assert!(!affect.is_fresh());

        // Equal moves on every gene leave the ranking uniform too.
        affect.update(&[0.0; 3], &[2.0; 3], 4.0, 1.0);
        assert_eq!(affect.scores(), &[1.0; 3]);
    }

    #[test]
    fn test_scores_stay_normalized() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut affect = Affect::new(20);
        for _ in 0..200 {
            let prior: Vec<f64> = (0..20).map(|_| rng.random_range(-6.0..6.0)).collect();
            let current: Vec<f64> = (0..20).map(|_| rng.random_range(-6.0..6.0)).collect();
            let delta = rng.random_range(-5.0..5.0);
            affect.update(&prior, &current, delta, 10.0);
            assert!(affect.scores().iter().all(|s| (0.0..=1.0).contains(s)));
        }
    }
}
