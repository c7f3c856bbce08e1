//! Gene-vector mutation operators.
//!
//! A gene vector is a topology's flat weight vector. Every operator here
//! keeps its length, and none of them panic on short vectors: an operator
//! that needs more genes than are available does nothing.

use std::f64::consts::FRAC_PI_2;

use rand::seq::index;
use rand::Rng;

/// Rank in `0..len` drawn as `round((len − 1)·(1 − cos x))`, `x ~ U(0, π/2)`.
///
/// Low ranks are much more likely than high ones. Returns 0 when `len` is 0.
pub fn cosine_rank<R: Rng>(len: usize, rng: &mut R) -> usize {
    if len <= 1 {
        return 0;
    }
    let x = rng.random_range(0.0..=FRAC_PI_2);
    let rank = ((len - 1) as f64 * (1.0 - x.cos())).round() as usize;
    rank.min(len - 1)
}

/// A uniformly random gene value in `[−range, range]`.
pub fn random_gene<R: Rng>(range: f64, rng: &mut R) -> f64 {
    rng.random_range(-range..=range)
}

/// Single-parent gene operators, picked uniformly at random during an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationOp {
    /// One random gene set to a fresh random value.
    Radical,
    /// One random gene negated.
    Sign,
    /// Two distinct random genes exchange values.
    Swap,
    /// A random gene exchanges values with its cyclic right neighbour.
    Transpose,
    /// A random contiguous run of genes replaced with fresh random values.
    Tumor,
}

impl MutationOp {
    /// Every operator.
    pub const ALL: [Self; 5] = [
        Self::Radical,
        Self::Sign,
        Self::Swap,
        Self::Transpose,
        Self::Tumor,
    ];

    /// Pick an operator uniformly.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    /// Apply the operator in place. Fresh values are drawn from `[−range, range]`.
    pub fn apply<R: Rng>(self, genes: &mut [f64], range: f64, rng: &mut R) {
        let len = genes.len();
        if len == 0 {
            return;
        }

        match self {
            Self::Radical => {
                let at = rng.random_range(0..len);
                genes[at] = random_gene(range, rng);
            }
            Self::Sign => {
                let at = rng.random_range(0..len);
                genes[at] = -genes[at];
            }
            Self::Swap => {
                if len < 2 {
                    return;
                }
                let a = rng.random_range(0..len);
                let mut b = rng.random_range(0..len - 1);
                if b >= a {
                    b += 1;
                }
                genes.swap(a, b);
            }
            Self::Transpose => {
                let a = rng.random_range(0..len);
                genes.swap(a, (a + 1) % len);
            }
            Self::Tumor => {
                // Two distinct cut points in 0..=len bound a non-empty run.
                let p1 = rng.random_range(0..=len);
                let mut p2 = rng.random_range(0..len);
                if p2 >= p1 {
                    p2 += 1;
                }
                let (lo, hi) = (p1.min(p2), p1.max(p2));
                for gene in &mut genes[lo..hi] {
                    *gene = random_gene(range, rng);
                }
            }
        }
    }
}

/// Copy `len / 2` distinct, uniformly chosen gene positions from `donor`.
///
/// Splicing a vector with a copy of itself leaves it unchanged.
///
/// # Panics
///
/// Panics if `donor` and `genes` differ in length.
pub fn splice<R: Rng>(genes: &mut [f64], donor: &[f64], rng: &mut R) {
    assert_eq!(
        genes.len(),
        donor.len(),
        "Splice donor length mismatch: expected {}, got {}",
        genes.len(),
        donor.len()
    );
    let len = genes.len();
    for at in index::sample(rng, len, len / 2) {
        genes[at] = donor[at];
    }
}

/// Which genes affect-guided noise disturbs most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoiseMode {
    /// Genes with high affect move toward the fresh value; affect 0 keeps the gene.
    Good,
    /// Genes with low affect move toward the fresh value; affect 1 keeps the gene.
    Bad,
}

impl NoiseMode {
    /// The other mode.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Good => Self::Bad,
            Self::Bad => Self::Good,
        }
    }
}

/// Blend every gene toward a fresh random value by a factor of `affect²`.
///
/// # Panics
///
/// Panics if `affect` and `genes` differ in length.
pub fn affect_noise<R: Rng>(
    genes: &mut [f64],
    affect: &[f64],
    mode: NoiseMode,
    range: f64,
    rng: &mut R,
) {
    assert_eq!(
        genes.len(),
        affect.len(),
        "Affect length mismatch: expected {}, got {}",
        genes.len(),
        affect.len()
    );
    for (gene, &score) in genes.iter_mut().zip(affect) {
        let fresh = random_gene(range, rng);
        let a = score * score;
        *gene = match mode {
            NoiseMode::Good => (*gene).mul_add(1.0 - a, fresh * a),
            NoiseMode::Bad => (*gene).mul_add(a, fresh * (1.0 - a)),
        };
    }
}
