//! Seeded sampling primitives.
//!
//! Every sampler owns its own ChaCha8 stream. Instances share no state, so
//! two samplers built from the same seed replay identical sequences and
//! samplers built from different derived seeds stay decorrelated.

use rand::distr::weighted::{self, WeightedIndex};
use rand::distr::{Distribution, Uniform};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;

use crate::error::DistributionError;

/// Stream used for age draws so they do not replay the band-selection stream.
const AGE_VALUE_STREAM: u64 = 1;

/// Returns a fresh seed for samplers constructed without one.
fn entropy_seed() -> u64 {
    rand::rng().random()
}

fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed.unwrap_or_else(entropy_seed))
}

/// Selects values with probability proportional to their weights.
///
/// Weights need not sum to one; the probability of a value is its weight
/// divided by the total weight.
///
/// # Example
///
/// ```
/// use membersim::WeightedChoice;
///
/// let mut plan = WeightedChoice::new(
///     [("HMO", 0.4), ("PPO", 0.35), ("HDHP", 0.25)],
///     Some(42),
/// )
/// .expect("valid weights");
///
/// assert!(["HMO", "PPO", "HDHP"].contains(&plan.select()));
/// ```
#[derive(Debug, Clone)]
pub struct WeightedChoice<T> {
    values: Vec<T>,
    weights: Vec<f64>,
    index: WeightedIndex<f64>,
    rng: ChaCha8Rng,
}

impl<T: Clone> WeightedChoice<T> {
    /// Builds a sampler over `(value, weight)` pairs.
    ///
    /// A `None` seed draws one from the thread-local generator.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError`] if the choices are empty, any weight is
    /// negative or not finite, every weight is zero, or the weights overflow
    /// when summed.
    pub fn new<I>(choices: I, seed: Option<u64>) -> Result<Self, DistributionError>
    where
        I: IntoIterator<Item = (T, f64)>,
    {
        let (values, weights): (Vec<T>, Vec<f64>) = choices.into_iter().unzip();
        if values.is_empty() {
            return Err(DistributionError::EmptyChoices);
        }
        validate_weights(&weights)?;

        let index = WeightedIndex::new(&weights).map_err(weight_error)?;

        Ok(Self {
            values,
            weights,
            index,
            rng: seeded_rng(seed),
        })
    }

    /// Draws one value.
    #[expect(
        clippy::indexing_slicing,
        reason = "WeightedIndex only yields indices below the number of choices"
    )]
    pub fn select(&mut self) -> T {
        let position = self.index.sample(&mut self.rng);
        self.values[position].clone()
    }

    /// Draws `n` values with replacement from the same stream as [`Self::select`].
    pub fn select_n(&mut self, n: usize) -> Vec<T> {
        (0..n).map(|_| self.select()).collect()
    }

    /// Returns a copy of this sampler restarted on a new seed.
    #[must_use]
    pub fn reseeded(&self, seed: u64) -> Self {
        Self {
            values: self.values.clone(),
            weights: self.weights.clone(),
            index: self.index.clone(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Returns the candidate values in declaration order.
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Returns the weights in declaration order.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

fn validate_weights(weights: &[f64]) -> Result<(), DistributionError> {
    for (index, weight) in weights.iter().copied().enumerate() {
        if weight.is_nan() || weight.is_infinite() {
            return Err(DistributionError::NonFiniteWeight { index });
        }
        if weight < 0.0 {
            return Err(DistributionError::NegativeWeight { index, weight });
        }
    }
    if !weights.iter().any(|weight| *weight > 0.0) {
        return Err(DistributionError::ZeroTotalWeight);
    }
    if !total_weight(weights).is_finite() {
        return Err(DistributionError::TotalWeightOverflow);
    }
    Ok(())
}

#[expect(clippy::float_arithmetic, reason = "weights are summed as floats")]
fn total_weight(weights: &[f64]) -> f64 {
    weights.iter().fold(0.0, |total, weight| total + weight)
}

fn weight_error(err: weighted::Error) -> DistributionError {
    match err {
        weighted::Error::InvalidInput => DistributionError::EmptyChoices,
        weighted::Error::InsufficientNonZero => DistributionError::ZeroTotalWeight,
        weighted::Error::Overflow => DistributionError::TotalWeightOverflow,
        other => DistributionError::RejectedWeights {
            message: other.to_string(),
        },
    }
}

/// Samples uniformly from the closed range `[min_val, max_val]`.
#[derive(Debug, Clone)]
pub struct UniformDistribution {
    min_val: f64,
    max_val: f64,
    uniform: Uniform<f64>,
    rng: ChaCha8Rng,
}

impl UniformDistribution {
    /// Builds a uniform sampler.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError::NonFiniteBound`] for NaN or infinite
    /// bounds, [`DistributionError::InvertedRange`] when `min_val > max_val`
    /// and [`DistributionError::RangeTooWide`] when the width of the range
    /// is not representable.
    pub fn new(min_val: f64, max_val: f64, seed: Option<u64>) -> Result<Self, DistributionError> {
        if !min_val.is_finite() || !max_val.is_finite() {
            return Err(DistributionError::NonFiniteBound);
        }
        if min_val > max_val {
            return Err(DistributionError::InvertedRange {
                min: min_val,
                max: max_val,
            });
        }
        let uniform = Uniform::new_inclusive(min_val, max_val).map_err(|_| {
            DistributionError::RangeTooWide {
                min: min_val,
                max: max_val,
            }
        })?;
        Ok(Self {
            min_val,
            max_val,
            uniform,
            rng: seeded_rng(seed),
        })
    }

    /// Draws a float in `[min_val, max_val]`.
    pub fn sample(&mut self) -> f64 {
        self.uniform.sample(&mut self.rng)
    }

    /// Draws an integer in the bounds truncated toward zero.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "bounds are coerced to integers by truncation"
    )]
    pub fn sample_int(&mut self) -> i64 {
        let low = self.min_val as i64;
        let high = self.max_val as i64;
        self.rng.random_range(low..=high)
    }
}

/// Samples a Gaussian, optionally clamped to a range.
///
/// Out-of-range draws are clamped to the nearest bound rather than
/// resampled, so probability mass beyond a bound piles up on it.
///
/// # Example
///
/// ```
/// use membersim::NormalDistribution;
///
/// let mut bmi = NormalDistribution::new(27.0, 5.0, Some(42))
///     .expect("valid std dev")
///     .with_min(15.0)
///     .with_max(50.0);
///
/// let value = bmi.sample();
/// assert!((15.0..=50.0).contains(&value));
/// ```
#[derive(Debug, Clone)]
pub struct NormalDistribution {
    normal: Normal<f64>,
    min_val: Option<f64>,
    max_val: Option<f64>,
    rng: ChaCha8Rng,
}

impl NormalDistribution {
    /// Builds an unbounded normal sampler.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError::InvalidStdDev`] when `std_dev` is
    /// negative or not finite.
    pub fn new(mean: f64, std_dev: f64, seed: Option<u64>) -> Result<Self, DistributionError> {
        // Normal::new accepts a negative std dev and mirrors the draws.
        if !std_dev.is_finite() || std_dev < 0.0 {
            return Err(DistributionError::InvalidStdDev { std_dev });
        }
        let normal =
            Normal::new(mean, std_dev).map_err(|_| DistributionError::InvalidStdDev { std_dev })?;
        Ok(Self {
            normal,
            min_val: None,
            max_val: None,
            rng: seeded_rng(seed),
        })
    }

    /// Clamps samples to at least `min_val`.
    #[must_use]
    pub const fn with_min(mut self, min_val: f64) -> Self {
        self.min_val = Some(min_val);
        self
    }

    /// Clamps samples to at most `max_val`.
    #[must_use]
    pub const fn with_max(mut self, max_val: f64) -> Self {
        self.max_val = Some(max_val);
        self
    }

    /// Draws one value, applying the lower clamp then the upper clamp.
    pub fn sample(&mut self) -> f64 {
        let mut value = self.normal.sample(&mut self.rng);
        if let Some(min_val) = self.min_val {
            value = value.max(min_val);
        }
        if let Some(max_val) = self.max_val {
            value = value.min(max_val);
        }
        value
    }
}

/// Relative weights of the three health-plan age bands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeBandWeights {
    /// Weight of ages 0-17.
    pub pediatric: f64,
    /// Weight of ages 18-64.
    pub commercial: f64,
    /// Weight of ages 65-100.
    pub medicare: f64,
}

impl Default for AgeBandWeights {
    fn default() -> Self {
        Self {
            pediatric: 0.1,
            commercial: 0.7,
            medicare: 0.2,
        }
    }
}

/// An age band after clipping to the caller's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeBand {
    /// Band name (`pediatric`, `commercial` or `medicare`).
    pub name: &'static str,
    /// Lowest age in the clipped band.
    pub min_age: u32,
    /// Highest age in the clipped band.
    pub max_age: u32,
}

/// Samples ages typical of a health-plan population.
///
/// A band is chosen by weight, then an age is drawn uniformly within it.
/// Bands are clipped to `[min_age, max_age]` and dropped when clipping
/// empties them. Surviving bands keep their configured weights, which the
/// weighted choice normalises over the survivors.
///
/// # Example
///
/// ```
/// use membersim::AgeDistribution;
///
/// let mut ages = AgeDistribution::new(18, 65, Some(42)).expect("bands survive");
/// let age = ages.sample();
/// assert!((18..=65).contains(&age));
/// ```
#[derive(Debug, Clone)]
pub struct AgeDistribution {
    bands: WeightedChoice<AgeBand>,
    rng: ChaCha8Rng,
}

impl AgeDistribution {
    /// Builds an age sampler with the default band weights.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError::NoValidAgeBands`] when no band overlaps
    /// `[min_age, max_age]`.
    pub fn new(min_age: u32, max_age: u32, seed: Option<u64>) -> Result<Self, DistributionError> {
        Self::with_weights(min_age, max_age, AgeBandWeights::default(), seed)
    }

    /// Builds an age sampler with explicit band weights.
    ///
    /// # Errors
    ///
    /// Returns [`DistributionError::NoValidAgeBands`] when no band overlaps
    /// `[min_age, max_age]`, or a weight error when the surviving weights are
    /// invalid.
    pub fn with_weights(
        min_age: u32,
        max_age: u32,
        weights: AgeBandWeights,
        seed: Option<u64>,
    ) -> Result<Self, DistributionError> {
        let definitions = [
            ("pediatric", 0, 17, weights.pediatric),
            ("commercial", 18, 64, weights.commercial),
            ("medicare", 65, 100, weights.medicare),
        ];

        let surviving: Vec<(AgeBand, f64)> = definitions
            .into_iter()
            .filter_map(|(name, band_min, band_max, weight)| {
                let effective_min = band_min.max(min_age);
                let effective_max = band_max.min(max_age);
                (effective_min <= effective_max).then_some((
                    AgeBand {
                        name,
                        min_age: effective_min,
                        max_age: effective_max,
                    },
                    weight,
                ))
            })
            .collect();

        if surviving.is_empty() {
            return Err(DistributionError::NoValidAgeBands { min_age, max_age });
        }

        let seed_value = seed.unwrap_or_else(entropy_seed);
        let bands = WeightedChoice::new(surviving, Some(seed_value))?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed_value);
        rng.set_stream(AGE_VALUE_STREAM);

        Ok(Self { bands, rng })
    }

    /// Returns the bands that survived clipping.
    #[must_use]
    pub fn bands(&self) -> &[AgeBand] {
        self.bands.values()
    }

    /// Draws one age.
    pub fn sample(&mut self) -> u32 {
        let band = self.bands.select();
        self.rng.random_range(band.min_age..=band.max_age)
    }
}
