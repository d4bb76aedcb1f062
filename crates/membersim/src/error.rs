//! Error types for the membersim crate.
//!
//! Construction-time failures (`DistributionError`, `CohortError`) are fatal
//! and never retried. `EntityError` describes a single failed entity inside a
//! cohort run; the generator logs and counts it, and carries on.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while constructing a sampler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistributionError {
    /// The choice sequence was empty.
    #[error("choices cannot be empty")]
    EmptyChoices,

    /// A weight was below zero.
    #[error("weights cannot be negative (index {index}: {weight})")]
    NegativeWeight {
        /// Position of the offending choice.
        index: usize,
        /// The negative weight.
        weight: f64,
    },

    /// A weight was NaN or infinite.
    #[error("weights must be finite (index {index})")]
    NonFiniteWeight {
        /// Position of the offending choice.
        index: usize,
    },

    /// All weights were zero.
    #[error("total weight cannot be zero")]
    ZeroTotalWeight,

    /// The weights sum to a value too large to represent.
    #[error("total weight overflows")]
    TotalWeightOverflow,

    /// The weighted sampler rejected the weights for another reason.
    #[error("invalid weights: {message}")]
    RejectedWeights {
        /// Sampler error message.
        message: String,
    },

    /// A range had its lower bound above its upper bound.
    #[error("range minimum {min} exceeds maximum {max}")]
    InvertedRange {
        /// Lower bound supplied by the caller.
        min: f64,
        /// Upper bound supplied by the caller.
        max: f64,
    },

    /// A range bound was NaN or infinite.
    #[error("range bounds must be finite")]
    NonFiniteBound,

    /// The range is too wide to sample from.
    #[error("range {min} to {max} is too wide to sample")]
    RangeTooWide {
        /// Lower bound supplied by the caller.
        min: f64,
        /// Upper bound supplied by the caller.
        max: f64,
    },

    /// The standard deviation was rejected by the normal sampler.
    #[error("invalid standard deviation: {std_dev}")]
    InvalidStdDev {
        /// The rejected standard deviation.
        std_dev: f64,
    },

    /// Clipping the age bands to the caller's bounds removed every band.
    #[error("no valid age bands for range {min_age}-{max_age}")]
    NoValidAgeBands {
        /// Requested minimum age.
        min_age: u32,
        /// Requested maximum age.
        max_age: u32,
    },
}

/// Errors raised while constructing a cohort generator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CohortError {
    /// One or more constraint distributions failed validation.
    #[error("invalid constraints: {}", violations.join("; "))]
    InvalidConstraints {
        /// Every violation found, in validation order.
        violations: Vec<String>,
    },

    /// A constraint distribution could not be turned into a sampler.
    #[error("invalid distribution: {0}")]
    Distribution(#[from] DistributionError),
}

/// A single entity that could not be generated.
///
/// Produced inside a cohort run and never returned to the caller; the
/// generator records it in [`crate::CohortProgress::failed`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    /// The age band label has no known age range.
    #[error("unknown age band: {label}")]
    UnknownAgeBand {
        /// The unrecognised label.
        label: String,
    },

    /// The entity factory reported a failure.
    #[error("entity factory failed: {message}")]
    Factory {
        /// Rendered factory error.
        message: String,
    },
}

/// Errors raised by [`crate::MemberFactory`] for a single member.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemberError {
    /// The requested age range is empty.
    #[error("invalid age range {min_age}-{max_age}")]
    InvalidAgeRange {
        /// Requested minimum age.
        min_age: u32,
        /// Requested maximum age.
        max_age: u32,
    },

    /// An override was supplied with a non-string value.
    #[error("override '{key}' must be a string")]
    InvalidOverride {
        /// Override key.
        key: String,
    },
}

/// Errors raised while loading cohort constraints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintsError {
    /// The constraints file could not be read.
    #[error("failed to read constraints file at '{path}': {message}")]
    IoError {
        /// Path to the constraints file.
        path: Utf8PathBuf,
        /// Description of the I/O error.
        message: String,
    },

    /// The constraints JSON is malformed.
    #[error("invalid constraints JSON: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(DistributionError::EmptyChoices, "choices cannot be empty")]
    #[case(DistributionError::ZeroTotalWeight, "total weight cannot be zero")]
    #[case(
        DistributionError::NegativeWeight { index: 1, weight: -0.5 },
        "weights cannot be negative (index 1: -0.5)"
    )]
    #[case(DistributionError::TotalWeightOverflow, "total weight overflows")]
    #[case(
        DistributionError::RangeTooWide { min: -1.5, max: 2.5 },
        "range -1.5 to 2.5 is too wide to sample"
    )]
    #[case(
        DistributionError::NoValidAgeBands { min_age: 101, max_age: 120 },
        "no valid age bands for range 101-120"
    )]
    fn distribution_errors_format_correctly(
        #[case] err: DistributionError,
        #[case] expected: &str,
    ) {
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn invalid_constraints_lists_every_violation() {
        let err = CohortError::InvalidConstraints {
            violations: vec![
                "gender distribution sums to 0.6, should be 1.0".to_owned(),
                "plan distribution sums to 0.5, should be 1.0".to_owned(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "invalid constraints: gender distribution sums to 0.6, should be 1.0; \
             plan distribution sums to 0.5, should be 1.0"
        );
    }

    #[test]
    fn cohort_error_wraps_distribution_error() {
        let err = CohortError::from(DistributionError::EmptyChoices);
        assert_eq!(err.to_string(), "invalid distribution: choices cannot be empty");
    }

    #[test]
    fn entity_error_unknown_band_formats_correctly() {
        let err = EntityError::UnknownAgeBand {
            label: "90-99".to_owned(),
        };
        assert_eq!(err.to_string(), "unknown age band: 90-99");
    }

    #[test]
    fn constraints_error_io_formats_correctly() {
        let err = ConstraintsError::IoError {
            path: Utf8PathBuf::from("/tmp/constraints.json"),
            message: "file not found".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "failed to read constraints file at '/tmp/constraints.json': file not found"
        );
    }
}
