//! Deterministic synthetic health-plan member cohorts.
//!
//! This crate generates reproducible populations of health-plan members for
//! testing analytics pipelines. Every random draw is driven by seeds derived
//! from a single master seed, so the same master seed always produces the
//! same cohort.
//!
//! # Overview
//!
//! The crate supports:
//!
//! - Hierarchical seed derivation with [`SeedManager`]
//! - Seeded samplers: [`WeightedChoice`], [`UniformDistribution`],
//!   [`NormalDistribution`] and [`AgeDistribution`]
//! - Demographic targets with [`CohortConstraints`], loadable from JSON
//! - Lazy cohort generation with [`CohortGenerator`] over any
//!   [`EntityFactory`], including the bundled [`MemberFactory`]
//!
//! # Example
//!
//! ```
//! use membersim::{CohortConstraints, CohortGenerator, EntityRequest};
//!
//! let factory = |request: &EntityRequest| {
//!     Ok::<_, std::convert::Infallible>((request.gender.clone(), request.min_age))
//! };
//! let mut generator = CohortGenerator::new(factory, CohortConstraints::default(), Some(42))
//!     .expect("default constraints are valid");
//!
//! let cohort: Vec<_> = generator.generate(10).collect();
//! assert_eq!(cohort.len(), 10);
//! ```

mod atomic_io;
mod cohort;
pub mod cohort_cli;
mod constraints;
mod distributions;
mod error;
mod member;
mod seed_manager;

pub use cohort::{
    Cohort, CohortGenerator, CohortProgress, EntityFactory, EntityRequest, PROGRESS_INTERVAL,
    age_band_range,
};
pub use constraints::{CohortConstraints, SUM_TOLERANCE};
pub use distributions::{
    AgeBand, AgeBandWeights, AgeDistribution, NormalDistribution, UniformDistribution,
    WeightedChoice,
};
pub use error::{CohortError, ConstraintsError, DistributionError, EntityError, MemberError};
pub use member::{
    MemberFactory, RELATIONSHIP_CHILD, RELATIONSHIP_SELF, RELATIONSHIP_SPOUSE, SyntheticMember,
};
pub use seed_manager::{DEFAULT_MASTER_SEED, SeedManager};
