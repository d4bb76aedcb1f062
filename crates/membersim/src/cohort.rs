//! Cohort generation with demographic constraints.
//!
//! A [`CohortGenerator`] repeatedly calls a caller-supplied
//! [`EntityFactory`], handing it a deterministic seed and demographic
//! attributes drawn from the configured [`CohortConstraints`]. Generation is
//! lazy: [`CohortGenerator::generate`] returns an iterator that builds each
//! entity only when it is pulled, so a caller may stop early at no cost.
//!
//! A failed entity never aborts a run. The failure is logged, counted in
//! [`CohortProgress::failed`], and generation moves on to the next index.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

use crate::constraints::CohortConstraints;
use crate::distributions::WeightedChoice;
use crate::error::{CohortError, EntityError};
use crate::seed_manager::{DEFAULT_MASTER_SEED, SeedManager};

/// Number of processed entities between progress reports.
pub const PROGRESS_INTERVAL: usize = 100;

/// Counters for one [`CohortGenerator::generate`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CohortProgress {
    /// Number of entities requested.
    pub total: usize,
    /// Entities produced successfully.
    pub completed: usize,
    /// Entities skipped after a failure.
    pub failed: usize,
}

impl CohortProgress {
    /// Creates progress for a run of `total` entities.
    #[must_use]
    pub const fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            failed: 0,
        }
    }

    /// Returns `completed / total * 100`, or 0 for an empty run.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        clippy::float_arithmetic,
        reason = "percentages are reported as floats"
    )]
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }

    /// Returns `true` once every requested entity succeeded or failed.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.completed + self.failed >= self.total
    }
}

/// Arguments passed to an [`EntityFactory`] for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRequest {
    /// Deterministic seed for this entity's own randomness.
    pub seed: u64,
    /// Gender label drawn from the constraints.
    pub gender: String,
    /// Plan type label drawn from the constraints.
    pub plan_type: String,
    /// Lowest age allowed by the drawn age band.
    pub min_age: u32,
    /// Highest age allowed by the drawn age band.
    pub max_age: u32,
    /// State code, when the constraints declare a state distribution.
    pub state: Option<String>,
    /// Caller-defined fields copied into every request.
    pub overrides: BTreeMap<String, Value>,
}

/// Builds one entity from an [`EntityRequest`].
///
/// Returning an error marks only this entity as failed. Any
/// `FnMut(&EntityRequest) -> Result<T, E>` closure is a factory.
pub trait EntityFactory {
    /// The entity type produced.
    type Entity;
    /// The failure type reported for a single entity.
    type Error: fmt::Display;

    /// Builds the entity described by `request`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] when this entity cannot be generated.
    fn create(&mut self, request: &EntityRequest) -> Result<Self::Entity, Self::Error>;
}

impl<F, T, E> EntityFactory for F
where
    F: FnMut(&EntityRequest) -> Result<T, E>,
    E: fmt::Display,
{
    type Entity = T;
    type Error = E;

    fn create(&mut self, request: &EntityRequest) -> Result<T, E> {
        self(request)
    }
}

type ProgressCallback<'a> = Box<dyn FnMut(&CohortProgress) + 'a>;

/// Generates cohorts of entities that follow demographic constraints.
///
/// Gender and plan streams live as long as the generator, while the age band
/// stream restarts from the `age` seed on every [`Self::generate`] call. Two
/// generators built with the same seed and constraints therefore produce the
/// same sequence of requests.
///
/// # Example
///
/// ```
/// use std::convert::Infallible;
///
/// use membersim::{CohortConstraints, CohortGenerator, EntityRequest};
///
/// let factory = |request: &EntityRequest| -> Result<u64, Infallible> { Ok(request.seed) };
/// let mut generator =
///     CohortGenerator::new(factory, CohortConstraints::default(), Some(42)).expect("valid");
///
/// let seeds: Vec<u64> = generator.generate(10).collect();
/// assert_eq!(seeds.len(), 10);
/// ```
pub struct CohortGenerator<'a, F> {
    factory: F,
    constraints: CohortConstraints,
    seed_manager: SeedManager,
    gender_choice: WeightedChoice<String>,
    plan_choice: WeightedChoice<String>,
    age_choice: WeightedChoice<String>,
    state_choice: Option<WeightedChoice<String>>,
    overrides: BTreeMap<String, Value>,
    progress_callback: Option<ProgressCallback<'a>>,
}

impl<'a, F: EntityFactory> CohortGenerator<'a, F> {
    /// Creates a generator rooted at `seed`, or [`DEFAULT_MASTER_SEED`].
    ///
    /// # Errors
    ///
    /// Returns [`CohortError::InvalidConstraints`] listing every violation
    /// when the constraints do not validate, or [`CohortError::Distribution`]
    /// when a distribution cannot be sampled.
    pub fn new(
        factory: F,
        constraints: CohortConstraints,
        seed: Option<u64>,
    ) -> Result<Self, CohortError> {
        let seed_manager = SeedManager::new(seed.unwrap_or(DEFAULT_MASTER_SEED));
        Self::with_seed_manager(factory, constraints, seed_manager)
    }

    /// Creates a generator that derives all seeds from `seed_manager`.
    ///
    /// Use a [`SeedManager::child_manager`] per worker to split one run
    /// across threads or processes reproducibly.
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn with_seed_manager(
        factory: F,
        constraints: CohortConstraints,
        mut seed_manager: SeedManager,
    ) -> Result<Self, CohortError> {
        let violations = constraints.validate();
        if !violations.is_empty() {
            return Err(CohortError::InvalidConstraints { violations });
        }

        let gender_choice = choice_from(
            &constraints.gender_distribution,
            seed_manager.get_seed("gender"),
        )?;
        let plan_choice =
            choice_from(&constraints.plan_distribution, seed_manager.get_seed("plan"))?;
        let age_choice = choice_from(&constraints.age_distribution, seed_manager.get_seed("age"))?;
        let state_choice = constraints
            .state_distribution
            .as_ref()
            .map(|states| choice_from(states, seed_manager.get_seed("state")))
            .transpose()?;

        Ok(Self {
            factory,
            constraints,
            seed_manager,
            gender_choice,
            plan_choice,
            age_choice,
            state_choice,
            overrides: BTreeMap::new(),
            progress_callback: None,
        })
    }

    /// Registers a callback invoked every [`PROGRESS_INTERVAL`] entities and
    /// once when a run ends.
    ///
    /// The callback runs synchronously. A panic inside it aborts the run.
    #[must_use]
    pub fn with_progress_callback(
        mut self,
        callback: impl FnMut(&CohortProgress) + 'a,
    ) -> Self {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Sets extra fields copied into every [`EntityRequest::overrides`].
    #[must_use]
    pub fn with_overrides(mut self, overrides: BTreeMap<String, Value>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Returns the validated constraints.
    #[must_use]
    pub const fn constraints(&self) -> &CohortConstraints {
        &self.constraints
    }

    /// Returns the seed manager used for per-entity seeds.
    #[must_use]
    pub const fn seed_manager(&self) -> &SeedManager {
        &self.seed_manager
    }

    /// Lazily generates up to `count` entities.
    ///
    /// For each index the generator draws gender, plan type and age band (in
    /// that order), then the state if configured, derives the seed
    /// `entity_{index}`, and calls the factory. Failed entities are skipped.
    pub fn generate(&mut self, count: usize) -> Cohort<'_, 'a, F> {
        debug!(count, "generating cohort");
        let age_seed = self.seed_manager.get_seed("age");
        let age_choice = self.age_choice.reseeded(age_seed);
        Cohort {
            generator: self,
            age_choice,
            progress: CohortProgress::new(count),
            next_index: 0,
            is_finished: false,
        }
    }
}

fn choice_from(
    distribution: &BTreeMap<String, f64>,
    seed: u64,
) -> Result<WeightedChoice<String>, CohortError> {
    let choices = distribution
        .iter()
        .map(|(label, weight)| (label.clone(), *weight));
    Ok(WeightedChoice::new(choices, Some(seed))?)
}

/// Maps an age band label to its inclusive age range.
///
/// # Errors
///
/// Returns [`EntityError::UnknownAgeBand`] for labels outside the fixed
/// table (`0-17`, `18-34`, `35-54`, `55-64`, `65+`).
pub fn age_band_range(label: &str) -> Result<(u32, u32), EntityError> {
    match label {
        "0-17" => Ok((0, 17)),
        "18-34" => Ok((18, 34)),
        "35-54" => Ok((35, 54)),
        "55-64" => Ok((55, 64)),
        "65+" => Ok((65, 90)),
        _ => Err(EntityError::UnknownAgeBand {
            label: label.to_owned(),
        }),
    }
}

/// Lazy, one-shot sequence of entities produced by
/// [`CohortGenerator::generate`].
pub struct Cohort<'g, 'a, F> {
    generator: &'g mut CohortGenerator<'a, F>,
    age_choice: WeightedChoice<String>,
    progress: CohortProgress,
    next_index: usize,
    is_finished: bool,
}

impl<F: EntityFactory> Cohort<'_, '_, F> {
    /// Returns the counters for this run so far.
    #[must_use]
    pub const fn progress(&self) -> CohortProgress {
        self.progress
    }

    fn generate_one(&mut self, index: usize) -> Result<F::Entity, EntityError> {
        let generator = &mut *self.generator;
        let gender = generator.gender_choice.select();
        let plan_type = generator.plan_choice.select();
        let age_band = self.age_choice.select();
        let state = generator.state_choice.as_mut().map(WeightedChoice::select);
        let (min_age, max_age) = age_band_range(&age_band)?;

        let seed = generator.seed_manager.get_seed(&format!("entity_{index}"));
        let request = EntityRequest {
            seed,
            gender,
            plan_type,
            min_age,
            max_age,
            state,
            overrides: generator.overrides.clone(),
        };

        generator
            .factory
            .create(&request)
            .map_err(|err| EntityError::Factory {
                message: err.to_string(),
            })
    }

    #[expect(
        clippy::integer_division_remainder_used,
        reason = "progress is reported on fixed index boundaries"
    )]
    fn report_at_interval(&mut self, index: usize) {
        if (index + 1) % PROGRESS_INTERVAL == 0 {
            self.report();
        }
    }

    fn report(&mut self) {
        debug!(
            completed = self.progress.completed,
            failed = self.progress.failed,
            total = self.progress.total,
            "cohort progress"
        );
        if let Some(callback) = self.generator.progress_callback.as_mut() {
            callback(&self.progress);
        }
    }
}

impl<F: EntityFactory> Iterator for Cohort<'_, '_, F> {
    type Item = F::Entity;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_index < self.progress.total {
            let index = self.next_index;
            self.next_index += 1;

            match self.generate_one(index) {
                Ok(entity) => {
                    self.progress.completed += 1;
                    self.report_at_interval(index);
                    return Some(entity);
                }
                Err(err) => {
                    warn!(index, error = %err, "failed to generate entity");
                    self.progress.failed += 1;
                    self.report_at_interval(index);
                }
            }
        }

        if !self.is_finished {
            self.is_finished = true;
            self.report();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use rstest::rstest;

    use super::*;

    fn echo(request: &EntityRequest) -> Result<EntityRequest, Infallible> {
        Ok(request.clone())
    }

    fn constraints_with_age(age: &[(&str, f64)]) -> CohortConstraints {
        CohortConstraints {
            age_distribution: age
                .iter()
                .map(|(label, weight)| ((*label).to_owned(), *weight))
                .collect(),
            ..CohortConstraints::default()
        }
    }

    #[test]
    fn percent_complete_is_a_percentage() {
        let progress = CohortProgress {
            total: 100,
            completed: 50,
            failed: 0,
        };
        assert!((progress.percent_complete() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn percent_complete_is_zero_for_empty_runs() {
        assert!(CohortProgress::new(0).percent_complete().abs() < f64::EPSILON);
    }

    #[rstest]
    #[case(10, 8, 2, true)]
    #[case(10, 5, 0, false)]
    #[case(0, 0, 0, true)]
    fn is_complete_counts_failures(
        #[case] total: usize,
        #[case] completed: usize,
        #[case] failed: usize,
        #[case] expected: bool,
    ) {
        let progress = CohortProgress {
            total,
            completed,
            failed,
        };
        assert_eq!(progress.is_complete(), expected);
    }

    #[rstest]
    #[case("0-17", (0, 17))]
    #[case("18-34", (18, 34))]
    #[case("35-54", (35, 54))]
    #[case("55-64", (55, 64))]
    #[case("65+", (65, 90))]
    fn maps_known_age_bands(#[case] label: &str, #[case] expected: (u32, u32)) {
        assert_eq!(age_band_range(label), Ok(expected));
    }

    #[test]
    fn rejects_unknown_age_band() {
        assert_eq!(
            age_band_range("90-99"),
            Err(EntityError::UnknownAgeBand {
                label: "90-99".to_owned()
            })
        );
    }

    #[test]
    fn generates_requested_count() {
        let mut generator =
            CohortGenerator::new(echo, CohortConstraints::default(), Some(42)).expect("valid");

        assert_eq!(generator.generate(100).count(), 100);
    }

    #[test]
    fn same_seed_reproduces_requests() {
        let mut first =
            CohortGenerator::new(echo, CohortConstraints::default(), Some(42)).expect("valid");
        let mut second =
            CohortGenerator::new(echo, CohortConstraints::default(), Some(42)).expect("valid");

        let one: Vec<EntityRequest> = first.generate(50).collect();
        let two: Vec<EntityRequest> = second.generate(50).collect();

        assert_eq!(one, two);
    }

    #[test]
    fn different_seeds_change_requests() {
        let mut first =
            CohortGenerator::new(echo, CohortConstraints::default(), Some(1)).expect("valid");
        let mut second =
            CohortGenerator::new(echo, CohortConstraints::default(), Some(2)).expect("valid");

        let one: Vec<u64> = first.generate(5).map(|request| request.seed).collect();
        let two: Vec<u64> = second.generate(5).map(|request| request.seed).collect();

        assert_ne!(one, two);
    }

    #[test]
    fn requests_carry_entity_seeds_and_band_ranges() {
        let mut generator =
            CohortGenerator::new(echo, CohortConstraints::default(), Some(42)).expect("valid");
        let requests: Vec<EntityRequest> = generator.generate(20).collect();
        let mut manager = SeedManager::new(42);

        for (index, request) in requests.iter().enumerate() {
            assert_eq!(request.seed, manager.get_seed(&format!("entity_{index}")));
            assert!(request.min_age <= request.max_age);
            assert!(["F", "M"].contains(&request.gender.as_str()));
            assert!(["HDHP", "HMO", "PPO"].contains(&request.plan_type.as_str()));
            assert!(request.state.is_none());
        }
    }

    #[test]
    fn invalid_constraints_fail_construction_with_every_violation() {
        let constraints = CohortConstraints {
            gender_distribution: BTreeMap::from([("M".to_owned(), 0.3), ("F".to_owned(), 0.3)]),
            plan_distribution: BTreeMap::from([("PPO".to_owned(), 0.5)]),
            ..CohortConstraints::default()
        };

        let result = CohortGenerator::new(echo, constraints, Some(42));

        let Err(CohortError::InvalidConstraints { violations }) = result else {
            panic!("expected invalid constraints");
        };
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn factory_failures_are_counted_and_skipped() {
        let mut calls = 0_usize;
        let factory = move |request: &EntityRequest| {
            calls += 1;
            if calls == 4 {
                Err("edge-case date arithmetic")
            } else {
                Ok(request.seed)
            }
        };
        let mut generator =
            CohortGenerator::new(factory, CohortConstraints::default(), Some(42)).expect("valid");

        let mut cohort = generator.generate(10);
        let produced = cohort.by_ref().count();
        let progress = cohort.progress();

        assert_eq!(produced, 9);
        assert_eq!(progress.completed, 9);
        assert_eq!(progress.failed, 1);
        assert!(progress.is_complete());
    }

    #[test]
    fn unknown_age_bands_fail_each_entity() {
        let constraints = constraints_with_age(&[("90-99", 1.0)]);
        let mut generator = CohortGenerator::new(echo, constraints, Some(42)).expect("valid");

        let mut cohort = generator.generate(5);
        assert_eq!(cohort.by_ref().count(), 0);
        assert_eq!(
            cohort.progress(),
            CohortProgress {
                total: 5,
                completed: 0,
                failed: 5,
            }
        );
    }

    #[test]
    fn progress_is_reported_at_intervals_and_at_the_end() {
        let mut reports = Vec::new();
        {
            let mut generator = CohortGenerator::new(echo, CohortConstraints::default(), Some(42))
                .expect("valid")
                .with_progress_callback(|progress| reports.push(progress.completed));
            assert_eq!(generator.generate(250).count(), 250);
        }

        assert_eq!(reports, vec![100, 200, 250]);
    }

    #[test]
    fn stopping_early_skips_the_final_report() {
        let mut reports = 0_usize;
        {
            let mut generator = CohortGenerator::new(echo, CohortConstraints::default(), Some(42))
                .expect("valid")
                .with_progress_callback(|_| reports += 1);
            assert_eq!(generator.generate(1000).take(10).count(), 10);
        }

        assert_eq!(reports, 0);
    }

    #[test]
    fn state_distribution_adds_a_state_draw() {
        let constraints = CohortConstraints {
            state_distribution: Some(BTreeMap::from([
                ("MA".to_owned(), 0.5),
                ("NY".to_owned(), 0.5),
            ])),
            ..CohortConstraints::default()
        };
        let mut with_state =
            CohortGenerator::new(echo, constraints, Some(42)).expect("valid");
        let mut without_state =
            CohortGenerator::new(echo, CohortConstraints::default(), Some(42)).expect("valid");

        let stated: Vec<EntityRequest> = with_state.generate(20).collect();
        let plain: Vec<EntityRequest> = without_state.generate(20).collect();

        for (with, without) in stated.iter().zip(&plain) {
            assert!(matches!(with.state.as_deref(), Some("MA" | "NY")));
            assert_eq!(with.gender, without.gender);
            assert_eq!(with.plan_type, without.plan_type);
            assert_eq!((with.min_age, with.max_age), (without.min_age, without.max_age));
        }
    }

    #[test]
    fn overrides_are_copied_into_every_request() {
        let overrides = BTreeMap::from([("group_id".to_owned(), Value::from("GRP007"))]);
        let mut generator = CohortGenerator::new(echo, CohortConstraints::default(), Some(42))
            .expect("valid")
            .with_overrides(overrides.clone());

        assert!(generator.generate(5).all(|request| request.overrides == overrides));
    }

    #[test]
    fn age_stream_restarts_on_each_generate_call() {
        let mut generator =
            CohortGenerator::new(echo, CohortConstraints::default(), Some(42)).expect("valid");

        let first: Vec<(u32, u32)> = generator
            .generate(30)
            .map(|request| (request.min_age, request.max_age))
            .collect();
        let second: Vec<(u32, u32)> = generator
            .generate(30)
            .map(|request| (request.min_age, request.max_age))
            .collect();

        assert_eq!(first, second);
    }
}
