//! Demographic constraints for cohort generation.
//!
//! Constraints are categorical distributions (label to probability weight)
//! that the cohort generator samples from. They may be built in code or
//! loaded from a JSON document such as:
//!
//! ```json
//! {
//!     "genderDistribution": {"F": 0.55, "M": 0.45},
//!     "planDistribution": {"HMO": 0.4, "PPO": 0.6},
//!     "stateDistribution": {"MA": 0.5, "NY": 0.5}
//! }
//! ```
//!
//! Omitted distributions fall back to the defaults.

use std::collections::BTreeMap;

use camino::Utf8Path;
use cap_std::fs::Dir;
use serde::{Deserialize, Serialize};

use crate::error::ConstraintsError;

/// Allowed distance between a distribution's total and 1.0.
pub const SUM_TOLERANCE: f64 = 0.01;

/// Target proportions for a generated cohort.
///
/// Every distribution should sum to 1.0 within [`SUM_TOLERANCE`]; call
/// [`CohortConstraints::validate`] to list the ones that do not.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
///
/// use membersim::CohortConstraints;
///
/// let constraints = CohortConstraints {
///     gender_distribution: BTreeMap::from([("F".to_owned(), 0.3), ("M".to_owned(), 0.3)]),
///     ..CohortConstraints::default()
/// };
///
/// let violations = constraints.validate();
/// assert_eq!(violations.len(), 1);
/// assert!(violations[0].contains("gender"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortConstraints {
    /// Gender label to weight.
    #[serde(default = "default_gender_distribution")]
    pub gender_distribution: BTreeMap<String, f64>,
    /// Age band label (for example `18-34`) to weight.
    #[serde(default = "default_age_distribution")]
    pub age_distribution: BTreeMap<String, f64>,
    /// Plan type label to weight.
    #[serde(default = "default_plan_distribution")]
    pub plan_distribution: BTreeMap<String, f64>,
    /// Optional state code to weight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_distribution: Option<BTreeMap<String, f64>>,
}

impl Default for CohortConstraints {
    fn default() -> Self {
        Self {
            gender_distribution: default_gender_distribution(),
            age_distribution: default_age_distribution(),
            plan_distribution: default_plan_distribution(),
            state_distribution: None,
        }
    }
}

impl CohortConstraints {
    /// Parses constraints from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintsError::ParseError`] if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, ConstraintsError> {
        serde_json::from_str(json).map_err(|e| ConstraintsError::ParseError {
            message: e.to_string(),
        })
    }

    /// Loads constraints from a JSON file relative to `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintsError`] if the file cannot be read or parsed.
    pub fn from_file(dir: &Dir, path: &Utf8Path) -> Result<Self, ConstraintsError> {
        let contents = dir
            .read_to_string(path)
            .map_err(|e| ConstraintsError::IoError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        Self::from_json(&contents)
    }

    /// Lists every distribution whose weights do not sum to 1.0.
    ///
    /// Distributions are checked in a fixed order (gender, age, plan, state)
    /// and all violations are returned, not just the first.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut named = vec![
            ("gender", &self.gender_distribution),
            ("age", &self.age_distribution),
            ("plan", &self.plan_distribution),
        ];
        if let Some(states) = &self.state_distribution {
            named.push(("state", states));
        }

        named
            .into_iter()
            .filter_map(|(name, distribution)| {
                let total = total_weight(distribution);
                (!sums_to_one(total))
                    .then(|| format!("{name} distribution sums to {total}, should be 1.0"))
            })
            .collect()
    }
}

#[expect(
    clippy::float_arithmetic,
    reason = "weights are summed as floats"
)]
fn total_weight(distribution: &BTreeMap<String, f64>) -> f64 {
    distribution.values().fold(0.0, |total, weight| total + weight)
}

#[expect(
    clippy::float_arithmetic,
    reason = "tolerance check compares a float total against 1.0"
)]
fn sums_to_one(total: f64) -> bool {
    (total - 1.0).abs() <= SUM_TOLERANCE
}

fn categories<const N: usize>(entries: [(&str, f64); N]) -> BTreeMap<String, f64> {
    entries
        .into_iter()
        .map(|(label, weight)| (label.to_owned(), weight))
        .collect()
}

fn default_gender_distribution() -> BTreeMap<String, f64> {
    categories([("M", 0.49), ("F", 0.51)])
}

fn default_age_distribution() -> BTreeMap<String, f64> {
    categories([
        ("0-17", 0.10),
        ("18-34", 0.20),
        ("35-54", 0.35),
        ("55-64", 0.20),
        ("65+", 0.15),
    ])
}

fn default_plan_distribution() -> BTreeMap<String, f64> {
    categories([("HMO", 0.35), ("PPO", 0.40), ("HDHP", 0.25)])
}
