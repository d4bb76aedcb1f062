//! Synthetic health-plan members.
//!
//! [`MemberFactory`] is an [`EntityFactory`] that turns each
//! [`EntityRequest`] into a [`SyntheticMember`]. All randomness for a member
//! comes from a ChaCha8 stream seeded with the request seed, so a member
//! depends only on its request.

use fake::Fake;
use fake::faker::name::raw::{FirstName, LastName};
use fake::locales::EN;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::cohort::{EntityFactory, EntityRequest};
use crate::error::MemberError;

/// Relationship code of a subscriber.
pub const RELATIONSHIP_SELF: &str = "18";

/// Relationship code of a subscriber's spouse.
pub const RELATIONSHIP_SPOUSE: &str = "01";

/// Relationship code of a subscriber's child.
pub const RELATIONSHIP_CHILD: &str = "19";

/// Share of members who are subscribers.
const SELF_SHARE: f64 = 0.60;

/// Cumulative share of subscribers and spouses.
const SELF_OR_SPOUSE_SHARE: f64 = 0.85;

/// Number of distinct employer groups.
const GROUP_COUNT: u32 = 100;

/// Latest coverage start, in days before the reference date.
const MAX_COVERAGE_OFFSET_DAYS: u32 = 1095;

/// A generated health-plan member record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticMember {
    /// Member identifier (`MEM000001`, ...).
    pub member_id: String,
    /// Given name.
    pub given_name: String,
    /// Family name.
    pub family_name: String,
    /// Gender label from the request.
    pub gender: String,
    /// Age in years.
    pub age: u32,
    /// Benefit plan code.
    pub plan_code: String,
    /// `18` self, `01` spouse, `19` child.
    pub relationship_code: String,
    /// Employer group identifier (`GRP001`, ...).
    pub group_id: String,
    /// State code, when the cohort declares states.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Days between coverage start and the reference date.
    pub coverage_start_offset_days: u32,
}

impl SyntheticMember {
    /// Returns `true` when the member is the subscriber.
    #[must_use]
    pub fn is_subscriber(&self) -> bool {
        self.relationship_code == RELATIONSHIP_SELF
    }
}

/// Builds [`SyntheticMember`]s from cohort requests.
///
/// Member identifiers are numbered in creation order. The overrides
/// `member_id`, `group_id` and `relationship_code` replace the generated
/// values and must be strings.
///
/// # Example
///
/// ```
/// use membersim::{CohortConstraints, CohortGenerator, MemberFactory};
///
/// let mut generator =
///     CohortGenerator::new(MemberFactory::default(), CohortConstraints::default(), Some(42))
///         .expect("valid constraints");
///
/// let members: Vec<_> = generator.generate(3).collect();
/// assert_eq!(members.len(), 3);
/// assert_eq!(members[0].member_id, "MEM000001");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemberFactory {
    created: u64,
}

impl MemberFactory {
    /// Returns the number of members created so far.
    #[must_use]
    pub const fn created(&self) -> u64 {
        self.created
    }
}

impl EntityFactory for MemberFactory {
    type Entity = SyntheticMember;
    type Error = MemberError;

    fn create(&mut self, request: &EntityRequest) -> Result<SyntheticMember, MemberError> {
        if request.min_age > request.max_age {
            return Err(MemberError::InvalidAgeRange {
                min_age: request.min_age,
                max_age: request.max_age,
            });
        }
        let member_id = string_override(request, "member_id")?;
        let group_id = string_override(request, "group_id")?;
        let relationship_code = string_override(request, "relationship_code")?;

        // Draw every value so overrides do not shift the stream.
        let mut rng = ChaCha8Rng::seed_from_u64(request.seed);
        let given_name: String = FirstName(EN).fake_with_rng(&mut rng);
        let family_name: String = LastName(EN).fake_with_rng(&mut rng);
        let age = rng.random_range(request.min_age..=request.max_age);
        let drawn_relationship = pick_relationship(&mut rng);
        let group_number = rng.random_range(1..=GROUP_COUNT);
        let coverage_start_offset_days = rng.random_range(0..=MAX_COVERAGE_OFFSET_DAYS);

        self.created += 1;
        let sequence = self.created;

        Ok(SyntheticMember {
            member_id: member_id.unwrap_or_else(|| format!("MEM{sequence:06}")),
            given_name,
            family_name,
            gender: request.gender.clone(),
            age,
            plan_code: request.plan_type.clone(),
            relationship_code: relationship_code
                .unwrap_or_else(|| drawn_relationship.to_owned()),
            group_id: group_id.unwrap_or_else(|| format!("GRP{group_number:03}")),
            state: request.state.clone(),
            coverage_start_offset_days,
        })
    }
}

fn string_override(request: &EntityRequest, key: &str) -> Result<Option<String>, MemberError> {
    request
        .overrides
        .get(key)
        .map(|value| {
            value
                .as_str()
                .map(str::to_owned)
                .ok_or_else(|| MemberError::InvalidOverride {
                    key: key.to_owned(),
                })
        })
        .transpose()
}

fn pick_relationship(rng: &mut impl Rng) -> &'static str {
    let roll: f64 = rng.random();
    if roll < SELF_SHARE {
        RELATIONSHIP_SELF
    } else if roll < SELF_OR_SPOUSE_SHARE {
        RELATIONSHIP_SPOUSE
    } else {
        RELATIONSHIP_CHILD
    }
}
