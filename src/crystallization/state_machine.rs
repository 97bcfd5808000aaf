//! Lifecycle transition rules
//!
//! ```text
//! generated ──> under-review ──> approved ──> crystallized
//!                 ^      │          │              │
//!                 │      v          v              │
//!               needs-changes <─────┘              │
//!  (any state except deprecated) ──────────────> deprecated
//! ```
//!
//! Editing an approved or crystallized test sends it back to `under-review`:
//!
//! ```text
//! approved | crystallized ──(content changed)──> under-review
//! ```
//!
//! Everything here is pure; the registry applies the outcome.

use crate::error::{CrystallizationError, UnmetCondition};
use crate::models::{
    CrystallizationConfig, CrystallizationStatus, CrystallizedTest, ReviewDecision,
};

/// Statuses reachable in one step from `from`
pub fn allowed_transitions(from: CrystallizationStatus) -> &'static [CrystallizationStatus] {
    use CrystallizationStatus::*;
    match from {
        Generated => &[UnderReview, Deprecated],
        UnderReview => &[Approved, NeedsChanges, Deprecated],
        NeedsChanges => &[UnderReview, Deprecated],
        Approved => &[Crystallized, UnderReview, NeedsChanges, Deprecated],
        Crystallized => &[UnderReview, Deprecated],
        Deprecated => &[],
    }
}

pub fn validate_transition(
    from: CrystallizationStatus,
    to: CrystallizationStatus,
) -> Result<(), CrystallizationError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(CrystallizationError::IllegalTransition { from, to })
    }
}

/// Status a record enters when a review starts
///
/// `generated` and `needs-changes` move to `under-review`; records already
/// in review (or approved and collecting further reviews) stay put.
pub fn review_entry(current: CrystallizationStatus) -> Result<CrystallizationStatus, CrystallizationError> {
    use CrystallizationStatus::*;
    match current {
        Generated | NeedsChanges => {
            validate_transition(current, UnderReview)?;
            Ok(UnderReview)
        }
        UnderReview | Approved => Ok(current),
        Crystallized | Deprecated => Err(CrystallizationError::IllegalTransition {
            from: current,
            to: UnderReview,
        }),
    }
}

/// Status a record falls back to once its reviewed content is edited
pub fn reopened_status(current: CrystallizationStatus) -> Option<CrystallizationStatus> {
    use CrystallizationStatus::*;
    match current {
        Approved | Crystallized => Some(UnderReview),
        Generated | UnderReview | NeedsChanges | Deprecated => None,
    }
}

/// Status after recording `decision` on a record in `current`
pub fn review_outcome(
    current: CrystallizationStatus,
    decision: ReviewDecision,
) -> Result<CrystallizationStatus, CrystallizationError> {
    let entry = review_entry(current)?;
    let target = match decision {
        ReviewDecision::Approve => CrystallizationStatus::Approved,
        ReviewDecision::RequestChanges | ReviewDecision::Reject => {
            CrystallizationStatus::NeedsChanges
        }
    };

    if entry != target {
        validate_transition(entry, target)?;
    }
    Ok(target)
}

/// First unmet crystallize precondition, checked in a fixed order:
/// status, validation, quality score, manual review.
pub fn check_crystallize_preconditions(
    test: &CrystallizedTest,
    config: &CrystallizationConfig,
) -> Result<(), UnmetCondition> {
    if test.status != CrystallizationStatus::Approved {
        return Err(UnmetCondition::NotApproved {
            status: test.status,
        });
    }

    if config.require_validation {
        match &test.review.validation_result {
            None => return Err(UnmetCondition::MissingValidation),
            Some(result) if !result.valid => return Err(UnmetCondition::ValidationFailed),
            Some(_) => {}
        }
    }

    if test.review.quality_score < config.min_quality_score {
        return Err(UnmetCondition::QualityBelowThreshold {
            score: test.review.quality_score,
            minimum: config.min_quality_score,
        });
    }

    if config.require_manual_review {
        let have = test.review.reviewers().len();
        if have < config.min_reviewers {
            return Err(UnmetCondition::InsufficientReviewers {
                have,
                required: config.min_reviewers,
            });
        }

        let decision = test.review.latest().map(|r| r.decision);
        if decision != Some(ReviewDecision::Approve) {
            return Err(UnmetCondition::LatestDecisionNotApprove { decision });
        }
    }

    Ok(())
}
