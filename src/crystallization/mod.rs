//! Review-to-production lifecycle of generated tests

pub mod registry;
pub mod state_machine;
pub mod stats;

pub use registry::{hash_content, CrystallizationRegistry, RegistryIndices, DEFAULT_REGISTRY_FILE};
pub use state_machine::{
    allowed_transitions, check_crystallize_preconditions, reopened_status, review_entry,
    review_outcome, validate_transition,
};
pub use stats::compute_stats;
