//! Predicates and the witness data they are decided against

pub mod decider;
pub mod hint;
pub mod ownership;
pub mod property;
pub mod signed_by;
pub mod witness;

pub use decider::{Challenge, Decider, DeciderError, DeciderManager, Decision};
pub use hint::{replace_hint, Hint, HintError, HintQuery};
pub use ownership::OwnershipDecider;
pub use property::Property;
pub use signed_by::SignedByDecider;
pub use witness::WitnessDb;
