//! Services module - pure decision logic with no scheduling or host access.
//!
//! - [`scanner`]: locates the target stack in the slot space in priority
//!   order, and finds free hotbar / scratch storage slots.
//! - [`classifier`]: turns inbound server text into [`TextSignal`]s. Matching
//!   rules live behind the [`TextClassifier`] trait so a server with different
//!   wording only needs a new classifier.
//!
//! Everything here takes explicit inputs and has no side effects, so it is
//! tested without a host or a scheduler.

pub mod classifier;
pub mod scanner;

pub use classifier::{
    PhraseClassifier, RegexClassifier, TextClassifier, TextSignal, classifier_for,
};
pub use scanner::{SlotRef, SlotRegion, find_free_hotbar_slot, find_scratch_slot, find_target};
