//! Data models for SellHelper.
//!
//! - [`SellConfig`]: what to sell, how many per listing, at what price, and
//!   how to recover when the auction house is full. Persisted as
//!   `sellhelper.json`.
//! - [`PhraseRules`]: the server phrases that signal a purchase or a full
//!   listing storage.
//! - [`CyclePhase`] / [`SessionSnapshot`]: observable automation state,
//!   produced by [`Session`](crate::state::Session).

pub mod config;
pub mod session;

pub use config::{PhraseRules, ResellMode, SellConfig};
pub use session::{CyclePhase, SessionSnapshot};
