//! Board module: what happens to committed keys
//!
//! Provides the text buffer fed by dwell commits and the debounced
//! Select/Back keys.

mod composer;
mod input;

pub use composer::{CommitOutcome, Composer, DEFAULT_ITEMS};
pub use input::{InputGate, InputKey, DEFAULT_COOLDOWN_MS};
