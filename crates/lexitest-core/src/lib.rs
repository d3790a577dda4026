//! lexitest-core: adaptive question selection, scoring, and session state.
//!
//! This crate defines the question model, the progression strategies that
//! pick the next question, the XP economy, and the per-question and exam
//! session state machines. Backends plug in through the traits in
//! [`traits`].

mod background;

pub mod cursor;
pub mod error;
pub mod exam;
pub mod model;
pub mod parser;
pub mod pool;
pub mod progress;
pub mod progression;
pub mod report;
pub mod result;
pub mod scoring;
pub mod session;
pub mod traits;
pub mod xp;
