//! Meade #497 protocol codec.
//!
//! Pure functions only: `commands` builds wire strings, `replies` parses what
//! the handbox answers, and `sexagesimal` handles the angle formats both use.

pub mod commands;
pub mod replies;
pub mod sexagesimal;

pub use replies::AlignmentMode;
