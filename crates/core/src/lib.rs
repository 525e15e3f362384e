//! `unitlink-core` — text normalization and the unit-hint grammar.
//!
//! Pure leaf crate: string in, token out. No I/O, no engine types.

pub mod hints;
pub mod normalize;

pub use hints::{HintParser, UnitHint};
pub use normalize::{canonical, compact, upper_no_accent};
