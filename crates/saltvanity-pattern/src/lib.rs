//! SaltVanity Pattern Matching
//!
//! Hex suffix patterns for CREATE2 vanity addresses.

mod difficulty;
mod matcher;

pub use difficulty::{calculate_difficulty, estimate_time_50pct, format_difficulty, format_duration};
pub use matcher::{PatternError, SuffixPattern, MAX_SUFFIX_LEN};
