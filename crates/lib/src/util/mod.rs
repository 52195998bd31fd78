//! Shared utilities.
//!
//! Hashing for derived ids, plus helpers used by tests.

pub mod hash;

#[cfg(test)]
pub mod testutil;
