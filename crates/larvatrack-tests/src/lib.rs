//! Integration test crate for LarvaTrack.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on the core, media and tracking crates to verify they work
//! together.

#[cfg(test)]
mod synthetic;

#[cfg(test)]
mod pipeline;

#[cfg(test)]
mod background;

#[cfg(test)]
mod persistence;
