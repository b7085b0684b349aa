//! # Tarkib Support
//!
//! Shared text helpers for the Tarkib crates.
//!
//! This crate provides:
//! - Type name shortening and chain rendering for error messages
//! - "Did you mean?" suggestions for misspelled field names
//! - Vertical rendering of construction plans

pub mod rendering;
