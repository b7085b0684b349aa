//! Derive macros for Tarkib, re-exported from `tarkib-macros`.

pub use tarkib_macros::Declared;
