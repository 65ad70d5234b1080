//! Data pipeline behind the NYC collision dashboard.
//!
//! The dashboard binary renders what this library produces; everything here
//! is plain data and pure functions so it can be tested without a window.

pub mod data;
