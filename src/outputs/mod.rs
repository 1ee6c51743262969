//! Output generation for stored collections.
//!
//! # Submodules
//!
//! - [`json`]: Writes a collection's documents to a JSON file

pub mod json;
