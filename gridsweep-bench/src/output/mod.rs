//! Output modules for rendering benchmark results.
//!
//! Supports table (comfy-table), JSON, CSV, and progress spinner output.

pub mod csv;
pub mod json;
pub mod progress;
pub mod table;
