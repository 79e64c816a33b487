//! MCP tool implementations.
//!
//! This module contains all tools exposed by the mcp-pmdex server.

pub mod pm_dose;
pub mod pm_extract;

pub use pm_dose::{PmDoseOutput, PmDoseParams};
pub use pm_extract::{PmExtractOutput, PmExtractParams};
