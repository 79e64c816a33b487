//! Document fetching, oracle-driven extraction, and the dose safety gate.
//!
//! The flow is: fetch a monograph PDF, run the extraction pipeline against
//! the cache state machine, then answer dose questions from the persisted
//! evidence with every proposal passing through the deterministic gate.

pub mod dose;
pub mod fetch;
pub mod oracle;
pub mod pipeline;
pub mod recover;

pub use dose::{DoseCandidate, DoseContext, DoseDecision, DoseStatus, Patient};
pub use fetch::{DocumentFetcher, FetchConfig, PdfDocument, RetryPolicy};
pub use oracle::{DoseOracle, ExtractionOracle, OracleClient, OracleConfig, OracleError};
pub use pipeline::Pipeline;
pub use recover::recover_json;
