pub mod audit;
pub mod cipher;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod integrity;
pub mod key;
pub mod padding;
pub mod pipeline;
pub mod registry;
pub mod response;
pub mod validator;

// Re-export the types a transport needs to drive the pipeline
pub use audit::{AuditRecord, AuditStore, RowId, SqliteAuditStore, Topic};
pub use envelope::Envelope;
pub use error::{GateError, PersistError};
pub use key::SecretKey;
pub use pipeline::{Outcome, Pipeline, Stage};
pub use registry::{DeviceSession, Registry};
pub use response::{Response, ResponseSink};

#[cfg(test)]
mod tests;
