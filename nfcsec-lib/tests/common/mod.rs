//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use hex;
#[allow(unused_imports)]
pub use nfcsec_lib::audit::{AuditRecord, AuditStore, RowId, SqliteAuditStore, Topic};
#[allow(unused_imports)]
pub use nfcsec_lib::envelope::Envelope;
#[allow(unused_imports)]
pub use nfcsec_lib::error::{GateError, PersistError};
#[allow(unused_imports)]
pub use nfcsec_lib::key::SecretKey;
#[allow(unused_imports)]
pub use nfcsec_lib::pipeline::{Outcome, Pipeline, Stage};
#[allow(unused_imports)]
pub use nfcsec_lib::registry::{DeviceSession, Registry};
#[allow(unused_imports)]
pub use nfcsec_lib::response::{CollectingSink, Response, ResponseSink};
#[allow(unused_imports)]
pub use std::sync::Arc;

/// Key flashed into the test readers
#[allow(dead_code)]
pub const DEVICE_KEY_HEX: &str = "0123456789abcdef0123456789abcdef";

#[allow(dead_code)]
pub const DEVICE_ID: &str = "AA:BB:CC:DD:EE:FF";

#[allow(dead_code)]
pub const DEVICE_SECRET: &str = "api-key-1";

/// Reader output for UID 9DBBDC21, IV 00..07
#[allow(dead_code)]
pub const ENVELOPE_9DBBDC21: &str = "00010203040506070f24f35d4597970220935df3dd61cf41";

/// Reader output for UID 04A1B2C3D4E5F6, IV a0..a7
#[allow(dead_code)]
pub const ENVELOPE_04A1B2C3D4E5F6: &str = "a0a1a2a3a4a5a6a7b48dbf0659339694aa7d2b483369f64a";

/// Reader output for UID DEADBEEF, zero IV
#[allow(dead_code)]
pub const ENVELOPE_DEADBEEF: &str = "000000000000000003aaaccaaa33944af3bf64eafe2ab902";

#[allow(dead_code)]
pub fn device_key() -> SecretKey {
    SecretKey::from_hex(DEVICE_KEY_HEX).expect("valid test key")
}

/// Registry with one device and `9DBBDC21` allow-listed
#[allow(dead_code)]
pub fn registry(hashed_tags: Vec<String>) -> Registry {
    Registry::new(
        [(DEVICE_ID.to_string(), DEVICE_SECRET.to_string())],
        ["9DBBDC21".to_string()],
        hashed_tags,
    )
}

#[allow(dead_code)]
pub fn pipeline_with<S: AuditStore>(registry: Registry, store: S) -> Pipeline<S> {
    Pipeline::new(Arc::new(device_key()), Arc::new(registry), store)
}

#[allow(dead_code)]
pub fn memory_pipeline() -> Pipeline<SqliteAuditStore> {
    pipeline_with(registry(Vec::new()), SqliteAuditStore::open_in_memory().expect("in-memory store"))
}

#[allow(dead_code)]
pub fn authenticated(pipeline: &Pipeline<impl AuditStore>) -> DeviceSession {
    pipeline.registry().authenticate(DEVICE_ID, DEVICE_SECRET)
}

/// Flip one bit of the hex-encoded envelope at `byte_index`
#[allow(dead_code)]
pub fn flip_bit(encoded: &str, byte_index: usize) -> String {
    let mut raw = hex::decode(encoded).expect("valid hex");
    raw[byte_index] ^= 0x01;
    hex::encode(raw)
}

/// Route library logs to the test harness; `RUST_LOG=debug` shows stage transitions
#[allow(dead_code)]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
