use crate::audit::{AuditStore, SqliteAuditStore, Topic};
use crate::constants::RESPONSE_CHANNEL;
use crate::envelope::Envelope;
use crate::key::SecretKey;
use crate::padding::uid_from_plaintext;
use crate::pipeline::{Pipeline, Stage};
use crate::registry::Registry;
use crate::response::{CollectingSink, Response};
use std::sync::Arc;

// Captured from a reader running key 0123456789abcdef0123456789abcdef
const UID_9DBBDC21: &str = "00010203040506070f24f35d4597970220935df3dd61cf41";
const UID_04A1B2C3D4E5F6: &str = "a0a1a2a3a4a5a6a7b48dbf0659339694aa7d2b483369f64a";
const UID_TWO_BLOCKS: &str = "00000000000000006e016ba0bc8f80b0e5e0c118535265873ac529d45e8c817a";
const UID_DEADBEEF: &str = "000000000000000003aaaccaaa33944af3bf64eafe2ab902";

fn device_key() -> SecretKey {
    SecretKey::from_hex("0123456789abcdef0123456789abcdef").unwrap()
}

fn pipeline() -> Pipeline<SqliteAuditStore> {
    let registry = Registry::new(
        [("AA:BB:CC:DD:EE:FF".to_string(), "api-key-1".to_string())],
        ["9DBBDC21".to_string(), "04A1B2C3D4E5F6".to_string()],
        Vec::new(),
    );
    Pipeline::new(
        Arc::new(device_key()),
        Arc::new(registry),
        SqliteAuditStore::open_in_memory().unwrap(),
    )
}

#[test]
fn test_firmware_envelopes_decode_to_uids() {
    let key = device_key();
    let cases = [
        (UID_9DBBDC21, "9DBBDC21"),
        (UID_04A1B2C3D4E5F6, "04A1B2C3D4E5F6"),
        (UID_TWO_BLOCKS, "04A1B2C3D4E5F6071122"),
        (UID_DEADBEEF, "DEADBEEF"),
    ];
    for (encoded, uid) in cases {
        let plaintext = Envelope::from_hex(encoded).unwrap().open(&key).unwrap();
        assert_eq!(uid_from_plaintext(&plaintext), uid, "envelope {}", encoded);
    }
}

#[test]
fn test_wrong_key_fails_integrity() {
    let other = SecretKey::new([0x42; 16]);
    let envelope = Envelope::from_hex(UID_9DBBDC21).unwrap();
    assert!(matches!(envelope.open(&other), Err(crate::GateError::Integrity)));
}

#[tokio::test]
async fn test_verify_request_end_to_end() {
    let pipeline = pipeline();
    let session = pipeline.registry().authenticate("aa:bb:cc:dd:ee:ff", "api-key-1");
    let sink = CollectingSink::new();

    let outcome = pipeline.handle(&session, "nfc/verify", UID_9DBBDC21, &sink).await;

    assert_eq!(outcome.response, Response::Authorized);
    assert_eq!(
        outcome.stages,
        vec![
            Stage::Received,
            Stage::TagChecked,
            Stage::Decrypted,
            Stage::Validated,
            Stage::Responded,
            Stage::Logged
        ]
    );
    assert_eq!(sink.published(), vec![(RESPONSE_CHANNEL.to_string(), Response::Authorized)]);

    let rows = pipeline.store().recent(1).unwrap();
    assert_eq!(Some(rows[0].id), outcome.row_id);
    assert_eq!(rows[0].record.topic, Topic::Verify);
    assert_eq!(rows[0].record.uid_tag.as_deref(), Some("9DBBDC21"));
    assert!(rows[0].record.tag_state);
    assert!(rows[0].record.auth_state);
    assert_eq!(rows[0].record.error, None);
}

#[tokio::test]
async fn test_unknown_uid_is_not_valid() {
    let pipeline = pipeline();
    let session = pipeline.registry().authenticate("AA:BB:CC:DD:EE:FF", "api-key-1");
    let sink = CollectingSink::new();

    let outcome = pipeline.handle(&session, "nfc/verify", UID_DEADBEEF, &sink).await;

    assert_eq!(outcome.response, Response::Unauthorized);
    assert_eq!(outcome.response.to_string(), "UID not valid");
    assert!(outcome.reached(Stage::Validated));
    assert!(!outcome.record.tag_state);
    assert_eq!(outcome.record.uid_tag.as_deref(), Some("DEADBEEF"));
}

#[tokio::test]
async fn test_rejected_device_is_audited() {
    let pipeline = pipeline();
    let session = pipeline.registry().authenticate("AA:BB:CC:DD:EE:FF", "wrong");

    let id = pipeline.record_rejected_device(&session).await;

    assert!(id.is_some());
    let rows = pipeline.store().recent(1).unwrap();
    assert_eq!(rows[0].record.topic, Topic::None);
    assert!(!rows[0].record.auth_state);
    assert_eq!(rows[0].record.password, "wrong");
    assert!(rows[0].record.error.is_some());
}

#[tokio::test]
async fn test_store_is_usable_through_trait() {
    let store = SqliteAuditStore::open_in_memory().unwrap();
    let session = Registry::default().authenticate("reader", "secret");
    let record = crate::audit::AuditRecord::begin(&session, Topic::Access);
    let id = AuditStore::append(&store, record).await.unwrap();
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(id.0, 1);
}
