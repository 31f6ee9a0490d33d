//! Per-message processing: envelope in, response out, audit record written
//!
//! # Stages
//!
//! ```text
//! Received -> TagChecked -> Decrypted -> Validated -> Responded -> Logged
//!     \
//!      `-> TagRejected -> Error -> Responded -> Logged
//! ```
//!
//! Any other failure goes straight to `Error`.
//!
//! `nfc/verify` requests run through `Validated`. `nfc/access` requests come
//! from readers that already granted access locally: once the envelope
//! checks out and decrypts, the tag is recorded as authorized without
//! consulting the validator.
//!
//! Every run owns a freshly built [`AuditRecord`]; nothing is shared between
//! concurrent requests apart from the read-only key and registry.

use crate::audit::{AuditRecord, AuditStore, RowId, Topic};
use crate::constants::RESPONSE_CHANNEL;
use crate::envelope::Envelope;
use crate::error::GateError;
use crate::key::SecretKey;
use crate::padding::uid_from_plaintext;
use crate::registry::{DeviceSession, Registry};
use crate::response::{Response, ResponseSink};
use crate::validator::UidValidator;
use std::sync::Arc;
use strum_macros::Display;
use tracing::{debug, info, warn};

/// Points a request passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Stage {
    Received,
    TagChecked,
    /// Tag mismatch; always followed by `Error`
    TagRejected,
    Decrypted,
    Validated,
    Error,
    Responded,
    Logged,
}

/// Result of handling one message
#[derive(Debug, Clone)]
pub struct Outcome {
    pub response: Response,
    /// The record as handed to the audit store
    pub record: AuditRecord,
    /// `None` if the audit append failed
    pub row_id: Option<RowId>,
    pub stages: Vec<Stage>,
}

impl Outcome {
    pub fn reached(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }
}

/// State owned by a single in-flight request
struct Run {
    record: AuditRecord,
    stages: Vec<Stage>,
}

impl Run {
    fn new(record: AuditRecord) -> Self {
        Self {
            record,
            stages: vec![Stage::Received],
        }
    }

    fn advance(&mut self, stage: Stage) {
        debug!(%stage, topic = %self.record.topic, "Pipeline stage");
        self.stages.push(stage);
    }
}

pub struct Pipeline<S> {
    key: Arc<SecretKey>,
    registry: Arc<Registry>,
    validator: UidValidator,
    store: S,
}

impl<S: AuditStore> Pipeline<S> {
    pub fn new(key: Arc<SecretKey>, registry: Arc<Registry>, store: S) -> Self {
        let validator = UidValidator::new(Arc::clone(&registry));
        Self {
            key,
            registry,
            validator,
            store,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Process one inbound message end to end
    ///
    /// Never fails: errors become a processing-error notice and are written
    /// to the record's `error` field. The response is published before the
    /// record is appended; a failed append is only logged.
    pub async fn handle<T: ResponseSink>(
        &self,
        session: &DeviceSession,
        channel: &str,
        payload: &str,
        sink: &T,
    ) -> Outcome {
        let topic = Topic::from_channel(channel);
        let mut run = Run::new(AuditRecord::begin(session, topic));

        let response = match self.process(channel, topic, payload, &mut run).await {
            Ok(response) => response,
            Err(err) => {
                warn!(device = %session.device_id, %channel, "Request failed: {}", err);
                run.advance(Stage::Error);
                run.record.error = Some(err.to_string());
                Response::ProcessingError
            }
        };
        run.record.stamp();

        if let Err(err) = sink.publish(RESPONSE_CHANNEL, response).await {
            warn!(device = %session.device_id, "Failed to publish response: {}", err);
        }
        run.advance(Stage::Responded);

        let row_id = self.persist(run.record.clone()).await;
        run.advance(Stage::Logged);

        Outcome {
            response,
            record: run.record,
            row_id,
            stages: run.stages,
        }
    }

    /// Audit a connection whose credentials were refused
    pub async fn record_rejected_device(&self, session: &DeviceSession) -> Option<RowId> {
        let mut record = AuditRecord::begin(session, Topic::None);
        record.error = Some("device authentication failed".to_string());
        self.persist(record).await
    }

    async fn process(&self, channel: &str, topic: Topic, payload: &str, run: &mut Run) -> Result<Response, GateError> {
        if topic == Topic::None {
            return Err(GateError::UnsupportedTopic(channel.to_string()));
        }

        let envelope = Envelope::from_hex(payload)?;
        if let Err(err) = envelope.verify(&self.key) {
            run.advance(Stage::TagRejected);
            return Err(err);
        }
        run.advance(Stage::TagChecked);

        let plaintext = self.key.decrypt(&envelope.ciphertext)?;
        run.advance(Stage::Decrypted);

        let uid = uid_from_plaintext(&plaintext);
        run.record.uid_tag = Some(uid.clone());

        match topic {
            Topic::Access => {
                run.record.tag_state = true;
                info!(%uid, "Access logged");
                Ok(Response::AccessLogged)
            }
            _ => {
                let authorized = self.validator.is_authorized(&uid).await?;
                run.advance(Stage::Validated);
                run.record.tag_state = authorized;
                if authorized {
                    info!(%uid, "UID valid");
                    Ok(Response::Authorized)
                } else {
                    info!(%uid, "UID not valid");
                    Ok(Response::Unauthorized)
                }
            }
        }
    }

    async fn persist(&self, record: AuditRecord) -> Option<RowId> {
        match self.store.append(record).await {
            Ok(id) => {
                debug!(%id, "Audit record stored");
                Some(id)
            }
            Err(err) => {
                warn!("Audit append failed, record dropped: {}", err);
                None
            }
        }
    }
}
