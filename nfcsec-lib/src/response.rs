use crate::error::GateError;
use std::future::Future;
use strum_macros::Display;

/// Notice sent back to the reader, one per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Response {
    #[strum(to_string = "UID valid")]
    Authorized,
    #[strum(to_string = "UID not valid")]
    Unauthorized,
    #[strum(to_string = "Error processing request")]
    ProcessingError,
    #[strum(to_string = "Access logged")]
    AccessLogged,
}

/// Outbound side of the transport
pub trait ResponseSink: Send + Sync {
    fn publish(&self, channel: &str, response: Response) -> impl Future<Output = Result<(), GateError>> + Send;
}

/// Sink that keeps every published notice, for tools and tests
#[derive(Debug, Default)]
pub struct CollectingSink {
    published: parking_lot::Mutex<Vec<(String, Response)>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(String, Response)> {
        self.published.lock().clone()
    }
}

impl ResponseSink for CollectingSink {
    async fn publish(&self, channel: &str, response: Response) -> Result<(), GateError> {
        self.published.lock().push((channel.to_string(), response));
        Ok(())
    }
}
