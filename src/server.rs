//! Line-oriented TCP transport for reader devices
//!
//! ```text
//! reader                                  server
//!   AUTH <deviceId> <secret>        ->
//!                                   <-    OK | DENIED
//!   nfc/verify <hex envelope>       ->
//!   nfc/access <hex envelope>       ->
//!                                   <-    server/response <notice>
//!                                   <-    server/response <notice>
//! ```
//!
//! Each message line is handled on its own task, so responses may come back
//! in a different order than the requests. A denied connection is audited
//! and closed.

use crate::error::ServerError;
use nfcsec_lib::{AuditStore, DeviceSession, GateError, Pipeline, Response, ResponseSink};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Writes notices back over the connection that sent the request
#[derive(Clone)]
struct LineSink {
    writer: Arc<Mutex<OwnedWriteHalf>>,
}

impl LineSink {
    async fn send_line(&self, line: &str) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }
}

impl ResponseSink for LineSink {
    async fn publish(&self, channel: &str, response: Response) -> Result<(), GateError> {
        self.send_line(&format!("{} {}", channel, response)).await?;
        Ok(())
    }
}

/// Pause before the next `accept` after it failed
///
/// Aborted or reset peers retry at once; anything else (fd or buffer
/// exhaustion) waits briefly.
fn accept_retry_delay(err: &io::Error) -> Duration {
    match err.kind() {
        io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset | io::ErrorKind::Interrupted => Duration::ZERO,
        _ => Duration::from_millis(100),
    }
}

/// Accept connections until the task is dropped
///
/// Only fails if the listener has no local address; accept errors are
/// logged and retried.
pub async fn serve<S>(listener: TcpListener, pipeline: Arc<Pipeline<S>>) -> Result<(), ServerError>
where
    S: AuditStore + 'static,
{
    info!("Listening on {}", listener.local_addr()?);
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                let delay = accept_retry_delay(&e);
                warn!(?delay, "Accept failed: {}", e);
                tokio::time::sleep(delay).await;
                continue;
            }
        };
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, pipeline).await {
                warn!(%peer, "Connection ended with error: {}", e);
            }
        });
    }
}

fn parse_auth(line: &str) -> Result<(&str, &str), ServerError> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("AUTH"), Some(device_id), Some(secret), None) => Ok((device_id, secret)),
        _ => Err(ServerError::Protocol("expected `AUTH <deviceId> <secret>`".to_string())),
    }
}

/// Session recorded for a first line that is not a well-formed `AUTH`
fn malformed_session(line: &str) -> DeviceSession {
    let mut parts = line.split_whitespace().skip(1);
    DeviceSession {
        device_id: parts.next().unwrap_or_default().to_string(),
        secret: parts.next().unwrap_or_default().to_string(),
        authenticated: false,
    }
}

fn parse_message(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((channel, payload)) => (channel, payload.trim()),
        None => (line, ""),
    }
}

async fn handle_connection<S>(stream: TcpStream, peer: SocketAddr, pipeline: Arc<Pipeline<S>>) -> Result<(), ServerError>
where
    S: AuditStore + 'static,
{
    let (reader, writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let sink = LineSink {
        writer: Arc::new(Mutex::new(writer)),
    };

    let Some(first) = lines.next_line().await? else {
        debug!(%peer, "Connection closed before authenticating");
        return Ok(());
    };
    let (device_id, secret) = match parse_auth(&first) {
        Ok(credentials) => credentials,
        Err(e) => {
            pipeline.record_rejected_device(&malformed_session(&first)).await;
            sink.send_line("DENIED").await?;
            return Err(e);
        }
    };

    let session = pipeline.registry().authenticate(device_id, secret);
    if !session.authenticated {
        pipeline.record_rejected_device(&session).await;
        sink.send_line("DENIED").await?;
        info!(%peer, device = %session.device_id, "Rejected device");
        return Ok(());
    }
    sink.send_line("OK").await?;
    info!(%peer, device = %session.device_id, "Device connected");

    let session = Arc::new(session);
    let mut in_flight = JoinSet::new();
    let read_result = loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(e) => {
                warn!(%peer, "Read failed, finishing in-flight requests: {}", e);
                break Err(e);
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (channel, payload) = parse_message(line);
        let (channel, payload) = (channel.to_string(), payload.to_string());

        let pipeline = Arc::clone(&pipeline);
        let session = Arc::clone(&session);
        let sink = sink.clone();
        in_flight.spawn(async move {
            let outcome = pipeline.handle(&session, &channel, &payload, &sink).await;
            debug!(%channel, response = %outcome.response, "Request finished");
        });

        // reap finished tasks so a long-lived connection does not accumulate them
        while in_flight.try_join_next().is_some() {}
    };

    // requests already read are answered and audited even if the stream broke
    while in_flight.join_next().await.is_some() {}
    read_result?;
    info!(%peer, device = %session.device_id, "Device disconnected");
    Ok(())
}
