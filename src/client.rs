//! HTTP client for a running slot host.
//!
//! Mirrors the in-process [`SlotHandle`](crate::session::SlotHandle) API:
//! open a [`RemoteHandle`] on a slot, select a channel, then read or write.
//! Errors the host reports as slot errors come back as
//! [`ClientError::Slot`] with the original variant.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Response, StatusCode};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{ConfigError, HostConfig};
use crate::error::SlotError;
use crate::registry::{ChannelId, RegistrySnapshot, SlotId};
use crate::server::routes::{
    ErrorBody, OpenResponse, SelectRequest, WriteResponse, UNKNOWN_HANDLE,
};

/// Upper bound on any single request to the host.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors returned by [`SlotClient`] and [`RemoteHandle`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The host rejected the operation.
    #[error(transparent)]
    Slot(#[from] SlotError),

    /// The host does not know this handle (closed, or host restarted).
    #[error("Handle not found on host: {0}")]
    UnknownHandle(String),

    /// Transport failure talking to the host.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The host answered with something this client cannot interpret.
    #[error("Unexpected response ({status}): {body}")]
    Protocol { status: StatusCode, body: String },

    /// Client configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Connection to a slot host.
#[derive(Debug, Clone)]
pub struct SlotClient {
    base_url: String,
    http: reqwest::Client,
}

impl SlotClient {
    /// Create a client for the host at `base_url`.
    ///
    /// The host is reached directly; proxy settings from the environment
    /// are ignored.
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Create a client from `MESSAGE_SLOT_URL`.
    pub fn from_env() -> Result<Self, ClientError> {
        Ok(Self::new(HostConfig::from_env()?.base_url))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the host's liveness document.
    pub async fn health(&self) -> Result<serde_json::Value, ClientError> {
        let response = self.http.get(self.url("/health")).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// Fetch the host's registry snapshot.
    pub async fn snapshot(&self) -> Result<RegistrySnapshot, ClientError> {
        let response = self.http.get(self.url("/slots")).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// Open an unbound handle on `slot_id`, creating the slot on first use.
    pub async fn open(&self, slot_id: SlotId) -> Result<RemoteHandle, ClientError> {
        let response = self
            .http
            .post(self.url(&format!("/slots/{}/handles", slot_id)))
            .send()
            .await?;
        let opened: OpenResponse = check(response).await?.json().await?;
        log::debug!("opened remote handle {} on slot {}", opened.handle, opened.slot);
        Ok(RemoteHandle {
            client: self.clone(),
            id: opened.handle,
            slot_id: opened.slot,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// A handle held open on the host.
#[derive(Debug, Clone)]
pub struct RemoteHandle {
    client: SlotClient,
    id: Uuid,
    slot_id: SlotId,
}

impl RemoteHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn slot_id(&self) -> SlotId {
        self.slot_id
    }

    /// Bind the handle to `channel_id`.
    pub async fn select(&self, channel_id: ChannelId) -> Result<(), ClientError> {
        let response = self
            .client
            .http
            .post(self.url("/channel"))
            .json(&SelectRequest { channel_id })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Replace the bound channel's message. Returns the bytes accepted.
    pub async fn write(&self, data: &[u8]) -> Result<usize, ClientError> {
        let response = self
            .client
            .http
            .post(self.url("/message"))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data.to_vec())
            .send()
            .await?;
        let written: WriteResponse = check(response).await?.json().await?;
        Ok(written.written)
    }

    /// Read the bound channel's message.
    ///
    /// Without a capacity the host uses its configured maximum message size.
    pub async fn read(&self, capacity: Option<usize>) -> Result<Bytes, ClientError> {
        let mut request = self.client.http.get(self.url("/message"));
        if let Some(capacity) = capacity {
            request = request.query(&[("capacity", capacity)]);
        }
        let response = request.send().await?;
        Ok(check(response).await?.bytes().await?)
    }

    /// Close the handle. Stored messages are unaffected.
    pub async fn close(self) -> Result<(), ClientError> {
        let response = self.client.http.delete(self.url("")).send().await?;
        check(response).await?;
        Ok(())
    }

    fn url(&self, suffix: &str) -> String {
        self.client
            .url(&format!("/handles/{}{}", self.id, suffix))
    }
}

/// Pass successful responses through; decode host errors.
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await?;
    let error: ErrorBody = match serde_json::from_str(&body) {
        Ok(error) => error,
        Err(_) => return Err(ClientError::Protocol { status, body }),
    };

    if error.kind == UNKNOWN_HANDLE {
        return Err(ClientError::UnknownHandle(error.detail));
    }
    match SlotError::from_kind(&error.kind, &error.detail, error.needed, error.limit) {
        Some(err) => Err(ClientError::Slot(err)),
        None => Err(ClientError::Protocol { status, body }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{app_router, AppState};

    async fn spawn_host() -> (SlotClient, AppState) {
        let state = AppState::new();
        let app = app_router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (SlotClient::new(format!("http://{}/", addr)), state)
    }

    #[tokio::test]
    async fn test_health() {
        let (client, _) = spawn_host().await;
        let json = client.health().await.unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_remote_round_trip() {
        let (client, _) = spawn_host().await;

        let writer = client.open(1).await.unwrap();
        assert_eq!(writer.slot_id(), 1);
        writer.select(5).await.unwrap();
        assert_eq!(writer.write(b"hello").await.unwrap(), 5);
        writer.close().await.unwrap();

        let reader = client.open(1).await.unwrap();
        reader.select(5).await.unwrap();
        assert_eq!(&reader.read(Some(128)).await.unwrap()[..], b"hello");

        reader.select(7).await.unwrap();
        assert!(matches!(
            reader.read(Some(128)).await,
            Err(ClientError::Slot(SlotError::NotReady))
        ));
    }

    #[tokio::test]
    async fn test_remote_errors_keep_variants() {
        let (client, _) = spawn_host().await;

        assert!(matches!(
            client.open(256).await,
            Err(ClientError::Slot(SlotError::InvalidArgument(_)))
        ));

        let handle = client.open(2).await.unwrap();
        assert!(matches!(
            handle.write(b"x").await,
            Err(ClientError::Slot(SlotError::NotBound))
        ));
        assert!(matches!(
            handle.select(0).await,
            Err(ClientError::Slot(SlotError::InvalidArgument(_)))
        ));

        handle.select(3).await.unwrap();
        assert!(matches!(
            handle.write(&[b'a'; 200]).await,
            Err(ClientError::Slot(SlotError::MessageTooLarge { len: 200, max: 128 }))
        ));
        handle.write(b"hello").await.unwrap();
        assert!(matches!(
            handle.read(Some(2)).await,
            Err(ClientError::Slot(SlotError::BufferTooSmall {
                needed: 5,
                capacity: 2
            }))
        ));
    }

    #[tokio::test]
    async fn test_closed_handle_is_unknown() {
        let (client, _) = spawn_host().await;
        let handle = client.open(3).await.unwrap();
        let stale = handle.clone();
        handle.close().await.unwrap();
        assert!(matches!(
            stale.select(1).await,
            Err(ClientError::UnknownHandle(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_after_writes() {
        let (client, state) = spawn_host().await;
        let handle = client.open(4).await.unwrap();
        handle.select(10).await.unwrap();
        handle.write(b"abcd").await.unwrap();

        let snapshot = client.snapshot().await.unwrap();
        assert_eq!(snapshot, state.registry.snapshot());
        assert_eq!(snapshot.slots[0].channels[0].message_len, 4);
    }
}
