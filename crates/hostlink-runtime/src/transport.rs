//! Frame transports
//!
//! A [`Transport`] moves whole frames between the scripting side and the
//! native host. The runtime only needs the two operations below; how frames
//! actually travel is up to the implementation.

use async_trait::async_trait;
use hostlink_core::{HostlinkError, HostlinkResult};
use tokio::sync::mpsc;
use tracing::debug;

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Frame delivery between the runtime and the native host
#[async_trait]
pub trait Transport: Send {
    /// Next inbound frame; `None` once the native side has closed
    async fn recv_frame(&mut self) -> HostlinkResult<Option<String>>;

    /// Deliver one outbound frame
    async fn send_frame(&mut self, frame: String) -> HostlinkResult<()>;
}

// ----------------------------------------------------------------------------
// Channel Transport
// ----------------------------------------------------------------------------

/// In-memory transport backed by a pair of tokio channels
pub struct ChannelTransport {
    inbound: mpsc::Receiver<String>,
    outbound: mpsc::Sender<String>,
}

/// The native end of a [`ChannelTransport`]
pub struct NativeEndpoint {
    to_runtime: Option<mpsc::Sender<String>>,
    from_runtime: mpsc::Receiver<String>,
}

impl ChannelTransport {
    /// Create a connected transport and native endpoint
    pub fn pair(buffer_size: usize) -> (ChannelTransport, NativeEndpoint) {
        let (to_runtime, inbound) = mpsc::channel(buffer_size.max(1));
        let (outbound, from_runtime) = mpsc::channel(buffer_size.max(1));
        (
            ChannelTransport { inbound, outbound },
            NativeEndpoint {
                to_runtime: Some(to_runtime),
                from_runtime,
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn recv_frame(&mut self) -> HostlinkResult<Option<String>> {
        Ok(self.inbound.recv().await)
    }

    async fn send_frame(&mut self, frame: String) -> HostlinkResult<()> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| HostlinkError::transport_error("native endpoint closed"))
    }
}

impl NativeEndpoint {
    /// Queue a frame for the runtime
    pub async fn send_frame<F: Into<String>>(&self, frame: F) -> HostlinkResult<()> {
        let sender = self
            .to_runtime
            .as_ref()
            .ok_or_else(|| HostlinkError::transport_error("native endpoint finished"))?;
        sender
            .send(frame.into())
            .await
            .map_err(|_| HostlinkError::transport_error("runtime closed"))
    }

    /// Next frame produced by the runtime; `None` once the runtime is gone
    pub async fn recv_frame(&mut self) -> Option<String> {
        self.from_runtime.recv().await
    }

    /// Stop sending; the runtime loop ends after draining what was queued
    pub fn finish(&mut self) {
        if self.to_runtime.take().is_some() {
            debug!("native endpoint finished sending");
        }
    }
}
