//! Outbound transports for the stream bridge

use std::future::Future;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Destination of the records of one client
pub trait EventSink: Send {
    /// Whether each record can be pushed to the client as soon as it is sent
    fn supports_flush(&self) -> bool {
        true
    }

    /// Write one record and flush it
    ///
    /// An error means the client is gone.
    fn send(&mut self, record: Bytes) -> impl Future<Output = Result<()>> + Send;
}

/// Sink feeding a channel that backs a streaming response body
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    /// Create a sink and the receiver the response body reads from
    ///
    /// `buffer` bounds how many records may sit between the bridge and the
    /// socket.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    async fn send(&mut self, record: Bytes) -> Result<()> {
        self.tx.send(record).await.map_err(|_| Error::Disconnected)
    }
}
