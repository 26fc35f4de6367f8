//! Single-producer, single-consumer hand-off for stream items
//!
//! Wraps a tokio mpsc channel so that:
//! - a zero timeout is a non-blocking poll
//! - once `EndOfStream` has been read, every later read is empty
//! - a producer that disappears without sending `EndOfStream` still reads
//!   as end of stream, so a consumer can never block forever on it

use crate::{Error, Result, StreamItem};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

/// Create a channel pair
///
/// `capacity == 0` creates an unbounded channel.
pub fn stream_channel(capacity: usize) -> (ChunkSender, StreamChannel) {
    if capacity == 0 {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ChunkSender(SenderInner::Unbounded(tx)),
            StreamChannel::new(ReceiverInner::Unbounded(rx)),
        )
    } else {
        let (tx, rx) = mpsc::channel(capacity);
        (
            ChunkSender(SenderInner::Bounded(tx)),
            StreamChannel::new(ReceiverInner::Bounded(rx)),
        )
    }
}

/// Producer half
#[derive(Debug)]
pub struct ChunkSender(SenderInner);

#[derive(Debug)]
enum SenderInner {
    Bounded(mpsc::Sender<StreamItem>),
    Unbounded(mpsc::UnboundedSender<StreamItem>),
}

impl ChunkSender {
    /// Push an item, waiting while a bounded channel is full
    ///
    /// # Errors
    /// `ChannelClosed` when the consumer has been dropped
    pub async fn push(&self, item: StreamItem) -> Result<()> {
        match &self.0 {
            SenderInner::Bounded(tx) => tx.send(item).await.map_err(|_| Error::ChannelClosed),
            SenderInner::Unbounded(tx) => tx.send(item).map_err(|_| Error::ChannelClosed),
        }
    }

    /// Push without waiting; returns false if the item could not be queued
    pub fn try_push(&self, item: StreamItem) -> bool {
        match &self.0 {
            SenderInner::Bounded(tx) => match tx.try_send(item) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => false,
            },
            SenderInner::Unbounded(tx) => tx.send(item).is_ok(),
        }
    }
}

#[derive(Debug)]
enum ReceiverInner {
    Bounded(mpsc::Receiver<StreamItem>),
    Unbounded(mpsc::UnboundedReceiver<StreamItem>),
}

impl ReceiverInner {
    fn try_recv(&mut self) -> std::result::Result<StreamItem, TryRecvError> {
        match self {
            Self::Bounded(rx) => rx.try_recv(),
            Self::Unbounded(rx) => rx.try_recv(),
        }
    }

    async fn recv(&mut self) -> Option<StreamItem> {
        match self {
            Self::Bounded(rx) => rx.recv().await,
            Self::Unbounded(rx) => rx.recv().await,
        }
    }
}

/// Consumer half
#[derive(Debug)]
pub struct StreamChannel {
    rx: ReceiverInner,
    finished: bool,
}

impl StreamChannel {
    fn new(rx: ReceiverInner) -> Self {
        Self {
            rx,
            finished: false,
        }
    }

    /// Pop the next item
    ///
    /// Returns `None` when nothing arrived within `timeout`, or when
    /// `EndOfStream` has already been read.
    pub async fn try_pop(&mut self, timeout: Duration) -> Option<StreamItem> {
        if self.finished {
            return None;
        }

        let item = if timeout.is_zero() {
            match self.rx.try_recv() {
                Ok(item) => Some(item),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(StreamItem::EndOfStream),
            }
        } else {
            match tokio::time::timeout(timeout, self.rx.recv()).await {
                Ok(Some(item)) => Some(item),
                Ok(None) => Some(StreamItem::EndOfStream),
                Err(_) => None,
            }
        };

        if matches!(item, Some(StreamItem::EndOfStream)) {
            self.finished = true;
        }
        item
    }

    /// Whether `EndOfStream` has been read
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
