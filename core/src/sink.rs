//! Output sink: "deliver text" and "deliver a status line" to wherever a session's
//! viewer is. Three concrete destinations share one trait so the PTY/streamer layer
//! never branches on which kind of client is attached. Each implementation serializes
//! its own sends with an internal lock so interleaved frames from two streamer ticks
//! never race onto the wire out of order.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

use crate::format;
use crate::log::prefix;

#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn send_output(&self, text: &str);
    async fn send_status(&self, text: &str);
}

pub type DeliverFuture = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;
pub type DeliverFn = Arc<dyn Fn(String) -> DeliverFuture + Send + Sync>;

/// Chat destination (bot channel): runs text through the markdown formatter and
/// size-aware splitter before handing chunks to the supplied delivery closure.
pub struct ChatSink {
    deliver: DeliverFn,
    serialize: AsyncMutex<()>,
    max_message_len: usize,
}

impl ChatSink {
    pub fn new(deliver: DeliverFn, max_message_len: usize) -> Self {
        Self {
            deliver,
            serialize: AsyncMutex::new(()),
            max_message_len,
        }
    }
}

#[async_trait]
impl OutputSink for ChatSink {
    async fn send_output(&self, text: &str) {
        let _guard = self.serialize.lock().await;
        for chunk in format::format_message(text, self.max_message_len) {
            (self.deliver)(chunk).await;
        }
    }

    async fn send_status(&self, text: &str) {
        let _guard = self.serialize.lock().await;
        (self.deliver)(format::html_escape(text)).await;
    }
}

/// Browser/websocket destination: raw text frames, no formatting. `tx` is a
/// `tokio::sync::mpsc::Sender<String>` feeding the socket writer task.
pub struct SocketSink {
    tx: AsyncMutex<tokio::sync::mpsc::Sender<String>>,
}

impl SocketSink {
    pub fn new(tx: tokio::sync::mpsc::Sender<String>) -> Self {
        Self { tx: AsyncMutex::new(tx) }
    }
}

#[async_trait]
impl OutputSink for SocketSink {
    async fn send_output(&self, text: &str) {
        let tx = self.tx.lock().await;
        if tx.send(text.to_string()).await.is_err() {
            eprintln!("{} event=send_failed reason=closed", prefix("sink"));
        }
    }

    async fn send_status(&self, text: &str) {
        self.send_output(text).await;
    }
}

/// Foreground/standalone console destination: writes straight to stdout.
pub struct ConsoleSink {
    serialize: AsyncMutex<()>,
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self { serialize: AsyncMutex::new(()) }
    }
}

#[async_trait]
impl OutputSink for ConsoleSink {
    async fn send_output(&self, text: &str) {
        let _guard = self.serialize.lock().await;
        println!("{text}");
    }

    async fn send_status(&self, text: &str) {
        let _guard = self.serialize.lock().await;
        eprintln!("{text}");
    }
}

/// Test double recording every call in order, for assertions on streamer behavior
/// without standing up a real channel or bot client.
#[derive(Default)]
pub struct MockSink {
    pub outputs: AsyncMutex<Vec<String>>,
    pub statuses: AsyncMutex<Vec<String>>,
}

#[async_trait]
impl OutputSink for MockSink {
    async fn send_output(&self, text: &str) {
        self.outputs.lock().await.push(text.to_string());
    }

    async fn send_status(&self, text: &str) {
        self.statuses.lock().await.push(text.to_string());
    }
}

pub type DynSink = Arc<dyn OutputSink>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_sink_records_calls_in_order() {
        let sink = MockSink::default();
        sink.send_output("one").await;
        sink.send_status("warn").await;
        sink.send_output("two").await;
        assert_eq!(*sink.outputs.lock().await, vec!["one", "two"]);
        assert_eq!(*sink.statuses.lock().await, vec!["warn"]);
    }

    #[tokio::test]
    async fn socket_sink_forwards_raw_text() {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<String>(4);
        let sink = SocketSink::new(tx);
        sink.send_output("raw \x1b[31m bytes").await;
        assert_eq!(rx.recv().await.unwrap(), "raw \x1b[31m bytes");
    }
}
