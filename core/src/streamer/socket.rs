//! Socket streamer: the browser terminal wants a live byte feed, not batched lines, so
//! this variant skips screen emulation entirely and relays raw PTY bytes with only
//! enough buffering to coalesce a burst of writes into one websocket frame. Ticks every
//! 5ms and flushes after `SILENCE` of no new bytes, which in practice means "flush on
//! basically every idle gap" — the coalescing exists for bursts, not for batching.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::IDLE_TIMEOUT;
use crate::log::prefix;
use crate::pty::PtySession;
use crate::sink::DynSink;

const TICK: Duration = Duration::from_millis(5);
const SILENCE: Duration = Duration::from_millis(1);

pub async fn run(pty: Arc<PtySession>, mut output_rx: mpsc::Receiver<Vec<u8>>, sink: DynSink) {
    let mut last_activity = Instant::now();
    let mut buffer: Vec<u8> = Vec::new();
    let mut last_write = Instant::now();
    let mut interval = tokio::time::interval(TICK);

    loop {
        tokio::select! {
            chunk = output_rx.recv() => {
                match chunk {
                    Some(bytes) => {
                        buffer.extend_from_slice(&bytes);
                        last_activity = Instant::now();
                        last_write = Instant::now();
                    }
                    None => {
                        flush(&sink, &mut buffer).await;
                        sink.send_status("[session ended]").await;
                        return;
                    }
                }
            }
            _ = interval.tick() => {
                if pty.is_closed() {
                    flush(&sink, &mut buffer).await;
                    return;
                }
                if last_activity.elapsed() >= IDLE_TIMEOUT {
                    eprintln!("{} event=idle_timeout", prefix("streamer.socket"));
                    pty.close();
                    return;
                }
                if !buffer.is_empty() && last_write.elapsed() >= SILENCE {
                    flush(&sink, &mut buffer).await;
                }
            }
        }
    }
}

async fn flush(sink: &DynSink, buffer: &mut Vec<u8>) {
    if buffer.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(buffer).into_owned();
    sink.send_output(&text).await;
    buffer.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MockSink;

    #[tokio::test]
    async fn flush_sends_accumulated_bytes_and_clears_buffer() {
        let mock = Arc::new(MockSink::default());
        let sink: DynSink = mock.clone();
        let mut buffer = b"hello world".to_vec();
        flush(&sink, &mut buffer).await;
        assert!(buffer.is_empty());
        assert_eq!(mock.outputs.lock().await[0], "hello world");
    }

    #[tokio::test]
    async fn flush_on_empty_buffer_sends_nothing() {
        let mock = Arc::new(MockSink::default());
        let sink: DynSink = mock.clone();
        let mut buffer = Vec::new();
        flush(&sink, &mut buffer).await;
        assert!(mock.outputs.lock().await.is_empty());
    }
}
