//! Chat streamer: batches PTY output into chat-sized updates instead of relaying every
//! byte. Ticks every 200ms; once output has been quiet for `SETTLE` it emits whatever
//! accumulated, and if output never quiets down it force-emits every `FORCE_EMIT`
//! anyway so a long-running command still produces visible progress. A typing-style
//! status line goes out every `TYPING_INTERVAL` while output is actively arriving but
//! hasn't settled yet.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{diff_new_lines, split_lines, SentLineCache, IDLE_TIMEOUT};
use crate::chrome_filter::clean_chrome;
use crate::log::prefix;
use crate::pty::PtySession;
use crate::screen::VirtualScreen;
use crate::sink::DynSink;

const TICK: Duration = Duration::from_millis(200);
const SETTLE: Duration = Duration::from_millis(1500);
const FORCE_EMIT: Duration = Duration::from_secs(5);
const TYPING_INTERVAL: Duration = Duration::from_secs(4);

pub async fn run(
    pty: Arc<PtySession>,
    mut output_rx: mpsc::Receiver<Vec<u8>>,
    screen: Arc<VirtualScreen>,
    sink: DynSink,
) {
    let mut last_activity = Instant::now();
    let mut last_emit = Instant::now();
    let mut last_typing = Instant::now() - TYPING_INTERVAL;
    let mut dirty_since_emit = false;
    let mut cache = SentLineCache::new();
    let mut last_emitted_lines: Vec<String> = Vec::new();
    let mut interval = tokio::time::interval(TICK);

    loop {
        tokio::select! {
            chunk = output_rx.recv() => {
                match chunk {
                    Some(bytes) => {
                        screen.write(&bytes);
                        last_activity = Instant::now();
                        dirty_since_emit = true;
                    }
                    None => {
                        emit(&screen, &sink, &mut cache, &mut last_emitted_lines).await;
                        sink.send_status("[session ended]").await;
                        return;
                    }
                }
            }
            _ = interval.tick() => {
                if pty.is_closed() {
                    emit(&screen, &sink, &mut cache, &mut last_emitted_lines).await;
                    return;
                }
                if last_activity.elapsed() >= IDLE_TIMEOUT {
                    eprintln!("{} event=idle_timeout", prefix("streamer.chat"));
                    pty.close();
                    return;
                }
                let settled = dirty_since_emit && Instant::now().duration_since(last_activity) >= SETTLE;
                let forced = dirty_since_emit && last_emit.elapsed() >= FORCE_EMIT;
                if settled || forced {
                    emit(&screen, &sink, &mut cache, &mut last_emitted_lines).await;
                    last_emit = Instant::now();
                    dirty_since_emit = false;
                } else if dirty_since_emit && last_typing.elapsed() >= TYPING_INTERVAL {
                    sink.send_status("...").await;
                    last_typing = Instant::now();
                }
            }
        }
    }
}

async fn emit(
    screen: &VirtualScreen,
    sink: &DynSink,
    cache: &mut SentLineCache,
    last_emitted_lines: &mut Vec<String>,
) {
    let text = clean_chrome(&screen.screen_text());
    let new_lines = split_lines(&text);
    let fresh = diff_new_lines(last_emitted_lines, &new_lines, cache);
    *last_emitted_lines = new_lines;
    if fresh.is_empty() {
        return;
    }
    sink.send_output(&fresh.join("\n")).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MockSink;

    #[tokio::test]
    async fn emits_only_new_lines_across_calls() {
        let screen = Arc::new(VirtualScreen::new(24, 80));
        let mock = Arc::new(MockSink::default());
        let sink: DynSink = mock.clone();
        let mut cache = SentLineCache::new();
        let mut last = Vec::new();

        screen.write(b"line one\r\n");
        emit(&screen, &sink, &mut cache, &mut last).await;
        screen.write(b"line two\r\n");
        emit(&screen, &sink, &mut cache, &mut last).await;

        let outputs = mock.outputs.lock().await;
        assert_eq!(outputs.len(), 2);
        assert!(outputs[0].contains("line one"));
        assert!(outputs[1].contains("line two"));
        assert!(!outputs[1].contains("line one"));
    }

    #[tokio::test]
    async fn quiet_repeated_emit_sends_nothing() {
        let screen = Arc::new(VirtualScreen::new(24, 80));
        let mock = Arc::new(MockSink::default());
        let sink: DynSink = mock.clone();
        let mut cache = SentLineCache::new();
        let mut last = Vec::new();

        screen.write(b"same line\r\n");
        emit(&screen, &sink, &mut cache, &mut last).await;
        emit(&screen, &sink, &mut cache, &mut last).await;

        assert_eq!(mock.outputs.lock().await.len(), 1);
    }
}
