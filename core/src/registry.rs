//! Session registry: one RW-locked map from client id to session record. Blocking PTY
//! teardown must never happen while the lock is held (`close()` can block on the reader
//! thread), so every delete and close-all here copies the `Arc` out, drops the lock, and
//! only then does the slow teardown work.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::pty::PtySession;
use crate::sink::DynSink;

pub struct SessionRecord {
    pub pty: Arc<PtySession>,
    pub sink: DynSink,
    pub command: String,
    pub started_at: u64,
    active: AtomicBool,
    stop_guard: std::sync::Mutex<()>,
}

impl SessionRecord {
    pub fn new(pty: Arc<PtySession>, sink: DynSink, command: String) -> Self {
        Self {
            pty,
            sink,
            command,
            started_at: unix_now_secs(),
            active: AtomicBool::new(true),
            stop_guard: std::sync::Mutex::new(()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Idempotent: the first caller performs the PTY teardown, later callers no-op.
    pub fn stop(&self) {
        let _guard = self.stop_guard.lock().unwrap();
        if self.active.swap(false, Ordering::SeqCst) {
            self.pty.close();
        }
    }
}

pub fn unix_now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionRecord>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record` only if `client_id` has no live session. Returns the record that
    /// ends up registered (the new one, or the pre-existing one if already present).
    pub fn create_if_absent(
        &self,
        client_id: &str,
        make: impl FnOnce() -> Arc<SessionRecord>,
    ) -> Arc<SessionRecord> {
        {
            let sessions = self.sessions.read().unwrap();
            if let Some(existing) = sessions.get(client_id) {
                return existing.clone();
            }
        }
        let mut sessions = self.sessions.write().unwrap();
        sessions
            .entry(client_id.to_string())
            .or_insert_with(make)
            .clone()
    }

    pub fn get(&self, client_id: &str) -> Option<Arc<SessionRecord>> {
        self.sessions.read().unwrap().get(client_id).cloned()
    }

    /// Remove and stop a single session. Copies the `Arc` out before releasing the
    /// write lock so `stop()`'s blocking PTY close never happens under the lock.
    pub fn delete(&self, client_id: &str) {
        let removed = self.sessions.write().unwrap().remove(client_id);
        if let Some(record) = removed {
            record.stop();
        }
    }

    /// Stop every session. Same copy-then-release-then-close discipline as `delete`,
    /// applied to the whole map at once.
    pub fn close_all(&self) {
        let drained: Vec<Arc<SessionRecord>> = {
            let mut sessions = self.sessions.write().unwrap();
            sessions.drain().map(|(_, v)| v).collect()
        };
        for record in drained {
            record.stop();
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MockSink;

    fn fake_record() -> Arc<SessionRecord> {
        let (pty, _rx) = crate::pty::spawn().expect("spawn pty");
        Arc::new(SessionRecord::new(pty, Arc::new(MockSink::default()), "bash".into()))
    }

    #[test]
    fn create_if_absent_does_not_replace_existing() {
        let reg = SessionRegistry::new();
        let first = reg.create_if_absent("a", fake_record);
        let second = reg.create_if_absent("a", fake_record);
        assert!(Arc::ptr_eq(&first, &second));
        first.stop();
    }

    #[test]
    fn delete_stops_and_removes() {
        let reg = SessionRegistry::new();
        let record = reg.create_if_absent("a", fake_record);
        reg.delete("a");
        assert!(reg.get("a").is_none());
        assert!(!record.is_active());
    }

    #[test]
    fn close_all_empties_registry() {
        let reg = SessionRegistry::new();
        reg.create_if_absent("a", fake_record);
        reg.create_if_absent("b", fake_record);
        reg.close_all();
        assert!(reg.is_empty());
    }
}
