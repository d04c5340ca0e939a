// ABOUTME: Durable correlation store: seq->message_id, remote_id->message_id, cached payloads
// ABOUTME: All entries carry a TTL; a miss is a well-defined Option::None, never an error variant

use crate::gateway::clock::Clock;
use crate::gateway::types::OutboundMessage;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum StashError {
    #[error("stash backend unavailable: {0}")]
    Backend(String),
}

pub type StashResult<T> = Result<T, StashError>;

/// One partial multipart message: segment index -> decoded text, plus the declared total.
#[derive(Debug, Clone, Default)]
pub struct MultipartSet {
    pub total: Option<u8>,
    pub segments: HashMap<u8, String>,
}

impl MultipartSet {
    /// Concatenates segments 1..=total in order. Returns None if any segment is missing.
    pub fn assemble(&self) -> Option<String> {
        let total = self.total?;
        let mut out = String::new();
        for i in 1..=total {
            out.push_str(self.segments.get(&i)?);
        }
        Some(out)
    }
}

/// The correlation store described in the data model: `seq:<n>`, `msg:<id>`,
/// `remote:<id>`, and `multipart:<ref>:<from>:<to>` entries, each TTL'd.
pub trait MessageStash: Send + Sync {
    async fn cache_message(&self, msg: OutboundMessage, ttl: Duration) -> StashResult<()>;
    async fn get_cached_message(&self, id: &str) -> StashResult<Option<OutboundMessage>>;
    async fn delete_cached_message(&self, id: &str) -> StashResult<()>;

    async fn set_sequence_number_message_id(
        &self,
        seq: u32,
        message_id: String,
        ttl: Duration,
    ) -> StashResult<()>;
    /// Consuming lookup: removes the entry as it is read.
    async fn get_sequence_number_message_id(&self, seq: u32) -> StashResult<Option<String>>;

    async fn set_remote_message_id(
        &self,
        internal_id: String,
        remote_id: String,
        ttl: Duration,
    ) -> StashResult<()>;
    async fn get_internal_message_id(&self, remote_id: &str) -> StashResult<Option<String>>;

    async fn store_multipart_segment(
        &self,
        key: &str,
        seg_index: u8,
        total: u8,
        text: String,
        ttl: Duration,
    ) -> StashResult<MultipartSet>;
    /// Atomically removes and returns the set stored under `key`, if any.
    async fn take_multipart(&self, key: &str) -> StashResult<Option<MultipartSet>>;
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// In-process implementation backed by a mutex-guarded map, suitable for a
/// single-instance gateway or for tests. A networked implementation would
/// satisfy the same trait against Redis or similar.
pub struct MemoryStash<C: Clock> {
    clock: Arc<C>,
    messages: Mutex<HashMap<String, Entry<OutboundMessage>>>,
    seq_index: Mutex<HashMap<u32, Entry<String>>>,
    remote_index: Mutex<HashMap<String, Entry<String>>>,
    multipart: Mutex<HashMap<String, Entry<MultipartSet>>>,
}

impl<C: Clock> MemoryStash<C> {
    pub fn new(clock: Arc<C>) -> Self {
        Self {
            clock,
            messages: Mutex::new(HashMap::new()),
            seq_index: Mutex::new(HashMap::new()),
            remote_index: Mutex::new(HashMap::new()),
            multipart: Mutex::new(HashMap::new()),
        }
    }

    fn deadline(&self, ttl: Duration) -> Instant {
        self.clock.now() + ttl
    }
}

fn fresh<V>(entry: Option<Entry<V>>, now: Instant) -> Option<V> {
    entry.and_then(|e| if e.expires_at > now { Some(e.value) } else { None })
}

impl<C: Clock> MessageStash for MemoryStash<C> {
    async fn cache_message(&self, msg: OutboundMessage, ttl: Duration) -> StashResult<()> {
        let expires_at = self.deadline(ttl);
        self.messages.lock().await.insert(
            msg.message_id.clone(),
            Entry {
                value: msg,
                expires_at,
            },
        );
        Ok(())
    }

    async fn get_cached_message(&self, id: &str) -> StashResult<Option<OutboundMessage>> {
        let now = self.clock.now();
        let guard = self.messages.lock().await;
        Ok(guard.get(id).and_then(|e| {
            if e.expires_at > now {
                Some(e.value.clone())
            } else {
                None
            }
        }))
    }

    async fn delete_cached_message(&self, id: &str) -> StashResult<()> {
        self.messages.lock().await.remove(id);
        Ok(())
    }

    async fn set_sequence_number_message_id(
        &self,
        seq: u32,
        message_id: String,
        ttl: Duration,
    ) -> StashResult<()> {
        let expires_at = self.deadline(ttl);
        self.seq_index.lock().await.insert(
            seq,
            Entry {
                value: message_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn get_sequence_number_message_id(&self, seq: u32) -> StashResult<Option<String>> {
        let now = self.clock.now();
        let mut guard = self.seq_index.lock().await;
        Ok(fresh(guard.remove(&seq), now))
    }

    async fn set_remote_message_id(
        &self,
        internal_id: String,
        remote_id: String,
        ttl: Duration,
    ) -> StashResult<()> {
        let expires_at = self.deadline(ttl);
        self.remote_index.lock().await.insert(
            remote_id,
            Entry {
                value: internal_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn get_internal_message_id(&self, remote_id: &str) -> StashResult<Option<String>> {
        let now = self.clock.now();
        let guard = self.remote_index.lock().await;
        Ok(guard.get(remote_id).and_then(|e| {
            if e.expires_at > now {
                Some(e.value.clone())
            } else {
                None
            }
        }))
    }

    async fn store_multipart_segment(
        &self,
        key: &str,
        seg_index: u8,
        total: u8,
        text: String,
        ttl: Duration,
    ) -> StashResult<MultipartSet> {
        let expires_at = self.deadline(ttl);
        let mut guard = self.multipart.lock().await;
        let entry = guard.entry(key.to_string()).or_insert_with(|| Entry {
            value: MultipartSet::default(),
            expires_at,
        });
        entry.value.total = Some(total);
        entry.value.segments.insert(seg_index, text);
        entry.expires_at = expires_at;
        Ok(entry.value.clone())
    }

    async fn take_multipart(&self, key: &str) -> StashResult<Option<MultipartSet>> {
        let now = self.clock.now();
        let mut guard = self.multipart.lock().await;
        Ok(fresh(guard.remove(key), now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::clock::VirtualClock;
    use crate::gateway::types::TransportType;

    fn sample_message(id: &str) -> OutboundMessage {
        OutboundMessage {
            message_id: id.to_string(),
            to_addr: "123".to_string(),
            from_addr: "456".to_string(),
            content: "hi".to_string(),
            transport_type: TransportType::Sms,
            session_event: None,
        }
    }

    #[tokio::test]
    async fn seq_lookup_is_consuming() {
        let clock = Arc::new(VirtualClock::new());
        let stash = MemoryStash::new(clock);
        stash
            .set_sequence_number_message_id(7, "abc".into(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            stash.get_sequence_number_message_id(7).await.unwrap(),
            Some("abc".to_string())
        );
        assert_eq!(stash.get_sequence_number_message_id(7).await.unwrap(), None);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let clock = Arc::new(VirtualClock::new());
        let stash = MemoryStash::new(clock.clone());
        stash
            .cache_message(sample_message("m1"), Duration::from_secs(10))
            .await
            .unwrap();
        assert!(stash.get_cached_message("m1").await.unwrap().is_some());
        clock.advance(Duration::from_secs(11));
        assert!(stash.get_cached_message("m1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn multipart_assembles_out_of_order() {
        let clock = Arc::new(VirtualClock::new());
        let stash = MemoryStash::new(clock);
        let key = "ref:1:from:to";
        stash
            .store_multipart_segment(key, 1, 3, "back".into(), Duration::from_secs(60))
            .await
            .unwrap();
        stash
            .store_multipart_segment(key, 3, 3, " you".into(), Duration::from_secs(60))
            .await
            .unwrap();
        let set = stash
            .store_multipart_segment(key, 2, 3, " at".into(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(set.assemble().unwrap(), "back at you");
    }

    #[tokio::test]
    async fn missing_remote_id_is_none_not_error() {
        let clock = Arc::new(VirtualClock::new());
        let stash = MemoryStash::new(clock);
        assert_eq!(stash.get_internal_message_id("nope").await.unwrap(), None);
    }
}
