use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use plaza_core::chat::{ChatDraft, ChatRecord};
use plaza_core::time::timestamp_millis;

#[derive(Debug)]
pub enum ChatStoreError {
    Unavailable(String),
}

impl std::fmt::Display for ChatStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(e) => write!(f, "chat store unavailable: {e}"),
        }
    }
}

impl std::error::Error for ChatStoreError {}

/// Durable chat store collaborator. Assigns the room-scoped sequence id and
/// creation timestamp; the returned record is what gets broadcast.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn append(&self, room_id: &str, draft: ChatDraft) -> Result<ChatRecord, ChatStoreError>;

    /// Most recent messages for a room, oldest first.
    async fn load_recent(&self, room_id: &str, limit: usize) -> Vec<ChatRecord>;
}

struct RoomLog {
    next_id: u64,
    records: VecDeque<ChatRecord>,
}

/// In-memory chat store with a per-room retention cap.
pub struct MemoryChatStore {
    history_cap: usize,
    inner: Mutex<HashMap<String, RoomLog>>,
}

impl MemoryChatStore {
    pub fn new(history_cap: usize) -> Self {
        Self {
            history_cap,
            inner: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn append(&self, room_id: &str, draft: ChatDraft) -> Result<ChatRecord, ChatStoreError> {
        let mut logs = self.inner.lock().await;
        let log = logs.entry(room_id.to_string()).or_insert_with(|| RoomLog {
            next_id: 1,
            records: VecDeque::new(),
        });

        let record = ChatRecord {
            id: log.next_id,
            user_id: draft.user_id,
            display_name: draft.display_name,
            text: draft.text,
            created_at: timestamp_millis(),
        };
        log.next_id += 1;

        log.records.push_back(record.clone());
        while log.records.len() > self.history_cap {
            log.records.pop_front();
        }
        Ok(record)
    }

    async fn load_recent(&self, room_id: &str, limit: usize) -> Vec<ChatRecord> {
        let logs = self.inner.lock().await;
        match logs.get(room_id) {
            Some(log) => {
                let skip = log.records.len().saturating_sub(limit);
                log.records.iter().skip(skip).cloned().collect()
            },
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(user: &str, text: &str) -> ChatDraft {
        ChatDraft {
            user_id: user.to_string(),
            display_name: user.to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn append_assigns_sequential_room_scoped_ids() {
        let store = MemoryChatStore::new(100);
        let a = store.append("r1", draft("u-1", "one")).await.unwrap();
        let b = store.append("r1", draft("u-2", "two")).await.unwrap();
        let other = store.append("r2", draft("u-1", "elsewhere")).await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(other.id, 1); // sequences are per room
        assert!(a.created_at > 0);
    }

    #[tokio::test]
    async fn load_recent_returns_oldest_first_tail() {
        let store = MemoryChatStore::new(100);
        for i in 0..5 {
            store.append("r1", draft("u-1", &format!("m{i}"))).await.unwrap();
        }
        let recent = store.load_recent("r1", 3).await;
        let texts: Vec<_> = recent.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn history_cap_drops_oldest() {
        let store = MemoryChatStore::new(2);
        for i in 0..4 {
            store.append("r1", draft("u-1", &format!("m{i}"))).await.unwrap();
        }
        let recent = store.load_recent("r1", 10).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text, "m2");
        // ids keep counting past evicted records
        assert_eq!(recent[1].id, 4);
    }

    #[tokio::test]
    async fn unknown_room_loads_empty() {
        let store = MemoryChatStore::new(10);
        assert!(store.load_recent("nowhere", 5).await.is_empty());
    }
}
