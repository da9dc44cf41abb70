use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::common::{mask_phone, mask_secret, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSource {
    /// Produced by a completed login.
    Login,
    /// Pasted in by a user as an already exported session string.
    Import,
}

/// A durable, authorized session that can be used to reconnect later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub id: String,
    pub owner_id: UserId,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub session_string: String,
    pub source: SessionSource,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub owner_id: UserId,
    pub phone_number: Option<String>,
    pub session_string: String,
    pub source: SessionSource,
}

/// What a session looks like outside the process: no raw secret, masked phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub owner_id: UserId,
    pub phone_number: Option<String>,
    pub source: SessionSource,
    pub created_at: DateTime<Utc>,
    pub preview: String,
}

impl StoredSession {
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            owner_id: self.owner_id,
            phone_number: self.phone_number.as_deref().map(mask_phone),
            source: self.source,
            created_at: self.created_at,
            preview: mask_secret(&self.session_string),
        }
    }
}

/// All stored sessions keyed by id. Serializes to the same `{"1": {...}}`
/// object the session file holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionBook {
    sessions: BTreeMap<String, StoredSession>,
}

impl SessionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Insert a session. A login for a phone the owner already has a session
    /// for replaces that session in place and keeps its id.
    pub fn upsert(&mut self, new: NewSession, now: DateTime<Utc>) -> StoredSession {
        let existing_id = new.phone_number.as_ref().and_then(|phone| {
            self.sessions
                .values()
                .find(|s| s.owner_id == new.owner_id && s.phone_number.as_ref() == Some(phone))
                .map(|s| s.id.clone())
        });

        let id = existing_id.unwrap_or_else(|| self.next_id());
        let session = StoredSession {
            id: id.clone(),
            owner_id: new.owner_id,
            phone_number: new.phone_number,
            session_string: new.session_string,
            source: new.source,
            created_at: now,
        };
        self.sessions.insert(id, session.clone());
        session
    }

    pub fn get(&self, id: &str) -> Option<&StoredSession> {
        self.sessions.get(id)
    }

    /// Sessions in id order, optionally restricted to one owner.
    pub fn list(&self, owner: Option<UserId>) -> Vec<StoredSession> {
        let mut sessions: Vec<StoredSession> = self
            .sessions
            .values()
            .filter(|s| owner.map_or(true, |o| s.owner_id == o))
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.id.parse::<u64>().unwrap_or(u64::MAX));
        sessions
    }

    fn next_id(&self) -> String {
        let max = self
            .sessions
            .keys()
            .filter_map(|k| k.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        (max + 1).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login(owner: i64, phone: &str, session: &str) -> NewSession {
        NewSession {
            owner_id: UserId::new(owner),
            phone_number: Some(phone.to_string()),
            session_string: session.to_string(),
            source: SessionSource::Login,
        }
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut book = SessionBook::new();
        let a = book.upsert(login(1, "+15550000001", "a"), Utc::now());
        let b = book.upsert(login(1, "+15550000002", "b"), Utc::now());
        assert_eq!(a.id, "1");
        assert_eq!(b.id, "2");
    }

    #[test]
    fn test_same_owner_and_phone_replaces_in_place() {
        let mut book = SessionBook::new();
        book.upsert(login(1, "+15550000001", "old"), Utc::now());
        let replaced = book.upsert(login(1, "+15550000001", "new"), Utc::now());

        assert_eq!(book.len(), 1);
        assert_eq!(replaced.id, "1");
        assert_eq!(book.list(None)[0].session_string, "new");
    }

    #[test]
    fn test_same_phone_different_owner_is_separate() {
        let mut book = SessionBook::new();
        book.upsert(login(1, "+15550000001", "a"), Utc::now());
        book.upsert(login(2, "+15550000001", "b"), Utc::now());
        assert_eq!(book.len(), 2);
        assert_eq!(book.list(Some(UserId::new(2))).len(), 1);
    }

    #[test]
    fn test_imports_never_merge() {
        let mut book = SessionBook::new();
        let import = NewSession {
            owner_id: UserId::new(1),
            phone_number: None,
            session_string: "x".to_string(),
            source: SessionSource::Import,
        };
        book.upsert(import.clone(), Utc::now());
        book.upsert(import, Utc::now());
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_get_by_id() {
        let mut book = SessionBook::new();
        book.upsert(login(1, "+15551234567", "abc"), Utc::now());
        assert_eq!(book.get("1").map(|s| s.session_string.as_str()), Some("abc"));
        assert!(book.get("2").is_none());
    }

    #[test]
    fn test_list_sorts_numerically() {
        let mut book = SessionBook::new();
        for i in 0..11 {
            book.upsert(login(1, &format!("+1555000{:04}", i), "s"), Utc::now());
        }
        let ids: Vec<String> = book.list(None).into_iter().map(|s| s.id).collect();
        assert_eq!(ids.first().map(String::as_str), Some("1"));
        assert_eq!(ids.last().map(String::as_str), Some("11"));
    }

    #[test]
    fn test_summary_hides_secret() {
        let mut book = SessionBook::new();
        let stored = book.upsert(login(1, "+15551234567", "1BVtsOKoBu1234567890"), Utc::now());
        let summary = stored.summary();
        assert_eq!(summary.phone_number.as_deref(), Some("+155******67"));
        assert!(!summary.preview.contains("1234567890"));
    }

    #[test]
    fn test_book_round_trips_through_json_object() {
        let mut book = SessionBook::new();
        book.upsert(login(1, "+15551234567", "abc"), Utc::now());
        let json = serde_json::to_value(&book).unwrap();
        assert!(json.get("1").is_some());
        let back: SessionBook = serde_json::from_value(json).unwrap();
        assert_eq!(back.len(), 1);
    }
}
