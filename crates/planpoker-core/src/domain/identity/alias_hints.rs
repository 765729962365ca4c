//! Locally remembered aliases
//!
//! A hint lives only as long as the local context that wrote it (one browser
//! tab, one process). It is never shared through the store.

use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Storage key for the alias hint of `session_id`
pub fn hint_key(session_id: Uuid) -> String {
    format!("session-alias-{}", session_id)
}

/// Per-session alias hint persistence
pub trait AliasHints: Send + Sync {
    fn get(&self, session_id: Uuid) -> Option<String>;
    fn set(&self, session_id: Uuid, alias: &str);
}

/// Hints kept in process memory
#[derive(Debug, Default)]
pub struct MemoryAliasHints {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryAliasHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AliasHints for MemoryAliasHints {
    fn get(&self, session_id: Uuid) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&hint_key(session_id))
            .cloned()
    }

    fn set(&self, session_id: Uuid, alias: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(hint_key(session_id), alias.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_key_format() {
        let id = Uuid::parse_str("123e4567-e89b-12d3-a456-426614174000").unwrap();
        assert_eq!(
            hint_key(id),
            "session-alias-123e4567-e89b-12d3-a456-426614174000"
        );
    }

    #[test]
    fn test_hints_scoped_per_session() {
        let hints = MemoryAliasHints::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        hints.set(a, "Sam");
        assert_eq!(hints.get(a).as_deref(), Some("Sam"));
        assert_eq!(hints.get(b), None);

        hints.set(a, "Samantha");
        assert_eq!(hints.get(a).as_deref(), Some("Samantha"));
        assert_eq!(hints.len(), 1);
    }
}
