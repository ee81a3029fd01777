//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use uuid::Uuid;

use microseed::domain::user::{User, UserError, UserService};
use microseed::lifecycle::Hook;

/// Ordered log of lifecycle events, shared between hooks.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// A hook that writes `start:<name>` and `stop:<name>` to `journal`.
pub fn recording_hook(name: &str, journal: &Journal) -> Hook {
    let (on_start, on_stop) = (journal.clone(), journal.clone());
    let (start_event, stop_event) = (format!("start:{name}"), format!("stop:{name}"));
    Hook::new(name)
        .on_start(move |_| async move {
            on_start.record(start_event);
            Ok(())
        })
        .on_stop(move |_| async move {
            on_stop.record(stop_event);
            Ok(())
        })
}

/// In-memory user lookups.
#[derive(Default)]
pub struct InMemoryUsers {
    users: HashMap<Uuid, User>,
}

impl InMemoryUsers {
    pub fn with(mut self, email: &str) -> (Self, Uuid) {
        let id = Uuid::now_v7();
        self.users.insert(
            id,
            User {
                id,
                email: email.to_string(),
                created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            },
        );
        (self, id)
    }
}

#[async_trait]
impl UserService for InMemoryUsers {
    async fn get_by_id(&self, id: Uuid) -> Result<User, UserError> {
        self.users.get(&id).cloned().ok_or(UserError::NotFound(id))
    }
}
