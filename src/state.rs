use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::forge::pipeline::CharacterForge;
use crate::roster::RosterStore;

#[derive(Debug, Clone)]
pub struct InFlightRequest {
    pub request_id: String,
    pub started_at: Instant,
}

/// Releases the chat's in-flight slot when the request ends, however it ends.
pub struct InFlightGuard {
    chat_id: i64,
    request_id: String,
    in_flight: Arc<Mutex<HashMap<i64, InFlightRequest>>>,
}

impl InFlightGuard {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock();
        if in_flight
            .get(&self.chat_id)
            .is_some_and(|entry| entry.request_id == self.request_id)
        {
            in_flight.remove(&self.chat_id);
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub forge: CharacterForge,
    pub roster: RosterStore,
    pub in_flight: Arc<Mutex<HashMap<i64, InFlightRequest>>>,
}

impl AppState {
    pub fn new(forge: CharacterForge, roster: RosterStore) -> Self {
        AppState {
            forge,
            roster,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Claims the chat for one request. Returns the request already running
    /// if the chat is busy.
    pub fn begin_request(
        &self,
        chat_id: i64,
        request_id: &str,
    ) -> Result<InFlightGuard, InFlightRequest> {
        let mut in_flight = self.in_flight.lock();
        if let Some(existing) = in_flight.get(&chat_id) {
            return Err(existing.clone());
        }
        in_flight.insert(
            chat_id,
            InFlightRequest {
                request_id: request_id.to_string(),
                started_at: Instant::now(),
            },
        );
        Ok(InFlightGuard {
            chat_id,
            request_id: request_id.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::database::temp_database;
    use crate::llm::client::fake::FakeClient;

    async fn state() -> (tempfile::TempDir, AppState) {
        let (dir, db) = temp_database().await;
        let forge = CharacterForge::new(Arc::new(FakeClient::new("{}")));
        (dir, AppState::new(forge, RosterStore::new(db, 10)))
    }

    #[tokio::test]
    async fn one_request_per_chat() {
        let (_dir, state) = state().await;

        let guard = state.begin_request(1, "req-1").unwrap();
        assert_eq!(guard.request_id(), "req-1");
        let busy = state.begin_request(1, "req-2").err().unwrap();
        assert_eq!(busy.request_id, "req-1");
        assert!(state.begin_request(2, "req-3").is_ok());

        drop(guard);
        assert!(state.begin_request(1, "req-4").is_ok());
    }
}
