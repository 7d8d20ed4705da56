//! Per-chat list of generated characters, stored as one JSON array under a
//! well-known key, newest first.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;

use crate::db::Database;
use crate::forge::record::GeneratedCharacter;
use crate::forge::sanitize::sanitize;

pub const ROSTER_KEY: &str = "forge_roster";

fn chat_scope(chat_id: i64) -> String {
    format!("chat:{chat_id}")
}

/// Reads one stored entry. The profile part goes back through the
/// sanitizer so rows written by older versions still render.
fn parse_entry(value: &Value) -> Option<GeneratedCharacter> {
    let object = value.as_object()?;
    let id = object
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())?
        .to_string();
    let timestamp = object.get("timestamp").and_then(Value::as_i64).unwrap_or(0);
    let image_url = object
        .get("imageUrl")
        .and_then(Value::as_str)
        .filter(|url| url.starts_with("data:"))
        .map(str::to_string);

    Some(GeneratedCharacter {
        id,
        timestamp,
        image_url,
        record: sanitize(value),
    })
}

pub fn parse_roster(text: &str) -> Vec<GeneratedCharacter> {
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(err) => {
            warn!("Stored roster is not valid JSON, starting empty: {}", err);
            return Vec::new();
        }
    };
    let Some(items) = value.as_array() else {
        warn!("Stored roster is not a JSON array, starting empty");
        return Vec::new();
    };

    let entries: Vec<GeneratedCharacter> = items.iter().filter_map(parse_entry).collect();
    if entries.len() != items.len() {
        warn!(
            "Dropped {} unreadable roster entries",
            items.len() - entries.len()
        );
    }
    entries
}

/// Puts `character` first. An entry with the same id is replaced rather
/// than duplicated, and the list is cut to `max_entries`.
pub fn insert_character(
    roster: &mut Vec<GeneratedCharacter>,
    character: GeneratedCharacter,
    max_entries: usize,
) {
    roster.retain(|entry| entry.id != character.id);
    roster.insert(0, character);
    roster.truncate(max_entries.max(1));
}

pub fn remove_character(
    roster: &mut Vec<GeneratedCharacter>,
    id: &str,
) -> Option<GeneratedCharacter> {
    let index = roster.iter().position(|entry| entry.id == id)?;
    Some(roster.remove(index))
}

#[derive(Debug, PartialEq)]
pub enum PrefixMatch<'a> {
    NotFound,
    Unique(&'a GeneratedCharacter),
    Ambiguous(usize),
}

pub fn find_by_prefix<'a>(roster: &'a [GeneratedCharacter], prefix: &str) -> PrefixMatch<'a> {
    let prefix = prefix.trim().to_ascii_lowercase();
    if prefix.is_empty() {
        return PrefixMatch::NotFound;
    }
    let matches: Vec<&GeneratedCharacter> = roster
        .iter()
        .filter(|entry| entry.id.to_ascii_lowercase().starts_with(&prefix))
        .collect();
    match matches.as_slice() {
        [] => PrefixMatch::NotFound,
        [only] => PrefixMatch::Unique(only),
        many => PrefixMatch::Ambiguous(many.len()),
    }
}

/// Load-modify-store of one chat's roster runs under that chat's lock so
/// overlapping saves and removals never drop each other's writes.
#[derive(Clone)]
pub struct RosterStore {
    db: Database,
    max_entries: usize,
    chat_locks: Arc<parking_lot::Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>>,
}

impl RosterStore {
    pub fn new(db: Database, max_entries: usize) -> Self {
        RosterStore {
            db,
            max_entries,
            chat_locks: Arc::new(parking_lot::Mutex::new(HashMap::new())),
        }
    }

    fn chat_lock(&self, chat_id: i64) -> Arc<AsyncMutex<()>> {
        Arc::clone(self.chat_locks.lock().entry(chat_id).or_default())
    }

    pub async fn load(&self, chat_id: i64) -> Result<Vec<GeneratedCharacter>> {
        let row = self.db.get_value(&chat_scope(chat_id), ROSTER_KEY).await?;
        Ok(row.map(|row| parse_roster(&row.value)).unwrap_or_default())
    }

    async fn store(&self, chat_id: i64, roster: &[GeneratedCharacter]) -> Result<()> {
        let text = serde_json::to_string(roster)?;
        self.db.set_value(&chat_scope(chat_id), ROSTER_KEY, &text).await
    }

    pub async fn save(&self, chat_id: i64, character: GeneratedCharacter) -> Result<usize> {
        let lock = self.chat_lock(chat_id);
        let _guard = lock.lock().await;
        let mut roster = self.load(chat_id).await?;
        insert_character(&mut roster, character, self.max_entries);
        self.store(chat_id, &roster).await?;
        Ok(roster.len())
    }

    pub async fn remove(&self, chat_id: i64, id: &str) -> Result<Option<GeneratedCharacter>> {
        let lock = self.chat_lock(chat_id);
        let _guard = lock.lock().await;
        let mut roster = self.load(chat_id).await?;
        let removed = remove_character(&mut roster, id);
        if removed.is_some() {
            self.store(chat_id, &roster).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::database::temp_database;
    use crate::forge::record::CharacterRecord;
    use serde_json::json;

    fn character(id: &str, name: &str) -> GeneratedCharacter {
        GeneratedCharacter {
            id: id.to_string(),
            timestamp: 1_700_000_000_000,
            image_url: None,
            record: CharacterRecord {
                name: name.to_string(),
                ..CharacterRecord::default()
            },
        }
    }

    #[test]
    fn insert_prepends_replaces_and_caps() {
        let mut roster = vec![character("b", "Old B"), character("a", "A")];
        insert_character(&mut roster, character("c", "C"), 3);
        insert_character(&mut roster, character("b", "New B"), 3);

        let ids: Vec<&str> = roster.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(roster[0].record.name, "New B");

        insert_character(&mut roster, character("d", "D"), 3);
        assert_eq!(roster.len(), 3);
        assert_eq!(roster.last().unwrap().id, "c");
    }

    #[test]
    fn prefix_lookup_reports_ambiguity() {
        let roster = vec![character("abc123", "One"), character("abd456", "Two")];
        assert_eq!(find_by_prefix(&roster, "ab"), PrefixMatch::Ambiguous(2));
        assert_eq!(find_by_prefix(&roster, "ABD"), PrefixMatch::Unique(&roster[1]));
        assert_eq!(find_by_prefix(&roster, "zz"), PrefixMatch::NotFound);
        assert_eq!(find_by_prefix(&roster, "  "), PrefixMatch::NotFound);
    }

    #[test]
    fn legacy_entries_are_resanitized() {
        let text = json!([
            { "id": "x1", "timestamp": 5, "name": "Legacy", "weapon": null, "imageUrl": "https://not-inline" },
            { "timestamp": 6, "name": "No id" },
            "garbage"
        ])
        .to_string();

        let roster = parse_roster(&text);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].record.name, "Legacy");
        assert_eq!(roster[0].record.weapon.name, "Unarmed");
        assert_eq!(roster[0].image_url, None);
    }

    #[test]
    fn unreadable_roster_is_empty() {
        assert!(parse_roster("not json").is_empty());
        assert!(parse_roster("{\"id\":\"x\"}").is_empty());
    }

    #[tokio::test]
    async fn store_round_trips_per_chat() {
        let (_dir, db) = temp_database().await;
        let store = RosterStore::new(db, 2);

        store.save(1, character("a", "A")).await.unwrap();
        store.save(1, character("b", "B")).await.unwrap();
        assert_eq!(store.save(1, character("c", "C")).await.unwrap(), 2);
        store.save(2, character("z", "Z")).await.unwrap();

        let roster = store.load(1).await.unwrap();
        let ids: Vec<&str> = roster.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);

        let removed = store.remove(1, "c").await.unwrap();
        assert_eq!(removed.map(|entry| entry.record.name), Some("C".to_string()));
        assert!(store.remove(1, "c").await.unwrap().is_none());
        assert_eq!(store.load(1).await.unwrap().len(), 1);
        assert_eq!(store.load(2).await.unwrap()[0].id, "z");
        assert!(store.load(3).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_saves_and_removals_keep_every_write() {
        let (_dir, db) = temp_database().await;
        let store = RosterStore::new(db, 50);
        store.save(1, character("victim", "Victim")).await.unwrap();

        let mut tasks = Vec::new();
        for index in 0..10 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .save(1, character(&format!("id{index}"), "Racer"))
                    .await
                    .unwrap();
            }));
        }
        let remover = store.clone();
        tasks.push(tokio::spawn(async move {
            remover.remove(1, "victim").await.unwrap();
        }));
        for task in tasks {
            task.await.unwrap();
        }

        let roster = store.load(1).await.unwrap();
        assert_eq!(roster.len(), 10);
        assert!(roster.iter().all(|entry| entry.id != "victim"));
    }
}
