//! Webhook subscription persistence

use rusqlite::{params, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::warn;

use super::model::{NewSubscription, Subscription};
use crate::engine::database::{Database, RepositoryError};

pub trait SubscriptionRepository: Send + Sync {
    /// Every subscription, enabled or not, ordered by id.
    fn list(&self) -> Result<Vec<Subscription>, RepositoryError>;

    fn get(&self, id: i64) -> Result<Subscription, RepositoryError>;

    /// Store a new subscription and return its id.
    fn create(&self, subscription: &NewSubscription) -> Result<i64, RepositoryError>;

    /// Replace every field of an existing subscription.
    fn update(&self, id: i64, subscription: &NewSubscription) -> Result<(), RepositoryError>;

    fn delete(&self, id: i64) -> Result<(), RepositoryError>;
}

fn not_found(id: i64) -> RepositoryError {
    RepositoryError::NotFound(format!("webhook {}", id))
}

pub struct SqliteSubscriptionRepository {
    db: Database,
}

impl SqliteSubscriptionRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

type RawRow = (i64, String, String, bool);

fn decode(row: RawRow) -> Result<Subscription, serde_json::Error> {
    let (id, url, events, enabled) = row;
    Ok(Subscription {
        id,
        url,
        events: serde_json::from_str(&events)?,
        enabled,
    })
}

impl SubscriptionRepository for SqliteSubscriptionRepository {
    fn list(&self) -> Result<Vec<Subscription>, RepositoryError> {
        let conn = self.db.get_connection()?;
        let mut stmt = conn.prepare("SELECT id, url, events, enabled FROM webhooks ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
            .collect::<Result<Vec<RawRow>, _>>()?;

        let mut subscriptions = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.0;
            match decode(row) {
                Ok(sub) => subscriptions.push(sub),
                Err(e) => warn!(id, error = %e, "skipping webhook with malformed events"),
            }
        }
        Ok(subscriptions)
    }

    fn get(&self, id: i64) -> Result<Subscription, RepositoryError> {
        let conn = self.db.get_connection()?;
        let row: Option<RawRow> = conn
            .query_row(
                "SELECT id, url, events, enabled FROM webhooks WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        let row = row.ok_or_else(|| not_found(id))?;
        Ok(decode(row)?)
    }

    fn create(&self, subscription: &NewSubscription) -> Result<i64, RepositoryError> {
        let conn = self.db.get_connection()?;
        let events = serde_json::to_string(&subscription.events)?;
        conn.execute(
            "INSERT INTO webhooks (url, events, enabled) VALUES (?1, ?2, ?3)",
            params![subscription.url, events, subscription.enabled],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update(&self, id: i64, subscription: &NewSubscription) -> Result<(), RepositoryError> {
        let conn = self.db.get_connection()?;
        let events = serde_json::to_string(&subscription.events)?;
        let affected = conn.execute(
            "UPDATE webhooks SET url = ?1, events = ?2, enabled = ?3 WHERE id = ?4",
            params![subscription.url, events, subscription.enabled, id],
        )?;
        if affected == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let conn = self.db.get_connection()?;
        let affected = conn.execute("DELETE FROM webhooks WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    rows: BTreeMap<i64, Subscription>,
}

/// In-memory repository for tests and ephemeral setups
#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    state: RwLock<MemoryState>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubscriptionRepository for InMemorySubscriptionRepository {
    fn list(&self) -> Result<Vec<Subscription>, RepositoryError> {
        let state = self.state.read().map_err(|_| RepositoryError::Poisoned)?;
        Ok(state.rows.values().cloned().collect())
    }

    fn get(&self, id: i64) -> Result<Subscription, RepositoryError> {
        let state = self.state.read().map_err(|_| RepositoryError::Poisoned)?;
        state.rows.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    fn create(&self, subscription: &NewSubscription) -> Result<i64, RepositoryError> {
        let mut state = self.state.write().map_err(|_| RepositoryError::Poisoned)?;
        state.next_id += 1;
        let id = state.next_id;
        state.rows.insert(
            id,
            Subscription {
                id,
                url: subscription.url.clone(),
                events: subscription.events.clone(),
                enabled: subscription.enabled,
            },
        );
        Ok(id)
    }

    fn update(&self, id: i64, subscription: &NewSubscription) -> Result<(), RepositoryError> {
        let mut state = self.state.write().map_err(|_| RepositoryError::Poisoned)?;
        let row = state.rows.get_mut(&id).ok_or_else(|| not_found(id))?;
        row.url = subscription.url.clone();
        row.events = subscription.events.clone();
        row.enabled = subscription.enabled;
        Ok(())
    }

    fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let mut state = self.state.write().map_err(|_| RepositoryError::Poisoned)?;
        state.rows.remove(&id).map(|_| ()).ok_or_else(|| not_found(id))
    }
}
