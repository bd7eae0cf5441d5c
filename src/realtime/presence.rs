//! Presence registry
//!
//! In-memory map of account id to the set of connections registered for
//! it. An account is online while its set is non-empty. Nothing here is
//! persisted; a restart starts with everyone offline.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use super::ConnectionId;
use crate::metrics::ONLINE_ACCOUNTS;

#[derive(Default)]
struct PresenceState {
    by_account: HashMap<String, HashSet<ConnectionId>>,
    /// Reverse index for O(1) disconnect
    by_connection: HashMap<ConnectionId, String>,
}

impl PresenceState {
    fn detach(&mut self, connection: ConnectionId) -> Option<(String, bool)> {
        let account_id = self.by_connection.remove(&connection)?;
        let went_offline = match self.by_account.get_mut(&account_id) {
            Some(connections) => {
                connections.remove(&connection);
                connections.is_empty()
            }
            None => true,
        };
        if went_offline {
            self.by_account.remove(&account_id);
        }
        Some((account_id, went_offline))
    }
}

#[derive(Default)]
pub struct PresenceRegistry {
    state: RwLock<PresenceState>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `connection` to `account_id`
    ///
    /// Re-registering a connection under another account moves it.
    pub async fn register(&self, connection: ConnectionId, account_id: &str) {
        let mut state = self.state.write().await;
        state.detach(connection);
        state
            .by_account
            .entry(account_id.to_string())
            .or_default()
            .insert(connection);
        state
            .by_connection
            .insert(connection, account_id.to_string());
        ONLINE_ACCOUNTS.set(state.by_account.len() as i64);
    }

    /// Drop `connection`
    ///
    /// # Returns
    /// The account it was registered to and whether that account is now
    /// offline, or `None` if the connection never registered
    pub async fn unregister(&self, connection: ConnectionId) -> Option<(String, bool)> {
        let mut state = self.state.write().await;
        let detached = state.detach(connection);
        ONLINE_ACCOUNTS.set(state.by_account.len() as i64);
        detached
    }

    pub async fn account_of(&self, connection: ConnectionId) -> Option<String> {
        self.state
            .read()
            .await
            .by_connection
            .get(&connection)
            .cloned()
    }

    pub async fn connections_of(&self, account_id: &str) -> Vec<ConnectionId> {
        self.state
            .read()
            .await
            .by_account
            .get(account_id)
            .map(|connections| connections.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn is_online(&self, account_id: &str) -> bool {
        self.state.read().await.by_account.contains_key(account_id)
    }

    /// Registered account ids, sorted
    pub async fn online_accounts(&self) -> Vec<String> {
        let mut accounts: Vec<String> = self
            .state
            .read()
            .await
            .by_account
            .keys()
            .cloned()
            .collect();
        accounts.sort();
        accounts
    }
}
