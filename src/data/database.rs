//! SQLite database operations
//!
//! All database access goes through this module.
//! Multi-row mutations run as a single statement or inside a
//! `BEGIN IMMEDIATE` transaction so a rejected call writes nothing.

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, QueryBuilder, Sqlite};
use std::path::Path;
use std::str::FromStr;

use super::models::*;
use crate::error::AppError;

const DEFAULT_MAX_CONNECTIONS: u32 = 8;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

fn parse_edge_state(raw: &str) -> Result<EdgeState, AppError> {
    EdgeState::from_str(raw).map_err(AppError::Internal)
}

impl Database {
    /// Connect to the SQLite file at `path`, creating it if missing,
    /// and apply pending migrations.
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        Self::connect_with_pool_size(path, DEFAULT_MAX_CONNECTIONS).await
    }

    pub async fn connect_with_pool_size(
        path: &Path,
        max_connections: u32,
    ) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let db_path = path.to_str().ok_or_else(|| {
            AppError::Config(format!(
                "database path must be valid UTF-8: {}",
                path.display()
            ))
        })?;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Insert an account record if no record with this id exists
    ///
    /// # Returns
    /// true if a row was written
    pub async fn insert_account(&self, account: &Account) -> Result<bool, AppError> {
        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO accounts (id, username, display_name, is_private, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.username)
        .bind(&account.display_name)
        .bind(account.is_private)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(inserted.rows_affected() > 0)
    }

    pub async fn get_account(&self, id: &str) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, username, display_name, is_private, created_at, updated_at FROM accounts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Fetch several accounts at once; missing ids are skipped
    pub async fn get_accounts_by_ids(&self, ids: &[String]) -> Result<Vec<Account>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, username, display_name, is_private, created_at, updated_at FROM accounts WHERE id IN (",
        );
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let accounts = query
            .build_query_as::<Account>()
            .fetch_all(&self.pool)
            .await?;

        Ok(accounts)
    }

    /// Toggle the privacy flag
    ///
    /// Existing edges are left as they are.
    pub async fn set_account_private(&self, id: &str, is_private: bool) -> Result<bool, AppError> {
        let updated =
            sqlx::query("UPDATE accounts SET is_private = ?, updated_at = ? WHERE id = ?")
                .bind(is_private)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await?;

        Ok(updated.rows_affected() > 0)
    }

    // =========================================================================
    // Follow edges
    // =========================================================================

    /// Create the edge follower -> followee
    ///
    /// The edge is `pending` when the followee is private, `approved`
    /// otherwise. Runs in one immediate transaction so the existence check,
    /// the privacy read and the insert see the same snapshot.
    pub async fn create_follow_edge(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> Result<FollowOutcome, AppError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result: Result<FollowOutcome, AppError> = async {
            let is_private =
                sqlx::query_scalar::<_, bool>("SELECT is_private FROM accounts WHERE id = ?")
                    .bind(followee_id)
                    .fetch_optional(&mut *conn)
                    .await?;
            let Some(is_private) = is_private else {
                return Ok(FollowOutcome::TargetMissing);
            };

            let existing = sqlx::query_scalar::<_, String>(
                "SELECT state FROM follow_edges WHERE follower_id = ? AND followee_id = ?",
            )
            .bind(follower_id)
            .bind(followee_id)
            .fetch_optional(&mut *conn)
            .await?;
            if let Some(state) = existing {
                return Ok(FollowOutcome::Existing(parse_edge_state(&state)?));
            }

            let state = if is_private {
                EdgeState::Pending
            } else {
                EdgeState::Approved
            };
            let now = Utc::now();
            sqlx::query(
                r#"
                INSERT INTO follow_edges (follower_id, followee_id, state, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(follower_id)
            .bind(followee_id)
            .bind(state.as_str())
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await?;

            Ok(FollowOutcome::Created(state))
        }
        .await;

        match result {
            Ok(outcome) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(outcome)
            }
            Err(error) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(error)
            }
        }
    }

    /// Remove actor's edge to target in any state, plus any pending
    /// request from target to actor.
    ///
    /// An approved edge target -> actor is kept. Single statement, so it
    /// applies atomically.
    pub async fn remove_follow_edges(
        &self,
        actor_id: &str,
        target_id: &str,
    ) -> Result<u64, AppError> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM follow_edges
            WHERE (follower_id = ? AND followee_id = ?)
               OR (follower_id = ? AND followee_id = ? AND state = 'pending')
            "#,
        )
        .bind(actor_id)
        .bind(target_id)
        .bind(target_id)
        .bind(actor_id)
        .execute(&self.pool)
        .await?;

        Ok(deleted.rows_affected())
    }

    /// Promote a pending request to an approved edge
    ///
    /// # Returns
    /// false if no pending request from `requester_id` existed
    pub async fn approve_follow_request(
        &self,
        followee_id: &str,
        requester_id: &str,
    ) -> Result<bool, AppError> {
        let updated = sqlx::query(
            r#"
            UPDATE follow_edges SET state = 'approved', updated_at = ?
            WHERE follower_id = ? AND followee_id = ? AND state = 'pending'
            "#,
        )
        .bind(Utc::now())
        .bind(requester_id)
        .bind(followee_id)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() > 0)
    }

    /// Drop a pending request without creating an approved edge
    pub async fn delete_follow_request(
        &self,
        followee_id: &str,
        requester_id: &str,
    ) -> Result<bool, AppError> {
        let deleted = sqlx::query(
            "DELETE FROM follow_edges WHERE follower_id = ? AND followee_id = ? AND state = 'pending'",
        )
        .bind(requester_id)
        .bind(followee_id)
        .execute(&self.pool)
        .await?;

        Ok(deleted.rows_affected() > 0)
    }

    /// Remove an approved follower of `followee_id`
    pub async fn remove_follower(
        &self,
        followee_id: &str,
        follower_id: &str,
    ) -> Result<bool, AppError> {
        let deleted = sqlx::query(
            "DELETE FROM follow_edges WHERE follower_id = ? AND followee_id = ? AND state = 'approved'",
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(&self.pool)
        .await?;

        Ok(deleted.rows_affected() > 0)
    }

    pub async fn get_edge_state(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> Result<Option<EdgeState>, AppError> {
        let state = sqlx::query_scalar::<_, String>(
            "SELECT state FROM follow_edges WHERE follower_id = ? AND followee_id = ?",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_optional(&self.pool)
        .await?;

        state.as_deref().map(parse_edge_state).transpose()
    }

    /// Accounts `account_id` has an edge to, in the given state
    ///
    /// Approved gives `following`, pending gives `sentRequests`.
    pub async fn list_followees(
        &self,
        account_id: &str,
        state: EdgeState,
    ) -> Result<Vec<Account>, AppError> {
        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT a.id, a.username, a.display_name, a.is_private, a.created_at, a.updated_at
            FROM follow_edges e
            JOIN accounts a ON a.id = e.followee_id
            WHERE e.follower_id = ? AND e.state = ?
            ORDER BY e.created_at DESC
            "#,
        )
        .bind(account_id)
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    /// Accounts with an edge to `account_id`, in the given state
    ///
    /// Approved gives `followers`, pending gives `followRequests`.
    pub async fn list_followers(
        &self,
        account_id: &str,
        state: EdgeState,
    ) -> Result<Vec<Account>, AppError> {
        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT a.id, a.username, a.display_name, a.is_private, a.created_at, a.updated_at
            FROM follow_edges e
            JOIN accounts a ON a.id = e.follower_id
            WHERE e.followee_id = ? AND e.state = ?
            ORDER BY e.created_at DESC
            "#,
        )
        .bind(account_id)
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    /// Approved (followers, following) counts
    pub async fn count_edges(&self, account_id: &str) -> Result<(i64, i64), AppError> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM follow_edges WHERE followee_id = ?1 AND state = 'approved'),
                (SELECT COUNT(*) FROM follow_edges WHERE follower_id = ?1 AND state = 'approved')
            "#,
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }

    /// Project every edge touching `account_id` into the four sets
    pub async fn relationship_sets(&self, account_id: &str) -> Result<RelationshipSets, AppError> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            r#"
            SELECT follower_id, followee_id, state FROM follow_edges
            WHERE follower_id = ?1 OR followee_id = ?1
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        let mut sets = RelationshipSets::default();
        for (follower_id, followee_id, state) in rows {
            let outgoing = follower_id == account_id;
            match (parse_edge_state(&state)?, outgoing) {
                (EdgeState::Approved, true) => sets.following.insert(followee_id),
                (EdgeState::Approved, false) => sets.followers.insert(follower_id),
                (EdgeState::Pending, true) => sets.sent_requests.insert(followee_id),
                (EdgeState::Pending, false) => sets.follow_requests.insert(follower_id),
            };
        }

        Ok(sets)
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Append a message to the log
    ///
    /// `created_at` is assigned here and is strictly greater than that of
    /// the previously appended message, even if the wall clock stepped back.
    pub async fn insert_message(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
    ) -> Result<Message, AppError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        let result: Result<Message, AppError> = async {
            let last = sqlx::query_scalar::<_, DateTime<Utc>>(
                "SELECT created_at FROM messages ORDER BY seq DESC LIMIT 1",
            )
            .fetch_optional(&mut *conn)
            .await?;

            let now = Utc::now();
            let created_at = match last {
                Some(last) if last >= now => last + Duration::microseconds(1),
                _ => now,
            };

            let message = Message {
                id: EntityId::new().0,
                sender_id: sender_id.to_string(),
                receiver_id: receiver_id.to_string(),
                text: text.to_string(),
                seen: false,
                created_at,
            };

            sqlx::query(
                r#"
                INSERT INTO messages (id, sender_id, receiver_id, text, seen, created_at)
                VALUES (?, ?, ?, ?, 0, ?)
                "#,
            )
            .bind(&message.id)
            .bind(&message.sender_id)
            .bind(&message.receiver_id)
            .bind(&message.text)
            .bind(message.created_at)
            .execute(&mut *conn)
            .await?;

            Ok(message)
        }
        .await;

        match result {
            Ok(message) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(message)
            }
            Err(error) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(error)
            }
        }
    }

    /// All messages between the pair, oldest first
    pub async fn get_thread(&self, a: &str, b: &str) -> Result<Vec<Message>, AppError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, sender_id, receiver_id, text, seen, created_at FROM messages
            WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)
            ORDER BY seq ASC
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// All messages sent or received by `account_id`, newest first
    pub async fn get_messages_involving(&self, account_id: &str) -> Result<Vec<Message>, AppError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, sender_id, receiver_id, text, seen, created_at FROM messages
            WHERE sender_id = ?1 OR receiver_id = ?1
            ORDER BY seq DESC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// Mark everything `sender_id` sent to `receiver_id` as seen
    pub async fn mark_thread_seen(
        &self,
        receiver_id: &str,
        sender_id: &str,
    ) -> Result<u64, AppError> {
        let updated = sqlx::query(
            "UPDATE messages SET seen = 1 WHERE receiver_id = ? AND sender_id = ? AND seen = 0",
        )
        .bind(receiver_id)
        .bind(sender_id)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected())
    }

    /// Mark every message addressed to `receiver_id` as seen
    pub async fn mark_all_seen(&self, receiver_id: &str) -> Result<u64, AppError> {
        let updated = sqlx::query("UPDATE messages SET seen = 1 WHERE receiver_id = ? AND seen = 0")
            .bind(receiver_id)
            .execute(&self.pool)
            .await?;

        Ok(updated.rows_affected())
    }

    /// Hard-delete every message between the pair
    pub async fn delete_thread(&self, a: &str, b: &str) -> Result<u64, AppError> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM messages
            WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)
            "#,
        )
        .bind(a)
        .bind(b)
        .execute(&self.pool)
        .await?;

        Ok(deleted.rows_affected())
    }

    /// Unseen messages from `sender_id` to `receiver_id`
    pub async fn count_unread(&self, receiver_id: &str, sender_id: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages WHERE receiver_id = ? AND sender_id = ? AND seen = 0",
        )
        .bind(receiver_id)
        .bind(sender_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    pub async fn count_thread(&self, a: &str, b: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
