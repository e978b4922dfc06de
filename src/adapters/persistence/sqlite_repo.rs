//! SQLite-backed store via libsql. Implements every persistence port.
//!
//! Uses the same libsql backend as grammers-session to avoid duplicate SQLite symbol link errors.
//! One table per collection; singleton records (bot status, style profile, settings) use a
//! fixed primary key of 1. All timestamps are stored as Unix milliseconds.
//! Database file: data/persona.db

use crate::domain::{
    ActivityEntry, ActivityKind, AuthSession, AuthState, BotStats, DomainError, FewShotExample,
    Message, Role, RuntimeSettings, SilenceTimer, StyleProfile, TrainingPair,
};
use crate::ports::{
    ActivityLogPort, AuthStatePort, HistoryPort, SettingsPort, SilencePort, StatsPort, StylePort,
};
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chat_id INTEGER NOT NULL,
        role TEXT NOT NULL,
        text TEXT NOT NULL DEFAULT '',
        username TEXT,
        has_image INTEGER NOT NULL DEFAULT 0,
        timestamp INTEGER NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_messages_chat_ts ON messages (chat_id, timestamp DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS silence_timers (
        chat_id INTEGER PRIMARY KEY,
        expires_at INTEGER NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS activity_log (
        id TEXT PRIMARY KEY,
        timestamp INTEGER NOT NULL,
        event_type TEXT NOT NULL,
        chat_id INTEGER,
        username TEXT,
        details TEXT NOT NULL DEFAULT ''
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_activity_ts ON activity_log (timestamp DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS bot_status (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        auth_state TEXT NOT NULL DEFAULT 'none',
        phone_code_hash TEXT,
        auth_phone TEXT,
        is_running INTEGER NOT NULL DEFAULT 0,
        started_at INTEGER
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS training_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_message TEXT NOT NULL,
        admin_response TEXT NOT NULL,
        chat_id INTEGER NOT NULL,
        username TEXT NOT NULL DEFAULT ''
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS style_profile (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        profile TEXT NOT NULL DEFAULT '',
        few_shot_json TEXT NOT NULL DEFAULT '[]',
        total_examples INTEGER NOT NULL DEFAULT 0,
        scanned_chats INTEGER NOT NULL DEFAULT 0,
        training_enabled INTEGER NOT NULL DEFAULT 1,
        scanned_at INTEGER
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS media_rules (
        tag TEXT PRIMARY KEY,
        description TEXT NOT NULL
    )"#,
    r#"
    CREATE TABLE IF NOT EXISTS bot_config (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        settings_json TEXT NOT NULL
    )"#,
];

fn db_err(e: impl std::fmt::Display) -> DomainError {
    DomainError::Repo(e.to_string())
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// SQLite store. One database file (persona.db) in the given base directory.
pub struct SqliteRepo {
    db: Database,
    db_path: PathBuf,
}

impl SqliteRepo {
    /// Connect to (or create) the SQLite database and ensure the schema exists.
    /// Call this once at startup; the returned repo is safe to share via Arc.
    ///
    /// Sets WAL mode and synchronous=NORMAL so the listener and the console can
    /// read while a message task writes.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(db_err)?;
        let db_path = base.join("persona.db");
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        // PRAGMA returns a row (new value); use query and consume rows (execute fails when rows are returned).
        for pragma in ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL"] {
            let mut rows = conn
                .query(pragma, ())
                .await
                .map_err(|e| DomainError::Repo(format!("{} failed: {}", pragma, e)))?;
            while rows.next().await.map_err(db_err)?.is_some() {}
        }

        for statement in SCHEMA {
            conn.execute(statement, ()).await.map_err(db_err)?;
        }

        info!(path = %db_path.display(), "SQLite connected with WAL mode");

        Ok(Self { db, db_path })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> Result<Connection, DomainError> {
        self.db.connect().map_err(db_err)
    }

    async fn count(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<u64, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn.query(sql, params).await.map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => {
                let n: i64 = row.get(0).map_err(db_err)?;
                Ok(n.max(0) as u64)
            }
            None => Ok(0),
        }
    }
}

#[async_trait::async_trait]
impl HistoryPort for SqliteRepo {
    async fn append(&self, message: &Message) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO messages (chat_id, role, text, username, has_image, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                message.chat_id,
                message.role.as_str(),
                message.text.as_str(),
                message.username.as_deref(),
                message.has_image as i64,
                to_millis(message.timestamp)
            ],
        )
        .await
        .map_err(db_err)?;
        debug!(chat_id = message.chat_id, role = message.role.as_str(), "message stored");
        Ok(())
    }

    async fn recent(&self, chat_id: i64, limit: usize) -> Result<Vec<Message>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT chat_id, role, text, username, has_image, timestamp
                FROM messages
                WHERE chat_id = ?1
                ORDER BY timestamp DESC, id DESC
                LIMIT ?2
                "#,
                params![chat_id, limit as i64],
            )
            .await
            .map_err(db_err)?;
        let mut messages = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            let chat_id: i64 = row.get(0).map_err(db_err)?;
            let role: String = row.get(1).map_err(db_err)?;
            let text: String = row.get::<String>(2).unwrap_or_default();
            let username: Option<String> = row.get(3).ok();
            let has_image: i64 = row.get(4).unwrap_or(0);
            let timestamp: i64 = row.get(5).map_err(db_err)?;
            messages.push(Message {
                chat_id,
                role: Role::parse(&role),
                text,
                username,
                has_image: has_image != 0,
                timestamp: from_millis(timestamp),
            });
        }
        messages.reverse();
        Ok(messages)
    }
}

#[async_trait::async_trait]
impl ActivityLogPort for SqliteRepo {
    async fn log(&self, entry: &ActivityEntry) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO activity_log (id, timestamp, event_type, chat_id, username, details)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                entry.id.as_str(),
                to_millis(entry.timestamp),
                entry.event_type.as_str(),
                entry.chat_id,
                entry.username.as_deref(),
                entry.details.as_str()
            ],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT id, timestamp, event_type, chat_id, username, details
                FROM activity_log
                ORDER BY timestamp DESC
                LIMIT ?1
                "#,
                params![limit as i64],
            )
            .await
            .map_err(db_err)?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            let timestamp: i64 = row.get(1).map_err(db_err)?;
            entries.push(ActivityEntry {
                id: row.get(0).map_err(db_err)?,
                timestamp: from_millis(timestamp),
                event_type: row.get(2).map_err(db_err)?,
                chat_id: row.get(3).ok(),
                username: row.get(4).ok(),
                details: row.get::<String>(5).unwrap_or_default(),
            });
        }
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl SilencePort for SqliteRepo {
    async fn upsert_silence(&self, timer: &SilenceTimer) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO silence_timers (chat_id, expires_at) VALUES (?1, ?2)
            ON CONFLICT (chat_id) DO UPDATE SET expires_at = excluded.expires_at
            "#,
            params![timer.chat_id, to_millis(timer.expires_at)],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_silence(&self, chat_id: i64) -> Result<Option<SilenceTimer>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                "SELECT expires_at FROM silence_timers WHERE chat_id = ?1",
                params![chat_id],
            )
            .await
            .map_err(db_err)?;
        if let Some(row) = rows.next().await.map_err(db_err)? {
            let expires_at: i64 = row.get(0).map_err(db_err)?;
            Ok(Some(SilenceTimer {
                chat_id,
                expires_at: from_millis(expires_at),
            }))
        } else {
            Ok(None)
        }
    }
}

#[async_trait::async_trait]
impl AuthStatePort for SqliteRepo {
    async fn load_auth_session(&self) -> Result<AuthSession, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT auth_state, phone_code_hash, auth_phone, is_running, started_at
                FROM bot_status WHERE id = 1
                "#,
                (),
            )
            .await
            .map_err(db_err)?;
        let Some(row) = rows.next().await.map_err(db_err)? else {
            return Ok(AuthSession::default());
        };
        let auth_state: String = row.get(0).map_err(db_err)?;
        let is_running: i64 = row.get(3).unwrap_or(0);
        let started_at: Option<i64> = row.get(4).ok();
        Ok(AuthSession {
            auth_state: AuthState::parse(&auth_state),
            phone_code_hash: row.get(1).ok(),
            auth_phone: row.get(2).ok(),
            is_running: is_running != 0,
            started_at: started_at.map(from_millis),
        })
    }

    async fn save_auth_session(&self, session: &AuthSession) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO bot_status (id, auth_state, phone_code_hash, auth_phone, is_running, started_at)
            VALUES (1, ?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (id) DO UPDATE SET
                auth_state = excluded.auth_state,
                phone_code_hash = excluded.phone_code_hash,
                auth_phone = excluded.auth_phone,
                is_running = excluded.is_running,
                started_at = excluded.started_at
            "#,
            params![
                session.auth_state.as_str(),
                session.phone_code_hash.as_deref(),
                session.auth_phone.as_deref(),
                session.is_running as i64,
                session.started_at.map(to_millis)
            ],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl StylePort for SqliteRepo {
    async fn replace_training_pairs(&self, pairs: &[TrainingPair]) -> Result<(), DomainError> {
        let conn = self.conn()?;
        let tx = conn.transaction().await.map_err(db_err)?;
        tx.execute("DELETE FROM training_data", ())
            .await
            .map_err(db_err)?;
        for p in pairs {
            tx.execute(
                r#"
                INSERT INTO training_data (user_message, admin_response, chat_id, username)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![
                    p.user_message.as_str(),
                    p.admin_response.as_str(),
                    p.chat_id,
                    p.username.as_str()
                ],
            )
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        info!(count = pairs.len(), "training data replaced");
        Ok(())
    }

    async fn count_training_pairs(&self) -> Result<u64, DomainError> {
        self.count("SELECT COUNT(*) FROM training_data", ()).await
    }

    async fn load_style_profile(&self) -> Result<Option<StyleProfile>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query(
                r#"
                SELECT profile, few_shot_json, total_examples, scanned_chats, training_enabled, scanned_at
                FROM style_profile WHERE id = 1
                "#,
                (),
            )
            .await
            .map_err(db_err)?;
        let Some(row) = rows.next().await.map_err(db_err)? else {
            return Ok(None);
        };
        let few_shot_json: String = row.get::<String>(1).unwrap_or_default();
        let few_shot_examples: Vec<FewShotExample> =
            serde_json::from_str(&few_shot_json).unwrap_or_default();
        let total_examples: i64 = row.get(2).unwrap_or(0);
        let scanned_chats: i64 = row.get(3).unwrap_or(0);
        let training_enabled: i64 = row.get(4).unwrap_or(1);
        let scanned_at: Option<i64> = row.get(5).ok();
        Ok(Some(StyleProfile {
            profile: row.get::<String>(0).unwrap_or_default(),
            few_shot_examples,
            total_examples: total_examples.max(0) as usize,
            scanned_chats: scanned_chats.max(0) as usize,
            training_enabled: training_enabled != 0,
            scanned_at: scanned_at.map(from_millis),
        }))
    }

    async fn save_style_profile(&self, profile: &StyleProfile) -> Result<(), DomainError> {
        let few_shot_json = serde_json::to_string(&profile.few_shot_examples).map_err(db_err)?;
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO style_profile (id, profile, few_shot_json, total_examples, scanned_chats, training_enabled, scanned_at)
            VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (id) DO UPDATE SET
                profile = excluded.profile,
                few_shot_json = excluded.few_shot_json,
                total_examples = excluded.total_examples,
                scanned_chats = excluded.scanned_chats,
                training_enabled = excluded.training_enabled,
                scanned_at = excluded.scanned_at
            "#,
            params![
                profile.profile.as_str(),
                few_shot_json,
                profile.total_examples as i64,
                profile.scanned_chats as i64,
                profile.training_enabled as i64,
                profile.scanned_at.map(to_millis)
            ],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn clear_training(&self) -> Result<(), DomainError> {
        let conn = self.conn()?;
        let tx = conn.transaction().await.map_err(db_err)?;
        tx.execute("DELETE FROM training_data", ())
            .await
            .map_err(db_err)?;
        tx.execute("DELETE FROM style_profile", ())
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SettingsPort for SqliteRepo {
    async fn load_settings(&self) -> Result<Option<RuntimeSettings>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query("SELECT settings_json FROM bot_config WHERE id = 1", ())
            .await
            .map_err(db_err)?;
        let Some(row) = rows.next().await.map_err(db_err)? else {
            return Ok(None);
        };
        let json: String = row.get(0).map_err(db_err)?;
        let settings = serde_json::from_str(&json)
            .map_err(|e| DomainError::Repo(format!("bot_config is not valid JSON: {}", e)))?;
        Ok(Some(settings))
    }

    async fn save_settings(&self, settings: &RuntimeSettings) -> Result<(), DomainError> {
        let json = serde_json::to_string(settings).map_err(db_err)?;
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO bot_config (id, settings_json) VALUES (1, ?1)
            ON CONFLICT (id) DO UPDATE SET settings_json = excluded.settings_json
            "#,
            params![json],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn media_rules(&self) -> Result<HashMap<String, String>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn
            .query("SELECT tag, description FROM media_rules", ())
            .await
            .map_err(db_err)?;
        let mut rules = HashMap::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            let tag: String = row.get(0).map_err(db_err)?;
            let description: String = row.get(1).map_err(db_err)?;
            rules.insert(tag, description);
        }
        Ok(rules)
    }

    async fn set_media_rule(&self, tag: &str, description: &str) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO media_rules (tag, description) VALUES (?1, ?2)
            ON CONFLICT (tag) DO UPDATE SET description = excluded.description
            "#,
            params![tag, description],
        )
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl StatsPort for SqliteRepo {
    async fn stats(&self) -> Result<BotStats, DomainError> {
        let now = to_millis(Utc::now());
        Ok(BotStats {
            total_messages: self.count("SELECT COUNT(*) FROM messages", ()).await?,
            total_chats: self
                .count("SELECT COUNT(DISTINCT chat_id) FROM messages", ())
                .await?,
            total_images_analyzed: self
                .count("SELECT COUNT(*) FROM messages WHERE has_image = 1", ())
                .await?,
            total_media_sent: self
                .count(
                    "SELECT COUNT(*) FROM activity_log WHERE event_type = ?1",
                    params![ActivityKind::MediaSent.as_str()],
                )
                .await?,
            silenced_chats: self
                .count(
                    "SELECT COUNT(*) FROM silence_timers WHERE expires_at > ?1",
                    params![now],
                )
                .await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn repo() -> (tempfile::TempDir, SqliteRepo) {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteRepo::connect(dir.path()).await.unwrap();
        (dir, repo)
    }

    #[tokio::test]
    async fn test_history_window_is_recent_chronological_and_isolated() {
        let (_dir, repo) = repo().await;
        let base = Utc::now();
        for i in 0..6 {
            let mut m = if i % 2 == 0 {
                Message::user(10, format!("u{}", i), Some("alice".into()))
            } else {
                Message::assistant(10, format!("a{}", i))
            };
            m.timestamp = base + Duration::milliseconds(i);
            repo.append(&m).await.unwrap();
        }
        repo.append(&Message::user(11, "elsewhere", None))
            .await
            .unwrap();

        let window = repo.recent(10, 4).await.unwrap();
        let texts: Vec<&str> = window.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["u2", "a3", "u4", "a5"]);
        assert_eq!(window[0].role, Role::User);
        assert_eq!(window[0].username.as_deref(), Some("alice"));
        assert_eq!(window[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_silence_upsert_replaces_expiry() {
        let (_dir, repo) = repo().await;
        let first = Utc::now() + Duration::minutes(5);
        let second = Utc::now() + Duration::minutes(30);
        repo.upsert_silence(&SilenceTimer {
            chat_id: 7,
            expires_at: first,
        })
        .await
        .unwrap();
        repo.upsert_silence(&SilenceTimer {
            chat_id: 7,
            expires_at: second,
        })
        .await
        .unwrap();
        let timer = repo.get_silence(7).await.unwrap().unwrap();
        assert_eq!(timer.expires_at.timestamp_millis(), second.timestamp_millis());
        assert!(repo.get_silence(8).await.unwrap().is_none());
        assert_eq!(repo.stats().await.unwrap().silenced_chats, 1);
    }

    #[tokio::test]
    async fn test_auth_session_round_trip() {
        let (_dir, repo) = repo().await;
        assert_eq!(
            repo.load_auth_session().await.unwrap().auth_state,
            AuthState::None
        );
        let session = AuthSession {
            auth_state: AuthState::CodeSent,
            phone_code_hash: Some("hash".into()),
            auth_phone: Some("+10000000000".into()),
            is_running: false,
            started_at: None,
        };
        repo.save_auth_session(&session).await.unwrap();
        let loaded = repo.load_auth_session().await.unwrap();
        assert_eq!(loaded.auth_state, AuthState::CodeSent);
        assert_eq!(loaded.phone_code_hash.as_deref(), Some("hash"));
        assert!(loaded.started_at.is_none());
    }

    #[tokio::test]
    async fn test_training_pairs_are_replaced_not_merged() {
        let (_dir, repo) = repo().await;
        let pair = |n: i64| TrainingPair {
            user_message: format!("q{}", n),
            admin_response: format!("a{}", n),
            chat_id: n,
            username: "bob".into(),
        };
        repo.replace_training_pairs(&[pair(1), pair(2), pair(3)])
            .await
            .unwrap();
        repo.replace_training_pairs(&[pair(4)]).await.unwrap();
        assert_eq!(repo.count_training_pairs().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_style_profile_and_reset() {
        let (_dir, repo) = repo().await;
        assert!(repo.load_style_profile().await.unwrap().is_none());
        let profile = StyleProfile {
            profile: "short and friendly".into(),
            few_shot_examples: vec![FewShotExample {
                user: "hi".into(),
                admin: "hey, what's up".into(),
            }],
            total_examples: 12,
            scanned_chats: 3,
            training_enabled: false,
            scanned_at: Some(Utc::now()),
        };
        repo.save_style_profile(&profile).await.unwrap();
        let loaded = repo.load_style_profile().await.unwrap().unwrap();
        assert_eq!(loaded.profile, "short and friendly");
        assert_eq!(loaded.few_shot_examples, profile.few_shot_examples);
        assert!(!loaded.training_enabled);

        repo.clear_training().await.unwrap();
        assert!(repo.load_style_profile().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_settings_and_media_rules() {
        let (_dir, repo) = repo().await;
        assert!(repo.load_settings().await.unwrap().is_none());
        let settings = RuntimeSettings {
            silence_duration_min: 45,
            ..Default::default()
        };
        repo.save_settings(&settings).await.unwrap();
        let loaded = repo.load_settings().await.unwrap().unwrap();
        assert_eq!(loaded.silence_duration_min, 45);

        repo.set_media_rule("demo", "when asked for a demo")
            .await
            .unwrap();
        repo.set_media_rule("demo", "when asked how it works")
            .await
            .unwrap();
        let rules = repo.media_rules().await.unwrap();
        assert_eq!(rules.get("demo").map(String::as_str), Some("when asked how it works"));
    }

    #[tokio::test]
    async fn test_activity_recent_is_newest_first() {
        let (_dir, repo) = repo().await;
        let mut first = ActivityEntry::new(ActivityKind::BotStarted, None, None, "start");
        first.timestamp = Utc::now() - Duration::seconds(10);
        let second = ActivityEntry::new(ActivityKind::MediaSent, Some(5), None, "VIDEO: demo");
        repo.log(&first).await.unwrap();
        repo.log(&second).await.unwrap();
        let recent = repo.recent_activity(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].event_type, "media_sent");
        assert_eq!(recent[0].chat_id, Some(5));
        assert_eq!(recent[1].chat_id, None);
        assert_eq!(repo.stats().await.unwrap().total_media_sent, 1);
    }
}
