//! Session management and connection lifecycle.
//!
//! Uses grammers-session's SqliteSession for persistent file-based storage so
//! authorization is preserved across application restarts. The connector owns
//! the single MTProto connection shared by the auth adapter, the messenger
//! gateway and the update listener.

use crate::domain::DomainError;
use grammers_client::update::Update;
use grammers_client::{Client, SenderPool};
use grammers_session::storages::SqliteSession;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Opens a persistent session storage at the given path.
///
/// Uses SqliteSession (SQLite file) as the backing store. The file is created
/// if it does not exist. Parent directories are created as needed.
pub async fn open_file_session(path: impl AsRef<Path>) -> Result<SqliteSession, DomainError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DomainError::Telegram(format!("create session directory: {}", e)))?;
    }
    SqliteSession::open(path)
        .await
        .map_err(|e| DomainError::Telegram(format!("open session file: {}", e)))
}

/// Stream of raw updates, held by at most one listener at a time.
pub type UpdateReceiver = mpsc::Receiver<Update>;

/// Updates buffered between the pump and a busy listener.
const UPDATE_BUFFER: usize = 256;

/// Sending half of the update stream. Forwards only while a listener holds
/// the receiving half; anything else is dropped on arrival.
struct UpdateGate<T> {
    tx: mpsc::Sender<T>,
    listening: Arc<AtomicBool>,
}

impl<T> UpdateGate<T> {
    fn new(capacity: usize) -> (Self, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(capacity);
        let gate = Self {
            tx,
            listening: Arc::new(AtomicBool::new(false)),
        };
        (gate, rx)
    }

    fn listening(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.listening)
    }

    /// `false` once the receiving half is gone.
    async fn forward(&self, item: T) -> bool {
        if !self.listening.load(Ordering::Acquire) {
            return !self.tx.is_closed();
        }
        self.tx.send(item).await.is_ok()
    }
}

/// Discard anything left over from an earlier listener. Returns the count.
fn drain_stale<T>(rx: &mut mpsc::Receiver<T>) -> usize {
    let mut dropped = 0;
    while rx.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}

struct Connection {
    client: Client,
    updates: Option<UpdateReceiver>,
    listening: Arc<AtomicBool>,
    runner: JoinHandle<()>,
    pump: JoinHandle<()>,
}

impl Connection {
    fn close(self) {
        self.pump.abort();
        self.runner.abort();
    }
}

/// Owns the MTProto connection. Cheap to share via Arc.
pub struct TelegramConnector {
    credentials: std::sync::RwLock<(i32, String)>,
    session_path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl TelegramConnector {
    pub fn new(api_id: i32, api_hash: String, session_path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            credentials: std::sync::RwLock::new((api_id, api_hash)),
            session_path: session_path.into(),
            conn: Mutex::new(None),
        })
    }

    /// Current app id/hash pair.
    pub fn credentials(&self) -> (i32, String) {
        match self.credentials.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Takes effect on the next connection.
    pub fn set_credentials(&self, api_id: i32, api_hash: &str) {
        let mut guard = match self.credentials.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = (api_id, api_hash.to_string());
    }

    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    async fn open(&self) -> Result<Connection, DomainError> {
        let session = Arc::new(open_file_session(&self.session_path).await?);
        let (api_id, _) = self.credentials();
        let pool = SenderPool::new(session, api_id);
        let client = Client::new(pool.handle.clone());
        let runner_pool = pool.runner;
        let runner = tokio::spawn(async move {
            runner_pool.run().await;
        });

        // The stream must be polled for the connection to stay healthy, so the
        // pump always runs; the gate decides whether updates reach a listener.
        let (gate, rx) = UpdateGate::new(UPDATE_BUFFER);
        let listening = gate.listening();
        let mut stream = client.stream_updates(pool.updates, Default::default());
        let pump = tokio::spawn(async move {
            loop {
                match stream.next().await {
                    Ok(update) => {
                        if !gate.forward(update).await {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "update stream ended");
                        break;
                    }
                }
            }
        });

        info!(path = %self.session_path.display(), "Telegram connection opened");
        Ok(Connection {
            client,
            updates: Some(rx),
            listening,
            runner,
            pump,
        })
    }

    /// Close any existing connection and open a new one.
    pub async fn connect_fresh(&self) -> Result<Client, DomainError> {
        let mut guard = self.conn.lock().await;
        if let Some(old) = guard.take() {
            old.close();
            debug!("previous Telegram connection closed");
        }
        let conn = self.open().await?;
        let client = conn.client.clone();
        *guard = Some(conn);
        Ok(client)
    }

    /// Current client, connecting first if needed.
    pub async fn client(&self) -> Result<Client, DomainError> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.client.clone());
        }
        let conn = self.open().await?;
        let client = conn.client.clone();
        *guard = Some(conn);
        Ok(client)
    }

    /// Hand out the update stream of the current connection. `None` if already taken.
    ///
    /// Only updates that arrive from now on are delivered.
    pub async fn take_updates(&self) -> Option<UpdateReceiver> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut()?;
        let mut updates = conn.updates.take()?;
        let stale = drain_stale(&mut updates);
        if stale > 0 {
            debug!(stale, "discarded updates received while not listening");
        }
        conn.listening.store(true, Ordering::Release);
        Some(updates)
    }

    /// Give a stream back after listening stopped, so a later start can reuse it.
    /// Updates are dropped until the next `take_updates`.
    pub async fn return_updates(&self, updates: UpdateReceiver) {
        if let Some(conn) = self.conn.lock().await.as_mut() {
            conn.listening.store(false, Ordering::Release);
            if conn.updates.is_none() {
                conn.updates = Some(updates);
            }
        }
    }

    /// Best-effort close. Never fails.
    pub async fn disconnect(&self) {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.close();
            info!("Telegram connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gate_drops_updates_until_listening() {
        let (gate, mut rx) = UpdateGate::new(4);
        let listening = gate.listening();

        assert!(gate.forward(1).await);
        assert!(rx.try_recv().is_err());

        listening.store(true, Ordering::Release);
        assert!(gate.forward(2).await);
        assert_eq!(rx.recv().await, Some(2));

        listening.store(false, Ordering::Release);
        assert!(gate.forward(3).await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_gate_stops_when_receiver_dropped() {
        let (gate, rx) = UpdateGate::new(1);
        drop(rx);
        assert!(!gate.forward(1).await);
        gate.listening().store(true, Ordering::Release);
        assert!(!gate.forward(2).await);
    }

    #[tokio::test]
    async fn test_stale_updates_are_drained() {
        let (gate, mut rx) = UpdateGate::new(8);
        gate.listening().store(true, Ordering::Release);
        for i in 0..3 {
            assert!(gate.forward(i).await);
        }
        assert_eq!(drain_stale(&mut rx), 3);
        assert!(rx.try_recv().is_err());
    }
}
