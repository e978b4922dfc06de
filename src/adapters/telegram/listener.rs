//! Live update loop. Implements UpdateSource.
//!
//! Narrows new-message updates to one-to-one chats and hands each one to the
//! handler on its own task, so a slow reply never blocks other chats.

use crate::adapters::telegram::mapper;
use crate::adapters::telegram::session::TelegramConnector;
use crate::domain::DomainError;
use crate::ports::{EventHandler, UpdateSource};
use async_trait::async_trait;
use grammers_client::update::Update;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct UpdateListener {
    connector: Arc<TelegramConnector>,
}

impl UpdateListener {
    pub fn new(connector: Arc<TelegramConnector>) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl UpdateSource for UpdateListener {
    async fn listen(
        &self,
        handler: Arc<dyn EventHandler>,
        cancel: CancellationToken,
    ) -> Result<(), DomainError> {
        self.connector.client().await?;
        let mut updates = self.connector.take_updates().await.ok_or_else(|| {
            DomainError::Telegram("update stream already in use; reconnect first".into())
        })?;
        info!("listening for private messages");

        loop {
            let update = tokio::select! {
                _ = cancel.cancelled() => break,
                update = updates.recv() => update,
            };
            let Some(update) = update else {
                warn!("update stream closed");
                break;
            };
            let Update::NewMessage(message) = update else {
                continue;
            };
            let username = message
                .sender()
                .and_then(|peer| peer.username().map(String::from));
            let Some(event) = mapper::inbound_event(&(*message).raw, username) else {
                debug!("skipping non-private message");
                continue;
            };
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                handler.handle(event).await;
            });
        }
        self.connector.return_updates(updates).await;
        info!("update listener stopped");
        Ok(())
    }
}
