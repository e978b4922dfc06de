//! Implements MessengerPort using grammers Client.
//!
//! Handles FloodWait by sleeping and retrying. Uses raw invoke for GetHistory
//! and typing indicators; sending goes through the high-level client API.

use crate::adapters::telegram::mapper;
use crate::adapters::telegram::session::TelegramConnector;
use crate::domain::{
    Account, Chat, ChatAction, DomainError, MediaReference, OutgoingFile, RemoteMessage,
};
use crate::ports::MessengerPort;
use async_trait::async_trait;
use grammers_client::media::Attribute;
use grammers_client::session::types::PeerRef;
use grammers_client::tl;
use grammers_client::message::InputMessage;
use grammers_client::{Client, InvocationError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const FLOOD_WAIT_RETRIES: usize = 3;

/// Telegram messenger adapter. Shares the connection with the auth adapter via the connector.
pub struct GrammersMessenger {
    connector: Arc<TelegramConnector>,
    /// Cache PeerRef by chat_id so we don't call iter_dialogs on every request (avoids FLOOD_WAIT).
    peer_cache: Mutex<HashMap<i64, PeerRef>>,
}

impl GrammersMessenger {
    pub fn new(connector: Arc<TelegramConnector>) -> Self {
        Self {
            connector,
            peer_cache: Mutex::new(HashMap::new()),
        }
    }

    async fn client(&self) -> Result<Client, DomainError> {
        self.connector.client().await
    }

    /// Resolve chat_id to PeerRef, using cache to avoid repeated iter_dialogs (getDialogs) and FLOOD_WAIT.
    async fn resolve_peer(&self, chat_id: i64) -> Result<PeerRef, DomainError> {
        if let Some(peer) = self.peer_cache.lock().await.get(&chat_id) {
            return Ok(*peer);
        }
        let client = self.client().await?;
        let mut dialogs = client.iter_dialogs();
        let mut found = None;
        while let Some(dialog) = dialogs
            .next()
            .await
            .map_err(|e| DomainError::Telegram(e.to_string()))?
        {
            let p = dialog.peer();
            if p.id().bot_api_dialog_id() == Some(chat_id) {
                found = Some(p.clone());
                break;
            }
        }
        let peer = found
            .ok_or_else(|| DomainError::Telegram(format!("peer {} not found in dialogs", chat_id)))?;
        let peer_ref = peer
            .to_ref()
            .await
            .ok_or_else(|| DomainError::Telegram("peer not in session cache".into()))?;
        self.peer_cache.lock().await.insert(chat_id, peer_ref);
        Ok(peer_ref)
    }

    fn action_to_tl(action: ChatAction) -> tl::enums::SendMessageAction {
        use tl::enums::SendMessageAction as A;
        match action {
            ChatAction::Typing => A::SendMessageTypingAction,
            ChatAction::RecordVoice => A::SendMessageRecordAudioAction,
            ChatAction::UploadVideo => {
                A::SendMessageUploadVideoAction(tl::types::SendMessageUploadVideoAction { progress: 0 })
            }
            ChatAction::UploadPhoto => {
                A::SendMessageUploadPhotoAction(tl::types::SendMessageUploadPhotoAction { progress: 0 })
            }
            ChatAction::UploadDocument => {
                A::SendMessageUploadDocumentAction(tl::types::SendMessageUploadDocumentAction { progress: 0 })
            }
        }
    }
}

fn flood_wait_secs(e: &InvocationError) -> Option<u64> {
    match e {
        InvocationError::Rpc(rpc) if rpc.code == 420 => Some(rpc.value.unwrap_or(60) as u64),
        _ => None,
    }
}

#[async_trait]
impl MessengerPort for GrammersMessenger {
    async fn get_me(&self) -> Result<Account, DomainError> {
        let me = self
            .client()
            .await?
            .get_me()
            .await
            .map_err(|e| DomainError::Telegram(format!("get_me: {}", e)))?;
        Ok(Account {
            id: me.id().bot_api_dialog_id(),
            first_name: me.full_name(),
            username: me.username().map(String::from),
        })
    }

    async fn get_dialogs(&self, limit: usize) -> Result<Vec<Chat>, DomainError> {
        let client = self.client().await?;
        let mut dialogs = client.iter_dialogs();
        let mut chats = Vec::new();
        while chats.len() < limit {
            let Some(dialog) = dialogs
                .next()
                .await
                .map_err(|e| DomainError::Telegram(e.to_string()))?
            else {
                break;
            };
            let peer = dialog.peer();
            let id = peer.id().bot_api_dialog_id();
            let title = peer
                .name()
                .map(String::from)
                .unwrap_or_else(|| id.to_string());
            chats.push(Chat {
                id,
                title,
                username: peer.username().map(String::from),
                kind: mapper::chat_type_from_peer(peer),
                is_bot: mapper::is_bot_peer(peer),
            });
            if let Some(peer_ref) = peer.to_ref().await {
                self.peer_cache.lock().await.insert(id, peer_ref);
            }
        }
        Ok(chats)
    }

    async fn get_messages(
        &self,
        chat_id: i64,
        limit: usize,
    ) -> Result<Vec<RemoteMessage>, DomainError> {
        use tl::enums::messages::Messages;

        let input_peer: tl::enums::InputPeer = self.resolve_peer(chat_id).await?.into();
        let client = self.client().await?;

        for attempt in 0..FLOOD_WAIT_RETRIES {
            let req = tl::functions::messages::GetHistory {
                peer: input_peer.clone(),
                offset_id: 0,
                offset_date: 0,
                add_offset: 0,
                limit: limit.min(i32::MAX as usize) as i32,
                max_id: 0,
                min_id: 0,
                hash: 0,
            };

            match client.invoke(&req).await {
                Ok(raw) => {
                    let messages = match raw {
                        Messages::Messages(m) => m.messages,
                        Messages::Slice(m) => m.messages,
                        Messages::ChannelMessages(m) => m.messages,
                        Messages::NotModified(_) => return Ok(vec![]),
                    };
                    // API returns newest first.
                    let mut out: Vec<RemoteMessage> = messages
                        .iter()
                        .filter_map(|msg| mapper::message_to_domain(msg, chat_id))
                        .collect();
                    out.reverse();
                    return Ok(out);
                }
                Err(e) => match flood_wait_secs(&e) {
                    Some(wait_secs) => {
                        warn!(attempt, wait_secs, chat_id, "FloodWait, sleeping");
                        tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                    }
                    None => return Err(DomainError::Telegram(e.to_string())),
                },
            }
        }
        Err(DomainError::FloodWait { seconds: 60 })
    }

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> Result<(), DomainError> {
        let input_peer: tl::enums::InputPeer = self.resolve_peer(chat_id).await?.into();
        let req = tl::functions::messages::SetTyping {
            peer: input_peer,
            top_msg_id: None,
            action: Self::action_to_tl(action),
        };
        self.client()
            .await?
            .invoke(&req)
            .await
            .map_err(|e| DomainError::Telegram(format!("set typing: {}", e)))?;
        Ok(())
    }

    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i32>,
    ) -> Result<(), DomainError> {
        let peer = self.resolve_peer(chat_id).await?;
        let client = self.client().await?;
        for attempt in 0..FLOOD_WAIT_RETRIES {
            let message = InputMessage::new().text(text).reply_to(reply_to);
            match client.send_message(peer, message).await {
                Ok(_) => {
                    debug!(chat_id, chars = text.chars().count(), "text sent");
                    return Ok(());
                }
                Err(e) => match flood_wait_secs(&e) {
                    Some(wait_secs) => {
                        warn!(attempt, wait_secs, chat_id, "FloodWait on send, sleeping");
                        tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                    }
                    None => return Err(DomainError::Telegram(format!("send message: {}", e))),
                },
            }
        }
        Err(DomainError::FloodWait { seconds: 60 })
    }

    async fn send_file(
        &self,
        chat_id: i64,
        path: &Path,
        kind: OutgoingFile,
    ) -> Result<(), DomainError> {
        let peer = self.resolve_peer(chat_id).await?;
        let client = self.client().await?;
        let uploaded = client
            .upload_file(path)
            .await
            .map_err(|e| DomainError::Media(format!("upload {}: {}", path.display(), e)))?;

        let message = match kind {
            OutgoingFile::Photo => InputMessage::new().photo(uploaded),
            OutgoingFile::Voice => InputMessage::new()
                .document(uploaded)
                .mime_type("audio/ogg")
                .attribute(Attribute::Voice {
                    duration: Duration::ZERO,
                    waveform: None,
                }),
            OutgoingFile::Audio => InputMessage::new().document(uploaded).mime_type("audio/mpeg"),
            OutgoingFile::Video => InputMessage::new()
                .document(uploaded)
                .mime_type("video/mp4")
                .attribute(Attribute::Video {
                    round_message: false,
                    supports_streaming: true,
                    duration: Duration::ZERO,
                    w: 0,
                    h: 0,
                }),
            OutgoingFile::Document => InputMessage::new().document(uploaded),
        };
        client
            .send_message(peer, message)
            .await
            .map_err(|e| DomainError::Telegram(format!("send file: {}", e)))?;
        debug!(chat_id, path = %path.display(), ?kind, "file sent");
        Ok(())
    }

    async fn download_media(
        &self,
        media_ref: &MediaReference,
        dest_path: &Path,
    ) -> Result<(), DomainError> {
        let peer = self.resolve_peer(media_ref.chat_id).await?;
        let client = self.client().await?;

        let messages = client
            .get_messages_by_id(peer, &[media_ref.message_id])
            .await
            .map_err(|e| DomainError::Media(e.to_string()))?;

        let msg = messages
            .into_iter()
            .next()
            .and_then(|o| o)
            .ok_or_else(|| DomainError::Media("message not found".into()))?;

        let media = msg
            .media()
            .ok_or_else(|| DomainError::Media("message has no media".into()))?;

        if let Some(parent) = dest_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::Media(format!("create download dir: {}", e)))?;
        }
        client
            .download_media(&media, dest_path)
            .await
            .map_err(|e| DomainError::Media(e.to_string()))?;

        debug!(
            chat_id = media_ref.chat_id,
            msg_id = media_ref.message_id,
            path = %dest_path.display(),
            "media downloaded"
        );
        Ok(())
    }
}
