//! Map Grammers types to domain entities.
//!
//! Extracts Chat, RemoteMessage, MediaReference and InboundEvent from
//! grammers_client tl types.

use crate::domain::{
    ChatType, InboundEvent, MediaReference, MediaType, Modality, RemoteMessage,
};
use grammers_client::peer::Peer;
use grammers_client::tl;

/// Map a grammers Peer to domain ChatType.
///
/// * `Peer::User` → Private (DM).
/// * `Peer::Group` → Group or Supergroup (Supergroup when megagroup).
/// * `Peer::Channel` → Channel (broadcast).
pub fn chat_type_from_peer(peer: &Peer) -> ChatType {
    match peer {
        Peer::User(_) => ChatType::Private,
        Peer::Group(g) => {
            if g.is_megagroup() {
                ChatType::Supergroup
            } else {
                ChatType::Group
            }
        }
        Peer::Channel(_) => ChatType::Channel,
    }
}

pub fn is_bot_peer(peer: &Peer) -> bool {
    matches!(peer, Peer::User(u) if u.is_bot())
}

/// Map a raw history message to a domain RemoteMessage. Service and empty messages yield `None`.
pub fn message_to_domain(msg: &tl::enums::Message, chat_id: i64) -> Option<RemoteMessage> {
    let tl::enums::Message::Message(m) = msg else {
        return None;
    };
    Some(RemoteMessage {
        id: m.id,
        chat_id,
        date: m.date as i64,
        text: m.message.clone(),
        media: extract_media_ref(m, chat_id),
        from_user_id: from_user(m),
        outgoing: m.out,
    })
}

/// Build an inbound event from a new-message update. Only one-to-one chats qualify.
///
/// `username` is the sender's public handle, resolved by the caller from the
/// update's peer data.
pub fn inbound_event(
    msg: &tl::enums::Message,
    username: Option<String>,
) -> Option<InboundEvent> {
    let tl::enums::Message::Message(m) = msg else {
        return None;
    };
    let chat_id = match &m.peer_id {
        tl::enums::Peer::User(u) => u.user_id,
        _ => return None,
    };
    let media = extract_media_ref(m, chat_id);
    let sender_id = from_user(m).or(if m.out { None } else { Some(chat_id) });
    Some(InboundEvent {
        chat_id,
        message_id: m.id,
        sender_id,
        username,
        outgoing: m.out,
        modality: modality_for(media.as_ref()),
        text: m.message.clone(),
        media,
    })
}

/// Photo → Photo, voice notes and audio → Voice, everything else is handled as text.
pub fn modality_for(media: Option<&MediaReference>) -> Modality {
    match media.map(|m| m.media_type) {
        Some(MediaType::Photo) => Modality::Photo,
        Some(MediaType::Voice) | Some(MediaType::Audio) => Modality::Voice,
        _ => Modality::Text,
    }
}

fn from_user(m: &tl::types::Message) -> Option<i64> {
    m.from_id.as_ref().and_then(|f| match f {
        tl::enums::Peer::User(u) => Some(u.user_id),
        _ => None,
    })
}

fn extract_media_ref(m: &tl::types::Message, chat_id: i64) -> Option<MediaReference> {
    let media = m.media.as_ref()?;
    let (media_type, mime_type) = match media {
        tl::enums::MessageMedia::Photo(_) => (MediaType::Photo, Some("image/jpeg".to_string())),
        tl::enums::MessageMedia::Document(d) => match d.document.as_ref() {
            Some(tl::enums::Document::Document(doc)) => {
                let is_voice = doc.attributes.iter().any(|a| {
                    matches!(a, tl::enums::DocumentAttribute::Audio(audio) if audio.voice)
                });
                (media_type_for_document(&doc.mime_type, is_voice), Some(doc.mime_type.clone()))
            }
            _ => (MediaType::Document, None),
        },
        _ => (MediaType::Other, None),
    };
    Some(MediaReference {
        message_id: m.id,
        chat_id,
        media_type,
        mime_type,
    })
}

fn media_type_for_document(mime: &str, is_voice: bool) -> MediaType {
    if is_voice {
        MediaType::Voice
    } else if mime.starts_with("video/") {
        MediaType::Video
    } else if mime.starts_with("audio/") {
        MediaType::Audio
    } else if mime == "application/x-tgsticker" {
        MediaType::Sticker
    } else if mime.starts_with("image/") {
        MediaType::Photo
    } else {
        MediaType::Document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(media_type: MediaType) -> MediaReference {
        MediaReference {
            message_id: 1,
            chat_id: 42,
            media_type,
            mime_type: None,
        }
    }

    #[test]
    fn test_document_media_types() {
        assert_eq!(media_type_for_document("audio/ogg", true), MediaType::Voice);
        assert_eq!(media_type_for_document("audio/mpeg", false), MediaType::Audio);
        assert_eq!(media_type_for_document("video/mp4", false), MediaType::Video);
        assert_eq!(media_type_for_document("image/png", false), MediaType::Photo);
        assert_eq!(
            media_type_for_document("application/pdf", false),
            MediaType::Document
        );
    }

    #[test]
    fn test_modality_for_media() {
        assert_eq!(modality_for(None), Modality::Text);
        assert_eq!(modality_for(Some(&media(MediaType::Photo))), Modality::Photo);
        assert_eq!(modality_for(Some(&media(MediaType::Voice))), Modality::Voice);
        assert_eq!(modality_for(Some(&media(MediaType::Audio))), Modality::Voice);
        assert_eq!(modality_for(Some(&media(MediaType::Sticker))), Modality::Text);
    }
}
