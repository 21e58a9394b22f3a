//! Turns a raw [`MessageRow`] into the [`NormalizedMessage`] subscribers see.
//!
//! Enrichment never fails: a missing sender, account or malformed JSON blob
//! degrades to a default value. The only rows dropped are those with no
//! displayable text at all.

use beeper_db::MessageRow;
use beeper_types::{
    MessageContent, MessageType, Network, NormalizedMessage, format_human_time,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

const SENDER_NAME_KEYS: &[&str] = &["displayName", "fullName", "name", "username"];
const REPLY_KEYS: &[&str] = &["inReplyToID", "inReplyTo", "replyTo", "reply_to"];
/// Top-level payload keys tried for text, in order, whatever the row's type.
const PAYLOAD_TEXT_KEYS: &[&str] = &["text", "body", "caption", "fileName", "filename", "file_name"];

/// Returns `None` when the row has no text worth showing.
pub fn normalize(row: MessageRow) -> Option<NormalizedMessage> {
    let raw_message_data = parse_object(row.message_json.as_deref(), &row.event_id, "message");
    let content = MessageContent::from_raw(&raw_message_data, row.msg_type.as_deref());
    let message_type = row
        .msg_type
        .as_deref()
        .and_then(MessageType::parse)
        .unwrap_or_else(|| content.message_type());

    let Some(text) = extract_text(&row, &content, &raw_message_data) else {
        debug!(event_id = %row.event_id, "Skipping message without text");
        return None;
    };

    let raw_sender_data = match &row.sender {
        Some(user) => parse_object(user.profile_json.as_deref(), &row.event_id, "sender"),
        None => {
            debug!(event_id = %row.event_id, sender = %row.sender_id, "No user record for sender");
            Value::Object(Map::new())
        }
    };
    let sender_name = sender_name(&raw_sender_data, &row.sender_id);

    let platform = row.account.as_ref().and_then(|a| a.platform_name.as_deref());
    let network = Network::detect(platform, &row.sender_id, &row.room_id);
    let thread_name = thread_name(&row.room_id, &network, &raw_sender_data);

    let reply_to_id = row
        .in_reply_to_id
        .clone()
        .or_else(|| reply_target(&raw_message_data));

    Some(NormalizedMessage {
        thread_id: row.room_id.clone(),
        room_id: row.room_id,
        thread_name,
        sender_id: row.sender_id,
        sender_name,
        network,
        text,
        timestamp: row.timestamp,
        event_id: row.event_id,
        message_type,
        is_sent_by_me: row.is_sent_by_me,
        is_encrypted: row.is_encrypted,
        is_reply: reply_to_id.is_some(),
        reply_to_id,
        human_time: format_human_time(row.timestamp),
        raw_message_data,
        raw_sender_data,
    })
}

/// Parse a JSON blob column. Absent, empty or malformed blobs become `{}`.
fn parse_object(json: Option<&str>, event_id: &str, column: &str) -> Value {
    let Some(json) = json.filter(|j| !j.trim().is_empty()) else {
        return Value::Object(Map::new());
    };
    match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => {
            warn!(event_id, column, "Malformed JSON, using empty object: {}", e);
            Value::Object(Map::new())
        }
    }
}

/// Text columns first, then the payload's text, body, caption and file name
/// keys, then nested attachment names or coordinates, then the payload itself
/// as compact JSON.
fn extract_text(row: &MessageRow, content: &MessageContent, raw: &Value) -> Option<String> {
    let columns = [row.text_content.as_deref(), row.formatted_content.as_deref()];
    if let Some(text) = columns.into_iter().flatten().find(|t| !t.trim().is_empty()) {
        return Some(text.to_string());
    }
    if let Some(text) = PAYLOAD_TEXT_KEYS
        .iter()
        .filter_map(|key| raw.get(*key).and_then(Value::as_str))
        .find(|t| !t.trim().is_empty())
    {
        return Some(text.to_string());
    }
    if let Some(text) = content.summary_text() {
        return Some(text);
    }
    match raw {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Display name from the user profile, or the raw id. Never empty.
pub fn sender_name(profile: &Value, sender_id: &str) -> String {
    SENDER_NAME_KEYS
        .iter()
        .filter_map(|key| profile.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(|| Some(sender_id.trim()).filter(|id| !id.is_empty()).map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Human-readable name for a room.
pub fn thread_name(room_id: &str, network: &Network, profile: &Value) -> String {
    match network {
        Network::WhatsApp => {
            let contact = ["displayName", "name"]
                .iter()
                .filter_map(|key| profile.get(*key).and_then(Value::as_str))
                .find(|name| !name.trim().is_empty());
            match contact {
                Some(name) => format!("WhatsApp: {}", name),
                None => "WhatsApp Chat".to_string(),
            }
        }
        Network::Telegram if room_id.contains("telegram_") => "Telegram Bot/Channel".to_string(),
        Network::Telegram | Network::LinkedIn | Network::Matrix => {
            format!("{} Chat", network.display_name())
        }
        Network::Other(_) | Network::Unknown => {
            let short: String = room_id.chars().take(8).collect();
            format!("Chat ({}...)", short)
        }
    }
}

/// Parent event referenced by the payload, Beeper or Matrix style.
fn reply_target(raw: &Value) -> Option<String> {
    let direct = REPLY_KEYS.iter().filter_map(|key| raw.get(*key)).find_map(|value| match value {
        Value::String(id) => Some(id.clone()),
        Value::Object(obj) => ["eventID", "event_id", "id"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    });

    direct
        .or_else(|| {
            raw.pointer("/m.relates_to/m.in_reply_to/event_id")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .filter(|id| !id.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use beeper_db::{AccountRecord, UserRecord};
    use serde_json::json;

    fn row(room: &str, sender: &str, message: Option<&str>, ts: i64) -> MessageRow {
        MessageRow {
            row_id: 1,
            room_id: room.into(),
            sender_id: sender.into(),
            message_json: message.map(str::to_string),
            timestamp: ts,
            event_id: "$ev".into(),
            msg_type: None,
            is_sent_by_me: false,
            is_encrypted: false,
            in_reply_to_id: None,
            text_content: None,
            formatted_content: None,
            sender: None,
            account: None,
        }
    }

    #[test]
    fn unknown_sender_falls_back_to_raw_id() {
        let mut r = row("!abc:beeper.local", "@bob", Some(r#"{"text":"hi"}"#), 1756687131000);
        r.text_content = Some("hi".into());

        let msg = normalize(r).unwrap();
        assert_eq!(msg.sender_name, "@bob");
        assert_eq!(msg.network, Network::Unknown);
        assert_eq!(msg.message_type, MessageType::Text);
        assert_eq!(msg.thread_id, msg.room_id);
        assert_eq!(msg.thread_name, "Chat (!abc:bee...)");
        assert!(!msg.is_reply);
        assert_eq!(msg.raw_sender_data, json!({}));
    }

    #[test]
    fn enrichment_from_user_and_account() {
        let mut r = row("!wa_room:beeper.local", "@contact", Some(r#"{"text":"hello"}"#), 10);
        r.sender = Some(UserRecord {
            user_id: "@contact".into(),
            account_id: Some("acc".into()),
            profile_json: Some(r#"{"fullName":"Carol Smith","displayName":"Carol"}"#.into()),
        });
        r.account = Some(AccountRecord {
            account_id: "acc".into(),
            platform_name: Some("whatsapp".into()),
        });

        let msg = normalize(r).unwrap();
        assert_eq!(msg.sender_name, "Carol");
        assert_eq!(msg.network, Network::WhatsApp);
        assert_eq!(msg.thread_name, "WhatsApp: Carol");
        assert_eq!(msg.text, "hello");
    }

    #[test]
    fn malformed_json_still_dispatches() {
        let mut r = row("!room", "@telegram_99:beeper.local", Some("{not json"), 10);
        r.text_content = Some("fallback text".into());
        r.sender = Some(UserRecord {
            user_id: "@telegram_99:beeper.local".into(),
            account_id: None,
            profile_json: Some("also not json".into()),
        });

        let msg = normalize(r).unwrap();
        assert_eq!(msg.raw_message_data, json!({}));
        assert_eq!(msg.sender_name, "@telegram_99:beeper.local");
        assert_eq!(msg.network, Network::Telegram);
        assert_eq!(msg.thread_name, "Telegram Chat");
    }

    #[test]
    fn empty_sender_id_still_named() {
        let mut r = row("!room", "", None, 10);
        r.text_content = Some("x".into());
        assert_eq!(normalize(r).unwrap().sender_name, "unknown");
    }

    #[test]
    fn rows_without_text_are_skipped() {
        let r = row("!room", "@bob", None, 10);
        assert!(normalize(r).is_none());

        let mut blank = row("!room", "@bob", Some("{}"), 10);
        blank.text_content = Some("   ".into());
        assert!(normalize(blank).is_none());
    }

    #[test]
    fn text_falls_back_through_payload() {
        let mut formatted = row("!room", "@bob", None, 1);
        formatted.formatted_content = Some("<b>bold</b>".into());
        assert_eq!(normalize(formatted).unwrap().text, "<b>bold</b>");

        let file = row(
            "!room",
            "@bob",
            Some(r#"{"attachments":[{"fileName":"cv.pdf","mimeType":"application/pdf"}]}"#),
            1,
        );
        let msg = normalize(file).unwrap();
        assert_eq!(msg.text, "cv.pdf");
        assert_eq!(msg.message_type, MessageType::File);

        let opaque = row("!room", "@bob", Some(r#"{"foo":1}"#), 1);
        assert_eq!(normalize(opaque).unwrap().text, r#"{"foo":1}"#);
    }

    #[test]
    fn payload_text_precedes_file_name_for_any_type() {
        let mut file = row(
            "!room",
            "@bob",
            Some(r#"{"text":"see attached","fileName":"cv.pdf"}"#),
            1,
        );
        file.msg_type = Some("FILE".into());
        let msg = normalize(file).unwrap();
        assert_eq!(msg.text, "see attached");
        assert_eq!(msg.message_type, MessageType::File);

        let mut named = row("!room", "@bob", Some(r#"{"filename":"photo.jpg","size":3}"#), 1);
        named.msg_type = Some("TEXT".into());
        assert_eq!(normalize(named).unwrap().text, "photo.jpg");
    }

    #[test]
    fn location_falls_back_to_coordinates() {
        let mut r = row("!room", "@bob", Some(r#"{"location":{"latitude":52.5,"longitude":13.4}}"#), 1);
        r.msg_type = Some("LOCATION".into());
        let msg = normalize(r).unwrap();
        assert_eq!(msg.text, "52.5, 13.4");
        assert_eq!(msg.message_type, MessageType::Location);
    }

    #[test]
    fn type_column_wins_over_payload_shape() {
        let mut r = row("!room", "@bob", Some(r#"["weird"]"#), 1);
        r.msg_type = Some("STICKER".into());
        let msg = normalize(r).unwrap();
        assert_eq!(msg.message_type, MessageType::Sticker);
    }

    #[test]
    fn unrecognized_type_defaults_to_text() {
        let mut r = row("!room", "@bob", Some(r#"{"text":"ok"}"#), 1);
        r.msg_type = Some("POLL".into());
        assert_eq!(normalize(r).unwrap().message_type, MessageType::Text);
    }

    #[test]
    fn reply_from_column_and_payload() {
        let mut column = row("!room", "@bob", Some(r#"{"text":"re"}"#), 1);
        column.in_reply_to_id = Some("$parent".into());
        let msg = normalize(column).unwrap();
        assert!(msg.is_reply);
        assert_eq!(msg.reply_to_id.as_deref(), Some("$parent"));

        let matrix = row(
            "!room",
            "@bob",
            Some(r#"{"body":"re","m.relates_to":{"m.in_reply_to":{"event_id":"$root"}}}"#),
            1,
        );
        let msg = normalize(matrix).unwrap();
        assert!(msg.is_reply);
        assert_eq!(msg.reply_to_id.as_deref(), Some("$root"));
    }

    #[test]
    fn thread_names() {
        let empty = json!({});
        assert_eq!(thread_name("!telegram_1:x", &Network::Telegram, &empty), "Telegram Bot/Channel");
        assert_eq!(thread_name("!x", &Network::LinkedIn, &empty), "LinkedIn Chat");
        assert_eq!(thread_name("!x", &Network::Matrix, &empty), "Matrix/Beeper Chat");
        assert_eq!(thread_name("!x", &Network::WhatsApp, &empty), "WhatsApp Chat");
        assert_eq!(thread_name("!ab", &Network::Unknown, &empty), "Chat (!ab...)");
    }
}
