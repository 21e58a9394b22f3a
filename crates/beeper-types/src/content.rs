use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Coarse message kind reported to subscribers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    #[default]
    Text,
    Media,
    File,
    Location,
    Sticker,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Media => "MEDIA",
            Self::File => "FILE",
            Self::Location => "LOCATION",
            Self::Sticker => "STICKER",
        }
    }

    /// Parse a `type` column value or a Matrix `msgtype` (`m.image`, ...).
    /// Returns `None` for anything unrecognized.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        let label = label.strip_prefix("m.").unwrap_or(label).to_ascii_uppercase();
        match label.as_str() {
            "TEXT" | "NOTICE" | "EMOTE" => Some(Self::Text),
            "MEDIA" | "IMAGE" | "IMG" | "VIDEO" | "AUDIO" | "VOICE" | "GIF" => Some(Self::Media),
            "FILE" => Some(Self::File),
            "LOCATION" => Some(Self::Location),
            "STICKER" => Some(Self::Sticker),
            _ => None,
        }
    }
}

/// Typed view of the `message` JSON blob of a row.
///
/// Beeper's payload shape varies by bridge, so every field is optional and
/// anything that is not a JSON object ends up in `Unknown`.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text {
        body: String,
    },
    Media {
        caption: Option<String>,
        mime_type: Option<String>,
        url: Option<String>,
    },
    File {
        file_name: Option<String>,
        mime_type: Option<String>,
        size: Option<u64>,
    },
    Location {
        latitude: Option<f64>,
        longitude: Option<f64>,
        description: Option<String>,
    },
    Sticker {
        body: Option<String>,
        url: Option<String>,
    },
    Unknown {
        raw: Value,
    },
}

const TEXT_KEYS: &[&str] = &["text", "body"];
const CAPTION_KEYS: &[&str] = &["caption", "text", "body"];
const FILE_NAME_KEYS: &[&str] = &["fileName", "filename", "file_name", "name"];
const MIME_KEYS: &[&str] = &["mimeType", "mimetype", "mime_type"];
const URL_KEYS: &[&str] = &["srcURL", "url", "src"];

impl MessageContent {
    /// Classify a raw payload. `type_hint` is the row's `type` column and
    /// takes precedence over the shape of the JSON when it is recognized.
    pub fn from_raw(raw: &Value, type_hint: Option<&str>) -> Self {
        let Some(obj) = raw.as_object() else {
            return Self::Unknown { raw: raw.clone() };
        };

        let kind = type_hint
            .and_then(MessageType::parse)
            .or_else(|| infer_type(obj));

        let attachment = first_attachment(obj);
        match kind {
            Some(MessageType::Text) => Self::Text {
                body: first_str(obj, TEXT_KEYS).unwrap_or_default(),
            },
            Some(MessageType::Media) => Self::Media {
                caption: first_str(obj, CAPTION_KEYS),
                mime_type: lookup(obj, attachment, MIME_KEYS),
                url: lookup(obj, attachment, URL_KEYS),
            },
            Some(MessageType::File) => Self::File {
                file_name: lookup(obj, attachment, FILE_NAME_KEYS),
                mime_type: lookup(obj, attachment, MIME_KEYS),
                size: attachment
                    .and_then(|a| first_u64(a, &["fileSize", "size"]))
                    .or_else(|| first_u64(obj, &["fileSize", "size"])),
            },
            Some(MessageType::Location) => {
                let (latitude, longitude) = coordinates(obj);
                Self::Location {
                    latitude,
                    longitude,
                    description: first_str(obj, &["description", "text", "body"]),
                }
            }
            Some(MessageType::Sticker) => Self::Sticker {
                body: first_str(obj, TEXT_KEYS),
                url: lookup(obj, attachment, URL_KEYS),
            },
            None => Self::Unknown { raw: raw.clone() },
        }
    }

    /// Unrecognized content is reported as text.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Text { .. } | Self::Unknown { .. } => MessageType::Text,
            Self::Media { .. } => MessageType::Media,
            Self::File { .. } => MessageType::File,
            Self::Location { .. } => MessageType::Location,
            Self::Sticker { .. } => MessageType::Sticker,
        }
    }

    /// The most human-readable string the payload carries, if any.
    pub fn summary_text(&self) -> Option<String> {
        let text = match self {
            Self::Text { body } => Some(body.clone()),
            Self::Media { caption, .. } => caption.clone(),
            Self::File { file_name, .. } => file_name.clone(),
            Self::Location {
                latitude,
                longitude,
                description,
            } => description.clone().or_else(|| match (latitude, longitude) {
                (Some(lat), Some(lon)) => Some(format!("{lat}, {lon}")),
                _ => None,
            }),
            Self::Sticker { body, .. } => body.clone(),
            Self::Unknown { .. } => None,
        };
        text.filter(|t| !t.trim().is_empty())
    }
}

fn infer_type(obj: &Map<String, Value>) -> Option<MessageType> {
    if let Some(kind) = first_str(obj, &["msgtype", "type"]).and_then(|t| MessageType::parse(&t)) {
        return Some(kind);
    }
    if obj.get("location").is_some_and(Value::is_object) || obj.contains_key("geo_uri") {
        return Some(MessageType::Location);
    }
    if let Some(attachment) = first_attachment(obj) {
        let kind = first_str(attachment, &["type"]).unwrap_or_default().to_lowercase();
        let mime = first_str(attachment, MIME_KEYS).unwrap_or_default().to_lowercase();
        if kind.contains("sticker") || attachment.get("isSticker").and_then(Value::as_bool) == Some(true) {
            return Some(MessageType::Sticker);
        }
        if matches!(kind.as_str(), "img" | "image" | "video" | "audio" | "voice" | "gif")
            || ["image/", "video/", "audio/"].iter().any(|p| mime.starts_with(p))
        {
            return Some(MessageType::Media);
        }
        return Some(MessageType::File);
    }
    if first_str(obj, TEXT_KEYS).is_some() {
        return Some(MessageType::Text);
    }
    None
}

fn first_attachment(obj: &Map<String, Value>) -> Option<&Map<String, Value>> {
    obj.get("attachments")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(Value::as_object)
        .or_else(|| obj.get("attachment").and_then(Value::as_object))
}

/// Look a key up in the attachment first, then in the message itself
/// (Matrix keeps mime info under `info`).
fn lookup(
    obj: &Map<String, Value>,
    attachment: Option<&Map<String, Value>>,
    keys: &[&str],
) -> Option<String> {
    attachment
        .and_then(|a| first_str(a, keys))
        .or_else(|| first_str(obj, keys))
        .or_else(|| {
            obj.get("info")
                .and_then(Value::as_object)
                .and_then(|info| first_str(info, keys))
        })
}

fn first_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn first_u64(obj: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_u64))
}

fn coordinates(obj: &Map<String, Value>) -> (Option<f64>, Option<f64>) {
    let source = obj.get("location").and_then(Value::as_object).unwrap_or(obj);
    let lat = ["latitude", "lat"].iter().find_map(|k| source.get(*k).and_then(Value::as_f64));
    let lon = ["longitude", "lng", "lon"]
        .iter()
        .find_map(|k| source.get(*k).and_then(Value::as_f64));
    if lat.is_some() || lon.is_some() {
        return (lat, lon);
    }

    // geo:52.52,13.40;u=35
    obj.get("geo_uri")
        .and_then(Value::as_str)
        .and_then(|uri| uri.strip_prefix("geo:"))
        .and_then(|rest| {
            let coords = rest.split(';').next()?;
            let (lat, lon) = coords.split_once(',')?;
            Some((lat.trim().parse().ok(), lon.trim().parse().ok()))
        })
        .unwrap_or((None, None))
}
