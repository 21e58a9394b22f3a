use std::fmt;

use serde::{Deserialize, Serialize};

/// The chat platform a room belongs to.
///
/// Serialized as its lowercase label (`"whatsapp"`, `"unknown"`, ...) since
/// consumers match on the string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Network {
    WhatsApp,
    Telegram,
    LinkedIn,
    Matrix,
    /// A platform Beeper reports that we have no special handling for.
    Other(String),
    Unknown,
}

impl Network {
    pub fn as_str(&self) -> &str {
        match self {
            Self::WhatsApp => "whatsapp",
            Self::Telegram => "telegram",
            Self::LinkedIn => "linkedin",
            Self::Matrix => "matrix",
            Self::Other(label) => label,
            Self::Unknown => "unknown",
        }
    }

    /// Map an `accounts.platformName` value (or any free-form label) to a network.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        if label.is_empty() || label == "unknown" {
            Self::Unknown
        } else if label.contains("whatsapp") {
            Self::WhatsApp
        } else if label.contains("telegram") {
            Self::Telegram
        } else if label.contains("linkedin") {
            Self::LinkedIn
        } else if label.contains("matrix") || label == "beeper" {
            Self::Matrix
        } else {
            Self::Other(label)
        }
    }

    /// Best-effort guess from a sender or room identifier.
    ///
    /// Bridged identifiers embed the bridge name, e.g.
    /// `@whatsapp_4915...:beeper.local` or `!telegram_123:beeper.local`.
    pub fn from_identifier(id: &str) -> Option<Self> {
        let lower = id.to_lowercase();
        if lower.contains("whatsapp") {
            Some(Self::WhatsApp)
        } else if lower.contains("telegram") {
            Some(Self::Telegram)
        } else if lower.contains("linkedin") {
            Some(Self::LinkedIn)
        } else if lower.contains("beeper.com") {
            Some(Self::Matrix)
        } else {
            None
        }
    }

    /// Resolve the network of a message.
    ///
    /// The sender's account platform wins when it names a known network.
    /// Otherwise the sender id, then the room id, are matched for bridge
    /// names. An unrecognized platform label is kept as `Other` only when
    /// neither identifier says anything.
    pub fn detect(platform: Option<&str>, sender_id: &str, room_id: &str) -> Self {
        let from_account = platform.map(Self::from_label).unwrap_or(Self::Unknown);
        match from_account {
            Self::Other(_) | Self::Unknown => Self::from_identifier(sender_id)
                .or_else(|| Self::from_identifier(room_id))
                .unwrap_or(from_account),
            known => known,
        }
    }

    /// Name used when building human-readable thread names.
    pub fn display_name(&self) -> &str {
        match self {
            Self::WhatsApp => "WhatsApp",
            Self::Telegram => "Telegram",
            Self::LinkedIn => "LinkedIn",
            Self::Matrix => "Matrix/Beeper",
            Self::Other(label) => label,
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Network {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<Network> for String {
    fn from(network: Network) -> Self {
        network.as_str().to_string()
    }
}
