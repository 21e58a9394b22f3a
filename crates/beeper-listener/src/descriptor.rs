//! Static description of the data source, for host settings screens.

use serde::Serialize;

use crate::config::default_database_path;

pub const SOURCE_NAME: &str = "Beeper Database Listener";

pub const SOURCE_DESCRIPTION: &str = "Real-time message listener for Beeper that monitors the \
    local SQLite database for new messages from WhatsApp, Telegram, LinkedIn, and other \
    connected networks, reading directly from Beeper's local cache.";

/// One configurable option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionField {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub default: String,
    pub required: bool,
    pub placeholder: &'static str,
}

pub fn connection_fields() -> Vec<ConnectionField> {
    vec![ConnectionField {
        name: "database_path",
        field_type: "string",
        label: "Beeper Database Path",
        description: "Path to Beeper's SQLite database file (usually ~/.config/BeeperTexts/index.db)",
        default: default_database_path().display().to_string(),
        required: true,
        placeholder: "/home/user/.config/BeeperTexts/index.db",
    }]
}
