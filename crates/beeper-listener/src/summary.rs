use std::borrow::Cow;

use beeper_types::NormalizedMessage;
use tracing::info;

const PREVIEW_CHARS: usize = 100;

/// One structured log line per dispatched message.
pub fn log_message(message: &NormalizedMessage) {
    let direction = if message.is_sent_by_me { "outgoing" } else { "incoming" };
    info!(
        network = %message.network,
        sender = %message.sender_name,
        thread = %message.thread_name,
        message_type = message.message_type.as_str(),
        direction,
        reply = message.is_reply,
        encrypted = message.is_encrypted,
        "[{}] {}",
        message.human_time,
        preview(&message.text, PREVIEW_CHARS),
    );
}

/// At most `max_chars` characters of `text`, with `...` when cut.
pub fn preview(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}...", &text[..cut])),
        None => Cow::Borrowed(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_on_char_boundaries() {
        assert_eq!(preview("short", 100), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("héllo wörld", 4), "héll...");
        assert_eq!(preview("exact", 5), "exact");
    }
}
