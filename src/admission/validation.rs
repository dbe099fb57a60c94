use crate::models::chat::{ ChatMessage, ChatRequest };
use thiserror::Error;

pub const MAX_BODY_BYTES: usize = 20_000;
pub const MAX_MESSAGE_CHARS: usize = 1_000;
pub const MAX_MESSAGES: usize = 20;
pub const MAX_TOTAL_CHARS: usize = 8_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("conversation has no messages")]
    NoMessages,
    #[error("conversation has {0} messages (max {})", MAX_MESSAGES)]
    TooManyMessages(usize),
    #[error("message {0} is empty")]
    EmptyMessage(usize),
    #[error("message {index} has {chars} characters (max {})", MAX_MESSAGE_CHARS)]
    MessageTooLong { index: usize, chars: usize },
    #[error("conversation has {0} characters (max {})", MAX_TOTAL_CHARS)]
    ConversationTooLong(usize),
}

impl ValidationError {
    /// Per-message limits are part of the conversation shape. Only the
    /// aggregate length is reported separately.
    pub fn is_shape_error(&self) -> bool {
        !matches!(self, ValidationError::ConversationTooLong(_))
    }
}

/// Checks a decoded conversation against the size limits and returns a copy
/// whose message contents are trimmed.
pub fn validate(request: &ChatRequest) -> Result<ChatRequest, ValidationError> {
    let count = request.messages.len();
    if count == 0 {
        return Err(ValidationError::NoMessages);
    }
    if count > MAX_MESSAGES {
        return Err(ValidationError::TooManyMessages(count));
    }

    let mut messages = Vec::with_capacity(count);
    let mut total = 0;
    for (index, message) in request.messages.iter().enumerate() {
        let content = message.content.trim();
        let chars = content.chars().count();
        if chars == 0 {
            return Err(ValidationError::EmptyMessage(index));
        }
        if chars > MAX_MESSAGE_CHARS {
            return Err(ValidationError::MessageTooLong { index, chars });
        }
        total += chars;
        messages.push(ChatMessage { role: message.role, content: content.to_string() });
    }

    if total > MAX_TOTAL_CHARS {
        return Err(ValidationError::ConversationTooLong(total));
    }

    Ok(ChatRequest { messages })
}

/// True when the two most recent user turns are the same text, ignoring case
/// and surrounding whitespace.
pub fn last_user_messages_identical(request: &ChatRequest) -> bool {
    let mut users = request.user_messages().rev();
    match (users.next(), users.next()) {
        (Some(last), Some(prev)) => {
            let last = last.content.trim();
            let prev = prev.content.trim();
            !last.is_empty() && last.to_lowercase() == prev.to_lowercase()
        }
        _ => false,
    }
}

pub fn is_json_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("application/json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(contents: &[&str]) -> ChatRequest {
        ChatRequest {
            messages: contents.iter().map(|c| ChatMessage::user(*c)).collect(),
        }
    }

    #[test]
    fn accepts_single_message() {
        let validated = validate(&request(&["Hola"])).unwrap();
        assert_eq!(validated.messages[0].content, "Hola");
    }

    #[test]
    fn accepts_conversation_at_every_limit() {
        let long = "a".repeat(MAX_MESSAGE_CHARS);
        let contents: Vec<&str> = std::iter::repeat(long.as_str()).take(8).collect();
        assert!(validate(&request(&contents)).is_ok());

        let short: Vec<&str> = std::iter::repeat("hi").take(MAX_MESSAGES).collect();
        assert!(validate(&request(&short)).is_ok());
    }

    #[test]
    fn trims_content_without_touching_input() {
        let input = request(&["  ¿Qué servicios ofrecen?  "]);
        let validated = validate(&input).unwrap();
        assert_eq!(validated.messages[0].content, "¿Qué servicios ofrecen?");
        assert_eq!(input.messages[0].content, "  ¿Qué servicios ofrecen?  ");
    }

    #[test]
    fn rejects_empty_conversation() {
        assert_eq!(validate(&request(&[])), Err(ValidationError::NoMessages));
    }

    #[test]
    fn rejects_too_many_messages() {
        let contents: Vec<&str> = std::iter::repeat("hola").take(25).collect();
        let err = validate(&request(&contents)).unwrap_err();
        assert_eq!(err, ValidationError::TooManyMessages(25));
        assert!(err.is_shape_error());
    }

    #[test]
    fn rejects_blank_message() {
        let err = validate(&request(&["hola", "   "])).unwrap_err();
        assert_eq!(err, ValidationError::EmptyMessage(1));
        assert!(err.is_shape_error());
    }

    #[test]
    fn rejects_long_message() {
        let long = "b".repeat(MAX_MESSAGE_CHARS + 1);
        assert_eq!(
            validate(&request(&[long.as_str()])),
            Err(ValidationError::MessageTooLong { index: 0, chars: MAX_MESSAGE_CHARS + 1 })
        );
    }

    #[test]
    fn counts_characters_not_bytes() {
        let accented = "é".repeat(MAX_MESSAGE_CHARS);
        assert!(validate(&request(&[accented.as_str()])).is_ok());
    }

    #[test]
    fn emoji_counts_as_one_character() {
        let emoji = "😀".repeat(MAX_MESSAGE_CHARS);
        assert!(validate(&request(&[emoji.as_str()])).is_ok());
        let over = "😀".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(matches!(
            validate(&request(&[over.as_str()])),
            Err(ValidationError::MessageTooLong { chars, .. }) if chars == MAX_MESSAGE_CHARS + 1
        ));
    }

    #[test]
    fn rejects_long_conversation() {
        let long = "c".repeat(MAX_MESSAGE_CHARS);
        let contents: Vec<&str> = std::iter::repeat(long.as_str()).take(9).collect();
        let err = validate(&request(&contents)).unwrap_err();
        assert_eq!(err, ValidationError::ConversationTooLong(9 * MAX_MESSAGE_CHARS));
        assert!(!err.is_shape_error());
    }

    #[test]
    fn detects_identical_consecutive_user_turns() {
        let mut req = request(&["Precios", "precios "]);
        assert!(last_user_messages_identical(&req));

        req.messages.insert(1, ChatMessage::assistant("Los precios son..."));
        assert!(last_user_messages_identical(&req));

        assert!(!last_user_messages_identical(&request(&["Precios", "Soporte"])));
        assert!(!last_user_messages_identical(&request(&["Precios"])));
    }

    #[test]
    fn json_content_type_matching() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("Application/JSON; charset=utf-8"));
        assert!(!is_json_content_type("text/plain"));
        assert!(!is_json_content_type(""));
    }
}
