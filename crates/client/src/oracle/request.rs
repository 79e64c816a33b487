//! Oracle chat-completions request types.

use serde::Serialize;

/// One chat message in a completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Chat-completions request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Deterministic-leaning decoding for extraction work.
    pub temperature: f32,
}

impl ChatRequest {
    /// Build a system + user message pair for the given model.
    pub fn new(model: &str, system: &str, user: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage { role: "system".into(), content: system.to_string() },
                ChatMessage { role: "user".into(), content: user.to_string() },
            ],
            temperature: 0.0,
        }
    }

    /// Validate the request before sending.
    pub fn validate(&self) -> Result<(), super::OracleError> {
        if self.model.is_empty() {
            return Err(super::OracleError::InvalidInstructions("model cannot be empty".into()));
        }
        if self.messages.iter().all(|m| m.content.trim().is_empty()) {
            return Err(super::OracleError::InvalidInstructions("instructions cannot be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_builds_message_pair() {
        let req = ChatRequest::new("gpt-4o-mini", "You extract evidence.", "Document: 12345");
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, "system");
        assert_eq!(req.messages[1].role, "user");
        assert_eq!(req.temperature, 0.0);
    }

    #[test]
    fn test_validate_empty_instructions() {
        let req = ChatRequest::new("gpt-4o-mini", " ", "");
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validate_empty_model() {
        let req = ChatRequest::new("", "system", "user");
        assert!(req.validate().is_err());
    }
}
