use chrono::Utc;
use crate::models::chat::{ Message, MessagePart, Role };

/// One-shot greeting for an empty conversation. The latch is only reset
/// by an explicit clear.
#[derive(Debug, Clone)]
pub struct WelcomeInjector {
    text: String,
    fired: bool,
}

impl WelcomeInjector {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            fired: false,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Returns the greeting when the conversation is empty and the latch is open.
    pub fn inject(&mut self, messages: &[Message]) -> Option<Message> {
        if self.fired || !messages.is_empty() {
            return None;
        }
        self.fired = true;
        Some(
            Message::new(
                format!("welcome-{}", Utc::now().timestamp_millis()),
                Role::Assistant,
                vec![MessagePart::text(self.text.clone())]
            )
        )
    }

    pub fn reset(&mut self) {
        self.fired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_on_empty_history() {
        let mut injector = WelcomeInjector::new("Namaste!");
        let greeting = injector.inject(&[]).unwrap();
        assert_eq!(greeting.role, Role::Assistant);
        assert!(greeting.id.starts_with("welcome-"));
        assert_eq!(greeting.text(), "Namaste!");
        assert!(injector.inject(&[]).is_none());
    }

    #[test]
    fn stays_silent_when_history_exists() {
        let mut injector = WelcomeInjector::new("Namaste!");
        let existing = vec![Message::new("u1", Role::User, vec![MessagePart::text("hi")])];
        assert!(injector.inject(&existing).is_none());
        assert!(!injector.has_fired());
    }

    #[test]
    fn reset_reopens_the_latch() {
        let mut injector = WelcomeInjector::new("Namaste!");
        injector.inject(&[]);
        injector.reset();
        assert!(injector.inject(&[]).is_some());
    }
}
