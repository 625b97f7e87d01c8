use tc_domain::tool::Message;
use tc_domain::trace::TraceEvent;

/// State for one conversation, owned by the front-end and lent to each turn.
///
/// `context` is what the model sees on every call; `transcript` is what the
/// user sees. Both start empty and only grow until [`reset`](Self::reset).
#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub id: String,
    pub credential: Option<String>,
    pub context: Vec<Message>,
    pub transcript: Vec<Message>,
    /// Source of the most recent `execute_code` run.
    pub last_executed_code: Option<String>,
}

impl ConversationSession {
    pub fn new(credential: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            credential,
            context: Vec::new(),
            transcript: Vec::new(),
            last_executed_code: None,
        }
    }

    /// Drop the rejected credential. Returns `true` if one was held.
    pub fn clear_credential(&mut self) -> bool {
        if self.credential.take().is_none() {
            return false;
        }
        TraceEvent::CredentialCleared {
            session_id: self.id.clone(),
        }
        .emit();
        true
    }

    /// Start a fresh conversation under a new id, keeping the credential.
    pub fn reset(&mut self) {
        *self = Self::new(self.credential.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_credential_only_reports_once() {
        let mut session = ConversationSession::new(Some("sk-1".into()));
        assert!(session.clear_credential());
        assert!(session.credential.is_none());
        assert!(!session.clear_credential());
    }

    #[test]
    fn reset_keeps_credential_and_changes_id() {
        let mut session = ConversationSession::new(Some("sk-1".into()));
        let old_id = session.id.clone();
        session.context.push(Message::user("hi"));
        session.transcript.push(Message::user("hi"));
        session.last_executed_code = Some("print(1)".into());

        session.reset();

        assert_ne!(session.id, old_id);
        assert_eq!(session.credential.as_deref(), Some("sk-1"));
        assert!(session.context.is_empty());
        assert!(session.transcript.is_empty());
        assert!(session.last_executed_code.is_none());
    }
}
