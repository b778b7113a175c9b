use crate::domain::ChatMessage;

/// Events the transport hands to the session runner, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    ChatMessage(ChatMessage),
    ConnectionOpened,
    ConnectionFailed { cause: String },
    /// Any frame the bot has no use for.
    Unrecognized,
}

impl InboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::ChatMessage(_) => "chat-message",
            InboundEvent::ConnectionOpened => "connection-opened",
            InboundEvent::ConnectionFailed { .. } => "connection-failed",
            InboundEvent::Unrecognized => "unrecognized",
        }
    }
}
