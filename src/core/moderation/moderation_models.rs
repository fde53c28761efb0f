// Moderation domain models - data structures for attachment inspection.
//
// These are pure domain types with no Discord dependencies.
// The Discord layer converts these to Discord-specific actions.

/// One attachment on an inbound message.
#[derive(Debug, Clone)]
pub struct AttachmentRef {
    pub filename: String,
    /// URL the platform serves the file from.
    pub url: String,
}

/// An inbound message-posted event, reduced to what the pipeline needs.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub guild_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
    /// Set when the author is this bot; such events are never inspected.
    pub from_self: bool,
    pub attachments: Vec<AttachmentRef>,
}

impl MessageEvent {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            channel_id: self.channel_id,
            message_id: self.message_id,
        }
    }
}

/// Addressing handle for platform actions against one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: u64,
    pub message_id: u64,
}

/// Reaction marker applied in AUTOFLAG mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionMarker {
    /// White heavy check mark - attachment type approved.
    Approved,
    /// Cross mark - attachment type disapproved.
    Rejected,
}

/// What the pipeline did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Own message, mode OFF, ignored channel, or no attachments.
    Skipped,
    /// Every attachment was inspected; the message survived.
    Inspected,
    /// The message was deleted over this attachment. Terminal: remaining
    /// attachments were not acted on.
    Deleted { filename: String },
}
