// Attachment moderation pipeline - core business logic.
//
// For each inbound message this service loads the guild's policy, fetches a
// short byte prefix of every attachment, sniffs its true content type, and
// dispatches the configured action. Fetching, sniffing, and platform actions
// are ports so the pipeline stays platform-agnostic and testable.
//
// NO Discord dependencies here - just pure domain logic.

use super::moderation_models::{MessageEvent, MessageOutcome, MessageRef, ReactionMarker};
use crate::core::policy::{Mode, PolicyError, PolicyService, PolicyStore};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// How much of an attachment is fetched for classification. 512 bytes is
/// enough for any standard file signature.
pub const SNIFF_PREFIX_LEN: usize = 512;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum FetchError {
    /// The file server answered with a non-success status.
    #[error("attachment fetch returned status {0}")]
    Status(u16),

    #[error("attachment fetch failed: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("platform action failed: {0}")]
    Platform(String),
}

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),
}

// ============================================================================
// PORTS
// ============================================================================

/// Fetches the leading bytes of an attachment.
///
/// Implementations request a ranged GET; a server that ignores the range and
/// returns the full body still counts as success.
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch_prefix(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Classifies a byte buffer into a MIME-type string. Best effort, pure.
pub trait ContentSniffer: Send + Sync {
    fn sniff(&self, bytes: &[u8]) -> String;
}

/// Outbound platform actions the pipeline can take on a message.
#[async_trait]
pub trait MessageActions: Send + Sync {
    /// Add an approval/rejection marker reaction.
    async fn react(&self, msg: MessageRef, marker: ReactionMarker) -> Result<(), ActionError>;

    /// Delete the message and post a notice naming the offending file.
    async fn delete_with_notice(&self, msg: MessageRef, filename: &str)
        -> Result<(), ActionError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct ModerationService<S, F, C>
where
    S: PolicyStore,
    F: AttachmentFetcher,
    C: ContentSniffer,
{
    policies: Arc<PolicyService<S>>,
    fetcher: F,
    sniffer: C,
}

impl<S, F, C> ModerationService<S, F, C>
where
    S: PolicyStore,
    F: AttachmentFetcher,
    C: ContentSniffer,
{
    pub fn new(policies: Arc<PolicyService<S>>, fetcher: F, sniffer: C) -> Self {
        Self {
            policies,
            fetcher,
            sniffer,
        }
    }

    /// Run the moderation pipeline for one inbound message.
    ///
    /// Attachments are processed in order. A deletion is terminal for the
    /// whole message: once issued, remaining attachments are not acted on,
    /// since any further reaction or delete would target a dead message.
    pub async fn handle_message<A: MessageActions>(
        &self,
        event: &MessageEvent,
        actions: &A,
    ) -> Result<MessageOutcome, ModerationError> {
        // Never inspect our own notifications; that would loop.
        if event.from_self {
            return Ok(MessageOutcome::Skipped);
        }

        if event.attachments.is_empty() {
            return Ok(MessageOutcome::Skipped);
        }

        let policy = self.policies.get(event.guild_id).await?;

        if policy.mode == Mode::Off || policy.ignored_channels.contains(&event.channel_id) {
            return Ok(MessageOutcome::Skipped);
        }

        for attachment in &event.attachments {
            let bytes = match self.fetcher.fetch_prefix(&attachment.url).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    // Not user-visible; skip just this attachment.
                    tracing::debug!(
                        filename = %attachment.filename,
                        url = %attachment.url,
                        error = %err,
                        "Skipping attachment with failed fetch"
                    );
                    continue;
                }
            };

            let content_type = self.sniffer.sniff(&bytes);
            let approved = policy.approves(&content_type);

            tracing::debug!(
                filename = %attachment.filename,
                bytes = bytes.len(),
                content_type = %content_type,
                url = %attachment.url,
                approved,
                "Classified attachment"
            );

            match policy.mode {
                // Handled before the loop; nothing to do per attachment.
                Mode::Off => {}
                Mode::AutoFlag => {
                    let marker = if approved {
                        ReactionMarker::Approved
                    } else {
                        ReactionMarker::Rejected
                    };
                    actions.react(event.message_ref(), marker).await?;
                }
                Mode::AutoDelete => {
                    if !approved {
                        actions
                            .delete_with_notice(event.message_ref(), &attachment.filename)
                            .await?;

                        tracing::info!(
                            guild_id = event.guild_id,
                            channel_id = event.channel_id,
                            filename = %attachment.filename,
                            "Deleted message with disapproved attachment"
                        );

                        // Terminal for the whole message; remaining
                        // attachments would target a dead message.
                        return Ok(MessageOutcome::Deleted {
                            filename: attachment.filename.clone(),
                        });
                    }
                }
            }
        }

        Ok(MessageOutcome::Inspected)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::AttachmentRef;
    use crate::core::policy::{GuildPolicy, PolicyStoreError};
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory document store so tests can seed policies via the service.
    struct MemoryPolicyStore {
        documents: DashMap<u64, String>,
    }

    impl MemoryPolicyStore {
        fn new() -> Self {
            Self {
                documents: DashMap::new(),
            }
        }
    }

    #[async_trait]
    impl PolicyStore for MemoryPolicyStore {
        async fn load(&self, guild_id: u64) -> Result<Option<String>, PolicyStoreError> {
            Ok(self.documents.get(&guild_id).map(|d| d.clone()))
        }

        async fn save(&self, guild_id: u64, document: &str) -> Result<(), PolicyStoreError> {
            self.documents.insert(guild_id, document.to_string());
            Ok(())
        }
    }

    /// Fetcher that serves canned bodies per URL and counts calls.
    /// A body of `None` simulates a non-success status.
    struct MockFetcher {
        bodies: DashMap<String, Option<Vec<u8>>>,
        calls: AtomicUsize,
    }

    impl MockFetcher {
        fn new() -> Self {
            Self {
                bodies: DashMap::new(),
                calls: AtomicUsize::new(0),
            }
        }

        fn serve(&self, url: &str, body: &[u8]) {
            self.bodies.insert(url.to_string(), Some(body.to_vec()));
        }

        fn fail(&self, url: &str) {
            self.bodies.insert(url.to_string(), None);
        }
    }

    #[async_trait]
    impl AttachmentFetcher for MockFetcher {
        async fn fetch_prefix(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.bodies.get(url).map(|b| b.clone()) {
                Some(Some(bytes)) => Ok(bytes),
                _ => Err(FetchError::Status(404)),
            }
        }
    }

    /// Sniffer that reads the buffer back as the MIME type, so tests can
    /// pick the classification by picking the body.
    struct EchoSniffer;

    impl ContentSniffer for EchoSniffer {
        fn sniff(&self, bytes: &[u8]) -> String {
            String::from_utf8_lossy(bytes).into_owned()
        }
    }

    /// Action sink that records everything the pipeline asks for.
    #[derive(Default)]
    struct RecordingActions {
        reactions: Mutex<Vec<(MessageRef, ReactionMarker)>>,
        deletions: Mutex<Vec<(MessageRef, String)>>,
    }

    #[async_trait]
    impl MessageActions for RecordingActions {
        async fn react(&self, msg: MessageRef, marker: ReactionMarker) -> Result<(), ActionError> {
            self.reactions.lock().unwrap().push((msg, marker));
            Ok(())
        }

        async fn delete_with_notice(
            &self,
            msg: MessageRef,
            filename: &str,
        ) -> Result<(), ActionError> {
            self.deletions
                .lock()
                .unwrap()
                .push((msg, filename.to_string()));
            Ok(())
        }
    }

    async fn service_with_policy(
        guild_id: u64,
        policy: GuildPolicy,
    ) -> ModerationService<MemoryPolicyStore, MockFetcher, EchoSniffer> {
        let policies = Arc::new(PolicyService::new(MemoryPolicyStore::new()));
        policies.set(guild_id, policy).await.unwrap();
        ModerationService::new(policies, MockFetcher::new(), EchoSniffer)
    }

    fn event(attachments: Vec<AttachmentRef>) -> MessageEvent {
        MessageEvent {
            guild_id: 1,
            channel_id: 10,
            message_id: 100,
            from_self: false,
            attachments,
        }
    }

    fn attachment(filename: &str, url: &str) -> AttachmentRef {
        AttachmentRef {
            filename: filename.to_string(),
            url: url.to_string(),
        }
    }

    fn policy(mode: Mode) -> GuildPolicy {
        GuildPolicy {
            mode,
            ..GuildPolicy::default()
        }
    }

    #[tokio::test]
    async fn off_mode_produces_no_actions() {
        let service = service_with_policy(1, policy(Mode::Off)).await;
        service.fetcher.serve("u1", b"application/x-elf");
        let actions = RecordingActions::default();

        let outcome = service
            .handle_message(&event(vec![attachment("evil.bin", "u1")]), &actions)
            .await
            .unwrap();

        assert_eq!(outcome, MessageOutcome::Skipped);
        assert!(actions.reactions.lock().unwrap().is_empty());
        assert!(actions.deletions.lock().unwrap().is_empty());
        // OFF must not even fetch.
        assert_eq!(service.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn autoflag_approved_type_gets_one_approval_marker() {
        let service = service_with_policy(1, policy(Mode::AutoFlag)).await;
        service.fetcher.serve("u1", b"image/png");
        let actions = RecordingActions::default();

        let outcome = service
            .handle_message(&event(vec![attachment("cat.png", "u1")]), &actions)
            .await
            .unwrap();

        assert_eq!(outcome, MessageOutcome::Inspected);
        let reactions = actions.reactions.lock().unwrap();
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].1, ReactionMarker::Approved);
        assert!(actions.deletions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn autoflag_disapproved_type_gets_one_rejection_marker() {
        let service = service_with_policy(1, policy(Mode::AutoFlag)).await;
        service.fetcher.serve("u1", b"application/x-elf");
        let actions = RecordingActions::default();

        service
            .handle_message(&event(vec![attachment("tool", "u1")]), &actions)
            .await
            .unwrap();

        let reactions = actions.reactions.lock().unwrap();
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].1, ReactionMarker::Rejected);
        assert!(actions.deletions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn autodelete_disapproved_type_deletes_with_filename_notice() {
        let service = service_with_policy(1, policy(Mode::AutoDelete)).await;
        service.fetcher.serve("u1", b"application/x-elf");
        let actions = RecordingActions::default();

        let outcome = service
            .handle_message(&event(vec![attachment("payload.bin", "u1")]), &actions)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            MessageOutcome::Deleted {
                filename: "payload.bin".to_string()
            }
        );
        let deletions = actions.deletions.lock().unwrap();
        assert_eq!(deletions.len(), 1);
        assert_eq!(deletions[0].1, "payload.bin");
        assert!(actions.reactions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn autodelete_approved_type_is_left_alone() {
        let service = service_with_policy(1, policy(Mode::AutoDelete)).await;
        service.fetcher.serve("u1", b"video/mp4");
        let actions = RecordingActions::default();

        let outcome = service
            .handle_message(&event(vec![attachment("clip.mp4", "u1")]), &actions)
            .await
            .unwrap();

        assert_eq!(outcome, MessageOutcome::Inspected);
        assert!(actions.reactions.lock().unwrap().is_empty());
        assert!(actions.deletions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn deletion_is_terminal_for_remaining_attachments() {
        let service = service_with_policy(1, policy(Mode::AutoDelete)).await;
        service.fetcher.serve("u1", b"application/x-elf");
        service.fetcher.serve("u2", b"application/x-elf");
        let actions = RecordingActions::default();

        let outcome = service
            .handle_message(
                &event(vec![attachment("first.bin", "u1"), attachment("second.bin", "u2")]),
                &actions,
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            MessageOutcome::Deleted {
                filename: "first.bin".to_string()
            }
        );
        assert_eq!(actions.deletions.lock().unwrap().len(), 1);
        // The second attachment must not even be fetched once the message
        // is gone.
        assert_eq!(service.fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ignored_channel_gets_no_actions_even_in_autodelete() {
        let mut p = policy(Mode::AutoDelete);
        p.ignored_channels.insert(10);
        let service = service_with_policy(1, p).await;
        service.fetcher.serve("u1", b"application/x-elf");
        let actions = RecordingActions::default();

        let outcome = service
            .handle_message(&event(vec![attachment("evil.bin", "u1")]), &actions)
            .await
            .unwrap();

        assert_eq!(outcome, MessageOutcome::Skipped);
        assert!(actions.deletions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn own_messages_are_never_inspected() {
        let service = service_with_policy(1, policy(Mode::AutoDelete)).await;
        service.fetcher.serve("u1", b"application/x-elf");
        let actions = RecordingActions::default();

        let mut ev = event(vec![attachment("notice.bin", "u1")]);
        ev.from_self = true;

        let outcome = service.handle_message(&ev, &actions).await.unwrap();

        assert_eq!(outcome, MessageOutcome::Skipped);
        assert_eq!(service.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn messages_without_attachments_are_skipped() {
        let service = service_with_policy(1, policy(Mode::AutoFlag)).await;
        let actions = RecordingActions::default();

        let outcome = service.handle_message(&event(vec![]), &actions).await.unwrap();

        assert_eq!(outcome, MessageOutcome::Skipped);
    }

    #[tokio::test]
    async fn failed_fetch_skips_only_that_attachment() {
        let service = service_with_policy(1, policy(Mode::AutoFlag)).await;
        service.fetcher.fail("u1");
        service.fetcher.serve("u2", b"image/png");
        let actions = RecordingActions::default();

        let outcome = service
            .handle_message(
                &event(vec![attachment("gone.png", "u1"), attachment("cat.png", "u2")]),
                &actions,
            )
            .await
            .unwrap();

        assert_eq!(outcome, MessageOutcome::Inspected);
        // Only the reachable attachment got a marker.
        assert_eq!(actions.reactions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn emptied_pattern_list_rejects_everything() {
        let mut p = policy(Mode::AutoDelete);
        p.allowed_patterns.clear();
        let service = service_with_policy(1, p).await;
        service.fetcher.serve("u1", b"image/png");
        let actions = RecordingActions::default();

        let outcome = service
            .handle_message(&event(vec![attachment("cat.png", "u1")]), &actions)
            .await
            .unwrap();

        assert!(matches!(outcome, MessageOutcome::Deleted { .. }));
    }
}
