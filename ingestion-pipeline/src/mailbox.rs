use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use common::error::AppError;
use common::storage::TenantContext;

use crate::intake::{IngestionService, ResumeUpload};

/// Body text shorter than this is not a requirement posting.
const MIN_REQUIREMENT_BODY_CHARS: usize = 50;

#[derive(Debug, Clone)]
pub struct MailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct MailMessage {
    pub id: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<MailAttachment>,
}

/// Mailbox transport collaborator (an IMAP client in production). The
/// poller owns the semantics: what to enqueue, when to mark seen.
#[async_trait]
pub trait MailboxSource: Send + Sync {
    async fn fetch_unseen(&self) -> Result<Vec<MailMessage>, AppError>;

    async fn mark_seen(&self, message_id: &str) -> Result<(), AppError>;
}

/// Polls a mailbox at a fixed interval: message bodies become requirement
/// ingestions, whitelisted attachments become resume uploads. A message is
/// marked seen only after every enqueue succeeded; transport errors leave
/// it unseen for the next tick.
pub struct MailboxPoller {
    source: Arc<dyn MailboxSource>,
    service: Arc<IngestionService>,
    tenant: TenantContext,
    attachment_whitelist: Vec<String>,
    poll_interval: Duration,
}

impl MailboxPoller {
    pub fn new(
        source: Arc<dyn MailboxSource>,
        service: Arc<IngestionService>,
        tenant: TenantContext,
        attachment_whitelist: Vec<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            service,
            tenant,
            attachment_whitelist,
            poll_interval,
        }
    }

    /// One poll cycle. Returns how many messages were fully processed.
    pub async fn tick(&self) -> Result<usize, AppError> {
        let messages = self.source.fetch_unseen().await?;
        let mut processed = 0;

        for message in messages {
            match self.process_message(&message).await {
                Ok(()) => {
                    self.source.mark_seen(&message.id).await?;
                    processed += 1;
                }
                Err(err) => {
                    // Leave unseen so the next tick retries it.
                    warn!(
                        message_id = %message.id,
                        error = %err,
                        "mailbox message processing failed; will retry"
                    );
                }
            }
        }

        Ok(processed)
    }

    async fn process_message(&self, message: &MailMessage) -> Result<(), AppError> {
        let body = message.body.trim();
        if body.chars().count() > MIN_REQUIREMENT_BODY_CHARS {
            self.service
                .ingest_requirement(&self.tenant, "email", body)
                .await?;
        }

        for attachment in &message.attachments {
            if !self.is_whitelisted(&attachment.content_type) {
                continue;
            }
            self.service
                .ingest_resume(
                    &self.tenant,
                    ResumeUpload {
                        file_name: attachment.file_name.clone(),
                        content_type: attachment.content_type.clone(),
                        bytes: attachment.bytes.clone(),
                        source: "email".to_string(),
                        consultant_id: None,
                        requirement_id: None,
                    },
                )
                .await?;
        }

        Ok(())
    }

    fn is_whitelisted(&self, content_type: &str) -> bool {
        let normalized = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        self.attachment_whitelist
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&normalized))
    }

    /// Run the poll loop until shutdown. Transport errors are logged and
    /// retried on the next tick (the IMAP client reconnects then).
    pub fn spawn(self) -> (JoinHandle<()>, watch::Sender<bool>) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            info!(
                tenant = self.tenant.tenant_id(),
                interval_ms = self.poll_interval.as_millis() as u64,
                "mailbox poller started"
            );
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                match self.tick().await {
                    Ok(processed) if processed > 0 => {
                        info!(processed, "mailbox tick processed messages");
                    }
                    Ok(_) => {}
                    Err(err) => {
                        error!(error = %err, "mailbox tick failed; reconnecting next tick");
                    }
                }
                tokio::select! {
                    _ = sleep(self.poll_interval) => {}
                    _ = shutdown_rx.changed() => {}
                }
            }
            info!("mailbox poller stopped");
        });
        (handle, shutdown_tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::testing::memory_service;
    use common::queue::{REQUIREMENT_INGESTION, RESUME_INGESTION};
    use common::storage::types::queue_job::QueueJob;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct ScriptedMailbox {
        messages: Mutex<Vec<MailMessage>>,
        seen: Mutex<HashSet<String>>,
        fail_fetch: Mutex<bool>,
    }

    impl ScriptedMailbox {
        fn new(messages: Vec<MailMessage>) -> Self {
            Self {
                messages: Mutex::new(messages),
                seen: Mutex::new(HashSet::new()),
                fail_fetch: Mutex::new(false),
            }
        }
    }

    #[async_trait]
    impl MailboxSource for ScriptedMailbox {
        async fn fetch_unseen(&self) -> Result<Vec<MailMessage>, AppError> {
            if *self.fail_fetch.lock().expect("lock") {
                return Err(AppError::Transient("imap connection reset".into()));
            }
            let seen = self.seen.lock().expect("lock");
            Ok(self
                .messages
                .lock()
                .expect("lock")
                .iter()
                .filter(|m| !seen.contains(&m.id))
                .cloned()
                .collect())
        }

        async fn mark_seen(&self, message_id: &str) -> Result<(), AppError> {
            self.seen.lock().expect("lock").insert(message_id.to_string());
            Ok(())
        }
    }

    fn long_body() -> String {
        "Title: Senior TypeScript Engineer\nClient: Initech\nSkills: TypeScript".to_string()
    }

    async fn poller_with(messages: Vec<MailMessage>) -> (MailboxPoller, Arc<ScriptedMailbox>) {
        let (service, tenant) = memory_service().await;
        let source = Arc::new(ScriptedMailbox::new(messages));
        let poller = MailboxPoller::new(
            Arc::clone(&source) as Arc<dyn MailboxSource>,
            Arc::new(service),
            tenant,
            vec!["application/pdf".to_string(), "text/plain".to_string()],
            Duration::from_millis(10),
        );
        (poller, source)
    }

    #[tokio::test]
    async fn bodies_and_whitelisted_attachments_are_enqueued() {
        let message = MailMessage {
            id: "m1".to_string(),
            subject: "New requirement".to_string(),
            body: long_body(),
            attachments: vec![
                MailAttachment {
                    file_name: "resume.txt".to_string(),
                    content_type: "text/plain".to_string(),
                    bytes: Bytes::from_static(b"Jane Doe resume text"),
                },
                MailAttachment {
                    file_name: "photo.png".to_string(),
                    content_type: "image/png".to_string(),
                    bytes: Bytes::from_static(b"not whitelisted"),
                },
            ],
        };
        let (poller, source) = poller_with(vec![message]).await;

        let processed = poller.tick().await.expect("tick");
        assert_eq!(processed, 1);
        assert!(source.seen.lock().expect("lock").contains("m1"));

        let db = poller.service.db();
        assert_eq!(
            QueueJob::pending_count(db, REQUIREMENT_INGESTION)
                .await
                .expect("count"),
            1
        );
        // Only the whitelisted attachment became a resume job.
        assert_eq!(
            QueueJob::pending_count(db, RESUME_INGESTION)
                .await
                .expect("count"),
            1
        );
    }

    #[tokio::test]
    async fn short_bodies_are_not_requirements() {
        let message = MailMessage {
            id: "m2".to_string(),
            subject: "hi".to_string(),
            body: "thanks!".to_string(),
            attachments: Vec::new(),
        };
        let (poller, _source) = poller_with(vec![message]).await;

        poller.tick().await.expect("tick");
        assert_eq!(
            QueueJob::pending_count(poller.service.db(), REQUIREMENT_INGESTION)
                .await
                .expect("count"),
            0
        );
    }

    #[tokio::test]
    async fn fetch_errors_leave_messages_unseen() {
        let message = MailMessage {
            id: "m3".to_string(),
            subject: "requirement".to_string(),
            body: long_body(),
            attachments: Vec::new(),
        };
        let (poller, source) = poller_with(vec![message]).await;

        *source.fail_fetch.lock().expect("lock") = true;
        assert!(poller.tick().await.is_err());
        assert!(source.seen.lock().expect("lock").is_empty());

        // Next tick succeeds and drains the message.
        *source.fail_fetch.lock().expect("lock") = false;
        let processed = poller.tick().await.expect("tick");
        assert_eq!(processed, 1);
    }

    #[tokio::test]
    async fn second_tick_skips_seen_messages() {
        let message = MailMessage {
            id: "m4".to_string(),
            subject: "requirement".to_string(),
            body: long_body(),
            attachments: Vec::new(),
        };
        let (poller, _source) = poller_with(vec![message]).await;

        assert_eq!(poller.tick().await.expect("tick"), 1);
        assert_eq!(poller.tick().await.expect("tick"), 0);
    }
}
