//! Send dispatcher
//!
//! Dispatch is a synchronous, best-effort, one-shot-per-recipient loop:
//! no queueing, no retry, no rate limiting. Every recipient gets exactly
//! one transport call and exactly one attempt record per invocation, and
//! repeated invocations within the window append fresh attempts.

use crate::transport::MailTransport;
use crate::window::MailingStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailflow_common::types::MailingId;
use mailflow_storage::db::DatabasePool;
use mailflow_storage::models::{AttemptStatus, Client, Mailing, MailingAttempt, Message};
use mailflow_storage::repository::{
    AttemptRepository, AttemptRepositoryTrait, MailingRepository, MailingRepositoryTrait,
    MessageRepository, MessageRepositoryTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};

/// Dispatch errors
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Mailing not found")]
    NotFound,

    #[error("Sending is only allowed between the mailing's start and end time")]
    WindowClosed,

    #[error("A dispatch for this mailing is already running")]
    AlreadyDispatching,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<mailflow_common::Error> for DispatchError {
    fn from(e: mailflow_common::Error) -> Self {
        DispatchError::Storage(e.to_string())
    }
}

/// Result of one dispatch invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    /// Recipients the loop reached, regardless of outcome
    pub recipients_attempted: usize,
}

/// Recording seam for the audit trail.
///
/// Each record is its own write; there is no transaction across the
/// loop, so attempts recorded before a failure stay persisted.
#[async_trait]
pub trait AttemptSink: Send + Sync {
    async fn record(
        &self,
        mailing_id: MailingId,
        status: AttemptStatus,
        server_response: &str,
    ) -> mailflow_common::Result<MailingAttempt>;
}

#[async_trait]
impl AttemptSink for AttemptRepository {
    async fn record(
        &self,
        mailing_id: MailingId,
        status: AttemptStatus,
        server_response: &str,
    ) -> mailflow_common::Result<MailingAttempt> {
        AttemptRepositoryTrait::record(self, mailing_id, status, server_response).await
    }
}

/// Refuse dispatch outside the mailing's window.
pub fn check_window(mailing: &Mailing, now: DateTime<Utc>) -> Result<(), DispatchError> {
    match MailingStatus::at(now, mailing.start_time, mailing.end_time) {
        MailingStatus::Running => Ok(()),
        _ => Err(DispatchError::WindowClosed),
    }
}

/// Run the per-recipient send loop.
///
/// A transport failure is absorbed into a Failed attempt and the loop
/// continues; a sink failure aborts the loop, leaving earlier attempts
/// in place.
pub async fn run_send_loop<T, S>(
    mailing: &Mailing,
    message: &Message,
    recipients: &[Client],
    transport: &T,
    sink: &S,
) -> Result<DispatchSummary, DispatchError>
where
    T: MailTransport + ?Sized,
    S: AttemptSink + ?Sized,
{
    let mut attempted = 0usize;

    for client in recipients {
        let (status, server_response) = match transport
            .send(
                &mailing.sender_email,
                &message.subject,
                &message.body,
                &client.email,
            )
            .await
        {
            Ok(confirmation) => (
                AttemptStatus::Success,
                format!("{}: {}", client.email, confirmation),
            ),
            Err(e) => {
                warn!(
                    mailing_id = %mailing.id,
                    recipient = %client.email,
                    "Send failed: {}", e
                );
                (AttemptStatus::Failed, format!("{}: {}", client.email, e))
            }
        };

        sink.record(mailing.id, status, &server_response)
            .await
            .map_err(|e| DispatchError::Storage(e.to_string()))?;

        attempted += 1;
    }

    Ok(DispatchSummary {
        recipients_attempted: attempted,
    })
}

/// Mailing dispatcher - wires the repositories, the transport, and the
/// per-mailing locks together.
///
/// Generic over its collaborators the same way `run_send_loop` is; the
/// default parameters are the database-backed repositories.
pub struct MailingDispatcher<M = MailingRepository, G = MessageRepository, A = AttemptRepository> {
    mailing_repo: M,
    message_repo: G,
    attempt_repo: A,
    transport: Arc<dyn MailTransport>,
    locks: Mutex<HashMap<MailingId, Arc<tokio::sync::Mutex<()>>>>,
}

impl MailingDispatcher {
    /// Create a dispatcher backed by the database repositories
    pub fn new(db_pool: DatabasePool, transport: Arc<dyn MailTransport>) -> Self {
        Self::with_parts(
            MailingRepository::new(db_pool.clone()),
            MessageRepository::new(db_pool.clone()),
            AttemptRepository::new(db_pool),
            transport,
        )
    }
}

impl<M, G, A> MailingDispatcher<M, G, A>
where
    M: MailingRepositoryTrait,
    G: MessageRepositoryTrait,
    A: AttemptSink,
{
    /// Assemble a dispatcher from its collaborators
    pub fn with_parts(
        mailing_repo: M,
        message_repo: G,
        attempt_repo: A,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        Self {
            mailing_repo,
            message_repo,
            attempt_repo,
            transport,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, mailing_id: MailingId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock map poisoned");
        locks.entry(mailing_id).or_default().clone()
    }

    fn release(&self, mailing_id: MailingId) {
        let mut locks = self.locks.lock().expect("lock map poisoned");
        if let Some(lock) = locks.get(&mailing_id) {
            // Drop the entry once nobody else holds it
            if Arc::strong_count(lock) == 1 {
                locks.remove(&mailing_id);
            }
        }
    }

    /// Dispatch a mailing: refuse outside the window, refuse a
    /// concurrent duplicate, otherwise send to every recipient and
    /// record one attempt each.
    pub async fn dispatch(
        &self,
        mailing_id: MailingId,
        now: DateTime<Utc>,
    ) -> Result<DispatchSummary, DispatchError> {
        let mailing = self
            .mailing_repo
            .get(mailing_id)
            .await?
            .ok_or(DispatchError::NotFound)?;

        check_window(&mailing, now)?;

        let lock = self.lock_for(mailing_id);
        let guard = match lock.try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => return Err(DispatchError::AlreadyDispatching),
        };

        let result = self.dispatch_locked(&mailing).await;

        drop(guard);
        self.release(mailing_id);

        result
    }

    async fn dispatch_locked(&self, mailing: &Mailing) -> Result<DispatchSummary, DispatchError> {
        let message = self
            .message_repo
            .get(mailing.message_id)
            .await?
            .ok_or(DispatchError::NotFound)?;

        let recipients = self.mailing_repo.recipients(mailing.id).await?;

        let summary = run_send_loop(
            mailing,
            &message,
            &recipients,
            self.transport.as_ref(),
            &self.attempt_repo,
        )
        .await?;

        info!(
            mailing_id = %mailing.id,
            recipients = summary.recipients_attempted,
            "Mailing dispatched"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use chrono::TimeZone;
    use mailflow_storage::models::{CreateMailing, CreateMessage, UpdateMailing, UpdateMessage};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use uuid::Uuid;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn mailing(start: DateTime<Utc>, end: DateTime<Utc>) -> Mailing {
        Mailing {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            sender_email: "news@example.com".to_string(),
            start_time: start,
            end_time: end,
            message_id: Uuid::new_v4(),
            is_active: true,
            created_at: start,
        }
    }

    fn message() -> Message {
        Message {
            id: Uuid::new_v4(),
            subject: "Hello".to_string(),
            body: "Body text".to_string(),
            created_at: t(0),
        }
    }

    fn client(email: &str) -> Client {
        Client {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: email.to_string(),
            comment: String::new(),
            created_at: t(0),
        }
    }

    /// Transport that fails for a configured set of recipients
    struct MockTransport {
        failing: HashSet<String>,
    }

    impl MockTransport {
        fn new(failing: &[&str]) -> Self {
            Self {
                failing: failing.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl MailTransport for MockTransport {
        async fn send(
            &self,
            _from: &str,
            _subject: &str,
            _body: &str,
            recipient: &str,
        ) -> Result<String, TransportError> {
            if self.failing.contains(recipient) {
                Err(TransportError("550 mailbox unavailable".to_string()))
            } else {
                Ok("250 OK".to_string())
            }
        }
    }

    /// In-memory attempt sink
    #[derive(Clone, Default)]
    struct MemorySink {
        records: Arc<tokio::sync::Mutex<Vec<(MailingId, AttemptStatus, String)>>>,
    }

    impl MemorySink {
        async fn recorded(&self) -> Vec<(MailingId, AttemptStatus, String)> {
            self.records.lock().await.clone()
        }
    }

    #[async_trait]
    impl AttemptSink for MemorySink {
        async fn record(
            &self,
            mailing_id: MailingId,
            status: AttemptStatus,
            server_response: &str,
        ) -> mailflow_common::Result<MailingAttempt> {
            self.records
                .lock()
                .await
                .push((mailing_id, status, server_response.to_string()));
            Ok(MailingAttempt {
                id: Uuid::new_v4(),
                mailing_id,
                attempt_time: Utc::now(),
                status: status.to_string(),
                server_response: server_response.to_string(),
            })
        }
    }

    /// Sink that fails after a configured number of records
    struct FlakySink {
        inner: MemorySink,
        fail_after: usize,
    }

    #[async_trait]
    impl AttemptSink for FlakySink {
        async fn record(
            &self,
            mailing_id: MailingId,
            status: AttemptStatus,
            server_response: &str,
        ) -> mailflow_common::Result<MailingAttempt> {
            if self.inner.records.lock().await.len() >= self.fail_after {
                return Err(mailflow_common::Error::Database(
                    "connection reset".to_string(),
                ));
            }
            self.inner.record(mailing_id, status, server_response).await
        }
    }

    #[test]
    fn window_check_refuses_outside_window() {
        let m = mailing(t(100), t(200));
        assert!(matches!(
            check_window(&m, t(99)),
            Err(DispatchError::WindowClosed)
        ));
        assert!(matches!(
            check_window(&m, t(201)),
            Err(DispatchError::WindowClosed)
        ));
        assert!(check_window(&m, t(100)).is_ok());
        assert!(check_window(&m, t(200)).is_ok());
        assert!(check_window(&m, t(150)).is_ok());
    }

    #[tokio::test]
    async fn records_one_attempt_per_recipient() {
        let m = mailing(t(0), t(100));
        let msg = message();
        let recipients = vec![client("a@example.com"), client("b@example.com")];
        let transport = MockTransport::new(&[]);
        let sink = MemorySink::default();

        let summary = run_send_loop(&m, &msg, &recipients, &transport, &sink)
            .await
            .unwrap();

        assert_eq!(summary.recipients_attempted, 2);
        let records = sink.recorded().await;
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|(id, status, _)| *id == m.id && *status == AttemptStatus::Success));
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_loop() {
        let m = mailing(t(0), t(100));
        let msg = message();
        let recipients = vec![client("ok@example.com"), client("bad@example.com")];
        let transport = MockTransport::new(&["bad@example.com"]);
        let sink = MemorySink::default();

        let summary = run_send_loop(&m, &msg, &recipients, &transport, &sink)
            .await
            .unwrap();

        assert_eq!(summary.recipients_attempted, 2);
        let records = sink.recorded().await;
        assert_eq!(records.len(), 2);

        let successes: Vec<_> = records
            .iter()
            .filter(|(_, s, _)| *s == AttemptStatus::Success)
            .collect();
        let failures: Vec<_> = records
            .iter()
            .filter(|(_, s, _)| *s == AttemptStatus::Failed)
            .collect();
        assert_eq!(successes.len(), 1);
        assert_eq!(failures.len(), 1);
        assert!(successes[0].2.starts_with("ok@example.com:"));
        assert!(failures[0].2.contains("550 mailbox unavailable"));
    }

    #[tokio::test]
    async fn failure_first_in_iteration_order_still_reaches_the_rest() {
        let m = mailing(t(0), t(100));
        let msg = message();
        let recipients = vec![client("bad@example.com"), client("ok@example.com")];
        let transport = MockTransport::new(&["bad@example.com"]);
        let sink = MemorySink::default();

        run_send_loop(&m, &msg, &recipients, &transport, &sink)
            .await
            .unwrap();

        let records = sink.recorded().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].1, AttemptStatus::Failed);
        assert_eq!(records[1].1, AttemptStatus::Success);
    }

    #[tokio::test]
    async fn repeated_dispatch_appends_attempts() {
        // Two invocations within the same window over N recipients
        // produce 2N attempts; nothing is deduplicated.
        let m = mailing(t(0), t(100));
        let msg = message();
        let recipients = vec![
            client("a@example.com"),
            client("b@example.com"),
            client("c@example.com"),
        ];
        let transport = MockTransport::new(&[]);
        let sink = MemorySink::default();

        run_send_loop(&m, &msg, &recipients, &transport, &sink)
            .await
            .unwrap();
        run_send_loop(&m, &msg, &recipients, &transport, &sink)
            .await
            .unwrap();

        assert_eq!(sink.recorded().await.len(), 6);
    }

    #[tokio::test]
    async fn empty_recipient_set_attempts_nothing() {
        let m = mailing(t(0), t(100));
        let msg = message();
        let transport = MockTransport::new(&[]);
        let sink = MemorySink::default();

        let summary = run_send_loop(&m, &msg, &[], &transport, &sink)
            .await
            .unwrap();

        assert_eq!(summary.recipients_attempted, 0);
        assert!(sink.recorded().await.is_empty());
    }

    #[tokio::test]
    async fn sink_failure_aborts_but_keeps_earlier_attempts() {
        let m = mailing(t(0), t(100));
        let msg = message();
        let recipients = vec![
            client("a@example.com"),
            client("b@example.com"),
            client("c@example.com"),
        ];
        let transport = MockTransport::new(&[]);
        let sink = FlakySink {
            inner: MemorySink::default(),
            fail_after: 2,
        };

        let result = run_send_loop(&m, &msg, &recipients, &transport, &sink).await;

        assert!(matches!(result, Err(DispatchError::Storage(_))));
        assert_eq!(sink.inner.recorded().await.len(), 2);
    }

    /// Mailing repository serving one fixed mailing and recipient set
    struct StubMailingRepo {
        mailing: Mailing,
        recipients: Vec<Client>,
    }

    #[async_trait]
    impl MailingRepositoryTrait for StubMailingRepo {
        async fn create(&self, _input: CreateMailing) -> mailflow_common::Result<Mailing> {
            unimplemented!()
        }

        async fn get(&self, id: MailingId) -> mailflow_common::Result<Option<Mailing>> {
            Ok((id == self.mailing.id).then(|| self.mailing.clone()))
        }

        async fn list_by_owner(
            &self,
            _owner_id: mailflow_common::types::UserId,
            _limit: i64,
            _offset: i64,
        ) -> mailflow_common::Result<Vec<Mailing>> {
            unimplemented!()
        }

        async fn list_all(&self, _limit: i64, _offset: i64) -> mailflow_common::Result<Vec<Mailing>> {
            unimplemented!()
        }

        async fn list_running(&self, _now: DateTime<Utc>) -> mailflow_common::Result<Vec<Mailing>> {
            unimplemented!()
        }

        async fn update(
            &self,
            _id: MailingId,
            _input: UpdateMailing,
        ) -> mailflow_common::Result<Option<Mailing>> {
            unimplemented!()
        }

        async fn delete(&self, _id: MailingId) -> mailflow_common::Result<bool> {
            unimplemented!()
        }

        async fn recipients(&self, _id: MailingId) -> mailflow_common::Result<Vec<Client>> {
            Ok(self.recipients.clone())
        }

        async fn count_by_owner(
            &self,
            _owner_id: mailflow_common::types::UserId,
        ) -> mailflow_common::Result<i64> {
            unimplemented!()
        }

        async fn count_all(&self) -> mailflow_common::Result<i64> {
            unimplemented!()
        }

        async fn count_running(&self, _now: DateTime<Utc>) -> mailflow_common::Result<i64> {
            unimplemented!()
        }
    }

    /// Message repository serving one fixed message
    struct StubMessageRepo {
        message: Message,
    }

    #[async_trait]
    impl MessageRepositoryTrait for StubMessageRepo {
        async fn create(&self, _input: CreateMessage) -> mailflow_common::Result<Message> {
            unimplemented!()
        }

        async fn get(
            &self,
            _id: mailflow_common::types::MessageId,
        ) -> mailflow_common::Result<Option<Message>> {
            Ok(Some(self.message.clone()))
        }

        async fn list(&self, _limit: i64, _offset: i64) -> mailflow_common::Result<Vec<Message>> {
            unimplemented!()
        }

        async fn update(
            &self,
            _id: mailflow_common::types::MessageId,
            _input: UpdateMessage,
        ) -> mailflow_common::Result<Option<Message>> {
            unimplemented!()
        }

        async fn delete(&self, _id: mailflow_common::types::MessageId) -> mailflow_common::Result<bool> {
            unimplemented!()
        }
    }

    /// Transport that signals when the first send starts and then waits
    /// to be released, holding the dispatch mid-flight
    struct GatedTransport {
        entered: std::sync::Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl MailTransport for GatedTransport {
        async fn send(
            &self,
            _from: &str,
            _subject: &str,
            _body: &str,
            _recipient: &str,
        ) -> Result<String, TransportError> {
            if let Some(tx) = self.entered.lock().unwrap().take() {
                let _ = tx.send(());
            }
            self.release.notified().await;
            Ok("250 OK".to_string())
        }
    }

    fn stub_dispatcher<T: MailTransport + 'static>(
        m: &Mailing,
        recipients: Vec<Client>,
        sink: MemorySink,
        transport: T,
    ) -> MailingDispatcher<StubMailingRepo, StubMessageRepo, MemorySink> {
        MailingDispatcher::with_parts(
            StubMailingRepo {
                mailing: m.clone(),
                recipients,
            },
            StubMessageRepo { message: message() },
            sink,
            Arc::new(transport),
        )
    }

    #[tokio::test]
    async fn concurrent_dispatch_of_the_same_mailing_is_refused() {
        let m = mailing(t(0), t(100));
        let (entered_tx, entered_rx) = tokio::sync::oneshot::channel();
        let transport = Arc::new(GatedTransport {
            entered: std::sync::Mutex::new(Some(entered_tx)),
            release: tokio::sync::Notify::new(),
        });
        let sink = MemorySink::default();
        let dispatcher = Arc::new(MailingDispatcher::with_parts(
            StubMailingRepo {
                mailing: m.clone(),
                recipients: vec![client("a@example.com")],
            },
            StubMessageRepo { message: message() },
            sink.clone(),
            transport.clone() as Arc<dyn MailTransport>,
        ));

        let first = {
            let dispatcher = dispatcher.clone();
            let id = m.id;
            tokio::spawn(async move { dispatcher.dispatch(id, t(10)).await })
        };

        // Wait until the first dispatch holds the lock and sits inside
        // the transport call
        entered_rx.await.unwrap();

        let second = dispatcher.dispatch(m.id, t(10)).await;
        assert!(matches!(second, Err(DispatchError::AlreadyDispatching)));

        transport.release.notify_one();
        let summary = first.await.unwrap().unwrap();
        assert_eq!(summary.recipients_attempted, 1);

        // The refused dispatch recorded nothing; only the first one did
        assert_eq!(sink.recorded().await.len(), 1);
    }

    #[tokio::test]
    async fn sequential_redispatch_appends_a_fresh_attempt_set() {
        let m = mailing(t(0), t(100));
        let sink = MemorySink::default();
        let dispatcher = stub_dispatcher(
            &m,
            vec![client("a@example.com"), client("b@example.com")],
            sink.clone(),
            MockTransport::new(&[]),
        );

        dispatcher.dispatch(m.id, t(10)).await.unwrap();
        dispatcher.dispatch(m.id, t(20)).await.unwrap();

        assert_eq!(sink.recorded().await.len(), 4);

        // The lock map does not leak entries once a dispatch finishes
        assert!(dispatcher.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dispatcher_refuses_unknown_mailings_and_closed_windows() {
        let m = mailing(t(0), t(100));
        let sink = MemorySink::default();
        let dispatcher = stub_dispatcher(
            &m,
            vec![client("a@example.com")],
            sink.clone(),
            MockTransport::new(&[]),
        );

        let missing = dispatcher.dispatch(Uuid::new_v4(), t(10)).await;
        assert!(matches!(missing, Err(DispatchError::NotFound)));

        let closed = dispatcher.dispatch(m.id, t(200) + chrono::Duration::seconds(1)).await;
        assert!(matches!(closed, Err(DispatchError::WindowClosed)));

        assert!(sink.recorded().await.is_empty());
    }
}
