//! Pairing code redemption
//!
//! Redeeming a code:
//! 1. Resolve `pairId` from a flat or wrapped request
//! 2. Look the code up in the `pairingCodes` collection
//! 3. Reject codes that are already used, then codes that have expired
//! 4. Refuse codes whose topic could never be delivered to, leaving them unused
//! 5. Flip `used` to true with a conditional single-field update
//! 6. Publish `{"type": "PAIRED"}` to `pair_<pairId>`

use crate::storage::{MarkUsed, PairingStore, StorageError};
use chrono::{DateTime, Utc};
use pairlink_core::{CallableError, ErrorKind, PairingMessage, RedeemRequest, RedeemResponse};
use pairlink_messaging::{is_valid_topic, MessagePublisher, PublishError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Redemption errors
#[derive(Debug, Error)]
pub enum RedeemError {
    #[error("Missing pairId")]
    MissingPairId,
    #[error("No pairing code {0} found, maybe it expired or wasn't generated yet")]
    NotFound(String),
    #[error("Pairing code already used")]
    AlreadyUsed,
    #[error("Pairing code expired")]
    Expired,
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
}

pub type RedeemResult<T> = Result<T, RedeemError>;

impl RedeemError {
    /// Caller-visible kind of this failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            RedeemError::MissingPairId => ErrorKind::InvalidArgument,
            RedeemError::NotFound(_) => ErrorKind::NotFound,
            RedeemError::AlreadyUsed => ErrorKind::FailedPrecondition,
            RedeemError::Expired => ErrorKind::DeadlineExceeded,
            RedeemError::Storage(_) | RedeemError::Publish(_) => ErrorKind::Internal,
        }
    }
}

impl From<&RedeemError> for CallableError {
    fn from(err: &RedeemError) -> Self {
        match err.kind() {
            // Collaborator details stay in the logs
            ErrorKind::Internal => CallableError::new(ErrorKind::Internal, "Internal error"),
            kind => CallableError::new(kind, err.to_string()),
        }
    }
}

impl From<RedeemError> for CallableError {
    fn from(err: RedeemError) -> Self {
        CallableError::from(&err)
    }
}

/// Validates and consumes pairing codes, then notifies the waiting party
pub struct PairingRedeemer {
    store: Arc<dyn PairingStore>,
    publisher: Arc<dyn MessagePublisher>,
}

impl PairingRedeemer {
    /// Create a redeemer over a store and a publisher
    pub fn new(store: Arc<dyn PairingStore>, publisher: Arc<dyn MessagePublisher>) -> Self {
        Self { store, publisher }
    }

    /// Redeem the code named in `request` against the current time
    pub async fn redeem(&self, request: RedeemRequest) -> RedeemResult<RedeemResponse> {
        self.redeem_at(request, Utc::now()).await
    }

    /// Redeem the code named in `request`, judging expiry against `now`
    pub async fn redeem_at(
        &self,
        request: RedeemRequest,
        now: DateTime<Utc>,
    ) -> RedeemResult<RedeemResponse> {
        let pair_id = request.into_pair_id().ok_or_else(|| {
            warn!("Redemption rejected: no pairId in request");
            RedeemError::MissingPairId
        })?;

        let record = self
            .store
            .get(&pair_id)
            .await
            .inspect_err(|e| error!("Lookup of pairing code {} failed: {}", pair_id, e))?
            .ok_or_else(|| {
                warn!("Pairing code {} not found", pair_id);
                RedeemError::NotFound(pair_id.clone())
            })?;

        if record.used {
            warn!("Pairing code {} already used", pair_id);
            return Err(RedeemError::AlreadyUsed);
        }

        if record.is_expired_at(now) {
            warn!(
                "Pairing code {} expired at {}",
                pair_id,
                record.expires_at.to_rfc3339()
            );
            return Err(RedeemError::Expired);
        }

        let message = PairingMessage::paired(&pair_id);
        if !is_valid_topic(&message.topic) {
            error!("Pairing code {} maps to undeliverable topic", pair_id);
            return Err(RedeemError::Publish(PublishError::Rejected {
                topic: message.topic,
                reason: "invalid topic name".to_string(),
            }));
        }

        let outcome = self
            .store
            .mark_used(&pair_id)
            .await
            .inspect_err(|e| error!("Marking pairing code {} used failed: {}", pair_id, e))?;

        match outcome {
            MarkUsed::Marked => debug!("Pairing code {} marked used", pair_id),
            MarkUsed::AlreadyUsed => {
                warn!("Pairing code {} redeemed concurrently", pair_id);
                return Err(RedeemError::AlreadyUsed);
            }
            MarkUsed::Missing => {
                warn!("Pairing code {} removed during redemption", pair_id);
                return Err(RedeemError::NotFound(pair_id));
            }
        }

        self.publisher
            .publish(&message)
            .await
            .inspect_err(|e| error!("Notifying {} failed: {}", message.topic, e))?;

        info!("Pairing code {} redeemed, notified {}", pair_id, message.topic);
        Ok(RedeemResponse::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PairingRecord;
    use crate::storage::{MemoryStore, StorageResult};
    use async_trait::async_trait;
    use chrono::Duration;
    use pairlink_core::PairingEvent;
    use pairlink_messaging::{PublishResult, TopicHub};
    use std::sync::Mutex;

    /// Publisher that remembers every message it accepted
    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<PairingMessage>>,
    }

    impl RecordingPublisher {
        fn sent(&self) -> Vec<PairingMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessagePublisher for RecordingPublisher {
        async fn publish(&self, message: &PairingMessage) -> PublishResult<()> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    /// Store whose record vanishes or gets redeemed between read and update
    struct RacingStore {
        record: PairingRecord,
        outcome: MarkUsed,
    }

    #[async_trait]
    impl PairingStore for RacingStore {
        async fn get(&self, _pair_id: &str) -> StorageResult<Option<PairingRecord>> {
            Ok(Some(self.record.clone()))
        }

        async fn mark_used(&self, _pair_id: &str) -> StorageResult<MarkUsed> {
            Ok(self.outcome)
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl PairingStore for BrokenStore {
        async fn get(&self, _pair_id: &str) -> StorageResult<Option<PairingRecord>> {
            Err(StorageError::Io(std::io::Error::other("disk gone")))
        }

        async fn mark_used(&self, _pair_id: &str) -> StorageResult<MarkUsed> {
            Err(StorageError::Io(std::io::Error::other("disk gone")))
        }
    }

    fn setup() -> (PairingRedeemer, MemoryStore, Arc<RecordingPublisher>) {
        let store = MemoryStore::new();
        let publisher = Arc::new(RecordingPublisher::default());
        let redeemer = PairingRedeemer::new(Arc::new(store.clone()), publisher.clone());
        (redeemer, store, publisher)
    }

    #[tokio::test]
    async fn test_redeem_valid_code() {
        let (redeemer, store, publisher) = setup();
        store
            .insert("abc123", PairingRecord::expiring_in(Duration::hours(1)))
            .await;

        let response = redeemer
            .redeem(RedeemRequest::flat("abc123"))
            .await
            .unwrap();
        assert_eq!(response, RedeemResponse { success: true });

        assert!(store.get("abc123").await.unwrap().unwrap().used);
        assert_eq!(
            publisher.sent(),
            vec![PairingMessage {
                topic: "pair_abc123".to_string(),
                data: PairingEvent::Paired,
            }]
        );
    }

    #[tokio::test]
    async fn test_second_redemption_fails() {
        let (redeemer, store, publisher) = setup();
        store
            .insert("abc123", PairingRecord::expiring_in(Duration::hours(1)))
            .await;

        redeemer
            .redeem(RedeemRequest::flat("abc123"))
            .await
            .unwrap();
        let err = redeemer
            .redeem(RedeemRequest::flat("abc123"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
        assert!(err.to_string().contains("already used"));
        assert_eq!(publisher.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_pair_id() {
        let (redeemer, _store, publisher) = setup();

        for request in [
            RedeemRequest::missing(),
            RedeemRequest::flat(""),
            RedeemRequest::wrapped(""),
        ] {
            let err = redeemer.redeem(request).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
            assert_eq!(err.to_string(), "Missing pairId");
        }
        assert!(publisher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_code_names_identifier() {
        let (redeemer, _store, publisher) = setup();

        let err = redeemer
            .redeem(RedeemRequest::wrapped("xyz"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("xyz"));
        assert!(publisher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_used_checked_before_expiry() {
        let (redeemer, store, publisher) = setup();
        let mut record = PairingRecord::expiring_in(Duration::hours(-1));
        record.used = true;
        store.insert("old", record).await;

        let err = redeemer
            .redeem(RedeemRequest::flat("old"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
        assert!(publisher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_expired_code() {
        let (redeemer, store, publisher) = setup();
        store
            .insert("stale", PairingRecord::expiring_in(Duration::minutes(-5)))
            .await;

        let err = redeemer
            .redeem(RedeemRequest::flat("stale"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
        assert_eq!(err.to_string(), "Pairing code expired");
        assert!(!store.get("stale").await.unwrap().unwrap().used);
        assert!(publisher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_expiry_boundary_is_expired() {
        let (redeemer, store, _publisher) = setup();
        let now = Utc::now();
        store.insert("edge", PairingRecord::new(now)).await;

        let err = redeemer
            .redeem_at(RedeemRequest::flat("edge"), now)
            .await
            .unwrap_err();
        assert!(matches!(err, RedeemError::Expired));
    }

    #[tokio::test]
    async fn test_lost_race_publishes_nothing() {
        let publisher = Arc::new(RecordingPublisher::default());
        let store = RacingStore {
            record: PairingRecord::expiring_in(Duration::hours(1)),
            outcome: MarkUsed::AlreadyUsed,
        };
        let redeemer = PairingRedeemer::new(Arc::new(store), publisher.clone());

        let err = redeemer
            .redeem(RedeemRequest::flat("abc"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
        assert!(publisher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_during_redemption() {
        let publisher = Arc::new(RecordingPublisher::default());
        let store = RacingStore {
            record: PairingRecord::expiring_in(Duration::hours(1)),
            outcome: MarkUsed::Missing,
        };
        let redeemer = PairingRedeemer::new(Arc::new(store), publisher.clone());

        let err = redeemer
            .redeem(RedeemRequest::flat("abc"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("abc"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redemptions_single_winner() {
        let (redeemer, store, publisher) = setup();
        store
            .insert("shared", PairingRecord::expiring_in(Duration::hours(1)))
            .await;
        let redeemer = Arc::new(redeemer);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let redeemer = redeemer.clone();
                tokio::spawn(async move { redeemer.redeem(RedeemRequest::flat("shared")).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::FailedPrecondition),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(publisher.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_is_internal() {
        let publisher = Arc::new(RecordingPublisher::default());
        let redeemer = PairingRedeemer::new(Arc::new(BrokenStore), publisher);

        let err = redeemer
            .redeem(RedeemRequest::flat("abc"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);

        let callable = CallableError::from(err);
        assert_eq!(callable.status, ErrorKind::Internal);
        assert_eq!(callable.message, "Internal error");
    }

    #[tokio::test]
    async fn test_publish_failure_is_internal() {
        let store = MemoryStore::new();
        store
            .insert("abc", PairingRecord::expiring_in(Duration::hours(1)))
            .await;
        let hub = Arc::new(TopicHub::new());
        hub.close().await;
        let redeemer = PairingRedeemer::new(Arc::new(store.clone()), hub);

        let err = redeemer
            .redeem(RedeemRequest::flat("abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, RedeemError::Publish(PublishError::Closed)));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_undeliverable_topic_leaves_code_unused() {
        let store = MemoryStore::new();
        store
            .insert("bad id", PairingRecord::expiring_in(Duration::hours(1)))
            .await;
        let publisher = Arc::new(RecordingPublisher::default());
        let redeemer = PairingRedeemer::new(Arc::new(store.clone()), publisher.clone());

        let err = redeemer
            .redeem(RedeemRequest::flat("bad id"))
            .await
            .unwrap_err();
        assert!(matches!(err, RedeemError::Publish(PublishError::Rejected { .. })));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!store.get("bad id").await.unwrap().unwrap().used);
        assert!(publisher.sent().is_empty());
    }

    #[tokio::test]
    async fn test_subscriber_notified_through_hub() {
        let store = MemoryStore::new();
        store
            .insert("abc123", PairingRecord::expiring_in(Duration::hours(1)))
            .await;
        let hub = Arc::new(TopicHub::new());
        let mut rx = hub.subscribe("pair_abc123").await;
        let redeemer = PairingRedeemer::new(Arc::new(store), hub.clone());

        redeemer
            .redeem(RedeemRequest::flat("abc123"))
            .await
            .unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg, PairingMessage::paired("abc123"));
    }

    #[test]
    fn test_callable_error_messages() {
        let callable = CallableError::from(RedeemError::NotFound("xyz".to_string()));
        assert_eq!(callable.status, ErrorKind::NotFound);
        assert!(callable.message.contains("xyz"));

        let callable = CallableError::from(RedeemError::Expired);
        assert_eq!(callable.status, ErrorKind::DeadlineExceeded);
    }
}
