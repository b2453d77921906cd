//! CreateAttemptHandler - Command handler for recording a practice attempt.
//!
//! Order matters: rate limit, then payload validation, then the ledger. The
//! limiter is consulted before any transaction so its store latency never
//! extends the row lock. Both the subscriber window and the caller's origin
//! window are counted; either one closing rejects the request.

use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::adapters::rate_limiter::{check_user_and_ip, RateLimitPolicies, ATTEMPT_CREATE};
use crate::application::{AttemptLedger, AuditTrail, LedgerOutcome};
use crate::domain::audit::{AuditAction, ClientContext};
use crate::domain::entitlement::{AttemptPayload, Entitlement};
use crate::domain::foundation::{AttemptId, SubscriberId};
use crate::ports::{RateLimitKey, RateLimiter, SubscriberRepository};

use super::AttemptError;

/// Command to create an attempt for an authenticated subscriber.
///
/// The body stays raw until the rate limit has been counted, so a malformed
/// request still spends from both windows.
#[derive(Debug, Clone)]
pub struct CreateAttemptCommand {
    pub subscriber_id: SubscriberId,
    pub body: Vec<u8>,
    pub client: ClientContext,
}

/// A stored attempt and the entitlement as of its insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateAttemptResult {
    pub id: AttemptId,
    pub entitlement: Entitlement,
}

/// Handler for attempt creation.
pub struct CreateAttemptHandler {
    subscribers: Arc<dyn SubscriberRepository>,
    ledger: AttemptLedger,
    limiter: Arc<dyn RateLimiter>,
    limits: RateLimitPolicies,
    audit: AuditTrail,
    default_cap: u32,
}

impl CreateAttemptHandler {
    pub fn new(
        subscribers: Arc<dyn SubscriberRepository>,
        ledger: AttemptLedger,
        limiter: Arc<dyn RateLimiter>,
        limits: RateLimitPolicies,
        audit: AuditTrail,
        default_cap: u32,
    ) -> Self {
        Self {
            subscribers,
            ledger,
            limiter,
            limits,
            audit,
            default_cap,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateAttemptCommand,
    ) -> Result<CreateAttemptResult, AttemptError> {
        let id = &cmd.subscriber_id;

        // 1. Rate limit, outside any transaction
        let user_key = RateLimitKey::user(ATTEMPT_CREATE, id.as_str());
        let ip_key = cmd
            .client
            .ip
            .as_deref()
            .map(|ip| RateLimitKey::ip(ATTEMPT_CREATE, ip));
        let decision = check_user_and_ip(
            self.limiter.as_ref(),
            (&user_key, self.limits.attempt_create.window()),
            ip_key
                .as_ref()
                .map(|key| (key, self.limits.attempt_create_ip.window())),
        )
        .await?;
        if !decision.allowed {
            info!(
                subscriber_id = %id,
                ip = ?cmd.client.ip,
                reset_ms = decision.reset_ms,
                "Attempt creation rate limited"
            );
            self.audit
                .record(
                    AuditAction::AttemptRateLimited,
                    Some(id),
                    &cmd.client,
                    json!({ "resetMs": decision.reset_ms }),
                )
                .await;
            return Err(AttemptError::RateLimited {
                retry_after_secs: decision.retry_after_secs(),
                reset_ms: decision.reset_ms,
            });
        }

        // 2. Decode and validate payload
        let attempt = AttemptPayload::from_json(&cmd.body)?.validate()?;

        // 3. Subscriber rows are created on first contact
        self.subscribers.ensure(id, self.default_cap).await?;

        // 4. Locked decide-and-write
        match self.ledger.create(id, &attempt).await? {
            LedgerOutcome::Created {
                id: attempt_id,
                entitlement,
            } => {
                self.audit
                    .record(
                        AuditAction::AttemptCreated,
                        Some(id),
                        &cmd.client,
                        json!({
                            "attemptId": attempt_id.to_string(),
                            "inputMethod": attempt.body.get("inputMethod"),
                            "score": attempt.body.get("score"),
                            "ts": attempt.occurred_at.as_unix_millis(),
                        }),
                    )
                    .await;
                Ok(CreateAttemptResult {
                    id: attempt_id,
                    entitlement,
                })
            }
            LedgerOutcome::Rejected { entitlement } => {
                info!(subscriber_id = %id, used = entitlement.used, "Free attempt cap reached");
                self.audit
                    .record(
                        AuditAction::AttemptBlockedFreeCap,
                        Some(id),
                        &cmd.client,
                        json!({ "used": entitlement.used, "cap": entitlement.cap }),
                    )
                    .await;
                Err(AttemptError::FreeLimitReached { entitlement })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryAuditLog, InMemoryEntitlementStore};
    use crate::adapters::rate_limiter::{InMemoryRateLimiter, PolicyLimits};
    use crate::domain::entitlement::{GracePolicy, InputMethod, PayloadError};
    use crate::domain::foundation::{DomainError, ErrorCode};
    use crate::ports::{RateLimitDecision, RateLimitError, WindowLimit};
    use async_trait::async_trait;

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    struct Fixture {
        store: InMemoryEntitlementStore,
        audit: InMemoryAuditLog,
        handler: CreateAttemptHandler,
    }

    fn policies(user: PolicyLimits, ip: PolicyLimits) -> RateLimitPolicies {
        RateLimitPolicies {
            attempt_create: user,
            attempt_create_ip: ip,
        }
    }

    fn fixture_with(limiter: Arc<dyn RateLimiter>, limits: RateLimitPolicies) -> Fixture {
        let store = InMemoryEntitlementStore::new();
        let audit = InMemoryAuditLog::new();
        let ledger = AttemptLedger::new(Arc::new(store.clone()), GracePolicy::default());
        let handler = CreateAttemptHandler::new(
            Arc::new(store.clone()),
            ledger,
            limiter,
            limits,
            AuditTrail::new(Arc::new(audit.clone())),
            3,
        );
        Fixture {
            store,
            audit,
            handler,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            Arc::new(InMemoryRateLimiter::new()),
            RateLimitPolicies::default(),
        )
    }

    fn user() -> SubscriberId {
        SubscriberId::new("user-42").unwrap()
    }

    fn payload() -> AttemptPayload {
        AttemptPayload {
            ts: Some(1_705_276_800_000.0),
            question: Some("Describe a failure.".to_string()),
            transcript: Some("Once, I shipped a bug...".to_string()),
            input_method: Some(InputMethod::Spoken),
            score: Some(71.6),
            ..Default::default()
        }
    }

    fn command_with(payload: AttemptPayload) -> CreateAttemptCommand {
        CreateAttemptCommand {
            subscriber_id: user(),
            body: serde_json::to_vec(&payload).unwrap(),
            client: ClientContext {
                ip: Some("198.51.100.4".to_string()),
                user_agent: None,
            },
        }
    }

    fn command() -> CreateAttemptCommand {
        command_with(payload())
    }

    struct BrokenLimiter;

    #[async_trait]
    impl RateLimiter for BrokenLimiter {
        async fn check(
            &self,
            _key: &RateLimitKey,
            _limit: WindowLimit,
        ) -> Result<RateLimitDecision, RateLimitError> {
            Err(RateLimitError::InvalidKey("empty".to_string()))
        }

        async fn reset(&self, _key: &RateLimitKey) -> Result<(), RateLimitError> {
            Ok(())
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Success Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn creates_attempt_and_reports_entitlement() {
        let f = fixture();
        let result = f.handler.handle(command()).await.unwrap();

        assert_eq!(result.entitlement.used, 1);
        assert_eq!(result.entitlement.remaining, Some(2));
        assert_eq!(f.store.all_attempts(&user()).await.len(), 1);
    }

    #[tokio::test]
    async fn audits_created_attempt() {
        let f = fixture();
        let result = f.handler.handle(command()).await.unwrap();

        let entries = f.audit.with_action(AuditAction::AttemptCreated).await;
        assert_eq!(entries.len(), 1);
        let meta = &entries[0].metadata;
        assert_eq!(meta["attemptId"], result.id.to_string());
        assert_eq!(meta["inputMethod"], "spoken");
        assert_eq!(meta["score"], 72.0);
        assert_eq!(meta["ts"], 1_705_276_800_000_i64);
        assert_eq!(entries[0].ip.as_deref(), Some("198.51.100.4"));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Rejection Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn fourth_attempt_hits_free_cap() {
        let f = fixture();
        for _ in 0..3 {
            f.handler.handle(command()).await.unwrap();
        }

        let err = f.handler.handle(command()).await.unwrap_err();
        match err {
            AttemptError::FreeLimitReached { entitlement } => {
                assert_eq!(entitlement.remaining, Some(0));
                assert_eq!(entitlement.used, 3);
            }
            other => panic!("expected FreeLimitReached, got {:?}", other),
        }
        assert_eq!(
            f.audit.with_action(AuditAction::AttemptBlockedFreeCap).await.len(),
            1
        );
    }

    #[tokio::test]
    async fn rate_limit_runs_before_validation() {
        let f = fixture_with(
            Arc::new(InMemoryRateLimiter::new()),
            policies(PolicyLimits::new(1, 60), PolicyLimits::new(60, 60)),
        );
        f.handler.handle(command()).await.unwrap();

        let mut invalid = command();
        invalid.body = br#"{"ts":"x"}"#.to_vec();
        let err = f.handler.handle(invalid).await.unwrap_err();

        match err {
            AttemptError::RateLimited {
                retry_after_secs,
                reset_ms,
            } => {
                assert!(retry_after_secs >= 1 && retry_after_secs <= 60);
                assert!(reset_ms <= 60_000);
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
        let limited = f.audit.with_action(AuditAction::AttemptRateLimited).await;
        assert_eq!(limited.len(), 1);
        assert!(limited[0].metadata["resetMs"].is_u64());
    }

    #[tokio::test]
    async fn shared_origin_window_limits_other_subscribers() {
        let f = fixture_with(
            Arc::new(InMemoryRateLimiter::new()),
            policies(PolicyLimits::new(20, 60), PolicyLimits::new(2, 60)),
        );
        f.handler.handle(command()).await.unwrap();
        f.handler.handle(command()).await.unwrap();

        let mut neighbour = command();
        neighbour.subscriber_id = SubscriberId::new("user-43").unwrap();
        let err = f.handler.handle(neighbour).await.unwrap_err();

        assert!(matches!(err, AttemptError::RateLimited { .. }));
        assert!(f
            .store
            .all_attempts(&SubscriberId::new("user-43").unwrap())
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn unknown_origin_checks_subscriber_window_only() {
        let f = fixture_with(
            Arc::new(InMemoryRateLimiter::new()),
            policies(PolicyLimits::new(20, 60), PolicyLimits::new(1, 60)),
        );
        for _ in 0..2 {
            let mut cmd = command();
            cmd.client.ip = None;
            f.handler.handle(cmd).await.unwrap();
        }
    }

    #[tokio::test]
    async fn malformed_body_still_spends_the_window() {
        let f = fixture_with(
            Arc::new(InMemoryRateLimiter::new()),
            policies(PolicyLimits::new(1, 60), PolicyLimits::new(60, 60)),
        );
        let mut malformed = command();
        malformed.body = b"{ not json".to_vec();

        let err = f.handler.handle(malformed).await.unwrap_err();
        assert!(matches!(
            err,
            AttemptError::InvalidPayload(PayloadError::Malformed(_))
        ));

        let err = f.handler.handle(command()).await.unwrap_err();
        assert!(matches!(err, AttemptError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn invalid_payload_never_touches_ledger() {
        let f = fixture();
        let mut long = payload();
        long.question = Some("x".repeat(601));

        let err = f.handler.handle(command_with(long)).await.unwrap_err();
        assert!(matches!(
            err,
            AttemptError::InvalidPayload(PayloadError::QuestionTooLong)
        ));
        assert!(f.store.all_attempts(&user()).await.is_empty());
        assert!(f.audit.entries().await.is_empty());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failure Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn limiter_failure_surfaces_as_error() {
        let f = fixture_with(Arc::new(BrokenLimiter), RateLimitPolicies::default());
        let err = f.handler.handle(command()).await.unwrap_err();
        assert!(matches!(err, AttemptError::Limiter(_)));
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn persistent_conflicts_surface_as_domain_error() {
        let f = fixture();
        f.store.inject_commit_conflicts(10);

        let err = f.handler.handle(command()).await.unwrap_err();
        match err {
            AttemptError::Domain(DomainError { code, .. }) => {
                assert_eq!(code, ErrorCode::ConcurrencyConflict)
            }
            other => panic!("expected Domain error, got {:?}", other),
        }
    }
}
