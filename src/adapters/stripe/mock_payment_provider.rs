//! Mock payment provider for testing.
//!
//! Provides a configurable mock implementation of `PaymentProvider` for unit
//! and integration tests. Supports:
//! - Pre-configured sessions, subscriptions and invoices
//! - Per-method error injection
//! - Artificial latency for timeout paths
//! - Call tracking

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::billing::{CheckoutSessionSnapshot, ProviderInvoice, ProviderSubscription};
use crate::domain::foundation::SubscriberId;
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, PaymentError, PaymentProvider, PortalSession,
};

/// Mock payment provider for testing.
///
/// # Example
///
/// ```ignore
/// let mock = MockPaymentProvider::new();
/// mock.add_subscription(subscription);
/// mock.fail_method("latest_subscription", PaymentError::network("reset"));
/// ```
#[derive(Clone, Default)]
pub struct MockPaymentProvider {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    checkout_sessions: HashMap<String, CheckoutSessionSnapshot>,
    subscriptions: HashMap<String, ProviderSubscription>,
    invoices: HashMap<String, ProviderInvoice>,
    /// Newest subscription per customer.
    latest_by_customer: HashMap<String, String>,
    method_errors: HashMap<&'static str, PaymentError>,
    latency: Option<Duration>,
    customer_seq: u32,
    checkout_requests: Vec<CreateCheckoutRequest>,
    call_log: Vec<MethodCall>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: &'static str,
    pub arg: String,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    pub fn add_checkout_session(&self, session: CheckoutSessionSnapshot) {
        self.state()
            .checkout_sessions
            .insert(session.id.clone(), session);
    }

    /// Registers a subscription; it becomes its customer's latest.
    pub fn add_subscription(&self, subscription: ProviderSubscription) {
        let mut state = self.state();
        if let Some(customer) = &subscription.customer_ref {
            state
                .latest_by_customer
                .insert(customer.clone(), subscription.id.clone());
        }
        state
            .subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    pub fn add_invoice(&self, invoice: ProviderInvoice) {
        self.state().invoices.insert(invoice.id.clone(), invoice);
    }

    /// Makes every call to `method` fail with `error` until cleared.
    pub fn fail_method(&self, method: &'static str, error: PaymentError) {
        self.state().method_errors.insert(method, error);
    }

    pub fn clear_failures(&self) {
        self.state().method_errors.clear();
    }

    /// Delays every call by `latency` before answering.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = Some(latency);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Assertions
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn checkout_requests(&self) -> Vec<CreateCheckoutRequest> {
        self.state().checkout_requests.clone()
    }

    /// Records the call and returns the injected error, if any.
    async fn enter(&self, method: &'static str, arg: &str) -> Result<(), PaymentError> {
        let (latency, error) = {
            let mut state = self.state();
            state.call_log.push(MethodCall {
                method,
                arg: arg.to_string(),
            });
            (state.latency, state.method_errors.get(method).cloned())
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_customer(&self, subscriber_id: &SubscriberId) -> Result<String, PaymentError> {
        self.enter("create_customer", subscriber_id.as_str()).await?;
        let mut state = self.state();
        state.customer_seq += 1;
        Ok(format!("cus_mock_{}", state.customer_seq))
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        self.enter("create_checkout_session", request.subscriber_id.as_str())
            .await?;
        let mut state = self.state();
        let id = format!("cs_mock_{}", state.checkout_requests.len() + 1);
        state.checkout_requests.push(request);
        Ok(CheckoutSession {
            url: format!("https://checkout.mock/{}", id),
            id,
        })
    }

    async fn create_portal_session(
        &self,
        customer_ref: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        self.enter("create_portal_session", customer_ref).await?;
        Ok(PortalSession {
            id: "bps_mock".to_string(),
            url: format!("https://billing.mock/{}?return={}", customer_ref, return_url),
        })
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionSnapshot, PaymentError> {
        self.enter("retrieve_checkout_session", session_id).await?;
        self.state()
            .checkout_sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| PaymentError::not_found("Checkout session"))
    }

    async fn retrieve_subscription(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<ProviderSubscription>, PaymentError> {
        self.enter("retrieve_subscription", subscription_ref).await?;
        Ok(self.state().subscriptions.get(subscription_ref).cloned())
    }

    async fn retrieve_invoice(
        &self,
        invoice_id: &str,
    ) -> Result<Option<ProviderInvoice>, PaymentError> {
        self.enter("retrieve_invoice", invoice_id).await?;
        Ok(self.state().invoices.get(invoice_id).cloned())
    }

    async fn latest_subscription(
        &self,
        customer_ref: &str,
    ) -> Result<Option<ProviderSubscription>, PaymentError> {
        self.enter("latest_subscription", customer_ref).await?;
        let state = self.state();
        Ok(state
            .latest_by_customer
            .get(customer_ref)
            .and_then(|id| state.subscriptions.get(id))
            .cloned())
    }
}
