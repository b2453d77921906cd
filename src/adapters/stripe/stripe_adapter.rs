//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port over Stripe's form-encoded REST API.
//! Responses are decoded into the provider object shapes of the billing
//! domain and converted to provider-neutral snapshots before they leave
//! this module.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key).with_timeout(Duration::from_secs(10));
//! let adapter = StripePaymentAdapter::new(config)?;
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::domain::billing::{
    CheckoutMode, CheckoutSessionObject, CheckoutSessionSnapshot, CustomerObject, InvoiceObject,
    ListObject, ProviderInvoice, ProviderSubscription, SubscriptionObject,
};
use crate::domain::foundation::SubscriberId;
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, PaymentError, PaymentErrorCode, PaymentProvider,
    PortalSession,
};

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Per-request timeout.
    timeout: Duration,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

/// Error envelope Stripe returns on non-2xx responses.
#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    code: Option<String>,
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

impl StripePaymentAdapter {
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http_client
            .get(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http_client
            .post(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
    }

    /// Sends a request and decodes a 2xx body, mapping failures by status.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        operation: &str,
    ) -> Result<T, PaymentError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PaymentError::timeout(operation)
            } else {
                PaymentError::network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = error_from_response(status, &body);
            tracing::error!(
                operation,
                status = status.as_u16(),
                code = err.provider_code.as_deref().unwrap_or(""),
                "Stripe request failed"
            );
            return Err(err);
        }

        response.json::<T>().await.map_err(|e| {
            PaymentError::new(
                PaymentErrorCode::InvalidResponse,
                format!("Failed to parse Stripe response for {}: {}", operation, e),
            )
        })
    }
}

fn error_from_response(status: reqwest::StatusCode, body: &str) -> PaymentError {
    let detail = serde_json::from_str::<StripeErrorBody>(body).ok().map(|b| b.error);

    let code = match status.as_u16() {
        401 | 403 => PaymentErrorCode::AuthenticationError,
        404 => PaymentErrorCode::NotFound,
        429 => PaymentErrorCode::RateLimitExceeded,
        _ => PaymentErrorCode::ProviderError,
    };
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| format!("Stripe API error (HTTP {})", status.as_u16()));

    let err = PaymentError::new(code, message);
    match detail.and_then(|d| d.code.or(d.kind)) {
        Some(provider_code) => err.with_provider_code(provider_code),
        None => err,
    }
}

/// Form parameters for a hosted checkout session.
fn checkout_params(request: &CreateCheckoutRequest) -> Vec<(&'static str, String)> {
    let subscriber = request.subscriber_id.as_str().to_string();
    let mut params = vec![
        ("mode", request.mode.as_str().to_string()),
        ("customer", request.customer_ref.clone()),
        ("client_reference_id", subscriber.clone()),
        ("metadata[userId]", subscriber.clone()),
        ("metadata[plan]", "pro".to_string()),
        ("metadata[mode]", request.mode.as_str().to_string()),
        ("line_items[0][price]", request.price_ref.clone()),
        ("line_items[0][quantity]", "1".to_string()),
        ("allow_promotion_codes", "true".to_string()),
        ("success_url", request.success_url.clone()),
        ("cancel_url", request.cancel_url.clone()),
    ];
    if request.mode == CheckoutMode::Subscription {
        // Stamps the subscriber onto the subscription so later
        // subscription events can be matched without a session.
        params.push(("subscription_data[metadata][userId]", subscriber));
        params.push(("subscription_data[metadata][plan]", "pro".to_string()));
    }
    params
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn create_customer(&self, subscriber_id: &SubscriberId) -> Result<String, PaymentError> {
        let customer: CustomerObject = self
            .send(
                self.post("/v1/customers")
                    .form(&[("metadata[userId]", subscriber_id.as_str())]),
                "create customer",
            )
            .await?;
        tracing::info!(subscriber_id = %subscriber_id, customer = %customer.id, "Stripe customer created");
        Ok(customer.id)
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let session: SessionResponse = self
            .send(
                self.post("/v1/checkout/sessions")
                    .form(&checkout_params(&request)),
                "create checkout session",
            )
            .await?;
        let url = session.url.ok_or_else(|| {
            PaymentError::new(
                PaymentErrorCode::InvalidResponse,
                "Checkout session has no url",
            )
        })?;
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    async fn create_portal_session(
        &self,
        customer_ref: &str,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        let session: SessionResponse = self
            .send(
                self.post("/v1/billing_portal/sessions")
                    .form(&[("customer", customer_ref), ("return_url", return_url)]),
                "create portal session",
            )
            .await?;
        let url = session.url.ok_or_else(|| {
            PaymentError::new(PaymentErrorCode::InvalidResponse, "Portal session has no url")
        })?;
        Ok(PortalSession {
            id: session.id,
            url,
        })
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionSnapshot, PaymentError> {
        let session: CheckoutSessionObject = self
            .send(
                self.get(&format!("/v1/checkout/sessions/{}", session_id))
                    .query(&[("expand[]", "subscription")]),
                "retrieve checkout session",
            )
            .await?;
        Ok(session.to_snapshot())
    }

    async fn retrieve_subscription(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<ProviderSubscription>, PaymentError> {
        let result: Result<SubscriptionObject, PaymentError> = self
            .send(
                self.get(&format!("/v1/subscriptions/{}", subscription_ref)),
                "retrieve subscription",
            )
            .await;
        match result {
            Ok(sub) => Ok(Some(sub.to_provider_subscription())),
            Err(e) if e.code == PaymentErrorCode::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn retrieve_invoice(
        &self,
        invoice_id: &str,
    ) -> Result<Option<ProviderInvoice>, PaymentError> {
        let result: Result<InvoiceObject, PaymentError> = self
            .send(
                self.get(&format!("/v1/invoices/{}", invoice_id))
                    .query(&[("expand[]", "lines.data.price")]),
                "retrieve invoice",
            )
            .await;
        match result {
            Ok(invoice) => Ok(Some(invoice.to_provider_invoice())),
            Err(e) if e.code == PaymentErrorCode::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn latest_subscription(
        &self,
        customer_ref: &str,
    ) -> Result<Option<ProviderSubscription>, PaymentError> {
        let list: ListObject<SubscriptionObject> = self
            .send(
                self.get("/v1/subscriptions").query(&[
                    ("customer", customer_ref),
                    ("status", "all"),
                    ("limit", "1"),
                ]),
                "list subscriptions",
            )
            .await?;
        Ok(list
            .data
            .first()
            .map(SubscriptionObject::to_provider_subscription))
    }
}
