//! HTTP client for the Chapa payment gateway.
//!
//! Every call carries the bearer secret and the configured timeout. Errors are
//! logged with the tx_ref before being returned as `GatewayError`.

use crate::domain::gateway::{
    Checkout, CheckoutRequest, Commission, Split, SplitType, Subaccount, SubaccountRequest,
    Verification,
};
use crate::domain::payment::TxRef;
use crate::domain::ports::PaymentGateway;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.chapa.co/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const RECEIPT_BASE_URL: &str = "https://chapa.link/payment-receipt";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub secret_key: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            secret_key: secret_key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    amount: String,
    currency: &'a str,
    tx_ref: &'a str,
    callback_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    return_url: Option<&'a str>,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subaccounts: Option<Vec<SplitBody<'a>>>,
}

#[derive(Debug, Serialize)]
struct SplitBody<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    split_type: Option<SplitType>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    split_value: Option<Decimal>,
}

impl<'a> From<&'a Split> for SplitBody<'a> {
    fn from(split: &'a Split) -> Self {
        Self {
            id: &split.subaccount_id,
            split_type: split.commission.map(|c| c.split_type),
            split_value: split.commission.map(|c| c.split_value),
        }
    }
}

#[derive(Debug, Serialize)]
struct SubaccountBody<'a> {
    account_name: &'a str,
    bank_code: u32,
    account_number: &'a str,
    split_type: SplitType,
    #[serde(with = "rust_decimal::serde::float")]
    split_value: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    business_name: Option<&'a str>,
}

impl<'a> From<&'a SubaccountRequest> for SubaccountBody<'a> {
    fn from(request: &'a SubaccountRequest) -> Self {
        let Commission {
            split_type,
            split_value,
        } = request.commission;
        Self {
            account_name: &request.account_name,
            bank_code: request.bank_code,
            account_number: &request.account_number,
            split_type,
            split_value,
            business_name: request.business_name.as_deref(),
        }
    }
}

impl<'a> From<&'a CheckoutRequest> for InitializeBody<'a> {
    fn from(request: &'a CheckoutRequest) -> Self {
        Self {
            amount: request.amount.to_string(),
            currency: request.currency.as_str(),
            tx_ref: request.tx_ref.as_str(),
            callback_url: &request.callback_url,
            return_url: request.return_url.as_deref(),
            email: &request.customer.email,
            first_name: &request.customer.first_name,
            last_name: &request.customer.last_name,
            phone_number: request.customer.phone_number.as_ref().map(|p| p.as_str()),
            subaccounts: request.split.as_ref().map(|split| vec![SplitBody::from(split)]),
        }
    }
}

/// The `{status, data, message}` envelope wrapping every gateway response.
#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
}

impl Envelope {
    fn parse(status: StatusCode, body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| {
            PaymentError::gateway(
                format!("Unreadable gateway response: {e}"),
                Some(status.as_u16()),
            )
        })
    }

    fn is_success(&self) -> bool {
        self.status == "success"
    }

    fn message_or(&self, fallback: &str) -> String {
        match &self.message {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => fallback.to_string(),
            Some(other) => other.to_string(),
        }
    }
}

/// Reads the body and rejects non-2xx statuses, keeping the provider's message.
async fn read_envelope(response: Response) -> Result<Envelope> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| PaymentError::gateway(e.to_string(), Some(status.as_u16())))?;

    if !status.is_success() {
        let message = Envelope::parse(status, &body)
            .map(|envelope| envelope.message_or("Request rejected"))
            .unwrap_or_else(|_| format!("Request rejected with status {status}"));
        return Err(PaymentError::gateway(message, Some(status.as_u16())));
    }

    Envelope::parse(status, &body)
}

fn transport_error(err: reqwest::Error) -> PaymentError {
    let message = if err.is_timeout() {
        format!("Gateway timed out: {err}")
    } else {
        err.to_string()
    };
    PaymentError::gateway(message, err.status().map(|s| s.as_u16()))
}

/// Interprets a verification envelope.
///
/// Only `{status: "success", data: {status: "success"}}` counts as verified.
fn verification_from(envelope: Envelope) -> Verification {
    let raw_status = envelope
        .data
        .as_ref()
        .and_then(|data| data.get("status"))
        .and_then(Value::as_str)
        .unwrap_or(&envelope.status)
        .to_string();
    let verified = envelope.is_success() && raw_status == "success";

    let mut payload = serde_json::json!({ "status": envelope.status });
    if let Some(data) = envelope.data {
        payload["data"] = data;
    }
    if let Some(message) = envelope.message {
        payload["message"] = message;
    }

    Verification {
        verified,
        raw_status,
        payload,
    }
}

/// Chapa client, constructed explicitly and injected wherever a
/// [`PaymentGateway`] is needed.
#[derive(Clone)]
pub struct ChapaClient {
    http: Client,
    config: GatewayConfig,
}

impl ChapaClient {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::InternalError(Box::new(e)))?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl PaymentGateway for ChapaClient {
    async fn initialize_payment(&self, request: &CheckoutRequest) -> Result<Checkout> {
        let tx_ref = request.tx_ref.as_str();
        let body = InitializeBody::from(request);

        let result = async {
            let response = self
                .http
                .post(self.url("transaction/initialize"))
                .bearer_auth(&self.config.secret_key)
                .json(&body)
                .send()
                .await
                .map_err(transport_error)?;
            let status = response.status().as_u16();
            let envelope = read_envelope(response).await?;

            if !envelope.is_success() {
                return Err(PaymentError::gateway(
                    format!(
                        "Payment initialization failed: {}",
                        envelope.message_or("Unknown error occurred")
                    ),
                    Some(status),
                ));
            }

            envelope
                .data
                .as_ref()
                .and_then(|data| data.get("checkout_url"))
                .and_then(Value::as_str)
                .map(|url| Checkout {
                    checkout_url: url.to_string(),
                })
                .ok_or_else(|| {
                    PaymentError::gateway("Gateway response has no checkout_url", Some(status))
                })
        }
        .await;

        match &result {
            Ok(checkout) => info!(tx_ref, checkout_url = %checkout.checkout_url, "Payment initialized"),
            Err(PaymentError::GatewayError {
                message,
                http_status,
            }) => error!(tx_ref, ?http_status, %message, "Payment initialization failed"),
            Err(err) => error!(tx_ref, %err, "Payment initialization failed"),
        }
        result
    }

    async fn verify_payment(&self, tx_ref: &TxRef) -> Result<Verification> {
        let result = async {
            let response = self
                .http
                .get(self.url(&format!("transaction/verify/{tx_ref}")))
                .bearer_auth(&self.config.secret_key)
                .send()
                .await
                .map_err(transport_error)?;
            read_envelope(response).await.map(verification_from)
        }
        .await;

        match &result {
            Ok(v) if v.verified => info!(%tx_ref, "Payment verified"),
            Ok(v) => warn!(%tx_ref, raw_status = %v.raw_status, "Payment not verified"),
            Err(err) => error!(%tx_ref, %err, "Payment verification failed"),
        }
        result
    }

    async fn cancel_payment(&self, tx_ref: &TxRef) -> Result<()> {
        let result = async {
            let response = self
                .http
                .put(self.url(&format!("transaction/cancel/{tx_ref}")))
                .bearer_auth(&self.config.secret_key)
                .send()
                .await
                .map_err(transport_error)?;
            let status = response.status().as_u16();
            let envelope = read_envelope(response).await?;
            if envelope.is_success() {
                Ok(())
            } else {
                Err(PaymentError::gateway(
                    format!(
                        "Payment cancellation failed: {}",
                        envelope.message_or("Cancellation failed")
                    ),
                    Some(status),
                ))
            }
        }
        .await;

        match &result {
            Ok(()) => info!(%tx_ref, "Payment cancelled"),
            Err(err) => error!(%tx_ref, %err, "Payment cancellation failed"),
        }
        result
    }

    async fn create_subaccount(&self, request: &SubaccountRequest) -> Result<Subaccount> {
        let body = SubaccountBody::from(request);
        let result = async {
            let response = self
                .http
                .post(self.url("subaccount"))
                .bearer_auth(&self.config.secret_key)
                .json(&body)
                .send()
                .await
                .map_err(transport_error)?;
            let status = response.status().as_u16();
            let envelope = read_envelope(response).await?;
            if !envelope.is_success() {
                return Err(PaymentError::gateway(
                    format!(
                        "Subaccount creation failed: {}",
                        envelope.message_or("Unknown error occurred")
                    ),
                    Some(status),
                ));
            }

            let subaccount_id = match envelope.data.as_ref().and_then(|data| data.get("id")) {
                Some(Value::String(id)) => id.clone(),
                Some(Value::Number(id)) => id.to_string(),
                _ => {
                    return Err(PaymentError::gateway(
                        "Gateway response has no subaccount id",
                        Some(status),
                    ));
                }
            };
            Ok(Subaccount { subaccount_id })
        }
        .await;

        match &result {
            Ok(sub) => info!(subaccount_id = %sub.subaccount_id, "Subaccount created"),
            Err(err) => error!(%err, "Subaccount creation failed"),
        }
        result
    }

    async fn supported_currencies(&self) -> Result<Vec<Value>> {
        let response = self
            .http
            .get(self.url("currency_supported"))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(transport_error)
            .inspect_err(|err| error!(%err, "Failed to fetch supported currencies"))?;
        let envelope = read_envelope(response)
            .await
            .inspect_err(|err| error!(%err, "Failed to fetch supported currencies"))?;

        Ok(match envelope.data {
            Some(Value::Array(currencies)) => currencies,
            _ => Vec::new(),
        })
    }

    fn receipt_url(&self, reference: &str) -> String {
        format!("{RECEIPT_BASE_URL}/{reference}")
    }
}
