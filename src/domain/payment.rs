use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a positive monetary amount for a deposit.
///
/// This is a wrapper around `rust_decimal::Decimal` so that a zero or negative
/// deposit can never reach the gateway.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// ISO 4217 style currency code, e.g. `ETB`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn parse(code: &str) -> Result<Self, PaymentError> {
        let code = code.trim().to_ascii_uppercase();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
            Ok(Self(code))
        } else {
            Err(PaymentError::ValidationError(format!(
                "Invalid currency code '{code}'"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transaction reference shared with the gateway.
///
/// Generated references look like `WRS-<booking_id>-<8 hex chars>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxRef(String);

impl TxRef {
    pub const PREFIX: &'static str = "WRS";

    pub fn generate(booking_id: &str) -> Self {
        let suffix: u32 = rand::thread_rng().r#gen();
        Self(format!("{}-{}-{:08x}", Self::PREFIX, booking_id, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TxRef {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TxRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

/// The verified outcome of a payment as reported by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub status: PaymentStatus,
    pub payload: serde_json::Value,
    pub verified_at: DateTime<Utc>,
}

/// One deposit attempt for a booking.
///
/// A booking may accumulate several payments (one per retry) but at most one
/// of them ever reaches `Success`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub payment_id: String,
    pub booking_id: String,
    pub tenant_id: String,
    pub house_id: String,
    pub tx_ref: TxRef,
    pub amount: Amount,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub checkout_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub gateway_payload: Option<serde_json::Value>,
}

impl Payment {
    /// Applies a settlement.
    ///
    /// A pending payment may settle either way. A successful payment only
    /// accepts another success (re-timestamped); failed payments are final.
    pub fn settle(&mut self, settlement: Settlement) -> Result<(), PaymentError> {
        match (self.status, settlement.status) {
            (_, PaymentStatus::Pending) => {
                return Err(PaymentError::ValidationError(
                    "A payment cannot be settled as pending".to_string(),
                ));
            }
            (PaymentStatus::Pending, _) | (PaymentStatus::Success, PaymentStatus::Success) => {}
            (from, to) => {
                return Err(PaymentError::ConflictError(format!(
                    "Payment {} cannot move from {} to {}",
                    self.tx_ref,
                    from.as_str(),
                    to.as_str()
                )));
            }
        }

        self.status = settlement.status;
        self.verified_at = Some(settlement.verified_at);
        self.gateway_payload = Some(settlement.payload);
        Ok(())
    }
}
