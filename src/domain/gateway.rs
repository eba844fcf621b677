//! Types exchanged with the payment gateway.

use super::payment::{Amount, Currency, TxRef};
use super::user::User;
use crate::error::PaymentError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A customer phone number accepted by the gateway.
///
/// Exactly 10 digits starting with `09` or `07`. The only way to obtain one is
/// [`PhoneNumber::parse`], so an invalid number never reaches the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self, PaymentError> {
        let valid = raw.len() == 10
            && raw.chars().all(|c| c.is_ascii_digit())
            && (raw.starts_with("09") || raw.starts_with("07"));
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(PaymentError::ValidationError(
                "Phone number must be 10 digits starting with 09 or 07".to_string(),
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<PhoneNumber>,
}

impl Customer {
    /// Builds the gateway customer from a user account.
    ///
    /// `phone_override` wins over the phone stored on the account.
    pub fn from_user(user: &User, phone_override: Option<&str>) -> Result<Self, PaymentError> {
        if user.email.trim().is_empty() {
            return Err(PaymentError::ValidationError(
                "Customer email is required".to_string(),
            ));
        }

        let mut names = user.full_name.split_whitespace();
        let first_name = names.next().ok_or_else(|| {
            PaymentError::ValidationError("Customer name is required".to_string())
        })?;
        let rest = names.collect::<Vec<_>>().join(" ");
        let last_name = if rest.is_empty() {
            first_name.to_string()
        } else {
            rest
        };

        let phone_number = phone_override
            .or(user.phone_number.as_deref())
            .map(PhoneNumber::parse)
            .transpose()?;

        Ok(Self {
            email: user.email.clone(),
            first_name: first_name.to_string(),
            last_name,
            phone_number,
        })
    }
}

/// Everything the gateway needs to open a checkout session.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub amount: Amount,
    pub currency: Currency,
    pub tx_ref: TxRef,
    pub callback_url: String,
    pub return_url: Option<String>,
    pub customer: Customer,
    /// Routes part of the amount to a subaccount.
    pub split: Option<Split>,
}

/// How a subaccount's share is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitType {
    /// `split_value` is a fraction of the amount, e.g. `0.03` for 3%.
    Percentage,
    /// `split_value` is a fixed amount in the payment currency.
    Flat,
}

/// Commission taken by the platform before the rest goes to the subaccount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commission {
    pub split_type: SplitType,
    pub split_value: Decimal,
}

impl Commission {
    pub fn new(split_type: SplitType, split_value: Decimal) -> Result<Self, PaymentError> {
        let valid = match split_type {
            SplitType::Percentage => split_value > Decimal::ZERO && split_value < Decimal::ONE,
            SplitType::Flat => split_value > Decimal::ZERO,
        };
        if !valid {
            return Err(PaymentError::ValidationError(format!(
                "Invalid {} split value {split_value}",
                match split_type {
                    SplitType::Percentage => "percentage",
                    SplitType::Flat => "flat",
                }
            )));
        }
        Ok(Self {
            split_type,
            split_value,
        })
    }
}

/// A subaccount receiving part of a checkout.
///
/// Without `commission` the gateway applies the one the subaccount was
/// registered with.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub subaccount_id: String,
    pub commission: Option<Commission>,
}

/// Bank details of a landlord to be paid out through a subaccount.
#[derive(Debug, Clone, PartialEq)]
pub struct SubaccountRequest {
    pub account_name: String,
    pub bank_code: u32,
    pub account_number: String,
    pub business_name: Option<String>,
    pub commission: Commission,
}

impl SubaccountRequest {
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.account_name.trim().is_empty() {
            return Err(PaymentError::ValidationError(
                "Account name is required".to_string(),
            ));
        }
        if self.account_number.is_empty() || !self.account_number.chars().all(|c| c.is_ascii_digit())
        {
            return Err(PaymentError::ValidationError(
                "Account number must be digits only".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subaccount {
    pub subaccount_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Checkout {
    pub checkout_url: String,
}

/// Result of asking the gateway about a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub verified: bool,
    pub raw_status: String,
    pub payload: serde_json::Value,
}
