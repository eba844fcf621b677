use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Rejected => "rejected",
        }
    }
}

/// A tenant's request to rent a house.
///
/// `status` belongs to the landlord; `deposit_paid` belongs to the payment
/// flow and may only become true once the booking is approved.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Booking {
    pub booking_id: String,
    pub tenant_id: String,
    pub house_id: String,
    pub landlord_id: String,
    pub status: BookingStatus,
    #[serde(default)]
    pub deposit_paid: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub requested_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        booking_id: impl Into<String>,
        tenant_id: impl Into<String>,
        house_id: impl Into<String>,
        landlord_id: impl Into<String>,
    ) -> Self {
        Self {
            booking_id: booking_id.into(),
            tenant_id: tenant_id.into(),
            house_id: house_id.into(),
            landlord_id: landlord_id.into(),
            status: BookingStatus::Pending,
            deposit_paid: false,
            message: None,
            requested_at: Utc::now(),
        }
    }

    /// Records the landlord's decision.
    pub fn decide(&mut self, decision: BookingStatus) -> Result<(), PaymentError> {
        if decision == BookingStatus::Pending {
            return Err(PaymentError::ValidationError(
                "Booking decision must be approved or rejected".to_string(),
            ));
        }
        if self.deposit_paid {
            return Err(PaymentError::ConflictError(format!(
                "Booking {} already has a paid deposit",
                self.booking_id
            )));
        }
        self.status = decision;
        Ok(())
    }

    /// Checks that a deposit may be collected for this booking.
    pub fn ensure_payable(&self) -> Result<(), PaymentError> {
        if self.status != BookingStatus::Approved {
            return Err(PaymentError::ConflictError(format!(
                "Booking {} is {}, only approved bookings accept a deposit",
                self.booking_id,
                self.status.as_str()
            )));
        }
        if self.deposit_paid {
            return Err(PaymentError::ConflictError(format!(
                "Booking {} is already paid",
                self.booking_id
            )));
        }
        Ok(())
    }

    /// Checks a record coming from outside the booking flow, such as seed data.
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.deposit_paid && self.status != BookingStatus::Approved {
            return Err(PaymentError::ValidationError(format!(
                "Booking {} is {} but has a paid deposit",
                self.booking_id,
                self.status.as_str()
            )));
        }
        Ok(())
    }

    /// Marks the deposit as paid. Returns whether the flag changed.
    pub fn mark_deposit_paid(&mut self) -> Result<bool, PaymentError> {
        if self.status != BookingStatus::Approved {
            return Err(PaymentError::ConflictError(format!(
                "Booking {} is {}, deposit cannot be marked paid",
                self.booking_id,
                self.status.as_str()
            )));
        }
        let changed = !self.deposit_paid;
        self.deposit_paid = true;
        Ok(changed)
    }
}
