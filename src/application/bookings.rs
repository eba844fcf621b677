use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::house::HouseStatus;
use crate::domain::payment::PaymentStatus;
use crate::domain::ports::{BookingStoreBox, HouseStoreBox, PaymentStoreBox};
use crate::domain::user::{Role, User};
use crate::error::{PaymentError, Result};
use tracing::info;

/// Tenant booking requests and landlord decisions.
///
/// This is the only writer of `Booking::status`.
pub struct BookingService {
    bookings: BookingStoreBox,
    houses: HouseStoreBox,
    payments: PaymentStoreBox,
}

impl BookingService {
    pub fn new(bookings: BookingStoreBox, houses: HouseStoreBox, payments: PaymentStoreBox) -> Self {
        Self {
            bookings,
            houses,
            payments,
        }
    }

    /// Files a tenant's request for an available house.
    pub async fn request(
        &self,
        user: &User,
        house_id: &str,
        message: Option<String>,
    ) -> Result<Booking> {
        if user.role != Role::Tenant {
            return Err(PaymentError::ForbiddenError(
                "Only tenants can request bookings".to_string(),
            ));
        }

        let house = self
            .houses
            .get(house_id)
            .await?
            .ok_or_else(|| PaymentError::NotFoundError(format!("House {house_id}")))?;
        if !house.is_available() {
            return Err(PaymentError::ConflictError(format!(
                "House {house_id} is not available"
            )));
        }

        if self
            .bookings
            .find_pending(&user.user_id, house_id)
            .await?
            .is_some()
        {
            return Err(PaymentError::ConflictError(format!(
                "A pending request for house {house_id} already exists"
            )));
        }

        let mut booking = Booking::new(
            uuid::Uuid::new_v4().to_string(),
            user.user_id.clone(),
            house.house_id,
            house.landlord_id,
        );
        booking.message = message;
        self.bookings.store(booking.clone()).await?;

        info!(booking_id = %booking.booking_id, house_id, "Booking requested");
        Ok(booking)
    }

    /// Approves or rejects a booking. Approval marks the house as rented.
    pub async fn decide(
        &self,
        user: &User,
        booking_id: &str,
        decision: BookingStatus,
    ) -> Result<Booking> {
        if user.role != Role::Landlord {
            return Err(PaymentError::ForbiddenError(
                "Only landlords can decide bookings".to_string(),
            ));
        }

        let current = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| PaymentError::NotFoundError(format!("Booking {booking_id}")))?;
        if current.landlord_id != user.user_id {
            return Err(PaymentError::ForbiddenError(format!(
                "Booking {booking_id} belongs to another landlord"
            )));
        }

        if decision != current.status {
            let open = self
                .payments
                .for_booking(booking_id)
                .await?
                .into_iter()
                .find(|p| p.status != PaymentStatus::Failed);
            if let Some(payment) = open {
                return Err(PaymentError::ConflictError(format!(
                    "Booking {booking_id} has a {} payment {}",
                    payment.status.as_str(),
                    payment.tx_ref
                )));
            }
        }

        // Re-checked under the store's write guard
        let booking = self
            .bookings
            .decide(booking_id, &user.user_id, decision)
            .await?;

        if decision == BookingStatus::Approved
            && let Some(mut house) = self.houses.get(&booking.house_id).await?
        {
            house.status = HouseStatus::Rented;
            self.houses.store(house).await?;
        }

        info!(booking_id, status = decision.as_str(), "Booking decided");
        Ok(booking)
    }
}
