use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::house::House;
use crate::domain::payment::{Payment, PaymentStatus, Settlement, TxRef};
use crate::domain::ports::{BookingStore, HouseStore, PaymentStore, UserStore};
use crate::domain::user::User;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for bookings.
///
/// Uses `Arc<RwLock<HashMap<String, Booking>>>` to allow shared concurrent access.
/// Cloning the store shares the underlying map.
#[derive(Default, Clone)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<String, Booking>>>,
}

impl InMemoryBookingStore {
    /// Creates a new, empty in-memory booking store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn store(&self, booking: Booking) -> Result<()> {
        let mut bookings = self.bookings.write().await;
        bookings.insert(booking.booking_id.clone(), booking);
        Ok(())
    }

    async fn get(&self, booking_id: &str) -> Result<Option<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings.get(booking_id).cloned())
    }

    async fn find_pending(&self, tenant_id: &str, house_id: &str) -> Result<Option<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings
            .values()
            .find(|b| {
                b.tenant_id == tenant_id
                    && b.house_id == house_id
                    && b.status == BookingStatus::Pending
            })
            .cloned())
    }

    async fn mark_deposit_paid(&self, booking_id: &str) -> Result<bool> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings
            .get_mut(booking_id)
            .ok_or_else(|| PaymentError::NotFoundError(format!("Booking {booking_id}")))?;
        booking.mark_deposit_paid()
    }

    async fn decide(
        &self,
        booking_id: &str,
        landlord_id: &str,
        decision: BookingStatus,
    ) -> Result<Booking> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings
            .get_mut(booking_id)
            .ok_or_else(|| PaymentError::NotFoundError(format!("Booking {booking_id}")))?;
        if booking.landlord_id != landlord_id {
            return Err(PaymentError::ForbiddenError(format!(
                "Booking {booking_id} belongs to another landlord"
            )));
        }
        booking.decide(decision)?;
        Ok(booking.clone())
    }
}

/// A thread-safe in-memory store for payments, keyed by tx_ref.
///
/// Every check-then-write happens under a single write guard, which makes
/// `insert` and `settle` compare-and-set operations.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<TxRef, Payment>>>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn settled_elsewhere<'a>(
    payments: impl IntoIterator<Item = &'a Payment>,
    booking_id: &str,
    tx_ref: &TxRef,
) -> bool {
    payments.into_iter().any(|p| {
        p.booking_id == booking_id && p.status == PaymentStatus::Success && &p.tx_ref != tx_ref
    })
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        let mut payments = self.payments.write().await;
        if payments.contains_key(&payment.tx_ref) {
            return Err(PaymentError::ConflictError(format!(
                "Duplicate tx_ref {}",
                payment.tx_ref
            )));
        }
        if settled_elsewhere(payments.values(), &payment.booking_id, &payment.tx_ref) {
            return Err(PaymentError::ConflictError(format!(
                "Booking {} is already paid",
                payment.booking_id
            )));
        }
        payments.insert(payment.tx_ref.clone(), payment);
        Ok(())
    }

    async fn get(&self, tx_ref: &TxRef) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments.get(tx_ref).cloned())
    }

    async fn for_booking(&self, booking_id: &str) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        let mut found: Vec<Payment> = payments
            .values()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn settle(&self, tx_ref: &TxRef, settlement: Settlement) -> Result<Payment> {
        let mut payments = self.payments.write().await;
        let booking_id = payments
            .get(tx_ref)
            .map(|p| p.booking_id.clone())
            .ok_or_else(|| PaymentError::NotFoundError(format!("Payment {tx_ref}")))?;

        if settlement.status == PaymentStatus::Success
            && settled_elsewhere(payments.values(), &booking_id, tx_ref)
        {
            return Err(PaymentError::ConflictError(format!(
                "Booking {booking_id} is already paid by another transaction"
            )));
        }

        let payment = payments
            .get_mut(tx_ref)
            .ok_or_else(|| PaymentError::NotFoundError(format!("Payment {tx_ref}")))?;
        payment.settle(settlement)?;
        Ok(payment.clone())
    }

    async fn get_all(&self) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        let mut all: Vec<Payment> = payments.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(all)
    }
}

/// A thread-safe in-memory store for houses.
#[derive(Default, Clone)]
pub struct InMemoryHouseStore {
    houses: Arc<RwLock<HashMap<String, House>>>,
}

impl InMemoryHouseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HouseStore for InMemoryHouseStore {
    async fn store(&self, house: House) -> Result<()> {
        let mut houses = self.houses.write().await;
        houses.insert(house.house_id.clone(), house);
        Ok(())
    }

    async fn get(&self, house_id: &str) -> Result<Option<House>> {
        let houses = self.houses.read().await;
        Ok(houses.get(house_id).cloned())
    }
}

/// A thread-safe in-memory store for user accounts.
#[derive(Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn store(&self, user: User) -> Result<()> {
        let mut users = self.users.write().await;
        users.insert(user.user_id.clone(), user);
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(user_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}
