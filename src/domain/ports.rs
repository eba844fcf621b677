use super::booking::{Booking, BookingStatus};
use super::gateway::{Checkout, CheckoutRequest, Subaccount, SubaccountRequest, Verification};
use super::house::House;
use super::payment::{Payment, Settlement, TxRef};
use super::user::User;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn store(&self, booking: Booking) -> Result<()>;
    async fn get(&self, booking_id: &str) -> Result<Option<Booking>>;
    /// Finds the tenant's pending request for a house, if any.
    async fn find_pending(&self, tenant_id: &str, house_id: &str) -> Result<Option<Booking>>;
    /// Sets `deposit_paid` on an approved booking. Returns whether it changed.
    async fn mark_deposit_paid(&self, booking_id: &str) -> Result<bool>;
    /// Applies a landlord's decision against the stored booking.
    ///
    /// Fails with `ForbiddenError` when `landlord_id` does not own the booking
    /// and with `ConflictError` once the deposit is paid.
    async fn decide(
        &self,
        booking_id: &str,
        landlord_id: &str,
        decision: BookingStatus,
    ) -> Result<Booking>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts a new pending payment.
    ///
    /// Fails with `ConflictError` when the tx_ref is taken or the booking
    /// already has a successful payment.
    async fn insert(&self, payment: Payment) -> Result<()>;
    async fn get(&self, tx_ref: &TxRef) -> Result<Option<Payment>>;
    async fn for_booking(&self, booking_id: &str) -> Result<Vec<Payment>>;
    /// Records a verified outcome.
    ///
    /// Fails with `ConflictError` when another payment of the same booking
    /// already succeeded.
    async fn settle(&self, tx_ref: &TxRef, settlement: Settlement) -> Result<Payment>;
    async fn get_all(&self) -> Result<Vec<Payment>>;
}

#[async_trait]
pub trait HouseStore: Send + Sync {
    async fn store(&self, house: House) -> Result<()>;
    async fn get(&self, house_id: &str) -> Result<Option<House>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn store(&self, user: User) -> Result<()>;
    async fn get(&self, user_id: &str) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize_payment(&self, request: &CheckoutRequest) -> Result<Checkout>;
    async fn verify_payment(&self, tx_ref: &TxRef) -> Result<Verification>;
    async fn cancel_payment(&self, tx_ref: &TxRef) -> Result<()>;
    async fn create_subaccount(&self, request: &SubaccountRequest) -> Result<Subaccount>;
    async fn supported_currencies(&self) -> Result<Vec<serde_json::Value>>;
    /// Public receipt page for the gateway's own transaction reference.
    fn receipt_url(&self, reference: &str) -> String;
}

pub type BookingStoreBox = Box<dyn BookingStore>;
pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type HouseStoreBox = Box<dyn HouseStore>;
pub type UserStoreBox = Box<dyn UserStore>;
pub type PaymentGatewayBox = Box<dyn PaymentGateway>;
