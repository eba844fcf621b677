use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::house::House;
use crate::domain::payment::{Payment, PaymentStatus, Settlement, TxRef};
use crate::domain::ports::{BookingStore, HouseStore, PaymentStore, UserStore};
use crate::domain::user::User;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for user accounts.
pub const CF_USERS: &str = "users";
/// Column Family for house listings.
pub const CF_HOUSES: &str = "houses";
/// Column Family for bookings.
pub const CF_BOOKINGS: &str = "bookings";
/// Column Family for payments, keyed by tx_ref.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family mapping a booking id to its successful tx_ref.
pub const CF_SETTLEMENTS: &str = "settlements";

const COLUMN_FAMILIES: [&str; 5] = [CF_USERS, CF_HOUSES, CF_BOOKINGS, CF_PAYMENTS, CF_SETTLEMENTS];

/// A persistent store implementation using RocksDB.
///
/// Every entity lives in its own Column Family as JSON. Compare-and-set
/// writes (`insert`, `settle`, `mark_deposit_paid`) are serialized through
/// `write_lock`; the payment row and its settlement index are written in one
/// `WriteBatch`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that all required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            PaymentError::InternalError(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn put<T: Serialize>(&self, cf_name: &str, key: &str, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(cf, key.as_bytes(), bytes)?;
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(&self, cf_name: &str, key: &str) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn settled_tx(&self, booking_id: &str) -> Result<Option<TxRef>> {
        let cf = self.cf(CF_SETTLEMENTS)?;
        Ok(self
            .db
            .get_cf(cf, booking_id.as_bytes())?
            .map(|bytes| TxRef::from(String::from_utf8_lossy(&bytes).into_owned())))
    }
}

#[async_trait]
impl BookingStore for RocksDBStore {
    async fn store(&self, booking: Booking) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.put(CF_BOOKINGS, &booking.booking_id, &booking)
    }

    async fn get(&self, booking_id: &str) -> Result<Option<Booking>> {
        self.fetch(CF_BOOKINGS, booking_id)
    }

    async fn find_pending(&self, tenant_id: &str, house_id: &str) -> Result<Option<Booking>> {
        let bookings: Vec<Booking> = self.scan(CF_BOOKINGS)?;
        Ok(bookings.into_iter().find(|b| {
            b.tenant_id == tenant_id && b.house_id == house_id && b.status == BookingStatus::Pending
        }))
    }

    async fn mark_deposit_paid(&self, booking_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut booking: Booking = self
            .fetch(CF_BOOKINGS, booking_id)?
            .ok_or_else(|| PaymentError::NotFoundError(format!("Booking {booking_id}")))?;
        let changed = booking.mark_deposit_paid()?;
        if changed {
            self.put(CF_BOOKINGS, booking_id, &booking)?;
        }
        Ok(changed)
    }

    async fn decide(
        &self,
        booking_id: &str,
        landlord_id: &str,
        decision: BookingStatus,
    ) -> Result<Booking> {
        let _guard = self.write_lock.lock().await;
        let mut booking: Booking = self
            .fetch(CF_BOOKINGS, booking_id)?
            .ok_or_else(|| PaymentError::NotFoundError(format!("Booking {booking_id}")))?;
        if booking.landlord_id != landlord_id {
            return Err(PaymentError::ForbiddenError(format!(
                "Booking {booking_id} belongs to another landlord"
            )));
        }
        booking.decide(decision)?;
        self.put(CF_BOOKINGS, booking_id, &booking)?;
        Ok(booking)
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self
            .fetch::<Payment>(CF_PAYMENTS, payment.tx_ref.as_str())?
            .is_some()
        {
            return Err(PaymentError::ConflictError(format!(
                "Duplicate tx_ref {}",
                payment.tx_ref
            )));
        }
        if self.settled_tx(&payment.booking_id)?.is_some() {
            return Err(PaymentError::ConflictError(format!(
                "Booking {} is already paid",
                payment.booking_id
            )));
        }
        self.put(CF_PAYMENTS, payment.tx_ref.as_str(), &payment)
    }

    async fn get(&self, tx_ref: &TxRef) -> Result<Option<Payment>> {
        self.fetch(CF_PAYMENTS, tx_ref.as_str())
    }

    async fn for_booking(&self, booking_id: &str) -> Result<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .scan::<Payment>(CF_PAYMENTS)?
            .into_iter()
            .filter(|p| p.booking_id == booking_id)
            .collect();
        payments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(payments)
    }

    async fn settle(&self, tx_ref: &TxRef, settlement: Settlement) -> Result<Payment> {
        let _guard = self.write_lock.lock().await;
        let mut payment: Payment = self
            .fetch(CF_PAYMENTS, tx_ref.as_str())?
            .ok_or_else(|| PaymentError::NotFoundError(format!("Payment {tx_ref}")))?;

        let succeeded = settlement.status == PaymentStatus::Success;
        if succeeded
            && let Some(winner) = self.settled_tx(&payment.booking_id)?
            && &winner != tx_ref
        {
            return Err(PaymentError::ConflictError(format!(
                "Booking {} is already paid by another transaction",
                payment.booking_id
            )));
        }

        payment.settle(settlement)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_PAYMENTS)?,
            tx_ref.as_str().as_bytes(),
            serde_json::to_vec(&payment)?,
        );
        if succeeded {
            batch.put_cf(
                self.cf(CF_SETTLEMENTS)?,
                payment.booking_id.as_bytes(),
                tx_ref.as_str().as_bytes(),
            );
        }
        self.db.write(batch)?;

        Ok(payment)
    }

    async fn get_all(&self) -> Result<Vec<Payment>> {
        let mut payments: Vec<Payment> = self.scan(CF_PAYMENTS)?;
        payments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(payments)
    }
}

#[async_trait]
impl HouseStore for RocksDBStore {
    async fn store(&self, house: House) -> Result<()> {
        self.put(CF_HOUSES, &house.house_id, &house)
    }

    async fn get(&self, house_id: &str) -> Result<Option<House>> {
        self.fetch(CF_HOUSES, house_id)
    }
}

#[async_trait]
impl UserStore for RocksDBStore {
    async fn store(&self, user: User) -> Result<()> {
        self.put(CF_USERS, &user.user_id, &user)
    }

    async fn get(&self, user_id: &str) -> Result<Option<User>> {
        self.fetch(CF_USERS, user_id)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users: Vec<User> = self.scan(CF_USERS)?;
        Ok(users.into_iter().find(|u| u.email.eq_ignore_ascii_case(email)))
    }
}
