use crate::domain::gateway::{CheckoutRequest, Customer, Split};
use crate::domain::payment::{Amount, Currency, Payment, PaymentStatus, Settlement, TxRef};
use crate::domain::ports::{BookingStoreBox, PaymentGatewayBox, PaymentStoreBox, UserStoreBox};
use crate::domain::user::User;
use crate::error::{PaymentError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

/// Where the gateway should send the tenant and its webhooks.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub callback_url: String,
    pub return_url: Option<String>,
}

/// A tenant's request to pay the deposit of a booking.
#[derive(Debug, Clone)]
pub struct DepositRequest {
    pub booking_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitializedPayment {
    pub checkout_url: String,
    pub tx_ref: TxRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub checked: usize,
    pub repaired: Vec<String>,
    pub skipped: Vec<SkippedBooking>,
}

/// A booking whose flag could not be set, with the store's reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedBooking {
    pub booking_id: String,
    pub tx_ref: TxRef,
    pub reason: String,
}

/// Coordinates booking eligibility, gateway calls and payment state.
///
/// The orchestrator owns payment records. On bookings it only ever sets
/// `deposit_paid`, and only after the payment row has been settled as
/// success, so the payment store is the source of truth.
pub struct PaymentOrchestrator {
    bookings: BookingStoreBox,
    payments: PaymentStoreBox,
    gateway: PaymentGatewayBox,
    settings: CheckoutSettings,
    landlords: Option<UserStoreBox>,
}

impl PaymentOrchestrator {
    /// Creates a new `PaymentOrchestrator`.
    ///
    /// # Arguments
    ///
    /// * `bookings` - The store holding booking records.
    /// * `payments` - The store holding payment attempts.
    /// * `gateway` - The payment gateway client.
    /// * `settings` - Callback and return URLs handed to the gateway.
    pub fn new(
        bookings: BookingStoreBox,
        payments: PaymentStoreBox,
        gateway: PaymentGatewayBox,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            bookings,
            payments,
            gateway,
            settings,
            landlords: None,
        }
    }

    /// Splits each deposit with the booking's landlord when they registered
    /// a subaccount.
    pub fn with_landlord_payouts(mut self, users: UserStoreBox) -> Self {
        self.landlords = Some(users);
        self
    }

    /// Opens a checkout session for an approved booking.
    ///
    /// The payment row is only written once the gateway accepted the
    /// transaction, so a gateway failure leaves nothing behind.
    #[instrument(skip_all, fields(booking_id = %request.booking_id, user_id = %user.user_id))]
    pub async fn initialize(
        &self,
        user: &User,
        request: DepositRequest,
    ) -> Result<InitializedPayment> {
        let amount = Amount::new(request.amount)?;
        let currency = Currency::parse(&request.currency)?;

        let booking = self
            .bookings
            .get(&request.booking_id)
            .await?
            .ok_or_else(|| {
                PaymentError::NotFoundError(format!("Booking {}", request.booking_id))
            })?;

        if booking.tenant_id != user.user_id {
            return Err(PaymentError::ForbiddenError(format!(
                "Booking {} does not belong to user {}",
                booking.booking_id, user.user_id
            )));
        }
        booking.ensure_payable()?;

        let already_paid = self
            .payments
            .for_booking(&booking.booking_id)
            .await?
            .iter()
            .any(|p| p.status == PaymentStatus::Success);
        if already_paid {
            return Err(PaymentError::ConflictError(format!(
                "Booking {} is already paid",
                booking.booking_id
            )));
        }

        let customer = Customer::from_user(user, request.phone_number.as_deref())?;
        let split = self.landlord_split(&booking.landlord_id).await?;
        let checkout_request = CheckoutRequest {
            amount,
            currency: currency.clone(),
            tx_ref: TxRef::generate(&booking.booking_id),
            callback_url: self.settings.callback_url.clone(),
            return_url: self.settings.return_url.clone(),
            customer,
            split,
        };
        let tx_ref = checkout_request.tx_ref.clone();

        let checkout = self
            .gateway
            .initialize_payment(&checkout_request)
            .await
            .inspect_err(|err| {
                error!(%tx_ref, booking_id = %booking.booking_id, %err, "Gateway rejected initialization")
            })?;

        let payment = Payment {
            payment_id: uuid::Uuid::new_v4().to_string(),
            booking_id: booking.booking_id.clone(),
            tenant_id: booking.tenant_id.clone(),
            house_id: booking.house_id.clone(),
            tx_ref: tx_ref.clone(),
            amount,
            currency,
            status: PaymentStatus::Pending,
            checkout_url: checkout.checkout_url.clone(),
            created_at: Utc::now(),
            verified_at: None,
            gateway_payload: None,
        };
        self.payments.insert(payment).await?;

        info!(%tx_ref, "Deposit payment pending");
        Ok(InitializedPayment {
            checkout_url: checkout.checkout_url,
            tx_ref,
        })
    }

    /// Asks the gateway for the outcome of a payment and records it.
    ///
    /// Settled payments are returned without another gateway call; for a
    /// successful one the booking flag is re-applied in case the earlier write
    /// never landed.
    #[instrument(skip_all, fields(tx_ref = %tx_ref, user_id = %user.user_id))]
    pub async fn verify(&self, user: &User, tx_ref: &TxRef) -> Result<Payment> {
        let payment = self.authorized_payment(user, tx_ref).await?;

        if payment.status.is_terminal() {
            if payment.status == PaymentStatus::Success {
                self.mark_booking_paid(&payment).await;
            }
            return Ok(payment);
        }

        let verification = self.gateway.verify_payment(tx_ref).await.inspect_err(|err| {
            error!(%tx_ref, booking_id = %payment.booking_id, %err, "Gateway verification failed")
        })?;

        let status = if verification.verified {
            PaymentStatus::Success
        } else {
            PaymentStatus::Failed
        };
        let settled = self
            .payments
            .settle(
                tx_ref,
                Settlement {
                    status,
                    payload: verification.payload,
                    verified_at: Utc::now(),
                },
            )
            .await?;

        if settled.status == PaymentStatus::Success {
            info!(booking_id = %settled.booking_id, "Deposit paid");
            self.mark_booking_paid(&settled).await;
        } else {
            warn!(
                booking_id = %settled.booking_id,
                raw_status = %verification.raw_status,
                "Deposit payment failed"
            );
        }
        Ok(settled)
    }

    /// Cancels a pending checkout at the gateway and marks the payment failed.
    #[instrument(skip_all, fields(tx_ref = %tx_ref, user_id = %user.user_id))]
    pub async fn cancel(&self, user: &User, tx_ref: &TxRef) -> Result<Payment> {
        let payment = self.authorized_payment(user, tx_ref).await?;
        if payment.status != PaymentStatus::Pending {
            return Err(PaymentError::ConflictError(format!(
                "Payment {tx_ref} is already {}",
                payment.status.as_str()
            )));
        }

        self.gateway.cancel_payment(tx_ref).await.inspect_err(|err| {
            error!(%tx_ref, booking_id = %payment.booking_id, %err, "Gateway cancellation failed")
        })?;

        self.payments
            .settle(
                tx_ref,
                Settlement {
                    status: PaymentStatus::Failed,
                    payload: serde_json::json!({ "status": "cancelled" }),
                    verified_at: Utc::now(),
                },
            )
            .await
    }

    /// Recomputes `deposit_paid` from successful payments.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        for payment in self.payments.get_all().await? {
            if payment.status != PaymentStatus::Success {
                continue;
            }
            report.checked += 1;
            match self.bookings.mark_deposit_paid(&payment.booking_id).await {
                Ok(true) => {
                    info!(booking_id = %payment.booking_id, tx_ref = %payment.tx_ref, "Repaired deposit flag");
                    report.repaired.push(payment.booking_id);
                }
                Ok(false) => {}
                Err(err) => {
                    error!(booking_id = %payment.booking_id, tx_ref = %payment.tx_ref, %err, "Cannot repair deposit flag");
                    report.skipped.push(SkippedBooking {
                        booking_id: payment.booking_id,
                        tx_ref: payment.tx_ref,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    /// Receipt page of a successful payment, when the gateway reported its
    /// own reference.
    #[instrument(skip_all, fields(tx_ref = %tx_ref, user_id = %user.user_id))]
    pub async fn receipt(&self, user: &User, tx_ref: &TxRef) -> Result<Option<String>> {
        let payment = self.authorized_payment(user, tx_ref).await?;
        if payment.status != PaymentStatus::Success {
            return Err(PaymentError::ConflictError(format!(
                "Payment {tx_ref} is {}, receipts exist only for successful payments",
                payment.status.as_str()
            )));
        }
        Ok(payment
            .gateway_payload
            .as_ref()
            .and_then(|payload| payload["data"]["reference"].as_str())
            .map(|reference| self.gateway.receipt_url(reference)))
    }

    async fn landlord_split(&self, landlord_id: &str) -> Result<Option<Split>> {
        let Some(users) = &self.landlords else {
            return Ok(None);
        };
        Ok(users
            .get(landlord_id)
            .await?
            .and_then(|landlord| landlord.subaccount_id)
            .map(|subaccount_id| Split {
                subaccount_id,
                commission: None,
            }))
    }

    async fn authorized_payment(&self, user: &User, tx_ref: &TxRef) -> Result<Payment> {
        let payment = self
            .payments
            .get(tx_ref)
            .await?
            .ok_or_else(|| PaymentError::NotFoundError(format!("Payment {tx_ref}")))?;

        if !user.can_act_for(&payment.tenant_id) {
            return Err(PaymentError::ForbiddenError(format!(
                "User {} cannot access payment {tx_ref}",
                user.user_id
            )));
        }
        Ok(payment)
    }

    /// The payment row is already committed, so a failure here is logged
    /// and left to `reconcile` instead of being reported to the caller.
    async fn mark_booking_paid(&self, payment: &Payment) {
        if let Err(err) = self.bookings.mark_deposit_paid(&payment.booking_id).await {
            error!(
                booking_id = %payment.booking_id,
                tx_ref = %payment.tx_ref,
                %err,
                "Payment settled but booking not updated"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{Booking, BookingStatus};
    use crate::domain::gateway::{Checkout, Subaccount, SubaccountRequest, Verification};
    use crate::domain::ports::{BookingStore, PaymentGateway, PaymentStore, UserStore};
    use crate::domain::user::Role;
    use crate::infrastructure::in_memory::{
        InMemoryBookingStore, InMemoryPaymentStore, InMemoryUserStore,
    };
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scripted gateway recording how often it was called.
    #[derive(Clone, Default)]
    struct ScriptedGateway {
        initialize_calls: Arc<AtomicUsize>,
        verify_calls: Arc<AtomicUsize>,
        fail_initialize: bool,
        fail_verify: bool,
        verify_status: Option<&'static str>,
        last_split: Arc<Mutex<Option<Split>>>,
    }

    #[async_trait]
    impl PaymentGateway for ScriptedGateway {
        async fn initialize_payment(&self, request: &CheckoutRequest) -> Result<Checkout> {
            self.initialize_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_split.lock().unwrap() = request.split.clone();
            if self.fail_initialize {
                return Err(PaymentError::gateway("Invalid API Key", Some(401)));
            }
            Ok(Checkout {
                checkout_url: format!("https://checkout.example/{}", request.tx_ref),
            })
        }

        async fn verify_payment(&self, _tx_ref: &TxRef) -> Result<Verification> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_verify {
                return Err(PaymentError::gateway("connection reset", None));
            }
            let status = self.verify_status.unwrap_or("success");
            Ok(Verification {
                verified: status == "success",
                raw_status: status.to_string(),
                payload: serde_json::json!({
                    "status": "success",
                    "data": { "status": status, "reference": "APfY8x1Qz" }
                }),
            })
        }

        async fn cancel_payment(&self, _tx_ref: &TxRef) -> Result<()> {
            Ok(())
        }

        async fn create_subaccount(&self, _request: &SubaccountRequest) -> Result<Subaccount> {
            Ok(Subaccount {
                subaccount_id: "sub-1".to_string(),
            })
        }

        async fn supported_currencies(&self) -> Result<Vec<serde_json::Value>> {
            Ok(vec![serde_json::json!("ETB")])
        }

        fn receipt_url(&self, reference: &str) -> String {
            format!("https://receipts.example/{reference}")
        }
    }

    struct Harness {
        orchestrator: PaymentOrchestrator,
        bookings: InMemoryBookingStore,
        payments: InMemoryPaymentStore,
        gateway: ScriptedGateway,
    }

    async fn harness(status: BookingStatus, gateway: ScriptedGateway) -> Harness {
        let bookings = InMemoryBookingStore::new();
        let payments = InMemoryPaymentStore::new();

        let mut booking = Booking::new("b1", "t1", "h1", "l1");
        if status != BookingStatus::Pending {
            booking.decide(status).unwrap();
        }
        bookings.store(booking).await.unwrap();

        let orchestrator = PaymentOrchestrator::new(
            Box::new(bookings.clone()),
            Box::new(payments.clone()),
            Box::new(gateway.clone()),
            CheckoutSettings {
                callback_url: "https://wrs.example/api/payment/callback".to_string(),
                return_url: None,
            },
        );
        Harness {
            orchestrator,
            bookings,
            payments,
            gateway,
        }
    }

    fn tenant() -> User {
        User::new("t1", "abebe@example.com", "Abebe Kebede", Role::Tenant)
    }

    fn deposit() -> DepositRequest {
        DepositRequest {
            booking_id: "b1".to_string(),
            amount: dec!(500),
            currency: "ETB".to_string(),
            phone_number: None,
        }
    }

    #[tokio::test]
    async fn test_initialize_approved_booking() {
        let h = harness(BookingStatus::Approved, ScriptedGateway::default()).await;

        let init = h.orchestrator.initialize(&tenant(), deposit()).await.unwrap();
        let suffix = init.tx_ref.as_str().strip_prefix("WRS-b1-").unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(init.checkout_url.ends_with(init.tx_ref.as_str()));

        let payment = h.payments.get(&init.tx_ref).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount.value(), dec!(500));
        assert_eq!(payment.currency.as_str(), "ETB");
        assert_eq!(payment.house_id, "h1");
    }

    #[tokio::test]
    async fn test_initialize_requires_approved_booking() {
        for status in [BookingStatus::Pending, BookingStatus::Rejected] {
            let h = harness(status, ScriptedGateway::default()).await;
            let result = h.orchestrator.initialize(&tenant(), deposit()).await;
            assert!(matches!(result, Err(PaymentError::ConflictError(_))));
            assert_eq!(h.gateway.initialize_calls.load(Ordering::SeqCst), 0);
            assert!(h.payments.get_all().await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_initialize_rejects_other_tenant() {
        let h = harness(BookingStatus::Approved, ScriptedGateway::default()).await;
        let stranger = User::new("t2", "t2@example.com", "Other Tenant", Role::Tenant);

        let result = h.orchestrator.initialize(&stranger, deposit()).await;
        assert!(matches!(result, Err(PaymentError::ForbiddenError(_))));
        assert_eq!(h.gateway.initialize_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_initialize_unknown_booking() {
        let h = harness(BookingStatus::Approved, ScriptedGateway::default()).await;
        let mut request = deposit();
        request.booking_id = "missing".to_string();

        let result = h.orchestrator.initialize(&tenant(), request).await;
        assert!(matches!(result, Err(PaymentError::NotFoundError(_))));
    }

    #[tokio::test]
    async fn test_initialize_validates_before_gateway() {
        let h = harness(BookingStatus::Approved, ScriptedGateway::default()).await;

        let mut bad_phone = deposit();
        bad_phone.phone_number = Some("0812345678".to_string());
        let mut bad_amount = deposit();
        bad_amount.amount = dec!(0);
        let mut bad_currency = deposit();
        bad_currency.currency = "birr".to_string();

        for request in [bad_phone, bad_amount, bad_currency] {
            let result = h.orchestrator.initialize(&tenant(), request).await;
            assert!(matches!(result, Err(PaymentError::ValidationError(_))));
        }
        assert_eq!(h.gateway.initialize_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_no_payment() {
        let gateway = ScriptedGateway {
            fail_initialize: true,
            ..Default::default()
        };
        let h = harness(BookingStatus::Approved, gateway).await;

        let result = h.orchestrator.initialize(&tenant(), deposit()).await;
        assert!(matches!(
            result,
            Err(PaymentError::GatewayError {
                http_status: Some(401),
                ..
            })
        ));
        assert!(h.payments.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_initialize_yields_distinct_tx_refs() {
        let h = harness(BookingStatus::Approved, ScriptedGateway::default()).await;

        let mut refs = std::collections::HashSet::new();
        for _ in 0..20 {
            let init = h.orchestrator.initialize(&tenant(), deposit()).await.unwrap();
            assert!(refs.insert(init.tx_ref));
        }
        assert_eq!(h.payments.for_booking("b1").await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_verify_success_marks_deposit_paid() {
        let h = harness(BookingStatus::Approved, ScriptedGateway::default()).await;
        let init = h.orchestrator.initialize(&tenant(), deposit()).await.unwrap();

        let payment = h.orchestrator.verify(&tenant(), &init.tx_ref).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert!(payment.verified_at.is_some());
        assert_eq!(payment.gateway_payload.unwrap()["data"]["status"], "success");
        assert!(h.bookings.get("b1").await.unwrap().unwrap().deposit_paid);
    }

    #[tokio::test]
    async fn test_verify_is_idempotent() {
        let h = harness(BookingStatus::Approved, ScriptedGateway::default()).await;
        let init = h.orchestrator.initialize(&tenant(), deposit()).await.unwrap();

        h.orchestrator.verify(&tenant(), &init.tx_ref).await.unwrap();
        let again = h.orchestrator.verify(&tenant(), &init.tx_ref).await.unwrap();

        assert_eq!(again.status, PaymentStatus::Success);
        assert!(h.bookings.get("b1").await.unwrap().unwrap().deposit_paid);
        assert_eq!(h.gateway.verify_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_verify_repairs_lagging_booking() {
        let h = harness(BookingStatus::Approved, ScriptedGateway::default()).await;
        let init = h.orchestrator.initialize(&tenant(), deposit()).await.unwrap();
        h.orchestrator.verify(&tenant(), &init.tx_ref).await.unwrap();

        // Simulate the booking write having been lost
        let mut booking = h.bookings.get("b1").await.unwrap().unwrap();
        booking.deposit_paid = false;
        h.bookings.store(booking).await.unwrap();

        h.orchestrator.verify(&tenant(), &init.tx_ref).await.unwrap();
        assert!(h.bookings.get("b1").await.unwrap().unwrap().deposit_paid);
    }

    #[tokio::test]
    async fn test_verify_failure_leaves_booking_unpaid() {
        let gateway = ScriptedGateway {
            verify_status: Some("failed"),
            ..Default::default()
        };
        let h = harness(BookingStatus::Approved, gateway).await;
        let init = h.orchestrator.initialize(&tenant(), deposit()).await.unwrap();

        let payment = h.orchestrator.verify(&tenant(), &init.tx_ref).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert!(payment.verified_at.is_some());
        assert!(!h.bookings.get("b1").await.unwrap().unwrap().deposit_paid);

        // A failed attempt can be retried with a fresh tx_ref
        let retry = h.orchestrator.initialize(&tenant(), deposit()).await.unwrap();
        assert_ne!(retry.tx_ref, init.tx_ref);
    }

    #[tokio::test]
    async fn test_verify_transport_error_mutates_nothing() {
        let gateway = ScriptedGateway {
            fail_verify: true,
            ..Default::default()
        };
        let h = harness(BookingStatus::Approved, gateway).await;
        let init = h.orchestrator.initialize(&tenant(), deposit()).await.unwrap();

        let result = h.orchestrator.verify(&tenant(), &init.tx_ref).await;
        assert!(matches!(result, Err(PaymentError::GatewayError { .. })));

        let payment = h.payments.get(&init.tx_ref).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.verified_at.is_none());
        assert!(!h.bookings.get("b1").await.unwrap().unwrap().deposit_paid);
    }

    #[tokio::test]
    async fn test_verify_authorization() {
        let h = harness(BookingStatus::Approved, ScriptedGateway::default()).await;
        let init = h.orchestrator.initialize(&tenant(), deposit()).await.unwrap();

        let landlord = User::new("l1", "l1@example.com", "Land Lord", Role::Landlord);
        let result = h.orchestrator.verify(&landlord, &init.tx_ref).await;
        assert!(matches!(result, Err(PaymentError::ForbiddenError(_))));

        let admin = User::new("a1", "admin@woliso.com", "System Administrator", Role::Admin);
        let payment = h.orchestrator.verify(&admin, &init.tx_ref).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);

        let result = h.orchestrator.verify(&admin, &TxRef::from("WRS-b1-unknown")).await;
        assert!(matches!(result, Err(PaymentError::NotFoundError(_))));
    }

    #[tokio::test]
    async fn test_initialize_after_success_conflicts() {
        let h = harness(BookingStatus::Approved, ScriptedGateway::default()).await;
        let init = h.orchestrator.initialize(&tenant(), deposit()).await.unwrap();
        h.orchestrator.verify(&tenant(), &init.tx_ref).await.unwrap();

        let result = h.orchestrator.initialize(&tenant(), deposit()).await;
        assert!(matches!(result, Err(PaymentError::ConflictError(_))));
        assert_eq!(h.gateway.initialize_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_success_for_booking_is_rejected() {
        let h = harness(BookingStatus::Approved, ScriptedGateway::default()).await;
        let first = h.orchestrator.initialize(&tenant(), deposit()).await.unwrap();
        let second = h.orchestrator.initialize(&tenant(), deposit()).await.unwrap();

        h.orchestrator.verify(&tenant(), &first.tx_ref).await.unwrap();
        let result = h.orchestrator.verify(&tenant(), &second.tx_ref).await;
        assert!(matches!(result, Err(PaymentError::ConflictError(_))));

        let successes = h
            .payments
            .for_booking("b1")
            .await
            .unwrap()
            .into_iter()
            .filter(|p| p.status == PaymentStatus::Success)
            .count();
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_concurrent_initialize_creates_distinct_pending_rows() {
        let h = Arc::new(harness(BookingStatus::Approved, ScriptedGateway::default()).await);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let h = Arc::clone(&h);
                tokio::spawn(async move { h.orchestrator.initialize(&tenant(), deposit()).await })
            })
            .collect();

        let mut refs = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(init) => refs.push(init.tx_ref),
                Err(err) => assert!(matches!(err, PaymentError::ConflictError(_))),
            }
        }
        let pending = h.payments.for_booking("b1").await.unwrap();
        assert_eq!(pending.len(), refs.len());
        assert!(pending.iter().all(|p| p.status == PaymentStatus::Pending));
    }

    #[tokio::test]
    async fn test_cancel_pending_payment() {
        let h = harness(BookingStatus::Approved, ScriptedGateway::default()).await;
        let init = h.orchestrator.initialize(&tenant(), deposit()).await.unwrap();

        let cancelled = h.orchestrator.cancel(&tenant(), &init.tx_ref).await.unwrap();
        assert_eq!(cancelled.status, PaymentStatus::Failed);

        let result = h.orchestrator.cancel(&tenant(), &init.tx_ref).await;
        assert!(matches!(result, Err(PaymentError::ConflictError(_))));
    }

    #[tokio::test]
    async fn test_reconcile_repairs_deposit_flags() {
        let h = harness(BookingStatus::Approved, ScriptedGateway::default()).await;
        let init = h.orchestrator.initialize(&tenant(), deposit()).await.unwrap();
        h.orchestrator.verify(&tenant(), &init.tx_ref).await.unwrap();

        let report = h.orchestrator.reconcile().await.unwrap();
        assert_eq!(report.checked, 1);
        assert!(report.repaired.is_empty());

        let mut booking = h.bookings.get("b1").await.unwrap().unwrap();
        booking.deposit_paid = false;
        h.bookings.store(booking).await.unwrap();

        let report = h.orchestrator.reconcile().await.unwrap();
        assert_eq!(report.repaired, vec!["b1".to_string()]);
        assert!(h.bookings.get("b1").await.unwrap().unwrap().deposit_paid);
    }

    async fn set_status(bookings: &InMemoryBookingStore, booking_id: &str, status: BookingStatus) {
        let mut booking = bookings.get(booking_id).await.unwrap().unwrap();
        booking.status = status;
        bookings.store(booking).await.unwrap();
    }

    #[tokio::test]
    async fn test_verify_reports_captured_payment_when_booking_left_approved() {
        let h = harness(BookingStatus::Approved, ScriptedGateway::default()).await;
        let init = h.orchestrator.initialize(&tenant(), deposit()).await.unwrap();

        // The landlord's rejection landed while the tenant was at checkout
        set_status(&h.bookings, "b1", BookingStatus::Rejected).await;

        let payment = h.orchestrator.verify(&tenant(), &init.tx_ref).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        let stored = h.payments.get(&init.tx_ref).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Success);
        assert!(!h.bookings.get("b1").await.unwrap().unwrap().deposit_paid);

        // The settled short-circuit behaves the same way
        let again = h.orchestrator.verify(&tenant(), &init.tx_ref).await.unwrap();
        assert_eq!(again.status, PaymentStatus::Success);
        assert_eq!(h.gateway.verify_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reconcile_continues_past_unrepairable_booking() {
        let h = harness(BookingStatus::Approved, ScriptedGateway::default()).await;
        let mut second = Booking::new("b2", "t1", "h2", "l1");
        second.decide(BookingStatus::Approved).unwrap();
        h.bookings.store(second).await.unwrap();

        let first = h.orchestrator.initialize(&tenant(), deposit()).await.unwrap();
        let mut request = deposit();
        request.booking_id = "b2".to_string();
        let other = h.orchestrator.initialize(&tenant(), request).await.unwrap();

        // b1 is rejected before its payment is verified
        set_status(&h.bookings, "b1", BookingStatus::Rejected).await;
        h.orchestrator.verify(&tenant(), &first.tx_ref).await.unwrap();

        // b2 is paid, then its flag is lost
        h.orchestrator.verify(&tenant(), &other.tx_ref).await.unwrap();
        let mut lagging = h.bookings.get("b2").await.unwrap().unwrap();
        lagging.deposit_paid = false;
        h.bookings.store(lagging).await.unwrap();

        let report = h.orchestrator.reconcile().await.unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.repaired, vec!["b2".to_string()]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].booking_id, "b1");
        assert_eq!(report.skipped[0].tx_ref, first.tx_ref);
        assert!(report.skipped[0].reason.contains("rejected"));
        assert!(h.bookings.get("b2").await.unwrap().unwrap().deposit_paid);
    }

    #[tokio::test]
    async fn test_initialize_splits_with_registered_landlord() {
        let gateway = ScriptedGateway::default();
        let bookings = InMemoryBookingStore::new();
        let payments = InMemoryPaymentStore::new();
        let users = InMemoryUserStore::new();

        let mut booking = Booking::new("b1", "t1", "h1", "l1");
        booking.decide(BookingStatus::Approved).unwrap();
        bookings.store(booking).await.unwrap();

        let orchestrator = PaymentOrchestrator::new(
            Box::new(bookings),
            Box::new(payments),
            Box::new(gateway.clone()),
            CheckoutSettings {
                callback_url: "https://wrs.example/api/payment/callback".to_string(),
                return_url: None,
            },
        )
        .with_landlord_payouts(Box::new(users.clone()));

        // No subaccount yet
        orchestrator.initialize(&tenant(), deposit()).await.unwrap();
        assert!(gateway.last_split.lock().unwrap().is_none());

        let mut landlord = User::new("l1", "l1@example.com", "Almaz Haile", Role::Landlord);
        landlord.subaccount_id = Some("sub-l1".to_string());
        users.store(landlord).await.unwrap();

        orchestrator.initialize(&tenant(), deposit()).await.unwrap();
        let split = gateway.last_split.lock().unwrap().clone().unwrap();
        assert_eq!(split.subaccount_id, "sub-l1");
        assert!(split.commission.is_none());
    }

    #[tokio::test]
    async fn test_receipt_for_successful_payment_only() {
        let h = harness(BookingStatus::Approved, ScriptedGateway::default()).await;
        let init = h.orchestrator.initialize(&tenant(), deposit()).await.unwrap();

        let result = h.orchestrator.receipt(&tenant(), &init.tx_ref).await;
        assert!(matches!(result, Err(PaymentError::ConflictError(_))));

        h.orchestrator.verify(&tenant(), &init.tx_ref).await.unwrap();
        let receipt = h.orchestrator.receipt(&tenant(), &init.tx_ref).await.unwrap();
        assert_eq!(receipt.as_deref(), Some("https://receipts.example/APfY8x1Qz"));
    }
}
