//! Application layer containing the business flows.
//!
//! `PaymentOrchestrator` drives the deposit state machine on top of the
//! bookings managed by `BookingService`; `PayoutService` sets up landlord
//! subaccounts for split deposits. All of them only talk to the domain ports,
//! so any storage backend or gateway client can be injected.

pub mod bookings;
pub mod bootstrap;
pub mod orchestrator;
pub mod payouts;
