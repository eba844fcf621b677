//! Domain model: bookings, payments and the ports the application layer
//! talks to.

pub mod booking;
pub mod gateway;
pub mod house;
pub mod payment;
pub mod ports;
pub mod user;
