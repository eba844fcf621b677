//! JSON seed data for users, houses and bookings.
//!
//! ```json
//! { "users": [...], "houses": [...], "bookings": [...] }
//! ```

use crate::domain::booking::Booking;
use crate::domain::house::House;
use crate::domain::ports::{BookingStore, HouseStore, UserStore};
use crate::domain::user::User;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::io::Read;
use tracing::{debug, info};

#[derive(Debug, Default, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub houses: Vec<House>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
}

impl Fixtures {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        Ok(serde_json::from_reader(source)?)
    }

    /// Writes the records into the given stores.
    ///
    /// Every booking is validated before anything is written. Records whose id
    /// is already stored are skipped, so reloading a seed file never resets a
    /// booking that was paid in the meantime.
    pub async fn load(
        self,
        users: &dyn UserStore,
        houses: &dyn HouseStore,
        bookings: &dyn BookingStore,
    ) -> Result<FixtureReport> {
        for booking in &self.bookings {
            booking.validate()?;
        }

        let mut report = FixtureReport::default();
        for user in self.users {
            if users.get(&user.user_id).await?.is_some() {
                debug!(user_id = %user.user_id, "Fixture user already stored");
                report.skipped += 1;
                continue;
            }
            users.store(user).await?;
            report.loaded += 1;
        }
        for house in self.houses {
            if houses.get(&house.house_id).await?.is_some() {
                debug!(house_id = %house.house_id, "Fixture house already stored");
                report.skipped += 1;
                continue;
            }
            houses.store(house).await?;
            report.loaded += 1;
        }
        for booking in self.bookings {
            if bookings.get(&booking.booking_id).await?.is_some() {
                debug!(booking_id = %booking.booking_id, "Fixture booking already stored");
                report.skipped += 1;
                continue;
            }
            bookings.store(booking).await?;
            report.loaded += 1;
        }

        info!(loaded = report.loaded, skipped = report.skipped, "Fixtures loaded");
        Ok(report)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FixtureReport {
    pub loaded: usize,
    pub skipped: usize,
}
