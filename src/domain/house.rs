use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum HouseStatus {
    Available,
    PendingApproval,
    Rented,
    Hidden,
}

/// A listed property. Only the fields the booking flow reads are modelled.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct House {
    pub house_id: String,
    pub landlord_id: String,
    pub title: String,
    #[serde(default)]
    pub location: String,
    pub price_per_month: Decimal,
    pub status: HouseStatus,
}

impl House {
    pub fn is_available(&self) -> bool {
        self.status == HouseStatus::Available
    }
}
