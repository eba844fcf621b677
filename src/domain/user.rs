use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tenant,
    Landlord,
    Admin,
}

impl Role {
    /// Admins may act on any booking or payment.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// A marketplace account, as resolved by the auth layer.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    /// Gateway subaccount receiving this landlord's share of deposits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subaccount_id: Option<String>,
}

impl User {
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        full_name: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            full_name: full_name.into(),
            phone_number: None,
            role,
            created_at: Utc::now(),
            subaccount_id: None,
        }
    }

    /// True when the user is `owner_id` or holds an elevated role.
    pub fn can_act_for(&self, owner_id: &str) -> bool {
        self.user_id == owner_id || self.role.is_elevated()
    }
}
