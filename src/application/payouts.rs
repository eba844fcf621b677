use crate::domain::gateway::SubaccountRequest;
use crate::domain::ports::{PaymentGatewayBox, UserStoreBox};
use crate::domain::user::{Role, User};
use crate::error::{PaymentError, Result};
use tracing::info;

/// Landlord payout setup against the gateway.
pub struct PayoutService {
    users: UserStoreBox,
    gateway: PaymentGatewayBox,
}

impl PayoutService {
    pub fn new(users: UserStoreBox, gateway: PaymentGatewayBox) -> Self {
        Self { users, gateway }
    }

    /// Registers the landlord's bank account as a gateway subaccount and
    /// remembers it, so later deposits for their houses are split.
    pub async fn register_subaccount(
        &self,
        user: &User,
        request: SubaccountRequest,
    ) -> Result<User> {
        if user.role != Role::Landlord {
            return Err(PaymentError::ForbiddenError(
                "Only landlords can register a payout account".to_string(),
            ));
        }
        request.validate()?;

        let subaccount = self.gateway.create_subaccount(&request).await?;

        let mut landlord = self
            .users
            .get(&user.user_id)
            .await?
            .ok_or_else(|| PaymentError::NotFoundError(format!("User {}", user.user_id)))?;
        landlord.subaccount_id = Some(subaccount.subaccount_id);
        self.users.store(landlord.clone()).await?;

        info!(user_id = %landlord.user_id, "Payout subaccount registered");
        Ok(landlord)
    }

    pub async fn supported_currencies(&self) -> Result<Vec<serde_json::Value>> {
        self.gateway.supported_currencies().await
    }
}
