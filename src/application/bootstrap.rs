use crate::domain::ports::UserStore;
use crate::domain::user::{Role, User};
use crate::error::Result;
use tracing::info;

#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BootstrapOutcome {
    Created(User),
    AlreadyPresent(User),
}

/// Makes sure the administrator account exists. Safe to run on every start.
pub async fn ensure_admin(users: &dyn UserStore, seed: &AdminSeed) -> Result<BootstrapOutcome> {
    if let Some(existing) = users.find_by_email(&seed.email).await? {
        return Ok(BootstrapOutcome::AlreadyPresent(existing));
    }

    let admin = User::new(
        uuid::Uuid::new_v4().to_string(),
        seed.email.clone(),
        seed.full_name.clone(),
        Role::Admin,
    );
    users.store(admin.clone()).await?;
    info!(email = %admin.email, user_id = %admin.user_id, "Default admin user created");
    Ok(BootstrapOutcome::Created(admin))
}
