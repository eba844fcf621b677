use crate::application::bootstrap::AdminSeed;
use crate::application::orchestrator::CheckoutSettings;
use crate::infrastructure::chapa::{DEFAULT_BASE_URL, GatewayConfig};
use clap::Args;
use std::time::Duration;

/// Payment gateway settings, read from flags or the environment.
#[derive(Args, Debug, Clone)]
pub struct GatewayArgs {
    /// Base URL of the payment gateway API
    #[arg(long = "gateway-url", env = "CHAPA_API_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Secret key used as bearer token
    #[arg(
        long = "gateway-secret",
        env = "CHAPA_SECRET_KEY",
        default_value = "",
        hide_env_values = true
    )]
    pub secret_key: String,

    /// Timeout for each gateway call, in seconds
    #[arg(long = "gateway-timeout-secs", default_value_t = 30)]
    pub timeout_secs: u64,

    /// URL the gateway calls back once a checkout completes
    #[arg(
        long,
        env = "WRS_CALLBACK_URL",
        default_value = "http://localhost:8000/api/payment/callback"
    )]
    pub callback_url: String,

    /// URL the tenant is sent back to after checkout
    #[arg(long, env = "WRS_RETURN_URL")]
    pub return_url: Option<String>,
}

impl GatewayArgs {
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.base_url.clone(),
            secret_key: self.secret_key.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            callback_url: self.callback_url.clone(),
            return_url: self.return_url.clone(),
        }
    }
}

/// The administrator account created at start-up.
#[derive(Args, Debug, Clone)]
pub struct AdminArgs {
    #[arg(long, env = "WRS_ADMIN_EMAIL", default_value = "admin@woliso.com")]
    pub admin_email: String,

    #[arg(long, env = "WRS_ADMIN_NAME", default_value = "System Administrator")]
    pub admin_name: String,
}

impl From<&AdminArgs> for AdminSeed {
    fn from(args: &AdminArgs) -> Self {
        Self {
            email: args.admin_email.clone(),
            full_name: args.admin_name.clone(),
        }
    }
}
