use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use wrs_payments::application::bookings::BookingService;
use wrs_payments::application::bootstrap::{AdminSeed, ensure_admin};
use wrs_payments::application::orchestrator::{DepositRequest, PaymentOrchestrator};
use wrs_payments::application::payouts::PayoutService;
use wrs_payments::config::{AdminArgs, GatewayArgs};
use wrs_payments::domain::booking::BookingStatus;
use wrs_payments::domain::gateway::{Commission, SplitType, SubaccountRequest};
use wrs_payments::domain::payment::TxRef;
use wrs_payments::domain::ports::{
    BookingStoreBox, HouseStoreBox, PaymentStoreBox, UserStore, UserStoreBox,
};
use wrs_payments::domain::user::User;
use wrs_payments::error::PaymentError;
use wrs_payments::infrastructure::chapa::ChapaClient;
use wrs_payments::infrastructure::in_memory::{
    InMemoryBookingStore, InMemoryHouseStore, InMemoryPaymentStore, InMemoryUserStore,
};
use wrs_payments::interfaces::csv::PaymentWriter;
use wrs_payments::interfaces::fixtures::Fixtures;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// JSON file with users, houses and bookings to load before running
    #[arg(long, global = true)]
    fixtures: Option<PathBuf>,

    #[command(flatten)]
    gateway: GatewayArgs,

    #[command(flatten)]
    admin: AdminArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Decision {
    Approved,
    Rejected,
}

impl From<Decision> for BookingStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approved => BookingStatus::Approved,
            Decision::Rejected => BookingStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SplitKind {
    Percentage,
    Flat,
}

impl From<SplitKind> for SplitType {
    fn from(kind: SplitKind) -> Self {
        match kind {
            SplitKind::Percentage => SplitType::Percentage,
            SplitKind::Flat => SplitType::Flat,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Request a booking for a house (tenant)
    Book {
        #[arg(long)]
        user: String,
        #[arg(long)]
        house: String,
        #[arg(long)]
        message: Option<String>,
    },
    /// Approve or reject a booking (landlord)
    Decide {
        #[arg(long)]
        user: String,
        #[arg(long)]
        booking: String,
        #[arg(value_enum)]
        decision: Decision,
    },
    /// Start the deposit payment of an approved booking (tenant)
    Initialize {
        #[arg(long)]
        user: String,
        #[arg(long)]
        booking: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, default_value = "ETB")]
        currency: String,
        /// Overrides the phone number stored on the account
        #[arg(long)]
        phone: Option<String>,
    },
    /// Verify a payment with the gateway
    Verify {
        #[arg(long)]
        user: String,
        tx_ref: String,
    },
    /// Cancel a pending payment
    Cancel {
        #[arg(long)]
        user: String,
        tx_ref: String,
    },
    /// Print the gateway receipt link of a successful payment
    Receipt {
        #[arg(long)]
        user: String,
        tx_ref: String,
    },
    /// Register the landlord's bank account for split deposits (landlord)
    RegisterSubaccount {
        #[arg(long)]
        user: String,
        #[arg(long)]
        account_name: String,
        #[arg(long)]
        bank_code: u32,
        #[arg(long)]
        account_number: String,
        #[arg(long)]
        business_name: Option<String>,
        #[arg(long, value_enum, default_value = "percentage")]
        split_type: SplitKind,
        /// Platform share: a fraction for percentage, an amount for flat
        #[arg(long)]
        split_value: Decimal,
    },
    /// List the currencies the gateway accepts
    Currencies,
    /// Recompute deposit flags from successful payments
    Reconcile,
    /// Print every payment as CSV
    Payments,
}

struct Stores {
    users: UserStoreBox,
    houses: HouseStoreBox,
    bookings: BookingStoreBox,
    payments: PaymentStoreBox,
}

#[cfg(feature = "storage-rocksdb")]
fn rocksdb_stores(db_path: PathBuf) -> Result<Stores> {
    use wrs_payments::infrastructure::rocksdb::RocksDBStore;

    let store = RocksDBStore::open(db_path)?;
    Ok(Stores {
        users: Box::new(store.clone()),
        houses: Box::new(store.clone()),
        bookings: Box::new(store.clone()),
        payments: Box::new(store),
    })
}

fn in_memory_stores() -> Stores {
    Stores {
        users: Box::new(InMemoryUserStore::new()),
        houses: Box::new(InMemoryHouseStore::new()),
        bookings: Box::new(InMemoryBookingStore::new()),
        payments: Box::new(InMemoryPaymentStore::new()),
    }
}

fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => rocksdb_stores(path),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(in_memory_stores())
        }
        None => Ok(in_memory_stores()),
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("WRS_LOG")
        .from_env()
        .into_diagnostic()?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    Ok(())
}

/// Resolves the acting user; stands in for the auth layer.
async fn current_user(users: &dyn UserStore, user_id: &str) -> wrs_payments::error::Result<User> {
    users
        .get(user_id)
        .await?
        .ok_or_else(|| PaymentError::NotFoundError(format!("User {user_id}")))
}

fn orchestrator(
    gateway: &GatewayArgs,
    bookings: BookingStoreBox,
    payments: PaymentStoreBox,
    landlords: UserStoreBox,
) -> Result<PaymentOrchestrator> {
    let client = ChapaClient::new(gateway.gateway_config())?;
    Ok(PaymentOrchestrator::new(
        bookings,
        payments,
        Box::new(client),
        gateway.checkout_settings(),
    )
    .with_landlord_payouts(landlords))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    let stores = open_stores(cli.db_path)?;

    ensure_admin(stores.users.as_ref(), &AdminSeed::from(&cli.admin)).await?;

    if let Some(path) = cli.fixtures {
        let file = File::open(path).into_diagnostic()?;
        let report = Fixtures::from_reader(file)?
            .load(
                stores.users.as_ref(),
                stores.houses.as_ref(),
                stores.bookings.as_ref(),
            )
            .await?;
        debug!(?report, "Fixture file applied");
    }

    let Stores {
        users,
        houses,
        bookings,
        payments,
    } = stores;

    match cli.command {
        Command::Book {
            user,
            house,
            message,
        } => {
            let user = current_user(users.as_ref(), &user).await?;
            let service = BookingService::new(bookings, houses, payments);
            print_json(&service.request(&user, &house, message).await?)?;
        }
        Command::Decide {
            user,
            booking,
            decision,
        } => {
            let user = current_user(users.as_ref(), &user).await?;
            let service = BookingService::new(bookings, houses, payments);
            print_json(&service.decide(&user, &booking, decision.into()).await?)?;
        }
        Command::Initialize {
            user,
            booking,
            amount,
            currency,
            phone,
        } => {
            let user = current_user(users.as_ref(), &user).await?;
            let request = DepositRequest {
                booking_id: booking,
                amount,
                currency,
                phone_number: phone,
            };
            let orchestrator = orchestrator(&cli.gateway, bookings, payments, users)?;
            print_json(&orchestrator.initialize(&user, request).await?)?;
        }
        Command::Verify { user, tx_ref } => {
            let user = current_user(users.as_ref(), &user).await?;
            let orchestrator = orchestrator(&cli.gateway, bookings, payments, users)?;
            print_json(&orchestrator.verify(&user, &TxRef::from(tx_ref)).await?)?;
        }
        Command::Cancel { user, tx_ref } => {
            let user = current_user(users.as_ref(), &user).await?;
            let orchestrator = orchestrator(&cli.gateway, bookings, payments, users)?;
            print_json(&orchestrator.cancel(&user, &TxRef::from(tx_ref)).await?)?;
        }
        Command::Receipt { user, tx_ref } => {
            let user = current_user(users.as_ref(), &user).await?;
            let orchestrator = orchestrator(&cli.gateway, bookings, payments, users)?;
            match orchestrator.receipt(&user, &TxRef::from(tx_ref)).await? {
                Some(url) => println!("{url}"),
                None => warn!("Gateway did not report a receipt reference"),
            }
        }
        Command::RegisterSubaccount {
            user,
            account_name,
            bank_code,
            account_number,
            business_name,
            split_type,
            split_value,
        } => {
            let user = current_user(users.as_ref(), &user).await?;
            let request = SubaccountRequest {
                account_name,
                bank_code,
                account_number,
                business_name,
                commission: Commission::new(split_type.into(), split_value)?,
            };
            let client = ChapaClient::new(cli.gateway.gateway_config())?;
            let service = PayoutService::new(users, Box::new(client));
            print_json(&service.register_subaccount(&user, request).await?)?;
        }
        Command::Currencies => {
            let client = ChapaClient::new(cli.gateway.gateway_config())?;
            let service = PayoutService::new(users, Box::new(client));
            print_json(&service.supported_currencies().await?)?;
        }
        Command::Reconcile => {
            let orchestrator = orchestrator(&cli.gateway, bookings, payments, users)?;
            print_json(&orchestrator.reconcile().await?)?;
        }
        Command::Payments => {
            let all = payments.get_all().await?;
            let stdout = io::stdout();
            let mut writer = PaymentWriter::new(stdout.lock());
            writer.write_payments(&all)?;
        }
    }

    Ok(())
}
