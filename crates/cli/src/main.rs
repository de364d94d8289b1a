//! Cartflow CLI - Cart and checkout shell.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! cartflow cart show
//!
//! # Add a product from the catalog
//! cartflow cart add 42
//!
//! # Set a line's quantity (0 or below removes it)
//! cartflow cart update 42 3
//!
//! # Preview shipping and totals
//! cartflow quote
//!
//! # Walk through shipping, payment and review
//! cartflow checkout
//! ```
//!
//! # Commands
//!
//! - `cart` - Inspect and edit the persisted cart
//! - `quote` - Subtotal, shipping and total for the current cart
//! - `checkout` - Interactive checkout

#![cfg_attr(not(test), forbid(unsafe_code))]

use cartflow_core::ProductId;
use cartflow_storefront::{AppError, AppState, CartflowConfig};
use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "cartflow")]
#[command(author, version, about = "Cartflow cart and checkout shell")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Show subtotal, shipping and total
    Quote,
    /// Check out the current cart
    Checkout,
}

#[derive(Subcommand)]
enum CartAction {
    /// List cart lines and totals
    Show,
    /// Add one unit of a product
    Add {
        /// Catalog product ID
        product_id: ProductId,

        /// Requested quantity (each add contributes one unit)
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity
    Update {
        product_id: ProductId,

        /// New quantity; 0 or below removes the line
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove { product_id: ProductId },
    /// Empty the cart
    Clear,
}

/// Initialize Sentry error tracking.
///
/// Returns a guard that must be held for the lifetime of the program.
fn init_sentry(config: &CartflowConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Map tracing levels to Sentry: errors become events, info and debug
/// become breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO | tracing::Level::DEBUG => {
            sentry_tracing::EventFilter::Breadcrumb
        }
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing(json_logs: bool) {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cartflow=info,cartflow_storefront=info".into());

    // Logs go to stderr so command output stays clean
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter));

    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = CartflowConfig::from_env();
    let sentry_guard = config.as_ref().ok().and_then(init_sentry);
    init_tracing(cli.json_logs);

    let result = match config {
        Ok(config) => run(cli.command, config).await,
        Err(e) => Err(AppError::from(e).into()),
    };

    if let Err(e) = result {
        let internal = e
            .downcast_ref::<AppError>()
            .is_none_or(AppError::is_internal);
        if internal {
            tracing::error!("Command failed: {e}");
        } else {
            tracing::warn!("{e}");
        }
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: CartflowConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(config)?;

    match command {
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&state),
            CartAction::Add {
                product_id,
                quantity,
            } => commands::cart::add(&state, product_id, quantity).await?,
            CartAction::Update {
                product_id,
                quantity,
            } => commands::cart::update(&state, product_id, quantity),
            CartAction::Remove { product_id } => commands::cart::remove(&state, product_id),
            CartAction::Clear => commands::cart::clear(&state),
        },
        Commands::Quote => commands::cart::quote(&state),
        Commands::Checkout => commands::checkout::run(&state).await?,
    }
    Ok(())
}
