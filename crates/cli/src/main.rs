//! Pzafira CLI - Browse the catalog and manage the signed-in user's cart,
//! wishlist and orders from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Browse the first page, filtered locally
//! pzafira products --brand Nike --max-price 1500
//!
//! # Facets of the second page
//! pzafira facets --page 2
//!
//! # Cart (requires PZAFIRA_API_TOKEN)
//! pzafira cart add --product 9 --variant 91 --quantity 2
//! pzafira cart qty 14 3
//!
//! # Forget every per-user snapshot
//! pzafira logout
//! ```
//!
//! # Commands
//!
//! - `products` - List products on one catalog page
//! - `facets` - Show the filter options of one catalog page
//! - `cart` - List, add, update, remove or clear cart lines
//! - `wishlist` - List, toggle or remove wishlist entries
//! - `orders` - List order history or change an order's status (staff)
//! - `logout` - End the session and clear local per-user state

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pzafira_core::{CartItemId, OrderId, OrderStatus, PaymentStatus, Price, ProductId, VariantId, WishlistItemId};
use pzafira_storefront::StorefrontConfig;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "pzafira")]
#[command(author, version, about = "Pzafira storefront client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List products on one catalog page
    Products {
        #[command(flatten)]
        page: PageArgs,

        /// Case-insensitive text matched against name and description
        #[arg(short, long)]
        search: Option<String>,

        /// Only this category
        #[arg(long)]
        category: Option<String>,

        /// Only this brand
        #[arg(long)]
        brand: Option<String>,

        /// Lowest acceptable price
        #[arg(long)]
        min_price: Option<Price>,

        /// Highest acceptable price
        #[arg(long)]
        max_price: Option<Price>,
    },
    /// Show the filter options of one catalog page
    Facets {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Order history
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// End the session and clear local per-user state
    Logout,
}

#[derive(clap::Args)]
struct PageArgs {
    /// Target audience (e.g. men, women, kids)
    #[arg(short, long)]
    audience: Option<String>,

    /// Catalog page number
    #[arg(short, long, default_value_t = 1)]
    page: u32,
}

#[derive(Subcommand)]
enum CartAction {
    /// List cart lines
    List,
    /// Add a product variant
    Add {
        /// Product ID
        #[arg(long)]
        product: i64,

        /// Variant ID (color/size combination)
        #[arg(long)]
        variant: Option<i64>,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Change the quantity of a cart line
    Qty {
        /// Cart line ID
        id: i64,
        /// New quantity
        quantity: u32,
    },
    /// Remove a cart line
    Remove {
        /// Cart line ID
        id: i64,
    },
    /// Remove every cart line
    Clear,
}

#[derive(Subcommand)]
enum WishlistAction {
    /// List wishlist entries
    List,
    /// Add or remove a variant
    Toggle {
        /// Variant ID
        variant: i64,
    },
    /// Remove an entry
    Remove {
        /// Wishlist entry ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List one page of orders
    List {
        /// Page number
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Change an order's status (staff only)
    Update {
        /// Order ID
        id: i64,

        /// New fulfilment status (`pending`, `processing`, `shipped`, `delivered`, `cancelled`)
        #[arg(long)]
        status: Option<OrderStatus>,

        /// New payment status
        #[arg(long)]
        payment_status: Option<PaymentStatus>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
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

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configuration is needed before Sentry; nothing is logged yet.
    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            commands::report(&format!("Failed to load configuration: {e}"));
            return ExitCode::from(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Logs go to stderr so command output stays pipeable.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pzafira_storefront=info,pzafira_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    match run(cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: &StorefrontConfig) -> Result<(), commands::CommandError> {
    let storefront = commands::open(config)?;
    let mut notices = storefront.notifier().subscribe();

    let result = match cli.command {
        Commands::Products {
            page,
            search,
            category,
            brand,
            min_price,
            max_price,
        } => {
            let query = commands::catalog::ProductQuery {
                audience: page.audience,
                page: page.page,
                search,
                category,
                brand,
                min_price,
                max_price,
            };
            commands::catalog::products(&storefront, query).await
        }
        Commands::Facets { page } => {
            commands::catalog::facets(&storefront, page.audience, page.page).await
        }
        Commands::Cart { action } => match action {
            CartAction::List => commands::cart::list(&storefront).await,
            CartAction::Add {
                product,
                variant,
                quantity,
            } => {
                commands::cart::add(
                    &storefront,
                    ProductId::new(product),
                    variant.map(VariantId::new),
                    quantity,
                )
                .await
            }
            CartAction::Qty { id, quantity } => {
                commands::cart::set_quantity(&storefront, CartItemId::new(id), quantity).await
            }
            CartAction::Remove { id } => commands::cart::remove(&storefront, CartItemId::new(id)).await,
            CartAction::Clear => commands::cart::clear(&storefront).await,
        },
        Commands::Wishlist { action } => match action {
            WishlistAction::List => commands::wishlist::list(&storefront).await,
            WishlistAction::Toggle { variant } => {
                commands::wishlist::toggle(&storefront, VariantId::new(variant)).await
            }
            WishlistAction::Remove { id } => {
                commands::wishlist::remove(&storefront, WishlistItemId::new(id)).await
            }
        },
        Commands::Orders { action } => match action {
            OrdersAction::List { page } => commands::orders::list(&storefront, page).await,
            OrdersAction::Update {
                id,
                status,
                payment_status,
            } => {
                commands::orders::update(&storefront, OrderId::new(id), status, payment_status).await
            }
        },
        Commands::Logout => {
            commands::logout(&storefront);
            Ok(())
        }
    };

    commands::print_notices(&mut notices);
    result
}
