//! Aurelia CLI - database migrations and collection storage maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Create the collection document table
//! aurelia migrate
//!
//! # List every stored collection in the namespace
//! aurelia storage list
//!
//! # Show one user's cart
//! aurelia storage show --kind cart --user 3f0c...
//!
//! # Remove all guest wishlists
//! aurelia storage purge --kind wishlist --guest
//! ```
//!
//! Storage commands use the backend selected by `AURELIA_STORAGE_BACKEND`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{ArgGroup, Args, Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aurelia_core::{CollectionKind, Identity};
use aurelia_storefront::config::{CollectionsConfig, ConfigError};
use aurelia_storefront::maintenance::{IdentityFilter, PurgeFilter};

mod commands;

#[derive(Parser)]
#[command(name = "aurelia")]
#[command(author, version, about = "Aurelia CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Inspect and clean up stored carts and wishlists
    Storage {
        #[command(subcommand)]
        action: StorageAction,
    },
}

#[derive(Subcommand)]
enum StorageAction {
    /// List stored collections
    List {
        /// Only this kind (`cart` or `wishlist`)
        #[arg(short, long)]
        kind: Option<CollectionKind>,

        #[command(flatten)]
        owner: OwnerArgs,
    },
    /// Print the lines of one stored collection
    #[command(group(ArgGroup::new("owner").required(true).args(["guest", "user"])))]
    Show {
        /// Collection kind (`cart` or `wishlist`)
        #[arg(short, long)]
        kind: CollectionKind,

        /// The guest collection
        #[arg(long)]
        guest: bool,

        /// A signed-in user's collection
        #[arg(long, value_name = "ID")]
        user: Option<String>,
    },
    /// Delete stored collections
    #[command(group(ArgGroup::new("target").required(true).args(["guest", "user", "all"])))]
    Purge {
        /// Only this kind (`cart` or `wishlist`)
        #[arg(short, long)]
        kind: Option<CollectionKind>,

        /// Guest collections
        #[arg(long)]
        guest: bool,

        /// One user's collections
        #[arg(long, value_name = "ID")]
        user: Option<String>,

        /// Every collection in the namespace
        #[arg(long)]
        all: bool,
    },
}

/// Optional owner selection; neither flag means everyone.
#[derive(Args)]
struct OwnerArgs {
    /// Guest collections only
    #[arg(long, conflicts_with = "user")]
    guest: bool,

    /// One user's collections only
    #[arg(long, value_name = "ID")]
    user: Option<String>,
}

impl OwnerArgs {
    fn identity_filter(self) -> IdentityFilter {
        owner_filter(self.guest, self.user)
    }
}

fn owner_filter(guest: bool, user: Option<String>) -> IdentityFilter {
    match (guest, user) {
        (_, Some(user)) => IdentityFilter::User(user.into()),
        (true, None) => IdentityFilter::Guest,
        (false, None) => IdentityFilter::All,
    }
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CollectionsConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Map tracing levels to Sentry: warnings and errors become events, the rest
/// breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Migrations only need a database URL, so a bad storage config is not fatal yet.
    let config = CollectionsConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "aurelia_storefront=info,aurelia=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(
    cli: Cli,
    config: Result<CollectionsConfig, ConfigError>,
) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Storage { action } => {
            let config = config?;
            match action {
                StorageAction::List { kind, owner } => {
                    let filter = PurgeFilter {
                        kind,
                        identity: owner.identity_filter(),
                    };
                    commands::storage::list(&config, &filter).await?;
                }
                StorageAction::Show { kind, guest, user } => {
                    let identity = match (guest, user) {
                        (_, Some(user)) => Identity::user(user),
                        _ => Identity::Guest,
                    };
                    commands::storage::show(&config, kind, &identity).await?;
                }
                StorageAction::Purge {
                    kind,
                    guest,
                    user,
                    all,
                } => {
                    let identity = if all {
                        IdentityFilter::All
                    } else {
                        owner_filter(guest, user)
                    };
                    let filter = PurgeFilter { kind, identity };
                    commands::storage::purge(&config, &filter).await?;
                }
            }
        }
    }
    Ok(())
}
