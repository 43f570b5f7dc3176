//! Cartwright CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! cw-cli migrate
//!
//! # Create an admin account
//! cw-cli user create -e owner@shop.test -n "Shop Owner" -p 'long-password' -r admin
//!
//! # Deactivate a customer
//! cw-cli user deactivate -e pat@shop.test -r customer
//!
//! # Load a catalog
//! cw-cli seed products catalog.yaml --owner owner@shop.test
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "cw-cli")]
#[command(author, version, about = "Cartwright CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Manage accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new account
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Password (at least 6 characters)
        #[arg(short, long)]
        password: String,

        /// Role (`customer` or `admin`)
        #[arg(short, long, default_value = "customer")]
        role: String,
    },
    /// Allow an account to sign in and check out again
    Activate {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, default_value = "customer")]
        role: String,
    },
    /// Block an account from signing in and checking out
    Deactivate {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, default_value = "customer")]
        role: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Load products from a YAML file
    Products {
        /// Path to the YAML file
        file: String,

        /// Email of the admin account that will own the products
        #[arg(long)]
        owner: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                name,
                password,
                role,
            } => {
                commands::user::create(&email, &name, &password, &role).await?;
            }
            UserAction::Activate { email, role } => {
                commands::user::set_active(&email, &role, true).await?;
            }
            UserAction::Deactivate { email, role } => {
                commands::user::set_active(&email, &role, false).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Products { file, owner } => {
                commands::seed::products(&file, &owner).await?;
            }
        },
    }
    Ok(())
}
