//! Vitrine CLI - Database migrations and store management.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! vitrine migrate
//!
//! # Promote an existing account to admin
//! vitrine admin promote -e ana@example.com
//!
//! # Create a verified admin account
//! vitrine admin create -e ana@example.com -n Ana -p 'a long password'
//!
//! # Load the catalog, replacing what is there
//! vitrine seed products --file catalog.yaml --clear
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "vitrine")]
#[command(author, version, about = "Vitrine CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage administrators
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Give an existing account the admin role
    Promote {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Create a new, already verified admin account
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name (2-20 characters)
        #[arg(short, long)]
        name: String,

        /// Admin password (at least 6 characters)
        #[arg(short, long)]
        password: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Load products from a YAML catalog
    Products {
        /// Path to the catalog file
        #[arg(short, long)]
        file: String,

        /// Delete the existing catalog first
        #[arg(long)]
        clear: bool,
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

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Admin { action } => match action {
            AdminAction::Promote { email } => commands::admin::promote(&email).await,
            AdminAction::Create {
                email,
                name,
                password,
            } => commands::admin::create(&email, &name, &password).await,
        },
        Commands::Seed { target } => match target {
            SeedTarget::Products { file, clear } => commands::seed::products(&file, clear).await,
        },
    }
}
