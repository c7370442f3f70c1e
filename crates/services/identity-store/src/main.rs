//! Identity Store - schema and migration tooling for the identity tables.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use identity_store::{MigrateAction, SchemaAction};

#[derive(Parser)]
#[command(name = "identity-store")]
#[command(about = "Identity persistence tooling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the compiled mapping as JSON
    Mapping,
    /// Create or drop the identity tables
    Schema {
        #[command(subcommand)]
        action: SchemaCommands,
        /// Print the DDL instead of executing it
        #[arg(long)]
        script: bool,
    },
    /// Database migration commands
    Migrate {
        #[command(subcommand)]
        action: MigrateCommands,
    },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Create every table and index
    Create,
    /// Drop every table
    Drop,
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Run pending migrations
    Up,
    /// Rollback last migration
    Down,
    /// Show migration status
    Status,
    /// Reset database and run all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Mapping => {
            identity_store::print_mapping()?;
        }
        Commands::Schema { action, script } => {
            let schema_action = match action {
                SchemaCommands::Create => SchemaAction::Create,
                SchemaCommands::Drop => SchemaAction::Drop,
            };
            identity_store::run_schema(schema_action, script).await?;
        }
        Commands::Migrate { action } => {
            let migrate_action = match action {
                MigrateCommands::Up => MigrateAction::Up,
                MigrateCommands::Down => MigrateAction::Down,
                MigrateCommands::Status => MigrateAction::Status,
                MigrateCommands::Fresh => MigrateAction::Fresh,
            };
            identity_store::run_migrations(migrate_action).await?;
        }
    }

    Ok(())
}
