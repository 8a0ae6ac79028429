mod commands;
mod config;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::GlobalConfig;

#[derive(Parser)]
#[command(name = "kansync")]
#[command(about = "Kanban calendars synced live through a remote document store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the signed-in user (identity comes from your auth system)
    Login {
        user_id: String,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Forget the signed-in user
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Create a calendar
    New {
        title: String,

        /// Background color
        #[arg(short, long, default_value = "#6a8caf")]
        background: String,
    },
    /// Show a calendar's rows and cards
    Show { calendar_id: String },
    /// Stream a calendar's changes until interrupted
    Watch { calendar_id: String },
    /// Rename a calendar
    Rename { calendar_id: String, title: String },
    /// Delete a calendar and everything in it
    Rm { calendar_id: String },
    /// Add a row to a calendar
    AddRow { calendar_id: String, title: String },
    /// Rename a row
    RenameRow { row_id: String, title: String },
    /// Delete a row and its cards
    RmRow { row_id: String },
    /// Add a card to a row
    AddCard { row_id: String, text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = GlobalConfig::load()?;

    match cli.command {
        Commands::Login { user_id, name } => commands::auth::login(config, user_id, name),
        Commands::Logout => commands::auth::logout(config),
        Commands::Whoami => commands::auth::whoami(&config),
        Commands::New { title, background } => {
            commands::new::run(&config, &title, &background).await
        }
        Commands::Show { calendar_id } => commands::show::run(&config, &calendar_id).await,
        Commands::Watch { calendar_id } => commands::watch::run(&config, &calendar_id).await,
        Commands::Rename { calendar_id, title } => {
            commands::calendar::rename(&config, &calendar_id, &title).await
        }
        Commands::Rm { calendar_id } => commands::calendar::rm(&config, &calendar_id).await,
        Commands::AddRow { calendar_id, title } => {
            commands::row::add(&config, &calendar_id, &title).await
        }
        Commands::RenameRow { row_id, title } => {
            commands::row::rename(&config, &row_id, &title).await
        }
        Commands::RmRow { row_id } => commands::row::rm(&config, &row_id).await,
        Commands::AddCard { row_id, text } => commands::card::add(&config, &row_id, &text).await,
    }
}
