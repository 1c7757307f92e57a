//! Flowmend CLI — command-line interface for the process-improvement
//! workflow.
//!
//! Reuses the same core domain logic (flowmend-core) and server bootstrap
//! (flowmend-server) that power embedded deployments.

mod commands;

use clap::{Parser, Subcommand};

/// Flowmend CLI — process analysis, improvement, and visualization
#[derive(Parser)]
#[command(
    name = "flowmend",
    version,
    about = "Flowmend CLI — process analysis, improvement, and visualization"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Flowmend HTTP backend server
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8620)]
        port: u16,
    },

    /// Run the improvement pipeline once for a query and print the result
    Ask {
        /// The process description or improvement question
        query: String,
        /// User id recorded on the session
        #[arg(long, default_value = "cli")]
        user_id: String,
    },

    /// Generate a BPMN diagram for a process description
    Visualize {
        /// The process description
        query: String,
        /// User id recorded on the session
        #[arg(long, default_value = "cli")]
        user_id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Server { host, port } => commands::server::run(host, port).await,
        Commands::Ask { query, user_id } => commands::query::run_ask(&query, &user_id).await,
        Commands::Visualize { query, user_id } => {
            commands::query::run_visualize(&query, &user_id).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
