//! Krishi CLI — run the farmer-advisory flows from a terminal.
//!
//! Uses the same flow registry and executor (krishi-core) and server
//! bootstrap (krishi-server) as the HTTP backend.

use clap::{Parser, Subcommand};

use krishi_cli::commands;

/// Krishi CLI — typed AI advisory flows for farmers
#[derive(Parser)]
#[command(name = "krishi", version, about = "Krishi CLI — typed AI advisory flows for farmers")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Krishi HTTP backend server
    Server {
        /// Host to bind to
        #[arg(long, env = "KRISHI_HOST", default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, env = "KRISHI_PORT", default_value_t = 3310)]
        port: u16,
        /// Directory of extra flow definitions
        #[arg(long, env = "KRISHI_FLOWS_DIR")]
        flows_dir: Option<String>,
        /// Model settings YAML (defaults to KRISHI_MODEL_* variables)
        #[arg(long, env = "KRISHI_MODEL_CONFIG")]
        model_config: Option<String>,
    },

    /// Inspect and run advisory flows
    Flows {
        #[command(subcommand)]
        action: FlowsAction,
    },
}

#[derive(Subcommand)]
enum FlowsAction {
    /// List registered flows
    List {
        #[arg(long, env = "KRISHI_FLOWS_DIR")]
        flows_dir: Option<String>,
    },

    /// Show a flow's schemas and prompt
    Show {
        /// Flow name, e.g. predictYield
        name: String,
        #[arg(long, env = "KRISHI_FLOWS_DIR")]
        flows_dir: Option<String>,
    },

    /// Check a flow definition file
    Validate {
        /// Path to the flow YAML
        file: String,
    },

    /// Run a flow and print its JSON output
    Run {
        /// Flow name, e.g. predictYield
        name: String,
        /// Input as a JSON object
        #[arg(long, conflicts_with = "input_file")]
        input: Option<String>,
        /// Read the input JSON from a file
        #[arg(long)]
        input_file: Option<String>,
        /// Attach a file to a media field: --media photoDataUri=leaf.jpg
        #[arg(long)]
        media: Vec<String>,
        /// Print the rendered request instead of calling the model
        #[arg(long)]
        dry_run: bool,
        #[arg(long, env = "KRISHI_FLOWS_DIR")]
        flows_dir: Option<String>,
        #[arg(long, env = "KRISHI_MODEL_CONFIG")]
        model_config: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "krishi_core=warn,krishi_server=info,krishi_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Server {
            host,
            port,
            flows_dir,
            model_config,
        } => commands::server::run(host, port, flows_dir, model_config).await,

        Commands::Flows { action } => match action {
            FlowsAction::List { flows_dir } => commands::flows::list(flows_dir.as_deref()),
            FlowsAction::Show { name, flows_dir } => {
                commands::flows::show(&name, flows_dir.as_deref())
            }
            FlowsAction::Validate { file } => commands::flows::validate(&file),
            FlowsAction::Run {
                name,
                input,
                input_file,
                media,
                dry_run,
                flows_dir,
                model_config,
            } => {
                commands::flows::run(commands::flows::RunArgs {
                    name: &name,
                    input: input.as_deref(),
                    input_file: input_file.as_deref(),
                    media: &media,
                    dry_run,
                    flows_dir: flows_dir.as_deref(),
                    model_config: model_config.as_deref(),
                })
                .await
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
