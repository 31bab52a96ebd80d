mod serve;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use camber_core::JobStatus;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Camber workshop job lifecycle service.
#[derive(Parser)]
#[command(name = "camber", version, about = "Camber workshop job lifecycle service")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Camber HTTP API server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
    },

    /// Print the lifecycle states and their legal transitions
    States,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            if let Err(e) = serve::start_server(port).await {
                eprintln!("error: {e}");
                process::exit(1);
            }
        }
        Commands::States => print_states(cli.output),
    }
}

/// Print the transition table, terminal states last.
fn print_states(output: OutputFormat) {
    match output {
        OutputFormat::Text => {
            for status in JobStatus::ALL {
                let targets = status.allowed_targets();
                if targets.is_empty() {
                    println!("{status} (terminal)");
                } else {
                    let joined = targets
                        .iter()
                        .map(|t| t.as_str())
                        .collect::<Vec<_>>()
                        .join(", ");
                    println!("{status} -> {joined}");
                }
            }
        }
        OutputFormat::Json => {
            let table: serde_json::Map<String, serde_json::Value> = JobStatus::ALL
                .into_iter()
                .map(|status| {
                    (
                        status.as_str().to_string(),
                        serde_json::json!(status.allowed_targets()),
                    )
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::Value::Object(table))
                    .expect("table serializes")
            );
        }
    }
}
