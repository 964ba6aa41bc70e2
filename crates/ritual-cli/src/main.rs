use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ritual-cli", version, about = "Ritual CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a focus countdown, printing events as JSON lines
    Focus(commands::focus::FocusArgs),
    /// Run the release ceremony against a simulated commit
    Release(commands::release::ReleaseArgs),
    /// Print a deterministic particle field
    Particles(commands::particles::ParticlesArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Focus(args) => commands::focus::run(args).await,
        Commands::Release(args) => commands::release::run(args).await,
        Commands::Particles(args) => commands::particles::run(args),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
