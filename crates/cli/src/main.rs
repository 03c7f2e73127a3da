use {
    clap::{Parser, Subcommand},
    tracing::warn,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use parlor_gateway::config::{self, GatewayConfig};

#[derive(Parser)]
#[command(name = "parlor", about = "Parlor — real-time group chat broker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true, env = "PARLOR_BIND")]
    bind: Option<String>,

    /// Port to listen on (overrides config value).
    #[arg(long, global = true, env = "PARLOR_PORT")]
    port: Option<u16>,

    /// Path to a config file (overrides discovery).
    #[arg(long, global = true, env = "PARLOR_CONFIG")]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat gateway (default when no subcommand is given).
    Serve,
    /// Check the effective configuration and report problems.
    Doctor,
}

fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => config::discover_and_load(),
    };
    if let Some(bind) = &cli.bind {
        config.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            config.validate()?;
            for warning in config.warnings() {
                warn!("{warning}");
            }
            parlor_gateway::server::run(config).await
        },
        Commands::Doctor => doctor(&config),
    }
}

fn doctor(config: &GatewayConfig) -> anyhow::Result<()> {
    println!("bind:            {}:{}", config.bind, config.port);
    println!("channels:        {}", config.channels.join(", "));
    println!("default channel: {}", config.default_channel);
    println!(
        "history:         retain {} / show {}",
        config.retention_cap, config.visible_window
    );

    for warning in config.warnings() {
        println!("warning: {warning}");
    }
    match config.validate() {
        Ok(()) => {
            println!("config ok");
            Ok(())
        },
        Err(e) => {
            println!("config error: {e}");
            Err(e)
        },
    }
}
