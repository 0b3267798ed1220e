//! dwgd binary: the daemon plus the `pubkey` helper subcommand.

use std::net::IpAddr;

use clap::{ArgAction, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dwgd::{Config, Dwgd};
use dwgd_wireguard::derive_private_key;

#[derive(Parser)]
#[command(name = "dwgd", version, about = "Docker WireGuard driver")]
struct Cli {
    /// Path to the state database; an empty value selects an in-memory store.
    #[arg(short = 'd', value_name = "PATH", default_value = "/var/lib/dwgd.db")]
    db: String,

    /// Enable trace logging to stderr.
    #[arg(short = 'v')]
    verbose: bool,

    /// Maintain plugin sockets for rootless engines.
    #[arg(short = 'r', value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
    rootless: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the public key derived from a seed and an IP.
    Pubkey {
        /// Seed to derive the key from.
        #[arg(short = 's', value_name = "SEED")]
        seed: Option<String>,

        /// IP to derive the key for.
        #[arg(short = 'i', value_name = "IP")]
        ip: Option<IpAddr>,
    },
}

fn pubkey(seed: Option<String>, ip: Option<IpAddr>) -> ! {
    let Some(seed) = seed else {
        eprintln!("seed is required");
        std::process::exit(1);
    };
    let Some(ip) = ip else {
        eprintln!("ip is required");
        std::process::exit(1);
    };

    let private_key = derive_private_key(seed.as_bytes(), ip);
    println!("{}", private_key.public_key());
    std::process::exit(0);
}

async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Pubkey { seed, ip }) = cli.command {
        pubkey(seed, ip);
    }

    let filter = if cli.verbose {
        EnvFilter::new("dwgd=trace,dwgd_storage=trace,dwgd_wireguard=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config {
        db: if cli.db.is_empty() {
            dwgd_storage::IN_MEMORY.to_string()
        } else {
            cli.db.clone()
        },
        verbose: cli.verbose,
        rootless: cli.rootless,
    };

    info!(db = %config.db, rootless = config.rootless, "starting dwgd");
    let mut dwgd = Dwgd::new(&config).await?;
    dwgd.start().await?;

    wait_for_signal().await;
    dwgd.stop().await;
    Ok(())
}
