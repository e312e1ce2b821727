use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use confsync::Configurator;
use confsync::EtcdClient;
use confsync::Result;
use confsync::Settings;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Keep a key-value namespace in step with local configuration
#[derive(Debug, Parser)]
#[command(name = "confsync", version)]
struct Cli {
    /// Settings file, layered over `config/confsync` and `CONFSYNC_CONFIG`
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Push a local config file or directory into the namespace
    Sync { path: PathBuf },
    /// Print change events of the namespace until interrupted
    Watch,
    /// Print the value of a fully-qualified key
    Get {
        key: String,
        #[arg(short, long, default_value = "")]
        default: String,
    },
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_observability();

    let settings = Settings::load(cli.config.as_deref())?;
    let configurator = Configurator::<EtcdClient>::connect(&settings).await?;

    match cli.command {
        Command::Sync { path } => {
            let report = configurator.sync(&path).await?;
            for key in &report.puts {
                println!("put    {}", key);
            }
            for key in &report.deletes {
                println!("delete {}", key);
            }
            if report.is_noop() {
                println!("{} already up to date", configurator.namespace());
            }
        }
        Command::Get { key, default } => {
            println!("{}", configurator.get(&key, &default).await?);
        }
        Command::Watch => watch_namespace(&configurator).await?,
    }

    Ok(())
}

async fn watch_namespace(configurator: &Configurator<EtcdClient>) -> Result<()> {
    let (graceful_tx, mut graceful_rx) = watch::channel(());
    tokio::spawn(async move {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    configurator.listen(tx).await?;
    info!("Watching {}. Waiting for CTRL+C signal...", configurator.namespace());

    loop {
        tokio::select! {
            _ = graceful_rx.changed() => break,
            _ = configurator.stopped() => {
                error!("Watch loop on {} ended", configurator.namespace());
                break;
            }
            event = rx.recv() => match event {
                Some(event) => println!("{:?}", event),
                None => break,
            },
        }
    }

    configurator.close().await?;
    println!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    if graceful_tx.send(()).is_err() {
        error!("Failed to send shutdown signal: receiver dropped");
    }
    Ok(())
}

fn init_observability() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
