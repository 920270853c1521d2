//! flipbook -- photo upload console for a Cognito-protected bucket.
//!
//! Reads one command per line from stdin.  Every command is dispatched on
//! its own task, so a slow upload never blocks the prompt.

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use flipbook::ui::{Action, App, TerminalView, View};

/// Command-line arguments for the flipbook console.
#[derive(Parser, Debug)]
#[command(
    name = "flipbook",
    version,
    about = "Upload photos to S3 with Cognito credentials and order an animation"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "flipbook.example.yaml")]
    config: String,

    /// Override the session file path.
    #[arg(short, long)]
    session: Option<String>,

    /// Use in-memory identity, credential and storage services.
    #[arg(long)]
    offline: bool,
}

fn init_tracing(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = flipbook::config::load_config(&cli.config)?;
    if let Some(session) = cli.session {
        config.session.path = session;
    }

    init_tracing(&config.logging.level, &config.logging.format);
    info!("Loaded configuration from {}", cli.config);

    flipbook::metrics::describe_metrics();

    let view: Arc<dyn View> = Arc::new(TerminalView::new());
    let app = if cli.offline {
        App::offline(&config, view.clone())?
    } else {
        App::from_config(&config, view.clone()).await?
    };
    let app = Arc::new(app);

    app.start().await;
    view.notify("type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Action::parse(&line) {
            Ok(None) => {}
            Ok(Some(Action::Quit)) => break,
            Ok(Some(action)) => {
                tokio::spawn(app.clone().dispatch(action));
            }
            Err(e) => {
                warn!("{}", e);
                view.notify(&e.to_string());
            }
        }
    }

    info!("Bye");
    Ok(())
}
