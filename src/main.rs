mod cli;

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use campusdb::{DurabilityMode, EnrollmentPolicy, StoreConfig};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::App;

#[derive(Parser)]
#[command(name = "campusdb")]
#[command(about = "Student, college and course registry over a transactional store")]
struct Cli {
    /// Command script to run; standard input when omitted
    script: Option<PathBuf>,

    /// Store location as a URL, e.g. `campusdb:///var/lib/campus?durability=sync`
    #[arg(long, default_value = "campusdb://memory")]
    url: String,

    /// Persist to this directory (overrides the URL location)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[arg(long)]
    durability: Option<DurabilityMode>,

    /// Committed transactions between automatic snapshots
    #[arg(long)]
    checkpoint: Option<usize>,

    /// `advisory` warns when enrolling outside the chosen college, `strict` refuses
    #[arg(long)]
    policy: Option<EnrollmentPolicy>,

    /// Print each command before its output
    #[arg(long)]
    echo: bool,
}

impl Cli {
    fn store_config(&self) -> Result<StoreConfig> {
        let mut config = StoreConfig::from_url(&self.url).map_err(|e| anyhow!(e))?;
        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
            if config.durability == DurabilityMode::None {
                config.durability = DurabilityMode::Async;
            }
        }
        if let Some(mode) = self.durability {
            config = config.durability(mode);
        }
        if let Some(threshold) = self.checkpoint {
            config = config.checkpoint_threshold(threshold);
        }
        if let Some(policy) = self.policy {
            config = config.enrollment_policy(policy);
        }
        config.validate().map_err(|e| anyhow!(e))?;
        Ok(config)
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("campusdb=error")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.store_config()?;
    info!(url = %config.to_url(), "opening store");

    let session = campusdb::open_session(&config)
        .await
        .context("failed to open store")?;
    let mut app = App::new(session, cli.echo);

    let mut stdout = io::stdout().lock();
    match &cli.script {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open script {}", path.display()))?;
            app.run(BufReader::new(file), &mut stdout).await?;
        }
        None => app.run(io::stdin().lock(), &mut stdout).await?,
    }

    app.finish().await.context("failed to close session")?;
    Ok(())
}
