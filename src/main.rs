use anyhow::Result;
use catalog_harvester::config::{
    self, Config, DEFAULT_ACCEPT_LANGUAGE, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
use catalog_harvester::pipeline::{self, RunSummary};
use catalog_harvester::HttpFetcher;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "catalog-harvester")]
#[command(about = "Harvests a product catalog into a CSV dataset and an image archive", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Site origin used to resolve relative links and image paths
    #[arg(long, global = true, default_value = config::BASE_URL)]
    base_url: String,

    /// Catalog listing page to harvest
    #[arg(long, global = true, default_value = config::CATALOG_URL)]
    catalog_url: String,

    /// Dataset CSV file (written by `products`, updated by `images`)
    #[arg(short, long, global = true, default_value = config::DATASET_FILE)]
    output: PathBuf,

    /// Directory images are saved into
    #[arg(long, global = true, default_value = config::IMAGE_DIR)]
    image_dir: PathBuf,

    /// Maximum number of product pages processed at once
    #[arg(short, long, global = true, default_value_t = config::MAX_WORKERS)]
    workers: usize,

    /// Also save every parsed product as JSON
    #[arg(long, global = true)]
    json: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(short, long, global = true, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Custom user agent
    #[arg(short, long, global = true, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Accept-Language header sent with every request
    #[arg(long, global = true, default_value = DEFAULT_ACCEPT_LANGUAGE)]
    accept_language: String,

    /// Proxy URL (e.g., http://proxy.example.com:8080)
    #[arg(short, long, global = true)]
    proxy: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Parse every catalog product and write the dataset
    Products,
    /// Download product images and fill the image column of an existing dataset
    Images,
    /// Run `products`, then `images`
    Run,
}

impl Args {
    fn to_config(&self) -> Result<Config> {
        let mut config = Config::new(&self.base_url, &self.catalog_url)?;
        config.dataset_path = self.output.clone();
        config.image_dir = self.image_dir.clone();
        config.workers = self.workers;
        config.json_dump = self.json.clone();
        config.http.user_agent = self.user_agent.clone();
        config.http.accept_language = self.accept_language.clone();
        config.http.timeout = Duration::from_secs(self.timeout);
        config.http.proxy = self.proxy.clone();
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    log::info!("🚀 Catalog Harvester v{}", env!("CARGO_PKG_VERSION"));

    let config = args.to_config()?;
    let fetcher = HttpFetcher::new(&config.http)?;

    let summary = match args.command {
        Command::Products => pipeline::run_products(&fetcher, &config).await?,
        Command::Images => pipeline::run_images(&fetcher, &config).await?,
        Command::Run => pipeline::run_all(&fetcher, &config).await?,
    };

    report(&summary, args.quiet);
    Ok(())
}

/// Prints the end-of-run summary
fn report(summary: &RunSummary, quiet: bool) {
    log::info!("✅ Discovered {} product(s)", summary.discovered);
    if quiet {
        return;
    }

    let mut output = format!("Products found: {}\n", summary.discovered);
    if summary.products > 0 {
        output.push_str(&format!("Products parsed: {}\n", summary.products));
    }
    if let Some(images) = &summary.images {
        output.push_str(&format!(
            "Images downloaded: {}/{}\n",
            images.downloaded, images.attempted
        ));
    }
    if let Some(reconcile) = &summary.reconcile {
        output.push_str(&format!("Dataset rows updated: {}\n", reconcile.rows_updated));
        if !reconcile.unmatched.is_empty() {
            output.push_str(&format!("\nNot found in dataset ({}):\n", reconcile.unmatched.len()));
            for title in &reconcile.unmatched {
                output.push_str(&format!("  - {}\n", title));
            }
        }
    }
    print!("{}", output);
}
