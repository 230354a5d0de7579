use clap::Parser;
use color_eyre::eyre::{Result, bail};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use philcache::infrastructure::{AppConfig, CliArgs, Command, ImageCache, StorageManager};
use philcache::CacheKey;

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let storage = StorageManager::from_override(args.config.clone())?;
    let mut config = storage.load_config()?;
    config.merge_with_args(args);
    config.validate()?;
    Ok(config)
}

async fn run(cache: &ImageCache, command: Command) -> Result<()> {
    match command {
        Command::Fetch { urls } => {
            let mut failed = 0usize;
            for url in urls {
                match cache.fetch(&url).await {
                    Some(loaded) => println!(
                        "{}\t{}x{}\t{}\t{}",
                        loaded.source,
                        loaded.width(),
                        loaded.height(),
                        loaded.key,
                        url
                    ),
                    None => {
                        failed += 1;
                        println!("unavailable\t-\t{}\t{url}", CacheKey::from_locator(&url));
                    }
                }
            }
            println!("memory\t{}", cache.memory_stats());
            if failed > 0 {
                bail!("{failed} image(s) could not be fetched");
            }
        }
        Command::Prefetch { urls } => {
            let requested = urls.len();
            cache.prefetch(urls.clone()).await?;
            let warmed = urls
                .iter()
                .filter(|url| cache.peek_memory(url).is_some())
                .count();
            println!("warmed {warmed}/{requested}");
            println!("memory\t{}", cache.memory_stats());
        }
        Command::Lookup { url } => match cache.lookup(&url) {
            Some(loaded) => println!(
                "{}\t{}x{}\t{}",
                loaded.source,
                loaded.width(),
                loaded.height(),
                loaded.key
            ),
            None => bail!("not cached: {url}"),
        },
        Command::Key { url } => println!("{}", CacheKey::from_locator(&url)),
        Command::Usage => println!("{}", cache.usage_report()),
        Command::List => {
            for entry in cache.disk_entries() {
                let modified = chrono::DateTime::<chrono::Local>::from(entry.modified);
                println!(
                    "{}\t{}\t{}",
                    modified.format("%Y-%m-%d %H:%M:%S"),
                    entry.size,
                    entry.key
                );
            }
        }
        Command::Clear => {
            cache.clear().await?;
            println!("cleared {}", cache.cache_dir().display());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args)?;

    init_logging(&config)?;

    info!(version = philcache::VERSION, "Starting philcache");

    let cache = ImageCache::with_http(&config.image_cache_config())?;

    // Pending disk writes run on the blocking pool; runtime shutdown waits for them.
    run(&cache, args.command).await
}
