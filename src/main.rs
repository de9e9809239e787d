use clap::{Parser, Subcommand};
use color_eyre::Result;
use reqcache::{CachedRequest, Config, EnvToken, FetchOptions, RequestOptions, ReqwestFetch};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "reqcache")]
#[command(about = "Cached, paginated requests against a JSON HTTP API")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/reqcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch a single resource
  Get {
    path: String,
    /// Ignore any cached copy
    #[arg(long)]
    skip_cache: bool,
    /// Maximum age of a cached copy, in milliseconds
    #[arg(long)]
    max_age_ms: Option<u64>,
    /// Fail instead of falling back to a stale copy
    #[arg(long)]
    throw: bool,
  },
  /// Fetch every page of a paginated resource
  Pages {
    path: String,
    #[arg(long)]
    skip_cache: bool,
  },
  /// Mark everything cached under a path as stale
  Expire { path: String },
  /// Remove every cached response
  Clear,
  /// Fetch a diff as text (not cached)
  Diff { url: String },
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  match log_file {
    Some(path) => {
      let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
      let (writer, guard) = tracing_appender::non_blocking(file);
      tracing_subscriber::registry()
        .with(filter)
        .with(
          tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false),
        )
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
      Ok(None)
    }
  }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_logging(args.log_file.as_ref())?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  let client = CachedRequest::new(config, Arc::new(ReqwestFetch::new()?), Arc::new(EnvToken))?;
  let _auth_watch = client.on_auth_failure(|| {
    warn!("API token was rejected; check REQCACHE_TOKEN or GITHUB_TOKEN");
  });

  match args.command {
    Command::Get {
      path,
      skip_cache,
      max_age_ms,
      throw,
    } => {
      let options = RequestOptions {
        skip_cache,
        max_age_ms,
        should_throw: throw,
      };
      let result = client
        .request(&path, &FetchOptions::get(), &options)
        .await?;
      print_json(&result.map(|r| r.data))?;
    }
    Command::Pages { path, skip_cache } => {
      let options = RequestOptions {
        skip_cache,
        ..RequestOptions::default()
      };
      let items = client.paginated_request(&path, &options).await?;
      print_json(&items)?;
    }
    Command::Expire { path } => {
      let expired = client.expire_path(&path).await?;
      print_json(&expired)?;
    }
    Command::Clear => client.clear().await?,
    Command::Diff { url } => {
      print!("{}", client.request_diff(&url).await?);
    }
  }

  client.flush_writes().await;
  Ok(())
}
