mod cli;

use clap::Parser;
use color_eyre::Result;

use notes_sync::config::{Config, LogConfig};
use notes_sync::logging;
use notes_sync::notes::{Note, NoteStore};
use notes_sync::remote::{MemoryCollection, RestCollection};
use notes_sync::resource::ResourceClient;

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = cli::Args::parse();

  if args.memory {
    let _guard = logging::init(&LogConfig::default(), args.verbose)?;
    let store = NoteStore::from_remote(MemoryCollection::<Note>::new());
    return cli::execute(&store, args.command).await;
  }

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  // Override backend URL if specified on command line
  let config = if let Some(url) = args.url {
    let mut config = config;
    config.backend.url = url;
    config
  } else {
    config
  };

  let _guard = logging::init(&config.log, args.verbose)?;
  tracing::info!(url = %config.backend.url, "using backend");

  let client = ResourceClient::new(RestCollection::new(&config)?)
    .with_delete_policy(config.backend.delete_missing);
  let store = NoteStore::new(client);

  cli::execute(&store, args.command).await
}
