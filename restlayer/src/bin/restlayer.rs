//! restlayer server
//!
//! Serves the REST routes for the models declared in a JSON file.
//!
//! ```text
//! restlayer --models models.json --bind 0.0.0.0:3000 --base-path /api --envelope
//! RUST_LOG=restlayer=debug,tower_http=debug restlayer --models models.json
//! ```

use clap::{Parser, ValueEnum};
use std::{path::PathBuf, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use restlayer::{
    RestOptions, backend::StoreBackendBuilder, config::load_registry, memory::InMemoryStore, router,
    store::DocumentStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Memory,
    Mongodb,
}

/// REST server over a JSON document store.
#[derive(Parser)]
#[command(name = "restlayer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: String,

    /// Storage backend
    #[arg(long, value_enum, default_value_t = Backend::Memory)]
    backend: Backend,

    /// MongoDB connection string
    #[arg(long, default_value = "mongodb://localhost:27017")]
    mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, default_value = "restlayer")]
    database: String,

    /// JSON file with the model declarations
    #[arg(long)]
    models: PathBuf,

    /// Prefix to mount the routes under, e.g. `/api`
    #[arg(long)]
    base_path: Option<String>,

    /// Envelope responses by default
    #[arg(long)]
    envelope: bool,

    /// Upper bound for `limit` on list requests
    #[arg(long)]
    max_limit: Option<usize>,

    /// Store timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

async fn open_store(cli: &Cli, registry: restlayer::model::ModelRegistry) -> Result<DocumentStore, Box<dyn std::error::Error>> {
    let store = match cli.backend {
        Backend::Memory => DocumentStore::new(InMemoryStore::builder().build().await?, registry)?,
        #[cfg(feature = "mongodb")]
        Backend::Mongodb => {
            let backend = restlayer::mongodb::MongoDbStore::builder(&cli.mongodb_uri, &cli.database)
                .build()
                .await?;
            DocumentStore::new(backend, registry)?
        }
        #[cfg(not(feature = "mongodb"))]
        Backend::Mongodb => {
            return Err(format!(
                "cannot connect to {} (database {}): built without the `mongodb` feature",
                cli.mongodb_uri, cli.database
            )
            .into());
        }
    };

    Ok(store)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let registry = load_registry(&std::fs::read_to_string(&cli.models)?)?;
    info!(
        models = ?registry.names().collect::<Vec<_>>(),
        path = %cli.models.display(),
        "loaded models"
    );
    if registry.is_empty() {
        warn!(path = %cli.models.display(), "no models declared, every collection will be unknown");
    }

    let store = open_store(&cli, registry).await?;

    let mut options = RestOptions::new().envelope(cli.envelope);
    if let Some(max_limit) = cli.max_limit {
        options = options.max_limit(max_limit);
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        options = options.timeout(Duration::from_millis(timeout_ms));
    }

    let base_path = cli
        .base_path
        .as_deref()
        .map(|base| base.trim_matches('/'))
        .filter(|base| !base.is_empty());

    let routes = router(store.clone(), options);
    let app = match base_path {
        Some(base) => axum::Router::new().nest(&format!("/{base}"), routes),
        None => routes,
    };

    let listener = tokio::net::TcpListener::bind(&cli.bind).await?;
    info!(address = %listener.local_addr()?, backend = ?cli.backend, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.shutdown().await?;
    info!("stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }

    info!("shutting down");
}
