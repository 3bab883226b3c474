use std::sync::Arc;

use colored::Colorize;
use fretboard_collab::{Collab, DatabaseError, PgDatabase, Providers};
use fretboard_core::{Config, ConfigError, TabSource};
use fretboard_impls::{
    AuddRecognizer, LocalStorage, SongsterrSource, SpotifyMusic, StripePayments,
    UltimateGuitarSource, VapidPushSender,
};
use fretboard_server::ServerContext;
use log::{error, info};
use thiserror::Error;
use tokio::runtime::{self, Runtime};

mod logging;

#[derive(Debug, Error)]
enum FretboardError {
    #[error("Could not read configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Server stopped: {0}")]
    Server(std::io::Error),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl FretboardError {
    fn hint(&self) -> String {
        match self {
            FretboardError::Config(_) => "Set the missing variable in the environment or in your service definition, then try again.".to_string(),
            FretboardError::Database(_) => "This is a database error. Make sure PostgreSQL is running and that DATABASE_URL points to it, then try again.".to_string(),
            FretboardError::Server(_) => "Make sure the port isn't used by another process.".to_string(),
            FretboardError::Fatal(_) => "This error is fatal, and should not happen.".to_string(),
        }
    }
}

struct Fretboard {
    context: ServerContext,
    runtime: Runtime,
}

impl Fretboard {
    fn new() -> Result<Self, FretboardError> {
        let config = Config::from_env()?;

        info!("Building async runtime...");
        let runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("fretboard-async")
            .build()
            .map_err(|e| FretboardError::Fatal(e.to_string()))?;

        info!("Connecting to database...");
        let database = runtime.block_on(async {
            let database =
                PgDatabase::new(&config.database.url, config.database.max_connections).await?;
            database.migrate().await?;

            Ok::<_, DatabaseError>(database)
        })?;

        let collab = Collab::new(database, providers(&config), config.clone());

        Ok(Self {
            context: ServerContext::new(collab, config),
            runtime,
        })
    }

    fn run(self) -> Result<(), FretboardError> {
        self.runtime
            .block_on(fretboard_server::run_server(self.context))
            .map_err(FretboardError::Server)
    }
}

fn providers(config: &Config) -> Providers {
    let tab_sources: Vec<Arc<dyn TabSource>> = vec![
        Arc::new(SongsterrSource::new()),
        Arc::new(UltimateGuitarSource::new()),
    ];

    Providers {
        payments: Arc::new(StripePayments::new(&config.stripe.secret_key)),
        music: Arc::new(SpotifyMusic::new(config.spotify.clone())),
        recognizer: Arc::new(AuddRecognizer::new(&config.audd.api_token)),
        tab_sources,
        push: Arc::new(VapidPushSender::new(config.vapid.clone())),
        storage: Arc::new(LocalStorage::new(&config.storage)),
    }
}

fn main() {
    if let Err(error) = logging::init_logger() {
        eprintln!("Could not initialize logging: {}", error);
        return;
    }

    let result = Fretboard::new().and_then(|fretboard| {
        info!("Initialized successfully.");
        fretboard.run()
    });

    if let Err(error) = result {
        error!(
            "{} Read the error below to troubleshoot the issue.",
            "fretboard failed to start!".bold().red()
        );
        error!("{}", error);
        error!("{}", format!("Hint: {}", error.hint()).dimmed().italic());
    }
}
