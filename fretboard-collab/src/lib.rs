mod access;
mod auth;
mod bands;
mod billing;
mod covers;
mod db;
mod discovery;
mod errors;
mod events;
mod jams;
mod library;
mod practice;
mod profiles;
mod push;
mod setlists;
mod social;
mod spotify;
mod util;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

use std::sync::Arc;

pub use access::*;
pub use auth::*;
pub use bands::*;
pub use billing::*;
pub use covers::*;
pub use db::*;
pub use discovery::*;
pub use errors::*;
pub use events::*;
pub use jams::*;
pub use library::*;
pub use practice::*;
pub use profiles::*;
pub use push::*;
pub use setlists::*;
pub use social::*;
pub use spotify::*;

use crossbeam::channel::unbounded;
use fretboard_core::{
    Config, MusicProvider, ObjectStorage, PaymentProvider, PushSender, Recognizer, TabSource,
};

/// The fretboard collab system, facilitating authentication, the song library, bands, jams, and more.
pub struct Collab {
    events: EventReceiver,

    pub auth: Auth,
    pub profiles: ProfileManager,
    pub library: LibraryManager,
    pub practice: PracticeManager,
    pub covers: CoverManager,
    pub bands: BandManager,
    pub setlists: SetlistManager,
    pub jams: JamManager,
    pub social: SocialManager,
    pub push: PushManager,
    pub billing: BillingManager,
    pub spotify: SpotifyManager,
    pub discovery: DiscoveryManager,
}

/// The third-party services the collab system talks to
#[derive(Clone)]
pub struct Providers {
    pub payments: Arc<dyn PaymentProvider>,
    pub music: Arc<dyn MusicProvider>,
    pub recognizer: Arc<dyn Recognizer>,
    /// Queried together when searching for tabs, results keep this order
    pub tab_sources: Vec<Arc<dyn TabSource>>,
    pub push: Arc<dyn PushSender>,
    pub storage: Arc<dyn ObjectStorage>,
}

/// A type passed to various components of the collab system, to access state and emit events.
#[derive(Clone)]
pub struct CollabContext {
    pub database: ArcedDatabase,
    pub providers: Providers,
    pub config: Arc<Config>,
    pub events: EventSender,
}

impl Collab {
    pub fn new<Db>(database: Db, providers: Providers, config: Config) -> Self
    where
        Db: Database + 'static,
    {
        Self::with_database(Arc::new(database), providers, config)
    }

    /// Creates the system over an already shared database
    pub fn with_database(database: ArcedDatabase, providers: Providers, config: Config) -> Self {
        let (sender, receiver) = unbounded();

        let context = CollabContext {
            database,
            providers,
            config: Arc::new(config),
            events: sender,
        };

        Self {
            events: receiver,

            auth: Auth::new(&context),
            profiles: ProfileManager::new(&context),
            library: LibraryManager::new(&context),
            practice: PracticeManager::new(&context),
            covers: CoverManager::new(&context),
            bands: BandManager::new(&context),
            setlists: SetlistManager::new(&context),
            jams: JamManager::new(&context),
            social: SocialManager::new(&context),
            push: PushManager::new(&context),
            billing: BillingManager::new(&context),
            spotify: SpotifyManager::new(&context),
            discovery: DiscoveryManager::new(&context),
        }
    }

    /// Returns a receiver of every event emitted from now on.
    /// Note: receivers share the channel, each event goes to one of them.
    pub fn events(&self) -> EventReceiver {
        self.events.clone()
    }
}

impl CollabContext {
    /// Emits an event, nobody listening is not an error
    pub(crate) fn emit(&self, event: CollabEvent) {
        let _ = self.events.send(event);
    }
}
