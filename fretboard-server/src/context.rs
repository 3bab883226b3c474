use std::sync::Arc;

use fretboard_collab::Collab;
use fretboard_core::Config;

use crate::sse::ServerSentEvents;

#[derive(Clone)]
pub struct ServerContext {
    pub collab: Arc<Collab>,
    pub sse: Arc<ServerSentEvents>,
    pub config: Arc<Config>,
}

impl ServerContext {
    pub fn new(collab: Collab, config: Config) -> Self {
        Self {
            collab: Arc::new(collab),
            sse: ServerSentEvents::new(),
            config: Arc::new(config),
        }
    }
}
