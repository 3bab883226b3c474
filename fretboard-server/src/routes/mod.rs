//! The `/v1` endpoints, one router per area

pub mod bands;
pub mod billing;
pub mod covers;
pub mod discovery;
pub mod jams;
pub mod library;
pub mod practice;
pub mod profile;
pub mod push;
pub mod setlists;
pub mod social;
pub mod spotify;

use crate::Router;

/// Every endpoint except the auth ones, which are nested under `/auth`
pub fn router() -> Router {
    Router::new()
        .merge(profile::router())
        .merge(library::router())
        .merge(practice::router())
        .merge(covers::router())
        .merge(bands::router())
        .merge(setlists::router())
        .merge(jams::router())
        .merge(social::router())
        .merge(push::router())
        .merge(discovery::router())
        .merge(spotify::router())
        .merge(billing::router())
}
