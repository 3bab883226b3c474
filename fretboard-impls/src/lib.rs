//! Implementations of the fretboard providers over HTTP and the local filesystem.

mod audd;
mod http;
mod local_storage;
mod songsterr;
mod spotify;
mod stripe;
mod ultimate_guitar;
mod web_push_sender;

pub use audd::*;
pub use local_storage::*;
pub use songsterr::*;
pub use spotify::*;
pub use stripe::*;
pub use ultimate_guitar::*;
pub use web_push_sender::*;
