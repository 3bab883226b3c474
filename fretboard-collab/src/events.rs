use crossbeam::channel::{Receiver, Sender};

use crate::{JamData, JamMessageData, JamParticipantData, PrimaryKey};

pub type EventSender = Sender<CollabEvent>;
pub type EventReceiver = Receiver<CollabEvent>;

/// Events emitted after a change to a jam was persisted
#[derive(Debug, Clone)]
pub enum CollabEvent {
    /// A jam was started
    JamStarted { jam: JamData },
    /// A user joined a jam for the first time
    ParticipantJoined {
        jam_id: PrimaryKey,
        participant: JamParticipantData,
    },
    ParticipantLeft {
        jam_id: PrimaryKey,
        user_id: PrimaryKey,
    },
    MessagePosted { message: JamMessageData },
    /// The host ended the jam, no more joins or messages are accepted
    JamEnded { jam_id: PrimaryKey },
}

impl CollabEvent {
    /// The jam the event belongs to
    pub fn jam_id(&self) -> PrimaryKey {
        match self {
            Self::JamStarted { jam } => jam.id,
            Self::ParticipantJoined { jam_id, .. } => *jam_id,
            Self::ParticipantLeft { jam_id, .. } => *jam_id,
            Self::MessagePosted { message } => message.jam_id,
            Self::JamEnded { jam_id } => *jam_id,
        }
    }
}
