use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
};
use fretboard_collab::{CollabEvent, EventReceiver, PrimaryKey};
use futures_util::Stream;
use log::{error, info};
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    collections::VecDeque,
    convert::Infallible,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    task::{Context, Poll, Waker},
};
use tokio::task::spawn_blocking;
use utoipa::ToSchema;

use crate::{
    auth::Session,
    errors::{ErrorBody, ServerError, ServerResult},
    serialized::{Jam, JamMessage, JamParticipant, ToSerialized},
    ServerContext,
};

type ConnectionId = u64;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum ServerEvent {
    /// A jam was started
    JamStarted { jam_id: i32, jam: Jam },
    /// A user joined the jam for the first time
    ParticipantJoined {
        jam_id: i32,
        participant: JamParticipant,
    },
    /// A user left the jam
    ParticipantLeft { jam_id: i32, user_id: i32 },
    /// A chat message was posted in the jam
    MessagePosted { jam_id: i32, message: JamMessage },
    /// The host ended the jam
    JamEnded { jam_id: i32 },
}

impl From<CollabEvent> for ServerEvent {
    fn from(value: CollabEvent) -> Self {
        match value {
            CollabEvent::JamStarted { jam } => Self::JamStarted {
                jam_id: jam.id,
                jam: jam.to_serialized(),
            },
            CollabEvent::ParticipantJoined {
                jam_id,
                participant,
            } => Self::ParticipantJoined {
                jam_id,
                participant: participant.to_serialized(),
            },
            CollabEvent::ParticipantLeft { jam_id, user_id } => {
                Self::ParticipantLeft { jam_id, user_id }
            }
            CollabEvent::MessagePosted { message } => Self::MessagePosted {
                jam_id: message.jam_id,
                message: message.to_serialized(),
            },
            CollabEvent::JamEnded { jam_id } => Self::JamEnded { jam_id },
        }
    }
}

impl ServerEvent {
    pub fn jam_id(&self) -> PrimaryKey {
        match self {
            Self::JamStarted { jam_id, .. }
            | Self::ParticipantJoined { jam_id, .. }
            | Self::ParticipantLeft { jam_id, .. }
            | Self::MessagePosted { jam_id, .. }
            | Self::JamEnded { jam_id } => *jam_id,
        }
    }
}

/// Manages server sent event connections, each one listening to a single jam
pub struct ServerSentEvents {
    me: Weak<Self>,
    next_id: AtomicU64,
    connections: Mutex<Vec<Connection>>,
}

struct Connection {
    id: ConnectionId,
    jam_id: PrimaryKey,
    pending_messages: Arc<Mutex<VecDeque<ServerEvent>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

pub struct ConnectionHandle {
    id: ConnectionId,
    /// A reference to [Connection]'s pending messages
    pending_messages: Arc<Mutex<VecDeque<ServerEvent>>>,
    /// A reference to [Connection]'s stored [Waker]
    waker: Arc<Mutex<Option<Waker>>>,
    /// Required to remove connection when dropped
    manager: Weak<ServerSentEvents>,
}

impl ServerSentEvents {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            next_id: AtomicU64::new(0),
            connections: Default::default(),
        })
    }

    /// Sends the event to every connection listening to its jam
    pub fn broadcast(&self, event: ServerEvent) {
        let jam_id = event.jam_id();
        let connections = self.connections.lock();

        for connection in connections.iter().filter(|c| c.jam_id == jam_id) {
            connection.send(event.clone())
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    fn connect(&self, jam_id: PrimaryKey) -> ConnectionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let connection = Connection::new(id, jam_id);
        let handle = connection.handle(self.me.clone());

        self.connections.lock().push(connection);
        handle
    }

    fn disconnect(&self, id: ConnectionId) {
        self.connections.lock().retain(|c| c.id != id)
    }
}

impl Connection {
    fn new(id: ConnectionId, jam_id: PrimaryKey) -> Self {
        Self {
            id,
            jam_id,
            pending_messages: Default::default(),
            waker: Default::default(),
        }
    }

    fn send(&self, message: ServerEvent) {
        self.pending_messages.lock().push_back(message);

        if let Some(waker) = self.waker.lock().take() {
            waker.wake()
        }
    }

    fn handle(&self, manager: Weak<ServerSentEvents>) -> ConnectionHandle {
        ConnectionHandle {
            id: self.id,
            pending_messages: self.pending_messages.clone(),
            waker: self.waker.clone(),
            manager,
        }
    }
}

impl Stream for ConnectionHandle {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut pending_messages = self.pending_messages.lock();

        while let Some(message) = pending_messages.pop_front() {
            match Event::default().json_data(&message) {
                Ok(event) => return Poll::Ready(Some(Ok(event))),
                Err(e) => error!("Failed to serialize event: {}", e),
            }
        }

        // Registered while the queue is locked, so a send can't slip in between
        *self.waker.lock() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.disconnect(self.id)
        }
    }
}

/// Forwards every collab event to the listening connections, until the collab system is gone
pub async fn relay_events(sse: Arc<ServerSentEvents>, receiver: EventReceiver) {
    loop {
        let receiver = receiver.clone();

        match spawn_blocking(move || receiver.recv()).await {
            Ok(Ok(event)) => sse.broadcast(event.into()),
            Ok(Err(_)) => break,
            Err(e) => {
                error!("Event relay stopped: {}", e);
                break;
            }
        }
    }

    info!("No more jam events will be relayed");
}

#[utoipa::path(
    get,
    path = "/v1/jams/{id}/events",
    tag = "jams",
    params(
        ("id" = i32, Path, description = "The jam to listen to")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of events from the jam",
            body = ServerEvent
        ),
        (status = 403, body = ErrorBody, description = "The jam is restricted to a band the user isn't in"),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn jam_events(
    State(context): State<ServerContext>,
    session: Session,
    Path(jam_id): Path<PrimaryKey>,
) -> ServerResult<Sse<ConnectionHandle>> {
    if !context.collab.jams.can_view(session.user.id, jam_id).await? {
        return Err(ServerError::Forbidden);
    }

    Ok(Sse::new(context.sse.connect(jam_id)).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    #[tokio::test]
    async fn only_delivers_events_of_the_jam() {
        let sse = ServerSentEvents::new();
        let mut first = sse.connect(1);
        let mut second = sse.connect(2);

        sse.broadcast(ServerEvent::JamEnded { jam_id: 2 });
        sse.broadcast(ServerEvent::ParticipantLeft {
            jam_id: 1,
            user_id: 7,
        });

        assert!(first.next().await.is_some());
        assert!(second.next().await.is_some());
        assert_eq!(first.pending_messages.lock().len(), 0);
    }

    #[test]
    fn dropping_a_handle_disconnects() {
        let sse = ServerSentEvents::new();
        let handle = sse.connect(1);
        assert_eq!(sse.connection_count(), 1);

        drop(handle);
        assert_eq!(sse.connection_count(), 0);
    }

    #[test]
    fn keeps_events_in_order() {
        let sse = ServerSentEvents::new();
        let handle = sse.connect(3);

        sse.broadcast(ServerEvent::ParticipantLeft {
            jam_id: 3,
            user_id: 1,
        });
        sse.broadcast(ServerEvent::JamEnded { jam_id: 3 });

        let pending = handle.pending_messages.lock();
        assert!(matches!(pending[0], ServerEvent::ParticipantLeft { .. }));
        assert!(matches!(pending[1], ServerEvent::JamEnded { .. }));
    }
}
