//! Session to connection-writer channel.
//!
//! Transcripts and pings share a bounded queue and may be dropped when the
//! client falls behind. The final route of a session (close frame or
//! termination) travels on its own one-shot slot so a full queue can never
//! swallow it.

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;

use super::events::MessageRoute;

/// Create a connected outbound pair whose queue holds `capacity` routes.
pub fn outbound_channel(capacity: usize) -> (OutboundSender, OutboundReceiver) {
    let (routes_tx, routes_rx) = mpsc::channel(capacity);
    let (final_tx, final_rx) = oneshot::channel();

    (
        OutboundSender {
            routes: routes_tx,
            final_route: Some(final_tx),
        },
        OutboundReceiver {
            routes: routes_rx,
            final_route: final_rx,
            routes_closed: false,
            finished: false,
        },
    )
}

/// Session side.
#[derive(Debug)]
pub struct OutboundSender {
    routes: mpsc::Sender<MessageRoute>,
    final_route: Option<oneshot::Sender<MessageRoute>>,
}

impl OutboundSender {
    /// Queue a transcript or ping without waiting.
    pub fn try_send(&self, route: MessageRoute) -> Result<(), TrySendError<MessageRoute>> {
        self.routes.try_send(route)
    }

    /// Whether the writer has gone away.
    pub fn is_closed(&self) -> bool {
        self.routes.is_closed()
    }

    /// Hand over the last route of the session, or `None` to end without one.
    /// Only the first call has an effect; returns whether `route` was accepted
    /// by a live writer.
    pub fn finish(&mut self, route: Option<MessageRoute>) -> bool {
        let Some(slot) = self.final_route.take() else {
            return false;
        };
        match route {
            Some(route) => slot.send(route).is_ok(),
            None => false,
        }
    }
}

/// Writer side.
#[derive(Debug)]
pub struct OutboundReceiver {
    routes: mpsc::Receiver<MessageRoute>,
    final_route: oneshot::Receiver<MessageRoute>,
    routes_closed: bool,
    finished: bool,
}

impl OutboundReceiver {
    /// Next route to deliver. Queued routes come first; the final route is
    /// returned once nothing is waiting ahead of it, after which the receiver
    /// yields `None`.
    pub async fn recv(&mut self) -> Option<MessageRoute> {
        if self.finished {
            return None;
        }

        loop {
            tokio::select! {
                biased;

                route = self.routes.recv(), if !self.routes_closed => match route {
                    Some(route) => return Some(route),
                    None => self.routes_closed = true,
                },
                route = &mut self.final_route => {
                    self.finished = true;
                    return route.ok();
                }
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<MessageRoute> {
        if self.finished {
            return None;
        }
        if let Ok(route) = self.routes.try_recv() {
            return Some(route);
        }
        match self.final_route.try_recv() {
            Ok(route) => {
                self.finished = true;
                Some(route)
            }
            Err(oneshot::error::TryRecvError::Closed) => {
                self.finished = true;
                None
            }
            Err(oneshot::error::TryRecvError::Empty) => None,
        }
    }
}
