//! SSE relay between the workflow bus and one HTTP connection.
//!
//! Each connection gets its own bounded buffer. The relay flushes the
//! replay backlog first, then forwards live events without ever blocking
//! on the consumer: a consumer that falls a full buffer behind gets one
//! final overflow frame and the stream closes. The bus and the workflow
//! never notice.

use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::debug;
use workloom_bus::Subscription;
use workloom_core::event::WorkflowEvent;

/// What the connection-side stream receives from the relay.
pub enum StreamFrame {
    Event(WorkflowEvent),
    /// The consumer fell too far behind; this is the last frame.
    Overflow,
}

/// Pump one subscription into one connection's buffer.
///
/// Runs until the consumer disconnects, overflows, or goes idle past
/// `idle_timeout`. Backlog sends wait for the consumer to drain, but only
/// up to the idle window, so a consumer that never reads is cut off during
/// replay just as it would be in the live phase. Live events use
/// `try_send` so a stalled consumer surfaces immediately.
pub async fn relay_events(
    subscription: Subscription,
    tx: mpsc::Sender<StreamFrame>,
    idle_timeout: Duration,
) {
    let Subscription { backlog, mut live } = subscription;

    for event in backlog {
        match tokio::time::timeout(idle_timeout, tx.send(StreamFrame::Event(event))).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return,
            Err(_) => {
                debug!("Consumer stalled during replay, closing stream");
                let _ = tx.try_send(StreamFrame::Overflow);
                return;
            }
        }
    }

    loop {
        let received = match tokio::time::timeout(idle_timeout, live.recv()).await {
            Err(_) => {
                debug!("Event stream idle past timeout, closing");
                return;
            }
            Ok(received) => received,
        };

        match received {
            Ok(event) => match tx.try_send(StreamFrame::Event(event)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!("Consumer buffer full, closing stream");
                    // Waiting here is fine: the consumer either drains its
                    // buffer and sees the overflow frame, or disconnects.
                    let _ = tx.send(StreamFrame::Overflow).await;
                    return;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => return,
            },
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "Consumer lagged the bus channel, closing stream");
                let _ = tx.send(StreamFrame::Overflow).await;
                return;
            }
            Err(RecvError::Closed) => {
                debug!("Workflow channel closed, ending stream");
                return;
            }
        }
    }
}
