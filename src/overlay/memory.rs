//! In-process overlay pair
//!
//! Two overlay connections joined back-to-back through channels: whatever
//! one side sends, the other receives as a single `Message`, in order.
//! Used by the test suite to drive an endpoint without any real
//! transport, and handy as the reference implementation of the overlay
//! contract.

use super::{OverlayConnection, OverlayEvent, CHANNEL_DEPTH};
use bytes::Bytes;
use tokio::sync::mpsc;

/// Build two connected overlay endpoints.
///
/// Dropping either connection surfaces `ClosedByPeer` on the other, the
/// same way a real transport reports a vanished peer.
pub fn pair() -> (OverlayConnection, OverlayConnection) {
    let (a_out_tx, a_out_rx) = mpsc::channel::<Bytes>(CHANNEL_DEPTH);
    let (b_out_tx, b_out_rx) = mpsc::channel::<Bytes>(CHANNEL_DEPTH);
    let (a_evt_tx, a_evt_rx) = mpsc::channel::<OverlayEvent>(CHANNEL_DEPTH);
    let (b_evt_tx, b_evt_rx) = mpsc::channel::<OverlayEvent>(CHANNEL_DEPTH);

    tokio::spawn(forward(a_out_rx, b_evt_tx));
    tokio::spawn(forward(b_out_rx, a_evt_tx));

    (
        OverlayConnection::new(a_out_tx, a_evt_rx),
        OverlayConnection::new(b_out_tx, b_evt_rx),
    )
}

/// Move messages from one side's outbound queue to the other side's
/// events, then report the sender as gone.
async fn forward(mut outbound: mpsc::Receiver<Bytes>, events: mpsc::Sender<OverlayEvent>) {
    if events.send(OverlayEvent::Connected).await.is_err() {
        return;
    }
    while let Some(message) = outbound.recv().await {
        if events.send(OverlayEvent::Message(message)).await.is_err() {
            return;
        }
    }
    let _ = events
        .send(OverlayEvent::ClosedByPeer("peer endpoint dropped".to_string()))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_crossed_delivery() {
        let (a, mut b) = pair();

        a.sender().send(Bytes::from_static(b"hello")).await.unwrap();

        loop {
            match timeout(Duration::from_secs(5), b.next_event())
                .await
                .unwrap()
                .unwrap()
            {
                OverlayEvent::Message(m) => {
                    assert_eq!(m, Bytes::from_static(b"hello"));
                    break;
                }
                OverlayEvent::Connected => continue,
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_drop_reports_closed() {
        let (a, mut b) = pair();
        drop(a);

        loop {
            match timeout(Duration::from_secs(5), b.next_event())
                .await
                .unwrap()
                .unwrap()
            {
                OverlayEvent::ClosedByPeer(_) => break,
                OverlayEvent::Connected | OverlayEvent::Message(_) => continue,
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }
}
