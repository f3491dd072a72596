//! Stream table: the registry of active tunneled streams
//!
//! One mutex protects the `id -> handle` map. Critical sections are O(1)
//! and never touch a socket; the table hands out cloned handles that stay
//! usable after the lock is released, and in-flight I/O tasks hold their
//! own references so a removed stream finishes tearing down on its own.

use super::{StreamId, TunnelError};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Shared handle to one active stream.
///
/// Writes go through the stream's queue, so they are serialized and each
/// buffer is owned by the write task until the write completes. Dropping
/// every clone does not close the stream; cancellation does.
#[derive(Clone)]
pub struct StreamHandle {
    id: StreamId,
    write_tx: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
}

impl StreamHandle {
    pub(crate) fn new(
        id: StreamId,
        write_tx: mpsc::Sender<Bytes>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            write_tx,
            cancel,
        }
    }

    /// Stream id this handle belongs to.
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Queue payload bytes for writing to the local socket.
    ///
    /// Fails once the stream's write task has gone away (removal or a
    /// socket error); the caller drops the bytes in that case.
    pub async fn write(&self, data: Bytes) -> Result<(), TunnelError> {
        self.write_tx
            .send(data)
            .await
            .map_err(|_| TunnelError::StreamClosed(self.id))
    }

    /// Tell both stream tasks to stop; dropping their socket halves closes
    /// the socket.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Registry mapping stream ids to their handles.
///
/// At most one stream per id at any time. Removal is idempotent and
/// triggers exactly one socket close.
#[derive(Default)]
pub struct StreamTable {
    streams: Mutex<HashMap<StreamId, StreamHandle>>,
}

impl StreamTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, HashMap<StreamId, StreamHandle>> {
        // A panic while holding the lock cannot leave the map half-mutated
        // (all mutations are single map calls), so recover the guard.
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a stream under `id`.
    pub fn insert(&self, id: StreamId, handle: StreamHandle) -> Result<(), TunnelError> {
        let mut streams = self.locked();
        if streams.contains_key(&id) {
            return Err(TunnelError::IdCollision(id));
        }
        streams.insert(id, handle);
        Ok(())
    }

    /// Look up a stream, returning a handle usable outside the lock.
    pub fn get(&self, id: &StreamId) -> Option<StreamHandle> {
        self.locked().get(id).cloned()
    }

    /// Whether `id` is currently registered.
    pub fn contains(&self, id: &StreamId) -> bool {
        self.locked().contains_key(id)
    }

    /// Remove a stream and cancel its tasks.
    ///
    /// Returns the handle only to the caller that actually removed it, so
    /// follow-up actions (like notifying the peer) happen exactly once.
    pub fn remove(&self, id: &StreamId) -> Option<StreamHandle> {
        let removed = self.locked().remove(id);
        if let Some(handle) = &removed {
            handle.cancel();
        }
        removed
    }

    /// Cancel every stream and clear the table.
    pub fn close_all(&self) {
        let drained: Vec<StreamHandle> = {
            let mut streams = self.locked();
            streams.drain().map(|(_, handle)| handle).collect()
        };
        for handle in drained {
            handle.cancel();
        }
    }

    /// Number of active streams.
    pub fn len(&self) -> usize {
        self.locked().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.locked().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(id: StreamId) -> (StreamHandle, mpsc::Receiver<Bytes>, CancellationToken) {
        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        (StreamHandle::new(id, tx, cancel.clone()), rx, cancel)
    }

    #[test]
    fn test_insert_get_remove() {
        let table = StreamTable::new();
        let id = StreamId::generate();
        let (h, _rx, cancel) = handle(id);

        table.insert(id, h).unwrap();
        assert!(table.get(&id).is_some());
        assert_eq!(table.len(), 1);

        assert!(table.remove(&id).is_some());
        assert!(cancel.is_cancelled());
        assert!(table.get(&id).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_insert_collision() {
        let table = StreamTable::new();
        let id = StreamId::generate();
        let (a, _arx, _ac) = handle(id);
        let (b, _brx, _bc) = handle(id);

        table.insert(id, a).unwrap();
        assert!(matches!(
            table.insert(id, b),
            Err(TunnelError::IdCollision(_))
        ));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_double_remove_is_single_remove() {
        let table = StreamTable::new();
        let id = StreamId::generate();
        let (h, _rx, _cancel) = handle(id);
        table.insert(id, h).unwrap();

        assert!(table.remove(&id).is_some());
        assert!(table.remove(&id).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_close_all_cancels_everything() {
        let table = StreamTable::new();
        let mut tokens = Vec::new();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            let id = StreamId::generate();
            let (h, rx, cancel) = handle(id);
            table.insert(id, h).unwrap();
            tokens.push(cancel);
            receivers.push(rx);
        }

        table.close_all();
        assert!(table.is_empty());
        assert!(tokens.iter().all(|t| t.is_cancelled()));
    }

    #[tokio::test]
    async fn test_handle_usable_after_lock_released() {
        let table = StreamTable::new();
        let id = StreamId::generate();
        let (h, mut rx, _cancel) = handle(id);
        table.insert(id, h).unwrap();

        let retrieved = table.get(&id).unwrap();
        retrieved.write(Bytes::from_static(b"abc")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"abc"));

        // removal closes the queue; writes now fail
        drop(table.remove(&id));
        rx.close();
        assert!(retrieved.write(Bytes::from_static(b"x")).await.is_err());
    }
}
