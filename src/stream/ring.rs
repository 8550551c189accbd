use crate::stream::packet::Packet;
use std::sync::Arc;
use std::sync::RwLock;
use tokio::sync::watch;

/// One ring slot: the packet (None marks end-of-stream) and the sequence
/// it was written under. Sequences increase monotonically forever; the
/// slot index is just `sequence % capacity`.
#[derive(Debug, Clone, Default)]
pub(crate) struct Slot {
    pub sequence: u64,
    pub packet: Option<Arc<Packet>>,
}

/// Bounded single-writer multi-reader packet ring. Readers learn about new
/// slots through one broadcast watch channel carrying the write count and
/// compare slot sequences themselves, which is what detects lapping.
pub(crate) struct Ring {
    slots: Vec<RwLock<Slot>>,
    written: watch::Sender<u64>,
}

impl Ring {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be positive");
        let (written, _) = watch::channel(0);
        Ring {
            slots: (0..capacity).map(|_| RwLock::new(Slot::default())).collect(),
            written,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Write count so far; also the next sequence to be assigned.
    pub fn written(&self) -> u64 {
        *self.written.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<u64> {
        self.written.subscribe()
    }

    /// Publish a packet into the next slot and wake the readers. Single
    /// writer; the slot lock only orders the write against readers.
    pub fn push(&self, packet: Option<Arc<Packet>>) -> u64 {
        let sequence = self.written();
        {
            let mut slot = self.slots[(sequence % self.slots.len() as u64) as usize]
                .write()
                .expect("ring slot lock poisoned");
            slot.sequence = sequence;
            slot.packet = packet;
        }
        self.written.send_replace(sequence + 1);
        sequence
    }

    /// Snapshot the slot a sequence maps to. The caller checks the stored
    /// sequence against the one it expected.
    pub fn slot(&self, sequence: u64) -> Slot {
        self.slots[(sequence % self.slots.len() as u64) as usize]
            .read()
            .expect("ring slot lock poisoned")
            .clone()
    }
}
