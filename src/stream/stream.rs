use crate::stream::packet::Packet;
use crate::stream::ring::Ring;
use crate::{Error, Result};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Sentinel for "no keyframe seen yet".
const NO_ENTRY: u64 = u64::MAX;

/// One published stream: the three config frames new subscribers need, a
/// bounded packet ring behind them, and the keyframe entry point late or
/// lapped subscribers resynchronise to.
pub struct MediaStream {
    ring: Ring,

    /// Sequence of the most recent video keyframe in the ring.
    entry: AtomicU64,

    meta: OnceLock<Arc<Packet>>,
    video0: OnceLock<Arc<Packet>>,
    audio0: OnceLock<Arc<Packet>>,

    /// Counts filled config frames; subscribers wait for all three.
    config_count: watch::Sender<u8>,

    publishing: AtomicBool,
    subscribers: AtomicI32,
}

impl MediaStream {
    pub fn new(capacity: usize) -> Self {
        let (config_count, _) = watch::channel(0);
        MediaStream {
            ring: Ring::new(capacity),
            entry: AtomicU64::new(NO_ENTRY),
            meta: OnceLock::new(),
            video0: OnceLock::new(),
            audio0: OnceLock::new(),
            config_count,
            publishing: AtomicBool::new(false),
            subscribers: AtomicI32::new(0),
        }
    }

    /// Append a packet. `None` ends the stream: subscribers reaching that
    /// slot observe end-of-stream. The first meta, audio-config and
    /// video-config packets are captured aside instead of entering the
    /// ring; re-sent config frames flow through like ordinary data.
    pub fn write(&self, packet: Option<Arc<Packet>>) {
        let Some(packet) = packet else {
            self.ring.push(None);
            return;
        };

        if packet.is_meta() && self.meta.get().is_none() {
            if self.meta.set(packet).is_ok() {
                self.config_count.send_modify(|n| *n += 1);
            }
            return;
        }
        if packet.is_audio() && packet.is_config && self.audio0.get().is_none() {
            if self.audio0.set(packet).is_ok() {
                self.config_count.send_modify(|n| *n += 1);
            }
            return;
        }
        if packet.is_video() && packet.is_config && self.video0.get().is_none() {
            if self.video0.set(packet).is_ok() {
                self.config_count.send_modify(|n| *n += 1);
            }
            return;
        }

        let is_key_frame = packet.is_key_frame;
        let sequence = self.ring.push(Some(packet));
        if is_key_frame {
            self.entry.store(sequence, Ordering::Release);
        }
    }

    /// The meta / video-config / audio-config packets, in delivery order.
    /// Waits until the publisher has produced all three.
    pub async fn config_frames(&self) -> Vec<Arc<Packet>> {
        let mut rx = self.config_count.subscribe();
        let _ = rx.wait_for(|&n| n >= 3).await;
        [&self.meta, &self.video0, &self.audio0]
            .iter()
            .filter_map(|slot| slot.get().cloned())
            .collect()
    }

    pub fn is_publishing(&self) -> bool {
        self.publishing.load(Ordering::Relaxed)
    }

    pub fn publish(&self) {
        self.publishing.store(true, Ordering::Relaxed);
    }

    pub fn unpublish(&self) {
        self.publishing.store(false, Ordering::Relaxed);
    }

    pub fn subscriber_count(&self) -> i32 {
        self.subscribers.load(Ordering::Relaxed)
    }

    /// Open a reading cursor over the stream. Config frames come first,
    /// then packets starting at the most recent keyframe.
    pub fn iterator(self: &Arc<Self>) -> StreamIterator {
        self.subscribers.fetch_add(1, Ordering::Relaxed);
        StreamIterator {
            written: self.ring.watch(),
            stream: self.clone(),
            sequence: 0,
            config_stage: 0,
            entered: false,
            released: false,
        }
    }
}

/// A subscriber's cursor. Independent of every other subscriber; only the
/// shared slots and the write counter connect it to the publisher.
pub struct StreamIterator {
    stream: Arc<MediaStream>,
    written: watch::Receiver<u64>,
    sequence: u64,
    /// 0 meta, 1 video config, 2 audio config, 3 ring
    config_stage: u8,
    entered: bool,
    released: bool,
}

impl StreamIterator {
    /// Deliver the next packet, waiting for the publisher when ahead of it.
    /// `Err(Eos)` once the stream has ended and the cursor reached that slot.
    pub async fn next(&mut self) -> Result<Arc<Packet>> {
        while self.config_stage < 3 {
            let mut rx = self.stream.config_count.subscribe();
            let _ = rx.wait_for(|&n| n >= 3).await;
            let frame = match self.config_stage {
                0 => &self.stream.meta,
                1 => &self.stream.video0,
                _ => &self.stream.audio0,
            };
            self.config_stage += 1;
            if let Some(packet) = frame.get() {
                return Ok(packet.clone());
            }
        }

        if !self.entered {
            let entry = self.stream.entry.load(Ordering::Acquire);
            self.sequence = if entry == NO_ENTRY { 0 } else { entry };
            self.entered = true;
        }

        loop {
            let sequence = self.sequence;
            self.written
                .wait_for(|&n| n > sequence)
                .await
                .map_err(|_| Error::Eos)?;

            let slot = self.stream.ring.slot(sequence);
            if slot.sequence == sequence {
                match slot.packet {
                    None => return Err(Error::Eos),
                    Some(packet) => {
                        self.sequence += 1;
                        return Ok(packet);
                    }
                }
            } else if slot.sequence > sequence {
                // The publisher lapped this cursor; jump forward to the
                // oldest keyframe still live in the ring.
                self.resync().await?;
            } else {
                return Err(Error::stream("ring sequence went backwards"));
            }
        }
    }

    /// Find the oldest live keyframe at or after the writer cursor,
    /// waiting for the publisher if none is buffered right now. A nil slot
    /// found on the way means the stream ended.
    async fn resync(&mut self) -> Result<()> {
        loop {
            let latest = self.stream.ring.written();
            let capacity = self.stream.ring.capacity() as u64;
            let start = latest.saturating_sub(capacity);

            for sequence in start..latest {
                let slot = self.stream.ring.slot(sequence);
                if slot.sequence != sequence {
                    continue; // just overwritten, keep scanning forward
                }
                match slot.packet {
                    None => return Err(Error::Eos),
                    Some(ref packet) if packet.is_key_frame => {
                        self.sequence = sequence;
                        return Ok(());
                    }
                    Some(_) => {}
                }
            }

            // nothing resumable buffered; wait for the publisher
            self.written
                .wait_for(|&n| n > latest)
                .await
                .map_err(|_| Error::Eos)?;
        }
    }

    /// Run a callback for every packet until cancellation, end-of-stream
    /// or a callback error.
    pub async fn for_each<F, Fut>(&mut self, cancel: &CancellationToken, mut f: F) -> Result<()>
    where
        F: FnMut(Arc<Packet>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        loop {
            let packet = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                packet = self.next() => packet?,
            };
            f(packet).await?;
        }
    }

    /// Drop the subscription. Also happens on drop; the counter is only
    /// ever decremented once.
    pub fn release(self) {}
}

impl Drop for StreamIterator {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            self.stream.subscribers.fetch_sub(1, Ordering::Relaxed);
        }
    }
}
