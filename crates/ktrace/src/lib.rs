//! Binary tracing for the kernel scheduler with pluggable sinks.
//!
//! The scheduler reports lifecycle and dispatch events as small *records*: a
//! one-byte kind plus a short payload. A [`Tracer`] stamps each record with a
//! sequence number and hands it to a [`TraceSink`]. Sinks decide what to do
//! with it: keep it in memory, forward it to the `log` facade, or encode it
//! onto a byte stream.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

pub mod event;
pub mod records;

pub use event::SchedEvent;

/// Maximum payload length for a single record.
pub const MAX_PAYLOAD: usize = 16;

/// Payload storage; fixed capacity so recording never reallocates.
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD>;

/// Errors that can occur while emitting trace data.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
    #[error("sink error: {0}")]
    Sink(#[from] io::Error),
}

/// Hook the scheduler calls for every record: `(kind, payload)`.
pub type TraceHook = Arc<dyn Fn(u8, &[u8]) -> Result<(), TraceError> + Send + Sync>;

/// A single sequenced trace record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub seq: u16,
    pub kind: u8,
    pub payload: Payload,
}

impl TraceRecord {
    /// Encodes the record as `seq(2) kind(1) len(1) payload checksum(1)`.
    ///
    /// The checksum is the complement of the byte sum of everything before it.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.payload.len() + 5);
        bytes.extend_from_slice(&self.seq.to_le_bytes());
        bytes.push(self.kind);
        bytes.push(self.payload.len() as u8);
        bytes.extend_from_slice(&self.payload);
        let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        bytes.push(!sum);
        bytes
    }

    /// Decodes a frame produced by [`encode`](Self::encode).
    pub fn decode(frame: &[u8]) -> Option<Self> {
        let (&checksum, body) = frame.split_last()?;
        if body.len() < 4 {
            return None;
        }
        let sum = body.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        if !sum != checksum {
            return None;
        }
        let len = body[3] as usize;
        let data = body.get(4..)?;
        if data.len() != len {
            return None;
        }
        Some(Self {
            seq: u16::from_le_bytes([body[0], body[1]]),
            kind: body[2],
            payload: Payload::from_slice(data).ok()?,
        })
    }
}

/// Sink trait that consumes sequenced records.
pub trait TraceSink: Send + Sync {
    fn accept(&self, record: &TraceRecord) -> Result<(), TraceError>;
}

/// Sink that writes encoded frames to any `Write` implementation.
pub struct WriterSink<W: Write + Send + 'static> {
    writer: Mutex<W>,
}

impl<W: Write + Send + 'static> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send + 'static> TraceSink for WriterSink<W> {
    fn accept(&self, record: &TraceRecord) -> Result<(), TraceError> {
        self.writer
            .lock()
            .write_all(&record.encode())
            .map_err(TraceError::from)
    }
}

/// Bounded in-memory sink; the oldest records are discarded when full.
#[derive(Clone)]
pub struct MemorySink {
    inner: Arc<Mutex<MemoryState>>,
}

struct MemoryState {
    records: VecDeque<TraceRecord>,
    capacity: usize,
    dropped: usize,
}

impl MemorySink {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryState {
                records: VecDeque::with_capacity(capacity),
                capacity,
                dropped: 0,
            })),
        }
    }

    /// Copies out the retained records, oldest first.
    pub fn records(&self) -> Vec<TraceRecord> {
        self.inner.lock().records.iter().cloned().collect()
    }

    /// Retained records that decode as scheduler events.
    pub fn events(&self) -> Vec<SchedEvent> {
        self.inner
            .lock()
            .records
            .iter()
            .filter_map(SchedEvent::decode)
            .collect()
    }

    /// Number of records discarded because the sink was full.
    pub fn dropped(&self) -> usize {
        self.inner.lock().dropped
    }

    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.records.clear();
        state.dropped = 0;
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::with_capacity(1024)
    }
}

impl TraceSink for MemorySink {
    fn accept(&self, record: &TraceRecord) -> Result<(), TraceError> {
        let mut state = self.inner.lock();
        if state.capacity == 0 {
            state.dropped += 1;
            return Ok(());
        }
        if state.records.len() == state.capacity {
            state.records.pop_front();
            state.dropped += 1;
        }
        state.records.push_back(record.clone());
        Ok(())
    }
}

/// Sink that renders decoded events through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn accept(&self, record: &TraceRecord) -> Result<(), TraceError> {
        match SchedEvent::decode(record) {
            Some(event) => log::trace!("#{} {event}", record.seq),
            None => log::trace!(
                "#{} kind={} payload={:02x?}",
                record.seq,
                record.kind,
                record.payload.as_slice()
            ),
        }
        Ok(())
    }
}

/// Record sequencer in front of a sink.
pub struct Tracer<S: TraceSink> {
    sink: S,
    seq: u16,
}

/// Shareable handle around a [`Tracer`].
pub struct TracerHandle<S: TraceSink> {
    inner: Arc<Mutex<Tracer<S>>>,
}

impl<S: TraceSink> Clone for TracerHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: TraceSink> Tracer<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, seq: 0 }
    }

    pub fn into_handle(self) -> TracerHandle<S> {
        TracerHandle {
            inner: Arc::new(Mutex::new(self)),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn record(&mut self, kind: u8, payload: &[u8]) -> Result<TraceRecord, TraceError> {
        let payload =
            Payload::from_slice(payload).map_err(|_| TraceError::PayloadTooLarge(payload.len()))?;
        self.seq = self.seq.wrapping_add(1);
        let record = TraceRecord {
            seq: self.seq,
            kind,
            payload,
        };
        self.sink.accept(&record)?;
        Ok(record)
    }
}

impl<S: TraceSink + 'static> TracerHandle<S> {
    pub fn emit(&self, kind: u8, payload: &[u8]) -> Result<TraceRecord, TraceError> {
        self.inner.lock().record(kind, payload)
    }

    /// Wraps the handle in a hook suitable for the scheduler.
    pub fn hook(&self) -> TraceHook {
        let inner = Arc::clone(&self.inner);
        Arc::new(move |kind: u8, payload: &[u8]| inner.lock().record(kind, payload).map(|_| ()))
    }
}

/// Convenience: a hook backed by a fresh [`MemorySink`], plus the sink.
pub fn memory_hook(capacity: usize) -> (TraceHook, MemorySink) {
    let sink = MemorySink::with_capacity(capacity);
    let hook = Tracer::new(sink.clone()).into_handle().hook();
    (hook, sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracer_sequences_records() -> Result<(), TraceError> {
        let sink = MemorySink::with_capacity(8);
        let handle = Tracer::new(sink.clone()).into_handle();

        handle.emit(records::thread::YIELD, &7i32.to_le_bytes())?;
        handle.emit(records::sched::IDLE, &2i32.to_le_bytes())?;

        let seen = sink.records();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].seq, 1);
        assert_eq!(seen[1].seq, 2);
        assert_eq!(seen[1].kind, records::sched::IDLE);
        Ok(())
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let mut tracer = Tracer::new(MemorySink::default());
        let err = tracer.record(1, &[0u8; MAX_PAYLOAD + 1]).unwrap_err();
        assert!(matches!(err, TraceError::PayloadTooLarge(17)));
    }

    #[test]
    fn memory_sink_discards_oldest() -> Result<(), TraceError> {
        let (hook, sink) = memory_hook(2);
        for tid in 1..=3i32 {
            hook(records::thread::EXIT, &tid.to_le_bytes())?;
        }
        let seqs: Vec<u16> = sink.records().iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![2, 3]);
        assert_eq!(sink.dropped(), 1);
        Ok(())
    }

    #[test]
    fn writer_sink_frames_decode() -> Result<(), TraceError> {
        let mut tracer = Tracer::new(WriterSink::new(Vec::new()));
        let sent = tracer.record(records::prio::CHANGE, &[5, 0, 0, 0, 20, 30])?;

        let bytes = tracer.into_sink().into_inner();
        assert_eq!(bytes.len(), 2 + 1 + 1 + 6 + 1);
        assert_eq!(TraceRecord::decode(&bytes), Some(sent));

        let mut corrupt = bytes.clone();
        corrupt[4] ^= 0xFF;
        assert_eq!(TraceRecord::decode(&corrupt), None);
        Ok(())
    }
}
