//! Decoded view of scheduler records.

use core::fmt;

use crate::records::{prio, sched, thread};
use crate::TraceRecord;

/// A scheduler event recovered from a [`TraceRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedEvent {
    Created { tid: i32, priority: u8 },
    Unblocked { tid: i32 },
    Blocked { tid: i32 },
    Yielded { tid: i32 },
    Exited { tid: i32 },
    Reclaimed { tid: i32 },
    Woke { tid: i32 },
    Switched { prev: i32, next: i32 },
    Idle { tid: i32 },
    PriorityChanged { tid: i32, base: u8, effective: u8 },
    NiceChanged { tid: i32, nice: i8 },
    LoadAvg { hundredths: i32 },
}

fn read_i32(payload: &[u8], at: usize) -> Option<i32> {
    let bytes = payload.get(at..at + 4)?;
    Some(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

impl SchedEvent {
    /// Interprets a record; unknown kinds and short payloads yield `None`.
    pub fn decode(record: &TraceRecord) -> Option<Self> {
        let p = record.payload.as_slice();
        let event = match record.kind {
            thread::CREATE => Self::Created {
                tid: read_i32(p, 0)?,
                priority: *p.get(4)?,
            },
            thread::UNBLOCK => Self::Unblocked { tid: read_i32(p, 0)? },
            thread::BLOCK => Self::Blocked { tid: read_i32(p, 0)? },
            thread::YIELD => Self::Yielded { tid: read_i32(p, 0)? },
            thread::EXIT => Self::Exited { tid: read_i32(p, 0)? },
            thread::RECLAIM => Self::Reclaimed { tid: read_i32(p, 0)? },
            thread::WAKE => Self::Woke { tid: read_i32(p, 0)? },
            sched::NEXT => Self::Switched {
                prev: read_i32(p, 0)?,
                next: read_i32(p, 4)?,
            },
            sched::IDLE => Self::Idle { tid: read_i32(p, 0)? },
            prio::CHANGE => Self::PriorityChanged {
                tid: read_i32(p, 0)?,
                base: *p.get(4)?,
                effective: *p.get(5)?,
            },
            prio::NICE => Self::NiceChanged {
                tid: read_i32(p, 0)?,
                nice: *p.get(4)? as i8,
            },
            prio::LOAD_AVG => Self::LoadAvg {
                hundredths: read_i32(p, 0)?,
            },
            _ => return None,
        };
        Some(event)
    }
}

impl fmt::Display for SchedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created { tid, priority } => write!(f, "create tid={tid} pri={priority}"),
            Self::Unblocked { tid } => write!(f, "unblock tid={tid}"),
            Self::Blocked { tid } => write!(f, "block tid={tid}"),
            Self::Yielded { tid } => write!(f, "yield tid={tid}"),
            Self::Exited { tid } => write!(f, "exit tid={tid}"),
            Self::Reclaimed { tid } => write!(f, "reclaim tid={tid}"),
            Self::Woke { tid } => write!(f, "wake tid={tid}"),
            Self::Switched { prev, next } => write!(f, "switch {prev} -> {next}"),
            Self::Idle { tid } => write!(f, "idle tid={tid}"),
            Self::PriorityChanged {
                tid,
                base,
                effective,
            } => write!(f, "priority tid={tid} base={base} effective={effective}"),
            Self::NiceChanged { tid, nice } => write!(f, "nice tid={tid} nice={nice}"),
            Self::LoadAvg { hundredths } => {
                write!(f, "load_avg={}.{:02}", hundredths / 100, (hundredths % 100).abs())
            }
        }
    }
}
