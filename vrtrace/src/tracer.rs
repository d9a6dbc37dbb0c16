use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use vrtrace_common::{CaptureRecord, CAPTURE_RECORD_LEN};

use crate::protocol::transport::read_full;
use crate::raw::{self, RawDecodeError, RawRecord};

/// Largest replay frame accepted (record, name and payload).
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("capture event is {got} bytes, need at least {need}")]
    Truncated { need: usize, got: usize },

    #[error("rejected capture of {struct_name}: {source}")]
    Rejected {
        struct_name: String,
        #[source]
        source: RawDecodeError,
    },

    #[error("replay frame of {0} bytes exceeds the limit")]
    FrameTooLarge(u32),

    #[error("malformed replay frame: {0}")]
    BadFrame(String),

    #[error("replay i/o: {0}")]
    Io(#[from] io::Error),

    #[error("replay reader failed: {0}")]
    Reader(#[from] tokio::task::JoinError),
}

/// The fixed prefix of a capture event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureEvent {
    pub tstamp: u64,
    pub faddr: u64,
    pub processor_id: u32,
    pub is_return: bool,
    pub arg_slot: u64,
}

impl CaptureEvent {
    /// Parse the little-endian record at the start of `bytes`. Anything past
    /// the record is ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self, TraceError> {
        let head: &[u8; CAPTURE_RECORD_LEN] = bytes
            .get(..CAPTURE_RECORD_LEN)
            .and_then(|b| b.try_into().ok())
            .ok_or(TraceError::Truncated {
                need: CAPTURE_RECORD_LEN,
                got: bytes.len(),
            })?;
        Ok(CaptureRecord::from_le_bytes(head).into())
    }
}

impl From<CaptureRecord> for CaptureEvent {
    fn from(r: CaptureRecord) -> Self {
        Self {
            tstamp: r.tstamp,
            faddr: r.faddr,
            processor_id: r.processor_id,
            is_return: r.is_return != 0,
            arg_slot: r.arg_slot,
        }
    }
}

impl From<CaptureEvent> for CaptureRecord {
    fn from(e: CaptureEvent) -> Self {
        Self {
            tstamp: e.tstamp,
            faddr: e.faddr,
            processor_id: e.processor_id,
            is_return: e.is_return as u8,
            _pad: [0; 3],
            arg_slot: e.arg_slot,
        }
    }
}

/// Struct argument bytes copied by a kernel hook, with the name of its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedArg {
    pub struct_name: String,
    pub bytes: Vec<u8>,
}

/// Side map from argument slot to captured argument, filled by the
/// producers and drained by the consumer.
#[derive(Debug, Default)]
pub struct ArgStore {
    args: DashMap<u64, CapturedArg>,
}

impl ArgStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, slot: u64, arg: CapturedArg) {
        self.args.insert(slot, arg);
    }

    /// Remove and return the argument in `slot`. Each slot is consumed once.
    pub fn take(&self, slot: u64) -> Option<CapturedArg> {
        self.args.remove(&slot).map(|(_, arg)| arg)
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct TraceStats {
    pub events: AtomicU64,
    pub decoded: AtomicU64,
    pub undecoded: AtomicU64,
    pub rejected: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TracePayload {
    /// No argument was captured for this event.
    None,
    Decoded { record: RawRecord },
    /// A struct the raw decoder has no layout for.
    Undecoded { struct_name: String, bytes: Vec<u8> },
}

/// One hook hit, ready for output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRecord {
    pub observed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: CaptureEvent,
    pub payload: TracePayload,
}

/// Single consumer of capture events.
pub struct Tracer {
    args: Arc<ArgStore>,
    stats: Arc<TraceStats>,
}

impl Tracer {
    pub fn new(args: Arc<ArgStore>) -> Self {
        Self {
            args,
            stats: Arc::new(TraceStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<TraceStats> {
        self.stats.clone()
    }

    /// Turn one raw event into a record.
    ///
    /// The argument slot is consumed even when decoding fails.
    pub fn handle(&self, bytes: &[u8]) -> Result<TraceRecord, TraceError> {
        let event = CaptureEvent::parse(bytes)?;
        self.stats.events.fetch_add(1, Ordering::Relaxed);

        let payload = match self.args.take(event.arg_slot) {
            None => TracePayload::None,
            Some(arg) => match raw::decode_named(&arg.struct_name, &arg.bytes) {
                Ok(Some(record)) => {
                    self.stats.decoded.fetch_add(1, Ordering::Relaxed);
                    TracePayload::Decoded { record }
                }
                Ok(None) => {
                    self.stats.undecoded.fetch_add(1, Ordering::Relaxed);
                    TracePayload::Undecoded {
                        struct_name: arg.struct_name,
                        bytes: arg.bytes,
                    }
                }
                Err(source) => {
                    return Err(TraceError::Rejected {
                        struct_name: arg.struct_name,
                        source,
                    })
                }
            },
        };

        Ok(TraceRecord {
            observed_at: Utc::now(),
            event,
            payload,
        })
    }

    /// Consume events until the channel closes or the output side goes away.
    pub async fn run(&self, mut rx: mpsc::Receiver<Vec<u8>>, tx: mpsc::Sender<TraceRecord>) {
        while let Some(bytes) = rx.recv().await {
            match self.handle(&bytes) {
                Ok(record) => {
                    if tx.send(record).await.is_err() {
                        tracing::debug!("trace output closed, stopping consumer");
                        break;
                    }
                }
                Err(e) => {
                    self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                    tracing::error!("dropping capture event: {}", e);
                }
            }
        }
    }
}

// ── Replay files ──────────────────────────────────────────────────────────
//
// frame := u32le len | record[32] | u16le name_len | name | payload
//
// `len` counts everything after itself. An empty name means no argument.

/// One frame of a capture replay file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayFrame {
    pub record: CaptureRecord,
    pub arg: Option<CapturedArg>,
}

/// Read the next frame, `Ok(None)` at a clean end of file.
pub fn read_frame<R: Read>(r: &mut R) -> Result<Option<ReplayFrame>, TraceError> {
    let mut prefix = [0u8; 4];
    let len = match read_full(r, &mut prefix) {
        (_, Ok(())) => u32::from_le_bytes(prefix),
        (0, Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        (n, Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(TraceError::BadFrame(format!(
                "file ends {n} bytes into a length prefix"
            )))
        }
        (_, Err(e)) => return Err(e.into()),
    };
    if len > MAX_FRAME_LEN {
        return Err(TraceError::FrameTooLarge(len));
    }
    let min = CAPTURE_RECORD_LEN + 2;
    if (len as usize) < min {
        return Err(TraceError::BadFrame(format!(
            "frame of {len} bytes is shorter than {min}"
        )));
    }

    let mut body = vec![0u8; len as usize];
    r.read_exact(&mut body)?;

    let mut head = [0u8; CAPTURE_RECORD_LEN];
    head.copy_from_slice(&body[..CAPTURE_RECORD_LEN]);
    let record = CaptureRecord::from_le_bytes(&head);

    let mut rest = &body[CAPTURE_RECORD_LEN..];
    let name_len = rest.read_u16::<LittleEndian>()? as usize;
    if name_len > rest.len() {
        return Err(TraceError::BadFrame(format!(
            "name of {name_len} bytes overruns frame"
        )));
    }
    let (name, payload) = rest.split_at(name_len);
    let name = std::str::from_utf8(name)
        .map_err(|e| TraceError::BadFrame(format!("struct name is not utf-8: {e}")))?;

    let arg = (!name.is_empty()).then(|| CapturedArg {
        struct_name: name.to_string(),
        bytes: payload.to_vec(),
    });
    Ok(Some(ReplayFrame { record, arg }))
}

pub fn write_frame<W: Write>(w: &mut W, frame: &ReplayFrame) -> io::Result<()> {
    let (name, payload) = match &frame.arg {
        Some(arg) => (arg.struct_name.as_bytes(), arg.bytes.as_slice()),
        None => (&b""[..], &b""[..]),
    };
    let name_len = u16::try_from(name.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "struct name too long"))?;
    let len = CAPTURE_RECORD_LEN + 2 + name.len() + payload.len();
    let len = u32::try_from(len)
        .ok()
        .filter(|&l| l <= MAX_FRAME_LEN)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;

    w.write_u32::<LittleEndian>(len)?;
    w.write_all(&frame.record.to_le_bytes())?;
    w.write_u16::<LittleEndian>(name_len)?;
    w.write_all(name)?;
    w.write_all(payload)?;
    Ok(())
}

/// Feed every frame of a replay file through `tx`, stashing arguments in
/// `args` first the way the kernel hooks do. Returns the number of events sent.
///
/// The file is read on the blocking pool. Setting `stop` ends the replay
/// before the next frame; so does closing the receiving side.
pub async fn replay<R>(
    mut r: R,
    args: Arc<ArgStore>,
    tx: mpsc::Sender<Vec<u8>>,
    stop: Arc<AtomicBool>,
) -> Result<u64, TraceError>
where
    R: Read + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut sent = 0;
        while !stop.load(Ordering::Relaxed) {
            let Some(frame) = read_frame(&mut r)? else {
                break;
            };
            if let Some(arg) = frame.arg {
                args.insert(frame.record.arg_slot, arg);
            }
            if tx.blocking_send(frame.record.to_le_bytes().to_vec()).is_err() {
                break;
            }
            sent += 1;
        }
        Ok(sent)
    })
    .await?
}
