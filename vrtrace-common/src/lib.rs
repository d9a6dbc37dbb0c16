#![no_std]

/// Size of [`CaptureRecord`] on the wire.
pub const CAPTURE_RECORD_LEN: usize = 32;

/// Fixed prefix of every capture event, passed from the vRouter kernel hooks to
/// userspace through the perf buffer.
///
/// The captured struct argument does not travel inline: the hook copies it
/// into a side map keyed by `arg_slot` and userspace looks it up there.
/// All fields are little-endian (host order on the supported targets).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureRecord {
    /// `bpf_ktime_get_ns()` at capture time.
    pub tstamp: u64,
    /// Address of the hooked kernel function.
    pub faddr: u64,
    /// CPU the hook fired on.
    pub processor_id: u32,
    /// 1 on function return, 0 on entry.
    pub is_return: u8,
    /// Padding to keep `arg_slot` 8-byte aligned.
    pub _pad: [u8; 3],
    /// Key of the captured argument bytes in the side map.
    pub arg_slot: u64,
}

impl CaptureRecord {
    /// Decode the little-endian on-wire layout.
    pub fn from_le_bytes(b: &[u8; CAPTURE_RECORD_LEN]) -> Self {
        Self {
            tstamp: u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
            faddr: u64::from_le_bytes([b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]]),
            processor_id: u32::from_le_bytes([b[16], b[17], b[18], b[19]]),
            is_return: b[20],
            _pad: [b[21], b[22], b[23]],
            arg_slot: u64::from_le_bytes([b[24], b[25], b[26], b[27], b[28], b[29], b[30], b[31]]),
        }
    }

    /// Encode into the little-endian on-wire layout.
    pub fn to_le_bytes(&self) -> [u8; CAPTURE_RECORD_LEN] {
        let mut out = [0u8; CAPTURE_RECORD_LEN];
        out[0..8].copy_from_slice(&self.tstamp.to_le_bytes());
        out[8..16].copy_from_slice(&self.faddr.to_le_bytes());
        out[16..20].copy_from_slice(&self.processor_id.to_le_bytes());
        out[20] = self.is_return;
        out[21..24].copy_from_slice(&self._pad);
        out[24..32].copy_from_slice(&self.arg_slot.to_le_bytes());
        out
    }
}
