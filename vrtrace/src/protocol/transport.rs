//! Byte-stream helpers shared by the codec.
//!
//! The codec works over any `Read + Write`. [`MemoryBuffer`] is the in-memory
//! transport used to stage a request before it is handed to netlink and to
//! replay a response once netlink has delivered it.

use std::io::{self, Read, Write};

/// Growable byte buffer: writes append, reads consume from the front.
#[derive(Debug, Default, Clone)]
pub struct MemoryBuffer {
    buf: Vec<u8>,
    pos: usize,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            buf: bytes.into(),
            pos: 0,
        }
    }

    /// Unread bytes.
    pub fn unread(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    pub fn len(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.pos = 0;
    }

    /// Replace the contents, e.g. with a response delivered by netlink.
    pub fn set_bytes(&mut self, bytes: impl Into<Vec<u8>>) {
        self.buf = bytes.into();
        self.pos = 0;
    }

    /// Take the unread bytes, leaving the buffer empty.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        let mut out = std::mem::take(&mut self.buf);
        out.drain(..self.pos);
        self.pos = 0;
        out
    }
}

impl Read for MemoryBuffer {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let avail = &self.buf[self.pos..];
        let n = avail.len().min(out.len());
        out[..n].copy_from_slice(&avail[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for MemoryBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Fill `buf` completely.
///
/// Unlike `Read::read_exact`, reports how many bytes were transferred before
/// an error so the caller can tell a clean timeout from a torn read.
pub fn read_full<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> (usize, io::Result<()>) {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => {
                return (
                    filled,
                    Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("short read: wanted {} bytes, got {}", buf.len(), filled),
                    )),
                )
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return (filled, Err(e)),
        }
    }
    (filled, Ok(()))
}

/// Read exactly `size` bytes without trusting `size` for the allocation.
///
/// The buffer grows with the data actually delivered, so a corrupt length
/// prefix costs at most what the transport really holds.
pub fn read_bounded<R: Read + ?Sized>(r: &mut R, size: usize) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let n = Read::take(r, size as u64).read_to_end(&mut out)?;
    if n < size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("short read: declared {size} bytes, got {n}"),
        ));
    }
    Ok(out)
}

/// Socket read timeouts surface as `WouldBlock` on Unix and `TimedOut`
/// elsewhere.
pub fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_buffer_write_then_read() {
        let mut mem = MemoryBuffer::new();
        mem.write_all(&[1, 2, 3, 4]).unwrap();
        assert_eq!(mem.len(), 4);

        let mut two = [0u8; 2];
        mem.read_exact(&mut two).unwrap();
        assert_eq!(two, [1, 2]);
        assert_eq!(mem.unread(), &[3, 4]);
        assert_eq!(mem.take_bytes(), vec![3, 4]);
        assert!(mem.is_empty());
    }

    #[test]
    fn test_read_full_reports_partial() {
        let mut mem = MemoryBuffer::from_bytes(vec![9, 9, 9]);
        let mut buf = [0u8; 4];
        let (n, res) = read_full(&mut mem, &mut buf);
        assert_eq!(n, 3);
        assert_eq!(res.unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_read_bounded_does_not_trust_size() {
        let mut mem = MemoryBuffer::from_bytes(vec![1, 2, 3]);
        let err = read_bounded(&mut mem, usize::MAX >> 1).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let mut mem = MemoryBuffer::from_bytes(vec![1, 2, 3, 4]);
        assert_eq!(read_bounded(&mut mem, 3).unwrap(), vec![1, 2, 3]);
        assert_eq!(mem.unread(), &[4]);
    }
}
