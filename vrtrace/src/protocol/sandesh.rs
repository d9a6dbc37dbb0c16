//! Sandesh codec session.
//!
//! Wire layout, all integers big-endian:
//!
//! ```text
//! struct    := i32 name_len | name | field* | 0x00
//! field     := u8 type | i16 id | value
//! list      := u8 elem_type | i32 size | value*
//! string    := i32 len | bytes
//! ```
//!
//! A session is bound to one transport and carries mutable state between
//! calls (the signedness table of the struct being written and whether the
//! current field is unsigned), so it must only ever drive one encode or
//! decode at a time.

use std::io::{Read, Write};
use std::time::Instant;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::catalog::{self, Signedness};
use crate::protocol::transport::{self, read_bounded, read_full};
use crate::protocol::{Protocol, ProtocolConfig, ProtocolError, Result, TType};

/// Strings shorter than this are read through the session scratch buffer.
const SCRATCH_LEN: usize = 64;

pub struct SandeshProtocol<T> {
    trans: T,
    cfg: ProtocolConfig,
    scratch: [u8; SCRATCH_LEN],
    signedness: &'static Signedness,
    current_field_unsigned: bool,
    last_read_unsigned: bool,
    deadline: Option<Instant>,
}

impl<T: Read + Write> SandeshProtocol<T> {
    pub fn new(trans: T) -> Self {
        Self::with_config(trans, ProtocolConfig::default())
    }

    pub fn with_config(trans: T, cfg: ProtocolConfig) -> Self {
        Self {
            trans,
            cfg,
            scratch: [0; SCRATCH_LEN],
            signedness: catalog::lookup("").0,
            current_field_unsigned: false,
            last_read_unsigned: false,
            deadline: None,
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.cfg
    }

    pub fn transport(&self) -> &T {
        &self.trans
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.trans
    }

    pub fn into_inner(self) -> T {
        self.trans
    }

    /// While a deadline is set and has not passed, reads that time out
    /// before transferring a single byte are retried.
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// Whether the field most recently begun on the write side is unsigned.
    pub fn current_field_unsigned(&self) -> bool {
        self.current_field_unsigned
    }

    fn time_left(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() < d)
    }

    /// Fill the first `n` scratch bytes.
    ///
    /// Retries only a clean timeout: once any byte of the value has been
    /// consumed a retry would desynchronise the stream.
    fn read_scratch(&mut self, n: usize) -> Result<&[u8]> {
        loop {
            let (read, res) = read_full(&mut self.trans, &mut self.scratch[..n]);
            match res {
                Ok(()) => return Ok(&self.scratch[..n]),
                Err(e) if read == 0 && transport::is_timeout(&e) && self.time_left() => {
                    tracing::trace!("read timed out with nothing transferred, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn write_len(&mut self, len: usize) -> Result<()> {
        let len = i32::try_from(len).map_err(|_| {
            ProtocolError::invalid_data(format!("length {len} does not fit an i32 prefix"))
        })?;
        self.write_i32(len)
    }

    fn read_size(&mut self) -> Result<usize> {
        let size = self.read_i32()?;
        self.cfg.check_size(size)
    }
}

impl<T: Read + Write> Protocol for SandeshProtocol<T> {
    fn write_struct_begin(&mut self, name: &str) -> Result<()> {
        let (table, found) = catalog::lookup(name);
        if !found {
            tracing::warn!(struct_name = name, "unrecognised struct, encoding all fields as signed");
        }
        self.signedness = table;

        self.write_len(name.len())?;
        self.trans.write_all(name.as_bytes())?;
        Ok(())
    }

    fn write_struct_end(&mut self) -> Result<()> {
        self.write_byte(TType::STOP.0 as i8)
    }

    fn write_field_begin(&mut self, _name: &str, ttype: TType, id: i16) -> Result<()> {
        self.current_field_unsigned = self.signedness.is_unsigned(id);
        let wire = ttype.to_wire(self.current_field_unsigned);
        self.write_byte(wire.0 as i8)?;
        self.write_i16(id)
    }

    fn write_field_end(&mut self) -> Result<()> {
        Ok(())
    }

    // The STOP byte is emitted by write_struct_end.
    fn write_field_stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_list_begin(&mut self, elem: TType, size: usize) -> Result<()> {
        let elem = elem.to_wire(self.current_field_unsigned);
        tracing::debug!(elem_type = %elem, size, "list header");
        self.write_byte(elem.0 as i8)?;
        self.write_len(size)
    }

    fn write_list_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_map_begin(&mut self, _key: TType, _value: TType, _size: usize) -> Result<()> {
        Ok(())
    }

    fn write_map_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_set_begin(&mut self, _elem: TType, _size: usize) -> Result<()> {
        Ok(())
    }

    fn write_set_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_byte(value as i8)
    }

    fn write_byte(&mut self, value: i8) -> Result<()> {
        self.trans.write_i8(value)?;
        Ok(())
    }

    fn write_i16(&mut self, value: i16) -> Result<()> {
        self.trans.write_i16::<BigEndian>(value)?;
        Ok(())
    }

    fn write_i32(&mut self, value: i32) -> Result<()> {
        self.trans.write_i32::<BigEndian>(value)?;
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> Result<()> {
        self.trans.write_i64::<BigEndian>(value)?;
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> Result<()> {
        self.write_i64(value.to_bits() as i64)
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_binary(value.as_bytes())
    }

    fn write_binary(&mut self, value: &[u8]) -> Result<()> {
        self.write_len(value.len())?;
        self.trans.write_all(value)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.trans.flush()?;
        Ok(())
    }

    // The name is all there is; signedness is only consulted when writing.
    fn read_struct_begin(&mut self) -> Result<String> {
        self.read_string()
    }

    fn read_struct_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_field_begin(&mut self) -> Result<(TType, i16)> {
        let raw = TType(self.read_byte()? as u8);
        if raw == TType::STOP {
            self.last_read_unsigned = false;
            return Ok((TType::STOP, 0));
        }
        self.last_read_unsigned = raw.is_unsigned_alias();
        let id = self.read_i16()?;
        Ok((raw.from_wire(), id))
    }

    fn read_field_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_list_begin(&mut self) -> Result<(TType, usize)> {
        let raw = TType(self.read_byte()? as u8);
        self.last_read_unsigned = raw.is_unsigned_alias();
        let size = self.read_size()?;
        Ok((raw.from_wire(), size))
    }

    fn read_list_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_map_begin(&mut self) -> Result<(TType, TType, usize)> {
        Ok((TType::STOP, TType::STOP, 0))
    }

    fn read_map_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_set_begin(&mut self) -> Result<(TType, usize)> {
        Ok((TType::STOP, 0))
    }

    fn read_set_end(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_byte()? == 1)
    }

    fn read_byte(&mut self) -> Result<i8> {
        Ok(self.read_scratch(1)?[0] as i8)
    }

    fn read_i16(&mut self) -> Result<i16> {
        Ok(BigEndian::read_i16(self.read_scratch(2)?))
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(BigEndian::read_i32(self.read_scratch(4)?))
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(BigEndian::read_i64(self.read_scratch(8)?))
    }

    fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_i64()? as u64))
    }

    fn read_string(&mut self) -> Result<String> {
        let size = self.read_size()?;
        let bytes = if size < SCRATCH_LEN {
            let (_, res) = read_full(&mut self.trans, &mut self.scratch[..size]);
            res?;
            self.scratch[..size].to_vec()
        } else {
            read_bounded(&mut self.trans, size)?
        };
        String::from_utf8(bytes)
            .map_err(|e| ProtocolError::invalid_data(format!("string is not utf-8: {e}")))
    }

    fn read_binary(&mut self) -> Result<Vec<u8>> {
        let size = self.read_size()?;
        Ok(read_bounded(&mut self.trans, size)?)
    }

    fn last_field_unsigned(&self) -> bool {
        self.last_read_unsigned
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;
    use std::time::Duration;

    use super::*;
    use crate::protocol::MemoryBuffer;

    fn session() -> SandeshProtocol<MemoryBuffer> {
        SandeshProtocol::new(MemoryBuffer::new())
    }

    fn reader(bytes: Vec<u8>) -> SandeshProtocol<MemoryBuffer> {
        SandeshProtocol::new(MemoryBuffer::from_bytes(bytes))
    }

    #[test]
    fn test_struct_header_and_stop() {
        let mut p = session();
        p.write_struct_begin("vr_response").unwrap();
        p.write_field_stop().unwrap();
        p.write_struct_end().unwrap();

        let mut expected = vec![0, 0, 0, 11];
        expected.extend_from_slice(b"vr_response");
        expected.push(0);
        assert_eq!(p.transport().unread(), expected.as_slice());

        let mut r = reader(expected);
        assert_eq!(r.read_struct_begin().unwrap(), "vr_response");
        assert_eq!(r.read_field_begin().unwrap(), (TType::STOP, 0));
        assert!(r.transport().is_empty());
    }

    #[test]
    fn test_unsigned_field_tag() {
        let mut p = session();
        p.write_struct_begin("vr_nexthop_req").unwrap();
        let start = p.transport().len();
        p.write_field_begin("nhr_tun_sip", TType::I32, 10).unwrap();
        assert!(p.current_field_unsigned());
        p.write_i32(-1).unwrap();
        p.write_field_begin("nhr_tun_sport", TType::I16, 12).unwrap();
        assert!(!p.current_field_unsigned());
        p.write_i16(7).unwrap();

        let body = &p.transport().unread()[start..];
        assert_eq!(
            body,
            &[20, 0, 10, 0xff, 0xff, 0xff, 0xff, 6, 0, 12, 0, 7]
        );

        let mut r = reader(body.to_vec());
        assert_eq!(r.read_field_begin().unwrap(), (TType::I32, 10));
        assert!(r.last_field_unsigned());
        assert_eq!(r.read_i32().unwrap() as u32, 4_294_967_295);
        assert_eq!(r.read_field_begin().unwrap(), (TType::I16, 12));
        assert!(!r.last_field_unsigned());
        assert_eq!(r.read_i16().unwrap(), 7);
    }

    #[test]
    fn test_unknown_struct_is_signed() {
        let mut p = session();
        p.write_struct_begin("totally_unknown").unwrap();
        for id in [1, 2, 10, 40] {
            p.write_field_begin("f", TType::I64, id).unwrap();
            assert!(!p.current_field_unsigned());
            p.write_i64(-1).unwrap();
        }
        p.write_struct_end().unwrap();

        let mut r = reader(p.into_inner().take_bytes());
        assert_eq!(r.read_struct_begin().unwrap(), "totally_unknown");
        for id in [1, 2, 10, 40] {
            assert_eq!(r.read_field_begin().unwrap(), (TType::I64, id));
            assert!(!r.last_field_unsigned());
            assert_eq!(r.read_i64().unwrap(), -1);
        }
        assert_eq!(r.read_field_begin().unwrap().0, TType::STOP);
    }

    #[test]
    fn test_list_uses_current_field_flag() {
        let mut p = session();
        p.write_struct_begin("vr_flow_response").unwrap();
        p.write_field_begin("fresp_flags", TType::LIST, 2).unwrap();
        p.write_list_begin(TType::I16, 2).unwrap();
        p.write_i16(-2).unwrap();
        p.write_i16(3).unwrap();
        p.write_list_end().unwrap();
        p.write_field_begin("fresp_rid", TType::LIST, 1).unwrap();
        p.write_list_begin(TType::I16, 0).unwrap();

        let mut r = reader(p.into_inner().take_bytes());
        r.read_struct_begin().unwrap();
        assert_eq!(r.read_field_begin().unwrap(), (TType::LIST, 2));
        let raw_elem = r.transport().unread()[0];
        assert_eq!(raw_elem, TType::U16.0);
        assert_eq!(r.read_list_begin().unwrap(), (TType::I16, 2));
        assert_eq!(r.read_i16().unwrap() as u16, 65534);
        assert_eq!(r.read_i16().unwrap(), 3);
        assert_eq!(r.read_field_begin().unwrap(), (TType::LIST, 1));
        assert_eq!(r.transport().unread()[0], TType::I16.0);
    }

    #[test]
    fn test_scalars() {
        let mut p = session();
        p.write_bool(true).unwrap();
        p.write_bool(false).unwrap();
        p.write_byte(-3).unwrap();
        p.write_i16(0x0102).unwrap();
        p.write_i32(0x01020304).unwrap();
        p.write_i64(0x0102030405060708).unwrap();
        p.write_double(1.5).unwrap();
        p.write_string("tap0").unwrap();
        p.write_binary(&[0xde, 0xad]).unwrap();

        let bytes = p.into_inner().take_bytes();
        assert_eq!(&bytes[..5], &[1, 0, 0xfd, 1, 2]);
        assert_eq!(&bytes[5..9], &[1, 2, 3, 4]);
        assert_eq!(&bytes[9..17], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&bytes[17..25], &1.5f64.to_bits().to_be_bytes());
        assert_eq!(&bytes[25..33], &[0, 0, 0, 4, b't', b'a', b'p', b'0']);
        assert_eq!(&bytes[33..], &[0, 0, 0, 2, 0xde, 0xad]);

        let mut r = reader(bytes);
        assert!(r.read_bool().unwrap());
        assert!(!r.read_bool().unwrap());
        assert_eq!(r.read_byte().unwrap(), -3);
        assert_eq!(r.read_i16().unwrap(), 0x0102);
        assert_eq!(r.read_i32().unwrap(), 0x01020304);
        assert_eq!(r.read_i64().unwrap(), 0x0102030405060708);
        assert_eq!(r.read_double().unwrap(), 1.5);
        assert_eq!(r.read_string().unwrap(), "tap0");
        assert_eq!(r.read_binary().unwrap(), vec![0xde, 0xad]);
    }

    #[test]
    fn test_long_string_takes_bounded_path() {
        let long = "x".repeat(300);
        let mut p = session();
        p.write_string(&long).unwrap();
        let mut r = reader(p.into_inner().take_bytes());
        assert_eq!(r.read_string().unwrap(), long);
    }

    #[test]
    fn test_size_guards() {
        let cfg = ProtocolConfig {
            max_message_size: 1024,
        };

        let mut r = SandeshProtocol::with_config(
            MemoryBuffer::from_bytes(vec![0xff, 0xff, 0xff, 0xfe]),
            cfg,
        );
        assert!(matches!(
            r.read_string(),
            Err(ProtocolError::NegativeSize(-2))
        ));

        let mut r = SandeshProtocol::with_config(
            MemoryBuffer::from_bytes(vec![0x7f, 0xff, 0xff, 0xff]),
            cfg,
        );
        assert!(matches!(
            r.read_binary(),
            Err(ProtocolError::SizeLimit { .. })
        ));

        let mut r = SandeshProtocol::with_config(
            MemoryBuffer::from_bytes(vec![TType::I32.0, 0x00, 0x00, 0x04, 0x01]),
            cfg,
        );
        assert!(matches!(
            r.read_list_begin(),
            Err(ProtocolError::SizeLimit { size: 1025, max: 1024 })
        ));

        let mut r = SandeshProtocol::with_config(
            MemoryBuffer::from_bytes(vec![TType::I32.0, 0x80, 0x00, 0x00, 0x00]),
            cfg,
        );
        assert!(matches!(
            r.read_list_begin(),
            Err(ProtocolError::NegativeSize(i32::MIN))
        ));
    }

    #[test]
    fn test_declared_size_larger_than_stream() {
        let mut bytes = vec![0x00, 0x10, 0x00, 0x00];
        bytes.extend_from_slice(&[7; 100]);
        let mut r = reader(bytes);
        let err = r.read_binary().unwrap_err();
        assert!(matches!(err, ProtocolError::Transport(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_skip_nested_struct() {
        let mut p = session();
        p.write_struct_begin("vr_vxlan_req").unwrap();
        p.write_field_begin("inner", TType::STRUCT, 5).unwrap();
        p.write_struct_begin("vr_response").unwrap();
        p.write_field_begin("resp_code", TType::I32, 2).unwrap();
        p.write_i32(0).unwrap();
        p.write_field_begin("names", TType::LIST, 3).unwrap();
        p.write_list_begin(TType::STRING, 2).unwrap();
        p.write_string("a").unwrap();
        p.write_string("bc").unwrap();
        p.write_struct_end().unwrap();
        p.write_field_begin("vxlanr_vnid", TType::I32, 3).unwrap();
        p.write_i32(42).unwrap();
        p.write_struct_end().unwrap();

        let mut r = reader(p.into_inner().take_bytes());
        r.read_struct_begin().unwrap();
        let (t, id) = r.read_field_begin().unwrap();
        assert_eq!((t, id), (TType::STRUCT, 5));
        r.skip(t).unwrap();
        assert_eq!(r.read_field_begin().unwrap(), (TType::I32, 3));
        assert_eq!(r.read_i32().unwrap(), 42);
        assert_eq!(r.read_field_begin().unwrap().0, TType::STOP);
    }

    #[test]
    fn test_skip_rejects_unknown_type() {
        let mut r = reader(vec![]);
        assert!(matches!(
            r.skip(TType(42)),
            Err(ProtocolError::InvalidData(_))
        ));
    }

    /// Transport replaying a script of read outcomes.
    struct Scripted {
        steps: VecDeque<io::Result<Vec<u8>>>,
    }

    impl Scripted {
        fn new(steps: Vec<io::Result<Vec<u8>>>) -> Self {
            Self {
                steps: steps.into(),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                Some(Ok(bytes)) => {
                    let n = bytes.len().min(out.len());
                    out[..n].copy_from_slice(&bytes[..n]);
                    if n < bytes.len() {
                        self.steps.push_front(Ok(bytes[n..].to_vec()));
                    }
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }
    }

    impl Write for Scripted {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn timeout() -> io::Error {
        io::Error::new(io::ErrorKind::WouldBlock, "read timeout")
    }

    #[test]
    fn test_clean_timeout_is_retried_before_deadline() {
        let mut r = SandeshProtocol::new(Scripted::new(vec![
            Err(timeout()),
            Err(timeout()),
            Ok(vec![0, 0, 0, 9]),
        ]));
        r.set_deadline(Some(Instant::now() + Duration::from_secs(30)));
        assert_eq!(r.read_i32().unwrap(), 9);
    }

    #[test]
    fn test_partial_timeout_is_not_retried() {
        let mut r = SandeshProtocol::new(Scripted::new(vec![
            Ok(vec![0, 0]),
            Err(timeout()),
            Ok(vec![0, 9]),
        ]));
        r.set_deadline(Some(Instant::now() + Duration::from_secs(30)));
        let err = r.read_i32().unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_timeout_without_deadline_surfaces() {
        let mut r = SandeshProtocol::new(Scripted::new(vec![Err(timeout()), Ok(vec![1])]));
        assert!(r.read_byte().unwrap_err().is_timeout());
    }

    #[test]
    fn test_timeout_after_deadline_surfaces() {
        let mut r = SandeshProtocol::new(Scripted::new(vec![Err(timeout()), Ok(vec![1])]));
        r.set_deadline(Some(Instant::now() - Duration::from_millis(1)));
        assert!(r.read_byte().unwrap_err().is_timeout());
    }
}
