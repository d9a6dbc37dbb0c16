//! The Sandesh binary protocol.
//!
//! Sandesh is Thrift's binary protocol with two twists: struct headers carry
//! the struct name, and 16/32/64-bit integer fields that the kernel declares
//! unsigned are tagged with synthetic type codes (see [`TType::to_wire`]).
//! The bytes of the value are the same either way.

pub mod error;
pub mod sandesh;
pub mod transport;
pub mod ttype;

use serde::Deserialize;

pub use error::{ProtocolError, Result};
pub use sandesh::SandeshProtocol;
pub use transport::MemoryBuffer;
pub use ttype::TType;

/// Nesting limit for [`Protocol::skip`].
pub const DEFAULT_SKIP_DEPTH: usize = 64;

/// Largest length prefix accepted on the read side (100 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: i32 = 100 * 1024 * 1024;

/// Read-side limits of a codec session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default = "default_max_message_size")]
    pub max_message_size: i32,
}

fn default_max_message_size() -> i32 {
    DEFAULT_MAX_MESSAGE_SIZE
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
        }
    }
}

impl ProtocolConfig {
    /// Validate a length prefix read off the wire.
    pub fn check_size(&self, size: i32) -> Result<usize> {
        if size < 0 {
            return Err(ProtocolError::NegativeSize(size));
        }
        if size > self.max_message_size {
            return Err(ProtocolError::SizeLimit {
                size,
                max: self.max_message_size,
            });
        }
        Ok(size as usize)
    }
}

/// Field-by-field serialisation interface the message records are written
/// against.
///
/// Map, set and field-end markers exist for parity with the record code
/// generator's calling convention; Sandesh does not frame them.
pub trait Protocol {
    fn write_struct_begin(&mut self, name: &str) -> Result<()>;
    fn write_struct_end(&mut self) -> Result<()>;
    fn write_field_begin(&mut self, name: &str, ttype: TType, id: i16) -> Result<()>;
    fn write_field_end(&mut self) -> Result<()>;
    fn write_field_stop(&mut self) -> Result<()>;
    fn write_list_begin(&mut self, elem: TType, size: usize) -> Result<()>;
    fn write_list_end(&mut self) -> Result<()>;
    fn write_map_begin(&mut self, key: TType, value: TType, size: usize) -> Result<()>;
    fn write_map_end(&mut self) -> Result<()>;
    fn write_set_begin(&mut self, elem: TType, size: usize) -> Result<()>;
    fn write_set_end(&mut self) -> Result<()>;
    fn write_bool(&mut self, value: bool) -> Result<()>;
    fn write_byte(&mut self, value: i8) -> Result<()>;
    fn write_i16(&mut self, value: i16) -> Result<()>;
    fn write_i32(&mut self, value: i32) -> Result<()>;
    fn write_i64(&mut self, value: i64) -> Result<()>;
    fn write_double(&mut self, value: f64) -> Result<()>;
    fn write_string(&mut self, value: &str) -> Result<()>;
    fn write_binary(&mut self, value: &[u8]) -> Result<()>;
    fn flush(&mut self) -> Result<()>;

    /// Reads the struct header and returns the struct name.
    fn read_struct_begin(&mut self) -> Result<String>;
    fn read_struct_end(&mut self) -> Result<()>;
    /// Returns `(TType::STOP, 0)` at the end of a struct.
    fn read_field_begin(&mut self) -> Result<(TType, i16)>;
    fn read_field_end(&mut self) -> Result<()>;
    fn read_list_begin(&mut self) -> Result<(TType, usize)>;
    fn read_list_end(&mut self) -> Result<()>;
    fn read_map_begin(&mut self) -> Result<(TType, TType, usize)>;
    fn read_map_end(&mut self) -> Result<()>;
    fn read_set_begin(&mut self) -> Result<(TType, usize)>;
    fn read_set_end(&mut self) -> Result<()>;
    fn read_bool(&mut self) -> Result<bool>;
    fn read_byte(&mut self) -> Result<i8>;
    fn read_i16(&mut self) -> Result<i16>;
    fn read_i32(&mut self) -> Result<i32>;
    fn read_i64(&mut self) -> Result<i64>;
    fn read_double(&mut self) -> Result<f64>;
    fn read_string(&mut self) -> Result<String>;
    fn read_binary(&mut self) -> Result<Vec<u8>>;

    /// Whether the last field or list header read carried a synthetic
    /// unsigned type code. Protocols without such codes never do.
    fn last_field_unsigned(&self) -> bool {
        false
    }

    /// Read and discard one value of type `ttype`.
    fn skip(&mut self, ttype: TType) -> Result<()> {
        skip_depth(self, ttype, DEFAULT_SKIP_DEPTH)
    }
}

/// Structural skip driven purely by wire type codes.
pub fn skip_depth<P: Protocol + ?Sized>(p: &mut P, ttype: TType, depth: usize) -> Result<()> {
    if depth == 0 {
        return Err(ProtocolError::DepthLimit);
    }
    match ttype {
        TType::BOOL => {
            p.read_bool()?;
        }
        TType::BYTE => {
            p.read_byte()?;
        }
        TType::I16 => {
            p.read_i16()?;
        }
        TType::I32 => {
            p.read_i32()?;
        }
        TType::I64 => {
            p.read_i64()?;
        }
        TType::DOUBLE => {
            p.read_double()?;
        }
        TType::STRING | TType::UTF8 | TType::UTF16 => {
            p.read_binary()?;
        }
        TType::STRUCT => {
            p.read_struct_begin()?;
            loop {
                let (field_type, _) = p.read_field_begin()?;
                if field_type == TType::STOP {
                    break;
                }
                skip_depth(p, field_type, depth - 1)?;
                p.read_field_end()?;
            }
            p.read_struct_end()?;
        }
        TType::MAP => {
            let (key, value, size) = p.read_map_begin()?;
            for _ in 0..size {
                skip_depth(p, key, depth - 1)?;
                skip_depth(p, value, depth - 1)?;
            }
            p.read_map_end()?;
        }
        TType::SET => {
            let (elem, size) = p.read_set_begin()?;
            for _ in 0..size {
                skip_depth(p, elem, depth - 1)?;
            }
            p.read_set_end()?;
        }
        TType::LIST => {
            let (elem, size) = p.read_list_begin()?;
            for _ in 0..size {
                skip_depth(p, elem, depth - 1)?;
            }
            p.read_list_end()?;
        }
        other => {
            return Err(ProtocolError::invalid_data(format!(
                "cannot skip value of type {other}"
            )))
        }
    }
    Ok(())
}
