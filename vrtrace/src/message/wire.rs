use serde::{Serialize, Serializer};

use crate::protocol::{Protocol, ProtocolError, Result, TType};

/// A Rust type that maps onto one Sandesh wire type.
///
/// Unsigned integers are written with the signed nominal type and the same
/// bit pattern. Whether they travel as `U16`/`U32`/`U64` is decided by the
/// session from the catalog, not here.
pub trait WireValue: Sized {
    const TTYPE: TType;

    fn write<P: Protocol + ?Sized>(&self, p: &mut P) -> Result<()>;
    fn read<P: Protocol + ?Sized>(p: &mut P) -> Result<Self>;
}

macro_rules! wire_int {
    ($($ty:ty => $ttype:ident, $write:ident, $read:ident, $repr:ty;)*) => {
        $(
            impl WireValue for $ty {
                const TTYPE: TType = TType::$ttype;

                fn write<P: Protocol + ?Sized>(&self, p: &mut P) -> Result<()> {
                    p.$write(*self as $repr)
                }

                fn read<P: Protocol + ?Sized>(p: &mut P) -> Result<Self> {
                    Ok(p.$read()? as $ty)
                }
            }
        )*
    };
}

wire_int! {
    i8 => BYTE, write_byte, read_byte, i8;
    u8 => BYTE, write_byte, read_byte, i8;
    i16 => I16, write_i16, read_i16, i16;
    u16 => I16, write_i16, read_i16, i16;
    i32 => I32, write_i32, read_i32, i32;
    u32 => I32, write_i32, read_i32, i32;
    i64 => I64, write_i64, read_i64, i64;
    u64 => I64, write_i64, read_i64, i64;
}

impl WireValue for bool {
    const TTYPE: TType = TType::BOOL;

    fn write<P: Protocol + ?Sized>(&self, p: &mut P) -> Result<()> {
        p.write_bool(*self)
    }

    fn read<P: Protocol + ?Sized>(p: &mut P) -> Result<Self> {
        p.read_bool()
    }
}

impl WireValue for f64 {
    const TTYPE: TType = TType::DOUBLE;

    fn write<P: Protocol + ?Sized>(&self, p: &mut P) -> Result<()> {
        p.write_double(*self)
    }

    fn read<P: Protocol + ?Sized>(p: &mut P) -> Result<Self> {
        p.read_double()
    }
}

impl WireValue for String {
    const TTYPE: TType = TType::STRING;

    fn write<P: Protocol + ?Sized>(&self, p: &mut P) -> Result<()> {
        p.write_string(self)
    }

    fn read<P: Protocol + ?Sized>(p: &mut P) -> Result<Self> {
        p.read_string()
    }
}

/// Upper bound on capacity reserved up front for a decoded list. The size
/// prefix is attacker controlled; anything longer grows as elements arrive.
const LIST_PREALLOC: usize = 1024;

impl<T: WireValue> WireValue for Vec<T> {
    const TTYPE: TType = TType::LIST;

    fn write<P: Protocol + ?Sized>(&self, p: &mut P) -> Result<()> {
        p.write_list_begin(T::TTYPE, self.len())?;
        for item in self {
            item.write(p)?;
        }
        p.write_list_end()
    }

    fn read<P: Protocol + ?Sized>(p: &mut P) -> Result<Self> {
        let (elem, size) = p.read_list_begin()?;
        if elem != T::TTYPE {
            return Err(ProtocolError::invalid_data(format!(
                "list of {elem}, expected list of {}",
                T::TTYPE
            )));
        }
        let mut out = Vec::with_capacity(size.min(LIST_PREALLOC));
        for _ in 0..size {
            out.push(T::read(p)?);
        }
        p.read_list_end()?;
        Ok(out)
    }
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub struct $name:ident { $($variant:ident = $value:literal,)* }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(pub i32);

        impl $name {
            $(pub const $variant: $name = $name($value);)*

            /// Symbolic name, `None` for codes this build does not know.
            pub fn name(self) -> Option<&'static str> {
                match self.0 {
                    $($value => Some(stringify!($variant)),)*
                    _ => None,
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
                match self.name() {
                    Some(name) => s.serialize_str(name),
                    None => s.serialize_i32(self.0),
                }
            }
        }

        impl WireValue for $name {
            const TTYPE: TType = TType::I32;

            fn write<P: Protocol + ?Sized>(&self, p: &mut P) -> Result<()> {
                p.write_i32(self.0)
            }

            fn read<P: Protocol + ?Sized>(p: &mut P) -> Result<Self> {
                Ok($name(p.read_i32()?))
            }
        }
    };
}

wire_enum! {
    /// `sandesh_op`: what the kernel should do with a request.
    pub struct SandeshOp {
        ADD = 0,
        GET = 1,
        DEL = 2,
        DUMP = 3,
        RESPONSE = 4,
        RESET = 5,
    }
}

wire_enum! {
    /// `flow_op`, the flow table's own operation code.
    pub struct FlowOp {
        FLOW_SET = 0,
        FLOW_LIST = 1,
        FLOW_TABLE_GET = 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MemoryBuffer, SandeshProtocol};

    #[test]
    fn test_unsigned_types_share_signed_bits() {
        let mut p = SandeshProtocol::new(MemoryBuffer::new());
        u32::MAX.write(&mut p).unwrap();
        0x8000u16.write(&mut p).unwrap();
        assert_eq!(
            p.transport().unread(),
            &[0xff, 0xff, 0xff, 0xff, 0x80, 0x00]
        );
        assert_eq!(u32::read(&mut p).unwrap(), u32::MAX);
        assert_eq!(u16::read(&mut p).unwrap(), 0x8000);
    }

    #[test]
    fn test_list_element_type_mismatch() {
        let mut p = SandeshProtocol::new(MemoryBuffer::new());
        vec![1i16, 2].write(&mut p).unwrap();
        let err = Vec::<i32>::read(&mut p).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidData(_)));
    }

    #[test]
    fn test_byte_list() {
        let mut p = SandeshProtocol::new(MemoryBuffer::new());
        vec![0xdeu8, 0xad].write(&mut p).unwrap();
        assert_eq!(p.transport().unread(), &[3, 0, 0, 0, 2, 0xde, 0xad]);
        assert_eq!(Vec::<u8>::read(&mut p).unwrap(), vec![0xde, 0xad]);
    }

    #[test]
    fn test_op_names() {
        assert_eq!(SandeshOp::DUMP.name(), Some("DUMP"));
        assert_eq!(SandeshOp(77).name(), None);
        assert_eq!(FlowOp::default(), FlowOp::FLOW_SET);
        assert_eq!(serde_json::to_string(&SandeshOp::ADD).unwrap(), "\"ADD\"");
        assert_eq!(serde_json::to_string(&SandeshOp(77)).unwrap(), "77");
    }
}
