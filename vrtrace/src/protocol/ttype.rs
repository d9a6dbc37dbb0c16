use serde::Serialize;

/// One-byte wire type code.
///
/// Kept as a newtype rather than an enum because the byte arrives straight
/// off the wire and may hold codes this client does not understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TType(pub u8);

impl TType {
    pub const STOP: TType = TType(0);
    pub const VOID: TType = TType(1);
    pub const BOOL: TType = TType(2);
    pub const BYTE: TType = TType(3);
    pub const I08: TType = TType(3);
    pub const DOUBLE: TType = TType(4);
    pub const I16: TType = TType(6);
    pub const I32: TType = TType(8);
    pub const U64: TType = TType(9);
    pub const I64: TType = TType(10);
    pub const STRING: TType = TType(11);
    pub const UTF7: TType = TType(11);
    pub const STRUCT: TType = TType(12);
    pub const MAP: TType = TType(13);
    pub const SET: TType = TType(14);
    pub const LIST: TType = TType(15);
    pub const UTF8: TType = TType(16);
    pub const UTF16: TType = TType(17);
    pub const U16: TType = TType(19);
    pub const U32: TType = TType(20);

    /// Type byte to put on the wire for a field of nominal type `self`.
    ///
    /// Signed 16/32/64-bit integers become their synthetic unsigned alias
    /// when the field is unsigned; everything else passes through.
    pub fn to_wire(self, unsigned: bool) -> TType {
        match self {
            TType::I16 if unsigned => TType::U16,
            TType::I32 if unsigned => TType::U32,
            TType::I64 if unsigned => TType::U64,
            other => other,
        }
    }

    /// Inverse of [`TType::to_wire`]: folds the unsigned aliases back.
    pub fn from_wire(self) -> TType {
        match self {
            TType::U16 => TType::I16,
            TType::U32 => TType::I32,
            TType::U64 => TType::I64,
            other => other,
        }
    }

    pub fn is_unsigned_alias(self) -> bool {
        matches!(self, TType::U16 | TType::U32 | TType::U64)
    }
}

impl std::fmt::Display for TType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match *self {
            TType::STOP => "stop",
            TType::VOID => "void",
            TType::BOOL => "bool",
            TType::BYTE => "byte",
            TType::DOUBLE => "double",
            TType::I16 => "i16",
            TType::I32 => "i32",
            TType::U64 => "u64",
            TType::I64 => "i64",
            TType::STRING => "string",
            TType::STRUCT => "struct",
            TType::MAP => "map",
            TType::SET => "set",
            TType::LIST => "list",
            TType::UTF8 => "utf8",
            TType::UTF16 => "utf16",
            TType::U16 => "u16",
            TType::U32 => "u32",
            TType(other) => return write!(f, "type({other})"),
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsigned_substitution() {
        assert_eq!(TType::I16.to_wire(true), TType::U16);
        assert_eq!(TType::I32.to_wire(true), TType::U32);
        assert_eq!(TType::I64.to_wire(true), TType::U64);
        assert_eq!(TType::I32.to_wire(false), TType::I32);
        assert_eq!(TType::BYTE.to_wire(true), TType::BYTE);
        assert_eq!(TType::STRING.to_wire(true), TType::STRING);
    }

    #[test]
    fn test_wire_codes() {
        assert_eq!(TType::U64.0, 9);
        assert_eq!(TType::U16.0, 19);
        assert_eq!(TType::U32.0, 20);
        for t in [TType::U16, TType::U32, TType::U64] {
            assert!(t.is_unsigned_alias());
            assert_eq!(t.from_wire().to_wire(true), t);
        }
        assert_eq!(TType::LIST.from_wire(), TType::LIST);
    }
}
