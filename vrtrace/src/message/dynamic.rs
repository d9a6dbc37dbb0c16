use std::collections::BTreeMap;

use serde::Serialize;

use crate::protocol::{Protocol, ProtocolError, Result, TType, DEFAULT_SKIP_DEPTH};

/// One decoded value whose shape is known only from its wire type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U16(u16),
    U32(u32),
    U64(u64),
    Double(f64),
    String(String),
    Binary(Vec<u8>),
    List(Vec<Value>),
    Struct(FieldBag),
}

/// A struct decoded without a typed record: the name plus its fields by id.
///
/// Integers tagged unsigned on the wire come back as the unsigned variants.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldBag {
    pub name: String,
    pub fields: BTreeMap<i16, Value>,
}

impl FieldBag {
    pub fn get(&self, id: i16) -> Option<&Value> {
        self.fields.get(&id)
    }

    pub fn read<P: Protocol + ?Sized>(p: &mut P) -> Result<Self> {
        let name = p.read_struct_begin()?;
        Self::read_body(name, p)
    }

    /// Decode the fields of a struct whose name has already been read.
    pub fn read_body<P: Protocol + ?Sized>(name: String, p: &mut P) -> Result<Self> {
        read_fields(name, p, DEFAULT_SKIP_DEPTH)
    }
}

fn read_fields<P: Protocol + ?Sized>(name: String, p: &mut P, depth: usize) -> Result<FieldBag> {
    let mut bag = FieldBag {
        name,
        fields: BTreeMap::new(),
    };
    loop {
        let (ttype, id) = p.read_field_begin()?;
        if ttype == TType::STOP {
            break;
        }
        let unsigned = p.last_field_unsigned();
        match read_value(p, ttype, unsigned, depth)? {
            Some(value) => {
                bag.fields.insert(id, value);
            }
            None => tracing::debug!(struct_name = %bag.name, id, %ttype, "dropping empty container"),
        }
        p.read_field_end()?;
    }
    p.read_struct_end()?;
    Ok(bag)
}

/// `None` for map and set fields, which Sandesh never frames.
fn read_value<P: Protocol + ?Sized>(
    p: &mut P,
    ttype: TType,
    unsigned: bool,
    depth: usize,
) -> Result<Option<Value>> {
    if depth == 0 {
        return Err(ProtocolError::DepthLimit);
    }
    let value = match ttype {
        TType::BOOL => Value::Bool(p.read_bool()?),
        TType::BYTE => Value::Byte(p.read_byte()?),
        TType::I16 if unsigned => Value::U16(p.read_i16()? as u16),
        TType::I16 => Value::I16(p.read_i16()?),
        TType::I32 if unsigned => Value::U32(p.read_i32()? as u32),
        TType::I32 => Value::I32(p.read_i32()?),
        TType::I64 if unsigned => Value::U64(p.read_i64()? as u64),
        TType::I64 => Value::I64(p.read_i64()?),
        TType::DOUBLE => Value::Double(p.read_double()?),
        TType::STRING | TType::UTF8 | TType::UTF16 => {
            let bytes = p.read_binary()?;
            match String::from_utf8(bytes) {
                Ok(s) => Value::String(s),
                Err(e) => Value::Binary(e.into_bytes()),
            }
        }
        TType::STRUCT => {
            let name = p.read_struct_begin()?;
            Value::Struct(read_fields(name, p, depth - 1)?)
        }
        TType::LIST => {
            let (elem, size) = p.read_list_begin()?;
            let elem_unsigned = p.last_field_unsigned();
            let mut items = Vec::new();
            for _ in 0..size {
                if let Some(item) = read_value(p, elem, elem_unsigned, depth - 1)? {
                    items.push(item);
                }
            }
            p.read_list_end()?;
            Value::List(items)
        }
        TType::MAP | TType::SET => {
            p.skip(ttype)?;
            return Ok(None);
        }
        other => {
            return Err(ProtocolError::invalid_data(format!(
                "unexpected value type {other}"
            )))
        }
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StructKind;
    use crate::protocol::{MemoryBuffer, SandeshProtocol};

    #[test]
    fn test_bag_uses_wire_signedness() {
        let mut p = SandeshProtocol::new(MemoryBuffer::new());
        p.write_struct_begin("vr_qos_map_req").unwrap();
        p.write_field_begin("qmr_rid", TType::I16, 1).unwrap();
        p.write_i16(-1).unwrap();
        p.write_field_begin("qmr_id", TType::I16, 2).unwrap();
        p.write_i16(-1).unwrap();
        p.write_field_begin("qmr_dscp", TType::LIST, 3).unwrap();
        p.write_list_begin(TType::BYTE, 2).unwrap();
        p.write_byte(1).unwrap();
        p.write_byte(2).unwrap();
        p.write_field_begin("qmr_name", TType::STRING, 9).unwrap();
        p.write_string("default").unwrap();
        p.write_struct_end().unwrap();

        let mut r = SandeshProtocol::new(MemoryBuffer::from_bytes(p.into_inner().take_bytes()));
        let bag = FieldBag::read(&mut r).unwrap();
        assert_eq!(bag.name, "vr_qos_map_req");
        assert_eq!(bag.get(1), Some(&Value::I16(-1)));
        assert_eq!(bag.get(2), Some(&Value::U16(65535)));
        assert_eq!(
            bag.get(3),
            Some(&Value::List(vec![Value::Byte(1), Value::Byte(2)]))
        );
        assert_eq!(bag.get(9), Some(&Value::String("default".into())));
    }

    #[test]
    fn test_every_kind_tags_exactly_its_unsigned_ids() {
        let mut unsigned_seen = 0;
        for kind in StructKind::ALL {
            let mut p = SandeshProtocol::new(MemoryBuffer::new());
            p.write_struct_begin(kind.name()).unwrap();
            for id in 1..=100i16 {
                p.write_field_begin("f", TType::I32, id).unwrap();
                p.write_i32(-1).unwrap();
            }
            p.write_struct_end().unwrap();

            let mut r = SandeshProtocol::new(MemoryBuffer::from_bytes(p.into_inner().take_bytes()));
            let bag = FieldBag::read(&mut r).unwrap();
            assert_eq!(bag.name, kind.name());
            assert_eq!(StructKind::from_name(&bag.name), Some(kind));
            assert!(r.transport().is_empty());

            let table = kind.signedness();
            for id in 1..=100i16 {
                let expected = if table.is_unsigned(id) {
                    unsigned_seen += 1;
                    Value::U32(u32::MAX)
                } else {
                    Value::I32(-1)
                };
                assert_eq!(bag.get(id), Some(&expected), "{kind} field {id}");
            }
        }
        assert!(unsigned_seen > 0);
    }

    #[test]
    fn test_nested_struct_and_binary() {
        let mut p = SandeshProtocol::new(MemoryBuffer::new());
        p.write_struct_begin("outer").unwrap();
        p.write_field_begin("inner", TType::STRUCT, 1).unwrap();
        p.write_struct_begin("inner").unwrap();
        p.write_field_begin("raw", TType::STRING, 1).unwrap();
        p.write_binary(&[0xff, 0xfe]).unwrap();
        p.write_struct_end().unwrap();
        p.write_struct_end().unwrap();

        let mut r = SandeshProtocol::new(MemoryBuffer::from_bytes(p.into_inner().take_bytes()));
        let bag = FieldBag::read(&mut r).unwrap();
        let Some(Value::Struct(inner)) = bag.get(1) else {
            panic!("expected nested struct, got {:?}", bag.get(1));
        };
        assert_eq!(inner.name, "inner");
        assert_eq!(inner.get(1), Some(&Value::Binary(vec![0xff, 0xfe])));

        let json = serde_json::to_value(&bag).unwrap();
        assert_eq!(json["fields"]["1"]["name"], "inner");
    }
}
