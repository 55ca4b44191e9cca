//! Row cell values (§3 "Row") and the text/binary decoders that turn
//! wire bytes into them (§4.E).
//!
//! Grounded on `connection::conn::query_result::parse_text_value_by_type`
//! for the text-protocol column-type dispatch; the binary-protocol
//! null-bitmap and per-type binary shapes (spec.md §4.B/§4.E) are built
//! directly from the wire format since a binlog/CDC client never issues
//! `COM_STMT_EXECUTE`.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use proto::{read_date, read_date_time, read_len_enc_bytes, read_time, ColumnType};

use crate::error::{Error, Result};
use crate::field::FieldDescriptor;

/// One decoded result-set cell. Integers of every wire width collapse
/// into `Int`/`UInt` here; the width only matters for how the bytes are
/// framed on the wire (spec.md §3 lists widths 1/2/3/4/8, all of which
/// fit in an `i64`/`u64` without loss).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    String(String),
    Date(proto::Date),
    Time(proto::Time),
    DateTime(proto::DateTime),
    Timestamp(proto::DateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Decodes the binary-protocol null-bitmap that prefixes a
/// `COM_STMT_EXECUTE` row: `⌈(field_count+2)/8⌉` bytes, bit-offset by 2
/// (the first two bits are reserved), per spec.md §4.E.
pub fn read_binary_null_bitmap(cursor: &mut Cursor<&[u8]>, field_count: usize) -> Result<Vec<bool>> {
    let byte_len = (field_count + 2 + 7) / 8;
    let mut bytes = vec![0u8; byte_len];
    std::io::Read::read_exact(cursor, &mut bytes)?;

    let mut nulls = Vec::with_capacity(field_count);
    for i in 0..field_count {
        let bit_pos = i + 2;
        let byte = bytes[bit_pos / 8];
        nulls.push((byte >> (bit_pos % 8)) & 1 != 0);
    }
    Ok(nulls)
}

/// Decodes one non-null binary-protocol value per the column's declared
/// type (spec.md §4.B).
pub fn decode_binary_value(cursor: &mut Cursor<&[u8]>, field: &FieldDescriptor) -> Result<Value> {
    let unsigned = field.is_unsigned();
    Ok(match field.column_type {
        ColumnType::Tiny => {
            if unsigned {
                Value::UInt(cursor.read_u8()? as u64)
            } else {
                Value::Int(cursor.read_i8()? as i64)
            }
        }
        ColumnType::Short | ColumnType::Year => {
            if unsigned {
                Value::UInt(cursor.read_u16::<LittleEndian>()? as u64)
            } else {
                Value::Int(cursor.read_i16::<LittleEndian>()? as i64)
            }
        }
        ColumnType::Long | ColumnType::Int24 => {
            if unsigned {
                Value::UInt(cursor.read_u32::<LittleEndian>()? as u64)
            } else {
                Value::Int(cursor.read_i32::<LittleEndian>()? as i64)
            }
        }
        ColumnType::LongLong => {
            if unsigned {
                Value::UInt(cursor.read_u64::<LittleEndian>()?)
            } else {
                Value::Int(cursor.read_i64::<LittleEndian>()?)
            }
        }
        ColumnType::Float => Value::Float(cursor.read_f32::<LittleEndian>()?),
        ColumnType::Double => Value::Double(cursor.read_f64::<LittleEndian>()?),
        ColumnType::Date | ColumnType::NewDate => match read_date(cursor)? {
            Some(date) => Value::Date(date),
            None => Value::Date(proto::Date::default()),
        },
        ColumnType::Time => Value::Time(read_time(cursor)?),
        ColumnType::DateTime => Value::DateTime(read_date_time(cursor)?),
        ColumnType::Timestamp => Value::Timestamp(read_date_time(cursor)?),
        ColumnType::Decimal
        | ColumnType::NewDecimal
        | ColumnType::VarChar
        | ColumnType::VarString
        | ColumnType::String
        | ColumnType::Enum
        | ColumnType::Set
        | ColumnType::Json
        | ColumnType::Bit
        | ColumnType::TinyBlob
        | ColumnType::MediumBlob
        | ColumnType::LongBlob
        | ColumnType::Blob
        | ColumnType::Geometry => Value::Bytes(read_len_enc_bytes(cursor)?),
        ColumnType::Null => Value::Null,
    })
}

/// Decodes one text-protocol cell: the wire always carries a
/// length-encoded string (or the `0xFB` NULL marker, already stripped
/// out by the caller), which is then parsed per the column's declared
/// type so callers see the same typed `Value` as the binary protocol
/// produces.
pub fn decode_text_value(raw: Option<Vec<u8>>, field: &FieldDescriptor) -> Result<Value> {
    let Some(raw) = raw else {
        return Ok(Value::Null);
    };
    let text = String::from_utf8_lossy(&raw).into_owned();
    let unsigned = field.is_unsigned();

    let parse_int = |s: &str| -> Result<i64> {
        s.parse::<i64>()
            .map_err(|_| Error::Other(format!("cannot parse {s:?} as integer")))
    };
    let parse_uint = |s: &str| -> Result<u64> {
        s.parse::<u64>()
            .map_err(|_| Error::Other(format!("cannot parse {s:?} as unsigned integer")))
    };

    Ok(match field.column_type {
        ColumnType::Tiny | ColumnType::Short | ColumnType::Int24 | ColumnType::Long | ColumnType::Year => {
            if unsigned {
                Value::UInt(parse_uint(&text)?)
            } else {
                Value::Int(parse_int(&text)?)
            }
        }
        ColumnType::LongLong => {
            if unsigned {
                Value::UInt(parse_uint(&text)?)
            } else {
                Value::Int(parse_int(&text)?)
            }
        }
        ColumnType::Float => Value::Float(
            text.parse()
                .map_err(|_| Error::Other(format!("cannot parse {text:?} as float")))?,
        ),
        ColumnType::Double | ColumnType::Decimal | ColumnType::NewDecimal => Value::Double(
            text.parse()
                .map_err(|_| Error::Other(format!("cannot parse {text:?} as double")))?,
        ),
        ColumnType::Date | ColumnType::NewDate => {
            let mut parts = text.splitn(3, '-');
            let (y, m, d) = (parts.next(), parts.next(), parts.next());
            match (y, m, d) {
                (Some(y), Some(m), Some(d)) => Value::Date(proto::Date {
                    year: y.parse().unwrap_or(0),
                    month: m.parse().unwrap_or(0),
                    day: d.parse().unwrap_or(0),
                }),
                _ => Value::Bytes(raw),
            }
        }
        ColumnType::Time
        | ColumnType::DateTime
        | ColumnType::Timestamp
        | ColumnType::TinyBlob
        | ColumnType::MediumBlob
        | ColumnType::LongBlob
        | ColumnType::Blob
        | ColumnType::Geometry
        | ColumnType::Bit => Value::Bytes(raw),
        ColumnType::Null => Value::Null,
        _ => Value::String(text),
    })
}
