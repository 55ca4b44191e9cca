//! Field (column) descriptors, per spec.md §3 "Field descriptor" and
//! §4.D's PREPARE/EXECUTE field-packet sequences.
//!
//! Grounded on `connection::packet::result_set_column_packet::ResultSetColumnPacket`,
//! renamed to spell out which name is the underlying catalog object and
//! which is the query-time alias, per spec.md's "table (real and
//! aliased)" / "column (real and aliased)" wording.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use proto::{read_len_enc_int, read_len_enc_string, ColumnType};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub catalog: String,
    pub database: String,
    /// Aliased table name (`AS` in the query), "table" per spec.md §3.
    pub table_alias: String,
    /// Real underlying table name.
    pub table: String,
    /// Aliased column name, "column" per spec.md §3.
    pub column_alias: String,
    /// Real underlying column name.
    pub column: String,
    pub character_set: u16,
    pub max_display_length: u32,
    pub column_type: ColumnType,
    pub flags: u16,
    pub decimals: u8,
}

pub const UNSIGNED_FLAG: u16 = 0x0020;

impl FieldDescriptor {
    pub fn is_unsigned(&self) -> bool {
        self.flags & UNSIGNED_FLAG != 0
    }

    pub fn parse(packet: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(packet);
        let catalog = read_len_enc_string(&mut cursor)?;
        let database = read_len_enc_string(&mut cursor)?;
        let table_alias = read_len_enc_string(&mut cursor)?;
        let table = read_len_enc_string(&mut cursor)?;
        let column_alias = read_len_enc_string(&mut cursor)?;
        let column = read_len_enc_string(&mut cursor)?;
        let _fixed_len_fields_len = read_len_enc_int(&mut cursor)?; // always 0x0C
        let character_set = cursor.read_u16::<LittleEndian>()?;
        let max_display_length = cursor.read_u32::<LittleEndian>()?;
        let type_code = cursor.read_u8()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let decimals = cursor.read_u8()?;

        let column_type = ColumnType::try_from(type_code)
            .map_err(|_| proto::ProtoError::UnsupportedType(type_code as u16))?;

        Ok(Self {
            catalog,
            database,
            table_alias,
            table,
            column_alias,
            column,
            character_set,
            max_display_length,
            column_type,
            flags,
            decimals,
        })
    }
}
