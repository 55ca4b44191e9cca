//! Parameter binder (component G, §4.G, §3 "Statement" param slots).
//!
//! The teacher's CDC client never issues `COM_STMT_EXECUTE`, so there is
//! no analogous source to ground this on; it is built directly from
//! spec.md §4.G and the binary value shapes already established by
//! `crate::value`/`proto::temporal`. Per spec.md §9 "Reflection-based
//! parameter binding": a tagged variant (`Param`) over the recognised
//! value shapes, plus a hand-written positional/record converter —
//! no dynamic introspection.

use byteorder::{LittleEndian, WriteBytesExt};

use proto::{write_len_enc_bytes, ColumnType};

use crate::error::{Error, Result};

/// One parameter value, in the shape the binary protocol can carry
/// (spec.md §4.G). `Null` is distinct from "unbound" (see
/// `StatementHandle::bind_params`): both result in the null bit being
/// set at EXECUTE time, but `Null` records that the caller bound it on
/// purpose.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    TinyInt(i8),
    TinyUInt(u8),
    SmallInt(i16),
    SmallUInt(u16),
    Int(i32),
    UInt(u32),
    BigInt(i64),
    BigUInt(u64),
    Float32(f32),
    Float64(f64),
    Bytes(Vec<u8>),
    Text(String),
    Date(proto::Date),
    Time(proto::Time),
    DateTime(proto::DateTime),
    Timestamp(proto::DateTime),
    /// Escape hatch: caller-provided MySQL type code and pre-encoded
    /// binary-protocol bytes, sent verbatim (spec.md §4.G "raw opaque").
    Raw { type_code: u16, bytes: Vec<u8> },
}

impl Param {
    /// The `(type code, unsigned)` pair sent in EXECUTE's parameter type
    /// block when `rebind` is set (spec.md §4.D).
    pub fn wire_type(&self) -> (u16, bool) {
        match self {
            Param::Null => (ColumnType::Null as u16, false),
            Param::TinyInt(_) => (ColumnType::Tiny as u16, false),
            Param::TinyUInt(_) => (ColumnType::Tiny as u16, true),
            Param::SmallInt(_) => (ColumnType::Short as u16, false),
            Param::SmallUInt(_) => (ColumnType::Short as u16, true),
            Param::Int(_) => (ColumnType::Long as u16, false),
            Param::UInt(_) => (ColumnType::Long as u16, true),
            Param::BigInt(_) => (ColumnType::LongLong as u16, false),
            Param::BigUInt(_) => (ColumnType::LongLong as u16, true),
            Param::Float32(_) => (ColumnType::Float as u16, false),
            Param::Float64(_) => (ColumnType::Double as u16, false),
            Param::Bytes(_) => (ColumnType::Blob as u16, false),
            Param::Text(_) => (ColumnType::VarString as u16, false),
            Param::Date(_) => (ColumnType::Date as u16, false),
            Param::Time(_) => (ColumnType::Time as u16, false),
            Param::DateTime(_) => (ColumnType::DateTime as u16, false),
            Param::Timestamp(_) => (ColumnType::Timestamp as u16, false),
            Param::Raw { type_code, .. } => (*type_code, false),
        }
    }

    /// Appends this value's binary-protocol encoding to `buf`. Must not
    /// be called for `Null` (the null bitmap elides the value entirely).
    pub fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Param::Null => {}
            Param::TinyInt(v) => buf.push(*v as u8),
            Param::TinyUInt(v) => buf.push(*v),
            Param::SmallInt(v) => buf.write_i16::<LittleEndian>(*v).unwrap(),
            Param::SmallUInt(v) => buf.write_u16::<LittleEndian>(*v).unwrap(),
            Param::Int(v) => buf.write_i32::<LittleEndian>(*v).unwrap(),
            Param::UInt(v) => buf.write_u32::<LittleEndian>(*v).unwrap(),
            Param::BigInt(v) => buf.write_i64::<LittleEndian>(*v).unwrap(),
            Param::BigUInt(v) => buf.write_u64::<LittleEndian>(*v).unwrap(),
            Param::Float32(v) => buf.write_f32::<LittleEndian>(*v).unwrap(),
            Param::Float64(v) => buf.write_f64::<LittleEndian>(*v).unwrap(),
            Param::Bytes(bytes) => write_len_enc_bytes(buf, bytes),
            Param::Text(text) => write_len_enc_bytes(buf, text.as_bytes()),
            Param::Date(date) => proto::temporal::write_date(buf, date),
            Param::Time(time) => proto::temporal::write_time(buf, time),
            Param::DateTime(dt) | Param::Timestamp(dt) => proto::temporal::write_date_time(buf, dt),
            Param::Raw { bytes, .. } => buf.extend_from_slice(bytes),
        }
    }
}

/// Converts a single application value into a `Param`. Implemented for
/// the primitive shapes spec.md §4.G names; callers needing a type not
/// covered here reach for `Param::Raw`.
pub trait IntoParam {
    fn into_param(self) -> Param;
}

macro_rules! into_param_impls {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl IntoParam for $ty {
                fn into_param(self) -> Param {
                    Param::$variant(self)
                }
            }
        )*
    };
}

into_param_impls! {
    i8 => TinyInt,
    u8 => TinyUInt,
    i16 => SmallInt,
    u16 => SmallUInt,
    i32 => Int,
    u32 => UInt,
    i64 => BigInt,
    u64 => BigUInt,
    f32 => Float32,
    f64 => Float64,
    Vec<u8> => Bytes,
    String => Text,
    proto::Date => Date,
    proto::Time => Time,
}

impl IntoParam for &str {
    fn into_param(self) -> Param {
        Param::Text(self.to_string())
    }
}

impl IntoParam for &[u8] {
    fn into_param(self) -> Param {
        Param::Bytes(self.to_vec())
    }
}

impl IntoParam for Param {
    fn into_param(self) -> Param {
        self
    }
}

impl<T: IntoParam> IntoParam for Option<T> {
    fn into_param(self) -> Param {
        match self {
            Some(v) => v.into_param(),
            None => Param::Null,
        }
    }
}

/// A positional list of values, or a single structured record (spec.md
/// §4.G). Implemented for tuples up to arity 8 and for `Vec<Param>`; a
/// caller's own record type implements this directly, walking its
/// fields in declaration order (spec.md §9: no dynamic introspection).
pub trait IntoParams {
    fn into_params(self) -> Vec<Param>;
}

impl IntoParams for () {
    fn into_params(self) -> Vec<Param> {
        Vec::new()
    }
}

impl IntoParams for Vec<Param> {
    fn into_params(self) -> Vec<Param> {
        self
    }
}

macro_rules! into_params_tuple_impls {
    ($($name:ident),+) => {
        impl<$($name: IntoParam),+> IntoParams for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_params(self) -> Vec<Param> {
                let ($($name,)+) = self;
                vec![$($name.into_param()),+]
            }
        }
    };
}

into_params_tuple_impls!(A);
into_params_tuple_impls!(A, B);
into_params_tuple_impls!(A, B, C);
into_params_tuple_impls!(A, B, C, D);
into_params_tuple_impls!(A, B, C, D, E);
into_params_tuple_impls!(A, B, C, D, E, F);
into_params_tuple_impls!(A, B, C, D, E, F, G);
into_params_tuple_impls!(A, B, C, D, E, F, G, H);

/// Validates that `params` matches `expected` in length, per spec.md
/// §4.G `bind-count`.
pub fn check_param_count(expected: usize, params: &[Param]) -> Result<()> {
    if params.len() != expected {
        return Err(Error::ParamCountMismatch {
            expected,
            got: params.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuple_converts_to_positional_params() {
        let params = (3i32, "hello").into_params();
        assert_eq!(params, vec![Param::Int(3), Param::Text("hello".to_string())]);
    }

    #[test]
    fn option_none_becomes_null() {
        let p: Option<i32> = None;
        assert_eq!(p.into_param(), Param::Null);
    }

    #[test]
    fn unsigned_width_reflected_in_wire_type() {
        let (code, unsigned) = Param::UInt(5).wire_type();
        assert_eq!(code, ColumnType::Long as u16);
        assert!(unsigned);
    }

    #[test]
    fn count_mismatch_is_an_error() {
        let err = check_param_count(2, &[Param::Int(1)]).unwrap_err();
        assert!(matches!(err, Error::ParamCountMismatch { expected: 2, got: 1 }));
    }
}
