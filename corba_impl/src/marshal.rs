//! TypeCode-driven CDR marshalling of dynamically-typed [`Value`]s.
//!
//! This is the bridge between the structural [`crate::any::Any`] system and the [`crate::cdr`]
//! wire codec: given a `TypeCode`, `encode_value`/`decode_value` walk it and the paired `Value` in
//! lockstep, recursing into struct members, union branches, and sequence/array elements.
//!
//! Object references are marshalled via their stringified IOR form, and a TypeCode is marshalled
//! on the wire as a reference to its repository id — this runtime does not marshal anonymous,
//! unregistered TypeCode trees (see `DESIGN.md`).

use crate::any::Value;
use crate::cdr::{Decoder, Encoder};
use crate::error::{CorbaError, CorbaResult};
use crate::ior::ObjectRef;
use crate::typecode::{get_by_id_checked, Kind, Label, TypeCode};
use std::str::FromStr;

pub fn encode_value(enc: &mut Encoder, tc: &TypeCode, v: &Value) -> CorbaResult<()> {
    match (tc.kind(), v) {
        (Kind::Null | Kind::Void, _) => Ok(()),
        (Kind::Short, Value::Short(x)) => Ok(enc.write_short(*x)),
        (Kind::UShort, Value::UShort(x)) => Ok(enc.write_ushort(*x)),
        (Kind::Long, Value::Long(x)) => Ok(enc.write_long(*x)),
        (Kind::ULong, Value::ULong(x)) => Ok(enc.write_ulong(*x)),
        (Kind::LongLong, Value::LongLong(x)) => Ok(enc.write_longlong(*x)),
        (Kind::ULongLong, Value::ULongLong(x)) => Ok(enc.write_ulonglong(*x)),
        (Kind::Float, Value::Float(x)) => Ok(enc.write_float(*x)),
        (Kind::Double, Value::Double(x)) => Ok(enc.write_double(*x)),
        (Kind::Boolean, Value::Boolean(x)) => Ok(enc.write_bool(*x)),
        (Kind::Char, Value::Char(x)) => Ok(enc.write_char(*x)),
        (Kind::Octet, Value::Octet(x)) => Ok(enc.write_octet(*x)),
        (Kind::String, Value::Str(s)) => Ok(enc.write_string(s)),
        (Kind::Object, Value::ObjectRef(r)) => {
            let s = r.as_ref().map(ObjectRef::to_stringified).unwrap_or_default();
            Ok(enc.write_string(&s))
        }
        (Kind::Enum, Value::Enum(name)) => {
            let idx = (0..tc.member_count())
                .find(|&i| tc.member_name(i) == Some(name.as_str()))
                .ok_or(CorbaError::TypeMismatch("enumerator not found in TypeCode"))?;
            Ok(enc.write_ulong(idx as u32))
        }
        (Kind::Sequence, Value::Sequence(items)) => {
            let elem_tc = tc.content_type().ok_or(CorbaError::Impl("sequence TypeCode lacks content_type"))?;
            enc.write_sequence_len(items.len() as u32);
            for item in items {
                encode_value(enc, elem_tc, item)?;
            }
            Ok(())
        }
        (Kind::Array, Value::Sequence(items)) => {
            let elem_tc = tc.content_type().ok_or(CorbaError::Impl("array TypeCode lacks content_type"))?;
            for item in items {
                encode_value(enc, elem_tc, item)?;
            }
            Ok(())
        }
        (Kind::Struct | Kind::Except, Value::Struct(fields)) => {
            for (i, (_name, val)) in fields.iter().enumerate() {
                let mt = tc
                    .member_type(i)
                    .ok_or(CorbaError::TypeMismatch("struct has fewer members than value"))?;
                encode_value(enc, mt, val)?;
            }
            Ok(())
        }
        (Kind::Union, Value::Union(boxed)) => {
            let (label, value) = boxed.as_ref();
            let disc_tc = tc.discriminator_type().ok_or(CorbaError::Impl("union TypeCode lacks discriminator"))?;
            encode_label(enc, disc_tc, label)?;
            let member_idx = (0..tc.member_count()).find(|&i| tc.member_label(i) == Some(label));
            let member_tc = match member_idx.or_else(|| {
                let d = tc.default_index();
                (d >= 0).then_some(d as usize)
            }) {
                Some(i) => tc.member_type(i).ok_or(CorbaError::Impl("union member index out of range"))?,
                None => return Err(CorbaError::TypeMismatch("no union branch matches discriminator")),
            };
            encode_value(enc, member_tc, value)
        }
        (Kind::Alias, _) => {
            let target = tc.content_type().ok_or(CorbaError::Impl("alias TypeCode lacks content_type"))?;
            encode_value(enc, target, v)
        }
        (Kind::Any, Value::Struct(_)) | (Kind::TypeCode, _) => {
            Err(CorbaError::Impl("nested Any/TypeCode marshalling is not supported"))
        }
        _ => Err(CorbaError::TypeMismatch("value does not match typecode kind during encode")),
    }
}

fn encode_label(enc: &mut Encoder, disc_tc: &TypeCode, label: &Label) -> CorbaResult<()> {
    match (disc_tc.kind(), label) {
        (Kind::Long, Label::Long(v)) => Ok(enc.write_long(*v)),
        (Kind::ULong, Label::ULong(v)) => Ok(enc.write_ulong(*v)),
        (Kind::Short, Label::Short(v)) => Ok(enc.write_short(*v)),
        (Kind::UShort, Label::UShort(v)) => Ok(enc.write_ushort(*v)),
        (Kind::Char, Label::Char(v)) => Ok(enc.write_char(*v)),
        (Kind::Boolean, Label::Boolean(v)) => Ok(enc.write_bool(*v)),
        (Kind::Enum, Label::Enum(name)) => {
            let idx = (0..disc_tc.member_count())
                .find(|&i| disc_tc.member_name(i) == Some(name.as_str()))
                .ok_or(CorbaError::TypeMismatch("union discriminator enumerator not found"))?;
            Ok(enc.write_ulong(idx as u32))
        }
        _ => Err(CorbaError::TypeMismatch("union label does not match discriminator typecode")),
    }
}

pub fn decode_value(dec: &mut Decoder, tc: &TypeCode) -> CorbaResult<Value> {
    match tc.kind() {
        Kind::Null => Ok(Value::Null),
        Kind::Void => Ok(Value::Void),
        Kind::Short => Ok(Value::Short(dec.read_short()?)),
        Kind::UShort => Ok(Value::UShort(dec.read_ushort()?)),
        Kind::Long => Ok(Value::Long(dec.read_long()?)),
        Kind::ULong => Ok(Value::ULong(dec.read_ulong()?)),
        Kind::LongLong => Ok(Value::LongLong(dec.read_longlong()?)),
        Kind::ULongLong => Ok(Value::ULongLong(dec.read_ulonglong()?)),
        Kind::Float => Ok(Value::Float(dec.read_float()?)),
        Kind::Double => Ok(Value::Double(dec.read_double()?)),
        Kind::Boolean => Ok(Value::Boolean(dec.read_bool()?)),
        Kind::Char => Ok(Value::Char(dec.read_char()?)),
        Kind::Octet => Ok(Value::Octet(dec.read_octet()?)),
        Kind::String => Ok(Value::Str(dec.read_string()?)),
        Kind::Object => {
            let s = dec.read_string()?;
            if s.is_empty() {
                Ok(Value::ObjectRef(None))
            } else {
                Ok(Value::ObjectRef(Some(ObjectRef::from_str(&s)?)))
            }
        }
        Kind::Enum => {
            let idx = dec.read_ulong()? as usize;
            let name = tc
                .member_name(idx)
                .ok_or(CorbaError::TypeMismatch("enum index out of range"))?
                .to_string();
            Ok(Value::Enum(name))
        }
        Kind::Sequence => {
            let elem_tc = tc.content_type().ok_or(CorbaError::Impl("sequence TypeCode lacks content_type"))?;
            let len = dec.read_sequence_len()?;
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                items.push(decode_value(dec, elem_tc)?);
            }
            Ok(Value::Sequence(items))
        }
        Kind::Array => {
            let elem_tc = tc.content_type().ok_or(CorbaError::Impl("array TypeCode lacks content_type"))?;
            let mut items = Vec::with_capacity(tc.bound() as usize);
            for _ in 0..tc.bound() {
                items.push(decode_value(dec, elem_tc)?);
            }
            Ok(Value::Sequence(items))
        }
        Kind::Struct | Kind::Except => {
            let mut fields = Vec::with_capacity(tc.member_count());
            for i in 0..tc.member_count() {
                let name = tc.member_name(i).unwrap().to_string();
                let mt = tc.member_type(i).unwrap();
                fields.push((name, decode_value(dec, mt)?));
            }
            Ok(Value::Struct(fields))
        }
        Kind::Union => {
            let disc_tc = tc.discriminator_type().ok_or(CorbaError::Impl("union TypeCode lacks discriminator"))?;
            let label = decode_label(dec, disc_tc)?;
            let member_idx = (0..tc.member_count()).find(|&i| tc.member_label(i) == Some(&label));
            let member_tc = match member_idx.or_else(|| {
                let d = tc.default_index();
                (d >= 0).then_some(d as usize)
            }) {
                Some(i) => tc.member_type(i).unwrap(),
                None => return Err(CorbaError::TypeMismatch("no union branch matches discriminator")),
            };
            let value = decode_value(dec, member_tc)?;
            Ok(Value::Union(Box::new((label, value))))
        }
        Kind::Alias => {
            let target = tc.content_type().ok_or(CorbaError::Impl("alias TypeCode lacks content_type"))?;
            decode_value(dec, target)
        }
        Kind::Any | Kind::TypeCode => Err(CorbaError::Impl("nested Any/TypeCode marshalling is not supported")),
    }
}

fn decode_label(dec: &mut Decoder, disc_tc: &TypeCode) -> CorbaResult<Label> {
    match disc_tc.kind() {
        Kind::Long => Ok(Label::Long(dec.read_long()?)),
        Kind::ULong => Ok(Label::ULong(dec.read_ulong()?)),
        Kind::Short => Ok(Label::Short(dec.read_short()?)),
        Kind::UShort => Ok(Label::UShort(dec.read_ushort()?)),
        Kind::Char => Ok(Label::Char(dec.read_char()?)),
        Kind::Boolean => Ok(Label::Boolean(dec.read_bool()?)),
        Kind::Enum => {
            let idx = dec.read_ulong()? as usize;
            let name = disc_tc
                .member_name(idx)
                .ok_or(CorbaError::TypeMismatch("union discriminator index out of range"))?
                .to_string();
            Ok(Label::Enum(name))
        }
        _ => Err(CorbaError::TypeMismatch("unsupported union discriminator kind")),
    }
}

/// Encodes an `Any` as `{ string repo_id; <value per the TypeCode>; }`, the embedded-TypeCode
/// form §4.A calls for, simplified to a repository-id reference (see module docs).
pub fn encode_any(enc: &mut Encoder, tc: &TypeCode, v: &Value) -> CorbaResult<()> {
    enc.write_string(tc.repo_id());
    encode_value(enc, tc, v)
}

pub fn decode_any(dec: &mut Decoder) -> CorbaResult<(TypeCode, Value)> {
    let repo_id = dec.read_string()?;
    let tc = get_by_id_checked(&repo_id)?;
    let value = decode_value(dec, &tc)?;
    Ok((tc, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdr::Endian;
    use crate::typecode::get_basic;

    #[test]
    fn primitive_value_round_trips() {
        let tc = get_basic(Kind::Double);
        let v = Value::Double(3.25);
        let mut enc = Encoder::new(Endian::Big);
        encode_value(&mut enc, &tc, &v).unwrap();
        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes).unwrap();
        assert_eq!(decode_value(&mut dec, &tc).unwrap(), v);
    }

    #[test]
    fn sequence_of_strings_round_trips() {
        let tc = TypeCode::create_sequence(get_basic(Kind::String), 0);
        let v = Value::Sequence(vec![Value::Str("a".into()), Value::Str("bb".into())]);
        let mut enc = Encoder::new(Endian::Little);
        encode_value(&mut enc, &tc, &v).unwrap();
        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes).unwrap();
        assert_eq!(decode_value(&mut dec, &tc).unwrap(), v);
    }

    #[test]
    fn any_round_trips_with_embedded_repo_id() {
        let tc = get_basic(Kind::Long);
        let v = Value::Long(7);
        let mut enc = Encoder::new(Endian::Big);
        encode_any(&mut enc, &tc, &v).unwrap();
        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes).unwrap();
        let (decoded_tc, decoded_v) = decode_any(&mut dec).unwrap();
        assert_eq!(decoded_tc, tc);
        assert_eq!(decoded_v, v);
    }
}
