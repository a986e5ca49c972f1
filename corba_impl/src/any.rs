//! A dynamically typed value paired with the [`TypeCode`] that witnesses its shape.

use crate::error::{CorbaError, CorbaResult};
use crate::ior::ObjectRef;
use crate::typecode::{Kind, Label, TypeCode};

/// A boxed, dynamically-typed value.
///
/// Composite variants mirror the composite `Kind`s: a struct is an ordered list of named fields, a
/// union pairs its active discriminator label with the active member's value, a sequence is an
/// ordered list of same-typed elements.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Void,
    Short(i16),
    UShort(u16),
    Long(i32),
    ULong(u32),
    LongLong(i64),
    ULongLong(u64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Char(u8),
    Octet(u8),
    Str(String),
    Enum(String),
    Struct(Vec<(String, Value)>),
    Union(Box<(Label, Value)>),
    Sequence(Vec<Value>),
    ObjectRef(Option<ObjectRef>),
}

impl Value {
    fn matches_shape(&self, tc: &TypeCode) -> bool {
        match (self, tc.kind()) {
            (Value::Null, Kind::Null) => true,
            (Value::Void, Kind::Void) => true,
            (Value::Short(_), Kind::Short) => true,
            (Value::UShort(_), Kind::UShort) => true,
            (Value::Long(_), Kind::Long) => true,
            (Value::ULong(_), Kind::ULong) => true,
            (Value::LongLong(_), Kind::LongLong) => true,
            (Value::ULongLong(_), Kind::ULongLong) => true,
            (Value::Float(_), Kind::Float) => true,
            (Value::Double(_), Kind::Double) => true,
            (Value::Boolean(_), Kind::Boolean) => true,
            (Value::Char(_), Kind::Char) => true,
            (Value::Octet(_), Kind::Octet) => true,
            (Value::Str(_), Kind::String) => true,
            (Value::ObjectRef(_), Kind::Object) => true,
            (Value::Enum(name), Kind::Enum) => {
                (0..tc.member_count()).any(|i| tc.member_name(i) == Some(name.as_str()))
            }
            (Value::Sequence(items), Kind::Sequence) => {
                let elem = tc.content_type().expect("sequence TypeCode lacks content_type");
                if tc.bound() != 0 && items.len() as u32 > tc.bound() {
                    return false;
                }
                match items.first() {
                    Some(first) => first.matches_shape(elem),
                    None => true,
                }
            }
            (Value::Sequence(items), Kind::Array) => {
                let elem = tc.content_type().expect("array TypeCode lacks content_type");
                items.len() as u32 == tc.bound()
                    && items.iter().all(|v| v.matches_shape(elem))
            }
            (Value::Struct(fields), Kind::Struct | Kind::Except) => {
                fields.len() == tc.member_count()
                    && fields.iter().enumerate().all(|(i, (name, value))| {
                        tc.member_name(i) == Some(name.as_str())
                            && tc
                                .member_type(i)
                                .is_some_and(|mt| value.matches_shape(mt))
                    })
            }
            (Value::Union(boxed), Kind::Union) => {
                let (label, value) = boxed.as_ref();
                match member_for_label(tc, label) {
                    Some(member_type) => value.matches_shape(&member_type),
                    None => tc.default_index() >= 0,
                }
            }
            _ => false,
        }
    }
}

fn member_for_label(tc: &TypeCode, label: &Label) -> Option<TypeCode> {
    (0..tc.member_count())
        .find(|&i| tc.member_label(i) == Some(label))
        .and_then(|i| tc.member_type(i).cloned())
}

/// A `(TypeCode, Value)` pair; constructing one validates that `value`'s runtime shape satisfies
/// `typecode`.
#[derive(Debug, Clone, PartialEq)]
pub struct Any {
    typecode: TypeCode,
    value: Value,
}

impl Any {
    pub fn new(typecode: TypeCode, value: Value) -> CorbaResult<Self> {
        if value.matches_shape(&typecode) {
            Ok(Self { typecode, value })
        } else {
            Err(CorbaError::TypeMismatch("value does not match typecode shape"))
        }
    }

    pub fn typecode(&self) -> &TypeCode {
        &self.typecode
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Returns the contained value if `destination` is (structurally) the same TypeCode as this
    /// `Any`'s; otherwise fails with `type_mismatch`.
    pub fn extract(&self, destination: &TypeCode) -> CorbaResult<Value> {
        if &self.typecode == destination || self.value.matches_shape(destination) {
            Ok(self.value.clone())
        } else {
            Err(CorbaError::TypeMismatch("extract destination does not match Any's typecode"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typecode::get_basic;

    #[test]
    fn primitive_any_round_trips_through_extract() {
        let a = Any::new(get_basic(Kind::Long), Value::Long(42)).unwrap();
        assert_eq!(a.extract(a.typecode()).unwrap(), *a.value());
    }

    #[test]
    fn primitive_width_mismatch_is_rejected() {
        let err = Any::new(get_basic(Kind::Long), Value::Short(1)).unwrap_err();
        assert!(matches!(err, CorbaError::TypeMismatch(_)));
    }

    #[test]
    fn sequence_validates_against_first_element() {
        let seq_tc = TypeCode::create_sequence(get_basic(Kind::Long), 0);
        let ok = Any::new(seq_tc.clone(), Value::Sequence(vec![Value::Long(1), Value::Long(2)]));
        assert!(ok.is_ok());
        let bad = Any::new(seq_tc, Value::Sequence(vec![Value::Short(1)]));
        assert!(bad.is_err());
    }

    #[test]
    fn empty_sequence_is_always_valid() {
        let seq_tc = TypeCode::create_sequence(get_basic(Kind::Octet), 0);
        assert!(Any::new(seq_tc, Value::Sequence(vec![])).is_ok());
    }

    #[test]
    fn struct_validates_field_names_and_types() {
        use crate::typecode::Member;
        let members = vec![
            Member { name: "x".into(), label: None, member_type: get_basic(Kind::Long) },
            Member { name: "y".into(), label: None, member_type: get_basic(Kind::Long) },
        ];
        let tc = TypeCode::create_struct("IDL:any_tests::Point:1.0", "Point", members).unwrap();
        let value = Value::Struct(vec![("x".into(), Value::Long(1)), ("y".into(), Value::Long(2))]);
        assert!(Any::new(tc.clone(), value).is_ok());
        let bad = Value::Struct(vec![("x".into(), Value::Long(1))]);
        assert!(Any::new(tc, bad).is_err());
    }
}
