//! Self-describing type metadata: the recursive descriptor that drives CDR encoding of
//! composite values and backs the [`crate::any::Any`] boxed-value system.

mod registry;

pub use registry::{get_basic, get_by_id, register};

use crate::error::{CorbaError, CorbaResult};
use std::sync::Arc;

/// Discriminant kinds a [`TypeCode`] can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Void,
    Short,
    UShort,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    Boolean,
    Char,
    Octet,
    Any,
    TypeCode,
    Object,
    String,
    Sequence,
    Array,
    Struct,
    Union,
    Enum,
    Alias,
    Except,
    Value,
}

/// The value of a union discriminator, restricted to the primitive kinds CORBA allows there.
#[derive(Debug, Clone, PartialEq)]
pub enum Label {
    Long(i32),
    ULong(u32),
    Short(i16),
    UShort(u16),
    Char(u8),
    Boolean(bool),
    /// Enumerator name, for unions discriminated by an enum.
    Enum(String),
}

/// One member of a struct, enum, or union TypeCode.
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    /// Discriminator value this member matches; `None` for struct/enum members.
    pub label: Option<Label>,
    pub member_type: TypeCode,
}

#[derive(Debug)]
struct Inner {
    kind: Kind,
    repo_id: String,
    name: String,
    members: Vec<Member>,
    discriminator_type: Option<TypeCode>,
    /// Index into `members` of the union default case, or -1 if there is none.
    default_index: i32,
    content_type: Option<TypeCode>,
    /// Sequence/string bound (0 = unbounded) or array length.
    bound: u32,
}

/// A recursive, reference-counted type descriptor.
///
/// Cloning a `TypeCode` is cheap (an `Arc` bump); equality compares the underlying descriptor by
/// repository id, which is how CORBA TypeCodes are compared for "equivalence" in practice.
#[derive(Debug, Clone)]
pub struct TypeCode(Arc<Inner>);

impl PartialEq for TypeCode {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind == other.0.kind && self.0.repo_id == other.0.repo_id
    }
}
impl Eq for TypeCode {}

impl TypeCode {
    fn new(
        kind: Kind,
        repo_id: impl Into<String>,
        name: impl Into<String>,
        members: Vec<Member>,
        discriminator_type: Option<TypeCode>,
        default_index: i32,
        content_type: Option<TypeCode>,
        bound: u32,
    ) -> Self {
        Self(Arc::new(Inner {
            kind,
            repo_id: repo_id.into(),
            name: name.into(),
            members,
            discriminator_type,
            default_index,
            content_type,
            bound,
        }))
    }

    pub(crate) fn primitive(kind: Kind, repo_id: &str, name: &str) -> Self {
        Self::new(kind, repo_id, name, Vec::new(), None, -1, None, 0)
    }

    pub fn kind(&self) -> Kind {
        self.0.kind
    }

    pub fn repo_id(&self) -> &str {
        &self.0.repo_id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn member_count(&self) -> usize {
        self.0.members.len()
    }

    pub fn member_name(&self, index: usize) -> Option<&str> {
        self.0.members.get(index).map(|m| m.name.as_str())
    }

    pub fn member_type(&self, index: usize) -> Option<&TypeCode> {
        self.0.members.get(index).map(|m| &m.member_type)
    }

    pub fn member_label(&self, index: usize) -> Option<&Label> {
        self.0.members.get(index).and_then(|m| m.label.as_ref())
    }

    pub fn members(&self) -> &[Member] {
        &self.0.members
    }

    pub fn discriminator_type(&self) -> Option<&TypeCode> {
        self.0.discriminator_type.as_ref()
    }

    pub fn default_index(&self) -> i32 {
        self.0.default_index
    }

    pub fn content_type(&self) -> Option<&TypeCode> {
        self.0.content_type.as_ref()
    }

    pub fn bound(&self) -> u32 {
        self.0.bound
    }

    /// Creates, or returns the already-registered, struct TypeCode for `repo_id`.
    ///
    /// Idempotent: a second call with the same `repo_id` and `Kind::Struct` returns the existing
    /// descriptor; a call that disagrees on kind with an already-registered id fails.
    pub fn create_struct(repo_id: &str, name: &str, members: Vec<Member>) -> CorbaResult<Self> {
        registry::create_composite(Kind::Struct, repo_id, name, move |_| {
            Self::new(Kind::Struct, repo_id, name, members, None, -1, None, 0)
        })
    }

    pub fn create_except(repo_id: &str, name: &str, members: Vec<Member>) -> CorbaResult<Self> {
        registry::create_composite(Kind::Except, repo_id, name, move |_| {
            Self::new(Kind::Except, repo_id, name, members, None, -1, None, 0)
        })
    }

    pub fn create_enum(repo_id: &str, name: &str, enumerators: Vec<String>) -> CorbaResult<Self> {
        registry::create_composite(Kind::Enum, repo_id, name, move |_| {
            let members = enumerators
                .into_iter()
                .map(|n| Member {
                    name: n,
                    label: None,
                    member_type: get_basic(Kind::Void),
                })
                .collect();
            Self::new(Kind::Enum, repo_id, name, members, None, -1, None, 0)
        })
    }

    pub fn create_union(
        repo_id: &str,
        name: &str,
        discriminator_type: TypeCode,
        members: Vec<Member>,
        default_index: i32,
    ) -> CorbaResult<Self> {
        registry::create_composite(Kind::Union, repo_id, name, move |_| {
            Self::new(
                Kind::Union,
                repo_id,
                name,
                members,
                Some(discriminator_type),
                default_index,
                None,
                0,
            )
        })
    }

    /// Unbounded when `bound == 0`.
    pub fn create_sequence(element_type: TypeCode, bound: u32) -> Self {
        let repo_id = format!("IDL:sequence<{}>:1.0", element_type.repo_id());
        Self::new(
            Kind::Sequence,
            repo_id,
            "sequence",
            Vec::new(),
            None,
            -1,
            Some(element_type),
            bound,
        )
    }

    pub fn create_array(element_type: TypeCode, length: u32) -> Self {
        let repo_id = format!("IDL:array<{}>:1.0", element_type.repo_id());
        Self::new(
            Kind::Array,
            repo_id,
            "array",
            Vec::new(),
            None,
            -1,
            Some(element_type),
            length,
        )
    }

    pub fn create_string(bound: u32) -> Self {
        Self::new(Kind::String, "IDL:string:1.0", "string", Vec::new(), None, -1, None, bound)
    }

    pub fn create_alias(repo_id: &str, name: &str, aliased: TypeCode) -> CorbaResult<Self> {
        registry::create_composite(Kind::Alias, repo_id, name, move |_| {
            Self::new(Kind::Alias, repo_id, name, Vec::new(), None, -1, Some(aliased), 0)
        })
    }
}

impl std::fmt::Display for TypeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypeCode({:?}, {})", self.0.kind, self.0.repo_id)
    }
}

pub fn get_by_id_checked(repo_id: &str) -> CorbaResult<TypeCode> {
    get_by_id(repo_id).ok_or_else(|| CorbaError::UnknownRepositoryId(repo_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_kinds_are_singletons() {
        let a = get_basic(Kind::Long);
        let b = get_basic(Kind::Long);
        assert_eq!(a, b);
        assert_eq!(a.kind(), Kind::Long);
    }

    #[test]
    fn create_struct_is_idempotent_by_repo_id() {
        let members = vec![Member {
            name: "x".into(),
            label: None,
            member_type: get_basic(Kind::Long),
        }];
        let t1 = TypeCode::create_struct("IDL:Point:1.0", "Point", members.clone()).unwrap();
        let t2 = TypeCode::create_struct("IDL:Point:1.0", "Point", members).unwrap();
        assert_eq!(t1, t2);
        assert_eq!(t1.member_count(), 1);
    }

    #[test]
    fn create_mismatched_kind_for_existing_id_fails() {
        TypeCode::create_struct("IDL:Conflict:1.0", "Conflict", Vec::new()).unwrap();
        let err = TypeCode::create_enum("IDL:Conflict:1.0", "Conflict", vec!["A".into()])
            .unwrap_err();
        assert!(matches!(err, CorbaError::TypeCodeKindMismatch { .. }));
    }

    #[test]
    fn sequence_bound_zero_means_unbounded() {
        let seq = TypeCode::create_sequence(get_basic(Kind::Octet), 0);
        assert_eq!(seq.bound(), 0);
        assert_eq!(seq.content_type().unwrap().kind(), Kind::Octet);
    }
}
