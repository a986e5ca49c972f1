//! System and user exceptions: the two families an invocation can raise, plus the wire holder
//! that carries either one back to the client.

use crate::any::Value;
use crate::cdr::{Decoder, Encoder, Endian};
use crate::error::{CorbaError, CorbaResult};
use crate::marshal;
use crate::typecode::{get_basic, Kind, TypeCode};

/// Whether the server had definitely completed, definitely not completed, or possibly completed
/// the invocation when the exception was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Completed,
    NotCompleted,
    Maybe,
}

impl CompletionStatus {
    fn to_wire(self) -> i32 {
        match self {
            Self::Completed => 0,
            Self::NotCompleted => 1,
            Self::Maybe => 2,
        }
    }

    fn from_wire(v: i32) -> CorbaResult<Self> {
        match v {
            0 => Ok(Self::Completed),
            1 => Ok(Self::NotCompleted),
            2 => Ok(Self::Maybe),
            _ => Err(CorbaError::Truncated("invalid completion status")),
        }
    }
}

/// Shared capability set exposed by both exception families.
pub trait CorbaException: std::fmt::Debug {
    fn repository_id(&self) -> String;
    fn minor(&self) -> u32;
    fn completion(&self) -> CompletionStatus;
    fn name(&self) -> String;
    fn typecode(&self) -> TypeCode;
}

macro_rules! system_exceptions {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// The predefined CORBA system exception names this runtime raises and recognizes.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum SystemExceptionKind {
            $($variant),+
        }

        impl SystemExceptionKind {
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

system_exceptions! {
    Unknown => "UNKNOWN",
    BadParam => "BAD_PARAM",
    NoMemory => "NO_MEMORY",
    CommFailure => "COMM_FAILURE",
    InvObjref => "INV_OBJREF",
    NoPermission => "NO_PERMISSION",
    Internal => "INTERNAL",
    Marshal => "MARSHAL",
    NoImplement => "NO_IMPLEMENT",
    BadTypecode => "BAD_TYPECODE",
    BadOperation => "BAD_OPERATION",
    NoResources => "NO_RESOURCES",
    ObjectNotExist => "OBJECT_NOT_EXIST",
    Transient => "TRANSIENT",
    Timeout => "TIMEOUT",
    InvalidTransaction => "INVALID_TRANSACTION",
    TransactionRolledback => "TRANSACTION_ROLLEDBACK",
    TransactionRequired => "TRANSACTION_REQUIRED",
}

/// A CORBA system exception: `IDL:omg.org/CORBA/<Name>:1.0`, a minor code, and a completion
/// status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemException {
    pub kind: SystemExceptionKind,
    pub minor: u32,
    pub completed: CompletionStatus,
}

impl std::fmt::Display for SystemException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (minor={}, completed={:?})", self.kind.name(), self.minor, self.completed)
    }
}
impl std::error::Error for SystemException {}

impl SystemException {
    pub fn new(kind: SystemExceptionKind, minor: u32, completed: CompletionStatus) -> Self {
        Self { kind, minor, completed }
    }

    pub(crate) fn body_typecode(&self) -> TypeCode {
        system_exception_typecode(self.kind)
    }

    fn encode_body(&self, enc: &mut Encoder) {
        enc.write_ulong(self.minor);
        enc.write_long(self.completed.to_wire());
    }

    fn decode_body(kind: SystemExceptionKind, dec: &mut Decoder) -> CorbaResult<Self> {
        let minor = dec.read_ulong()?;
        let completed = CompletionStatus::from_wire(dec.read_long()?)?;
        Ok(Self { kind, minor, completed })
    }
}

fn system_exception_typecode(kind: SystemExceptionKind) -> TypeCode {
    let repo_id = format!("IDL:omg.org/CORBA/{}:1.0", kind.name());
    TypeCode::create_except(
        &repo_id,
        kind.name(),
        vec![
            crate::typecode::Member {
                name: "minor".into(),
                label: None,
                member_type: get_basic(Kind::ULong),
            },
            crate::typecode::Member {
                name: "completed".into(),
                label: None,
                member_type: get_basic(Kind::Long),
            },
        ],
    )
    .expect("system exception typecodes never collide across kinds")
}

impl CorbaException for SystemException {
    fn repository_id(&self) -> String {
        format!("IDL:omg.org/CORBA/{}:1.0", self.kind.name())
    }
    fn minor(&self) -> u32 {
        self.minor
    }
    fn completion(&self) -> CompletionStatus {
        self.completed
    }
    fn name(&self) -> String {
        self.kind.name().to_string()
    }
    fn typecode(&self) -> TypeCode {
        self.body_typecode()
    }
}

/// A user-declared exception: an IDL-author-chosen repository id plus a typed member list,
/// following its struct TypeCode.
#[derive(Debug, Clone, PartialEq)]
pub struct UserException {
    pub repo_id: String,
    pub typecode: TypeCode,
    pub members: Vec<(String, Value)>,
}

impl UserException {
    pub fn new(typecode: TypeCode, members: Vec<(String, Value)>) -> Self {
        Self {
            repo_id: typecode.repo_id().to_string(),
            typecode,
            members,
        }
    }
}

impl std::fmt::Display for UserException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user exception {}", self.repo_id)
    }
}
impl std::error::Error for UserException {}

impl CorbaException for UserException {
    fn repository_id(&self) -> String {
        self.repo_id.clone()
    }
    fn minor(&self) -> u32 {
        0
    }
    fn completion(&self) -> CompletionStatus {
        CompletionStatus::Completed
    }
    fn name(&self) -> String {
        self.typecode.name().to_string()
    }
    fn typecode(&self) -> TypeCode {
        self.typecode.clone()
    }
}

/// The wire form of a raised exception: a TypeCode followed by the marshalled body, carried
/// inside a GIOP Reply with a `SYSTEM_EXCEPTION`/`USER_EXCEPTION` reply status.
#[derive(Debug, Clone, PartialEq)]
pub enum ExceptionHolder {
    System(SystemException),
    User(UserException),
}

impl ExceptionHolder {
    pub fn encode(&self) -> CorbaResult<Vec<u8>> {
        let mut enc = Encoder::new(Endian::NATIVE);
        match self {
            Self::System(ex) => {
                enc.write_string(&ex.repository_id());
                enc.write_octet(0); // family discriminator: 0 = system
                ex.encode_body(&mut enc);
            }
            Self::User(ex) => {
                enc.write_string(&ex.repo_id);
                enc.write_octet(1); // family discriminator: 1 = user
                let value = Value::Struct(ex.members.clone());
                marshal::encode_value(&mut enc, &ex.typecode, &value)?;
            }
        }
        Ok(enc.into_bytes())
    }

    pub fn decode(bytes: &[u8]) -> CorbaResult<Self> {
        let mut dec = Decoder::new(bytes)?;
        let repo_id = dec.read_string()?;
        let family = dec.read_octet()?;
        match family {
            0 => {
                let kind = repo_id
                    .strip_prefix("IDL:omg.org/CORBA/")
                    .and_then(|s| s.strip_suffix(":1.0"))
                    .and_then(SystemExceptionKind::from_name)
                    .ok_or_else(|| CorbaError::BadIorFormat(format!("unknown system exception {repo_id}")))?;
                Ok(Self::System(SystemException::decode_body(kind, &mut dec)?))
            }
            1 => {
                let tc = crate::typecode::get_by_id_checked(&repo_id)?;
                let value = marshal::decode_value(&mut dec, &tc)?;
                let members = match value {
                    Value::Struct(fields) => fields,
                    _ => return Err(CorbaError::TypeMismatch("user exception body is not a struct")),
                };
                Ok(Self::User(UserException { repo_id, typecode: tc, members }))
            }
            _ => Err(CorbaError::Truncated("exception family discriminator")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_exception_round_trips() {
        let ex = ExceptionHolder::System(SystemException::new(
            SystemExceptionKind::CommFailure,
            42,
            CompletionStatus::NotCompleted,
        ));
        let bytes = ex.encode().unwrap();
        let decoded = ExceptionHolder::decode(&bytes).unwrap();
        match decoded {
            ExceptionHolder::System(d) => {
                assert_eq!(d.kind, SystemExceptionKind::CommFailure);
                assert_eq!(d.minor, 42);
                assert_eq!(d.completed, CompletionStatus::NotCompleted);
            }
            ExceptionHolder::User(_) => panic!("expected system exception"),
        }
    }

    #[test]
    fn user_exception_round_trips() {
        let members = vec![crate::typecode::Member {
            name: "reason".into(),
            label: None,
            member_type: get_basic(Kind::String),
        }];
        let tc = TypeCode::create_except("IDL:exception_tests::InsufficientFunds:1.0", "InsufficientFunds", members)
            .unwrap();
        let ex = UserException::new(tc, vec![("reason".into(), Value::Str("overdrawn".into()))]);
        let holder = ExceptionHolder::User(ex.clone());
        let bytes = holder.encode().unwrap();
        let decoded = ExceptionHolder::decode(&bytes).unwrap();
        match decoded {
            ExceptionHolder::User(d) => assert_eq!(d.members, ex.members),
            ExceptionHolder::System(_) => panic!("expected user exception"),
        }
    }
}
