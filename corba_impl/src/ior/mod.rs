//! The Interoperable Object Reference: a repository id paired with an ordered list of tagged
//! profiles, the serializable identity of a remote CORBA object.

mod wire;

pub use wire::{AlternateIiopAddress, CodeSetComponent};

use crate::error::{CorbaError, CorbaResult};

/// `IOP::ComponentId::TAG_INTERNET_IOP`: the only profile tag this runtime understands the body of.
pub const TAG_INTERNET_IOP: u32 = 0;

pub const TAG_CODE_SETS: u32 = 1;
pub const TAG_POLICIES: u32 = 2;
pub const TAG_ALTERNATE_IIOP_ADDRESS: u32 = 3;
pub const TAG_SSL_SEC_TRANS: u32 = 20;
pub const TAG_CSI_SEC_MECH_LIST: u32 = 33;
pub const TAG_TLS_SEC_TRANS: u32 = 36;

/// Tags whose component body is itself an independently endianness-flagged encapsulation.
fn is_endian_flagged_tag(tag: u32) -> bool {
    matches!(
        tag,
        TAG_CODE_SETS
            | TAG_ALTERNATE_IIOP_ADDRESS
            | TAG_SSL_SEC_TRANS
            | TAG_CSI_SEC_MECH_LIST
            | TAG_TLS_SEC_TRANS
            | TAG_POLICIES
    )
}

/// One tagged component inside an IIOP profile body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub tag: u32,
    /// Wire bytes of the component body, verbatim — for endian-flagged tags this includes the
    /// leading byte-order octet.
    pub data: Vec<u8>,
}

impl Component {
    pub fn new(tag: u32, data: Vec<u8>) -> Self {
        Self { tag, data }
    }

    pub fn is_endian_flagged(&self) -> bool {
        is_endian_flagged_tag(self.tag)
    }

    pub fn code_sets(cs: &CodeSetComponent, endian: crate::cdr::Endian) -> Self {
        Self::new(TAG_CODE_SETS, cs.encode(endian))
    }

    pub fn decode_code_sets(&self) -> CorbaResult<CodeSetComponent> {
        if self.tag != TAG_CODE_SETS {
            return Err(CorbaError::Impl("component is not CODE_SETS"));
        }
        CodeSetComponent::decode(&self.data)
    }

    pub fn alternate_iiop_address(addr: &AlternateIiopAddress, endian: crate::cdr::Endian) -> Self {
        Self::new(TAG_ALTERNATE_IIOP_ADDRESS, addr.encode(endian))
    }

    pub fn decode_alternate_iiop_address(&self) -> CorbaResult<AlternateIiopAddress> {
        if self.tag != TAG_ALTERNATE_IIOP_ADDRESS {
            return Err(CorbaError::Impl("component is not ALTERNATE_IIOP_ADDRESS"));
        }
        AlternateIiopAddress::decode(&self.data)
    }
}

/// The body of a tag-0 (`INTERNET_IOP`) profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IiopProfileBody {
    pub major: u8,
    pub minor: u8,
    pub host: String,
    pub port: u16,
    pub object_key: Vec<u8>,
    /// Present (possibly empty) from GIOP 1.1 onward; `None` for a 1.0 profile.
    pub components: Option<Vec<Component>>,
}

impl IiopProfileBody {
    pub fn new(major: u8, minor: u8, host: impl Into<String>, port: u16, object_key: Vec<u8>) -> Self {
        let components = if (major, minor) >= (1, 1) { Some(Vec::new()) } else { None };
        Self {
            major,
            minor,
            host: host.into(),
            port,
            object_key,
            components,
        }
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.components.get_or_insert_with(Vec::new).push(component);
        self
    }

    fn encode(&self) -> Vec<u8> {
        wire::encode_iiop_body(self)
    }

    fn decode(bytes: &[u8]) -> CorbaResult<Self> {
        wire::decode_iiop_body(bytes)
    }
}

/// One tagged profile: its integer tag and the profile-specific body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub tag: u32,
    pub body: Vec<u8>,
}

impl Profile {
    pub fn iiop(body: &IiopProfileBody) -> Self {
        Self {
            tag: TAG_INTERNET_IOP,
            body: body.encode(),
        }
    }
}

/// An Interoperable Object Reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub repo_id: String,
    pub profiles: Vec<Profile>,
}

impl ObjectRef {
    pub fn new(repo_id: impl Into<String>, profiles: Vec<Profile>) -> CorbaResult<Self> {
        let repo_id = repo_id.into();
        if repo_id.is_empty() && profiles.is_empty() {
            return Err(CorbaError::Usage("nil IOR needs a repository id or at least one profile"));
        }
        Ok(Self { repo_id, profiles })
    }

    /// The first profile with tag `TAG_INTERNET_IOP`, decoded.
    pub fn primary_iiop_profile(&self) -> CorbaResult<Option<IiopProfileBody>> {
        match self.profiles.iter().find(|p| p.tag == TAG_INTERNET_IOP) {
            Some(p) => Ok(Some(IiopProfileBody::decode(&p.body)?)),
            None => Ok(None),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        wire::encode_ior(self)
    }

    pub fn decode(bytes: &[u8]) -> CorbaResult<Self> {
        wire::decode_ior(bytes)
    }

    pub fn to_stringified(&self) -> String {
        format!("IOR:{}", hex::encode_upper(self.encode()))
    }

    pub fn from_stringified(s: &str) -> CorbaResult<Self> {
        let hexpart = s
            .strip_prefix("IOR:")
            .ok_or_else(|| CorbaError::BadIorFormat("missing IOR: prefix".into()))?;
        let bytes = hex::decode(hexpart).map_err(|e| CorbaError::BadIorFormat(e.to_string()))?;
        Self::decode(&bytes)
    }

    /// Two references denote the same object when their primary IIOP profile agrees on
    /// `(host, port, object_key)`. A reference with no IIOP profile is never equal to another
    /// (the name+host+port fallback the original implementation used is deliberately not
    /// implemented; see the Open Questions resolution in `DESIGN.md`).
    pub fn same_object(&self, other: &Self) -> CorbaResult<bool> {
        let (Some(a), Some(b)) = (self.primary_iiop_profile()?, other.primary_iiop_profile()?) else {
            return Ok(false);
        };
        Ok(a.host == b.host && a.port == b.port && a.object_key == b.object_key)
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_stringified())
    }
}

impl std::str::FromStr for ObjectRef {
    type Err = CorbaError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_stringified(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdr::Endian;

    fn calc_ior() -> ObjectRef {
        let cs = CodeSetComponent {
            native_char: 0x0501_0001,
            native_wchar: 0x0001_0109,
        };
        let body = IiopProfileBody::new(1, 2, "localhost", 8099, b"Calc".to_vec())
            .with_component(Component::code_sets(&cs, Endian::Big));
        ObjectRef::new("IDL:Calc:1.0", vec![Profile::iiop(&body)]).unwrap()
    }

    #[test]
    fn ior_round_trips_through_binary_encoding() {
        let ior = calc_ior();
        let decoded = ObjectRef::decode(&ior.encode()).unwrap();
        assert_eq!(ior, decoded);
    }

    #[test]
    fn ior_round_trips_through_stringified_form() {
        let ior = calc_ior();
        let s = ior.to_stringified();
        assert!(s.starts_with("IOR:"));
        let reparsed = ObjectRef::from_stringified(&s).unwrap();
        assert_eq!(ior, reparsed);

        let primary = ior.primary_iiop_profile().unwrap().unwrap();
        let reparsed_primary = reparsed.primary_iiop_profile().unwrap().unwrap();
        assert_eq!(primary, reparsed_primary);

        let cs = reparsed_primary.components.unwrap()[0].decode_code_sets().unwrap();
        assert_eq!(cs.native_char, 0x0501_0001);
        assert_eq!(cs.native_wchar, 0x0001_0109);
    }

    #[test]
    fn bad_stringified_prefix_is_rejected() {
        let err = ObjectRef::from_stringified("NOTANIOR").unwrap_err();
        assert!(matches!(err, CorbaError::BadIorFormat(_)));
    }

    #[test]
    fn same_object_compares_host_port_key_not_repo_id() {
        let a = calc_ior();
        let mut b = calc_ior();
        b.repo_id = "IDL:Narrowed:1.0".to_string();
        assert!(a.same_object(&b).unwrap());
    }

    #[test]
    fn nil_without_profile_or_repo_id_is_rejected() {
        assert!(ObjectRef::new("", Vec::new()).is_err());
    }
}
