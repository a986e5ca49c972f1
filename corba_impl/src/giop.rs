//! GIOP/IIOP message framing: the 12-octet header every message begins with, and the
//! Request/Reply body layouts that carry invocations and their outcomes.

use crate::any::Any;
use crate::cdr::{Decoder, Encoder, Endian};
use crate::error::{CorbaError, CorbaResult};
use crate::exception::ExceptionHolder;
use crate::params::GiopVersion;
use crate::security::ServiceContext;

const MAGIC: [u8; 4] = *b"GIOP";

static NEXT_REQUEST_ID: std::sync::atomic::AtomicU32 = std::sync::atomic::AtomicU32::new(1);

/// A process-wide, monotonically increasing GIOP request id.
pub fn next_request_id() -> u32 {
    NEXT_REQUEST_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
}

/// GIOP message type, the 8th header octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Request,
    Reply,
    CancelRequest,
    LocateRequest,
    LocateReply,
    CloseConnection,
    MessageError,
    Fragment,
}

impl MessageType {
    fn to_wire(self) -> u8 {
        match self {
            Self::Request => 0,
            Self::Reply => 1,
            Self::CancelRequest => 2,
            Self::LocateRequest => 3,
            Self::LocateReply => 4,
            Self::CloseConnection => 5,
            Self::MessageError => 6,
            Self::Fragment => 7,
        }
    }

    fn from_wire(v: u8) -> CorbaResult<Self> {
        Ok(match v {
            0 => Self::Request,
            1 => Self::Reply,
            2 => Self::CancelRequest,
            3 => Self::LocateRequest,
            4 => Self::LocateReply,
            5 => Self::CloseConnection,
            6 => Self::MessageError,
            7 => Self::Fragment,
            other => {
                error!("unknown GIOP message type {other}");
                return Err(CorbaError::UsageDetailed(format!("unknown GIOP message type {other}")));
            }
        })
    }
}

/// The fixed 12-octet header every GIOP message carries.
///
/// Known simplification: GIOP 1.2 additionally aligns the Request/Reply body on an 8-octet
/// boundary measured from the start of the message (i.e. from before this header), which would
/// require padding between the header and the body CDR stream. This runtime always starts the
/// body's own encapsulation at the first octet after the header, aligned from the body's own
/// start like 1.0/1.1; this is internally consistent (this runtime's own encoder and decoder
/// agree) but not bit-exact against a GIOP 1.2 peer that applies the message-relative padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: GiopVersion,
    pub little_endian: bool,
    pub fragment: bool,
    pub message_type: MessageType,
    pub message_size: u32,
}

impl Header {
    pub fn endian(&self) -> Endian {
        if self.little_endian {
            Endian::Little
        } else {
            Endian::Big
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let (major, minor) = self.version.major_minor();
        let mut flags = 0u8;
        if self.little_endian {
            flags |= 0x01;
        }
        if self.fragment {
            flags |= 0x02;
        }
        trace!("encoding GIOP header: {:?}, {} bytes of payload", self.message_type, self.message_size);
        let mut out = Vec::with_capacity(12);
        out.extend_from_slice(&MAGIC);
        out.push(major);
        out.push(minor);
        out.push(flags);
        out.push(self.message_type.to_wire());
        if self.little_endian {
            out.extend_from_slice(&self.message_size.to_le_bytes());
        } else {
            out.extend_from_slice(&self.message_size.to_be_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> CorbaResult<Self> {
        if bytes.len() < 12 {
            return Err(CorbaError::Truncated("GIOP header"));
        }
        if bytes[0..4] != MAGIC {
            error!("bad GIOP magic in incoming header");
            return Err(CorbaError::UsageDetailed("bad GIOP magic".into()));
        }
        let major = bytes[4];
        let minor = bytes[5];
        let flags = bytes[6];
        let little_endian = flags & 0x01 != 0;
        let fragment = flags & 0x02 != 0;
        let message_type = MessageType::from_wire(bytes[7])?;
        let message_size = if little_endian {
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]])
        } else {
            u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]])
        };
        let version = giop_version_from_major_minor(major, minor)?;
        trace!("decoded GIOP header: {message_type:?}, {message_size} bytes of payload");
        Ok(Self { version, little_endian, fragment, message_type, message_size })
    }
}

fn giop_version_from_major_minor(major: u8, minor: u8) -> CorbaResult<GiopVersion> {
    match (major, minor) {
        (1, 0) => Ok(GiopVersion::V1_0),
        (1, 1) => Ok(GiopVersion::V1_1),
        (1, 2) => Ok(GiopVersion::V1_2),
        _ => Err(CorbaError::UsageDetailed(format!("unsupported GIOP version {major}.{minor}"))),
    }
}

/// Body of a GIOP Request message.
#[derive(Debug, Clone)]
pub struct RequestBody {
    pub request_id: u32,
    pub response_expected: bool,
    pub object_key: Vec<u8>,
    pub operation: String,
    pub service_contexts: Vec<ServiceContext>,
    pub arguments: Vec<Any>,
}

impl RequestBody {
    pub fn encode(&self, version: GiopVersion) -> CorbaResult<Vec<u8>> {
        let mut enc = Encoder::new(Endian::NATIVE);
        enc.write_sequence_len(self.service_contexts.len() as u32);
        for ctx in &self.service_contexts {
            ctx.encode(&mut enc);
        }
        enc.write_ulong(self.request_id);
        enc.write_bool(self.response_expected);
        if version.major_minor() != (1, 0) {
            // GIOP 1.1/1.2 add three reserved alignment octets here; 1.0 has none.
            enc.write_octet(0);
            enc.write_octet(0);
            enc.write_octet(0);
        }
        enc.write_sequence_len(self.object_key.len() as u32);
        for b in &self.object_key {
            enc.write_octet(*b);
        }
        enc.write_string(&self.operation);
        enc.write_string(""); // requesting_principal, unused by this runtime
        for arg in &self.arguments {
            crate::marshal::encode_any(&mut enc, arg.typecode(), arg.value())?;
        }
        let bytes = enc.into_bytes();
        trace!("encoded request {} ({}) into {} bytes", self.request_id, self.operation, bytes.len());
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8], version: GiopVersion, expected_arguments: usize) -> CorbaResult<Self> {
        let mut dec = Decoder::new(bytes)?;
        let ctx_len = dec.read_sequence_len()?;
        let mut service_contexts = Vec::with_capacity(ctx_len as usize);
        for _ in 0..ctx_len {
            service_contexts.push(ServiceContext::decode(&mut dec)?);
        }
        let request_id = dec.read_ulong()?;
        let response_expected = dec.read_bool()?;
        if version.major_minor() != (1, 0) {
            dec.read_octet()?;
            dec.read_octet()?;
            dec.read_octet()?;
        }
        let key_len = dec.read_sequence_len()?;
        let mut object_key = Vec::with_capacity(key_len as usize);
        for _ in 0..key_len {
            object_key.push(dec.read_octet()?);
        }
        let operation = dec.read_string()?;
        let _requesting_principal = dec.read_string()?;
        let mut arguments = Vec::with_capacity(expected_arguments);
        for _ in 0..expected_arguments {
            let (tc, value) = crate::marshal::decode_any(&mut dec)?;
            arguments.push(Any::new(tc, value)?);
        }
        trace!("decoded request {request_id} ({operation}) from {} bytes", bytes.len());
        Ok(Self { request_id, response_expected, object_key, operation, service_contexts, arguments })
    }
}

/// The outcome a GIOP Reply carries.
#[derive(Debug, Clone)]
pub enum ReplyStatus {
    NoException(Any),
    UserException(ExceptionHolder),
    SystemException(ExceptionHolder),
    LocationForward,
}

/// Body of a GIOP Reply message.
#[derive(Debug, Clone)]
pub struct ReplyBody {
    pub request_id: u32,
    pub service_contexts: Vec<ServiceContext>,
    pub status: ReplyStatus,
}

impl ReplyBody {
    pub fn encode(&self) -> CorbaResult<Vec<u8>> {
        let mut enc = Encoder::new(Endian::NATIVE);
        enc.write_sequence_len(self.service_contexts.len() as u32);
        for ctx in &self.service_contexts {
            ctx.encode(&mut enc);
        }
        enc.write_ulong(self.request_id);
        match &self.status {
            ReplyStatus::NoException(any) => {
                enc.write_ulong(0);
                crate::marshal::encode_any(&mut enc, any.typecode(), any.value())?;
            }
            ReplyStatus::UserException(holder) => {
                enc.write_ulong(1);
                enc.write_octets(&holder.encode()?);
            }
            ReplyStatus::SystemException(holder) => {
                enc.write_ulong(2);
                enc.write_octets(&holder.encode()?);
            }
            ReplyStatus::LocationForward => {
                enc.write_ulong(3);
            }
        }
        let bytes = enc.into_bytes();
        trace!("encoded reply {} into {} bytes", self.request_id, bytes.len());
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> CorbaResult<Self> {
        let mut dec = Decoder::new(bytes)?;
        let ctx_len = dec.read_sequence_len()?;
        let mut service_contexts = Vec::with_capacity(ctx_len as usize);
        for _ in 0..ctx_len {
            service_contexts.push(ServiceContext::decode(&mut dec)?);
        }
        let request_id = dec.read_ulong()?;
        let discriminator = dec.read_ulong()?;
        let status = match discriminator {
            0 => {
                let (tc, value) = crate::marshal::decode_any(&mut dec)?;
                ReplyStatus::NoException(Any::new(tc, value)?)
            }
            1 => ReplyStatus::UserException(ExceptionHolder::decode(&dec.read_octets(dec.remaining())?)?),
            2 => ReplyStatus::SystemException(ExceptionHolder::decode(&dec.read_octets(dec.remaining())?)?),
            3 => ReplyStatus::LocationForward,
            other => return Err(CorbaError::UsageDetailed(format!("unknown reply status {other}"))),
        };
        trace!("decoded reply {request_id} from {} bytes", bytes.len());
        Ok(Self { request_id, service_contexts, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::any::Value;
    use crate::typecode::{get_basic, Kind};

    #[test]
    fn header_round_trips_big_endian() {
        let header = Header {
            version: GiopVersion::V1_2,
            little_endian: false,
            fragment: false,
            message_type: MessageType::Request,
            message_size: 128,
        };
        let bytes = header.encode();
        assert_eq!(&bytes[0..4], b"GIOP");
        let decoded = Header::decode(&bytes).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn header_round_trips_little_endian_with_fragment_flag() {
        let header = Header {
            version: GiopVersion::V1_1,
            little_endian: true,
            fragment: true,
            message_type: MessageType::Fragment,
            message_size: 7,
        };
        let bytes = header.encode();
        let decoded = Header::decode(&bytes).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn request_body_round_trips_with_arguments() {
        let arg = Any::new(get_basic(Kind::Double), Value::Double(10.5)).unwrap();
        let body = RequestBody {
            request_id: 1,
            response_expected: true,
            object_key: b"Calc".to_vec(),
            operation: "add".into(),
            service_contexts: vec![],
            arguments: vec![arg.clone()],
        };
        let bytes = body.encode(GiopVersion::V1_2).unwrap();
        let decoded = RequestBody::decode(&bytes, GiopVersion::V1_2, 1).unwrap();
        assert_eq!(decoded.operation, "add");
        assert_eq!(decoded.object_key, b"Calc");
        assert_eq!(decoded.arguments[0].value(), arg.value());
    }

    #[test]
    fn reply_body_no_exception_round_trips() {
        let result = Any::new(get_basic(Kind::Double), Value::Double(31.2)).unwrap();
        let body = ReplyBody { request_id: 1, service_contexts: vec![], status: ReplyStatus::NoException(result.clone()) };
        let bytes = body.encode().unwrap();
        let decoded = ReplyBody::decode(&bytes).unwrap();
        match decoded.status {
            ReplyStatus::NoException(any) => assert_eq!(any.value(), result.value()),
            other => panic!("expected NoException, got {other:?}"),
        }
    }

    #[test]
    fn reply_body_system_exception_round_trips() {
        use crate::exception::{CompletionStatus, SystemException, SystemExceptionKind};
        let holder = ExceptionHolder::System(SystemException::new(SystemExceptionKind::CommFailure, 0, CompletionStatus::NotCompleted));
        let body = ReplyBody { request_id: 9, service_contexts: vec![], status: ReplyStatus::SystemException(holder) };
        let bytes = body.encode().unwrap();
        let decoded = ReplyBody::decode(&bytes).unwrap();
        match decoded.status {
            ReplyStatus::SystemException(ExceptionHolder::System(ex)) => {
                assert_eq!(ex.kind, SystemExceptionKind::CommFailure);
            }
            other => panic!("expected SystemException, got {other:?}"),
        }
    }
}
