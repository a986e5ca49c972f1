//! Service contexts and the security credentials carried in the `SEC` service context of an
//! outgoing GIOP request header.

use crate::cdr::{Decoder, Encoder, Endian};
use crate::error::CorbaResult;

/// Context id reserved for security credentials, `SEC` read as a big-endian 32-bit word.
pub const SEC_CONTEXT_ID: i32 = 0x5345_4300;

/// A `(context_id, context_data)` pair attached to a GIOP request or reply header. Any context
/// id not recognized by a peer is carried unexamined; this is the generic extensibility slot
/// GIOP headers expose alongside the fixed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceContext {
    pub context_id: i32,
    pub context_data: Vec<u8>,
}

impl ServiceContext {
    pub fn new(context_id: i32, context_data: Vec<u8>) -> Self {
        Self { context_id, context_data }
    }

    pub fn encode(&self, enc: &mut Encoder) {
        enc.write_long(self.context_id);
        enc.write_sequence_len(self.context_data.len() as u32);
        for b in &self.context_data {
            enc.write_octet(*b);
        }
    }

    pub fn decode(dec: &mut Decoder) -> CorbaResult<Self> {
        let context_id = dec.read_long()?;
        let len = dec.read_sequence_len()?;
        let mut context_data = Vec::with_capacity(len as usize);
        for _ in 0..len {
            context_data.push(dec.read_octet()?);
        }
        Ok(Self { context_id, context_data })
    }
}

/// Principal name plus an opaque authentication token, the structured form encoded into the
/// `SEC` service context's data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityCredentials {
    pub principal: String,
    pub token: Vec<u8>,
}

impl SecurityCredentials {
    pub fn new(principal: impl Into<String>, token: Vec<u8>) -> Self {
        Self { principal: principal.into(), token }
    }

    pub fn to_service_context(&self) -> ServiceContext {
        let mut enc = Encoder::new(Endian::NATIVE);
        enc.write_string(&self.principal);
        enc.write_sequence_len(self.token.len() as u32);
        for b in &self.token {
            enc.write_octet(*b);
        }
        ServiceContext::new(SEC_CONTEXT_ID, enc.into_bytes())
    }

    pub fn from_service_context(ctx: &ServiceContext) -> CorbaResult<Self> {
        let mut dec = Decoder::new(&ctx.context_data)?;
        let principal = dec.read_string()?;
        let len = dec.read_sequence_len()?;
        let mut token = Vec::with_capacity(len as usize);
        for _ in 0..len {
            token.push(dec.read_octet()?);
        }
        Ok(Self { principal, token })
    }
}

/// Finds the `SEC` service context among the headers attached to a request, if any, and
/// reconstructs the credentials it carries.
pub fn credentials_from_contexts(contexts: &[ServiceContext]) -> CorbaResult<Option<SecurityCredentials>> {
    match contexts.iter().find(|c| c.context_id == SEC_CONTEXT_ID) {
        Some(ctx) => Ok(Some(SecurityCredentials::from_service_context(ctx)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_round_trip_through_service_context() {
        let creds = SecurityCredentials::new("alice", vec![1, 2, 3, 4]);
        let ctx = creds.to_service_context();
        assert_eq!(ctx.context_id, SEC_CONTEXT_ID);
        let decoded = SecurityCredentials::from_service_context(&ctx).unwrap();
        assert_eq!(decoded, creds);
    }

    #[test]
    fn service_context_encode_decode_round_trips() {
        let ctx = ServiceContext::new(99, vec![9, 9, 9]);
        let mut enc = Encoder::new(Endian::NATIVE);
        ctx.encode(&mut enc);
        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes).unwrap();
        let decoded = ServiceContext::decode(&mut dec).unwrap();
        assert_eq!(decoded, ctx);
    }

    #[test]
    fn credentials_from_contexts_finds_sec_entry() {
        let creds = SecurityCredentials::new("bob", vec![]);
        let contexts = vec![ServiceContext::new(1, vec![0]), creds.to_service_context()];
        let found = credentials_from_contexts(&contexts).unwrap().unwrap();
        assert_eq!(found, creds);
    }

    #[test]
    fn no_sec_context_yields_none() {
        let contexts = vec![ServiceContext::new(1, vec![0])];
        assert!(credentials_from_contexts(&contexts).unwrap().is_none());
    }
}
