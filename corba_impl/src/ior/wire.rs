//! Binary layout of an IOR: `ulong typeid_len; octets typeid; ulong profile_count; repeat { ulong
//! tag; ulong body_len; octets body; }`, and of the tag-0 IIOP profile body nested inside it.
//!
//! This outer layout is a fixed big-endian field run, not a CDR encapsulation in its own right —
//! only the tagged components singled out in the data model (`CODE_SETS`,
//! `ALTERNATE_IIOP_ADDRESS`, …) carry their own byte-order flag, via [`crate::cdr`].

use super::{Component, IiopProfileBody, ObjectRef, Profile};
use crate::cdr::{Decoder, Encoder, Endian};
use crate::error::{CorbaError, CorbaResult};

fn w_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn w_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn w_bytes_with_len(buf: &mut Vec<u8>, bytes: &[u8]) {
    w_u32(buf, bytes.len() as u32);
    buf.extend_from_slice(bytes);
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn truncated(what: &'static str) -> CorbaError {
        CorbaError::Truncated(what)
    }

    fn u8(&mut self) -> CorbaResult<u8> {
        let v = *self.buf.get(self.pos).ok_or_else(|| Self::truncated("octet"))?;
        self.pos += 1;
        Ok(v)
    }

    fn u16(&mut self) -> CorbaResult<u16> {
        let bytes: [u8; 2] = self
            .buf
            .get(self.pos..self.pos + 2)
            .ok_or_else(|| Self::truncated("u16"))?
            .try_into()
            .unwrap();
        self.pos += 2;
        Ok(u16::from_be_bytes(bytes))
    }

    fn u32(&mut self) -> CorbaResult<u32> {
        let bytes: [u8; 4] = self
            .buf
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| Self::truncated("u32"))?
            .try_into()
            .unwrap();
        self.pos += 4;
        Ok(u32::from_be_bytes(bytes))
    }

    fn bytes(&mut self, n: usize) -> CorbaResult<Vec<u8>> {
        let v = self
            .buf
            .get(self.pos..self.pos + n)
            .ok_or_else(|| Self::truncated("octets"))?
            .to_vec();
        self.pos += n;
        Ok(v)
    }

    fn bytes_with_len(&mut self) -> CorbaResult<Vec<u8>> {
        let len = self.u32()? as usize;
        self.bytes(len)
    }

    fn string_with_len(&mut self) -> CorbaResult<String> {
        let bytes = self.bytes_with_len()?;
        String::from_utf8(bytes).map_err(|_| Self::truncated("non-utf8 field"))
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

pub(super) fn encode_ior(ior: &ObjectRef) -> Vec<u8> {
    let mut buf = Vec::new();
    w_bytes_with_len(&mut buf, ior.repo_id.as_bytes());
    w_u32(&mut buf, ior.profiles.len() as u32);
    for p in &ior.profiles {
        w_u32(&mut buf, p.tag);
        w_bytes_with_len(&mut buf, &p.body);
    }
    buf
}

pub(super) fn decode_ior(bytes: &[u8]) -> CorbaResult<ObjectRef> {
    let mut c = Cursor::new(bytes);
    let repo_id = c.string_with_len()?;
    let profile_count = c.u32()?;
    let mut profiles = Vec::with_capacity(profile_count as usize);
    for _ in 0..profile_count {
        let tag = c.u32()?;
        let body = c.bytes_with_len()?;
        profiles.push(Profile { tag, body });
    }
    ObjectRef::new(repo_id, profiles)
}

pub(super) fn encode_iiop_body(body: &IiopProfileBody) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(body.major);
    buf.push(body.minor);
    w_bytes_with_len(&mut buf, body.host.as_bytes());
    w_u16(&mut buf, body.port);
    w_bytes_with_len(&mut buf, &body.object_key);
    if let Some(components) = &body.components {
        w_u32(&mut buf, components.len() as u32);
        for comp in components {
            w_u32(&mut buf, comp.tag);
            w_bytes_with_len(&mut buf, &comp.data);
        }
    }
    buf
}

pub(super) fn decode_iiop_body(bytes: &[u8]) -> CorbaResult<IiopProfileBody> {
    let mut c = Cursor::new(bytes);
    let major = c.u8()?;
    let minor = c.u8()?;
    let host = c.string_with_len()?;
    let port = c.u16()?;
    let object_key = c.bytes_with_len()?;
    let components = if (major, minor) >= (1, 1) && c.remaining() > 0 {
        let count = c.u32()?;
        let mut v = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let tag = c.u32()?;
            let data = c.bytes_with_len()?;
            v.push(Component { tag, data });
        }
        Some(v)
    } else if (major, minor) >= (1, 1) {
        Some(Vec::new())
    } else {
        None
    };
    Ok(IiopProfileBody {
        major,
        minor,
        host,
        port,
        object_key,
        components,
    })
}

/// `CODE_SETS` component body: `{ ulong native_char; ulong native_wchar; }` inside its own
/// endian-flagged encapsulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeSetComponent {
    pub native_char: u32,
    pub native_wchar: u32,
}

impl CodeSetComponent {
    pub fn encode(&self, endian: Endian) -> Vec<u8> {
        let mut enc = Encoder::new(endian);
        enc.write_ulong(self.native_char);
        enc.write_ulong(self.native_wchar);
        enc.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> CorbaResult<Self> {
        let mut dec = Decoder::new(bytes)?;
        Ok(Self {
            native_char: dec.read_ulong()?,
            native_wchar: dec.read_ulong()?,
        })
    }
}

/// `ALTERNATE_IIOP_ADDRESS` component body: `{ string host; ushort port; }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternateIiopAddress {
    pub host: String,
    pub port: u16,
}

impl AlternateIiopAddress {
    pub fn encode(&self, endian: Endian) -> Vec<u8> {
        let mut enc = Encoder::new(endian);
        enc.write_string(&self.host);
        enc.write_ushort(self.port);
        enc.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> CorbaResult<Self> {
        let mut dec = Decoder::new(bytes)?;
        Ok(Self {
            host: dec.read_string()?,
            port: dec.read_ushort()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_set_component_round_trips_either_endian() {
        for endian in [Endian::Big, Endian::Little] {
            let cs = CodeSetComponent {
                native_char: 0x0501_0001,
                native_wchar: 0x0001_0109,
            };
            let decoded = CodeSetComponent::decode(&cs.encode(endian)).unwrap();
            assert_eq!(cs, decoded);
        }
    }

    #[test]
    fn alternate_address_round_trips() {
        let addr = AlternateIiopAddress { host: "backup.example".into(), port: 9999 };
        let decoded = AlternateIiopAddress::decode(&addr.encode(Endian::Little)).unwrap();
        assert_eq!(addr, decoded);
    }
}
