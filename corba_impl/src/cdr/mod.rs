//! Common Data Representation: the alignment-sensitive binary encoding shared by GIOP messages,
//! IOR profile bodies, and the endianness-flagged tagged components nested inside them.
//!
//! Every encapsulation is a self-contained byte run whose first octet is a byte-order flag (`0`
//! big-endian, `1` little-endian); every multi-byte primitive inside it is aligned relative to the
//! start of that run, not to whatever buffer it happens to be embedded in. [`Encoder`] and
//! [`Decoder`] both track that relative offset so alignment comes out right regardless of nesting.

use crate::error::{CorbaError, CorbaResult};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

/// Byte order of a single CDR encapsulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    /// Native byte order used for freshly constructed encapsulations.
    pub const NATIVE: Self = Self::Big;

    pub fn flag(self) -> u8 {
        match self {
            Self::Big => 0,
            Self::Little => 1,
        }
    }

    pub fn from_flag(flag: u8) -> CorbaResult<Self> {
        match flag {
            0 => Ok(Self::Big),
            1 => Ok(Self::Little),
            other => Err(CorbaError::InvalidByteOrderFlag(other)),
        }
    }
}

/// Encodes CORBA primitives and composites into a growable buffer, honoring CDR alignment
/// relative to the start of the encapsulation.
#[derive(Debug)]
pub struct Encoder {
    buf: Vec<u8>,
    start: usize,
    endian: Endian,
}

impl Encoder {
    /// Starts a new encapsulation, writing its byte-order flag as the first octet.
    pub fn new(endian: Endian) -> Self {
        let mut buf = Vec::new();
        buf.push(endian.flag());
        Self {
            start: buf.len(),
            buf,
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    fn align(&mut self, boundary: usize) {
        let rel = self.buf.len() - self.start;
        let pad = (boundary - (rel % boundary)) % boundary;
        self.buf.resize(self.buf.len() + pad, 0);
    }

    pub fn write_octet(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_octet(u8::from(v));
    }

    pub fn write_char(&mut self, v: u8) {
        self.write_octet(v);
    }

    pub fn write_short(&mut self, v: i16) {
        self.align(2);
        match self.endian {
            Endian::Big => self.buf.write_i16::<BigEndian>(v),
            Endian::Little => self.buf.write_i16::<LittleEndian>(v),
        }
        .expect("writes to a Vec<u8> never fail");
    }

    pub fn write_ushort(&mut self, v: u16) {
        self.write_short(v as i16);
    }

    pub fn write_long(&mut self, v: i32) {
        self.align(4);
        match self.endian {
            Endian::Big => self.buf.write_i32::<BigEndian>(v),
            Endian::Little => self.buf.write_i32::<LittleEndian>(v),
        }
        .expect("writes to a Vec<u8> never fail");
    }

    pub fn write_ulong(&mut self, v: u32) {
        self.write_long(v as i32);
    }

    pub fn write_longlong(&mut self, v: i64) {
        self.align(8);
        match self.endian {
            Endian::Big => self.buf.write_i64::<BigEndian>(v),
            Endian::Little => self.buf.write_i64::<LittleEndian>(v),
        }
        .expect("writes to a Vec<u8> never fail");
    }

    pub fn write_ulonglong(&mut self, v: u64) {
        self.write_longlong(v as i64);
    }

    pub fn write_float(&mut self, v: f32) {
        self.align(4);
        match self.endian {
            Endian::Big => self.buf.write_f32::<BigEndian>(v),
            Endian::Little => self.buf.write_f32::<LittleEndian>(v),
        }
        .expect("writes to a Vec<u8> never fail");
    }

    pub fn write_double(&mut self, v: f64) {
        self.align(8);
        match self.endian {
            Endian::Big => self.buf.write_f64::<BigEndian>(v),
            Endian::Little => self.buf.write_f64::<LittleEndian>(v),
        }
        .expect("writes to a Vec<u8> never fail");
    }

    /// Raw octet run with no length prefix and no alignment beyond octet (1).
    pub fn write_octets(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// `ulong` length (including the terminating nul) followed by the bytes and a nul octet.
    pub fn write_string(&mut self, s: &str) {
        self.write_ulong(s.len() as u32 + 1);
        self.buf.extend_from_slice(s.as_bytes());
        self.buf.push(0);
    }

    /// GIOP 1.2 `wstring` convention: octet count, no terminator.
    pub fn write_wstring_bytes(&mut self, bytes: &[u8]) {
        self.write_ulong(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
    }

    /// `ulong` element count, to be followed by that many elements written by the caller.
    pub fn write_sequence_len(&mut self, len: u32) {
        self.write_ulong(len);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// Decodes CORBA primitives and composites out of a borrowed buffer, honoring CDR alignment
/// relative to the start of the encapsulation.
#[derive(Debug)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
    start: usize,
    endian: Endian,
}

impl<'a> Decoder<'a> {
    /// Opens an encapsulation, reading its byte-order flag as the first octet.
    pub fn new(buf: &'a [u8]) -> CorbaResult<Self> {
        let flag = *buf.first().ok_or(CorbaError::Truncated("byte order flag"))?;
        let endian = Endian::from_flag(flag)?;
        Ok(Self {
            buf,
            pos: 1,
            start: 1,
            endian,
        })
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn align(&mut self, boundary: usize) {
        let rel = self.pos - self.start;
        let pad = (boundary - (rel % boundary)) % boundary;
        self.pos += pad;
    }

    fn require(&self, n: usize) -> CorbaResult<()> {
        if self.pos + n > self.buf.len() {
            Err(CorbaError::Truncated("read past end of buffer"))
        } else {
            Ok(())
        }
    }

    pub fn read_octet(&mut self) -> CorbaResult<u8> {
        self.require(1)?;
        let v = self.buf[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_bool(&mut self) -> CorbaResult<bool> {
        Ok(self.read_octet()? != 0)
    }

    pub fn read_char(&mut self) -> CorbaResult<u8> {
        self.read_octet()
    }

    pub fn read_short(&mut self) -> CorbaResult<i16> {
        self.align(2);
        self.require(2)?;
        let mut slice = &self.buf[self.pos..self.pos + 2];
        let v = match self.endian {
            Endian::Big => slice.read_i16::<BigEndian>(),
            Endian::Little => slice.read_i16::<LittleEndian>(),
        }
        .map_err(|_| CorbaError::Truncated("short"))?;
        self.pos += 2;
        Ok(v)
    }

    pub fn read_ushort(&mut self) -> CorbaResult<u16> {
        Ok(self.read_short()? as u16)
    }

    pub fn read_long(&mut self) -> CorbaResult<i32> {
        self.align(4);
        self.require(4)?;
        let mut slice = &self.buf[self.pos..self.pos + 4];
        let v = match self.endian {
            Endian::Big => slice.read_i32::<BigEndian>(),
            Endian::Little => slice.read_i32::<LittleEndian>(),
        }
        .map_err(|_| CorbaError::Truncated("long"))?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_ulong(&mut self) -> CorbaResult<u32> {
        Ok(self.read_long()? as u32)
    }

    pub fn read_longlong(&mut self) -> CorbaResult<i64> {
        self.align(8);
        self.require(8)?;
        let mut slice = &self.buf[self.pos..self.pos + 8];
        let v = match self.endian {
            Endian::Big => slice.read_i64::<BigEndian>(),
            Endian::Little => slice.read_i64::<LittleEndian>(),
        }
        .map_err(|_| CorbaError::Truncated("longlong"))?;
        self.pos += 8;
        Ok(v)
    }

    pub fn read_ulonglong(&mut self) -> CorbaResult<u64> {
        Ok(self.read_longlong()? as u64)
    }

    pub fn read_float(&mut self) -> CorbaResult<f32> {
        self.align(4);
        self.require(4)?;
        let mut slice = &self.buf[self.pos..self.pos + 4];
        let v = match self.endian {
            Endian::Big => slice.read_f32::<BigEndian>(),
            Endian::Little => slice.read_f32::<LittleEndian>(),
        }
        .map_err(|_| CorbaError::Truncated("float"))?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_double(&mut self) -> CorbaResult<f64> {
        self.align(8);
        self.require(8)?;
        let mut slice = &self.buf[self.pos..self.pos + 8];
        let v = match self.endian {
            Endian::Big => slice.read_f64::<BigEndian>(),
            Endian::Little => slice.read_f64::<LittleEndian>(),
        }
        .map_err(|_| CorbaError::Truncated("double"))?;
        self.pos += 8;
        Ok(v)
    }

    pub fn read_octets(&mut self, n: usize) -> CorbaResult<Vec<u8>> {
        self.require(n)?;
        let v = self.buf[self.pos..self.pos + n].to_vec();
        self.pos += n;
        Ok(v)
    }

    /// `ulong` length (including the terminating nul), the bytes, and the trailing nul.
    pub fn read_string(&mut self) -> CorbaResult<String> {
        let len = self.read_ulong()? as usize;
        if len == 0 {
            return Err(CorbaError::Truncated("zero-length string header"));
        }
        let bytes = self.read_octets(len)?;
        let body = &bytes[..bytes.len() - 1];
        String::from_utf8(body.to_vec()).map_err(|_| CorbaError::Truncated("non-utf8 string"))
    }

    /// GIOP 1.2 `wstring` convention: octet count, no terminator.
    pub fn read_wstring_bytes(&mut self) -> CorbaResult<Vec<u8>> {
        let len = self.read_ulong()? as usize;
        self.read_octets(len)
    }

    pub fn read_sequence_len(&mut self) -> CorbaResult<u32> {
        self.read_ulong()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_matches_offsets_from_start() {
        let mut enc = Encoder::new(Endian::Big);
        enc.write_octet(1); // offset 1
        enc.write_ulong(0xdead_beef); // needs pad to offset 4
        enc.write_octet(2); // offset 8
        enc.write_longlong(42); // needs pad to offset 16
        let bytes = enc.into_bytes();
        // flag(1) + octet(1) + pad(3) + ulong(4) + octet(1) + pad(7) + longlong(8) = 25
        assert_eq!(bytes.len(), 25);

        let mut dec = Decoder::new(&bytes).unwrap();
        assert_eq!(dec.read_octet().unwrap(), 1);
        assert_eq!(dec.read_ulong().unwrap(), 0xdead_beef);
        assert_eq!(dec.read_octet().unwrap(), 2);
        assert_eq!(dec.read_longlong().unwrap(), 42);
    }

    #[test]
    fn zero_length_string_round_trips() {
        let mut enc = Encoder::new(Endian::Little);
        enc.write_string("");
        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes).unwrap();
        assert_eq!(dec.read_string().unwrap(), "");
    }

    #[test]
    fn string_round_trips_both_endians() {
        for endian in [Endian::Big, Endian::Little] {
            let mut enc = Encoder::new(endian);
            enc.write_string("hello corba");
            let bytes = enc.into_bytes();
            let mut dec = Decoder::new(&bytes).unwrap();
            assert_eq!(dec.read_string().unwrap(), "hello corba");
        }
    }

    #[test]
    fn invalid_byte_order_flag_is_rejected() {
        let bytes = [7u8, 0, 0, 0];
        let err = Decoder::new(&bytes).unwrap_err();
        assert!(matches!(err, CorbaError::InvalidByteOrderFlag(7)));
    }

    #[test]
    fn truncated_read_is_reported() {
        let mut enc = Encoder::new(Endian::Big);
        enc.write_ulong(5);
        let mut bytes = enc.into_bytes();
        bytes.truncate(bytes.len() - 1);
        let mut dec = Decoder::new(&bytes).unwrap();
        assert!(dec.read_ulong().is_err());
    }

    #[test]
    fn sequence_of_ulongs_round_trips() {
        let values = [1u32, 2, 3, 4, 5];
        let mut enc = Encoder::new(Endian::Big);
        enc.write_sequence_len(values.len() as u32);
        for v in values {
            enc.write_ulong(v);
        }
        let bytes = enc.into_bytes();
        let mut dec = Decoder::new(&bytes).unwrap();
        let len = dec.read_sequence_len().unwrap();
        let mut out = Vec::new();
        for _ in 0..len {
            out.push(dec.read_ulong().unwrap());
        }
        assert_eq!(out, values);
    }
}
