//! Bounds-checked reading and writing over byte slices
//!
//! Every read and write checks the remaining length first, so a malformed length
//! field can never move past the end of the underlying slice.

use crate::error::{DecodeError, EncodeError};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Forward-only reader over a borrowed byte slice
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset from the start of the slice
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Bytes not consumed yet
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.read_bytes(n).map(|_| ())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, DecodeError> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_u64_le(&mut self) -> Result<u64, DecodeError> {
        self.read_array().map(u64::from_le_bytes)
    }

    pub fn read_u16_be(&mut self) -> Result<u16, DecodeError> {
        self.read_array().map(u16::from_be_bytes)
    }

    pub fn read_u32_be(&mut self) -> Result<u32, DecodeError> {
        self.read_array().map(u32::from_be_bytes)
    }

    /// IPv4 address in network byte order
    pub fn read_ipv4(&mut self) -> Result<Ipv4Addr, DecodeError> {
        self.read_array::<4>().map(Ipv4Addr::from)
    }

    /// IPv6 address in network byte order
    pub fn read_ipv6(&mut self) -> Result<Ipv6Addr, DecodeError> {
        self.read_array::<16>().map(Ipv6Addr::from)
    }
}

/// Forward-only writer into a borrowed mutable byte slice
#[derive(Debug)]
pub struct ByteWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> ByteWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Number of bytes written so far
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Give back the underlying slice, e.g. to patch a header once the body is known
    pub fn into_inner(self) -> &'a mut [u8] {
        self.buf
    }

    pub fn put_slice(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        if bytes.len() > self.remaining() {
            return Err(EncodeError::BufferTooSmall {
                needed: bytes.len(),
                available: self.remaining(),
            });
        }
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    pub fn put_zeros(&mut self, n: usize) -> Result<(), EncodeError> {
        if n > self.remaining() {
            return Err(EncodeError::BufferTooSmall {
                needed: n,
                available: self.remaining(),
            });
        }
        self.buf[self.pos..self.pos + n].fill(0);
        self.pos += n;
        Ok(())
    }

    pub fn put_u8(&mut self, v: u8) -> Result<(), EncodeError> {
        self.put_slice(&[v])
    }

    pub fn put_u16_le(&mut self, v: u16) -> Result<(), EncodeError> {
        self.put_slice(&v.to_le_bytes())
    }

    pub fn put_u32_le(&mut self, v: u32) -> Result<(), EncodeError> {
        self.put_slice(&v.to_le_bytes())
    }

    pub fn put_u64_le(&mut self, v: u64) -> Result<(), EncodeError> {
        self.put_slice(&v.to_le_bytes())
    }

    pub fn put_u16_be(&mut self, v: u16) -> Result<(), EncodeError> {
        self.put_slice(&v.to_be_bytes())
    }

    pub fn put_u32_be(&mut self, v: u32) -> Result<(), EncodeError> {
        self.put_slice(&v.to_be_bytes())
    }

    pub fn put_ipv4(&mut self, addr: Ipv4Addr) -> Result<(), EncodeError> {
        self.put_slice(&addr.octets())
    }

    pub fn put_ipv6(&mut self, addr: Ipv6Addr) -> Result<(), EncodeError> {
        self.put_slice(&addr.octets())
    }
}
