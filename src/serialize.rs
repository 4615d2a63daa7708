//! Canonical binary encoding and content hashing.
//!
//! Every domain value serializes to a stable byte layout: a one-byte type
//! tag, then the fields in declared order. Integers are fixed-width
//! big-endian, strings are length-prefixed UTF-8, sequences are
//! length-prefixed, optionals are a `0|1` byte followed by the value, and
//! set-like collections are written in canonical order so that logically
//! equal values produce identical bytes on every node. A value's hash is the
//! lowercase-hex SHA-256 of its canonical bytes. The layout is part of the
//! network contract; changing it breaks consensus.

use sha2::{Digest, Sha256};

use crate::errors::{ChainError, ChainResult};

/// Leading type tag of every canonical record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    TypedEdgeHash = 1,
    ObservationEdge = 2,
    HashSignature = 3,
    SignatureBatch = 4,
    SignedObservationEdge = 5,
    LastTransactionRef = 6,
    TransactionEdgeData = 7,
    Edge = 8,
    Transaction = 9,
    ObservationData = 10,
    Observation = 11,
    CheckpointEdgeData = 12,
    CheckpointBlock = 13,
    Height = 14,
    CheckpointCache = 15,
    Snapshot = 16,
    StoredSnapshot = 17,
    AddressCacheData = 18,
    SnapshotInfo = 19,
    StoredRewards = 20,
}

impl Tag {
    fn from_byte(byte: u8) -> ChainResult<Self> {
        let tag = match byte {
            1 => Tag::TypedEdgeHash,
            2 => Tag::ObservationEdge,
            3 => Tag::HashSignature,
            4 => Tag::SignatureBatch,
            5 => Tag::SignedObservationEdge,
            6 => Tag::LastTransactionRef,
            7 => Tag::TransactionEdgeData,
            8 => Tag::Edge,
            9 => Tag::Transaction,
            10 => Tag::ObservationData,
            11 => Tag::Observation,
            12 => Tag::CheckpointEdgeData,
            13 => Tag::CheckpointBlock,
            14 => Tag::Height,
            15 => Tag::CheckpointCache,
            16 => Tag::Snapshot,
            17 => Tag::StoredSnapshot,
            18 => Tag::AddressCacheData,
            19 => Tag::SnapshotInfo,
            20 => Tag::StoredRewards,
            other => {
                return Err(ChainError::Serialization(format!(
                    "unknown record tag {other}"
                )));
            }
        };
        Ok(tag)
    }
}

pub trait CanonicalEncode {
    fn encode(&self, out: &mut Vec<u8>);
}

pub trait CanonicalDecode: Sized {
    fn decode(reader: &mut Reader<'_>) -> ChainResult<Self>;
}

pub fn canonical_bytes<T: CanonicalEncode + ?Sized>(value: &T) -> Vec<u8> {
    let mut out = Vec::new();
    value.encode(&mut out);
    out
}

pub fn decode_all<T: CanonicalDecode>(bytes: &[u8]) -> ChainResult<T> {
    let mut reader = Reader::new(bytes);
    let value = T::decode(&mut reader)?;
    reader.finish()?;
    Ok(value)
}

/// Lowercase-hex SHA-256 of the value's canonical bytes.
pub fn hash_of<T: CanonicalEncode + ?Sized>(value: &T) -> String {
    hash_bytes(&canonical_bytes(value))
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn put_tag(out: &mut Vec<u8>, tag: Tag) {
    out.push(tag as u8);
}

pub fn put_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

pub fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub fn put_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_be_bytes());
}

pub fn put_i64(out: &mut Vec<u8>, value: i64) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Floats travel as their IEEE-754 bit pattern, big-endian.
pub fn put_f64(out: &mut Vec<u8>, value: f64) {
    out.extend_from_slice(&value.to_bits().to_be_bytes());
}

pub fn put_bool(out: &mut Vec<u8>, value: bool) {
    out.push(u8::from(value));
}

pub fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(out, bytes.len() as u32);
    out.extend_from_slice(bytes);
}

pub fn put_str(out: &mut Vec<u8>, value: &str) {
    put_bytes(out, value.as_bytes());
}

pub fn put_opt_str(out: &mut Vec<u8>, value: Option<&str>) {
    match value {
        Some(value) => {
            put_bool(out, true);
            put_str(out, value);
        }
        None => put_bool(out, false),
    }
}

pub fn put_opt_i64(out: &mut Vec<u8>, value: Option<i64>) {
    match value {
        Some(value) => {
            put_bool(out, true);
            put_i64(out, value);
        }
        None => put_bool(out, false),
    }
}

pub fn put_seq<T: CanonicalEncode>(out: &mut Vec<u8>, items: &[T]) {
    put_u32(out, items.len() as u32);
    for item in items {
        item.encode(out);
    }
}

pub fn put_str_seq(out: &mut Vec<u8>, items: &[String]) {
    put_u32(out, items.len() as u32);
    for item in items {
        put_str(out, item);
    }
}

/// Cursor over a canonical byte buffer. All reads are bounds-checked and
/// surface `ChainError::Serialization` on malformed input.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize) -> ChainResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(ChainError::Serialization(format!(
                "truncated record: wanted {len} bytes, {} left",
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn expect_tag(&mut self, expected: Tag) -> ChainResult<()> {
        let found = Tag::from_byte(self.u8()?)?;
        if found != expected {
            return Err(ChainError::Serialization(format!(
                "expected {expected:?} record, found {found:?}"
            )));
        }
        Ok(())
    }

    pub fn u8(&mut self) -> ChainResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u32(&mut self) -> ChainResult<u32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().map_err(|_| {
            ChainError::Serialization("truncated u32".into())
        })?;
        Ok(u32::from_be_bytes(bytes))
    }

    pub fn u64(&mut self) -> ChainResult<u64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().map_err(|_| {
            ChainError::Serialization("truncated u64".into())
        })?;
        Ok(u64::from_be_bytes(bytes))
    }

    pub fn i64(&mut self) -> ChainResult<i64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().map_err(|_| {
            ChainError::Serialization("truncated i64".into())
        })?;
        Ok(i64::from_be_bytes(bytes))
    }

    pub fn f64(&mut self) -> ChainResult<f64> {
        Ok(f64::from_bits(self.u64()?))
    }

    pub fn bool(&mut self) -> ChainResult<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ChainError::Serialization(format!(
                "invalid bool byte {other}"
            ))),
        }
    }

    pub fn bytes(&mut self) -> ChainResult<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn str(&mut self) -> ChainResult<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes)
            .map_err(|err| ChainError::Serialization(format!("invalid utf-8 string: {err}")))
    }

    pub fn opt_str(&mut self) -> ChainResult<Option<String>> {
        if self.bool()? {
            Ok(Some(self.str()?))
        } else {
            Ok(None)
        }
    }

    pub fn opt_i64(&mut self) -> ChainResult<Option<i64>> {
        if self.bool()? {
            Ok(Some(self.i64()?))
        } else {
            Ok(None)
        }
    }

    pub fn seq<T: CanonicalDecode>(&mut self) -> ChainResult<Vec<T>> {
        let len = self.seq_len()?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(T::decode(self)?);
        }
        Ok(items)
    }

    pub fn str_seq(&mut self) -> ChainResult<Vec<String>> {
        let len = self.seq_len()?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.str()?);
        }
        Ok(items)
    }

    fn seq_len(&mut self) -> ChainResult<usize> {
        let len = self.u32()? as usize;
        if len > self.remaining() {
            return Err(ChainError::Serialization(format!(
                "sequence length {len} exceeds remaining {} bytes",
                self.remaining()
            )));
        }
        Ok(len)
    }

    pub fn finish(&self) -> ChainResult<()> {
        if self.remaining() != 0 {
            return Err(ChainError::Serialization(format!(
                "{} trailing bytes after record",
                self.remaining()
            )));
        }
        Ok(())
    }
}
