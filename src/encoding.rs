//! Variable-length integers, fixed-width little-endian primitives and the
//! `Encodable` / `Decodable` traits used by every wire message.

use crate::error::{Result, SigningError};
use crate::types::{ByteString, Hash};

/// Returns the number of bytes required for the varint.
pub fn varint_size(n: u64) -> usize {
    if n <= 0xfc {
        1
    } else if n <= 0xffff {
        3
    } else if n <= 0xffff_ffff {
        5
    } else {
        9
    }
}

/// Appends the varint encoding of `n` to `buf`.
pub fn write_varint(n: u64, buf: &mut ByteString) {
    if n <= 0xfc {
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(0xfd);
        buf.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(0xfe);
        buf.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        buf.push(0xff);
        buf.extend_from_slice(&n.to_le_bytes());
    }
}

pub fn encode_varint(n: u64) -> ByteString {
    let mut buf = Vec::with_capacity(varint_size(n));
    write_varint(n, &mut buf);
    buf
}

/// Decodes a minimally-encoded varint at `offset`, returning the value and
/// the number of bytes consumed.
pub fn decode_varint(bytes: &[u8], offset: usize) -> Result<(u64, usize)> {
    decode_varint_inner(bytes, offset, true)
}

/// Like [`decode_varint`] but accepts non-minimal encodings.
pub fn decode_varint_lenient(bytes: &[u8], offset: usize) -> Result<(u64, usize)> {
    decode_varint_inner(bytes, offset, false)
}

fn decode_varint_inner(bytes: &[u8], offset: usize, canonical: bool) -> Result<(u64, usize)> {
    let prefix = *bytes
        .get(offset)
        .ok_or_else(|| truncated("varint prefix", offset))?;
    let (width, minimum) = match prefix {
        0xfd => (2, 0xfd),
        0xfe => (4, 0x1_0000),
        0xff => (8, 0x1_0000_0000),
        n => return Ok((n as u64, 1)),
    };

    let start = offset + 1;
    let end = start + width;
    let body = bytes
        .get(start..end)
        .ok_or_else(|| truncated("varint body", start))?;
    let mut le = [0u8; 8];
    le[..width].copy_from_slice(body);
    let value = u64::from_le_bytes(le);

    if canonical && value < minimum {
        return Err(SigningError::MalformedEncoding(format!(
            "non-canonical varint {} encoded in {} bytes at offset {}",
            value,
            width + 1,
            offset
        )));
    }
    Ok((value, width + 1))
}

pub fn encode_u32_le(n: u32) -> [u8; 4] {
    n.to_le_bytes()
}

pub fn encode_u64_le(n: u64) -> [u8; 8] {
    n.to_le_bytes()
}

pub fn decode_u32_le(bytes: &[u8], offset: usize) -> Result<u32> {
    let raw = bytes
        .get(offset..offset + 4)
        .ok_or_else(|| truncated("u32", offset))?;
    let mut le = [0u8; 4];
    le.copy_from_slice(raw);
    Ok(u32::from_le_bytes(le))
}

pub fn decode_u64_le(bytes: &[u8], offset: usize) -> Result<u64> {
    let raw = bytes
        .get(offset..offset + 8)
        .ok_or_else(|| truncated("u64", offset))?;
    let mut le = [0u8; 8];
    le.copy_from_slice(raw);
    Ok(u64::from_le_bytes(le))
}

fn truncated(what: &str, offset: usize) -> SigningError {
    SigningError::MalformedEncoding(format!("truncated {} at offset {}", what, offset))
}

/// Cursor over an encoded message.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
    canonical: bool,
}

impl<'a> Reader<'a> {
    /// Reader that rejects non-minimal varints.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0, canonical: true }
    }

    pub fn with_canonical(bytes: &'a [u8], canonical: bool) -> Self {
        Self { bytes, position: 0, canonical }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    pub fn peek_u8(&self) -> Result<u8> {
        self.bytes
            .get(self.position)
            .copied()
            .ok_or_else(|| truncated("byte", self.position))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let value = self.peek_u8()?;
        self.position += 1;
        Ok(value)
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let value = decode_u32_le(self.bytes, self.position)?;
        self.position += 4;
        Ok(value)
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        Ok(self.read_u32_le()? as i32)
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        let value = decode_u64_le(self.bytes, self.position)?;
        self.position += 8;
        Ok(value)
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let (value, consumed) = decode_varint_inner(self.bytes, self.position, self.canonical)?;
        self.position += consumed;
        Ok(value)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(SigningError::MalformedEncoding(format!(
                "length {} exceeds remaining {} bytes at offset {}",
                len,
                self.remaining(),
                self.position
            )));
        }
        let slice = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    pub fn read_hash(&mut self) -> Result<Hash> {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(self.read_bytes(32)?);
        Ok(hash)
    }

    /// Reads a varint length prefix followed by that many bytes.
    pub fn read_var_bytes(&mut self) -> Result<ByteString> {
        let len = self.read_length()?;
        Ok(self.read_bytes(len)?.to_vec())
    }

    /// Reads a varint count, rejecting counts that cannot fit in the remaining input.
    pub fn read_length(&mut self) -> Result<usize> {
        let len = self.read_varint()?;
        if len > self.remaining() as u64 {
            return Err(SigningError::MalformedEncoding(format!(
                "declared length {} exceeds remaining {} bytes",
                len,
                self.remaining()
            )));
        }
        Ok(len as usize)
    }

    /// Fails if any bytes are left unread.
    pub fn finish(&self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(SigningError::MalformedEncoding(format!(
                "{} trailing bytes after offset {}",
                self.remaining(),
                self.position
            )));
        }
        Ok(())
    }
}

/// Consensus wire encoding.
pub trait Encodable {
    fn encode_to(&self, buf: &mut ByteString);

    fn encode(&self) -> ByteString {
        let mut buf = Vec::new();
        self.encode_to(&mut buf);
        buf
    }
}

/// Consensus wire decoding.
pub trait Decodable: Sized {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self>;

    /// Decodes a complete message, rejecting trailing bytes.
    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let value = Self::decode_from(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }
}

/// Appends a varint length prefix and the bytes themselves.
pub fn write_var_bytes(bytes: &[u8], buf: &mut ByteString) {
    write_varint(bytes.len() as u64, buf);
    buf.extend_from_slice(bytes);
}

/// Hex representations for byte fields of boundary messages.
pub mod serde_hex {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(D::Error::custom)
    }

    pub mod hash {
        use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(hash: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&hex::encode(hash))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<[u8; 32], D::Error> {
            let s = String::deserialize(deserializer)?;
            let mut out = [0u8; 32];
            hex::decode_to_slice(&s, &mut out).map_err(D::Error::custom)?;
            Ok(out)
        }
    }

    pub mod stack {
        use serde::ser::SerializeSeq;
        use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            items: &[Vec<u8>],
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            let mut seq = serializer.serialize_seq(Some(items.len()))?;
            for item in items {
                seq.serialize_element(&hex::encode(item))?;
            }
            seq.end()
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Vec<Vec<u8>>, D::Error> {
            let items = Vec::<String>::deserialize(deserializer)?;
            items
                .iter()
                .map(|s| hex::decode(s).map_err(D::Error::custom))
                .collect()
        }
    }

    pub mod option {
        use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(b) => serializer.serialize_some(&hex::encode(b)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            let s = Option::<String>::deserialize(deserializer)?;
            s.map(|s| hex::decode(&s).map_err(D::Error::custom)).transpose()
        }
    }
}
