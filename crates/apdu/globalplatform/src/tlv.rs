//! BER-TLV codec
//!
//! Encodes and decodes tag-length-value structures following the basic
//! encoding rules of ISO/IEC 8825-1, as used by GlobalPlatform registry data
//! and command payloads.
//!
//! Decoding accepts definite lengths in short form and in long form with up to
//! four length bytes, and the indefinite form (`0x80`). An indefinite value
//! runs to the end of the enclosing buffer and must be closed by a `00 00`
//! end-of-contents marker. Encoding always produces minimal definite lengths.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use tracing::trace;

/// Bit of the first tag byte marking a constructed encoding
pub const CONSTRUCTED_BIT: u8 = 0x20;

const TAG_NUMBER_MASK: u8 = 0x1F;
const TAG_CONTINUATION_BIT: u8 = 0x80;
const LENGTH_LONG_FORM: u8 = 0x80;
const LENGTH_RESERVED: u8 = 0xFF;
const MAX_LENGTH_BYTES: usize = 4;
const END_OF_CONTENTS: [u8; 2] = [0x00, 0x00];

/// Errors raised while encoding or decoding BER-TLV data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TlvError {
    /// Tag bytes break the multi-byte continuation rule
    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    /// Input ended before the announced tag, length or value
    #[error("Truncated TLV data")]
    Truncated,

    /// Length byte `0xFF` is reserved
    #[error("Reserved length encoding 0xFF")]
    ReservedLength,

    /// Long form length that does not fit in four bytes
    #[error("Length exceeds representable size: {0} length bytes")]
    LengthTooLarge(usize),

    /// Indefinite length value not closed by `00 00`
    #[error("Indefinite length value lacks the end-of-contents marker")]
    MissingEndOfContents,

    /// Indefinite lengths are only accepted when decoding
    #[error("Indefinite length cannot be encoded")]
    IndefiniteEncoding,

    /// A constructed node was requested for a primitive tag
    #[error("Tag {0} is not constructed")]
    NotConstructed(Tag),

    /// A primitive node was requested for a constructed tag
    #[error("Tag {0} is constructed")]
    NotPrimitive(Tag),

    /// Lookup for a single node found none
    #[error("Tag {0} not found")]
    TagNotFound(String),

    /// Lookup for a single node found several
    #[error("Tag {tag} occurs {count} times")]
    DuplicateTag {
        /// Tag looked up, in hex
        tag: String,
        /// Number of occurrences found
        count: usize,
    },
}

type Result<T> = std::result::Result<T, TlvError>;

/// A BER tag of one or more bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(Bytes);

impl Tag {
    /// Create a tag, checking the multi-byte continuation rule
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        let Some((&first, rest)) = bytes.split_first() else {
            return Err(TlvError::InvalidTag(String::new()));
        };

        let valid = if first & TAG_NUMBER_MASK != TAG_NUMBER_MASK {
            rest.is_empty()
        } else {
            match rest.split_last() {
                Some((&last, middle)) => {
                    last & TAG_CONTINUATION_BIT == 0
                        && middle.iter().all(|b| b & TAG_CONTINUATION_BIT != 0)
                }
                None => false,
            }
        };

        if valid {
            Ok(Self(bytes))
        } else {
            Err(TlvError::InvalidTag(hex::encode_upper(&bytes)))
        }
    }

    /// Read a tag from the start of `data`, returning it with its length
    fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let first = *data.first().ok_or(TlvError::Truncated)?;
        let mut len = 1;
        if first & TAG_NUMBER_MASK == TAG_NUMBER_MASK {
            loop {
                let byte = *data.get(len).ok_or(TlvError::Truncated)?;
                len += 1;
                if byte & TAG_CONTINUATION_BIT == 0 {
                    break;
                }
            }
        }
        Ok((Self(Bytes::copy_from_slice(&data[..len])), len))
    }

    /// Raw tag bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether the tag marks a constructed encoding
    pub fn is_constructed(&self) -> bool {
        self.0[0] & CONSTRUCTED_BIT != 0
    }
}

impl AsRef<[u8]> for Tag {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<u8> for Tag {
    type Error = TlvError;

    fn try_from(tag: u8) -> Result<Self> {
        Self::new(vec![tag])
    }
}

impl TryFrom<&[u8]> for Tag {
    type Error = TlvError;

    fn try_from(tag: &[u8]) -> Result<Self> {
        Self::new(Bytes::copy_from_slice(tag))
    }
}

impl PartialEq<[u8]> for Tag {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(&self.0))
    }
}

/// Length field of a TLV node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    /// Explicit number of value bytes
    Definite(usize),
    /// Value closed by an end-of-contents marker
    Indefinite,
}

impl Length {
    /// Encode in the shortest definite form
    pub fn encode(&self) -> Result<Vec<u8>> {
        match *self {
            Self::Definite(len) => Ok(encode_definite(len)),
            Self::Indefinite => Err(TlvError::IndefiniteEncoding),
        }
    }

    /// Read a length from the start of `data`, returning it with the number
    /// of bytes it occupied
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let first = *data.first().ok_or(TlvError::Truncated)?;
        match first {
            LENGTH_RESERVED => Err(TlvError::ReservedLength),
            LENGTH_LONG_FORM => Ok((Self::Indefinite, 1)),
            short if short & LENGTH_LONG_FORM == 0 => Ok((Self::Definite(short as usize), 1)),
            long => {
                let count = (long & !LENGTH_LONG_FORM) as usize;
                if count > MAX_LENGTH_BYTES {
                    return Err(TlvError::LengthTooLarge(count));
                }
                let bytes = data.get(1..1 + count).ok_or(TlvError::Truncated)?;
                let len = bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
                Ok((Self::Definite(len), 1 + count))
            }
        }
    }
}

fn encode_definite(len: usize) -> Vec<u8> {
    if len < LENGTH_LONG_FORM as usize {
        return vec![len as u8];
    }
    let be = len.to_be_bytes();
    let skip = be.iter().take_while(|b| **b == 0).count();
    let mut out = Vec::with_capacity(1 + be.len() - skip);
    out.push(LENGTH_LONG_FORM | (be.len() - skip) as u8);
    out.extend_from_slice(&be[skip..]);
    out
}

/// Value of a TLV node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Raw bytes
    Primitive(Bytes),
    /// Nested nodes, in order
    Constructed(Vec<Tlv>),
}

/// A single BER-TLV node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    tag: Tag,
    value: Value,
}

impl Tlv {
    /// Create a node holding raw bytes; the tag must be primitive
    pub fn primitive(tag: Tag, value: impl Into<Bytes>) -> Result<Self> {
        if tag.is_constructed() {
            return Err(TlvError::NotPrimitive(tag));
        }
        Ok(Self {
            tag,
            value: Value::Primitive(value.into()),
        })
    }

    /// Create a node holding nested nodes; the tag must be constructed
    pub fn constructed(tag: Tag, children: Vec<Self>) -> Result<Self> {
        if !tag.is_constructed() {
            return Err(TlvError::NotConstructed(tag));
        }
        Ok(Self {
            tag,
            value: Value::Constructed(children),
        })
    }

    /// Tag of this node
    pub const fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Value of this node
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Nested nodes, or `None` for a primitive node
    pub fn children(&self) -> Option<&[Self]> {
        match &self.value {
            Value::Constructed(children) => Some(children),
            Value::Primitive(_) => None,
        }
    }

    /// Encoded value bytes: the raw bytes, or the concatenated children
    pub fn value_bytes(&self) -> Bytes {
        match &self.value {
            Value::Primitive(bytes) => bytes.clone(),
            Value::Constructed(children) => {
                let mut buf = BytesMut::new();
                for child in children {
                    child.write_to(&mut buf);
                }
                buf.freeze()
            }
        }
    }

    /// Length of the encoded value, recomputed from the current contents
    pub fn length(&self) -> usize {
        match &self.value {
            Value::Primitive(bytes) => bytes.len(),
            Value::Constructed(children) => children.iter().map(Self::encoded_len).sum(),
        }
    }

    fn encoded_len(&self) -> usize {
        let len = self.length();
        self.tag.as_bytes().len() + encode_definite(len).len() + len
    }

    /// Full encoding: tag, minimal definite length, value
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf.freeze()
    }

    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_slice(self.tag.as_bytes());
        buf.put_slice(&encode_definite(self.length()));
        match &self.value {
            Value::Primitive(bytes) => buf.put_slice(bytes),
            Value::Constructed(children) => {
                for child in children {
                    child.write_to(buf);
                }
            }
        }
    }

    /// Decode one node from the start of `data`, returning it with the
    /// number of bytes consumed
    fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let (tag, tag_len) = Tag::decode(data)?;
        let (length, length_len) = Length::decode(&data[tag_len..])?;
        let header = tag_len + length_len;

        let (content, consumed) = match length {
            Length::Definite(len) => {
                let end = header.checked_add(len).ok_or(TlvError::Truncated)?;
                (data.get(header..end).ok_or(TlvError::Truncated)?, end)
            }
            Length::Indefinite => {
                let rest = &data[header..];
                if !rest.ends_with(&END_OF_CONTENTS) {
                    return Err(TlvError::MissingEndOfContents);
                }
                (&rest[..rest.len() - END_OF_CONTENTS.len()], data.len())
            }
        };

        let value = if tag.is_constructed() {
            Value::Constructed(parse(content)?)
        } else {
            Value::Primitive(Bytes::copy_from_slice(content))
        };

        Ok((Self { tag, value }, consumed))
    }
}

/// Parse a buffer into its ordered top-level nodes
pub fn parse(data: &[u8]) -> Result<Vec<Tlv>> {
    let mut nodes = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let (node, consumed) = Tlv::decode(&data[offset..])?;
        trace!(tag = %node.tag, len = node.length(), "Decoded TLV");
        nodes.push(node);
        offset += consumed;
    }
    Ok(nodes)
}

/// Tag lookups over a list of sibling nodes
pub trait TlvSearch {
    /// The only node carrying `tag`
    fn single(&self, tag: impl AsRef<[u8]>) -> Result<&Tlv>;

    /// The node carrying `tag`, if present at most once
    fn single_or_none(&self, tag: impl AsRef<[u8]>) -> Result<Option<&Tlv>>;

    /// Every node carrying `tag`, in order
    fn all_with_tag(&self, tag: impl AsRef<[u8]>) -> Vec<&Tlv>;
}

impl TlvSearch for [Tlv] {
    fn single(&self, tag: impl AsRef<[u8]>) -> Result<&Tlv> {
        let tag = tag.as_ref();
        self.single_or_none(tag)?
            .ok_or_else(|| TlvError::TagNotFound(hex::encode_upper(tag)))
    }

    fn single_or_none(&self, tag: impl AsRef<[u8]>) -> Result<Option<&Tlv>> {
        let tag = tag.as_ref();
        match self.all_with_tag(tag).as_slice() {
            [] => Ok(None),
            [node] => Ok(Some(*node)),
            many => Err(TlvError::DuplicateTag {
                tag: hex::encode_upper(tag),
                count: many.len(),
            }),
        }
    }

    fn all_with_tag(&self, tag: impl AsRef<[u8]>) -> Vec<&Tlv> {
        let tag = tag.as_ref();
        self.iter().filter(|node| node.tag == *tag).collect()
    }
}
