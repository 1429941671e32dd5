//! DER tree adapter
//!
//! Every message type in this crate is navigated through [`Tlv`], an immutable
//! tree of tag-length-value nodes decoded eagerly from a DER buffer. Nodes
//! borrow from the input, so a parsed tree lives only as long as the bytes it
//! was decoded from; message types copy out what they need while parsing.
//!
//! Encoding goes the other way through [`Node`], a small builder that emits
//! definite-length DER.

use chrono::{DateTime, Utc};
use der_parser::asn1_rs::{Any, Class, FromDer, Oid, Tag};
use num_bigint::BigUint;
use std::borrow::Cow;

use crate::util;

/// Nesting limit for decoded trees
const MAX_DEPTH: usize = 32;

/// Errors raised by the DER layer
///
/// Message types never surface these directly; a codec failure during
/// parsing is reported as a protocol-specific malformed-message error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Asn1Error {
    /// Bytes do not form a valid DER element
    #[error("DER decode error: {0}")]
    Decode(String),

    /// Bytes follow the outermost element
    #[error("{0} trailing bytes after DER element")]
    TrailingData(usize),

    /// Nesting exceeds [`MAX_DEPTH`]
    #[error("DER nesting deeper than {0} levels")]
    TooDeep(usize),

    /// A required child is absent
    #[error("missing element: {0}")]
    Missing(String),

    /// A node has an unexpected class or tag
    #[error("expected {expected}, found {found}")]
    Unexpected { expected: String, found: String },

    /// A node's content cannot be interpreted as the requested type
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

/// Matches a node by class, tag number and (optionally) construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selector {
    pub class: Class,
    pub tag: Tag,
    pub constructed: Option<bool>,
}

impl Selector {
    pub const SEQUENCE: Selector = Selector::universal(Tag::Sequence);
    pub const INTEGER: Selector = Selector::universal(Tag::Integer);
    pub const BOOLEAN: Selector = Selector::universal(Tag::Boolean);
    pub const OCTET_STRING: Selector = Selector::universal(Tag::OctetString);
    pub const BIT_STRING: Selector = Selector::universal(Tag::BitString);
    pub const GENERALIZED_TIME: Selector = Selector::universal(Tag::GeneralizedTime);

    pub const fn universal(tag: Tag) -> Self {
        Self {
            class: Class::Universal,
            tag,
            constructed: None,
        }
    }

    /// Context-specific constructed tag, as used by EXPLICIT tagging
    pub const fn explicit(number: u32) -> Self {
        Self {
            class: Class::ContextSpecific,
            tag: Tag(number),
            constructed: Some(true),
        }
    }

    /// Context-specific tag of either construction
    pub const fn context(number: u32) -> Self {
        Self {
            class: Class::ContextSpecific,
            tag: Tag(number),
            constructed: None,
        }
    }

    pub fn matches(&self, node: &Tlv<'_>) -> bool {
        node.class == self.class
            && node.tag == self.tag
            && self.constructed.map_or(true, |c| c == node.constructed)
    }

    fn describe(&self) -> String {
        format!("{:?} {:?}", self.class, self.tag)
    }
}

/// One decoded DER element
#[derive(Debug, Clone)]
pub struct Tlv<'a> {
    class: Class,
    tag: Tag,
    constructed: bool,
    content: &'a [u8],
    encoded: &'a [u8],
    children: Vec<Tlv<'a>>,
}

impl<'a> Tlv<'a> {
    /// Decode a complete DER element. Trailing bytes are rejected.
    pub fn parse(input: &'a [u8]) -> Result<Self, Asn1Error> {
        let (node, rest) = Self::decode(input, 0)?;
        if !rest.is_empty() {
            return Err(Asn1Error::TrailingData(rest.len()));
        }
        Ok(node)
    }

    fn decode(input: &'a [u8], depth: usize) -> Result<(Self, &'a [u8]), Asn1Error> {
        if depth > MAX_DEPTH {
            return Err(Asn1Error::TooDeep(MAX_DEPTH));
        }

        let (rest, any) =
            Any::from_der(input).map_err(|e| Asn1Error::Decode(format!("{:?}", e)))?;
        let encoded = &input[..input.len() - rest.len()];
        let constructed = any.header.is_constructed();

        let mut children = Vec::new();
        if constructed {
            let mut remaining = any.data;
            while !remaining.is_empty() {
                let (child, next) = Self::decode(remaining, depth + 1)?;
                children.push(child);
                remaining = next;
            }
        }

        let node = Self {
            class: any.header.class(),
            tag: any.header.tag(),
            constructed,
            content: any.data,
            encoded,
            children,
        };
        Ok((node, rest))
    }

    pub fn class(&self) -> Class {
        self.class
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn is_constructed(&self) -> bool {
        self.constructed
    }

    /// Content octets, without the identifier and length
    pub fn content(&self) -> &'a [u8] {
        self.content
    }

    /// The element exactly as it appeared in the input
    pub fn raw(&self) -> &'a [u8] {
        self.encoded
    }

    /// Re-serialize this element as canonical definite-length DER
    pub fn to_der(&self) -> Vec<u8> {
        let class_bits = match self.class {
            Class::Universal => 0x00,
            Class::Application => 0x40,
            Class::ContextSpecific => 0x80,
            Class::Private => 0xC0,
        };
        let content = if self.constructed {
            self.children.iter().flat_map(|c| c.to_der()).collect()
        } else {
            self.content.to_vec()
        };
        encode_tlv(class_bits, self.constructed, self.tag.0, &content)
    }

    pub fn children(&self) -> &[Tlv<'a>] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Child at `index`, failing when the element ends early
    pub fn child(&self, index: usize) -> Result<&Tlv<'a>, Asn1Error> {
        self.children.get(index).ok_or_else(|| {
            Asn1Error::Missing(format!(
                "child {} of {:?} {:?} ({} present)",
                index,
                self.class,
                self.tag,
                self.children.len()
            ))
        })
    }

    /// First direct child matching `selector`
    pub fn find(&self, selector: &Selector) -> Option<&Tlv<'a>> {
        self.children.iter().find(|c| selector.matches(c))
    }

    /// First direct child matching `selector`, failing when there is none
    pub fn require(&self, selector: &Selector) -> Result<&Tlv<'a>, Asn1Error> {
        self.find(selector)
            .ok_or_else(|| Asn1Error::Missing(selector.describe()))
    }

    /// Fail unless this node matches `selector`
    pub fn expect(&self, selector: &Selector) -> Result<&Self, Asn1Error> {
        if selector.matches(self) {
            Ok(self)
        } else {
            Err(Asn1Error::Unexpected {
                expected: selector.describe(),
                found: format!("{:?} {:?}", self.class, self.tag),
            })
        }
    }

    /// OBJECT IDENTIFIER in dotted form
    pub fn as_oid(&self) -> Result<String, Asn1Error> {
        self.expect(&Selector::universal(Tag::Oid))?;
        if self.content.is_empty() {
            return Err(Asn1Error::InvalidValue("empty OBJECT IDENTIFIER".to_string()));
        }
        Ok(Oid::new(Cow::Borrowed(self.content)).to_id_string())
    }

    pub fn as_bool(&self) -> Result<bool, Asn1Error> {
        self.expect(&Selector::BOOLEAN)?;
        match self.content {
            [0x00] => Ok(false),
            [0xFF] => Ok(true),
            other => Err(Asn1Error::InvalidValue(format!(
                "BOOLEAN content {}",
                hex::encode(other)
            ))),
        }
    }

    /// INTEGER or ENUMERATED small enough for a u64
    pub fn as_u64(&self) -> Result<u64, Asn1Error> {
        if !(Selector::INTEGER.matches(self) || Selector::universal(Tag::Enumerated).matches(self)) {
            return Err(Asn1Error::Unexpected {
                expected: "INTEGER".to_string(),
                found: format!("{:?} {:?}", self.class, self.tag),
            });
        }
        self.content_u64()
    }

    /// Content octets read as an unsigned integer, whatever the tag.
    /// Used for IMPLICIT-tagged integers.
    pub fn content_u64(&self) -> Result<u64, Asn1Error> {
        let bytes = strip_sign_octet(self.content)?;
        if bytes.len() > 8 {
            return Err(Asn1Error::InvalidValue(format!(
                "integer of {} octets does not fit u64",
                bytes.len()
            )));
        }
        Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    /// Non-negative INTEGER of any size
    pub fn as_biguint(&self) -> Result<BigUint, Asn1Error> {
        self.expect(&Selector::INTEGER)?;
        Ok(BigUint::from_bytes_be(strip_sign_octet(self.content)?))
    }

    pub fn as_octet_string(&self) -> Result<&'a [u8], Asn1Error> {
        self.expect(&Selector::OCTET_STRING)?;
        Ok(self.content)
    }

    /// BIT STRING payload with the leading unused-bits octet removed
    pub fn as_bit_string(&self) -> Result<&'a [u8], Asn1Error> {
        self.expect(&Selector::BIT_STRING)?;
        match self.content.split_first() {
            Some((unused, bits)) if *unused < 8 => Ok(bits),
            _ => Err(Asn1Error::InvalidValue("BIT STRING without a valid unused-bits octet".to_string())),
        }
    }

    pub fn as_generalized_time(&self) -> Result<DateTime<Utc>, Asn1Error> {
        self.expect(&Selector::GENERALIZED_TIME)?;
        let text = std::str::from_utf8(self.content)
            .map_err(|e| Asn1Error::InvalidValue(format!("GeneralizedTime is not ASCII: {}", e)))?;
        util::datetime_from_str(text).map_err(|e| Asn1Error::InvalidValue(e.to_string()))
    }
}

fn strip_sign_octet(content: &[u8]) -> Result<&[u8], Asn1Error> {
    match content {
        [] => Err(Asn1Error::InvalidValue("empty INTEGER".to_string())),
        [first, ..] if first & 0x80 != 0 => {
            Err(Asn1Error::InvalidValue("negative INTEGER".to_string()))
        }
        [0x00, rest @ ..] => Ok(rest),
        bytes => Ok(bytes),
    }
}

// ============================================================================
// DER Encoding
// ============================================================================

/// A DER element under construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Primitive { class_bits: u8, tag: u32, content: Vec<u8> },
    Constructed { class_bits: u8, tag: u32, children: Vec<Node> },
    /// An element that is already DER-encoded, emitted verbatim
    Encoded(Vec<u8>),
}

impl Node {
    pub fn sequence(children: Vec<Node>) -> Self {
        Node::Constructed {
            class_bits: 0x00,
            tag: Tag::Sequence.0,
            children,
        }
    }

    /// `[number] EXPLICIT` wrapper around one inner element
    pub fn explicit(number: u32, inner: Node) -> Self {
        Node::Constructed {
            class_bits: 0x80,
            tag: number,
            children: vec![inner],
        }
    }

    /// `[number] IMPLICIT` constructed element
    pub fn implicit_constructed(number: u32, children: Vec<Node>) -> Self {
        Node::Constructed {
            class_bits: 0x80,
            tag: number,
            children,
        }
    }

    /// `[number] IMPLICIT` primitive element
    pub fn implicit_primitive(number: u32, content: Vec<u8>) -> Self {
        Node::Primitive {
            class_bits: 0x80,
            tag: number,
            content,
        }
    }

    fn universal(tag: Tag, content: Vec<u8>) -> Self {
        Node::Primitive {
            class_bits: 0x00,
            tag: tag.0,
            content,
        }
    }

    pub fn null() -> Self {
        Self::universal(Tag::Null, Vec::new())
    }

    pub fn boolean(value: bool) -> Self {
        Self::universal(Tag::Boolean, vec![if value { 0xFF } else { 0x00 }])
    }

    pub fn integer(value: &BigUint) -> Self {
        Self::universal(Tag::Integer, unsigned_content(value))
    }

    pub fn small_integer(value: u64) -> Self {
        Self::integer(&BigUint::from(value))
    }

    pub fn enumerated(value: u8) -> Self {
        Self::universal(Tag::Enumerated, unsigned_content(&BigUint::from(value)))
    }

    pub fn octet_string(bytes: &[u8]) -> Self {
        Self::universal(Tag::OctetString, bytes.to_vec())
    }

    /// BIT STRING with no unused bits
    pub fn bit_string(bytes: &[u8]) -> Self {
        let mut content = Vec::with_capacity(bytes.len() + 1);
        content.push(0);
        content.extend_from_slice(bytes);
        Self::universal(Tag::BitString, content)
    }

    pub fn generalized_time(time: &DateTime<Utc>) -> Self {
        Self::universal(
            Tag::GeneralizedTime,
            time.format("%Y%m%d%H%M%SZ").to_string().into_bytes(),
        )
    }

    /// OBJECT IDENTIFIER from its dotted form
    pub fn oid(dotted: &str) -> Result<Self, Asn1Error> {
        let arcs = dotted
            .split('.')
            .map(|arc| arc.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| Asn1Error::InvalidValue(format!("OID '{}'", dotted)))?;

        if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] >= 40) {
            return Err(Asn1Error::InvalidValue(format!("OID '{}'", dotted)));
        }

        // First two arcs are encoded as 40*v1 + v2
        let mut content = encode_base128(arcs[0] * 40 + arcs[1]);
        for &arc in &arcs[2..] {
            content.extend(encode_base128(arc));
        }
        Ok(Self::universal(Tag::Oid, content))
    }

    /// `AlgorithmIdentifier` with NULL parameters
    pub fn algorithm(dotted: &str) -> Result<Self, Asn1Error> {
        Ok(Self::sequence(vec![Self::oid(dotted)?, Self::null()]))
    }

    pub fn to_der(&self) -> Vec<u8> {
        match self {
            Node::Primitive {
                class_bits,
                tag,
                content,
            } => encode_tlv(*class_bits, false, *tag, content),
            Node::Constructed {
                class_bits,
                tag,
                children,
            } => {
                let content: Vec<u8> = children.iter().flat_map(Node::to_der).collect();
                encode_tlv(*class_bits, true, *tag, &content)
            }
            Node::Encoded(der) => der.clone(),
        }
    }
}

fn unsigned_content(value: &BigUint) -> Vec<u8> {
    let mut bytes = value.to_bytes_be();
    // Keep the value positive if the high bit is set
    if bytes.first().map_or(false, |b| b & 0x80 != 0) {
        bytes.insert(0, 0x00);
    }
    bytes
}

fn encode_tlv(class_bits: u8, constructed: bool, tag: u32, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 8);
    let form = if constructed { 0x20 } else { 0x00 };
    if tag < 31 {
        out.push(class_bits | form | tag as u8);
    } else {
        out.push(class_bits | form | 0x1F);
        out.extend(encode_base128(u64::from(tag)));
    }
    out.extend(der_length(content.len()));
    out.extend_from_slice(content);
    out
}

fn der_length(length: usize) -> Vec<u8> {
    if length < 128 {
        return vec![length as u8];
    }
    let bytes: Vec<u8> = length
        .to_be_bytes()
        .iter()
        .copied()
        .skip_while(|b| *b == 0)
        .collect();
    let mut out = vec![0x80 | bytes.len() as u8];
    out.extend(bytes);
    out
}

fn encode_base128(mut value: u64) -> Vec<u8> {
    let mut out = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        out.push(0x80 | (value & 0x7F) as u8);
        value >>= 7;
    }
    out.reverse();
    out
}
