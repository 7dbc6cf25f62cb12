//! Generic BER/DER tag-length-value reader.
//!
//! Rec. ITU-T X.690 §8.1. Only definite lengths are accepted; every value is a
//! borrowed view into the caller's buffer and nothing is copied here.

use std::fmt;

use crate::errors::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagClass {
    Universal,
    Application,
    ContextSpecific,
    Private,
}

impl TagClass {
    fn from_identifier(identifier: u8) -> Self {
        match identifier >> 6 {
            0 => TagClass::Universal,
            1 => TagClass::Application,
            2 => TagClass::ContextSpecific,
            _ => TagClass::Private,
        }
    }
}

/// The subset of universal types that appear in receipts and their PKCS#7
/// envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniversalType {
    Boolean,
    Integer,
    OctetString,
    Null,
    ObjectIdentifier,
    Utf8String,
    Sequence,
    Set,
    PrintableString,
    Ia5String,
}

impl UniversalType {
    pub fn number(self) -> u32 {
        match self {
            UniversalType::Boolean => 1,
            UniversalType::Integer => 2,
            UniversalType::OctetString => 4,
            UniversalType::Null => 5,
            UniversalType::ObjectIdentifier => 6,
            UniversalType::Utf8String => 12,
            UniversalType::Sequence => 16,
            UniversalType::Set => 17,
            UniversalType::PrintableString => 19,
            UniversalType::Ia5String => 22,
        }
    }

    pub fn from_number(number: u32) -> Option<Self> {
        match number {
            1 => Some(UniversalType::Boolean),
            2 => Some(UniversalType::Integer),
            4 => Some(UniversalType::OctetString),
            5 => Some(UniversalType::Null),
            6 => Some(UniversalType::ObjectIdentifier),
            12 => Some(UniversalType::Utf8String),
            16 => Some(UniversalType::Sequence),
            17 => Some(UniversalType::Set),
            19 => Some(UniversalType::PrintableString),
            22 => Some(UniversalType::Ia5String),
            _ => None,
        }
    }

    /// SET and SEQUENCE are always constructed; everything else is read in its
    /// primitive (DER) form.
    pub fn is_constructed(self) -> bool {
        matches!(self, UniversalType::Sequence | UniversalType::Set)
    }
}

/// How a field is tagged in the surrounding schema.
///
/// Tagging is always stated by the caller, never guessed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tagging {
    /// The value carries its own universal tag.
    Universal,
    /// `[n] IMPLICIT`: the context tag replaces the universal tag.
    Implicit(u32),
    /// `[n] EXPLICIT`: a constructed context tag wraps the complete value.
    Explicit(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    pub class: TagClass,
    pub constructed: bool,
    pub number: u32,
}

impl Tag {
    pub fn universal(ty: UniversalType) -> Self {
        Self {
            class: TagClass::Universal,
            constructed: ty.is_constructed(),
            number: ty.number(),
        }
    }

    pub fn context(number: u32, constructed: bool) -> Self {
        Self {
            class: TagClass::ContextSpecific,
            constructed,
            number,
        }
    }

    /// The outermost tag a field of type `ty` carries under `tagging`.
    pub fn outer(ty: UniversalType, tagging: Tagging) -> Self {
        match tagging {
            Tagging::Universal => Self::universal(ty),
            Tagging::Implicit(number) => Self::context(number, ty.is_constructed()),
            Tagging::Explicit(number) => Self::context(number, true),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let form = if self.constructed {
            "constructed"
        } else {
            "primitive"
        };
        match self.class {
            TagClass::Universal => match UniversalType::from_number(self.number) {
                Some(ty) => write!(f, "{ty:?} ({form})"),
                None => write!(f, "[UNIVERSAL {}] ({form})", self.number),
            },
            TagClass::Application => write!(f, "[APPLICATION {}] ({form})", self.number),
            TagClass::ContextSpecific => write!(f, "[{}] ({form})", self.number),
            TagClass::Private => write!(f, "[PRIVATE {}] ({form})", self.number),
        }
    }
}

/// One decoded TLV, borrowing from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTlv<'a> {
    pub tag_class: TagClass,
    pub constructed: bool,
    pub tag_number: u32,
    pub length: usize,
    /// The value octets.
    pub content: &'a [u8],
    /// Identifier, length and value octets together.
    pub encoded: &'a [u8],
}

impl<'a> RawTlv<'a> {
    pub fn tag(&self) -> Tag {
        Tag {
            class: self.tag_class,
            constructed: self.constructed,
            number: self.tag_number,
        }
    }

    pub fn is_universal(&self, ty: UniversalType) -> bool {
        self.tag() == Tag::universal(ty)
    }

    /// Cursor over the child TLVs of a constructed value.
    pub fn children(&self) -> TlvReader<'a> {
        TlvReader::new(self.content)
    }

    /// Checks this TLV against the expected type and tagging and returns the
    /// TLV that holds the actual value. For explicit tagging that is the single
    /// TLV nested inside the context tag.
    pub fn expect(self, ty: UniversalType, tagging: Tagging) -> Result<RawTlv<'a>, DecodeError> {
        let expected = Tag::outer(ty, tagging);
        if self.tag() != expected {
            return Err(DecodeError::UnexpectedTag {
                expected: expected.to_string(),
                found: self.tag().to_string(),
            });
        }
        match tagging {
            Tagging::Universal | Tagging::Implicit(_) => Ok(self),
            Tagging::Explicit(_) => read_single(self.content)?.expect(ty, Tagging::Universal),
        }
    }
}

fn byte_at(input: &[u8], position: usize) -> Result<u8, DecodeError> {
    input.get(position).copied().ok_or(DecodeError::Truncated {
        needed: position + 1,
        available: input.len(),
    })
}

/// Reads one TLV from the start of `input`.
///
/// Returns the TLV and the number of bytes it occupies.
pub fn read_tlv(input: &[u8]) -> Result<(RawTlv<'_>, usize), DecodeError> {
    // §8.1.2: identifier octets
    let identifier = byte_at(input, 0)?;
    let mut position = 1;
    let mut tag_number = u32::from(identifier & 0x1f);
    if tag_number == 0x1f {
        tag_number = 0;
        loop {
            let octet = byte_at(input, position)?;
            position += 1;
            if tag_number > (u32::MAX >> 7) {
                return Err(DecodeError::TagNumberOverflow);
            }
            tag_number = (tag_number << 7) | u32::from(octet & 0x7f);
            if octet & 0x80 == 0 {
                break;
            }
        }
    }

    // §8.1.3: length octets
    let initial = byte_at(input, position)?;
    position += 1;
    let length = match initial {
        0x00..=0x7f => usize::from(initial),
        0x80 => return Err(DecodeError::IndefiniteLength),
        _ => {
            let count = usize::from(initial & 0x7f);
            if count > std::mem::size_of::<usize>() {
                return Err(DecodeError::UnsupportedLength(count));
            }
            let end = position + count;
            let octets = input.get(position..end).ok_or(DecodeError::Truncated {
                needed: end,
                available: input.len(),
            })?;
            position = end;
            octets
                .iter()
                .fold(0usize, |length, octet| (length << 8) | usize::from(*octet))
        }
    };

    let end = position
        .checked_add(length)
        .filter(|end| *end <= input.len())
        .ok_or(DecodeError::Truncated {
            needed: position.saturating_add(length),
            available: input.len(),
        })?;
    let (encoded, _) = input.split_at(end);
    let (_, content) = encoded.split_at(position);

    Ok((
        RawTlv {
            tag_class: TagClass::from_identifier(identifier),
            constructed: identifier & 0x20 != 0,
            tag_number,
            length,
            content,
            encoded,
        },
        end,
    ))
}

/// Reads a buffer that must hold exactly one TLV.
pub fn read_single(input: &[u8]) -> Result<RawTlv<'_>, DecodeError> {
    let (tlv, consumed) = read_tlv(input)?;
    if consumed != input.len() {
        return Err(DecodeError::TrailingData(input.len() - consumed));
    }
    Ok(tlv)
}

/// Sequential cursor over consecutive TLVs, e.g. the children of a SET or
/// SEQUENCE.
///
/// As an [`Iterator`] it stops at the first error, after yielding it.
#[derive(Debug, Clone)]
pub struct TlvReader<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> TlvReader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, position: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.position >= self.input.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> &'a [u8] {
        self.input.get(self.position..).unwrap_or_default()
    }

    /// Reads the next TLV, whatever its tag.
    pub fn read_any(&mut self) -> Result<RawTlv<'a>, DecodeError> {
        let (tlv, consumed) = read_tlv(self.remaining())?;
        self.position += consumed;
        Ok(tlv)
    }

    /// Reads the next TLV and checks it against `ty` under `tagging`.
    pub fn read(&mut self, ty: UniversalType, tagging: Tagging) -> Result<RawTlv<'a>, DecodeError> {
        let (tlv, consumed) = read_tlv(self.remaining())?;
        let value = tlv.expect(ty, tagging)?;
        self.position += consumed;
        Ok(value)
    }

    /// Like [`TlvReader::read`], but returns `None` without consuming anything
    /// when the reader is exhausted or the next tag does not match.
    pub fn read_optional(
        &mut self,
        ty: UniversalType,
        tagging: Tagging,
    ) -> Result<Option<RawTlv<'a>>, DecodeError> {
        match self.peek_tag()? {
            Some(tag) if tag == Tag::outer(ty, tagging) => self.read(ty, tagging).map(Some),
            _ => Ok(None),
        }
    }

    /// Tag of the next TLV, without consuming it.
    pub fn peek_tag(&self) -> Result<Option<Tag>, DecodeError> {
        if self.is_empty() {
            return Ok(None);
        }
        read_tlv(self.remaining()).map(|(tlv, _)| Some(tlv.tag()))
    }

    /// Fails if any bytes are left unread.
    pub fn finish(self) -> Result<(), DecodeError> {
        match self.remaining().len() {
            0 => Ok(()),
            trailing => Err(DecodeError::TrailingData(trailing)),
        }
    }
}

impl<'a> Iterator for TlvReader<'a> {
    type Item = Result<RawTlv<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_empty() {
            return None;
        }
        let result = self.read_any();
        if result.is_err() {
            self.position = self.input.len();
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_form_primitive() {
        let input = [0x02, 0x01, 0x05, 0xff];
        let (tlv, consumed) = read_tlv(&input).unwrap();
        assert_eq!(consumed, 3);
        assert_eq!(tlv.tag_class, TagClass::Universal);
        assert!(!tlv.constructed);
        assert_eq!(tlv.tag_number, 2);
        assert_eq!(tlv.length, 1);
        assert_eq!(tlv.content, &[0x05]);
        assert_eq!(tlv.encoded, &[0x02, 0x01, 0x05]);
    }

    #[test]
    fn test_long_form_length() {
        let mut input = vec![0x04, 0x82, 0x01, 0x00];
        input.extend(std::iter::repeat(0xab).take(256));
        let (tlv, consumed) = read_tlv(&input).unwrap();
        assert_eq!(consumed, 260);
        assert_eq!(tlv.length, 256);
        assert_eq!(tlv.content.len(), 256);
    }

    #[test]
    fn test_high_tag_number_form() {
        // [APPLICATION 201] constructed, empty.
        let input = [0x7f, 0x81, 0x49, 0x00];
        let (tlv, _) = read_tlv(&input).unwrap();
        assert_eq!(tlv.tag_class, TagClass::Application);
        assert!(tlv.constructed);
        assert_eq!(tlv.tag_number, 201);
        assert!(tlv.content.is_empty());
    }

    #[test]
    fn test_tag_number_overflow() {
        let input = [0x1f, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7f, 0x00];
        assert_eq!(read_tlv(&input), Err(DecodeError::TagNumberOverflow));
    }

    #[test]
    fn test_indefinite_length_rejected() {
        let input = [0x30, 0x80, 0x00, 0x00];
        assert_eq!(read_tlv(&input), Err(DecodeError::IndefiniteLength));
    }

    #[test]
    fn test_length_exceeding_buffer() {
        let input = [0x04, 0x05, 0x01, 0x02];
        assert_eq!(
            read_tlv(&input),
            Err(DecodeError::Truncated {
                needed: 7,
                available: 4
            })
        );
    }

    #[test]
    fn test_oversized_length_count() {
        let input = [0x04, 0x89, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        assert_eq!(read_tlv(&input), Err(DecodeError::UnsupportedLength(9)));
    }

    #[test]
    fn test_empty_and_truncated_headers() {
        assert!(matches!(read_tlv(&[]), Err(DecodeError::Truncated { .. })));
        assert!(matches!(read_tlv(&[0x30]), Err(DecodeError::Truncated { .. })));
        assert!(matches!(read_tlv(&[0x1f, 0x81]), Err(DecodeError::Truncated { .. })));
        assert!(matches!(read_tlv(&[0x04, 0x82, 0x01]), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn test_explicit_tagging_unwraps_inner_value() {
        // [0] EXPLICIT OCTET STRING 'hi'
        let input = [0xa0, 0x04, 0x04, 0x02, b'h', b'i'];
        let mut reader = TlvReader::new(&input);
        let tlv = reader.read(UniversalType::OctetString, Tagging::Explicit(0)).unwrap();
        assert!(tlv.is_universal(UniversalType::OctetString));
        assert_eq!(tlv.content, b"hi");
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn test_explicit_tagging_rejects_wrong_inner_type() {
        let input = [0xa0, 0x03, 0x02, 0x01, 0x01];
        let mut reader = TlvReader::new(&input);
        assert!(matches!(
            reader.read(UniversalType::OctetString, Tagging::Explicit(0)),
            Err(DecodeError::UnexpectedTag { .. })
        ));
        // Nothing consumed on failure.
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_implicit_tagging_keeps_context_tag() {
        // [1] IMPLICIT SET with one INTEGER
        let input = [0xa1, 0x03, 0x02, 0x01, 0x07];
        let mut reader = TlvReader::new(&input);
        let tlv = reader.read(UniversalType::Set, Tagging::Implicit(1)).unwrap();
        assert_eq!(tlv.tag_class, TagClass::ContextSpecific);
        let children: Vec<_> = tlv.children().collect::<Result<_, _>>().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].content, &[0x07]);
    }

    #[test]
    fn test_optional_field_absent_does_not_consume() {
        // SET { } following, no [0] present.
        let input = [0x31, 0x00];
        let mut reader = TlvReader::new(&input);
        assert_eq!(
            reader.read_optional(UniversalType::Set, Tagging::Implicit(0)).unwrap(),
            None
        );
        assert_eq!(reader.position(), 0);
        assert!(reader.read(UniversalType::Set, Tagging::Universal).is_ok());
        assert_eq!(
            reader.read_optional(UniversalType::Set, Tagging::Implicit(1)).unwrap(),
            None
        );
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let input = [0x02, 0x01, 0x01, 0x02, 0x05, 0x01];
        let items: Vec<_> = TlvReader::new(&input).collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[test]
    fn test_read_single_rejects_trailing_bytes() {
        assert_eq!(
            read_single(&[0x05, 0x00, 0x00]),
            Err(DecodeError::TrailingData(1))
        );
    }

    #[test]
    fn test_tag_display() {
        assert_eq!(
            Tag::universal(UniversalType::Sequence).to_string(),
            "Sequence (constructed)"
        );
        assert_eq!(Tag::context(0, true).to_string(), "[0] (constructed)");
    }
}
