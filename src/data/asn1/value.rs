//! Conversions from TLV content octets into primitive values.
//!
//! These functions look at content only. The caller decides which type to
//! expect, which is what makes implicit tagging work: a `[1] IMPLICIT INTEGER`
//! is read with [`decode_integer`] even though its tag says nothing about
//! integers.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::{
    data::asn1::tlv::{read_single, RawTlv, TagClass, Tagging, UniversalType},
    errors::DecodeError,
};

/// Receipt dates are always UTC and always in this shape.
pub const RECEIPT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Big-endian two's complement, at most 8 content octets.
pub fn decode_integer(content: &[u8]) -> Result<i64, DecodeError> {
    if content.is_empty() {
        return Err(DecodeError::InvalidInteger);
    }
    if content.len() > 8 {
        return Err(DecodeError::IntegerOverflow(content.len()));
    }
    let negative = content.first().is_some_and(|first| first & 0x80 != 0);
    let mut buffer = if negative { [0xff; 8] } else { [0x00; 8] };
    buffer[8 - content.len()..].copy_from_slice(content);
    Ok(i64::from_be_bytes(buffer))
}

/// Receipts encode flags as INTEGER; a real BOOLEAN is accepted as well.
/// Any non-zero value is `true`.
pub fn decode_boolean(tlv: &RawTlv<'_>) -> Result<bool, DecodeError> {
    if tlv.is_universal(UniversalType::Boolean) {
        return match tlv.content {
            [value] => Ok(*value != 0),
            _ => Err(DecodeError::InvalidBoolean),
        };
    }
    decode_integer(tlv.content).map(|value| value != 0)
}

pub fn decode_utf8_string(content: &[u8]) -> Result<String, DecodeError> {
    String::from_utf8(content.to_vec()).map_err(|_| DecodeError::InvalidString("UTF8String"))
}

pub fn decode_ia5_string(content: &[u8]) -> Result<String, DecodeError> {
    if !content.is_ascii() {
        return Err(DecodeError::InvalidString("IA5String"));
    }
    decode_utf8_string(content).map_err(|_| DecodeError::InvalidString("IA5String"))
}

/// Text from a universal UTF8String, IA5String or PrintableString TLV.
pub fn decode_text(tlv: &RawTlv<'_>) -> Result<String, DecodeError> {
    match universal_type(tlv) {
        Some(UniversalType::Utf8String) => decode_utf8_string(tlv.content),
        Some(UniversalType::Ia5String) | Some(UniversalType::PrintableString) => {
            decode_ia5_string(tlv.content)
        }
        _ => Err(DecodeError::UnexpectedTag {
            expected: "UTF8String or IA5String".to_string(),
            found: tlv.tag().to_string(),
        }),
    }
}

/// Dot-decimal form, e.g. `1.2.840.113549.1.7.2`.
pub fn decode_object_identifier(content: &[u8]) -> Result<String, DecodeError> {
    let mut arcs: Vec<u64> = Vec::new();
    let mut current: u64 = 0;
    let mut in_arc = false;
    for octet in content {
        if !in_arc && *octet == 0x80 {
            // Non-minimal encoding.
            return Err(DecodeError::InvalidObjectIdentifier);
        }
        if current > (u64::MAX >> 7) {
            return Err(DecodeError::InvalidObjectIdentifier);
        }
        current = (current << 7) | u64::from(octet & 0x7f);
        in_arc = octet & 0x80 != 0;
        if !in_arc {
            arcs.push(current);
            current = 0;
        }
    }
    if in_arc {
        return Err(DecodeError::InvalidObjectIdentifier);
    }
    let Some((first, rest)) = arcs.split_first() else {
        return Err(DecodeError::InvalidObjectIdentifier);
    };

    // §8.19.4: the first subidentifier packs the first two arcs.
    let (root, second) = match *first {
        0..=39 => (0, *first),
        40..=79 => (1, first - 40),
        _ => (2, first - 80),
    };
    let mut text = format!("{root}.{second}");
    for arc in rest {
        text.push('.');
        text.push_str(&arc.to_string());
    }
    Ok(text)
}

/// Parses `yyyy-MM-ddTHH:mm:ssZ` and nothing else.
pub fn decode_date(text: &str) -> Result<DateTime<Utc>, DecodeError> {
    let well_formed = text.len() == 20
        && text.bytes().enumerate().all(|(index, octet)| match index {
            4 | 7 => octet == b'-',
            10 => octet == b'T',
            13 | 16 => octet == b':',
            19 => octet == b'Z',
            _ => octet.is_ascii_digit(),
        });
    if !well_formed {
        return Err(DecodeError::InvalidDate(text.to_string()));
    }
    NaiveDateTime::parse_from_str(text, RECEIPT_DATE_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| DecodeError::InvalidDate(text.to_string()))
}

/// Decodes a buffer holding a single INTEGER TLV.
pub fn decode_integer_value(input: &[u8]) -> Result<i64, DecodeError> {
    let tlv = read_single(input)?.expect(UniversalType::Integer, Tagging::Universal)?;
    decode_integer(tlv.content)
}

/// Decodes a buffer holding a single INTEGER (or BOOLEAN) TLV as a flag.
pub fn decode_boolean_value(input: &[u8]) -> Result<bool, DecodeError> {
    let tlv = read_single(input)?;
    match universal_type(&tlv) {
        Some(UniversalType::Integer) | Some(UniversalType::Boolean) => decode_boolean(&tlv),
        _ => Err(DecodeError::UnexpectedTag {
            expected: "INTEGER or BOOLEAN".to_string(),
            found: tlv.tag().to_string(),
        }),
    }
}

/// Decodes a buffer holding a single string TLV.
pub fn decode_text_value(input: &[u8]) -> Result<String, DecodeError> {
    decode_text(&read_single(input)?)
}

/// Decodes a buffer holding a single string TLV in receipt date format.
pub fn decode_date_value(input: &[u8]) -> Result<DateTime<Utc>, DecodeError> {
    decode_date(&decode_text_value(input)?)
}

pub(crate) fn universal_type(tlv: &RawTlv<'_>) -> Option<UniversalType> {
    if tlv.tag_class != TagClass::Universal {
        return None;
    }
    UniversalType::from_number(tlv.tag_number)
        .filter(|ty| ty.is_constructed() == tlv.constructed)
}
