use crate::{
    data::asn1::{
        tlv::{read_single, RawTlv, Tagging, UniversalType},
        value::decode_integer,
    },
    errors::DecodeError,
};

/// ReceiptAttribute ::= SEQUENCE {
///   type    INTEGER,
///   version INTEGER,
///   value   OCTET STRING }
///
/// `value` borrows the OCTET STRING content, which is itself an encoded TLV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReceiptAttributeModel<'a> {
    pub(crate) attribute_type: i64,
    pub(crate) version: i64,
    pub(crate) value: &'a [u8],
}

impl<'a> ReceiptAttributeModel<'a> {
    fn decode(tlv: RawTlv<'a>) -> Result<Self, DecodeError> {
        let tlv = tlv.expect(UniversalType::Sequence, Tagging::Universal)?;
        let mut fields = tlv.children();
        let attribute_type =
            decode_integer(fields.read(UniversalType::Integer, Tagging::Universal)?.content)?;
        let version =
            decode_integer(fields.read(UniversalType::Integer, Tagging::Universal)?.content)?;
        let value = fields
            .read(UniversalType::OctetString, Tagging::Universal)?
            .content;
        fields.finish()?;
        Ok(Self {
            attribute_type,
            version,
            value,
        })
    }
}

/// One element of the attribute SET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttributeElement<'a> {
    Attribute(ReceiptAttributeModel<'a>),
    /// Carries a readable `type` but is not a well-formed triple. `encoded`
    /// is the whole element.
    Malformed {
        attribute_type: i64,
        encoded: &'a [u8],
    },
}

impl AttributeElement<'_> {
    pub(crate) fn attribute_type(&self) -> i64 {
        match self {
            Self::Attribute(attribute) => attribute.attribute_type,
            Self::Malformed { attribute_type, .. } => *attribute_type,
        }
    }
}

fn leading_attribute_type(tlv: RawTlv<'_>) -> Result<i64, DecodeError> {
    let tlv = tlv.expect(UniversalType::Sequence, Tagging::Universal)?;
    decode_integer(
        tlv.children()
            .read(UniversalType::Integer, Tagging::Universal)?
            .content,
    )
}

/// Splits an encoded `SET OF ReceiptAttribute` into its elements, in source
/// order.
///
/// The buffer must hold exactly one SET, and its children must be readable
/// TLVs. An element that is not an attribute triple but still starts with a
/// `type` INTEGER comes back as [`AttributeElement::Malformed`]. Only elements
/// without a readable type are skipped.
pub(crate) fn decode_attribute_set(input: &[u8]) -> Result<Vec<AttributeElement<'_>>, DecodeError> {
    let set = read_single(input)?.expect(UniversalType::Set, Tagging::Universal)?;
    let mut elements = Vec::new();
    for element in set.children() {
        let element = element?;
        match ReceiptAttributeModel::decode(element) {
            Ok(attribute) => elements.push(AttributeElement::Attribute(attribute)),
            Err(e) => match leading_attribute_type(element) {
                Ok(attribute_type) => elements.push(AttributeElement::Malformed {
                    attribute_type,
                    encoded: element.encoded,
                }),
                Err(_) => log::warn!("Skipping receipt attribute without a type: {e}"),
            },
        }
    }
    Ok(elements)
}
