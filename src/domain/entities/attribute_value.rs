use serde::Serialize;
use serde_with::{base64::Base64, serde_as};

/// Best-effort value of an attribute whose ID is not part of the schema.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Integer(i64),
    Boolean(bool),
    Text(String),
    ObjectIdentifier(String),
    /// Content of an OCTET STRING.
    Bytes(#[serde_as(as = "Base64")] Vec<u8>),
    /// The attribute value as found, when it is not a single primitive TLV of
    /// a known type (or was malformed).
    Raw(#[serde_as(as = "Base64")] Vec<u8>),
}

/// All values stored under one unknown attribute ID.
///
/// IDs are not unique within a receipt; a recurring ID collects its values in
/// source order instead of overwriting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UnknownAttribute {
    Single(AttributeValue),
    Repeated(Vec<AttributeValue>),
}

impl UnknownAttribute {
    pub fn values(&self) -> &[AttributeValue] {
        match self {
            UnknownAttribute::Single(value) => std::slice::from_ref(value),
            UnknownAttribute::Repeated(values) => values,
        }
    }

    pub(crate) fn push(&mut self, value: AttributeValue) {
        match self {
            UnknownAttribute::Repeated(values) => values.push(value),
            UnknownAttribute::Single(first) => {
                let first = std::mem::replace(first, AttributeValue::Raw(Vec::new()));
                *self = UnknownAttribute::Repeated(vec![first, value]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_aggregates_in_order() {
        let mut attribute = UnknownAttribute::Single(AttributeValue::Integer(1));
        assert_eq!(attribute.values(), &[AttributeValue::Integer(1)]);

        attribute.push(AttributeValue::Text("two".into()));
        attribute.push(AttributeValue::Raw(vec![3]));
        assert_eq!(
            attribute,
            UnknownAttribute::Repeated(vec![
                AttributeValue::Integer(1),
                AttributeValue::Text("two".into()),
                AttributeValue::Raw(vec![3]),
            ])
        );
    }
}
