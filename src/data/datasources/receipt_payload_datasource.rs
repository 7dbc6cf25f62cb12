use std::collections::{btree_map::Entry, BTreeMap};

use crate::{
    data::{
        asn1::{
            tlv::{read_single, UniversalType},
            value::{
                decode_boolean, decode_boolean_value, decode_date_value, decode_integer,
                decode_integer_value, decode_object_identifier, decode_text, decode_text_value,
                universal_type,
            },
        },
        models::receipt_attribute_model::{
            decode_attribute_set, AttributeElement, ReceiptAttributeModel,
        },
    },
    domain::entities::{
        attribute_value::{AttributeValue, UnknownAttribute},
        in_app_purchase::{InAppPurchase, InAppPurchaseAttributeId, InAppType},
        pkcs7_envelope::Pkcs7Envelope,
        receipt::{Receipt, ReceiptAttributeId, ReceiptType},
    },
    errors::{DecodeError, ReceiptError, StructuralContext},
};

pub trait ReceiptPayloadDatasource {
    /// Decode the PKCS#7 ContentInfo wrapping the receipt.
    ///
    /// bytes:
    ///   DER-encoded receipt, as stored by the device (not base64).
    fn decode_envelope(&self, bytes: &[u8]) -> Result<Pkcs7Envelope, ReceiptError>;

    /// Decode the attribute SET carried in the envelope's encapsulated content
    /// into a [`Receipt`]. Only a malformed SET is an error; individual
    /// attributes that fail to decode are kept raw.
    fn decode_receipt(&self, envelope: Pkcs7Envelope) -> Result<Receipt, ReceiptError>;
}

pub struct ReceiptPayloadDatasourceImpl;

impl ReceiptPayloadDatasource for ReceiptPayloadDatasourceImpl {
    fn decode_envelope(&self, bytes: &[u8]) -> Result<Pkcs7Envelope, ReceiptError> {
        Pkcs7Envelope::from_der(bytes)
    }

    fn decode_receipt(&self, envelope: Pkcs7Envelope) -> Result<Receipt, ReceiptError> {
        let payload = envelope.payload().to_vec();
        let receipt = decode_attributes(&payload, Receipt::new(envelope))
            .cxt("ReceiptPayloadDatasourceImpl::decode_receipt")?;
        log::debug!(
            "Decoded receipt for {:?} with {} in-app purchases and {} unknown attribute IDs.",
            receipt.bundle_id,
            receipt.in_app_purchases.len(),
            receipt.unknown_attributes.len(),
        );
        Ok(receipt)
    }
}

/// Outcome of offering an attribute to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    Recognized,
    Unrecognized,
}

/// A record built from a SET of attribute triples, keyed by an ID table.
pub(crate) trait AttributeSchema {
    /// Stores the attribute if its ID belongs to the schema.
    ///
    /// An error means the ID was recognized but the value did not decode as
    /// the documented type. The record must be left unchanged in that case.
    fn apply(&mut self, attribute: &ReceiptAttributeModel<'_>) -> Result<Dispatch, DecodeError>;

    fn unknown_attributes_mut(&mut self) -> &mut BTreeMap<i64, UnknownAttribute>;
}

/// Decodes `input` as a SET of attribute triples and dispatches each one into
/// `record`.
///
/// Recognized attributes that fail to decode, and elements that are not
/// well-formed triples, are logged and stored raw under their ID in the
/// unknown attributes, so every ID in the input ends up somewhere in the
/// record.
pub(crate) fn decode_attributes<T: AttributeSchema>(
    input: &[u8],
    mut record: T,
) -> Result<T, DecodeError> {
    for element in decode_attribute_set(input)? {
        let (attribute_type, value) = match element {
            AttributeElement::Attribute(attribute) => match record.apply(&attribute) {
                Ok(Dispatch::Recognized) => continue,
                Ok(Dispatch::Unrecognized) => {
                    (attribute.attribute_type, decode_any(attribute.value))
                }
                Err(e) => {
                    log::warn!(
                        "Failed to decode attribute {} (version {}): {e}",
                        attribute.attribute_type,
                        attribute.version
                    );
                    (
                        attribute.attribute_type,
                        AttributeValue::Raw(attribute.value.to_vec()),
                    )
                }
            },
            AttributeElement::Malformed {
                attribute_type,
                encoded,
            } => {
                log::warn!("Attribute {attribute_type} is not a well-formed triple.");
                (attribute_type, AttributeValue::Raw(encoded.to_vec()))
            }
        };
        match record.unknown_attributes_mut().entry(attribute_type) {
            Entry::Vacant(entry) => {
                entry.insert(UnknownAttribute::Single(value));
            }
            Entry::Occupied(mut entry) => entry.get_mut().push(value),
        }
    }
    Ok(record)
}

/// Best-effort decode of an attribute value whose type is not known.
pub(crate) fn decode_any(value: &[u8]) -> AttributeValue {
    let Ok(tlv) = read_single(value) else {
        return AttributeValue::Raw(value.to_vec());
    };
    let decoded = match universal_type(&tlv) {
        Some(UniversalType::Integer) => decode_integer(tlv.content).map(AttributeValue::Integer),
        Some(UniversalType::Boolean) => decode_boolean(&tlv).map(AttributeValue::Boolean),
        Some(UniversalType::Utf8String)
        | Some(UniversalType::Ia5String)
        | Some(UniversalType::PrintableString) => decode_text(&tlv).map(AttributeValue::Text),
        Some(UniversalType::ObjectIdentifier) => {
            decode_object_identifier(tlv.content).map(AttributeValue::ObjectIdentifier)
        }
        Some(UniversalType::OctetString) => Ok(AttributeValue::Bytes(tlv.content.to_vec())),
        _ => return AttributeValue::Raw(value.to_vec()),
    };
    decoded.unwrap_or_else(|_| AttributeValue::Raw(value.to_vec()))
}

impl AttributeSchema for Receipt {
    fn apply(&mut self, attribute: &ReceiptAttributeModel<'_>) -> Result<Dispatch, DecodeError> {
        let Some(id) = ReceiptAttributeId::from_id(attribute.attribute_type) else {
            return Ok(Dispatch::Unrecognized);
        };
        let value = attribute.value;
        match id {
            ReceiptAttributeId::ReceiptType => {
                self.receipt_type = Some(ReceiptType::from(decode_text_value(value)?))
            }
            ReceiptAttributeId::AppItemId => self.app_item_id = Some(decode_integer_value(value)?),
            ReceiptAttributeId::BundleId => {
                self.bundle_id = Some(decode_text_value(value)?);
                self.bundle_id_data = Some(value.to_vec());
            }
            ReceiptAttributeId::ApplicationVersion => {
                self.application_version = Some(decode_text_value(value)?)
            }
            ReceiptAttributeId::OpaqueValue => self.opaque_value = Some(value.to_vec()),
            ReceiptAttributeId::Sha1Hash => self.sha1_hash = Some(value.to_vec()),
            ReceiptAttributeId::ReceiptCreationDate => {
                self.receipt_creation_date = Some(decode_date_value(value)?)
            }
            ReceiptAttributeId::CreationDate => self.creation_date = Some(decode_date_value(value)?),
            ReceiptAttributeId::DownloadId => self.download_id = Some(decode_integer_value(value)?),
            ReceiptAttributeId::VersionExternalIdentifier => {
                self.version_external_identifier = Some(decode_integer_value(value)?)
            }
            ReceiptAttributeId::InAppPurchases => self
                .in_app_purchases
                .push(decode_attributes(value, InAppPurchase::default())?),
            ReceiptAttributeId::OriginalPurchaseDate => {
                self.original_purchase_date = Some(decode_date_value(value)?)
            }
            ReceiptAttributeId::OriginalApplicationVersion => {
                self.original_application_version = Some(decode_text_value(value)?)
            }
            ReceiptAttributeId::ExpirationDate => {
                self.expiration_date = Some(decode_date_value(value)?)
            }
        }
        Ok(Dispatch::Recognized)
    }

    fn unknown_attributes_mut(&mut self) -> &mut BTreeMap<i64, UnknownAttribute> {
        &mut self.unknown_attributes
    }
}

impl AttributeSchema for InAppPurchase {
    fn apply(&mut self, attribute: &ReceiptAttributeModel<'_>) -> Result<Dispatch, DecodeError> {
        let Some(id) = InAppPurchaseAttributeId::from_id(attribute.attribute_type) else {
            return Ok(Dispatch::Unrecognized);
        };
        let value = attribute.value;
        match id {
            InAppPurchaseAttributeId::Quantity => self.quantity = Some(decode_integer_value(value)?),
            InAppPurchaseAttributeId::ProductId => {
                self.product_id = Some(decode_text_value(value)?)
            }
            InAppPurchaseAttributeId::TransactionId => {
                self.transaction_id = Some(decode_text_value(value)?)
            }
            InAppPurchaseAttributeId::PurchaseDate => {
                self.purchase_date = Some(decode_date_value(value)?)
            }
            InAppPurchaseAttributeId::OriginalTransactionId => {
                self.original_transaction_id = Some(decode_text_value(value)?)
            }
            InAppPurchaseAttributeId::OriginalPurchaseDate => {
                self.original_purchase_date = Some(decode_date_value(value)?)
            }
            InAppPurchaseAttributeId::InAppType => {
                self.in_app_type = Some(InAppType::from(decode_integer_value(value)?))
            }
            InAppPurchaseAttributeId::ExpiresDate => {
                self.expires_date = Some(decode_date_value(value)?)
            }
            InAppPurchaseAttributeId::WebOrderLineItemId => {
                self.web_order_line_item_id = Some(decode_integer_value(value)?)
            }
            InAppPurchaseAttributeId::CancellationDate => {
                self.cancellation_date = Some(decode_date_value(value)?)
            }
            InAppPurchaseAttributeId::IsTrialPeriod => {
                self.is_trial_period = Some(decode_boolean_value(value)?)
            }
            InAppPurchaseAttributeId::IsInIntroOfferPeriod => {
                self.is_in_intro_offer_period = Some(decode_boolean_value(value)?)
            }
        }
        Ok(Dispatch::Recognized)
    }

    fn unknown_attributes_mut(&mut self) -> &mut BTreeMap<i64, UnknownAttribute> {
        &mut self.unknown_attributes
    }
}
