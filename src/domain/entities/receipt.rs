use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_with::{base64::Base64, serde_as};

use super::{
    attribute_value::UnknownAttribute, in_app_purchase::InAppPurchase,
    pkcs7_envelope::Pkcs7Envelope,
};

/// Attribute IDs of the app receipt.
///
/// https://developer.apple.com/library/archive/releasenotes/General/ValidateAppStoreReceipt/Chapters/ReceiptFields.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiptAttributeId {
    ReceiptType,
    AppItemId,
    BundleId,
    ApplicationVersion,
    OpaqueValue,
    Sha1Hash,
    ReceiptCreationDate,
    CreationDate,
    DownloadId,
    VersionExternalIdentifier,
    /// Repeatable: one attribute per in-app purchase.
    InAppPurchases,
    OriginalPurchaseDate,
    OriginalApplicationVersion,
    ExpirationDate,
}

impl ReceiptAttributeId {
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            0 => Some(Self::ReceiptType),
            1 => Some(Self::AppItemId),
            2 => Some(Self::BundleId),
            3 => Some(Self::ApplicationVersion),
            4 => Some(Self::OpaqueValue),
            5 => Some(Self::Sha1Hash),
            8 => Some(Self::ReceiptCreationDate),
            12 => Some(Self::CreationDate),
            15 => Some(Self::DownloadId),
            16 => Some(Self::VersionExternalIdentifier),
            17 => Some(Self::InAppPurchases),
            18 => Some(Self::OriginalPurchaseDate),
            19 => Some(Self::OriginalApplicationVersion),
            21 => Some(Self::ExpirationDate),
            _ => None,
        }
    }

    pub fn id(self) -> i64 {
        match self {
            Self::ReceiptType => 0,
            Self::AppItemId => 1,
            Self::BundleId => 2,
            Self::ApplicationVersion => 3,
            Self::OpaqueValue => 4,
            Self::Sha1Hash => 5,
            Self::ReceiptCreationDate => 8,
            Self::CreationDate => 12,
            Self::DownloadId => 15,
            Self::VersionExternalIdentifier => 16,
            Self::InAppPurchases => 17,
            Self::OriginalPurchaseDate => 18,
            Self::OriginalApplicationVersion => 19,
            Self::ExpirationDate => 21,
        }
    }
}

/// The environment the receipt was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ReceiptType {
    Production,
    ProductionSandbox,

    #[serde(untagged)]
    Unknown(String),
}

impl ReceiptType {
    pub fn as_str(&self) -> &str {
        match self {
            ReceiptType::Production => "Production",
            ReceiptType::ProductionSandbox => "ProductionSandbox",
            ReceiptType::Unknown(value) => value,
        }
    }
}

impl From<String> for ReceiptType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Production" => ReceiptType::Production,
            "ProductionSandbox" => ReceiptType::ProductionSandbox,
            _ => ReceiptType::Unknown(value),
        }
    }
}

/// Decoded app receipt.
///
/// Built once from the receipt bytes and never modified afterwards. Every
/// attribute of the source SET ends up in a named field, in
/// `in_app_purchases`, or in `unknown_attributes`.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_type: Option<ReceiptType>,
    /// The App Store's unique identifier for the app.
    #[serde(rename = "appItemID", skip_serializing_if = "Option::is_none")]
    pub app_item_id: Option<i64>,
    /// The app's bundle identifier.
    #[serde(rename = "bundleID", skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
    /// The app's version number (CFBundleVersion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_version: Option<String>,
    /// An opaque value used, with other data, to compute the SHA-1 hash during
    /// validation.
    #[serde_as(as = "Option<Base64>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opaque_value: Option<Vec<u8>>,
    /// A SHA-1 hash, used to validate the receipt.
    #[serde_as(as = "Option<Base64>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1_hash: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_creation_date: Option<DateTime<Utc>>,
    /// The date when the app receipt was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(rename = "downloadID", skip_serializing_if = "Option::is_none")]
    pub download_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_external_identifier: Option<i64>,
    /// In-app purchases, in the order they appear in the receipt.
    pub in_app_purchases: Vec<InAppPurchase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_purchase_date: Option<DateTime<Utc>>,
    /// The version of the app that was originally purchased.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_application_version: Option<String>,
    /// The date that the app receipt expires. Only present for apps purchased
    /// through the Volume Purchase Program.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
    /// Attributes with IDs outside the receipt schema, plus the raw value of
    /// any recognized attribute that could not be decoded.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub unknown_attributes: BTreeMap<i64, UnknownAttribute>,

    /// Raw value of the bundle identifier attribute (the encoded UTF8String).
    #[serde(skip)]
    pub(crate) bundle_id_data: Option<Vec<u8>>,
    #[serde(skip)]
    pub(crate) envelope: Pkcs7Envelope,
}

impl Receipt {
    pub(crate) fn new(envelope: Pkcs7Envelope) -> Self {
        Self {
            receipt_type: None,
            app_item_id: None,
            bundle_id: None,
            application_version: None,
            opaque_value: None,
            sha1_hash: None,
            receipt_creation_date: None,
            creation_date: None,
            download_id: None,
            version_external_identifier: None,
            in_app_purchases: Vec::new(),
            original_purchase_date: None,
            original_application_version: None,
            expiration_date: None,
            unknown_attributes: BTreeMap::new(),
            bundle_id_data: None,
            envelope,
        }
    }

    /// The signed envelope this receipt was decoded from.
    pub fn envelope(&self) -> &Pkcs7Envelope {
        &self.envelope
    }

    /// Raw encoded value of the bundle identifier attribute.
    pub fn bundle_id_data(&self) -> Option<&[u8]> {
        self.bundle_id_data.as_deref()
    }

    /// First in-app purchase with the given transaction identifier.
    pub fn purchase(&self, transaction_id: &str) -> Option<&InAppPurchase> {
        self.in_app_purchases
            .iter()
            .find(|purchase| purchase.transaction_id.as_deref() == Some(transaction_id))
    }

    /// In-app purchases ordered by purchase date, oldest first. Purchases
    /// without a date come first; ties keep receipt order.
    pub fn in_app_purchases_by_purchase_date(&self) -> Vec<&InAppPurchase> {
        let mut purchases: Vec<&InAppPurchase> = self.in_app_purchases.iter().collect();
        purchases.sort_by_key(|purchase| purchase.purchase_date);
        purchases
    }
}
