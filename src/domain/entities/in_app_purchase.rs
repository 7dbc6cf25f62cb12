use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::attribute_value::UnknownAttribute;

/// Attribute IDs of the in-app purchase receipt (the SET nested in receipt
/// attribute 17).
///
/// https://developer.apple.com/library/archive/releasenotes/General/ValidateAppStoreReceipt/Chapters/ReceiptFields.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InAppPurchaseAttributeId {
    Quantity,
    ProductId,
    TransactionId,
    PurchaseDate,
    OriginalTransactionId,
    OriginalPurchaseDate,
    InAppType,
    ExpiresDate,
    WebOrderLineItemId,
    CancellationDate,
    IsTrialPeriod,
    IsInIntroOfferPeriod,
}

impl InAppPurchaseAttributeId {
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1701 => Some(Self::Quantity),
            1702 => Some(Self::ProductId),
            1703 => Some(Self::TransactionId),
            1704 => Some(Self::PurchaseDate),
            1705 => Some(Self::OriginalTransactionId),
            1706 => Some(Self::OriginalPurchaseDate),
            1707 => Some(Self::InAppType),
            1708 => Some(Self::ExpiresDate),
            1711 => Some(Self::WebOrderLineItemId),
            1712 => Some(Self::CancellationDate),
            1713 => Some(Self::IsTrialPeriod),
            1719 => Some(Self::IsInIntroOfferPeriod),
            _ => None,
        }
    }

    pub fn id(self) -> i64 {
        match self {
            Self::Quantity => 1701,
            Self::ProductId => 1702,
            Self::TransactionId => 1703,
            Self::PurchaseDate => 1704,
            Self::OriginalTransactionId => 1705,
            Self::OriginalPurchaseDate => 1706,
            Self::InAppType => 1707,
            Self::ExpiresDate => 1708,
            Self::WebOrderLineItemId => 1711,
            Self::CancellationDate => 1712,
            Self::IsTrialPeriod => 1713,
            Self::IsInIntroOfferPeriod => 1719,
        }
    }
}

/// One in-app purchase record. Every field is optional: a missing or
/// undecodable attribute leaves the field empty, and the caller supplies
/// whatever default makes sense.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InAppPurchase {
    /// The number of items purchased.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    /// The product identifier of the item that was purchased.
    #[serde(rename = "productID", skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    /// The transaction identifier of the item that was purchased.
    #[serde(rename = "transactionID", skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// For a transaction that restores a previous transaction, the transaction
    /// identifier of the original transaction. Otherwise, identical to the
    /// transaction identifier.
    #[serde(
        rename = "originalTransactionID",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_transaction_id: Option<String>,
    /// The date and time that the item was purchased.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<DateTime<Utc>>,
    /// For a transaction that restores a previous transaction, the date of the
    /// original transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_purchase_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_app_type: Option<InAppType>,
    /// The expiration date for the subscription. Only present for
    /// auto-renewable subscription receipts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_date: Option<DateTime<Utc>>,
    /// The primary key for identifying subscription purchases.
    #[serde(rename = "webOrderLineItemID", skip_serializing_if = "Option::is_none")]
    pub web_order_line_item_id: Option<i64>,
    /// For a transaction that was canceled by Apple customer support, the time
    /// and date of the cancellation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_trial_period: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_in_intro_offer_period: Option<bool>,
    /// Attributes with IDs outside the in-app purchase schema.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub unknown_attributes: BTreeMap<i64, UnknownAttribute>,
}

impl InAppPurchase {
    /// A purchase without an expiration date counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_date {
            Some(expires_date) => expires_date <= now,
            None => true,
        }
    }

    pub fn is_cancelled_at(&self, now: DateTime<Utc>) -> bool {
        self.cancellation_date
            .is_some_and(|cancellation_date| cancellation_date <= now)
    }
}

/// Product type recorded for an in-app purchase.
///
/// Values outside the documented range are kept as [`InAppType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InAppType {
    Unknown,
    NonConsumable,
    Consumable,
    NonRenewingSubscription,
    AutoRenewableSubscription,

    #[serde(untagged)]
    Other(i64),
}

impl InAppType {
    pub fn raw_value(self) -> i64 {
        match self {
            InAppType::Unknown => -1,
            InAppType::NonConsumable => 0,
            InAppType::Consumable => 1,
            InAppType::NonRenewingSubscription => 2,
            InAppType::AutoRenewableSubscription => 3,
            InAppType::Other(value) => value,
        }
    }
}

impl From<i64> for InAppType {
    fn from(value: i64) -> Self {
        match value {
            -1 => InAppType::Unknown,
            0 => InAppType::NonConsumable,
            1 => InAppType::Consumable,
            2 => InAppType::NonRenewingSubscription,
            3 => InAppType::AutoRenewableSubscription,
            other => InAppType::Other(other),
        }
    }
}
