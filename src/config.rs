use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Which bytes of the bundle identifier go into the device binding hash.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceBindingMode {
    /// The bundle identifier as UTF-8 text.
    #[default]
    BundleIdText,
    /// The encoded UTF8String TLV of the bundle identifier attribute, as the
    /// App Store computes the hash for device receipts.
    BundleIdDer,
}

/// Options for verifying receipts.
///
/// Nothing here is read from the environment; callers build it directly or
/// deserialize it from their own configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReceiptVerificationConfig {
    /// Check certificate validity at this instant instead of the current time.
    pub verification_time: Option<DateTime<Utc>>,
    /// Accept a chain ending at the supplied root even when that root is not
    /// self-signed (e.g. an intermediate used as the trust anchor).
    pub allow_partial_chain: bool,
    pub device_binding: DeviceBindingMode,
}

impl ReceiptVerificationConfig {
    pub fn with_verification_time(mut self, verification_time: DateTime<Utc>) -> Self {
        self.verification_time = Some(verification_time);
        self
    }

    pub fn with_partial_chain(mut self, allow_partial_chain: bool) -> Self {
        self.allow_partial_chain = allow_partial_chain;
        self
    }

    pub fn with_device_binding(mut self, device_binding: DeviceBindingMode) -> Self {
        self.device_binding = device_binding;
        self
    }
}
