use crate::{
    config::ReceiptVerificationConfig,
    data::{
        datasources::{
            receipt_payload_datasource::ReceiptPayloadDatasourceImpl,
            receipt_signature_datasource::ReceiptSignatureDatasourceImpl,
        },
        repositories::receipt_repository_impl::ReceiptRepositoryImpl,
    },
    domain::{
        entities::{pkcs7_envelope::Pkcs7Envelope, receipt::Receipt},
        repositories::receipt_repository::ReceiptRepository,
    },
    errors::ReceiptError,
};

/// Entry point for decoding and verifying App Store receipts.
///
/// Holds no state besides its configuration, so one instance can serve any
/// number of receipts, from any number of threads.
pub struct ReceiptUtil<R: ReceiptRepository> {
    receipt_repository: R,
}

impl<R: ReceiptRepository> ReceiptUtil<R> {
    /// Decodes a DER receipt (already base64-decoded).
    ///
    /// Fails only if the envelope or the attribute SET is malformed. Single
    /// attributes that do not decode are left out of their field and kept raw
    /// under `unknown_attributes`.
    pub fn parse_receipt(&self, bytes: &[u8]) -> Result<Receipt, ReceiptError> {
        self.receipt_repository.parse_receipt(bytes)
    }

    /// Whether the receipt was issued for the device with this identifier.
    /// A receipt without an opaque value, bundle ID or hash never binds.
    pub fn binds_to(&self, receipt: &Receipt, device_uuid: &[u8; 16]) -> bool {
        self.receipt_repository.binds_to(receipt, device_uuid)
    }

    /// Whether the envelope's signature chains to the given root.
    ///
    /// `Ok(false)` for any verification failure. `Err` only when the root
    /// certificate or the envelope cannot be loaded at all.
    pub fn signed_by(
        &self,
        envelope: &Pkcs7Envelope,
        root_certificate_der: &[u8],
    ) -> Result<bool, ReceiptError> {
        self.receipt_repository
            .signed_by(envelope, root_certificate_der)
    }

    /// Like [`ReceiptUtil::signed_by`], but reports the reason a signature
    /// was rejected as [`ReceiptError::SignatureInvalid`].
    pub fn verify_signature(
        &self,
        envelope: &Pkcs7Envelope,
        root_certificate_der: &[u8],
    ) -> Result<(), ReceiptError> {
        self.receipt_repository
            .verify_signature(envelope, root_certificate_der)
    }
}

/// The repository [`ReceiptUtil::new`] builds on: DER decoding plus OpenSSL
/// verification.
pub type DefaultReceiptRepository =
    ReceiptRepositoryImpl<ReceiptPayloadDatasourceImpl, ReceiptSignatureDatasourceImpl>;

impl ReceiptUtil<DefaultReceiptRepository> {
    pub fn new() -> Self {
        Self::with_config(ReceiptVerificationConfig::default())
    }

    pub fn with_config(config: ReceiptVerificationConfig) -> Self {
        Self {
            receipt_repository: ReceiptRepositoryImpl::new(
                ReceiptPayloadDatasourceImpl,
                ReceiptSignatureDatasourceImpl,
                config,
            ),
        }
    }
}

impl Default for ReceiptUtil<DefaultReceiptRepository> {
    fn default() -> Self {
        Self::new()
    }
}
