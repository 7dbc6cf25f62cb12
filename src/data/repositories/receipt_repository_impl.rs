use crate::{
    config::{DeviceBindingMode, ReceiptVerificationConfig},
    data::datasources::{
        receipt_payload_datasource::ReceiptPayloadDatasource,
        receipt_signature_datasource::ReceiptSignatureDatasource,
    },
    domain::{
        entities::{pkcs7_envelope::Pkcs7Envelope, receipt::Receipt},
        repositories::receipt_repository::ReceiptRepository,
    },
    errors::ReceiptError,
};

pub struct ReceiptRepositoryImpl<
    P: ReceiptPayloadDatasource,
    S: ReceiptSignatureDatasource,
> {
    payload_datasource: P,
    signature_datasource: S,
    config: ReceiptVerificationConfig,
}

impl<P: ReceiptPayloadDatasource, S: ReceiptSignatureDatasource> ReceiptRepositoryImpl<P, S> {
    pub(crate) fn new(
        payload_datasource: P,
        signature_datasource: S,
        config: ReceiptVerificationConfig,
    ) -> Self {
        Self {
            payload_datasource,
            signature_datasource,
            config,
        }
    }
}

impl<P: ReceiptPayloadDatasource, S: ReceiptSignatureDatasource> ReceiptRepository
    for ReceiptRepositoryImpl<P, S>
{
    fn parse_receipt(&self, bytes: &[u8]) -> Result<Receipt, ReceiptError> {
        let envelope = self.payload_datasource.decode_envelope(bytes)?;
        self.payload_datasource.decode_receipt(envelope)
    }

    fn binds_to(&self, receipt: &Receipt, device_uuid: &[u8; 16]) -> bool {
        let bundle_id = match self.config.device_binding {
            DeviceBindingMode::BundleIdText => receipt.bundle_id.as_deref().map(str::as_bytes),
            DeviceBindingMode::BundleIdDer => receipt.bundle_id_data(),
        };
        let (Some(opaque_value), Some(bundle_id), Some(sha1_hash)) = (
            receipt.opaque_value.as_deref(),
            bundle_id,
            receipt.sha1_hash.as_deref(),
        ) else {
            log::debug!("Receipt lacks the attributes needed for device binding.");
            return false;
        };
        let digest =
            self.signature_datasource
                .device_binding_digest(device_uuid, opaque_value, bundle_id);
        digest.as_slice() == sha1_hash
    }

    fn signed_by(
        &self,
        envelope: &Pkcs7Envelope,
        root_certificate_der: &[u8],
    ) -> Result<bool, ReceiptError> {
        match self.verify_signature(envelope, root_certificate_der) {
            Ok(()) => Ok(true),
            Err(ReceiptError::SignatureInvalid(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn verify_signature(
        &self,
        envelope: &Pkcs7Envelope,
        root_certificate_der: &[u8],
    ) -> Result<(), ReceiptError> {
        self.signature_datasource.verify_signature(
            envelope.as_der(),
            root_certificate_der,
            &self.config,
        )
    }
}
