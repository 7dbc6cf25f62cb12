use openssl::{
    error::ErrorStack,
    pkcs7::{Pkcs7, Pkcs7Flags},
    sha::Sha1,
    stack::Stack,
    x509::{
        store::{X509Store, X509StoreBuilder},
        verify::{X509VerifyFlags, X509VerifyParam},
        X509,
    },
};

use crate::{config::ReceiptVerificationConfig, errors::ReceiptError};

pub trait ReceiptSignatureDatasource {
    /// SHA-1 over the device identifier, the receipt's opaque value and the
    /// bundle identifier bytes, concatenated in that order.
    fn device_binding_digest(
        &self,
        device_uuid: &[u8; 16],
        opaque_value: &[u8],
        bundle_id: &[u8],
    ) -> [u8; 20];

    /// Verify a PKCS#7 SignedData envelope against a single trusted root.
    ///
    /// envelope_der:
    ///   The complete DER-encoded ContentInfo.
    /// root_certificate_der:
    ///   DER-encoded X.509 certificate used as the only trust anchor.
    fn verify_signature(
        &self,
        envelope_der: &[u8],
        root_certificate_der: &[u8],
        config: &ReceiptVerificationConfig,
    ) -> Result<(), ReceiptError>;
}

pub struct ReceiptSignatureDatasourceImpl;

impl ReceiptSignatureDatasource for ReceiptSignatureDatasourceImpl {
    fn device_binding_digest(
        &self,
        device_uuid: &[u8; 16],
        opaque_value: &[u8],
        bundle_id: &[u8],
    ) -> [u8; 20] {
        let mut hasher = Sha1::new();
        hasher.update(device_uuid);
        hasher.update(opaque_value);
        hasher.update(bundle_id);
        hasher.finish()
    }

    fn verify_signature(
        &self,
        envelope_der: &[u8],
        root_certificate_der: &[u8],
        config: &ReceiptVerificationConfig,
    ) -> Result<(), ReceiptError> {
        let store = build_trust_store(root_certificate_der, config)
            .map_err(|e| ReceiptError::InvalidRootCertificate(e.to_string()))?;
        let pkcs7 = Pkcs7::from_der(envelope_der)
            .map_err(|e| ReceiptError::InvalidEnvelope(e.to_string()))?;
        let certs = Stack::<X509>::new()
            .map_err(|e| ReceiptError::InvalidEnvelope(e.to_string()))?;

        // The signer certificate and any intermediates come from the envelope.
        pkcs7
            .verify(&certs, &store, None, None, Pkcs7Flags::empty())
            .map_err(|e| {
                let reason = failure_reason(&e);
                log::warn!("Receipt signature verification failed: {reason}");
                ReceiptError::SignatureInvalid(reason)
            })
    }
}

fn build_trust_store(
    root_certificate_der: &[u8],
    config: &ReceiptVerificationConfig,
) -> Result<X509Store, ErrorStack> {
    let root = X509::from_der(root_certificate_der)?;
    let mut builder = X509StoreBuilder::new()?;
    builder.add_cert(root)?;

    if config.verification_time.is_some() || config.allow_partial_chain {
        let mut param = X509VerifyParam::new()?;
        if let Some(verification_time) = config.verification_time {
            param.set_time(verification_time.timestamp() as _);
        }
        if config.allow_partial_chain {
            param.set_flags(X509VerifyFlags::PARTIAL_CHAIN)?;
        }
        builder.set_param(&param)?;
    }
    Ok(builder.build())
}

fn failure_reason(error: &ErrorStack) -> String {
    error
        .errors()
        .iter()
        .find_map(|e| e.reason())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}
