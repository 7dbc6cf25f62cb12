use crate::{
    domain::entities::{pkcs7_envelope::Pkcs7Envelope, receipt::Receipt},
    errors::ReceiptError,
};

pub trait ReceiptRepository {
    fn parse_receipt(&self, bytes: &[u8]) -> Result<Receipt, ReceiptError>;

    fn binds_to(&self, receipt: &Receipt, device_uuid: &[u8; 16]) -> bool;

    fn signed_by(
        &self,
        envelope: &Pkcs7Envelope,
        root_certificate_der: &[u8],
    ) -> Result<bool, ReceiptError>;

    fn verify_signature(
        &self,
        envelope: &Pkcs7Envelope,
        root_certificate_der: &[u8],
    ) -> Result<(), ReceiptError>;
}
