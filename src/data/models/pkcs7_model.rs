//! Decoding of the PKCS#7 envelope (RFC 2315 §7, §9).
//!
//! The shape is fixed. Any deviation in the mandatory fields is fatal, since
//! without it there is no way to locate the receipt payload. Certificates,
//! CRLs and signer attributes are optional and may be missing or unreadable.

use crate::{
    data::asn1::{
        tlv::{read_tlv, RawTlv, Tag, TlvReader, Tagging, UniversalType},
        value::{decode_integer, decode_object_identifier},
    },
    domain::entities::pkcs7_envelope::{
        AlgorithmIdentifier, Certificate, EncapsulatedContentInfo, IssuerAndSerialNumber,
        Pkcs7Envelope, SignedData, SignerIdentifier, SignerInfo,
    },
    errors::{DecodeError, ReceiptError, StructuralContext},
};

impl Pkcs7Envelope {
    /// ContentInfo ::= SEQUENCE {
    ///   contentType ContentType,
    ///   content [0] EXPLICIT ANY DEFINED BY contentType }
    pub(crate) fn from_der(input: &[u8]) -> Result<Self, ReceiptError> {
        const CXT: &str = "Pkcs7Envelope::from_der";
        let (content_info, consumed) = read_tlv(input).cxt(CXT)?;
        let content_info = content_info
            .expect(UniversalType::Sequence, Tagging::Universal)
            .cxt(CXT)?;
        if consumed < input.len() {
            log::debug!(
                "Ignoring {} bytes after the PKCS#7 ContentInfo.",
                input.len() - consumed
            );
        }

        let mut fields = content_info.children();
        let content_type = read_object_identifier(&mut fields).cxt(CXT)?;
        let signed_data = fields
            .read(UniversalType::Sequence, Tagging::Explicit(0))
            .cxt(CXT)?;

        Ok(Self {
            content_type,
            content: SignedData::decode(signed_data)?,
            der: content_info.encoded.to_vec(),
        })
    }
}

impl SignedData {
    /// SignedData ::= SEQUENCE {
    ///   version Version,
    ///   digestAlgorithms DigestAlgorithmIdentifiers,
    ///   contentInfo ContentInfo,
    ///   certificates [0] IMPLICIT ExtendedCertificatesAndCertificates OPTIONAL,
    ///   crls [1] IMPLICIT CertificateRevocationLists OPTIONAL,
    ///   signerInfos SignerInfos }
    fn decode(tlv: RawTlv<'_>) -> Result<Self, ReceiptError> {
        const CXT: &str = "SignedData::decode";
        let mut fields = tlv.children();
        let version = read_integer(&mut fields).cxt(CXT)?;

        let digest_algorithms = fields
            .read(UniversalType::Set, Tagging::Universal)
            .and_then(|set| {
                set.children()
                    .map(|algorithm| algorithm.and_then(AlgorithmIdentifier::decode))
                    .collect::<Result<Vec<_>, _>>()
            })
            .cxt(CXT)?;

        let encap_content_info = EncapsulatedContentInfo::decode(
            fields
                .read(UniversalType::Sequence, Tagging::Universal)
                .cxt(CXT)?,
        )?;

        let certificates = read_optional_set(&mut fields, 0, "certificates")
            .cxt(CXT)?
            .map(|elements| elements.into_iter().map(Certificate::from_der).collect());
        let crls = read_optional_set(&mut fields, 1, "crls").cxt(CXT)?;

        let signer_infos = fields
            .read(UniversalType::Set, Tagging::Universal)
            .cxt(CXT)?
            .children()
            .map(|signer_info| signer_info.cxt(CXT).and_then(SignerInfo::decode))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            version,
            digest_algorithms,
            encap_content_info,
            certificates,
            crls,
            signer_infos,
        })
    }
}

impl EncapsulatedContentInfo {
    /// ContentInfo ::= SEQUENCE {
    ///   contentType ContentType,
    ///   content [0] EXPLICIT OCTET STRING }
    ///
    /// The content is optional in general PKCS#7, but a receipt without it is
    /// useless, so its absence is an error here.
    fn decode(tlv: RawTlv<'_>) -> Result<Self, ReceiptError> {
        const CXT: &str = "EncapsulatedContentInfo::decode";
        let mut fields = tlv.children();
        let e_content_type = read_object_identifier(&mut fields).cxt(CXT)?;
        let e_content = fields
            .read(UniversalType::OctetString, Tagging::Explicit(0))
            .cxt(CXT)?;
        Ok(Self {
            e_content_type,
            e_content: e_content.content.to_vec(),
        })
    }
}

impl SignerInfo {
    /// SignerInfo ::= SEQUENCE {
    ///   version Version,
    ///   sid SignerIdentifier,
    ///   digestAlgorithm DigestAlgorithmIdentifier,
    ///   signedAttrs [0] IMPLICIT SignedAttributes OPTIONAL,
    ///   signatureAlgorithm SignatureAlgorithmIdentifier,
    ///   signature SignatureValue,
    ///   unsignedAttrs [1] IMPLICIT UnsignedAttributes OPTIONAL }
    fn decode(tlv: RawTlv<'_>) -> Result<Self, ReceiptError> {
        const CXT: &str = "SignerInfo::decode";
        let tlv = tlv
            .expect(UniversalType::Sequence, Tagging::Universal)
            .cxt(CXT)?;
        let mut fields = tlv.children();
        let version = read_integer(&mut fields).cxt(CXT)?;
        let sid = SignerIdentifier::decode(&mut fields).cxt(CXT)?;
        let digest_algorithm = fields
            .read_any()
            .and_then(AlgorithmIdentifier::decode)
            .cxt(CXT)?;
        let signed_attrs = read_optional_set(&mut fields, 0, "signedAttrs").cxt(CXT)?;
        let signature_algorithm = fields
            .read_any()
            .and_then(AlgorithmIdentifier::decode)
            .cxt(CXT)?;
        let signature = fields
            .read(UniversalType::OctetString, Tagging::Universal)
            .cxt(CXT)?
            .content
            .to_vec();
        let unsigned_attrs = read_optional_set(&mut fields, 1, "unsignedAttrs").cxt(CXT)?;

        Ok(Self {
            version,
            sid,
            digest_algorithm,
            signed_attrs,
            signature_algorithm,
            signature,
            unsigned_attrs,
        })
    }
}

impl SignerIdentifier {
    /// SignerIdentifier ::= CHOICE {
    ///   issuerAndSerialNumber IssuerAndSerialNumber,
    ///   subjectKeyIdentifier [0] SubjectKeyIdentifier }
    fn decode(fields: &mut TlvReader<'_>) -> Result<Self, DecodeError> {
        if fields.peek_tag()? == Some(Tag::universal(UniversalType::Sequence)) {
            let mut inner = fields
                .read(UniversalType::Sequence, Tagging::Universal)?
                .children();
            let issuer = inner.read(UniversalType::Sequence, Tagging::Universal)?;
            let serial_number = inner.read(UniversalType::Integer, Tagging::Universal)?;
            return Ok(SignerIdentifier::IssuerAndSerialNumber(
                IssuerAndSerialNumber {
                    issuer: issuer.encoded.to_vec(),
                    serial_number: serial_number.content.to_vec(),
                },
            ));
        }
        let key_identifier = fields.read(UniversalType::OctetString, Tagging::Implicit(0))?;
        Ok(SignerIdentifier::SubjectKeyIdentifier(
            key_identifier.content.to_vec(),
        ))
    }
}

impl AlgorithmIdentifier {
    /// AlgorithmIdentifier ::= SEQUENCE {
    ///   algorithm OBJECT IDENTIFIER,
    ///   parameters ANY DEFINED BY algorithm OPTIONAL }
    fn decode(tlv: RawTlv<'_>) -> Result<Self, DecodeError> {
        let tlv = tlv.expect(UniversalType::Sequence, Tagging::Universal)?;
        let mut fields = tlv.children();
        let algorithm = read_object_identifier(&mut fields)?;
        let parameters = if fields.is_empty() {
            None
        } else {
            Some(fields.read_any()?.encoded.to_vec())
        };
        fields.finish()?;
        Ok(Self {
            algorithm,
            parameters,
        })
    }
}

fn read_integer(fields: &mut TlvReader<'_>) -> Result<i64, DecodeError> {
    decode_integer(
        fields
            .read(UniversalType::Integer, Tagging::Universal)?
            .content,
    )
}

fn read_object_identifier(fields: &mut TlvReader<'_>) -> Result<String, DecodeError> {
    decode_object_identifier(
        fields
            .read(UniversalType::ObjectIdentifier, Tagging::Universal)?
            .content,
    )
}

/// Reads an optional `[n] IMPLICIT SET OF ANY`, returning each element's
/// encoding. A missing SET is normal. A SET whose elements cannot be split is
/// dropped with a debug message rather than failing the envelope.
fn read_optional_set(
    fields: &mut TlvReader<'_>,
    tag_number: u32,
    name: &str,
) -> Result<Option<Vec<Vec<u8>>>, DecodeError> {
    let Some(set) = fields.read_optional(UniversalType::Set, Tagging::Implicit(tag_number))? else {
        log::debug!("PKCS#7 {name} not present.");
        return Ok(None);
    };
    match set
        .children()
        .map(|element| element.map(|element| element.encoded.to_vec()))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(elements) => Ok(Some(elements)),
        Err(e) => {
            log::debug!("Ignoring unreadable PKCS#7 {name}: {e}");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::pkcs7_envelope::{DATA_OID, SIGNED_DATA_OID};

    fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
        assert!(content.len() < 0x80);
        let mut out = vec![tag, content.len() as u8];
        out.extend_from_slice(content);
        out
    }

    fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
        parts.concat()
    }

    fn algorithm(oid: &[u8]) -> Vec<u8> {
        tlv(0x30, &concat(&[tlv(0x06, oid), vec![0x05, 0x00]]))
    }

    const SIGNED_DATA: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x02];
    const DATA: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x01];
    const SHA256: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];

    fn envelope(with_certificates: bool, payload: &[u8]) -> Vec<u8> {
        let signer_info = tlv(
            0x30,
            &concat(&[
                tlv(0x02, &[0x01]),
                // subjectKeyIdentifier [0]
                tlv(0x80, &[0xaa, 0xbb]),
                algorithm(SHA256),
                algorithm(SHA256),
                tlv(0x04, &[0x01, 0x02, 0x03]),
            ]),
        );
        let mut signed_data = vec![
            tlv(0x02, &[0x01]),
            tlv(0x31, &algorithm(SHA256)),
            tlv(
                0x30,
                &concat(&[tlv(0x06, DATA), tlv(0xa0, &tlv(0x04, payload))]),
            ),
        ];
        if with_certificates {
            signed_data.push(tlv(0xa0, &tlv(0x30, &[0x02, 0x01, 0x09])));
        }
        signed_data.push(tlv(0x31, &signer_info));
        tlv(
            0x30,
            &concat(&[
                tlv(0x06, SIGNED_DATA),
                tlv(0xa0, &tlv(0x30, &concat(&signed_data))),
            ]),
        )
    }

    #[test]
    fn test_decode_minimal_envelope() {
        let der = envelope(false, &[0x31, 0x00]);
        let envelope = Pkcs7Envelope::from_der(&der).unwrap();
        assert_eq!(envelope.content_type, SIGNED_DATA_OID);
        assert_eq!(envelope.as_der(), der.as_slice());
        assert_eq!(envelope.payload(), &[0x31, 0x00]);

        let signed_data = &envelope.content;
        assert_eq!(signed_data.version, 1);
        assert_eq!(signed_data.digest_algorithms.len(), 1);
        assert_eq!(
            signed_data.digest_algorithms[0].algorithm,
            "2.16.840.1.101.3.4.2.1"
        );
        assert_eq!(
            signed_data.digest_algorithms[0].parameters,
            Some(vec![0x05, 0x00])
        );
        assert_eq!(signed_data.encap_content_info.e_content_type, DATA_OID);
        assert_eq!(signed_data.certificates, None);
        assert_eq!(signed_data.crls, None);

        let signer = &signed_data.signer_infos[0];
        assert_eq!(
            signer.sid,
            SignerIdentifier::SubjectKeyIdentifier(vec![0xaa, 0xbb])
        );
        assert_eq!(signer.signed_attrs, None);
        assert_eq!(signer.signature, vec![0x01, 0x02, 0x03]);
        assert_eq!(signer.unsigned_attrs, None);
    }

    #[test]
    fn test_decode_envelope_with_certificates() {
        let der = envelope(true, &[0x31, 0x00]);
        let envelope = Pkcs7Envelope::from_der(&der).unwrap();
        let certificates = envelope.content.certificates.unwrap();
        assert_eq!(certificates.len(), 1);
        assert_eq!(certificates[0].as_der(), &[0x30, 0x03, 0x02, 0x01, 0x09]);
    }

    #[test]
    fn test_trailing_bytes_after_content_info_are_ignored() {
        let mut der = envelope(false, &[0x31, 0x00]);
        let expected = der.clone();
        der.extend_from_slice(&[0x00, 0x00]);
        let envelope = Pkcs7Envelope::from_der(&der).unwrap();
        assert_eq!(envelope.as_der(), expected.as_slice());
    }

    #[test]
    fn test_wrong_shape_is_structural_error() {
        // ContentInfo whose content is not [0] EXPLICIT.
        let der = tlv(
            0x30,
            &concat(&[tlv(0x06, SIGNED_DATA), tlv(0x30, &[])]),
        );
        match Pkcs7Envelope::from_der(&der) {
            Err(ReceiptError::Structural { context, source }) => {
                assert_eq!(context, "Pkcs7Envelope::from_der");
                assert!(matches!(source, DecodeError::UnexpectedTag { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        assert!(matches!(
            Pkcs7Envelope::from_der(&[0x04, 0x00]),
            Err(ReceiptError::Structural { .. })
        ));
    }
}
