/// Object identifier of PKCS#7 `signedData`.
pub const SIGNED_DATA_OID: &str = "1.2.840.113549.1.7.2";
/// Object identifier of PKCS#7 `data`, the content type of receipt payloads.
pub const DATA_OID: &str = "1.2.840.113549.1.7.1";

/// PKCS#7 `ContentInfo` wrapping the receipt.
///
/// https://datatracker.ietf.org/doc/html/rfc2315#section-7
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pkcs7Envelope {
    /// Normally [`SIGNED_DATA_OID`].
    pub content_type: String,
    pub content: SignedData,
    pub(crate) der: Vec<u8>,
}

impl Pkcs7Envelope {
    /// The exact `ContentInfo` encoding the envelope was decoded from. This is
    /// what signature verification runs over.
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// The encapsulated receipt payload (an ASN.1 SET of attributes).
    pub fn payload(&self) -> &[u8] {
        &self.content.encap_content_info.e_content
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedData {
    pub version: i64,
    pub digest_algorithms: Vec<AlgorithmIdentifier>,
    pub encap_content_info: EncapsulatedContentInfo,
    /// `[0] IMPLICIT`, absent in envelopes that carry no certificates.
    pub certificates: Option<Vec<Certificate>>,
    /// `[1] IMPLICIT`, raw encoded revocation lists.
    pub crls: Option<Vec<Vec<u8>>>,
    pub signer_infos: Vec<SignerInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmIdentifier {
    pub algorithm: String,
    /// Encoded parameters TLV, if any (often NULL).
    pub parameters: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncapsulatedContentInfo {
    pub e_content_type: String,
    pub e_content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerInfo {
    pub version: i64,
    pub sid: SignerIdentifier,
    pub digest_algorithm: AlgorithmIdentifier,
    /// Raw encoded attributes of the `[0] IMPLICIT` signed attribute SET.
    pub signed_attrs: Option<Vec<Vec<u8>>>,
    pub signature_algorithm: AlgorithmIdentifier,
    pub signature: Vec<u8>,
    /// Raw encoded attributes of the `[1] IMPLICIT` unsigned attribute SET.
    pub unsigned_attrs: Option<Vec<Vec<u8>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerIdentifier {
    IssuerAndSerialNumber(IssuerAndSerialNumber),
    SubjectKeyIdentifier(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerAndSerialNumber {
    /// Encoded X.501 `Name` of the issuer.
    pub issuer: Vec<u8>,
    /// Content octets of the serial number INTEGER.
    pub serial_number: Vec<u8>,
}

/// A certificate carried in the envelope, kept as opaque DER.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Box<[u8]>,
}

impl Certificate {
    pub fn from_der(der: Vec<u8>) -> Self {
        Self {
            der: der.into_boxed_slice(),
        }
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Certificate(len={})", self.der.len())
    }
}
