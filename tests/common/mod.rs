#![allow(dead_code)]

use openssl::{
    asn1::Asn1Time,
    bn::BigNum,
    hash::MessageDigest,
    pkcs7::{Pkcs7, Pkcs7Flags},
    pkey::{PKey, Private},
    rsa::Rsa,
    stack::Stack,
    x509::{
        extension::{BasicConstraints, KeyUsage, SubjectKeyIdentifier},
        X509Builder, X509NameBuilder, X509,
    },
};

pub const BUNDLE_ID: &str = "com.example.app";
pub const TRANSACTION_ID: &str = "1000000012345678";
pub const DEVICE_UUID: [u8; 16] = [
    0x3d, 0x1c, 0x6a, 0x2e, 0x90, 0x4b, 0x4f, 0x0a, 0xb2, 0x77, 0x5e, 0x21, 0xc8, 0x0f, 0x93, 0x64,
];
pub const OPAQUE_VALUE: [u8; 16] = [
    0xa1, 0x02, 0xb3, 0x04, 0xc5, 0x06, 0xd7, 0x08, 0xe9, 0x0a, 0xfb, 0x0c, 0x1d, 0x0e, 0x2f, 0x10,
];
pub const CREATION_DATE: &str = "2018-01-19T00:00:00Z";
/// `CREATION_DATE` as a Unix timestamp.
pub const CREATION_TIMESTAMP: i64 = 1_516_320_000;

// ---------------------------------------------------------------------------
// DER writer
// ---------------------------------------------------------------------------

pub fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let length = content.len();
    if length < 0x80 {
        out.push(length as u8);
    } else {
        let octets: Vec<u8> = length
            .to_be_bytes()
            .into_iter()
            .skip_while(|octet| *octet == 0)
            .collect();
        out.push(0x80 | octets.len() as u8);
        out.extend(octets);
    }
    out.extend_from_slice(content);
    out
}

pub fn integer(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    tlv(0x02, &bytes[start..])
}

pub fn utf8(text: &str) -> Vec<u8> {
    tlv(0x0c, text.as_bytes())
}

pub fn ia5(text: &str) -> Vec<u8> {
    tlv(0x16, text.as_bytes())
}

pub fn octet_string(bytes: &[u8]) -> Vec<u8> {
    tlv(0x04, bytes)
}

pub fn sequence(elements: &[Vec<u8>]) -> Vec<u8> {
    tlv(0x30, &elements.concat())
}

pub fn set(elements: &[Vec<u8>]) -> Vec<u8> {
    tlv(0x31, &elements.concat())
}

/// `SEQUENCE { type INTEGER, version INTEGER, value OCTET STRING }`
pub fn attribute(attribute_type: i64, value: &[u8]) -> Vec<u8> {
    sequence(&[integer(attribute_type), integer(1), octet_string(value)])
}

// ---------------------------------------------------------------------------
// Receipt payloads
// ---------------------------------------------------------------------------

pub fn device_binding_hash(device_uuid: &[u8], opaque_value: &[u8], bundle_id: &[u8]) -> [u8; 20] {
    openssl::sha::sha1(&[device_uuid, opaque_value, bundle_id].concat())
}

pub fn in_app_purchase(transaction_id: &str, purchase_date: &str) -> Vec<u8> {
    set(&[
        attribute(1701, &integer(1)),
        attribute(1702, &utf8("com.example.app.coins")),
        attribute(1703, &utf8(transaction_id)),
        attribute(1704, &ia5(purchase_date)),
        attribute(1705, &utf8(transaction_id)),
        attribute(1706, &ia5(purchase_date)),
        attribute(1707, &integer(1)),
        attribute(1711, &integer(0)),
        attribute(1713, &integer(0)),
        attribute(1719, &integer(0)),
    ])
}

/// Attributes of the standard fixture receipt, in encoding order.
pub fn receipt_attributes() -> Vec<Vec<u8>> {
    vec![
        attribute(0, &utf8("ProductionSandbox")),
        attribute(1, &integer(0)),
        attribute(2, &utf8(BUNDLE_ID)),
        attribute(3, &utf8("42")),
        attribute(4, &OPAQUE_VALUE),
        attribute(
            5,
            &device_binding_hash(&DEVICE_UUID, &OPAQUE_VALUE, BUNDLE_ID.as_bytes()),
        ),
        attribute(10, &utf8("unrecognized")),
        attribute(12, &ia5(CREATION_DATE)),
        attribute(17, &in_app_purchase(TRANSACTION_ID, CREATION_DATE)),
        attribute(19, &utf8("1.0")),
        attribute(10, &integer(7)),
    ]
}

pub fn receipt_payload() -> Vec<u8> {
    set(&receipt_attributes())
}

/// ContentInfo around `payload` with no certificates and no signers. Enough
/// for decoding, useless for signature checks.
pub fn unsigned_envelope(payload: &[u8]) -> Vec<u8> {
    const SIGNED_DATA: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x02];
    const DATA: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x01];
    const SHA256: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];
    let signed_data = sequence(&[
        integer(1),
        set(&[sequence(&[tlv(0x06, SHA256), vec![0x05, 0x00]])]),
        sequence(&[tlv(0x06, DATA), tlv(0xa0, &octet_string(payload))]),
        set(&[]),
    ]);
    sequence(&[tlv(0x06, SIGNED_DATA), tlv(0xa0, &signed_data)])
}

// ---------------------------------------------------------------------------
// Signed fixtures
// ---------------------------------------------------------------------------

pub struct Fixture {
    /// Signed ContentInfo, as a device would store it.
    pub receipt: Vec<u8>,
    pub root_der: Vec<u8>,
    pub leaf_der: Vec<u8>,
}

fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

fn certificate(
    common_name: &str,
    serial: u32,
    key: &PKey<Private>,
    issuer: Option<(&X509, &PKey<Private>)>,
) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", common_name).unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    match issuer {
        Some((issuer, _)) => builder.set_issuer_name(issuer.subject_name()).unwrap(),
        None => builder.set_issuer_name(&name).unwrap(),
    }
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    builder.set_pubkey(key).unwrap();

    let signing_key = match issuer {
        Some((_, issuer_key)) => {
            builder
                .append_extension(BasicConstraints::new().build().unwrap())
                .unwrap();
            builder
                .append_extension(KeyUsage::new().critical().digital_signature().build().unwrap())
                .unwrap();
            issuer_key
        }
        None => {
            builder
                .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
                .unwrap();
            builder
                .append_extension(
                    KeyUsage::new()
                        .critical()
                        .key_cert_sign()
                        .crl_sign()
                        .build()
                        .unwrap(),
                )
                .unwrap();
            let subject_key_identifier = SubjectKeyIdentifier::new()
                .build(&builder.x509v3_context(None, None))
                .unwrap();
            builder.append_extension(subject_key_identifier).unwrap();
            key
        }
    };
    builder.sign(signing_key, MessageDigest::sha256()).unwrap();
    builder.build()
}

/// A self-signed CA that has nothing to do with any fixture receipt.
pub fn unrelated_root_der() -> Vec<u8> {
    let key = rsa_key();
    certificate("Unrelated Root", 1, &key, None).to_der().unwrap()
}

/// Signs `payload` with a fresh leaf certificate issued by a fresh root.
pub fn signed_receipt(payload: &[u8]) -> Fixture {
    let root_key = rsa_key();
    let root = certificate("Test Receipt Root", 1, &root_key, None);
    let leaf_key = rsa_key();
    let leaf = certificate("Test Receipt Signer", 2, &leaf_key, Some((&root, &root_key)));

    let pkcs7 = Pkcs7::sign(
        &leaf,
        &leaf_key,
        &Stack::<X509>::new().unwrap(),
        payload,
        Pkcs7Flags::BINARY,
    )
    .unwrap();

    Fixture {
        receipt: pkcs7.to_der().unwrap(),
        root_der: root.to_der().unwrap(),
        leaf_der: leaf.to_der().unwrap(),
    }
}

pub fn fixture() -> Fixture {
    signed_receipt(&receipt_payload())
}
