pub(crate) mod data {
    pub mod asn1 {
        pub mod tlv;
        pub mod value;
    }
    pub(crate) mod datasources {
        pub(crate) mod receipt_payload_datasource;
        pub(crate) mod receipt_signature_datasource;
    }
    pub(crate) mod models {
        pub(crate) mod pkcs7_model;
        pub(crate) mod receipt_attribute_model;
    }
    pub(crate) mod repositories {
        pub(crate) mod receipt_repository_impl;
    }
}

pub mod domain {
    pub mod entities {
        pub mod attribute_value;
        pub mod in_app_purchase;
        pub mod pkcs7_envelope;
        pub mod receipt;
    }
    pub mod repositories {
        pub mod receipt_repository;
    }
}

pub mod config;
pub mod errors;
pub mod util;

pub use data::{
    asn1,
    datasources::{
        receipt_payload_datasource::{ReceiptPayloadDatasource, ReceiptPayloadDatasourceImpl},
        receipt_signature_datasource::{ReceiptSignatureDatasource, ReceiptSignatureDatasourceImpl},
    },
    repositories::receipt_repository_impl::ReceiptRepositoryImpl,
};
