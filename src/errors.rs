use thiserror::Error;

/// Low-level failure while reading a TLV or converting its content into a
/// typed value.
///
/// On its own this is not fatal: the attribute extractor swallows it for a
/// single field. It only aborts a parse once wrapped into
/// [`ReceiptError::Structural`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Truncated input: needed {needed} bytes, only {available} available.")]
    Truncated { needed: usize, available: usize },

    #[error("Indefinite length encoding is not supported.")]
    IndefiniteLength,

    #[error("Unsupported length encoding ({0} length octets).")]
    UnsupportedLength(usize),

    #[error("Tag number does not fit in 32 bits.")]
    TagNumberOverflow,

    #[error("Unexpected tag: expected {expected}, found {found}.")]
    UnexpectedTag { expected: String, found: String },

    #[error("Invalid INTEGER encoding.")]
    InvalidInteger,

    #[error("INTEGER does not fit in 64 bits ({0} content octets).")]
    IntegerOverflow(usize),

    #[error("Invalid BOOLEAN encoding.")]
    InvalidBoolean,

    #[error("Invalid {0} content.")]
    InvalidString(&'static str),

    #[error("Invalid OBJECT IDENTIFIER encoding.")]
    InvalidObjectIdentifier,

    #[error("Invalid date '{0}', expected yyyy-MM-ddTHH:mm:ssZ.")]
    InvalidDate(String),

    #[error("{0} trailing bytes after value.")]
    TrailingData(usize),
}

/// Error returned to callers of the receipt API.
#[derive(Error, Debug)]
pub enum ReceiptError {
    /// The envelope or attribute SET could not be decoded at all. No partial
    /// receipt is available.
    #[error("Malformed receipt ({context}): {source}")]
    Structural {
        context: &'static str,
        #[source]
        source: DecodeError,
    },

    /// The caller-supplied trust anchor could not be used.
    #[error("Invalid root certificate: {0}")]
    InvalidRootCertificate(String),

    /// OpenSSL refused to load the envelope for verification.
    #[error("Invalid PKCS#7 envelope: {0}")]
    InvalidEnvelope(String),

    /// The envelope was loaded but its signature, digest, or certificate chain
    /// did not validate against the supplied root.
    #[error("Receipt signature is invalid: {0}")]
    SignatureInvalid(String),
}

impl ReceiptError {
    pub(crate) fn structural(context: &'static str, source: DecodeError) -> Self {
        ReceiptError::Structural { context, source }
    }

    /// True for errors caused by the caller's setup (trust anchor, envelope
    /// OpenSSL cannot load) rather than by the receipt failing a check.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ReceiptError::InvalidRootCertificate(_) | ReceiptError::InvalidEnvelope(_)
        )
    }
}

/// Attaches the name of the structure being decoded to a low-level error,
/// turning it into a fatal [`ReceiptError::Structural`].
pub(crate) trait StructuralContext<T> {
    fn cxt(self, context: &'static str) -> Result<T, ReceiptError>;
}

impl<T> StructuralContext<T> for Result<T, DecodeError> {
    fn cxt(self, context: &'static str) -> Result<T, ReceiptError> {
        self.map_err(|source| ReceiptError::structural(context, source))
    }
}
