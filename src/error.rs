//! Error types.

use thiserror::Error;

/// Possible errors that may occur during Webauthn operations.
#[derive(Debug, Error)]
pub enum WebauthnError {
    /// The client data type was not the value expected for the ceremony
    /// in progress.
    #[error("client data type does not match the ceremony in progress")]
    InvalidClientDataType,

    /// The client data challenge did not match the challenge this ceremony
    /// was issued with.
    #[error("client data challenge does not match the issued challenge")]
    MismatchedChallenge,

    /// The client data origin did not match the relying party origin.
    #[error("client data origin does not match the relying party origin")]
    InvalidRPOrigin,

    /// The rpIdHash in the authenticator data did not match the hash of the
    /// relying party id.
    #[error("authenticator data rpIdHash does not match the relying party id")]
    InvalidRPIDHash,

    /// The user present bit was not set in the authenticator data flags.
    #[error("user presence was not asserted by the authenticator")]
    UserNotPresent,

    /// User verification was required by policy but the user verified bit
    /// was not set.
    #[error("user verification was required but not asserted")]
    UserNotVerified,

    /// The assertion signature did not verify against the stored credential.
    #[error("the assertion signature is not valid for the stored credential")]
    AuthenticationFailure,

    /// The reported signature counter did not advance past the stored value.
    /// At least two copies of the credential private key may exist.
    #[error("signature counter did not advance, the credential may be cloned")]
    CredentialPossibleCompromise,

    /// The attestation statement format identifier is not registered or not
    /// supported.
    #[error("attestation format is not supported")]
    AttestationNotSupported,

    /// The attestation statement could not be accepted under the configured
    /// attestation policy.
    #[error("attestation was required but could not be verified")]
    AttestationTrustFailure,

    /// The authenticator data did not carry attested credential data.
    #[error("attested credential data missing from authenticator data")]
    MissingAttestationCredentialData,

    /// The attestation statement was not a map, or required fields of the
    /// declared format were missing or ill-typed.
    #[error("attestation statement is malformed for its declared format")]
    AttestationStatementMapInvalid,

    /// The attestation statement alg entry was missing.
    #[error("attestation statement alg missing")]
    AttestationStatementAlgMissing,

    /// The attestation statement alg is not in the set permitted for
    /// registration.
    #[error("attestation statement alg is not permitted for registration")]
    AttestationStatementAlgNotAllowed,

    /// A self attestation alg did not match the credential public key alg.
    #[error("attestation statement alg does not match the credential key")]
    AttestationStatementAlgMismatch,

    /// The attestation statement sig entry was missing or not a byte string.
    #[error("attestation statement sig missing")]
    AttestationStatementSigMissing,

    /// The attestation signature failed cryptographic verification.
    #[error("attestation statement signature is invalid")]
    AttestationStatementSigInvalid,

    /// The attestation statement x5c entry was missing.
    #[error("attestation statement x5c missing")]
    AttestationStatementX5CMissing,

    /// The attestation statement x5c entry was malformed.
    #[error("attestation statement x5c is invalid")]
    AttestationStatementX5CInvalid,

    /// The attestation statement carried an ecdaaKeyId. ECDAA is rejected
    /// outright.
    #[error("ECDAA attestation is not supported")]
    AttestationStatementEcdaaUnsupported,

    /// The attestation certificate did not meet the packed format
    /// certificate requirements (X.509 v3, CA:FALSE, subject contents).
    #[error("attestation certificate requirements not met")]
    AttestationCertificateRequirementsNotMet,

    /// The id-fido-gen-ce-aaguid certificate extension did not match the
    /// aaguid in the authenticator data.
    #[error("attestation certificate aaguid does not match authenticator data")]
    AttestationCertificateAAGUIDMismatch,

    /// The attestation certificate public key was not of the required type
    /// or curve.
    #[error("attestation certificate public key is invalid for this format")]
    CertificatePublicKeyInvalid,

    /// A COSE key map was missing a required label or a value had the wrong
    /// CBOR type.
    #[error("COSE key structure is invalid")]
    COSEKeyInvalidCBORValue,

    /// The COSE key type is not one this library can operate on.
    #[error("COSE key type is invalid or unsupported")]
    COSEKeyInvalidType,

    /// The COSE algorithm identifier is not registered with this library.
    #[error("COSE algorithm is invalid or unsupported")]
    COSEKeyInvalidAlgorithm,

    /// The COSE EC2 curve identifier is not supported.
    #[error("COSE EC2 curve is not supported")]
    COSEKeyECDSAInvalidCurve,

    /// The COSE EC2 x/y coordinates did not match the curve size.
    #[error("COSE EC2 coordinates are invalid for the declared curve")]
    COSEKeyECDSAXYInvalid,

    /// The COSE RSA modulus or exponent was malformed.
    #[error("COSE RSA parameters are invalid")]
    COSEKeyRSANEInvalid,

    /// Signature verification was requested with an algorithm this key can
    /// not perform. Distinct from a signature that failed to verify.
    #[error("signature algorithm is unsupported for this key")]
    COSEKeyUnsupportedAlgorithm,

    /// A CBOR value did not have the type required at this position.
    #[error("CBOR value has an unexpected type")]
    CBORValueIncorrectType,

    /// A binary structure declared more content than the buffer holds.
    #[error("insufficient bytes available for the declared structure")]
    ParseInsufficientBytesAvailable,

    /// A buffer that must start with an ASN.1 SEQUENCE did not.
    #[error("expected an ASN.1 SEQUENCE tag")]
    ParseAsn1SequenceExpected,

    /// An ASN.1 length octet used a reserved or oversized encoding.
    #[error("ASN.1 length encoding is invalid")]
    ParseAsn1LengthInvalid,

    /// Base64 decoding failed.
    #[error("base64 decoding failed: {0}")]
    ParseBase64Failure(#[from] base64::DecodeError),

    /// CBOR decoding failed.
    #[error("CBOR decoding failed: {0}")]
    ParseCBORFailure(#[from] serde_cbor::Error),

    /// JSON decoding failed.
    #[error("JSON decoding failed: {0}")]
    ParseJSONFailure(#[from] serde_json::Error),

    /// The cryptographic provider reported an internal error.
    #[error("openssl error: {0}")]
    OpenSSLError(#[from] openssl::error::ErrorStack),
}
