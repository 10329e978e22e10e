//! Attestation information and verification procedures.
//! This contains a transparent type allowing callbacks to
//! make attestation decisions. See the WebauthnConfig trait
//! for more details.

use std::convert::TryFrom;

use crate::crypto::{COSEAlgorithm, COSEKey, X509PublicKey};
use crate::error::WebauthnError;
use crate::proto::{AttestedCredentialData, Counter, Credential};

/// The registered attestation statement formats.
/// https://www.iana.org/assignments/webauthn/webauthn.xhtml
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttestationFormat {
    Packed,
    Tpm,
    AndroidKey,
    AndroidSafetyNet,
    FIDOU2F,
    None,
}

impl TryFrom<&str> for AttestationFormat {
    type Error = WebauthnError;

    fn try_from(a: &str) -> Result<AttestationFormat, Self::Error> {
        match a {
            "packed" => Ok(AttestationFormat::Packed),
            "tpm" => Ok(AttestationFormat::Tpm),
            "android-key" => Ok(AttestationFormat::AndroidKey),
            "android-safetynet" => Ok(AttestationFormat::AndroidSafetyNet),
            "fido-u2f" => Ok(AttestationFormat::FIDOU2F),
            "none" => Ok(AttestationFormat::None),
            _ => Err(WebauthnError::AttestationNotSupported),
        }
    }
}

/// The type of attestation that the authenticator provided, along with the
/// credential it attests to. Trust decisions over these values belong to
/// the caller's policy, with one exception: [Webauthn](crate::Webauthn)
/// rejects `None` and `Uncertain` outright when attestation is required.
#[derive(Debug)]
pub enum AttestationType {
    /// The credential is vouched for by a signing certificate from a vendor
    /// or provider.
    Basic(Credential, X509PublicKey),
    /// The credential is signed by its own private key; it proves
    /// possession, not provenance.
    Self_(Credential),
    /// No attestation was provided with this credential.
    None(Credential),
    /// An attestation statement was present and structurally sound, but its
    /// cryptographic verification procedure is not implemented here. If in
    /// doubt, reject this type.
    Uncertain(Credential),
}

// Perform the verification procedure for 8.2. Packed Attestation Statement Format
// https://w3c.github.io/webauthn/#sctn-packed-attestation
pub(crate) fn verify_packed_attestation(
    att_stmt: &serde_cbor::Value,
    acd: &AttestedCredentialData,
    auth_data_bytes: &[u8],
    client_data_hash: &[u8],
    counter: Counter,
    allowed_algs: &[COSEAlgorithm],
) -> Result<AttestationType, WebauthnError> {
    let att_stmt_map =
        cbor_try_map!(att_stmt).map_err(|_| WebauthnError::AttestationStatementMapInvalid)?;

    let alg_value = att_stmt_map
        .get(&serde_cbor::Value::Text("alg".to_string()))
        .ok_or(WebauthnError::AttestationStatementAlgMissing)?;
    let alg = cbor_try_i128!(alg_value)
        .map_err(|_| WebauthnError::AttestationStatementAlgMissing)
        .and_then(COSEAlgorithm::try_from)?;

    // The declared alg must be one the relying party offered in
    // pubKeyCredParams during the create() call.
    if !allowed_algs.contains(&alg) {
        return Err(WebauthnError::AttestationStatementAlgNotAllowed);
    }

    let sig = att_stmt_map
        .get(&serde_cbor::Value::Text("sig".to_string()))
        .ok_or(WebauthnError::AttestationStatementSigMissing)
        .and_then(|s| {
            cbor_try_bytes!(s).map_err(|_| WebauthnError::AttestationStatementSigMissing)
        })?;

    let verification_data: Vec<u8> = auth_data_bytes
        .iter()
        .chain(client_data_hash.iter())
        .copied()
        .collect();

    let x5c = att_stmt_map.get(&serde_cbor::Value::Text("x5c".to_string()));
    let ecdaa_key_id = att_stmt_map.get(&serde_cbor::Value::Text("ecdaaKeyId".to_string()));

    match (x5c, ecdaa_key_id) {
        (Some(x5c), _) => {
            // x5c present means a full attestation: the first element is the
            // attestation certificate, any further elements its chain.
            let att_cert_array = cbor_try_array!(x5c)
                .map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?;
            let att_cert_bytes = att_cert_array
                .first()
                .ok_or(WebauthnError::AttestationStatementX5CInvalid)
                .and_then(|v| {
                    cbor_try_bytes!(v).map_err(|_| WebauthnError::AttestationStatementX5CInvalid)
                })?;

            let attestn_cert = X509PublicKey::try_from(att_cert_bytes.as_slice())?;

            // Verify that sig is a valid signature over the concatenation of
            // authenticatorData and clientDataHash using the attestation
            // public key in attestnCert with the algorithm specified in alg.
            let verified = attestn_cert.verify_signature(alg, sig, &verification_data)?;
            if !verified {
                trace!("packed x5c attestation signature invalid");
                return Err(WebauthnError::AttestationStatementSigInvalid);
            }

            attestn_cert.assert_packed_attest_req()?;

            // If attestnCert contains an extension with OID
            // 1.3.6.1.4.1.45724.1.1.4 (id-fido-gen-ce-aaguid) verify that the
            // value of this extension matches the aaguid in authenticatorData.
            if let Some(cert_aaguid) = attestn_cert.get_fido_gen_ce_aaguid() {
                if cert_aaguid != acd.aaguid {
                    return Err(WebauthnError::AttestationCertificateAAGUIDMismatch);
                }
            }

            let credential_public_key = COSEKey::try_from(&acd.credential_pk)?;
            let credential = Credential::new(acd, credential_public_key, counter);

            Ok(AttestationType::Basic(credential, attestn_cert))
        }
        (None, Some(_)) => {
            // ECDAA never saw meaningful deployment and its anonymity
            // properties were later shown broken. Reject it.
            Err(WebauthnError::AttestationStatementEcdaaUnsupported)
        }
        (None, None) => {
            // Neither x5c nor ecdaaKeyId: self attestation.
            let credential_public_key = COSEKey::try_from(&acd.credential_pk)?;

            // Validate that alg matches the algorithm of the
            // credentialPublicKey in authenticatorData.
            if alg != credential_public_key.type_ {
                return Err(WebauthnError::AttestationStatementAlgMismatch);
            }

            // Verify that sig is a valid signature over the concatenation of
            // authenticatorData and clientDataHash using the credential
            // public key with alg.
            if !credential_public_key
                .verify_signature(sig, &verification_data)
                .is_valid()
            {
                trace!("packed self attestation signature invalid");
                return Err(WebauthnError::AttestationStatementSigInvalid);
            }

            let credential = Credential::new(acd, credential_public_key, counter);
            Ok(AttestationType::Self_(credential))
        }
    }
}

// https://w3c.github.io/webauthn/#fido-u2f-attestation
pub(crate) fn verify_fidou2f_attestation(
    att_stmt: &serde_cbor::Value,
    acd: &AttestedCredentialData,
    client_data_hash: &[u8],
    rp_id_hash: &[u8],
    counter: Counter,
) -> Result<AttestationType, WebauthnError> {
    let att_stmt_map =
        cbor_try_map!(att_stmt).map_err(|_| WebauthnError::AttestationStatementMapInvalid)?;

    let sig = att_stmt_map
        .get(&serde_cbor::Value::Text("sig".to_string()))
        .ok_or(WebauthnError::AttestationStatementSigMissing)
        .and_then(|s| {
            cbor_try_bytes!(s).map_err(|_| WebauthnError::AttestationStatementSigMissing)
        })?;

    // Check that x5c has exactly one element and let att_cert be that element.
    let x5c = att_stmt_map
        .get(&serde_cbor::Value::Text("x5c".to_string()))
        .ok_or(WebauthnError::AttestationStatementX5CMissing)?;
    let att_cert_array =
        cbor_try_array!(x5c).map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?;
    if att_cert_array.len() != 1 {
        return Err(WebauthnError::AttestationStatementX5CInvalid);
    }
    let att_cert = att_cert_array
        .first()
        .and_then(|v| match v {
            serde_cbor::Value::Bytes(b) => Some(b),
            _ => None,
        })
        .ok_or(WebauthnError::AttestationStatementX5CInvalid)?;

    let certificate_public_key = X509PublicKey::try_from(att_cert.as_slice())?;

    // If certificate public key is not an Elliptic Curve (EC) public key
    // over the P-256 curve, terminate this algorithm and return an
    // appropriate error.
    if !(certificate_public_key.is_secp256r1()?) {
        return Err(WebauthnError::CertificatePublicKeyInvalid);
    }

    // Convert the COSE_KEY formatted credentialPublicKey to Raw ANSI X9.62
    // public key format (ALG_KEY_ECC_X962_RAW).
    let credential_public_key = COSEKey::try_from(&acd.credential_pk)?;
    let public_key_u2f = credential_public_key.get_alg_key_ecc_x962_raw()?;

    // Let verificationData be the concatenation of
    // (0x00 || rpIdHash || clientDataHash || credentialId || publicKeyU2F).
    let r: [u8; 1] = [0x00];
    let verification_data: Vec<u8> = r
        .iter()
        .chain(rp_id_hash.iter())
        .chain(client_data_hash.iter())
        .chain(acd.credential_id.iter())
        .chain(public_key_u2f.iter())
        .copied()
        .collect();

    let verified =
        certificate_public_key.verify_signature(COSEAlgorithm::ES256, sig, &verification_data)?;
    if !verified {
        trace!("fido-u2f attestation signature invalid");
        return Err(WebauthnError::AttestationStatementSigInvalid);
    }

    let credential = Credential::new(acd, credential_public_key, counter);

    Ok(AttestationType::Basic(credential, certificate_public_key))
}

// https://w3c.github.io/webauthn/#sctn-none-attestation
pub(crate) fn verify_none_attestation(
    att_stmt: &serde_cbor::Value,
    acd: &AttestedCredentialData,
    counter: Counter,
) -> Result<AttestationType, WebauthnError> {
    // The none statement is an empty map, nothing else.
    let att_stmt_map =
        cbor_try_map!(att_stmt).map_err(|_| WebauthnError::AttestationStatementMapInvalid)?;
    if !att_stmt_map.is_empty() {
        return Err(WebauthnError::AttestationStatementMapInvalid);
    }

    let credential_public_key = COSEKey::try_from(&acd.credential_pk)?;
    let credential = Credential::new(acd, credential_public_key, counter);
    Ok(AttestationType::None(credential))
}

// The android-key, android-safetynet and tpm formats are checked for
// structure only: required fields present and of the right type. Their
// cryptographic verification procedures are not implemented, so the result
// is always Uncertain and the registration policy decides whether that is
// acceptable.

pub(crate) fn validate_android_key_attestation(
    att_stmt: &serde_cbor::Value,
    acd: &AttestedCredentialData,
    counter: Counter,
) -> Result<AttestationType, WebauthnError> {
    let att_stmt_map =
        cbor_try_map!(att_stmt).map_err(|_| WebauthnError::AttestationStatementMapInvalid)?;

    let alg_value = att_stmt_map
        .get(&serde_cbor::Value::Text("alg".to_string()))
        .ok_or(WebauthnError::AttestationStatementAlgMissing)?;
    cbor_try_i128!(alg_value)
        .map_err(|_| WebauthnError::AttestationStatementAlgMissing)
        .and_then(COSEAlgorithm::try_from)?;

    att_stmt_map
        .get(&serde_cbor::Value::Text("sig".to_string()))
        .ok_or(WebauthnError::AttestationStatementSigMissing)
        .and_then(|s| {
            cbor_try_bytes!(s).map_err(|_| WebauthnError::AttestationStatementSigMissing)
        })?;

    let x5c = att_stmt_map
        .get(&serde_cbor::Value::Text("x5c".to_string()))
        .ok_or(WebauthnError::AttestationStatementX5CMissing)?;
    let att_cert_array =
        cbor_try_array!(x5c).map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?;
    if att_cert_array.is_empty() {
        return Err(WebauthnError::AttestationStatementX5CInvalid);
    }

    debug!("android-key attestation accepted structurally, not verified");

    let credential_public_key = COSEKey::try_from(&acd.credential_pk)?;
    let credential = Credential::new(acd, credential_public_key, counter);
    Ok(AttestationType::Uncertain(credential))
}

pub(crate) fn validate_android_safetynet_attestation(
    att_stmt: &serde_cbor::Value,
    acd: &AttestedCredentialData,
    counter: Counter,
) -> Result<AttestationType, WebauthnError> {
    let att_stmt_map =
        cbor_try_map!(att_stmt).map_err(|_| WebauthnError::AttestationStatementMapInvalid)?;

    let ver = att_stmt_map
        .get(&serde_cbor::Value::Text("ver".to_string()))
        .ok_or(WebauthnError::AttestationStatementMapInvalid)?;
    cbor_try_string!(ver).map_err(|_| WebauthnError::AttestationStatementMapInvalid)?;

    let response = att_stmt_map
        .get(&serde_cbor::Value::Text("response".to_string()))
        .ok_or(WebauthnError::AttestationStatementMapInvalid)?;
    cbor_try_bytes!(response).map_err(|_| WebauthnError::AttestationStatementMapInvalid)?;

    debug!("android-safetynet attestation accepted structurally, not verified");

    let credential_public_key = COSEKey::try_from(&acd.credential_pk)?;
    let credential = Credential::new(acd, credential_public_key, counter);
    Ok(AttestationType::Uncertain(credential))
}

pub(crate) fn validate_tpm_attestation(
    att_stmt: &serde_cbor::Value,
    acd: &AttestedCredentialData,
    counter: Counter,
) -> Result<AttestationType, WebauthnError> {
    let att_stmt_map =
        cbor_try_map!(att_stmt).map_err(|_| WebauthnError::AttestationStatementMapInvalid)?;

    let ver = att_stmt_map
        .get(&serde_cbor::Value::Text("ver".to_string()))
        .ok_or(WebauthnError::AttestationStatementMapInvalid)?;
    let ver = cbor_try_string!(ver).map_err(|_| WebauthnError::AttestationStatementMapInvalid)?;
    if ver != "2.0" {
        return Err(WebauthnError::AttestationStatementMapInvalid);
    }

    let alg_value = att_stmt_map
        .get(&serde_cbor::Value::Text("alg".to_string()))
        .ok_or(WebauthnError::AttestationStatementAlgMissing)?;
    cbor_try_i128!(alg_value)
        .map_err(|_| WebauthnError::AttestationStatementAlgMissing)
        .and_then(COSEAlgorithm::try_from)?;

    for field in ["sig", "certInfo", "pubArea"] {
        let value = att_stmt_map
            .get(&serde_cbor::Value::Text(field.to_string()))
            .ok_or(WebauthnError::AttestationStatementMapInvalid)?;
        cbor_try_bytes!(value).map_err(|_| WebauthnError::AttestationStatementMapInvalid)?;
    }

    debug!("tpm attestation accepted structurally, not verified");

    let credential_public_key = COSEKey::try_from(&acd.credential_pk)?;
    let credential = Credential::new(acd, credential_public_key, counter);
    Ok(AttestationType::Uncertain(credential))
}
