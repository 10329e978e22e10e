//! fido-verify - Webauthn and U2F ceremony verification for Rust server
//! applications.
//!
//! Webauthn is a standard allowing communication between servers, browsers
//! and authenticators to allow strong, passwordless, cryptographic
//! authentication to be performed. This library implements the server-side
//! verification half of the protocol: it decodes the binary structures an
//! authenticator returns, reconstructs the keys they carry, and runs the
//! registration and authentication ceremony checks over them. The legacy
//! U2F protocol is supported in the [u2f] module for credentials that
//! predate webauthn.
//!
//! This library holds no state. Challenges, credentials and counters are
//! handed in per call and the results handed back for you to persist, so
//! every entry point is safe to call concurrently.
//!
//! To use this library you will want to implement the [WebauthnConfig]
//! trait for your site-specific policy and configuration, and use the
//! [Webauthn] struct for ceremony verification.

#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(unused_extern_crates)]

#[macro_use]
extern crate tracing;

#[macro_use]
mod macros;

pub mod asn1;
pub mod attestation;
mod base64_data;
mod constants;
pub mod crypto;
pub mod ephemeral;
pub mod error;
pub mod proto;
pub mod u2f;

use std::convert::TryFrom;

use crate::attestation::{
    validate_android_key_attestation, validate_android_safetynet_attestation,
    validate_tpm_attestation, verify_fidou2f_attestation, verify_none_attestation,
    verify_packed_attestation, AttestationFormat, AttestationType,
};
use crate::crypto::{compute_sha256, constant_time_eq, COSEAlgorithm, SignatureVerification};
use crate::error::WebauthnError;
use crate::proto::{
    AuthenticatorAssertionResponse, AuthenticatorAttestationResponse, Challenge, Counter,
    Credential, PublicKeyCredential, RegisterPublicKeyCredential, UserVerificationPolicy,
};

pub use crate::base64_data::Base64UrlSafeData;
pub use crate::constants::CHALLENGE_SIZE_BYTES;

/// The core of the Webauthn verification operations:
///
/// * `register_credential` consumes the response of
///   `navigator.credentials.create()` and yields a [Credential] to persist.
/// * `authenticate_credential` consumes the response of
///   `navigator.credentials.get()` for a stored [Credential] and yields the
///   new signature counter to persist.
///
/// Challenge generation and persistence are deliberately not here: issue a
/// [Challenge] however your session layer prefers, keep it associated to
/// the user, and hand it to the matching verification call.
#[derive(Debug)]
pub struct Webauthn<T> {
    config: T,
    rp_id_hash: Vec<u8>,
}

impl<T> Webauthn<T> {
    /// Create a new Webauthn verifier with the supplied configuration. The
    /// relying party id hash is computed once here.
    pub fn new(config: T) -> Self
    where
        T: WebauthnConfig,
    {
        let rp_id_hash = compute_sha256(config.get_relying_party_id().as_bytes());
        Webauthn { config, rp_id_hash }
    }

    /// Process a credential registration response, the output of
    /// `navigator.credentials.create()`. `chal` is the challenge this
    /// ceremony was issued with, and `policy` the user verification level
    /// it was issued under.
    ///
    /// On success this returns the new [Credential] that you must persist
    /// and associate with the user. Checking that the credential id is not
    /// already registered to another user is your concern, as only you can
    /// see your credential store.
    ///
    /// https://w3c.github.io/webauthn/#sctn-registering-a-new-credential
    pub fn register_credential(
        &self,
        reg: &RegisterPublicKeyCredential,
        policy: UserVerificationPolicy,
        chal: &Challenge,
    ) -> Result<Credential, WebauthnError>
    where
        T: WebauthnConfig,
    {
        // Decode clientDataJSON and the attestation object up front. Every
        // field access below is over typed values.
        let data = AuthenticatorAttestationResponse::try_from(&reg.response)?;

        // Verify that the value of C.type is webauthn.create.
        if data.client_data.type_ != "webauthn.create" {
            return Err(WebauthnError::InvalidClientDataType);
        }

        // Verify that the value of C.challenge matches the challenge that
        // was sent to the authenticator in the create() call.
        if !constant_time_eq(data.client_data.challenge.as_ref(), chal.as_ref()) {
            return Err(WebauthnError::MismatchedChallenge);
        }

        // Verify that the value of C.origin matches the Relying Party's origin.
        if data.client_data.origin != self.config.get_origin() {
            return Err(WebauthnError::InvalidRPOrigin);
        }

        // Token binding state, when present, rides through on the client
        // data untouched; whether the TLS terminator used it is not visible
        // from here.

        // Compute the hash of response.clientDataJSON using SHA-256.
        let client_data_hash = compute_sha256(&data.client_data_bytes);

        let auth_data = &data.attestation_object.auth_data;

        // Verify that the rpIdHash in authData is the SHA-256 hash of the
        // RP ID expected by the Relying Party. Note the RP ID is not the RP
        // name, it is derived from the origin's effective domain.
        if auth_data.rp_id_hash != self.rp_id_hash {
            return Err(WebauthnError::InvalidRPIDHash);
        }

        // Verify that the User Present bit of the flags in authData is set.
        if !auth_data.user_present() {
            return Err(WebauthnError::UserNotPresent);
        }

        // If user verification is required for this registration, verify
        // that the User Verified bit of the flags in authData is set.
        if let UserVerificationPolicy::Required = policy {
            if !auth_data.user_verified() {
                return Err(WebauthnError::UserNotVerified);
            }
        }

        // Determine the attestation statement format by performing a
        // USASCII case-sensitive match on fmt against the registered set.
        let attest_format = AttestationFormat::try_from(data.attestation_object.fmt.as_str())?;

        let acd = auth_data
            .acd
            .as_ref()
            .ok_or(WebauthnError::MissingAttestationCredentialData)?;

        debug!(?attest_format, "verifying attestation");

        // Verify that attStmt is a correct attestation statement, conveying
        // a valid attestation signature, by using the format's verification
        // procedure.
        let attest_result = match attest_format {
            AttestationFormat::Packed => verify_packed_attestation(
                &data.attestation_object.att_stmt,
                acd,
                &data.attestation_object.auth_data_bytes,
                &client_data_hash,
                auth_data.counter,
                &self.config.get_credential_algorithms(),
            ),
            AttestationFormat::FIDOU2F => verify_fidou2f_attestation(
                &data.attestation_object.att_stmt,
                acd,
                &client_data_hash,
                &auth_data.rp_id_hash,
                auth_data.counter,
            ),
            AttestationFormat::AndroidKey => validate_android_key_attestation(
                &data.attestation_object.att_stmt,
                acd,
                auth_data.counter,
            ),
            AttestationFormat::AndroidSafetyNet => validate_android_safetynet_attestation(
                &data.attestation_object.att_stmt,
                acd,
                auth_data.counter,
            ),
            AttestationFormat::Tpm => {
                validate_tpm_attestation(&data.attestation_object.att_stmt, acd, auth_data.counter)
            }
            AttestationFormat::None => {
                verify_none_attestation(&data.attestation_object.att_stmt, acd, auth_data.counter)
            }
        }?;

        // Assess the attestation trustworthiness. Formats whose signatures
        // were actually verified pass; anything weaker is only acceptable
        // when the policy does not demand attestation.
        let credential = match attest_result {
            AttestationType::Basic(credential, _ca) => credential,
            AttestationType::Self_(credential) => credential,
            AttestationType::None(credential) | AttestationType::Uncertain(credential) => {
                if self.config.get_attestation_required() {
                    return Err(WebauthnError::AttestationTrustFailure);
                }
                credential
            }
        };

        Ok(credential)
    }

    /// Process an authentication assertion, the output of
    /// `navigator.credentials.get()`, against the stored [Credential] the
    /// response's id refers to. Looking the credential up from the
    /// response's `raw_id` is your concern.
    ///
    /// On success, returns the authenticator's new signature counter. You
    /// must persist it on the credential: it is the input to the cloned
    /// credential check on the next authentication.
    ///
    /// https://w3c.github.io/webauthn/#sctn-verifying-assertion
    pub fn authenticate_credential(
        &self,
        rsp: &PublicKeyCredential,
        policy: UserVerificationPolicy,
        chal: &Challenge,
        cred: &Credential,
    ) -> Result<Counter, WebauthnError>
    where
        T: WebauthnConfig,
    {
        let data = AuthenticatorAssertionResponse::try_from(&rsp.response)?;
        let c = &data.client_data;

        // Verify that the value of C.type is the string webauthn.get.
        if c.type_ != "webauthn.get" {
            return Err(WebauthnError::InvalidClientDataType);
        }

        // Verify that the value of C.challenge matches the challenge that
        // was sent to the authenticator in the get() call.
        if !constant_time_eq(c.challenge.as_ref(), chal.as_ref()) {
            return Err(WebauthnError::MismatchedChallenge);
        }

        // Verify that the value of C.origin matches the Relying Party's origin.
        if c.origin != self.config.get_origin() {
            return Err(WebauthnError::InvalidRPOrigin);
        }

        // Verify that the rpIdHash in authData is the SHA-256 hash of the
        // RP ID expected by the Relying Party.
        if data.authenticator_data.rp_id_hash != self.rp_id_hash {
            return Err(WebauthnError::InvalidRPIDHash);
        }

        // Verify that the User Present bit of the flags in authData is set.
        if !data.authenticator_data.user_present() {
            return Err(WebauthnError::UserNotPresent);
        }

        // If user verification is required for this assertion, verify that
        // the User Verified bit of the flags in authData is set.
        if let UserVerificationPolicy::Required = policy {
            if !data.authenticator_data.user_verified() {
                return Err(WebauthnError::UserNotVerified);
            }
        }

        // Let hash be the result of computing a hash over the cData using
        // SHA-256, then verify that sig is a valid signature over the
        // binary concatenation of authData and hash using the credential
        // public key. This step is compatible with signatures generated by
        // FIDO U2F authenticators.
        let client_data_hash = compute_sha256(&data.client_data_bytes);

        let verification_data: Vec<u8> = data
            .authenticator_data_bytes
            .iter()
            .chain(client_data_hash.iter())
            .copied()
            .collect();

        match cred
            .cred
            .verify_signature(&data.signature, &verification_data)
        {
            SignatureVerification::Valid => {}
            SignatureVerification::Invalid => {
                return Err(WebauthnError::AuthenticationFailure);
            }
            SignatureVerification::UnsupportedAlgorithm => {
                return Err(WebauthnError::COSEKeyUnsupportedAlgorithm);
            }
            SignatureVerification::MalformedKey => {
                return Err(WebauthnError::COSEKeyInvalidType);
            }
        }

        // If either counter is nonzero, the new value must strictly
        // advance. A counter that fails to advance means at least two
        // copies of the credential private key are in use. Authenticators
        // that never implement the counter report zero on both sides and
        // are exempt.
        let counter = data.authenticator_data.counter;
        if (counter != 0 || cred.counter != 0) && counter <= cred.counter {
            warn!(
                counter,
                stored = cred.counter,
                "signature counter did not advance"
            );
            return Err(WebauthnError::CredentialPossibleCompromise);
        }

        Ok(counter)
    }
}

/// The WebauthnConfig type allows site-specific customisation of the
/// verification process. Implement it on your site configuration type.
pub trait WebauthnConfig {
    /// Returns your site's origin: the scheme, host and port your users'
    /// browsers see. In production this must be an https:// url, though
    /// http://localhost is workable for testing. Changing this invalidates
    /// client data from in-flight ceremonies.
    ///
    /// Examples: `https://my-site.com.au`, `https://my-site.com.au:8443`
    fn get_origin(&self) -> &str;

    /// Returns the relying party id: the effective domain credentials are
    /// scoped to, with no scheme, port or path. If this ever changes, all
    /// credentials scoped to the old value are lost in all authenticators.
    ///
    /// Example: for the site `https://my-site.com.au/auth`, `my-site.com.au`
    fn get_relying_party_id(&self) -> &str;

    /// The set of credential algorithms this service will accept at
    /// registration. Unless you have specific requirements, leave this as
    /// the default.
    fn get_credential_algorithms(&self) -> Vec<COSEAlgorithm> {
        vec![COSEAlgorithm::ES256, COSEAlgorithm::RS256]
    }

    /// Whether registration requires a cryptographically verified
    /// attestation statement. When true, credentials presenting no
    /// attestation, or a format this library only validates structurally
    /// (android-key, android-safetynet, tpm), are rejected.
    ///
    /// Defaults to false, which accepts those credentials while still
    /// verifying any packed or fido-u2f statement that is present.
    fn get_attestation_required(&self) -> bool {
        false
    }
}
