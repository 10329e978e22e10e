//! Protocol structures for communication with authenticators and clients,
//! and the decoders that take them from wire bytes to typed values. Every
//! decoder here is total over malformed input: truncation and type
//! confusion surface as errors, never panics, because all of these bytes
//! arrive from the other side of a browser.

use std::convert::TryFrom;

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use crate::base64_data::Base64UrlSafeData;
use crate::constants::{
    FLAG_ATTESTED_CRED_DATA, FLAG_EXTENSION_DATA, FLAG_USER_PRESENT, FLAG_USER_VERIFIED,
};
use crate::crypto::COSEKey;
use crate::error::WebauthnError;

/// A credential ID as an opaque byte sequence.
pub type CredentialID = Vec<u8>;

/// A signature counter value reported by an authenticator.
pub type Counter = u32;

/// An authenticator model identifier.
pub type Aaguid = [u8; 16];

pub(crate) type CBORExtensions = serde_cbor::Value;

/// A challenge issued to a client for a single ceremony. Generation and
/// persistence of challenges belong to the caller; verification only ever
/// compares one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge(pub Vec<u8>);

impl AsRef<[u8]> for Challenge {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Challenge {
    fn from(v: Vec<u8>) -> Challenge {
        Challenge(v)
    }
}

/// The requirement level for user verification in a ceremony.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationPolicy {
    /// The UV bit must be asserted by the authenticator.
    Required,
    /// UV is used when available, but not enforced.
    Preferred,
    /// UV is not requested.
    Discouraged,
}

/// A registered credential, the output of a successful registration
/// ceremony. You must persist this and supply it to future authentication
/// ceremonies; this library stores nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// The id of this credential.
    pub cred_id: CredentialID,
    /// The public key of this credential.
    pub cred: COSEKey,
    /// The last seen signature counter. Update this after every successful
    /// authentication.
    pub counter: Counter,
}

impl Credential {
    pub(crate) fn new(acd: &AttestedCredentialData, cose: COSEKey, counter: Counter) -> Self {
        Credential {
            cred_id: acd.credential_id.clone(),
            cred: cose,
            counter,
        }
    }
}

/// The status of token binding on the TLS connection the client data was
/// collected over. Carried through untouched; enforcement is a transport
/// concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBinding {
    /// "present" or "supported".
    pub status: String,
    /// The token binding id when status is "present".
    pub id: Option<String>,
}

/// The client data collected by the browser during a ceremony.
/// https://w3c.github.io/webauthn/#dictionary-client-data
#[derive(Debug, Clone, Deserialize)]
pub struct CollectedClientData {
    /// The ceremony that produced this data, "webauthn.create" or
    /// "webauthn.get".
    #[serde(rename = "type")]
    pub type_: String,
    /// The challenge the client signed over, decoded from its transport
    /// encoding.
    pub challenge: Base64UrlSafeData,
    /// The origin the browser asserted it was talking to.
    pub origin: String,
    /// Token binding state, if the client reported any.
    #[serde(rename = "tokenBinding")]
    pub token_binding: Option<TokenBinding>,
    /// Whether the request came from a cross-origin iframe.
    #[serde(rename = "crossOrigin")]
    pub cross_origin: Option<bool>,
}

/// The credential data an authenticator attests to at registration.
#[derive(Debug, Clone)]
pub struct AttestedCredentialData {
    /// The authenticator model id.
    pub aaguid: Aaguid,
    /// The id of the new credential.
    pub credential_id: CredentialID,
    /// The credential public key, as the raw COSE map it arrived as.
    pub credential_pk: serde_cbor::Value,
}

impl AttestedCredentialData {
    /// Best effort conversion of the embedded credential key to a DER
    /// SubjectPublicKeyInfo. A key this library can not represent yields
    /// `None` rather than an error so that the aaguid and credential id
    /// remain available for lookup.
    pub fn credential_public_key_der(&self) -> Option<Vec<u8>> {
        COSEKey::try_from(&self.credential_pk)
            .ok()
            .and_then(|k| k.to_der(true).ok())
    }
}

/// The authenticator data structure, as signed or returned by an
/// authenticator.
/// https://w3c.github.io/webauthn/#sctn-authenticator-data
#[derive(Debug, Clone)]
pub struct AuthenticatorData {
    /// SHA-256 of the relying party id this data is scoped to.
    pub rp_id_hash: Vec<u8>,
    /// The raw flags byte.
    pub flags: u8,
    /// The signature counter.
    pub counter: Counter,
    /// Attested credential data, present at registration.
    pub acd: Option<AttestedCredentialData>,
    /// Authenticator extension outputs, exposed as an opaque decoded value.
    pub extensions: Option<CBORExtensions>,
}

impl AuthenticatorData {
    /// The UP bit: a person interacted with the authenticator.
    pub fn user_present(&self) -> bool {
        self.flags & FLAG_USER_PRESENT != 0
    }

    /// The UV bit: the authenticator verified the user itself.
    pub fn user_verified(&self) -> bool {
        self.flags & FLAG_USER_VERIFIED != 0
    }

    /// The AT bit as reported by the authenticator.
    pub fn attested_data_flag(&self) -> bool {
        self.flags & FLAG_ATTESTED_CRED_DATA != 0
    }

    /// The ED bit as reported by the authenticator.
    pub fn extension_data_flag(&self) -> bool {
        self.flags & FLAG_EXTENSION_DATA != 0
    }
}

impl TryFrom<&[u8]> for AuthenticatorData {
    type Error = WebauthnError;

    fn try_from(data: &[u8]) -> Result<AuthenticatorData, Self::Error> {
        // rpIdHash (32) || flags (1) || signCount (4). An assertion from an
        // authenticator with nothing attested and no extensions is exactly
        // this header and must decode cleanly.
        if data.len() < 37 {
            return Err(WebauthnError::ParseInsufficientBytesAvailable);
        }

        let rp_id_hash = data[0..32].to_vec();
        let flags = data[32];
        let counter = BigEndian::read_u32(&data[33..37]);

        let (acd, extensions) = if data.len() > 37 {
            let variable = &data[37..];

            // aaguid (16) || credentialIdLength (2) || credentialId (..)
            if variable.len() < 18 {
                return Err(WebauthnError::ParseInsufficientBytesAvailable);
            }
            let mut aaguid: Aaguid = [0; 16];
            aaguid.copy_from_slice(&variable[0..16]);

            let cred_id_len = BigEndian::read_u16(&variable[16..18]) as usize;
            let cred_id_end = 18 + cred_id_len;
            if variable.len() < cred_id_end {
                return Err(WebauthnError::ParseInsufficientBytesAvailable);
            }
            let credential_id = variable[18..cred_id_end].to_vec();

            // One CBOR value for the credential key. The deserializer tells
            // us how many bytes it consumed, so whatever follows can be
            // split off without re-encoding the key.
            let mut deserializer = serde_cbor::Deserializer::from_slice(&variable[cred_id_end..]);
            let credential_pk: serde_cbor::Value =
                serde::de::Deserialize::deserialize(&mut deserializer)?;
            let consumed = deserializer.byte_offset();

            let remaining = &variable[cred_id_end + consumed..];
            let extensions = if remaining.is_empty() {
                None
            } else {
                Some(serde_cbor::from_slice(remaining)?)
            };

            (
                Some(AttestedCredentialData {
                    aaguid,
                    credential_id,
                    credential_pk,
                }),
                extensions,
            )
        } else {
            (None, None)
        };

        Ok(AuthenticatorData {
            rp_id_hash,
            flags,
            counter,
            acd,
            extensions,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttestationObjectInner<'a> {
    #[serde(rename = "authData")]
    pub auth_data: &'a [u8],
    pub fmt: String,
    #[serde(rename = "attStmt")]
    pub att_stmt: serde_cbor::Value,
}

/// The attestation object returned at registration: a format tag, a
/// format-specific statement, and the authenticator data it covers.
/// https://w3c.github.io/webauthn/#sctn-attestation
#[derive(Debug)]
pub struct AttestationObject {
    /// The decoded authenticator data.
    pub auth_data: AuthenticatorData,
    /// The authenticator data exactly as signed. Signature checks must run
    /// over these bytes, not a re-encoding.
    pub auth_data_bytes: Vec<u8>,
    /// The attestation format identifier.
    pub fmt: String,
    /// The format-specific attestation statement, decoded but not yet
    /// interpreted.
    pub att_stmt: serde_cbor::Value,
}

impl TryFrom<&[u8]> for AttestationObject {
    type Error = WebauthnError;

    fn try_from(data: &[u8]) -> Result<AttestationObject, Self::Error> {
        let aoi: AttestationObjectInner = serde_cbor::from_slice(data)?;
        let auth_data_bytes = aoi.auth_data.to_vec();
        let auth_data = AuthenticatorData::try_from(aoi.auth_data)?;

        Ok(AttestationObject {
            auth_data,
            auth_data_bytes,
            fmt: aoi.fmt,
            att_stmt: aoi.att_stmt,
        })
    }
}

/// The registration response as sent by the browser, fields still in their
/// transport encodings.
/// https://w3c.github.io/webauthn/#authenticatorattestationresponse
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthenticatorAttestationResponseRaw {
    /// The CBOR attestation object.
    #[serde(rename = "attestationObject")]
    pub attestation_object: Base64UrlSafeData,
    /// The JSON client data bytes.
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Base64UrlSafeData,
}

#[derive(Debug)]
pub(crate) struct AuthenticatorAttestationResponse {
    pub client_data: CollectedClientData,
    pub client_data_bytes: Vec<u8>,
    pub attestation_object: AttestationObject,
}

impl TryFrom<&AuthenticatorAttestationResponseRaw> for AuthenticatorAttestationResponse {
    type Error = WebauthnError;

    fn try_from(aarr: &AuthenticatorAttestationResponseRaw) -> Result<Self, Self::Error> {
        let client_data = serde_json::from_slice(aarr.client_data_json.as_ref())?;
        let attestation_object = AttestationObject::try_from(aarr.attestation_object.as_ref())?;

        Ok(AuthenticatorAttestationResponse {
            client_data,
            client_data_bytes: aarr.client_data_json.as_ref().to_vec(),
            attestation_object,
        })
    }
}

/// A credential registration from `navigator.credentials.create()`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterPublicKeyCredential {
    /// The credential id, base64url encoded.
    pub id: String,
    /// The credential id bytes.
    #[serde(rename = "rawId")]
    pub raw_id: Base64UrlSafeData,
    /// The attestation response.
    pub response: AuthenticatorAttestationResponseRaw,
    /// Always "public-key".
    #[serde(rename = "type")]
    pub type_: String,
}

/// The assertion response as sent by the browser, fields still in their
/// transport encodings.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthenticatorAssertionResponseRaw {
    /// The authenticator data bytes.
    #[serde(rename = "authenticatorData")]
    pub authenticator_data: Base64UrlSafeData,
    /// The JSON client data bytes.
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Base64UrlSafeData,
    /// The assertion signature.
    pub signature: Base64UrlSafeData,
    /// The user handle, for resident credentials.
    #[serde(rename = "userHandle")]
    pub user_handle: Option<Base64UrlSafeData>,
}

#[derive(Debug)]
pub(crate) struct AuthenticatorAssertionResponse {
    pub authenticator_data: AuthenticatorData,
    pub authenticator_data_bytes: Vec<u8>,
    pub client_data: CollectedClientData,
    pub client_data_bytes: Vec<u8>,
    pub signature: Vec<u8>,
}

impl TryFrom<&AuthenticatorAssertionResponseRaw> for AuthenticatorAssertionResponse {
    type Error = WebauthnError;

    fn try_from(aarr: &AuthenticatorAssertionResponseRaw) -> Result<Self, Self::Error> {
        Ok(AuthenticatorAssertionResponse {
            authenticator_data: AuthenticatorData::try_from(aarr.authenticator_data.as_ref())?,
            authenticator_data_bytes: aarr.authenticator_data.as_ref().to_vec(),
            client_data: serde_json::from_slice(aarr.client_data_json.as_ref())?,
            client_data_bytes: aarr.client_data_json.as_ref().to_vec(),
            signature: aarr.signature.as_ref().to_vec(),
        })
    }
}

/// An authentication assertion from `navigator.credentials.get()`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicKeyCredential {
    /// The credential id, base64url encoded.
    pub id: String,
    /// The credential id bytes.
    #[serde(rename = "rawId")]
    pub raw_id: Base64UrlSafeData,
    /// The assertion response.
    pub response: AuthenticatorAssertionResponseRaw,
    /// Always "public-key".
    #[serde(rename = "type")]
    pub type_: String,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::constants::FLAG_USER_PRESENT;
    use hex_literal::hex;

    // A minimal, valid COSE EC2 P-256 key map.
    const COSE_EC2: [u8; 77] = hex!(
        "A5"
        "01 02"
        "03 26"
        "20 01"
        "21 58 20 65eda5a12577c2bae829437fe338701a10aaa375e1bb5b5de108de439c08551d"
        "22 58 20 1e52ed75701163f7f9e40ddf9f341b3dc9ba860af7e0ca7ca7e9eecd0084d19c"
    );

    fn header(flags: u8, counter: u32) -> Vec<u8> {
        let mut out = vec![0xab; 32];
        out.push(flags);
        out.extend_from_slice(&counter.to_be_bytes());
        out
    }

    #[test]
    fn assertion_header_only() {
        let data = header(FLAG_USER_PRESENT, 1);
        let auth = AuthenticatorData::try_from(data.as_slice()).unwrap();
        assert!(auth.acd.is_none());
        assert!(auth.extensions.is_none());
        assert!(auth.user_present());
        assert!(!auth.user_verified());
        assert_eq!(auth.counter, 1);
    }

    #[test]
    fn registration_with_attested_credential_data() {
        let mut data = header(FLAG_USER_PRESENT, 1);
        data.extend_from_slice(&[0u8; 16]); // aaguid
        data.extend_from_slice(&[0x00, 0x10]); // credentialIdLength
        data.extend_from_slice(&[0x55; 16]); // credentialId
        data.extend_from_slice(&COSE_EC2);

        let auth = AuthenticatorData::try_from(data.as_slice()).unwrap();
        let acd = auth.acd.expect("acd missing");
        assert_eq!(acd.aaguid, [0u8; 16]);
        assert_eq!(acd.credential_id.len(), 16);
        assert!(acd.credential_public_key_der().is_some());
        assert!(auth.extensions.is_none());
    }

    #[test]
    fn trailing_bytes_decode_as_extensions() {
        let mut data = header(FLAG_USER_PRESENT | FLAG_EXTENSION_DATA, 7);
        data.extend_from_slice(&[0u8; 16]);
        data.extend_from_slice(&[0x00, 0x02]);
        data.extend_from_slice(&[0x01, 0x02]);
        data.extend_from_slice(&COSE_EC2);
        // {"hmac-secret": true}
        data.extend_from_slice(&hex!("A1 6B 686D61632D736563726574 F5"));

        let auth = AuthenticatorData::try_from(data.as_slice()).unwrap();
        assert!(auth.acd.is_some());
        assert!(auth.extensions.is_some());
    }

    #[test]
    fn malformed_credential_key_still_exposes_id() {
        let mut data = header(FLAG_USER_PRESENT, 1);
        data.extend_from_slice(&[0u8; 16]);
        data.extend_from_slice(&[0x00, 0x04]);
        data.extend_from_slice(&[0x99; 4]);
        // A CBOR value, but not a usable key: the integer 7.
        data.push(0x07);

        let auth = AuthenticatorData::try_from(data.as_slice()).unwrap();
        let acd = auth.acd.expect("acd missing");
        assert_eq!(acd.credential_id, vec![0x99; 4]);
        assert!(acd.credential_public_key_der().is_none());
    }

    #[test]
    fn truncated_inputs_fail_closed() {
        // Short header.
        assert!(AuthenticatorData::try_from(&[0u8; 36][..]).is_err());
        // Declared credential id length runs past the buffer.
        let mut data = header(FLAG_USER_PRESENT, 1);
        data.extend_from_slice(&[0u8; 16]);
        data.extend_from_slice(&[0xff, 0xff]);
        data.extend_from_slice(&[0x00; 8]);
        assert!(matches!(
            AuthenticatorData::try_from(data.as_slice()),
            Err(WebauthnError::ParseInsufficientBytesAvailable)
        ));
    }

    #[test]
    fn deserialise_register_response() {
        let x = r#"
        {"id":"4oiUggKcrpRIlB-cFzFbfkx_BNeM7UAnz3wO7ZpT4I2GL_n-g8TICyJTHg11l0wyc-VkQUVnJ0yM08-1D5oXnw","rawId":"4oiUggKcrpRIlB+cFzFbfkx/BNeM7UAnz3wO7ZpT4I2GL/n+g8TICyJTHg11l0wyc+VkQUVnJ0yM08+1D5oXnw==","response":{"attestationObject":"o2NmbXRkbm9uZWdhdHRTdG10oGhhdXRoRGF0YVjEEsoXtJryKJQ28wPgFmAwoh5SXSZuIJJnQzgBqP1AcaBBAAAAAAAAAAAAAAAAAAAAAAAAAAAAQOKIlIICnK6USJQfnBcxW35MfwTXjO1AJ898Du2aU+CNhi/5/oPEyAsiUx4NdZdMMnPlZEFFZydMjNPPtQ+aF5+lAQIDJiABIVggFo08FM4Je1yfCSuPsxP6h0zvlJSjfocUk75EvXw2oSMiWCArRwLD8doar0bACWS1PgVJKzp/wStyvOkTd4NlWHW8rQ==","clientDataJSON":"eyJjaGFsbGVuZ2UiOiJwZENXRDJWamRMSVkzN2VSYTVfazdhS3BqdkF2VmNOY04ycVozMjk0blpVIiwiY2xpZW50RXh0ZW5zaW9ucyI6e30sImhhc2hBbGdvcml0aG0iOiJTSEEtMjU2Iiwib3JpZ2luIjoiaHR0cDovLzEyNy4wLjAuMTo4MDgwIiwidHlwZSI6IndlYmF1dGhuLmNyZWF0ZSJ9"},"type":"public-key"}
        "#;
        let y: RegisterPublicKeyCredential = serde_json::from_str(x).unwrap();
        let response = AuthenticatorAttestationResponse::try_from(&y.response).unwrap();
        assert_eq!(response.attestation_object.fmt, "none");
        assert!(response.attestation_object.auth_data.acd.is_some());
    }
}
