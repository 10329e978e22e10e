//! Cryptographic operation wrapper for Webauthn. This module exists to
//! allow ease of auditing, safe operation wrappers for the webauthn library,
//! and cryptographic provider abstraction. This module currently uses OpenSSL
//! as the cryptographic primitive provider.

#![allow(non_camel_case_types)]

use std::convert::TryFrom;

use openssl::{bn, ec, hash, memcmp, nid, pkey, rsa, sha, sign, x509};
use x509_parser::oid_registry::Oid;
use x509_parser::x509::X509Version;

use crate::base64_data::Base64UrlSafeData;
use crate::error::WebauthnError;
use crate::proto::Aaguid;

// Why OpenSSL over another rust crate?
// - The openssl crate allows us to reconstruct a public key from its
//   x/y group coords, where most others want a pkcs formatted structure. As
//   a result, it's easiest to use openssl as it gives us exactly what we need
//   for these operations, and despite its many challenges as a library, it
//   has resources and investment into its maintenance.

// If cert contains an extension with OID 1.3.6.1.4.1.45724.1.1.4
// (id-fido-gen-ce-aaguid) its value must match the aaguid in the
// authenticator data.
const FIDO_GEN_CE_AAGUID: Oid<'static> = der_parser::oid!(1.3.6 .1 .4 .1 .45724 .1 .1 .4);

/// An ECDSACurve identifier. You probably will never need to alter
/// or use this value, as it is set inside the Credential for you.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ECDSACurve {
    /// Identifies this curve as SECP256R1 (X9_62_PRIME256V1 in OpenSSL)
    SECP256R1 = 1,
    /// Identifies this curve as SECP384R1
    SECP384R1 = 2,
    /// Identifies this curve as SECP521R1
    SECP521R1 = 3,
    /// Identifies this curve as SECP256K1
    SECP256K1 = 8,
}

impl TryFrom<i128> for ECDSACurve {
    type Error = WebauthnError;
    fn try_from(u: i128) -> Result<Self, Self::Error> {
        match u {
            1 => Ok(ECDSACurve::SECP256R1),
            2 => Ok(ECDSACurve::SECP384R1),
            3 => Ok(ECDSACurve::SECP521R1),
            8 => Ok(ECDSACurve::SECP256K1),
            _ => Err(WebauthnError::COSEKeyECDSAInvalidCurve),
        }
    }
}

impl ECDSACurve {
    pub(crate) fn to_openssl_nid(self) -> nid::Nid {
        match self {
            ECDSACurve::SECP256R1 => nid::Nid::X9_62_PRIME256V1,
            ECDSACurve::SECP384R1 => nid::Nid::SECP384R1,
            ECDSACurve::SECP521R1 => nid::Nid::SECP521R1,
            ECDSACurve::SECP256K1 => nid::Nid::SECP256K1,
        }
    }

    /// The size in bytes of one coordinate on this curve.
    pub fn coordinate_size(self) -> usize {
        match self {
            ECDSACurve::SECP256R1 | ECDSACurve::SECP256K1 => 32,
            ECDSACurve::SECP384R1 => 48,
            ECDSACurve::SECP521R1 => 66,
        }
    }
}

/// A COSE signature algorithm identifier, indicating the type of key and
/// digest that a signature was produced with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum COSEAlgorithm {
    /// ECDSA with SHA-256 on P-256 (the webauthn default)
    ES256 = -7,
    /// ECDSA with SHA-384 on P-384
    ES384 = -35,
    /// ECDSA with SHA-512 on P-521
    ES512 = -36,
    /// ECDSA with SHA-256 on secp256k1
    ES256K = -47,
    /// RSASSA-PKCS1-v1_5 with SHA-256
    RS256 = -257,
    /// RSASSA-PKCS1-v1_5 with SHA-384
    RS384 = -258,
    /// RSASSA-PKCS1-v1_5 with SHA-512
    RS512 = -259,
    /// RSASSA-PKCS1-v1_5 with SHA-1. Some TPM era authenticators still
    /// present this; its use is logged.
    INSECURE_RS1 = -65535,
    /// RSASSA-PSS with SHA-256
    PS256 = -37,
    /// RSASSA-PSS with SHA-384
    PS384 = -38,
    /// RSASSA-PSS with SHA-512
    PS512 = -39,
    /// HMAC with SHA-256, mac truncated to 64 bits
    HS256_64 = 4,
    /// HMAC with SHA-256
    HS256 = 5,
    /// HMAC with SHA-384
    HS384 = 6,
    /// HMAC with SHA-512
    HS512 = 7,
}

impl TryFrom<i128> for COSEAlgorithm {
    type Error = WebauthnError;
    fn try_from(i: i128) -> Result<Self, Self::Error> {
        match i {
            -7 => Ok(COSEAlgorithm::ES256),
            -35 => Ok(COSEAlgorithm::ES384),
            -36 => Ok(COSEAlgorithm::ES512),
            -47 => Ok(COSEAlgorithm::ES256K),
            -257 => Ok(COSEAlgorithm::RS256),
            -258 => Ok(COSEAlgorithm::RS384),
            -259 => Ok(COSEAlgorithm::RS512),
            -65535 => Ok(COSEAlgorithm::INSECURE_RS1),
            -37 => Ok(COSEAlgorithm::PS256),
            -38 => Ok(COSEAlgorithm::PS384),
            -39 => Ok(COSEAlgorithm::PS512),
            4 => Ok(COSEAlgorithm::HS256_64),
            5 => Ok(COSEAlgorithm::HS256),
            6 => Ok(COSEAlgorithm::HS384),
            7 => Ok(COSEAlgorithm::HS512),
            _ => Err(WebauthnError::COSEKeyInvalidAlgorithm),
        }
    }
}

impl From<&COSEAlgorithm> for i128 {
    fn from(c: &COSEAlgorithm) -> Self {
        *c as i128
    }
}

impl COSEAlgorithm {
    /// The digest this algorithm hashes its input with.
    pub fn digest(self) -> hash::MessageDigest {
        match self {
            COSEAlgorithm::ES256
            | COSEAlgorithm::ES256K
            | COSEAlgorithm::RS256
            | COSEAlgorithm::PS256
            | COSEAlgorithm::HS256_64
            | COSEAlgorithm::HS256 => hash::MessageDigest::sha256(),
            COSEAlgorithm::ES384
            | COSEAlgorithm::RS384
            | COSEAlgorithm::PS384
            | COSEAlgorithm::HS384 => hash::MessageDigest::sha384(),
            COSEAlgorithm::ES512
            | COSEAlgorithm::RS512
            | COSEAlgorithm::PS512
            | COSEAlgorithm::HS512 => hash::MessageDigest::sha512(),
            COSEAlgorithm::INSECURE_RS1 => hash::MessageDigest::sha1(),
        }
    }

    pub(crate) fn is_ecdsa(self) -> bool {
        matches!(
            self,
            COSEAlgorithm::ES256
                | COSEAlgorithm::ES384
                | COSEAlgorithm::ES512
                | COSEAlgorithm::ES256K
        )
    }

    pub(crate) fn is_rsa(self) -> bool {
        self.is_rsa_pss()
            || matches!(
                self,
                COSEAlgorithm::RS256
                    | COSEAlgorithm::RS384
                    | COSEAlgorithm::RS512
                    | COSEAlgorithm::INSECURE_RS1
            )
    }

    pub(crate) fn is_rsa_pss(self) -> bool {
        matches!(
            self,
            COSEAlgorithm::PS256 | COSEAlgorithm::PS384 | COSEAlgorithm::PS512
        )
    }

    pub(crate) fn is_hmac(self) -> bool {
        matches!(
            self,
            COSEAlgorithm::HS256_64
                | COSEAlgorithm::HS256
                | COSEAlgorithm::HS384
                | COSEAlgorithm::HS512
        )
    }

    /// The mac length compared for HMAC algorithms. The truncated variant
    /// only commits to the leading 8 bytes of the digest output.
    pub(crate) fn hmac_tag_size(self) -> Option<usize> {
        match self {
            COSEAlgorithm::HS256_64 => Some(8),
            COSEAlgorithm::HS256 => Some(32),
            COSEAlgorithm::HS384 => Some(48),
            COSEAlgorithm::HS512 => Some(64),
            _ => None,
        }
    }
}

/// A COSE Elliptic Curve Public Key. This is generally the provided credential
/// that an authenticator registers, and is used to authenticate the user.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct COSEEC2Key {
    /// The curve that this key references.
    pub curve: ECDSACurve,
    /// The key's public X coordinate.
    pub x: Base64UrlSafeData,
    /// The key's public Y coordinate.
    pub y: Base64UrlSafeData,
}

/// A COSE RSA public key, a modulus and exponent pair.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct COSERSAKey {
    /// The modulus of this key.
    pub n: Base64UrlSafeData,
    /// The exponent of this key.
    pub e: [u8; 3],
}

/// A COSE symmetric key, used only for mac operations. Never valid for
/// asymmetric signature verification.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct COSESymmetricKey {
    /// The shared secret.
    pub k: Base64UrlSafeData,
}

/// The type of key contained within a COSE value.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum COSEKeyType {
    /// Identifies this as an Elliptic Curve EC2 key
    EC_EC2(COSEEC2Key),
    /// Identifies this as an RSA key
    RSA(COSERSAKey),
    /// Identifies this as a symmetric key
    Symmetric(COSESymmetricKey),
}

/// A COSE Key as provided by the authenticator.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct COSEKey {
    /// The signature algorithm this key is used with
    pub type_: COSEAlgorithm,
    /// The public key
    pub key: COSEKeyType,
}

/// The outcome of a signature check. Unsupported algorithms and unusable
/// keys are deliberately distinct from a signature that simply failed to
/// verify, so a caller can not mistake one for the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureVerification {
    /// The signature is cryptographically valid for this key.
    Valid,
    /// The signature failed verification. Reject this ceremony.
    Invalid,
    /// The key can not perform the requested algorithm. Reject the
    /// registration, or this call, as policy dictates.
    UnsupportedAlgorithm,
    /// The key material itself could not be loaded.
    MalformedKey,
}

impl SignatureVerification {
    /// True only for a cryptographically valid signature.
    pub fn is_valid(self) -> bool {
        matches!(self, SignatureVerification::Valid)
    }
}

// See https://tools.ietf.org/html/rfc8152#section-13
// COSE key maps are keyed by small integers:
//   1: kty (2 EC2, 3 RSA, 4 Symmetric)
//   3: alg
// and per-kty parameters at negative labels:
//   EC2:       -1 crv, -2 x, -3 y
//   RSA:       -1 n, -2 e
//   Symmetric: -1 k
impl TryFrom<&serde_cbor::Value> for COSEKey {
    type Error = WebauthnError;
    fn try_from(d: &serde_cbor::Value) -> Result<COSEKey, Self::Error> {
        let m = cbor_try_map!(d).map_err(|_| WebauthnError::COSEKeyInvalidCBORValue)?;

        let key_type_value = m
            .get(&serde_cbor::Value::Integer(1))
            .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
        let key_type =
            cbor_try_i128!(key_type_value).map_err(|_| WebauthnError::COSEKeyInvalidCBORValue)?;

        let content_type_value = m
            .get(&serde_cbor::Value::Integer(3))
            .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
        let content_type = cbor_try_i128!(content_type_value)
            .map_err(|_| WebauthnError::COSEKeyInvalidCBORValue)?;

        let type_ = COSEAlgorithm::try_from(content_type)?;

        match key_type {
            // EC2, crv/x/y.
            2 => {
                if !type_.is_ecdsa() {
                    return Err(WebauthnError::COSEKeyInvalidType);
                }

                let curve_type_value = m
                    .get(&serde_cbor::Value::Integer(-1))
                    .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
                let curve_type = cbor_try_i128!(curve_type_value)
                    .map_err(|_| WebauthnError::COSEKeyInvalidCBORValue)?;
                let curve = ECDSACurve::try_from(curve_type)?;

                let x_value = m
                    .get(&serde_cbor::Value::Integer(-2))
                    .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
                let x = cbor_try_bytes!(x_value)
                    .map_err(|_| WebauthnError::COSEKeyInvalidCBORValue)?;

                let y_value = m
                    .get(&serde_cbor::Value::Integer(-3))
                    .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
                let y = cbor_try_bytes!(y_value)
                    .map_err(|_| WebauthnError::COSEKeyInvalidCBORValue)?;

                let coord_len = curve.coordinate_size();
                if x.len() != coord_len || y.len() != coord_len {
                    return Err(WebauthnError::COSEKeyECDSAXYInvalid);
                }

                let cose_key = COSEKey {
                    type_,
                    key: COSEKeyType::EC_EC2(COSEEC2Key {
                        curve,
                        x: x.to_vec().into(),
                        y: y.to_vec().into(),
                    }),
                };

                // The rfc additionally states:
                //   "Applications MUST check that the curve and the key type are
                //    consistent and reject a key if they are not."
                // this means feeding the values to openssl to validate them for us!
                cose_key.validate()?;
                Ok(cose_key)
            }
            // RSA, n/e.
            3 => {
                if !type_.is_rsa() {
                    return Err(WebauthnError::COSEKeyInvalidType);
                }

                let n_value = m
                    .get(&serde_cbor::Value::Integer(-1))
                    .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
                let n = cbor_try_bytes!(n_value)
                    .map_err(|_| WebauthnError::COSEKeyInvalidCBORValue)?;

                let e_value = m
                    .get(&serde_cbor::Value::Integer(-2))
                    .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
                let e = cbor_try_bytes!(e_value)
                    .map_err(|_| WebauthnError::COSEKeyInvalidCBORValue)?;

                if n.is_empty() || e.len() != 3 {
                    return Err(WebauthnError::COSEKeyRSANEInvalid);
                }

                let mut e_temp = [0; 3];
                e_temp.copy_from_slice(e.as_slice());

                let cose_key = COSEKey {
                    type_,
                    key: COSEKeyType::RSA(COSERSAKey {
                        n: n.to_vec().into(),
                        e: e_temp,
                    }),
                };

                cose_key.validate()?;
                Ok(cose_key)
            }
            // Symmetric, k.
            4 => {
                if !type_.is_hmac() {
                    return Err(WebauthnError::COSEKeyInvalidType);
                }

                let k_value = m
                    .get(&serde_cbor::Value::Integer(-1))
                    .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
                let k = cbor_try_bytes!(k_value)
                    .map_err(|_| WebauthnError::COSEKeyInvalidCBORValue)?;

                if k.is_empty() {
                    return Err(WebauthnError::COSEKeyInvalidCBORValue);
                }

                Ok(COSEKey {
                    type_,
                    key: COSEKeyType::Symmetric(COSESymmetricKey {
                        k: k.to_vec().into(),
                    }),
                })
            }
            _ => Err(WebauthnError::COSEKeyInvalidType),
        }
    }
}

impl COSEKey {
    /// The uncompressed X9.62 point for an EC2 key: 0x04 || x || y.
    pub(crate) fn get_alg_key_ecc_x962_raw(&self) -> Result<Vec<u8>, WebauthnError> {
        match &self.key {
            COSEKeyType::EC_EC2(ecpk) => {
                let r: [u8; 1] = [0x04];
                Ok(r.iter()
                    .chain(ecpk.x.as_ref().iter())
                    .chain(ecpk.y.as_ref().iter())
                    .copied()
                    .collect())
            }
            _ => Err(WebauthnError::COSEKeyInvalidType),
        }
    }

    /// The compressed X9.62 point for an EC2 key: (0x02 | y parity) || x.
    ///
    /// The prefix is taken from the low bit of the final y byte. That is
    /// only a valid stand-in for the parity of y itself on curves over an
    /// odd prime field with full width big-endian coordinates, which holds
    /// for every curve in [ECDSACurve] but is not a general EC identity.
    pub(crate) fn get_alg_key_ecc_x962_compressed(&self) -> Result<Vec<u8>, WebauthnError> {
        match &self.key {
            COSEKeyType::EC_EC2(ecpk) => {
                let y_odd = ecpk
                    .y
                    .as_ref()
                    .last()
                    .map(|b| b & 1 == 1)
                    .ok_or(WebauthnError::COSEKeyECDSAXYInvalid)?;
                let r: [u8; 1] = if y_odd { [0x03] } else { [0x02] };
                Ok(r.iter().chain(ecpk.x.as_ref().iter()).copied().collect())
            }
            _ => Err(WebauthnError::COSEKeyInvalidType),
        }
    }

    /// Serialise this key to a DER SubjectPublicKeyInfo, or the raw secret
    /// for symmetric keys.
    pub fn to_der(&self, compress_ec: bool) -> Result<Vec<u8>, WebauthnError> {
        match &self.key {
            COSEKeyType::EC_EC2(ec2k) => {
                let raw = if compress_ec {
                    self.get_alg_key_ecc_x962_compressed()?
                } else {
                    self.get_alg_key_ecc_x962_raw()?
                };
                EcdsaPublicKey::from_raw(&raw, ec2k.curve)?.to_der()
            }
            COSEKeyType::RSA(rsak) => {
                let n = bn::BigNum::from_slice(rsak.n.as_ref())?;
                let e = bn::BigNum::from_slice(&rsak.e)?;
                let rsa_key = rsa::Rsa::from_public_components(n, e)
                    .map_err(|_| WebauthnError::COSEKeyRSANEInvalid)?;
                Ok(pkey::PKey::from_rsa(rsa_key)?.public_key_to_der()?)
            }
            COSEKeyType::Symmetric(sk) => Ok(sk.k.as_ref().to_vec()),
        }
    }

    /// Serialise this key to a PEM encoded SubjectPublicKeyInfo. Symmetric
    /// keys have no public half and are rejected.
    pub fn to_pem(&self) -> Result<Vec<u8>, WebauthnError> {
        Ok(self.get_openssl_pkey()?.public_key_to_pem()?)
    }

    pub(crate) fn validate(&self) -> Result<(), WebauthnError> {
        match &self.key {
            COSEKeyType::EC_EC2(ec2k) => {
                let curve = ec2k.curve.to_openssl_nid();
                let ec_group = ec::EcGroup::from_curve_name(curve)?;

                let xbn = bn::BigNum::from_slice(ec2k.x.as_ref())?;
                let ybn = bn::BigNum::from_slice(ec2k.y.as_ref())?;

                let ec_key = ec::EcKey::from_public_key_affine_coordinates(&ec_group, &xbn, &ybn)?;

                Ok(ec_key.check_key()?)
            }
            COSEKeyType::RSA(rsak) => {
                let n = bn::BigNum::from_slice(rsak.n.as_ref())?;
                let e = bn::BigNum::from_slice(&rsak.e)?;
                rsa::Rsa::from_public_components(n, e)
                    .map(|_| ())
                    .map_err(|_| WebauthnError::COSEKeyRSANEInvalid)
            }
            COSEKeyType::Symmetric(sk) => {
                if sk.k.as_ref().is_empty() {
                    Err(WebauthnError::COSEKeyInvalidCBORValue)
                } else {
                    Ok(())
                }
            }
        }
    }

    fn get_openssl_pkey(&self) -> Result<pkey::PKey<pkey::Public>, WebauthnError> {
        match &self.key {
            COSEKeyType::EC_EC2(ec2k) => {
                let curve = ec2k.curve.to_openssl_nid();
                let ec_group = ec::EcGroup::from_curve_name(curve)?;

                let xbn = bn::BigNum::from_slice(ec2k.x.as_ref())?;
                let ybn = bn::BigNum::from_slice(ec2k.y.as_ref())?;

                let ec_key = ec::EcKey::from_public_key_affine_coordinates(&ec_group, &xbn, &ybn)?;

                // Checks the coordinates are actually on the named curve.
                ec_key.check_key()?;

                Ok(pkey::PKey::from_ec_key(ec_key)?)
            }
            COSEKeyType::RSA(rsak) => {
                let n = bn::BigNum::from_slice(rsak.n.as_ref())?;
                let e = bn::BigNum::from_slice(&rsak.e)?;
                let rsa_key = rsa::Rsa::from_public_components(n, e)
                    .map_err(|_| WebauthnError::COSEKeyRSANEInvalid)?;
                Ok(pkey::PKey::from_rsa(rsa_key)?)
            }
            COSEKeyType::Symmetric(_) => Err(WebauthnError::COSEKeyInvalidType),
        }
    }

    /// Verify a signature over `verification_data` with this key, using the
    /// algorithm the key was registered with.
    pub fn verify_signature(
        &self,
        signature: &[u8],
        verification_data: &[u8],
    ) -> SignatureVerification {
        match &self.key {
            COSEKeyType::EC_EC2(_) => {
                if !self.type_.is_ecdsa() {
                    return SignatureVerification::UnsupportedAlgorithm;
                }
                let pkey = match self.get_openssl_pkey() {
                    Ok(p) => p,
                    Err(_) => return SignatureVerification::MalformedKey,
                };
                match verify_signature(self.type_, &pkey, signature, verification_data) {
                    Ok(true) => SignatureVerification::Valid,
                    Ok(false) => SignatureVerification::Invalid,
                    Err(_) => SignatureVerification::Invalid,
                }
            }
            COSEKeyType::RSA(_) => {
                if !self.type_.is_rsa() {
                    return SignatureVerification::UnsupportedAlgorithm;
                }
                if self.type_ == COSEAlgorithm::INSECURE_RS1 {
                    warn!("INSECURE SHA1 USAGE DETECTED");
                }
                let pkey = match self.get_openssl_pkey() {
                    Ok(p) => p,
                    Err(_) => return SignatureVerification::MalformedKey,
                };
                match verify_signature(self.type_, &pkey, signature, verification_data) {
                    Ok(true) => SignatureVerification::Valid,
                    Ok(false) => SignatureVerification::Invalid,
                    Err(_) => SignatureVerification::Invalid,
                }
            }
            COSEKeyType::Symmetric(sk) => {
                let tag_size = match self.type_.hmac_tag_size() {
                    Some(t) => t,
                    None => return SignatureVerification::UnsupportedAlgorithm,
                };
                let mac = match hmac(self.type_.digest(), sk.k.as_ref(), verification_data) {
                    Ok(m) => m,
                    Err(_) => return SignatureVerification::MalformedKey,
                };
                if signature.len() != tag_size || mac.len() < tag_size {
                    return SignatureVerification::Invalid;
                }
                if memcmp::eq(&mac[..tag_size], signature) {
                    SignatureVerification::Valid
                } else {
                    SignatureVerification::Invalid
                }
            }
        }
    }
}

/// An EC public key convertible between the three encodings that webauthn
/// and U2F traffic in: raw X9.62 points (compressed or uncompressed), DER
/// SubjectPublicKeyInfo, and PEM armor of the same.
pub struct EcdsaPublicKey {
    pkey: pkey::PKey<pkey::Public>,
}

impl std::fmt::Debug for EcdsaPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "EcdsaPublicKey")
    }
}

impl EcdsaPublicKey {
    /// Reconstruct a key from a raw point. The curve must be supplied
    /// because a bare point does not encode it. Both the uncompressed
    /// (0x04) and compressed (0x02/0x03) forms are accepted.
    pub fn from_raw(raw: &[u8], curve: ECDSACurve) -> Result<Self, WebauthnError> {
        let group = ec::EcGroup::from_curve_name(curve.to_openssl_nid())?;
        let mut ctx = bn::BigNumContext::new()?;
        let point = ec::EcPoint::from_bytes(&group, raw, &mut ctx)?;
        let ec_key = ec::EcKey::from_public_key(&group, &point)?;
        ec_key.check_key()?;
        Ok(EcdsaPublicKey {
            pkey: pkey::PKey::from_ec_key(ec_key)?,
        })
    }

    /// Parse a DER SubjectPublicKeyInfo.
    pub fn from_der(der: &[u8]) -> Result<Self, WebauthnError> {
        let pkey = pkey::PKey::public_key_from_der(der)?;
        // Fails here rather than at first use if this is not an EC key.
        pkey.ec_key()?;
        Ok(EcdsaPublicKey { pkey })
    }

    /// Parse a PEM encoded public key.
    pub fn from_pem(pem: &[u8]) -> Result<Self, WebauthnError> {
        let pkey = pkey::PKey::public_key_from_pem(pem)?;
        pkey.ec_key()?;
        Ok(EcdsaPublicKey { pkey })
    }

    /// Encode as a raw X9.62 point.
    pub fn to_raw(&self, compressed: bool) -> Result<Vec<u8>, WebauthnError> {
        let ec_key = self.pkey.ec_key()?;
        let form = if compressed {
            ec::PointConversionForm::COMPRESSED
        } else {
            ec::PointConversionForm::UNCOMPRESSED
        };
        let mut ctx = bn::BigNumContext::new()?;
        Ok(ec_key.public_key().to_bytes(ec_key.group(), form, &mut ctx)?)
    }

    /// Encode as a DER SubjectPublicKeyInfo.
    pub fn to_der(&self) -> Result<Vec<u8>, WebauthnError> {
        Ok(self.pkey.public_key_to_der()?)
    }

    /// Encode as PEM.
    pub fn to_pem(&self) -> Result<Vec<u8>, WebauthnError> {
        Ok(self.pkey.public_key_to_pem()?)
    }

    /// Verify a signature over `data` with the supplied digest. A signature
    /// that fails cryptographically is `Ok(false)`; only an unusable key is
    /// an error.
    pub fn verify(
        &self,
        digest: hash::MessageDigest,
        signature: &[u8],
        data: &[u8],
    ) -> Result<bool, WebauthnError> {
        let mut verifier = sign::Verifier::new(digest, &self.pkey)?;
        verifier.update(data)?;
        Ok(verifier.verify(signature).unwrap_or(false))
    }
}

/// The signing half of [EcdsaPublicKey]. Verification-only deployments
/// never need this; it exists so key material generated elsewhere can be
/// carried through the same encodings.
pub struct EcdsaPrivateKey {
    pkey: pkey::PKey<pkey::Private>,
}

impl std::fmt::Debug for EcdsaPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "EcdsaPrivateKey")
    }
}

impl EcdsaPrivateKey {
    /// Parse a DER PKCS#8 PrivateKeyInfo.
    pub fn from_der(der: &[u8]) -> Result<Self, WebauthnError> {
        let pkey = pkey::PKey::private_key_from_pkcs8(der)?;
        pkey.ec_key()?;
        Ok(EcdsaPrivateKey { pkey })
    }

    /// Parse a PEM encoded private key.
    pub fn from_pem(pem: &[u8]) -> Result<Self, WebauthnError> {
        let pkey = pkey::PKey::private_key_from_pem(pem)?;
        pkey.ec_key()?;
        Ok(EcdsaPrivateKey { pkey })
    }

    /// Encode as DER PKCS#8.
    pub fn to_der(&self) -> Result<Vec<u8>, WebauthnError> {
        Ok(self.pkey.private_key_to_pkcs8()?)
    }

    /// Encode as PEM PKCS#8.
    pub fn to_pem(&self) -> Result<Vec<u8>, WebauthnError> {
        Ok(self.pkey.private_key_to_pem_pkcs8()?)
    }

    /// The public half of this key.
    pub fn public_key(&self) -> Result<EcdsaPublicKey, WebauthnError> {
        EcdsaPublicKey::from_der(&self.pkey.public_key_to_der()?)
    }

    /// Produce a DER encoded signature over `data` with the supplied digest.
    pub fn sign(
        &self,
        digest: hash::MessageDigest,
        data: &[u8],
    ) -> Result<Vec<u8>, WebauthnError> {
        let mut signer = sign::Signer::new(digest, &self.pkey)?;
        signer.update(data)?;
        Ok(signer.sign_to_vec()?)
    }
}

/// An X509PublicKey. This is what is otherwise known as a public certificate
/// which comprises a public key and other signed metadata related to the issuer
/// of the key.
pub struct X509PublicKey {
    pubk: x509::X509,
    der: Vec<u8>,
}

impl std::fmt::Debug for X509PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "X509PublicKey")
    }
}

impl TryFrom<&[u8]> for X509PublicKey {
    type Error = WebauthnError;

    // Must be DER bytes. If you have PEM, base64decode first!
    fn try_from(d: &[u8]) -> Result<Self, Self::Error> {
        let pubk = x509::X509::from_der(d)?;
        Ok(X509PublicKey {
            pubk,
            der: d.to_vec(),
        })
    }
}

impl X509PublicKey {
    pub(crate) fn is_secp256r1(&self) -> Result<bool, WebauthnError> {
        let pk = self.pubk.public_key()?;
        let ec_key = pk.ec_key()?;
        ec_key.check_key()?;

        let ec_grpref = ec_key.group();
        let ec_curve = ec_grpref
            .curve_name()
            .ok_or(WebauthnError::CertificatePublicKeyInvalid)?;

        Ok(ec_curve == nid::Nid::X9_62_PRIME256V1)
    }

    pub(crate) fn verify_signature(
        &self,
        alg: COSEAlgorithm,
        signature: &[u8],
        verification_data: &[u8],
    ) -> Result<bool, WebauthnError> {
        let pkey = self.pubk.public_key()?;
        verify_signature(alg, &pkey, signature, verification_data)
    }

    /// Verify that this certificate meets the packed attestation statement
    /// certificate requirements: X.509 version 3, subject naming the vendor
    /// with OU "Authenticator Attestation", and basic constraints CA:FALSE.
    /// https://w3c.github.io/webauthn/#sctn-packed-attestation-cert-requirements
    pub(crate) fn assert_packed_attest_req(&self) -> Result<(), WebauthnError> {
        let (_, cert) = x509_parser::parse_x509_certificate(&self.der)
            .map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?;

        if cert.tbs_certificate.version != X509Version::V3 {
            return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
        }

        let subject = cert.subject();
        let subject_c = subject.iter_country().next();
        let subject_o = subject.iter_organization().next();
        let subject_cn = subject.iter_common_name().next();
        if subject_c.is_none() || subject_o.is_none() || subject_cn.is_none() {
            return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
        }

        let ou_valid = subject
            .iter_organizational_unit()
            .filter_map(|ou| ou.as_str().ok())
            .any(|ou| ou == "Authenticator Attestation");
        if !ou_valid {
            return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
        }

        // The Basic Constraints extension MUST have the CA component set to false.
        match cert.basic_constraints() {
            Ok(Some(bc)) => {
                if bc.value.ca {
                    return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
                }
            }
            Ok(None) => return Err(WebauthnError::AttestationCertificateRequirementsNotMet),
            Err(_) => return Err(WebauthnError::AttestationStatementX5CInvalid),
        }

        Ok(())
    }

    /// The value of the id-fido-gen-ce-aaguid extension, when present. The
    /// extension wraps the 16 byte aaguid in an OCTET STRING.
    pub(crate) fn get_fido_gen_ce_aaguid(&self) -> Option<Aaguid> {
        let (_, cert) = x509_parser::parse_x509_certificate(&self.der).ok()?;
        let ext = cert
            .extensions()
            .iter()
            .find(|ext| ext.oid == FIDO_GEN_CE_AAGUID)?;
        let (_, obj) = der_parser::der::parse_der_octetstring(ext.value).ok()?;
        let aaguid: Aaguid = obj.as_slice().ok()?.try_into().ok()?;
        Some(aaguid)
    }
}

/// Verify a signature over `verification_data` with any asymmetric key,
/// dispatching padding and digest on the COSE algorithm. HMAC algorithms
/// have no public half and are rejected.
pub(crate) fn verify_signature(
    alg: COSEAlgorithm,
    pkey: &pkey::PKeyRef<pkey::Public>,
    signature: &[u8],
    verification_data: &[u8],
) -> Result<bool, WebauthnError> {
    if alg.is_hmac() {
        return Err(WebauthnError::COSEKeyUnsupportedAlgorithm);
    }

    let mut verifier = sign::Verifier::new(alg.digest(), pkey)?;
    if alg.is_rsa_pss() {
        verifier.set_rsa_padding(rsa::Padding::PKCS1_PSS)?;
        verifier.set_rsa_mgf1_md(alg.digest())?;
        verifier.set_rsa_pss_saltlen(sign::RsaPssSaltlen::DIGEST_LENGTH)?;
    }
    verifier.update(verification_data)?;
    // A signature that does not even parse is treated the same as one that
    // parses and fails.
    Ok(verifier.verify(signature).unwrap_or(false))
}

/// Compute an HMAC over `data`.
pub(crate) fn hmac(
    digest: hash::MessageDigest,
    key: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, WebauthnError> {
    let pkey = pkey::PKey::hmac(key)?;
    let mut signer = sign::Signer::new(digest, &pkey)?;
    Ok(signer.sign_oneshot_to_vec(data)?)
}

/// Compute the sha256 of a slice of data.
pub(crate) fn compute_sha256(data: &[u8]) -> Vec<u8> {
    sha::sha256(data).to_vec()
}

/// Equality over secret-derived values. Always compares the full length.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && memcmp::eq(a, b)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;
    use hex_literal::hex;
    use serde_cbor::Value;

    #[test]
    fn cbor_es256() {
        let hex_data = hex!(
                "A5"         // Map - 5 elements
                "01 02"      //   1:   2,  ; kty: EC2 key type
                "03 26"      //   3:  -7,  ; alg: ES256 signature algorithm
                "20 01"      //  -1:   1,  ; crv: P-256 curve
                "21 58 20   65eda5a12577c2bae829437fe338701a10aaa375e1bb5b5de108de439c08551d" // -2:   x,  ; x-coordinate
                "22 58 20   1e52ed75701163f7f9e40ddf9f341b3dc9ba860af7e0ca7ca7e9eecd0084d19c" // -3:   y,  ; y-coordinate
        );

        let val: Value = serde_cbor::from_slice(&hex_data).unwrap();
        let key = COSEKey::try_from(&val).unwrap();

        assert_eq!(key.type_, COSEAlgorithm::ES256);
        match &key.key {
            COSEKeyType::EC_EC2(pkey) => {
                assert_eq!(
                    pkey.x.as_ref(),
                    hex!("65eda5a12577c2bae829437fe338701a10aaa375e1bb5b5de108de439c08551d")
                );
                assert_eq!(
                    pkey.y.as_ref(),
                    hex!("1e52ed75701163f7f9e40ddf9f341b3dc9ba860af7e0ca7ca7e9eecd0084d19c")
                );
                assert_eq!(pkey.curve, ECDSACurve::SECP256R1);
            }
            _ => panic!("Key should be parsed EC2 key"),
        }

        // A well formed EC2 key converts to DER both ways.
        assert!(key.to_der(false).is_ok());
        assert!(key.to_der(true).is_ok());
    }

    #[test]
    fn cbor_es384() {
        let hex_data = hex!(
                "A5"         // Map - 5 elements
                "01 02"      //   1:   2,  ; kty: EC2 key type
                "03 38 22"   //   3:  -35, ; alg: ES384 signature algorithm
                "20 02"      //  -1:   2,  ; crv: P-384 curve
                "21 58 30   ceeaf818731db7af2d02e029854823d71bdbf65fb0c6ff69" // -2: x, ; x-coordinate
                           "42c9cf891efe18ea81430517d777f5c43550da801be5bf2f"
                "22 58 30   dda1d0ead72e042efb7c36a38cc021abb2ca1a2e38159edd" // -3: y ; y-coordinate
                           "a8c25f391e9a38d79dd56b9427d1c7c70cfa778ab849b087"
        );

        let val: Value = serde_cbor::from_slice(&hex_data).unwrap();
        let key = COSEKey::try_from(&val).unwrap();

        assert_eq!(key.type_, COSEAlgorithm::ES384);
        match &key.key {
            COSEKeyType::EC_EC2(pkey) => {
                assert_eq!(pkey.curve, ECDSACurve::SECP384R1);
            }
            _ => panic!("Key should be parsed EC2 key"),
        }
    }

    #[test]
    fn cbor_key_with_truncated_coordinate_rejected() {
        // x is 31 bytes, one short for P-256.
        let hex_data = hex!(
                "A5"
                "01 02"
                "03 26"
                "20 01"
                "21 58 1f   eda5a12577c2bae829437fe338701a10aaa375e1bb5b5de108de439c0855"
                           "1d"
                "22 58 20   1e52ed75701163f7f9e40ddf9f341b3dc9ba860af7e0ca7ca7e9eecd0084d19c"
        );
        let val: Value = serde_cbor::from_slice(&hex_data).unwrap();
        assert!(matches!(
            COSEKey::try_from(&val),
            Err(WebauthnError::COSEKeyECDSAXYInvalid)
        ));
    }

    #[test]
    fn cbor_key_missing_kty_rejected() {
        let hex_data = hex!(
                "A1"
                "03 26"
        );
        let val: Value = serde_cbor::from_slice(&hex_data).unwrap();
        assert!(matches!(
            COSEKey::try_from(&val),
            Err(WebauthnError::COSEKeyInvalidCBORValue)
        ));
    }

    #[test]
    fn alg_identifier_mapping() {
        assert_eq!(
            COSEAlgorithm::try_from(-7).unwrap().digest().type_(),
            nid::Nid::SHA256
        );
        assert_eq!(
            COSEAlgorithm::try_from(-36).unwrap().digest().type_(),
            nid::Nid::SHA512
        );
        assert_eq!(
            COSEAlgorithm::try_from(-257).unwrap().digest().type_(),
            nid::Nid::SHA256
        );
        assert!(COSEAlgorithm::try_from(9999).is_err());
    }

    fn generate(curve: ECDSACurve) -> ec::EcKey<pkey::Private> {
        let group = ec::EcGroup::from_curve_name(curve.to_openssl_nid()).unwrap();
        ec::EcKey::generate(&group).unwrap()
    }

    #[test]
    fn ec_raw_der_round_trip() {
        for curve in [
            ECDSACurve::SECP256R1,
            ECDSACurve::SECP384R1,
            ECDSACurve::SECP521R1,
            ECDSACurve::SECP256K1,
        ] {
            let ec_key = generate(curve);
            let mut ctx = bn::BigNumContext::new().unwrap();
            let raw = ec_key
                .public_key()
                .to_bytes(
                    ec_key.group(),
                    ec::PointConversionForm::UNCOMPRESSED,
                    &mut ctx,
                )
                .unwrap();

            let key = EcdsaPublicKey::from_raw(&raw, curve).unwrap();
            let der = key.to_der().unwrap();
            let back = EcdsaPublicKey::from_der(&der).unwrap();
            assert_eq!(back.to_raw(false).unwrap(), raw);

            // The compressed form re-expands to the same point.
            let compressed = key.to_raw(true).unwrap();
            assert_eq!(compressed.len(), 1 + curve.coordinate_size());
            let decompressed = EcdsaPublicKey::from_raw(&compressed, curve).unwrap();
            assert_eq!(decompressed.to_raw(false).unwrap(), raw);
        }
    }

    #[test]
    fn ec_der_pem_round_trip() {
        for curve in [ECDSACurve::SECP256R1, ECDSACurve::SECP384R1] {
            let ec_key = generate(curve);
            let der = pkey::PKey::from_ec_key(ec_key)
                .unwrap()
                .public_key_to_der()
                .unwrap();
            let pem = EcdsaPublicKey::from_der(&der).unwrap().to_pem().unwrap();
            let back = EcdsaPublicKey::from_pem(&pem).unwrap().to_der().unwrap();
            assert_eq!(back, der);
        }
    }

    #[test]
    fn ec_sign_verify() {
        let ec_key = generate(ECDSACurve::SECP256R1);
        let pkey = pkey::PKey::from_ec_key(ec_key).unwrap();
        let private = EcdsaPrivateKey::from_der(&pkey.private_key_to_pkcs8().unwrap()).unwrap();
        let public = private.public_key().unwrap();

        let data = b"the quick brown fox";
        let sig = private.sign(hash::MessageDigest::sha256(), data).unwrap();
        assert!(public
            .verify(hash::MessageDigest::sha256(), &sig, data)
            .unwrap());
        assert!(!public
            .verify(hash::MessageDigest::sha256(), &sig, b"tampered")
            .unwrap());
        // Garbage that is not even DER is a clean false, not an error.
        assert!(!public
            .verify(hash::MessageDigest::sha256(), &[0xde, 0xad], data)
            .unwrap());
    }

    #[test]
    fn compressed_point_prefix_parity() {
        let hex_data = hex!(
                "A5"
                "01 02"
                "03 26"
                "20 01"
                "21 58 20   65eda5a12577c2bae829437fe338701a10aaa375e1bb5b5de108de439c08551d"
                "22 58 20   1e52ed75701163f7f9e40ddf9f341b3dc9ba860af7e0ca7ca7e9eecd0084d19c"
        );
        let val: Value = serde_cbor::from_slice(&hex_data).unwrap();
        let key = COSEKey::try_from(&val).unwrap();

        // y ends 0x9c, even, so the prefix must be 0x02, and openssl must
        // agree with the shortcut when it re-derives the full point.
        let compressed = key.get_alg_key_ecc_x962_compressed().unwrap();
        assert_eq!(compressed[0], 0x02);
        let uncompressed = key.get_alg_key_ecc_x962_raw().unwrap();
        let expanded = EcdsaPublicKey::from_raw(&compressed, ECDSACurve::SECP256R1)
            .unwrap()
            .to_raw(false)
            .unwrap();
        assert_eq!(expanded, uncompressed);
    }

    #[test]
    fn hmac_verify_truncated_and_full() {
        let k = b"0123456789abcdef0123456789abcdef";
        let data = b"authenticator data";
        let mac = hmac(hash::MessageDigest::sha256(), k, data).unwrap();

        let full_key = COSEKey {
            type_: COSEAlgorithm::HS256,
            key: COSEKeyType::Symmetric(COSESymmetricKey {
                k: k.to_vec().into(),
            }),
        };
        assert_eq!(
            full_key.verify_signature(&mac, data),
            SignatureVerification::Valid
        );
        let mut bad = mac.clone();
        bad[0] ^= 0x01;
        assert_eq!(
            full_key.verify_signature(&bad, data),
            SignatureVerification::Invalid
        );

        let trunc_key = COSEKey {
            type_: COSEAlgorithm::HS256_64,
            key: COSEKeyType::Symmetric(COSESymmetricKey {
                k: k.to_vec().into(),
            }),
        };
        assert_eq!(
            trunc_key.verify_signature(&mac[..8], data),
            SignatureVerification::Valid
        );
        // Full length macs are not accepted for the truncated algorithm.
        assert_eq!(
            trunc_key.verify_signature(&mac, data),
            SignatureVerification::Invalid
        );
    }

    #[test]
    fn hmac_alg_on_ec_key_is_unsupported() {
        let hex_data = hex!(
                "A5"
                "01 02"
                "03 26"
                "20 01"
                "21 58 20   65eda5a12577c2bae829437fe338701a10aaa375e1bb5b5de108de439c08551d"
                "22 58 20   1e52ed75701163f7f9e40ddf9f341b3dc9ba860af7e0ca7ca7e9eecd0084d19c"
        );
        let val: Value = serde_cbor::from_slice(&hex_data).unwrap();
        let mut key = COSEKey::try_from(&val).unwrap();
        key.type_ = COSEAlgorithm::HS256;
        assert_eq!(
            key.verify_signature(&[0u8; 32], b"data"),
            SignatureVerification::UnsupportedAlgorithm
        );
    }
}
