//! A minimal, in-memory webauthn configuration provider. It's only really
//! useful for demo sites, testing and as an example/reference
//! implementation of the WebauthnConfig trait. Production deployments
//! should implement WebauthnConfig on their own site configuration type.

use crate::WebauthnConfig;

/// A WebauthnConfig implementation that holds its relying party origin and
/// id as plain strings and accepts the library defaults for everything
/// else.
pub struct WebauthnEphemeralConfig {
    rp_origin: String,
    rp_id: String,
    attestation_required: bool,
}

impl std::fmt::Debug for WebauthnEphemeralConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "WebauthnEphemeralConfig{{ rp_origin: {:?}, rp_id: {:?} }}",
            self.rp_origin, self.rp_id
        )
    }
}

impl WebauthnConfig for WebauthnEphemeralConfig {
    /// Retrieve the relying party origin. See the trait documentation for more.
    fn get_origin(&self) -> &str {
        &self.rp_origin
    }

    /// Returns the relying party id. See the trait documentation for more.
    fn get_relying_party_id(&self) -> &str {
        &self.rp_id
    }

    /// Whether registrations must present a verifiable attestation.
    fn get_attestation_required(&self) -> bool {
        self.attestation_required
    }
}

impl WebauthnEphemeralConfig {
    /// Create a new ephemeral config from a relying party origin (scheme,
    /// host and port, e.g. `https://idm.example.com:8443`) and relying
    /// party id (the effective domain, e.g. `idm.example.com`).
    pub fn new(rp_origin: &str, rp_id: &str) -> Self {
        WebauthnEphemeralConfig {
            rp_origin: rp_origin.to_string(),
            rp_id: rp_id.to_string(),
            attestation_required: false,
        }
    }

    /// Demand verifiable attestation at registration. Credentials whose
    /// attestation is absent or only structurally validated will be
    /// rejected.
    pub fn require_attestation(mut self) -> Self {
        self.attestation_required = true;
        self
    }
}
