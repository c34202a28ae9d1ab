//! Typed authorization messages and a reference verifier.
//!
//! The message binds the authorized terms to the ledger's own identity and
//! a protocol version, so a signature can never be replayed against a
//! different ledger deployment or version. Cryptographic signature schemes
//! live behind the [`AuthorizationVerifier`] trait; the reference
//! implementation here is an attestation registry over a canonical digest.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use crate::collab::AuthorizationVerifier;
use crate::types::{AccountId, LoanId, LoanTerms, Nonce, Timestamp};

/// Version stamped into every structured message.
pub const PROTOCOL_VERSION: u32 = 2;

/// Structured instruction authorizing a rollover of `loan` into `terms`,
/// signed off-chain by the counterparty who is not submitting the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloverAuthorization {
    /// Identity of the ledger this authorization is bound to.
    pub ledger: String,
    pub version: u32,
    pub loan: LoanId,
    /// The replacement loan's full terms.
    pub terms: LoanTerms,
    pub nonce: Nonce,
    /// Latest instant at which the instruction may be submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<Timestamp>,
}

impl RolloverAuthorization {
    /// Canonical serialization the signature is computed over.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    fn digest(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.canonical_bytes().hash(&mut hasher);
        hasher.finish()
    }
}

/// Attestation registry standing in for a signature scheme: `sign` records
/// that an account attested to a message digest, `verify` checks membership.
#[derive(Debug, Default, Clone)]
pub struct MemoryVerifier {
    attestations: HashSet<(AccountId, u64)>,
}

impl MemoryVerifier {
    pub fn new() -> Self {
        MemoryVerifier::default()
    }

    pub fn sign(&mut self, signer: &AccountId, message: &RolloverAuthorization) {
        self.attestations.insert((signer.clone(), message.digest()));
    }
}

impl AuthorizationVerifier for MemoryVerifier {
    fn verify(&self, message: &RolloverAuthorization, claimed_signer: &AccountId) -> bool {
        self.attestations
            .contains(&(claimed_signer.clone(), message.digest()))
    }
}
