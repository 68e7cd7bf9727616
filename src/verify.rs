//! Verifier (spec §4.5).
//!
//! Algorithm-dispatched cryptographic check over the base string using the
//! retrieved key. A pure function of its inputs; no I/O, no side effects.

use base64::Engine;
use ed25519_dalek::{Signature as Ed25519Signature, Verifier as _, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::pss::Pss;
use rsa::RsaPublicKey;
use sha2::{Digest, Sha256};

/// Outcome of a verification attempt (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Valid,
    Invalid,
}

/// Algorithms accepted by this gateway (spec §3, §4.5).
pub enum Algorithm {
    Ed25519,
    RsaPssSha256,
}

impl Algorithm {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "ed25519" => Some(Algorithm::Ed25519),
            "rsa-pss-sha256" => Some(Algorithm::RsaPssSha256),
            _ => None,
        }
    }
}

/// Verify `signature_bytes` over `base_string` using `public_key`, dispatched
/// on `algorithm`. Callers must have already rejected unsupported algorithm
/// names via [`Algorithm::parse`] (spec §4.6 step 9).
pub fn verify(
    algorithm: &Algorithm,
    public_key: &str,
    base_string: &str,
    signature_bytes: &[u8],
) -> VerifyOutcome {
    match algorithm {
        Algorithm::Ed25519 => verify_ed25519(public_key, base_string, signature_bytes),
        Algorithm::RsaPssSha256 => verify_rsa_pss_sha256(public_key, base_string, signature_bytes),
    }
}

fn verify_ed25519(public_key_b64: &str, base_string: &str, signature_bytes: &[u8]) -> VerifyOutcome {
    let key_bytes = match base64::engine::general_purpose::STANDARD.decode(public_key_b64) {
        Ok(bytes) => bytes,
        Err(_) => return VerifyOutcome::Invalid,
    };
    let key_array: [u8; 32] = match key_bytes.try_into() {
        Ok(array) => array,
        Err(_) => return VerifyOutcome::Invalid,
    };
    let verifying_key = match VerifyingKey::from_bytes(&key_array) {
        Ok(key) => key,
        Err(_) => return VerifyOutcome::Invalid,
    };

    let sig_array: [u8; 64] = match signature_bytes.try_into() {
        Ok(array) => array,
        Err(_) => return VerifyOutcome::Invalid,
    };
    let signature = Ed25519Signature::from_bytes(&sig_array);

    match verifying_key.verify(base_string.as_bytes(), &signature) {
        Ok(()) => VerifyOutcome::Valid,
        Err(_) => VerifyOutcome::Invalid,
    }
}

fn verify_rsa_pss_sha256(public_key_pem: &str, base_string: &str, signature_bytes: &[u8]) -> VerifyOutcome {
    let public_key = match RsaPublicKey::from_public_key_pem(public_key_pem) {
        Ok(key) => key,
        Err(_) => return VerifyOutcome::Invalid,
    };

    let salt_len = max_pss_salt_len(&public_key);
    let digest = Sha256::digest(base_string.as_bytes());

    let scheme = Pss::new_with_salt::<Sha256>(salt_len);
    match public_key.verify(scheme, &digest, signature_bytes) {
        Ok(()) => VerifyOutcome::Valid,
        Err(_) => VerifyOutcome::Invalid,
    }
}

/// `ceil((keybits - 1) / 8) - hLen - 2`, the maximum PSS salt length for a
/// given modulus and SHA-256 (hLen = 32) — common signer default (spec §4.5).
fn max_pss_salt_len(public_key: &RsaPublicKey) -> usize {
    use rsa::traits::PublicKeyParts;
    let key_bits = public_key.n().bits();
    let em_len = (key_bits - 1).div_ceil(8);
    em_len.saturating_sub(32).saturating_sub(2)
}
