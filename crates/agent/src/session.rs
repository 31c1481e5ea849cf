//! Session-key authority: ephemeral secp256k1 signers, the exact
//! authorization message users sign, and pure signature verification
//! by address recovery (EIP-191 personal messages, EIP-55 addresses).

use chrono::{DateTime, Utc};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

#[derive(Debug, Error)]
pub enum SessionAuthError {
    #[error("invalid hex in signature: {0}")]
    InvalidHex(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}

#[derive(Clone, Debug)]
pub struct SessionKeyMaterial {
    pub private_key: String,
    pub address: String,
}

/// Generate a fresh ephemeral session signer.
pub fn create_session_signer() -> SessionKeyMaterial {
    let signing_key = SigningKey::random(&mut rand::thread_rng());
    let verifying_key = signing_key.verifying_key();
    let public_bytes = verifying_key.to_encoded_point(false);

    SessionKeyMaterial {
        private_key: format!("0x{}", hex::encode(signing_key.to_bytes())),
        address: address_from_pubkey(public_bytes.as_bytes()),
    }
}

/// The exact text the user must sign to activate a session key. The
/// verification step regenerates this verbatim, so any edit here is a
/// protocol change.
pub fn generate_auth_message(
    session_address: &str,
    user_id: &str,
    daily_cap: &str,
    expires_at: DateTime<Utc>,
) -> String {
    format!(
        "Authorize Courier Session\n\
         Agent: courier-agent\n\
         User ID: {user_id}\n\
         Session Public Key: {session_address}\n\
         Permissions:\n\
         - transfer tokens\n\
         - max daily limit: {daily_cap}\n\
         - network: Base\n\
         - expiry: {}",
        expires_at.to_rfc3339()
    )
}

/// Recover the EIP-55 address that produced `signature_hex` over
/// `message` (65-byte r||s||v signature, personal-message hashing).
pub fn recover_address(message: &str, signature_hex: &str) -> Result<String, SessionAuthError> {
    let bytes = hex::decode(signature_hex.trim_start_matches("0x"))
        .map_err(|err| SessionAuthError::InvalidHex(err.to_string()))?;
    if bytes.len() != 65 {
        return Err(SessionAuthError::InvalidSignature(format!(
            "expected 65 bytes, got {}",
            bytes.len()
        )));
    }

    let v = bytes[64];
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let recovery_id = RecoveryId::from_byte(recovery_byte).ok_or_else(|| {
        SessionAuthError::InvalidSignature(format!("bad recovery byte {v}"))
    })?;
    let signature = Signature::from_slice(&bytes[..64])
        .map_err(|err| SessionAuthError::InvalidSignature(err.to_string()))?;

    let digest = personal_message_hash(message);
    let recovered = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
        .map_err(|err| SessionAuthError::InvalidSignature(err.to_string()))?;

    Ok(address_from_pubkey(recovered.to_encoded_point(false).as_bytes()))
}

/// Pure check: does the signature over `message` come from
/// `expected_address`?
pub fn verify_signature(
    message: &str,
    signature_hex: &str,
    expected_address: &str,
) -> Result<bool, SessionAuthError> {
    let recovered = recover_address(message, signature_hex)?;
    Ok(recovered.eq_ignore_ascii_case(expected_address))
}

/// Sign a personal message with a hex private key; returns the 65-byte
/// r||s||v signature hex (v in {27, 28}).
pub fn sign_message(private_key_hex: &str, message: &str) -> Result<String, SessionAuthError> {
    let key_bytes = hex::decode(private_key_hex.trim_start_matches("0x"))
        .map_err(|err| SessionAuthError::InvalidHex(err.to_string()))?;
    let signing_key = SigningKey::from_slice(&key_bytes)
        .map_err(|err| SessionAuthError::InvalidSignature(err.to_string()))?;

    let digest = personal_message_hash(message);
    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(&digest)
        .map_err(|err| SessionAuthError::InvalidSignature(err.to_string()))?;

    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(recovery_id.to_byte() + 27);
    Ok(format!("0x{}", hex::encode(bytes)))
}

/// keccak256("\x19Ethereum Signed Message:\n" + len + message)
fn personal_message_hash(message: &str) -> [u8; 32] {
    let prefixed =
        format!("\u{19}Ethereum Signed Message:\n{}{}", message.len(), message);
    keccak256(prefixed.as_bytes())
}

pub(crate) fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// Derive the EIP-55 checksum address from an uncompressed public key.
fn address_from_pubkey(pubkey_uncompressed: &[u8]) -> String {
    // Skip the 0x04 marker, hash the 64-byte x||y, take the last 20.
    let hash = keccak256(&pubkey_uncompressed[1..]);
    eip55_checksum(&hash[12..])
}

fn eip55_checksum(address_bytes: &[u8]) -> String {
    let hex_address: String = address_bytes.iter().map(|b| format!("{b:02x}")).collect();
    let hash = keccak256(hex_address.as_bytes());

    let mut checksummed = String::with_capacity(42);
    checksummed.push_str("0x");
    for (i, c) in hex_address.chars().enumerate() {
        let nibble = if i % 2 == 0 { hash[i / 2] >> 4 } else { hash[i / 2] & 0x0f };
        if nibble >= 8 {
            checksummed.push(c.to_ascii_uppercase());
        } else {
            checksummed.push(c);
        }
    }
    checksummed
}
