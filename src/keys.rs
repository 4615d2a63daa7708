use std::fs;
use std::path::Path;

use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signature, Signer, Verifier};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{ChainError, ChainResult};

/// Version byte leading every derived address.
const ADDRESS_VERSION: u8 = 0x17;
/// How much of the key digest an address keeps.
const ADDRESS_DIGEST_LEN: usize = 20;
/// Trailing checksum bytes of an address.
const ADDRESS_CHECKSUM_LEN: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredKeypair {
    pub public_key: String,
    pub secret_key: String,
}

pub fn generate_keypair() -> Keypair {
    Keypair::generate(&mut OsRng)
}

pub fn load_or_generate_keypair(path: &Path) -> ChainResult<Keypair> {
    if path.exists() {
        load_keypair(path)
    } else {
        let keypair = generate_keypair();
        save_keypair(path, &keypair)?;
        Ok(keypair)
    }
}

pub fn save_keypair(path: &Path, keypair: &Keypair) -> ChainResult<()> {
    let stored = StoredKeypair {
        public_key: hex::encode(keypair.public.to_bytes()),
        secret_key: hex::encode(keypair.secret.to_bytes()),
    };
    let encoded = toml::to_string_pretty(&stored)
        .map_err(|err| ChainError::Config(format!("failed to encode keypair: {err}")))?;
    fs::create_dir_all(path.parent().unwrap_or_else(|| Path::new(".")))?;
    fs::write(path, encoded)?;
    Ok(())
}

pub fn load_keypair(path: &Path) -> ChainResult<Keypair> {
    let raw = fs::read_to_string(path)?;
    let stored: StoredKeypair = toml::from_str(&raw)
        .map_err(|err| ChainError::Config(format!("failed to decode keypair: {err}")))?;
    let secret_bytes = hex::decode(stored.secret_key)
        .map_err(|err| ChainError::Config(format!("invalid secret key encoding: {err}")))?;
    let public_bytes = hex::decode(stored.public_key)
        .map_err(|err| ChainError::Config(format!("invalid public key encoding: {err}")))?;
    let secret = SecretKey::from_bytes(&secret_bytes)
        .map_err(|err| ChainError::Config(format!("invalid secret key bytes: {err}")))?;
    let public = PublicKey::from_bytes(&public_bytes)
        .map_err(|err| ChainError::Config(format!("invalid public key bytes: {err}")))?;
    Ok(Keypair { secret, public })
}

pub fn sign_message(keypair: &Keypair, message: &[u8]) -> Signature {
    keypair.sign(message)
}

pub fn verify_signature(
    public_key: &PublicKey,
    message: &[u8],
    signature: &Signature,
) -> ChainResult<()> {
    public_key
        .verify(message, signature)
        .map_err(|err| ChainError::Crypto(format!("signature verification failed: {err}")))
}

/// Derives the ledger address for a public key: a version byte, the first
/// twenty bytes of the key's SHA-256 digest, and a four-byte checksum over
/// both, rendered as lowercase hex. The derivation is stable and part of the
/// external contract.
pub fn address_from_public_key(public_key: &PublicKey) -> String {
    address_from_key_bytes(public_key.as_bytes())
}

pub fn address_from_key_bytes(key_bytes: &[u8]) -> String {
    let digest = Sha256::digest(key_bytes);
    let mut payload = Vec::with_capacity(1 + ADDRESS_DIGEST_LEN + ADDRESS_CHECKSUM_LEN);
    payload.push(ADDRESS_VERSION);
    payload.extend_from_slice(&digest[..ADDRESS_DIGEST_LEN]);
    let checksum = Sha256::digest(&payload);
    payload.extend_from_slice(&checksum[..ADDRESS_CHECKSUM_LEN]);
    hex::encode(payload)
}

/// Checks the version byte and checksum of a derived address.
pub fn validate_address(address: &str) -> ChainResult<()> {
    let bytes = hex::decode(address)
        .map_err(|err| ChainError::Config(format!("invalid address encoding: {err}")))?;
    if bytes.len() != 1 + ADDRESS_DIGEST_LEN + ADDRESS_CHECKSUM_LEN {
        return Err(ChainError::Config(format!(
            "invalid address length {}",
            bytes.len()
        )));
    }
    if bytes[0] != ADDRESS_VERSION {
        return Err(ChainError::Config(format!(
            "unsupported address version {:#04x}",
            bytes[0]
        )));
    }
    let (payload, checksum) = bytes.split_at(1 + ADDRESS_DIGEST_LEN);
    let expected = Sha256::digest(payload);
    if checksum != &expected[..ADDRESS_CHECKSUM_LEN] {
        return Err(ChainError::Config("address checksum mismatch".into()));
    }
    Ok(())
}

pub fn public_key_from_hex(data: &str) -> ChainResult<PublicKey> {
    let bytes = hex::decode(data)
        .map_err(|err| ChainError::Config(format!("invalid public key encoding: {err}")))?;
    PublicKey::from_bytes(&bytes)
        .map_err(|err| ChainError::Config(format!("invalid public key bytes: {err}")))
}

pub fn public_key_to_hex(public_key: &PublicKey) -> String {
    hex::encode(public_key.to_bytes())
}

pub fn signature_from_hex(data: &str) -> ChainResult<Signature> {
    let bytes = hex::decode(data)
        .map_err(|err| ChainError::Config(format!("invalid signature encoding: {err}")))?;
    Signature::from_bytes(&bytes)
        .map_err(|err| ChainError::Config(format!("invalid signature bytes: {err}")))
}

pub fn signature_to_hex(signature: &Signature) -> String {
    hex::encode(signature.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn keypair_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys/node.toml");
        let keypair = load_or_generate_keypair(&path).unwrap();
        let reloaded = load_or_generate_keypair(&path).unwrap();
        assert_eq!(keypair.public.to_bytes(), reloaded.public.to_bytes());
    }

    #[test]
    fn public_key_hex_round_trips() {
        let keypair = generate_keypair();
        let hex_key = public_key_to_hex(&keypair.public);
        let decoded = public_key_from_hex(&hex_key).unwrap();
        assert_eq!(decoded.to_bytes(), keypair.public.to_bytes());
    }

    #[test]
    fn signatures_verify_against_signer() {
        let keypair = generate_keypair();
        let signature = sign_message(&keypair, b"checkpoint");
        verify_signature(&keypair.public, b"checkpoint", &signature).unwrap();
        assert!(verify_signature(&keypair.public, b"tampered", &signature).is_err());
    }

    #[test]
    fn derived_addresses_validate() {
        let keypair = generate_keypair();
        let address = address_from_public_key(&keypair.public);
        validate_address(&address).unwrap();

        let other = address_from_public_key(&generate_keypair().public);
        assert_ne!(address, other);
    }

    #[test]
    fn corrupted_address_is_rejected() {
        let keypair = generate_keypair();
        let address = address_from_public_key(&keypair.public);
        let mut bytes = hex::decode(&address).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(validate_address(&hex::encode(bytes)).is_err());
    }
}
