use std::fmt;

use ed25519_dalek::PublicKey;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{ChainError, ChainResult};
use crate::keys;

/// Peer identity: an ed25519 public key. Renders as lowercase hex; derived
/// views (address, prefix) are recomputed on demand so the value stays
/// trivially copyable.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id([u8; 32]);

impl Id {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self(public_key.to_bytes())
    }

    pub fn from_hex(data: &str) -> ChainResult<Self> {
        let bytes = hex::decode(data)
            .map_err(|err| ChainError::Config(format!("invalid id encoding: {err}")))?;
        let bytes: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ChainError::Config(format!("invalid id length {}", data.len() / 2)))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Hex of the first twenty key bytes; used as a compact peer label.
    pub fn prefix(&self) -> String {
        hex::encode(&self.0[..20])
    }

    pub fn address(&self) -> String {
        keys::address_from_key_bytes(&self.0)
    }

    pub fn public_key(&self) -> ChainResult<PublicKey> {
        PublicKey::from_bytes(&self.0)
            .map_err(|err| ChainError::Crypto(format!("invalid public key bytes: {err}")))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.prefix())
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = Id;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a lowercase hex ed25519 public key")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Id, E> {
                Id::from_hex(value).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(IdVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_keypair;

    #[test]
    fn hex_round_trips() {
        let id = Id::from_public_key(&generate_keypair().public);
        let restored = Id::from_hex(&id.hex()).unwrap();
        assert_eq!(id, restored);
    }

    #[test]
    fn prefix_is_twenty_bytes() {
        let id = Id::from_public_key(&generate_keypair().public);
        assert_eq!(id.prefix().len(), 40);
        assert!(id.hex().starts_with(&id.prefix()));
    }

    #[test]
    fn ordering_matches_hex_ordering(){
        let a = Id::from_bytes([0u8; 32]);
        let b = Id::from_bytes([1u8; 32]);
        assert!(a < b);
        assert!(a.hex() < b.hex());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Id::from_hex("abcd").is_err());
    }
}
