// Signature wrapper pour sérialisation
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// =============================================================================
// Domain separation constants for signatures
// =============================================================================
//
// Each signature context prepends its own prefix to the message before
// signing/verification, so a signature produced for one context never
// verifies in another.

/// Domain separator for transaction signatures
pub const DOMAIN_TRANSACTION: &[u8] = b"STAKECHAIN_TRANSACTION_V1:";

/// Domain separator for stakeholder signatures over a change-params message hash
pub const DOMAIN_CHANGE_PARAMS: &[u8] = b"STAKECHAIN_CHANGE_PARAMS_V1:";

/// Create a domain-separated message for signing
#[inline]
pub fn domain_separate(domain: &[u8], message: &[u8]) -> Vec<u8> {
    let mut separated = Vec::with_capacity(domain.len() + message.len());
    separated.extend_from_slice(domain);
    separated.extend_from_slice(message);
    separated
}

/// Wrapper pour signatures Ed25519 (64 bytes) avec sérialisation
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature64(pub [u8; 64]);

impl Signature64 {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn zero() -> Self {
        Self([0; 64])
    }
}

impl fmt::Debug for Signature64 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Signature64(0x{}..)", hex::encode(&self.0[..8]))
    }
}

impl From<[u8; 64]> for Signature64 {
    fn from(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }
}

impl From<ed25519_dalek::Signature> for Signature64 {
    fn from(signature: ed25519_dalek::Signature) -> Self {
        Self(signature.to_bytes())
    }
}

impl AsRef<[u8]> for Signature64 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// Hex in JSON, raw bytes in bincode
impl Serialize for Signature64 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Signature64 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = if deserializer.is_human_readable() {
            let text = String::deserialize(deserializer)?;
            let text = text.strip_prefix("0x").unwrap_or(&text);
            hex::decode(text).map_err(serde::de::Error::custom)?
        } else {
            <Vec<u8>>::deserialize(deserializer)?
        };
        if bytes.len() != 64 {
            return Err(serde::de::Error::custom("Signature must be 64 bytes"));
        }
        let mut arr = [0u8; 64];
        arr.copy_from_slice(&bytes);
        Ok(Signature64(arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_separate_prefixes_message() {
        let separated = domain_separate(DOMAIN_CHANGE_PARAMS, b"abc");
        assert!(separated.starts_with(DOMAIN_CHANGE_PARAMS));
        assert!(separated.ends_with(b"abc"));
        assert_eq!(separated.len(), DOMAIN_CHANGE_PARAMS.len() + 3);
    }

    #[test]
    fn test_signature_json_is_hex() {
        let sig = Signature64([7u8; 64]);
        let json = serde_json::to_string(&sig).unwrap();
        assert!(json.starts_with("\"0x0707"));
        let back: Signature64 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }

    #[test]
    fn test_signature_rejects_wrong_length() {
        let result: Result<Signature64, _> = serde_json::from_str("\"0x0102\"");
        assert!(result.is_err());
    }
}
