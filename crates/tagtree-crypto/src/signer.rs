use serde::{Deserialize, Serialize};
use tagtree_types::LogId;

/// Ed25519 signing key (private). Held only by the container that created the log.
pub struct SigningKey(ed25519_dalek::SigningKey);

/// Ed25519 verifying key (public). Its bytes are the [`LogId`].
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey(ed25519_dalek::VerifyingKey);

/// Ed25519 signature over an entry's chain hash.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "signature_serde")] ed25519_dalek::Signature);

impl SigningKey {
    /// Generate a new random signing key.
    pub fn generate() -> Self {
        let mut csprng = rand::thread_rng();
        Self(ed25519_dalek::SigningKey::generate(&mut csprng))
    }

    /// Create from raw 32-byte secret.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&bytes))
    }

    /// The corresponding public verifying key.
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }

    /// The public identifier of the log owned by this key.
    pub fn log_id(&self) -> LogId {
        self.verifying_key().to_log_id()
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        use ed25519_dalek::Signer;
        Signature(self.0.sign(message))
    }

    /// Raw secret key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }
}

impl VerifyingKey {
    /// Verify a signature on a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), SignatureError> {
        use ed25519_dalek::Verifier;
        self.0
            .verify(message, &signature.0)
            .map_err(|_| SignatureError::InvalidSignature)
    }

    /// The log identifier for this public key.
    pub fn to_log_id(&self) -> LogId {
        LogId::from_bytes(self.0.to_bytes())
    }

    /// Recover the verifying key from a log identifier.
    ///
    /// Fails if the identifier is not a valid Ed25519 point.
    pub fn from_log_id(id: &LogId) -> Result<Self, SignatureError> {
        let key = ed25519_dalek::VerifyingKey::from_bytes(id.as_bytes())
            .map_err(|_| SignatureError::InvalidKey)?;
        Ok(Self(key))
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey(<redacted>)")
    }
}

impl std::fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VerifyingKey({})", self.to_log_id().short_id())
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Signature({}...)",
            hex::encode(&self.0.to_bytes()[..8])
        )
    }
}

/// Errors from signing operations.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid key")]
    InvalidKey,
}

mod signature_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(sig: &ed25519_dalek::Signature, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&sig.to_bytes())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<ed25519_dalek::Signature, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 64-byte signature"))?;
        Ok(ed25519_dalek::Signature::from_bytes(&arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntryChain;

    #[test]
    fn log_owner_signs_chain_hashes() {
        let owner = SigningKey::generate();
        let hash = EntryChain::compute_hash(None, 0, b"header");
        let sig = owner.sign(&hash);

        let verifier = VerifyingKey::from_log_id(&owner.log_id()).unwrap();
        assert_eq!(verifier.verify(&hash, &sig), Ok(()));

        let next = EntryChain::compute_hash(Some(hash), 1, b"header");
        assert_eq!(verifier.verify(&next, &sig), Err(SignatureError::InvalidSignature));
    }

    #[test]
    fn another_logs_key_cannot_sign_for_it() {
        let owner = SigningKey::generate();
        let intruder = SigningKey::generate();
        let hash = EntryChain::compute_hash(None, 0, b"entry");

        let verifier = VerifyingKey::from_log_id(&owner.log_id()).unwrap();
        assert!(verifier.verify(&hash, &intruder.sign(&hash)).is_err());
        assert_ne!(owner.log_id(), intruder.log_id());
    }

    #[test]
    fn stored_secret_restores_the_same_log() {
        let key = SigningKey::generate();
        let restored = SigningKey::from_bytes(*key.as_bytes());
        assert_eq!(restored.log_id(), key.log_id());
        assert_eq!(key.verifying_key().to_log_id(), key.log_id());
    }

    #[test]
    fn off_curve_ids_have_no_verifier() {
        let rejected = (0u8..=255)
            .map(|b| LogId::from_bytes([b; 32]))
            .find(|id| VerifyingKey::from_log_id(id).is_err());
        assert!(rejected.is_some());
    }

    #[test]
    fn signatures_survive_entry_encoding() {
        let sig = SigningKey::generate().sign(b"payload");
        let bin = bincode::serialize(&sig).unwrap();
        assert_eq!(bincode::deserialize::<Signature>(&bin).unwrap(), sig);

        let short = bincode::serialize(&vec![0u8; 10]).unwrap();
        assert!(bincode::deserialize::<Signature>(&short).is_err());
    }

    #[test]
    fn debug_output_names_the_log_not_the_secret() {
        let key = SigningKey::generate();
        assert_eq!(format!("{key:?}"), "SigningKey(<redacted>)");
        let shown = format!("{:?}", key.verifying_key());
        assert!(shown.contains(&key.log_id().short_id()));
    }
}
