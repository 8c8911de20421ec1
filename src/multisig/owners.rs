//! Owner registry
//!
//! The immutable set of principals allowed to operate a vault, plus the
//! quorum of confirmations a transaction needs before it may execute.

use crate::crypto::{base58check, hash160};
use crate::multisig::confirmation::MAX_OWNERS;
use crate::multisig::wallet::MultisigError;
use crate::storage::StorageError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// P2SH version byte, gives vault addresses a leading '3'
const VAULT_ADDRESS_VERSION: u8 = 0x05;

/// A principal identifier (opaque to the vault, usually an address)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Owner(String);

impl Owner {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Owner {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Owner {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Owner {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Owner {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Construction-time configuration for a vault
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WalletConfig {
    /// Owner identifiers, in the order positions are assigned
    pub owners: Vec<String>,
    /// Confirmations required before execution (M in M-of-N)
    pub quorum: usize,
    /// Optional human-readable label
    #[serde(default)]
    pub label: Option<String>,
}

impl WalletConfig {
    pub fn new(owners: Vec<String>, quorum: usize, label: Option<String>) -> Self {
        Self {
            owners,
            quorum,
            label,
        }
    }

    /// Read a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Immutable owner set and quorum threshold
#[derive(Clone, Debug)]
pub struct OwnerRegistry {
    owners: Vec<Owner>,
    positions: HashMap<Owner, usize>,
    quorum: usize,
}

impl OwnerRegistry {
    /// Create a registry, validating the owner list and quorum
    ///
    /// # Errors
    /// `InvalidConfig` if `owners` is empty, longer than [`MAX_OWNERS`],
    /// contains a blank or repeated identifier, or if `quorum` is outside
    /// `1..=owners.len()`.
    pub fn new(owners: Vec<Owner>, quorum: usize) -> Result<Self, MultisigError> {
        if owners.is_empty() {
            return Err(MultisigError::InvalidConfig("owners required".to_string()));
        }

        if quorum == 0 || quorum > owners.len() {
            return Err(MultisigError::InvalidConfig(format!(
                "invalid number of required confirmations: {} of {} owners",
                quorum,
                owners.len()
            )));
        }

        if owners.len() > MAX_OWNERS {
            return Err(MultisigError::InvalidConfig(format!(
                "too many owners: {} (max {})",
                owners.len(),
                MAX_OWNERS
            )));
        }

        let mut positions = HashMap::with_capacity(owners.len());
        for (position, owner) in owners.iter().enumerate() {
            if owner.as_str().trim().is_empty() {
                return Err(MultisigError::InvalidConfig("invalid owner".to_string()));
            }
            if positions.insert(owner.clone(), position).is_some() {
                return Err(MultisigError::InvalidConfig(format!(
                    "owner not unique: {}",
                    owner
                )));
            }
        }

        Ok(Self {
            owners,
            positions,
            quorum,
        })
    }

    /// Build a registry from a [`WalletConfig`]
    pub fn from_config(config: &WalletConfig) -> Result<Self, MultisigError> {
        let owners = config.owners.iter().map(|o| Owner::from(o.as_str())).collect();
        Self::new(owners, config.quorum)
    }

    pub fn is_owner(&self, principal: &str) -> bool {
        self.positions.contains_key(principal)
    }

    /// Position of an owner in the registry, if registered
    pub fn position_of(&self, principal: &str) -> Option<usize> {
        self.positions.get(principal).copied()
    }

    /// Owner at position `index`
    pub fn owner_at(&self, index: usize) -> Result<&Owner, MultisigError> {
        self.owners
            .get(index)
            .ok_or(MultisigError::IndexOutOfRange {
                index,
                len: self.owners.len(),
            })
    }

    /// All owners, in registration order
    pub fn owners(&self) -> &[Owner] {
        &self.owners
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Get description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.quorum, self.owners.len())
    }

    /// Deterministic P2SH-style vault address
    ///
    /// Address = Base58Check(0x05 || RIPEMD160(SHA256(quorum || sorted owners)))
    pub fn address(&self) -> String {
        let mut sorted: Vec<&str> = self.owners.iter().map(Owner::as_str).collect();
        sorted.sort_unstable();

        let mut script_data = (self.quorum as u64).to_be_bytes().to_vec();
        for owner in sorted {
            script_data.extend_from_slice(owner.as_bytes());
            // Separator keeps ["ab", "c"] and ["a", "bc"] apart
            script_data.push(0);
        }

        base58check(VAULT_ADDRESS_VERSION, &hash160(&script_data))
    }

    /// Configuration that reproduces this registry
    pub fn to_config(&self, label: Option<String>) -> WalletConfig {
        WalletConfig {
            owners: self.owners.iter().map(|o| o.to_string()).collect(),
            quorum: self.quorum,
            label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owners(ids: &[&str]) -> Vec<Owner> {
        ids.iter().map(|id| Owner::from(*id)).collect()
    }

    #[test]
    fn test_registry_creation() {
        let registry = OwnerRegistry::new(owners(&["alice", "bob", "carol"]), 2).unwrap();

        assert_eq!(registry.quorum(), 2);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.description(), "2-of-3");
        assert_eq!(
            registry.owners(),
            &owners(&["alice", "bob", "carol"])[..]
        );
    }

    #[test]
    fn test_single_owner_allowed() {
        let registry = OwnerRegistry::new(owners(&["solo"]), 1).unwrap();
        assert_eq!(registry.description(), "1-of-1");
    }

    #[test]
    fn test_registry_validation() {
        // No owners
        assert!(matches!(
            OwnerRegistry::new(vec![], 1),
            Err(MultisigError::InvalidConfig(_))
        ));

        // Zero quorum
        assert!(matches!(
            OwnerRegistry::new(owners(&["a", "b"]), 0),
            Err(MultisigError::InvalidConfig(_))
        ));

        // Quorum > owners
        assert!(matches!(
            OwnerRegistry::new(owners(&["a", "b", "c"]), 4),
            Err(MultisigError::InvalidConfig(_))
        ));

        // Duplicate owners
        assert!(matches!(
            OwnerRegistry::new(owners(&["a", "a"]), 2),
            Err(MultisigError::InvalidConfig(_))
        ));

        // Blank owner
        assert!(matches!(
            OwnerRegistry::new(owners(&["a", "  "]), 1),
            Err(MultisigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_owner_limit() {
        let ids: Vec<Owner> = (0..=MAX_OWNERS).map(|i| Owner::new(format!("o{}", i))).collect();
        assert!(matches!(
            OwnerRegistry::new(ids, 1),
            Err(MultisigError::InvalidConfig(_))
        ));

        let ids: Vec<Owner> = (0..MAX_OWNERS).map(|i| Owner::new(format!("o{}", i))).collect();
        assert!(OwnerRegistry::new(ids, MAX_OWNERS).is_ok());
    }

    #[test]
    fn test_lookup() {
        let registry = OwnerRegistry::new(owners(&["alice", "bob", "carol"]), 2).unwrap();

        assert!(registry.is_owner("bob"));
        assert!(!registry.is_owner("mallory"));
        assert_eq!(registry.position_of("carol"), Some(2));
        assert_eq!(registry.position_of("mallory"), None);

        assert_eq!(registry.owner_at(0).unwrap().as_str(), "alice");
        assert!(matches!(
            registry.owner_at(3),
            Err(MultisigError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_address_determinism() {
        let a = OwnerRegistry::new(owners(&["alice", "bob", "carol"]), 2).unwrap();
        let b = OwnerRegistry::new(owners(&["carol", "alice", "bob"]), 2).unwrap();
        let c = OwnerRegistry::new(owners(&["alice", "bob", "carol"]), 3).unwrap();

        assert!(a.address().starts_with('3'));
        // Owner order does not matter, quorum does
        assert_eq!(a.address(), b.address());
        assert_ne!(a.address(), c.address());
    }

    #[test]
    fn test_config_round_trip() {
        let config = WalletConfig::new(
            vec!["alice".to_string(), "bob".to_string()],
            2,
            Some("Treasury".to_string()),
        );
        let registry = OwnerRegistry::from_config(&config).unwrap();
        assert_eq!(registry.to_config(config.label.clone()), config);
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        fs::write(&path, r#"{"owners": ["alice", "bob", "carol"], "quorum": 2}"#).unwrap();

        let config = WalletConfig::from_file(&path).unwrap();
        assert_eq!(config.quorum, 2);
        assert_eq!(config.owners.len(), 3);
        assert!(config.label.is_none());
    }
}
