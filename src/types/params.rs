// Consensus parameters - the set governed by stake-weighted change-params actions
//
// A ParameterSet is a plain value: changing a parameter means building a new
// set and scheduling it, never mutating the active one in place.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of fields in a ParameterSet
pub const PARAMETER_COUNT: usize = 23;

/// Two-character network identifier (e.g. "tc")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NetworkId(String);

impl NetworkId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for NetworkId {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(ParameterError::InvalidNetworkId(s.to_string()));
        }
        Ok(NetworkId(s.to_string()))
    }
}

impl TryFrom<String> for NetworkId {
    type Error = ParameterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NetworkId> for String {
    fn from(id: NetworkId) -> Self {
        id.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Network-wide consensus parameters.
///
/// Field order is part of the wire format: it is the order in which the set is
/// encoded inside a change-params action and therefore inside the message that
/// stakeholders sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub max_extra_data_size: u64,
    pub max_asset_scheme_metadata_size: u64,
    pub max_transfer_metadata_size: u64,
    pub max_text_content_size: u64,
    pub network_id: NetworkId,
    pub min_pay_cost: u64,
    pub min_set_regular_key_cost: u64,
    pub min_create_shard_cost: u64,
    pub min_set_shard_owners_cost: u64,
    pub min_set_shard_users_cost: u64,
    pub min_wrap_ccc_cost: u64,
    pub min_custom_cost: u64,
    pub min_store_cost: u64,
    pub min_remove_cost: u64,
    pub min_mint_asset_cost: u64,
    pub min_transfer_asset_cost: u64,
    pub min_change_asset_scheme_cost: u64,
    pub min_increase_asset_supply_cost: u64,
    pub min_compose_asset_cost: u64,
    pub min_decompose_asset_cost: u64,
    pub min_unwrap_ccc_cost: u64,
    pub max_body_size: u64,
    pub snapshot_period: u64,
}

impl ParameterSet {
    /// Reference configuration used by the solo scheme
    pub fn reference() -> Self {
        Self {
            max_extra_data_size: 0x20,
            max_asset_scheme_metadata_size: 0x0400,
            max_transfer_metadata_size: 0x0100,
            max_text_content_size: 0x0200,
            network_id: NetworkId("tc".to_string()),
            min_pay_cost: 10,
            min_set_regular_key_cost: 10,
            min_create_shard_cost: 10,
            min_set_shard_owners_cost: 10,
            min_set_shard_users_cost: 10,
            min_wrap_ccc_cost: 10,
            min_custom_cost: 10,
            min_store_cost: 10,
            min_remove_cost: 10,
            min_mint_asset_cost: 10,
            min_transfer_asset_cost: 10,
            min_change_asset_scheme_cost: 10,
            min_increase_asset_supply_cost: 10,
            min_compose_asset_cost: 10,
            min_decompose_asset_cost: 10,
            min_unwrap_ccc_cost: 10,
            max_body_size: 4_194_304,
            snapshot_period: 16_384,
        }
    }

    /// Well-formedness checks applied to genesis sets and governance candidates
    pub fn verify(&self) -> Result<(), ParameterError> {
        if self.max_body_size == 0 {
            return Err(ParameterError::ZeroValue("max_body_size"));
        }
        if self.snapshot_period == 0 {
            return Err(ParameterError::ZeroValue("snapshot_period"));
        }
        Ok(())
    }

    /// All fields as (name, rendered value), in wire order
    pub fn fields(&self) -> [(&'static str, String); PARAMETER_COUNT] {
        [
            ("maxExtraDataSize", self.max_extra_data_size.to_string()),
            ("maxAssetSchemeMetadataSize", self.max_asset_scheme_metadata_size.to_string()),
            ("maxTransferMetadataSize", self.max_transfer_metadata_size.to_string()),
            ("maxTextContentSize", self.max_text_content_size.to_string()),
            ("networkID", self.network_id.to_string()),
            ("minPayCost", self.min_pay_cost.to_string()),
            ("minSetRegularKeyCost", self.min_set_regular_key_cost.to_string()),
            ("minCreateShardCost", self.min_create_shard_cost.to_string()),
            ("minSetShardOwnersCost", self.min_set_shard_owners_cost.to_string()),
            ("minSetShardUsersCost", self.min_set_shard_users_cost.to_string()),
            ("minWrapCccCost", self.min_wrap_ccc_cost.to_string()),
            ("minCustomCost", self.min_custom_cost.to_string()),
            ("minStoreCost", self.min_store_cost.to_string()),
            ("minRemoveCost", self.min_remove_cost.to_string()),
            ("minMintAssetCost", self.min_mint_asset_cost.to_string()),
            ("minTransferAssetCost", self.min_transfer_asset_cost.to_string()),
            ("minChangeAssetSchemeCost", self.min_change_asset_scheme_cost.to_string()),
            ("minIncreaseAssetSupplyCost", self.min_increase_asset_supply_cost.to_string()),
            ("minComposeAssetCost", self.min_compose_asset_cost.to_string()),
            ("minDecomposeAssetCost", self.min_decompose_asset_cost.to_string()),
            ("minUnwrapCccCost", self.min_unwrap_ccc_cost.to_string()),
            ("maxBodySize", self.max_body_size.to_string()),
            ("snapshotPeriod", self.snapshot_period.to_string()),
        ]
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::reference()
    }
}

/// Erreurs de paramètres
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParameterError {
    #[error("Invalid network id {0:?}: expected two alphanumeric characters")]
    InvalidNetworkId(String),

    #[error("Parameter {0} must be non-zero")]
    ZeroValue(&'static str),
}
