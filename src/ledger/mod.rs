//! Ledger client seam
//!
//! Tools talk to the Hedera network only through [`LedgerClient`]. Queries
//! are answered by the public mirror node. Transactions are built, signed
//! and submitted by the Hedera SDK with the operator key.

mod mirror;
mod sdk;

pub use mirror::MirrorNodeClient;
pub use sdk::{HederaSdkClient, HederaSdkConnector};

use crate::error::LedgerError;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

type Result<T> = std::result::Result<T, LedgerError>;

/// Tinybars per hbar
pub const TINYBARS_PER_HBAR: i64 = 100_000_000;

/// Entity id in `shard.realm.num` form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

pub type AccountId = EntityId;
pub type TokenId = EntityId;
pub type TopicId = EntityId;

impl FromStr for EntityId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || LedgerError::InvalidEntityId(s.to_string());
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }
        let parse = |p: &str| p.parse::<u64>().map_err(|_| invalid());
        Ok(Self {
            shard: parse(parts[0])?,
            realm: parse(parts[1])?,
            num: parse(parts[2])?,
        })
    }
}

impl TryFrom<String> for EntityId {
    type Error = LedgerError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

/// Hedera network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerNetwork {
    #[default]
    Testnet,
    Mainnet,
    Previewnet,
}

impl LedgerNetwork {
    /// Public mirror node REST endpoint
    pub fn mirror_node_url(&self) -> &'static str {
        match self {
            LedgerNetwork::Testnet => "https://testnet.mirrornode.hedera.com",
            LedgerNetwork::Mainnet => "https://mainnet-public.mirrornode.hedera.com",
            LedgerNetwork::Previewnet => "https://previewnet.mirrornode.hedera.com",
        }
    }
}

impl FromStr for LedgerNetwork {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "testnet" => Ok(LedgerNetwork::Testnet),
            "mainnet" => Ok(LedgerNetwork::Mainnet),
            "previewnet" => Ok(LedgerNetwork::Previewnet),
            other => Err(LedgerError::Unsupported(format!("unknown network '{}'", other))),
        }
    }
}

impl fmt::Display for LedgerNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LedgerNetwork::Testnet => "testnet",
            LedgerNetwork::Mainnet => "mainnet",
            LedgerNetwork::Previewnet => "previewnet",
        };
        f.write_str(name)
    }
}

/// Account that pays for and signs transactions
#[derive(Clone)]
pub struct Operator {
    pub account_id: AccountId,
    private_key: SecretString,
}

impl Operator {
    /// Build an operator from the configured strings.
    ///
    /// The key must be hex (raw or DER encoded), optionally `0x` prefixed.
    pub fn new(account_id: &str, private_key: &str) -> Result<Self> {
        let account_id = account_id.parse()?;

        let hex = private_key.trim();
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        if hex.len() < 64 || hex.len() % 2 != 0 {
            return Err(LedgerError::InvalidKey(format!(
                "expected at least 64 hex digits, got {}",
                hex.len()
            )));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(LedgerError::InvalidKey("key is not hex encoded".to_string()));
        }

        Ok(Self {
            account_id,
            private_key: SecretString::new(hex.to_lowercase()),
        })
    }

    /// Hex-encoded private key, for signing transports
    pub fn private_key_hex(&self) -> &str {
        self.private_key.expose_secret()
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("account_id", &self.account_id)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Read-only ledger queries
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerQuery {
    AccountInfo(AccountId),
    HbarBalance(AccountId),
    TokenBalances(AccountId),
    TokenInfo(TokenId),
    TopicMessages { topic_id: TopicId, limit: u32 },
}

/// Supply type of a fungible token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupplyType {
    Finite,
    #[default]
    Infinite,
}

/// Parameters of a new fungible token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FungibleTokenSpec {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub initial_supply: u64,
    pub supply_type: SupplyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_supply: Option<u64>,
    pub treasury_account_id: AccountId,
    pub supply_key: bool,
}

/// Parameters of a new non-fungible token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonFungibleTokenSpec {
    pub name: String,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_supply: Option<u64>,
    pub treasury_account_id: AccountId,
}

/// State-changing transactions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LedgerTransaction {
    CreateFungibleToken(FungibleTokenSpec),
    CreateNonFungibleToken(NonFungibleTokenSpec),
    #[serde(rename_all = "camelCase")]
    TransferHbar {
        from: AccountId,
        to: AccountId,
        tinybars: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        memo: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    CreateTopic {
        #[serde(skip_serializing_if = "Option::is_none")]
        memo: Option<String>,
        submit_key: bool,
    },
    #[serde(rename_all = "camelCase")]
    SubmitTopicMessage { topic_id: TopicId, message: String },
}

impl LedgerTransaction {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerTransaction::CreateFungibleToken(_) => "TokenCreate(fungible)",
            LedgerTransaction::CreateNonFungibleToken(_) => "TokenCreate(non-fungible)",
            LedgerTransaction::TransferHbar { .. } => "CryptoTransfer",
            LedgerTransaction::CreateTopic { .. } => "TopicCreate",
            LedgerTransaction::SubmitTopicMessage { .. } => "TopicMessageSubmit",
        }
    }
}

/// Receipt of a submitted transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub status: String,
    pub transaction_id: String,
    /// Created token or topic, when the transaction creates one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_sequence_number: Option<u64>,
}

/// Connection to a Hedera network
#[async_trait]
pub trait LedgerClient: Send + Sync {
    fn network(&self) -> LedgerNetwork;

    fn operator(&self) -> Option<&Operator>;

    /// Run a read-only query
    async fn query(&self, query: LedgerQuery) -> Result<Value>;

    /// Sign and submit a transaction, waiting for its receipt
    async fn submit(&self, transaction: LedgerTransaction) -> Result<TransactionReceipt>;

    /// Freeze a transaction without submitting it, returning its wire bytes
    async fn prepare(&self, transaction: LedgerTransaction) -> Result<Vec<u8>>;
}

/// Options for building a client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub network: LedgerNetwork,
    pub mirror_node_url: Option<String>,
    pub operator: Operator,
    pub timeout_secs: u64,
}

/// Builds ledger clients at plugin startup
pub trait LedgerConnector: Send + Sync {
    fn connect(&self, options: &ClientOptions) -> Result<Arc<dyn LedgerClient>>;
}
