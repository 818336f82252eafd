//! Hedera SDK transport
//!
//! Builds, signs and submits transactions through the `hedera` SDK with
//! the configured operator. Queries go to the mirror node.

use super::{
    ClientOptions, EntityId, LedgerClient, LedgerConnector, LedgerNetwork, LedgerQuery,
    LedgerTransaction, MirrorNodeClient, Operator, SupplyType, TransactionReceipt,
};
use crate::error::LedgerError;
use async_trait::async_trait;
use hedera::{
    AnyTransaction, Client, Hbar, PrivateKey, TokenCreateTransaction, TokenSupplyType, TokenType,
    TopicCreateTransaction, TopicMessageSubmitTransaction, TransferTransaction,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

type Result<T> = std::result::Result<T, LedgerError>;

fn account_id(id: EntityId) -> hedera::AccountId {
    hedera::AccountId::new(id.shard, id.realm, id.num)
}

fn topic_id(id: EntityId) -> hedera::TopicId {
    hedera::TopicId::new(id.shard, id.realm, id.num)
}

fn entity_id(shard: u64, realm: u64, num: u64) -> EntityId {
    EntityId { shard, realm, num }
}

/// Map an SDK error, keeping the status code of rejected transactions
fn ledger_error(error: hedera::Error) -> LedgerError {
    match error {
        hedera::Error::TransactionPreCheckStatus { status, .. }
        | hedera::Error::ReceiptStatus { status, .. } => {
            LedgerError::Rejected(status.as_str_name().to_string())
        }
        hedera::Error::KeyParse(_) => LedgerError::InvalidKey(error.to_string()),
        other => LedgerError::Network(other.to_string()),
    }
}

/// Ledger client signing with the operator key through the Hedera SDK
pub struct HederaSdkClient {
    client: Client,
    network: LedgerNetwork,
    operator: Operator,
    operator_key: PrivateKey,
    mirror: MirrorNodeClient,
}

impl HederaSdkClient {
    /// Client for `options.network` with the operator set.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(options: &ClientOptions) -> Result<Self> {
        let operator_key: PrivateKey = options
            .operator
            .private_key_hex()
            .parse()
            .map_err(|e: hedera::Error| LedgerError::InvalidKey(e.to_string()))?;

        let client = match options.network {
            LedgerNetwork::Testnet => Client::for_testnet(),
            LedgerNetwork::Mainnet => Client::for_mainnet(),
            LedgerNetwork::Previewnet => Client::for_previewnet(),
        };
        client.set_operator(account_id(options.operator.account_id), operator_key.clone());

        let mirror = MirrorNodeClient::new(
            options.network,
            options.mirror_node_url.clone(),
            Some(options.operator.clone()),
            options.timeout_secs,
        )?;

        Ok(Self {
            client,
            network: options.network,
            operator: options.operator.clone(),
            operator_key,
            mirror,
        })
    }

    /// Translate a transaction into its SDK form
    fn build(&self, transaction: &LedgerTransaction) -> AnyTransaction {
        match transaction {
            LedgerTransaction::CreateFungibleToken(spec) => {
                let mut tx = TokenCreateTransaction::new();
                tx.name(spec.name.as_str())
                    .symbol(spec.symbol.as_str())
                    .decimals(spec.decimals)
                    .initial_supply(spec.initial_supply)
                    .treasury_account_id(account_id(spec.treasury_account_id));
                if spec.supply_type == SupplyType::Finite {
                    tx.token_supply_type(TokenSupplyType::Finite);
                    if let Some(max) = spec.max_supply {
                        tx.max_supply(max);
                    }
                }
                if spec.supply_key {
                    tx.supply_key(self.operator_key.public_key());
                }
                tx.into()
            }
            LedgerTransaction::CreateNonFungibleToken(spec) => {
                let mut tx = TokenCreateTransaction::new();
                tx.name(spec.name.as_str())
                    .symbol(spec.symbol.as_str())
                    .token_type(TokenType::NonFungibleUnique)
                    .decimals(0)
                    .initial_supply(0)
                    .treasury_account_id(account_id(spec.treasury_account_id))
                    .supply_key(self.operator_key.public_key());
                if let Some(max) = spec.max_supply {
                    tx.token_supply_type(TokenSupplyType::Finite).max_supply(max);
                }
                tx.into()
            }
            LedgerTransaction::TransferHbar {
                from,
                to,
                tinybars,
                memo,
            } => {
                let mut tx = TransferTransaction::new();
                tx.hbar_transfer(account_id(*from), Hbar::from_tinybars(-*tinybars))
                    .hbar_transfer(account_id(*to), Hbar::from_tinybars(*tinybars));
                if let Some(memo) = memo {
                    tx.transaction_memo(memo);
                }
                tx.into()
            }
            LedgerTransaction::CreateTopic { memo, submit_key } => {
                let mut tx = TopicCreateTransaction::new();
                if let Some(memo) = memo {
                    tx.topic_memo(memo.as_str());
                }
                if *submit_key {
                    tx.submit_key(self.operator_key.public_key());
                }
                tx.into()
            }
            LedgerTransaction::SubmitTopicMessage { topic_id: id, message } => {
                let mut tx = TopicMessageSubmitTransaction::new();
                tx.topic_id(topic_id(*id)).message(message.as_bytes());
                tx.into()
            }
        }
    }
}

#[async_trait]
impl LedgerClient for HederaSdkClient {
    fn network(&self) -> LedgerNetwork {
        self.network
    }

    fn operator(&self) -> Option<&Operator> {
        Some(&self.operator)
    }

    async fn query(&self, query: LedgerQuery) -> Result<Value> {
        self.mirror.query(query).await
    }

    async fn submit(&self, transaction: LedgerTransaction) -> Result<TransactionReceipt> {
        info!("Submitting {} to {}", transaction.kind(), self.network);
        let mut tx = self.build(&transaction);

        let response = tx.execute(&self.client).await.map_err(ledger_error)?;
        let transaction_id = response.transaction_id.to_string();
        let receipt = response
            .get_receipt(&self.client)
            .await
            .map_err(ledger_error)?;
        debug!("Receipt for {}: {:?}", transaction_id, receipt.status);

        let entity_id = match transaction {
            LedgerTransaction::CreateFungibleToken(_) | LedgerTransaction::CreateNonFungibleToken(_) => {
                receipt.token_id.map(|id| entity_id(id.shard, id.realm, id.num))
            }
            LedgerTransaction::CreateTopic { .. } => {
                receipt.topic_id.map(|id| entity_id(id.shard, id.realm, id.num))
            }
            _ => None,
        };
        let topic_sequence_number = match transaction {
            LedgerTransaction::SubmitTopicMessage { .. } => Some(receipt.topic_sequence_number),
            _ => None,
        };

        Ok(TransactionReceipt {
            status: receipt.status.as_str_name().to_string(),
            transaction_id,
            entity_id,
            topic_sequence_number,
        })
    }

    async fn prepare(&self, transaction: LedgerTransaction) -> Result<Vec<u8>> {
        debug!("Freezing {} for {}", transaction.kind(), self.network);
        let mut tx = self.build(&transaction);
        tx.freeze_with(&self.client).map_err(ledger_error)?;
        tx.to_bytes().map_err(ledger_error)
    }
}

/// Connector producing [`HederaSdkClient`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct HederaSdkConnector;

impl LedgerConnector for HederaSdkConnector {
    fn connect(&self, options: &ClientOptions) -> Result<Arc<dyn LedgerClient>> {
        Ok(Arc::new(HederaSdkClient::new(options)?))
    }
}
