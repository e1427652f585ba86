//! Typed node endpoints on top of [`NodeRpc`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::action::BuildRequest;
use crate::error::{MergeError, Stage};
use crate::rpc::NodeRpc;
use crate::utxo::UnspentOutput;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub id: String,
    pub alias: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AccountAddress {
    pub address: String,
    #[serde(default)]
    pub change: bool,
}

/// Transaction template returned by the build step, passed verbatim to signing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuiltTransaction(pub Value);

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SignResult {
    pub transaction: Value,
    pub sign_complete: bool,
}

impl SignResult {
    pub fn raw_transaction(&self) -> Option<&str> {
        self.transaction.get("raw_transaction").and_then(Value::as_str)
    }
}

#[derive(Deserialize)]
struct BlockCount {
    block_count: u64,
}

#[derive(Deserialize)]
struct Submitted {
    tx_id: String,
}

#[derive(Serialize)]
struct SignRequest<'a> {
    password: &'a str,
    transaction: &'a BuiltTransaction,
}

#[async_trait]
pub trait NodeApi: Send + Sync {
    async fn block_height(&self) -> Result<u64, MergeError>;
    async fn list_unspent_outputs(&self) -> Result<Vec<UnspentOutput>, MergeError>;
    async fn list_accounts(&self) -> Result<Vec<Account>, MergeError>;
    async fn list_addresses(
        &self,
        account_alias: &str,
        account_id: &str,
    ) -> Result<Vec<AccountAddress>, MergeError>;
    async fn build_transaction(
        &self,
        request: &BuildRequest,
    ) -> Result<BuiltTransaction, MergeError>;
    async fn sign_transaction(
        &self,
        password: &str,
        transaction: &BuiltTransaction,
    ) -> Result<SignResult, MergeError>;
    async fn submit_transaction(&self, raw_transaction: &str) -> Result<String, MergeError>;
}

#[async_trait]
impl NodeApi for NodeRpc {
    async fn block_height(&self) -> Result<u64, MergeError> {
        let stage = Stage::BlockHeight;
        let count: BlockCount = self
            .request_as(stage.path(), &json!({}))
            .await
            .map_err(|err| MergeError::from_rpc(stage, err))?;
        Ok(count.block_count)
    }

    async fn list_unspent_outputs(&self) -> Result<Vec<UnspentOutput>, MergeError> {
        let stage = Stage::ListUnspentOutputs;
        self.request_as(stage.path(), &json!({}))
            .await
            .map_err(|err| MergeError::from_rpc(stage, err))
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, MergeError> {
        let stage = Stage::ListAccounts;
        self.request_as(stage.path(), &json!({}))
            .await
            .map_err(|err| MergeError::from_rpc(stage, err))
    }

    async fn list_addresses(
        &self,
        account_alias: &str,
        account_id: &str,
    ) -> Result<Vec<AccountAddress>, MergeError> {
        let stage = Stage::ListAddresses;
        let body = json!({"account_alias": account_alias, "account_id": account_id});
        self.request_as(stage.path(), &body)
            .await
            .map_err(|err| MergeError::from_rpc(stage, err))
    }

    async fn build_transaction(
        &self,
        request: &BuildRequest,
    ) -> Result<BuiltTransaction, MergeError> {
        let stage = Stage::Build;
        self.request_as(stage.path(), request)
            .await
            .map_err(|err| MergeError::from_rpc(stage, err))
    }

    async fn sign_transaction(
        &self,
        password: &str,
        transaction: &BuiltTransaction,
    ) -> Result<SignResult, MergeError> {
        let stage = Stage::Sign;
        let body = SignRequest {
            password,
            transaction,
        };
        self.request_as(stage.path(), &body)
            .await
            .map_err(|err| MergeError::from_rpc(stage, err))
    }

    async fn submit_transaction(&self, raw_transaction: &str) -> Result<String, MergeError> {
        let stage = Stage::Submit;
        let submitted: Submitted = self
            .request_as(stage.path(), &json!({ "raw_transaction": raw_transaction }))
            .await
            .map_err(|err| MergeError::from_rpc(stage, err))?;
        Ok(submitted.tx_id)
    }
}
