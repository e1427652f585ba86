//! Build → sign → submit for one consolidation transaction.
//!
//! Each step consumes the previous [`TxStage`] and yields the next one, a
//! failure at any step ends the transaction with nothing retained.

use std::time::Duration;

use crate::action::{Action, BuildRequest};
use crate::config::Config;
use crate::error::{MergeError, Stage};
use crate::node::{BuiltTransaction, NodeApi};
use crate::rpc::RpcError;
use crate::selection::planner::ConsolidationBatch;

#[derive(Clone, Debug, PartialEq)]
pub enum TxStage {
    Planned {
        request: BuildRequest,
        amount: u64,
    },
    Built {
        transaction: BuiltTransaction,
        amount: u64,
    },
    Signed {
        raw_transaction: String,
    },
    Submitted {
        tx_id: String,
    },
}

impl TxStage {
    pub fn name(&self) -> &'static str {
        match self {
            TxStage::Planned { .. } => "planned",
            TxStage::Built { .. } => "built",
            TxStage::Signed { .. } => "signed",
            TxStage::Submitted { .. } => "submitted",
        }
    }
}

/// Sleeps before each build call.
#[derive(Clone, Copy, Debug)]
pub struct Pacer {
    delay: Duration,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub async fn wait(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

pub struct Orchestrator<'n, N: NodeApi + ?Sized> {
    node: &'n N,
    pacer: Pacer,
    asset_id: String,
    ttl: u64,
    time_range: u64,
}

impl<'n, N: NodeApi + ?Sized> Orchestrator<'n, N> {
    pub fn new(node: &'n N, config: &Config) -> Self {
        Self {
            node,
            pacer: Pacer::new(config.pacing_delay()),
            asset_id: config.native_asset.id.clone(),
            ttl: config.build_ttl,
            time_range: config.build_time_range,
        }
    }

    fn request(&self, actions: Vec<Action>) -> BuildRequest {
        BuildRequest {
            base_transaction: None,
            actions,
            ttl: self.ttl,
            time_range: self.time_range,
        }
    }

    /// One spend per output plus a single control action paying the batch
    /// total to `address`.
    pub fn plan_batch(
        &self,
        batch: &ConsolidationBatch<'_>,
        address: &str,
    ) -> Result<TxStage, MergeError> {
        if !batch.is_mergeable() {
            return Err(MergeError::InsufficientBatch {
                batch: batch.index,
                available: batch.len(),
            });
        }

        let mut actions: Vec<Action> = batch
            .outputs
            .iter()
            .map(|output| Action::unspent_output(output.id.clone()))
            .collect();
        actions.push(Action::control_address(
            batch.total_amount,
            self.asset_id.clone(),
            address,
        ));

        let request = self.request(actions);
        check_controlled(&request, batch.total_amount)?;
        Ok(TxStage::Planned {
            request,
            amount: batch.total_amount,
        })
    }

    /// Lets the node pick inputs worth `amount` from `account_id`.
    pub fn plan_amount(
        &self,
        account_id: &str,
        address: &str,
        amount: u64,
    ) -> Result<TxStage, MergeError> {
        if amount == 0 {
            return Err(MergeError::ZeroAmount);
        }
        let request = self.request(vec![
            Action::control_address(amount, self.asset_id.clone(), address),
            Action::spend_account(amount, self.asset_id.clone(), account_id),
        ]);
        Ok(TxStage::Planned { request, amount })
    }

    /// Runs one step. `Submitted` is terminal and is returned unchanged.
    pub async fn advance(&self, stage: TxStage, password: &str) -> Result<TxStage, MergeError> {
        match stage {
            TxStage::Planned { request, amount } => {
                check_controlled(&request, amount)?;
                self.pacer.wait().await;
                let transaction = self.node.build_transaction(&request).await?;
                tracing::debug!("built transaction for {} units", amount);
                Ok(TxStage::Built {
                    transaction,
                    amount,
                })
            }
            TxStage::Built { transaction, .. } => {
                let signed = self.node.sign_transaction(password, &transaction).await?;
                if !signed.sign_complete {
                    return Err(MergeError::IncompleteSignature { stage: Stage::Sign });
                }
                let raw_transaction = signed.raw_transaction().ok_or_else(|| {
                    MergeError::from_rpc(
                        Stage::Sign,
                        RpcError::UnexpectedShape(
                            "signed transaction has no raw_transaction".to_string(),
                        ),
                    )
                })?;
                Ok(TxStage::Signed {
                    raw_transaction: raw_transaction.to_string(),
                })
            }
            TxStage::Signed { raw_transaction } => {
                let tx_id = self.node.submit_transaction(&raw_transaction).await?;
                tracing::info!("submitted transaction {}", tx_id);
                Ok(TxStage::Submitted { tx_id })
            }
            submitted @ TxStage::Submitted { .. } => Ok(submitted),
        }
    }

    /// Drives `stage` until submitted and returns the transaction id.
    pub async fn run(&self, mut stage: TxStage, password: &str) -> Result<String, MergeError> {
        loop {
            stage = match stage {
                TxStage::Submitted { tx_id } => return Ok(tx_id),
                other => {
                    let from = other.name();
                    match self.advance(other, password).await {
                        Ok(next) => next,
                        Err(err) => {
                            tracing::warn!("transaction failed after stage {}: {}", from, err);
                            return Err(err);
                        }
                    }
                }
            };
        }
    }

    pub async fn consolidate(
        &self,
        batch: &ConsolidationBatch<'_>,
        address: &str,
        password: &str,
    ) -> Result<String, MergeError> {
        let planned = self.plan_batch(batch, address)?;
        self.run(planned, password).await
    }
}

fn check_controlled(request: &BuildRequest, amount: u64) -> Result<(), MergeError> {
    match request.controlled_amount() {
        Some(controlled) if controlled == amount => Ok(()),
        controlled => Err(MergeError::InconsistentPlan(format!(
            "control action pays {:?}, batch total is {}",
            controlled, amount
        ))),
    }
}
