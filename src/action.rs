use serde::Serialize;

/// Transaction template action as understood by `/build-transaction`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    SpendAccountUnspentOutput {
        output_id: String,
    },
    SpendAccount {
        amount: u64,
        asset_id: String,
        account_id: String,
    },
    ControlAddress {
        amount: u64,
        asset_id: String,
        address: String,
    },
}

impl Action {
    pub fn unspent_output(output_id: impl Into<String>) -> Self {
        Action::SpendAccountUnspentOutput {
            output_id: output_id.into(),
        }
    }

    pub fn control_address(
        amount: u64,
        asset_id: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Action::ControlAddress {
            amount,
            asset_id: asset_id.into(),
            address: address.into(),
        }
    }

    pub fn spend_account(
        amount: u64,
        asset_id: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Action::SpendAccount {
            amount,
            asset_id: asset_id.into(),
            account_id: account_id.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BuildRequest {
    pub base_transaction: Option<serde_json::Value>,
    pub actions: Vec<Action>,
    pub ttl: u64,
    pub time_range: u64,
}

impl BuildRequest {
    /// Sum requested by the `control_address` actions.
    pub fn controlled_amount(&self) -> Option<u64> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                Action::ControlAddress { amount, .. } => Some(*amount),
                _ => None,
            })
            .try_fold(0u64, |acc, amount| acc.checked_add(amount))
    }
}
