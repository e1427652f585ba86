use crate::utxo::UnspentOutput;

/// Which outputs of a snapshot may be consolidated.
#[derive(Clone, Debug)]
pub struct MergeFilter {
    account_alias: String,
    asset_id: String,
    min_amount: u64,
    max_amount: u64,
}

impl MergeFilter {
    /// `min_amount` and `max_amount` are both inclusive.
    pub fn new(
        account_alias: impl Into<String>,
        asset_id: impl Into<String>,
        min_amount: u64,
        max_amount: u64,
    ) -> Self {
        Self {
            account_alias: account_alias.into(),
            asset_id: asset_id.into(),
            min_amount,
            max_amount,
        }
    }

    /// Spendable strictly below the current height.
    pub fn is_mature(&self, output: &UnspentOutput, height: u64) -> bool {
        output.valid_height < height
    }

    pub fn is_eligible(&self, output: &UnspentOutput, height: u64) -> bool {
        self.is_mature(output, height)
            && output.account_alias == self.account_alias
            && output.asset_id == self.asset_id
    }

    pub fn in_range(&self, amount: u64) -> bool {
        self.min_amount <= amount && amount <= self.max_amount
    }

    /// Keeps listing order. Empty when nothing qualifies.
    pub fn select<'a>(
        &self,
        outputs: &'a [UnspentOutput],
        height: u64,
    ) -> Vec<&'a UnspentOutput> {
        outputs
            .iter()
            .filter(|output| self.is_eligible(output, height))
            .filter(|output| self.in_range(output.amount))
            .collect()
    }
}
