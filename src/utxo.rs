use serde::{Deserialize, Serialize};

use crate::error::MergeError;
use crate::node::NodeApi;

pub const UNITS_PER_COIN: u64 = 100_000_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub id: String,
    pub amount: u64,
    pub asset_id: String,
    #[serde(default)]
    pub asset_alias: String,
    #[serde(default)]
    pub account_alias: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub address: String,
    pub valid_height: u64,
}

/// Block height and unspent outputs read for one run.
///
/// The two values come from separate calls and are not atomic. The height is
/// read first, so an output confirmed in between is judged against an older
/// height and only ever looks less mature than it is.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub height: u64,
    pub outputs: Vec<UnspentOutput>,
}

pub async fn fetch_snapshot<N: NodeApi + ?Sized>(node: &N) -> Result<Snapshot, MergeError> {
    let height = node.block_height().await?;
    let outputs = node.list_unspent_outputs().await?;
    tracing::info!(
        "snapshot: height {}, {} unspent outputs (height read before listing)",
        height,
        outputs.len()
    );
    Ok(Snapshot { height, outputs })
}

/// Renders an amount in whole coins with 8 decimals, right aligned to 13.
pub fn format_amount(amount: u64) -> String {
    format!(
        "{:>13}",
        format!(
            "{}.{:08}",
            amount / UNITS_PER_COIN,
            amount % UNITS_PER_COIN
        )
    )
}
