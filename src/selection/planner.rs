use itertools::Itertools;

use crate::error::MergeError;
use crate::utxo::UnspentOutput;

/// Outputs spent together by one consolidation transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsolidationBatch<'a> {
    /// Position of the batch in the plan, starting at 0.
    pub index: usize,
    /// Position of the first output in the filtered sequence.
    pub offset: usize,
    pub outputs: &'a [&'a UnspentOutput],
    pub total_amount: u64,
}

impl<'a> ConsolidationBatch<'a> {
    fn new(
        index: usize,
        offset: usize,
        outputs: &'a [&'a UnspentOutput],
    ) -> Result<Self, MergeError> {
        let total_amount = sum_amounts(outputs).ok_or_else(|| {
            MergeError::InconsistentPlan(format!("batch {index} total overflows u64"))
        })?;
        Ok(Self {
            index,
            offset,
            outputs,
            total_amount,
        })
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Merging fewer than two outputs is refused.
    pub fn is_mergeable(&self) -> bool {
        self.outputs.len() >= 2
    }
}

pub fn sum_amounts(outputs: &[&UnspentOutput]) -> Option<u64> {
    outputs
        .iter()
        .try_fold(0u64, |acc, output| acc.checked_add(output.amount))
}

/// Splits the filtered outputs into `loop_count` consecutive windows of
/// `batch_size`. Windows past the end of `outputs` are empty.
pub fn plan_batches<'a>(
    outputs: &'a [&'a UnspentOutput],
    batch_size: usize,
    loop_count: usize,
) -> Result<Vec<ConsolidationBatch<'a>>, MergeError> {
    let mut batches = Vec::with_capacity(loop_count);
    for index in 0..loop_count {
        let start = index.saturating_mul(batch_size).min(outputs.len());
        let end = (index + 1).saturating_mul(batch_size).min(outputs.len());
        batches.push(ConsolidationBatch::new(index, start, &outputs[start..end])?);
    }
    verify_plan(&batches)?;
    Ok(batches)
}

/// An output may be spent by one batch only, and every total must match its
/// outputs.
pub fn verify_plan(batches: &[ConsolidationBatch<'_>]) -> Result<(), MergeError> {
    let all_unique = batches
        .iter()
        .flat_map(|batch| batch.outputs.iter())
        .map(|output| output.id.as_str())
        .all_unique();
    if !all_unique {
        return Err(MergeError::InconsistentPlan(
            "an unspent output is listed more than once".to_string(),
        ));
    }

    for batch in batches {
        if sum_amounts(batch.outputs) != Some(batch.total_amount) {
            return Err(MergeError::InconsistentPlan(format!(
                "batch {} total {} does not match its outputs",
                batch.index, batch.total_amount
            )));
        }
    }
    Ok(())
}
