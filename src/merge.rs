use std::io::{self, Write};

use crate::config::Config;
use crate::error::MergeError;
use crate::node::NodeApi;
use crate::operator::{
    ask_non_empty, find_account, resolve_destination, ConfirmationGate, Operator,
};
use crate::pipeline::Orchestrator;
use crate::selection::filter::MergeFilter;
use crate::selection::planner::{plan_batches, sum_amounts, ConsolidationBatch};
use crate::utxo::{fetch_snapshot, format_amount, UnspentOutput};

pub const DEFAULT_MAX_AMOUNT: u64 = 41_250_000_000;
pub const DEFAULT_MIN_AMOUNT: u64 = 1;
pub const DEFAULT_BATCH_SIZE: usize = 90;
pub const DEFAULT_LOOP_COUNT: usize = 1;

const DISCLAIMER: &str = "This tool belongs to an open-source project, we can not guarantee \
    this tool is bug-free. Please check the code before using, developers will not be \
    responsible for any asset loss due to bug!";

#[derive(Clone, Debug)]
pub struct MergeOptions {
    pub account_alias: Option<String>,
    pub password: Option<String>,
    /// Skips destination lookup when set.
    pub address: Option<String>,
    pub min_amount: u64,
    pub max_amount: u64,
    pub list_only: bool,
    /// Outputs per transaction, 0 asks the operator.
    pub batch_size: usize,
    /// Number of transactions, 0 asks the operator.
    pub loop_count: usize,
    pub pre_confirmed: bool,
    /// Merge this amount from the account instead of selecting outputs.
    pub amount: Option<u64>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            account_alias: None,
            password: None,
            address: None,
            min_amount: DEFAULT_MIN_AMOUNT,
            max_amount: DEFAULT_MAX_AMOUNT,
            list_only: false,
            batch_size: DEFAULT_BATCH_SIZE,
            loop_count: DEFAULT_LOOP_COUNT,
            pre_confirmed: false,
            amount: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// `--list`: nothing was merged. Amount mode lists no outputs.
    Listed { available: usize },
    Completed { tx_ids: Vec<String> },
    /// A batch had fewer than two outputs.
    Stopped {
        tx_ids: Vec<String>,
        batch: usize,
        available: usize,
    },
}

impl RunOutcome {
    pub fn tx_ids(&self) -> &[String] {
        match self {
            RunOutcome::Listed { .. } => &[],
            RunOutcome::Completed { tx_ids } | RunOutcome::Stopped { tx_ids, .. } => tx_ids,
        }
    }
}

pub struct MergeSession<'a, N: ?Sized, O: ?Sized, W: ?Sized> {
    node: &'a N,
    config: &'a Config,
    operator: &'a mut O,
    out: &'a mut W,
}

impl<'a, N, O, W> MergeSession<'a, N, O, W>
where
    N: NodeApi + ?Sized,
    O: Operator + ?Sized,
    W: Write + ?Sized,
{
    pub fn new(node: &'a N, config: &'a Config, operator: &'a mut O, out: &'a mut W) -> Self {
        Self {
            node,
            config,
            operator,
            out,
        }
    }

    pub async fn run(&mut self, options: MergeOptions) -> Result<RunOutcome, MergeError> {
        let account_alias = match &options.account_alias {
            Some(alias) => alias.clone(),
            None => ask_non_empty(&mut *self.operator, "Transfer account alias: ")?,
        };

        if let Some(amount) = options.amount {
            return self.merge_amount(&account_alias, amount, &options).await;
        }

        let snapshot = fetch_snapshot(self.node).await?;
        let filter = MergeFilter::new(
            account_alias.as_str(),
            self.config.native_asset.id.as_str(),
            options.min_amount,
            options.max_amount,
        );
        let selected = filter.select(&snapshot.outputs, snapshot.height);

        let shown = match options.batch_size.saturating_mul(options.loop_count) {
            0 => selected.len(),
            limit => limit,
        };
        for (position, output) in selected.iter().take(shown).enumerate() {
            self.print_output(position, output)?;
        }
        writeln!(self.out, "total size of available utxos is {}", selected.len())?;

        if options.list_only {
            return Ok(RunOutcome::Listed {
                available: selected.len(),
            });
        }

        let batch_size = match options.batch_size {
            0 => self.ask_count("Merge size of UTXOs (5, 13 or 20): ")?,
            size => size,
        };
        let loop_count = match options.loop_count {
            0 => self.ask_count("for loop size (1, 10 or 50): ")?,
            count => count,
        };

        let to_merge = &selected[..selected.len().min(batch_size.saturating_mul(loop_count))];
        let to_merge_total = sum_amounts(to_merge).ok_or_else(|| {
            MergeError::InconsistentPlan("selected total overflows u64".to_string())
        })?;
        writeln!(
            self.out,
            "To merge {} UTXOs with {} {} totally.\n",
            to_merge.len(),
            format_amount(to_merge_total),
            self.config.native_asset.alias
        )?;
        tracing::warn!("{}", DISCLAIMER);

        let batches = plan_batches(&selected, batch_size, loop_count)?;
        match batches.first() {
            None => return Ok(RunOutcome::Completed { tx_ids: vec![] }),
            Some(first) if !first.is_mergeable() => {
                self.print_batch(first)?;
                return self.stop(vec![], first);
            }
            Some(_) => {}
        }

        let password = self.password(&options)?;
        let address = self.destination(&account_alias, &options).await?;

        let orchestrator = Orchestrator::new(self.node, self.config);
        let gate = ConfirmationGate::new(options.pre_confirmed);
        let mut tx_ids = vec![];

        for batch in batches.iter() {
            self.print_batch(batch)?;
            if !batch.is_mergeable() {
                return self.stop(tx_ids, batch);
            }

            writeln!(
                self.out,
                "To merge {} UTXOs with {} {}",
                batch.len(),
                format_amount(batch.total_amount),
                self.config.native_asset.alias
            )?;
            if let Err(err) = gate.approve(&mut *self.operator) {
                writeln!(self.out, "Not Merge UTXOs, Exit...")?;
                return Err(err);
            }

            let tx_id = orchestrator.consolidate(batch, &address, &password).await?;
            writeln!(self.out, "tx_id: {}", tx_id)?;
            writeln!(
                self.out,
                "this is the {} times to merge utxos. -----end\n",
                batch.index + 1
            )?;
            tx_ids.push(tx_id);
        }

        Ok(RunOutcome::Completed { tx_ids })
    }

    async fn merge_amount(
        &mut self,
        account_alias: &str,
        amount: u64,
        options: &MergeOptions,
    ) -> Result<RunOutcome, MergeError> {
        if amount == 0 {
            return Err(MergeError::ZeroAmount);
        }
        let account = find_account(self.node, account_alias)
            .await?
            .ok_or_else(|| MergeError::UnknownAccount(account_alias.to_string()))?;
        writeln!(
            self.out,
            "To merge {} {} of account {}",
            format_amount(amount).trim(),
            self.config.native_asset.alias,
            account_alias
        )?;
        if options.list_only {
            return Ok(RunOutcome::Listed { available: 0 });
        }
        tracing::warn!("{}", DISCLAIMER);

        let password = self.password(options)?;
        let address = self.destination(account_alias, options).await?;
        ConfirmationGate::new(options.pre_confirmed).approve(&mut *self.operator)?;

        let orchestrator = Orchestrator::new(self.node, self.config);
        let planned = orchestrator.plan_amount(&account.id, &address, amount)?;
        let tx_id = orchestrator.run(planned, &password).await?;
        writeln!(self.out, "tx_id: {}", tx_id)?;
        Ok(RunOutcome::Completed {
            tx_ids: vec![tx_id],
        })
    }

    fn print_batch(&mut self, batch: &ConsolidationBatch<'_>) -> io::Result<()> {
        writeln!(
            self.out,
            "this is the {} times to merge utxos. -----begin",
            batch.index + 1
        )?;
        for (position, output) in batch.outputs.iter().enumerate() {
            self.print_output(batch.offset + position, output)?;
        }
        writeln!(self.out, "total size of available utxos is {}", batch.len())
    }

    fn stop(
        &mut self,
        tx_ids: Vec<String>,
        batch: &ConsolidationBatch<'_>,
    ) -> Result<RunOutcome, MergeError> {
        writeln!(self.out, "Not Merge UTXOs, Exit...")?;
        tracing::info!(
            "stopping at batch {}: {} output(s) left",
            batch.index + 1,
            batch.len()
        );
        Ok(RunOutcome::Stopped {
            tx_ids,
            batch: batch.index,
            available: batch.len(),
        })
    }

    fn print_output(&mut self, position: usize, output: &UnspentOutput) -> io::Result<()> {
        writeln!(
            self.out,
            "{:4}. {} {} {} (mature)",
            position,
            format_amount(output.amount),
            self.config.native_asset.alias,
            output.id
        )
    }

    fn ask_count(&mut self, question: &str) -> Result<usize, MergeError> {
        let answer = ask_non_empty(&mut *self.operator, question)?;
        answer.parse::<usize>().map_err(|err| {
            MergeError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{answer:?} is not a count: {err}"),
            ))
        })
    }

    fn password(&mut self, options: &MergeOptions) -> Result<String, MergeError> {
        match &options.password {
            Some(password) => Ok(password.clone()),
            None => Ok(self.operator.ask_secret("Vapor Account Password: ")?),
        }
    }

    async fn destination(
        &mut self,
        account_alias: &str,
        options: &MergeOptions,
    ) -> Result<String, MergeError> {
        match &options.address {
            Some(address) => Ok(address.clone()),
            None => resolve_destination(self.node, account_alias, &mut *self.operator).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::MergeError;
    use crate::merge::{MergeOptions, MergeSession, RunOutcome};
    use crate::operator::tests::ScriptedOperator;
    use crate::pipeline::tests::{quiet_config, utxo, ScriptedNode};
    use crate::utxo::UnspentOutput;

    fn node_with(outputs: Vec<UnspentOutput>) -> ScriptedNode {
        ScriptedNode {
            outputs,
            ..ScriptedNode::default()
        }
    }

    fn options(batch_size: usize, loop_count: usize) -> MergeOptions {
        MergeOptions {
            account_alias: Some("alice".to_string()),
            password: Some("pw".to_string()),
            batch_size,
            loop_count,
            pre_confirmed: true,
            ..MergeOptions::default()
        }
    }

    #[tokio::test]
    async fn merges_first_window_only() {
        let node = node_with(vec![utxo("a", 10), utxo("b", 20), utxo("c", 30)]);
        let config = quiet_config();
        let mut operator = ScriptedOperator::default();
        let mut out = vec![];

        let outcome = MergeSession::new(&node, &config, &mut operator, &mut out)
            .run(MergeOptions {
                min_amount: 1,
                max_amount: 1000,
                ..options(2, 1)
            })
            .await
            .unwrap();

        assert_eq!(outcome.tx_ids().len(), 1);
        let built = node.built.lock().unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].actions.len(), 3);
        assert_eq!(built[0].controlled_amount(), Some(30));

        let report = String::from_utf8(out).unwrap();
        assert!(report.contains("tx_id: tx-07signed"), "{report}");
        assert!(!report.contains(" c (mature)"), "{report}");
    }

    #[tokio::test]
    async fn list_only_never_builds() {
        let node = node_with(vec![utxo("a", 10), utxo("b", 20)]);
        let config = quiet_config();
        let mut operator = ScriptedOperator::default();
        let mut out = vec![];

        let outcome = MergeSession::new(&node, &config, &mut operator, &mut out)
            .run(MergeOptions {
                list_only: true,
                ..options(90, 1)
            })
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Listed { available: 2 });
        assert_eq!(node.calls(), vec!["height", "list"]);
        let report = String::from_utf8(out).unwrap();
        assert!(report.contains("   0.    0.00000010 BTM a (mature)"), "{report}");
        assert!(report.contains("total size of available utxos is 2"));
    }

    #[tokio::test]
    async fn stops_cleanly_on_short_batch() {
        let node = node_with(vec![utxo("a", 10), utxo("b", 20), utxo("c", 30)]);
        let config = quiet_config();
        let mut operator = ScriptedOperator::default();
        let mut out = vec![];

        let outcome = MergeSession::new(&node, &config, &mut operator, &mut out)
            .run(options(2, 3))
            .await
            .unwrap();

        match outcome {
            RunOutcome::Stopped {
                tx_ids,
                batch,
                available,
            } => {
                assert_eq!(tx_ids.len(), 1);
                assert_eq!(batch, 1);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(node.count("build"), 1);
        assert!(String::from_utf8(out).unwrap().contains("Not Merge UTXOs, Exit..."));
    }

    #[tokio::test]
    async fn declined_confirmation_aborts_before_build() {
        let node = node_with(vec![utxo("a", 10), utxo("b", 20)]);
        let config = quiet_config();
        let mut operator = ScriptedOperator::answering(&["n"]);
        let mut out = vec![];

        let err = MergeSession::new(&node, &config, &mut operator, &mut out)
            .run(MergeOptions {
                pre_confirmed: false,
                ..options(2, 1)
            })
            .await
            .unwrap_err();

        assert!(matches!(err, MergeError::Aborted));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(node.count("build"), 0);
        assert_eq!(operator.questions, vec!["Confirm [y/N] "]);
    }

    #[tokio::test]
    async fn build_failure_halts_the_run() {
        let node = ScriptedNode {
            build_fail: Some("gas credit has been spent".to_string()),
            ..node_with((0..6).map(|i| utxo(&format!("o{i}"), 5)).collect())
        };
        let config = quiet_config();
        let mut operator = ScriptedOperator::default();
        let mut out = vec![];

        let err = MergeSession::new(&node, &config, &mut operator, &mut out)
            .run(options(2, 3))
            .await
            .unwrap_err();

        assert_eq!(err.node_message(), Some("gas credit has been spent"));
        assert_eq!(node.count("build"), 1);
        assert_eq!(node.count("sign"), 0);
    }

    #[tokio::test]
    async fn prompts_for_missing_inputs() {
        let node = node_with(vec![utxo("a", 10), utxo("b", 20)]);
        let config = quiet_config();
        let mut operator = ScriptedOperator::answering(&["alice", "2", "1", "secret", "y"]);
        let mut out = vec![];

        let outcome = MergeSession::new(&node, &config, &mut operator, &mut out)
            .run(MergeOptions {
                batch_size: 0,
                loop_count: 0,
                ..MergeOptions::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.tx_ids().len(), 1);
        assert_eq!(
            operator.questions,
            vec![
                "Transfer account alias: ",
                "Merge size of UTXOs (5, 13 or 20): ",
                "for loop size (1, 10 or 50): ",
                "Vapor Account Password: ",
                "Confirm [y/N] ",
            ]
        );
    }

    #[tokio::test]
    async fn amount_mode_spends_from_account() {
        let node = ScriptedNode::default();
        let config = quiet_config();
        let mut operator = ScriptedOperator::default();
        let mut out = vec![];

        let outcome = MergeSession::new(&node, &config, &mut operator, &mut out)
            .run(MergeOptions {
                amount: Some(700),
                address: Some("vp1qexplicit".to_string()),
                ..options(90, 1)
            })
            .await
            .unwrap();

        assert_eq!(outcome.tx_ids().len(), 1);
        assert_eq!(node.calls(), vec!["accounts", "build", "sign", "submit"]);
        let built = node.built.lock().unwrap();
        assert_eq!(built[0].controlled_amount(), Some(700));
    }

    #[tokio::test]
    async fn short_first_batch_stops_before_any_prompt() {
        let node = node_with(vec![utxo("a", 10)]);
        let config = quiet_config();
        let mut operator = ScriptedOperator::default();
        let mut out = vec![];

        let outcome = MergeSession::new(&node, &config, &mut operator, &mut out)
            .run(MergeOptions {
                password: None,
                ..options(2, 1)
            })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Stopped {
                tx_ids: vec![],
                batch: 0,
                available: 1
            }
        );
        assert!(operator.questions.is_empty());
        assert_eq!(node.calls(), vec!["height", "list"]);
        assert!(String::from_utf8(out).unwrap().contains("Not Merge UTXOs, Exit..."));
    }

    #[tokio::test]
    async fn amount_mode_list_only_never_builds() {
        let node = ScriptedNode::default();
        let config = quiet_config();
        let mut operator = ScriptedOperator::default();
        let mut out = vec![];

        let outcome = MergeSession::new(&node, &config, &mut operator, &mut out)
            .run(MergeOptions {
                list_only: true,
                amount: Some(700),
                ..options(90, 1)
            })
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Listed { available: 0 });
        assert_eq!(node.calls(), vec!["accounts"]);
        assert!(operator.questions.is_empty());
        let report = String::from_utf8(out).unwrap();
        assert!(report.contains("To merge 0.00000700 BTM of account alice"), "{report}");
    }

    #[tokio::test]
    async fn amount_mode_refuses_zero() {
        let node = ScriptedNode::default();
        let config = quiet_config();
        let mut operator = ScriptedOperator::default();
        let mut out = vec![];

        let err = MergeSession::new(&node, &config, &mut operator, &mut out)
            .run(MergeOptions {
                amount: Some(0),
                ..options(90, 1)
            })
            .await
            .unwrap_err();

        assert!(matches!(err, MergeError::ZeroAmount));
        assert!(node.calls().is_empty());
    }

    #[tokio::test]
    async fn amount_mode_unknown_account() {
        let node = ScriptedNode::default();
        let config = quiet_config();
        let mut operator = ScriptedOperator::default();
        let mut out = vec![];

        let err = MergeSession::new(&node, &config, &mut operator, &mut out)
            .run(MergeOptions {
                account_alias: Some("mallory".to_string()),
                amount: Some(700),
                ..options(90, 1)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MergeError::UnknownAccount(_)));
    }
}
