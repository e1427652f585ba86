//! Everything that needs a human at the keyboard.

use std::io::{self, BufRead, Write};

use crate::error::MergeError;
use crate::node::{Account, NodeApi};

pub trait Operator {
    fn ask(&mut self, question: &str) -> io::Result<String>;

    /// Reads without echo.
    fn ask_secret(&mut self, question: &str) -> io::Result<String>;

    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        Ok(self.ask(question)?.trim().eq_ignore_ascii_case("y"))
    }
}

/// Operator on the controlling terminal.
#[derive(Default)]
pub struct Terminal;

impl Operator for Terminal {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        let mut stdout = io::stdout();
        stdout.write_all(question.as_bytes())?;
        stdout.flush()?;

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin closed while waiting for an answer",
            ));
        }
        Ok(answer.trim_end_matches(['\r', '\n']).to_string())
    }

    fn ask_secret(&mut self, question: &str) -> io::Result<String> {
        rpassword::prompt_password(question)
    }
}

/// Per-batch approval. `--yes` pre-authorizes every batch.
#[derive(Clone, Copy, Debug)]
pub struct ConfirmationGate {
    pre_confirmed: bool,
}

impl ConfirmationGate {
    pub fn new(pre_confirmed: bool) -> Self {
        Self { pre_confirmed }
    }

    pub fn approve<O: Operator + ?Sized>(&self, operator: &mut O) -> Result<(), MergeError> {
        if self.pre_confirmed || operator.confirm("Confirm [y/N] ")? {
            Ok(())
        } else {
            Err(MergeError::Aborted)
        }
    }
}

pub fn ask_non_empty<O: Operator + ?Sized>(
    operator: &mut O,
    question: &str,
) -> Result<String, MergeError> {
    let answer = operator.ask(question)?;
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(MergeError::Aborted);
    }
    Ok(answer.to_string())
}

pub async fn find_account<N: NodeApi + ?Sized>(
    node: &N,
    alias: &str,
) -> Result<Option<Account>, MergeError> {
    let accounts = node.list_accounts().await?;
    Ok(accounts.into_iter().find(|account| account.alias == alias))
}

/// First address of the account, or one typed by the operator when the node
/// cannot tell. Transport failures still abort.
pub async fn resolve_destination<N, O>(
    node: &N,
    account_alias: &str,
    operator: &mut O,
) -> Result<String, MergeError>
where
    N: NodeApi + ?Sized,
    O: Operator + ?Sized,
{
    match lookup_first_address(node, account_alias).await {
        Ok(Some(address)) => {
            tracing::info!("merging into {} of account {}", address, account_alias);
            return Ok(address);
        }
        Ok(None) => {
            tracing::warn!("no address found for account {}", account_alias);
        }
        Err(err @ MergeError::Transport { .. }) => return Err(err),
        Err(err) => {
            tracing::warn!("address lookup for {} failed: {}", account_alias, err);
        }
    }
    ask_non_empty(operator, "Transfer address: ")
}

async fn lookup_first_address<N: NodeApi + ?Sized>(
    node: &N,
    account_alias: &str,
) -> Result<Option<String>, MergeError> {
    let account = match find_account(node, account_alias).await? {
        Some(account) => account,
        None => return Ok(None),
    };
    let addresses = node.list_addresses(account_alias, &account.id).await?;
    Ok(addresses.into_iter().next().map(|entry| entry.address))
}
