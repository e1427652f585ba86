use std::fmt;

use thiserror::Error;

use crate::rpc::RpcError;

/// Node call a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    BlockHeight,
    ListUnspentOutputs,
    ListAccounts,
    ListAddresses,
    Build,
    Sign,
    Submit,
}

impl Stage {
    pub fn path(&self) -> &'static str {
        match self {
            Stage::BlockHeight => "get-block-count",
            Stage::ListUnspentOutputs => "list-unspent-outputs",
            Stage::ListAccounts => "list-accounts",
            Stage::ListAddresses => "list-addresses",
            Stage::Build => "build-transaction",
            Stage::Sign => "sign-transaction",
            Stage::Submit => "submit-transaction",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("{stage}: transport error: {source}")]
    Transport {
        stage: Stage,
        #[source]
        source: RpcError,
    },
    #[error("{stage}: {source}")]
    Rpc {
        stage: Stage,
        #[source]
        source: RpcError,
    },
    #[error("{stage}: incomplete signature")]
    IncompleteSignature { stage: Stage },
    #[error("batch {batch} has {available} output(s), at least 2 are needed to merge")]
    InsufficientBatch { batch: usize, available: usize },
    #[error("inconsistent plan: {0}")]
    InconsistentPlan(String),
    #[error("account {0} not found")]
    UnknownAccount(String),
    #[error("amount to merge must be greater than zero")]
    ZeroAmount,
    #[error("aborted by operator")]
    Aborted,
    #[error("operator input failed: {0}")]
    Io(#[from] std::io::Error),
}

impl MergeError {
    /// Wraps an RPC failure, keeping connection and decode problems apart from
    /// node-reported ones.
    pub fn from_rpc(stage: Stage, source: RpcError) -> Self {
        if source.is_transport() {
            MergeError::Transport { stage, source }
        } else {
            MergeError::Rpc { stage, source }
        }
    }

    /// The node's own `msg` when it answered with `status = fail`.
    pub fn node_message(&self) -> Option<&str> {
        match self {
            MergeError::Rpc {
                source: RpcError::Fail(msg),
                ..
            } => Some(msg.as_str()),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            MergeError::InsufficientBatch { .. } => 0,
            MergeError::Aborted
            | MergeError::UnknownAccount(_)
            | MergeError::ZeroAmount
            | MergeError::Io(_) => 1,
            MergeError::Transport { .. }
            | MergeError::Rpc { .. }
            | MergeError::InconsistentPlan(_) => 2,
            MergeError::IncompleteSignature { .. } => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{MergeError, Stage};
    use crate::rpc::RpcError;

    #[test]
    fn exit_codes() {
        assert_eq!(MergeError::Aborted.exit_code(), 1);
        assert_eq!(
            MergeError::IncompleteSignature { stage: Stage::Sign }.exit_code(),
            3
        );
        assert_eq!(
            MergeError::from_rpc(Stage::Build, RpcError::Fail("no utxo".into())).exit_code(),
            2
        );
        assert_eq!(
            MergeError::InsufficientBatch {
                batch: 0,
                available: 1
            }
            .exit_code(),
            0
        );
    }

    #[test]
    fn message_names_stage_and_node_message() {
        let err = MergeError::from_rpc(Stage::Sign, RpcError::Fail("wrong password".into()));
        assert_eq!(err.node_message(), Some("wrong password"));
        let rendered = err.to_string();
        assert!(rendered.contains("sign-transaction"), "{rendered}");
        assert!(rendered.contains("wrong password"), "{rendered}");
    }
}
