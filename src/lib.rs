pub mod action;
pub mod config;
pub mod error;
pub mod merge;
pub mod node;
pub mod operator;
pub mod pipeline;
pub mod rpc;
pub mod selection;
pub mod utxo;

pub use error::{MergeError, Stage};
pub use merge::{MergeOptions, MergeSession, RunOutcome};
pub use node::NodeApi;
pub use rpc::NodeRpc;
