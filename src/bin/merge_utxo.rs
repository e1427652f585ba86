use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::prelude::*;

use vapor_utxo_merge::config::Config;
use vapor_utxo_merge::merge::{
    DEFAULT_BATCH_SIZE, DEFAULT_LOOP_COUNT, DEFAULT_MAX_AMOUNT, DEFAULT_MIN_AMOUNT,
};
use vapor_utxo_merge::operator::Terminal;
use vapor_utxo_merge::{MergeError, MergeOptions, MergeSession, NodeRpc, RunOutcome};

#[derive(Parser, Debug)]
#[clap(version, about = "Vapor merge utxo tool")]
pub struct Cli {
    /// path to config file
    #[clap(long, value_parser)]
    config_path: Option<PathBuf>,
    /// API url to connect
    #[clap(short = 'o', long, value_parser)]
    url: Option<String>,
    /// account alias
    #[clap(short = 'a', long = "account", value_parser)]
    account_alias: Option<String>,
    /// account password
    #[clap(short = 'p', long = "pass", value_parser)]
    password: Option<String>,
    /// range lower than max_amount
    #[clap(short = 'x', long = "max", value_parser, default_value_t = DEFAULT_MAX_AMOUNT)]
    max_amount: u64,
    /// range higher than min_amount
    #[clap(short = 's', long = "min", value_parser, default_value_t = DEFAULT_MIN_AMOUNT)]
    min_amount: u64,
    /// Show UTXO list without merge
    #[clap(short = 'l', long = "list", action)]
    only_list: bool,
    /// UTXO to merge
    #[clap(short = 'm', long = "merge", value_parser, default_value_t = DEFAULT_BATCH_SIZE)]
    merge_size: usize,
    /// size for loop of UTXO to merge
    #[clap(short = 'f', long = "forloop", value_parser, default_value_t = DEFAULT_LOOP_COUNT)]
    for_loop: usize,
    /// confirm transfer
    #[clap(short = 'y', long = "yes", action)]
    confirm: bool,
    /// destination address, looked up from the account when absent
    #[clap(long, value_parser)]
    address: Option<String>,
    /// merge this amount from the account and let the node pick the inputs
    #[clap(long, value_parser)]
    amount: Option<u64>,
    /// delay before each build request in milliseconds
    #[clap(long = "pace-ms", value_parser)]
    pace_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    let code = match _main().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:?}");
            err.downcast_ref::<MergeError>()
                .map(MergeError::exit_code)
                .unwrap_or(1)
        }
    };
    std::process::exit(code);
}

async fn _main() -> anyhow::Result<i32> {
    // Start logging setup block
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let http_filter = tracing_subscriber::filter::Targets::new()
        // connection pool chatter
        .with_target("hyper", tracing::Level::WARN)
        .with_target("reqwest", tracing::Level::WARN)
        .with_default(tracing_subscriber::fmt::Subscriber::DEFAULT_MAX_LEVEL);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(http_filter)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config_path {
        Some(path) => {
            tracing::info!("Config file {:?}", path);
            Config::from_yaml_file(path)?
        }
        None => Config::default(),
    };
    if let Some(url) = cli.url {
        config.url = url;
    }
    if let Some(pace_ms) = cli.pace_ms {
        config.pacing_delay_ms = pace_ms;
    }

    let node = NodeRpc::new(&config.url)?;
    let options = MergeOptions {
        account_alias: cli.account_alias,
        password: cli.password,
        address: cli.address,
        min_amount: cli.min_amount,
        max_amount: cli.max_amount,
        list_only: cli.only_list,
        batch_size: cli.merge_size,
        loop_count: cli.for_loop,
        pre_confirmed: cli.confirm,
        amount: cli.amount,
    };

    let mut operator = Terminal;
    let mut stdout = std::io::stdout();
    let outcome = MergeSession::new(&node, &config, &mut operator, &mut stdout)
        .run(options)
        .await?;

    match &outcome {
        RunOutcome::Listed { available } => {
            tracing::info!("listed {} mergeable outputs", available)
        }
        RunOutcome::Completed { tx_ids } => {
            tracing::info!("Merge utxo successfully. txID: {:?}", tx_ids)
        }
        RunOutcome::Stopped {
            tx_ids,
            batch,
            available,
        } => tracing::info!(
            "stopped before batch {} ({} output(s) left), submitted: {:?}",
            batch + 1,
            available,
            tx_ids
        ),
    }
    Ok(0)
}
