//! Paywall session replay.
//!
//! Loads a paywall config, a network map and optional key and capability
//! fixtures, loads the checkout, then feeds a recorded session of surface
//! messages through the orchestrator's event loop. Everything the
//! orchestrator does is logged through `tracing`; set `RUST_LOG` to tune.

mod collaborators;
mod error;
mod session;

use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use paywall_app::{Collaborators, MemoryStorage, Paywall, PaywallSettings, storage};
use paywall_core::{
    aggregator::ChainQuery, channel::origin_of, env::SystemEnv, keys::KeyRecord,
    provider::Capability, transport::RawEvent,
};
use paywall_proto::{NetworkConfigs, PaywallConfig, UserInfo};
use serde_json::Value;

use crate::{
    collaborators::{FixtureChain, LogDriver, StaticCapability},
    error::SimError,
};

/// Replay a recorded checkout session against the paywall.
#[derive(Parser, Debug)]
#[command(name = "paywall-sim")]
#[command(about = "Replay a recorded checkout session against the paywall", long_about = None)]
#[command(version)]
struct Args {
    /// Paywall config (JSON)
    #[arg(long)]
    config: PathBuf,

    /// Network map keyed by network id (JSON)
    #[arg(long)]
    networks: PathBuf,

    /// Recorded surface messages (JSON Lines)
    #[arg(long)]
    session: PathBuf,

    /// Key records answered by the chain query service (JSON array)
    #[arg(long)]
    keys: Option<PathBuf>,

    /// Method results answered by the host capability (JSON object keyed by
    /// method). Without it no capability is installed.
    #[arg(long)]
    responses: Option<PathBuf>,

    /// Start with this address in the user cache
    #[arg(long)]
    user: Option<String>,

    /// Checkout URL; defaults to the default network's checkout
    #[arg(long)]
    checkout_url: Option<String>,

    /// Bound on forwarded method calls, in seconds
    #[arg(long, default_value_t = 60)]
    call_timeout_secs: u64,

    /// Log filter used when `RUST_LOG` is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), SimError> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();

    replay(args).await
}

async fn replay(args: Args) -> Result<(), SimError> {
    let config: PaywallConfig = session::read_json(&args.config)?;
    let networks: NetworkConfigs = session::read_json(&args.networks)?;
    let keys: Vec<KeyRecord> = match &args.keys {
        Some(path) => session::read_json(path)?,
        None => Vec::new(),
    };
    let capability = match &args.responses {
        Some(path) => {
            let responses: HashMap<String, Value> = session::read_json(path)?;
            Some(Arc::new(StaticCapability::new(responses)) as Arc<dyn Capability>)
        },
        None => None,
    };
    let events = session::read_session(&args.session)?;

    let settings = PaywallSettings {
        call_timeout: Some(Duration::from_secs(args.call_timeout_secs)),
        ..PaywallSettings::default()
    };
    let mut cache = MemoryStorage::default();
    if let Some(address) = args.user {
        let user = UserInfo { address };
        if let Err(error) = storage::store_user(&mut cache, &settings.storage_key, &user) {
            tracing::warn!(%error, "cannot seed user cache");
        }
    }

    let driver = LogDriver::default();
    let chain: Arc<dyn ChainQuery> = Arc::new(FixtureChain::new(keys));
    let mut paywall = Paywall::new(
        config,
        networks,
        Collaborators {
            driver: driver.clone(),
            env: SystemEnv,
            chain,
            storage: Box::new(cache),
            capability,
        },
        settings,
    );

    paywall.load_checkout_modal(None, args.checkout_url.as_deref())?;
    let surface_origin = driver.surface_url().and_then(|url| origin_of(&url)).unwrap_or_default();

    tracing::info!(events = events.len(), origin = %surface_origin, "replaying session");
    let inbound = futures::stream::iter(events.into_iter().map(|event| {
        RawEvent::new(event.origin.unwrap_or_else(|| surface_origin.clone()), event.data)
    }));
    paywall.run(inbound).await;
    paywall.run_until_idle().await;

    tracing::info!(
        state = paywall.get_state().as_str(),
        user = paywall.get_user_account_address().unwrap_or("-"),
        pending_calls = paywall.pending_calls(),
        listening = ?paywall.listening(),
        "session finished"
    );
    paywall.close();
    Ok(())
}
