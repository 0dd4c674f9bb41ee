//! Watch a Waypoint name and log every address update.
//!
//! ```text
//! watch-name <name> [config.toml]
//! ```
//!
//! The optional config file holds a `NamingConfig`:
//!
//! ```toml
//! default_scheme = "dns"
//!
//! [dns]
//! freq_secs = 60
//! default_port = 8443
//! ```
//!
//! A local discovery agent is available under `disco://`. Set
//! `WAYPOINT_REGISTER=name@host:port` to register one instance in it first.

use std::error::Error;
use std::sync::Arc;

use waypoint::{Agent, LocalAgent, NamingConfig, NamingError, Registration, Registry, Scope};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("watch_name=info,waypoint_naming=debug")
            }),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(name) = args.next() else {
        return Err("usage: watch-name <name> [config.toml]".into());
    };

    let config: NamingConfig = match args.next() {
        Some(path) => toml::from_str(&std::fs::read_to_string(&path)?)?,
        None => NamingConfig::default(),
    };

    let agent = LocalAgent::new();
    if let Ok(entry) = std::env::var("WAYPOINT_REGISTER") {
        agent.register(parse_registration(&entry)?)?;
    }

    let registry = Registry::with_defaults(Arc::new(agent.clone()), &config);
    tracing::info!(name = %name, schemes = ?registry.schemes(), "watching");

    let scope = Scope::new();
    let mut watcher = registry.resolve(&scope, &name)?;

    let shutdown = scope.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted");
            shutdown.cancel();
        }
    });

    loop {
        match watcher.next().await {
            Ok(updates) => {
                for update in updates {
                    tracing::info!(op = %update.op, addr = %update.addr, "update");
                }
            }
            Err(NamingError::WatcherClosed) => break,
            Err(e) => {
                watcher.close();
                agent.leave();
                return Err(e.into());
            }
        }
    }

    agent.leave();
    Ok(())
}

/// Parse `name@host:port`.
fn parse_registration(entry: &str) -> Result<Registration, Box<dyn Error>> {
    let (name, addr) = entry
        .split_once('@')
        .ok_or("WAYPOINT_REGISTER must look like name@host:port")?;
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or("WAYPOINT_REGISTER must look like name@host:port")?;
    Ok(Registration::new(name, host, port.parse()?))
}
