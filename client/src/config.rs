//! Cluster endpoint, wallet and commitment used to reach the program.

use std::{env, path::PathBuf};

use anchor_client::{solana_sdk::commitment_config::CommitmentConfig, Cluster};

use crate::error::{ClientError, Result};

pub const PROVIDER_URL_ENV: &str = "ANCHOR_PROVIDER_URL";
pub const WALLET_ENV: &str = "ANCHOR_WALLET";
pub const COMMITMENT_ENV: &str = "ANCHOR_COMMITMENT";

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub cluster_url: String,
    /// Derived from `cluster_url` when unset.
    pub ws_url: Option<String>,
    pub wallet_path: PathBuf,
    pub commitment: CommitmentConfig,
}

impl ProviderConfig {
    pub fn new(cluster_url: impl Into<String>, wallet_path: impl Into<PathBuf>) -> Self {
        Self {
            cluster_url: cluster_url.into(),
            ws_url: None,
            wallet_path: wallet_path.into(),
            commitment: CommitmentConfig::confirmed(),
        }
    }

    /// Reads `ANCHOR_PROVIDER_URL`, `ANCHOR_WALLET` and the optional
    /// `ANCHOR_COMMITMENT` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let cluster_url = lookup(PROVIDER_URL_ENV)
            .ok_or_else(|| ClientError::Config(format!("{PROVIDER_URL_ENV} is not set")))?;
        let wallet = lookup(WALLET_ENV)
            .ok_or_else(|| ClientError::Config(format!("{WALLET_ENV} is not set")))?;

        let mut config = Self::new(cluster_url, expand_home(&wallet, lookup("HOME")));
        if let Some(commitment) = lookup(COMMITMENT_ENV) {
            config.commitment = parse_commitment(&commitment)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = Some(ws_url.into());
        self
    }

    pub fn with_commitment(mut self, commitment: CommitmentConfig) -> Self {
        self.commitment = commitment;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.cluster_url.starts_with("http://") || self.cluster_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "cluster url must be http(s): {}",
                self.cluster_url
            )));
        }
        if self.wallet_path.as_os_str().is_empty() {
            return Err(ClientError::Config("wallet path is empty".into()));
        }
        if let Some(ws_url) = &self.ws_url {
            if !(ws_url.starts_with("ws://") || ws_url.starts_with("wss://")) {
                return Err(ClientError::Config(format!("websocket url must be ws(s): {ws_url}")));
            }
        }
        Ok(())
    }

    pub fn websocket_url(&self) -> String {
        self.ws_url
            .clone()
            .or_else(|| derive_websocket_url(&self.cluster_url))
            .unwrap_or_default()
    }

    pub fn cluster(&self) -> Cluster {
        Cluster::Custom(self.cluster_url.clone(), self.websocket_url())
    }
}

pub fn parse_commitment(value: &str) -> Result<CommitmentConfig> {
    match value.trim().to_ascii_lowercase().as_str() {
        "processed" => Ok(CommitmentConfig::processed()),
        "confirmed" => Ok(CommitmentConfig::confirmed()),
        "finalized" => Ok(CommitmentConfig::finalized()),
        other => Err(ClientError::Config(format!("unknown commitment level: {other}"))),
    }
}

/// `http` becomes `ws`, `https` becomes `wss`, and an explicit port is
/// bumped by one, matching the validator's default pubsub port.
fn derive_websocket_url(http_url: &str) -> Option<String> {
    let (scheme, rest) = http_url.split_once("://")?;
    let scheme = match scheme {
        "http" => "ws",
        "https" => "wss",
        _ => return None,
    };
    let (authority, path) = rest.split_at(rest.find('/').unwrap_or(rest.len()));
    let authority = match authority.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            let port: u16 = port.parse().ok()?;
            format!("{host}:{}", port.checked_add(1)?)
        }
        _ => authority.to_string(),
    };
    Some(format!("{scheme}://{authority}{path}"))
}

fn expand_home(path: &str, home: Option<String>) -> PathBuf {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}
