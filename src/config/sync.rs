//! Synchronizer configuration structures.

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::{AppResult, PeerId};

/// Prefix of every environment variable read by [`SyncConfig::from_env`].
pub const ENV_PREFIX: &str = "PENDING_SYNC_";

/// One tag-summary scheduler scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSummaryScope {
    /// Owning peer.
    pub peer_id: PeerId,
    /// Forum topic, if the scope is a thread.
    #[serde(default)]
    pub thread_id: Option<i64>,
}

impl std::str::FromStr for TagSummaryScope {
    type Err = crate::core::SchedulerError;

    /// Parses `namespace:id` or `namespace:id/thread`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (peer, thread) = match s.trim().split_once('/') {
            Some((peer, thread)) => (peer, Some(thread)),
            None => (s.trim(), None),
        };
        let thread_id = thread
            .map(|thread| {
                thread.parse::<i64>().map_err(|e| {
                    crate::core::SchedulerError::Config(format!("scope `{s}` thread: {e}"))
                })
            })
            .transpose()?;
        Ok(Self {
            peer_id: peer.parse()?,
            thread_id,
        })
    }
}

/// Root synchronizer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Account's own peer; enables the saved-tag scope when set.
    #[serde(default)]
    pub account_peer_id: Option<PeerId>,
    /// Run the personal-mention acknowledgement scheduler.
    #[serde(default = "default_enabled")]
    pub consume_personal_mentions: bool,
    /// Run the reaction acknowledgement scheduler.
    #[serde(default = "default_enabled")]
    pub read_reactions: bool,
    /// Refresh saved reaction tags of `account_peer_id`, when set.
    #[serde(default = "default_enabled")]
    pub saved_tags: bool,
    /// Additional tag-summary scopes.
    #[serde(default)]
    pub tag_summary_scopes: Vec<TagSummaryScope>,
    /// Runtime worker threads.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Audit events kept in memory.
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,
}

const fn default_enabled() -> bool {
    true
}

fn default_worker_threads() -> usize {
    num_cpus::get()
}

const fn default_audit_capacity() -> usize {
    1024
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            account_peer_id: None,
            consume_personal_mentions: default_enabled(),
            read_reactions: default_enabled(),
            saved_tags: default_enabled(),
            tag_summary_scopes: Vec::new(),
            worker_threads: default_worker_threads(),
            audit_capacity: default_audit_capacity(),
        }
    }
}

impl SyncConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_threads == 0 {
            return Err("worker_threads must be greater than 0".into());
        }
        if self.audit_capacity == 0 {
            return Err("audit_capacity must be greater than 0".into());
        }
        for (index, scope) in self.tag_summary_scopes.iter().enumerate() {
            if self.tag_summary_scopes[..index].contains(scope) {
                return Err(format!("duplicate tag summary scope {}", scope.peer_id));
            }
        }
        Ok(())
    }

    /// Every tag-summary scope to schedule, including the account's
    /// saved-tag scope when enabled.
    #[must_use]
    pub fn effective_tag_scopes(&self) -> Vec<TagSummaryScope> {
        let mut scopes = self.tag_summary_scopes.clone();
        if let (true, Some(peer_id)) = (self.saved_tags, self.account_peer_id) {
            let account = TagSummaryScope {
                peer_id,
                thread_id: None,
            };
            if !scopes.contains(&account) {
                scopes.push(account);
            }
        }
        scopes
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the process environment, reading a `.env`
    /// file first when one is present.
    ///
    /// # Errors
    ///
    /// Malformed variables or a configuration that fails validation.
    pub fn from_env() -> AppResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from a variable lookup. Unset variables keep
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Malformed variables or a configuration that fails validation.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut cfg = Self::default();

        if let Some(value) = var("ACCOUNT_PEER_ID") {
            let peer_id: PeerId = value.parse().context("PENDING_SYNC_ACCOUNT_PEER_ID")?;
            cfg.account_peer_id = Some(peer_id);
        }
        if let Some(value) = var("CONSUME_PERSONAL_MENTIONS") {
            cfg.consume_personal_mentions =
                parse_flag(&value).context("PENDING_SYNC_CONSUME_PERSONAL_MENTIONS")?;
        }
        if let Some(value) = var("READ_REACTIONS") {
            cfg.read_reactions = parse_flag(&value).context("PENDING_SYNC_READ_REACTIONS")?;
        }
        if let Some(value) = var("SAVED_TAGS") {
            cfg.saved_tags = parse_flag(&value).context("PENDING_SYNC_SAVED_TAGS")?;
        }
        if let Some(value) = var("TAG_SUMMARY_SCOPES") {
            cfg.tag_summary_scopes = value
                .split(',')
                .filter(|scope| !scope.trim().is_empty())
                .map(str::parse::<TagSummaryScope>)
                .collect::<Result<Vec<_>, _>>()
                .context("PENDING_SYNC_TAG_SUMMARY_SCOPES")?;
        }
        if let Some(value) = var("WORKER_THREADS") {
            cfg.worker_threads = value
                .trim()
                .parse::<usize>()
                .context("PENDING_SYNC_WORKER_THREADS")?;
        }
        if let Some(value) = var("AUDIT_CAPACITY") {
            cfg.audit_capacity = value
                .trim()
                .parse::<usize>()
                .context("PENDING_SYNC_AUDIT_CAPACITY")?;
        }

        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }
}

fn parse_flag(value: &str) -> AppResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got `{other}`"),
    }
}
