//! External mutation boundaries and their command line implementations.
//!
//! Links go through `pw-link`, the hub through `pactl` (a PulseAudio null
//! sink module). Both implementations are idempotent where the tools allow:
//! a link that already exists counts as created, a link that is already
//! gone counts as destroyed.

use std::time::Duration;

use async_trait::async_trait;
use siphon_graph::{run_tool, HubLayout, PortId, ToolError, ToolOutput};
use thiserror::Error;
use tracing::{debug, info};

use crate::command::{FailureKind, HubOwnership};

#[derive(Debug, Clone, Error)]
pub enum ToolFailure {
    /// The tool ran and refused.
    #[error("{0}")]
    Rejected(String),

    #[error("tool unresponsive: {0}")]
    Unresponsive(String),

    #[error("tool unavailable: {0}")]
    Unavailable(String),
}

impl ToolFailure {
    /// Failure kind to report, with `rejected` used for plain refusals.
    pub fn kind(&self, rejected: FailureKind) -> FailureKind {
        match self {
            Self::Rejected(_) => rejected,
            Self::Unresponsive(_) => FailureKind::ToolUnresponsive,
            Self::Unavailable(_) => FailureKind::ToolUnavailable,
        }
    }
}

impl From<ToolError> for ToolFailure {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Timeout { .. } => Self::Unresponsive(err.to_string()),
            ToolError::Spawn { .. } => Self::Unavailable(err.to_string()),
        }
    }
}

#[async_trait]
pub trait LinkSink: Send + Sync {
    async fn create_link(&self, source: PortId, destination: PortId) -> Result<(), ToolFailure>;
    async fn destroy_link(&self, source: PortId, destination: PortId) -> Result<(), ToolFailure>;
}

#[async_trait]
pub trait HubSink: Send + Sync {
    /// Create the hub sink; returns the id of the module backing it.
    async fn create_hub(&self, name: &str, description: &str, layout: &HubLayout) -> Result<u32, ToolFailure>;

    async fn destroy_hub(&self, name: &str, ownership: HubOwnership) -> Result<(), ToolFailure>;
}

pub struct PwLink {
    program: String,
    timeout: Duration,
}

impl PwLink {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl LinkSink for PwLink {
    async fn create_link(&self, source: PortId, destination: PortId) -> Result<(), ToolFailure> {
        let args = [source.to_string(), destination.to_string()];
        let out = run_tool(&self.program, &args, self.timeout).await?;
        if out.success || already_linked(out.message()) {
            return Ok(());
        }
        Err(rejected(&self.program, &out))
    }

    async fn destroy_link(&self, source: PortId, destination: PortId) -> Result<(), ToolFailure> {
        let args = ["-d".to_string(), source.to_string(), destination.to_string()];
        let out = run_tool(&self.program, &args, self.timeout).await?;
        if out.success || already_unlinked(out.message()) {
            return Ok(());
        }
        Err(rejected(&self.program, &out))
    }
}

pub struct Pactl {
    program: String,
    timeout: Duration,
}

impl Pactl {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    async fn run(&self, args: &[String]) -> Result<ToolOutput, ToolFailure> {
        let out = run_tool(&self.program, args, self.timeout).await?;
        if out.success {
            Ok(out)
        } else {
            Err(rejected(&self.program, &out))
        }
    }

    async fn null_sink_module(&self, name: &str) -> Result<Option<u32>, ToolFailure> {
        let listing = self
            .run(&["list".to_string(), "short".to_string(), "modules".to_string()])
            .await?;
        Ok(find_null_sink_module(&listing.stdout, name))
    }
}

#[async_trait]
impl HubSink for Pactl {
    async fn create_hub(&self, name: &str, description: &str, layout: &HubLayout) -> Result<u32, ToolFailure> {
        if let Some(module_id) = self.null_sink_module(name).await? {
            info!(hub = name, module_id, "hub sink module already loaded");
            return Ok(module_id);
        }

        let args = null_sink_args(name, description, layout);
        let out = self.run(&args).await?;
        let module_id = out
            .stdout
            .trim()
            .parse::<u32>()
            .map_err(|_| ToolFailure::Rejected(format!("unexpected load-module output: {:?}", out.stdout.trim())))?;
        info!(hub = name, module_id, "loaded hub sink module");
        Ok(module_id)
    }

    async fn destroy_hub(&self, name: &str, ownership: HubOwnership) -> Result<(), ToolFailure> {
        let module_id = match ownership {
            HubOwnership::Owned { module_id } => module_id,
            HubOwnership::Adopted => self
                .null_sink_module(name)
                .await?
                .ok_or_else(|| ToolFailure::Rejected(format!("no null-sink module owns {}", name)))?,
        };

        debug!(hub = name, module_id, "unloading hub sink module");
        self.run(&["unload-module".to_string(), module_id.to_string()]).await?;
        Ok(())
    }
}

fn rejected(program: &str, out: &ToolOutput) -> ToolFailure {
    let message = out.message();
    if message.is_empty() {
        ToolFailure::Rejected(format!("{} exited with {:?}", program, out.code))
    } else {
        ToolFailure::Rejected(format!("{}: {}", program, message))
    }
}

fn already_linked(message: &str) -> bool {
    let low = message.to_ascii_lowercase();
    low.contains("already") || low.contains("file exists")
}

fn already_unlinked(message: &str) -> bool {
    let low = message.to_ascii_lowercase();
    low.contains("no such") || low.contains("not found") || low.contains("does not exist")
}

/// `pactl load-module module-null-sink ...` arguments for the hub.
pub fn null_sink_args(name: &str, description: &str, layout: &HubLayout) -> Vec<String> {
    vec![
        "load-module".to_string(),
        "module-null-sink".to_string(),
        format!("sink_name={}", name),
        format!("sink_properties=device.description={}", quote_property(description)),
        format!("channels={}", layout.channels()),
        format!("channel_map={}", layout.pulse_channel_map()),
    ]
}

/// Property values with spaces must be quoted for the module argument parser.
fn quote_property(value: &str) -> String {
    if value.chars().any(char::is_whitespace) {
        format!("\"{}\"", value.replace('"', "'"))
    } else {
        value.to_string()
    }
}

/// Find the module id of the null sink named `name` in
/// `pactl list short modules` output (`id<TAB>name<TAB>args`).
pub fn find_null_sink_module(listing: &str, name: &str) -> Option<u32> {
    let wanted = format!("sink_name={}", name);
    let quoted = format!("sink_name=\"{}\"", name);
    listing.lines().find_map(|line| {
        let mut fields = line.split('\t');
        let id = fields.next()?.trim().parse::<u32>().ok()?;
        if fields.next()?.trim() != "module-null-sink" {
            return None;
        }
        let args = fields.next().unwrap_or_default();
        args.split_whitespace()
            .any(|arg| arg == wanted || arg == quoted)
            .then_some(id)
    })
}
