//! Control signals from the host: activate now, purge the store.

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::generation::GenerationManager;

/// A control message as delivered by the host, a JSON object with a
/// `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
  /// Promote the current generation without waiting for natural handoff.
  #[serde(rename = "SKIP_WAITING")]
  SkipWaiting,
  /// Purge the current generation; subsequent requests are full misses.
  #[serde(rename = "CLEAR_CACHE")]
  ClearCache,
}

impl ControlMessage {
  pub fn parse(raw: &str) -> Result<Self> {
    serde_json::from_str(raw).map_err(|e| eyre!("Unrecognized control message: {}", e))
  }
}

/// Dispatches control messages onto the generation manager. The host
/// owns the messaging transport; this is only the receiving end.
pub struct ControlChannel {
  manager: Arc<GenerationManager>,
}

impl ControlChannel {
  pub fn new(manager: Arc<GenerationManager>) -> Self {
    Self { manager }
  }

  pub fn handle(&self, message: ControlMessage) -> Result<()> {
    match message {
      ControlMessage::SkipWaiting => {
        // Non-blocking: in-flight requests against the old generation
        // are not interrupted
        info!("Activate-now signal received");
        self.manager.promote();
        Ok(())
      }
      ControlMessage::ClearCache => {
        info!("Clear-store signal received");
        self.manager.clear()
      }
    }
  }

  /// Parse and dispatch a raw message in one step.
  pub fn handle_raw(&self, raw: &str) -> Result<()> {
    self.handle(ControlMessage::parse(raw)?)
  }
}
