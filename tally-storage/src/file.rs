use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tally_types::state::GlobalState;
use tracing::info;

use crate::codec::{decode_state, encode_state};

/// Single-file state store. Writes go to a sibling temp file and are renamed
/// into place, so a crash leaves either the old or the new state.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save_state(&self, state: &GlobalState) -> Result<()> {
        let encoded = encode_state(state)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &encoded).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to move state into {}", self.path.display()))?;
        info!(path = %self.path.display(), bytes = encoded.len(), "state saved");
        Ok(())
    }

    /// Missing file means fresh state.
    pub fn load_state(&self, vote_bits: u32) -> Result<GlobalState> {
        if !self.path.exists() {
            return Ok(GlobalState::default());
        }
        let bytes = fs::read(&self.path).with_context(|| format!("failed to read {}", self.path.display()))?;
        let state = decode_state(&bytes, vote_bits)
            .with_context(|| format!("corrupt state file {}", self.path.display()))?;
        info!(path = %self.path.display(), clock = state.last_clock, "state loaded");
        Ok(state)
    }
}
