use anyhow::{anyhow, Context, Result};
use rocksdb::{Options, DB};
use tally_types::state::GlobalState;
use tracing::info;

use crate::codec::{decode_state, encode_state};

const STATE_KEY: &[u8] = b"global_state";

/// RocksDB-backed state store. Keeps the latest state under one key plus a
/// copy per clock value for audit.
pub struct Storage {
    pub db: DB,
}

impl Storage {
    pub fn new(path: &str) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path).map_err(|e| anyhow!("Failed to open DB: {}", e))?;
        Ok(Self { db })
    }

    pub fn save_state(&self, state: &GlobalState) -> Result<()> {
        let encoded = encode_state(state)?;
        let clock_key = format!("state_at_{}", state.last_clock);
        self.db
            .put(clock_key.as_bytes(), &encoded)
            .map_err(|e| anyhow!("DB clock-index error: {}", e))?;
        self.db.put(STATE_KEY, &encoded).map_err(|e| anyhow!("DB write error: {}", e))?;
        info!(clock = state.last_clock, "state saved");
        Ok(())
    }

    pub fn load_state(&self, vote_bits: u32) -> Result<GlobalState> {
        match self.db.get(STATE_KEY).map_err(|e| anyhow!("DB read error: {}", e))? {
            Some(value) => decode_state(&value, vote_bits).context("stored state is corrupt"),
            None => Ok(GlobalState::default()),
        }
    }

    pub fn load_state_at(&self, clock: u64, vote_bits: u32) -> Result<Option<GlobalState>> {
        let key = format!("state_at_{}", clock);
        match self.db.get(key.as_bytes())? {
            Some(v) => Ok(Some(decode_state(&v, vote_bits)?)),
            None => Ok(None),
        }
    }
}
