pub mod codec;
#[cfg(feature = "rocksdb")]
pub mod db;
pub mod file;

pub use codec::{decode_state, encode_state, FORMAT_VERSION};
pub use file::FileStorage;
