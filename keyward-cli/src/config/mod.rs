mod loader;
mod types;

pub use loader::{ConfigLoader, LoadedConfig};
pub use types::{RawKeywardConfig, RawKeystoneSection, RawPolicySection, RawServerSection};
