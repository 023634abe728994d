//! Shared core (compiles everywhere): wire contract and path handling

pub mod path;
pub mod protocol;

pub use path::{DerivationPath, PathError, DEFAULT_DERIVATION_PATH};
pub use protocol::{tag_operation, Action, Command, Inbound, Outcome, Params, Response, BRIDGE_TARGET, OPERATION_TAG};
