//! SQL-native tier
//!
//! Distance computation is delegated to the engine's vector operators
//! (pgvector dialect). The engine itself is reached through an injected
//! [`SqlExecutor`].

mod backend;
mod executor;
mod operator;

pub use backend::{SqlBackendConfig, SqlNativeBackend};
pub use executor::{SqlExecutor, SqlRow, SqlValue};
pub use operator::NativeOperator;
