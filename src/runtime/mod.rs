//! Shared runtime the providers are built on: execution environments,
//! credential storage, the bounded authenticated-retry protocol, companion
//! server discovery, and permissive payload coercion.

pub mod auth;
pub mod credentials;
pub mod discovery;
pub mod env;
pub mod fsutil;
pub mod http;
pub mod keychain;
pub mod sqlite;
pub mod value;
