//! # kai-vault
//!
//! A small client for the parts of the HashiCorp Vault HTTP API that Kaigara
//! relies on:
//!
//! - KV v2 reads, writes and listings (the Vault storage backend)
//! - Transit engine calls (the transit encryptor)
//! - Token self-lookup and self-renewal
//!
//! Everything goes through the generic [`VaultClient::read`],
//! [`VaultClient::write`] and [`VaultClient::list`] calls; callers own the
//! path layout.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;

pub use client::{TokenInfo, VaultClient, DEFAULT_VAULT_ADDR};
pub use error::{Result, VaultError};
