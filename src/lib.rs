//! Multi-chain task automation and execution engine.
//!
//! Free-text tasks ("swap 0.1 for 0x…", "mint the nft", "check balance")
//! run against saved accounts across EVM, Solana and Aptos networks, on
//! demand or on a repeating schedule. Account secrets are sealed at rest
//! and unsealed only at the moment of submission; all amounts move through
//! the engine in integer smallest units.

pub mod adapter;
pub mod config;
pub mod exec;
pub mod intent;
pub mod model;
pub mod notify;
pub mod store;
