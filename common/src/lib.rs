//! Core of the Clarity wallet: the local ledger, its policies, and the
//! reconciliation with on-chain data.

pub mod advisor;
pub mod cooldown;
pub mod explorer;
pub mod ledger;
pub mod reconcile;
pub mod session;
pub mod storage;
pub mod transfer;
pub mod units;
pub mod wallet;
pub mod wallet_backend;
