//! Drip Farm - periodic faucet claimer
//!
//! Walks a list of faucets on a fixed tick, claims from every faucet whose
//! cooldown has elapsed and appends one record per attempt to a SQLite claim
//! log. Each faucet names a driver; drivers are either simulated or call the
//! faucet's HTTP endpoint through a shared transport.
//!
//! # Architecture
//!
//! - **[`scheduler::Scheduler`]**: the tick loop, last-run state and fault
//!   boundary around drivers
//! - **[`gate::is_due`]**: pure cooldown check with an injectable clock
//! - **[`drivers::DriverRegistry`]**: name → driver lookup (`demo`, `http`)
//! - **[`transport::HttpTransport`]**: reqwest client shared by all drivers
//! - **[`wallets::WalletBook`]**: coin → wallet address
//! - **[`report`]**: summaries over the stored log
//!
//! # Quick Start
//!
//! ```bash
//! # Claim forever, Ctrl+C to stop
//! cargo run -p drip-farm -- --config config/config.toml run
//!
//! # Three passes, then exit
//! cargo run -p drip-farm -- run --ticks 3
//!
//! # Totals per day/coin and the last 20 attempts
//! cargo run -p drip-farm -- report --last 20
//! ```

pub mod config;
pub mod drivers;
pub mod gate;
pub mod report;
pub mod scheduler;
pub mod transport;
pub mod wallets;

pub use config::FarmConfig;
pub use drivers::{ClaimContext, DriverRegistry};
pub use scheduler::{Scheduler, TickSummary};
pub use transport::{HttpTransport, ReqwestTransport};
pub use wallets::WalletBook;
