//! plinko-hintgen: produces the first hint snapshot
//!
//! Two steps, run separately or back to back:
//! 1. `collect`: query balances and write `database.bin` + `address-mapping.bin`
//! 2. `build`: pad the balances and write `hint.bin`

pub mod collector;
pub mod generator;

pub use collector::{
    collect_balances, sequential_addresses, write_source_artifacts, Account, BalanceOracle,
    RpcOracle,
};
pub use generator::generate_hint;
