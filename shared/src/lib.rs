pub mod constants;
pub mod ledger;
pub mod prize;
pub mod rate_limit;
pub mod scheduler;
pub mod shared_spin_game;
pub mod validation;
