// Paths under /api
pub const SPIN_ENDPOINT: &str = "/spin";
pub const SPIN_PRIZES_ENDPOINT: &str = "/spin/prizes";

// Ticket economy
pub const TICKET_CAP: u32 = 5;
pub const SESSION_SPIN_CAP: u32 = 5;
pub const SPIN_COST: u32 = 5;
pub const RESPIN_COST: u32 = 1;

// Client storage keys
pub const TICKETS_KEY: &str = "tickets";
pub const SPIN_COUNTS_KEY: &str = "spinCounts";
pub const WALLET_KEY: &str = "wallet";

// Widget animation timings
pub const SYMBOL_INTERVAL_MS: u64 = 100;
pub const SPIN_DURATION_MS: u64 = 2000;
pub const RESULT_DISPLAY_MS: u64 = 3000;

pub const MISSING_FIELDS_ERROR: &str = "Missing wallet or ticket balance.";
pub const INSUFFICIENT_TICKETS_ERROR: &str = "Insufficient tickets to spin.";
pub const SPIN_FAILED_ERROR: &str = "Spin could not be completed. Please try again.";
