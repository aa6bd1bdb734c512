use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::constants::*;
use crate::ledger::{ClientStorage, TicketLedger};
use crate::prize::{Prize, PrizeTable};
use crate::scheduler::{ManualScheduler, Scheduler, SpinTimer};
use crate::validation::validate_wallet;

/// Symbols the reel cycles through while spinning.
pub const REEL_SYMBOLS: [&str; 6] = ["🎰", "💎", "🍒", "⭐", "🔔", "🌐"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpinPhase {
    Idle,
    Spinning,
    Result,
}

/// Why a spin or respin action did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinRejected {
    AlreadySpinning,
    ShowingResult,
    NoResultToRespin,
    SessionCapReached,
    NoTickets,
}

impl fmt::Display for SpinRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadySpinning => write!(f, "The reels are already spinning."),
            Self::ShowingResult => write!(f, "Wait for the result to clear or use a ticket to respin."),
            Self::NoResultToRespin => write!(f, "Spin first, then use a ticket to respin."),
            Self::SessionCapReached => write!(f, "No spins left this session. Reload to play again."),
            Self::NoTickets => write!(f, "You need a ticket to respin."),
        }
    }
}

impl std::error::Error for SpinRejected {}

/// State of one widget activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinSession {
    widget_id: String,
    phase: SpinPhase,
    spins_used: u32,
    last_result: Option<Prize>,
    symbol: usize,
    spin_seq: u64,
}

impl SpinSession {
    pub fn new(widget_id: impl Into<String>) -> Self {
        Self {
            widget_id: widget_id.into(),
            phase: SpinPhase::Idle,
            spins_used: 0,
            last_result: None,
            symbol: 0,
            spin_seq: 0,
        }
    }

    pub fn widget_id(&self) -> &str {
        &self.widget_id
    }

    pub fn phase(&self) -> SpinPhase {
        self.phase
    }

    pub fn spins_used(&self) -> u32 {
        self.spins_used
    }

    pub fn spins_remaining(&self) -> u32 {
        SESSION_SPIN_CAP.saturating_sub(self.spins_used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.spins_used >= SESSION_SPIN_CAP
    }

    pub fn last_result(&self) -> Option<&Prize> {
        self.last_result.as_ref()
    }

    pub fn symbol(&self) -> &'static str {
        REEL_SYMBOLS[self.symbol % REEL_SYMBOLS.len()]
    }

    pub fn check_spin(&self) -> Result<(), SpinRejected> {
        match self.phase {
            SpinPhase::Spinning => Err(SpinRejected::AlreadySpinning),
            _ if self.is_exhausted() => Err(SpinRejected::SessionCapReached),
            SpinPhase::Result => Err(SpinRejected::ShowingResult),
            SpinPhase::Idle => Ok(()),
        }
    }

    pub fn check_respin(&self, ticket_balance: u32) -> Result<(), SpinRejected> {
        match self.phase {
            SpinPhase::Spinning => Err(SpinRejected::AlreadySpinning),
            _ if self.is_exhausted() => Err(SpinRejected::SessionCapReached),
            SpinPhase::Idle => Err(SpinRejected::NoResultToRespin),
            SpinPhase::Result if ticket_balance < RESPIN_COST => Err(SpinRejected::NoTickets),
            SpinPhase::Result => Ok(()),
        }
    }

    fn is_current(&self, spin: u64, phase: SpinPhase) -> bool {
        self.spin_seq == spin && self.phase == phase
    }

    fn begin(&mut self) -> u64 {
        self.spins_used += 1;
        self.last_result = None;
        self.phase = SpinPhase::Spinning;
        self.spin_seq += 1;
        self.spin_seq
    }

    fn advance_symbol(&mut self) {
        self.symbol = (self.symbol + 1) % REEL_SYMBOLS.len();
    }

    fn finish(&mut self, prize: Prize) {
        self.last_result = Some(prize);
        self.phase = SpinPhase::Result;
    }

    fn expire_result(&mut self) {
        self.phase = SpinPhase::Idle;
    }
}

/// A mounted slot widget: session, ticket ledger, timers and prize draw wired together.
pub struct SpinMachine<S: ClientStorage, C: Scheduler, R: Rng> {
    session: SpinSession,
    ledger: TicketLedger<S>,
    scheduler: C,
    prizes: PrizeTable,
    rng: R,
}

impl<S: ClientStorage, C: Scheduler, R: Rng> SpinMachine<S, C, R> {
    /// Starts a fresh session and resets this widget's persisted spin count.
    pub fn mount(
        widget_id: impl Into<String>,
        ledger: TicketLedger<S>,
        scheduler: C,
        prizes: PrizeTable,
        rng: R,
    ) -> Self {
        let machine = Self {
            session: SpinSession::new(widget_id),
            ledger,
            scheduler,
            prizes,
            rng,
        };
        machine.persist_spin_count();
        machine
    }

    pub fn session(&self) -> &SpinSession {
        &self.session
    }

    pub fn ledger(&self) -> &TicketLedger<S> {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut TicketLedger<S> {
        &mut self.ledger
    }

    pub fn scheduler_mut(&mut self) -> &mut C {
        &mut self.scheduler
    }

    pub fn prizes(&self) -> &PrizeTable {
        &self.prizes
    }

    /// Swaps in the server's table. A spin already in flight draws from it
    /// when it completes.
    pub fn replace_prizes(&mut self, prizes: PrizeTable) {
        self.prizes = prizes;
    }

    pub fn balance(&self) -> u32 {
        self.ledger.get_balance()
    }

    pub fn can_spin(&self) -> bool {
        self.session.check_spin().is_ok()
    }

    pub fn can_respin(&self) -> bool {
        self.session.check_respin(self.balance()).is_ok()
    }

    pub fn spin(&mut self) -> Result<(), SpinRejected> {
        self.session.check_spin()?;
        self.start();
        Ok(())
    }

    pub fn respin(&mut self) -> Result<(), SpinRejected> {
        self.session.check_respin(self.ledger.get_balance())?;
        self.ledger.debit(RESPIN_COST);
        self.start();
        Ok(())
    }

    /// Applies a timer event. Returns false for events left over from an earlier spin or phase.
    pub fn fire(&mut self, timer: SpinTimer) -> bool {
        match timer {
            SpinTimer::SymbolTick { spin } if self.session.is_current(spin, SpinPhase::Spinning) => {
                self.session.advance_symbol();
                self.scheduler
                    .schedule_after(Duration::from_millis(SYMBOL_INTERVAL_MS), SpinTimer::SymbolTick { spin });
                true
            }
            SpinTimer::SpinComplete { spin } if self.session.is_current(spin, SpinPhase::Spinning) => {
                let prize = self.prizes.draw(&mut self.rng).clone();
                if prize.tickets > 0 {
                    let balance = self.ledger.credit(prize.tickets);
                    debug!("Credited {} tickets from {}, balance {}", prize.tickets, prize.label, balance);
                }
                self.session.finish(prize);
                if !self.session.is_exhausted() {
                    self.scheduler
                        .schedule_after(Duration::from_millis(RESULT_DISPLAY_MS), SpinTimer::ResultExpired { spin });
                }
                true
            }
            SpinTimer::ResultExpired { spin } if self.session.is_current(spin, SpinPhase::Result) => {
                self.session.expire_result();
                true
            }
            stale => {
                debug!("Ignoring stale timer {:?}", stale);
                false
            }
        }
    }

    fn start(&mut self) {
        let spin = self.session.begin();
        self.persist_spin_count();
        self.scheduler
            .schedule_after(Duration::from_millis(SYMBOL_INTERVAL_MS), SpinTimer::SymbolTick { spin });
        self.scheduler
            .schedule_after(Duration::from_millis(SPIN_DURATION_MS), SpinTimer::SpinComplete { spin });
    }

    fn persist_spin_count(&self) {
        let storage = self.ledger.storage();
        let mut counts: HashMap<String, u32> = match storage.get_item(SPIN_COUNTS_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!("Could not read spin counts: {}", e);
                return;
            }
        };
        counts.insert(self.session.widget_id.clone(), self.session.spins_used);

        match serde_json::to_string(&counts) {
            Ok(raw) => {
                if let Err(e) = storage.set_item(SPIN_COUNTS_KEY, &raw) {
                    warn!("Could not write spin counts: {}", e);
                }
            }
            Err(e) => warn!("Could not encode spin counts: {}", e),
        }
    }
}

impl<S: ClientStorage, R: Rng> SpinMachine<S, ManualScheduler, R> {
    /// Moves the fake clock forward, firing every timer that comes due on the way.
    pub fn advance(&mut self, by: Duration) {
        let until = self.scheduler.now() + by;
        while let Some(timer) = self.scheduler.pop_due(until) {
            self.fire(timer);
        }
        self.scheduler.settle(until);
    }
}

// === API Types ===

/// Body of `POST /api/spin`. Fields stay loosely typed so a wrong type is
/// reported as a missing field rather than a decode failure.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SpinRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tickets: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinRejection {
    MissingFields,
    InsufficientTickets,
}

impl SpinRejection {
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingFields => MISSING_FIELDS_ERROR,
            Self::InsufficientTickets => INSUFFICIENT_TICKETS_ERROR,
        }
    }
}

/// A request that passed validation. The ticket claim is trusted as sent.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedSpin {
    pub wallet: String,
    pub tickets: Number,
}

impl SpinRequest {
    pub fn new(wallet: &str, tickets: u32) -> Self {
        Self {
            wallet: Some(Value::String(wallet.to_string())),
            tickets: Some(Value::from(tickets)),
        }
    }

    pub fn validate(&self) -> Result<ClaimedSpin, SpinRejection> {
        let wallet = match &self.wallet {
            Some(Value::String(wallet)) if validate_wallet(wallet).is_ok() => wallet.clone(),
            _ => return Err(SpinRejection::MissingFields),
        };
        let tickets = match &self.tickets {
            Some(Value::Number(tickets)) => tickets.clone(),
            _ => return Err(SpinRejection::MissingFields),
        };

        if tickets.as_f64().map_or(true, |t| t < SPIN_COST as f64) {
            return Err(SpinRejection::InsufficientTickets);
        }

        Ok(ClaimedSpin { wallet, tickets })
    }
}

impl ClaimedSpin {
    /// Claimed balance minus the spin cost, kept integral when the claim was.
    pub fn new_balance(&self) -> Number {
        if let Some(tickets) = self.tickets.as_i64() {
            Number::from(tickets - SPIN_COST as i64)
        } else if let Some(tickets) = self.tickets.as_u64() {
            Number::from(tickets.saturating_sub(SPIN_COST as u64))
        } else {
            self.tickets
                .as_f64()
                .and_then(|t| Number::from_f64(t - SPIN_COST as f64))
                .unwrap_or_else(|| Number::from(0))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinResponse {
    pub prize: Prize,
    pub new_balance: Number,
    pub timestamp: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinErrorBody {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinConfigResponse {
    pub spin_cost: u32,
    pub ticket_cap: u32,
    pub session_spin_cap: u32,
    pub prizes: Vec<Prize>,
}

pub fn spin_message(prize: &Prize) -> String {
    match prize.rarity.as_str() {
        "legendary" | "epic" => format!("🎉 Huge spin! You won {} ({})!", prize.label, prize.rarity),
        _ => format!("You spun {} ({}).", prize.label, prize.rarity),
    }
}
