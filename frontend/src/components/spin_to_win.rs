use std::time::Duration;

use gloo_timers::callback::Timeout;
use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use shared::constants::{SESSION_SPIN_CAP, SPIN_COST, TICKET_CAP, WALLET_KEY};
use shared::ledger::{ClientStorage, TicketLedger};
use shared::prize::PrizeTable;
use shared::scheduler::{Scheduler, SpinTimer};
use shared::shared_spin_game::{SpinMachine, SpinPhase, SpinResponse};
use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlInputElement;
use yew::html::Scope;
use yew::prelude::*;

use crate::api::{fetch_prize_table, request_server_spin};
use crate::storage::BrowserStorage;

/// Delivers timer events back to the component as messages.
pub struct LinkScheduler {
    link: Scope<SpinToWin>,
}

impl Scheduler for LinkScheduler {
    fn schedule_after(&mut self, delay: Duration, timer: SpinTimer) {
        let link = self.link.clone();
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        Timeout::new(millis, move || link.send_message(Msg::Timer(timer))).forget();
    }
}

pub enum Msg {
    Spin,
    Respin,
    Timer(SpinTimer),
    WalletInput(String),
    CashIn,
    CashInResult(Result<SpinResponse, String>),
    PrizesLoaded(Result<PrizeTable, String>),
}

#[derive(Properties, PartialEq)]
pub struct SpinToWinProps {
    #[prop_or(AttrValue::Static("mall-spin"))]
    pub widget_id: AttrValue,
}

pub struct SpinToWin {
    machine: SpinMachine<BrowserStorage, LinkScheduler, SmallRng>,
    wallet: String,
    notice: Option<String>,
    cashing_in: bool,
    server_result: Option<SpinResponse>,
}

fn status_line(phase: SpinPhase, spins_remaining: u32) -> String {
    match (phase, spins_remaining) {
        (SpinPhase::Spinning, _) => "Spinning...".to_string(),
        (SpinPhase::Result, 0) => "No spins left this visit. Come back later!".to_string(),
        (SpinPhase::Result, _) => "Respin for 1 ticket or wait for the reels to reset.".to_string(),
        (SpinPhase::Idle, n) => format!("{} of {} spins left", n, SESSION_SPIN_CAP),
    }
}

impl SpinToWin {
    fn remember_wallet(&self) {
        if let Err(e) = self.machine.ledger().storage().set_item(WALLET_KEY, &self.wallet) {
            warn!("Could not remember wallet: {}", e);
        }
    }

    fn can_cash_in(&self) -> bool {
        !self.cashing_in && self.machine.balance() >= SPIN_COST && !self.wallet.trim().is_empty()
    }
}

impl Component for SpinToWin {
    type Message = Msg;
    type Properties = SpinToWinProps;

    fn create(ctx: &Context<Self>) -> Self {
        let storage = BrowserStorage;
        let wallet = match storage.get_item(WALLET_KEY) {
            Ok(wallet) => wallet.unwrap_or_default(),
            Err(e) => {
                warn!("Could not read saved wallet: {}", e);
                String::new()
            }
        };

        let machine = SpinMachine::mount(
            ctx.props().widget_id.to_string(),
            TicketLedger::new(storage),
            LinkScheduler { link: ctx.link().clone() },
            PrizeTable::default(),
            SmallRng::from_entropy(),
        );
        info!("Spin widget {} mounted with {} tickets", ctx.props().widget_id, machine.balance());

        let link = ctx.link().clone();
        spawn_local(async move {
            link.send_message(Msg::PrizesLoaded(fetch_prize_table().await));
        });

        Self {
            machine,
            wallet,
            notice: None,
            cashing_in: false,
            server_result: None,
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            Msg::Spin => {
                self.notice = self.machine.spin().err().map(|rejected| {
                    debug!("Spin rejected: {}", rejected);
                    rejected.to_string()
                });
                true
            }
            Msg::Respin => {
                self.notice = self.machine.respin().err().map(|rejected| {
                    debug!("Respin rejected: {}", rejected);
                    rejected.to_string()
                });
                true
            }
            Msg::Timer(timer) => self.machine.fire(timer),
            Msg::WalletInput(wallet) => {
                self.wallet = wallet;
                self.remember_wallet();
                true
            }
            Msg::CashIn => {
                if !self.can_cash_in() {
                    return false;
                }
                self.cashing_in = true;
                self.notice = None;

                let wallet = self.wallet.trim().to_string();
                let tickets = self.machine.balance();
                let link = ctx.link().clone();
                spawn_local(async move {
                    let result = request_server_spin(&wallet, tickets).await;
                    link.send_message(Msg::CashInResult(result));
                });
                true
            }
            Msg::CashInResult(result) => {
                self.cashing_in = false;
                match result {
                    Ok(response) => {
                        let balance = self.machine.ledger_mut().debit(SPIN_COST);
                        info!("Server spin won {}, {} tickets left", response.prize.label, balance);
                        self.server_result = Some(response);
                    }
                    Err(message) => {
                        warn!("Server spin failed: {}", message);
                        self.notice = Some(message);
                    }
                }
                true
            }
            Msg::PrizesLoaded(Ok(prizes)) => {
                debug!("Loaded {} prizes from server", prizes.prizes().len());
                self.machine.replace_prizes(prizes);
                true
            }
            Msg::PrizesLoaded(Err(message)) => {
                warn!("Keeping built-in prize table: {}", message);
                false
            }
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        let session = self.machine.session();
        let balance = self.machine.balance();
        let spinning = session.phase() == SpinPhase::Spinning;

        let on_wallet = ctx.link().callback(|e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            Msg::WalletInput(input.value())
        });

        html! {
            <div class="bg-white dark:bg-gray-800 p-8 pb-6 rounded-lg shadow-lg max-w-md w-full">
                <h2 class="text-3xl font-bold mb-4 text-center text-gray-900 dark:text-white">{ "Spin to Win" }</h2>

                <div class="flex justify-between text-sm text-gray-700 dark:text-gray-300 mb-4">
                    <span>{ format!("🎟️ {} / {} tickets", balance, TICKET_CAP) }</span>
                    <span>{ status_line(session.phase(), session.spins_remaining()) }</span>
                </div>

                <div class={classes!("text-7xl", "text-center", "py-6", spinning.then_some("animate-pulse"))}>
                    { session.symbol() }
                </div>

                if let Some(prize) = session.last_result() {
                    <div class="text-center mb-4">
                        <p class="text-xl font-semibold text-gray-900 dark:text-white">{ &prize.label }</p>
                        <p class="text-sm uppercase text-gray-500">{ &prize.rarity }</p>
                        if prize.tickets > 0 {
                            <p class="text-sm text-green-600">{ format!("+{} tickets", prize.tickets) }</p>
                        }
                    </div>
                }

                <div class="flex justify-center gap-3 mb-4">
                    <button
                        onclick={ctx.link().callback(|_| Msg::Spin)}
                        disabled={!self.machine.can_spin()}
                        class="px-4 py-2 bg-blue-500 text-white rounded hover:bg-blue-600 disabled:opacity-50 transition-colors"
                    >
                        { "Spin" }
                    </button>
                    if session.phase() == SpinPhase::Result {
                        <button
                            onclick={ctx.link().callback(|_| Msg::Respin)}
                            disabled={!self.machine.can_respin()}
                            class="px-4 py-2 bg-purple-500 text-white rounded hover:bg-purple-600 disabled:opacity-50 transition-colors"
                        >
                            { "Respin (1 🎟️)" }
                        </button>
                    }
                </div>

                <div class="border-t border-gray-200 dark:border-gray-700 pt-4">
                    <p class="text-sm text-gray-600 dark:text-gray-400 mb-2">
                        { format!("Cash in {} tickets for a mall prize draw", SPIN_COST) }
                    </p>
                    <div class="flex gap-2">
                        <input
                            type="text"
                            placeholder="Wallet address"
                            value={self.wallet.clone()}
                            oninput={on_wallet}
                            class="flex-1 px-3 py-2 rounded border border-gray-300 dark:bg-gray-700 dark:text-white"
                        />
                        <button
                            onclick={ctx.link().callback(|_| Msg::CashIn)}
                            disabled={!self.can_cash_in()}
                            class="px-4 py-2 bg-green-500 text-white rounded hover:bg-green-600 disabled:opacity-50 transition-colors"
                        >
                            { if self.cashing_in { "..." } else { "Cash in" } }
                        </button>
                    </div>
                    if let Some(result) = &self.server_result {
                        <p class="text-center mt-3 text-gray-900 dark:text-white">{ &result.message }</p>
                    }
                </div>

                if let Some(notice) = &self.notice {
                    <div class="text-red-500 text-center mt-4">{ notice }</div>
                }

                <ul class="mt-6 text-xs text-gray-500 space-y-1">
                    { for self.machine.prizes().prizes().iter().map(|prize| html! {
                        <li key={prize.label.clone()} class="flex justify-between">
                            <span>{ &prize.label }</span>
                            <span>{ &prize.rarity }</span>
                        </li>
                    }) }
                </ul>
            </div>
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line_per_phase() {
        assert_eq!(status_line(SpinPhase::Idle, 5), "5 of 5 spins left");
        assert_eq!(status_line(SpinPhase::Spinning, 3), "Spinning...");
        assert!(status_line(SpinPhase::Result, 0).starts_with("No spins left"));
        assert!(status_line(SpinPhase::Result, 2).starts_with("Respin"));
    }
}
