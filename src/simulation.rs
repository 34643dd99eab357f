//! `Simulation`: composes C1-C7, owns the event stream, and exposes
//! run-until-horizon and query operations (spec §2 C8, §4.4 "Run loop").

use crate::agent::{Agent, AgentKind, MarketView, SubmissionPort};
use crate::book::LimitOrderBook;
use crate::config::SimulationConfig;
use crate::error::{SchedulerError, SimError};
use crate::event::{EventId, EventPayload, EventStream};
use crate::market_data::MarketData;
use crate::matching::MatchingEngine;
use crate::order::{AgentId, Price, Side};
use crate::scheduler::Scheduler;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use tracing::error;

struct TickerState {
    book: LimitOrderBook,
    market_data: MarketData,
}

struct AgentEntry {
    agent: Box<dyn Agent>,
    ticker: String,
}

/// Snapshot taken when a fatal `InvariantViolation` aborts the run (spec §7:
/// "Fatal errors produce a diagnostic dump (clock, last event id, top-of-book
/// snapshot) and terminate").
#[derive(Debug, Clone)]
pub struct DiagnosticDump {
    pub clock: u64,
    pub last_event_id: Option<EventId>,
    pub top_of_book: Vec<(String, Option<Price>, Option<Price>)>,
}

/// Composes the book(s), matching engine, scheduler, agent arena, and event
/// stream for one run. Owns the monotonic order-id counter as a plain field
/// rather than a process-global static (spec §9).
pub struct Simulation {
    config: SimulationConfig,
    clock: u64,
    engine: MatchingEngine,
    events: EventStream,
    scheduler: Scheduler,
    tickers: HashMap<String, TickerState>,
    agents: HashMap<AgentId, AgentEntry>,
    condition_agents: Vec<AgentId>,
    next_order_id: u64,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Simulation {
        Simulation {
            config,
            clock: 0,
            engine: MatchingEngine::new(),
            events: EventStream::new(),
            scheduler: Scheduler::new(),
            tickers: HashMap::new(),
            agents: HashMap::new(),
            condition_agents: Vec::new(),
            next_order_id: 0,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn events(&self) -> &EventStream {
        &self.events
    }

    /// Derives a per-agent RNG seed from the simulation-global seed and the
    /// agent's id, so every stochastic choice an agent makes is reproducible
    /// given a fixed seed (spec §9 "Random number generation"). Uses a
    /// SplitMix-style mix rather than a plain XOR so nearby agent ids don't
    /// produce correlated streams.
    pub fn agent_rng(&self, agent_id: AgentId) -> ChaCha8Rng {
        let mut z = self.config.seed ^ agent_id.0.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        ChaCha8Rng::seed_from_u64(z)
    }

    /// Registers a ticker, creating its book and derived market-data state.
    /// Emits `TickerAdded`.
    pub fn register_ticker(&mut self, ticker: impl Into<String>) -> Result<(), SimError> {
        let ticker = ticker.into();
        if self.tickers.contains_key(&ticker) {
            return Err(SimError::DuplicateRegistration {
                what: format!("ticker {ticker}"),
            });
        }
        self.tickers.insert(
            ticker.clone(),
            TickerState {
                book: LimitOrderBook::new(ticker.clone()),
                market_data: MarketData::new(
                    self.config.market.ohlcv_periods.clone(),
                    self.config.market.store_tick_data,
                    self.config.market.max_ticks,
                ),
            },
        );
        self.events.push(self.clock, None, EventPayload::TickerAdded { ticker });
        Ok(())
    }

    /// Removes a registered ticker. Emits `TickerRemoved`.
    pub fn remove_ticker(&mut self, ticker: &str) -> Result<(), SimError> {
        if self.tickers.remove(ticker).is_none() {
            return Err(SimError::UnknownTicker {
                ticker: ticker.to_string(),
            });
        }
        self.events.push(
            self.clock,
            None,
            EventPayload::TickerRemoved {
                ticker: ticker.to_string(),
            },
        );
        Ok(())
    }

    /// Registers an agent against a ticker. Time-activated agents are
    /// inserted into the scheduler at `due_time`; condition-activated agents
    /// are checked after every event batch instead (spec §4.5, and
    /// `original_source/src/managers/agent_manager.py`'s
    /// `condition_agents` list). Emits `AgentAdded`.
    pub fn register_agent(
        &mut self,
        agent: Box<dyn Agent>,
        ticker: impl Into<String>,
        due_time: u64,
    ) -> Result<(), SimError> {
        let ticker = ticker.into();
        let agent_id = agent.agent_id();
        if !self.tickers.contains_key(&ticker) {
            return Err(SimError::UnknownTicker { ticker });
        }
        if self.agents.contains_key(&agent_id) {
            return Err(SimError::DuplicateRegistration {
                what: format!("agent {agent_id}"),
            });
        }
        match agent.kind() {
            AgentKind::TimeActivated => {
                self.scheduler.register(agent_id, due_time).map_err(scheduler_error_to_sim)?;
            }
            AgentKind::ConditionActivated => {
                self.condition_agents.push(agent_id);
            }
        }
        self.agents.insert(agent_id, AgentEntry { agent, ticker });
        self.events.push(self.clock, None, EventPayload::AgentAdded { agent_id });
        Ok(())
    }

    /// Retires an agent: removed from the arena, the scheduler, and the
    /// condition-agent list. Returns `false` if the id wasn't registered.
    pub fn remove_agent(&mut self, agent_id: AgentId) -> bool {
        if self.agents.remove(&agent_id).is_none() {
            return false;
        }
        self.scheduler.retire(agent_id);
        self.condition_agents.retain(|id| *id != agent_id);
        self.events.push(self.clock, None, EventPayload::AgentRemoved { agent_id });
        true
    }

    pub fn book(&self, ticker: &str) -> Option<&LimitOrderBook> {
        self.tickers.get(ticker).map(|s| &s.book)
    }

    pub fn market_view<'a>(&'a self, ticker: &str) -> Option<MarketView<'a>> {
        self.tickers
            .get(ticker)
            .map(|s| MarketView::new(&s.book, &s.market_data))
    }

    /// Runs the scheduler-driven main loop until the next due activation
    /// exceeds `horizon` or no agent remains active (spec §4.4).
    ///
    /// `pop_next` (unlike `peek_next`) lazily skips stale heap entries left
    /// behind by retired agents, so its returned time can differ from what
    /// `peek_next` last reported; the horizon check and clock must use the
    /// time `pop_next` actually returns, not a separately peeked one. An
    /// entry popped past the horizon is not yet due — it's pushed back so a
    /// later `run_until` call with a larger horizon still sees it.
    pub fn run_until(&mut self, horizon: u64) -> Result<(), SimError> {
        loop {
            let Some((time, agent_id)) = self.scheduler.pop_next() else {
                break;
            };
            if time > horizon {
                self.scheduler
                    .reschedule(agent_id, time)
                    .map_err(scheduler_error_to_sim)?;
                break;
            }
            self.clock = time;
            self.sweep_expirations(time)?;
            self.activate_agent(agent_id, time)?;
            self.run_condition_agents(time)?;
        }
        Ok(())
    }

    /// One invocation of an agent's decision function, with its market view
    /// and submission port scoped to the activation (spec §4.5, §9 "Cyclic
    /// references": no back-reference to the simulation is ever handed out).
    fn activate_agent(&mut self, agent_id: AgentId, now: u64) -> Result<(), SimError> {
        let mut entry = self.agents.remove(&agent_id).ok_or_else(|| SimError::InvariantViolation {
            detail: format!("agent {agent_id} missing from arena during activation"),
        })?;
        let events_before = self.events.len();
        let next_due;
        {
            let Some(state) = self.tickers.get(&entry.ticker) else {
                self.agents.insert(agent_id, entry);
                return Err(SimError::UnknownTicker {
                    ticker: entry.ticker,
                });
            };
            let market_view = MarketView::new(&state.book, &state.market_data);
            let mut port = SubmissionPort::new(
                &entry.ticker,
                agent_id,
                now,
                &state.book,
                &self.engine,
                &mut self.events,
                &mut self.next_order_id,
            );
            next_due = entry.agent.activate(now, &market_view, &mut port);
        }

        self.refresh_market_data(&entry.ticker, events_before, now);
        self.check_invariants()?;

        if entry.agent.kind() == AgentKind::TimeActivated {
            self.scheduler
                .reschedule(agent_id, next_due)
                .map_err(scheduler_error_to_sim)?;
        }
        self.agents.insert(agent_id, entry);
        Ok(())
    }

    /// After each activation, condition-activated agents are asked whether
    /// their trigger predicate currently holds; those that do are activated
    /// immediately (spec §4.5, grounded on `agent_manager.py`'s
    /// `activate_condition_agents`).
    fn run_condition_agents(&mut self, now: u64) -> Result<(), SimError> {
        let candidates = self.condition_agents.clone();
        for agent_id in candidates {
            let triggered = self
                .agents
                .get(&agent_id)
                .and_then(|entry| {
                    self.tickers.get(&entry.ticker).map(|state| {
                        let view = MarketView::new(&state.book, &state.market_data);
                        entry.agent.should_trigger(now, &view)
                    })
                })
                .unwrap_or(false);
            if triggered {
                self.activate_agent(agent_id, now)?;
            }
        }
        Ok(())
    }

    /// Removes resting orders whose `expiration_time` has passed, ahead of
    /// the activation at `now` (spec §5, §9 "expiry sweep").
    fn sweep_expirations(&mut self, now: u64) -> Result<(), SimError> {
        for (ticker, state) in self.tickers.iter() {
            let swept = state.book.sweep_expired(now, None, &mut self.events);
            if !swept.is_empty() {
                tracing::debug!(ticker = %ticker, count = swept.len(), "swept expired orders");
            }
        }
        for ticker in self.tickers.keys().cloned().collect::<Vec<_>>() {
            self.refresh_market_data(&ticker, self.events.len(), now);
        }
        self.check_invariants()
    }

    /// Folds any `Transaction` events emitted for `ticker` since
    /// `events_from` into its `MarketData`, then refreshes the best-price
    /// snapshot.
    fn refresh_market_data(&mut self, ticker: &str, events_from: usize, now: u64) {
        let fills: Vec<(u64, Price)> = self
            .events
            .iter()
            .skip(events_from)
            .filter_map(|e| match &e.payload {
                EventPayload::Transaction { ticker: t, qty, price, .. } if t == ticker => {
                    Some((*qty, *price))
                }
                _ => None,
            })
            .collect();

        if let Some(state) = self.tickers.get_mut(ticker) {
            for (qty, price) in fills {
                state.market_data.record_transaction(now, price, qty);
            }
            let best_bid = state.book.best_bid();
            let best_ask = state.book.best_ask();
            let bid_volume = best_bid.map(|p| state.book.level_volume(Side::Buy, p)).unwrap_or(0);
            let ask_volume = best_ask.map(|p| state.book.level_volume(Side::Sell, p)).unwrap_or(0);
            state
                .market_data
                .update_market_parameters(best_bid, best_ask, bid_volume, ask_volume);
        }
    }

    /// Checks the quantified invariants that must hold between activations
    /// (spec §8: `best_bid() < best_ask()` whenever both are defined). A
    /// violation is fatal: it logs a diagnostic dump and aborts the run
    /// (spec §7).
    fn check_invariants(&self) -> Result<(), SimError> {
        for (ticker, state) in self.tickers.iter() {
            if state.book.is_crossed() {
                let dump = self.diagnostic_dump();
                error!(?dump, ticker = %ticker, "book crossed, aborting simulation");
                return Err(SimError::InvariantViolation {
                    detail: format!("book for {ticker} is crossed"),
                });
            }
        }
        Ok(())
    }

    /// Snapshot of clock, last event id, and top-of-book across all
    /// registered tickers, taken just before a fatal abort (spec §7).
    pub fn diagnostic_dump(&self) -> DiagnosticDump {
        DiagnosticDump {
            clock: self.clock,
            last_event_id: self.events.last().map(|e| e.event_id),
            top_of_book: self
                .tickers
                .iter()
                .map(|(ticker, state)| (ticker.clone(), state.book.best_bid(), state.book.best_ask()))
                .collect(),
        }
    }
}

fn scheduler_error_to_sim(err: SchedulerError) -> SimError {
    match err {
        SchedulerError::UnknownAgent { agent_id } => SimError::InvariantViolation {
            detail: format!("scheduler has no entry for agent {agent_id}"),
        },
        SchedulerError::DuplicateAgent { agent_id } => SimError::DuplicateRegistration {
            what: format!("agent {agent_id}"),
        },
    }
}
