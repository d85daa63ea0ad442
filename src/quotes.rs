// src/quotes.rs
use crate::api::Backend;
use crate::error::Result;
use crate::models::{QuoteEntry, QuotesResponse};
use crate::stream::StreamState;
use crate::watchlist::Watchlist;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Latest quotes for the watchlist generation they were fetched for.
/// Keys are always a subset of that generation's symbols.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteBook {
    pub generation: u64,
    pub as_of: Option<DateTime<Utc>>,
    quotes: HashMap<String, QuoteEntry>,
}

impl QuoteBook {
    /// Quote for `symbol`; a symbol the source skipped reads as "no data".
    pub fn get(&self, symbol: &str) -> QuoteEntry {
        self.quotes
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| QuoteEntry::empty(symbol))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.quotes.contains_key(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.quotes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// The book as it applies to `watchlist`. A book from an older
    /// generation can still hold symbols the list has since dropped.
    pub fn for_watchlist(&self, watchlist: &Watchlist) -> QuoteBook {
        if self.generation == watchlist.generation {
            return self.clone();
        }
        QuoteBook {
            generation: self.generation,
            as_of: self.as_of,
            quotes: self
                .quotes
                .iter()
                .filter(|(symbol, _)| watchlist.contains(symbol))
                .map(|(symbol, entry)| (symbol.clone(), entry.clone()))
                .collect(),
        }
    }

    fn from_response(generation: u64, symbols: &[String], response: QuotesResponse) -> Self {
        let wanted: HashSet<&str> = symbols.iter().map(String::as_str).collect();
        let quotes = response
            .quotes
            .into_iter()
            .filter(|(symbol, _)| wanted.contains(symbol.as_str()))
            .collect();
        QuoteBook {
            generation,
            as_of: response.as_of,
            quotes,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteState {
    pub book: QuoteBook,
    pub stream: StreamState,
}

impl QuoteState {
    /// Quotes consistent with `watchlist`. Until the poller catches up with a
    /// new generation, removed symbols are hidden and the stream reads as
    /// pending.
    pub fn for_watchlist(&self, watchlist: &Watchlist) -> QuoteState {
        if self.book.generation == watchlist.generation {
            return self.clone();
        }
        let stream = if watchlist.is_empty() {
            StreamState::Idle
        } else {
            StreamState::Pending
        };
        QuoteState {
            book: self.book.for_watchlist(watchlist),
            stream,
        }
    }
}

/// Polls batched quotes for the whole watchlist.
///
/// A changed symbol set triggers an immediate poll and restarts the interval.
/// A poll still in flight when the set changes is dropped, and any response
/// is checked against the current generation before it is applied.
pub struct QuotePoller {
    backend: Arc<dyn Backend>,
    watchlist: watch::Receiver<Watchlist>,
    interval: Duration,
    state: watch::Sender<QuoteState>,
}

impl QuotePoller {
    pub fn new(
        backend: Arc<dyn Backend>,
        watchlist: watch::Receiver<Watchlist>,
        interval: Duration,
    ) -> (Self, watch::Receiver<QuoteState>) {
        let (state, rx) = watch::channel(QuoteState::default());
        let poller = QuotePoller {
            backend,
            watchlist,
            interval,
            state,
        };
        (poller, rx)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let QuotePoller {
            backend,
            mut watchlist,
            interval,
            state,
        } = self;

        loop {
            let (generation, symbols) = {
                let list = watchlist.borrow_and_update();
                (list.generation, list.symbols())
            };

            if symbols.is_empty() {
                state.send_replace(QuoteState {
                    book: QuoteBook {
                        generation,
                        ..QuoteBook::default()
                    },
                    stream: StreamState::Idle,
                });
                if watchlist.changed().await.is_err() {
                    return;
                }
                continue;
            }

            prune(&state, generation, &symbols);

            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            // runs until the symbol set moves to a new generation
            'generation: loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = watchlist.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        if watchlist.borrow().generation != generation {
                            break 'generation;
                        }
                        continue 'generation;
                    }
                }

                state.send_modify(|s| s.stream = StreamState::Pending);
                let fetch = backend.quotes(&symbols);
                tokio::pin!(fetch);

                let result = loop {
                    tokio::select! {
                        result = &mut fetch => break result,
                        changed = watchlist.changed() => {
                            if changed.is_err() {
                                return;
                            }
                            if watchlist.borrow().generation != generation {
                                debug!("Dropping quote poll for stale generation {}", generation);
                                break 'generation;
                            }
                        }
                    }
                };

                if watchlist.borrow().generation != generation {
                    debug!("Discarding quotes for stale generation {}", generation);
                    break 'generation;
                }
                apply(&state, generation, &symbols, result);
            }
        }
    }
}

/// Drops entries for symbols no longer tracked, keeping the rest until the
/// next poll for the new generation lands.
fn prune(state: &watch::Sender<QuoteState>, generation: u64, symbols: &[String]) {
    let wanted: HashSet<&str> = symbols.iter().map(String::as_str).collect();
    state.send_modify(|s| {
        s.book.generation = generation;
        s.book.quotes.retain(|symbol, _| wanted.contains(symbol.as_str()));
        s.stream = StreamState::Pending;
    });
}

fn apply(
    state: &watch::Sender<QuoteState>,
    generation: u64,
    symbols: &[String],
    result: Result<QuotesResponse>,
) {
    match result {
        Ok(response) => {
            let book = QuoteBook::from_response(generation, symbols, response);
            info!("Quotes updated for {}/{} symbol(s)", book.len(), symbols.len());
            state.send_replace(QuoteState {
                book,
                stream: StreamState::Settled,
            });
        }
        Err(e) => {
            // stale quotes are not shown
            warn!("Quote poll failed, clearing quotes: {}", e);
            state.send_replace(QuoteState {
                book: QuoteBook {
                    generation,
                    ..QuoteBook::default()
                },
                stream: StreamState::Failed(e.to_string()),
            });
        }
    }
}
