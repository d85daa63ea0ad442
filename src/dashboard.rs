// src/dashboard.rs
use crate::api::Backend;
use crate::chart::{ChartLoader, ChartState};
use crate::config::Config;
use crate::error::Result;
use crate::health;
use crate::models::{HealthStatus, QuoteEntry, SearchResult, WatchlistItem};
use crate::quotes::{QuotePoller, QuoteState};
use crate::search::{SearchDebouncer, SearchState};
use crate::watchlist::{Watchlist, WatchlistSynchronizer};
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// User intents the dashboard reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Add { symbol: String, name: Option<String> },
    Remove(String),
    Clear,
    Select(String),
    /// Text typed into the symbol search box.
    Search(String),
    /// Adds the search result at this index.
    Choose(usize),
    /// Client-side filter over the watchlist rows.
    Filter(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchlistRow {
    pub item: WatchlistItem,
    pub quote: QuoteEntry,
}

/// Everything needed to render the dashboard at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub watchlist: Watchlist,
    pub selected: Option<String>,
    pub quotes: QuoteState,
    pub chart: ChartState,
    pub search: SearchState,
    pub health: HealthStatus,
    pub filter: String,
    pub notice: Option<String>,
}

impl Snapshot {
    pub fn selected_quote(&self) -> Option<QuoteEntry> {
        self.selected.as_deref().map(|symbol| self.quotes.book.get(symbol))
    }
}

/// Owns the synchronizer and every background task it feeds.
/// Dropping the dashboard stops all of its timers.
pub struct Dashboard {
    watchlist: WatchlistSynchronizer,
    search_input: watch::Sender<String>,
    quotes: watch::Receiver<QuoteState>,
    chart: watch::Receiver<ChartState>,
    search: watch::Receiver<SearchState>,
    health: watch::Receiver<HealthStatus>,
    filter: String,
    notice: Option<String>,
    tasks: Vec<JoinHandle<()>>,
}

impl Dashboard {
    /// Wires the components together, starts their tasks and loads the
    /// watchlist. A failed load leaves an empty dashboard with a notice.
    pub async fn start(backend: Arc<dyn Backend>, config: &Config) -> Self {
        let watchlist = WatchlistSynchronizer::new(backend.clone());

        let (poller, quotes) =
            QuotePoller::new(backend.clone(), watchlist.subscribe(), config.quote_interval);
        let (loader, chart) = ChartLoader::new(backend.clone(), watchlist.subscribe_selection());
        let (search_input, search_input_rx) = watch::channel(String::new());
        let (debouncer, search) =
            SearchDebouncer::new(backend.clone(), search_input_rx, config.search_delay);
        let (health_task, health) = health::spawn_monitor(backend, config.health_interval);

        let tasks = vec![poller.spawn(), loader.spawn(), debouncer.spawn(), health_task];

        let mut dashboard = Dashboard {
            watchlist,
            search_input,
            quotes,
            chart,
            search,
            health,
            filter: String::new(),
            notice: None,
            tasks,
        };
        let loaded = dashboard.watchlist.load().await;
        dashboard.record(loaded);
        dashboard
    }

    pub async fn dispatch(&mut self, action: Action) -> Result<()> {
        let result = match action {
            Action::Add { symbol, name } => self.add(&symbol, name.as_deref()).await,
            Action::Remove(symbol) => self.watchlist.remove(&symbol).await,
            Action::Clear => self.watchlist.clear().await,
            Action::Select(symbol) => {
                if !self.watchlist.select(&symbol) {
                    warn!("Ignoring selection of {}, not on the watchlist", symbol);
                }
                Ok(())
            }
            Action::Search(text) => {
                self.set_search_input(text);
                Ok(())
            }
            Action::Choose(index) => {
                let chosen: Option<SearchResult> =
                    self.search.borrow().results.get(index).cloned();
                match chosen {
                    Some(result) => self.add(&result.symbol, Some(&result.name)).await,
                    None => {
                        warn!("No search result at position {}", index);
                        Ok(())
                    }
                }
            }
            Action::Filter(text) => {
                self.filter = text;
                Ok(())
            }
        };
        self.record(result)
    }

    async fn add(&mut self, symbol: &str, name: Option<&str>) -> Result<()> {
        if self.watchlist.add(symbol, name).await? {
            // the search results belong to the input that produced them
            self.set_search_input(String::new());
        }
        Ok(())
    }

    fn set_search_input(&self, text: String) {
        self.search_input.send_if_modified(|current| {
            if *current == text {
                false
            } else {
                *current = text;
                true
            }
        });
    }

    fn record(&mut self, result: Result<()>) -> Result<()> {
        match &result {
            Ok(()) => self.notice = None,
            Err(e) => self.notice = Some(e.to_string()),
        }
        result
    }

    /// Reads every stream against the current watchlist and selection, so
    /// state from a task that has not caught up yet never leaks through.
    pub fn snapshot(&self) -> Snapshot {
        let watchlist = self.watchlist.current();
        let selected = self.watchlist.selected();
        let quotes = self.quotes.borrow().for_watchlist(&watchlist);
        let chart = self.chart.borrow().for_selection(selected.as_deref());
        Snapshot {
            watchlist,
            selected,
            quotes,
            chart,
            search: self.search.borrow().clone(),
            health: *self.health.borrow(),
            filter: self.filter.clone(),
            notice: self.notice.clone(),
        }
    }

    /// Watchlist rows matching the filter on symbol or name, each with its
    /// quote (or an empty one).
    pub fn visible_rows(&self) -> Vec<WatchlistRow> {
        let needle = self.filter.trim().to_lowercase();
        let watchlist = self.watchlist.current();
        let quotes = self.quotes.borrow().for_watchlist(&watchlist);
        watchlist
            .items
            .into_iter()
            .filter(|item| {
                needle.is_empty()
                    || item.symbol.to_lowercase().contains(&needle)
                    || item
                        .name
                        .as_deref()
                        .map_or(false, |name| name.to_lowercase().contains(&needle))
            })
            .map(|item| WatchlistRow {
                quote: quotes.book.get(&item.symbol),
                item,
            })
            .collect()
    }

    pub fn subscribe_quotes(&self) -> watch::Receiver<QuoteState> {
        self.quotes.clone()
    }

    pub fn subscribe_chart(&self) -> watch::Receiver<ChartState> {
        self.chart.clone()
    }

    pub fn subscribe_search(&self) -> watch::Receiver<SearchState> {
        self.search.clone()
    }

    pub fn shutdown(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        info!("Stopping {} dashboard task(s)", self.tasks.len());
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.shutdown();
    }
}
