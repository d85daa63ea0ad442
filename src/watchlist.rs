// src/watchlist.rs
use crate::api::Backend;
use crate::error::Result;
use crate::models::{normalize_symbol, WatchlistItem};
use log::{info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;

/// The tracked symbols as last reported by the backend.
///
/// `generation` moves whenever the symbol set changes, so dependants can tell
/// a fresh list from a relabelled one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watchlist {
    pub generation: u64,
    pub items: Vec<WatchlistItem>,
}

impl Watchlist {
    pub fn symbols(&self) -> Vec<String> {
        self.items.iter().map(|item| item.symbol.clone()).collect()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.items.iter().any(|item| item.symbol == symbol)
    }

    pub fn first(&self) -> Option<&str> {
        self.items.first().map(|item| item.symbol.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

/// Single writer for the watchlist and the selected symbol.
///
/// Every mutation is a round trip: the symbol list in the server response
/// replaces local state, nothing is applied speculatively.
pub struct WatchlistSynchronizer {
    backend: Arc<dyn Backend>,
    list: watch::Sender<Watchlist>,
    selection: watch::Sender<Option<String>>,
}

impl WatchlistSynchronizer {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (list, _) = watch::channel(Watchlist::default());
        let (selection, _) = watch::channel(None);
        WatchlistSynchronizer {
            backend,
            list,
            selection,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Watchlist> {
        self.list.subscribe()
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<Option<String>> {
        self.selection.subscribe()
    }

    pub fn current(&self) -> Watchlist {
        self.list.borrow().clone()
    }

    pub fn selected(&self) -> Option<String> {
        self.selection.borrow().clone()
    }

    /// Fetches the list. On failure the list degrades to empty.
    pub async fn load(&self) -> Result<()> {
        match self.backend.watchlist().await {
            Ok(response) => {
                self.replace(response.symbols, None);
                self.reconcile_selection(None, true);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load watchlist: {}", e);
                self.replace(Vec::new(), None);
                self.reconcile_selection(None, false);
                Err(e)
            }
        }
    }

    /// Adds a symbol. Blank input is a no-op and issues no request.
    /// Returns `false` when the input was blank and nothing was sent.
    pub async fn add(&self, symbol: &str, name: Option<&str>) -> Result<bool> {
        let Some(symbol) = normalize_symbol(symbol) else {
            return Ok(false);
        };
        let response = self.backend.add_symbol(&symbol).await?;
        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        self.replace(response.symbols, Some((symbol.as_str(), name)));
        self.reconcile_selection(Some(&symbol), true);
        Ok(true)
    }

    pub async fn remove(&self, symbol: &str) -> Result<()> {
        let Some(symbol) = normalize_symbol(symbol) else {
            return Ok(());
        };
        let response = self.backend.remove_symbol(&symbol).await?;
        self.replace(response.symbols, None);
        self.reconcile_selection(None, false);
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        let response = self.backend.clear_watchlist().await?;
        self.replace(response.symbols, None);
        self.reconcile_selection(None, false);
        Ok(())
    }

    /// Selects a symbol already on the list. Returns whether it was accepted.
    pub fn select(&self, symbol: &str) -> bool {
        let Some(symbol) = normalize_symbol(symbol) else {
            return false;
        };
        if !self.list.borrow().contains(&symbol) {
            return false;
        }
        self.set_selection(Some(symbol));
        true
    }

    fn replace(&self, symbols: Vec<String>, named: Option<(&str, Option<String>)>) {
        self.list.send_if_modified(|current| {
            let mut seen = HashSet::new();
            let items: Vec<WatchlistItem> = symbols
                .into_iter()
                .filter(|symbol| seen.insert(symbol.clone()))
                .map(|symbol| {
                    let name = match &named {
                        Some((added, name)) if *added == symbol && name.is_some() => name.clone(),
                        _ => current
                            .items
                            .iter()
                            .find(|item| item.symbol == symbol)
                            .and_then(|item| item.name.clone()),
                    };
                    WatchlistItem { symbol, name }
                })
                .collect();

            if items == current.items {
                return false;
            }
            let symbols_changed = items.len() != current.items.len()
                || items
                    .iter()
                    .zip(&current.items)
                    .any(|(a, b)| a.symbol != b.symbol);
            if symbols_changed {
                current.generation += 1;
                info!(
                    "Watchlist now tracks {} symbol(s) (generation {})",
                    items.len(),
                    current.generation
                );
            }
            current.items = items;
            true
        });
    }

    fn reconcile_selection(&self, preferred: Option<&str>, fill_empty: bool) {
        let next = {
            let list = self.list.borrow();
            let selected = self.selection.borrow();
            match selected.as_deref() {
                Some(symbol) if list.contains(symbol) => return,
                Some(_) => list.first().map(str::to_string),
                None if fill_empty => preferred
                    .filter(|symbol| list.contains(symbol))
                    .or_else(|| list.first())
                    .map(str::to_string),
                None => return,
            }
        };
        self.set_selection(next);
    }

    fn set_selection(&self, next: Option<String>) {
        self.selection.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
