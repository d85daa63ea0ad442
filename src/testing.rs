// src/testing.rs
//! In-memory backend for exercising the components without a network.
use crate::api::Backend;
use crate::error::{ClientError, Result};
use crate::models::{
    normalize_symbol, AuthResponse, ChartPoint, ChartSeries, HealthStatus, QuoteEntry,
    QuotesResponse, SearchResponse, SearchResult, User, WatchlistResponse,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct FakeBackend {
    pub symbols: Mutex<Vec<String>>,
    pub quotes: Mutex<HashMap<String, QuoteEntry>>,
    pub catalog: Mutex<Vec<SearchResult>>,
    pub user: Mutex<Option<User>>,
    pub token: Mutex<Option<String>>,
    pub health: Mutex<Option<HealthStatus>>,
    failing: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
}

pub fn user(id: i64, email: &str) -> User {
    User {
        id,
        email: email.to_string(),
        full_name: None,
        created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
    }
}

pub fn quote(symbol: &str, last: f64) -> QuoteEntry {
    QuoteEntry {
        last: Some(last),
        ..QuoteEntry::empty(symbol)
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbols(symbols: &[&str]) -> Self {
        let backend = Self::default();
        *backend.symbols.lock().unwrap() = symbols.iter().map(|s| s.to_string()).collect();
        backend
    }

    pub fn set_quote(&self, entry: QuoteEntry) {
        self.quotes
            .lock()
            .unwrap()
            .insert(entry.symbol.clone(), entry);
    }

    pub fn set_catalog(&self, entries: &[(&str, &str)]) {
        *self.catalog.lock().unwrap() = entries
            .iter()
            .map(|(symbol, name)| SearchResult {
                symbol: symbol.to_string(),
                name: name.to_string(),
            })
            .collect();
    }

    /// Makes every call whose key starts with `key` fail, e.g. `"quotes"`.
    pub fn fail(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub fn recover(&self, key: &str) {
        self.failing.lock().unwrap().remove(key);
    }

    /// Delays calls whose key starts with `key`, e.g. `"chart:AAPL"`.
    pub fn delay(&self, key: &str, by: Duration) {
        self.delays.lock().unwrap().insert(key.to_string(), by);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(prefix))
            .collect()
    }

    async fn enter(&self, key: String) -> Result<()> {
        self.calls.lock().unwrap().push(key.clone());
        let delay = self
            .delays
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| key.starts_with(prefix.as_str()))
            .map(|(_, by)| *by);
        if let Some(by) = delay {
            tokio::time::sleep(by).await;
        }
        let failing = self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()));
        if failing {
            return Err(ClientError::RequestFailed {
                status: Some(503),
                message: format!("{} unavailable", key),
            });
        }
        Ok(())
    }

    fn listing(&self) -> WatchlistResponse {
        WatchlistResponse {
            symbols: self.symbols.lock().unwrap().clone(),
        }
    }

    fn authenticated(&self) -> Result<User> {
        self.user
            .lock()
            .unwrap()
            .clone()
            .ok_or(ClientError::RequestFailed {
                status: Some(401),
                message: "Not authenticated".to_string(),
            })
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        full_name: Option<&str>,
    ) -> Result<AuthResponse> {
        self.enter(format!("signup:{}", email)).await?;
        let mut created = user(1, email);
        created.full_name = full_name.map(str::to_string);
        *self.user.lock().unwrap() = Some(created.clone());
        Ok(AuthResponse {
            message: "Signup successful".to_string(),
            user: created,
        })
    }

    async fn sign_in(&self, email: &str, _password: &str) -> Result<AuthResponse> {
        self.enter(format!("signin:{}", email)).await?;
        let signed_in = user(1, email);
        *self.user.lock().unwrap() = Some(signed_in.clone());
        Ok(AuthResponse {
            message: "Signin successful".to_string(),
            user: signed_in,
        })
    }

    async fn me(&self) -> Result<User> {
        self.enter("me".to_string()).await?;
        self.authenticated()
    }

    async fn refresh(&self) -> Result<AuthResponse> {
        self.enter("refresh".to_string()).await?;
        Ok(AuthResponse {
            message: "Tokens refreshed".to_string(),
            user: self.authenticated()?,
        })
    }

    async fn logout(&self) -> Result<()> {
        self.enter("logout".to_string()).await?;
        *self.user.lock().unwrap() = None;
        *self.token.lock().unwrap() = None;
        Ok(())
    }

    async fn watchlist(&self) -> Result<WatchlistResponse> {
        self.enter("watchlist:get".to_string()).await?;
        Ok(self.listing())
    }

    async fn add_symbol(&self, symbol: &str) -> Result<WatchlistResponse> {
        let symbol = normalize_symbol(symbol).unwrap_or_default();
        self.enter(format!("watchlist:add:{}", symbol)).await?;
        {
            let mut symbols = self.symbols.lock().unwrap();
            if !symbols.contains(&symbol) {
                // newest first, like the backend's created_at DESC ordering
                symbols.insert(0, symbol);
            }
        }
        Ok(self.listing())
    }

    async fn remove_symbol(&self, symbol: &str) -> Result<WatchlistResponse> {
        let symbol = normalize_symbol(symbol).unwrap_or_default();
        self.enter(format!("watchlist:remove:{}", symbol)).await?;
        self.symbols.lock().unwrap().retain(|s| *s != symbol);
        Ok(self.listing())
    }

    async fn clear_watchlist(&self) -> Result<WatchlistResponse> {
        self.enter("watchlist:clear".to_string()).await?;
        self.symbols.lock().unwrap().clear();
        Ok(self.listing())
    }

    async fn search(&self, query: &str) -> Result<SearchResponse> {
        self.enter(format!("search:{}", query)).await?;
        let needle = query.trim().to_uppercase();
        let results = self
            .catalog
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.symbol.contains(&needle))
            .cloned()
            .collect();
        Ok(SearchResponse { results })
    }

    async fn quotes(&self, symbols: &[String]) -> Result<QuotesResponse> {
        self.enter(format!("quotes:{}", symbols.join(","))).await?;
        let known = self.quotes.lock().unwrap();
        let quotes = symbols
            .iter()
            .filter_map(|s| known.get(s).map(|q| (s.clone(), q.clone())))
            .collect();
        Ok(QuotesResponse {
            as_of: Some(Utc::now()),
            quotes,
        })
    }

    async fn chart(&self, symbol: &str) -> Result<ChartSeries> {
        self.enter(format!("chart:{}", symbol)).await?;
        Ok(ChartSeries {
            symbol: symbol.to_string(),
            as_of: Some(Utc::now()),
            points: vec![ChartPoint {
                time: Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap(),
                close: 100.0,
            }],
        })
    }

    async fn health(&self) -> HealthStatus {
        if self.enter("health".to_string()).await.is_err() {
            return HealthStatus::Down;
        }
        self.health.lock().unwrap().unwrap_or(HealthStatus::Ok)
    }

    fn access_token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }
}
