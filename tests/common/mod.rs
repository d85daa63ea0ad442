// tests/common/mod.rs
//! A small warp server standing in for the TradeLab backend.
#![allow(dead_code)]

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Reply};

pub const PASSWORD: &str = "password123";

#[derive(Default)]
pub struct MockState {
    pub symbols: Vec<String>,
    pub log: Vec<String>,
}

pub type Shared = Arc<Mutex<MockState>>;

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

pub struct MockServer {
    pub addr: SocketAddr,
    pub state: Shared,
}

impl MockServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn log_for(&self, prefix: &str) -> Vec<String> {
        self.log()
            .into_iter()
            .filter(|entry| entry.starts_with(prefix))
            .collect()
    }
}

pub fn token(user_id: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (Utc::now() + Duration::minutes(15)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"mock-secret"),
    )
    .unwrap()
}

fn user_json(email: &str) -> serde_json::Value {
    json!({"id": 1, "email": email, "full_name": "Ada Lovelace", "created_at": "2024-01-02T03:04:05.678901"})
}

fn detail(status: StatusCode, message: &str) -> Response {
    warp::reply::with_status(warp::reply::json(&json!({ "detail": message })), status).into_response()
}

fn record(state: &Shared, entry: String) {
    state.lock().unwrap().log.push(entry);
}

fn listing(state: &Shared) -> Response {
    let symbols = state.lock().unwrap().symbols.clone();
    warp::reply::json(&json!({ "symbols": symbols })).into_response()
}

fn with_state(state: Shared) -> impl Filter<Extract = (Shared,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub async fn spawn(symbols: &[&str]) -> MockServer {
    let state: Shared = Arc::new(Mutex::new(MockState {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        log: Vec::new(),
    }));

    let signin = warp::path!("auth" / "signin")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .map(|credentials: Credentials, state: Shared| {
            record(&state, format!("signin:{}", credentials.email));
            if credentials.password != PASSWORD {
                return detail(StatusCode::UNAUTHORIZED, "Invalid credentials");
            }
            let body = json!({"message": "Signin successful", "user": user_json(&credentials.email)});
            warp::reply::with_header(
                warp::reply::json(&body),
                "set-cookie",
                format!("access_token={}; Path=/; HttpOnly", token("1")),
            )
            .into_response()
        });

    let me = warp::path!("auth" / "me")
        .and(warp::get())
        .and(warp::cookie::optional::<String>("access_token"))
        .and(with_state(state.clone()))
        .map(|cookie: Option<String>, state: Shared| {
            record(&state, "me".to_string());
            match cookie.filter(|c| !c.is_empty()) {
                Some(_) => warp::reply::json(&user_json("ada@example.com")).into_response(),
                None => detail(StatusCode::UNAUTHORIZED, "Not authenticated"),
            }
        });

    let logout = warp::path!("auth" / "logout")
        .and(warp::post())
        .and(with_state(state.clone()))
        .map(|state: Shared| {
            record(&state, "logout".to_string());
            warp::reply::with_header(
                warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT),
                "set-cookie",
                "access_token=; Path=/; Max-Age=0",
            )
            .into_response()
        });

    let get_watchlist = warp::path!("api" / "watchlist")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: Shared| {
            record(&state, "watchlist:get".to_string());
            listing(&state)
        });

    let add = warp::path!("api" / "watchlist")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .map(|body: HashMap<String, String>, state: Shared| {
            let symbol = body.get("symbol").cloned().unwrap_or_default();
            record(&state, format!("watchlist:add:{}", symbol));
            if symbol.is_empty() || symbol.len() > 16 {
                return detail(StatusCode::BAD_REQUEST, "Symbol format invalid");
            }
            {
                let mut guard = state.lock().unwrap();
                if !guard.symbols.contains(&symbol) {
                    guard.symbols.insert(0, symbol);
                }
            }
            warp::reply::with_status(listing(&state), StatusCode::CREATED).into_response()
        });

    let remove = warp::path!("api" / "watchlist" / String)
        .and(warp::delete())
        .and(with_state(state.clone()))
        .map(|symbol: String, state: Shared| {
            record(&state, format!("watchlist:remove:{}", symbol));
            state.lock().unwrap().symbols.retain(|s| *s != symbol);
            listing(&state)
        });

    let clear = warp::path!("api" / "watchlist")
        .and(warp::delete())
        .and(with_state(state.clone()))
        .map(|state: Shared| {
            record(&state, "watchlist:clear".to_string());
            state.lock().unwrap().symbols.clear();
            listing(&state)
        });

    let search = warp::path!("api" / "market" / "search")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state.clone()))
        .map(|query: HashMap<String, String>, state: Shared| {
            let q = query.get("q").cloned().unwrap_or_default();
            record(&state, format!("search:{}", q));
            let catalog = [("TSLA", "Tesla, Inc."), ("TSM", "Taiwan Semiconductor")];
            let needle = q.to_uppercase();
            let results: Vec<_> = catalog
                .iter()
                .filter(|(symbol, _)| !needle.is_empty() && symbol.starts_with(&needle))
                .map(|(symbol, name)| json!({"symbol": symbol, "name": name}))
                .collect();
            warp::reply::json(&json!({ "results": results })).into_response()
        });

    let quotes = warp::path!("api" / "market" / "quotes")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state.clone()))
        .map(|query: HashMap<String, String>, state: Shared| {
            let symbols = query.get("symbols").cloned().unwrap_or_default();
            record(&state, format!("quotes:{}", symbols));
            let mut quotes = serde_json::Map::new();
            if symbols.split(',').any(|s| s == "AAPL") {
                quotes.insert(
                    "AAPL".to_string(),
                    json!({"symbol": "AAPL", "last": 178.44, "bid": 178.4, "ask": 178.48,
                           "changePct": null, "updatedAt": "2024-05-01T13:59:58.123456789Z"}),
                );
            }
            warp::reply::json(&json!({"asOf": "2024-05-01T14:00:00+00:00", "quotes": quotes}))
                .into_response()
        });

    let chart = warp::path!("api" / "market" / "chart")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state.clone()))
        .map(|query: HashMap<String, String>, state: Shared| {
            let symbol = query.get("symbol").cloned().unwrap_or_default();
            record(&state, format!("chart:{}", symbol));
            if symbol == "NOPE" {
                return detail(StatusCode::BAD_REQUEST, "Alpaca error: unknown symbol");
            }
            warp::reply::json(&json!({
                "symbol": symbol,
                "asOf": "2024-05-01T14:00:00+00:00",
                "points": [
                    {"t": "2024-05-01T12:00:00Z", "c": 101.5},
                    {"t": "2024-05-01T13:00:00Z", "c": 99.25}
                ]
            }))
            .into_response()
        });

    let health = warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::json(&json!({"status": "ok"})).into_response());

    let routes = signin
        .or(me)
        .unify()
        .or(logout)
        .unify()
        .or(get_watchlist)
        .unify()
        .or(add)
        .unify()
        .or(remove)
        .unify()
        .or(clear)
        .unify()
        .or(search)
        .unify()
        .or(quotes)
        .unify()
        .or(chart)
        .unify()
        .or(health)
        .unify();

    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    MockServer { addr, state }
}
