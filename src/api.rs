// src/api.rs
use crate::auth::{self, ACCESS_COOKIE};
use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::models::{
    normalize_symbol, AddSymbolRequest, AuthResponse, ChartSeries, HealthStatus, QuotesResponse,
    SearchResponse, SignInRequest, SignUpRequest, User, WatchlistResponse,
};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// The backend REST surface the dashboard consumes.
///
/// Every call issues at most one request and surfaces failure immediately;
/// nothing here retries.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, full_name: Option<&str>)
        -> Result<AuthResponse>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse>;
    async fn me(&self) -> Result<User>;
    async fn refresh(&self) -> Result<AuthResponse>;
    async fn logout(&self) -> Result<()>;

    async fn watchlist(&self) -> Result<WatchlistResponse>;
    async fn add_symbol(&self, symbol: &str) -> Result<WatchlistResponse>;
    async fn remove_symbol(&self, symbol: &str) -> Result<WatchlistResponse>;
    async fn clear_watchlist(&self) -> Result<WatchlistResponse>;

    async fn search(&self, query: &str) -> Result<SearchResponse>;
    async fn quotes(&self, symbols: &[String]) -> Result<QuotesResponse>;
    async fn chart(&self, symbol: &str) -> Result<ChartSeries>;

    /// Liveness probe. Never fails; an unreachable backend is `Down`.
    async fn health(&self) -> HealthStatus;

    /// Current access-token cookie, when the transport keeps one.
    fn access_token(&self) -> Option<String> {
        None
    }
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    cookies: Arc<Jar>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| ClientError::request(format!("invalid API base URL: {}", e)))?;
        let cookies = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(cookies.clone())
            .timeout(config.request_timeout)
            .build()?;

        Ok(ApiClient {
            client,
            base_url,
            cookies,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{}{}", base, path))
            .map_err(|e| ClientError::request(format!("invalid request URL: {}", e)))
    }

    fn url_with_segment(&self, path: &str, segment: &str) -> Result<Url> {
        let mut url = self.url(path)?;
        url.path_segments_mut()
            .map_err(|_| ClientError::request("API base URL cannot carry a path"))?
            .push(segment);
        Ok(url)
    }

    fn url_with_query(&self, path: &str, key: &str, value: &str) -> Result<Url> {
        let mut url = self.url(path)?;
        url.query_pairs_mut().append_pair(key, value);
        Ok(url)
    }

    fn builder(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("{} {}", method, url);
        self.client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = check(request.send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        self.send(self.builder(Method::GET, url)).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, url: Url, body: &B) -> Result<T> {
        self.send(self.builder(Method::POST, url).json(body)).await
    }

    async fn delete<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        self.send(self.builder(Method::DELETE, url)).await
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let err = ClientError::from_response(status, &body);
    warn!("Request failed with HTTP {}: {}", status, err);
    Err(err)
}

fn required_symbol(raw: &str) -> Result<String> {
    normalize_symbol(raw).ok_or_else(|| ClientError::request("Symbol is required"))
}

#[async_trait]
impl Backend for ApiClient {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<AuthResponse> {
        auth::validate_password(password)?;
        let email = auth::normalize_email(email);
        let body = SignUpRequest {
            email: &email,
            password,
            full_name: full_name.map(str::trim).filter(|name| !name.is_empty()),
        };
        self.post(self.url("/auth/signup")?, &body).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse> {
        auth::validate_password(password)?;
        let email = auth::normalize_email(email);
        let body = SignInRequest {
            email: &email,
            password,
        };
        self.post(self.url("/auth/signin")?, &body).await
    }

    async fn me(&self) -> Result<User> {
        self.get(self.url("/auth/me")?).await
    }

    async fn refresh(&self) -> Result<AuthResponse> {
        let request = self.builder(Method::POST, self.url("/auth/refresh")?);
        self.send(request).await
    }

    async fn logout(&self) -> Result<()> {
        // 204, no body
        let request = self.builder(Method::POST, self.url("/auth/logout")?);
        check(request.send().await?).await?;
        Ok(())
    }

    async fn watchlist(&self) -> Result<WatchlistResponse> {
        self.get(self.url("/api/watchlist")?).await
    }

    async fn add_symbol(&self, symbol: &str) -> Result<WatchlistResponse> {
        let symbol = required_symbol(symbol)?;
        let body = AddSymbolRequest { symbol: &symbol };
        self.post(self.url("/api/watchlist")?, &body).await
    }

    async fn remove_symbol(&self, symbol: &str) -> Result<WatchlistResponse> {
        let symbol = required_symbol(symbol)?;
        self.delete(self.url_with_segment("/api/watchlist", &symbol)?)
            .await
    }

    async fn clear_watchlist(&self) -> Result<WatchlistResponse> {
        self.delete(self.url("/api/watchlist")?).await
    }

    async fn search(&self, query: &str) -> Result<SearchResponse> {
        let url = self.url_with_query("/api/market/search", "q", query.trim())?;
        self.get(url).await
    }

    async fn quotes(&self, symbols: &[String]) -> Result<QuotesResponse> {
        let symbols: Vec<String> = symbols.iter().filter_map(|s| normalize_symbol(s)).collect();
        if symbols.is_empty() {
            return Err(ClientError::request("No symbols provided"));
        }
        let url = self.url_with_query("/api/market/quotes", "symbols", &symbols.join(","))?;
        self.get(url).await
    }

    async fn chart(&self, symbol: &str) -> Result<ChartSeries> {
        let symbol = required_symbol(symbol)?;
        let url = self.url_with_query("/api/market/chart", "symbol", &symbol)?;
        self.get(url).await
    }

    async fn health(&self) -> HealthStatus {
        let url = match self.url("/health") {
            Ok(url) => url,
            Err(_) => return HealthStatus::Down,
        };
        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => HealthStatus::Ok,
            Ok(response) => {
                debug!("Health check returned HTTP {}", response.status());
                HealthStatus::Down
            }
            Err(e) => {
                debug!("Health check failed: {}", e);
                HealthStatus::Down
            }
        }
    }

    fn access_token(&self) -> Option<String> {
        let header = self.cookies.cookies(&self.base_url)?;
        let header = header.to_str().ok()?;
        auth::cookie_value(header, ACCESS_COOKIE)
    }
}
