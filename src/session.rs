// src/session.rs
use crate::api::Backend;
use crate::auth;
use crate::error::{ClientError, Result};
use crate::models::User;
use chrono::Utc;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Where the signed-in user is sourced from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    /// Re-validated against `/auth/me` on the backend.
    Server,
    /// Read from a JSON record on disk.
    Persisted(PathBuf),
}

/// Where the caller should send the user next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SignIn,
    Dashboard,
}

/// Owns the authenticated user. Readers subscribe; only the store writes.
pub struct SessionStore {
    backend: Arc<dyn Backend>,
    mode: SessionMode,
    user: watch::Sender<Option<User>>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn Backend>, mode: SessionMode) -> Self {
        let (user, _) = watch::channel(None);
        SessionStore {
            backend,
            mode,
            user,
        }
    }

    pub fn mode(&self) -> &SessionMode {
        &self.mode
    }

    pub fn current(&self) -> Option<User> {
        self.user.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.user.subscribe()
    }

    /// Looks up the current session. Any failure means "not signed in".
    pub async fn resolve(&self) -> Route {
        match self.authenticate().await {
            Ok(user) => {
                info!("Session resolved for {}", user.email);
                self.user.send_replace(Some(user));
                Route::Dashboard
            }
            Err(e) => {
                warn!("No valid session: {}", e);
                self.user.send_replace(None);
                Route::SignIn
            }
        }
    }

    async fn authenticate(&self) -> Result<User> {
        match &self.mode {
            SessionMode::Server => self.backend.me().await,
            SessionMode::Persisted(path) => load_user(path).await,
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        let response = self.backend.sign_in(email, password).await?;
        info!("{}", response.message);
        self.establish(response.user).await
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<User> {
        let response = self.backend.sign_up(email, password, full_name).await?;
        info!("{}", response.message);
        self.establish(response.user).await
    }

    /// Rotates the session cookies and refreshes the stored user.
    pub async fn refresh(&self) -> Result<User> {
        let response = self.backend.refresh().await?;
        debug!("{}", response.message);
        self.establish(response.user).await
    }

    async fn establish(&self, user: User) -> Result<User> {
        if let SessionMode::Persisted(path) = &self.mode {
            store_user(path, &user).await?;
        }
        self.user.send_replace(Some(user.clone()));
        Ok(user)
    }

    /// Ends the session in both modes. Backend errors are ignored.
    pub async fn sign_out(&self) -> Route {
        if let Err(e) = self.backend.logout().await {
            debug!("Logout request failed, clearing locally anyway: {}", e);
        }
        self.clear().await;
        Route::SignIn
    }

    async fn clear(&self) {
        if let SessionMode::Persisted(path) = &self.mode {
            if let Err(e) = clear_user(path).await {
                warn!("Failed to remove stored session: {}", e);
            }
        }
        self.user.send_replace(None);
    }

    /// True when the access token's `exp` falls inside `margin`.
    /// Without a readable token there is nothing to refresh.
    pub fn token_expires_within(&self, margin: Duration) -> bool {
        let Some(token) = self.backend.access_token() else {
            return false;
        };
        let margin = chrono::Duration::from_std(margin).unwrap_or_else(|_| chrono::Duration::zero());
        match auth::decode_claims(&token) {
            Ok(claims) => claims.expires_within(Utc::now(), margin),
            Err(e) => {
                debug!("Unreadable access token: {}", e);
                false
            }
        }
    }

    /// Re-validates the session on `interval`. On failure the user is
    /// cleared and `Route::SignIn` is published; the task then stops.
    pub fn spawn_check(
        self: Arc<Self>,
        interval: Duration,
        route: watch::Sender<Route>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick is immediate; the session was just resolved
            ticker.tick().await;

            loop {
                ticker.tick().await;

                if self.token_expires_within(interval * 2) {
                    match self.refresh().await {
                        Ok(_) => debug!("Session refreshed ahead of expiry"),
                        Err(e) => warn!("Session refresh failed: {}", e),
                    }
                }

                match self.authenticate().await {
                    Ok(user) => {
                        self.user.send_if_modified(|current| {
                            if current.as_ref() == Some(&user) {
                                false
                            } else {
                                *current = Some(user);
                                true
                            }
                        });
                    }
                    Err(e) => {
                        warn!("Session check failed, signing out: {}", e);
                        self.clear().await;
                        route.send_replace(Route::SignIn);
                        return;
                    }
                }
            }
        })
    }
}

pub async fn load_user(path: &Path) -> Result<User> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ClientError::Unauthenticated)
        }
        Err(e) => return Err(e.into()),
    };
    if raw.trim().is_empty() {
        return Err(ClientError::Unauthenticated);
    }
    Ok(serde_json::from_str(&raw)?)
}

pub async fn store_user(path: &Path, user: &User) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string(user)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

pub async fn clear_user(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
