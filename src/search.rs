// src/search.rs
use crate::api::Backend;
use crate::models::SearchResult;
use crate::stream::StreamState;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    /// Query the results belong to.
    pub query: String,
    pub results: Vec<SearchResult>,
    pub stream: StreamState,
}

/// Debounced symbol search over a text input channel.
///
/// Each input change restarts the delay; a request only fires once the input
/// has been quiet for the whole delay. Blank input clears results at once.
pub struct SearchDebouncer {
    backend: Arc<dyn Backend>,
    input: watch::Receiver<String>,
    delay: Duration,
    state: watch::Sender<SearchState>,
}

impl SearchDebouncer {
    pub fn new(
        backend: Arc<dyn Backend>,
        input: watch::Receiver<String>,
        delay: Duration,
    ) -> (Self, watch::Receiver<SearchState>) {
        let (state, rx) = watch::channel(SearchState::default());
        let debouncer = SearchDebouncer {
            backend,
            input,
            delay,
            state,
        };
        (debouncer, rx)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let SearchDebouncer {
            backend,
            mut input,
            delay,
            state,
        } = self;

        // set when the input moved while we were busy with an older value
        let mut pending = false;

        loop {
            if !pending && input.changed().await.is_err() {
                return;
            }
            pending = false;

            let query = input.borrow_and_update().trim().to_string();
            if query.is_empty() {
                state.send_replace(SearchState::default());
                continue;
            }

            let sleep = time::sleep(delay);
            tokio::pin!(sleep);
            tokio::select! {
                _ = &mut sleep => {}
                changed = input.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    debug!("Search input changed, restarting delay");
                    pending = true;
                    continue;
                }
            }

            state.send_modify(|s| s.stream = StreamState::Pending);
            let fetch = backend.search(&query);
            tokio::pin!(fetch);

            let result = tokio::select! {
                result = &mut fetch => result,
                changed = input.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    debug!("Dropping search for {:?}, input moved on", query);
                    pending = true;
                    continue;
                }
            };

            let next = match result {
                Ok(response) => SearchState {
                    query: query.clone(),
                    results: response.results,
                    stream: StreamState::Settled,
                },
                Err(e) => {
                    warn!("Symbol search failed: {}", e);
                    SearchState {
                        query: query.clone(),
                        results: Vec::new(),
                        stream: StreamState::Failed(e.to_string()),
                    }
                }
            };
            state.send_replace(next);
        }
    }
}
