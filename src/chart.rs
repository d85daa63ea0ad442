// src/chart.rs
use crate::api::Backend;
use crate::error::Result;
use crate::models::ChartSeries;
use crate::stream::StreamState;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The one active series. `series.symbol` always matches the selection it was
/// loaded for, and there is no series without a selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartState {
    pub selected: Option<String>,
    pub series: Option<ChartSeries>,
    pub stream: StreamState,
}

impl ChartState {
    /// The chart as it applies to `selected`. Until the loader picks up a new
    /// selection there is no series to show for it.
    pub fn for_selection(&self, selected: Option<&str>) -> ChartState {
        if self.selected.as_deref() == selected {
            return self.clone();
        }
        match selected {
            Some(symbol) => ChartState {
                selected: Some(symbol.to_string()),
                series: None,
                stream: StreamState::Pending,
            },
            None => ChartState::default(),
        }
    }
}

pub struct ChartLoader {
    backend: Arc<dyn Backend>,
    selection: watch::Receiver<Option<String>>,
    state: watch::Sender<ChartState>,
}

impl ChartLoader {
    pub fn new(
        backend: Arc<dyn Backend>,
        selection: watch::Receiver<Option<String>>,
    ) -> (Self, watch::Receiver<ChartState>) {
        let (state, rx) = watch::channel(ChartState::default());
        let loader = ChartLoader {
            backend,
            selection,
            state,
        };
        (loader, rx)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let ChartLoader {
            backend,
            mut selection,
            state,
        } = self;

        loop {
            let selected = selection.borrow_and_update().clone();

            let Some(symbol) = selected else {
                state.send_replace(ChartState::default());
                if selection.changed().await.is_err() {
                    return;
                }
                continue;
            };

            state.send_replace(ChartState {
                selected: Some(symbol.clone()),
                series: None,
                stream: StreamState::Pending,
            });

            let fetch = backend.chart(&symbol);
            tokio::pin!(fetch);

            // a selection change abandons the load and starts over
            let result = tokio::select! {
                result = &mut fetch => result,
                changed = selection.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    debug!("Selection moved off {} before its chart arrived", symbol);
                    continue;
                }
            };

            if selection.borrow().as_deref() != Some(symbol.as_str()) {
                debug!("Discarding chart for {}, no longer selected", symbol);
                continue;
            }
            apply(&state, &symbol, result);

            if selection.changed().await.is_err() {
                return;
            }
        }
    }
}

fn apply(state: &watch::Sender<ChartState>, symbol: &str, result: Result<ChartSeries>) {
    let (series, stream) = match result {
        Ok(series) if series.symbol.eq_ignore_ascii_case(symbol) => {
            info!("Loaded {} chart point(s) for {}", series.points.len(), symbol);
            (Some(series), StreamState::Settled)
        }
        Ok(series) => {
            warn!("Chart for {} answered with {}", symbol, series.symbol);
            (
                None,
                StreamState::Failed(format!("chart response was for {}", series.symbol)),
            )
        }
        Err(e) => {
            warn!("Failed to load chart for {}: {}", symbol, e);
            (None, StreamState::Failed(e.to_string()))
        }
    };
    state.send_replace(ChartState {
        selected: Some(symbol.to_string()),
        series,
        stream,
    });
}
