//! In-memory datasource state mirrored from the backend.
//!
//! # Design
//! `DatasourceStore` is an explicit value: the application builds one per
//! session and shares it by reference (or `Arc`). Its state lives in a
//! `tokio::sync::watch` channel so UI code can `subscribe()` and re-render on
//! every change.
//!
//! Every action follows the same template: mark the store busy, clear the
//! error, make one API call, mirror the result into state, then settle the
//! flags. Failures are absorbed here. Actions return a sentinel (`None`,
//! `false`, or nothing) and record a `StoreError`; they never return `Err`.
//!
//! Overlapping actions are tracked with sequence numbers:
//! - `loading` stays true while any action's call is outstanding. Each call
//!   holds an `InFlight` guard; dropping an action's future mid-call releases
//!   its slot, so cancellation cannot leave `loading` stuck.
//! - `error` is written only by the most recently issued action.
//! - the list and the current datasource accept only the result of the most
//!   recently issued fetch of each.
//!
//! Create, update and delete results are always mirrored.

use serde::Serialize;
use tokio::sync::watch;
use tracing::error;

use crate::api::DatasourceApi;
use crate::client::{DEFAULT_LIMIT, DEFAULT_SKIP};
use crate::error::{ApiError, StoreError};
use crate::transport::Transport;
use crate::types::{Datasource, DatasourceId};

/// Observable store state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub datasources: Vec<Datasource>,
    pub loading: bool,
    pub error: Option<StoreError>,
    pub current_datasource: Option<Datasource>,
    pending: usize,
    action_seq: u64,
    list_seq: u64,
    detail_seq: u64,
}

impl StoreState {
    /// Linear scan for the first datasource with `id`.
    pub fn find(&self, id: DatasourceId) -> Option<&Datasource> {
        self.datasources.iter().find(|ds| ds.id == id)
    }

    fn begin(&mut self) -> u64 {
        self.action_seq += 1;
        self.pending += 1;
        self.loading = true;
        self.error = None;
        self.action_seq
    }

    fn release(&mut self) {
        self.pending = self.pending.saturating_sub(1);
        self.loading = self.pending > 0;
    }

    fn settle(&mut self, token: u64, error: Option<StoreError>) {
        self.release();
        if token == self.action_seq {
            self.error = error;
        }
    }

    fn replace(&mut self, id: DatasourceId, updated: Datasource) {
        if let Some(slot) = self.datasources.iter_mut().find(|ds| ds.id == id) {
            *slot = updated;
        }
    }
}

/// One outstanding action. Settling consumes the guard; dropping it unsettled
/// (the action's future was cancelled) only releases the pending slot.
struct InFlight<'a> {
    state: &'a watch::Sender<StoreState>,
    token: u64,
    armed: bool,
}

impl InFlight<'_> {
    fn settle(mut self, error: Option<StoreError>, apply: impl FnOnce(&mut StoreState)) {
        self.armed = false;
        let token = self.token;
        self.state.send_modify(|s| {
            apply(s);
            s.settle(token, error);
        });
    }

    fn succeed(self, apply: impl FnOnce(&mut StoreState)) {
        self.settle(None, apply);
    }

    fn fail(self, err: &ApiError) {
        self.settle(Some(StoreError::from(err)), |_| {});
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_modify(StoreState::release);
        }
    }
}

/// Datasource state container backed by a `DatasourceApi`.
pub struct DatasourceStore<T> {
    api: DatasourceApi<T>,
    state: watch::Sender<StoreState>,
}

impl<T: Transport> DatasourceStore<T> {
    pub fn new(api: DatasourceApi<T>) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self { api, state }
    }

    pub fn api(&self) -> &DatasourceApi<T> {
        &self.api
    }

    /// Receiver notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.borrow().clone()
    }

    pub fn datasources(&self) -> Vec<Datasource> {
        self.state.borrow().datasources.clone()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn error(&self) -> Option<StoreError> {
        self.state.borrow().error.clone()
    }

    pub fn current_datasource(&self) -> Option<Datasource> {
        self.state.borrow().current_datasource.clone()
    }

    /// Look up a datasource in the loaded list. Never touches the network.
    pub fn get_datasource_by_id(&self, id: DatasourceId) -> Option<Datasource> {
        self.state.borrow().find(id).cloned()
    }

    /// Replace the list with the first page from the backend. On failure the
    /// list is left as it was.
    pub async fn fetch_datasources(&self) {
        self.fetch_datasources_page(DEFAULT_SKIP, DEFAULT_LIMIT).await
    }

    pub async fn fetch_datasources_page(&self, skip: u64, limit: u64) {
        let mut list_token = 0;
        let flight = self.begin_with(|s| {
            s.list_seq += 1;
            list_token = s.list_seq;
        });

        match self.api.get_all(skip, limit).await {
            Ok(datasources) => flight.succeed(|s| {
                if s.list_seq == list_token {
                    s.datasources = datasources;
                }
            }),
            Err(err) => {
                error!(error = %err, "failed to fetch datasources");
                flight.fail(&err);
            }
        }
    }

    /// Fetch one datasource into `current_datasource` and return it.
    pub async fn fetch_datasource_by_id(&self, id: DatasourceId) -> Option<Datasource> {
        let mut detail_token = 0;
        let flight = self.begin_with(|s| {
            s.detail_seq += 1;
            detail_token = s.detail_seq;
        });

        match self.api.get_by_id(id).await {
            Ok(datasource) => {
                flight.succeed(|s| {
                    if s.detail_seq == detail_token {
                        s.current_datasource = datasource.clone();
                    }
                });
                datasource
            }
            Err(err) => {
                error!(id, error = %err, "failed to fetch datasource");
                flight.fail(&err);
                None
            }
        }
    }

    /// Create a datasource and append the backend's record to the list.
    pub async fn create_datasource<E>(&self, entity: &E) -> Option<Datasource>
    where
        E: Serialize + ?Sized,
    {
        let flight = self.begin();

        match self.api.create(entity).await {
            Ok(created) => {
                flight.succeed(|s| {
                    if let Some(ds) = &created {
                        s.datasources.push(ds.clone());
                    }
                });
                created
            }
            Err(err) => {
                error!(error = %err, "failed to create datasource");
                flight.fail(&err);
                None
            }
        }
    }

    /// Update a datasource and replace the loaded entry with the same `id`.
    /// If no entry matches, the list is left unchanged.
    pub async fn update_datasource<E>(&self, id: DatasourceId, entity: &E) -> Option<Datasource>
    where
        E: Serialize + ?Sized,
    {
        let flight = self.begin();

        match self.api.update(id, entity).await {
            Ok(updated) => {
                flight.succeed(|s| {
                    if let Some(ds) = &updated {
                        s.replace(id, ds.clone());
                    }
                });
                updated
            }
            Err(err) => {
                error!(id, error = %err, "failed to update datasource");
                flight.fail(&err);
                None
            }
        }
    }

    /// Delete a datasource and drop every loaded entry with that `id`.
    pub async fn delete_datasource(&self, id: DatasourceId) -> bool {
        let flight = self.begin();

        match self.api.delete(id).await {
            Ok(()) => {
                flight.succeed(|s| s.datasources.retain(|ds| ds.id != id));
                true
            }
            Err(err) => {
                error!(id, error = %err, "failed to delete datasource");
                flight.fail(&err);
                false
            }
        }
    }

    fn begin(&self) -> InFlight<'_> {
        self.begin_with(|_| {})
    }

    fn begin_with(&self, extra: impl FnOnce(&mut StoreState)) -> InFlight<'_> {
        let mut token = 0;
        self.state.send_modify(|s| {
            token = s.begin();
            extra(s);
        });
        InFlight {
            state: &self.state,
            token,
            armed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn failure(message: &str) -> Option<StoreError> {
        Some(StoreError {
            kind: ErrorKind::Status,
            message: message.to_string(),
        })
    }

    #[test]
    fn begin_marks_loading_and_clears_error() {
        let mut state = StoreState {
            error: failure("old"),
            ..StoreState::default()
        };
        let token = state.begin();
        assert_eq!(token, 1);
        assert!(state.loading);
        assert!(state.error.is_none());
    }

    #[test]
    fn settle_clears_loading_when_idle() {
        let mut state = StoreState::default();
        let token = state.begin();
        state.settle(token, failure("boom"));
        assert!(!state.loading);
        assert_eq!(state.error, failure("boom"));
    }

    #[test]
    fn stale_action_keeps_loading_for_newer_one() {
        let mut state = StoreState::default();
        let older = state.begin();
        let newer = state.begin();

        state.settle(older, failure("older failed"));
        assert!(state.loading);
        assert!(state.error.is_none());

        state.settle(newer, None);
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[test]
    fn newer_failure_survives_older_success() {
        let mut state = StoreState::default();
        let older = state.begin();
        let newer = state.begin();

        state.settle(newer, failure("newer failed"));
        assert!(state.loading);
        state.settle(older, None);
        assert!(!state.loading);
        assert_eq!(state.error, failure("newer failed"));
    }

    #[test]
    fn replace_only_touches_matching_entry() {
        let mut state = StoreState {
            datasources: vec![Datasource::new(1), Datasource::new(2)],
            ..StoreState::default()
        };
        state.replace(2, Datasource::new(2).with_field("name", "b"));
        state.replace(9, Datasource::new(9));
        assert_eq!(state.datasources.len(), 2);
        assert_eq!(state.datasources[1].get("name").and_then(|v| v.as_str()), Some("b"));
        assert!(state.find(9).is_none());
    }

    #[test]
    fn dropped_flight_releases_its_slot() {
        let (state, _rx) = watch::channel(StoreState::default());
        let mut token = 0;
        state.send_modify(|s| token = s.begin());
        let flight = InFlight {
            state: &state,
            token,
            armed: true,
        };
        assert!(state.borrow().loading);

        drop(flight);

        assert!(!state.borrow().loading);
        assert_eq!(state.borrow().pending, 0);
    }

    #[test]
    fn settled_flight_does_not_release_twice() {
        let (state, _rx) = watch::channel(StoreState::default());
        let mut tokens = (0, 0);
        state.send_modify(|s| tokens = (s.begin(), s.begin()));
        let first = InFlight {
            state: &state,
            token: tokens.0,
            armed: true,
        };

        first.succeed(|_| {});

        assert!(state.borrow().loading, "second action still outstanding");
        assert_eq!(state.borrow().pending, 1);
    }
}
