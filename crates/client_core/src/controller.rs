use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use futures::future::join_all;
use shared::domain::Entity;
use tracing::{debug, error, info, warn};

use crate::{
    notice::{Notice, Notifier},
    query::Filters,
    table::TableWidget,
    tabs::{column_titles, render_rows, DrillDownSpec, Enrichment, Tab, TabConfig},
    view::{ActiveView, ViewState},
    DataFetcher,
};

/// What a controller operation did to the visible view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Rendered { view: ActiveView, rows: usize },
    /// Drill-down returned 404; the view did not move.
    NotFound,
    Failed,
    /// A newer request superseded this one; nothing was rendered.
    Stale,
    Unchanged,
}

struct State<T: TableWidget> {
    table: T,
    initialized: bool,
    view: ViewState,
    /// View whose rows are in the table.
    shown: Option<ActiveView>,
    list_rows: Vec<Entity>,
    list_options: T::Options,
    detail: Level<T::Options>,
    sub_detail: Level<T::Options>,
}

impl<T: TableWidget> State<T> {
    fn options_mut(&mut self, view: ActiveView) -> &mut T::Options {
        match view {
            ActiveView::List => &mut self.list_options,
            ActiveView::Detail => &mut self.detail.options,
            ActiveView::SubDetail => &mut self.sub_detail.options,
        }
    }
}

#[derive(Default)]
struct Level<O> {
    rows: Vec<Entity>,
    parent: Option<Entity>,
    caption: Option<String>,
    options: O,
}

/// List, detail and sub-detail navigation for one dashboard tab.
///
/// Every fetch takes a fresh request token; a response is applied only while
/// its token is still the latest one issued.
pub struct ViewController<T: TableWidget> {
    config: TabConfig,
    fetcher: Arc<dyn DataFetcher>,
    notifier: Arc<dyn Notifier>,
    latest_token: AtomicU64,
    state: Mutex<State<T>>,
}

impl<T: TableWidget> ViewController<T> {
    pub fn new(
        config: TabConfig,
        fetcher: Arc<dyn DataFetcher>,
        notifier: Arc<dyn Notifier>,
        table: T,
    ) -> Self {
        Self {
            config,
            fetcher,
            notifier,
            latest_token: AtomicU64::new(0),
            state: Mutex::new(State {
                table,
                initialized: false,
                view: ViewState::new(),
                shown: None,
                list_rows: Vec::new(),
                list_options: T::Options::default(),
                detail: Level::default(),
                sub_detail: Level::default(),
            }),
        }
    }

    pub fn config(&self) -> &TabConfig {
        &self.config
    }

    pub fn tab(&self) -> Tab {
        self.config.tab
    }

    pub fn fetcher(&self) -> &Arc<dyn DataFetcher> {
        &self.fetcher
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn view_state(&self) -> ViewState {
        self.lock().view.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    pub fn list_rows(&self) -> Vec<Entity> {
        self.lock().list_rows.clone()
    }

    pub fn detail_rows(&self) -> Vec<Entity> {
        self.lock().detail.rows.clone()
    }

    pub fn sub_detail_rows(&self) -> Vec<Entity> {
        self.lock().sub_detail.rows.clone()
    }

    /// Rows currently on screen.
    pub fn active_rows(&self) -> Vec<Entity> {
        let state = self.lock();
        match state.view.active_view() {
            ActiveView::List => state.list_rows.clone(),
            ActiveView::Detail => state.detail.rows.clone(),
            ActiveView::SubDetail => state.sub_detail.rows.clone(),
        }
    }

    pub fn with_table<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.lock().table)
    }

    pub fn with_table_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock().table)
    }

    /// Sets up the list columns and performs the first unfiltered load.
    /// Further calls do nothing.
    pub async fn init(&self) -> Outcome {
        {
            let mut state = self.lock();
            if state.initialized {
                debug!(tab = %self.config.tab, "controller: already initialised");
                return Outcome::Unchanged;
            }
            state.initialized = true;
            state
                .table
                .set_columns(column_titles(&self.config.list.columns));
            state.table.set_caption(None);
        }
        self.load(Filters::new()).await
    }

    /// Fetches the list with the given filters and replaces the cached rows.
    ///
    /// On failure the previous rows and filters stay in place.
    pub async fn load(&self, filters: Filters) -> Outcome {
        let token = self.next_token();
        let query = filters.to_query();
        info!(
            tab = %self.config.tab,
            token,
            query = %filters.query_string(),
            "controller: loading list"
        );

        let rows = match self
            .fetcher
            .get_collection(self.config.list.endpoint, &query)
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                if !self.is_current(token) {
                    debug!(tab = %self.config.tab, token, "controller: stale failure dropped");
                    return Outcome::Stale;
                }
                error!(tab = %self.config.tab, error = %err, "controller: list load failed");
                self.notifier
                    .notify(Notice::error(self.config.list.failure_notice));
                return Outcome::Failed;
            }
        };

        let rows = match self.config.list.enrichment {
            Some(enrichment) => self.enrich(enrichment, rows).await,
            None => rows,
        };

        let mut state = self.lock();
        if !self.is_current(token) {
            debug!(tab = %self.config.tab, token, "controller: stale list response dropped");
            return Outcome::Stale;
        }
        let count = rows.len();
        state.list_rows = rows;
        state.view.filters = filters;
        if state.view.active_view() == ActiveView::List {
            self.render(&mut state);
        }
        Outcome::Rendered {
            view: ActiveView::List,
            rows: count,
        }
    }

    /// Re-runs the last successful load.
    pub async fn reload(&self) -> Outcome {
        let filters = self.lock().view.filters.clone();
        self.load(filters).await
    }

    /// Opens the detail view for a list row.
    pub async fn view_detail(&self, id: i64) -> Outcome {
        self.drill_down(ActiveView::Detail, id).await
    }

    /// Opens the sub-detail view for a detail row.
    pub async fn view_sub_detail(&self, id: i64) -> Outcome {
        self.drill_down(ActiveView::SubDetail, id).await
    }

    /// Drills one level below whatever is showing.
    pub async fn open(&self, id: i64) -> Outcome {
        let active = self.lock().view.active_view();
        match active {
            ActiveView::List => self.view_detail(id).await,
            ActiveView::Detail => self.view_sub_detail(id).await,
            ActiveView::SubDetail => Outcome::Unchanged,
        }
    }

    /// Re-fetches the open detail view in place.
    pub async fn refresh_detail(&self) -> Outcome {
        let Some(spec) = self.config.detail.as_ref() else {
            return Outcome::Unchanged;
        };
        let (id, parent) = {
            let state = self.lock();
            match state.view.detail_id() {
                Some(id) => (id, state.detail.parent.clone()),
                None => return Outcome::Unchanged,
            }
        };
        self.fetch_level(spec, ActiveView::Detail, id, parent, true)
            .await
    }

    /// Steps back to the parent view from the cache.
    pub fn back(&self) -> Outcome {
        let mut state = self.lock();
        if state.view.active_view() == ActiveView::List {
            return Outcome::Unchanged;
        }
        self.next_token();
        state.view.pop();
        let rows = self.render(&mut state);
        Outcome::Rendered {
            view: state.view.active_view(),
            rows,
        }
    }

    /// Returns to the list view from the cache.
    pub fn reset(&self) -> Outcome {
        let mut state = self.lock();
        if state.view.active_view() == ActiveView::List {
            return Outcome::Unchanged;
        }
        self.next_token();
        state.view.reset();
        let rows = self.render(&mut state);
        Outcome::Rendered {
            view: ActiveView::List,
            rows,
        }
    }

    async fn drill_down(&self, target: ActiveView, id: i64) -> Outcome {
        let (spec, parent_view) = match target {
            ActiveView::Detail => (self.config.detail.as_ref(), ActiveView::List),
            ActiveView::SubDetail => (self.config.sub_detail.as_ref(), ActiveView::Detail),
            ActiveView::List => return Outcome::Unchanged,
        };
        let Some(spec) = spec else {
            debug!(tab = %self.config.tab, ?target, "controller: no drill-down configured");
            return Outcome::Unchanged;
        };

        let parent = {
            let state = self.lock();
            if state.view.active_view() != parent_view {
                debug!(tab = %self.config.tab, ?target, "controller: drill-down from wrong view");
                return Outcome::Unchanged;
            }
            let (rows, id_field) = match parent_view {
                ActiveView::List => (&state.list_rows, self.config.list.id_field),
                _ => (
                    &state.detail.rows,
                    self.config
                        .detail
                        .as_ref()
                        .map(|detail| detail.row_id_field)
                        .unwrap_or_default(),
                ),
            };
            rows.iter().find(|row| row.int(id_field) == Some(id)).cloned()
        };

        self.fetch_level(spec, target, id, parent, false).await
    }

    async fn fetch_level(
        &self,
        spec: &DrillDownSpec,
        target: ActiveView,
        id: i64,
        parent: Option<Entity>,
        in_place: bool,
    ) -> Outcome {
        let token = self.next_token();
        let path = spec.endpoint.render(id);
        info!(tab = %self.config.tab, token, path = %path, "controller: drill-down");

        match self.fetcher.get_collection(&path, &[]).await {
            Ok(rows) => {
                let mut state = self.lock();
                if !self.is_current(token) {
                    debug!(tab = %self.config.tab, token, "controller: stale drill-down dropped");
                    return Outcome::Stale;
                }
                let caption = match &parent {
                    Some(parent) => (spec.header)(parent),
                    None => format!("{} {id}", spec.title),
                };
                let count = rows.len();
                let level = match target {
                    ActiveView::SubDetail => &mut state.sub_detail,
                    _ => &mut state.detail,
                };
                // A newly opened record starts with a clean page, sort and search.
                let options = if in_place {
                    std::mem::take(&mut level.options)
                } else {
                    T::Options::default()
                };
                *level = Level {
                    rows,
                    parent,
                    caption: Some(caption),
                    options,
                };
                if !in_place {
                    state.view.push(id);
                }
                self.render(&mut state);
                Outcome::Rendered {
                    view: target,
                    rows: count,
                }
            }
            Err(err) if !self.is_current(token) => {
                debug!(tab = %self.config.tab, token, error = %err, "controller: stale drill-down failure dropped");
                Outcome::Stale
            }
            Err(err) if err.is_not_found() => {
                info!(tab = %self.config.tab, path = %path, "controller: drill-down empty");
                self.notifier.notify(Notice::info(spec.not_found_notice));
                Outcome::NotFound
            }
            Err(err) => {
                error!(tab = %self.config.tab, path = %path, error = %err, "controller: drill-down failed");
                self.notifier.notify(Notice::error(spec.failure_notice));
                Outcome::Failed
            }
        }
    }

    async fn enrich(&self, enrichment: Enrichment, rows: Vec<Entity>) -> Vec<Entity> {
        let id_field = self.config.list.id_field;
        let fetches = rows.into_iter().map(|mut row| async move {
            let extra = match row.int(id_field) {
                Some(id) => {
                    let path = enrichment.endpoint.render(id);
                    match self.fetcher.get_record(&path).await {
                        Ok(extra) => Some(extra),
                        Err(err) => {
                            warn!(tab = %self.config.tab, path = %path, error = %err, "controller: enrichment failed");
                            None
                        }
                    }
                }
                None => None,
            };
            row.merge(extra.unwrap_or_else(enrichment.fallback));
            row
        });
        join_all(fetches).await
    }

    /// Pushes the active view's columns, rows and caption into the table.
    ///
    /// Switching views saves the outgoing view's table options and restores
    /// the incoming view's.
    fn render(&self, state: &mut State<T>) -> usize {
        let target = state.view.active_view();
        let (columns, rows, caption) = match target {
            ActiveView::List => (&self.config.list.columns, &state.list_rows, None),
            ActiveView::Detail => match &self.config.detail {
                Some(spec) => (
                    &spec.columns,
                    &state.detail.rows,
                    state.detail.caption.clone(),
                ),
                None => return 0,
            },
            ActiveView::SubDetail => match &self.config.sub_detail {
                Some(spec) => (
                    &spec.columns,
                    &state.sub_detail.rows,
                    state.sub_detail.caption.clone(),
                ),
                None => return 0,
            },
        };
        let titles = column_titles(columns);
        let cells = render_rows(columns, rows);
        let count = cells.len();
        let switched = state.shown != Some(target);
        if let Some(previous) = state.shown.filter(|_| switched) {
            let options = state.table.options();
            *state.options_mut(previous) = options;
        }
        state.table.set_columns(titles);
        state.table.replace_rows(cells);
        state.table.set_caption(caption);
        if switched {
            let options = std::mem::take(state.options_mut(target));
            state.table.restore_options(options);
            state.shown = Some(target);
        }
        count
    }

    fn next_token(&self) -> u64 {
        self.latest_token.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, token: u64) -> bool {
        self.latest_token.load(Ordering::SeqCst) == token
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
