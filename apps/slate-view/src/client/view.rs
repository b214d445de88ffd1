//! One live table view: the state owned by the controller task and the loop
//! that feeds it.
//!
//! [`ViewContext`] is synchronous and never touches the network. Handlers
//! return [`Effect`]s; the [`ViewController`] runs them on spawned tasks and
//! routes the answers back as [`ViewEvent`]s, so the context is mutated from
//! one task only.

use std::io::{Stdout, stdout};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use serde_json::Value as Json;
use sniffer_sdk::{Field, Row, SnifferApi, SnifferError};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::fetch::{FetchError, FetchLoop, FetchOutcome, should_poll};
use crate::client::inject::{InjectDraft, InjectStatus};
use crate::client::keys::{ViewAction, map_event};
use crate::client::prefill;
use crate::client::status::StatusToggle;
use crate::config::ViewConfig;
use crate::render::table_view::{self, ColumnLayout};
use crate::render::viewport::Viewport;
use crate::table::{Autoscroll, ScrollCommand, TableState};

const HOUSEKEEPING_INTERVAL: Duration = Duration::from_millis(250);
const INPUT_POLL: Duration = Duration::from_millis(100);

/// Answer from a spawned backend call.
#[derive(Debug)]
pub enum ViewEvent {
    Fetched {
        initial: bool,
        result: Result<FetchOutcome, FetchError>,
    },
    StatusRead(Result<bool, SnifferError>),
    StatusResolved {
        requested: bool,
        result: Result<bool, SnifferError>,
    },
    InjectFinished(Result<(), SnifferError>),
}

/// Backend work requested by the context.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Fetch {
        initial: bool,
        watermark: Option<u64>,
    },
    ReadStatus,
    SetStatus(bool),
    Inject(Vec<Json>),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    expires_at: Instant,
}

/// Everything one view shows, owned by a single task.
pub struct ViewContext {
    service: String,
    schema: Vec<Field>,
    table: TableState,
    autoscroll: Autoscroll,
    status: StatusToggle,
    inject: InjectStatus,
    viewport: Viewport,
    chooser_open: bool,
    chooser_cursor: usize,
    notice: Option<Notice>,
    notice_ttl: Duration,
    prefill: Option<(u64, String)>,
    layout: ColumnLayout,
    first_tick_issued: bool,
    status_read_in_flight: bool,
    scroll_due: bool,
}

impl ViewContext {
    pub fn new(service: impl Into<String>, schema: Vec<Field>, config: &ViewConfig) -> Self {
        let columns = schema.len();
        Self {
            service: service.into(),
            schema,
            table: TableState::new(columns),
            autoscroll: Autoscroll::new(config.autoscroll),
            status: StatusToggle::new(),
            inject: InjectStatus::Idle,
            viewport: Viewport::default(),
            chooser_open: false,
            chooser_cursor: 0,
            notice: None,
            notice_ttl: config.notice_ttl,
            prefill: None,
            layout: ColumnLayout::default(),
            first_tick_issued: false,
            status_read_in_flight: false,
            scroll_due: false,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn schema(&self) -> &[Field] {
        &self.schema
    }

    pub fn table(&self) -> &TableState {
        &self.table
    }

    pub fn autoscroll(&self) -> &Autoscroll {
        &self.autoscroll
    }

    pub fn status(&self) -> &StatusToggle {
        &self.status
    }

    pub fn inject_status(&self) -> InjectStatus {
        self.inject
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn chooser_open(&self) -> bool {
        self.chooser_open
    }

    pub fn chooser_cursor(&self) -> usize {
        self.chooser_cursor
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_ref().map(|n| n.text.as_str())
    }

    /// Prefill text of the last row asked for, with that row's id.
    pub fn prefill(&self) -> Option<(u64, &str)> {
        self.prefill.as_ref().map(|(id, text)| (*id, text.as_str()))
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    /// Rebuilds the column layout if visibility changed since the last
    /// frame. Returns whether it was rebuilt.
    pub fn refresh_layout(&mut self) -> bool {
        self.layout.refresh(self.table.visibility(), &self.schema)
    }

    pub fn notify(&mut self, text: impl Into<String>, now: Instant) {
        self.notice = Some(Notice {
            text: text.into(),
            expires_at: now + self.notice_ttl,
        });
    }

    /// Drops an expired notice. Returns whether anything changed.
    pub fn expire_notice(&mut self, now: Instant) -> bool {
        if self.notice.as_ref().is_some_and(|n| n.expires_at <= now) {
            self.notice = None;
            return true;
        }
        false
    }

    /// Asks for the capture status while it is still unknown, with at most
    /// one read outstanding. Polling stays gated off until a read lands.
    pub fn request_status(&mut self) -> Option<Effect> {
        if self.status.capturing().is_some() || self.status_read_in_flight {
            return None;
        }
        self.status_read_in_flight = true;
        Some(Effect::ReadStatus)
    }

    /// Interval tick: decides whether this tick fetches.
    pub fn on_tick(&mut self) -> Option<Effect> {
        let first = !self.first_tick_issued;
        if !should_poll(first, self.status.is_capturing()) {
            return None;
        }
        self.first_tick_issued = true;
        Some(Effect::Fetch {
            initial: first,
            watermark: self.table.watermark(),
        })
    }

    pub fn handle_event(&mut self, event: ViewEvent, now: Instant) {
        match event {
            ViewEvent::Fetched { initial, result } => match result {
                Ok(outcome) => self.apply_rows(outcome.into_rows(), initial),
                Err(FetchError::Decode { id, source }) => {
                    // The same message comes back on every tick until the
                    // backend drops it or the schema changes.
                    warn!(
                        target = "slate::fetch",
                        service = %self.service,
                        stuck_id = id,
                        watermark = ?self.table.watermark(),
                        error = %source,
                        "message does not decode, view is stalled behind it"
                    );
                }
                Err(err) => {
                    warn!(
                        target = "slate::fetch",
                        service = %self.service,
                        error = %err,
                        "fetch tick failed"
                    );
                }
            },
            ViewEvent::StatusRead(result) => {
                self.status_read_in_flight = false;
                match result {
                    Ok(capturing) => self.status.observe(capturing),
                    Err(err) => {
                        warn!(target = "slate::status", error = %err, "status read failed");
                    }
                }
            }
            ViewEvent::StatusResolved { requested, result } => {
                if let Some(message) = self.status.resolve(requested, result) {
                    self.notify(message, now);
                }
            }
            ViewEvent::InjectFinished(result) => {
                self.inject = match result {
                    Ok(()) => InjectStatus::Sent,
                    Err(err) => {
                        warn!(target = "slate::inject", error = %err, "inject failed");
                        InjectStatus::Failed
                    }
                };
                self.notify(self.inject.label(), now);
            }
        }
    }

    fn apply_rows(&mut self, rows: Vec<Row>, initial: bool) {
        let report = self.table.merge(rows);
        if report.is_noop() {
            return;
        }
        self.viewport.set_total(self.table.len());
        // History shown at open is left where it lands.
        if !initial {
            self.scroll_due = true;
        }
    }

    /// Called once the frame holding newly merged rows has been drawn.
    /// Returns true when a programmatic scroll moved the view and another
    /// frame is needed.
    pub fn after_render(&mut self) -> bool {
        let mut scrolled = false;
        if std::mem::take(&mut self.scroll_due) {
            if let Some(ScrollCommand::ToBottom) = self.autoscroll.on_rows_rendered() {
                self.viewport.scroll_to_bottom();
                scrolled = true;
            }
        }
        self.drain_scroll_events();
        scrolled
    }

    fn drain_scroll_events(&mut self) {
        for event in self.viewport.take_events() {
            self.autoscroll.on_scroll(event.at_bottom);
        }
    }

    fn top_row(&self) -> Option<&Row> {
        self.table.rows().get(self.viewport.visible_range().start)
    }

    pub fn apply_action(&mut self, action: ViewAction, now: Instant) -> Option<Effect> {
        let columns = self.table.columns();
        match action {
            ViewAction::Quit => return Some(Effect::Quit),
            ViewAction::ToggleStatus => {
                return self.status.begin_toggle().map(Effect::SetStatus);
            }
            ViewAction::ToggleChooser => self.chooser_open = !self.chooser_open,
            ViewAction::ChooserUp => self.chooser_cursor = self.chooser_cursor.saturating_sub(1),
            ViewAction::ChooserDown => {
                if self.chooser_cursor + 1 < columns {
                    self.chooser_cursor += 1;
                }
            }
            ViewAction::ChooserToggle => {
                let column = self.chooser_cursor;
                let visible = !self.table.visibility().is_visible(column);
                if let Err(err) = self.table.visibility_mut().toggle(column, visible) {
                    debug!(target = "slate::columns", error = %err, "toggle ignored");
                }
            }
            ViewAction::ShowAll => self.table.visibility_mut().set_all(true),
            ViewAction::HideAll => self.table.visibility_mut().set_all(false),
            ViewAction::OnlyChanged => self.table.show_only_changed(),
            ViewAction::ShowPrefill => match self.top_row() {
                Some(row) => {
                    let id = row.id;
                    let encoded = prefill::encode_row(row);
                    info!(target = "slate::inject", id, prefill = %encoded, "prefill");
                    self.prefill = Some((id, encoded));
                }
                None => self.notify("No row to encode", now),
            },
            ViewAction::Reinject => {
                if self.inject.is_busy() {
                    return None;
                }
                let Some(row) = self.top_row() else {
                    self.notify("No row to inject", now);
                    return None;
                };
                let draft =
                    match InjectDraft::from_row_values(self.schema.clone(), row.values.clone()) {
                        Ok(draft) => draft,
                        Err(err) => {
                            let id = row.id;
                            warn!(
                                target = "slate::inject",
                                id,
                                error = %err,
                                "row cannot be re-injected"
                            );
                            self.inject = InjectStatus::Failed;
                            self.notify(self.inject.label(), now);
                            return None;
                        }
                    };
                let message = draft.to_message();
                self.inject = InjectStatus::Sending;
                self.notify(self.inject.label(), now);
                return Some(Effect::Inject(message));
            }
            ViewAction::ScrollLines(delta) => self.viewport.scroll_lines(delta),
            ViewAction::ScrollPages(delta) => self.viewport.scroll_pages(delta),
            ViewAction::ScrollTop => self.viewport.scroll_to_top(),
            ViewAction::ScrollBottom => self.viewport.scroll_to_bottom(),
            ViewAction::Resize { .. } => {}
        }
        self.drain_scroll_events();
        None
    }
}

/// Runs effects against the backend.
#[derive(Clone)]
pub struct EffectRunner {
    api: Arc<dyn SnifferApi>,
    fetch: FetchLoop,
}

impl EffectRunner {
    pub fn new(api: Arc<dyn SnifferApi>, fetch: FetchLoop) -> Self {
        Self { api, fetch }
    }

    pub fn fetch_loop(&self) -> &FetchLoop {
        &self.fetch
    }

    /// Performs one effect and returns the event carrying its answer.
    /// `Quit` has no answer.
    pub async fn perform(&self, effect: Effect) -> Option<ViewEvent> {
        let event = match effect {
            Effect::Fetch { initial, watermark } => ViewEvent::Fetched {
                initial,
                result: self.fetch.fetch_once(watermark).await,
            },
            Effect::ReadStatus => ViewEvent::StatusRead(self.api.get_status().await),
            Effect::SetStatus(requested) => ViewEvent::StatusResolved {
                requested,
                result: self.api.set_status(requested).await,
            },
            Effect::Inject(message) => {
                ViewEvent::InjectFinished(self.api.inject(self.fetch.service(), message).await)
            }
            Effect::Quit => return None,
        };
        Some(event)
    }

    pub fn spawn(&self, effect: Effect, tx: mpsc::Sender<ViewEvent>) {
        let runner = self.clone();
        tokio::spawn(async move {
            let Some(event) = runner.perform(effect).await else {
                return;
            };
            if tx.send(event).await.is_err() {
                debug!(target = "slate::view", "view closed before answer arrived");
            }
        });
    }
}

/// Drives a [`ViewContext`] inside the terminal.
pub struct ViewController {
    ctx: ViewContext,
    runner: EffectRunner,
}

impl ViewController {
    /// Loads the schema and prepares a view of `service`.
    pub async fn open(
        api: Arc<dyn SnifferApi>,
        service: &str,
        config: &ViewConfig,
    ) -> Result<Self, SnifferError> {
        let schema = api.get_schema(service).await?;
        info!(
            target = "slate::view",
            service,
            columns = schema.len(),
            poll_ms = config.poll_interval.as_millis() as u64,
            "opening view"
        );
        let fetch = FetchLoop::new(api.clone(), service, schema.clone(), config.poll_interval);
        Ok(Self {
            ctx: ViewContext::new(service, schema, config),
            runner: EffectRunner::new(api, fetch),
        })
    }

    pub fn context(&self) -> &ViewContext {
        &self.ctx
    }

    pub async fn run(mut self) -> Result<()> {
        let (tx, mut rx) = mpsc::channel::<ViewEvent>(64);
        let (input_tx, mut input_rx) = mpsc::unbounded_channel::<Event>();
        spawn_input_reader(input_tx);

        let mut ticker = self.runner.fetch_loop().ticker();
        let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);

        let mut terminal = setup_tui()?;
        let result = loop {
            if let Err(err) = self.draw(&mut terminal) {
                break Err(err);
            }
            tokio::select! {
                _ = ticker.tick() => {
                    // Retried each tick until the capture status is known.
                    if let Some(effect) = self.ctx.request_status() {
                        self.runner.spawn(effect, tx.clone());
                    }
                    if let Some(effect) = self.ctx.on_tick() {
                        self.runner.spawn(effect, tx.clone());
                    }
                }
                Some(event) = rx.recv() => self.ctx.handle_event(event, Instant::now()),
                input = input_rx.recv() => {
                    let Some(input) = input else {
                        break Ok(());
                    };
                    let Some(action) = map_event(&input, self.ctx.chooser_open()) else {
                        continue;
                    };
                    match self.ctx.apply_action(action, Instant::now()) {
                        Some(Effect::Quit) => break Ok(()),
                        Some(effect) => self.runner.spawn(effect, tx.clone()),
                        None => {}
                    }
                }
                _ = housekeeping.tick() => {
                    self.ctx.expire_notice(Instant::now());
                }
            }
        };
        teardown_tui(&mut terminal)?;
        info!(target = "slate::view", service = %self.ctx.service(), "view closed");
        result
    }

    fn draw(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        terminal.draw(|frame| table_view::render_frame(frame, &mut self.ctx))?;
        if self.ctx.after_render() {
            terminal.draw(|frame| table_view::render_frame(frame, &mut self.ctx))?;
        }
        Ok(())
    }
}

fn spawn_input_reader(tx: mpsc::UnboundedSender<Event>) {
    std::thread::spawn(move || {
        loop {
            match event::poll(INPUT_POLL) {
                Ok(true) => match event::read() {
                    Ok(ev) => {
                        if tx.send(ev).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(target = "slate::input", error = %err, "terminal read failed");
                        break;
                    }
                },
                Ok(false) => {
                    if tx.is_closed() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(target = "slate::input", error = %err, "terminal poll failed");
                    break;
                }
            }
        }
    });
}

fn setup_tui() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(out))?;
    terminal.clear()?;
    Ok(terminal)
}

fn teardown_tui(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sniffer_sdk::{FieldType, Value};

    fn context() -> ViewContext {
        let schema = vec![
            Field::new("a", FieldType::Bool),
            Field::new("b", FieldType::Int32),
        ];
        let mut ctx = ViewContext::new("plc", schema, &ViewConfig::default());
        ctx.viewport_mut().set_height(2);
        ctx
    }

    fn batch(ids: std::ops::Range<u64>) -> ViewEvent {
        ViewEvent::Fetched {
            initial: false,
            result: Ok(FetchOutcome::Batch(
                ids.map(|id| Row::new(id, vec![Value::Bool(false), Value::Int(id as i64)]))
                    .collect(),
            )),
        }
    }

    #[test]
    fn first_tick_fetches_unconditionally() {
        let mut ctx = context();
        assert_eq!(
            ctx.on_tick(),
            Some(Effect::Fetch {
                initial: true,
                watermark: None
            })
        );
        assert_eq!(ctx.on_tick(), None);
        ctx.handle_event(ViewEvent::StatusRead(Ok(true)), Instant::now());
        assert_eq!(
            ctx.on_tick(),
            Some(Effect::Fetch {
                initial: false,
                watermark: None
            })
        );
    }

    #[test]
    fn status_is_requested_until_a_read_lands() {
        let mut ctx = context();
        assert_eq!(ctx.request_status(), Some(Effect::ReadStatus));
        assert_eq!(ctx.request_status(), None);

        ctx.handle_event(
            ViewEvent::StatusRead(Err(SnifferError::Unavailable("down".into()))),
            Instant::now(),
        );
        assert_eq!(ctx.status().capturing(), None);
        assert_eq!(ctx.request_status(), Some(Effect::ReadStatus));

        ctx.handle_event(ViewEvent::StatusRead(Ok(false)), Instant::now());
        assert_eq!(ctx.request_status(), None);
    }

    #[test]
    fn following_scrolls_after_new_rows() {
        let mut ctx = context();
        ctx.handle_event(batch(0..5), Instant::now());
        assert!(ctx.after_render());
        assert!(ctx.viewport().is_at_bottom());
        assert!(ctx.autoscroll().is_following());
        assert!(!ctx.autoscroll().is_suppressing());
        assert!(!ctx.after_render());
    }

    #[test]
    fn initial_history_does_not_scroll() {
        let mut ctx = context();
        ctx.handle_event(
            ViewEvent::Fetched {
                initial: true,
                result: Ok(FetchOutcome::Batch(vec![
                    Row::new(0, vec![Value::Bool(false), Value::Int(0)]),
                    Row::new(1, vec![Value::Bool(false), Value::Int(1)]),
                    Row::new(2, vec![Value::Bool(false), Value::Int(2)]),
                ])),
            },
            Instant::now(),
        );
        assert!(!ctx.after_render());
        assert_eq!(ctx.viewport().scroll_top(), 0);
    }

    #[test]
    fn user_scroll_detaches_and_stops_following() {
        let mut ctx = context();
        ctx.handle_event(batch(0..5), Instant::now());
        ctx.after_render();
        ctx.apply_action(ViewAction::ScrollLines(-1), Instant::now());
        assert!(!ctx.autoscroll().is_following());

        ctx.handle_event(batch(5..8), Instant::now());
        assert!(!ctx.after_render());
        assert_eq!(ctx.viewport().scroll_top(), 2);
    }

    #[test]
    fn failed_fetch_is_swallowed() {
        let mut ctx = context();
        ctx.handle_event(
            ViewEvent::Fetched {
                initial: false,
                result: Err(FetchError::Sniffer(SnifferError::Unavailable("down".into()))),
            },
            Instant::now(),
        );
        assert!(ctx.table().is_empty());
        assert_eq!(ctx.notice(), None);
    }

    #[test]
    fn chooser_actions_drive_visibility() {
        let mut ctx = context();
        ctx.apply_action(ViewAction::ToggleChooser, Instant::now());
        ctx.apply_action(ViewAction::ChooserDown, Instant::now());
        ctx.apply_action(ViewAction::ChooserDown, Instant::now());
        assert_eq!(ctx.chooser_cursor(), 1);
        ctx.apply_action(ViewAction::ChooserToggle, Instant::now());
        assert_eq!(ctx.table().visibility().visible_columns(), vec![0]);
        ctx.apply_action(ViewAction::OnlyChanged, Instant::now());
        assert!(ctx.table().visibility().visible_columns().is_empty());
        ctx.apply_action(ViewAction::ShowAll, Instant::now());
        assert_eq!(ctx.table().visibility().visible_columns(), vec![0, 1]);
    }

    #[test]
    fn notices_expire() {
        let mut ctx = context();
        let now = Instant::now();
        ctx.notify("hello", now);
        assert!(!ctx.expire_notice(now + Duration::from_secs(1)));
        assert!(ctx.expire_notice(now + Duration::from_secs(3)));
        assert_eq!(ctx.notice(), None);
    }
}
