//! Application state and interaction logic.

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};

use pipewatch_types::{PipelineComponent, PipelineSnapshot};

use crate::error::QueryError;
use crate::link::{ConnectionManager, LinkStatus};
use crate::query::QueryGateway;
use crate::ui::Theme;

/// How long a status message stays on screen.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// Longest query response shown inline in the status bar.
const RESPONSE_PREVIEW_CHARS: usize = 80;

/// What a text prompt is collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// A query for the request/response channel.
    Query,
    /// A new subscription identifier.
    Pipeline,
}

impl PromptKind {
    /// Returns the label shown in front of the input.
    pub fn label(&self) -> &'static str {
        match self {
            PromptKind::Query => "query",
            PromptKind::Pipeline => "pipeline",
        }
    }
}

/// Text being typed into the bottom prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub text: String,
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub show_help: bool,
    pub show_detail_overlay: bool,

    // Live link
    link: ConnectionManager,
    snapshot_rx: watch::Receiver<PipelineSnapshot>,
    status_rx: watch::Receiver<LinkStatus>,
    pub snapshot: PipelineSnapshot,
    pub link_status: LinkStatus,
    pub last_update: Option<Instant>,

    // Queries
    gateway: QueryGateway,
    runtime: Handle,
    pending_query: Option<oneshot::Receiver<Result<Value, QueryError>>>,
    pub last_response: Option<Value>,

    // Navigation state
    pub selected_index: usize,
    pub prompt: Option<Prompt>,

    // UI
    pub theme: Theme,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create a new App around a running link.
    ///
    /// `runtime` is used to run query submissions off the UI thread.
    pub fn new(link: ConnectionManager, gateway: QueryGateway, runtime: Handle, theme: Theme) -> Self {
        let mut snapshot_rx = link.snapshot();
        let mut status_rx = link.status();
        let snapshot = snapshot_rx.borrow_and_update().clone();
        let link_status = status_rx.borrow_and_update().clone();

        Self {
            running: true,
            show_help: false,
            show_detail_overlay: false,
            link,
            snapshot_rx,
            status_rx,
            snapshot,
            link_status,
            last_update: None,
            gateway,
            runtime,
            pending_query: None,
            last_response: None,
            selected_index: 0,
            prompt: None,
            theme,
            status_message: None,
        }
    }

    /// Pull the latest snapshot, link status and query outcome.
    ///
    /// Returns true if anything visible changed.
    pub fn refresh(&mut self) -> bool {
        let mut changed = false;

        if self.snapshot_rx.has_changed().unwrap_or(false) {
            self.snapshot = self.snapshot_rx.borrow_and_update().clone();
            self.last_update = Some(Instant::now());
            self.clamp_selection();
            changed = true;
        }

        if self.status_rx.has_changed().unwrap_or(false) {
            self.link_status = self.status_rx.borrow_and_update().clone();
            changed = true;
        }

        changed | self.poll_query()
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        match &self.status_message {
            Some((msg, time)) if time.elapsed() < STATUS_MESSAGE_TTL => Some(msg),
            _ => None,
        }
    }

    pub fn component_count(&self) -> usize {
        self.snapshot.components.len()
    }

    /// The component under the cursor, in display order.
    pub fn selected_component(&self) -> Option<&PipelineComponent> {
        self.snapshot
            .ordered_components()
            .get(self.selected_index)
            .copied()
    }

    /// Move selection down by one item.
    pub fn select_next(&mut self) {
        self.select_next_n(1);
    }

    /// Move selection up by one item.
    pub fn select_prev(&mut self) {
        self.select_prev_n(1);
    }

    /// Move selection down by n items.
    pub fn select_next_n(&mut self, n: usize) {
        let max = self.component_count().saturating_sub(1);
        self.selected_index = (self.selected_index + n).min(max);
    }

    /// Move selection up by n items.
    pub fn select_prev_n(&mut self, n: usize) {
        self.selected_index = self.selected_index.saturating_sub(n);
    }

    /// Jump to the first item in the list.
    pub fn select_first(&mut self) {
        self.selected_index = 0;
    }

    /// Jump to the last item in the list.
    pub fn select_last(&mut self) {
        self.selected_index = self.component_count().saturating_sub(1);
    }

    /// Select a row if it exists.
    pub fn select(&mut self, index: usize) {
        if index < self.component_count() {
            self.selected_index = index;
        }
    }

    fn clamp_selection(&mut self) {
        let max = self.component_count().saturating_sub(1);
        self.selected_index = self.selected_index.min(max);
    }

    /// Open the detail overlay for the selected component.
    pub fn enter_detail(&mut self) {
        if self.selected_component().is_some() {
            self.show_detail_overlay = true;
        }
    }

    /// Close the detail overlay if open.
    pub fn close_overlay(&mut self) {
        self.show_detail_overlay = false;
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Start collecting text for a query or a pipeline switch.
    pub fn start_prompt(&mut self, kind: PromptKind) {
        let text = match kind {
            PromptKind::Query => String::new(),
            PromptKind::Pipeline => self.link_status.subscription.clone(),
        };
        self.prompt = Some(Prompt { kind, text });
    }

    /// Abandon the prompt without acting on it.
    pub fn cancel_prompt(&mut self) {
        self.prompt = None;
    }

    /// Append a character to the prompt text.
    pub fn prompt_push(&mut self, c: char) {
        if let Some(prompt) = &mut self.prompt {
            prompt.text.push(c);
        }
    }

    /// Remove the last character from the prompt text.
    pub fn prompt_pop(&mut self) {
        if let Some(prompt) = &mut self.prompt {
            prompt.text.pop();
        }
    }

    /// Act on the prompt and close it.
    pub fn submit_prompt(&mut self) {
        let Some(prompt) = self.prompt.take() else {
            return;
        };
        match prompt.kind {
            PromptKind::Query => self.submit_query(&prompt.text),
            PromptKind::Pipeline => self.change_pipeline(&prompt.text),
        }
    }

    /// True while a submitted query has not answered yet.
    pub fn query_in_flight(&self) -> bool {
        self.pending_query.is_some()
    }

    /// Submit a query in the background. Only one may be outstanding.
    pub fn submit_query(&mut self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            self.set_status_message("Empty query not sent".to_string());
            return;
        }
        if self.query_in_flight() {
            self.set_status_message("A query is already running".to_string());
            return;
        }

        let (tx, rx) = oneshot::channel();
        let gateway = self.gateway.clone();
        let query = query.to_string();
        self.runtime.spawn(async move {
            let _ = tx.send(gateway.submit(&query).await);
        });
        self.pending_query = Some(rx);
        self.set_status_message("Query submitted".to_string());
    }

    fn poll_query(&mut self) -> bool {
        let Some(rx) = &mut self.pending_query else {
            return false;
        };
        let message = match rx.try_recv() {
            Err(oneshot::error::TryRecvError::Empty) => return false,
            Err(oneshot::error::TryRecvError::Closed) => "Query was cancelled".to_string(),
            Ok(Ok(response)) => {
                let message = format!("Query ok: {}", preview(&response));
                self.last_response = Some(response);
                message
            }
            Ok(Err(e)) => format!("Query failed: {}", e),
        };
        self.pending_query = None;
        self.set_status_message(message);
        true
    }

    /// Subscribe to another pipeline.
    pub fn change_pipeline(&mut self, pipeline_id: &str) {
        let pipeline_id = pipeline_id.trim();
        if pipeline_id.is_empty() || pipeline_id == self.link_status.subscription {
            return;
        }
        self.link.set_subscription(pipeline_id);
        self.selected_index = 0;
        self.show_detail_overlay = false;
        self.set_status_message(format!("Switching to pipeline {}", pipeline_id));
    }

    /// Connect now, skipping any pending reconnect delay.
    pub fn reconnect(&mut self) {
        self.link.open();
        self.set_status_message("Reconnecting...".to_string());
    }

    /// Close the link and signal the application to quit.
    pub fn quit(&mut self) {
        self.link.close();
        self.running = false;
    }

    /// Give back the link handle, e.g. to wait for it to stop.
    pub fn into_link(self) -> ConnectionManager {
        self.link
    }
}

/// Compact one-line rendering of a JSON response.
fn preview(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() <= RESPONSE_PREVIEW_CHARS {
        return text;
    }
    let mut cut: String = text.chars().take(RESPONSE_PREVIEW_CHARS).collect();
    cut.push('…');
    cut
}


#[cfg(test)]
mod tests {
    use super::testing::{app as test_app, app_with_api};
    use super::*;
    use crate::link::ConnectionState;
    use tokio::net::TcpListener;

    const FRAME: &str = r#"{
        "status": "running",
        "components": [
            {"name": "join", "order": 2},
            {"name": "ingest", "order": 1},
            {"name": "export", "order": 3}
        ],
        "pipelineData": {"ingest.rows": "10"}
    }"#;

    async fn wait_until(app: &mut App, done: impl Fn(&App) -> bool) {
        for _ in 0..100 {
            app.refresh();
            if done(app) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_refresh_picks_up_snapshot() {
        let (mut app, mut attempts) = test_app();
        app.reconnect();
        let mut peer = attempts.recv().await.unwrap().accept();
        peer.recv().await.unwrap();
        peer.push(FRAME);

        wait_until(&mut app, |a| a.component_count() == 3).await;
        assert!(app.last_update.is_some());
        assert_eq!(app.link_status.state, ConnectionState::Connected);
        assert_eq!(app.selected_component().unwrap().name, "ingest");

        app.select_last();
        assert_eq!(app.selected_component().unwrap().name, "export");
        app.select_next();
        assert_eq!(app.selected_index, 2);
        app.select_prev_n(10);
        assert_eq!(app.selected_index, 0);
    }

    #[tokio::test]
    async fn test_selection_on_empty_snapshot() {
        let (mut app, _attempts) = test_app();
        app.select_next();
        app.select_last();
        assert_eq!(app.selected_index, 0);
        assert!(app.selected_component().is_none());

        app.enter_detail();
        assert!(!app.show_detail_overlay);
    }

    #[tokio::test]
    async fn test_pipeline_prompt_switches_subscription() {
        let (mut app, _attempts) = test_app();
        app.start_prompt(PromptKind::Pipeline);
        assert_eq!(app.prompt.as_ref().unwrap().text, "p1");

        app.prompt_pop();
        app.prompt_push('2');
        app.submit_prompt();
        assert!(app.prompt.is_none());

        wait_until(&mut app, |a| a.link_status.subscription == "p2").await;
    }

    #[tokio::test]
    async fn test_one_query_in_flight() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api = format!("http://{}", listener.local_addr().unwrap());
        let (mut app, _attempts) = app_with_api(&api);

        app.submit_query("   ");
        assert!(!app.query_in_flight());
        assert_eq!(app.get_status_message(), Some("Empty query not sent"));

        app.submit_query("rows?");
        assert!(app.query_in_flight());
        app.submit_query("again?");
        assert_eq!(app.get_status_message(), Some("A query is already running"));

        // The listener accepts but never answers
        let (_held, _) = listener.accept().await.unwrap();
        app.refresh();
        assert!(app.query_in_flight());
    }

    #[tokio::test]
    async fn test_failed_query_is_reported() {
        let (mut app, _attempts) = test_app();
        app.submit_query("rows?");
        wait_until(&mut app, |a| !a.query_in_flight()).await;

        let message = app.get_status_message().unwrap();
        assert!(message.starts_with("Query failed"), "{}", message);
        assert_eq!(app.link_status.state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_quit_closes_link() {
        let (mut app, _attempts) = test_app();
        app.quit();
        assert!(!app.running);
        app.into_link().join().await;
    }

    #[test]
    fn test_preview_truncates() {
        let long = Value::String("x".repeat(200));
        let text = preview(&long);
        assert_eq!(text.chars().count(), RESPONSE_PREVIEW_CHARS + 1);
        assert!(text.ends_with('…'));
        assert_eq!(preview(&serde_json::json!({"a": 1})), r#"{"a":1}"#);
    }
}
