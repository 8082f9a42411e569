//! Interfaces of the services the core delegates to: query execution and
//! introspection, diagram generation and export, and the bundled local
//! database server.
//!
//! The core only consumes these traits. Hosts plug in implementations that
//! forward to their command layer.

use crate::{
    ConnectionMode, ConnectionProfile, DbType, DiagramBackground, DiagramCurve, DiagramSettings,
    DiagramStyle, DiagramTheme, ErMakerError, Result,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

// ── Diagram schema ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key_target_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key_target_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_multivalued: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_derived: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

/// Entity/attribute model a diagram is drawn from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MermaidConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<DiagramTheme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<DiagramCurve>,
}

/// Input to [`DiagramRenderer::generate_diagram`]: either a live database
/// (`connection_string`) or a SQL script (`sql`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(rename = "type")]
    pub db_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<DiagramStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<MermaidConfig>,
}

impl GenerateRequest {
    /// Builds a request that introspects `profile`, optionally pointed at a
    /// different `database` than the one the profile names.
    pub fn for_connection(
        profile: &ConnectionProfile,
        database: Option<&str>,
        settings: &DiagramSettings,
    ) -> Result<Self> {
        let mut target = profile.clone();
        if let Some(database) = database {
            match target.connection_mode {
                ConnectionMode::Params => target.database = Some(database.to_string()),
                ConnectionMode::String => {
                    let raw = target.connection_string.as_deref().unwrap_or("");
                    let mut url = url::Url::parse(raw).map_err(|_| {
                        ErMakerError::ValidationFailed("Invalid connection string.".to_string())
                    })?;
                    url.set_path(&format!("/{database}"));
                    target.connection_string = Some(url.to_string());
                }
            }
        }
        let db_type = match profile.db_type {
            DbType::Postgresql => "postgres",
            DbType::Mysql => "mysql",
            DbType::Mariadb => "mariadb",
            DbType::Sqlite => "sqlite",
            DbType::Mssql => "mssql",
        };
        Ok(Self {
            db_type: db_type.to_string(),
            connection_string: Some(target.connection_string()?),
            sql: None,
            style: Some(settings.style),
            config: Some(MermaidConfig {
                theme: Some(settings.theme),
                curve: Some(settings.curve),
            }),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub mermaid_code: String,
    #[serde(default)]
    pub schema: Schema,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Svg,
    Png,
}

// ── Introspection and queries ───────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<TableInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Value>,
    pub row_count: usize,
    /// Milliseconds.
    pub execution_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Returns a human-readable success message.
    async fn test_connection(&self, profile: &ConnectionProfile) -> Result<String>;

    async fn get_databases(&self, profile: &ConnectionProfile) -> Result<Vec<DatabaseInfo>>;

    async fn execute_query(&self, profile: &ConnectionProfile, sql: &str) -> Result<QueryResult>;
}

#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    async fn generate_diagram(&self, request: &GenerateRequest) -> Result<GenerateResponse>;

    /// Regenerates Mermaid source from an edited schema without re-querying
    /// the database.
    async fn generate_mermaid_from_schema(
        &self,
        schema: &Schema,
        style: DiagramStyle,
        theme: DiagramTheme,
        curve: DiagramCurve,
    ) -> Result<String>;

    async fn export_diagram(
        &self,
        mermaid_code: &str,
        path: &Path,
        format: ExportFormat,
        background: DiagramBackground,
    ) -> Result<()>;
}

// ── Local server ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    #[default]
    Unknown,
    Stopped,
    Running,
    Error,
}

/// Lifecycle of the bundled database server. Actions return a message for
/// the operation log.
#[async_trait]
pub trait LocalServer: Send + Sync {
    async fn status(&self) -> Result<ServerStatus>;
    async fn bundle_exists(&self) -> Result<bool>;
    async fn platform_supported(&self) -> Result<bool>;
    async fn install(&self) -> Result<String>;
    async fn start(&self, port: u16) -> Result<String>;
    async fn stop(&self) -> Result<String>;
    async fn read_log(&self, name: &str) -> Result<String>;
}

/// A long-running server operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerAction {
    Install,
    Start { port: u16 },
    Stop,
}

impl ServerAction {
    /// Server-side log tailed while this action runs.
    pub fn log_name(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Start { .. } | Self::Stop => "server",
        }
    }

    fn progress_message(self) -> &'static str {
        match self {
            Self::Install => "Starting installation...",
            Self::Start { .. } => "Starting server...",
            Self::Stop => "Stopping server...",
        }
    }
}

/// Correlation token for one poll or action. Results carrying an outdated
/// ticket are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTicket {
    generation: u64,
}

/// Observed state of the local server, fed by status polls, log polls and
/// lifecycle actions.
///
/// Starting an action bumps the generation, so a status poll issued before
/// the action cannot overwrite what the action reports.
#[derive(Debug, Default)]
pub struct ServerMonitor {
    status: ServerStatus,
    busy: Option<ServerAction>,
    log_lines: Vec<String>,
    server_log: String,
    last_error: Option<String>,
    generation: u64,
}

impl ServerMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Result of the last applied status poll.
    pub fn status(&self) -> ServerStatus {
        self.status
    }

    /// The action in flight, if any.
    pub fn busy(&self) -> Option<ServerAction> {
        self.busy
    }

    /// Timestamped operation messages, oldest first.
    pub fn log_lines(&self) -> &[String] {
        &self.log_lines
    }

    /// Latest text read from the server-side log.
    pub fn server_log(&self) -> &str {
        &self.server_log
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Log polling only runs while an action is in flight.
    pub fn log_poll_active(&self) -> bool {
        self.busy.is_some()
    }

    /// Issues a ticket for a status or log poll about to be sent.
    pub fn begin_poll(&self) -> PollTicket {
        PollTicket {
            generation: self.generation,
        }
    }

    /// Applies a status poll result. A failed poll reports
    /// [`ServerStatus::Error`].
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::StaleResponse`] if an action started after the
    /// poll was issued.
    pub fn apply_status(&mut self, ticket: PollTicket, result: Result<ServerStatus>) -> Result<()> {
        self.check_ticket(ticket, "status")?;
        self.status = match result {
            Ok(status) => status,
            Err(e) => {
                log::debug!("Status poll failed: {e}");
                ServerStatus::Error
            }
        };
        Ok(())
    }

    pub fn apply_log(&mut self, ticket: PollTicket, text: String) -> Result<()> {
        self.check_ticket(ticket, "log")?;
        self.server_log = text;
        Ok(())
    }

    /// Marks `action` as running and invalidates outstanding polls.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::ValidationFailed`] if another action is running.
    pub fn begin_action(&mut self, action: ServerAction) -> Result<PollTicket> {
        if let Some(running) = self.busy {
            return Err(ErMakerError::ValidationFailed(format!(
                "Server operation {running:?} is still running"
            )));
        }
        self.generation += 1;
        self.busy = Some(action);
        self.last_error = None;
        self.push_log(action.progress_message());
        Ok(self.begin_poll())
    }

    /// Records the outcome of the running action and clears the busy flag.
    ///
    /// Polls issued while the action ran are invalidated, so a late log read
    /// cannot replace what was shown when the action finished.
    pub fn finish_action(&mut self, ticket: PollTicket, result: Result<String>) -> Result<()> {
        self.check_ticket(ticket, "action")?;
        self.generation += 1;
        self.busy = None;
        match result {
            Ok(message) => self.push_log(&message),
            Err(e) => {
                let message = e.user_message();
                self.push_log(&format!("Error: {message}"));
                self.last_error = Some(message);
            }
        }
        Ok(())
    }

    fn check_ticket(&self, ticket: PollTicket, what: &str) -> Result<()> {
        if ticket.generation != self.generation {
            log::warn!("Discarding stale server {what} result");
            return Err(ErMakerError::StaleResponse(format!("server {what}")));
        }
        Ok(())
    }

    fn push_log(&mut self, message: &str) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.log_lines.push(format!("[{stamp}] {message}"));
    }

    /// Polls `server` once and applies the result.
    pub async fn poll_status(&mut self, server: &dyn LocalServer) -> Result<ServerStatus> {
        let ticket = self.begin_poll();
        let result = server.status().await;
        self.apply_status(ticket, result)?;
        Ok(self.status)
    }

    /// Runs `action` to completion, then refreshes the status.
    ///
    /// Action failures are recorded on the monitor rather than returned.
    pub async fn run_action(&mut self, server: &dyn LocalServer, action: ServerAction) -> Result<()> {
        let ticket = self.begin_action(action)?;
        let result = match action {
            ServerAction::Install => server.install().await,
            ServerAction::Start { port } => server.start(port).await,
            ServerAction::Stop => server.stop().await,
        };
        self.finish_action(ticket, result)?;
        self.poll_status(server).await?;
        Ok(())
    }
}

/// Spawns the background status poll (and, while an action is running,
/// the log poll). The lock is not held while waiting on the server.
pub fn spawn_server_poller(
    server: Arc<dyn LocalServer>,
    monitor: Arc<Mutex<ServerMonitor>>,
    status_interval: Duration,
    log_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut status_tick = tokio::time::interval(status_interval);
        let mut log_tick = tokio::time::interval(log_interval);
        loop {
            tokio::select! {
                _ = status_tick.tick() => {
                    let ticket = monitor.lock().await.begin_poll();
                    let result = server.status().await;
                    let _ = monitor.lock().await.apply_status(ticket, result);
                }
                _ = log_tick.tick() => {
                    let (ticket, action) = {
                        let guard = monitor.lock().await;
                        (guard.begin_poll(), guard.busy())
                    };
                    let Some(action) = action else { continue };
                    match server.read_log(action.log_name()).await {
                        Ok(text) => {
                            let _ = monitor.lock().await.apply_log(ticket, text);
                        }
                        Err(e) => log::debug!("Log poll failed: {e}"),
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeServer {
        running: AtomicBool,
        fail_start: bool,
    }

    #[async_trait]
    impl LocalServer for FakeServer {
        async fn status(&self) -> Result<ServerStatus> {
            Ok(if self.running.load(Ordering::SeqCst) {
                ServerStatus::Running
            } else {
                ServerStatus::Stopped
            })
        }
        async fn bundle_exists(&self) -> Result<bool> {
            Ok(true)
        }
        async fn platform_supported(&self) -> Result<bool> {
            Ok(true)
        }
        async fn install(&self) -> Result<String> {
            Ok("Installed".to_string())
        }
        async fn start(&self, port: u16) -> Result<String> {
            if self.fail_start {
                return Err(ErMakerError::Remote("port in use".to_string()));
            }
            self.running.store(true, Ordering::SeqCst);
            Ok(format!("Started on {port}"))
        }
        async fn stop(&self) -> Result<String> {
            self.running.store(false, Ordering::SeqCst);
            Ok("Stopped".to_string())
        }
        async fn read_log(&self, name: &str) -> Result<String> {
            Ok(format!("{name} log"))
        }
    }

    #[test]
    fn test_poll_started_before_action_is_stale() {
        let mut monitor = ServerMonitor::new();
        let poll = monitor.begin_poll();
        let action = monitor.begin_action(ServerAction::Start { port: 3307 }).unwrap();

        let result = monitor.apply_status(poll, Ok(ServerStatus::Stopped));
        assert!(matches!(result, Err(ErMakerError::StaleResponse(_))));
        assert_eq!(monitor.status(), ServerStatus::Unknown);

        monitor.finish_action(action, Ok("Started".to_string())).unwrap();
        assert!(monitor.busy().is_none());
    }

    #[test]
    fn test_log_read_during_action_is_stale_after_finish() {
        let mut monitor = ServerMonitor::new();
        let action = monitor.begin_action(ServerAction::Install).unwrap();
        let log_poll = monitor.begin_poll();
        let fresh = monitor.begin_poll();
        monitor.apply_log(fresh, "step 1".to_string()).unwrap();

        monitor.finish_action(action, Ok("Installed".to_string())).unwrap();
        let result = monitor.apply_log(log_poll, "step 0".to_string());
        assert!(matches!(result, Err(ErMakerError::StaleResponse(_))));
        assert_eq!(monitor.server_log(), "step 1");
    }

    #[test]
    fn test_only_one_action_at_a_time() {
        let mut monitor = ServerMonitor::new();
        monitor.begin_action(ServerAction::Install).unwrap();
        assert!(monitor.log_poll_active());
        assert!(monitor.begin_action(ServerAction::Stop).is_err());
    }

    #[test]
    fn test_failed_poll_reports_error_status() {
        let mut monitor = ServerMonitor::new();
        let ticket = monitor.begin_poll();
        monitor
            .apply_status(ticket, Err(ErMakerError::Remote("boom".into())))
            .unwrap();
        assert_eq!(monitor.status(), ServerStatus::Error);
    }

    #[tokio::test]
    async fn test_run_action_refreshes_status() {
        let server = FakeServer::default();
        let mut monitor = ServerMonitor::new();
        monitor
            .run_action(&server, ServerAction::Start { port: 3307 })
            .await
            .unwrap();
        assert_eq!(monitor.status(), ServerStatus::Running);
        assert_eq!(monitor.log_lines().len(), 2);
        assert!(monitor.log_lines()[1].ends_with("Started on 3307"));

        monitor.run_action(&server, ServerAction::Stop).await.unwrap();
        assert_eq!(monitor.status(), ServerStatus::Stopped);
    }

    #[tokio::test]
    async fn test_failed_action_is_recorded() {
        let server = FakeServer {
            fail_start: true,
            ..Default::default()
        };
        let mut monitor = ServerMonitor::new();
        monitor
            .run_action(&server, ServerAction::Start { port: 3307 })
            .await
            .unwrap();
        assert_eq!(monitor.last_error(), Some("port in use"));
        assert_eq!(monitor.status(), ServerStatus::Stopped);
        assert!(monitor.busy().is_none());
    }

    /// Counts calls and records whether the monitor was locked during one.
    struct CountingServer {
        monitor: Arc<Mutex<ServerMonitor>>,
        status_calls: AtomicUsize,
        log_calls: AtomicUsize,
        called_while_locked: AtomicBool,
    }

    impl CountingServer {
        fn note_lock(&self) {
            if self.monitor.try_lock().is_err() {
                self.called_while_locked.store(true, Ordering::SeqCst);
            }
        }
    }

    #[async_trait]
    impl LocalServer for CountingServer {
        async fn status(&self) -> Result<ServerStatus> {
            self.note_lock();
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            Ok(ServerStatus::Running)
        }
        async fn bundle_exists(&self) -> Result<bool> {
            Ok(true)
        }
        async fn platform_supported(&self) -> Result<bool> {
            Ok(true)
        }
        async fn install(&self) -> Result<String> {
            Ok("Installed".to_string())
        }
        async fn start(&self, port: u16) -> Result<String> {
            Ok(format!("Started on {port}"))
        }
        async fn stop(&self) -> Result<String> {
            Ok("Stopped".to_string())
        }
        async fn read_log(&self, name: &str) -> Result<String> {
            self.note_lock();
            let n = self.log_calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("{name} log {n}"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_cadence_and_log_only_while_busy() {
        let monitor = Arc::new(Mutex::new(ServerMonitor::new()));
        let server = Arc::new(CountingServer {
            monitor: monitor.clone(),
            status_calls: AtomicUsize::new(0),
            log_calls: AtomicUsize::new(0),
            called_while_locked: AtomicBool::new(false),
        });
        let handle = spawn_server_poller(
            server.clone(),
            monitor.clone(),
            Duration::from_secs(5),
            Duration::from_secs(1),
        );

        // t = 0.1s: both intervals fired once, nothing running.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(monitor.lock().await.status(), ServerStatus::Running);
        assert_eq!(server.status_calls.load(Ordering::SeqCst), 1);
        assert_eq!(server.log_calls.load(Ordering::SeqCst), 0);

        let action = monitor
            .lock()
            .await
            .begin_action(ServerAction::Start { port: 3307 })
            .unwrap();

        // t = 1.1s: the log tick at 1s reads the server log.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(server.log_calls.load(Ordering::SeqCst), 1);
        assert_eq!(server.status_calls.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.lock().await.server_log(), "server log 1");

        // t = 5.1s: log ticks at 2..=5s, second status tick at 5s.
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(server.log_calls.load(Ordering::SeqCst), 5);
        assert_eq!(server.status_calls.load(Ordering::SeqCst), 2);

        monitor
            .lock()
            .await
            .finish_action(action, Ok("Started on 3307".to_string()))
            .unwrap();

        // t = 7.1s: log ticks keep firing but no longer read the log.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(server.log_calls.load(Ordering::SeqCst), 5);
        assert!(!server.called_while_locked.load(Ordering::SeqCst));

        handle.abort();
    }

    #[test]
    fn test_generate_request_targets_requested_database() {
        let profile = ConnectionProfile::new("Sales", DbType::Postgresql)
            .with_params("h", "sales", "app", "pw");
        let request =
            GenerateRequest::for_connection(&profile, Some("hr"), &DiagramSettings::default()).unwrap();
        assert_eq!(request.db_type, "postgres");
        assert_eq!(request.connection_string.as_deref(), Some("postgres://app:pw@h:5432/hr"));
        assert_eq!(request.style, Some(DiagramStyle::Chen));

        let profile = ConnectionProfile::new("Shop", DbType::Mysql).with_url("mysql://u@h:3306/shop");
        let request =
            GenerateRequest::for_connection(&profile, Some("archive"), &DiagramSettings::default()).unwrap();
        assert_eq!(request.connection_string.as_deref(), Some("mysql://u@h:3306/archive"));
    }

    #[test]
    fn test_generate_response_without_schema() {
        let response: GenerateResponse =
            serde_json::from_str(r#"{"mermaidCode":"erDiagram"}"#).unwrap();
        assert_eq!(response.mermaid_code, "erDiagram");
        assert!(response.schema.tables.is_empty());
    }
}
