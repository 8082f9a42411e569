//! Results of database calls made for the selected connection: the database
//! list shown in the explorer and the query results of each editor tab.
//!
//! Calls are split in two halves so the host can run them off the UI
//! thread. A result is only applied if the [`ConnectionTicket`] it was
//! started with is still valid and, for queries, its tab is still open and
//! no newer run replaced it.

use crate::{ConnectionRegistry, ConnectionTicket, DatabaseInfo, ErMakerError, QueryResult, Result};
use std::collections::HashMap;

/// Correlates a query run with the tab and connection that started it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub tab_id: String,
    pub request_id: u64,
    pub ticket: ConnectionTicket,
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseExplorer {
    databases: Vec<DatabaseInfo>,
    databases_error: Option<String>,
    listed_for: Option<ConnectionTicket>,
    pending_refresh: Option<ConnectionTicket>,
    results: HashMap<String, QueryResult>,
    running: HashMap<String, u64>,
    next_request_id: u64,
}

impl DatabaseExplorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Databases of the selected connection from the last successful refresh.
    pub fn databases(&self) -> &[DatabaseInfo] {
        &self.databases
    }

    pub fn databases_error(&self) -> Option<&str> {
        self.databases_error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending_refresh.is_some()
    }

    /// Drops the database list, e.g. after the selection changed.
    pub fn clear_databases(&mut self) {
        self.databases.clear();
        self.databases_error = None;
        self.listed_for = None;
        self.pending_refresh = None;
    }

    /// Clears the list (and any refresh in flight) once `connections` no
    /// longer has the selection it was fetched for.
    pub fn sync(&mut self, connections: &ConnectionRegistry) {
        let outdated = |t: &Option<ConnectionTicket>| {
            t.as_ref().is_some_and(|t| !connections.is_current(t))
        };
        if outdated(&self.listed_for) || outdated(&self.pending_refresh) {
            self.clear_databases();
        }
    }

    /// Marks a database refresh as in flight. A later refresh supersedes it.
    pub fn begin_refresh(&mut self, ticket: ConnectionTicket) {
        self.pending_refresh = Some(ticket);
    }

    /// Applies a finished refresh. A failure empties the list and keeps the
    /// message for display.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::StaleResponse`] and changes nothing when the
    /// refresh was superseded or the ticket no longer matches `connections`.
    pub fn apply_databases(
        &mut self,
        ticket: &ConnectionTicket,
        connections: &ConnectionRegistry,
        result: Result<Vec<DatabaseInfo>>,
    ) -> Result<()> {
        if self.pending_refresh.as_ref() != Some(ticket) {
            log::warn!("Discarding superseded database list for {}", ticket.connection_id);
            return Err(ErMakerError::StaleResponse(ticket.connection_id.clone()));
        }
        connections.check_ticket(ticket)?;
        self.pending_refresh = None;
        self.listed_for = Some(ticket.clone());
        match result {
            Ok(databases) => {
                self.databases = databases;
                self.databases_error = None;
            }
            Err(e) => {
                self.databases.clear();
                self.databases_error = Some(e.user_message());
            }
        }
        Ok(())
    }

    /// Result of the last finished query in `tab_id`.
    pub fn result(&self, tab_id: &str) -> Option<&QueryResult> {
        self.results.get(tab_id)
    }

    pub fn is_executing(&self, tab_id: &str) -> bool {
        self.running.contains_key(tab_id)
    }

    /// Starts a query run for `tab_id`, superseding any run still in flight
    /// for the same tab.
    pub fn begin_query(&mut self, tab_id: &str, ticket: ConnectionTicket) -> QueryRequest {
        self.next_request_id += 1;
        self.running.insert(tab_id.to_string(), self.next_request_id);
        QueryRequest {
            tab_id: tab_id.to_string(),
            request_id: self.next_request_id,
            ticket,
        }
    }

    /// Applies a finished query run. A failure is stored as a result with
    /// its `error` set, the way the results panel shows it.
    ///
    /// `tab_open` tells whether the tab still exists.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::StaleResponse`] when the tab was closed, a
    /// newer run replaced this one, or the selected connection changed.
    pub fn apply_query_result(
        &mut self,
        request: &QueryRequest,
        connections: &ConnectionRegistry,
        tab_open: bool,
        result: Result<QueryResult>,
    ) -> Result<()> {
        if self.running.get(&request.tab_id) != Some(&request.request_id) {
            log::warn!("Discarding superseded query result for tab {}", request.tab_id);
            return Err(ErMakerError::StaleResponse(request.tab_id.clone()));
        }
        self.running.remove(&request.tab_id);
        if !tab_open {
            self.results.remove(&request.tab_id);
            log::warn!("Discarding query result for closed tab {}", request.tab_id);
            return Err(ErMakerError::StaleResponse(request.tab_id.clone()));
        }
        connections.check_ticket(&request.ticket)?;

        let result = result.unwrap_or_else(|e| QueryResult {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            execution_time: 0,
            error: Some(e.user_message()),
        });
        self.results.insert(request.tab_id.clone(), result);
        Ok(())
    }

    /// Forgets the results and runs of a closed tab.
    pub fn forget_tab(&mut self, tab_id: &str) {
        self.results.remove(tab_id);
        self.running.remove(tab_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConnectionProfile, DbType};

    fn registry() -> (ConnectionRegistry, String, String) {
        let mut registry = ConnectionRegistry::new();
        let a = registry
            .add(ConnectionProfile::new("A", DbType::Mysql).with_params("h", "a", "u", ""))
            .unwrap();
        let b = registry
            .add(ConnectionProfile::new("B", DbType::Mysql).with_params("h", "b", "u", ""))
            .unwrap();
        registry.set_active(Some(&a)).unwrap();
        (registry, a, b)
    }

    fn db(name: &str) -> DatabaseInfo {
        DatabaseInfo {
            name: name.to_string(),
            tables: Vec::new(),
        }
    }

    fn rows(n: usize) -> QueryResult {
        QueryResult {
            columns: vec!["id".to_string()],
            rows: (0..n).map(|i| serde_json::json!({ "id": i })).collect(),
            row_count: n,
            execution_time: 3,
            error: None,
        }
    }

    #[test]
    fn test_refresh_applies_for_unchanged_selection() {
        let (registry, _, _) = registry();
        let mut explorer = DatabaseExplorer::new();
        let (ticket, _) = registry.begin_request().unwrap();
        explorer.begin_refresh(ticket.clone());
        assert!(explorer.is_loading());

        explorer
            .apply_databases(&ticket, &registry, Ok(vec![db("shop")]))
            .unwrap();
        assert!(!explorer.is_loading());
        assert_eq!(explorer.databases(), &[db("shop")]);
    }

    #[test]
    fn test_refresh_after_switching_connection_is_stale() {
        let (mut registry, _, b) = registry();
        let mut explorer = DatabaseExplorer::new();
        let (ticket, _) = registry.begin_request().unwrap();
        explorer.begin_refresh(ticket.clone());

        registry.set_active(Some(&b)).unwrap();
        let result = explorer.apply_databases(&ticket, &registry, Ok(vec![db("a_only")]));
        assert!(matches!(result, Err(ErMakerError::StaleResponse(_))));
        assert!(explorer.databases().is_empty());
    }

    #[test]
    fn test_cleared_refresh_is_stale() {
        let (registry, _, _) = registry();
        let mut explorer = DatabaseExplorer::new();
        let (ticket, _) = registry.begin_request().unwrap();
        explorer.begin_refresh(ticket.clone());
        explorer.clear_databases();

        assert!(explorer.apply_databases(&ticket, &registry, Ok(vec![db("old")])).is_err());
        assert!(explorer.databases().is_empty());
    }

    #[test]
    fn test_refresh_result_applies_once() {
        let (registry, _, _) = registry();
        let mut explorer = DatabaseExplorer::new();
        let (ticket, _) = registry.begin_request().unwrap();
        explorer.begin_refresh(ticket.clone());

        explorer.apply_databases(&ticket, &registry, Ok(vec![db("new")])).unwrap();
        assert!(explorer.apply_databases(&ticket, &registry, Ok(vec![db("dup")])).is_err());
        assert_eq!(explorer.databases(), &[db("new")]);
    }

    #[test]
    fn test_sync_drops_list_of_previous_selection() {
        let (mut registry, a, b) = registry();
        let mut explorer = DatabaseExplorer::new();
        let (ticket, _) = registry.begin_request().unwrap();
        explorer.begin_refresh(ticket.clone());
        explorer.apply_databases(&ticket, &registry, Ok(vec![db("shop")])).unwrap();

        registry.set_active(Some(&a)).unwrap();
        explorer.sync(&registry);
        assert_eq!(explorer.databases().len(), 1);

        registry.set_active(Some(&b)).unwrap();
        explorer.sync(&registry);
        assert!(explorer.databases().is_empty());
    }

    #[test]
    fn test_failed_refresh_keeps_message() {
        let (registry, _, _) = registry();
        let mut explorer = DatabaseExplorer::new();
        let (ticket, _) = registry.begin_request().unwrap();
        explorer.begin_refresh(ticket.clone());
        explorer
            .apply_databases(&ticket, &registry, Err(ErMakerError::Remote("Access denied".into())))
            .unwrap();
        assert_eq!(explorer.databases_error(), Some("Access denied"));
    }

    #[test]
    fn test_query_result_lands_on_its_tab() {
        let (registry, _, _) = registry();
        let mut explorer = DatabaseExplorer::new();
        let (ticket, _) = registry.begin_request().unwrap();
        let request = explorer.begin_query("t1", ticket);
        assert!(explorer.is_executing("t1"));

        explorer.apply_query_result(&request, &registry, true, Ok(rows(2))).unwrap();
        assert!(!explorer.is_executing("t1"));
        assert_eq!(explorer.result("t1").unwrap().row_count, 2);
    }

    #[test]
    fn test_query_failure_is_stored_as_error_result() {
        let (registry, _, _) = registry();
        let mut explorer = DatabaseExplorer::new();
        let (ticket, _) = registry.begin_request().unwrap();
        let request = explorer.begin_query("t1", ticket);
        explorer
            .apply_query_result(&request, &registry, true, Err(ErMakerError::Remote("syntax error".into())))
            .unwrap();
        assert_eq!(explorer.result("t1").unwrap().error.as_deref(), Some("syntax error"));
    }

    #[test]
    fn test_query_after_switching_connection_is_stale() {
        let (mut registry, _, b) = registry();
        let mut explorer = DatabaseExplorer::new();
        let (ticket, _) = registry.begin_request().unwrap();
        let request = explorer.begin_query("t1", ticket);

        registry.set_active(Some(&b)).unwrap();
        let result = explorer.apply_query_result(&request, &registry, true, Ok(rows(1)));
        assert!(matches!(result, Err(ErMakerError::StaleResponse(_))));
        assert!(explorer.result("t1").is_none());
        assert!(!explorer.is_executing("t1"));
    }

    #[test]
    fn test_rerun_supersedes_earlier_query() {
        let (registry, _, _) = registry();
        let mut explorer = DatabaseExplorer::new();
        let (ticket, _) = registry.begin_request().unwrap();
        let first = explorer.begin_query("t1", ticket.clone());
        let second = explorer.begin_query("t1", ticket);

        explorer.apply_query_result(&second, &registry, true, Ok(rows(5))).unwrap();
        assert!(explorer.apply_query_result(&first, &registry, true, Ok(rows(1))).is_err());
        assert_eq!(explorer.result("t1").unwrap().row_count, 5);
    }

    #[test]
    fn test_query_for_closed_tab_is_stale() {
        let (registry, _, _) = registry();
        let mut explorer = DatabaseExplorer::new();
        let (ticket, _) = registry.begin_request().unwrap();
        let request = explorer.begin_query("t1", ticket);
        let result = explorer.apply_query_result(&request, &registry, false, Ok(rows(1)));
        assert!(matches!(result, Err(ErMakerError::StaleResponse(_))));
        assert!(explorer.result("t1").is_none());
    }
}
