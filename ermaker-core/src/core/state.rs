//! Process-wide application state.
//!
//! [`AppState`] owns every component and is the only place user actions
//! enter the core. Operations that touch several components (a delete that
//! closes tabs, a rename that relabels them) are chained here, and every
//! change to persisted data is followed by a snapshot write.

use crate::{
    AppSettings, ConnectionProfile, ConnectionRegistry, ConnectionTicket, DatabaseClient,
    DatabaseExplorer, DatabaseInfo, DeleteResult, DiagramRenderer, DiagramRequest,
    EditorSessions, ErMakerError, FileSystemGateway, GenerateRequest, Project, QueryRequest,
    QueryResult, Result, Snapshot, SnapshotStore, WorkspaceTree,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct AppState {
    settings: AppSettings,
    gateway: Arc<dyn FileSystemGateway>,
    store: SnapshotStore,
    connections: ConnectionRegistry,
    project: Project,
    sessions: EditorSessions,
    explorer: DatabaseExplorer,
}

impl AppState {
    /// Restores state from the snapshot named by `settings`, or starts empty.
    pub fn load(settings: AppSettings, gateway: Arc<dyn FileSystemGateway>) -> Self {
        let store = SnapshotStore::from_settings(&settings);
        Self::with_store(settings, gateway, store)
    }

    pub fn with_store(
        settings: AppSettings,
        gateway: Arc<dyn FileSystemGateway>,
        store: SnapshotStore,
    ) -> Self {
        let snapshot = store.load_or_default();
        let tree = WorkspaceTree::from_records(&snapshot.project_files).unwrap_or_else(|e| {
            log::warn!("Discarding corrupt project tree from snapshot: {e}");
            WorkspaceTree::new()
        });

        let mut project = Project::new(&settings.file_extension, &settings.new_file_template)
            .with_tree(tree);
        if let Some(root) = snapshot.project_path {
            project.set_root(root);
        }
        project.set_name(snapshot.project_name);

        log::info!(
            "Loaded {} connection(s) and {} project node(s)",
            snapshot.connections.len(),
            project.tree().len()
        );
        Self {
            settings,
            gateway,
            store,
            connections: ConnectionRegistry::from_profiles(snapshot.connections),
            project,
            sessions: EditorSessions::new(),
            explorer: DatabaseExplorer::new(),
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn sessions(&self) -> &EditorSessions {
        &self.sessions
    }

    /// Database list and query results of the selected connection.
    pub fn explorer(&self) -> &DatabaseExplorer {
        &self.explorer
    }

    /// Tab-only operations (edit, activate, diagram settings) that need no
    /// other component.
    pub fn sessions_mut(&mut self) -> &mut EditorSessions {
        &mut self.sessions
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            connections: self.connections.list().to_vec(),
            project_files: self.project.to_records(),
            project_path: self.project.root().map(Path::to_path_buf),
            project_name: self.project.name().to_string(),
        }
    }

    pub fn persist(&self) -> Result<()> {
        self.store.save(&self.snapshot())
    }

    /// Persists after a change that already reached the disk; a failed
    /// snapshot write must not turn that change into an error.
    fn persist_logged(&self) {
        if let Err(e) = self.persist() {
            log::error!("Failed to save application state: {e}");
        }
    }

    // ── Project ─────────────────────────────────────────────────

    /// Allocates a project folder on first run.
    pub async fn initialize_project(&mut self) -> Result<()> {
        if self.project.root().is_some() {
            return Ok(());
        }
        self.project.initialize(self.gateway.as_ref()).await?;
        self.persist_logged();
        Ok(())
    }

    /// Creates a file from the new-file template under `parent`.
    pub async fn create_file(&mut self, parent: Option<&str>, name: &str) -> Result<String> {
        let id = self.project.create_file(self.gateway.as_ref(), parent, name).await?;
        self.persist_logged();
        Ok(id)
    }

    pub async fn create_folder(&mut self, parent: Option<&str>, name: &str) -> Result<String> {
        let id = self.project.create_folder(self.gateway.as_ref(), parent, name).await?;
        self.persist_logged();
        Ok(id)
    }

    /// Renames a node on disk and in the tree, relabelling open tabs.
    pub async fn rename_node(&mut self, id: &str, new_name: &str) -> Result<PathBuf> {
        let path = self.project.rename(self.gateway.as_ref(), id, new_name).await?;
        self.relabel_tabs(id);
        self.persist_logged();
        Ok(path)
    }

    pub async fn move_node(&mut self, id: &str, new_parent: Option<&str>) -> Result<PathBuf> {
        let path = self.project.move_node(self.gateway.as_ref(), id, new_parent).await?;
        self.relabel_tabs(id);
        self.persist_logged();
        Ok(path)
    }

    /// Deletes a node and its subtree and closes their tabs.
    pub async fn delete_node(&mut self, id: &str) -> Result<DeleteResult> {
        let result = self.project.delete(self.gateway.as_ref(), id).await?;
        let closed = self.sessions.close_tabs_for_files(&result.affected_ids);
        for tab_id in &closed {
            self.explorer.forget_tab(tab_id);
        }
        log::debug!("Deleted {} node(s), closed {} tab(s)", result.deleted_count, closed.len());
        self.persist_logged();
        Ok(result)
    }

    /// Updates name and path of the open tabs of `id` and its descendants.
    fn relabel_tabs(&mut self, id: &str) {
        let tree = self.project.tree();
        let ids = std::iter::once(id.to_string()).chain(tree.descendants(id));
        for file_id in ids {
            let Some(node) = tree.find_by_id(&file_id) else { continue };
            if node.is_file() {
                let path = self.project.resolve_path(&file_id).ok();
                self.sessions.rename_file_tabs(&file_id, &node.name, path);
            }
        }
    }

    // ── Tabs ────────────────────────────────────────────────────

    /// Opens (or focuses) the tab of workspace file `id`.
    pub fn open_file(&mut self, id: &str) -> Result<String> {
        let node = self.project.tree().get(id)?;
        let path = self.project.resolve_path(id).ok();
        self.sessions.open_file(node, path)
    }

    /// Reads a file outside the project and opens it in a tab.
    pub async fn open_external(&mut self, path: PathBuf) -> Result<String> {
        let content = self.gateway.read_file(&path).await?;
        Ok(self.sessions.open_external(path, content))
    }

    /// Opens a scratch tab whose name does not clash with a root-level file.
    pub fn new_untitled(&mut self) -> String {
        self.sessions.new_untitled(self.project.tree())
    }

    /// Closes a tab and drops its query results.
    pub fn close_tab(&mut self, tab_id: &str) -> Result<()> {
        self.sessions.close(tab_id)?;
        self.explorer.forget_tab(tab_id);
        Ok(())
    }

    /// Saves a file tab and persists the updated tree.
    pub async fn save_tab(&mut self, tab_id: &str) -> Result<PathBuf> {
        let path = self
            .sessions
            .save(tab_id, &mut self.project, self.gateway.as_ref())
            .await?;
        self.persist_logged();
        Ok(path)
    }

    pub fn open_diagram(&mut self, connection_id: &str, database: Option<&str>) -> Result<String> {
        let connection = self.connections.get(connection_id)?;
        Ok(self.sessions.open_diagram(connection, database))
    }

    /// Starts a generation for a diagram tab and returns the correlation
    /// token with the request to send.
    pub fn diagram_request(&mut self, tab_id: &str) -> Result<(DiagramRequest, GenerateRequest)> {
        let tab = self.sessions.get(tab_id)?;
        let diagram = tab.diagram().ok_or_else(|| {
            ErMakerError::ValidationFailed("Tab does not show a diagram".to_string())
        })?;
        let connection = self.connections.get(&diagram.connection_id)?;
        let request =
            GenerateRequest::for_connection(connection, diagram.database_name.as_deref(), &diagram.settings)?;
        let token = self.sessions.begin_diagram_request(tab_id)?;
        Ok((token, request))
    }

    /// Generates the diagram of `tab_id` with `renderer` and applies it.
    pub async fn generate_diagram(&mut self, tab_id: &str, renderer: &dyn DiagramRenderer) -> Result<()> {
        let (token, request) = self.diagram_request(tab_id)?;
        let result = renderer.generate_diagram(&request).await;
        self.sessions.apply_diagram_result(&token, result)
    }

    // ── Databases and queries ───────────────────────────────────

    /// Starts listing the databases of the selected connection. Returns the
    /// ticket to apply the result with and the profile to query.
    pub fn databases_request(&mut self) -> Result<(ConnectionTicket, ConnectionProfile)> {
        let (ticket, profile) = self.connections.begin_request()?;
        let profile = profile.clone();
        self.explorer.begin_refresh(ticket.clone());
        Ok((ticket, profile))
    }

    pub fn apply_databases(
        &mut self,
        ticket: &ConnectionTicket,
        result: Result<Vec<DatabaseInfo>>,
    ) -> Result<()> {
        self.explorer.apply_databases(ticket, &self.connections, result)
    }

    /// Lists the databases of the selected connection with `client`.
    pub async fn refresh_databases(&mut self, client: &dyn DatabaseClient) -> Result<()> {
        let (ticket, profile) = self.databases_request()?;
        let result = client.get_databases(&profile).await;
        self.apply_databases(&ticket, result)
    }

    /// Starts running the SQL of file tab `tab_id` on the selected
    /// connection. Returns the correlation token, the profile and the SQL.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::ValidationFailed`] for diagram tabs, blank
    /// SQL, or when no connection is selected.
    pub fn query_request(&mut self, tab_id: &str) -> Result<(QueryRequest, ConnectionProfile, String)> {
        let tab = self.sessions.get(tab_id)?;
        if tab.is_diagram() {
            return Err(ErMakerError::ValidationFailed(
                "Diagram tabs cannot run queries".to_string(),
            ));
        }
        let sql = tab.content.trim().to_string();
        if sql.is_empty() {
            return Err(ErMakerError::ValidationFailed("Query is empty".to_string()));
        }
        let (ticket, profile) = self.connections.begin_request()?;
        let profile = profile.clone();
        let request = self.explorer.begin_query(tab_id, ticket);
        Ok((request, profile, sql))
    }

    pub fn apply_query_result(&mut self, request: &QueryRequest, result: Result<QueryResult>) -> Result<()> {
        let tab_open = self.sessions.find(&request.tab_id).is_some();
        self.explorer
            .apply_query_result(request, &self.connections, tab_open, result)
    }

    /// Runs the SQL of `tab_id` with `client` and stores the result.
    pub async fn execute_query(&mut self, tab_id: &str, client: &dyn DatabaseClient) -> Result<()> {
        let (request, profile, sql) = self.query_request(tab_id)?;
        let result = client.execute_query(&profile, &sql).await;
        self.apply_query_result(&request, result)
    }

    // ── Connections ─────────────────────────────────────────────

    /// Validates and stores a new profile, then persists.
    pub fn add_connection(&mut self, profile: ConnectionProfile) -> Result<String> {
        let id = self.connections.add(profile)?;
        self.persist()?;
        Ok(id)
    }

    pub fn update_connection(&mut self, id: &str, profile: ConnectionProfile) -> Result<()> {
        self.connections.update(id, profile)?;
        self.sync_explorer();
        self.persist()
    }

    pub fn save_connection_named(&mut self, profile: ConnectionProfile) -> Result<String> {
        let id = self.connections.save_named(profile)?;
        self.sync_explorer();
        self.persist()?;
        Ok(id)
    }

    /// Removes a connection and closes its diagram tabs.
    pub fn delete_connection(&mut self, id: &str) -> Result<ConnectionProfile> {
        let removed = self.connections.delete(id)?;
        self.sessions.close_diagrams_for_connection(id);
        self.sync_explorer();
        self.persist()?;
        Ok(removed)
    }

    pub fn set_active_connection(&mut self, id: Option<&str>) -> Result<()> {
        self.connections.set_active(id)?;
        self.sync_explorer();
        Ok(())
    }

    /// Drops a database list that no longer belongs to the selected
    /// connection.
    fn sync_explorer(&mut self) {
        self.explorer.sync(&self.connections);
    }

    /// Makes sure a profile for the bundled server on `port` exists and
    /// selects it.
    pub fn use_local_server_connection(&mut self, port: u16) -> Result<String> {
        let id = self.connections.ensure_local_server_profile(port);
        self.connections.set_active(Some(&id))?;
        self.sync_explorer();
        self.persist()?;
        Ok(id)
    }
}
