//! Open editor tabs: which files and diagrams are open, their unsaved
//! content, and which tab is active.

use crate::{
    ConnectionProfile, DiagramSettings, DiagramSettingsUpdate, ErMakerError, FileSystemGateway,
    GenerateResponse, Project, Result, Schema, WorkspaceNode, WorkspaceTree,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Where a plain file tab's content comes from and goes to.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSource {
    /// Linked workspace node, if the file belongs to the project tree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Last known disk location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

/// A generated ER diagram of one connection (and optionally one database).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramSource {
    pub connection_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_name: Option<String>,
    pub settings: DiagramSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    /// Message of the last failed generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    latest_request: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TabSource {
    #[serde(rename = "sql")]
    File(FileSource),
    Diagram(DiagramSource),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorTab {
    pub id: String,
    pub display_name: String,
    /// Editor text for file tabs; Mermaid source for diagram tabs.
    pub content: String,
    pub dirty: bool,
    #[serde(flatten)]
    pub source: TabSource,
}

impl EditorTab {
    pub fn is_diagram(&self) -> bool {
        matches!(self.source, TabSource::Diagram(_))
    }

    /// Linked workspace node of a file tab.
    pub fn file_id(&self) -> Option<&str> {
        match &self.source {
            TabSource::File(f) => f.file_id.as_deref(),
            TabSource::Diagram(_) => None,
        }
    }

    pub fn file_path(&self) -> Option<&Path> {
        match &self.source {
            TabSource::File(f) => f.file_path.as_deref(),
            TabSource::Diagram(_) => None,
        }
    }

    pub fn diagram(&self) -> Option<&DiagramSource> {
        match &self.source {
            TabSource::Diagram(d) => Some(d),
            TabSource::File(_) => None,
        }
    }

    fn is_diagram_of(&self, connection_id: &str, database_name: Option<&str>) -> bool {
        self.diagram().is_some_and(|d| {
            d.connection_id == connection_id && d.database_name.as_deref() == database_name
        })
    }
}

/// Correlates an asynchronous diagram generation with the tab that asked
/// for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramRequest {
    pub tab_id: String,
    pub request_id: u64,
}

/// The ordered tab list and the active-tab pointer.
///
/// Invariants: at most one tab per linked file, at most one diagram tab per
/// (connection, database) pair, and the active id always names an open tab.
#[derive(Debug, Clone, Default)]
pub struct EditorSessions {
    tabs: Vec<EditorTab>,
    active: Option<String>,
    diagram_settings: DiagramSettings,
    next_request_id: u64,
}

impl EditorSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open tabs in display order.
    pub fn tabs(&self) -> &[EditorTab] {
        &self.tabs
    }

    /// Number of open tabs.
    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Looks up an open tab, returning `None` if it was closed.
    pub fn find(&self, id: &str) -> Option<&EditorTab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    /// Like [`Self::find`], but a closed tab is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::TabNotFound`] if `id` is not open.
    pub fn get(&self, id: &str) -> Result<&EditorTab> {
        self.find(id)
            .ok_or_else(|| ErMakerError::TabNotFound(id.to_string()))
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut EditorTab> {
        self.tabs
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ErMakerError::TabNotFound(id.to_string()))
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The focused tab, or `None` when no tab is open.
    pub fn active(&self) -> Option<&EditorTab> {
        self.active.as_deref().and_then(|id| self.find(id))
    }

    /// Focuses an open tab.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::TabNotFound`] if `id` is not open.
    pub fn set_active(&mut self, id: &str) -> Result<()> {
        self.get(id)?;
        self.active = Some(id.to_string());
        Ok(())
    }

    /// The tab showing workspace file `file_id`, if it is open.
    pub fn tab_for_file(&self, file_id: &str) -> Option<&EditorTab> {
        self.tabs.iter().find(|t| t.file_id() == Some(file_id))
    }

    /// Settings shown in the diagram panel; they follow the most recently
    /// opened diagram.
    pub fn diagram_settings(&self) -> DiagramSettings {
        self.diagram_settings
    }

    fn push_active(&mut self, display_name: String, content: String, source: TabSource) -> String {
        let id = Uuid::new_v4().to_string();
        self.tabs.push(EditorTab {
            id: id.clone(),
            display_name,
            content,
            dirty: false,
            source,
        });
        self.active = Some(id.clone());
        id
    }

    /// Opens (or focuses) the tab of a workspace file.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::ValidationFailed`] for folder nodes.
    pub fn open_file(&mut self, node: &WorkspaceNode, path: Option<PathBuf>) -> Result<String> {
        let content = node
            .content()
            .ok_or_else(|| ErMakerError::ValidationFailed("Folders cannot be opened".to_string()))?
            .to_string();
        if let Some(existing) = self.tab_for_file(&node.id) {
            let id = existing.id.clone();
            self.active = Some(id.clone());
            return Ok(id);
        }
        let source = TabSource::File(FileSource {
            file_id: Some(node.id.clone()),
            file_path: path,
        });
        Ok(self.push_active(node.name.clone(), content, source))
    }

    /// Opens (or focuses) a disk file that is not part of the project tree.
    pub fn open_external(&mut self, path: PathBuf, content: String) -> String {
        if let Some(existing) = self
            .tabs
            .iter()
            .find(|t| t.file_id().is_none() && t.file_path() == Some(path.as_path()))
        {
            let id = existing.id.clone();
            self.active = Some(id.clone());
            return id;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let source = TabSource::File(FileSource {
            file_id: None,
            file_path: Some(path),
        });
        self.push_active(name, content, source)
    }

    /// Opens an empty scratch tab named `query.sql`, `query-2.sql`, ...
    ///
    /// Names used by an open tab or by a file at the root of `tree` are
    /// skipped, since a scratch tab is saved to the project root.
    pub fn new_untitled(&mut self, tree: &WorkspaceTree) -> String {
        let taken = |name: &str| {
            self.tabs.iter().any(|t| t.display_name == name)
                || tree.find_child_by_name(None, name).is_some()
        };
        let name = std::iter::once("query.sql".to_string())
            .chain((2..).map(|n| format!("query-{n}.sql")))
            .find(|name| !taken(name))
            .unwrap_or_default();
        self.push_active(name, String::new(), TabSource::File(FileSource::default()))
    }

    /// Opens (or focuses) the diagram tab for `connection` and `database_name`.
    ///
    /// New tabs take the connection's diagram preferences, falling back to
    /// the defaults, and the global settings are reset to match.
    pub fn open_diagram(&mut self, connection: &ConnectionProfile, database_name: Option<&str>) -> String {
        if let Some(existing) = self
            .tabs
            .iter()
            .find(|t| t.is_diagram_of(&connection.id, database_name))
        {
            let id = existing.id.clone();
            self.active = Some(id.clone());
            return id;
        }
        let name = format!("ER: {}", database_name.unwrap_or(&connection.name));
        let settings = connection.diagram_settings(DiagramSettings::default());
        self.diagram_settings = settings;
        let source = TabSource::Diagram(DiagramSource {
            connection_id: connection.id.clone(),
            database_name: database_name.map(str::to_string),
            settings,
            schema: None,
            error: None,
            latest_request: None,
        });
        self.push_active(name, String::new(), source)
    }

    /// Replaces the text of a tab and marks it dirty.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::TabNotFound`] if `tab_id` is not open.
    pub fn edit(&mut self, tab_id: &str, content: impl Into<String>) -> Result<()> {
        let tab = self.get_mut(tab_id)?;
        tab.content = content.into();
        tab.dirty = true;
        Ok(())
    }

    /// Writes a file tab to disk and clears its dirty flag.
    ///
    /// The target is, in order: the linked workspace node (whose content is
    /// updated too), the tab's own path, or `<project root>/<tab name>`.
    /// Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::NameExists`] when a tab without a path would
    /// land on a project node or an existing file, and
    /// [`ErMakerError::ValidationFailed`] for diagram tabs.
    pub async fn save(
        &mut self,
        tab_id: &str,
        project: &mut Project,
        gateway: &dyn FileSystemGateway,
    ) -> Result<PathBuf> {
        let tab = self.get(tab_id)?;
        let TabSource::File(source) = &tab.source else {
            return Err(ErMakerError::ValidationFailed(
                "Diagram tabs cannot be saved as files".to_string(),
            ));
        };
        let content = tab.content.clone();
        let display_name = tab.display_name.clone();
        let linked = source.file_id.clone().filter(|id| project.tree().contains(id));
        let own_path = source.file_path.clone();

        let path = if let Some(file_id) = linked {
            project.write_content(gateway, &file_id, &content).await?
        } else if let Some(path) = own_path {
            gateway.write_file(&path, &content).await?;
            path
        } else {
            let root = project
                .root()
                .ok_or_else(|| ErMakerError::ValidationFailed("No project folder is open".to_string()))?
                .to_path_buf();
            let path = root.join(&display_name);
            if project.tree().find_child_by_name(None, &display_name).is_some()
                || gateway.path_exists(&path).await
            {
                return Err(ErMakerError::NameExists(display_name));
            }
            gateway.create_directory(&root).await?;
            gateway.write_file(&path, &content).await?;
            path
        };

        let tab = self.get_mut(tab_id)?;
        tab.dirty = false;
        if let TabSource::File(source) = &mut tab.source {
            source.file_path = Some(path.clone());
        }
        log::debug!("Saved tab '{}' to {}", tab.display_name, path.display());
        Ok(path)
    }

    /// Closes a tab. If it was active, the tab that slides into its index
    /// becomes active, else the one before it, else none.
    pub fn close(&mut self, tab_id: &str) -> Result<()> {
        let index = self
            .tabs
            .iter()
            .position(|t| t.id == tab_id)
            .ok_or_else(|| ErMakerError::TabNotFound(tab_id.to_string()))?;
        self.tabs.remove(index);
        if self.active.as_deref() == Some(tab_id) {
            self.active = self
                .tabs
                .get(index)
                .or_else(|| index.checked_sub(1).and_then(|i| self.tabs.get(i)))
                .map(|t| t.id.clone());
        }
        Ok(())
    }

    fn close_where(&mut self, pred: impl Fn(&EditorTab) -> bool) -> Vec<String> {
        let ids: Vec<String> = self
            .tabs
            .iter()
            .filter(|t| pred(t))
            .map(|t| t.id.clone())
            .collect();
        for id in &ids {
            let _ = self.close(id);
        }
        ids
    }

    /// Closes the tabs of deleted workspace files. Returns the closed tab ids.
    pub fn close_tabs_for_files(&mut self, file_ids: &[String]) -> Vec<String> {
        self.close_where(|t| t.file_id().is_some_and(|f| file_ids.iter().any(|id| id == f)))
    }

    /// Closes every diagram tab of a deleted connection.
    pub fn close_diagrams_for_connection(&mut self, connection_id: &str) -> Vec<String> {
        self.close_where(|t| t.diagram().is_some_and(|d| d.connection_id == connection_id))
    }

    /// Keeps the tab of `file_id` in step with a rename or move.
    ///
    /// Returns `false` if the file has no open tab.
    pub fn rename_file_tabs(&mut self, file_id: &str, new_name: &str, new_path: Option<PathBuf>) -> bool {
        let Some(tab) = self.tabs.iter_mut().find(|t| t.file_id() == Some(file_id)) else {
            return false;
        };
        tab.display_name = new_name.to_string();
        if let TabSource::File(source) = &mut tab.source {
            source.file_path = new_path;
        }
        true
    }

    /// Merges `update` into the global settings and, when the active tab is a
    /// diagram, into that tab, marking it dirty.
    pub fn update_diagram_settings(&mut self, update: &DiagramSettingsUpdate) {
        self.diagram_settings = self.diagram_settings.merged(update);
        let Some(active) = self.active.clone() else { return };
        if let Ok(tab) = self.get_mut(&active) {
            if let TabSource::Diagram(diagram) = &mut tab.source {
                diagram.settings = diagram.settings.merged(update);
                tab.dirty = true;
            }
        }
    }

    /// Starts a generation for diagram tab `tab_id`. Any earlier request for
    /// the same tab is superseded.
    pub fn begin_diagram_request(&mut self, tab_id: &str) -> Result<DiagramRequest> {
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        let tab = self.get_mut(tab_id)?;
        let TabSource::Diagram(diagram) = &mut tab.source else {
            return Err(ErMakerError::ValidationFailed(
                "Tab does not show a diagram".to_string(),
            ));
        };
        diagram.latest_request = Some(request_id);
        diagram.error = None;
        Ok(DiagramRequest {
            tab_id: tab_id.to_string(),
            request_id,
        })
    }

    /// Applies a finished generation if its tab is still open and the request
    /// is the tab's latest. Success replaces the diagram and clears `dirty`;
    /// failure is recorded on the tab.
    ///
    /// # Errors
    ///
    /// Returns [`ErMakerError::StaleResponse`] and changes nothing when the
    /// tab was closed or a newer request was started.
    pub fn apply_diagram_result(
        &mut self,
        request: &DiagramRequest,
        result: Result<GenerateResponse>,
    ) -> Result<()> {
        let stale = || {
            log::warn!("Discarding diagram result {} for tab {}", request.request_id, request.tab_id);
            ErMakerError::StaleResponse(request.tab_id.clone())
        };
        let tab = self
            .tabs
            .iter_mut()
            .find(|t| t.id == request.tab_id)
            .ok_or_else(stale)?;
        let TabSource::Diagram(diagram) = &mut tab.source else {
            return Err(stale());
        };
        if diagram.latest_request != Some(request.request_id) {
            return Err(stale());
        }
        diagram.latest_request = None;
        match result {
            Ok(response) => {
                diagram.schema = Some(response.schema);
                diagram.error = None;
                tab.content = response.mermaid_code;
                tab.dirty = false;
            }
            Err(e) => diagram.error = Some(e.user_message()),
        }
        Ok(())
    }
}
