//! Core library for ERMaker, a SQL editor and ER-diagram workbench.
//!
//! The primary entry point is [`AppState`], which owns the project tree
//! mirrored on disk, the open editor tabs and the saved connection profiles.
//! All user actions go through `AppState` methods; disk access goes through
//! a [`FileSystemGateway`].
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    collaborator::{
        spawn_server_poller, Column, ColumnInfo, DatabaseClient, DatabaseInfo, DiagramRenderer,
        ExportFormat, GenerateRequest, GenerateResponse, LocalServer, MermaidConfig, PollTicket,
        QueryResult, Schema, ServerAction, ServerMonitor, ServerStatus, Table, TableInfo,
    },
    connection::{
        ConnectionMode, ConnectionProfile, ConnectionRegistry, ConnectionTicket, DbType,
        DEFAULT_LOCAL_SERVER_PORT, LOCAL_SERVER_HOST, LOCAL_SERVER_PROFILE_NAME,
    },
    delete::DeleteResult,
    diagram::{
        find_preset, DiagramBackground, DiagramCurve, DiagramPreset, DiagramSettings,
        DiagramSettingsUpdate, DiagramStyle, DiagramTheme, DIAGRAM_PRESETS,
    },
    error::{ErMakerError, Result},
    explorer::{DatabaseExplorer, QueryRequest},
    gateway::{FileEntry, FileSystemGateway, LocalFileSystem, MAX_PROJECT_FOLDERS},
    node::{NewNode, NodeBody, NodeKind, NodeUpdate, ProjectFile, WorkspaceNode},
    path::{validate_name, PathResolver},
    persistence::{Snapshot, SnapshotStore, SNAPSHOT_VERSION},
    project::{Project, DEFAULT_PROJECT_NAME},
    session::{DiagramRequest, DiagramSource, EditorSessions, EditorTab, FileSource, TabSource},
    settings::{
        default_config_directory, default_projects_directory, load_settings, load_settings_from,
        save_settings, save_settings_to, settings_file_path, AppSettings, DEFAULT_STORAGE_KEY,
    },
    state::AppState,
    tree::WorkspaceTree,
};
