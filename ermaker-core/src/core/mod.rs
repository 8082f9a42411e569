//! Internal domain modules for the ERMaker core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod collaborator;
pub mod connection;
pub mod delete;
pub mod diagram;
pub mod error;
pub mod explorer;
pub mod gateway;
pub mod node;
pub mod path;
pub mod persistence;
pub mod project;
pub mod session;
pub mod settings;
pub mod state;
pub mod tree;

#[cfg(test)]
pub(crate) mod testing;

#[doc(inline)]
pub use collaborator::{
    DatabaseClient, DatabaseInfo, DiagramRenderer, GenerateRequest, GenerateResponse, LocalServer,
    QueryResult, Schema, ServerMonitor, ServerStatus,
};
#[doc(inline)]
pub use connection::{ConnectionMode, ConnectionProfile, ConnectionRegistry, ConnectionTicket, DbType};
#[doc(inline)]
pub use delete::DeleteResult;
#[doc(inline)]
pub use diagram::{DiagramSettings, DiagramSettingsUpdate, DiagramStyle};
#[doc(inline)]
pub use error::{ErMakerError, Result};
#[doc(inline)]
pub use explorer::{DatabaseExplorer, QueryRequest};
#[doc(inline)]
pub use gateway::{FileEntry, FileSystemGateway, LocalFileSystem};
#[doc(inline)]
pub use node::{NewNode, NodeKind, NodeUpdate, ProjectFile, WorkspaceNode};
#[doc(inline)]
pub use path::PathResolver;
#[doc(inline)]
pub use persistence::{Snapshot, SnapshotStore};
#[doc(inline)]
pub use project::Project;
#[doc(inline)]
pub use session::{DiagramRequest, EditorSessions, EditorTab, TabSource};
#[doc(inline)]
pub use settings::AppSettings;
#[doc(inline)]
pub use state::AppState;
#[doc(inline)]
pub use tree::WorkspaceTree;
