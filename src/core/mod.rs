pub mod actions;
pub mod engine;
pub mod ensurer;
pub mod events;
pub mod handler;
pub mod inflight;
pub mod mapper;
pub mod transfer;
pub mod watcher;

pub use actions::SyncActions;
pub use engine::{ReconciliationEngine, RemoteTree, SyncReport};
pub use ensurer::{DirStatus, RemoteDirectoryEnsurer};
pub use events::{EventSink, RunStats, SyncAction, SyncEvent};
pub use handler::SyncEventHandler;
pub use inflight::InFlightGuard;
pub use mapper::{MappingError, PathMapper};
pub use transfer::{TransferOutcome, TransferVerifier};
pub use watcher::{FileWatcher, FsEvent};
