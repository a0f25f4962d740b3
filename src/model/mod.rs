/// Persistence layer
///
/// SQLite storage through sqlx:
/// - Versioned, reversible schema migrations
/// - Histories and their datasets
/// - Worker process liveness registry

pub mod database;
pub mod migrate;
pub mod history;
pub mod worker_process;

pub use database::connect;
pub use history::{Dataset, History, HistoryStore, NewDataset};
pub use worker_process::{WorkerProcess, WorkerProcessStore};
