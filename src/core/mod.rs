pub mod comparator;
pub mod engine;
pub mod scanner;

pub use comparator::{ActionSummary, FileComparator, SyncAction};
pub use engine::{SyncConfig, SyncEngine, SyncReport};
pub use scanner::{FileScanner, ScanConfig};
