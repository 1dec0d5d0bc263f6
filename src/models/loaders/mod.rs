pub mod spool_loader;

pub use spool_loader::{load_spool_entry, load_spool_folder, SpoolEntry};
