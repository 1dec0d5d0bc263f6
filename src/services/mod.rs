pub mod notifier;
pub mod sync_registry;

pub use notifier::{Notifier, SYNC_DONE_TITLE};
pub use sync_registry::{SyncRegistry, SUBMIT_ANSWER_TAG};
