pub mod loaders;
pub mod submission;

pub use loaders::{load_spool_entry, load_spool_folder, SpoolEntry};
pub use submission::{PendingSubmission, SubmissionPayload, SubmissionRequest};
