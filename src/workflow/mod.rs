pub mod capture_flow;
pub mod submission_ctx;

pub use capture_flow::{CaptureFlow, CaptureOutcome};
pub use submission_ctx::SubmissionCtx;
