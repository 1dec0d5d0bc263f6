pub mod logging;
pub mod mime;
