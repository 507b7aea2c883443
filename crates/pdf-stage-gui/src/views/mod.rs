pub mod log_window;
pub mod staging;

pub use log_window::show_log_window;
pub use staging::{ArtifactInfo, Preview, StagingState, SubmitView, show_staging};
