pub mod classifier;
pub mod orchestrator;
pub mod types;

pub use orchestrator::{OrchestratorParts, ReportOrchestrator};
pub use types::{DispatchedReport, ReportUser, WeeklyReport};
