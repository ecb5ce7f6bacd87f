pub mod catalog;
pub mod cosmology;
pub mod filters;
pub mod flux_grid;
pub mod likelihood;
pub mod metrics;
pub mod parallel;
pub mod process_seds;
pub mod serialization;
pub mod simulate;
pub mod summary;
pub mod template_fitting;
pub mod templates;

mod traits;

pub use process_seds::ProcessSedsModule;
pub use simulate::SimulateModule;
pub use template_fitting::TemplateFittingModule;
pub use traits::ModuleExecutor;

use crate::domain::{PhotozResult, RunArtifact, RunModule, RunRequest};

/// Runs the module named by `request` and returns the artifacts it wrote.
pub fn execute_run_module(request: &RunRequest) -> PhotozResult<Vec<RunArtifact>> {
    match request.module {
        RunModule::ProcessSeds => ProcessSedsModule.execute(request),
        RunModule::Simulate => SimulateModule.execute(request),
        RunModule::TemplateFitting => TemplateFittingModule.execute(request),
    }
}
