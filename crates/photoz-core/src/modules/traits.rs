use crate::domain::{PhotozResult, RunArtifact, RunRequest};

pub trait ModuleExecutor {
    fn execute(&self, request: &RunRequest) -> PhotozResult<Vec<RunArtifact>>;
}

#[cfg(test)]
mod tests {
    use super::ModuleExecutor;
    use crate::domain::{
        PhotozError, PhotozErrorCategory, PhotozResult, RunArtifact, RunModule, RunRequest,
    };

    struct FailingExecutor;

    impl ModuleExecutor for FailingExecutor {
        fn execute(&self, _request: &RunRequest) -> PhotozResult<Vec<RunArtifact>> {
            Err(PhotozError::internal("SYS.MODULE", "module execution failed"))
        }
    }

    #[test]
    fn module_executor_uses_shared_error_types() {
        let request = RunRequest::new(RunModule::ProcessSeds, "params.json");
        let error = FailingExecutor
            .execute(&request)
            .expect_err("executor should fail");
        assert_eq!(error.category(), PhotozErrorCategory::InternalError);
        assert_eq!(error.exit_code(), 6);
        assert_eq!(error.code(), "SYS.MODULE");
    }
}
