use std::error::Error;
use std::fmt::{Display, Formatter};

pub type PhotozResult<T> = Result<T, PhotozError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhotozErrorCategory {
    ConfigurationError,
    IoSystemError,
    DomainError,
    DataValidityError,
    ParallelConsistencyError,
    InternalError,
}

impl PhotozErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::DataValidityError => 0,
            Self::ConfigurationError => 2,
            Self::IoSystemError => 3,
            Self::DomainError => 4,
            Self::ParallelConsistencyError => 5,
            Self::InternalError => 6,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigurationError => "ConfigurationError",
            Self::IoSystemError => "IoSystemError",
            Self::DomainError => "DomainError",
            Self::DataValidityError => "DataValidityError",
            Self::ParallelConsistencyError => "ParallelConsistencyError",
            Self::InternalError => "InternalError",
        }
    }

    /// Data validity failures skip a single object; everything else aborts the run.
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::DataValidityError)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotozError {
    category: PhotozErrorCategory,
    code: &'static str,
    message: String,
}

impl PhotozError {
    pub fn new(category: PhotozErrorCategory, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            category,
            code,
            message: message.into(),
        }
    }

    pub fn configuration(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(PhotozErrorCategory::ConfigurationError, code, message)
    }

    pub fn io_system(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(PhotozErrorCategory::IoSystemError, code, message)
    }

    pub fn domain(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(PhotozErrorCategory::DomainError, code, message)
    }

    pub fn data_validity(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(PhotozErrorCategory::DataValidityError, code, message)
    }

    pub fn parallel_consistency(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(PhotozErrorCategory::ParallelConsistencyError, code, message)
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(PhotozErrorCategory::InternalError, code, message)
    }

    pub const fn category(&self) -> PhotozErrorCategory {
        self.category
    }

    pub const fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub const fn is_fatal(&self) -> bool {
        self.category.is_fatal()
    }

    pub fn diagnostic_line(&self) -> String {
        let severity = if self.is_fatal() { "ERROR" } else { "WARN" };
        format!("{}: [{}] {}", severity, self.code, self.message)
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}

impl Display for PhotozError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.category.as_str(), self.code, self.message)
    }
}

impl Error for PhotozError {}
