use thiserror::Error;

/// Failures while provisioning a disposable test database.
#[derive(Debug, Error)]
pub enum TestInfraError {
    #[error("postgres container: {0}")]
    Container(#[from] testcontainers::TestcontainersError),
}

pub type Result<T> = std::result::Result<T, TestInfraError>;
