pub mod approvals;
pub mod extractors;
pub mod health;
pub mod pools;
pub mod response;
pub mod tokens;

// Re-export commonly used types
pub use extractors::{SessionId, ValidatedJson};
pub use response::{ApiResponse, ListResponse};
