pub mod auth;
pub mod response;

pub use auth::launch_params_middleware;
pub use response::{ApiResponse, ApiResult};
