use axum::Extension;

use crate::auth::VerifiedIdentity;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /auth/whoami - launch identity of the caller, as verified by the gate
pub async fn whoami(Extension(identity): Extension<VerifiedIdentity>) -> ApiResult<VerifiedIdentity> {
    tracing::debug!(
        "whoami for platform user {} (language {:?})",
        identity.platform_user_id,
        identity.language()
    );
    Ok(ApiResponse::success(identity))
}
