use actix_web::{web, HttpResponse};

use crate::auth::AuthService;

/// GET /health_check
///
/// 200 while both the account store and the revocation store answer;
/// 503 otherwise, since no auth operation works without them.
pub async fn health_check(auth: web::Data<AuthService>) -> HttpResponse {
    let (accounts, revocations) =
        futures::join!(auth.check_account_store(), auth.check_revocation_store());

    let mut healthy = true;
    for (store, result) in [("accounts", accounts), ("revocations", revocations)] {
        if let Err(e) = result {
            tracing::warn!(store, error = %e, "Health check failed");
            healthy = false;
        }
    }

    if healthy {
        HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
    } else {
        HttpResponse::ServiceUnavailable().json(serde_json::json!({ "status": "degraded" }))
    }
}
