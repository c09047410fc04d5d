use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;

use common::storage::types::api_key::ApiKey;
use common::storage::TenantContext;

use crate::{api_state::ApiState, error::ApiError};

/// Resolve the bearer credential to a tenant, require it to match the path
/// tenant, and apply the edge rate-limit tiers. The resolved
/// [`TenantContext`] is inserted as a request extension.
pub async fn api_auth(
    State(state): State<ApiState>,
    Path(params): Path<HashMap<String, String>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(&request)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer credential".to_string()))?;

    let tenant_id = ApiKey::resolve_tenant(&state.db, &token)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::Unauthorized("unknown credential".to_string()))?;

    let path_tenant = params
        .get("tenant_id")
        .ok_or_else(|| ApiError::Unauthorized("tenant-scoped route without tenant".to_string()))?;
    if path_tenant != &tenant_id {
        return Err(ApiError::Unauthorized(
            "credential does not belong to this tenant".to_string(),
        ));
    }

    // Edge gating: global, per-tenant and per-key budgets, cheapest first.
    state.limits.global.enforce("global")?;
    state.limits.tenant.enforce(&tenant_id)?;
    state.limits.api_key.enforce(&token)?;

    let tenant = TenantContext::new(tenant_id).map_err(ApiError::from)?;
    request.extensions_mut().insert(tenant);

    Ok(next.run(request).await)
}

fn extract_bearer(request: &Request) -> Option<String> {
    request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer ").map(str::trim))
        .map(String::from)
}
