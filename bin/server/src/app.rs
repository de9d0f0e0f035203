//! Router assembly.
//!
//! Guards are composed explicitly per route group: the trace middleware
//! runs first on everything, `require_auth` wraps every route except the
//! login endpoint, and each guarded group carries its role requirement as
//! a `route_layer`. A route without a guard is authenticated-only.

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use coursegram_authz::ExpertRole;
use coursegram_platform_access::PlatformRole;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::AppState;
use crate::guard::{ExpertRoleGuard, PlatformRoleGuard, expert_role, platform_role};
use crate::{admin, auth, experts, trace};

/// Builds the application router over the given state.
pub fn router(state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        .route("/admin/audit", get(admin::list_audit))
        .route("/admin/audit/actions", get(admin::list_audit_actions))
        .route("/admin/users/{user_id}/role", put(admin::set_platform_role))
        .route(
            "/admin/users/{user_id}/ban",
            post(admin::ban_user).delete(admin::unban_user),
        )
        .route_layer(middleware::from_fn_with_state(
            PlatformRoleGuard::new(state.clone(), PlatformRole::Admin),
            platform_role,
        ));

    let expert_read = Router::new()
        .route("/experts/{expert_id}/members", get(experts::list_members))
        .route_layer(middleware::from_fn_with_state(
            ExpertRoleGuard::new(state.clone(), ExpertRole::Support),
            expert_role,
        ));

    let expert_manage = Router::new()
        .route(
            "/experts/{expert_id}/members/{user_id}",
            put(experts::upsert_member).delete(experts::remove_member),
        )
        .route_layer(middleware::from_fn_with_state(
            ExpertRoleGuard::new(state.clone(), ExpertRole::Manager),
            expert_role,
        ));

    let protected = Router::new()
        .route("/me", get(auth::routes::me))
        .merge(admin_routes)
        .merge(expert_read)
        .merge(expert_manage)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/auth/telegram", post(auth::routes::telegram_login))
        .merge(protected)
        .layer(middleware::from_fn(trace::propagate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
