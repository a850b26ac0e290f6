//! Grocery server library - router and modules, exposed for the binary and the tests

pub mod core;
pub mod dtos;
pub mod entities;
pub mod events;
pub mod handlers;
pub mod repositories;
pub mod services;
pub mod ws;

pub use core::{AppError, AppState, auth, config};

use axum::{
    Router, middleware,
    routing::{any, get, post, put},
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Builds the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    use core::authentication_middleware;
    use ws::ws_handler;

    let media = ServeDir::new(&state.config.media_root);

    Router::new()
        .route("/", get(handlers::root))
        .nest("/auth", configure_auth_routes(state.clone()))
        .nest("/users", configure_user_routes(state.clone()))
        .nest("/groups", configure_group_routes(state.clone()))
        .nest("/items", configure_item_routes(state.clone()))
        .nest("/invitations", configure_invitation_routes(state.clone()))
        .route(
            "/ws",
            any(ws_handler).layer(middleware::from_fn_with_state(
                state.clone(),
                authentication_middleware,
            )),
        )
        .nest_service("/media", media)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Registration only needs a verified identity; `/me` needs a profile.
fn configure_auth_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use core::{authentication_middleware, identity_middleware};
    use handlers::auth::*;

    let register_route = Router::new()
        .route("/register", post(register))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ));

    let profile_route = Router::new()
        .route("/me", get(me))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ));

    register_route.merge(profile_route)
}

fn configure_user_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use core::authentication_middleware;
    use handlers::users::*;

    Router::new()
        .route(
            "/{user_id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/{user_id}/groups", get(get_groups))
        .route("/{user_id}/list", get(get_list))
        .route("/{user_id}/list/items", post(add_item))
        .route("/{user_id}/list/clear", put(clear_list))
        .route("/{user_id}/invitations/received", get(received_invitations))
        .route("/{user_id}/invitations/sent", get(sent_invitations))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}

/// Every group route requires membership of the group in the path.
fn configure_group_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use core::{authentication_middleware, group_membership_middleware};
    use handlers::groups::*;

    Router::new()
        .route(
            "/{group_id}",
            get(get_group).put(update_group).delete(disband_group),
        )
        .route("/{group_id}/list", get(get_list))
        .route("/{group_id}/members", get(get_members))
        .route("/{group_id}/invitations", get(invite_history))
        .route("/{group_id}/list/items", post(add_item))
        .route("/{group_id}/list/clear", put(clear_list))
        .route("/{group_id}/leave", axum::routing::delete(leave_group))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            group_membership_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}

fn configure_item_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use core::authentication_middleware;
    use handlers::items::*;

    Router::new()
        .route(
            "/{item_id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/{item_id}/status", put(update_item_status))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}

fn configure_invitation_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use core::authentication_middleware;
    use handlers::invitations::*;

    Router::new()
        .route("/invite", post(send_invite))
        .route("/request", post(send_request))
        .route("/start-group", post(start_group))
        .route("/expire", post(expire_stale))
        .route("/{invitation_id}", get(get_invitation))
        .route("/{invitation_id}/accept", post(accept_invitation))
        .route("/{invitation_id}/decline", post(decline_invitation))
        .route("/{invitation_id}/cancel", post(cancel_invitation))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}
