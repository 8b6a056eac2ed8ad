//! The login guard for protected routes.
//!
//! [`require_login`] runs before every protected handler. It resolves the
//! session cookie to a user and either lets the request through with a
//! [`Viewer`] attached, or answers `302 /login` itself.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use classgate_identity::IdentityStore;
use classgate_session::SessionStore;
use serde::Serialize;
use serde_json::Value;

use crate::server::{redirect, GatewayState};

/// Who is looking at a protected page, and what class is active.
///
/// Put it in a handler's arguments to receive it:
///
/// ```rust,ignore
/// async fn dashboard(viewer: Viewer) -> String {
///     format!("hello {}", viewer.user)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    /// The logged-in user's display name.
    pub user: String,
    /// The authority's latest `setClass` payload, if one has arrived.
    pub current_class: Option<Value>,
}

/// Middleware: continue with a [`Viewer`] in the request extensions, or
/// redirect to `/login`.
pub async fn require_login<S, I>(
    State(state): State<Arc<GatewayState<S, I>>>,
    mut request: Request,
    next: Next,
) -> Response
where
    S: SessionStore,
    I: IdentityStore,
{
    let Some(user) = state.current_user(request.headers()).await else {
        return redirect("/login");
    };
    request.extensions_mut().insert(Viewer {
        user,
        current_class: state.class.current(),
    });
    next.run(request).await
}

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Only missing when a handler is mounted outside the guard.
        parts
            .extensions
            .get::<Viewer>()
            .cloned()
            .ok_or_else(|| redirect("/login"))
    }
}
