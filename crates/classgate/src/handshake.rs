//! The login handshake: `/login` and `/logout`.
//!
//! ```text
//! browser                 gateway                        authority
//!    │ GET /login            │                                │
//!    │──────────────────────→│ 302 <AUTH_URL>/oauth?...       │
//!    │←──────────────────────│                                │
//!    │ ───────────────────────────── sign in ────────────────→│
//!    │ GET /login?token=...  │                                │
//!    │←────────────────────────────────────────────── 302 ────│
//!    │──────────────────────→│ decode, store session,         │
//!    │                       │ record user                    │
//!    │ 302 / + Set-Cookie    │                                │
//!    │←──────────────────────│                                │
//! ```
//!
//! Every failure on this path ends in a redirect: a bad token or a
//! session write that fails sends the browser back to `/login`.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use classgate_identity::{IdentityStore, Upsert};
use classgate_session::{
    clear_cookie_header, set_cookie_header, Session, SessionData, SessionId, SessionStore,
};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::server::{redirect, GatewayState};

/// Query string of `/login`.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub token: Option<String>,
}

/// `GET /login`: start or complete the handshake.
///
/// Without a `token` the browser is sent to the authority's sign-in page.
/// With one, the token is decoded, the session written, the user recorded
/// and the browser sent to `/`. A query that doesn't parse, such as one
/// with `token` twice, is handled like a bad token.
pub async fn login<S, I>(
    State(state): State<Arc<GatewayState<S, I>>>,
    query: Result<Query<LoginQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Response
where
    S: SessionStore,
    I: IdentityStore,
{
    let query = match query {
        Ok(Query(query)) => query,
        Err(e) => {
            warn!(error = %e, "malformed login query");
            return redirect("/login");
        }
    };
    let Some(token) = query.token.filter(|token| !token.is_empty()) else {
        debug!("no token, sending browser to the authority");
        return redirect(&state.authority_login_url);
    };

    let claims = match state.verifier.decode(&token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(error = %e, "rejected login token");
            return redirect("/login");
        }
    };
    let user = claims.display_name.clone();
    if user.is_empty() {
        warn!("rejected login token with empty displayName");
        return redirect("/login");
    }

    // A browser that already holds a signed cookie keeps its id.
    let id = state.session_id(&headers).unwrap_or_else(SessionId::generate);
    let session = Session::new(
        id,
        SessionData::authenticated(user.as_str(), claims.to_value()),
        state.session_config.max_age(),
    );
    if let Err(e) = state.sessions.set(&session).await {
        error!(error = %e, user = %user, "failed to store session");
        return redirect("/login");
    }

    // The session is already written; a failure here only loses the
    // user record, not the login.
    match state.identities.upsert(&user).await {
        Ok(Upsert::Inserted) => info!(user = %user, "recorded new user"),
        Ok(Upsert::Existing) => debug!(user = %user, "user already recorded"),
        Err(e) => warn!(error = %e, user = %user, "failed to record user"),
    }

    info!(user = %user, "login complete");
    let cookie = set_cookie_header(&state.session_config, &state.signer.sign(&session.id));
    with_cookie(redirect("/"), &cookie)
}

/// `GET /logout`: forget the session and send the browser to `/login`.
pub async fn logout<S, I>(
    State(state): State<Arc<GatewayState<S, I>>>,
    headers: HeaderMap,
) -> Response
where
    S: SessionStore,
    I: IdentityStore,
{
    if let Some(id) = state.session_id(&headers) {
        match state.sessions.destroy(&id).await {
            Ok(()) => debug!("session destroyed"),
            Err(e) => warn!(error = %e, "failed to destroy session"),
        }
    }
    with_cookie(redirect("/login"), &clear_cookie_header(&state.session_config))
}

fn with_cookie(mut response: Response, cookie: &str) -> Response {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => error!(error = %e, "session cookie is not a valid header value"),
    }
    response
}
