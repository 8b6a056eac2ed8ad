//! `Gateway` builder, shared state and serve loop.
//!
//! This is the entry point for running a classgate gateway. It ties
//! together all the layers:
//!
//! ```text
//! browser ──HTTP──→ axum Router ──→ handshake / guard ──→ SessionStore, IdentityStore
//!                                          │
//!                                          └── reads ──→ ClassView ←── ControlChannel ←──WS── authority
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::header::{COOKIE, LOCATION};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use classgate_channel::{
    authority_connector, ChannelConfig, ChannelHandle, ClassCell, ClassView, ControlChannel,
};
use classgate_identity::{IdentityStore, SqliteIdentityStore};
use classgate_session::{
    find_cookie, spawn_reaper, CookieSigner, SessionConfig, SessionId, SessionStore,
    SqliteSessionStore,
};
use classgate_token::TokenVerifier;
use classgate_transport::Connector;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::guard::require_login;
use crate::handshake::{login, logout};
use crate::pages::index;
use crate::{GatewayConfig, GatewayError};

/// File name of the user database inside `DB_DIR`.
pub const IDENTITY_DB: &str = "app.db";

/// File name of the session database inside `DB_DIR`.
pub const SESSION_DB: &str = "sessions.db";

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared gateway state passed to every handler.
///
/// Wrapped in `Arc` so it can be cheaply cloned into each request. The
/// stores synchronize internally; the class view is a `watch` receiver, so
/// nothing here needs an outer lock.
pub struct GatewayState<S: SessionStore, I: IdentityStore> {
    pub(crate) sessions: Arc<S>,
    pub(crate) identities: I,
    pub(crate) signer: CookieSigner,
    pub(crate) verifier: TokenVerifier,
    pub(crate) session_config: SessionConfig,
    pub(crate) authority_login_url: String,
    pub(crate) class: ClassView,
}

impl<S: SessionStore, I: IdentityStore> GatewayState<S, I> {
    /// Assembles the state from its parts.
    ///
    /// # Errors
    /// [`GatewayError::Session`] if `config.session_secret` is empty.
    pub fn new(
        config: &GatewayConfig,
        sessions: Arc<S>,
        identities: I,
        verifier: TokenVerifier,
        class: ClassView,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            sessions,
            identities,
            signer: CookieSigner::new(&config.session_secret)?,
            verifier,
            session_config: config.session.clone(),
            authority_login_url: config.authority_login_url(),
            class,
        })
    }

    pub fn sessions(&self) -> &S {
        &self.sessions
    }

    pub fn identities(&self) -> &I {
        &self.identities
    }

    /// The signer used for session cookies.
    pub fn signer(&self) -> &CookieSigner {
        &self.signer
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    /// The session id carried by the request's cookie, if the cookie is
    /// present and correctly signed.
    pub(crate) fn session_id(&self, headers: &HeaderMap) -> Option<SessionId> {
        let raw = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|header| find_cookie(header, &self.session_config.cookie_name))?;
        match self.signer.unsign(raw) {
            Ok(id) => Some(id),
            Err(e) => {
                debug!(error = %e, "ignoring session cookie");
                None
            }
        }
    }

    /// The logged-in user for this request, or `None`.
    ///
    /// A store failure counts as "not logged in": the browser is sent to
    /// `/login` rather than shown an error.
    pub(crate) async fn current_user(&self, headers: &HeaderMap) -> Option<String> {
        let id = self.session_id(headers)?;
        match self.sessions.get(&id).await {
            Ok(session) => session?.data.user().map(str::to_string),
            Err(e) => {
                warn!(error = %e, "session lookup failed");
                None
            }
        }
    }
}

/// A `302 Found` to `location`.
pub(crate) fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// The pages shown to logged-in users when none are supplied: just `/`.
pub fn default_pages() -> Router {
    Router::new().route("/", get(index))
}

/// Builds the gateway's router.
///
/// `/login` and `/logout` are always reachable and take precedence over
/// anything `pages` defines at those paths. Every other request goes
/// through the guard and then to `pages`: without a valid session the
/// browser is redirected to `/login`, with one the handler can extract a
/// [`Viewer`](crate::Viewer) and unknown paths get `404`.
pub fn router<S, I>(state: Arc<GatewayState<S, I>>, pages: Router) -> Router
where
    S: SessionStore,
    I: IdentityStore,
{
    // `layer` rather than `route_layer`: `pages` may be empty, and its
    // 404 fallback must be guarded too.
    let protected = pages.layer(middleware::from_fn_with_state(
        Arc::clone(&state),
        require_login::<S, I>,
    ));

    Router::new()
        .route("/login", get(login::<S, I>))
        .route("/logout", get(logout::<S, I>))
        .with_state(state)
        .fallback_service(protected)
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and starting a gateway.
///
/// # Example
///
/// ```rust,ignore
/// use classgate::prelude::*;
///
/// let config = GatewayConfig::from_env()?;
/// let gateway = GatewayBuilder::new(config).build().await?;
/// gateway.run().await
/// ```
pub struct GatewayBuilder {
    config: GatewayConfig,
    pages: Router,
}

impl GatewayBuilder {
    /// Creates a builder serving the default pages.
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            pages: default_pages(),
        }
    }

    /// Replaces the protected pages. Routes at `/login` or `/logout` in
    /// `pages` are never reached.
    pub fn pages(mut self, pages: Router) -> Self {
        self.pages = pages;
        self
    }

    /// Opens the SQLite stores in `DB_DIR`, connects to the authority over
    /// WebSocket and binds the listener.
    pub async fn build(
        self,
    ) -> Result<Gateway<SqliteSessionStore, SqliteIdentityStore>, GatewayError> {
        let db_dir = &self.config.db_dir;
        tokio::fs::create_dir_all(db_dir).await?;
        let sessions = SqliteSessionStore::open(db_dir.join(SESSION_DB))?;
        let identities = SqliteIdentityStore::open(db_dir.join(IDENTITY_DB))?;
        info!(db_dir = %db_dir.display(), "opened stores");

        let connector = authority_connector(&self.config.auth_url, &self.config.api_key)?;
        self.build_with(sessions, identities, connector).await
    }

    /// Like [`build`](Self::build), with caller-supplied stores and
    /// authority connector.
    pub async fn build_with<S, I, C>(
        self,
        sessions: S,
        identities: I,
        connector: C,
    ) -> Result<Gateway<S, I>, GatewayError>
    where
        S: SessionStore,
        I: IdentityStore,
        C: Connector,
    {
        let config = self.config;
        let verifier = config.token_verifier()?;
        if verifier.is_enabled() {
            info!("authority token signatures will be verified");
        }

        let listener = TcpListener::bind(config.bind_addr()).await?;

        let sessions = Arc::new(sessions);
        let reaper = spawn_reaper(Arc::clone(&sessions), config.session.reap_interval());

        let channel_config = ChannelConfig {
            namespace: config.control_namespace()?,
            backoff: config.backoff.clone(),
            ..ChannelConfig::default()
        };
        let channel = ControlChannel::new(connector, channel_config).spawn(ClassCell::new());

        let state = Arc::new(GatewayState::new(
            &config,
            sessions,
            identities,
            verifier,
            channel.class_view(),
        )?);
        let router = router(Arc::clone(&state), self.pages);

        Ok(Gateway {
            listener,
            state,
            router,
            channel,
            reaper,
        })
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// A bound, ready-to-serve gateway.
///
/// The control channel and the session reaper are already running; call
/// [`run()`](Self::run) to start answering HTTP.
pub struct Gateway<S: SessionStore, I: IdentityStore> {
    listener: TcpListener,
    state: Arc<GatewayState<S, I>>,
    router: Router,
    channel: ChannelHandle,
    reaper: JoinHandle<()>,
}

impl<S: SessionStore, I: IdentityStore> Gateway<S, I> {
    /// Returns the local address the gateway is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// A clone of the router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &Arc<GatewayState<S, I>> {
        &self.state
    }

    /// The control channel to the authority.
    pub fn channel(&self) -> &ChannelHandle {
        &self.channel
    }

    /// Serves until Ctrl-C.
    pub async fn run(self) -> Result<(), GatewayError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("shutdown requested");
        })
        .await
    }

    /// Serves until `shutdown` completes, then lets in-flight requests
    /// finish, disconnects from the authority and stops the reaper.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(addr = %self.local_addr()?, "classgate listening");

        let served = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await;

        self.channel.shutdown().await;
        self.reaper.abort();
        info!("classgate stopped");

        served.map_err(GatewayError::from)
    }
}
