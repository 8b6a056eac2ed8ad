//! Built-in protected pages.

use axum::Json;

use crate::Viewer;

/// `GET /`: the viewer as JSON.
///
/// `{"user": "alice", "currentClass": {...}}`, or `"currentClass": null`
/// before the authority has announced one.
pub async fn index(viewer: Viewer) -> Json<Viewer> {
    Json(viewer)
}
