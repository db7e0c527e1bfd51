//! Presentation directory and export routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::doc::{Presentation, PresentationSummary};
use crate::services::export::{self, ExportError, ExportScope};
use crate::services::presentation::{self, Identity, PresentationError, UserStatus};
use crate::services::role::Role;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct ListQuery {
    pub search: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct CreateBody {
    pub name: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct ExportQuery {
    pub slide: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

pub(crate) fn presentation_error_to_status(err: &PresentationError) -> StatusCode {
    match err {
        PresentationError::NotFound(_) => StatusCode::NOT_FOUND,
        PresentationError::NotCreator => StatusCode::FORBIDDEN,
        PresentationError::UserNotFound(_) => StatusCode::NOT_FOUND,
        PresentationError::OwnRole | PresentationError::CreatorReserved => StatusCode::BAD_REQUEST,
        PresentationError::Store(e) => {
            error!(error = %e, "presentation store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub(crate) fn export_error_to_status(err: &ExportError) -> StatusCode {
    match err {
        ExportError::Empty | ExportError::OutOfRange { .. } => StatusCode::BAD_REQUEST,
        ExportError::Raster(_) | ExportError::Pdf(_) | ExportError::Io(_) => {
            error!(error = %err, "pdf export failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// `GET /api/presentations?search=` — newest first.
pub async fn list_presentations(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<PresentationSummary>>, StatusCode> {
    let rows = presentation::list(state.store.as_ref(), query.search.as_deref())
        .await
        .map_err(|e| presentation_error_to_status(&e))?;
    Ok(Json(rows))
}

/// `POST /api/presentations` — create with one empty slide.
pub async fn create_presentation(
    State(state): State<AppState>,
    Json(body): Json<CreateBody>,
) -> Result<(StatusCode, Json<Identity>), StatusCode> {
    let identity = presentation::create(state.store.as_ref(), body.name.as_deref())
        .await
        .map_err(|e| presentation_error_to_status(&e))?;
    Ok((StatusCode::CREATED, Json(identity)))
}

/// `GET /api/presentations/:id` — the full document.
pub async fn get_presentation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Presentation>, StatusCode> {
    let doc = presentation::get(state.store.as_ref(), id)
        .await
        .map_err(|e| presentation_error_to_status(&e))?;
    Ok(Json(doc))
}

/// `POST /api/presentations/:id/join` — hand out a viewer name.
pub async fn join_presentation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JoinResponse>, StatusCode> {
    let identity = presentation::join(state.store.as_ref(), id)
        .await
        .map_err(|e| presentation_error_to_status(&e))?;
    Ok(Json(JoinResponse { id: identity.id, username: identity.username, role: identity.role }))
}

/// `GET /api/presentations/:id/users` — users with presence.
pub async fn list_users(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<UserStatus>>, StatusCode> {
    let users = presentation::users_with_presence(state.store.as_ref(), &state.presence, id)
        .await
        .map_err(|e| presentation_error_to_status(&e))?;
    Ok(Json(users))
}

/// `GET /api/presentations/:id/export.pdf?slide=N` — one slide, or all when
/// `slide` is absent.
pub async fn export_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, StatusCode> {
    let doc = presentation::get(state.store.as_ref(), id)
        .await
        .map_err(|e| presentation_error_to_status(&e))?;

    let scope = query.slide.map_or(ExportScope::All, ExportScope::Current);
    let slides = export::select(&doc.slides, scope)
        .map_err(|e| export_error_to_status(&e))?
        .to_vec();

    let pdf = tokio::task::spawn_blocking(move || export::render_pdf(&slides))
        .await
        .map_err(|e| {
            warn!(error = %e, presentation_id = %id, "pdf render task failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| export_error_to_status(&e))?;

    let filename = format!("presentation-{id}.pdf");
    Ok((
        [
            (CONTENT_TYPE, "application/pdf".to_owned()),
            (CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        pdf,
    )
        .into_response())
}

#[cfg(test)]
#[path = "presentations_test.rs"]
mod tests;
