use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{MessageResponse, NoteBody, NoteEnvelope};
use super::repo::Note;
use crate::auth::extractors::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notes))
        .route("/", post(create_note))
        .route("/:id", get(get_note))
        .route("/:id", put(update_note))
        .route("/:id", delete(delete_note))
}

fn validate_body(body: &NoteBody) -> Result<(), ApiError> {
    if body.title.trim().is_empty() || body.content.trim().is_empty() {
        return Err(ApiError::validation("Title and content are required"));
    }
    Ok(())
}

#[instrument(skip(state, user))]
pub async fn list_notes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Note>>, ApiError> {
    let notes = Note::list_by_owner(&state.db, user.id).await?;
    Ok(Json(notes))
}

#[instrument(skip(state, user))]
pub async fn get_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Note>, ApiError> {
    let note = Note::find_owned(&state.db, user.id, id)
        .await?
        .ok_or_else(|| {
            ApiError::not_found("Note not found or you don't have permission to view it")
        })?;
    Ok(Json(note))
}

#[instrument(skip(state, user, body))]
pub async fn create_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<NoteBody>,
) -> Result<(StatusCode, Json<NoteEnvelope>), ApiError> {
    validate_body(&body)?;

    let note = Note::create(&state.db, user.id, body.title.trim(), &body.content).await?;
    info!(note_id = %note.id, user_id = %user.id, "note created");
    Ok((StatusCode::CREATED, Json(NoteEnvelope { note })))
}

#[instrument(skip(state, user, body))]
pub async fn update_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<NoteBody>,
) -> Result<Json<NoteEnvelope>, ApiError> {
    validate_body(&body)?;

    let note = Note::update_owned(&state.db, user.id, id, body.title.trim(), &body.content)
        .await?
        .ok_or_else(|| {
            ApiError::not_found("Note not found or you don't have permission to edit it")
        })?;
    info!(note_id = %note.id, user_id = %user.id, "note updated");
    Ok(Json(NoteEnvelope { note }))
}

#[instrument(skip(state, user))]
pub async fn delete_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !Note::delete_owned(&state.db, user.id, id).await? {
        return Err(ApiError::not_found(
            "Note not found or you don't have permission to delete it",
        ));
    }
    info!(note_id = %id, user_id = %user.id, "note deleted");
    Ok(Json(MessageResponse {
        message: "Note deleted successfully!".into(),
    }))
}
