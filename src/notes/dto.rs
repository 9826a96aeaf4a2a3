use serde::{Deserialize, Serialize};

use super::repo::Note;

/// Body for both create and update. Any owner field a client smuggles into
/// the JSON is simply not part of this type; ownership always comes from the
/// authenticated requester.
#[derive(Debug, Deserialize)]
pub struct NoteBody {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct NoteEnvelope {
    pub note: Note,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
