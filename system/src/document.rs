use crate::types::{BoardId, ShareId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_TITLE: &str = "Untitled board";

/// A persisted whiteboard. `content` is whatever the editor sent and is never inspected here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteboardDocument {
    pub board_id: BoardId,
    pub title: String,
    pub content: Value,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_id: Option<ShareId>,
}

impl WhiteboardDocument {
    pub fn new(board_id: BoardId) -> Self {
        Self {
            board_id,
            title: DEFAULT_TITLE.to_owned(),
            content: Value::Object(Default::default()),
            created_at: Utc::now(),
            share_id: None,
        }
    }

    pub fn summary(&self) -> BoardSummary {
        BoardSummary {
            board_id: self.board_id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
        }
    }

    pub fn shared_view(&self) -> SharedBoard {
        SharedBoard {
            title: self.title.clone(),
            content: self.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSummary {
    pub board_id: BoardId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Read-only view handed to share link holders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedBoard {
    pub title: String,
    pub content: Value,
}
