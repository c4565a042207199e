use crate::error::StoreError;
use crate::types::{BoardId, ShareId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames a live viewer may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ViewerCommand {
    Bind {
        #[serde(rename = "shareId")]
        share_id: ShareId,
    },
}

impl ViewerCommand {
    /// Returns `None` for anything that is not a well-formed command; such frames are ignored.
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str::<ViewerCommand>(text) {
            Ok(ViewerCommand::Bind { share_id }) if share_id.is_empty() => None,
            Ok(command) => Some(command),
            Err(_) => None,
        }
    }
}

/// Frames pushed to live viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ViewerEvent {
    Update { title: String, content: Value },
}

/// Emitted by a successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardSaved {
    pub board_id: BoardId,
    pub title: String,
    pub content: Value,
}

impl BoardSaved {
    pub fn to_viewer_event(&self) -> ViewerEvent {
        ViewerEvent::Update {
            title: self.title.clone(),
            content: self.content.clone(),
        }
    }
}

/// Save payload as received from the editor, before validation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    #[serde(default)]
    pub board_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<Value>,
}

impl SaveRequest {
    pub fn validate(self) -> Result<(BoardId, String, Value), StoreError> {
        let board_id = self
            .board_id
            .filter(|s| !s.is_empty())
            .ok_or(StoreError::MissingParameter("boardId"))?;
        let title = self
            .title
            .filter(|s| !s.is_empty())
            .ok_or(StoreError::MissingParameter("title"))?;
        let content = self
            .content
            .filter(|v| !v.is_null())
            .ok_or(StoreError::MissingParameter("content"))?;
        Ok((BoardId::from(board_id), title, content))
    }
}
