//! Wire types for the vision service endpoints.

use serde::{Deserialize, Serialize};

use iris_core::state::Update;

/// `GET`: current scene caption.
pub const STATUS_ENDPOINT: &str = "status";
/// `POST`: run text recognition on the latest frame.
pub const READ_TEXT_ENDPOINT: &str = "read_text";
/// `GET`: `multipart/x-mixed-replace` JPEG stream.
pub const VIDEO_FEED_ENDPOINT: &str = "video_feed";

/// Multipart boundary assumed when the video response does not declare one.
pub const DEFAULT_BOUNDARY: &str = "frame";

/// Body of `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default)]
    pub caption: Option<String>,
}

impl StatusSnapshot {
    pub fn into_update(self) -> Update {
        Update::PollSucceeded {
            caption: self.caption,
        }
    }
}

/// Body of `POST /read_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadTextResult {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ReadTextResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            text: Some(text.into()),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            text: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    pub fn into_update(self) -> Update {
        if self.is_success() {
            Update::ReadTextSucceeded {
                text: self.text.unwrap_or_default(),
            }
        } else {
            Update::ReadTextRejected {
                message: self
                    .message
                    .unwrap_or_else(|| format!("service reported {:?}", self.status)),
            }
        }
    }
}

/// Pull the `boundary` parameter out of a multipart `Content-Type` value.
pub fn multipart_boundary(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|boundary| !boundary.is_empty())
}
