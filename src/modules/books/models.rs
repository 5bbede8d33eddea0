use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;
use shelf_http::error::AppError;
use uuid::Uuid;

/// Reading status of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    #[default]
    Reading,
    Completed,
    Wishlist,
}

impl BookStatus {
    pub const ALL: [BookStatus; 3] = [
        BookStatus::Reading,
        BookStatus::Completed,
        BookStatus::Wishlist,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BookStatus::Reading => "reading",
            BookStatus::Completed => "completed",
            BookStatus::Wishlist => "wishlist",
        }
    }

    fn allowed() -> String {
        Self::ALL.map(Self::as_str).join(", ")
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| format!("must be one of: {}", Self::allowed()))
    }
}

/// A book row as stored by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub author: String,
    pub status: BookStatus,
    pub created_at: String,
}

/// Row sent to the platform on create; `id` and `created_at` are generated there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewBook {
    pub user_id: String,
    pub title: String,
    pub author: String,
    pub status: BookStatus,
}

/// Request body for `POST /books`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBook {
    pub title: Option<String>,
    pub author: Option<String>,
    pub status: Option<String>,
}

impl CreateBook {
    /// Validate every field, reporting all failures at once, and stamp the owner.
    pub fn validate(self, user_id: &str) -> Result<NewBook, AppError> {
        let mut details = Vec::new();

        let title = required_text("title", self.title, &mut details);
        let author = required_text("author", self.author, &mut details);
        let status = match self.status {
            None => Some(BookStatus::default()),
            Some(raw) => match raw.parse::<BookStatus>() {
                Ok(status) => Some(status),
                Err(error) => {
                    details.push(json!({ "field": "status", "error": error }));
                    None
                }
            },
        };

        match (title, author, status) {
            (Some(title), Some(author), Some(status)) if details.is_empty() => Ok(NewBook {
                user_id: user_id.to_string(),
                title,
                author,
                status,
            }),
            _ => Err(AppError::validation(details, "Invalid book")),
        }
    }
}

/// Request body for `PATCH /books/{id}`. Only the status is mutable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateBookStatus {
    pub status: Option<String>,
}

impl UpdateBookStatus {
    pub fn validate(self) -> Result<BookStatus, AppError> {
        let raw = self
            .status
            .ok_or_else(|| AppError::invalid_field("status", "required"))?;
        raw.parse()
            .map_err(|error: String| AppError::invalid_field("status", error))
    }
}

/// Query string for `GET /books`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListBooksQuery {
    #[serde(alias = "status_filter")]
    pub status: Option<String>,
}

impl ListBooksQuery {
    /// An absent or blank filter means "all statuses".
    pub fn validate(self) -> Result<Option<BookStatus>, AppError> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|error: String| AppError::invalid_field("status", error)),
        }
    }
}

/// Book identifiers are platform-generated UUIDs.
pub fn parse_book_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::invalid_field("id", "must be a UUID"))
}

fn required_text(
    field: &str,
    value: Option<String>,
    details: &mut Vec<serde_json::Value>,
) -> Option<String> {
    match value.as_deref().map(str::trim) {
        None => {
            details.push(json!({ "field": field, "error": "required" }));
            None
        }
        Some("") => {
            details.push(json!({ "field": field, "error": "must not be empty" }));
            None
        }
        Some(text) => Some(text.to_string()),
    }
}
