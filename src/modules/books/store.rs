use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::json;
use shelf_authz::Caller;
use shelf_http::error::AppError;
use shelf_platform::{Filter, Order, PlatformClient, PlatformError};
use uuid::Uuid;

use super::models::{Book, BookStatus, NewBook};

/// Persistence seam for books.
///
/// Implementations must scope every operation to `caller`; rows owned by
/// anyone else are invisible (an update or delete of such a row reports
/// `None` / `false`, exactly like a missing row).
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn create(&self, caller: &Caller, book: NewBook) -> Result<Book, AppError>;

    /// Books of the caller in creation order.
    async fn list(
        &self,
        caller: &Caller,
        status: Option<BookStatus>,
    ) -> Result<Vec<Book>, AppError>;

    async fn update_status(
        &self,
        caller: &Caller,
        id: Uuid,
        status: BookStatus,
    ) -> Result<Option<Book>, AppError>;

    /// Returns whether a row was deleted.
    async fn delete(&self, caller: &Caller, id: Uuid) -> Result<bool, AppError>;
}

/// Store backed by the hosted platform's table endpoint.
///
/// Requests run with the caller's own token so the platform's row-level
/// policies apply; the explicit `user_id` filter mirrors those policies.
pub struct PlatformBookStore {
    client: PlatformClient,
    table: String,
}

impl PlatformBookStore {
    pub fn new(client: PlatformClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    fn owned_by(caller: &Caller) -> Filter {
        Filter::eq("user_id", caller.user_id())
    }
}

#[async_trait]
impl BookStore for PlatformBookStore {
    async fn create(&self, caller: &Caller, book: NewBook) -> Result<Book, AppError> {
        let rows: Vec<Book> = self
            .client
            .insert(&self.table, caller.token(), &book)
            .await
            .map_err(platform_error)?;

        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::Internal(anyhow!("platform stored no row for insert")))
    }

    async fn list(
        &self,
        caller: &Caller,
        status: Option<BookStatus>,
    ) -> Result<Vec<Book>, AppError> {
        let mut filters = vec![Self::owned_by(caller)];
        if let Some(status) = status {
            filters.push(Filter::eq("status", status.as_str()));
        }

        self.client
            .select(
                &self.table,
                caller.token(),
                &filters,
                Some(&Order::asc("created_at")),
            )
            .await
            .map_err(platform_error)
    }

    async fn update_status(
        &self,
        caller: &Caller,
        id: Uuid,
        status: BookStatus,
    ) -> Result<Option<Book>, AppError> {
        let filters = [Filter::eq("id", id.to_string()), Self::owned_by(caller)];
        let rows: Vec<Book> = self
            .client
            .update(
                &self.table,
                caller.token(),
                &filters,
                &json!({ "status": status }),
            )
            .await
            .map_err(platform_error)?;

        Ok(rows.into_iter().next())
    }

    async fn delete(&self, caller: &Caller, id: Uuid) -> Result<bool, AppError> {
        let filters = [Filter::eq("id", id.to_string()), Self::owned_by(caller)];
        let rows: Vec<serde_json::Value> = self
            .client
            .delete(&self.table, caller.token(), &filters)
            .await
            .map_err(platform_error)?;

        Ok(!rows.is_empty())
    }
}

/// Credential refusals stay 401; everything else means the platform could
/// not serve the request.
pub fn platform_error(err: PlatformError) -> AppError {
    match err {
        PlatformError::Unauthorized(message) => AppError::unauthorized(message),
        other => AppError::service_unavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn connectivity_failures_are_unavailable() {
        let err = platform_error(PlatformError::Unreachable("connection refused".into()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn platform_rejections_are_unavailable() {
        let err = platform_error(PlatformError::Rejected {
            status: 500,
            message: "boom".into(),
        });
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err = platform_error(PlatformError::Decode("bad json".into()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn credential_refusals_are_unauthorized() {
        let err = platform_error(PlatformError::Unauthorized("JWT expired".into()));
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }
}
