use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use grid_core::{CatalogError, WindowError};
use thiserror::Error;

/// Request-level failures. Everything except an empty "today" window ends up here.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("invalid date {0:?}: expected YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS")]
    InvalidDate(String),
    #[error(transparent)]
    InvalidWindow(#[from] WindowError),
    #[error("database query failed: {0}")]
    Database(#[from] sqlx::Error),
}

impl DashboardError {
    pub fn status(&self) -> StatusCode {
        match self {
            DashboardError::Catalog(_) => StatusCode::NOT_FOUND,
            DashboardError::InvalidDate(_) | DashboardError::InvalidWindow(_) => {
                StatusCode::BAD_REQUEST
            }
            DashboardError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "rejected request");
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_core::TimeWindow;

    #[test]
    fn catalog_errors_map_to_not_found() {
        let err: DashboardError = CatalogError::UnknownTable("ercot_load".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert!(err.to_string().contains("ercot_load"));
    }

    #[test]
    fn bad_input_maps_to_bad_request() {
        let day = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let window_err = TimeWindow::between_dates(day, Some(day)).unwrap_err();
        let err: DashboardError = window_err.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            DashboardError::InvalidDate("01/02/2024".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn database_errors_are_server_errors() {
        let err: DashboardError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
