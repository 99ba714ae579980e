//! Student routes

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use sqlx::PgPool;

use super::queries::{list_students::handle as handle_list_students, ListStudentsError, ListStudentsQuery};
use crate::error::AppError;
use crate::features::shared::Page;
use crate::models::Student;

impl From<ListStudentsError> for AppError {
    fn from(err: ListStudentsError) -> Self {
        match err {
            ListStudentsError::Database(e) => AppError::Database(e),
            other => AppError::Validation(other.to_string()),
        }
    }
}

/// Create student routes
pub fn students_routes() -> Router<PgPool> {
    Router::new().route("/students", get(list_students))
}

/// List students
///
/// GET /students?page=1&limit=10&sort_by=grade&sort_order=desc&subject=Math
async fn list_students(
    State(db): State<PgPool>,
    Query(query): Query<ListStudentsQuery>,
) -> Result<Json<Page<Student>>, AppError> {
    let page = handle_list_students(db, query).await?;
    Ok(Json(page))
}
