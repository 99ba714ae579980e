//! List students query
//!
//! Paginated, filtered and sorted listing over the `students` table.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::features::shared::{Page, PaginationParams};
use crate::models::Student;

/// Query string accepted by `GET /students`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListStudentsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    /// One of `student_id`, `student_name`, `subject`, `grade`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    /// `asc` or `desc`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,
    /// Case-insensitive substring match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    /// Exact match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Applied when greater than 0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade_min: Option<i32>,
    /// Applied when greater than 0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade_max: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    StudentId,
    #[default]
    StudentName,
    Subject,
    Grade,
}

impl SortField {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "student_id" => Some(Self::StudentId),
            "student_name" => Some(Self::StudentName),
            "subject" => Some(Self::Subject),
            "grade" => Some(Self::Grade),
            _ => None,
        }
    }

    /// Column name; only ever one of the four whitelisted identifiers
    pub fn column(&self) -> &'static str {
        match self {
            Self::StudentId => "student_id",
            Self::StudentName => "student_name",
            Self::Subject => "subject",
            Self::Grade => "grade",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("asc") {
            Some(Self::Asc)
        } else if value.eq_ignore_ascii_case("desc") {
            Some(Self::Desc)
        } else {
            None
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Error type for list students query
#[derive(Debug, thiserror::Error)]
pub enum ListStudentsError {
    #[error("sort_by must be one of student_id, student_name, subject, grade (got '{0}')")]
    InvalidSortField(String),
    #[error("sort_order must be 'asc' or 'desc' (got '{0}')")]
    InvalidSortOrder(String),
    #[error("grade_min ({0}) cannot be greater than grade_max ({1})")]
    InvalidGradeRange(i32, i32),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Validated form of [`ListStudentsQuery`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentListing {
    pub pagination: PaginationParams,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    pub student_name: Option<String>,
    pub subject: Option<String>,
    pub grade_min: Option<i32>,
    pub grade_max: Option<i32>,
}

impl ListStudentsQuery {
    pub fn validate(&self) -> Result<StudentListing, ListStudentsError> {
        let sort_field = match non_empty(&self.sort_by) {
            Some(value) => SortField::parse(&value)
                .ok_or_else(|| ListStudentsError::InvalidSortField(value.clone()))?,
            None => SortField::default(),
        };

        let sort_order = match non_empty(&self.sort_order) {
            Some(value) => SortOrder::parse(&value)
                .ok_or_else(|| ListStudentsError::InvalidSortOrder(value.clone()))?,
            None => SortOrder::default(),
        };

        let grade_min = self.grade_min.filter(|g| *g > 0);
        let grade_max = self.grade_max.filter(|g| *g > 0);
        if let (Some(min), Some(max)) = (grade_min, grade_max) {
            if min > max {
                return Err(ListStudentsError::InvalidGradeRange(min, max));
            }
        }

        Ok(StudentListing {
            pagination: PaginationParams::new(self.page, self.limit),
            sort_field,
            sort_order,
            student_name: non_empty(&self.student_name),
            subject: non_empty(&self.subject),
            grade_min,
            grade_max,
        })
    }
}

/// Case-insensitive "contains" pattern for `ILIKE ... ESCAPE '\'`.
///
/// `%`, `_` and `\` in the input match literally.
pub fn contains_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl StudentListing {
    fn push_filters(&self, builder: &mut QueryBuilder<'static, Postgres>) {
        let mut separator = " WHERE ";

        if let Some(name) = &self.student_name {
            builder
                .push(separator)
                .push("student_name ILIKE ")
                .push_bind(contains_pattern(name))
                .push(" ESCAPE '\\'");
            separator = " AND ";
        }

        if let Some(subject) = &self.subject {
            builder.push(separator).push("subject = ").push_bind(subject.clone());
            separator = " AND ";
        }

        if let Some(min) = self.grade_min {
            builder.push(separator).push("grade >= ").push_bind(min);
            separator = " AND ";
        }

        if let Some(max) = self.grade_max {
            builder.push(separator).push("grade <= ").push_bind(max);
        }
    }

    pub fn count_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM students");
        self.push_filters(&mut builder);
        builder
    }

    pub fn select_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder =
            QueryBuilder::new("SELECT student_id, student_name, subject, grade FROM students");
        self.push_filters(&mut builder);

        builder
            .push(" ORDER BY ")
            .push(self.sort_field.column())
            .push(" ")
            .push(self.sort_order.keyword());
        if self.sort_field != SortField::StudentId {
            builder.push(", student_id ASC");
        }

        builder
            .push(" LIMIT ")
            .push_bind(self.pagination.limit())
            .push(" OFFSET ")
            .push_bind(self.pagination.offset());
        builder
    }
}

#[tracing::instrument(skip(pool))]
pub async fn handle(
    pool: PgPool,
    query: ListStudentsQuery,
) -> Result<Page<Student>, ListStudentsError> {
    let listing = query.validate()?;

    let total: i64 = listing
        .count_query()
        .build_query_scalar()
        .fetch_one(&pool)
        .await?;

    let students = listing
        .select_query()
        .build_query_as::<Student>()
        .fetch_all(&pool)
        .await?;

    Ok(Page::new(students, &listing.pagination, total))
}
