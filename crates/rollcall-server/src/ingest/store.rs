//! Student storage adapters
//!
//! The pipeline writes through [`StudentStore`], so the same worker pool runs
//! against PostgreSQL in production and an in-memory map in tests.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::RwLock;

use super::error::StoreError;
use crate::models::Student;

/// Bulk insert-or-ignore sink for validated students
#[async_trait]
pub trait StudentStore: Send + Sync {
    /// Insert every student whose `student_id` is not already stored.
    ///
    /// Existing rows are left untouched. Returns the number of rows inserted.
    async fn insert_ignore(&self, students: &[Student]) -> Result<u64, StoreError>;
}

/// PostgreSQL-backed store writing to the `students` table
#[derive(Clone)]
pub struct PgStudentStore {
    pool: PgPool,
}

impl PgStudentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StudentStore for PgStudentStore {
    async fn insert_ignore(&self, students: &[Student]) -> Result<u64, StoreError> {
        if students.is_empty() {
            return Ok(0);
        }

        let mut ids = Vec::with_capacity(students.len());
        let mut names = Vec::with_capacity(students.len());
        let mut subjects = Vec::with_capacity(students.len());
        let mut grades = Vec::with_capacity(students.len());
        for student in students {
            ids.push(student.student_id.as_str());
            names.push(student.student_name.as_str());
            subjects.push(student.subject.as_str());
            grades.push(student.grade);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO students (student_id, student_name, subject, grade)
            SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[], $4::int4[])
            ON CONFLICT (student_id) DO NOTHING
            "#,
        )
        .bind(ids)
        .bind(names)
        .bind(subjects)
        .bind(grades)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// In-process store with the same insert-or-ignore semantics
#[derive(Debug, Default)]
pub struct MemoryStudentStore {
    rows: RwLock<BTreeMap<String, Student>>,
}

impl MemoryStudentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, student_id: &str) -> Option<Student> {
        self.read().get(student_id).cloned()
    }

    /// All stored students ordered by `student_id`
    pub fn all(&self) -> Vec<Student> {
        self.read().values().cloned().collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Student>> {
        self.rows.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StudentStore for MemoryStudentStore {
    async fn insert_ignore(&self, students: &[Student]) -> Result<u64, StoreError> {
        let mut rows = self.rows.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut inserted = 0;
        for student in students {
            if !rows.contains_key(&student.student_id) {
                rows.insert(student.student_id.clone(), student.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}
