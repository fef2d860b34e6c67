//! SQLite implementation of the StudentRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{format_datetime, parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::StudentProfile;
use crate::domain::ports::StudentRepository;

/// Student profiles in the `students` table.
#[derive(Clone)]
pub struct SqliteStudentRepository {
    pool: SqlitePool,
}

impl SqliteStudentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StudentRepository for SqliteStudentRepository {
    async fn upsert(&self, profile: &StudentProfile) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO student_profiles (id, name, email, phone, school, city, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET name = excluded.name, email = excluded.email,
               phone = excluded.phone, school = excluded.school, city = excluded.city"#,
        )
        .bind(profile.id.to_string())
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(&profile.phone)
        .bind(&profile.school)
        .bind(&profile.city)
        .bind(format_datetime(&profile.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<StudentProfile>> {
        let row: Option<StudentRow> = sqlx::query_as(
            "SELECT id, name, email, phone, school, city, created_at FROM student_profiles WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct StudentRow {
    id: String,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    school: Option<String>,
    city: Option<String>,
    created_at: String,
}

impl TryFrom<StudentRow> for StudentProfile {
    type Error = DomainError;

    fn try_from(row: StudentRow) -> Result<Self, Self::Error> {
        Ok(StudentProfile {
            id: parse_uuid(&row.id)?,
            name: row.name,
            email: row.email,
            phone: row.phone,
            school: row.school,
            city: row.city,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    #[tokio::test]
    async fn test_upsert_and_get() {
        let pool = create_migrated_test_pool().await.unwrap();
        let repo = SqliteStudentRepository::new(pool);

        let mut profile = StudentProfile::new("Anna").with_email("anna@example.org");
        repo.upsert(&profile).await.unwrap();
        assert_eq!(repo.get(profile.id).await.unwrap().unwrap().email.as_deref(), Some("anna@example.org"));

        profile.name = "Anna P.".to_string();
        profile.email = None;
        repo.upsert(&profile).await.unwrap();

        let stored = repo.get(profile.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Anna P.");
        assert!(stored.email.is_none());
        assert!(repo.get(Uuid::new_v4()).await.unwrap().is_none());
    }
}
