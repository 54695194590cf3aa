use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use std::convert::TryFrom;

use crate::domain::entities::{Person, PersonParts};
use crate::domain::errors::{RepoResult, RepositoryError};
use crate::domain::repositories::PersonRepository;
use crate::domain::value_objects::{Date, Email, TaxId};

const PERSON_COLUMNS: &str = "id, name, email, phone, tax_id, birth_date, created_at, updated_at";

#[derive(Debug, FromRow)]
struct PersonRow {
    id: i64,
    name: String,
    email: String,
    phone: String,
    tax_id: String,
    birth_date: Option<Date>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PersonRow> for Person {
    type Error = RepositoryError;

    fn try_from(row: PersonRow) -> Result<Self, Self::Error> {
        let corrupt = |e: crate::domain::DomainError| {
            RepositoryError::Other(format!("person {} is corrupt: {}", row.id, e))
        };
        Ok(Person::restore(PersonParts {
            id: row.id,
            name: row.name,
            email: Email::new(&row.email).map_err(corrupt)?,
            phone: row.phone,
            tax_id: TaxId::new(&row.tax_id).map_err(corrupt)?,
            birth_date: row.birth_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }
}

#[derive(Debug, Clone)]
pub struct PgPersonRepository {
    pool: PgPool,
}

impl PgPersonRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersonRepository for PgPersonRepository {
    async fn save(&self, person: Person) -> RepoResult<Person> {
        let row = if person.id() == 0 {
            sqlx::query_as::<_, PersonRow>(&format!(
                "INSERT INTO people (name, email, phone, tax_id, birth_date, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
                PERSON_COLUMNS
            ))
            .bind(person.name())
            .bind(person.email().as_str())
            .bind(person.phone())
            .bind(person.tax_id().digits())
            .bind(person.birth_date())
            .bind(person.created_at())
            .bind(person.updated_at())
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, PersonRow>(&format!(
                "UPDATE people SET name = $1, email = $2, phone = $3, birth_date = $4, \
                 updated_at = $5 WHERE id = $6 RETURNING {}",
                PERSON_COLUMNS
            ))
            .bind(person.name())
            .bind(person.email().as_str())
            .bind(person.phone())
            .bind(person.birth_date())
            .bind(person.updated_at())
            .bind(person.id())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("person {}", person.id())))?
        };
        Person::try_from(row)
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM people WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("person {}", id)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> RepoResult<Person> {
        let row = sqlx::query_as::<_, PersonRow>(&format!(
            "SELECT {} FROM people WHERE id = $1",
            PERSON_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("person {}", id)))?;
        Person::try_from(row)
    }

    async fn find_by_email(&self, email: &Email) -> RepoResult<Person> {
        let row = sqlx::query_as::<_, PersonRow>(&format!(
            "SELECT {} FROM people WHERE email = $1",
            PERSON_COLUMNS
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("person <{}>", email)))?;
        Person::try_from(row)
    }

    async fn exists_by_tax_id(&self, tax_id: &TaxId) -> RepoResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM people WHERE tax_id = $1)")
                .bind(tax_id.digits())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}
