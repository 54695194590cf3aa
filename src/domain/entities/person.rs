use chrono::{DateTime, Utc};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{Date, Email, TaxId};

/// A natural or legal person. Users reference a person by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    id: i64,
    name: String,
    email: Email,
    phone: String,
    tax_id: TaxId,
    birth_date: Option<Date>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PersonParts {
    pub id: i64,
    pub name: String,
    pub email: Email,
    pub phone: String,
    pub tax_id: TaxId,
    pub birth_date: Option<Date>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn required(field: &'static str, raw: &str) -> DomainResult<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(DomainError::validation(
            field,
            format!("{} is required", field),
        ));
    }
    Ok(value.to_string())
}

fn check_birth_date(birth_date: Option<Date>) -> DomainResult<Option<Date>> {
    match birth_date {
        Some(date) if date.is_future() => Err(DomainError::validation(
            "birth_date",
            "birth date cannot be in the future",
        )),
        other => Ok(other),
    }
}

impl Person {
    pub fn new(
        name: &str,
        email: Email,
        phone: &str,
        tax_id: TaxId,
        birth_date: Option<Date>,
    ) -> DomainResult<Self> {
        let now = Utc::now();
        Ok(Self {
            id: 0,
            name: required("name", name)?,
            email,
            phone: required("phone", phone)?,
            tax_id,
            birth_date: check_birth_date(birth_date)?,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn restore(parts: PersonParts) -> Self {
        Self {
            id: parts.id,
            name: parts.name,
            email: parts.email,
            phone: parts.phone,
            tax_id: parts.tax_id,
            birth_date: parts.birth_date,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn tax_id(&self) -> &TaxId {
        &self.tax_id
    }

    pub fn birth_date(&self) -> Option<Date> {
        self.birth_date
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn set_name(&mut self, name: &str) -> DomainResult<()> {
        self.name = required("name", name)?;
        self.touch();
        Ok(())
    }

    pub fn set_email(&mut self, email: Email) {
        self.email = email;
        self.touch();
    }

    pub fn set_phone(&mut self, phone: &str) -> DomainResult<()> {
        self.phone = required("phone", phone)?;
        self.touch();
        Ok(())
    }

    pub fn set_birth_date(&mut self, birth_date: Option<Date>) -> DomainResult<()> {
        self.birth_date = check_birth_date(birth_date)?;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Person {
        Person::new(
            "Alice Example",
            Email::new("alice@example.com").unwrap(),
            "+55 11 99999-0000",
            TaxId::new("529.982.247-25").unwrap(),
            Some(Date::parse("1990-05-17").unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn test_person_requires_name_and_phone() {
        let email = Email::new("alice@example.com").unwrap();
        let tax_id = TaxId::new("52998224725").unwrap();
        assert!(Person::new(" ", email.clone(), "123", tax_id.clone(), None).is_err());
        assert!(Person::new("Alice", email, "", tax_id, None).is_err());
    }

    #[test]
    fn test_setters_revalidate() {
        let mut person = person();
        assert!(person.set_name("").is_err());
        assert_eq!(person.name(), "Alice Example");

        person.set_name("  Alice Cooper ").unwrap();
        assert_eq!(person.name(), "Alice Cooper");

        let tomorrow = Date::from_datetime(Utc::now() + chrono::Duration::days(1));
        assert!(person.set_birth_date(Some(tomorrow)).is_err());
        person.set_birth_date(None).unwrap();
        assert_eq!(person.birth_date(), None);
    }

    #[test]
    fn test_setters_bump_updated_at() {
        let mut person = person();
        let before = person.updated_at();
        std::thread::sleep(std::time::Duration::from_millis(5));
        person.set_email(Email::new("alice@work.example").unwrap());
        assert!(person.updated_at() > before);
    }
}
