use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::domain::entities::Person;
use crate::domain::errors::{RepoResult, RepositoryError};
use crate::domain::repositories::PersonRepository;
use crate::domain::value_objects::{Email, TaxId};

#[derive(Debug)]
pub struct InMemoryPersonRepository {
    people: RwLock<BTreeMap<i64, Person>>,
    next_id: AtomicI64,
}

impl InMemoryPersonRepository {
    pub fn new() -> Self {
        Self {
            people: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for InMemoryPersonRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersonRepository for InMemoryPersonRepository {
    async fn save(&self, person: Person) -> RepoResult<Person> {
        let mut people = self.people.write();
        for existing in people.values().filter(|p| p.id() != person.id()) {
            if existing.email() == person.email() {
                return Err(RepositoryError::DuplicateEntry("people_email_key".into()));
            }
            if existing.tax_id() == person.tax_id() {
                return Err(RepositoryError::DuplicateEntry("people_tax_id_key".into()));
            }
        }

        let person = if person.id() == 0 {
            person.with_id(self.next_id.fetch_add(1, Ordering::SeqCst))
        } else if people.contains_key(&person.id()) {
            person
        } else {
            return Err(RepositoryError::NotFound(format!("person {}", person.id())));
        };
        people.insert(person.id(), person.clone());
        Ok(person)
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        self.people
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("person {}", id)))
    }

    async fn find_by_id(&self, id: i64) -> RepoResult<Person> {
        self.people
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("person {}", id)))
    }

    async fn find_by_email(&self, email: &Email) -> RepoResult<Person> {
        self.people
            .read()
            .values()
            .find(|p| p.email() == email)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("person <{}>", email)))
    }

    async fn exists_by_tax_id(&self, tax_id: &TaxId) -> RepoResult<bool> {
        Ok(self.people.read().values().any(|p| p.tax_id() == tax_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(email: &str, tax_id: &str) -> Person {
        Person::new(
            "Someone",
            Email::new(email).unwrap(),
            "555-0100",
            TaxId::new(tax_id).unwrap(),
            None,
        )
        .unwrap()
    }

    #[actix_rt::test]
    async fn test_email_and_tax_id_are_unique() {
        let repo = InMemoryPersonRepository::new();
        let saved = repo
            .save(person("a@example.com", "52998224725"))
            .await
            .unwrap();
        assert_eq!(saved.id(), 1);

        assert!(matches!(
            repo.save(person("A@Example.com", "11222333000181")).await,
            Err(RepositoryError::DuplicateEntry(c)) if c == "people_email_key"
        ));
        assert!(matches!(
            repo.save(person("b@example.com", "529.982.247-25")).await,
            Err(RepositoryError::DuplicateEntry(c)) if c == "people_tax_id_key"
        ));

        let tax_id = TaxId::new("52998224725").unwrap();
        assert!(repo.exists_by_tax_id(&tax_id).await.unwrap());
        let email = Email::new("a@example.com").unwrap();
        assert_eq!(repo.find_by_email(&email).await.unwrap().id(), 1);

        repo.delete(1).await.unwrap();
        assert!(!repo.exists_by_tax_id(&tax_id).await.unwrap());
    }
}
