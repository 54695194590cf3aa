use std::sync::Arc;

use crate::domain::entities::Person;
use crate::domain::errors::{DomainError, DomainResult, RepoResultExt, RepositoryError};
use crate::domain::repositories::{PersonRepository, UserRepository};
use crate::domain::value_objects::{Date, Email};
use crate::models::UpdatePersonRequest;
use crate::usecases::conflict_from;

/// Self-service access to the person record behind a user.
#[derive(Clone)]
pub struct PersonUseCases {
    users: Arc<dyn UserRepository>,
    people: Arc<dyn PersonRepository>,
}

impl PersonUseCases {
    pub fn new(users: Arc<dyn UserRepository>, people: Arc<dyn PersonRepository>) -> Self {
        Self { users, people }
    }

    pub async fn get_me(&self, user_id: i64) -> DomainResult<Person> {
        let user = self
            .users
            .find_by_id(user_id)
            .await
            .or_not_found("user", user_id)?;
        self.people
            .find_by_id(user.person_id())
            .await
            .or_not_found("person", user.person_id())
    }

    pub async fn update_me(
        &self,
        user_id: i64,
        request: UpdatePersonRequest,
    ) -> DomainResult<Person> {
        let mut person = self.get_me(user_id).await?;

        if let Some(name) = request.name.as_deref() {
            person.set_name(name)?;
        }
        if let Some(raw) = request.email.as_deref() {
            let email = Email::new(raw)?;
            if &email != person.email() {
                match self.people.find_by_email(&email).await {
                    Ok(other) if other.id() != person.id() => {
                        return Err(DomainError::conflict("email", "email is already registered"))
                    }
                    Ok(_) | Err(RepositoryError::NotFound(_)) => {}
                    Err(e) => return Err(e.into()),
                }
                person.set_email(email);
            }
        }
        if let Some(phone) = request.phone.as_deref() {
            person.set_phone(phone)?;
        }
        match request.birth_date {
            Some(Some(raw)) => person.set_birth_date(Some(Date::parse(&raw)?))?,
            Some(None) => person.set_birth_date(None)?,
            None => {}
        }

        self.people.save(person).await.map_err(conflict_from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::User;
    use crate::domain::value_objects::{Password, TaxId};
    use crate::domain::ErrorKind;
    use crate::persistence::memory::{InMemoryPersonRepository, InMemoryUserRepository};

    async fn seed(
        users: &InMemoryUserRepository,
        people: &InMemoryPersonRepository,
        username: &str,
        email: &str,
        tax_id: &str,
    ) -> User {
        let person = people
            .save(
                Person::new(
                    "Someone",
                    Email::new(email).unwrap(),
                    "555-0100",
                    TaxId::new(tax_id).unwrap(),
                    None,
                )
                .unwrap(),
            )
            .await
            .unwrap();
        let password = Password::with_cost("S3cure!Pw", 4).unwrap();
        users
            .save(User::new(person.id(), username, password).unwrap())
            .await
            .unwrap()
    }

    #[actix_rt::test]
    async fn test_update_me() {
        let users = Arc::new(InMemoryUserRepository::new());
        let people = Arc::new(InMemoryPersonRepository::new());
        let alice = seed(&users, &people, "alice", "alice@example.com", "52998224725").await;
        seed(&users, &people, "bob", "bob@example.com", "11222333000181").await;
        let use_cases = PersonUseCases::new(users.clone(), people.clone());

        let updated = use_cases
            .update_me(
                alice.id(),
                UpdatePersonRequest {
                    name: Some("Alice Liddell".into()),
                    birth_date: Some(Some("1990-05-17".into())),
                    ..UpdatePersonRequest::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name(), "Alice Liddell");
        assert_eq!(updated.birth_date().unwrap().to_string(), "1990-05-17");

        let clash = use_cases
            .update_me(
                alice.id(),
                UpdatePersonRequest {
                    email: Some("Bob@Example.com".into()),
                    ..UpdatePersonRequest::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(clash.kind(), ErrorKind::Conflict);

        let cleared = use_cases
            .update_me(
                alice.id(),
                UpdatePersonRequest {
                    birth_date: Some(None),
                    ..UpdatePersonRequest::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.birth_date(), None);
        assert_eq!(use_cases.get_me(alice.id()).await.unwrap().name(), "Alice Liddell");
        assert_eq!(
            use_cases.get_me(99).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
