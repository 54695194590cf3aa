//! Composition root: wires repositories, services and use cases into the
//! state shared by every request.

use log::info;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::auth::{RevocationStore, TokenService};
use crate::config::Config;
use crate::domain::repositories::{
    PersonRepository, TodoQueryRepository, TodoRepository, UserQueryRepository, UserRepository,
};
use crate::domain::services::UserSecurityService;
use crate::persistence::{memory, postgres};
use crate::usecases::{AuthUseCases, PersonUseCases, TodoUseCases};

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub tokens: Arc<TokenService>,
    pub users: Arc<dyn UserRepository>,
    pub user_queries: Arc<dyn UserQueryRepository>,
    pub auth: AuthUseCases,
    pub todos: TodoUseCases,
    pub people: PersonUseCases,
    pub security: UserSecurityService,
    /// Cancelled when the server shuts down. Requests derive child tokens.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Postgres when `DATABASE_URL` is set, otherwise in-memory storage.
    pub async fn from_config(config: &Config) -> Result<Self, sqlx::Error> {
        match config.database_url.as_deref() {
            Some(url) => {
                let pool = postgres::connect(url, config.database_max_connections).await?;
                postgres::apply_schema(&pool).await?;
                let users = Arc::new(postgres::PgUserRepository::new(pool.clone()));
                let people = Arc::new(postgres::PgPersonRepository::new(pool.clone()));
                let todos = Arc::new(postgres::PgTodoRepository::new(pool));
                Ok(Self::from_repositories(
                    config,
                    users.clone(),
                    users,
                    people,
                    todos.clone(),
                    todos,
                ))
            }
            None => Ok(Self::in_memory(config)),
        }
    }

    pub fn in_memory(config: &Config) -> Self {
        info!("using in-memory storage; data is lost on restart");
        let users = Arc::new(memory::InMemoryUserRepository::new());
        let todos = Arc::new(memory::InMemoryTodoRepository::new());
        Self::from_repositories(
            config,
            users.clone(),
            users,
            Arc::new(memory::InMemoryPersonRepository::new()),
            todos.clone(),
            todos,
        )
    }

    /// Builds the state over caller-supplied repositories.
    pub fn from_repositories(
        config: &Config,
        users: Arc<dyn UserRepository>,
        user_queries: Arc<dyn UserQueryRepository>,
        people: Arc<dyn PersonRepository>,
        todos: Arc<dyn TodoRepository>,
        todo_queries: Arc<dyn TodoQueryRepository>,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(
            config.token_config(),
            Arc::new(RevocationStore::new()),
        ));
        Self {
            app_name: config.app_name.clone(),
            auth: AuthUseCases::new(
                users.clone(),
                people.clone(),
                tokens.clone(),
                config.jwt_issuer.clone(),
                config.bcrypt_cost,
            ),
            todos: TodoUseCases::new(todos, todo_queries),
            people: PersonUseCases::new(users.clone(), people),
            security: UserSecurityService::new(users.clone(), user_queries.clone()),
            users,
            user_queries,
            tokens,
            shutdown: CancellationToken::new(),
        }
    }
}
