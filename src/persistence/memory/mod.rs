//! Process-local repositories. Each keeps an ordered map behind a
//! `parking_lot` lock and hands out ids from an atomic sequence.

mod filter;
mod person;
mod todo;
mod user;

pub use person::InMemoryPersonRepository;
pub use todo::InMemoryTodoRepository;
pub use user::InMemoryUserRepository;
