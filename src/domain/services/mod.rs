pub mod todo_service;
pub mod user_security_service;

pub use todo_service::{suggest_due_date_at, TodoService, MAX_TODOS_PER_DAY, SWEEP_LIMIT};
pub use user_security_service::{
    enforce_password_policy, role_grants, Permission, SuspiciousActivityCriteria,
    UserSecurityService,
};
