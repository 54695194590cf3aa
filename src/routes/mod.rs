pub mod admin;
pub mod auth;
pub mod health;
pub mod people;
pub mod todos;

use actix_web::web;

use crate::auth::AuthMiddleware;
use crate::error::{json_error_handler, path_error_handler, query_error_handler};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler))
        .service(health::health)
        .service(
            web::scope("/api/v1")
                .wrap(AuthMiddleware)
                .service(
                    web::scope("/auth")
                        .service(auth::register)
                        .service(auth::login)
                        .service(auth::refresh)
                        .service(auth::logout)
                        .service(auth::me)
                        .service(auth::change_password),
                )
                // Fixed paths go before `/{id}` so they are matched first.
                .service(
                    web::scope("/todos")
                        .service(todos::list_todos)
                        .service(todos::create_todo)
                        .service(todos::statistics)
                        .service(todos::popular_tags)
                        .service(todos::productivity)
                        .service(todos::start_overdue)
                        .service(todos::cancel_stale)
                        .service(todos::get_todo)
                        .service(todos::update_todo)
                        .service(todos::delete_todo)
                        .service(todos::complete_todo)
                        .service(todos::change_status)
                        .service(todos::add_tag)
                        .service(todos::remove_tag),
                )
                .service(
                    web::scope("/people")
                        .service(people::get_me)
                        .service(people::update_me),
                )
                .service(
                    web::scope("/admin")
                        .service(admin::list_users)
                        .service(admin::user_stats)
                        .service(admin::deactivate_inactive)
                        .service(admin::block_suspicious),
                ),
        );
}
