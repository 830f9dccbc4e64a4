use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;

use crate::auth::SessionManager;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    change_password, get_current_user, health_check, login, logout, refresh, register,
};

pub fn run(listener: TcpListener, manager: SessionManager) -> Result<Server, std::io::Error> {
    let jwt_config = manager.jwt_settings().clone();
    let manager = web::Data::new(manager);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(manager.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/v1/users")
                    // Public routes
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh-token", web::post().to(refresh))
                    // Protected routes (require a valid access token)
                    .service(
                        web::resource("/logout")
                            .wrap(JwtMiddleware::new(jwt_config.clone()))
                            .route(web::post().to(logout)),
                    )
                    .service(
                        web::resource("/change-password")
                            .wrap(JwtMiddleware::new(jwt_config.clone()))
                            .route(web::post().to(change_password)),
                    )
                    .service(
                        web::resource("/me")
                            .wrap(JwtMiddleware::new(jwt_config.clone()))
                            .route(web::get().to(get_current_user)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
