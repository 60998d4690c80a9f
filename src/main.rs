use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use log::{info, warn};
use sqlx::postgres::PgPoolOptions;

use taskguard::auth::{GateMiddleware, PrincipalResolver, TokenCodec};
use taskguard::authz::{
    DecisionEngine, PgResourceLoader, PgRoleStore, RequestGate, ResourceLoader, RoleStore,
    TimeoutResourceLoader, TimeoutRoleStore,
};
use taskguard::config::Config;
use taskguard::routes::{self, health};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config =
        Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e.to_string()))?;

    match PgRoleStore::new(pool.clone()).purge_orphans().await {
        Ok(0) => {}
        Ok(purged) => info!("Purged {} role assignments of deleted tasks", purged),
        Err(_) => warn!("Could not purge role assignments of deleted tasks"),
    }

    let codec = Arc::new(TokenCodec::new(
        config.jwt_secret.as_bytes(),
        config.token_ttl_secs,
    ));
    let roles: Arc<dyn RoleStore> = Arc::new(TimeoutRoleStore::new(
        PgRoleStore::new(pool.clone()),
        config.role_store_timeout,
    ));
    let loader: Arc<dyn ResourceLoader> = Arc::new(TimeoutResourceLoader::new(
        PgResourceLoader::new(pool.clone()),
        config.role_store_timeout,
    ));
    let gate = Arc::new(RequestGate::new(
        PrincipalResolver::new(codec.clone()),
        DecisionEngine::new(roles.clone()),
        loader,
    ));

    info!("Starting taskguard server at {}", config.server_url());

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::from(codec.clone()))
            .app_data(web::Data::from(roles.clone()))
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(health::health)
            .service(
                web::scope("/api")
                    .wrap(GateMiddleware::new(gate.clone()))
                    .configure(routes::config),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
