use delivery_service::config::Settings;
use delivery_service::{build_server, create_pool, run_migrations, AppState};
use dotenvy::dotenv;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let pool = create_pool(&settings.database_url).map_err(std::io::Error::other)?;
    if let Err(e) = run_migrations(&pool) {
        log::error!("failed to run database migrations: {}", e);
        std::process::exit(1);
    }

    log::info!(
        "Starting server at http://{}:{} (status policy: {:?})",
        settings.host,
        settings.port,
        settings.status_policy
    );

    let state = AppState::from_pool(pool, settings.status_policy, &settings.jwt_secret);
    build_server(state, &settings.host, settings.port)?.await
}
