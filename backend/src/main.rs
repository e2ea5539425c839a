mod config;
mod dentist;
mod errors;
mod llm;
mod questionnaire;
mod routes;
mod upload;
mod vision;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use config::AppConfig;
use dentist::DentistLocator;
use questionnaire::QuestionnaireAnalyzer;
use routes::configure_routes;
use std::env;
use vision::DetectionService;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(log_level));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::from_env();
    log::debug!("Log filter {}, upload limit {} bytes", config.log_level, config.max_upload_bytes);

    let detection = web::Data::new(DetectionService::from_config(&config));
    if detection.is_mock() {
        log::warn!("Lesion classifier running in mock mode, predictions are random");
    }

    let analyzer = web::Data::new(QuestionnaireAnalyzer::from_config(config.llm.as_ref()));
    log::info!("Questionnaire strategies: {:?}", analyzer.strategy_names());

    let locator = web::Data::new(DentistLocator::from_config(&config));
    log::info!(
        "Dentist search: {}",
        if locator.is_live() { "live" } else { "mock data" }
    );

    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::JsonConfig::default().error_handler(errors::json_error_handler))
            .app_data(detection.clone())
            .app_data(analyzer.clone())
            .app_data(locator.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
