mod dentist;
mod detection;
mod questionnaire;

use actix_web::{web, HttpResponse};
use serde_json::json;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::scope("/detection").configure(detection::configure))
        .service(web::scope("/questionnaire").configure(questionnaire::configure))
        .service(web::scope("/dentist").configure(dentist::configure));
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "Oral Cancer Detection API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "active",
        "endpoints": {
            "detection": "/detection",
            "questionnaire": "/questionnaire",
            "dentist": "/dentist"
        }
    }))
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "message": "API is running"
    }))
}
