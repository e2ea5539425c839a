use actix_web::{web, HttpResponse};
use serde_json::json;
use shared::DentistSearchRequest;

use crate::dentist::{emergency_contacts, specialties, DentistLocator};
use crate::errors::ApiError;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/find-dentists").route(web::post().to(find_dentists)))
        .service(web::resource("/specialties").route(web::get().to(list_specialties)))
        .service(web::resource("/emergency-contacts").route(web::get().to(list_emergency_contacts)));
}

async fn find_dentists(
    locator: web::Data<DentistLocator>,
    request: web::Json<DentistSearchRequest>,
) -> Result<HttpResponse, ApiError> {
    if request.address.trim().is_empty() {
        return Err(ApiError::BadRequest("Address is required".to_string()));
    }
    let response = locator.find_dentists(&request).await;
    log::info!(
        "Found {} dentists near {} (live={})",
        response.total_found,
        response.search_location,
        response.additional_info.live_search
    );
    Ok(HttpResponse::Ok().json(response))
}

async fn list_specialties() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "specialties": specialties() }))
}

async fn list_emergency_contacts() -> HttpResponse {
    HttpResponse::Ok().json(emergency_contacts())
}
