use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use shared::DetectionResponse;

use crate::errors::ApiError;
use crate::upload::{decode_image, read_image_field, UploadError};
use crate::vision::DetectionService;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/analyze").route(web::post().to(analyze)));
}

async fn analyze(service: web::Data<DetectionService>, mut payload: Multipart) -> Result<HttpResponse, ApiError> {
    let upload = read_image_field(&mut payload, service.max_upload_bytes()).await?;
    log::info!(
        "Received image {} ({}, {} bytes, sha256 {})",
        upload.file_name.as_deref().unwrap_or("<unnamed>"),
        upload.mime_type,
        upload.bytes.len(),
        upload.digest()
    );

    let service = service.clone();
    let response = web::block(move || -> Result<DetectionResponse, image::ImageError> {
        let image = decode_image(&upload.bytes)?;
        Ok(service.analyze(&image))
    })
    .await?
    .map_err(UploadError::from)?;

    Ok(HttpResponse::Ok().json(response))
}
