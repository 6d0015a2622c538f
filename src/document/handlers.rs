use actix_web::http::header;
use actix_web::{web, HttpResponse, Responder};

use super::models::{DocumentOutcome, GenerationRequest};
use crate::error::DocumentError;
use crate::state::AppState;
use crate::{metrics, ErrorResponse};

fn error_response(e: &DocumentError) -> HttpResponse {
    let status = e.status_code();
    if status.is_server_error() {
        log::error!("Request failed: {}", e);
    } else {
        log::warn!("Request rejected: {}", e);
    }
    HttpResponse::build(status).json(ErrorResponse::new(e.kind(), &e.to_string()))
}

/// Generate inline (bytes) or enqueue when `async` is set (202 + acknowledgement).
pub async fn generate_document(
    req: web::Json<GenerationRequest>,
    data: web::Data<AppState>,
) -> impl Responder {
    let request = req.into_inner();

    match data.service.process_request(&request).await {
        Ok(DocumentOutcome::Generated(document)) => HttpResponse::Ok()
            .content_type(document.content_type.as_str())
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", document.filename),
            ))
            .body(document.bytes),
        Ok(DocumentOutcome::Accepted(ack)) => HttpResponse::Accepted().json(ack),
        Err(e) => error_response(&e),
    }
}

pub async fn generate_document_base64(
    req: web::Json<GenerationRequest>,
    data: web::Data<AppState>,
) -> impl Responder {
    match data.service.generate_base64_document(&req).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => error_response(&e),
    }
}

pub async fn readiness(data: web::Data<AppState>) -> impl Responder {
    let report = data.health.check().await;
    let up = report.is_up();
    let body = serde_json::json!({ "status": if up { "UP" } else { "DOWN" }, "checks": [report] });

    if up {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

pub async fn prometheus_metrics() -> impl Responder {
    match metrics::gather_text() {
        Ok(text) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(text),
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e)),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/documents")
            .service(web::resource("/generate").route(web::post().to(generate_document)))
            .service(
                web::resource("/generate-base64").route(web::post().to(generate_document_base64)),
            ),
    )
    .service(web::resource("/q/health/ready").route(web::get().to(readiness)))
    .service(web::resource("/metrics").route(web::get().to(prometheus_metrics)));
}
