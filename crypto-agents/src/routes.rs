use actix_web::{delete, get, post, put, web, HttpResponse};
use tokio::sync::Mutex;
use tracing::error;

use crate::error::ManagerError;
use crate::manager::InstanceManager;
use crate::models::{InstanceConfig, InstanceMetrics};

pub type ManagerData = web::Data<Mutex<InstanceManager>>;

fn error_response(e: ManagerError) -> HttpResponse {
    let body = serde_json::json!({ "error": e.to_string() });
    match &e {
        ManagerError::NotFound(_) => HttpResponse::NotFound().json(body),
        _ if e.is_client_error() => HttpResponse::BadRequest().json(body),
        _ => {
            error!("Request failed: {}", e);
            HttpResponse::InternalServerError().json(body)
        }
    }
}

#[get("/health")]
pub async fn health_check(manager: ManagerData) -> HttpResponse {
    let monitor = manager.lock().await.monitor().clone();
    let health = monitor.check_system_health().await;
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "system": health,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[get("/instances")]
pub async fn list_instances(manager: ManagerData) -> HttpResponse {
    HttpResponse::Ok().json(manager.lock().await.list_instances())
}

#[post("/instances")]
pub async fn create_instance(manager: ManagerData, config: web::Json<InstanceConfig>) -> HttpResponse {
    let mut manager = manager.lock().await;
    match manager
        .create_instance(config.into_inner())
        .and_then(|id| manager.get_instance(&id))
    {
        Ok(instance) => HttpResponse::Created().json(instance),
        Err(e) => error_response(e),
    }
}

#[get("/instances/{id}")]
pub async fn get_instance(manager: ManagerData, path: web::Path<String>) -> HttpResponse {
    match manager.lock().await.get_instance(&path) {
        Ok(instance) => HttpResponse::Ok().json(instance),
        Err(e) => error_response(e),
    }
}

#[put("/instances/{id}")]
pub async fn update_instance(
    manager: ManagerData,
    path: web::Path<String>,
    config: web::Json<InstanceConfig>,
) -> HttpResponse {
    match manager.lock().await.update_instance(&path, config.into_inner()) {
        Ok(instance) => HttpResponse::Ok().json(instance),
        Err(e) => error_response(e),
    }
}

#[delete("/instances/{id}")]
pub async fn delete_instance(manager: ManagerData, path: web::Path<String>) -> HttpResponse {
    match manager.lock().await.delete_instance(&path) {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => error_response(e),
    }
}

#[post("/instances/{id}/start")]
pub async fn start_instance(manager: ManagerData, path: web::Path<String>) -> HttpResponse {
    let mut manager = manager.lock().await;
    match manager.start_instance(&path).and_then(|_| manager.get_instance(&path)) {
        Ok(instance) => HttpResponse::Ok().json(instance),
        Err(e) => error_response(e),
    }
}

#[post("/instances/{id}/stop")]
pub async fn stop_instance(manager: ManagerData, path: web::Path<String>) -> HttpResponse {
    let mut manager = manager.lock().await;
    match manager.stop_instance(&path).and_then(|_| manager.get_instance(&path)) {
        Ok(instance) => HttpResponse::Ok().json(instance),
        Err(e) => error_response(e),
    }
}

#[get("/instances/{id}/metrics")]
pub async fn instance_metrics(manager: ManagerData, path: web::Path<String>) -> HttpResponse {
    let snapshot = manager.lock().await.metrics_snapshot(&path);
    match snapshot {
        Ok(snapshot) => HttpResponse::Ok().json(snapshot.with_health().await),
        Err(e) => error_response(e),
    }
}

#[post("/instances/{id}/metrics")]
pub async fn update_metrics(
    manager: ManagerData,
    path: web::Path<String>,
    metrics: web::Json<InstanceMetrics>,
) -> HttpResponse {
    match manager.lock().await.update_instance_metrics(&path, &metrics) {
        Ok(metrics) => HttpResponse::Ok().json(metrics),
        Err(e) => error_response(e),
    }
}

#[get("/instances/{id}/health")]
pub async fn instance_health(manager: ManagerData, path: web::Path<String>) -> HttpResponse {
    let monitor = {
        let manager = manager.lock().await;
        manager.get_instance(&path).map(|_| manager.monitor().clone())
    };
    match monitor {
        Ok(monitor) => HttpResponse::Ok().json(monitor.check_instance_health(&path).await),
        Err(e) => error_response(e),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(list_instances)
        .service(create_instance)
        .service(get_instance)
        .service(update_instance)
        .service(delete_instance)
        .service(start_instance)
        .service(stop_instance)
        .service(instance_metrics)
        .service(update_metrics)
        .service(instance_health);
}
