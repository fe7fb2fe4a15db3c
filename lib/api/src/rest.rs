use actix_web::{web, App, HttpResponse, HttpServer, Result as ActixResult};
use actix_cors::Cors;
use songvec_core::{Error, ServingContract, TextField};
use songvec_storage::ModelRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

#[derive(Deserialize)]
struct EmbedRequest {
    text: String,
    field: Option<String>,
}

#[derive(Serialize)]
struct EmbedResponse {
    vector: Vec<f64>,
}

#[derive(Serialize)]
struct ModelInfo {
    embedding_model: String,
    embedding_dim: usize,
    contract: ServingContract,
    target_dim: usize,
    fused_dim: usize,
    n_fitted: usize,
    n_records: usize,
    field_dims: Vec<FieldInfo>,
    explained_variance_ratio: Vec<f64>,
}

#[derive(Serialize)]
struct FieldInfo {
    field: TextField,
    output_dim: usize,
    fallback: bool,
}

pub struct RestApi;

impl RestApi {
    pub async fn start(registry: Arc<ModelRegistry>, port: u16) -> std::io::Result<()> {
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .configure(|cfg| RestApi::configure(cfg, registry.clone()))
        })
        .bind(("0.0.0.0", port))?
        .run()
        .await
    }

    /// Register the routes and shared state on an app.
    pub fn configure(cfg: &mut web::ServiceConfig, registry: Arc<ModelRegistry>) {
        cfg.app_data(web::Data::new(registry))
            .route("/health", web::get().to(health))
            .route("/embed", web::post().to(embed))
            .route("/model", web::get().to(model_info))
            .route("/model/reload", web::post().to(reload_model));
    }
}

fn error_response(err: &Error) -> HttpResponse {
    let body = serde_json::json!({ "error": err.to_string() });
    match err {
        Error::InvalidConfig(_) | Error::DimensionMismatch { .. } => HttpResponse::BadRequest().json(body),
        _ => HttpResponse::InternalServerError().json(body),
    }
}

async fn health() -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

async fn embed(
    registry: web::Data<Arc<ModelRegistry>>,
    req: web::Json<EmbedRequest>,
) -> ActixResult<HttpResponse> {
    let field = match req.field.as_deref() {
        None => None,
        Some(name) => match TextField::parse(name) {
            Some(field) => Some(field),
            None => {
                return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                    "error": format!("unknown field: {}", name)
                })));
            }
        },
    };

    let encoder = registry.current();
    let result = match field {
        Some(field) => encoder.encode_in_field(&req.text, field),
        None => encoder.encode(&req.text),
    };

    match result {
        Ok(vector) => {
            debug!(chars = req.text.len(), field = ?field, "query embedded");
            Ok(HttpResponse::Ok().json(EmbedResponse {
                vector: vector.into_inner(),
            }))
        }
        Err(e) => {
            error!(error = %e, "embedding failed");
            Ok(error_response(&e))
        }
    }
}

async fn model_info(registry: web::Data<Arc<ModelRegistry>>) -> ActixResult<HttpResponse> {
    let encoder = registry.current();
    let artifact = encoder.artifact();
    let header = &artifact.header;

    let info = ModelInfo {
        embedding_model: header.embedding_model.clone(),
        embedding_dim: header.embedding_dim,
        contract: header.contract,
        target_dim: header.target_dim,
        fused_dim: header.fused_dim,
        n_fitted: artifact.reduction.n_fitted(),
        n_records: header.n_records,
        field_dims: artifact
            .fields
            .iter()
            .map(|model| FieldInfo {
                field: model.field,
                output_dim: model.output_dim,
                fallback: model.is_fallback(header.strategy),
            })
            .collect(),
        explained_variance_ratio: artifact.reduction.explained_variance_ratio().to_vec(),
    };
    Ok(HttpResponse::Ok().json(info))
}

async fn reload_model(registry: web::Data<Arc<ModelRegistry>>) -> ActixResult<HttpResponse> {
    match registry.reload() {
        Ok(encoder) => {
            info!(records = encoder.artifact().header.n_records, "model reloaded via API");
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "result": true,
                "n_records": encoder.artifact().header.n_records
            })))
        }
        Err(e) => Ok(error_response(&e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};
    use songvec_core::{fit_pipeline, HashingEmbedder, NumericAttribute, PipelineConfig, SongRecord};
    use songvec_storage::ArtifactStore;
    use tempfile::TempDir;

    fn registry(dir: &TempDir, contract: ServingContract) -> Arc<ModelRegistry> {
        let embedder = HashingEmbedder::new(32);
        let records: Vec<SongRecord> = (0..16)
            .map(|i| {
                SongRecord::new(i.to_string())
                    .with_artists([format!("Artist {}", i % 4)])
                    .with_genre(["rock", "ambient"][i % 2])
                    .with_numeric(NumericAttribute::Valence, i as f64 / 16.0)
            })
            .collect();
        let config = PipelineConfig {
            contract,
            ..PipelineConfig::default()
        };
        let artifact = fit_pipeline(&records, &embedder, &config).unwrap().artifact;
        let store = ArtifactStore::new(dir.path().join("model.bin"));
        store.save(&artifact).unwrap();
        Arc::new(ModelRegistry::open(store, Arc::new(embedder)).unwrap())
    }

    #[actix_web::test]
    async fn test_embed_returns_unit_vector() {
        let dir = TempDir::new().unwrap();
        let app = test::init_service(
            App::new().configure(|cfg| RestApi::configure(cfg, registry(&dir, ServingContract::Fused))),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/embed")
            .set_json(serde_json::json!({ "text": "songs like Artist 1" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let vector: Vec<f64> = serde_json::from_value(body["vector"].clone()).unwrap();
        assert_eq!(vector.len(), 30);
        let norm: f64 = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[actix_web::test]
    async fn test_unknown_field_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let app = test::init_service(
            App::new().configure(|cfg| RestApi::configure(cfg, registry(&dir, ServingContract::Fused))),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/embed")
            .set_json(serde_json::json!({ "text": "x", "field": "lyrics" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_field_under_text_only_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let app = test::init_service(
            App::new().configure(|cfg| RestApi::configure(cfg, registry(&dir, ServingContract::TextOnly))),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/embed")
            .set_json(serde_json::json!({ "text": "x", "field": "genre" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_model_info_and_reload() {
        let dir = TempDir::new().unwrap();
        let app = test::init_service(
            App::new().configure(|cfg| RestApi::configure(cfg, registry(&dir, ServingContract::Fused))),
        )
        .await;

        let req = test::TestRequest::get().uri("/model").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["target_dim"], 30);
        assert_eq!(body["n_records"], 16);
        assert_eq!(body["contract"], "fused");

        let req = test::TestRequest::post().uri("/model/reload").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        std::fs::remove_file(dir.path().join("model.bin")).unwrap();
        let req = test::TestRequest::post().uri("/model/reload").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn test_health() {
        let dir = TempDir::new().unwrap();
        let app = test::init_service(
            App::new().configure(|cfg| RestApi::configure(cfg, registry(&dir, ServingContract::Fused))),
        )
        .await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
}
