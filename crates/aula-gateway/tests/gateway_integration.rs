use std::sync::Arc;

use aula_core::Config;
use aula_core::bootstrap::{build_context, rebuild_index};
use aula_gateway::{AppState, RouterConfig, build_router};
use aula_llm::mock::MockProvider;
use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

fn plan_json() -> String {
    json!({
        "habilidades_bncc": ["EF05MA03"],
        "objetivos_aula": ["Comparar frações"],
        "metodologia": {"metodologias_sugeridas": ["Estudo dirigido"], "justificativa": "Prática guiada."},
        "materiais_necessarios": ["Réguas de frações"],
        "estrutura_aula": {
            "tempo_total": "50 minutos",
            "etapas": [{"nome": "Abertura", "tempo": "10 minutos", "atividades": ["Retomar conceitos"]}]
        },
        "avaliacao": {"tipos": ["Observação"], "criterios": ["Compara frações corretamente"]},
        "para_saber_mais": ["Material do professor"]
    })
    .to_string()
}

fn gerar(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/gerar")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn valid_request() -> Value {
    json!({"tema_conteudo": "Frações", "publico": "5º ano", "tempo_aula": "50 minutos"})
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn app_with_index(dir: &std::path::Path, provider: MockProvider) -> axum::Router {
    let mut config = Config::default();
    config.index.path = dir.join("index.json");
    let corpus = dir.join("corpus");
    std::fs::create_dir_all(&corpus).unwrap();
    std::fs::write(
        corpus.join("bncc.md"),
        "(EF05MA03) Identificar e representar frações (menores e maiores que a unidade).",
    )
    .unwrap();
    let ctx = build_context(&config, Arc::new(provider));
    rebuild_index(&ctx, &config, &corpus).await.unwrap();
    build_router(AppState::new(Arc::new(ctx)), RouterConfig::default())
}

#[tokio::test]
async fn gerar_returns_lesson_plan() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::with_responses(vec!["EF05MA03".into(), plan_json()]);
    let app = app_with_index(dir.path(), provider.clone()).await;

    let resp = app.oneshot(gerar(&valid_request())).await.unwrap();
    assert_eq!(resp.status(), 200);
    let plan = body_json(resp).await;
    assert_eq!(plan["estrutura_aula"]["tempo_total"], "50 minutos");
    assert_eq!(plan["habilidades_bncc"][0], "EF05MA03");
    assert_eq!(provider.chat_count(), 2);
}

#[tokio::test]
async fn malformed_body_is_invalid_request() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with_index(dir.path(), MockProvider::default()).await;

    let resp = app
        .oneshot(gerar(&json!({"tema_conteudo": "Frações"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["kind"], "invalid_request");
}

#[tokio::test]
async fn blank_field_is_invalid_request() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::default();
    let app = app_with_index(dir.path(), provider.clone()).await;

    let resp = app
        .oneshot(gerar(&json!({"tema_conteudo": "Frações", "publico": " ", "tempo_aula": "50 minutos"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["kind"], "invalid_request");
    assert!(body["error"]["message"].as_str().unwrap().contains("publico"));
    assert_eq!(provider.chat_count(), 0);
}

#[tokio::test]
async fn missing_index_is_service_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.index.path = dir.path().join("absent").join("index.json");
    let ctx = build_context(&config, Arc::new(MockProvider::default()));
    let app = build_router(AppState::new(Arc::new(ctx)), RouterConfig::default());

    let resp = app.oneshot(gerar(&valid_request())).await.unwrap();
    assert_eq!(resp.status(), 503);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["kind"], "index_not_found");
}

#[tokio::test]
async fn invalid_model_output_is_bad_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::with_responses(vec!["EF05MA03".into(), "{}".into(), "[]".into()]);
    let app = app_with_index(dir.path(), provider).await;

    let resp = app.oneshot(gerar(&valid_request())).await.unwrap();
    assert_eq!(resp.status(), 502);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["kind"], "schema_validation");
}
