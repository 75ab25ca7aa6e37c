#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

//! HTTP round trips against the full route table with a real PDF upload

mod common;

use actix_web::http::{StatusCode, header};
use actix_web::{App, test, web};
use book_agent::config::Config;
use book_agent::database::VectorStore;
use book_agent::engine::{ChatModel, RagEngine, Session};
use book_agent::extraction::{ExtractionPipeline, PdfTextExtractor};
use book_agent::server::routes::upload_message;
use book_agent::server::{AppState, configure, cors};
use common::{ScriptedModel, WordBucketEmbedder, pdf_bytes};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;

const BOUNDARY: &str = "----book-agent-integration";
const ANSWER: &str = "Chapter one introduces the water cycle.";
const WATER_CYCLE: &str =
    "Chapter one describes the water cycle: evaporation, condensation and precipitation.";

async fn app_state(temp_dir: &TempDir) -> (web::Data<AppState>, Arc<ScriptedModel>) {
    let mut config = Config::default();
    config.server.upload_dir = temp_dir.path().join("uploads");
    config.server.index_dir = temp_dir.path().join("vector_index");

    let store = VectorStore::open(&config.server.index_dir)
        .await
        .expect("should open vector store");
    let model = ScriptedModel::new(ANSWER);
    let engine = RagEngine::new(
        &config,
        store,
        Arc::new(WordBucketEmbedder),
        Arc::clone(&model) as Arc<dyn ChatModel>,
        ExtractionPipeline::new(0).with_strategy(PdfTextExtractor::new()),
    );
    let session = Session::new(Arc::new(engine));

    (web::Data::new(AppState::new(session, &config)), model)
}

fn upload_request(filename: &str, content: &[u8]) -> test::TestRequest {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    test::TestRequest::post()
        .uri("/upload")
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ))
        .set_payload(body)
}

#[actix_web::test]
async fn upload_then_chat_over_http() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let (state, model) = app_state(&temp_dir).await;
    let app = test::init_service(
        App::new()
            .wrap(cors())
            .app_data(state.clone())
            .configure(configure),
    )
    .await;

    let pdf = pdf_bytes(&[WATER_CYCLE, "Chapter two covers clouds."]);
    let response = test::call_service(&app, upload_request("hydrology.pdf", &pdf).to_request()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let uploaded: Value = test::read_body_json(response).await;
    assert_eq!(uploaded["filename"], "hydrology.pdf");
    assert_eq!(uploaded["pages"], 2);
    assert_eq!(uploaded["message"], upload_message(2));
    assert!(temp_dir.path().join("uploads/hydrology.pdf").exists());

    let request = test::TestRequest::post()
        .uri("/chat")
        .set_json(json!({ "message": "What is chapter one about?" }))
        .to_request();
    let chat: Value = test::call_and_read_body_json(&app, request).await;

    assert_eq!(chat["response"], ANSWER);
    let prompt = model.last_prompt();
    assert!(prompt.contains("evaporation"));
    assert!(prompt.contains("Question: What is chapter one about?"));
}

#[actix_web::test]
async fn corrupt_upload_is_server_error_with_detail() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let (state, model) = app_state(&temp_dir).await;
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

    let response = test::call_service(
        &app,
        upload_request("broken.pdf", b"not really a pdf").to_request(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(response).await;
    let detail = body["detail"].as_str().expect("detail should be a string");
    assert!(detail.starts_with("Failed to read PDF"));
    assert!(model.prompts().is_empty());
}

#[actix_web::test]
async fn failed_upload_keeps_previous_book() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let (state, model) = app_state(&temp_dir).await;
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

    let good = pdf_bytes(&[WATER_CYCLE]);
    let response = test::call_service(&app, upload_request("hydrology.pdf", &good).to_request()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let blank = pdf_bytes(&["  "]);
    let response = test::call_service(&app, upload_request("blank.pdf", &blank).to_request()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let request = test::TestRequest::post()
        .uri("/chat")
        .set_json(json!({ "message": "Which processes are described?" }))
        .to_request();
    let chat: Value = test::call_and_read_body_json(&app, request).await;

    assert_eq!(chat["response"], ANSWER);
    assert!(model.last_prompt().contains("condensation"));
}

#[actix_web::test]
async fn text_file_is_bad_request() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let (state, _model) = app_state(&temp_dir).await;
    let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

    let response =
        test::call_service(&app, upload_request("notes.txt", b"plain text").to_request()).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["detail"], "Only PDF files are allowed.");
}
