//! Router tests: every endpoint driven in-process through `oneshot`, with a
//! scripted text generator and a deterministic embedder.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use futures::future::BoxFuture;
use ndarray::Array1;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use estthmar_chat::TextGenerator;
use estthmar_core::{Error, EstthmarConfig, Result};
use estthmar_infer::EmbedderBackend;
use estthmar_server::{build_router, AppState};
use estthmar_store::{NewChunk, SqliteStore};

const DIM: usize = 26;

/// Bag-of-letters embedding, so similarity is predictable.
struct LetterEmbedder;

impl EmbedderBackend for LetterEmbedder {
    fn embed(&self, text: &str) -> Result<Array1<f32>> {
        let mut v = Array1::zeros(DIM);
        for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
            v[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
        }
        Ok(v)
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "letters"
    }
}

/// Returns a canned reply and records every prompt it receives.
struct ScriptedLlm {
    reply: std::result::Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

impl TextGenerator for ScriptedLlm {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String>> {
        self.prompts.lock().push(prompt.to_string());
        let reply = self.reply.clone().map_err(Error::Llm);
        Box::pin(futures::future::ready(reply))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

struct Harness {
    app: Router,
    state: Arc<AppState>,
    llm: Arc<ScriptedLlm>,
    _dir: TempDir,
}

fn harness(llm: ScriptedLlm) -> Harness {
    let dir = TempDir::new().unwrap();
    let config = EstthmarConfig::from_lookup(dir.path(), |key| {
        (key == "EMBEDDING_DIM").then(|| DIM.to_string())
    })
    .unwrap();
    let store = SqliteStore::open(&config.data_paths.vectordb, DIM).unwrap();
    let llm = Arc::new(llm);
    let state = Arc::new(AppState::new(
        config,
        store,
        Arc::new(LetterEmbedder),
        llm.clone(),
    ));
    Harness {
        app: build_router(state.clone()),
        state,
        llm,
        _dir: dir,
    }
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart_request(field: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "estthmar-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload_pdf/")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

/// Multi-page PDF with one line of Courier text per page.
fn pdf_with_pages(texts: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in texts {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

fn seed(store: &SqliteStore, source: &str, texts: &[&str]) {
    let chunks: Vec<NewChunk> = texts
        .iter()
        .map(|t| NewChunk {
            text: t.to_string(),
            page: Some(0),
            metadata: json!({ "source": source, "page": 0 }),
            embedding: LetterEmbedder.embed(t).unwrap().to_vec(),
        })
        .collect();
    store.add_document(source, 1, None, &chunks).unwrap();
}

// ------------------------------------------------------------------
// /api/health, /api/stats
// ------------------------------------------------------------------

#[tokio::test]
async fn health_reports_ok() {
    let h = harness(ScriptedLlm::replying(""));
    let req = Request::get("/api/health").body(Body::empty()).unwrap();
    let (status, body) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn stats_counts_index_contents() {
    let h = harness(ScriptedLlm::replying(""));
    seed(&h.state.store, "Documents/a.pdf", &["alpha", "beta"]);

    let req = Request::get("/api/stats").body(Body::empty()).unwrap();
    let (status, body) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documents"], 1);
    assert_eq!(body["chunks"], 2);
    assert_eq!(body["embeddings"], 2);
    assert_eq!(body["embeddingDimension"], DIM);
    assert_eq!(body["embedder"], "letters");
    assert_eq!(body["llmModel"], "scripted");
}

// ------------------------------------------------------------------
// /api/ai/
// ------------------------------------------------------------------

#[tokio::test]
async fn questions_are_extracted_from_model_output() {
    let h = harness(ScriptedLlm::replying(
        "Sure! Here are the questions:\n\
         - Q1: Who are the customers? (students and commuters),\n\
         - Q2: What will the cart cost? Example: equipment and permits,\n\
         - Q3: Where will it operate?",
    ));

    let (status, body) = send(
        &h.app,
        json_request("/api/ai/", json!({ "query": "A mobile coffee cart" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            {"id": 1, "question": "Who are the customers?", "hint": "students and commuters"},
            {"id": 2, "question": "What will the cart cost?", "hint": "equipment and permits"},
            {"id": 3, "question": "Where will it operate?", "hint": "No hint provided"},
        ])
    );

    let prompts = h.llm.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0], h.state.prompts.questions.render("A mobile coffee cart"));
}

#[tokio::test]
async fn questions_without_markers_is_empty_list() {
    let h = harness(ScriptedLlm::replying("I cannot help with that."));
    let (status, body) = send(&h.app, json_request("/api/ai/", json!({ "query": "x" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn questions_missing_query_is_rejected() {
    let h = harness(ScriptedLlm::replying("Q1: Never asked?"));
    let (status, _) = send(&h.app, json_request("/api/ai/", json!({ "text": "x" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(h.llm.prompts().is_empty());
}

#[tokio::test]
async fn model_failure_is_server_error() {
    let h = harness(ScriptedLlm::failing("connection refused"));
    let (status, body) = send(&h.app, json_request("/api/ai/", json!({ "query": "x" }))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("connection refused"));
}

// ------------------------------------------------------------------
// /api/ask_pdf/
// ------------------------------------------------------------------

#[tokio::test]
async fn ask_fills_question_template_with_retrieved_chunks() {
    let h = harness(ScriptedLlm::replying("Q1: How big is the zone?"));
    seed(&h.state.store, "Documents/plan.pdf", &["zzz", "bbb", "zzz zzz y"]);

    let (status, body) = send(
        &h.app,
        json_request("/api/ask_pdf/", json!({ "query": "zz" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "Q1: How big is the zone?");
    assert_eq!(
        body["sources"],
        json!([
            {"source": "Documents/plan.pdf", "page_content": "zzz"},
            {"source": "Documents/plan.pdf", "page_content": "zzz zzz y"},
        ])
    );

    let prompts = h.llm.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0], h.state.prompts.questions.render("zzz\n\nzzz zzz y"));
}

#[tokio::test]
async fn ask_with_empty_index_still_calls_model() {
    let h = harness(ScriptedLlm::replying("No context."));
    let (status, body) = send(
        &h.app,
        json_request("/api/ask_pdf/", json!({ "query": "anything" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "No context.");
    assert_eq!(body["sources"], json!([]));
    assert_eq!(h.llm.prompts(), vec![h.state.prompts.questions.render("")]);
}

#[tokio::test]
async fn ask_returns_at_most_top_k_sources() {
    let h = harness(ScriptedLlm::replying("ok"));
    let texts: Vec<String> = (0..25).map(|i| format!("zz{}", "a".repeat(i % 3))).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    seed(&h.state.store, "Documents/many.pdf", &refs);

    let (status, body) = send(
        &h.app,
        json_request("/api/ask_pdf/", json!({ "query": "zz" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sources"].as_array().unwrap().len(), 20);
}

// ------------------------------------------------------------------
// /api/upload_pdf/
// ------------------------------------------------------------------

#[tokio::test]
async fn upload_saves_and_indexes_pdf() {
    let h = harness(ScriptedLlm::replying(""));
    let pdf = pdf_with_pages(&["Coffee cart market", "Startup costs"]);

    let (status, body) = send(&h.app, multipart_request("file", "plan.pdf", &pdf)).await;

    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["status"], "Successfully Uploaded");
    assert_eq!(body["filename"], "plan.pdf");
    assert_eq!(body["doc_len"], 2);
    assert_eq!(
        body["chunks"].as_i64().unwrap(),
        h.state.store.count_chunks().unwrap()
    );

    let saved = h.state.config.data_paths.documents.join("plan.pdf");
    assert_eq!(std::fs::read(saved).unwrap(), pdf);
    assert_eq!(h.state.store.count_documents().unwrap(), 1);
}

#[tokio::test]
async fn upload_same_name_overwrites_file() {
    let h = harness(ScriptedLlm::replying(""));
    let first = pdf_with_pages(&["one"]);
    let second = pdf_with_pages(&["one", "two", "three"]);

    send(&h.app, multipart_request("file", "plan.pdf", &first)).await;
    let (status, body) = send(&h.app, multipart_request("file", "plan.pdf", &second)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["doc_len"], 3);
    let saved = h.state.config.data_paths.documents.join("plan.pdf");
    assert_eq!(std::fs::read(saved).unwrap(), second);
}

#[tokio::test]
async fn upload_strips_directories_from_filename() {
    let h = harness(ScriptedLlm::replying(""));
    let pdf = pdf_with_pages(&["page"]);

    let (status, body) =
        send(&h.app, multipart_request("file", "../../outside/plan.pdf", &pdf)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "plan.pdf");
    assert!(h.state.config.data_paths.documents.join("plan.pdf").is_file());
}

#[tokio::test]
async fn upload_invalid_pdf_is_server_error() {
    let h = harness(ScriptedLlm::replying(""));
    let (status, body) = send(&h.app, multipart_request("file", "bad.pdf", b"not a pdf")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("Extraction"));
    assert_eq!(h.state.store.count_documents().unwrap(), 0);
}

#[tokio::test]
async fn upload_without_file_field_is_server_error() {
    let h = harness(ScriptedLlm::replying(""));
    let pdf = pdf_with_pages(&["page"]);
    let (status, body) = send(&h.app, multipart_request("document", "plan.pdf", &pdf)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("file"));
}
