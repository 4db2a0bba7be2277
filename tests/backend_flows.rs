//! Collection listing, chat and upload flows against a mock backend.

use docchat::backend::{BackendError, HttpBackend};
use docchat::chat::{self, build_request, query_backend, ERROR_ANSWER, NO_ANSWER};
use docchat::collections::{fetch_collections, list_collections, ListOutcome};
use docchat::config::BackendConfig;
use docchat::models::{Citation, Collection, Document, Role};
use docchat::session::Session;
use docchat::upload::{handle_upload, UploadOutcome, UploadRequest};
use serde_json::json;
use std::collections::BTreeSet;
use wiremock::matchers::{body_partial_json, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_for(server: &MockServer) -> HttpBackend {
    let config = BackendConfig {
        base_path: Some(server.uri()),
        ..BackendConfig::default()
    };
    HttpBackend::new(&config).unwrap()
}

async fn mount_page(server: &MockServer, page: u32, total_pages: u32, names: &[(&str, &str)]) {
    let collections: Vec<_> = names
        .iter()
        .map(|(name, uuid)| json!({"name": name, "uuid": uuid}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/collection/list"))
        .and(query_param("page", page.to_string()))
        .and(query_param("size", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "collections": collections,
            "meta": {"total_pages": total_pages}
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_documents(server: &MockServer, uuid: &str, docs: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/collection/{}", uuid)))
        .and(query_param("with_documents", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "documents": docs })))
        .mount(server)
        .await;
}

fn labels(collections: &[Collection]) -> Vec<&str> {
    collections.iter().map(|c| c.label.as_str()).collect()
}

// ─── Collections ────────────────────────────────────────────────────

#[tokio::test]
async fn listing_without_documents_is_sorted_across_pages() {
    let server = MockServer::start().await;
    mount_page(&server, 1, 2, &[("zeta", "u-z"), ("alpha", "u-a")]).await;
    mount_page(&server, 2, 2, &[("MIDDLE", "u-m")]).await;

    let collections = list_collections(&backend_for(&server), false)
        .await
        .unwrap();

    assert_eq!(labels(&collections), vec!["Alpha", "Middle", "Zeta"]);
    assert!(collections.iter().all(|c| c.children.is_none()));
    assert!(collections.iter().all(|c| !c.show_checkbox));
    assert_eq!(collections[1].value, "u-m");
}

#[tokio::test]
async fn only_first_page_bounds_iteration() {
    let server = MockServer::start().await;
    mount_page(&server, 1, 2, &[("a", "1")]).await;
    // Page 2 claims more pages; they must not be requested.
    mount_page(&server, 2, 5, &[("b", "2")]).await;
    Mock::given(method("GET"))
        .and(path("/collection/list"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let collections = list_collections(&backend_for(&server), false)
        .await
        .unwrap();
    assert_eq!(collections.len(), 2);
}

#[tokio::test]
async fn populated_listing_keeps_paging_order() {
    let server = MockServer::start().await;
    mount_page(&server, 1, 1, &[("zeta", "u-z"), ("alpha", "u-a"), ("empty", "u-e")]).await;
    mount_documents(&server, "u-z", &["z1.pdf", "z2.pdf"]).await;
    mount_documents(&server, "u-a", &["a1.pdf"]).await;
    mount_documents(&server, "u-e", &[]).await;

    let collections = list_collections(&backend_for(&server), true)
        .await
        .unwrap();

    assert_eq!(labels(&collections), vec!["Zeta", "Alpha", "Empty"]);
    assert_eq!(
        collections[0].children,
        Some(vec![Document::new("z1.pdf"), Document::new("z2.pdf")])
    );
    assert_eq!(collections[1].documents().len(), 1);
    assert!(collections[1].documents().iter().all(|d| !d.show_checkbox));
    assert_eq!(collections[2].children, None);
}

#[tokio::test]
async fn one_failed_document_fetch_drops_the_whole_listing() {
    let server = MockServer::start().await;
    mount_page(&server, 1, 1, &[("first", "u-1"), ("second", "u-2")]).await;
    mount_documents(&server, "u-1", &["ok.pdf"]).await;
    Mock::given(method("GET"))
        .and(path("/collection/u-2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let outcome = fetch_collections(&backend_for(&server), true).await;
    assert!(matches!(
        outcome,
        ListOutcome::PopulationFailed(BackendError::Status { status: 500, .. })
    ));
    assert_eq!(outcome.into_collections(), None);
}

#[tokio::test]
async fn paging_failure_returns_what_was_accumulated() {
    let server = MockServer::start().await;
    mount_page(&server, 1, 3, &[("zeta", "u-z"), ("alpha", "u-a")]).await;
    Mock::given(method("GET"))
        .and(path("/collection/list"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let outcome = fetch_collections(&backend_for(&server), false).await;
    match outcome {
        ListOutcome::Partial { collections, error } => {
            // Partial lists are returned as accumulated, not sorted.
            assert_eq!(labels(&collections), vec!["Zeta", "Alpha"]);
            assert!(matches!(error, BackendError::Decode { .. }));
        }
        other => panic!("expected partial listing, got {:?}", other),
    }
}

#[tokio::test]
async fn paging_failure_skips_document_population() {
    let server = MockServer::start().await;
    mount_page(&server, 1, 2, &[("zeta", "u-z"), ("alpha", "u-a")]).await;
    Mock::given(method("GET"))
        .and(path("/collection/list"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/collection/u-"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"documents": ["x.pdf"]})))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = fetch_collections(&backend_for(&server), true).await;
    match outcome {
        ListOutcome::Partial { collections, error } => {
            assert_eq!(labels(&collections), vec!["Zeta", "Alpha"]);
            assert!(collections.iter().all(|c| c.children.is_none()));
            assert_eq!(error.status(), Some(500));
        }
        other => panic!("expected partial listing, got {:?}", other),
    }
}

#[tokio::test]
async fn first_page_without_meta_keeps_its_collections() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collection/list"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "collections": [{"name": "a", "uuid": "1"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collection/list"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let outcome = fetch_collections(&backend, false).await;
    match outcome {
        ListOutcome::Partial { collections, error } => {
            assert_eq!(collections, vec![Collection::new("A", "1")]);
            assert!(matches!(error, BackendError::Decode { .. }));
        }
        other => panic!("expected partial listing, got {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_backend_yields_empty_listing() {
    let config = BackendConfig {
        base_path: Some("http://127.0.0.1:1".to_string()),
        ..BackendConfig::default()
    };
    let backend = HttpBackend::new(&config).unwrap();
    assert_eq!(list_collections(&backend, true).await, Some(Vec::new()));
}

// ─── Chat ───────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_sends_fixed_parameters_and_label_identifier() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_partial_json(json!({
            "mode": "document",
            "id_type": "name",
            "identifier": "guide.pdf",
            "query": "what is it?",
            "llm": {"max_tokens": 200, "logit_bias": {"50256": -100}},
            "include_citations": true,
            "include_usage": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "a guide"})))
        .expect(1)
        .mount(&server)
        .await;

    let collection = Collection::new("Manuals", "u-1");
    let doc = Document::new("guide.pdf");
    let mut session = Session::new();
    let reply = chat::ask(
        &backend_for(&server),
        &mut session,
        &collection,
        Some(&doc),
        "what is it?",
    )
    .await;

    assert_eq!(reply.text, "a guide");
    assert_eq!(reply.citations, None);
}

#[tokio::test]
async fn chat_distinguishes_missing_and_empty_citations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_partial_json(json!({"query": "empty"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": "r", "citations": []})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_partial_json(json!({"query": "cited"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "citations": [
                {"document": "/u/a.pdf", "page": 0},
                {"document": "/u/a.pdf", "page": 0}
            ]
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let collection = Collection::new("Manuals", "u-1");

    let empty = chat::answer(&backend, &collection, None, "empty").await;
    assert_eq!(empty.text, "r");
    assert_eq!(empty.citations, Some(BTreeSet::new()));

    let cited = chat::answer(&backend, &collection, None, "cited").await;
    assert_eq!(cited.text, NO_ANSWER);
    let expected: BTreeSet<_> = [Citation::new("/u/a.pdf", 0)].into_iter().collect();
    assert_eq!(cited.citations, Some(expected));
}

#[tokio::test]
async fn chat_failure_uses_error_text_and_still_records_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let collection = Collection::new("Manuals", "u-1");

    let err = query_backend(&backend, &build_request(&collection, None, "q"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(500));

    let mut session = Session::new();
    let reply = chat::ask(&backend, &mut session, &collection, None, "why?").await;
    assert_eq!(reply.text, ERROR_ANSWER);
    assert_eq!(reply.citations, None);

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].role, Role::User);
    assert_eq!(transcript[0].content, "why?");
    assert_eq!(transcript[1].role, Role::Assistant);
    assert_eq!(transcript[1].content, ERROR_ANSWER);
}

#[tokio::test]
async fn chat_with_unconfigured_backend_fails_soft() {
    let backend = HttpBackend::new(&BackendConfig::default()).unwrap();
    let reply = chat::answer(&backend, &Collection::new("A", "1"), None, "q").await;
    assert_eq!(reply.text, ERROR_ANSWER);
    assert_eq!(reply.citations, None);
}

// ─── Upload ─────────────────────────────────────────────────────────

fn pdf_request() -> UploadRequest {
    UploadRequest {
        collection: "Manuals".to_string(),
        file_name: "new.pdf".to_string(),
        bytes: b"%PDF-1.4".to_vec(),
    }
}

#[tokio::test]
async fn successful_upload_refreshes_sidebar_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/document/upload"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, 1, 1, &[("manuals", "u-1")]).await;
    mount_documents(&server, "u-1", &["new.pdf"]).await;

    let outcome = handle_upload(&backend_for(&server), true, pdf_request()).await;
    match outcome {
        UploadOutcome::Uploaded { sidebar } => {
            let sidebar = sidebar.unwrap();
            assert_eq!(sidebar[0].documents()[0].label, "new.pdf");
        }
        other => panic!("expected upload, got {:?}", other),
    }

    let uploads: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/document/upload")
        .collect();
    let body = String::from_utf8_lossy(&uploads[0].body);
    assert!(body.contains("name=\"collection\""));
    assert!(body.contains("Manuals"));
    assert!(body.contains("filename=\"new.pdf\""));
}

#[tokio::test]
async fn rejected_upload_does_not_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/document/upload"))
        .respond_with(ResponseTemplate::new(422))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/collection/list"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = handle_upload(&backend_for(&server), true, pdf_request()).await;
    assert!(matches!(
        outcome,
        UploadOutcome::Failed(BackendError::Status { status: 422, .. })
    ));
}

#[tokio::test]
async fn upload_is_skipped_unless_submitted_and_complete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/document/upload"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let outcome = handle_upload(&backend, false, pdf_request()).await;
    assert!(matches!(outcome, UploadOutcome::Skipped));

    let mut no_file = pdf_request();
    no_file.file_name.clear();
    let outcome = handle_upload(&backend, true, no_file).await;
    assert!(!outcome.is_uploaded());
}
