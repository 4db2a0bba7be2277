//! Chat orchestration.
//!
//! Turns the user's selection and prompt into a `POST /chat` request with
//! fixed generation parameters, parses the answer and its citations, and
//! records the exchange in the session transcript.
//!
//! The request identifies its target by the selected item's display label
//! (`id_type = "name"`), not by the collection UUID.
//!
//! # Response handling
//!
//! | Backend reply | Answer text | Citations |
//! |---------------|-------------|-----------|
//! | 200 with `result` | `result` | set, or `None` without a `citations` key |
//! | 200 without `result` | [`NO_ANSWER`] | as above |
//! | non-200, transport or parse failure | [`ERROR_ANSWER`] | `None` |

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::backend::{Backend, BackendError};
use crate::models::{ChatMode, ChatRequest, Citation, Collection, Document, LlmParams};
use crate::session::Session;

/// Answer text used when a 200 response has no `result`.
pub const NO_ANSWER: &str = "I don't know the answer for the question you asked";

/// Answer text used for every failed chat call.
pub const ERROR_ANSWER: &str = "**Error occurred while generating the response**";

/// Token id of `<|endoftext|>`, suppressed through the logit bias.
const END_OF_TEXT_TOKEN: &str = "50256";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatAnswer {
    pub text: String,
    /// `None` when the backend sent no `citations` key at all.
    pub citations: Option<BTreeSet<Citation>>,
}

impl ChatAnswer {
    fn failed() -> Self {
        Self {
            text: ERROR_ANSWER.to_string(),
            citations: None,
        }
    }
}

fn llm_params() -> LlmParams {
    let mut logit_bias = BTreeMap::new();
    logit_bias.insert(END_OF_TEXT_TOKEN.to_string(), -100);
    LlmParams {
        temperature: 0.0,
        max_tokens: 200,
        logit_bias,
    }
}

/// Build the chat request for a selection.
pub fn build_request(
    collection: &Collection,
    document: Option<&Document>,
    prompt: &str,
) -> ChatRequest {
    let (mode, identifier) = match document {
        Some(doc) => (ChatMode::Document, doc.label.clone()),
        None => (ChatMode::Collection, collection.label.clone()),
    };

    ChatRequest {
        mode,
        id_type: "name".to_string(),
        identifier,
        query: prompt.to_string(),
        llm: llm_params(),
        include_citations: true,
        include_usage: false,
    }
}

/// Parse the body of a 200 chat response.
pub fn parse_response(body: &Value) -> Result<ChatAnswer, String> {
    let text = match body.get("result") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => NO_ANSWER.to_string(),
    };

    let citations = match body.get("citations") {
        None => None,
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .map(|item| {
                    serde_json::from_value::<Citation>(item.clone())
                        .map_err(|e| format!("invalid citation {}: {}", item, e))
                })
                .collect::<Result<BTreeSet<_>, _>>()?,
        ),
        Some(other) => return Err(format!("citations is not an array: {}", other)),
    };

    Ok(ChatAnswer { text, citations })
}

/// Single attempt against the backend, with the failure cause preserved.
pub async fn query_backend(
    backend: &dyn Backend,
    request: &ChatRequest,
) -> Result<ChatAnswer, BackendError> {
    let body = backend.chat(request).await?;
    parse_response(&body).map_err(|message| BackendError::Decode {
        endpoint: "/chat".to_string(),
        message,
    })
}

/// Get an answer for the selection, falling back to [`ERROR_ANSWER`].
pub async fn answer(
    backend: &dyn Backend,
    collection: &Collection,
    document: Option<&Document>,
    prompt: &str,
) -> ChatAnswer {
    let request = build_request(collection, document, prompt);
    match query_backend(backend, &request).await {
        Ok(answer) => answer,
        Err(error) => {
            tracing::warn!(
                mode = ?request.mode,
                identifier = %request.identifier,
                error = %error,
                "chat request failed"
            );
            ChatAnswer::failed()
        }
    }
}

/// Answer a prompt and record both sides of the exchange in `session`.
pub async fn ask(
    backend: &dyn Backend,
    session: &mut Session,
    collection: &Collection,
    document: Option<&Document>,
    prompt: &str,
) -> ChatAnswer {
    let reply = answer(backend, collection, document, prompt).await;
    session.record_exchange(prompt, &reply.text);
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_targets_collection_label() {
        let collection = Collection::new("Manuals", "uuid-1");
        let req = build_request(&collection, None, "how?");
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["mode"], "collection");
        assert_eq!(json["id_type"], "name");
        assert_eq!(json["identifier"], "Manuals");
        assert_eq!(json["query"], "how?");
        assert_eq!(json["llm"]["temperature"], 0.0);
        assert_eq!(json["llm"]["max_tokens"], 200);
        assert_eq!(json["llm"]["logit_bias"], json!({"50256": -100}));
        assert_eq!(json["include_citations"], true);
        assert_eq!(json["include_usage"], false);
    }

    #[test]
    fn test_request_targets_document_label() {
        let collection = Collection::new("Manuals", "uuid-1");
        let doc = Document::new("guide.pdf");
        let req = build_request(&collection, Some(&doc), "q");
        assert_eq!(req.mode, ChatMode::Document);
        assert_eq!(req.identifier, "guide.pdf");
    }

    #[test]
    fn test_parse_without_citations_key() {
        let answer = parse_response(&json!({"result": "42"})).unwrap();
        assert_eq!(answer.text, "42");
        assert_eq!(answer.citations, None);
    }

    #[test]
    fn test_parse_empty_citations_is_empty_set() {
        let answer = parse_response(&json!({"result": "42", "citations": []})).unwrap();
        assert_eq!(answer.citations, Some(BTreeSet::new()));
    }

    #[test]
    fn test_parse_missing_result_uses_fallback() {
        let answer = parse_response(&json!({})).unwrap();
        assert_eq!(answer.text, NO_ANSWER);
    }

    #[test]
    fn test_parse_non_string_result() {
        let answer = parse_response(&json!({"result": 7})).unwrap();
        assert_eq!(answer.text, "7");
    }

    #[test]
    fn test_parse_deduplicates_citations() {
        let body = json!({
            "result": "x",
            "citations": [
                {"document": "/u/a.pdf", "page": 2},
                {"document": "/u/a.pdf", "page": 2},
                {"document": "/u/b.pdf", "page": 0}
            ]
        });
        let citations = parse_response(&body).unwrap().citations.unwrap();
        assert_eq!(citations.len(), 2);
        assert!(citations.contains(&Citation::new("/u/a.pdf", 2)));
        assert!(citations.contains(&Citation::new("/u/b.pdf", 0)));
    }

    #[test]
    fn test_parse_rejects_malformed_citation() {
        let body = json!({"result": "x", "citations": [{"document": "/a.pdf"}]});
        assert!(parse_response(&body).is_err());

        let body = json!({"result": "x", "citations": "nope"});
        assert!(parse_response(&body).is_err());
    }
}
