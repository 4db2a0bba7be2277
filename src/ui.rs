//! Server-side HTML rendering.
//!
//! The whole page is rendered from a [`PageView`] on every request: sidebar
//! tree and upload form on the left, collection/document selectors on top,
//! transcript and prompt box in the main column and the cited sources beside
//! it.

use pulldown_cmark::{html, Event, Parser};

use crate::collections::capitalize;
use crate::models::{Citation, Collection, Document, Message};
use crate::viewer::{source_title, SourceView, ViewerError};

const STYLE_CSS: &str = include_str!("ui_assets/style.css");

pub const PAGE_TITLE: &str = "Sample RAG application";

/// Everything one page render needs.
pub struct PageView<'a> {
    /// `None` when the populated listing failed.
    pub collections: Option<&'a [Collection]>,
    pub selected_collection: Option<&'a Collection>,
    pub selected_document: Option<&'a Document>,
    pub transcript: &'a [Message],
    /// Sources of the answer produced by this request, if any.
    pub sources: Option<&'a [(Citation, Result<SourceView, ViewerError>)]>,
    pub upload_submitted: bool,
    pub notice: Option<&'a str>,
}

/// Pick the chat target from the query parameters.
///
/// An unknown or missing collection falls back to the first one, so a
/// non-empty list always yields a selection. The document must belong to
/// the selected collection.
pub fn resolve_selection<'a>(
    collections: &'a [Collection],
    collection: Option<&str>,
    document: Option<&str>,
) -> (Option<&'a Collection>, Option<&'a Document>) {
    let selected = collection
        .and_then(|value| collections.iter().find(|c| c.value == value))
        .or_else(|| collections.first());

    let doc = match (selected, document) {
        (Some(c), Some(label)) if !label.is_empty() => c.find_document(label),
        _ => None,
    };
    (selected, doc)
}

pub fn render_page(view: &PageView<'_>) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<style>{css}</style>
</head>
<body>
<header><h1>{title}</h1></header>
<div class="layout">
<aside>
{tree}
{upload}
</aside>
<main>
{notice}
{selectors}
<div class="chat-area">
<section class="chat">
{transcript}
{prompt}
</section>
<section class="sources">
{sources}
</section>
</div>
</main>
</div>
</body>
</html>
"#,
        title = escape_html(PAGE_TITLE),
        css = STYLE_CSS,
        tree = render_tree(view.collections),
        upload = render_upload_form(view.upload_submitted),
        notice = view
            .notice
            .map(|n| format!(r#"<div class="notice">{}</div>"#, escape_html(n)))
            .unwrap_or_default(),
        selectors = render_selectors(
            view.collections.unwrap_or(&[]),
            view.selected_collection,
            view.selected_document
        ),
        transcript = render_transcript(view.transcript),
        prompt = render_prompt(view.selected_collection, view.selected_document),
        sources = view.sources.map(render_sources).unwrap_or_default(),
    )
}

fn render_tree(collections: Option<&[Collection]>) -> String {
    let mut out = String::from("<h2>Documents</h2>\n");
    let collections = match collections {
        Some(c) if !c.is_empty() => c,
        _ => {
            out.push_str(r#"<p class="muted">No collections</p>"#);
            return out;
        }
    };

    out.push_str(r#"<ul class="tree">"#);
    for collection in collections {
        let docs = collection.documents();
        if docs.is_empty() {
            out.push_str(&format!(
                "<li>{}</li>",
                escape_html(&collection.label)
            ));
            continue;
        }
        out.push_str(&format!(
            "<li><details><summary>{}</summary><ul>",
            escape_html(&collection.label)
        ));
        for doc in docs {
            out.push_str(&format!(
                r#"<li class="leaf">{}</li>"#,
                escape_html(&doc.label)
            ));
        }
        out.push_str("</ul></details></li>");
    }
    out.push_str("</ul>");
    out
}

fn render_upload_form(submitted: bool) -> String {
    let reset = if submitted {
        r#"<form class="reset" method="post" action="/upload/reset"><button type="submit">Reset form</button></form>"#
    } else {
        ""
    };
    format!(
        r#"<h2>Add Document</h2>
<form class="upload" method="post" action="/upload" enctype="multipart/form-data">
<label>Collection<input type="text" name="collection"></label>
<label>Choose a PDF file<input type="file" name="file" accept="application/pdf,.pdf"></label>
<button type="submit" name="submit" value="1">Add Document</button>
</form>
{}"#,
        reset
    )
}

fn render_selectors(
    collections: &[Collection],
    selected: Option<&Collection>,
    selected_doc: Option<&Document>,
) -> String {
    let mut collection_opts = String::new();
    for c in collections {
        let is_selected = selected.map(|s| s.value == c.value).unwrap_or(false);
        collection_opts.push_str(&option(&c.value, &capitalize(&c.label), is_selected));
    }

    let mut document_opts = option("", "Filter by document", selected_doc.is_none());
    if let Some(c) = selected {
        for d in c.documents() {
            let is_selected = selected_doc.map(|s| s.label == d.label).unwrap_or(false);
            document_opts.push_str(&option(&d.label, &capitalize(&d.label), is_selected));
        }
    }

    format!(
        r#"<form class="selectors" method="get" action="/">
<label>Select the Collection:<select name="collection" onchange="this.form.submit()">{}</select></label>
<label>Filter by document:<select name="document" onchange="this.form.submit()">{}</select></label>
<noscript><button type="submit">Apply</button></noscript>
</form>"#,
        collection_opts, document_opts
    )
}

fn option(value: &str, label: &str, selected: bool) -> String {
    format!(
        r#"<option value="{}"{}>{}</option>"#,
        escape_html(value),
        if selected { r#" selected="selected""# } else { "" },
        escape_html(label)
    )
}

fn render_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| {
            format!(
                r#"<div class="message {role}"><div class="role">{role}</div>{body}</div>"#,
                role = m.role.as_str(),
                body = render_markdown(&m.content)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_prompt(collection: Option<&Collection>, document: Option<&Document>) -> String {
    let collection = collection.map(|c| c.value.as_str()).unwrap_or("");
    let document = document.map(|d| d.label.as_str()).unwrap_or("");
    format!(
        r#"<form class="prompt" method="post" action="/chat">
<input type="hidden" name="collection" value="{}">
<input type="hidden" name="document" value="{}">
<input type="text" name="prompt" placeholder="Ask a question" autocomplete="off" required>
<button type="submit">Send</button>
</form>"#,
        escape_html(collection),
        escape_html(document)
    )
}

fn render_sources(sources: &[(Citation, Result<SourceView, ViewerError>)]) -> String {
    let mut out = String::from("<h3>Sources:</h3>\n");
    for (citation, view) in sources {
        match view {
            Ok(view) => out.push_str(&format!(
                r#"<details class="source"><summary>{}</summary><embed src="{}" width="800" height="800" type="application/pdf"></details>"#,
                escape_html(&view.title),
                escape_html(&view.data_uri)
            )),
            Err(e) => out.push_str(&format!(
                r#"<details class="source"><summary>{}</summary><p class="source-error">{}</p></details>"#,
                escape_html(&source_title(citation)),
                escape_html(&e.to_string())
            )),
        }
    }
    out
}

/// Render chat text as markdown. Raw HTML in the input is shown as text.
pub fn render_markdown(input: &str) -> String {
    let parser = Parser::new(input).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
