//! Inline rendering of cited PDF pages.
//!
//! Each citation's file is read whole from local disk (the backend writes
//! uploads into a directory shared with docchat), base64-encoded and turned
//! into a `data:` URI anchored at the cited page. Pages are stored zero-based
//! and displayed one-based.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::Citation;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("cannot read cited file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A rendered source, ready to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceView {
    pub title: String,
    pub data_uri: String,
}

/// `"<basename>, page: <n>"` with a one-based page number.
pub fn source_title(citation: &Citation) -> String {
    format!(
        "{}, page: {}",
        file_basename(&citation.document),
        citation.display_page()
    )
}

fn file_basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
}

/// Relative citation paths are taken as relative to the upload directory.
pub fn resolve_path(document: &str, upload_dir: &Path) -> PathBuf {
    let path = Path::new(document);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        upload_dir.join(path)
    }
}

pub fn pdf_data_uri(bytes: &[u8], display_page: u32) -> String {
    format!(
        "data:application/pdf;base64,{}#page={}",
        STANDARD.encode(bytes),
        display_page
    )
}

pub fn render_source(citation: &Citation, upload_dir: &Path) -> Result<SourceView, ViewerError> {
    let path = resolve_path(&citation.document, upload_dir);
    let bytes = std::fs::read(&path).map_err(|e| ViewerError::Read {
        path: path.clone(),
        source: e,
    })?;

    Ok(SourceView {
        title: source_title(citation),
        data_uri: pdf_data_uri(&bytes, citation.display_page()),
    })
}

/// Render every citation in order. A failed read only affects its own entry.
pub fn render_sources<'a, I>(
    citations: I,
    upload_dir: &Path,
) -> Vec<(Citation, Result<SourceView, ViewerError>)>
where
    I: IntoIterator<Item = &'a Citation>,
{
    citations
        .into_iter()
        .map(|citation| {
            let view = render_source(citation, upload_dir);
            if let Err(e) = &view {
                tracing::warn!(error = %e, "source render failed");
            }
            (citation.clone(), view)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_title_uses_basename_and_one_based_page() {
        let c = Citation::new("/home/uploads/manuals/guide.pdf", 0);
        assert_eq!(source_title(&c), "guide.pdf, page: 1");
    }

    #[test]
    fn test_title_for_largest_backend_page() {
        let body = serde_json::json!({
            "result": "x",
            "citations": [{"document": "/u/a.pdf", "page": 4294967295u64}]
        });
        let answer = crate::chat::parse_response(&body).unwrap();
        let citation = answer.citations.unwrap().into_iter().next().unwrap();
        assert_eq!(source_title(&citation), "a.pdf, page: 4294967295");
        assert!(pdf_data_uri(b"x", citation.display_page()).ends_with("#page=4294967295"));
    }

    #[test]
    fn test_render_source_embeds_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();

        let c = Citation::new(file.to_str().unwrap(), 4);
        let view = render_source(&c, Path::new("/nonexistent")).unwrap();
        assert_eq!(view.title, "a.pdf, page: 5");
        assert_eq!(
            view.data_uri,
            "data:application/pdf;base64,JVBERi0xLjQ=#page=5"
        );
    }

    #[test]
    fn test_relative_path_resolves_against_upload_dir() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b.pdf"), b"x").unwrap();

        let view = render_source(&Citation::new("b.pdf", 0), tmp.path()).unwrap();
        assert!(view.data_uri.ends_with("#page=1"));
    }

    #[test]
    fn test_missing_file_is_recoverable() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("ok.pdf"), b"x").unwrap();
        let citations = vec![Citation::new("gone.pdf", 0), Citation::new("ok.pdf", 1)];

        let rendered = render_sources(&citations, tmp.path());
        assert_eq!(rendered.len(), 2);
        assert!(matches!(rendered[0].1, Err(ViewerError::Read { .. })));
        assert_eq!(rendered[1].1.as_ref().unwrap().title, "ok.pdf, page: 2");
    }
}
