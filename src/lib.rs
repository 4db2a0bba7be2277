//! # docchat
//!
//! A browser chat front-end for a retrieval-augmented-generation backend.
//!
//! docchat lists document collections, uploads PDFs, forwards chat prompts
//! to a remote RAG API and renders the answers with the cited PDF pages
//! inline. Retrieval, chunking, embedding and generation all happen in the
//! backend; this crate renders pages and proxies requests.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Browser  │──▶│   server    │──▶│   backend    │──▶ RAG API
//! │  (HTML)  │◀──│ ui/session  │   │ (reqwest)    │
//! └──────────┘   └──────┬──────┘   └──────────────┘
//!                       │
//!        ┌──────────────┼──────────────┬────────────┐
//!        ▼              ▼              ▼            ▼
//!  collections        upload         chat        viewer
//!  (sidebar tree)  (+ refresh)  (transcript)  (cited pages)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! BACKEND_BASE_PATH=http://localhost:8000 DOC_UPLOAD_DIR=/srv/uploads docchat serve
//! docchat collections --with-documents
//! docchat ask --collection Manuals "How do I reset the device?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Settings from TOML, `.env` and the environment |
//! | [`models`] | Data model and backend wire types |
//! | [`backend`] | `Backend` trait and the reqwest client |
//! | [`collections`] | Paged collection listing and document population |
//! | [`upload`] | Document upload and sidebar refresh |
//! | [`chat`] | Chat request building and answer parsing |
//! | [`viewer`] | Cited PDF pages as base64 embeds |
//! | [`session`] | Per-user transcript and upload state |
//! | [`ui`] | HTML rendering |
//! | [`server`] | HTTP server |

pub mod backend;
pub mod chat;
pub mod collections;
pub mod config;
pub mod models;
pub mod server;
pub mod session;
pub mod ui;
pub mod upload;
pub mod viewer;
