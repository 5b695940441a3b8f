//! # Bench Curator
//!
//! Interactive curation of a RAG benchmarking dataset stored as CSV.
//!
//! Each row of the dataset pairs a document chunk (dataset, document and
//! chunk identifiers, a chunk keyword, context text and retrieved chunks)
//! with a question and its answers. Curators browse and filter the rows,
//! select some, rewrite their questions by hand or with the help of an
//! external improvement service, apply the edits and save the file.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ HTTP API /   │──▶│   Session    │──▶│ DatasetStore │──▶ dataset.csv
//! │ CLI (curate) │   │ filter/select│   │  load/save   │
//! └──────────────┘   │ stage/commit │   └──────────────┘
//!                    └──────┬───────┘
//!                           ▼
//!                    ┌──────────────┐
//!                    │  Improver    │──▶ improvement webhook
//!                    └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! curate --dataset dataset.csv view --keyword ap
//! curate --dataset dataset.csv edit chunk-17 "What does the report conclude?"
//! curate --config ./config/curator.toml improve chunk-17 --apply
//! curate --config ./config/curator.toml serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Rows, tables and row ids |
//! | [`store`] | CSV load/save and field access |
//! | [`filter`] | Categorical + keyword filtering |
//! | [`selection`] | Visible position → row id resolution |
//! | [`editor`] | Staged edits and commits |
//! | [`improve`] | Improvement service client |
//! | [`session`] | Event handlers tying the above together |
//! | [`server`] | HTTP API for a front end |
//! | [`error`] | Error taxonomy |

pub mod config;
pub mod edit_cmd;
pub mod editor;
pub mod error;
pub mod filter;
pub mod improve;
pub mod models;
pub mod selection;
pub mod server;
pub mod session;
pub mod store;
pub mod view;
