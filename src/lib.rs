//! # luat-rag
//!
//! Hybrid retrieval and cited question answering over Vietnamese legal
//! statutes (luật, nghị định, thông tư).
//!
//! Source documents are split along their legal structure (Điều → Khoản →
//! Điểm) into self-contained, citation-addressable units. Units are indexed
//! twice, as dense embeddings and in a BM25 keyword index. Questions are
//! paraphrased into statutory wording, answered from both indexes, merged,
//! reranked with a cross-encoder, and finally handed to a language model with
//! numbered citations.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────────────────┐
//! │ .docx    │──▶│  Parser  │──▶│ Indexer               │
//! │ corpus   │   │ Điều/K/Đ │   │ SQLite vectors + BM25 │
//! └──────────┘   └──────────┘   └──────────┬────────────┘
//!                                          │
//!              ┌───────────────────────────┘
//!              ▼
//!       ┌─────────────┐   ┌──────────┐   ┌──────────┐
//!       │  Retriever  │──▶│ Reranker │──▶│  Engine  │
//!       │ rewrite+mix │   │ cross-enc│   │ LLM + [n]│
//!       └─────────────┘   └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! luat build                          # parse data/raw, write both indexes
//! luat ask "Vượt đèn đỏ phạt bao nhiêu?"
//! luat search "mũ bảo hiểm" --no-rewrite
//! luat chat
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Legal units and scored units |
//! | [`extract`] | `.docx` / `.txt` paragraph extraction |
//! | [`classify`] | Document classification and line markers |
//! | [`parser`] | Structural parser |
//! | [`ingest`] | Corpus listing and per-file isolation |
//! | [`export`] | Debug JSON/CSV export |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`vector_store`] | Dense index (SQLite) |
//! | [`keyword`] | Sparse index (BM25) |
//! | [`indexer`] | Build pipeline |
//! | [`retriever`] | Hybrid retrieval and merge |
//! | [`rerank`] | Cross-encoder reranking |
//! | [`llm`] | Completion model adapters |
//! | [`prompts`] | Prompt text |
//! | [`engine`] | Question answering |
//! | [`chat`] | Interactive loop |
//! | [`progress`] | Build progress on stderr |

pub mod chat;
pub mod classify;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod export;
pub mod extract;
pub mod http;
pub mod indexer;
pub mod ingest;
pub mod keyword;
pub mod llm;
pub mod models;
pub mod parser;
pub mod progress;
pub mod prompts;
pub mod rerank;
pub mod retriever;
pub mod vector_store;
