//! LSP (Language Server Protocol) implementation layer
//!
//! Thin adapter between the editor and the resolver / indexer.
//!
//! # Modules
//!
//! - [`backend`]: Main LSP backend implementing `LanguageServer` trait
//! - [`commands`]: `workspace/executeCommand` payloads for embedded files
//! - [`server`]: LSP server initialization and lifecycle

pub mod backend;
pub mod commands;
pub mod server;
