pub mod config;
pub mod crd;
pub mod diagnostics;
pub mod index;
pub mod lsp;
pub mod parser;
pub mod resolver;
pub mod rules;
