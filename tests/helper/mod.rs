#![allow(dead_code)]

mod lsp;
mod workspace;

pub use lsp::*;
pub use workspace::*;
