//! LSP request/notification test utilities

use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tower_lsp::ClientSocket;
use tower_lsp::jsonrpc::Request;
use tower_lsp::lsp_types::*;

/// Create an LSP initialize request rooted at `root_uri`
pub fn create_initialize_request(id: i64, root_uri: &Url, options: Value) -> Request {
    Request::build("initialize")
        .id(id)
        .params(
            serde_json::to_value(InitializeParams {
                root_uri: Some(root_uri.clone()),
                initialization_options: Some(options),
                ..Default::default()
            })
            .unwrap(),
        )
        .finish()
}

/// Create an LSP initialized notification
pub fn create_initialized_notification() -> Request {
    Request::build("initialized")
        .params(serde_json::to_value(InitializedParams {}).unwrap())
        .finish()
}

/// Create an LSP didOpen notification
pub fn create_did_open_notification(uri: &Url, content: &str) -> Request {
    Request::build("textDocument/didOpen")
        .params(
            serde_json::to_value(DidOpenTextDocumentParams {
                text_document: TextDocumentItem {
                    uri: uri.clone(),
                    language_id: "yaml".to_string(),
                    version: 1,
                    text: content.to_string(),
                },
            })
            .unwrap(),
        )
        .finish()
}

/// Create an LSP didChange notification
#[allow(dead_code)]
pub fn create_did_change_notification(uri: &Url, content: &str, version: i32) -> Request {
    Request::build("textDocument/didChange")
        .params(
            serde_json::to_value(DidChangeTextDocumentParams {
                text_document: VersionedTextDocumentIdentifier {
                    uri: uri.clone(),
                    version,
                },
                content_changes: vec![TextDocumentContentChangeEvent {
                    range: None,
                    range_length: None,
                    text: content.to_string(),
                }],
            })
            .unwrap(),
        )
        .finish()
}

fn text_document_position(uri: &Url, line: u32, character: u32) -> TextDocumentPositionParams {
    TextDocumentPositionParams {
        text_document: TextDocumentIdentifier { uri: uri.clone() },
        position: Position { line, character },
    }
}

/// Create an LSP definition request
#[allow(dead_code)]
pub fn create_definition_request(id: i64, uri: &Url, line: u32, character: u32) -> Request {
    Request::build("textDocument/definition")
        .id(id)
        .params(
            serde_json::to_value(GotoDefinitionParams {
                text_document_position_params: text_document_position(uri, line, character),
                work_done_progress_params: Default::default(),
                partial_result_params: Default::default(),
            })
            .unwrap(),
        )
        .finish()
}

/// Create an LSP references request
#[allow(dead_code)]
pub fn create_references_request(id: i64, uri: &Url, line: u32, character: u32) -> Request {
    Request::build("textDocument/references")
        .id(id)
        .params(
            serde_json::to_value(ReferenceParams {
                text_document_position: text_document_position(uri, line, character),
                work_done_progress_params: Default::default(),
                partial_result_params: Default::default(),
                context: ReferenceContext {
                    include_declaration: true,
                },
            })
            .unwrap(),
        )
        .finish()
}

/// Create an LSP hover request
#[allow(dead_code)]
pub fn create_hover_request(id: i64, uri: &Url, line: u32, character: u32) -> Request {
    Request::build("textDocument/hover")
        .id(id)
        .params(
            serde_json::to_value(HoverParams {
                text_document_position_params: text_document_position(uri, line, character),
                work_done_progress_params: Default::default(),
            })
            .unwrap(),
        )
        .finish()
}

/// Create an LSP completion request
#[allow(dead_code)]
pub fn create_completion_request(id: i64, uri: &Url, line: u32, character: u32) -> Request {
    Request::build("textDocument/completion")
        .id(id)
        .params(
            serde_json::to_value(CompletionParams {
                text_document_position: text_document_position(uri, line, character),
                work_done_progress_params: Default::default(),
                partial_result_params: Default::default(),
                context: None,
            })
            .unwrap(),
        )
        .finish()
}

/// Create a workspace/executeCommand request
#[allow(dead_code)]
pub fn create_execute_command_request(id: i64, command: &str, arguments: Vec<Value>) -> Request {
    Request::build("workspace/executeCommand")
        .id(id)
        .params(
            serde_json::to_value(ExecuteCommandParams {
                command: command.to_string(),
                arguments,
                work_done_progress_params: Default::default(),
            })
            .unwrap(),
        )
        .finish()
}

/// Collect notifications in background and return a receiver
pub fn spawn_notification_collector(mut socket: ClientSocket) -> mpsc::Receiver<Request> {
    let (tx, rx) = mpsc::channel(100);

    tokio::spawn(async move {
        while let Some(notification) = socket.next().await {
            if tx.send(notification).await.is_err() {
                break;
            }
        }
    });

    rx
}

/// Wait for a notification with the specified method name from the receiver
pub async fn wait_for_notification(
    rx: &mut mpsc::Receiver<Request>,
    method: &str,
) -> Option<Request> {
    let timeout_duration = Duration::from_secs(5);

    loop {
        match timeout(timeout_duration, rx.recv()).await {
            Ok(Some(notification)) => {
                if notification.method() == method {
                    return Some(notification);
                }
                // Skip other notifications (like log_message)
            }
            _ => return None,
        }
    }
}

/// Wait for a `window/logMessage` whose text contains `needle`
pub async fn wait_for_log_message(rx: &mut mpsc::Receiver<Request>, needle: &str) -> Option<String> {
    loop {
        let notification = wait_for_notification(rx, "window/logMessage").await?;
        let params: LogMessageParams =
            serde_json::from_value(notification.params()?.clone()).ok()?;
        if params.message.contains(needle) {
            return Some(params.message);
        }
    }
}
