use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};
use tracing::{debug, error, info, warn};

use crate::config::{APP_NAME, InitializationOptions, crd_cache_dir, resolve_rules_dir};
use crate::crd::{CrdDownloader, preload_crds};
use crate::diagnostics::DiagnosticsEngine;
use crate::index::{Indexer, Store};
use crate::lsp::commands::{
    EMBEDDED_CONTENT_COMMAND, EmbeddedContentParams, SAVE_EMBEDDED_CONTENT_COMMAND,
    SaveEmbeddedContentParams, document_not_found, parse_arguments, replace_document,
};
use crate::resolver::{EMBEDDED_SCHEME, EmbeddedUri, Resolver};
use crate::rules::{Rules, VALIDATION_FILE, is_yaml_file, load_rules_dir};

/// Per-session state settled during `initialize`
#[derive(Default)]
struct Session {
    options: InitializationOptions,
    roots: Vec<PathBuf>,
    diagnostics: Option<Arc<DiagnosticsEngine>>,
}

pub struct Backend {
    client: Client,
    store: Arc<Store>,
    rules: Arc<Rules>,
    indexer: Arc<Indexer>,
    resolver: Resolver,
    /// `--rules-dir` from the command line
    rules_dir: Option<PathBuf>,
    documents: RwLock<HashMap<Url, String>>,
    session: RwLock<Session>,
}

impl Backend {
    pub fn new(client: Client, rules_dir: Option<PathBuf>) -> Self {
        let store = Arc::new(Store::new());
        let rules = Arc::new(Rules::default());
        let indexer = Arc::new(Indexer::new(Arc::clone(&store), Arc::clone(&rules)));
        let resolver = Resolver::new(Arc::clone(&store), Arc::clone(&rules));
        Self {
            client,
            store,
            rules,
            indexer,
            resolver,
            rules_dir,
            documents: RwLock::new(HashMap::new()),
            session: RwLock::new(Session::default()),
        }
    }

    pub fn server_capabilities() -> ServerCapabilities {
        ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::FULL),
                    save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                    ..Default::default()
                },
            )),
            definition_provider: Some(OneOf::Left(true)),
            references_provider: Some(OneOf::Left(true)),
            hover_provider: Some(HoverProviderCapability::Simple(true)),
            completion_provider: Some(CompletionOptions {
                trigger_characters: Some(vec![":".to_string(), " ".to_string()]),
                ..Default::default()
            }),
            execute_command_provider: Some(ExecuteCommandOptions {
                commands: vec![
                    EMBEDDED_CONTENT_COMMAND.to_string(),
                    SAVE_EMBEDDED_CONTENT_COMMAND.to_string(),
                ],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn workspace_roots(params: &InitializeParams) -> Vec<PathBuf> {
        let uris: Vec<&Url> = match &params.workspace_folders {
            Some(folders) if !folders.is_empty() => {
                folders.iter().map(|folder| &folder.uri).collect()
            }
            _ => params.root_uri.iter().collect(),
        };
        uris.into_iter()
            .filter_map(|uri| uri.to_file_path().ok())
            .collect()
    }

    /// Load rules and validation checks into the shared state
    fn load_rules(&self, options: &InitializationOptions) -> Option<Arc<DiagnosticsEngine>> {
        let rules_dir = resolve_rules_dir(self.rules_dir.as_deref(), options);
        let rules = load_rules_dir(&rules_dir);
        info!(
            "Loaded {} symbols and {} references from {:?}",
            rules.symbols.len(),
            rules.references.len(),
            rules_dir
        );
        self.rules.replace(rules);

        if !options.diagnostics.enabled {
            info!("Diagnostics disabled");
            return None;
        }
        Some(Arc::new(DiagnosticsEngine::load(
            &rules_dir.join(VALIDATION_FILE),
            Arc::clone(&self.store),
        )))
    }

    /// Preload CRDs, then scan every workspace root, in one background task
    async fn spawn_workspace_scan(&self) {
        let (crds, roots) = {
            let session = self.session.read().await;
            (session.options.crds.clone(), session.roots.clone())
        };
        let indexer = Arc::clone(&self.indexer);
        let client = self.client.clone();

        tokio::spawn(async move {
            if !crds.sources.is_empty() {
                match CrdDownloader::new(crds.download_options(crd_cache_dir())) {
                    Ok(downloader) => {
                        preload_crds(&downloader, &indexer, &crds.sources).await;
                    }
                    Err(e) => error!("Failed to create CRD downloader: {}", e),
                }
            }

            for root in roots {
                let scan_indexer = Arc::clone(&indexer);
                let scan_root = root.clone();
                let indexed =
                    tokio::task::spawn_blocking(move || scan_indexer.scan_workspace(&scan_root))
                        .await
                        .inspect_err(|e| error!("Workspace scan of {:?} failed: {}", root, e))
                        .unwrap_or_default();
                debug!("Scan of {:?} indexed resources: {}", root, indexed);
            }

            client
                .log_message(
                    MessageType::INFO,
                    format!(
                        "Workspace scan complete: {} resources indexed",
                        indexer.store().len()
                    ),
                )
                .await;
        });
    }

    /// Re-index `text` and republish its diagnostics without blocking the edit
    async fn spawn_index_and_publish(&self, uri: Url, text: String) {
        let indexer = Arc::clone(&self.indexer);
        let diagnostics = self.session.read().await.diagnostics.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            if let Ok(path) = uri.to_file_path() {
                indexer.index_content(&path, &text);
            }

            let Some(engine) = diagnostics else {
                return;
            };
            let diagnostics = engine.validate(&text);
            client
                .log_message(
                    MessageType::LOG,
                    format!("Publishing {} diagnostics for {}", diagnostics.len(), uri),
                )
                .await;
            client.publish_diagnostics(uri, diagnostics, None).await;
        });
    }

    /// Open-document text, falling back to the file on disk
    async fn document_text(&self, uri: &Url) -> Option<String> {
        if let Some(text) = self.documents.read().await.get(uri) {
            return Some(text.clone());
        }
        let path = uri.to_file_path().ok()?;
        tokio::fs::read_to_string(&path)
            .await
            .inspect_err(|e| warn!("Failed to read {:?}: {}", path, e))
            .ok()
    }

    async fn embedded_content(&self, arguments: Vec<Value>) -> Result<Option<Value>> {
        let params: EmbeddedContentParams = parse_arguments(arguments)?;
        let embedded =
            EmbeddedUri::parse(&params.uri).map_err(|e| Error::invalid_params(e.to_string()))?;
        let text = self
            .document_text(&embedded.source)
            .await
            .ok_or_else(|| document_not_found(&embedded.source))?;

        let content = self
            .resolver
            .resolve_embedded_content(&text, &embedded.key)?;
        Ok(Some(Value::String(content)))
    }

    async fn save_embedded_content(&self, arguments: Vec<Value>) -> Result<Option<Value>> {
        let params: SaveEmbeddedContentParams = parse_arguments(arguments)?;
        let embedded =
            EmbeddedUri::parse(&params.uri).map_err(|e| Error::invalid_params(e.to_string()))?;
        let text = self
            .document_text(&embedded.source)
            .await
            .ok_or_else(|| document_not_found(&embedded.source))?;

        info!("Saving embedded {} into {}", embedded.key, embedded.source);
        let updated =
            self.resolver
                .update_embedded_content(&text, &embedded.key, &params.content)?;
        let edit = replace_document(embedded.source, &text, updated);
        serde_json::to_value(edit)
            .map(Some)
            .map_err(|e| Error::invalid_params(e.to_string()))
    }
}

fn is_virtual(uri: &Url) -> bool {
    uri.scheme() == EMBEDDED_SCHEME
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        self.client
            .log_message(MessageType::INFO, "LSP server initializing")
            .await;

        let options = InitializationOptions::from_value(params.initialization_options.clone());
        let roots = Self::workspace_roots(&params);
        info!("Initializing with workspace roots {:?}", roots);
        let diagnostics = self.load_rules(&options);

        *self.session.write().await = Session {
            options,
            roots,
            diagnostics,
        };

        Ok(InitializeResult {
            capabilities: Self::server_capabilities(),
            server_info: Some(ServerInfo {
                name: APP_NAME.to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "LSP server initialized")
            .await;
        self.spawn_workspace_scan().await;
    }

    async fn shutdown(&self) -> Result<()> {
        self.client
            .log_message(MessageType::INFO, "LSP server shutting down")
            .await;
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        if is_virtual(&uri) {
            return;
        }
        debug!("Document opened: {}", uri);

        let text = params.text_document.text;
        self.documents
            .write()
            .await
            .insert(uri.clone(), text.clone());
        self.spawn_index_and_publish(uri, text).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // With FULL sync mode, the last content change contains the full document text
        let Some(text) = params.content_changes.into_iter().last().map(|c| c.text) else {
            return;
        };
        let uri = params.text_document.uri;
        if is_virtual(&uri) {
            return;
        }
        debug!("Document changed: {}", uri);

        self.documents
            .write()
            .await
            .insert(uri.clone(), text.clone());
        self.spawn_index_and_publish(uri, text).await;
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        info!("Document saved: {}", params.text_document.uri);
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.documents
            .write()
            .await
            .remove(&params.text_document.uri);
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        for event in params.changes {
            let Ok(path) = event.uri.to_file_path() else {
                continue;
            };
            if !is_yaml_file(&path) {
                continue;
            }
            if event.typ == FileChangeType::DELETED {
                // Records from deleted files stay in the store until restart.
                info!("File deleted: {:?}", path);
                continue;
            }

            let indexer = Arc::clone(&self.indexer);
            tokio::task::spawn_blocking(move || {
                if indexer.index_file(&path) {
                    debug!("Re-indexed {:?}", path);
                }
            });
        }
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let Some(text) = self.document_text(&uri).await else {
            return Ok(None);
        };

        let links = self.resolver.resolve_definition(&text, &uri, position);
        debug!("Definition at {}:{:?} -> {} links", uri, position, links.len());
        if links.is_empty() {
            return Ok(None);
        }
        Ok(Some(GotoDefinitionResponse::Link(links)))
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;
        let Some(text) = self.document_text(&uri).await else {
            return Ok(None);
        };

        let locations = self.resolver.resolve_references(&text, &uri, position);
        debug!("References at {}:{:?} -> {}", uri, position, locations.len());
        Ok(Some(locations))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let Some(text) = self.document_text(&uri).await else {
            return Ok(None);
        };

        Ok(self.resolver.resolve_hover(
            &text,
            &uri,
            params.text_document_position_params.position,
        ))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let Some(text) = self.document_text(&uri).await else {
            return Ok(None);
        };

        let items = self
            .resolver
            .completion(&text, params.text_document_position.position);
        if items.is_empty() {
            return Ok(None);
        }
        Ok(Some(CompletionResponse::Array(items)))
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        debug!("Executing command {}", params.command);
        match params.command.as_str() {
            EMBEDDED_CONTENT_COMMAND => self.embedded_content(params.arguments).await,
            SAVE_EMBEDDED_CONTENT_COMMAND => self.save_embedded_content(params.arguments).await,
            other => {
                warn!("Unknown command {}", other);
                Err(Error::invalid_params(format!("Unknown command: {}", other)))
            }
        }
    }
}
