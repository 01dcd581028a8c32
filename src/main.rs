use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "k8s-lsp")]
#[command(version, about = "Language Server for navigating Kubernetes manifests")]
struct Cli {
    /// Directory holding symbol, reference and validation rules
    #[arg(long, value_name = "DIR")]
    rules_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(k8s_lsp::lsp::server::run_server(cli.rules_dir))
}
