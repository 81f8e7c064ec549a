//! Serve the site from memory with live rebuilds.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;

use crate::config::{self, BuildArgs, ConfigFile};

/// Run the serve command.
pub async fn run(
    source: Option<PathBuf>,
    address: Option<SocketAddr>,
    no_watch: bool,
    args: &BuildArgs,
    file: &ConfigFile,
) -> Result<()> {
    let params = config::build_parameters(args, &file.build)?;
    let source = config::source_dir(source, &file.build);
    let serve = config::serve_config(address, no_watch, source.as_deref(), &file.serve);

    if serve.watch.is_none() {
        tracing::info!("Not watching for changes");
    }

    quire_server::serve(super::builder(source, params), serve).await?;

    Ok(())
}
