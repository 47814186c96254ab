//! Command implementations.

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;

use sm_engine::{Instance, InstanceOptions};

use crate::cli::{GlobalArgs, RunArgs, ServeArgs};

fn options(global: &GlobalArgs) -> InstanceOptions {
    InstanceOptions {
        db_path: global.db_path.as_ref().map(PathBuf::from),
        ..InstanceOptions::new()
    }
}

/// Execute a script (file, stdin, or `-e` text) and print each result.
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<()> {
    let sql = match (&args.execute, &args.file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("cannot read script {path}"))?,
        (None, None) => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("cannot read stdin")?;
            buffer
        }
    };

    let instance = Instance::new(options(global)).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let conn = instance
        .connect(Some(&args.database), Some(&args.schema))
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let cursors = conn
        .execute_string(&sql)
        .map_err(|e| anyhow::anyhow!(e.formatted()))?;

    for cursor in &cursors {
        if let Some(batches) = cursor.get_result_batches() {
            let table = pretty_format_batches(&batches)
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
            println!("{table}");
        }
    }
    Ok(())
}

/// Start the HTTP wire adapter.
pub async fn serve(args: &ServeArgs, global: &GlobalArgs) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .context("invalid bind address")?;
    sm_server::serve(addr, options(global))
        .await
        .context("server failed")
}
