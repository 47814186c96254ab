//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand};

/// snowmock - an in-process Snowflake-dialect emulator over DuckDB
#[derive(Parser, Debug)]
#[command(name = "snowmock")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory for persistent database files (in-memory when omitted)
    #[arg(long, global = true)]
    pub db_path: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute SQL statements and print their results
    Run(RunArgs),

    /// Start the HTTP wire adapter
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// SQL script file; stdin when omitted and --execute is not given
    pub file: Option<String>,

    /// Execute this SQL text instead of reading a file
    #[arg(short, long)]
    pub execute: Option<String>,

    /// Database to connect to
    #[arg(short, long, default_value = "db1")]
    pub database: String,

    /// Schema to connect to
    #[arg(short, long, default_value = "main")]
    pub schema: String,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,
}
