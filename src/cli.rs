//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Extract Diário Oficial da União acts from INLabs bundles.
///
/// Downloads the daily section bundles for every date in the range, parses
/// each act and writes the records as a JSON array.
#[derive(Parser, Debug)]
#[command(name = "dou-extractor")]
#[command(author, version, about)]
pub struct Args {
    /// First date of the range (config DATE_FORMAT, default YYYY-MM-DD)
    pub start: String,

    /// Last date of the range; the two bounds may be given in either order
    pub end: String,

    /// Comma-separated section codes overriding the configured ones (e.g. DO1,DO3E)
    #[arg(short, long)]
    pub sections: Option<String>,

    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Where to write the exported records
    #[arg(short, long, default_value = "atos_do_dou.json")]
    pub output: PathBuf,

    /// INLabs account e-mail
    #[arg(long, env = "INLABS_EMAIL")]
    pub email: String,

    /// INLabs account password
    #[arg(long, env = "INLABS_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Abort on the first document that cannot be extracted
    #[arg(long)]
    pub strict: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
