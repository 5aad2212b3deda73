//! redtrace CLI entry point.

use redtrace_lib::cli::{self, Cli};
use redtrace_lib::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli::execute(cli).await
}
