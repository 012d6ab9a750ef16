//! Shell completion generation.

use clap::CommandFactory;
use clap_complete::generate;

use crate::cli::{Cli, CompletionsArgs};

pub fn handle(args: &CompletionsArgs) {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "hablink", &mut std::io::stdout());
}
