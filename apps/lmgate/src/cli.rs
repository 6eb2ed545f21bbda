use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "lmgate")]
pub(crate) struct Cli {
    #[arg(long, short = 'c', default_value = "config.yaml")]
    pub(crate) config: PathBuf,
}
