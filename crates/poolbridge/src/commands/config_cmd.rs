//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;

use super::{config_file, load};

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", config_file(global).display());
        }
        ConfigCommand::Show => {
            let cfg = load(global)?;
            print!("{}", cfg.to_toml()?);
        }
    }
    Ok(())
}
