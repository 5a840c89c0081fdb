//! Costs command implementation.

use crate::cli::args::{Cli, CostsArgs};
use crate::core::provider::ProviderSelection;
use crate::error::Result;
use crate::render;
use crate::storage::config::{CommandOverrides, ResolvedConfig};

/// Execute the costs command.
pub fn execute(cli: &Cli, args: &CostsArgs) -> Result<()> {
    let config = ResolvedConfig::resolve(cli, &CommandOverrides::default())?;
    let providers = match &args.provider {
        Some(arg) => ProviderSelection::from_arg(arg)?.providers(),
        None => ProviderSelection::All.providers(),
    };

    let rows = config.costs.rows(&providers);
    let output = render::render_costs(&rows, config.format, config.pretty, !config.use_color())?;
    print!("{output}");
    Ok(())
}
