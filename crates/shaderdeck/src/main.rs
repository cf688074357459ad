mod cli;
mod demos;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Command::Run(args) => run::run(cli.config.as_deref(), args),
        Command::Capture(args) => run::capture(cli.config.as_deref(), args),
        Command::Inspect(args) => run::inspect(args),
        Command::List => {
            run::list();
            Ok(())
        }
    }
}
