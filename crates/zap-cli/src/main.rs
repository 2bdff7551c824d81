use clap::Parser;
use color_eyre::Result;
use zap_core::Config;
use zap_resolver::HttpSettings;

mod cli;
mod commands;
mod outcome;
mod output;
mod style;

use cli::ZapCli;
use output::{emit_output, OutputOptions};

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = ZapCli::parse();
    init_tracing(cli.trace, cli.verbose, cli.quiet);

    let mut config = Config::from_env();
    if cli.offline {
        let network = HttpSettings {
            online: false,
            ..*config.network()
        };
        config = config.with_network(network);
    }

    let name = commands::command_name(&cli.command);
    let outcome = commands::execute(&cli.command, &config)
        .map_err(|err| color_eyre::eyre::eyre!("{err:?}"))?;
    let opts = OutputOptions {
        quiet: cli.quiet,
        json: cli.json,
        no_color: cli.no_color,
    };
    let code = emit_output(&opts, name, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8, quiet: bool) {
    let level = if trace {
        "trace"
    } else if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = ["zap", "zap_cli", "zap_core", "zap_store", "zap_resolver", "zap_domain"]
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
