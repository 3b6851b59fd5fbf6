#[cfg(not(feature = "cli"))]
compile_error!("The `idbx` binary requires the `cli` feature. Build with `--features cli`.");

use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::process;

use idb::cli;
use idb::cli::app::{Cli, ColorMode, Commands};
use idb::IdbError;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {} // colored auto-detects tty
    }

    let default_level = if cli.verbose { "idb=debug" } else { "idb=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let writer_result: Result<Box<dyn Write>, IdbError> = match &cli.output {
        Some(path) => File::create(path)
            .map(|f| Box::new(f) as Box<dyn Write>)
            .map_err(|e| IdbError::Io(format!("Cannot create {}: {}", path, e))),
        None => Ok(Box::new(std::io::stdout()) as Box<dyn Write>),
    };

    let mut writer = match writer_result {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let config = cli::codec_config(cli.int_order, cli.host_order);

    let result = match cli.command {
        Commands::Scan {
            file,
            records,
            threads,
            json,
        } => cli::scan::execute(
            &cli::scan::ScanOptions {
                file,
                records,
                threads,
                json,
                config,
            },
            &mut writer,
        ),

        Commands::Key { hex, json } => {
            cli::key::execute(&cli::key::KeyOptions { hex, json, config }, &mut writer)
        }

        Commands::Value {
            hex,
            record,
            dump,
            json,
        } => cli::value::execute(
            &cli::value::ValueOptions {
                hex,
                record,
                dump,
                json,
                config,
            },
            &mut writer,
        ),

        Commands::Compare { a, b, json } => cli::compare::execute(
            &cli::compare::CompareOptions { a, b, json, config },
            &mut writer,
        ),

        Commands::CheckOrder { file, limit, json } => cli::check_order::execute(
            &cli::check_order::CheckOrderOptions {
                file,
                limit,
                json,
                config,
            },
            &mut writer,
        ),

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::generate(shell, &mut cmd, "idbx", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
