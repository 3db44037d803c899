//! `reconf` command line

use anyhow::Result;
use clap::{value_parser, Arg, Command};
use reconf_cli::{apply, describe, Inputs};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn input_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("properties")
                .long("properties")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Property tree (YAML or JSON)"),
        )
        .arg(
            Arg::new("schema")
                .long("schema")
                .value_parser(value_parser!(PathBuf))
                .help("Schema document; derived from the properties when omitted"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("Server config (TOML or YAML)"),
        )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Command::new("reconf")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Describe and apply configurations over a property tree")
        .subcommand_required(true)
        .subcommand(input_args(
            Command::new("describe").about("Print the schema and current values"),
        ))
        .subcommand(input_args(
            Command::new("apply")
                .about("Apply a request and print the outcome")
                .arg(
                    Arg::new("request")
                        .long("request")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Request message (JSON)"),
                ),
        ));

    let matches = cli.get_matches();
    let (name, args) = matches
        .subcommand()
        .ok_or_else(|| anyhow::anyhow!("missing subcommand"))?;

    let properties = args
        .get_one::<PathBuf>("properties")
        .ok_or_else(|| anyhow::anyhow!("--properties is required"))?;
    let inputs = Inputs {
        properties,
        schema: args.get_one::<PathBuf>("schema").map(PathBuf::as_path),
        config: args.get_one::<PathBuf>("config").map(PathBuf::as_path),
    };

    let output = match name {
        "describe" => describe(inputs)?,
        "apply" => {
            let request = args
                .get_one::<PathBuf>("request")
                .ok_or_else(|| anyhow::anyhow!("--request is required"))?;
            apply(inputs, request)?
        }
        other => anyhow::bail!("unknown subcommand: {other}"),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
