pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use askforce_core::config::LoadOptions;
use clap::{Parser, Subcommand};

use commands::ask::AskArgs;
use commands::soql::SoqlArgs;

#[derive(Debug, Parser)]
#[command(
    name = "askforce",
    about = "Answer natural-language questions from Salesforce data",
    long_about = "Extract query parameters from a question, run the rendered SOQL against Salesforce, and summarize the records.",
    after_help = "Examples:\n  askforce ask \"What is the copay balance for patient P005?\" --one\n  askforce soql --field PNEX__Copay_Balance_Bylvay__c --where PNEX__Patient_Id_Bylvay__c=P005\n  askforce doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a config file (defaults to askforce.toml)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Answer a question; reads it from stdin when omitted")]
    Ask {
        question: Option<String>,
        #[arg(long, help = "Target table (defaults to pipeline.default_table)")]
        table: Option<String>,
        #[arg(long, help = "Return only the first matching record")]
        one: bool,
        #[arg(long, help = "Return every matching record")]
        all: bool,
        #[arg(long, help = "Emit the full answer as JSON")]
        json: bool,
    },
    #[command(about = "List registered tables and their fields")]
    Tables,
    #[command(about = "Render a SOQL query from explicit fields and conditions without network access")]
    Soql {
        #[arg(long, help = "Target table (defaults to pipeline.default_table)")]
        table: Option<String>,
        #[arg(long = "field", required = true, help = "Field to select; repeatable")]
        fields: Vec<String>,
        #[arg(long = "where", value_name = "FIELD=VALUE", help = "Equality condition; repeatable")]
        conditions: Vec<String>,
        #[arg(long)]
        one: bool,
        #[arg(long)]
        all: bool,
        #[arg(long, help = "Print the percent-encoded form used in the query URL")]
        encoded: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Salesforce credential readiness, and LLM readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config, ..LoadOptions::default() };

    let result = match cli.command {
        Command::Ask { question, table, one, all, json } => {
            commands::ask::run(AskArgs { question, table, one, all, json }, &options)
        }
        Command::Tables => commands::tables::run(&options),
        Command::Soql { table, fields, conditions, one, all, encoded } => {
            commands::soql::run(SoqlArgs { table, fields, conditions, one, all, encoded }, &options)
        }
        Command::Config => commands::config::run(&options),
        Command::Doctor { json } => commands::doctor::run(json, &options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
