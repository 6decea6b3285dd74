use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use askforce_agent::{client_from_config, AgentRuntime, Answer};
use askforce_core::config::{AppConfig, LoadOptions};
use askforce_core::{ApplicationError, FetchFlags};
use askforce_crm::SalesforceClient;

use super::{load_config, CommandResult};
use crate::logging::init_logging;

const COMMAND: &str = "ask";
const QUESTION_PROMPT: &str = "Enter your query: ";

#[derive(Clone, Debug, Default)]
pub struct AskArgs {
    pub question: Option<String>,
    pub table: Option<String>,
    pub one: bool,
    pub all: bool,
    pub json: bool,
}

pub fn run(args: AskArgs, options: &LoadOptions) -> CommandResult {
    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    init_logging(&config.logging);

    let fetch = fetch_flags(&args, &config);
    if let Err(error) = fetch.resolve() {
        return CommandResult::from_error(COMMAND, &ApplicationError::from(error));
    }

    let question = match args.question.as_deref() {
        Some(question) => non_blank(question),
        None => read_question(io::stdin().lock(), io::stderr()),
    };
    let question = match question {
        Ok(question) => question,
        Err(error) => return CommandResult::failure(COMMAND, "input", format!("{error:#}"), 1),
    };
    let table = args.table.clone().unwrap_or_else(|| config.pipeline.default_table.clone());

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                1,
            );
        }
    };

    let agent = match build_agent(&config) {
        Ok(agent) => agent,
        Err(error) => return CommandResult::from_error(COMMAND, &error),
    };

    match runtime.block_on(agent.ask(&table, &question, fetch)) {
        Ok(answer) if args.json => CommandResult::text(
            serde_json::to_string_pretty(&answer.to_json()).unwrap_or_else(|_| answer.summary.clone()),
        ),
        Ok(answer) => CommandResult::text(render_answer(&answer)),
        Err(error) => CommandResult::from_error(COMMAND, &error),
    }
}

/// Without an explicit flag the configured default decides between all records and the envelope.
pub fn fetch_flags(args: &AskArgs, config: &AppConfig) -> FetchFlags {
    if args.one || args.all {
        return FetchFlags { one: args.one, all: args.all };
    }
    FetchFlags { one: false, all: config.pipeline.fetch_all }
}

fn build_agent(config: &AppConfig) -> Result<AgentRuntime, ApplicationError> {
    let llm = client_from_config(&config.llm)
        .map_err(|error| ApplicationError::Configuration(error.to_string()))?;
    let source = SalesforceClient::from_config(&config.salesforce)?;
    AgentRuntime::from_config(config, llm, Arc::new(source))
}

pub fn read_question(mut input: impl BufRead, mut prompt: impl Write) -> Result<String> {
    write!(prompt, "{QUESTION_PROMPT}").context("failed to write prompt")?;
    prompt.flush().context("failed to flush prompt")?;

    let mut line = String::new();
    input.read_line(&mut line).context("failed to read question from stdin")?;
    non_blank(&line)
}

fn non_blank(question: &str) -> Result<String> {
    let question = question.trim();
    if question.is_empty() {
        bail!("no question was provided");
    }
    Ok(question.to_string())
}

fn render_answer(answer: &Answer) -> String {
    format!("{}\ntime taken: {:.2}s", answer.summary.trim_end(), answer.elapsed.as_secs_f64())
}
