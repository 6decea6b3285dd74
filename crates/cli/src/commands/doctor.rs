use askforce_agent::client_from_config;
use askforce_core::config::{AppConfig, LlmProvider, LoadOptions};
use serde::Serialize;

use super::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 3] =
    ["salesforce_credentials", "llm_readiness", "schema_registry"];

/// Exits 0 only when every check passes; 2 when the config itself is invalid, 1 otherwise.
pub fn run(json_output: bool, options: &LoadOptions) -> CommandResult {
    let report = build_report(options);
    let exit_code = exit_code(&report);

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn exit_code(report: &DoctorReport) -> u8 {
    let config_failed = report
        .checks
        .iter()
        .any(|check| check.name == "config_validation" && check.status == CheckStatus::Fail);
    match report.overall_status {
        CheckStatus::Pass => 0,
        _ if config_failed => 2,
        _ => 1,
    }
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_salesforce_credentials(&config));
            checks.push(check_llm_readiness(&config));
            checks.push(check_schema_registry(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_salesforce_credentials(config: &AppConfig) -> DoctorCheck {
    match config.salesforce.credentials() {
        Ok(credentials) => DoctorCheck {
            name: "salesforce_credentials",
            status: CheckStatus::Pass,
            details: format!(
                "password grant for `{}` against {}",
                credentials.username, config.salesforce.instance_url
            ),
        },
        Err(error) => DoctorCheck {
            name: "salesforce_credentials",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_llm_readiness(config: &AppConfig) -> DoctorCheck {
    let llm = &config.llm;
    match client_from_config(llm) {
        Ok(_) if llm.provider == LlmProvider::Bedrock => DoctorCheck {
            name: "llm_readiness",
            status: CheckStatus::Pass,
            details: format!(
                "Bedrock client ready for model `{}` in region `{}`; AWS credentials resolve on first call",
                llm.model_id(),
                llm.region
            ),
        },
        Ok(_) => DoctorCheck {
            name: "llm_readiness",
            status: CheckStatus::Pass,
            details: format!("{:?} client ready for model `{}`", llm.provider, llm.model_id()),
        },
        Err(error) => {
            DoctorCheck { name: "llm_readiness", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

fn check_schema_registry(config: &AppConfig) -> DoctorCheck {
    DoctorCheck {
        name: "schema_registry",
        status: CheckStatus::Pass,
        details: format!(
            "{} table(s) registered; default `{}`",
            config.schemas.len(),
            config.pipeline.default_table
        ),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
