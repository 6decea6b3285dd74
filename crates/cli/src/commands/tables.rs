use askforce_core::config::{AppConfig, LoadOptions};

use super::{load_config, CommandResult};

pub fn run(options: &LoadOptions) -> CommandResult {
    match load_config("tables", options) {
        Ok(config) => CommandResult::text(render(&config)),
        Err(result) => result,
    }
}

fn render(config: &AppConfig) -> String {
    let mut lines = vec![format!("registered tables ({}):", config.schemas.len())];

    for entry in config.schemas.entries() {
        let marker =
            if entry.table() == config.pipeline.default_table { " [default]" } else { "" };
        lines.push(format!("{}{marker} ({} fields)", entry.table(), entry.fields().len()));
        lines.extend(entry.fields().iter().map(|field| format!("  - {field}")));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use askforce_core::config::AppConfig;

    use super::render;

    #[test]
    fn builtin_tables_are_listed_with_default_marker() {
        let output = render(&AppConfig::default());

        assert!(output.starts_with("registered tables (2):"));
        assert!(output.contains("PNEX__DUPIXENT__c [default] (13 fields)"));
        assert!(output.contains("PNEX__PRALUENT__c (13 fields)"));
        assert!(output.contains("  - PNEX__Patient_Id_Bylvay__c"));
    }
}
