use askforce_core::config::LoadOptions;
use askforce_core::{ApplicationError, ConditionValue, Extraction, FetchFlags, QueryBuilder};

use super::{load_config, CommandResult};
use crate::logging::init_logging;

const COMMAND: &str = "soql";

#[derive(Clone, Debug, Default)]
pub struct SoqlArgs {
    pub table: Option<String>,
    pub fields: Vec<String>,
    pub conditions: Vec<String>,
    pub one: bool,
    pub all: bool,
    pub encoded: bool,
}

/// Renders a query from explicit fields and conditions; nothing is sent anywhere.
pub fn run(args: SoqlArgs, options: &LoadOptions) -> CommandResult {
    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    init_logging(&config.logging);

    let conditions = match args
        .conditions
        .iter()
        .map(|raw| parse_condition(raw))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(conditions) => conditions,
        Err(message) => return CommandResult::failure(COMMAND, "invalid_condition", message, 64),
    };

    let table = args.table.unwrap_or_else(|| config.pipeline.default_table.clone());
    let extraction = Extraction::from_pairs(args.fields, conditions);
    let fetch = FetchFlags { one: args.one, all: args.all };

    match QueryBuilder::new(config.schemas.clone()).build(&table, &extraction, fetch) {
        Ok(request) if args.encoded => CommandResult::text(request.encoded_soql()),
        Ok(request) => CommandResult::text(request.soql()),
        Err(error) => CommandResult::from_error(COMMAND, &ApplicationError::from(error)),
    }
}

/// Parses `field=value`. Numbers and `true`/`false` stay bare; wrap a value in single
/// quotes to force text. A number stays bare only when it prints back unchanged, so
/// identifiers such as `005` keep their leading zeros.
pub fn parse_condition(raw: &str) -> Result<(String, ConditionValue), String> {
    let Some((field, value)) = raw.split_once('=') else {
        return Err(format!("condition `{raw}` must look like field=value"));
    };
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("condition `{raw}` has an empty field name"));
    }

    Ok((field.to_string(), parse_value(value.trim())))
}

fn parse_value(value: &str) -> ConditionValue {
    if let Some(text) = value.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')) {
        return ConditionValue::Text(text.to_string());
    }
    if let Ok(integer) = value.parse::<i64>() {
        if integer.to_string() == value {
            return ConditionValue::from(integer);
        }
    } else if let Some(number) = value.parse::<f64>().ok().and_then(ConditionValue::float) {
        if number.to_string() == value {
            return number;
        }
    }
    match value {
        "true" => ConditionValue::Boolean(true),
        "false" => ConditionValue::Boolean(false),
        _ => ConditionValue::Text(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use askforce_core::ConditionValue;

    use super::parse_condition;

    #[test]
    fn values_are_typed_like_model_output() {
        let cases = [
            ("PNEX__Patient_Id_Bylvay__c=P005", ConditionValue::from("P005")),
            ("qty=5", ConditionValue::from(5_i64)),
            ("active=true", ConditionValue::from(true)),
            ("id='123'", ConditionValue::from("123")),
        ];

        for (raw, expected) in cases {
            let (_, value) = parse_condition(raw).expect("condition");
            assert_eq!(value, expected, "{raw}");
        }

        let (_, float) = parse_condition("PNEX__Copay_Balance_Bylvay__c = 30.0").expect("float");
        assert_eq!(float.to_string(), "30.0");
    }

    #[test]
    fn numbers_that_do_not_print_back_stay_text() {
        for raw in ["id=005", "qty=+5", "amount=1e3", "amount=30.50"] {
            let (_, value) = parse_condition(raw).expect("condition");
            let text = raw.split_once('=').map(|(_, text)| text).unwrap_or_default();

            assert_eq!(value, ConditionValue::from(text), "{raw}");
        }

        let (_, negative) = parse_condition("delta=-5").expect("negative");
        assert_eq!(negative, ConditionValue::from(-5_i64));
    }

    #[test]
    fn value_may_contain_equals_sign() {
        let (field, value) = parse_condition("Name=a=b").expect("condition");

        assert_eq!(field, "Name");
        assert_eq!(value, ConditionValue::from("a=b"));
    }

    #[test]
    fn malformed_conditions_are_rejected() {
        assert!(parse_condition("P005").is_err());
        assert!(parse_condition("=P005").is_err());
    }
}
