use std::collections::{BTreeMap, BTreeSet};

use crate::errors::SchemaError;

pub const DUPIXENT_TABLE: &str = "PNEX__DUPIXENT__c";
pub const PRALUENT_TABLE: &str = "PNEX__PRALUENT__c";

const DUPIXENT_FIELDS: [&str; 13] = [
    "Id",
    "Name",
    "PNEX__Patient_Id_Bylvay__c",
    "PNEX__Benefit_Verification_Status_Bylvay__c",
    "PNEX__Benefit_Verification_Start_Date_Bylvay__c",
    "PNEX__Benefit_Verification_End_Date_Bylvay__c",
    "PNEX__PA_Status_Bylvay__c",
    "PNEX__Drug_Quantity_Bylvay__c",
    "PNEX__PA_Request_Date_Bylvay__c",
    "PNEX__PA_Response_Date_Bylvay__c",
    "PNEX__Copay_Balance_Bylvay__c",
    "PNEX__HCP_Name_Bylvay__c",
    "PNEX__HCP_ID_Bylvay__c",
];

const PRALUENT_FIELDS: [&str; 13] = [
    "Id",
    "Name",
    "PNEX__Patient_Id_Iqirvo__c",
    "PNEX__Benefit_Verification_End_Date_Iqirvo__c",
    "PNEX__Benefit_Verification_Start_Date_Iqirvo__c",
    "PNEX__Benefit_Verification_Status_Iqirvo__c",
    "PNEX__PA_Status_Iqirvo__c",
    "PNEX__PA_Request_Date_Iqirvo__c",
    "PNEX__PA_Response_Date_Iqirvo__c",
    "PNEX__Drug_Quantity_Iqirvo__c",
    "PNEX__Copay_Balance_Iqirvo__c",
    "PNEX__HCP_Name_Iqirvo__c",
    "PNEX__HCP_ID_Iqirvo__c",
];

/// The retrievable field list for one table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaEntry {
    table: String,
    fields: Vec<String>,
}

impl SchemaEntry {
    pub fn new<T, F>(table: impl Into<String>, fields: F) -> Result<Self, SchemaError>
    where
        F: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let table = table.into().trim().to_string();
        if table.is_empty() {
            return Err(SchemaError::EmptyTableName);
        }

        let fields = fields.into_iter().map(Into::into).collect::<Vec<String>>();
        if fields.is_empty() {
            return Err(SchemaError::EmptyFieldList { table });
        }

        let mut seen = BTreeSet::new();
        for field in &fields {
            if !seen.insert(field.as_str()) {
                return Err(SchemaError::DuplicateField { table, field: field.clone() });
            }
        }

        Ok(Self { table, fields })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

/// Immutable table → field list mapping shared by the extraction adapter and the
/// query builder.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchemaRegistry {
    entries: BTreeMap<String, SchemaEntry>,
}

impl SchemaRegistry {
    /// Later entries replace earlier entries with the same table name.
    pub fn with_entries(entries: impl IntoIterator<Item = SchemaEntry>) -> Self {
        let entries =
            entries.into_iter().map(|entry| (entry.table.clone(), entry)).collect::<BTreeMap<_, _>>();
        Self { entries }
    }

    /// Patient-services tables of the default org.
    pub fn builtin() -> Self {
        let entries = [(DUPIXENT_TABLE, &DUPIXENT_FIELDS), (PRALUENT_TABLE, &PRALUENT_FIELDS)]
            .into_iter()
            .map(|(table, fields)| SchemaEntry {
                table: table.to_string(),
                fields: fields.iter().map(|field| field.to_string()).collect(),
            });
        Self::with_entries(entries)
    }

    /// Returns a registry with `entries` layered over this one.
    pub fn extended(&self, entries: impl IntoIterator<Item = SchemaEntry>) -> Self {
        Self::with_entries(self.entries.values().cloned().chain(entries))
    }

    pub fn fields_for(&self, table: &str) -> Result<&[String], SchemaError> {
        self.entries
            .get(table)
            .map(SchemaEntry::fields)
            .ok_or_else(|| SchemaError::UnknownTable(table.to_string()))
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.entries.contains_key(table)
    }

    pub fn contains_field(&self, table: &str, field: &str) -> bool {
        self.entries.get(table).is_some_and(|entry| entry.fields.iter().any(|known| known == field))
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &SchemaEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{SchemaEntry, SchemaRegistry, DUPIXENT_TABLE, PRALUENT_TABLE};
    use crate::errors::SchemaError;

    #[test]
    fn builtin_tables_have_non_empty_unique_fields() {
        let registry = SchemaRegistry::builtin();
        assert_eq!(registry.tables().collect::<Vec<_>>(), vec![DUPIXENT_TABLE, PRALUENT_TABLE]);

        for table in registry.tables() {
            let fields = registry.fields_for(table).expect("registered table");
            let unique = fields.iter().collect::<BTreeSet<_>>();
            assert!(!fields.is_empty(), "{table} should expose fields");
            assert_eq!(unique.len(), fields.len(), "{table} should not repeat fields");
        }
    }

    #[test]
    fn field_order_is_preserved() {
        let registry = SchemaRegistry::builtin();
        let fields = registry.fields_for(DUPIXENT_TABLE).expect("registered table");

        assert_eq!(fields[0], "Id");
        assert_eq!(fields[2], "PNEX__Patient_Id_Bylvay__c");
        assert_eq!(fields[10], "PNEX__Copay_Balance_Bylvay__c");
    }

    #[test]
    fn unregistered_table_fails() {
        let registry = SchemaRegistry::builtin();
        assert_eq!(
            registry.fields_for("Account"),
            Err(SchemaError::UnknownTable("Account".to_string()))
        );
    }

    #[test]
    fn entries_reject_duplicates_and_empty_lists() {
        assert_eq!(
            SchemaEntry::new("Case", ["Id", "Subject", "Id"]),
            Err(SchemaError::DuplicateField { table: "Case".to_string(), field: "Id".to_string() })
        );
        assert_eq!(
            SchemaEntry::new("Case", Vec::<String>::new()),
            Err(SchemaError::EmptyFieldList { table: "Case".to_string() })
        );
        assert_eq!(SchemaEntry::new("  ", ["Id"]), Err(SchemaError::EmptyTableName));
    }

    #[test]
    fn extending_adds_tables_without_touching_existing_ones() {
        let case = SchemaEntry::new("Case", ["Id", "Subject", "Status"]).expect("valid entry");
        let registry = SchemaRegistry::builtin().extended([case]);

        assert_eq!(registry.len(), 3);
        assert!(registry.contains_field("Case", "Subject"));
        assert!(registry.contains_field(DUPIXENT_TABLE, "PNEX__HCP_ID_Bylvay__c"));
        assert!(!registry.contains_field("Case", "PNEX__HCP_ID_Bylvay__c"));
    }

    #[test]
    fn extending_replaces_a_table_with_the_same_name() {
        let narrowed = SchemaEntry::new(PRALUENT_TABLE, ["Id", "Name"]).expect("valid entry");
        let registry = SchemaRegistry::builtin().extended([narrowed]);

        assert_eq!(registry.fields_for(PRALUENT_TABLE).expect("registered"), ["Id", "Name"]);
    }
}
