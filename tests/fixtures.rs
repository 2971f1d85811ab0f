#![allow(dead_code)]

use std::sync::Once;

use erspec::{
    CatalogObject, DataDictionaryTitle, MetadataSource, ObjectType, Result, SpecDocument,
    TableIndex,
};
use hashbrown::HashMap;

static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}

/// In-memory metadata store backing the end-to-end tests.
#[derive(Default)]
pub struct InMemoryMetadata {
    pub event_documents: HashMap<String, SpecDocument>,
    pub template_documents: HashMap<String, SpecDocument>,
    pub business_functions: Vec<CatalogObject>,
    pub table_indexes: HashMap<String, Vec<TableIndex>>,
    pub titles: HashMap<String, DataDictionaryTitle>,
}

impl InMemoryMetadata {
    pub fn with_event_xml(mut self, key: &str, xml: &str) -> Self {
        self.event_documents
            .insert(key.to_string(), SpecDocument::xml(key, xml, 1));
        self
    }

    pub fn with_event_document(mut self, document: SpecDocument) -> Self {
        self.event_documents
            .insert(document.key.clone(), document);
        self
    }

    pub fn with_template_xml(mut self, name: &str, xml: &str) -> Self {
        self.template_documents
            .insert(name.to_string(), SpecDocument::xml(name, xml, 1));
        self
    }

    pub fn with_business_function(mut self, object_name: &str) -> Self {
        self.business_functions.push(CatalogObject {
            object_name: object_name.to_string(),
            object_type: ObjectType::BusinessFunction,
            description: String::new(),
            system_code: "01".to_string(),
        });
        self
    }

    pub fn with_table_index(mut self, table: &str, index: TableIndex) -> Self {
        self.table_indexes
            .entry(table.to_string())
            .or_default()
            .push(index);
        self
    }

    pub fn with_title(mut self, data_item: &str, title: &str) -> Self {
        self.titles.insert(
            data_item.to_string(),
            DataDictionaryTitle {
                data_item: data_item.to_string(),
                title1: title.to_string(),
                title2: String::new(),
            },
        );
        self
    }
}

impl MetadataSource for InMemoryMetadata {
    fn event_rules_document(&self, spec_key: &str) -> Result<Option<SpecDocument>> {
        Ok(self.event_documents.get(spec_key).cloned())
    }

    fn template_document(&self, template_name: &str) -> Result<Option<SpecDocument>> {
        Ok(self.template_documents.get(template_name).cloned())
    }

    fn query_object_catalog(
        &self,
        object_type: ObjectType,
        name_pattern: &str,
        cap: usize,
    ) -> Result<Vec<CatalogObject>> {
        let prefix = name_pattern.trim_end_matches('*');
        Ok(self
            .business_functions
            .iter()
            .filter(|object| {
                object.object_type == object_type && object.object_name.starts_with(prefix)
            })
            .take(cap)
            .cloned()
            .collect())
    }

    fn table_indexes(&self, table_name: &str) -> Result<Vec<TableIndex>> {
        Ok(self.table_indexes.get(table_name).cloned().unwrap_or_default())
    }

    fn data_dictionary_titles(&self, data_items: &[String]) -> Result<Vec<DataDictionaryTitle>> {
        Ok(data_items
            .iter()
            .filter_map(|item| self.titles.get(item).cloned())
            .collect())
    }
}
