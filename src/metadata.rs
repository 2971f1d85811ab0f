//! The metadata/spec query collaborator seam.
//!
//! The engine never talks to the ERP runtime itself: everything it needs —
//! spec documents, object-catalog rows, table indexes, data-dictionary
//! titles — comes through [`MetadataSource`]. The XML document shape behind a
//! [`SpecDocument`] is owned by the collaborator and treated as an opaque,
//! possibly-malformed string.

use bitflags::bitflags;
use serde::Serialize;

use crate::err::Result;

bitflags! {
    /// Storage flags carried on a raw spec record row.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SpecRecordFlags: u32 {
        /// The record payload is zlib-compressed.
        const COMPRESSED = 0b0001;
        /// The record payload text is Unicode rather than code-page encoded.
        const UNICODE_TEXT = 0b0010;
    }
}

/// Payload of one spec document, as handed over by the collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecPayload {
    /// Already-converted XML text.
    Xml(String),
    /// Raw binary record bytes; must pass through the spec blob decoder.
    Binary {
        bytes: Vec<u8>,
        flags: SpecRecordFlags,
    },
}

/// One logical spec (a data structure template or an event-rule stream).
///
/// Documents for the same key are never merged silently — the most recent
/// fetch wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDocument {
    /// The spec key this document was derived from.
    pub key: String,
    pub payload: SpecPayload,
    /// Number of source records assembled into this document.
    pub record_count: u32,
}

impl SpecDocument {
    pub fn xml(key: impl Into<String>, xml: impl Into<String>, record_count: u32) -> Self {
        SpecDocument {
            key: key.into(),
            payload: SpecPayload::Xml(xml.into()),
            record_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObjectType {
    BusinessFunction,
    DataStructure,
    Table,
}

/// One object-catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogObject {
    pub object_name: String,
    pub object_type: ObjectType,
    pub description: String,
    /// Owning system/product code.
    pub system_code: String,
}

/// One table index row: id, name, and the ordered key columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableIndex {
    pub id: u32,
    pub name: String,
    pub is_primary: bool,
    pub key_columns: Vec<String>,
}

/// Data-dictionary title rows for a data item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataDictionaryTitle {
    pub data_item: String,
    pub title1: String,
    pub title2: String,
}

impl DataDictionaryTitle {
    /// The display title: first non-blank of the two title lines.
    pub fn display_title(&self) -> Option<&str> {
        [&self.title1, &self.title2]
            .into_iter()
            .map(|t| t.trim())
            .find(|t| !t.is_empty())
    }
}

/// Abstract metadata/spec query service.
///
/// Implementations fetch from the ERP runtime (or a fixture store in tests);
/// their failures propagate unchanged — retry/backoff is theirs to own.
pub trait MetadataSource: Send + Sync {
    /// Event-rules XML document for an event-spec key, if one exists.
    fn event_rules_document(&self, spec_key: &str) -> Result<Option<SpecDocument>>;

    /// Data-structure-template document for a template name, if one exists.
    fn template_document(&self, template_name: &str) -> Result<Option<SpecDocument>>;

    /// Catalog objects of `object_type` matching `name_pattern` (trailing
    /// `*` wildcard), at most `cap` rows.
    fn query_object_catalog(
        &self,
        object_type: ObjectType,
        name_pattern: &str,
        cap: usize,
    ) -> Result<Vec<CatalogObject>>;

    /// Index metadata for a table.
    fn table_indexes(&self, table_name: &str) -> Result<Vec<TableIndex>>;

    /// Data-dictionary titles for a batch of data items. Items with no
    /// dictionary entry are simply absent from the result.
    fn data_dictionary_titles(&self, data_items: &[String]) -> Result<Vec<DataDictionaryTitle>>;
}
