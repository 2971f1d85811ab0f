//! A decoder and readable-text formatter for proprietary ERP event-rules
//! spec records.
//!
//! The ERP stores its business logic (event rules) and data-structure
//! definitions as opaque spec records in several undocumented binary
//! encodings with an XML-convertible payload. This crate takes those
//! payloads and produces deterministic, human-readable pseudocode, resolving
//! cross-references against data-dictionary and object-catalog metadata
//! along the way.
//!
//! The pipeline, leaves first:
//! - [`spec_blob`]: multi-hypothesis decoding of raw record payloads with
//!   full per-attempt diagnostics — decode never fails on malformed input,
//!   it reports.
//! - [`data_template`]: data structure templates (named parameter-slot
//!   lists) parsed from their spec XML.
//! - [`model`] + [`event_rules`]: the owned XML tree and the typed
//!   event-rules statement list built from it.
//! - [`render`] + [`format`]: readable-ER output, composed from
//!   independently callable formatting helpers.
//! - [`resolver`]: orchestration over a [`metadata::MetadataSource`]
//!   collaborator, with a per-template-name parse cache.
//!
//! The engine itself is synchronous and pure; only the metadata collaborator
//! performs I/O. Nothing here executes business logic — specs are decoded
//! and rendered for human inspection only.

pub mod data_template;
pub mod err;
pub mod event_rules;
pub mod format;
pub mod metadata;
pub mod model;
pub mod render;
pub mod resolver;
pub mod spec_blob;
mod utils;

pub use data_template::{DataStructureTemplate, TemplateItem};
pub use err::{Result, SpecError};
pub use event_rules::build_event_rules;
pub use format::{
    format_business_function_param_line, format_file_io_operation, format_file_io_param_line,
    format_literal_value, indent_line, prefix_qualifier, split_qualifier,
};
pub use metadata::{
    CatalogObject, DataDictionaryTitle, MetadataSource, ObjectType, SpecDocument, SpecPayload,
    SpecRecordFlags, TableIndex,
};
pub use model::er::{
    BusinessFunctionCall, BusinessFunctionParam, ErStatement, LiteralValue, Operand, TableIoOp,
    TableIoParam, VariableDecl,
};
pub use model::xml::{XmlAttribute, XmlElement, XmlNode, parse_xml_document};
pub use render::{ResolvedNames, render_event_rules};
pub use resolver::{FormattedSpec, ResolverSettings, SpecResolver};
pub use spec_blob::{
    AttemptStatus, DecodeAttempt, DecodeDiagnostics, DecodedSpec, DecompressedDiagnostics,
    EncodingFamily, Endianness, SpecBlobDecoder, looks_like_spec_stream,
};
pub use utils::normalize_xml_payload;
