//! Spec resolution and orchestration.
//!
//! The resolver owns the only shared mutable state in the engine: a
//! per-template-name parse cache with at-most-one concurrent fetch+parse per
//! name. Everything else — decoding, tree building, rendering — is pure
//! computation over immutable inputs; metadata fetches go through the
//! collaborator and their failures propagate unchanged.

use std::fmt;
use std::sync::{Arc, Mutex};

use encoding::label::encoding_from_windows_code_page;
use encoding::{DecoderTrap, EncodingRef};
use hashbrown::HashMap;
use log::{debug, trace};
use serde::Serialize;

use crate::data_template::DataStructureTemplate;
use crate::err::{Result, SpecError};
use crate::event_rules::build_event_rules;
use crate::metadata::{MetadataSource, ObjectType, SpecDocument, SpecPayload};
use crate::model::er::ErStatement;
use crate::model::xml::parse_xml_document;
use crate::render::{ResolvedNames, render_event_rules};
use crate::spec_blob::{DecodedSpec, SpecBlobDecoder};
use crate::utils::normalize_xml_payload;

/// Engine configuration.
#[derive(Clone, Copy)]
pub struct ResolverSettings {
    ansi_codec: EncodingRef,
    validate_checksums: bool,
    hex_preview_len: usize,
}

impl fmt::Debug for ResolverSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverSettings")
            .field("ansi_codec", &self.ansi_codec.name())
            .field("validate_checksums", &self.validate_checksums)
            .field("hex_preview_len", &self.hex_preview_len)
            .finish()
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        ResolverSettings {
            ansi_codec: encoding::all::WINDOWS_1252,
            validate_checksums: true,
            hex_preview_len: 16,
        }
    }
}

impl ResolverSettings {
    pub fn new() -> Self {
        ResolverSettings::default()
    }

    /// Fallback codec for container payload text whose declared code page is
    /// unknown (or absent) and which is not valid UTF-8.
    pub fn ansi_codec(mut self, codec: EncodingRef) -> Self {
        self.ansi_codec = codec;
        self
    }

    pub fn validate_checksums(mut self, validate: bool) -> Self {
        self.validate_checksums = validate;
        self
    }

    /// Head bytes shown in decode diagnostics.
    pub fn hex_preview_len(mut self, len: usize) -> Self {
        self.hex_preview_len = len;
        self
    }
}

/// A formatted spec returned to callers. Immutable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedSpec {
    pub text: String,
    pub status_message: String,
    /// The event-spec key the text was rendered from, when applicable.
    pub event_spec_key: Option<String>,
    /// The data-structure-template name used for resolution.
    pub template_name: Option<String>,
}

type TemplateSlot = Arc<Mutex<Option<Arc<DataStructureTemplate>>>>;

/// Orchestrates fetching, decoding, parsing and rendering of specs.
///
/// The template cache is tied to this instance's lifetime — callers needing
/// fresh data use a new resolver. The resolver is shareable across threads
/// when its source is.
pub struct SpecResolver<S> {
    source: S,
    settings: ResolverSettings,
    decoder: SpecBlobDecoder,
    template_cache: Mutex<HashMap<String, TemplateSlot>>,
}

impl<S: MetadataSource> SpecResolver<S> {
    pub fn new(source: S) -> Self {
        SpecResolver::with_settings(source, ResolverSettings::default())
    }

    pub fn with_settings(source: S, settings: ResolverSettings) -> Self {
        SpecResolver {
            decoder: SpecBlobDecoder::new()
                .validate_checksums(settings.validate_checksums)
                .preview_len(settings.hex_preview_len),
            settings,
            source,
            template_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Fetches and parses a data structure template, cached by name.
    ///
    /// Repeated calls for one name return the identical shared instance;
    /// parse work happens at most once per name for this resolver's
    /// lifetime. A failed attempt leaves the name unresolved for the next
    /// caller — never negatively cached.
    pub fn data_structure_template(
        &self,
        template_name: &str,
    ) -> Result<Arc<DataStructureTemplate>> {
        let name = template_name.trim();
        if name.is_empty() {
            return Err(SpecError::MissingArgument {
                name: "template_name",
            });
        }

        let slot = {
            let mut cache = self.template_cache.lock().expect("lock poisoned");
            cache.entry(name.to_string()).or_default().clone()
        };

        // Per-name lock: concurrent requests for the same uncached name
        // serialize here, so the cache can never hold two distinct parses.
        let mut slot = slot.lock().expect("lock poisoned");
        if let Some(template) = slot.as_ref() {
            trace!("template cache hit for {name}");
            return Ok(Arc::clone(template));
        }

        let document = self
            .source
            .template_document(name)?
            .ok_or_else(|| SpecError::SpecNotFound {
                key: name.to_string(),
            })?;
        let xml = self.document_text(&document)?;
        let template = Arc::new(DataStructureTemplate::parse(name, &xml)?);

        *slot = Some(Arc::clone(&template));
        debug!(
            "parsed data structure template {name} ({} source records)",
            document.record_count
        );
        Ok(template)
    }

    /// Resolves the business-function engine name behind a template name:
    /// a leading `D` becomes `B` (`D1234` → `B1234`), and the object catalog
    /// is queried for the first business function matching that pattern.
    pub fn resolve_business_function_name(&self, template_name: &str) -> Result<String> {
        let name = template_name.trim();
        if name.is_empty() {
            return Err(SpecError::MissingArgument {
                name: "template_name",
            });
        }

        let candidate = match name.strip_prefix('D') {
            Some(rest) => format!("B{rest}"),
            None => name.to_string(),
        };
        let pattern = format!("{candidate}*");

        let matches =
            self.source
                .query_object_catalog(ObjectType::BusinessFunction, &pattern, 1)?;
        match matches.into_iter().next() {
            Some(object) => {
                trace!("business function for {name}: {}", object.object_name);
                Ok(object.object_name)
            }
            None => Err(SpecError::BusinessFunctionNotFound { pattern }),
        }
    }

    /// Fetches, decodes and renders an event-rules spec as readable text.
    ///
    /// Cross-reference resolution is batched per distinct table, data-item
    /// set and call template. A successful call always yields complete text
    /// even when individual references degraded; a failed call yields no
    /// partial text.
    pub fn formatted_event_rules(
        &self,
        event_spec_key: &str,
        template_name: &str,
    ) -> Result<FormattedSpec> {
        let key = event_spec_key.trim();
        if key.is_empty() {
            return Err(SpecError::MissingArgument {
                name: "event_spec_key",
            });
        }

        let document =
            self.source
                .event_rules_document(key)?
                .ok_or_else(|| SpecError::SpecNotFound {
                    key: key.to_string(),
                })?;
        let template = self.data_structure_template(template_name)?;

        let xml = self.document_text(&document)?;
        let payload = normalize_xml_payload(&xml);
        let root = parse_xml_document(&payload).map_err(|e| SpecError::xml_parse(key, e))?;
        let statements = build_event_rules(&root);

        let names = self.resolve_names(template_name.trim(), template, &statements)?;
        let text = render_event_rules(&statements, &names);

        debug!("event rules {key}: {} statements rendered", statements.len());
        Ok(FormattedSpec {
            text,
            status_message: "Event rules loaded.".to_string(),
            event_spec_key: Some(key.to_string()),
            template_name: Some(template_name.trim().to_string()),
        })
    }

    /// Renders a data structure template itself as readable text.
    pub fn formatted_template(&self, template_name: &str) -> Result<FormattedSpec> {
        let template = self.data_structure_template(template_name)?;
        Ok(FormattedSpec {
            text: template.formatted(),
            status_message: "Data structure loaded.".to_string(),
            event_spec_key: None,
            template_name: Some(template.name.clone()),
        })
    }

    fn resolve_names(
        &self,
        template_name: &str,
        template: Arc<DataStructureTemplate>,
        statements: &[ErStatement],
    ) -> Result<ResolvedNames> {
        let mut names = ResolvedNames::new();
        names.templates.insert(template_name.to_string(), template);

        for statement in statements {
            if let ErStatement::BusinessFunctionCall(call) = statement {
                if !names.engine_names.contains_key(&call.template) {
                    let engine = self.resolve_business_function_name(&call.template)?;
                    names.engine_names.insert(call.template.clone(), engine);
                }
                if !names.templates.contains_key(&call.template) {
                    match self.data_structure_template(&call.template) {
                        Ok(template) => {
                            names.templates.insert(call.template.clone(), template);
                        }
                        // Parameter labels degrade to bare item ids.
                        Err(SpecError::SpecNotFound { .. }) => {
                            debug!("call template {} has no document", call.template);
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        for statement in statements {
            if let ErStatement::TableIoOp(op) = statement {
                if !names.table_indexes.contains_key(&op.table) {
                    let indexes = self.source.table_indexes(&op.table)?;
                    names.table_indexes.insert(op.table.clone(), indexes);
                }
            }
        }

        // One batched title fetch over the distinct data-item set.
        let mut data_items: Vec<String> = Vec::new();
        for statement in statements {
            if let ErStatement::TableIoOp(op) = statement {
                for param in &op.params {
                    if !param.data_item.is_empty() && !data_items.contains(&param.data_item) {
                        data_items.push(param.data_item.clone());
                    }
                }
            }
        }
        if !data_items.is_empty() {
            for title in self.source.data_dictionary_titles(&data_items)? {
                if let Some(display) = title.display_title() {
                    names
                        .dictionary_titles
                        .insert(title.data_item.clone(), display.to_string());
                }
            }
        }

        Ok(names)
    }

    /// XML text of a document, running binary payloads through the blob
    /// decoder first.
    fn document_text(&self, document: &SpecDocument) -> Result<String> {
        match &document.payload {
            SpecPayload::Xml(text) => Ok(text.clone()),
            SpecPayload::Binary { bytes, flags } => {
                let (decoded, diagnostics) = self.decoder.decode(bytes, *flags);
                if let Ok(json) = serde_json::to_string(&diagnostics) {
                    debug!("decode diagnostics for `{}`: {json}", document.key);
                }
                let decoded = decoded.ok_or_else(|| SpecError::DecodeFailed {
                    key: document.key.clone(),
                    attempts: diagnostics.attempt_count(),
                })?;
                self.decoded_text(&document.key, &decoded)
            }
        }
    }

    fn decoded_text(&self, key: &str, decoded: &DecodedSpec) -> Result<String> {
        if let Some(code_page) = decoded.code_page {
            if let Some(codec) = encoding_from_windows_code_page(code_page as usize) {
                return codec
                    .decode(&decoded.bytes, DecoderTrap::Replace)
                    .map_err(|message| SpecError::PayloadDecode {
                        key: key.to_string(),
                        message: message.into_owned(),
                    });
            }
            trace!("unknown declared code page {code_page} for `{key}`");
        }

        match std::str::from_utf8(&decoded.bytes) {
            Ok(text) => Ok(text.to_string()),
            Err(_) => self
                .settings
                .ansi_codec
                .decode(&decoded.bytes, DecoderTrap::Replace)
                .map_err(|message| SpecError::PayloadDecode {
                    key: key.to_string(),
                    message: message.into_owned(),
                }),
        }
    }
}
