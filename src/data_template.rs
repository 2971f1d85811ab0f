//! Data structure templates: the named parameter-slot lists referenced by
//! business-function calls and forms.
//!
//! Templates are parsed once from their spec XML document and shared
//! immutably afterwards (the resolver caches them by name).

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use log::trace;
use serde::Serialize;

use crate::err::{Result, SpecError};
use crate::model::xml::{XmlElement, parse_xml_document};
use crate::utils::normalize_xml_payload;

/// Attribute candidates for the template description, tried in order.
const DESCRIPTION_ATTRS: [&str; 3] = ["description", "desc", "title"];

/// The five values every template item must carry.
const ITEM_ATTRS: [&str; 5] = ["id", "seq", "copy", "alias", "field"];

/// One parameter slot of a data structure template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateItem {
    /// Item id, unique within the template.
    pub id: String,
    pub display_sequence: u32,
    /// Data flow direction tag: `IN`/`OUT`/`INOUT`.
    pub copy_word: String,
    /// Data-dictionary alias.
    pub alias: String,
    pub field_name: String,
}

impl TemplateItem {
    /// Readable form used wherever the item is referenced: `field [alias]`.
    pub fn display_name(&self) -> String {
        format!("{} [{}]", self.field_name, self.alias)
    }
}

/// A parsed data structure template, keyed by item id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataStructureTemplate {
    pub name: String,
    pub description: Option<String>,
    items: HashMap<String, TemplateItem>,
}

impl DataStructureTemplate {
    /// Parses a template from its spec XML document.
    ///
    /// The payload is normalized first (spec blobs carry fixed-record
    /// padding); the description comes from the root's attributes (first
    /// non-blank candidate); items are scanned from the descendants of the
    /// first child element. An element missing any of the five item values
    /// is not a template item and is skipped; duplicate ids keep the first
    /// occurrence.
    pub fn parse(template_name: &str, xml: &str) -> Result<Self> {
        let name = template_name.trim();
        if name.is_empty() {
            return Err(SpecError::MissingArgument {
                name: "template_name",
            });
        }
        if xml.trim().is_empty() {
            return Err(SpecError::MissingArgument { name: "xml" });
        }

        let payload = normalize_xml_payload(xml);
        let root =
            parse_xml_document(&payload).map_err(|e| SpecError::xml_parse(template_name, e))?;

        let description = root.first_attr(&DESCRIPTION_ATTRS).map(String::from);

        let mut items = HashMap::new();
        if let Some(container) = root.first_child_element() {
            for element in container.descendant_elements() {
                let Some(item) = template_item_from(element) else {
                    continue;
                };
                match items.entry(item.id.clone()) {
                    Entry::Vacant(slot) => {
                        slot.insert(item);
                    }
                    // First occurrence wins for stability.
                    Entry::Occupied(_) => {
                        trace!("template {name}: duplicate item id {}", item.id);
                    }
                }
            }
        }

        trace!("template {name}: {} items", items.len());

        Ok(DataStructureTemplate {
            name: name.to_string(),
            description,
            items,
        })
    }

    /// Total lookup by item id: `None` for blank or unknown ids.
    pub fn try_get_item(&self, id: &str) -> Option<&TemplateItem> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        self.items.get(id)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Renders the template itself as readable text: the description line
    /// (when present), then one line per item in display-sequence order.
    pub fn formatted(&self) -> String {
        let mut out = String::new();

        if let Some(description) = &self.description {
            out.push_str(description);
            out.push('\n');
        }

        let mut items: Vec<&TemplateItem> = self.items.values().collect();
        items.sort_by(|a, b| {
            a.display_sequence
                .cmp(&b.display_sequence)
                .then_with(|| a.id.cmp(&b.id))
        });

        for item in items {
            out.push_str(&format!(
                "{:>4}  {:<5} {}\n",
                item.display_sequence,
                item.copy_word,
                item.display_name()
            ));
        }

        out
    }
}

fn template_item_from(element: &XmlElement) -> Option<TemplateItem> {
    // All five values must be present; `seq` must also be numeric.
    let values: Vec<&str> = ITEM_ATTRS
        .iter()
        .map(|attr| element.attr(attr))
        .collect::<Option<Vec<_>>>()?;

    let [id, seq, copy, alias, field] = values[..] else {
        return None;
    };

    let id = id.trim();
    if id.is_empty() {
        return None;
    }

    let display_sequence = match seq.trim().parse() {
        Ok(seq) => seq,
        Err(_) => {
            trace!("skipping item {id}: non-numeric display sequence {seq:?}");
            return None;
        }
    };

    Some(TemplateItem {
        id: id.to_string(),
        display_sequence,
        copy_word: copy.trim().to_string(),
        alias: alias.trim().to_string(),
        field_name: field.trim().to_string(),
    })
}
