//! Readable-ER rendering: turns the typed statement list into indented,
//! qualifier-annotated pseudocode.
//!
//! Rendering is pure over the statement list and a set of pre-resolved name
//! tables. A reference that did not resolve degrades to the best available
//! literal text — one broken cross-reference never aborts a render.

use std::sync::Arc;

use hashbrown::HashMap;
use log::trace;

use crate::data_template::DataStructureTemplate;
use crate::format::{
    format_business_function_param_line, format_file_io_operation, format_file_io_param_line,
    format_literal_value, indent_line, prefix_qualifier,
};
use crate::metadata::TableIndex;
use crate::model::er::{
    BusinessFunctionCall, ErStatement, Operand, TableIoOp, TableIoParam, VariableDecl,
};

/// Parameter continuation lines use a pipe unit instead of tabs.
const PARAM_INDENT_UNIT: &str = "|   ";

/// Name tables resolved ahead of rendering.
///
/// The resolver batches the metadata fetches that fill these (one catalog
/// query per distinct call template, one title fetch per distinct data-item
/// set); the renderer only ever looks up.
#[derive(Debug, Default)]
pub struct ResolvedNames {
    /// Data structure templates by template name.
    pub templates: HashMap<String, Arc<DataStructureTemplate>>,
    /// Business-function engine names by call template name.
    pub engine_names: HashMap<String, String>,
    /// Data-dictionary display titles by data item.
    pub dictionary_titles: HashMap<String, String>,
    /// Fetched index metadata by table name.
    pub table_indexes: HashMap<String, Vec<TableIndex>>,
}

impl ResolvedNames {
    pub fn new() -> Self {
        ResolvedNames::default()
    }

    fn template(&self, name: &str) -> Option<&DataStructureTemplate> {
        self.templates.get(name).map(Arc::as_ref)
    }

    fn has_table_index(&self, table: &str, index_id: u32) -> bool {
        self.table_indexes
            .get(table)
            .is_some_and(|indexes| indexes.iter().any(|index| index.id == index_id))
    }
}

/// Renders the statement list as readable pseudocode.
pub fn render_event_rules(statements: &[ErStatement], names: &ResolvedNames) -> String {
    let mut out = String::new();
    let mut level = 0usize;
    // Declarations label later references; first declaration wins per id.
    let mut variables: HashMap<&str, &VariableDecl> = HashMap::new();

    for statement in statements {
        match statement {
            ErStatement::IfOpen { description } => {
                push_line(&mut out, &indent_line(description, level));
                level += 1;
            }
            ErStatement::Else => {
                push_line(&mut out, &indent_line("Else", level.saturating_sub(1)));
            }
            ErStatement::EndIf => {
                level = level.saturating_sub(1);
                push_line(&mut out, &indent_line("End If", level));
            }
            ErStatement::WhileOpen { description } => {
                push_line(&mut out, &indent_line(description, level));
                level += 1;
            }
            ErStatement::EndWhile => {
                level = level.saturating_sub(1);
                push_line(&mut out, &indent_line("End While", level));
            }
            ErStatement::VariableDecl(decl) => {
                // Not a rendered line; only labels later references.
                if !decl.id.is_empty() {
                    variables.entry(decl.id.as_str()).or_insert(decl);
                }
            }
            ErStatement::BusinessFunctionCall(call) => {
                render_business_function_call(&mut out, level, call, names, &variables);
            }
            ErStatement::TableIoOp(op) => {
                render_table_io(&mut out, level, op, names, &variables);
            }
        }
    }

    out
}

fn render_business_function_call(
    out: &mut String,
    level: usize,
    call: &BusinessFunctionCall,
    names: &ResolvedNames,
    variables: &HashMap<&str, &VariableDecl>,
) {
    let engine = names
        .engine_names
        .get(&call.template)
        .map(String::as_str)
        .unwrap_or_else(|| {
            trace!("no engine name resolved for template {}", call.template);
            call.template.as_str()
        });

    push_line(
        out,
        &indent_line(&format!("{0}({engine}.{0})", call.function), level),
    );

    let template = names.template(&call.template);
    for param in &call.params {
        let left_base = template
            .and_then(|t| t.try_get_item(&param.item_id))
            .map(|item| item.display_name())
            .unwrap_or_else(|| param.item_id.clone());
        let left = prefix_qualifier(Some("BF"), &left_base);

        let right = param
            .operand
            .as_ref()
            .map(|operand| operand_label(operand, template, variables))
            .unwrap_or_default();

        let line = format_business_function_param_line(param.copy_word.as_deref(), &left, &right);
        push_line(out, &param_indent(&line, level + 1));
    }
}

fn render_table_io(
    out: &mut String,
    level: usize,
    op: &TableIoOp,
    names: &ResolvedNames,
    variables: &HashMap<&str, &VariableDecl>,
) {
    let mut header = format!(
        "{}.{}",
        op.table,
        format_file_io_operation(Some(&op.operation))
    );
    if let Some(index_id) = op.index_id {
        // The suffix is only trustworthy when the id exists in the fetched
        // index metadata.
        if names.has_table_index(&op.table, index_id) {
            header.push_str(&format!(" Index {index_id}"));
        } else {
            trace!("index {index_id} of {} did not resolve", op.table);
        }
    }
    push_line(out, &indent_line(&header, level));

    for param in &op.params {
        push_line(
            out,
            &param_indent(&table_io_param_line(param, names, variables), level + 1),
        );
    }
}

fn table_io_param_line(
    param: &TableIoParam,
    names: &ResolvedNames,
    variables: &HashMap<&str, &VariableDecl>,
) -> String {
    let left = match names.dictionary_titles.get(&param.data_item) {
        Some(title) => format!("{title} [{}]", param.data_item),
        None => param.data_item.clone(),
    };

    let right = match param.effective_operand() {
        Some(operand) => {
            let value = operand_label(operand, None, variables);
            prefix_qualifier(operand_qualifier(operand), &value)
        }
        None => String::new(),
    };

    format_file_io_param_line(param.copy_word.as_deref(), &left, &right)
}

/// Qualifier prefixes observed on table-I/O operand references. Members and
/// plain database references carry none.
fn operand_qualifier(operand: &Operand) -> Option<&'static str> {
    match operand {
        Operand::Variable { .. } => Some("VA"),
        Operand::Constant { .. } => Some("CO"),
        Operand::SystemVariable { .. } => Some("SV"),
        Operand::Member { .. } | Operand::Literal(_) => None,
    }
}

fn operand_label(
    operand: &Operand,
    template: Option<&DataStructureTemplate>,
    variables: &HashMap<&str, &VariableDecl>,
) -> String {
    match operand {
        Operand::Member { item_id } => template
            .and_then(|t| t.try_get_item(item_id))
            .map(|item| item.display_name())
            .unwrap_or_else(|| item_id.clone()),
        Operand::Variable { id, name, alias } => {
            let declared = id
                .as_deref()
                .filter(|id| !id.is_empty())
                .and_then(|id| variables.get(id));
            match declared {
                Some(decl) => variable_label(&decl.name, &decl.alias),
                None => variable_label(name, alias),
            }
        }
        Operand::Literal(value) => format_literal_value(value),
        Operand::Constant { value } => value.clone(),
        Operand::SystemVariable { name } => name.clone(),
    }
}

fn variable_label(name: &str, alias: &str) -> String {
    if alias.is_empty() {
        name.to_string()
    } else {
        format!("{name} [{alias}]")
    }
}

fn param_indent(text: &str, units: usize) -> String {
    format!("{}{text}", PARAM_INDENT_UNIT.repeat(units))
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::er::{BusinessFunctionParam, LiteralValue};
    use pretty_assertions::assert_eq;

    fn template_d0001() -> Arc<DataStructureTemplate> {
        Arc::new(
            DataStructureTemplate::parse(
                "D0001",
                r#"<Spec>
                     <Template>
                       <Item id="1" seq="1" copy="OUT" alias="AL1" field="Field1"/>
                     </Template>
                   </Spec>"#,
            )
            .unwrap(),
        )
    }

    fn names_with_template() -> ResolvedNames {
        let mut names = ResolvedNames::new();
        names
            .templates
            .insert("D0001".to_string(), template_d0001());
        names
            .engine_names
            .insert("D0001".to_string(), "B0001".to_string());
        names
    }

    #[test]
    fn control_flow_indents_and_restores() {
        let statements = vec![
            ErStatement::IfOpen {
                description: "If A".to_string(),
            },
            ErStatement::WhileOpen {
                description: "While B".to_string(),
            },
            ErStatement::EndWhile,
            ErStatement::Else,
            ErStatement::EndIf,
        ];
        let text = render_event_rules(&statements, &ResolvedNames::new());
        assert_eq!(text, "If A\n\tWhile B\n\tEnd While\nElse\nEnd If\n");
    }

    #[test]
    fn business_function_call_renders_engine_and_params() {
        let statements = vec![ErStatement::BusinessFunctionCall(BusinessFunctionCall {
            function: "MyFunc".to_string(),
            template: "D0001".to_string(),
            params: vec![BusinessFunctionParam {
                copy_word: Some("OUT".to_string()),
                item_id: "1".to_string(),
                operand: Some(Operand::Member {
                    item_id: "1".to_string(),
                }),
            }],
        })];

        let text = render_event_rules(&statements, &names_with_template());
        assert_eq!(
            text,
            "MyFunc(B0001.MyFunc)\n|   BF Field1 [AL1] <- Field1 [AL1]\n"
        );
    }

    #[test]
    fn unresolved_engine_degrades_to_template_name() {
        let statements = vec![ErStatement::BusinessFunctionCall(BusinessFunctionCall {
            function: "MyFunc".to_string(),
            template: "D9999".to_string(),
            params: vec![],
        })];
        let text = render_event_rules(&statements, &ResolvedNames::new());
        assert_eq!(text, "MyFunc(D9999.MyFunc)\n");
    }

    #[test]
    fn table_io_renders_index_only_when_resolved() {
        let mut names = ResolvedNames::new();
        names.table_indexes.insert(
            "F0101".to_string(),
            vec![TableIndex {
                id: 1,
                name: "IDX1".to_string(),
                is_primary: true,
                key_columns: vec!["AN8".to_string()],
            }],
        );

        let op = |index_id| {
            ErStatement::TableIoOp(TableIoOp {
                table: "F0101".to_string(),
                operation: "FETCH_SINGLE".to_string(),
                index_id: Some(index_id),
                params: vec![],
            })
        };

        let resolved = render_event_rules(&[op(1)], &names);
        assert_eq!(resolved, "F0101.FetchSingle Index 1\n");

        let unresolved = render_event_rules(&[op(9)], &names);
        assert_eq!(unresolved, "F0101.FetchSingle\n");
    }

    #[test]
    fn table_io_param_uses_titles_and_qualifiers() {
        let mut names = ResolvedNames::new();
        names
            .dictionary_titles
            .insert("AN8".to_string(), "Address Number".to_string());

        let statements = vec![ErStatement::TableIoOp(TableIoOp {
            table: "F0101".to_string(),
            operation: "SELECT".to_string(),
            index_id: None,
            params: vec![
                TableIoParam {
                    copy_word: Some("IN".to_string()),
                    data_item: "AN8".to_string(),
                    from: Some(Operand::Variable {
                        id: None,
                        name: "mnAddress".to_string(),
                        alias: "AN8".to_string(),
                    }),
                    to: None,
                },
                TableIoParam {
                    copy_word: Some("OUT".to_string()),
                    data_item: "ALPH".to_string(),
                    from: None,
                    to: Some(Operand::SystemVariable {
                        name: "SL DateToday".to_string(),
                    }),
                },
                TableIoParam {
                    copy_word: None,
                    data_item: "EV01".to_string(),
                    from: Some(Operand::Constant {
                        value: "1".to_string(),
                    }),
                    to: None,
                },
            ],
        })];

        let text = render_event_rules(&statements, &names);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "F0101.Select");
        assert_eq!(lines[1], "|   Address Number [AN8] -> VA mnAddress [AN8]");
        assert_eq!(lines[2], "|   ALPH <- SV SL DateToday");
        assert_eq!(lines[3], "|   EV01 = CO 1");
    }

    #[test]
    fn variable_declarations_label_later_references() {
        let statements = vec![
            ErStatement::VariableDecl(VariableDecl {
                id: "7".to_string(),
                name: "mnCounter".to_string(),
                alias: "MATH01".to_string(),
                var_type: None,
                size: None,
            }),
            ErStatement::TableIoOp(TableIoOp {
                table: "F0101".to_string(),
                operation: "UPDATE".to_string(),
                index_id: None,
                params: vec![TableIoParam {
                    copy_word: Some("IN".to_string()),
                    data_item: "AN8".to_string(),
                    from: Some(Operand::Variable {
                        id: Some("7".to_string()),
                        name: String::new(),
                        alias: String::new(),
                    }),
                    to: None,
                }],
            }),
        ];

        let text = render_event_rules(&statements, &ResolvedNames::new());
        assert!(text.contains("VA mnCounter [MATH01]"), "got: {text}");
        // The declaration itself is not a line.
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn params_nest_one_pipe_unit_deeper_than_their_statement() {
        let statements = vec![
            ErStatement::IfOpen {
                description: "If A".to_string(),
            },
            ErStatement::BusinessFunctionCall(BusinessFunctionCall {
                function: "F".to_string(),
                template: "D0001".to_string(),
                params: vec![BusinessFunctionParam {
                    copy_word: None,
                    item_id: "1".to_string(),
                    operand: Some(Operand::Literal(LiteralValue::Str("x".to_string()))),
                }],
            }),
            ErStatement::EndIf,
        ];

        let text = render_event_rules(&statements, &names_with_template());
        assert!(
            text.contains("|   |   BF Field1 [AL1] -> \"x\""),
            "got: {text}"
        );
    }
}
