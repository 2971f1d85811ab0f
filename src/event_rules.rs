//! Builds the typed statement list from a decoded event-rules XML tree.
//!
//! The builder is deliberately forgiving: the upstream conversion layer emits
//! both flat marker sequences (`<If/>...<EndIf/>`) and nested container
//! elements (`<If>...</If>`), and real-world specs contain fragments this
//! engine does not model. Unknown or incomplete fragments are skipped with a
//! trace, never fatal — the spec's declared structure is reproduced as
//! faithfully as possible.

use log::trace;

use crate::model::er::{
    BusinessFunctionCall, BusinessFunctionParam, ErStatement, LiteralValue, Operand, TableIoOp,
    TableIoParam, VariableDecl,
};
use crate::model::xml::XmlElement;

const CONDITION_ATTRS: [&str; 2] = ["desc", "description"];

/// Flattens the event-rules XML tree into the statement list.
pub fn build_event_rules(root: &XmlElement) -> Vec<ErStatement> {
    let mut statements = Vec::new();
    build_into(root, &mut statements);
    statements
}

fn build_into(parent: &XmlElement, statements: &mut Vec<ErStatement>) {
    for element in parent.child_elements() {
        match element.name.to_ascii_uppercase().as_str() {
            "IF" => {
                statements.push(ErStatement::IfOpen {
                    description: condition_description(element),
                });
                // Nested shape: the body lives inside the element and the
                // end marker is implied.
                if element.first_child_element().is_some() {
                    build_into(element, statements);
                    statements.push(ErStatement::EndIf);
                }
            }
            "ELSE" => statements.push(ErStatement::Else),
            "ENDIF" => statements.push(ErStatement::EndIf),
            "WHILE" => {
                statements.push(ErStatement::WhileOpen {
                    description: condition_description(element),
                });
                if element.first_child_element().is_some() {
                    build_into(element, statements);
                    statements.push(ErStatement::EndWhile);
                }
            }
            "ENDWHILE" => statements.push(ErStatement::EndWhile),
            "VAR" | "VARIABLE" => {
                if let Some(decl) = variable_decl_from(element) {
                    statements.push(ErStatement::VariableDecl(decl));
                }
            }
            "BFCALL" => {
                if let Some(call) = business_function_call_from(element) {
                    statements.push(ErStatement::BusinessFunctionCall(call));
                }
            }
            "TABLEIO" => {
                if let Some(op) = table_io_from(element) {
                    statements.push(ErStatement::TableIoOp(op));
                }
            }
            other => trace!("skipping unknown event-rules element <{other}>"),
        }
    }
}

fn condition_description(element: &XmlElement) -> String {
    element
        .first_attr(&CONDITION_ATTRS)
        .map(String::from)
        .unwrap_or_else(|| element.text())
}

fn variable_decl_from(element: &XmlElement) -> Option<VariableDecl> {
    let name = element.attr("name")?.trim();
    if name.is_empty() {
        trace!("skipping variable declaration with a blank name");
        return None;
    }

    Some(VariableDecl {
        id: element.attr("id").unwrap_or_default().trim().to_string(),
        name: name.to_string(),
        alias: element.attr("alias").unwrap_or_default().trim().to_string(),
        var_type: element.attr("type").map(|t| t.trim().to_string()),
        size: element.attr("size").and_then(|s| s.trim().parse().ok()),
    })
}

fn business_function_call_from(element: &XmlElement) -> Option<BusinessFunctionCall> {
    let function = element.attr("function")?.trim().to_string();
    let template = element.attr("template")?.trim().to_string();
    if function.is_empty() || template.is_empty() {
        trace!("skipping business-function call with blank function/template");
        return None;
    }

    let params = element
        .child_elements()
        .filter(|child| child.is_named("Param"))
        .map(|param| BusinessFunctionParam {
            copy_word: param.attr("copy").map(|c| c.trim().to_string()),
            item_id: param.attr("item").unwrap_or_default().trim().to_string(),
            operand: param.first_child_element().and_then(operand_from),
        })
        .collect();

    Some(BusinessFunctionCall {
        function,
        template,
        params,
    })
}

fn table_io_from(element: &XmlElement) -> Option<TableIoOp> {
    let table = element.attr("table")?.trim().to_string();
    if table.is_empty() {
        trace!("skipping table-I/O operation with a blank table");
        return None;
    }

    let params = element
        .child_elements()
        .filter(|child| child.is_named("Param"))
        .map(table_io_param_from)
        .collect();

    Some(TableIoOp {
        table,
        operation: element.attr("op").unwrap_or_default().trim().to_string(),
        index_id: element.attr("index").and_then(|i| i.trim().parse().ok()),
        params,
    })
}

fn table_io_param_from(param: &XmlElement) -> TableIoParam {
    // The operand pair arrives either wrapped (<From>/<To>) or as a single
    // bare operand child, which counts as the `from` side.
    let from_wrapped = param
        .find_child("From")
        .and_then(|wrap| wrap.first_child_element())
        .and_then(operand_from);
    let to = param
        .find_child("To")
        .and_then(|wrap| wrap.first_child_element())
        .and_then(operand_from);

    let from = from_wrapped.or_else(|| {
        param
            .child_elements()
            .find(|child| !child.is_named("From") && !child.is_named("To"))
            .and_then(operand_from)
    });

    TableIoParam {
        copy_word: param.attr("copy").map(|c| c.trim().to_string()),
        data_item: param.attr("item").unwrap_or_default().trim().to_string(),
        from,
        to,
    }
}

fn operand_from(element: &XmlElement) -> Option<Operand> {
    match element.name.to_ascii_uppercase().as_str() {
        "MEMBER" => Some(Operand::Member {
            item_id: element.attr("item").unwrap_or_default().trim().to_string(),
        }),
        "VAR" | "VARIABLE" => Some(Operand::Variable {
            id: element.attr("id").map(|i| i.trim().to_string()),
            name: element.attr("name").unwrap_or_default().trim().to_string(),
            alias: element.attr("alias").unwrap_or_default().trim().to_string(),
        }),
        "LITERAL" => Some(Operand::Literal(literal_from(element))),
        "CONSTANT" => Some(Operand::Constant {
            value: element
                .attr("value")
                .map(|v| v.to_string())
                .unwrap_or_else(|| element.text()),
        }),
        "SYSTEMVARIABLE" | "SYSVAR" => Some(Operand::SystemVariable {
            name: element.attr("name").unwrap_or_default().trim().to_string(),
        }),
        other => {
            trace!("skipping unknown operand element <{other}>");
            None
        }
    }
}

fn literal_from(element: &XmlElement) -> LiteralValue {
    if let Some(string) = element.find_child("String") {
        return LiteralValue::Str(string.text());
    }
    if let Some(number) = element.find_child("Number") {
        return LiteralValue::Number(number.text());
    }
    LiteralValue::Raw(element.text())
}
