//! Human-readable plan dump for diagnostics and snapshot tests.
//!
//! Source handles are omitted so that equal plans dump identically.

use std::fmt::Write as _;

use crate::plan::{ArrayOrigin, PlanKind, PlanNode};

/// Renders the plan as an indented tree, one node per line.
pub fn dump(node: &PlanNode) -> String {
    let mut ctx = DumpContext::default();
    ctx.node(None, node, 0);
    ctx.out
}

#[derive(Default)]
struct DumpContext {
    out: String,
}

impl DumpContext {
    fn line(&mut self, label: Option<&str>, depth: usize, text: &str, node: &PlanNode) {
        for _ in 0..depth {
            self.out.push_str("  ");
        }
        if let Some(label) = label {
            let _ = write!(self.out, "{label}: ");
        }
        let _ = writeln!(self.out, "{text} : {}", node.ty());
    }

    fn node(&mut self, label: Option<&str>, node: &PlanNode, depth: usize) {
        let kind = node.kind();
        let name = kind.name();
        let child = depth + 1;
        match kind {
            PlanKind::New(new) => {
                self.line(label, depth, &format!("{name} {}", new.meta.name()), node);
                for (i, arg) in new.args.iter().enumerate() {
                    self.node(Some(format!("arg{i}").as_str()), arg, child);
                }
                for assign in &new.members {
                    self.node(Some(assign.member.as_ref()), &assign.expr, child);
                }
            }
            PlanKind::ColumnRef { ordinal, column_type } => {
                let text = if column_type == node.ty().non_nullable() {
                    format!("{name} #{ordinal}")
                } else {
                    format!("{name} #{ordinal} as {column_type}")
                };
                self.line(label, depth, &text, node);
            }
            PlanKind::UserColumn { name: column, required } => {
                let column = column.as_deref().map_or("<unnamed>".to_string(), |c| format!("{c:?}"));
                let flag = if *required { " required" } else { "" };
                self.line(label, depth, &format!("{name} {column}{flag}"), node);
            }
            PlanKind::Value(lit) => self.line(label, depth, &format!("{name} {lit}"), node),
            PlanKind::ClientParameter { index } => self.line(label, depth, &format!("{name} ${index}"), node),
            PlanKind::Link(link) => {
                self.line(label, depth, &format!("{name} {}", link.member.id()), node);
                for key in &link.keys {
                    self.node(Some("key"), key, child);
                }
                if let Some(expansion) = &link.expansion {
                    self.node(Some("expansion"), expansion, child);
                }
            }
            PlanKind::JoinedCollection { expression, count } => {
                self.line(label, depth, name, node);
                self.node(Some("count"), count, child);
                self.node(Some("element"), expression, child);
            }
            PlanKind::Grouping { key, group } => {
                self.line(label, depth, name, node);
                self.node(Some("key"), key, child);
                self.node(Some("group"), group, child);
            }
            PlanKind::ClientArray { elements, origin } => {
                let text = match origin {
                    ArrayOrigin::Literal => name.to_string(),
                    ArrayOrigin::Captured => format!("{name} captured"),
                };
                self.line(label, depth, &text, node);
                for element in elements {
                    self.node(None, element, child);
                }
            }
            PlanKind::ClientCase { discriminant, whens } => {
                self.line(label, depth, name, node);
                self.node(Some("on"), discriminant, child);
                for when in whens {
                    match &when.matches {
                        Some(matches) => {
                            self.node(Some("when"), matches, child);
                            self.node(Some("then"), &when.value, child);
                        }
                        None => self.node(Some("else"), &when.value, child),
                    }
                }
            }
            PlanKind::SearchedCase { whens, otherwise } => {
                self.line(label, depth, name, node);
                for when in whens {
                    self.node(Some("when"), &when.condition, child);
                    self.node(Some("then"), &when.value, child);
                }
                if let Some(otherwise) = otherwise {
                    self.node(Some("else"), otherwise, child);
                }
            }
            PlanKind::TypeCase { discriminator, whens } => {
                self.line(label, depth, name, node);
                self.node(Some("on"), discriminator, child);
                for when in whens {
                    let label = match &when.matches {
                        Some(code) => format!("when {code}"),
                        None => "else".to_string(),
                    };
                    self.node(Some(label.as_str()), &when.binding, child);
                }
            }
            PlanKind::DiscriminatedType { discriminator, target } => {
                self.line(label, depth, &format!("{name} {}", target.name()), node);
                self.node(Some("on"), discriminator, child);
            }
            PlanKind::Member { expr, member } => {
                self.line(label, depth, &format!("{name} {}", member.id()), node);
                self.node(None, expr, child);
            }
            PlanKind::MethodCall { object, method, args } => {
                self.line(label, depth, &format!("{name} {method:?}"), node);
                if let Some(object) = object {
                    self.node(Some("this"), object, child);
                }
                for arg in args {
                    self.node(Some("arg"), arg, child);
                }
            }
            PlanKind::ClientQuery { subquery, args } => {
                self.line(label, depth, &format!("{name} #{subquery}"), node);
                for arg in args {
                    self.node(Some("arg"), arg, child);
                }
            }
            PlanKind::OptionalValue { has_value, value } => {
                self.line(label, depth, name, node);
                self.node(Some("has_value"), has_value, child);
                self.node(Some("value"), value, child);
            }
            PlanKind::ValueOf(inner) | PlanKind::OuterJoinedValue(inner) | PlanKind::Lift(inner) => {
                self.line(label, depth, name, node);
                self.node(None, inner, child);
            }
        }
    }
}
