//! Joined collections, groupings, client arrays and nested queries.

use materia_core::coerce::into_sequence;
use materia_core::{Group, Sequence, Ty, Value};
use materia_plan::{PlanKind, PlanNode};

use super::compiler::{CompileCtx, Eval, coerced, eval_fn};
use super::error::CompileError;

impl CompileCtx<'_> {
    /// Reads `count`, then one element per row, advancing the cursor
    /// between elements. Stops early when rows run out.
    pub(super) fn joined_collection(
        &mut self,
        node: &PlanNode,
        expression: &PlanNode,
        count: &PlanNode,
    ) -> Result<Eval, CompileError> {
        let element_ty = node.ty().element_type().clone();
        let count = self.compile_for_type(count, &Ty::nullable(Ty::I64))?;
        let element = self.compile_for_type(expression, &element_ty)?;
        let to_node = self.coercion(node, &Ty::list(element_ty), node.ty())?;

        let collect = eval_fn(move |ctx, owner| {
            let n = count(ctx, owner)?.as_i64().unwrap_or(0).max(0) as usize;
            let mut items = Vec::new();
            for i in 0..n {
                if i > 0 && !ctx.read()? {
                    break;
                }
                items.push(element(ctx, owner)?);
            }
            Ok(Value::List(items))
        });
        Ok(coerced(collect, to_node))
    }

    pub(super) fn grouping(&mut self, node: &PlanNode, key: &PlanNode, group: &PlanNode) -> Result<Eval, CompileError> {
        let Ty::Grouping(key_ty, element_ty) = node.ty() else {
            return Err(CompileError::translation(node, format!("grouping cannot produce {}", node.ty())));
        };
        let key = self.compile_for_type(key, key_ty)?;
        let items = self.compile_for_type(group, &Ty::seq(element_ty.as_ref().clone()))?;

        Ok(eval_fn(move |ctx, owner| {
            let key = key(ctx, owner)?;
            let items = into_sequence(items(ctx, owner)?)?.unwrap_or_else(Sequence::empty);
            Ok(Value::Group(Group::new(key, items)))
        }))
    }

    pub(super) fn client_array(&mut self, node: &PlanNode, elements: &[PlanNode]) -> Result<Eval, CompileError> {
        let Ty::Array(element_ty) = node.ty() else {
            return Err(CompileError::translation(
                node,
                format!("client array must have an array type, found {}", node.ty()),
            ));
        };
        let elements = elements
            .iter()
            .map(|e| self.compile_for_type(e, element_ty))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(eval_fn(move |ctx, owner| {
            let values = elements.iter().map(|e| e(ctx, owner)).collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(values))
        }))
    }

    /// Runs a registered sub-query; column arguments are read as nullable.
    pub(super) fn client_query(
        &mut self,
        node: &PlanNode,
        subquery: usize,
        args: &[PlanNode],
    ) -> Result<Eval, CompileError> {
        let mut compiled = Vec::with_capacity(args.len());
        for arg in args {
            let eval = match arg.kind() {
                PlanKind::ColumnRef { ordinal, column_type } => {
                    let declared = if arg.ty().is_value_type() && !arg.ty().is_nullable_value() {
                        Ty::nullable(arg.ty().clone())
                    } else {
                        arg.ty().clone()
                    };
                    self.column_ref(arg, *ordinal, column_type, &declared)?
                }
                _ => self.compile_node(arg)?,
            };
            compiled.push(eval);
        }
        let element_ty = node.ty().element_type().clone();
        let to_node = self.coercion(node, &Ty::list(element_ty), node.ty())?;

        let run = eval_fn(move |ctx, owner| {
            let values = compiled.iter().map(|a| a(ctx, owner)).collect::<Result<Vec<_>, _>>()?;
            let results = ctx.execute_subquery(subquery, values)?;
            Ok(Value::List(results.to_vec()?))
        });
        Ok(coerced(run, to_node))
    }
}
