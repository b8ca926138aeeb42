//! Literals, parameters, member reads, method calls and nullable wrappers.

use materia_core::{CoerceError, Ty};
use materia_plan::{Global, Literal, MetaMemberRef, MethodRef, PlanNode, RuntimeError};

use super::compiler::{CompileCtx, Eval, coerced, eval_fn};
use super::error::CompileError;

impl CompileCtx<'_> {
    pub(super) fn literal(&mut self, lit: &Literal) -> Eval {
        self.routine.global(Global::Literal(lit.clone()));
        let lit = lit.clone();
        eval_fn(move |_, _| Ok(lit.to_value()))
    }

    pub(super) fn parameter(&mut self, index: usize) -> Eval {
        eval_fn(move |ctx, _| ctx.argument(index))
    }

    pub(super) fn member(
        &mut self,
        node: &PlanNode,
        expr: &PlanNode,
        member: &MetaMemberRef,
    ) -> Result<Eval, CompileError> {
        let object = self.compile_node(expr)?;
        let to_node = self.coercion(node, member.ty(), node.ty())?;
        self.routine.global(Global::Member(member.clone()));

        let member = member.clone();
        let read = eval_fn(move |ctx, owner| {
            let target = object(ctx, owner)?;
            if target.is_null() {
                return Err(RuntimeError::NullDereference {
                    member: member.id().to_string(),
                });
            }
            Ok(target
                .member(member.name())
                .unwrap_or_else(|| member.ty().default_value()))
        });
        Ok(coerced(read, to_node))
    }

    pub(super) fn method_call(
        &mut self,
        node: &PlanNode,
        object: Option<&PlanNode>,
        method: &MethodRef,
        args: &[PlanNode],
    ) -> Result<Eval, CompileError> {
        if method.params().len() != args.len() {
            return Err(CompileError::translation(
                node,
                format!(
                    "{method:?} takes {} arguments but {} were supplied",
                    method.params().len(),
                    args.len()
                ),
            ));
        }

        let receiver = object.map(|o| self.compile_node(o)).transpose()?;
        let args = args
            .iter()
            .zip(method.params())
            .map(|(arg, param)| self.compile_for_type(arg, param))
            .collect::<Result<Vec<_>, _>>()?;
        let to_node = self.coercion(node, method.returns(), node.ty())?;
        self.routine.global(Global::Method(method.clone()));

        let method = method.clone();
        let call = eval_fn(move |ctx, owner| {
            let this = match &receiver {
                Some(receiver) => {
                    let this = receiver(ctx, owner)?;
                    if this.is_null() {
                        return Err(RuntimeError::NullDereference {
                            member: format!("{method:?}"),
                        });
                    }
                    Some(this)
                }
                None => None,
            };
            let values = args.iter().map(|arg| arg(ctx, owner)).collect::<Result<Vec<_>, _>>()?;
            method
                .invoke(this.as_ref(), &values)
                .map_err(|message| RuntimeError::Method {
                    method: format!("{method:?}"),
                    message,
                })
        });
        Ok(coerced(call, to_node))
    }

    pub(super) fn optional_value(
        &mut self,
        node: &PlanNode,
        has_value: &PlanNode,
        value: &PlanNode,
    ) -> Result<Eval, CompileError> {
        let has_value = self.compile_node(has_value)?;
        let value = self.compile_for_type(value, node.ty())?;
        let ty = node.ty().clone();
        Ok(eval_fn(move |ctx, owner| {
            if has_value(ctx, owner)?.is_null() {
                return Ok(ty.default_value());
            }
            value(ctx, owner)
        }))
    }

    pub(super) fn value_of(&mut self, node: &PlanNode, inner: &PlanNode) -> Result<Eval, CompileError> {
        let operand = self.compile_node(inner)?;
        let unwrap = self.coercion(node, inner.ty().non_nullable(), node.ty())?;
        let ty: Ty = node.ty().clone();
        Ok(eval_fn(move |ctx, owner| {
            let value = operand(ctx, owner)?;
            if value.is_null() {
                return Err(CoerceError::NullAssignment { ty: ty.clone() }.into());
            }
            Ok(unwrap.apply(value)?)
        }))
    }
}
