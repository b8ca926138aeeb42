//! Object construction.
//!
//! `New` runs in two phases. Constructor arguments and primary keys are
//! evaluated first, then entities are resolved against the identity map.
//! When the map returns a different instance the node switches to cached
//! mode: plain members are skipped, side-effecting members are still
//! evaluated so the cursor advances the same way, and nothing is written.

use std::sync::Arc;

use materia_core::{EntitySet, Instance, LazyRef, ObjectRef, SingletonPolicy, Ty, Value, coerce::into_sequence};
use materia_plan::{Global, MetaMemberRef, MetaTypeRef, NewObject, PlanNode, RowContext, RuntimeError, has_side_effect};

use super::compiler::{CompileCtx, Eval, eval_fn};
use super::error::CompileError;
use super::links::{SourceEval, is_link_source};

/// How a member receives its value.
enum Assign {
    /// A link source on a member that is not deferred: nothing is loaded.
    Nothing,
    Value(Eval),
    /// Items are assigned into the member's entity set.
    EntitySet(Eval),
    /// A lazy source is installed when deferred loading is enabled.
    Deferred { source: SourceEval, target: DeferredTarget },
}

enum DeferredTarget {
    EntitySet,
    Lazy { element: Ty, policy: SingletonPolicy },
}

struct MemberStep {
    name: Arc<str>,
    side_effect: bool,
    /// Whether expressions see the instance under construction as owner.
    scoped: bool,
    assign: Assign,
}

impl MemberStep {
    /// Computes the member's new value. `current` is the value already
    /// stored on the instance; `None` leaves the member untouched.
    fn produce(
        &self,
        ctx: &mut dyn RowContext,
        owner: Option<&Value>,
        current: Option<Value>,
    ) -> Result<Option<Value>, RuntimeError> {
        let owner = owner.filter(|_| self.scoped);
        match &self.assign {
            Assign::Nothing => Ok(None),
            Assign::Value(eval) => Ok(Some(eval(ctx, owner)?)),
            Assign::EntitySet(items) => {
                let Some(items) = into_sequence(items(ctx, owner)?)? else {
                    return Ok(None);
                };
                let set = existing_set(current);
                set.assign(&items)?;
                Ok(Some(Value::EntitySet(set)))
            }
            Assign::Deferred { source, target } => {
                if !ctx.can_defer_load() {
                    return Ok(None);
                }
                let Some(seq) = source(ctx, owner)? else {
                    return Ok(None);
                };
                Ok(Some(match target {
                    DeferredTarget::EntitySet => {
                        let set = existing_set(current);
                        set.set_source(seq);
                        Value::EntitySet(set)
                    }
                    DeferredTarget::Lazy { element, policy } => {
                        Value::Lazy(LazyRef::deferred(seq, element.clone(), *policy))
                    }
                }))
            }
        }
    }
}

fn existing_set(current: Option<Value>) -> EntitySet {
    match current {
        Some(Value::EntitySet(set)) => set,
        _ => EntitySet::new(),
    }
}

struct ObjectRoutine {
    meta: MetaTypeRef,
    ctor_args: Vec<(Arc<str>, Eval)>,
    keys: Vec<MemberStep>,
    rest: Vec<MemberStep>,
}

impl ObjectRoutine {
    fn blank(&self) -> Instance {
        let mut instance = Instance::new(self.meta.class().clone());
        for member in self.meta.members() {
            instance.set(member.name().clone(), member.ty().default_value());
        }
        instance
    }

    fn construct(&self, ctx: &mut dyn RowContext) -> Result<Instance, RuntimeError> {
        let mut instance = self.blank();
        for (member, arg) in &self.ctor_args {
            instance.set(member.clone(), arg(ctx, None)?);
        }
        Ok(instance)
    }

    /// Value types: no identity, every member written in place.
    fn run_record(&self, ctx: &mut dyn RowContext) -> Result<Value, RuntimeError> {
        let mut instance = self.construct(ctx)?;
        for step in self.keys.iter().chain(&self.rest) {
            let current = instance.get(&step.name).cloned();
            if let Some(value) = step.produce(ctx, None, current)? {
                instance.set(step.name.clone(), value);
            }
        }
        Ok(Value::Record(Box::new(instance)))
    }

    fn run_object(&self, ctx: &mut dyn RowContext) -> Result<Value, RuntimeError> {
        let fresh = ObjectRef::new(self.construct(ctx)?);
        let this = Value::Object(fresh.clone());
        for step in &self.keys {
            write(step, ctx, &fresh, &this)?;
        }

        let canonical = if self.meta.is_entity() {
            ctx.insert_lookup(&self.meta, fresh.clone())?
        } else {
            fresh.clone()
        };
        let cached = !canonical.ptr_eq(&fresh);
        let this = Value::Object(canonical.clone());

        for step in &self.rest {
            if !cached {
                write(step, ctx, &canonical, &this)?;
            } else if step.side_effect {
                step.produce(ctx, Some(&this), None)?;
            }
        }

        if self.meta.is_entity() && !cached {
            ctx.entity_materialized(&self.meta, &canonical)?;
        }
        Ok(this)
    }
}

fn write(step: &MemberStep, ctx: &mut dyn RowContext, target: &ObjectRef, this: &Value) -> Result<(), RuntimeError> {
    let current = target.get(&step.name);
    if let Some(value) = step.produce(ctx, Some(this), current)? {
        target.set(step.name.clone(), value);
    }
    Ok(())
}

impl CompileCtx<'_> {
    pub(super) fn new_object(&mut self, node: &PlanNode, new: &NewObject) -> Result<Eval, CompileError> {
        let meta = &new.meta;
        if meta.class().is_value_type() && meta.is_entity() {
            return Err(CompileError::translation(
                node,
                format!("value type {} cannot be identity-mapped", meta.name()),
            ));
        }
        self.routine.global(Global::Type(meta.clone()));

        let ctor_args = self.constructor_args(node, new)?;

        let mut members = Vec::with_capacity(new.members.len());
        for assign in &new.members {
            let Some(member) = meta.member(&assign.member) else {
                return Err(CompileError::translation(
                    node,
                    format!("{} has no member '{}'", meta.name(), assign.member),
                ));
            };
            if !member.is_writable() {
                return Err(CompileError::translation(
                    node,
                    format!("member '{}' is read-only", member.id()),
                ));
            }
            members.push((member.clone(), &assign.expr));
        }
        members.sort_by_key(|(member, _)| member.ordinal());

        let mut keys = Vec::new();
        let mut rest = Vec::new();
        for (member, expr) in members {
            let step = self.member_step(&member, expr, meta.is_entity())?;
            if member.is_primary_key() {
                keys.push(step);
            } else {
                rest.push(step);
            }
        }

        let routine = ObjectRoutine {
            meta: meta.clone(),
            ctor_args,
            keys,
            rest,
        };
        if meta.class().is_value_type() {
            Ok(eval_fn(move |ctx, _| routine.run_record(ctx)))
        } else {
            Ok(eval_fn(move |ctx, _| routine.run_object(ctx)))
        }
    }

    fn constructor_args(&mut self, node: &PlanNode, new: &NewObject) -> Result<Vec<(Arc<str>, Eval)>, CompileError> {
        let meta = &new.meta;
        let params = meta.constructor().unwrap_or_default();
        if params.len() != new.args.len() {
            return Err(CompileError::translation(
                node,
                format!(
                    "constructor of {} takes {} arguments but {} were supplied",
                    meta.name(),
                    params.len(),
                    new.args.len()
                ),
            ));
        }

        let mut args = Vec::with_capacity(params.len());
        for (param, arg) in params.iter().zip(&new.args) {
            let Some(member) = meta.member(param) else {
                return Err(CompileError::translation(
                    node,
                    format!("constructor parameter '{param}' matches no member of {}", meta.name()),
                ));
            };
            args.push((member.name().clone(), self.compile_for_type(arg, member.ty())?));
        }
        Ok(args)
    }

    fn member_step(&mut self, member: &MetaMemberRef, expr: &PlanNode, entity: bool) -> Result<MemberStep, CompileError> {
        let side_effect = has_side_effect(expr);
        let deferrable = !self.options.load_options.is_preloaded(member) && is_link_source(expr);

        let assign = match member.ty() {
            _ if deferrable && !member.is_deferred() => Assign::Nothing,
            Ty::EntitySet(_) if deferrable => Assign::Deferred {
                source: self.link_source(expr)?,
                target: DeferredTarget::EntitySet,
            },
            Ty::Lazy(element) if deferrable => Assign::Deferred {
                source: self.link_source(expr)?,
                target: DeferredTarget::Lazy {
                    element: element.as_ref().clone(),
                    policy: self.options.coercion.get_singleton_policy(),
                },
            },
            ty if deferrable => {
                return Err(CompileError::translation(
                    expr,
                    format!(
                        "deferred member '{}' must be an entity set or a lazy reference, found {ty}",
                        member.id()
                    ),
                ));
            }
            Ty::EntitySet(element) => Assign::EntitySet(self.compile_for_type(expr, &Ty::seq(element.as_ref().clone()))?),
            ty => Assign::Value(self.compile_for_type(expr, ty)?),
        };

        Ok(MemberStep {
            name: member.name().clone(),
            side_effect,
            scoped: entity || matches!(assign, Assign::Deferred { .. }),
            assign,
        })
    }
}
