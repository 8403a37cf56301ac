//! Expression tree to Cypher translation.
//!
//! [`ExpressionBuilder`] walks an [`Expr`] against a scope of bound lambda
//! parameters and produces [`Operand`]s: renderable value fragments, or
//! intermediate shapes (entities, complex properties, groups) that only make
//! sense as the target of a further member access or method call.
//!
//! Every constant is bound through the context's parameter table; nothing a
//! caller supplies is ever written into the query text.
//!
//! Members reached through complex properties (`p.HomeAddress.City`) cannot
//! be read directly from the row, so they are realized inside an existential
//! subquery over the reserved-prefix relationships:
//!
//! ```text
//! EXISTS { MATCH (n1)-[:__PROPERTY__HomeAddress__]->(c1) WHERE c1.City = $p1 }
//! ```

use crate::context::{AliasKind, BuildContext};
use crate::expr::{BinaryOp, Expr, Lambda, UnaryOp};
use crate::render::quote_identifier;
use graphmodel_core::naming::property_relationship_type;
use graphmodel_core::{
    EntitySchema, GraphError, GraphResult, GraphValue, PropertyClass, PropertyRole,
    PropertySchema, ScalarKind, SchemaRegistry,
};
use std::sync::Arc;

/// Entity bound to an alias
#[derive(Debug, Clone, PartialEq)]
pub struct EntityOperand {
    pub alias: String,
    pub schema: Arc<EntitySchema>,
    /// Expressions yielding the start and end node ids of a relationship
    pub endpoints: Option<(String, String)>,
}

/// Complex value reached from an alias through reserved-prefix relationships
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexPath {
    pub anchor: String,
    pub hops: Vec<String>,
    pub schema: Arc<EntitySchema>,
    pub collection: bool,
}

impl ComplexPath {
    /// Pattern from the anchor to `target` (`(n1)-[:__PROPERTY__A__]->(c1)`)
    pub fn pattern(&self, target: &str) -> String {
        let mut pattern = format!("({})", self.anchor);
        let last = self.hops.len().saturating_sub(1);
        for (i, hop) in self.hops.iter().enumerate() {
            let node = if i == last {
                format!("({target})")
            } else {
                "()".to_string()
            };
            pattern.push_str(&format!("-[:{}]->{node}", quote_identifier(hop)));
        }
        pattern
    }
}

/// Group produced by `group_by`
#[derive(Debug, Clone, PartialEq)]
pub struct GroupOperand {
    pub alias: String,
    pub key: Box<Operand>,
    /// Binding for the grouped elements, used by aggregate selectors
    pub element: Box<Operand>,
}

/// Result of translating one expression
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value {
        text: String,
        kind: Option<ScalarKind>,
    },
    List {
        text: String,
        element: Option<ScalarKind>,
    },
    Map {
        text: String,
        members: Vec<(String, Operand)>,
    },
    Entity(EntityOperand),
    Complex(ComplexPath),
    /// Simple member of a complex value, realized on demand
    ComplexMember {
        path: ComplexPath,
        storage_name: String,
        kind: Option<ScalarKind>,
        list: bool,
    },
    Group(GroupOperand),
}

impl Operand {
    pub fn value(text: impl Into<String>, kind: Option<ScalarKind>) -> Self {
        Operand::Value {
            text: text.into(),
            kind,
        }
    }

    fn boolean(text: impl Into<String>) -> Self {
        Operand::value(text, Some(ScalarKind::Bool))
    }

    pub fn entity(alias: impl Into<String>, schema: Arc<EntitySchema>) -> Self {
        Operand::Entity(EntityOperand {
            alias: alias.into(),
            schema,
            endpoints: None,
        })
    }

    pub fn relationship(
        alias: impl Into<String>,
        schema: Arc<EntitySchema>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Operand::Entity(EntityOperand {
            alias: alias.into(),
            schema,
            endpoints: Some((start.into(), end.into())),
        })
    }

    pub(crate) fn kind(&self) -> Option<ScalarKind> {
        match self {
            Operand::Value { kind, .. } | Operand::ComplexMember { kind, .. } => *kind,
            _ => None,
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Operand::Value { .. } => "value".to_string(),
            Operand::List { .. } => "list".to_string(),
            Operand::Map { .. } => "object".to_string(),
            Operand::Entity(entity) => format!("entity {}", entity.schema.type_name()),
            Operand::Complex(path) => format!("complex property of type {}", path.schema.type_name()),
            Operand::ComplexMember { storage_name, .. } => format!("complex member {storage_name}"),
            Operand::Group(_) => "group".to_string(),
        }
    }
}

fn unsupported(message: impl Into<String>) -> GraphError {
    GraphError::unsupported(message)
}

fn constant_kind(value: &GraphValue) -> Option<ScalarKind> {
    match value {
        GraphValue::Bool(_) => Some(ScalarKind::Bool),
        GraphValue::Int(_) => Some(ScalarKind::Int),
        GraphValue::Float(_) => Some(ScalarKind::Float),
        GraphValue::String(_) => Some(ScalarKind::String),
        GraphValue::Date(_) => Some(ScalarKind::Date),
        GraphValue::DateTime(_) => Some(ScalarKind::DateTime),
        GraphValue::LocalDateTime(_) => Some(ScalarKind::LocalDateTime),
        GraphValue::Time(_) => Some(ScalarKind::Time),
        GraphValue::Duration(_) => Some(ScalarKind::Duration),
        GraphValue::Point(_) => Some(ScalarKind::Point),
        _ => None,
    }
}

fn is_null_constant(expr: &Expr) -> bool {
    matches!(expr, Expr::Constant(GraphValue::Null))
}

fn duration_unit(method: &str) -> Option<&'static str> {
    Some(match method {
        "addyears" => "years",
        "addmonths" => "months",
        "adddays" => "days",
        "addhours" => "hours",
        "addminutes" => "minutes",
        "addseconds" => "seconds",
        "addmilliseconds" => "milliseconds",
        _ => return None,
    })
}

fn temporal_member(member: &str) -> Option<(&'static str, ScalarKind)> {
    Some(match member.to_ascii_lowercase().as_str() {
        "year" => ("year", ScalarKind::Int),
        "month" => ("month", ScalarKind::Int),
        "day" => ("day", ScalarKind::Int),
        "hour" => ("hour", ScalarKind::Int),
        "minute" => ("minute", ScalarKind::Int),
        "second" => ("second", ScalarKind::Int),
        "millisecond" => ("millisecond", ScalarKind::Int),
        "dayofweek" => ("dayOfWeek", ScalarKind::Int),
        "dayofyear" => ("ordinalDay", ScalarKind::Int),
        _ => return None,
    })
}

/// Translates expressions for one query build
pub struct ExpressionBuilder<'a> {
    registry: &'a SchemaRegistry,
    scope: Vec<(String, Operand)>,
    /// Realized complex members awaiting an EXISTS wrapper
    pending: Vec<PendingMatch>,
}

/// One auxiliary node bound inside an open existential subquery
#[derive(Debug, Clone)]
struct PendingMatch {
    /// Anchor and relationship chain; equal keys reach the same node
    key: String,
    alias: String,
    pattern: String,
}

impl<'a> ExpressionBuilder<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            scope: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Translate a lambda with its first parameter bound to `operand`
    pub fn lambda(
        &mut self,
        lambda: &Lambda,
        operand: Operand,
        ctx: &mut BuildContext,
    ) -> GraphResult<Operand> {
        let result = self.bound_lambda(lambda, operand, ctx);
        if result.is_err() {
            self.pending.clear();
        }
        result
    }

    /// Translate a lambda that must produce a boolean condition
    pub fn predicate(
        &mut self,
        lambda: &Lambda,
        operand: Operand,
        ctx: &mut BuildContext,
    ) -> GraphResult<String> {
        match self.lambda(lambda, operand, ctx)? {
            Operand::Value { text, .. } => Ok(text),
            other => Err(unsupported(format!(
                "{} cannot be used as a condition",
                other.describe()
            ))),
        }
    }

    /// Translate a lambda that must produce a single renderable value
    pub fn scalar(
        &mut self,
        lambda: &Lambda,
        operand: Operand,
        ctx: &mut BuildContext,
    ) -> GraphResult<String> {
        let built = self.lambda(lambda, operand, ctx)?;
        self.text(built, ctx).map(|(text, _)| text)
    }

    /// Translate an expression in the current scope
    pub fn build(&mut self, expr: &Expr, ctx: &mut BuildContext) -> GraphResult<Operand> {
        match expr {
            Expr::Parameter(name) => self.lookup(name),
            Expr::Constant(value) => Ok(match value {
                GraphValue::List(items) => Operand::List {
                    text: ctx.parameter(value.clone()),
                    element: items.first().and_then(constant_kind),
                },
                _ => Operand::value(ctx.parameter(value.clone()), constant_kind(value)),
            }),
            Expr::Member { target, member } => {
                let target = self.build(target, ctx)?;
                self.member(target, member, ctx)
            }
            Expr::Binary { op, left, right } => self.binary(*op, left, right, ctx),
            Expr::Unary { op, operand } => {
                let built = self.build(operand, ctx)?;
                let (text, kind) = self.text(built, ctx)?;
                Ok(match op {
                    UnaryOp::Not => Operand::boolean(format!("NOT ({text})")),
                    UnaryOp::Negate => Operand::value(format!("-{text}"), kind),
                })
            }
            Expr::MethodCall {
                target: Some(target),
                method,
                arguments,
            } => {
                let mark = self.pending.len();
                let target = self.build(target, ctx)?;
                let result = self.method(target, method, arguments, ctx)?;
                if result.kind() == Some(ScalarKind::Bool) {
                    self.close_existential(mark, result)
                } else {
                    Ok(result)
                }
            }
            Expr::MethodCall {
                target: None,
                method,
                arguments,
            } => self.static_method(method, arguments, ctx),
            Expr::Lambda(_) => Err(unsupported(
                "lambda expressions are only supported as method arguments",
            )),
            Expr::Conditional {
                test,
                if_true,
                if_false,
            } => {
                let test = self.build(test, ctx)?;
                let (test, _) = self.text(test, ctx)?;
                let if_true = self.build(if_true, ctx)?;
                let (if_true, true_kind) = self.text(if_true, ctx)?;
                let if_false = self.build(if_false, ctx)?;
                let (if_false, false_kind) = self.text(if_false, ctx)?;
                Ok(Operand::value(
                    format!("CASE WHEN {test} THEN {if_true} ELSE {if_false} END"),
                    true_kind.or(false_kind),
                ))
            }
            Expr::New(members) => {
                let mut built = Vec::with_capacity(members.len());
                let mut entries = Vec::with_capacity(members.len());
                for (name, value) in members {
                    let operand = self.build(value, ctx)?;
                    let operand = match operand {
                        Operand::ComplexMember { .. } => self.realize(operand, ctx),
                        other => other,
                    };
                    let (text, _) = self.text(operand.clone(), ctx)?;
                    entries.push(format!("{}: {text}", quote_identifier(name)));
                    built.push((name.clone(), operand));
                }
                Ok(Operand::Map {
                    text: format!("{{{}}}", entries.join(", ")),
                    members: built,
                })
            }
        }
    }

    fn bound_lambda(
        &mut self,
        lambda: &Lambda,
        operand: Operand,
        ctx: &mut BuildContext,
    ) -> GraphResult<Operand> {
        let parameter = lambda
            .parameter()
            .ok_or_else(|| unsupported("lambda has no parameter"))?;
        self.scope.push((parameter.to_string(), operand));
        let mark = self.pending.len();
        let result = self.build(&lambda.body, ctx);
        self.scope.pop();
        let result = self.realize(result?, ctx);
        self.close_existential(mark, result)
    }

    /// Translate a lambda passed as a method argument
    fn argument_lambda(
        &mut self,
        argument: Option<&Expr>,
        operand: Operand,
        method: &str,
        ctx: &mut BuildContext,
    ) -> GraphResult<Operand> {
        match argument {
            Some(Expr::Lambda(lambda)) => self.bound_lambda(lambda, operand, ctx),
            _ => Err(unsupported(format!("{method} expects a lambda argument"))),
        }
    }

    /// Wrap any complex members realized since `mark` into an EXISTS subquery
    fn close_existential(&mut self, mark: usize, operand: Operand) -> GraphResult<Operand> {
        if self.pending.len() <= mark {
            return Ok(operand);
        }
        let patterns: Vec<String> = self
            .pending
            .drain(mark..)
            .map(|pending| pending.pattern)
            .collect();
        match operand {
            Operand::Value {
                text,
                kind: Some(ScalarKind::Bool),
            } => Ok(Operand::boolean(format!(
                "EXISTS {{ MATCH {} WHERE {text} }}",
                patterns.join(", ")
            ))),
            other => Err(unsupported(format!(
                "members of complex properties can only be used in conditions, not as a {}",
                other.describe()
            ))),
        }
    }

    fn lookup(&self, name: &str) -> GraphResult<Operand> {
        self.scope
            .iter()
            .rev()
            .find(|(bound, _)| bound == name)
            .map(|(_, operand)| operand.clone())
            .ok_or_else(|| unsupported(format!("parameter '{name}' is not bound")))
    }

    /// Read a complex member inside the pending existential subquery
    fn realize(&mut self, operand: Operand, ctx: &mut BuildContext) -> Operand {
        match operand {
            Operand::ComplexMember {
                path,
                storage_name,
                kind,
                list,
            } => {
                let alias = self.pending_alias(&path, ctx);
                let text = format!("{alias}.{}", quote_identifier(&storage_name));
                if list {
                    Operand::List {
                        text,
                        element: kind,
                    }
                } else {
                    Operand::value(text, kind)
                }
            }
            other => other,
        }
    }

    /// Alias of the auxiliary node at the end of `path`. A single-valued
    /// path already bound by an open subquery reuses its alias, since a
    /// MATCH never binds the same relationship twice.
    fn pending_alias(&mut self, path: &ComplexPath, ctx: &mut BuildContext) -> String {
        let key = path.pattern("");
        if let Some(existing) = self.pending.iter().find(|pending| pending.key == key) {
            return existing.alias.clone();
        }
        let alias = ctx.alias(AliasKind::Complex);
        self.pending.push(PendingMatch {
            pattern: path.pattern(&alias),
            alias: alias.clone(),
            key,
        });
        alias
    }

    /// Renderable text of an operand
    fn text(
        &mut self,
        operand: Operand,
        ctx: &mut BuildContext,
    ) -> GraphResult<(String, Option<ScalarKind>)> {
        match self.realize(operand, ctx) {
            Operand::Value { text, kind } => Ok((text, kind)),
            Operand::List { text, .. } | Operand::Map { text, .. } => Ok((text, None)),
            other => Err(unsupported(format!(
                "{} cannot be used as a value",
                other.describe()
            ))),
        }
    }

    fn nested_schema(
        &self,
        owner: &EntitySchema,
        property: &PropertySchema,
    ) -> GraphResult<Arc<EntitySchema>> {
        let nested = property.nested.as_ref().ok_or_else(|| {
            GraphError::configuration(
                owner.type_name(),
                format!("complex property '{}' has no nested schema", property.name),
            )
        })?;
        self.registry.resolve(nested)
    }

    fn find_property<'s>(
        schema: &'s EntitySchema,
        member: &str,
    ) -> GraphResult<&'s PropertySchema> {
        schema
            .property(member)
            .or_else(|| schema.property_by_storage_name(member))
            .ok_or_else(|| {
                unsupported(format!(
                    "unknown member '{member}' on {}",
                    schema.type_name()
                ))
            })
    }

    fn member(
        &mut self,
        target: Operand,
        member: &str,
        ctx: &mut BuildContext,
    ) -> GraphResult<Operand> {
        match target {
            Operand::Entity(entity) => self.entity_member(&entity, member),
            Operand::Complex(path) => self.complex_member(path, member),
            Operand::ComplexMember { .. } => {
                let realized = self.realize(target, ctx);
                self.member(realized, member, ctx)
            }
            Operand::Value { text, kind } => Self::value_member(&text, kind, member),
            Operand::List { text, .. } => match member.to_ascii_lowercase().as_str() {
                "count" | "length" => Ok(Operand::value(format!("size({text})"), Some(ScalarKind::Int))),
                _ => Err(unsupported(format!("unknown member '{member}' on a list"))),
            },
            Operand::Map { members, .. } => members
                .iter()
                .find(|(name, _)| name == member)
                .or_else(|| members.iter().find(|(name, _)| name.eq_ignore_ascii_case(member)))
                .map(|(_, operand)| operand.clone())
                .ok_or_else(|| unsupported(format!("unknown member '{member}' on a projection"))),
            Operand::Group(group) => match member.to_ascii_lowercase().as_str() {
                "key" => Ok(*group.key),
                "count" => self.aggregate(&group, "count", None, ctx),
                _ => Err(unsupported(format!("unknown member '{member}' on a group"))),
            },
        }
    }

    fn entity_member(&self, entity: &EntityOperand, member: &str) -> GraphResult<Operand> {
        let schema = &entity.schema;
        let property = Self::find_property(schema, member)?;

        match (property.role, &entity.endpoints) {
            (PropertyRole::StartNode, Some((start, _))) => {
                return Ok(Operand::value(start.clone(), Some(ScalarKind::String)))
            }
            (PropertyRole::EndNode, Some((_, end))) => {
                return Ok(Operand::value(end.clone(), Some(ScalarKind::String)))
            }
            (PropertyRole::StartNode | PropertyRole::EndNode, None) => {
                return Err(unsupported(format!(
                    "'{member}' is only available on relationships"
                )))
            }
            _ => {}
        }

        let access = format!("{}.{}", entity.alias, quote_identifier(&property.storage_name));
        match property.class {
            PropertyClass::Simple => Ok(Operand::value(access, property.scalar)),
            PropertyClass::SimpleCollection => Ok(Operand::List {
                text: access,
                element: property.scalar,
            }),
            PropertyClass::Complex | PropertyClass::ComplexCollection => {
                Ok(Operand::Complex(ComplexPath {
                    anchor: entity.alias.clone(),
                    hops: vec![property_relationship_type(&property.storage_name)],
                    schema: self.nested_schema(schema, property)?,
                    collection: property.class == PropertyClass::ComplexCollection,
                }))
            }
        }
    }

    fn complex_member(&self, path: ComplexPath, member: &str) -> GraphResult<Operand> {
        if path.collection {
            return Err(unsupported(format!(
                "member '{member}' of a complex collection; use any, all or count"
            )));
        }
        let property = Self::find_property(&path.schema, member)?;
        match property.class {
            PropertyClass::Simple | PropertyClass::SimpleCollection => Ok(Operand::ComplexMember {
                storage_name: property.storage_name.clone(),
                kind: property.scalar,
                list: property.class == PropertyClass::SimpleCollection,
                path,
            }),
            PropertyClass::Complex | PropertyClass::ComplexCollection => {
                let schema = self.nested_schema(&path.schema, property)?;
                let mut hops = path.hops;
                hops.push(property_relationship_type(&property.storage_name));
                Ok(Operand::Complex(ComplexPath {
                    anchor: path.anchor,
                    hops,
                    schema,
                    collection: property.class == PropertyClass::ComplexCollection,
                }))
            }
        }
    }

    fn value_member(text: &str, kind: Option<ScalarKind>, member: &str) -> GraphResult<Operand> {
        if member.eq_ignore_ascii_case("length") && kind.map_or(true, ScalarKind::is_textual) {
            return Ok(Operand::value(format!("size({text})"), Some(ScalarKind::Int)));
        }
        if kind.map_or(true, ScalarKind::is_temporal) {
            if member.eq_ignore_ascii_case("date") {
                return Ok(Operand::value(format!("date({text})"), Some(ScalarKind::Date)));
            }
            if let Some((field, field_kind)) = temporal_member(member) {
                return Ok(Operand::value(format!("{text}.{field}"), Some(field_kind)));
            }
        }
        Err(unsupported(format!("unknown member '{member}' on a value")))
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        ctx: &mut BuildContext,
    ) -> GraphResult<Operand> {
        let mark = self.pending.len();

        if op.is_comparison() && (is_null_constant(left) || is_null_constant(right)) {
            let operand = if is_null_constant(left) { right } else { left };
            let built = self.build(operand, ctx)?;
            let (text, _) = self.text(built, ctx)?;
            let check = match op {
                BinaryOp::Equal => format!("{text} IS NULL"),
                BinaryOp::NotEqual => format!("{text} IS NOT NULL"),
                _ => return Err(unsupported("only equality comparisons with null are supported")),
            };
            return self.close_existential(mark, Operand::boolean(check));
        }

        let left = self.build(left, ctx)?;
        let right = self.build(right, ctx)?;

        if op.is_logical() {
            let left = self.condition(left, ctx)?;
            let right = self.condition(right, ctx)?;
            let token = op.token().unwrap_or("AND");
            return Ok(Operand::boolean(format!("({left} {token} {right})")));
        }

        let (left, left_kind) = self.text(left, ctx)?;
        let (right, right_kind) = self.text(right, ctx)?;
        match op.token() {
            Some(token) if op.is_comparison() => {
                self.close_existential(mark, Operand::boolean(format!("{left} {token} {right}")))
            }
            Some(token) => {
                let kind = match (left_kind, right_kind) {
                    (Some(ScalarKind::Float), _) | (_, Some(ScalarKind::Float)) => {
                        Some(ScalarKind::Float)
                    }
                    (left_kind, right_kind) => left_kind.or(right_kind),
                };
                Ok(Operand::value(format!("({left} {token} {right})"), kind))
            }
            None => Ok(Operand::value(
                format!("coalesce({left}, {right})"),
                left_kind.or(right_kind),
            )),
        }
    }

    fn condition(&mut self, operand: Operand, ctx: &mut BuildContext) -> GraphResult<String> {
        match operand {
            Operand::Value { .. } | Operand::ComplexMember { .. } => {
                self.text(operand, ctx).map(|(text, _)| text)
            }
            other => Err(unsupported(format!(
                "{} cannot be used as a condition",
                other.describe()
            ))),
        }
    }

    fn arguments(
        &mut self,
        arguments: &[Expr],
        expected: std::ops::RangeInclusive<usize>,
        method: &str,
        ctx: &mut BuildContext,
    ) -> GraphResult<Vec<String>> {
        if !expected.contains(&arguments.len()) {
            return Err(unsupported(format!(
                "{method} takes {} to {} arguments, got {}",
                expected.start(),
                expected.end(),
                arguments.len()
            )));
        }
        let mut texts = Vec::with_capacity(arguments.len());
        for argument in arguments {
            let built = self.build(argument, ctx)?;
            texts.push(self.text(built, ctx)?.0);
        }
        Ok(texts)
    }

    fn method(
        &mut self,
        target: Operand,
        method: &str,
        arguments: &[Expr],
        ctx: &mut BuildContext,
    ) -> GraphResult<Operand> {
        match target {
            Operand::Complex(path) => self.complex_collection_method(path, method, arguments, ctx),
            Operand::List { text, element } => {
                self.list_method(&text, element, method, arguments, ctx)
            }
            Operand::Group(group) => {
                let function = match method.to_ascii_lowercase().as_str() {
                    "count" => "count",
                    "sum" => "sum",
                    "average" => "avg",
                    "min" => "min",
                    "max" => "max",
                    _ => return Err(unsupported(format!("unknown group method '{method}'"))),
                };
                self.aggregate(&group, function, arguments.first(), ctx)
            }
            Operand::ComplexMember { .. } => {
                let realized = self.realize(target, ctx);
                self.method(realized, method, arguments, ctx)
            }
            Operand::Value { text, kind } => self.value_method(&text, kind, method, arguments, ctx),
            other => Err(unsupported(format!(
                "method '{method}' is not supported on {}",
                other.describe()
            ))),
        }
    }

    fn complex_collection_method(
        &mut self,
        path: ComplexPath,
        method: &str,
        arguments: &[Expr],
        ctx: &mut BuildContext,
    ) -> GraphResult<Operand> {
        let alias = ctx.alias(AliasKind::Complex);
        let pattern = path.pattern(&alias);
        let item = Operand::entity(alias, Arc::clone(&path.schema));

        match (method.to_ascii_lowercase().as_str(), arguments.len()) {
            ("any", 0) => Ok(Operand::boolean(format!("EXISTS {{ MATCH {pattern} }}"))),
            ("any", _) => {
                let predicate = self.argument_lambda(arguments.first(), item, method, ctx)?;
                let predicate = self.condition(predicate, ctx)?;
                Ok(Operand::boolean(format!(
                    "EXISTS {{ MATCH {pattern} WHERE {predicate} }}"
                )))
            }
            ("all", _) => {
                let predicate = self.argument_lambda(arguments.first(), item, method, ctx)?;
                let predicate = self.condition(predicate, ctx)?;
                Ok(Operand::boolean(format!(
                    "NOT EXISTS {{ MATCH {pattern} WHERE NOT ({predicate}) }}"
                )))
            }
            ("count", 0) => Ok(Operand::value(
                format!("COUNT {{ MATCH {pattern} }}"),
                Some(ScalarKind::Int),
            )),
            _ => Err(unsupported(format!(
                "method '{method}' is not supported on complex property {}",
                path.schema.type_name()
            ))),
        }
    }

    fn list_method(
        &mut self,
        list: &str,
        element: Option<ScalarKind>,
        method: &str,
        arguments: &[Expr],
        ctx: &mut BuildContext,
    ) -> GraphResult<Operand> {
        match (method.to_ascii_lowercase().as_str(), arguments.len()) {
            ("contains", 1) => {
                let value = self.arguments(arguments, 1..=1, method, ctx)?;
                Ok(Operand::boolean(format!("{} IN {list}", value[0])))
            }
            ("any", 0) => Ok(Operand::boolean(format!("size({list}) > 0"))),
            ("count", 0) => Ok(Operand::value(format!("size({list})"), Some(ScalarKind::Int))),
            (name @ ("any" | "all"), _) => {
                let variable = ctx.alias(AliasKind::Variable);
                let item = Operand::value(variable.clone(), element);
                let predicate = self.argument_lambda(arguments.first(), item, method, ctx)?;
                let predicate = self.condition(predicate, ctx)?;
                let function = if name == "any" { "ANY" } else { "ALL" };
                Ok(Operand::boolean(format!(
                    "{function}({variable} IN {list} WHERE {predicate})"
                )))
            }
            _ => Err(unsupported(format!("method '{method}' is not supported on a list"))),
        }
    }

    fn value_method(
        &mut self,
        text: &str,
        kind: Option<ScalarKind>,
        method: &str,
        arguments: &[Expr],
        ctx: &mut BuildContext,
    ) -> GraphResult<Operand> {
        let name = method.to_ascii_lowercase();
        if let Some(unit) = duration_unit(&name) {
            let amount = self.arguments(arguments, 1..=1, method, ctx)?;
            return Ok(Operand::value(
                format!("({text} + duration({{{unit}: {}}}))", amount[0]),
                kind,
            ));
        }
        let string = Some(ScalarKind::String);
        match name.as_str() {
            "contains" => {
                let args = self.arguments(arguments, 1..=1, method, ctx)?;
                Ok(Operand::boolean(format!("{text} CONTAINS {}", args[0])))
            }
            "startswith" => {
                let args = self.arguments(arguments, 1..=1, method, ctx)?;
                Ok(Operand::boolean(format!("{text} STARTS WITH {}", args[0])))
            }
            "endswith" => {
                let args = self.arguments(arguments, 1..=1, method, ctx)?;
                Ok(Operand::boolean(format!("{text} ENDS WITH {}", args[0])))
            }
            "equals" => {
                let args = self.arguments(arguments, 1..=1, method, ctx)?;
                Ok(Operand::boolean(format!("{text} = {}", args[0])))
            }
            "toupper" => {
                self.arguments(arguments, 0..=0, method, ctx)?;
                Ok(Operand::value(format!("toUpper({text})"), string))
            }
            "tolower" => {
                self.arguments(arguments, 0..=0, method, ctx)?;
                Ok(Operand::value(format!("toLower({text})"), string))
            }
            "trim" => {
                self.arguments(arguments, 0..=0, method, ctx)?;
                Ok(Operand::value(format!("trim({text})"), string))
            }
            "substring" => {
                let args = self.arguments(arguments, 1..=2, method, ctx)?;
                Ok(Operand::value(
                    format!("substring({text}, {})", args.join(", ")),
                    string,
                ))
            }
            "replace" => {
                let args = self.arguments(arguments, 2..=2, method, ctx)?;
                Ok(Operand::value(
                    format!("replace({text}, {}, {})", args[0], args[1]),
                    string,
                ))
            }
            _ => Err(unsupported(format!("unknown method '{method}'"))),
        }
    }

    fn static_method(
        &mut self,
        method: &str,
        arguments: &[Expr],
        ctx: &mut BuildContext,
    ) -> GraphResult<Operand> {
        match method.to_ascii_lowercase().as_str() {
            "now" | "utcnow" => {
                self.arguments(arguments, 0..=0, method, ctx)?;
                Ok(Operand::value("datetime()", Some(ScalarKind::DateTime)))
            }
            "today" => {
                self.arguments(arguments, 0..=0, method, ctx)?;
                Ok(Operand::value("date()", Some(ScalarKind::Date)))
            }
            "isnullorempty" => {
                let mark = self.pending.len();
                let value = self.arguments(arguments, 1..=1, method, ctx)?;
                let check = format!("({0} IS NULL OR size({0}) = 0)", value[0]);
                self.close_existential(mark, Operand::boolean(check))
            }
            _ => Err(unsupported(format!("unknown static method '{method}'"))),
        }
    }

    /// Register a group aggregate and return the column it is bound to
    fn aggregate(
        &mut self,
        group: &GroupOperand,
        function: &str,
        selector: Option<&Expr>,
        ctx: &mut BuildContext,
    ) -> GraphResult<Operand> {
        let (argument, kind) = match selector {
            Some(_) => {
                let value = self.argument_lambda(selector, (*group.element).clone(), function, ctx)?;
                self.text(value, ctx)?
            }
            None if function == "count" => match group.element.as_ref() {
                Operand::Entity(entity) => (entity.alias.clone(), None),
                _ => ("*".to_string(), None),
            },
            None => return Err(unsupported(format!("{function} over a group needs a selector"))),
        };
        let expression = format!("{function}({argument})");
        let kind = match function {
            "count" => Some(ScalarKind::Int),
            "avg" => Some(ScalarKind::Float),
            _ => kind,
        };

        let aggregates = &mut ctx.parts_mut().group_aggregates;
        let alias = match aggregates.iter().find(|(_, existing)| *existing == expression) {
            Some((alias, _)) => alias.clone(),
            None => {
                let alias = format!("{}_agg{}", group.alias, aggregates.len() + 1);
                aggregates.push((alias.clone(), expression));
                alias
            }
        };
        Ok(Operand::value(alias, kind))
    }
}
