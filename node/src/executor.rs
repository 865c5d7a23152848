//! # Query Executor
//!
//! Runs one GraphQL request against the [`Schema`]:
//!
//! 1. Parse the document (`graphql-parser`). A parse failure is a single
//!    error with `data: null`.
//! 2. Select the operation by name. Subscriptions are rejected.
//! 3. Validate every selected field, argument name, fragment and variable
//!    reference against the registry. Any failure means `data: null`.
//! 4. Coerce variables (provided value, else default, else absent).
//! 5. Resolve root fields serially in document order through
//!    [`dispatch::resolve`]. A failing field becomes null plus an error with
//!    its path and location; execution moves on to the next field.
//! 6. Project each result through its selection set.
//!
//! Argument values are not type-checked here; the binding rules in dispatch
//! own that.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::http::StatusCode;
use graphql_parser::query::{self as ast, parse_query, Definition, OperationDefinition, Selection, TypeCondition};
use graphql_parser::Pos;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::{debug, instrument, warn};

use bftx_protocol::TransactionLifecycle;

use crate::context::RequestContext;
use crate::dispatch::{self, ResolveError};
use crate::metrics::SharedMetrics;
use crate::schema::introspection;
use crate::schema::{Category, CompositeType, Schema, TypeDef, TypeRef};

type Document = ast::Document<'static, String>;
type Field = ast::Field<'static, String>;
type SelectionSet = ast::SelectionSet<'static, String>;
type AstValue = ast::Value<'static, String>;
type AstType = ast::Type<'static, String>;
type Directive = ast::Directive<'static, String>;
type Fragment = ast::FragmentDefinition<'static, String>;
type Operation = ast::OperationDefinition<'static, String>;
type VariableDefinition = ast::VariableDefinition<'static, String>;

// ---------------------------------------------------------------------------
// Request / Response
// ---------------------------------------------------------------------------

/// Query text, variables and operation name of one request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GraphQLRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub variables: Option<Map<String, Value>>,
    #[serde(default, rename = "operationName")]
    pub operation_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl From<Pos> for Location {
    fn from(pos: Pos) -> Self {
        Self {
            line: pos.line,
            column: pos.column,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorExtensions {
    pub status: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    /// Response keys from the root. Only root fields resolve externally, so
    /// this holds at most one key.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ErrorExtensions>,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: Vec::new(),
            extensions: None,
        }
    }

    fn at(mut self, pos: Pos) -> Self {
        self.locations.push(pos.into());
        self
    }

    fn from_resolve(err: &ResolveError, pos: Pos, key: &str) -> Self {
        Self {
            message: err.to_string(),
            locations: vec![pos.into()],
            path: vec![key.to_string()],
            extensions: err.status().map(|s| ErrorExtensions {
                status: s.as_u16(),
            }),
        }
    }

    /// The transport status this error carries, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.extensions
            .as_ref()
            .and_then(|ext| StatusCode::from_u16(ext.status).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQLResponse {
    pub data: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
}

impl GraphQLResponse {
    fn request_errors(errors: Vec<GraphQLError>) -> Self {
        Self {
            data: Value::Null,
            errors,
        }
    }

    fn request_error(message: impl Into<String>) -> Self {
        Self::request_errors(vec![GraphQLError::new(message)])
    }

    /// 200 without errors; otherwise the first error's status, falling back
    /// to 500 when it has none.
    pub fn status(&self) -> StatusCode {
        match self.errors.first() {
            None => StatusCode::OK,
            Some(err) => err.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct Executor {
    schema: Arc<Schema>,
    lifecycle: Arc<dyn TransactionLifecycle>,
    metrics: Option<SharedMetrics>,
}

impl Executor {
    pub fn new(schema: Arc<Schema>, lifecycle: Arc<dyn TransactionLifecycle>) -> Self {
        Self {
            schema,
            lifecycle,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[instrument(
        skip_all,
        fields(
            request_id = %ctx.request_id,
            viewer = ?ctx.viewer,
            method = ?ctx.request.as_ref().map(|r| &r.method),
            uri = ?ctx.request.as_ref().map(|r| &r.uri),
        )
    )]
    pub async fn execute(&self, request: &GraphQLRequest, ctx: &RequestContext) -> GraphQLResponse {
        let document: Document = match parse_query::<String>(&request.query) {
            Ok(doc) => doc.into_static(),
            Err(e) => {
                debug!(error = %e, "query parse failed");
                return GraphQLResponse::request_error(e.to_string());
            }
        };

        let mut operations = Vec::new();
        let mut fragments = HashMap::new();
        for definition in &document.definitions {
            match definition {
                Definition::Operation(op) => operations.push(op),
                Definition::Fragment(fragment) => {
                    fragments.insert(fragment.name.as_str(), fragment);
                }
            }
        }

        let operation = match select_operation(&operations, request.operation_name.as_deref()) {
            Ok(op) => op,
            Err(message) => return GraphQLResponse::request_error(message),
        };

        let no_variables = Vec::new();
        let (category, variable_definitions, selection_set) = match operation {
            OperationDefinition::SelectionSet(set) => (Category::Query, &no_variables, set),
            OperationDefinition::Query(q) => {
                (Category::Query, &q.variable_definitions, &q.selection_set)
            }
            OperationDefinition::Mutation(m) => {
                (Category::Mutation, &m.variable_definitions, &m.selection_set)
            }
            OperationDefinition::Subscription(_) => {
                return GraphQLResponse::request_error(
                    "Schema is not configured for subscriptions.",
                )
            }
        };

        let mut validator = Validator {
            schema: &self.schema,
            fragments: &fragments,
            declared: variable_definitions.iter().map(|d| d.name.as_str()).collect(),
            spreading: Vec::new(),
            errors: Vec::new(),
        };
        validator.variable_types(variable_definitions);
        validator.selection_set(selection_set, Parent::Root(category));
        if validator.errors.is_empty() {
            validator.overlaps(&[selection_set]);
        }
        if !validator.errors.is_empty() {
            debug!(errors = validator.errors.len(), "query failed validation");
            return GraphQLResponse::request_errors(validator.errors);
        }

        let variables = match coerce_variables(variable_definitions, request.variables.as_ref()) {
            Ok(vars) => vars,
            Err(errors) => return GraphQLResponse::request_errors(errors),
        };

        let run = Run {
            schema: &self.schema,
            fragments: &fragments,
            variables,
        };
        let mut data = Map::new();
        let mut errors = Vec::new();

        for (key, group) in run.collect_fields(&[selection_set], Some(category.type_name())) {
            let field = group[0];
            let value = match field.name.as_str() {
                "__typename" => Value::String(category.type_name().to_string()),
                "__schema" => run.complete(introspection::schema_value(&self.schema), None, &group),
                "__type" => {
                    let name = run.arguments(&field.arguments);
                    let name = name.get("name").and_then(Value::as_str).unwrap_or_default();
                    run.complete(introspection::type_value(&self.schema, name), None, &group)
                }
                name => {
                    let Some(op) = self.schema.operation(category, name) else {
                        continue;
                    };
                    let args = run.arguments(&field.arguments);
                    debug!(operation = %op.name, "resolving");
                    match dispatch::resolve(op, &args, self.lifecycle.as_ref()).await {
                        Ok(Some(value)) => {
                            self.observe(&op.name, "ok");
                            run.complete(value, Some(op.result.base_name()), &group)
                        }
                        Ok(None) => {
                            self.observe(&op.name, "silent");
                            Value::Null
                        }
                        Err(err) => {
                            self.observe(&op.name, "error");
                            warn!(operation = %op.name, error = %err, "operation failed");
                            errors.push(GraphQLError::from_resolve(&err, field.position, &key));
                            Value::Null
                        }
                    }
                }
            };
            data.insert(key, value);
        }

        GraphQLResponse {
            data: Value::Object(data),
            errors,
        }
    }

    fn observe(&self, operation: &str, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.observe_operation(operation, outcome);
        }
    }
}

fn operation_name(op: &Operation) -> Option<&str> {
    match op {
        OperationDefinition::SelectionSet(_) => None,
        OperationDefinition::Query(q) => q.name.as_deref(),
        OperationDefinition::Mutation(m) => m.name.as_deref(),
        OperationDefinition::Subscription(s) => s.name.as_deref(),
    }
}

fn select_operation<'a>(
    operations: &[&'a Operation],
    requested: Option<&str>,
) -> Result<&'a Operation, String> {
    match requested.filter(|name| !name.is_empty()) {
        Some(name) => operations
            .iter()
            .find(|op| operation_name(op) == Some(name))
            .copied()
            .ok_or_else(|| format!("Unknown operation named \"{name}\".")),
        None => match operations {
            [] => Err("Must provide an operation.".to_string()),
            [only] => Ok(*only),
            _ => Err("Must provide operation name if query contains multiple operations.".to_string()),
        },
    }
}

fn describe_type(ty: &AstType) -> String {
    match ty {
        ast::Type::NamedType(name) => name.clone(),
        ast::Type::ListType(inner) => format!("[{}]", describe_type(inner)),
        ast::Type::NonNullType(inner) => format!("{}!", describe_type(inner)),
    }
}

fn base_type(ty: &AstType) -> &str {
    match ty {
        ast::Type::NamedType(name) => name,
        ast::Type::ListType(inner) | ast::Type::NonNullType(inner) => base_type(inner),
    }
}

/// Argument lists are equal regardless of order.
fn same_arguments(a: &[(String, AstValue)], b: &[(String, AstValue)]) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(name, value)| b.iter().any(|(n, v)| n == name && v == value))
}

/// Converts a literal with no variable references.
fn const_value(value: &AstValue) -> Value {
    literal(value, &|_| None).unwrap_or(Value::Null)
}

/// Converts an AST value to JSON. A variable with no value makes the
/// enclosing argument or object field absent.
fn literal(value: &AstValue, lookup: &dyn Fn(&str) -> Option<Value>) -> Option<Value> {
    Some(match value {
        ast::Value::Variable(name) => return lookup(name),
        ast::Value::Int(n) => n.as_i64().map(Value::from).unwrap_or(Value::Null),
        ast::Value::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        ast::Value::String(s) => Value::String(s.clone()),
        ast::Value::Boolean(b) => Value::Bool(*b),
        ast::Value::Null => Value::Null,
        ast::Value::Enum(e) => Value::String(e.clone()),
        ast::Value::List(items) => Value::Array(
            items
                .iter()
                .map(|item| literal(item, lookup).unwrap_or(Value::Null))
                .collect(),
        ),
        ast::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .filter_map(|(k, v)| literal(v, lookup).map(|v| (k.clone(), v)))
                .collect(),
        ),
    })
}

fn coerce_variables(
    definitions: &[VariableDefinition],
    provided: Option<&Map<String, Value>>,
) -> Result<HashMap<String, Value>, Vec<GraphQLError>> {
    let mut values = HashMap::new();
    let mut errors = Vec::new();

    for def in definitions {
        let non_null = matches!(def.var_type, ast::Type::NonNullType(_));
        match provided.and_then(|vars| vars.get(&def.name)) {
            Some(Value::Null) if non_null => errors.push(
                GraphQLError::new(format!(
                    "Variable \"${}\" of non-null type \"{}\" must not be null.",
                    def.name,
                    describe_type(&def.var_type)
                ))
                .at(def.position),
            ),
            Some(value) => {
                values.insert(def.name.clone(), value.clone());
            }
            None => match &def.default_value {
                Some(default) => {
                    values.insert(def.name.clone(), const_value(default));
                }
                None if non_null => errors.push(
                    GraphQLError::new(format!(
                        "Variable \"${}\" of required type \"{}\" was not provided.",
                        def.name,
                        describe_type(&def.var_type)
                    ))
                    .at(def.position),
                ),
                None => {}
            },
        }
    }

    if errors.is_empty() {
        Ok(values)
    } else {
        Err(errors)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Parent<'s> {
    Root(Category),
    Object(&'s CompositeType),
    /// Introspection output; not validated below this point.
    Unchecked,
}

impl Parent<'_> {
    fn type_name(&self) -> Option<&str> {
        match self {
            Parent::Root(category) => Some(category.type_name()),
            Parent::Object(t) => Some(t.name.as_str()),
            Parent::Unchecked => None,
        }
    }
}

struct Validator<'a> {
    schema: &'a Schema,
    fragments: &'a HashMap<&'a str, &'a Fragment>,
    declared: HashSet<&'a str>,
    spreading: Vec<&'a str>,
    errors: Vec<GraphQLError>,
}

impl<'a> Validator<'a> {
    fn error(&mut self, message: String, pos: Pos) {
        self.errors.push(GraphQLError::new(message).at(pos));
    }

    fn variable_types(&mut self, definitions: &'a [VariableDefinition]) {
        for def in definitions {
            let base = base_type(&def.var_type);
            match self.schema.types().get(base) {
                None => self.error(format!("Unknown type \"{base}\"."), def.position),
                Some(t) if !t.is_input() => self.error(
                    format!(
                        "Variable \"${}\" cannot be non-input type \"{}\".",
                        def.name,
                        describe_type(&def.var_type)
                    ),
                    def.position,
                ),
                Some(_) => {}
            }
        }
    }

    fn value(&mut self, value: &AstValue, pos: Pos) {
        match value {
            ast::Value::Variable(name) if !self.declared.contains(name.as_str()) => {
                self.error(format!("Variable \"${name}\" is not defined."), pos)
            }
            ast::Value::List(items) => items.iter().for_each(|v| self.value(v, pos)),
            ast::Value::Object(fields) => fields.values().for_each(|v| self.value(v, pos)),
            _ => {}
        }
    }

    fn directives(&mut self, directives: &[Directive]) {
        for directive in directives {
            for (_, value) in &directive.arguments {
                self.value(value, directive.position);
            }
        }
    }

    fn type_condition(
        &mut self,
        condition: &TypeCondition<'static, String>,
        parent: Parent<'a>,
        pos: Pos,
    ) {
        let TypeCondition::On(name) = condition;
        if matches!(parent, Parent::Unchecked) {
            return;
        }
        let known = matches!(name.as_str(), "Query" | "Mutation")
            || self.schema.types().get(name).is_some();
        if !known {
            self.error(format!("Unknown type \"{name}\"."), pos);
            return;
        }
        if let Some(parent_name) = parent.type_name() {
            if parent_name != name {
                self.error(
                    format!(
                        "Fragment cannot be spread here as objects of type \"{parent_name}\" can never be of type \"{name}\"."
                    ),
                    pos,
                );
            }
        }
    }

    fn selection_set(&mut self, set: &'a SelectionSet, parent: Parent<'a>) {
        for selection in &set.items {
            match selection {
                Selection::Field(field) => self.field(field, parent),
                Selection::FragmentSpread(spread) => {
                    self.directives(&spread.directives);
                    let name = spread.fragment_name.as_str();
                    let Some(fragment) = self.fragments.get(name).copied() else {
                        self.error(format!("Unknown fragment \"{name}\"."), spread.position);
                        continue;
                    };
                    if self.spreading.contains(&name) {
                        self.error(
                            format!("Cannot spread fragment \"{name}\" within itself."),
                            spread.position,
                        );
                        continue;
                    }
                    self.type_condition(&fragment.type_condition, parent, spread.position);
                    self.directives(&fragment.directives);
                    self.spreading.push(name);
                    self.selection_set(&fragment.selection_set, parent);
                    self.spreading.pop();
                }
                Selection::InlineFragment(inline) => {
                    self.directives(&inline.directives);
                    if let Some(condition) = &inline.type_condition {
                        self.type_condition(condition, parent, inline.position);
                    }
                    self.selection_set(&inline.selection_set, parent);
                }
            }
        }
    }

    fn field(&mut self, field: &'a Field, parent: Parent<'a>) {
        self.directives(&field.directives);
        for (_, value) in &field.arguments {
            self.value(value, field.position);
        }

        if field.name == "__typename" {
            return;
        }

        let declared_type = match parent {
            Parent::Unchecked => {
                self.selection_set(&field.selection_set, Parent::Unchecked);
                return;
            }
            Parent::Root(category) => {
                if category == Category::Query && matches!(field.name.as_str(), "__schema" | "__type") {
                    self.selection_set(&field.selection_set, Parent::Unchecked);
                    return;
                }
                let Some(op) = self.schema.operation(category, &field.name) else {
                    self.error(
                        format!(
                            "Cannot query field \"{}\" on type \"{}\".",
                            field.name,
                            category.type_name()
                        ),
                        field.position,
                    );
                    return;
                };
                for (arg, _) in &field.arguments {
                    if op.argument(arg).is_none() {
                        self.error(
                            format!(
                                "Unknown argument \"{arg}\" on field \"{}\" of type \"{}\".",
                                field.name,
                                category.type_name()
                            ),
                            field.position,
                        );
                    }
                }
                &op.result
            }
            Parent::Object(object) => {
                let Some(def) = object.field(&field.name) else {
                    self.error(
                        format!(
                            "Cannot query field \"{}\" on type \"{}\".",
                            field.name, object.name
                        ),
                        field.position,
                    );
                    return;
                };
                for (arg, _) in &field.arguments {
                    self.error(
                        format!(
                            "Unknown argument \"{arg}\" on field \"{}\" of type \"{}\".",
                            field.name, object.name
                        ),
                        field.position,
                    );
                }
                &def.ty
            }
        };
        self.subfields(field, declared_type);
    }

    /// Fields sharing a response key must name the same field with the same
    /// arguments. Their merged subselections are held to the same rule.
    ///
    /// Only called on documents that passed the other checks, so fragment
    /// spreads here are known to be acyclic.
    fn overlaps(&mut self, sets: &[&'a SelectionSet]) {
        let mut grouped: Vec<(&'a str, Vec<&'a Field>)> = Vec::new();
        let mut visited = HashSet::new();
        for set in sets {
            self.gather(set, &mut grouped, &mut visited);
        }

        for (key, fields) in grouped {
            let first = fields[0];
            let conflict = fields[1..].iter().find_map(|other| {
                if other.name != first.name {
                    Some((
                        *other,
                        format!("{} and {} are different fields", first.name, other.name),
                    ))
                } else if !same_arguments(&first.arguments, &other.arguments) {
                    Some((*other, "they have differing arguments".to_string()))
                } else {
                    None
                }
            });
            match conflict {
                Some((other, reason)) => self.errors.push(
                    GraphQLError::new(format!(
                        "Fields \"{key}\" conflict because {reason}. Use different aliases on the fields to fetch both if this was intentional."
                    ))
                    .at(first.position)
                    .at(other.position),
                ),
                None => {
                    let children: Vec<&'a SelectionSet> =
                        fields.iter().map(|f| &f.selection_set).collect();
                    self.overlaps(&children);
                }
            }
        }
    }

    /// Groups the fields of `set` by response key, looking through fragments
    /// and ignoring directives.
    fn gather(
        &self,
        set: &'a SelectionSet,
        grouped: &mut Vec<(&'a str, Vec<&'a Field>)>,
        visited: &mut HashSet<&'a str>,
    ) {
        for selection in &set.items {
            match selection {
                Selection::Field(field) => {
                    let key = field.alias.as_deref().unwrap_or(field.name.as_str());
                    match grouped.iter_mut().find(|(k, _)| *k == key) {
                        Some((_, fields)) => fields.push(field),
                        None => grouped.push((key, vec![field])),
                    }
                }
                Selection::FragmentSpread(spread) => {
                    let name = spread.fragment_name.as_str();
                    if !visited.insert(name) {
                        continue;
                    }
                    if let Some(fragment) = self.fragments.get(name).copied() {
                        self.gather(&fragment.selection_set, grouped, visited);
                    }
                }
                Selection::InlineFragment(inline) => {
                    self.gather(&inline.selection_set, grouped, visited)
                }
            }
        }
    }

    fn subfields(&mut self, field: &'a Field, ty: &'a TypeRef) {
        let has_selection = !field.selection_set.items.is_empty();
        match self.schema.types().get(ty.base_name()) {
            Some(TypeDef::Object(object)) => {
                if has_selection {
                    self.selection_set(&field.selection_set, Parent::Object(object));
                } else {
                    self.error(
                        format!(
                            "Field \"{name}\" of type \"{ty}\" must have a selection of subfields. Did you mean \"{name} {{ ... }}\"?",
                            name = field.name
                        ),
                        field.position,
                    );
                }
            }
            _ if has_selection => self.error(
                format!(
                    "Field \"{}\" must not have a selection since type \"{ty}\" has no subfields.",
                    field.name
                ),
                field.position,
            ),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

struct Run<'a> {
    schema: &'a Schema,
    fragments: &'a HashMap<&'a str, &'a Fragment>,
    variables: HashMap<String, Value>,
}

impl<'a> Run<'a> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.variables.get(name).cloned()
    }

    fn arguments(&self, arguments: &[(String, AstValue)]) -> Map<String, Value> {
        arguments
            .iter()
            .filter_map(|(name, value)| {
                literal(value, &|var| self.lookup(var)).map(|v| (name.clone(), v))
            })
            .collect()
    }

    /// `@skip(if:)` / `@include(if:)`.
    fn included(&self, directives: &[Directive]) -> bool {
        for directive in directives {
            let condition = directive
                .arguments
                .iter()
                .find(|(name, _)| name == "if")
                .and_then(|(_, value)| literal(value, &|var| self.lookup(var)))
                .and_then(|v| v.as_bool());
            match (directive.name.as_str(), condition) {
                ("skip", Some(true)) | ("include", Some(false)) => return false,
                _ => {}
            }
        }
        true
    }

    /// Collects the fields selected across `sets`, grouped by response key
    /// in first-seen order.
    fn collect_fields(
        &self,
        sets: &[&'a SelectionSet],
        type_name: Option<&str>,
    ) -> Vec<(String, Vec<&'a Field>)> {
        let mut grouped: Vec<(String, Vec<&'a Field>)> = Vec::new();
        let mut visited = HashSet::new();
        for set in sets {
            self.collect_into(set, type_name, &mut grouped, &mut visited);
        }
        grouped
    }

    fn collect_into(
        &self,
        set: &'a SelectionSet,
        type_name: Option<&str>,
        grouped: &mut Vec<(String, Vec<&'a Field>)>,
        visited: &mut HashSet<&'a str>,
    ) {
        let applies = |condition: &TypeCondition<'static, String>| {
            let TypeCondition::On(name) = condition;
            type_name.map_or(true, |t| t == name)
        };

        for selection in &set.items {
            match selection {
                Selection::Field(field) => {
                    if !self.included(&field.directives) {
                        continue;
                    }
                    let key = field.alias.as_ref().unwrap_or(&field.name);
                    match grouped.iter_mut().find(|(k, _)| k == key) {
                        Some((_, fields)) => fields.push(field),
                        None => grouped.push((key.clone(), vec![field])),
                    }
                }
                Selection::FragmentSpread(spread) => {
                    if !self.included(&spread.directives)
                        || !visited.insert(spread.fragment_name.as_str())
                    {
                        continue;
                    }
                    if let Some(fragment) = self.fragments.get(spread.fragment_name.as_str()) {
                        if applies(&fragment.type_condition) {
                            self.collect_into(&fragment.selection_set, type_name, grouped, visited);
                        }
                    }
                }
                Selection::InlineFragment(inline) => {
                    if !self.included(&inline.directives) {
                        continue;
                    }
                    if inline.type_condition.as_ref().map_or(true, applies) {
                        self.collect_into(&inline.selection_set, type_name, grouped, visited);
                    }
                }
            }
        }
    }

    /// Projects `value` through the merged selection sets of `fields`.
    fn complete(&self, value: Value, type_name: Option<&str>, fields: &[&'a Field]) -> Value {
        match value {
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.complete(item, type_name, fields))
                    .collect(),
            ),
            Value::Object(source) => {
                let sets: Vec<&'a SelectionSet> = fields.iter().map(|f| &f.selection_set).collect();
                let object = type_name.and_then(|name| self.schema.types().object(name));
                let mut out = Map::new();
                for (key, group) in self.collect_fields(&sets, type_name) {
                    let field = group[0];
                    let projected = if field.name == "__typename" {
                        type_name.map_or(Value::Null, |t| Value::String(t.to_string()))
                    } else {
                        let child = source.get(&field.name).cloned().unwrap_or(Value::Null);
                        let child_type = object
                            .and_then(|o| o.field(&field.name))
                            .map(|def| def.ty.base_name());
                        self.complete(child, child_type, &group)
                    };
                    out.insert(key, projected);
                }
                Value::Object(out)
            }
            scalar => scalar,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubLifecycle;
    use bftx_protocol::transaction::{Properties, Transaction};
    use bftx_protocol::LifecycleError;
    use serde_json::json;

    fn executor(stub: StubLifecycle) -> Executor {
        Executor::new(Arc::new(Schema::build().unwrap()), Arc::new(stub))
    }

    fn stored(id: &str) -> Transaction {
        Transaction {
            id: id.into(),
            tx_type: "BFTX".into(),
            properties: Properties {
                shipper: "ACME".into(),
                gross_weight: 10,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn run(exec: &Executor, query: &str) -> GraphQLResponse {
        run_with(exec, query, None, None).await
    }

    async fn run_with(
        exec: &Executor,
        query: &str,
        variables: Option<Value>,
        operation_name: Option<&str>,
    ) -> GraphQLResponse {
        let request = GraphQLRequest {
            query: query.into(),
            variables: variables.and_then(|v| v.as_object().cloned()),
            operation_name: operation_name.map(str::to_string),
        };
        exec.execute(&request, &RequestContext::empty()).await
    }

    fn messages(resp: &GraphQLResponse) -> Vec<&str> {
        resp.errors.iter().map(|e| e.message.as_str()).collect()
    }

    // -- parsing and operation selection ----------------------------------

    #[tokio::test]
    async fn parse_error_yields_null_data() {
        let resp = run(&executor(StubLifecycle::default()), "{ getInfo {").await;
        assert_eq!(resp.data, Value::Null);
        assert_eq!(resp.errors.len(), 1);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn operation_selection() {
        let exec = executor(StubLifecycle::default());
        let doc = "query A { getTotal } query B { getInfo { Data } }";

        let resp = run(&exec, doc).await;
        assert_eq!(
            messages(&resp),
            ["Must provide operation name if query contains multiple operations."]
        );

        let resp = run_with(&exec, doc, None, Some("C")).await;
        assert_eq!(messages(&resp), ["Unknown operation named \"C\"."]);

        let resp = run_with(&exec, doc, None, Some("B")).await;
        assert_eq!(resp.data, json!({ "getInfo": { "Data": "bftx" } }));
    }

    #[tokio::test]
    async fn subscriptions_are_rejected() {
        let resp = run(&executor(StubLifecycle::default()), "subscription { getTotal }").await;
        assert_eq!(messages(&resp), ["Schema is not configured for subscriptions."]);
        assert_eq!(resp.data, Value::Null);
    }

    // -- validation ---------------------------------------------------------

    #[tokio::test]
    async fn unknown_root_field() {
        let stub = StubLifecycle::default();
        let exec = executor(stub);
        let resp = run(&exec, "{ getTotal nope }").await;
        assert_eq!(resp.data, Value::Null);
        assert_eq!(messages(&resp), ["Cannot query field \"nope\" on type \"Query\"."]);
        assert_eq!(resp.errors[0].locations, vec![Location { line: 1, column: 12 }]);
    }

    #[tokio::test]
    async fn mutation_is_not_a_query_field() {
        let resp = run(&executor(StubLifecycle::default()), "{ signBFTX(Id: \"a\") { Id } }").await;
        assert_eq!(messages(&resp), ["Cannot query field \"signBFTX\" on type \"Query\"."]);
    }

    #[tokio::test]
    async fn unknown_argument() {
        let resp = run(
            &executor(StubLifecycle::default()),
            "{ getTransaction(id: \"a\") { Id } }",
        )
        .await;
        assert_eq!(
            messages(&resp),
            ["Unknown argument \"id\" on field \"getTransaction\" of type \"Query\"."]
        );
    }

    #[tokio::test]
    async fn object_result_needs_selection_and_scalar_forbids_it() {
        let exec = executor(StubLifecycle::default());
        let resp = run(&exec, "{ getInfo }").await;
        assert!(messages(&resp)[0].starts_with("Field \"getInfo\" of type \"Info\" must have a selection"));

        let resp = run(&exec, "{ getTotal { x } }").await;
        assert_eq!(
            messages(&resp),
            ["Field \"getTotal\" must not have a selection since type \"String\" has no subfields."]
        );
    }

    #[tokio::test]
    async fn unknown_subfield() {
        let resp = run(
            &executor(StubLifecycle::default()),
            "{ getInfo { Data Height } }",
        )
        .await;
        assert_eq!(messages(&resp), ["Cannot query field \"Height\" on type \"Info\"."]);
    }

    #[tokio::test]
    async fn undefined_variable_and_fragment() {
        let exec = executor(StubLifecycle::default());
        let resp = run(&exec, "{ getTransaction(Id: $id) { Id } }").await;
        assert_eq!(messages(&resp), ["Variable \"$id\" is not defined."]);

        let resp = run(&exec, "{ getInfo { ...Missing } }").await;
        assert_eq!(messages(&resp), ["Unknown fragment \"Missing\"."]);
    }

    #[tokio::test]
    async fn fragment_on_wrong_type() {
        let resp = run(
            &executor(StubLifecycle::default()),
            "{ getInfo { ...F } } fragment F on Transaction { Id }",
        )
        .await;
        assert_eq!(resp.errors.len(), 2);
        assert!(resp.errors[0].message.contains("can never be of type \"Transaction\""));
    }

    #[tokio::test]
    async fn conflicting_fields_under_one_key_are_rejected() {
        let exec = executor(StubLifecycle::default());
        let resp = run(&exec, r#"{ a: getTransaction(Id: "X") { Id } a: getTotal }"#).await;
        assert_eq!(resp.data, Value::Null);
        assert_eq!(
            messages(&resp),
            ["Fields \"a\" conflict because getTransaction and getTotal are different fields. Use different aliases on the fields to fetch both if this was intentional."]
        );
        assert_eq!(
            resp.errors[0].locations,
            vec![Location { line: 1, column: 3 }, Location { line: 1, column: 37 }]
        );
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let resp = run(
            &exec,
            r#"mutation { a: signBFTX(Id: "1") { Id } a: signBFTX(Id: "2") { Id } }"#,
        )
        .await;
        assert_eq!(resp.data, Value::Null);
        assert!(messages(&resp)[0].starts_with("Fields \"a\" conflict because they have differing arguments."));
    }

    #[tokio::test]
    async fn conflicts_are_found_through_fragments_and_subselections() {
        let exec = executor(StubLifecycle::default());
        let resp = run(
            &exec,
            r#"{ getInfo { ...F } getInfo { Data: Version } } fragment F on Info { Data }"#,
        )
        .await;
        assert_eq!(
            messages(&resp),
            ["Fields \"Data\" conflict because Data and Version are different fields. Use different aliases on the fields to fetch both if this was intentional."]
        );
    }

    #[tokio::test]
    async fn identical_fields_under_one_key_merge() {
        let exec = executor(StubLifecycle::default().with_transaction(stored("abc")));
        let resp = run(
            &exec,
            r#"{ t: getTransaction(Id: "abc") { Id } t: getTransaction(Id: "abc") { Type } }"#,
        )
        .await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);
        assert_eq!(resp.data, json!({ "t": { "Id": "abc", "Type": "BFTX" } }));
    }

    // -- variables ----------------------------------------------------------

    #[tokio::test]
    async fn variables_defaults_and_required() {
        let exec = executor(StubLifecycle::default().with_transaction(stored("abc")));

        let resp = run_with(
            &exec,
            "query Q($id: String) { getTransaction(Id: $id) { Id } }",
            Some(json!({ "id": "abc" })),
            None,
        )
        .await;
        assert_eq!(resp.data, json!({ "getTransaction": { "Id": "abc" } }));

        let resp = run(
            &exec,
            "query Q($id: String = \"abc\") { getTransaction(Id: $id) { Id } }",
        )
        .await;
        assert_eq!(resp.data, json!({ "getTransaction": { "Id": "abc" } }));

        let resp = run(&exec, "query Q($id: String!) { getTransaction(Id: $id) { Id } }").await;
        assert_eq!(
            messages(&resp),
            ["Variable \"$id\" of required type \"String!\" was not provided."]
        );
        assert_eq!(resp.data, Value::Null);
    }

    #[tokio::test]
    async fn variable_of_output_type_is_rejected() {
        let resp = run(
            &executor(StubLifecycle::default()),
            "query Q($t: Transaction) { getTotal }",
        )
        .await;
        assert_eq!(
            messages(&resp),
            ["Variable \"$t\" cannot be non-input type \"Transaction\"."]
        );
    }

    #[tokio::test]
    async fn unprovided_variable_leaves_argument_absent() {
        let resp = run(
            &executor(StubLifecycle::default()),
            "query Q($id: String) { getTransaction(Id: $id) { Id } }",
        )
        .await;
        assert_eq!(messages(&resp), ["400"]);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    // -- execution ----------------------------------------------------------

    #[tokio::test]
    async fn projection_follows_selection_with_aliases_and_typename() {
        let exec = executor(StubLifecycle::default().with_transaction(stored("abc")));
        let resp = run(
            &exec,
            r#"{ tx: getTransaction(Id: "abc") { __typename Id Properties { Shipper weight: GrossWeight } } }"#,
        )
        .await;
        assert!(resp.errors.is_empty());
        assert_eq!(
            resp.data,
            json!({ "tx": { "__typename": "Transaction", "Id": "abc",
                            "Properties": { "Shipper": "ACME", "weight": 10 } } })
        );
        let keys: Vec<_> = resp.data["tx"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["__typename", "Id", "Properties"]);
    }

    #[tokio::test]
    async fn list_results_are_projected_per_item() {
        let exec = executor(
            StubLifecycle::default()
                .with_transaction(stored("ab1"))
                .with_transaction(stored("ab2"))
                .with_transaction(stored("zz")),
        );
        let resp = run(&exec, r#"{ queryTransaction(Id: "ab") { Id } }"#).await;
        assert_eq!(
            resp.data,
            json!({ "queryTransaction": [{ "Id": "ab1" }, { "Id": "ab2" }] })
        );
    }

    #[tokio::test]
    async fn fragments_and_directives() {
        let exec = executor(StubLifecycle::default().with_transaction(stored("abc")));
        let resp = run_with(
            &exec,
            r#"query Q($full: Boolean!) {
                getTransaction(Id: "abc") {
                    ...Core
                    ... on Transaction { Type }
                    Properties @include(if: $full) { Shipper }
                    Signer @skip(if: true)
                }
            }
            fragment Core on Transaction { Id }"#,
            Some(json!({ "full": false })),
            None,
        )
        .await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);
        assert_eq!(
            resp.data,
            json!({ "getTransaction": { "Id": "abc", "Type": "BFTX" } })
        );
    }

    #[tokio::test]
    async fn failing_field_is_null_and_execution_continues() {
        let exec = executor(StubLifecycle::default());
        let resp = run(
            &exec,
            r#"{ getTransaction(Id: "X") { Id } total: getTotal }"#,
        )
        .await;
        assert_eq!(resp.data, json!({ "getTransaction": null, "total": "0" }));
        assert_eq!(resp.errors.len(), 1);
        let err = &resp.errors[0];
        assert_eq!(err.message, "404");
        assert_eq!(err.path, ["getTransaction"]);
        assert_eq!(err.locations, vec![Location { line: 1, column: 3 }]);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn first_error_drives_status() {
        let exec = executor(StubLifecycle::default());
        let resp = run(
            &exec,
            r#"{ a: getTransaction { Id } b: getTransaction(Id: "X") { Id } }"#,
        )
        .await;
        assert_eq!(messages(&resp), ["400", "404"]);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_numeric_external_error_is_500() {
        let exec = executor(StubLifecycle::failing_with(|| {
            LifecycleError::Broadcast("channel closed".into())
        }));
        let resp = run(&exec, "{ getTotal }").await;
        assert_eq!(messages(&resp), ["broadcast error: channel closed"]);
        assert!(resp.errors[0].extensions.is_none());
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn mutations_run_serially_in_document_order() {
        let exec = executor(StubLifecycle::default());
        let resp = run(
            &exec,
            r#"mutation {
                a: constructBFTX(Properties: { Shipper: "A" }) { Id }
                b: constructBFTX(Properties: { Shipper: "B" }) { Id }
            }"#,
        )
        .await;
        assert_eq!(
            resp.data,
            json!({ "a": { "Id": "stub-1" }, "b": { "Id": "stub-2" } })
        );
    }

    #[tokio::test]
    async fn silent_mutation_has_no_error() {
        let exec = executor(StubLifecycle::default());
        let resp = run(&exec, "mutation { signBFTX { Id } }").await;
        assert_eq!(resp.data, json!({ "signBFTX": null }));
        assert!(resp.errors.is_empty());
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn introspection_for_the_explorer() {
        let exec = executor(StubLifecycle::default());
        let resp = run(
            &exec,
            "{ __typename __schema { queryType { name } types { name } } __type(name: \"Info\") { fields { name } } }",
        )
        .await;
        assert!(resp.errors.is_empty(), "{:?}", resp.errors);
        assert_eq!(resp.data["__typename"], "Query");
        assert_eq!(resp.data["__schema"]["queryType"]["name"], "Query");
        assert_eq!(resp.data["__type"]["fields"][0]["name"], "Data");
    }

    #[test]
    fn envelope_omits_empty_errors() {
        let resp = GraphQLResponse {
            data: json!({ "getTotal": "1" }),
            errors: Vec::new(),
        };
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({ "data": { "getTotal": "1" } })
        );

        let err = GraphQLError::new("boom");
        assert_eq!(serde_json::to_value(&err).unwrap(), json!({ "message": "boom" }));
    }
}
