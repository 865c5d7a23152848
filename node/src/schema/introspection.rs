//! Introspection values for the explorer.
//!
//! The full `__schema` object is rendered as JSON once per request that asks
//! for it; the executor then projects the caller's selection out of it. The
//! shapes follow the standard introspection types closely enough for
//! GraphiQL to build a client schema.

use serde_json::{json, Value};

use super::{Category, FieldDef, OperationDescriptor, Schema, TypeDef, TypeRef};

fn type_ref(schema: &Schema, ty: &TypeRef) -> Value {
    match ty {
        TypeRef::List(inner) => json!({
            "kind": "LIST",
            "name": null,
            "ofType": type_ref(schema, inner),
        }),
        TypeRef::Named(name) => json!({
            "kind": kind_of(schema, name),
            "name": name,
            "ofType": null,
        }),
    }
}

fn kind_of(schema: &Schema, name: &str) -> &'static str {
    match schema.types().get(name) {
        Some(TypeDef::Scalar(_)) => "SCALAR",
        Some(TypeDef::InputObject(_)) => "INPUT_OBJECT",
        _ => "OBJECT",
    }
}

fn field(schema: &Schema, f: &FieldDef) -> Value {
    json!({
        "name": f.name,
        "description": f.description,
        "args": [],
        "type": type_ref(schema, &f.ty),
        "isDeprecated": false,
        "deprecationReason": null,
    })
}

fn input_value(schema: &Schema, name: &str, ty: &TypeRef, description: Option<&str>) -> Value {
    json!({
        "name": name,
        "description": description,
        "type": type_ref(schema, ty),
        "defaultValue": null,
    })
}

fn operation_field(schema: &Schema, op: &OperationDescriptor) -> Value {
    let args: Vec<Value> = op
        .arguments
        .iter()
        .map(|a| input_value(schema, &a.name, &a.ty, a.description))
        .collect();
    json!({
        "name": op.name,
        "description": op.description,
        "args": args,
        "type": type_ref(schema, &op.result),
        "isDeprecated": false,
        "deprecationReason": null,
    })
}

fn full_type(
    kind: &str,
    name: &str,
    description: Option<&str>,
    fields: Option<Vec<Value>>,
    input_fields: Option<Vec<Value>>,
) -> Value {
    let interfaces: Option<Vec<Value>> = (kind == "OBJECT").then(Vec::new);
    json!({
        "kind": kind,
        "name": name,
        "description": description,
        "fields": fields,
        "inputFields": input_fields,
        "interfaces": interfaces,
        "enumValues": null,
        "possibleTypes": null,
        "specifiedByURL": null,
    })
}

fn root_type(schema: &Schema, category: Category) -> Value {
    let fields = schema
        .operations(category)
        .iter()
        .map(|op| operation_field(schema, op))
        .collect();
    full_type("OBJECT", category.type_name(), None, Some(fields), None)
}

fn registered_type(schema: &Schema, def: &TypeDef) -> Value {
    match def {
        TypeDef::Scalar(s) => full_type("SCALAR", s.name(), None, None, None),
        TypeDef::Object(t) => full_type(
            "OBJECT",
            &t.name,
            t.description,
            Some(t.fields.iter().map(|f| field(schema, f)).collect()),
            None,
        ),
        TypeDef::InputObject(t) => full_type(
            "INPUT_OBJECT",
            &t.name,
            t.description,
            None,
            Some(
                t.fields
                    .iter()
                    .map(|f| input_value(schema, &f.name, &f.ty, f.description))
                    .collect(),
            ),
        ),
    }
}

fn condition_directive(name: &str, description: &str) -> Value {
    json!({
        "name": name,
        "description": description,
        "locations": ["FIELD", "FRAGMENT_SPREAD", "INLINE_FRAGMENT"],
        "isRepeatable": false,
        "args": [{
            "name": "if",
            "description": null,
            "type": {
                "kind": "NON_NULL",
                "name": null,
                "ofType": { "kind": "SCALAR", "name": "Boolean", "ofType": null },
            },
            "defaultValue": null,
        }],
    })
}

/// The complete `__schema` value.
pub fn schema_value(schema: &Schema) -> Value {
    let mut types = vec![
        root_type(schema, Category::Query),
        root_type(schema, Category::Mutation),
    ];
    types.extend(schema.types().iter().map(|def| registered_type(schema, def)));

    json!({
        "description": null,
        "queryType": { "name": "Query" },
        "mutationType": { "name": "Mutation" },
        "subscriptionType": null,
        "types": types,
        "directives": [
            condition_directive("skip", "Skip this field when the argument is true."),
            condition_directive("include", "Include this field only when the argument is true."),
        ],
    })
}

/// The `__type(name:)` value, or null for unknown names.
pub fn type_value(schema: &Schema, name: &str) -> Value {
    match name {
        "Query" => root_type(schema, Category::Query),
        "Mutation" => root_type(schema, Category::Mutation),
        _ => schema
            .types()
            .get(name)
            .map(|def| registered_type(schema, def))
            .unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_value_lists_roots_and_types() {
        let schema = Schema::build().unwrap();
        let value = schema_value(&schema);
        assert_eq!(value["queryType"]["name"], "Query");
        let names: Vec<&str> = value["types"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        for expected in ["Query", "Mutation", "Transaction", "PropertiesInput", "Boolean"] {
            assert!(names.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn list_result_is_wrapped() {
        let schema = Schema::build().unwrap();
        let query = type_value(&schema, "Query");
        let fields = query["fields"].as_array().unwrap();
        let q = fields
            .iter()
            .find(|f| f["name"] == "queryTransaction")
            .unwrap();
        assert_eq!(q["type"]["kind"], "LIST");
        assert_eq!(q["type"]["ofType"]["name"], "Transaction");
        assert_eq!(q["args"][0]["name"], "Id");
    }

    #[test]
    fn input_object_has_input_fields() {
        let schema = Schema::build().unwrap();
        let input = type_value(&schema, "PropertiesInput");
        assert_eq!(input["kind"], "INPUT_OBJECT");
        assert!(input["fields"].is_null());
        assert!(input["inputFields"].as_array().unwrap().len() > 10);
        assert!(type_value(&schema, "Nope").is_null());
    }
}
