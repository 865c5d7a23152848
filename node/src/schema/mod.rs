//! # Schema
//!
//! The immutable pairing of the [`TypeRegistry`] and the operation table.
//! Built once by [`Schema::build`] at start-up, validated, then shared
//! read-only behind an `Arc` for the life of the process.
//!
//! ```text
//! registry.rs       - scalars, object and input object types
//! operations.rs     - query/mutation descriptors and their bindings
//! introspection.rs  - `__schema` / `__type` values for the explorer
//! ```

pub mod introspection;
pub mod operations;
pub mod registry;

use std::fmt::Write as _;

pub use operations::{bftx_operations, Binding, Call, Category, OnMismatch, OperationDescriptor};
pub use registry::{bftx_types, CompositeType, FieldDef, TypeDef, TypeRef, TypeRegistry};

/// Configuration errors detected while building the schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("{owner} references undeclared type {type_name}")]
    UnknownType { owner: String, type_name: String },

    #[error("{owner} must reference an output type, {type_name} is input-only")]
    NotOutputType { owner: String, type_name: String },

    #[error("{owner} must reference an input type, {type_name} is output-only")]
    NotInputType { owner: String, type_name: String },

    #[error("type {0} declared twice")]
    DuplicateType(String),

    #[error("operation {category}.{name} declared twice")]
    DuplicateOperation { category: &'static str, name: String },
}

#[derive(Debug)]
pub struct Schema {
    types: TypeRegistry,
    queries: Vec<OperationDescriptor>,
    mutations: Vec<OperationDescriptor>,
}

impl Schema {
    /// The BFTX schema.
    pub fn build() -> Result<Self, SchemaError> {
        Self::from_parts(bftx_types()?, bftx_operations())
    }

    /// Assembles and validates a schema from a registry and operations.
    ///
    /// Every argument must reference an input type and every result an
    /// output type; names must be unique per category.
    pub fn from_parts(
        types: TypeRegistry,
        operations: Vec<OperationDescriptor>,
    ) -> Result<Self, SchemaError> {
        types.validate()?;

        let mut queries: Vec<OperationDescriptor> = Vec::new();
        let mut mutations: Vec<OperationDescriptor> = Vec::new();
        for op in operations {
            let owner = format!("{}.{}", op.category.type_name(), op.name);
            types.check_output(&owner, &op.result)?;
            for arg in &op.arguments {
                types.check_input(&format!("{owner}({})", arg.name), &arg.ty)?;
            }

            let table = match op.category {
                Category::Query => &mut queries,
                Category::Mutation => &mut mutations,
            };
            if table.iter().any(|o| o.name == op.name) {
                return Err(SchemaError::DuplicateOperation {
                    category: op.category.type_name(),
                    name: op.name,
                });
            }
            table.push(op);
        }

        Ok(Self {
            types,
            queries,
            mutations,
        })
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn operations(&self, category: Category) -> &[OperationDescriptor] {
        match category {
            Category::Query => &self.queries,
            Category::Mutation => &self.mutations,
        }
    }

    pub fn operation(&self, category: Category, name: &str) -> Option<&OperationDescriptor> {
        self.operations(category).iter().find(|op| op.name == name)
    }

    /// Renders the schema in SDL form.
    pub fn to_sdl(&self) -> String {
        let mut out = String::new();
        out.push_str("schema {\n  query: Query\n  mutation: Mutation\n}\n");

        for category in [Category::Query, Category::Mutation] {
            out.push('\n');
            let _ = writeln!(out, "type {} {{", category.type_name());
            for op in self.operations(category) {
                if let Some(description) = op.description {
                    let _ = writeln!(out, "  \"\"\"{description}\"\"\"");
                }
                let args: Vec<String> = op
                    .arguments
                    .iter()
                    .map(|a| format!("{}: {}", a.name, a.ty))
                    .collect();
                if args.is_empty() {
                    let _ = writeln!(out, "  {}: {}", op.name, op.result);
                } else {
                    let _ = writeln!(out, "  {}({}): {}", op.name, args.join(", "), op.result);
                }
            }
            out.push_str("}\n");
        }

        for def in self.types.iter() {
            let (keyword, ty) = match def {
                TypeDef::Scalar(_) => continue,
                TypeDef::Object(t) => ("type", t),
                TypeDef::InputObject(t) => ("input", t),
            };
            out.push('\n');
            if let Some(description) = ty.description {
                let _ = writeln!(out, "\"\"\"{description}\"\"\"");
            }
            let _ = writeln!(out, "{keyword} {} {{", ty.name);
            for field in &ty.fields {
                if let Some(description) = field.description {
                    let _ = writeln!(out, "  \"\"\"{description}\"\"\"");
                }
                let _ = writeln!(out, "  {}: {}", field.name, field.ty);
            }
            out.push_str("}\n");
        }
        out
    }
}
