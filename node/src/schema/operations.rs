//! # Operation Table
//!
//! One [`OperationDescriptor`] per query and mutation. Each descriptor binds
//! a name, its declared arguments, its result type, exactly one external
//! [`Call`] and the [`Binding`] rule dispatch uses to turn arguments into
//! that call's input.

use super::registry::TypeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Query,
    Mutation,
}

impl Category {
    /// Root type name.
    pub fn type_name(self) -> &'static str {
        match self {
            Category::Query => "Query",
            Category::Mutation => "Mutation",
        }
    }
}

/// The external call an operation is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    GetTransaction,
    QueryTransaction,
    GetInfo,
    GetTotal,
    Construct,
    Encrypt,
    Decrypt,
    Sign,
    Broadcast,
}

/// What happens when a scalar lookup argument is missing or not a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMismatch {
    /// Resolve to an `ArgumentTypeError` carrying status 400.
    Fail,
    /// Resolve to null without an error.
    Silent,
}

/// How arguments become the external call's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Extract one string argument.
    ScalarLookup {
        argument: &'static str,
        on_mismatch: OnMismatch,
    },
    /// Decode a nested input object into a full Transaction record.
    StructuralDecode { argument: &'static str },
    NoArguments,
}

#[derive(Debug, Clone)]
pub struct ArgumentDef {
    pub name: String,
    pub ty: TypeRef,
    pub description: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    pub name: String,
    pub category: Category,
    pub description: Option<&'static str>,
    pub arguments: Vec<ArgumentDef>,
    pub result: TypeRef,
    pub call: Call,
    pub binding: Binding,
}

impl OperationDescriptor {
    pub fn argument(&self, name: &str) -> Option<&ArgumentDef> {
        self.arguments.iter().find(|a| a.name == name)
    }
}

fn id_lookup(
    name: &str,
    category: Category,
    result: TypeRef,
    call: Call,
    on_mismatch: OnMismatch,
    description: &'static str,
) -> OperationDescriptor {
    OperationDescriptor {
        name: name.to_string(),
        category,
        description: Some(description),
        arguments: vec![ArgumentDef {
            name: "Id".to_string(),
            ty: TypeRef::named("String"),
            description: None,
        }],
        result,
        call,
        binding: Binding::ScalarLookup {
            argument: "Id",
            on_mismatch,
        },
    }
}

fn no_args(name: &str, result: TypeRef, call: Call, description: &'static str) -> OperationDescriptor {
    OperationDescriptor {
        name: name.to_string(),
        category: Category::Query,
        description: Some(description),
        arguments: Vec::new(),
        result,
        call,
        binding: Binding::NoArguments,
    }
}

/// Every BFTX operation, queries first, in declaration order.
pub fn bftx_operations() -> Vec<OperationDescriptor> {
    let transaction = || TypeRef::named("Transaction");
    vec![
        id_lookup(
            "getTransaction",
            Category::Query,
            transaction(),
            Call::GetTransaction,
            OnMismatch::Fail,
            "Fetch one transaction by ID.",
        ),
        id_lookup(
            "queryTransaction",
            Category::Query,
            TypeRef::list(transaction()),
            Call::QueryTransaction,
            OnMismatch::Fail,
            "Transactions whose ID starts with the given prefix.",
        ),
        no_args(
            "getInfo",
            TypeRef::named("Info"),
            Call::GetInfo,
            "Ledger state summary.",
        ),
        no_args(
            "getTotal",
            TypeRef::named("String"),
            Call::GetTotal,
            "Number of stored transactions.",
        ),
        OperationDescriptor {
            name: "constructBFTX".to_string(),
            category: Category::Mutation,
            description: Some("Create a transaction from bill-of-lading properties."),
            arguments: vec![ArgumentDef {
                name: "Properties".to_string(),
                ty: TypeRef::named("PropertiesInput"),
                description: Some("Transaction properties."),
            }],
            result: transaction(),
            call: Call::Construct,
            binding: Binding::StructuralDecode {
                argument: "Properties",
            },
        },
        id_lookup(
            "encryptBFTX",
            Category::Mutation,
            transaction(),
            Call::Encrypt,
            OnMismatch::Silent,
            "Seal a transaction's properties.",
        ),
        id_lookup(
            "decryptBFTX",
            Category::Mutation,
            transaction(),
            Call::Decrypt,
            OnMismatch::Silent,
            "Restore a transaction's sealed properties.",
        ),
        id_lookup(
            "signBFTX",
            Category::Mutation,
            transaction(),
            Call::Sign,
            OnMismatch::Silent,
            "Sign a transaction with the ledger key.",
        ),
        id_lookup(
            "broadcastBFTX",
            Category::Mutation,
            transaction(),
            Call::Broadcast,
            OnMismatch::Silent,
            "Broadcast a signed transaction.",
        ),
    ]
}
