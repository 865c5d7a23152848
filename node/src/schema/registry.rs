//! # Type Registry
//!
//! Declares every type the gateway can accept or return: the five built-in
//! scalars, the output object types (`Transaction`, `Info`, ...) and the
//! input object types used by `constructBFTX`.
//!
//! Object types and input object types are separate kinds. An object field
//! may only reference scalars or objects; an input field may only reference
//! scalars or input objects. [`TypeRegistry::validate`] enforces this once at
//! start-up. The registry is never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;

use super::SchemaError;

// ---------------------------------------------------------------------------
// Type references
// ---------------------------------------------------------------------------

/// Built-in scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    String,
    Int,
    Float,
    Boolean,
    ID,
}

impl Scalar {
    pub const ALL: [Scalar; 5] = [
        Scalar::String,
        Scalar::Int,
        Scalar::Float,
        Scalar::Boolean,
        Scalar::ID,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scalar::String => "String",
            Scalar::Int => "Int",
            Scalar::Float => "Float",
            Scalar::Boolean => "Boolean",
            Scalar::ID => "ID",
        }
    }
}

/// A reference to a registered type, possibly wrapped in a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: &str) -> Self {
        TypeRef::Named(name.to_string())
    }

    pub fn list(inner: TypeRef) -> Self {
        TypeRef::List(Box::new(inner))
    }

    /// The innermost named type.
    pub fn base_name(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) => inner.base_name(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => f.write_str(name),
            TypeRef::List(inner) => write!(f, "[{inner}]"),
        }
    }
}

// ---------------------------------------------------------------------------
// Type definitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
    pub description: Option<&'static str>,
}

impl FieldDef {
    pub fn new(name: &str, ty: TypeRef) -> Self {
        Self {
            name: name.to_string(),
            ty,
            description: None,
        }
    }

    pub fn described(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }
}

/// Field set shared by object and input object types. Order is declaration
/// order and is kept in SDL and introspection output.
#[derive(Debug, Clone)]
pub struct CompositeType {
    pub name: String,
    pub description: Option<&'static str>,
    pub fields: Vec<FieldDef>,
}

impl CompositeType {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone)]
pub enum TypeDef {
    Scalar(Scalar),
    Object(CompositeType),
    InputObject(CompositeType),
}

impl TypeDef {
    pub fn name(&self) -> &str {
        match self {
            TypeDef::Scalar(s) => s.name(),
            TypeDef::Object(t) | TypeDef::InputObject(t) => &t.name,
        }
    }

    pub fn is_output(&self) -> bool {
        matches!(self, TypeDef::Scalar(_) | TypeDef::Object(_))
    }

    pub fn is_input(&self) -> bool {
        matches!(self, TypeDef::Scalar(_) | TypeDef::InputObject(_))
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: BTreeMap<String, TypeDef>,
}

impl TypeRegistry {
    /// An empty registry holding only the built-in scalars.
    pub fn with_scalars() -> Self {
        let types = Scalar::ALL
            .iter()
            .map(|s| (s.name().to_string(), TypeDef::Scalar(*s)))
            .collect();
        Self { types }
    }

    pub fn register(&mut self, def: TypeDef) -> Result<(), SchemaError> {
        let name = def.name().to_string();
        if self.types.contains_key(&name) {
            return Err(SchemaError::DuplicateType(name));
        }
        self.types.insert(name, def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// The object type named `name`, if it is one.
    pub fn object(&self, name: &str) -> Option<&CompositeType> {
        match self.types.get(name) {
            Some(TypeDef::Object(t)) => Some(t),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values()
    }

    /// Checks that `ty` names a registered output-capable type.
    pub fn check_output(&self, owner: &str, ty: &TypeRef) -> Result<(), SchemaError> {
        match self.types.get(ty.base_name()) {
            None => Err(SchemaError::UnknownType {
                owner: owner.to_string(),
                type_name: ty.base_name().to_string(),
            }),
            Some(def) if !def.is_output() => Err(SchemaError::NotOutputType {
                owner: owner.to_string(),
                type_name: ty.base_name().to_string(),
            }),
            Some(_) => Ok(()),
        }
    }

    /// Checks that `ty` names a registered input-capable type.
    pub fn check_input(&self, owner: &str, ty: &TypeRef) -> Result<(), SchemaError> {
        match self.types.get(ty.base_name()) {
            None => Err(SchemaError::UnknownType {
                owner: owner.to_string(),
                type_name: ty.base_name().to_string(),
            }),
            Some(def) if !def.is_input() => Err(SchemaError::NotInputType {
                owner: owner.to_string(),
                type_name: ty.base_name().to_string(),
            }),
            Some(_) => Ok(()),
        }
    }

    /// Validates every field reference in every registered type.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for def in self.types.values() {
            match def {
                TypeDef::Scalar(_) => {}
                TypeDef::Object(t) => {
                    for field in &t.fields {
                        self.check_output(&format!("{}.{}", t.name, field.name), &field.ty)?;
                    }
                }
                TypeDef::InputObject(t) => {
                    for field in &t.fields {
                        self.check_input(&format!("{}.{}", t.name, field.name), &field.ty)?;
                    }
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// BFTX types
// ---------------------------------------------------------------------------

fn string(name: &str) -> FieldDef {
    FieldDef::new(name, TypeRef::named("String"))
}

fn int(name: &str) -> FieldDef {
    FieldDef::new(name, TypeRef::named("Int"))
}

fn float(name: &str) -> FieldDef {
    FieldDef::new(name, TypeRef::named("Float"))
}

fn boolean(name: &str) -> FieldDef {
    FieldDef::new(name, TypeRef::named("Boolean"))
}

fn nested(name: &str, ty: &str) -> FieldDef {
    FieldDef::new(name, TypeRef::named(ty))
}

fn composite(name: &str, description: &'static str, fields: Vec<FieldDef>) -> CompositeType {
    CompositeType {
        name: name.to_string(),
        description: Some(description),
        fields,
    }
}

/// Property fields, with nested types suffixed by `suffix` ("" for the
/// output shape, "Input" for the input shape).
fn properties_fields(suffix: &str) -> Vec<FieldDef> {
    vec![
        string("Shipper"),
        string("BolNum"),
        string("RefNum"),
        string("Consignee"),
        string("HouseBill"),
        string("Vessel"),
        string("PortLoading"),
        string("PortDischarge"),
        string("NotifyAddress"),
        string("DescOfGoods"),
        int("GrossWeight").described("Gross weight in kilograms."),
        int("FreightPayableAmt"),
        int("FreightAdvAmt"),
        string("GeneralInstructions"),
        string("DateShipped"),
        nested("IssueDetails", &format!("IssueDetails{suffix}")),
        int("NumBol").described("Number of original bills issued."),
        nested("MasterInfo", &format!("MasterInfo{suffix}")),
        nested("AgentForMaster", &format!("AgentMaster{suffix}")),
        nested("AgentForOwner", &format!("AgentOwner{suffix}")),
    ]
}

fn party_types(suffix: &str) -> Vec<CompositeType> {
    let person = || vec![string("FirstName"), string("LastName"), string("Sig")];
    let mut owner = person();
    owner.push(string("ConditionsForCarriage"));
    vec![
        composite(
            &format!("IssueDetails{suffix}"),
            "Place and date of issue.",
            vec![string("PlaceOfIssue"), string("DateOfIssue")],
        ),
        composite(&format!("MasterInfo{suffix}"), "Vessel master.", person()),
        composite(
            &format!("AgentMaster{suffix}"),
            "Agent signing for the master.",
            person(),
        ),
        composite(
            &format!("AgentOwner{suffix}"),
            "Agent signing for the owner.",
            owner,
        ),
    ]
}

/// The registry of every BFTX type.
pub fn bftx_types() -> Result<TypeRegistry, SchemaError> {
    let mut registry = TypeRegistry::with_scalars();

    registry.register(TypeDef::Object(composite(
        "Transaction",
        "A BFTX freight transaction.",
        vec![
            string("Id"),
            string("Type"),
            nested("Properties", "Properties"),
            string("Signer").described("Hex Ed25519 public key of the signer."),
            string("Signature"),
            boolean("Verified"),
            boolean("Transmitted"),
            string("Private").described("Sealed properties while encrypted."),
            string("Amendment"),
            float("Timestamp").described("Unix milliseconds; wider than a 32-bit Int."),
            int("BlockHeight"),
        ],
    )))?;
    registry.register(TypeDef::Object(composite(
        "Properties",
        "Bill-of-lading fields.",
        properties_fields(""),
    )))?;
    for party in party_types("") {
        registry.register(TypeDef::Object(party))?;
    }

    registry.register(TypeDef::Object(composite(
        "Info",
        "Ledger state summary.",
        vec![
            string("Data"),
            string("Version"),
            int("LastBlockHeight"),
            string("LastBlockAppHash"),
        ],
    )))?;

    registry.register(TypeDef::InputObject(composite(
        "PropertiesInput",
        "Bill-of-lading fields for a new transaction.",
        properties_fields("Input"),
    )))?;
    for party in party_types("Input") {
        registry.register(TypeDef::InputObject(party))?;
    }

    registry.validate()?;
    Ok(registry)
}
