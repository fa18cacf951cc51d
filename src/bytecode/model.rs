//! In-memory shape of a compiled module as exposed by a bytecode reader.

use serde::{Deserialize, Serialize};

/// Instruction categories the publisher tracer cares about. Everything else
/// collapses into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpCode {
    /// Direct call.
    Call,
    /// Virtual call.
    CallVirt,
    /// Indirect call through a function pointer.
    CallIndirect,
    /// Object construction.
    NewObj,
    /// Load a local slot.
    LoadLocal,
    /// Store to a local slot.
    StoreLocal,
    /// Load an instance field.
    LoadField,
    /// Load a static field.
    LoadStaticField,
    Other,
}

impl OpCode {
    pub fn is_call(self) -> bool {
        matches!(self, OpCode::Call | OpCode::CallVirt | OpCode::CallIndirect)
    }

    pub fn is_field_load(self) -> bool {
        matches!(self, OpCode::LoadField | OpCode::LoadStaticField)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRef {
    pub name: String,
    /// Full name of the declaring type.
    pub declaring_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    pub name: String,
    pub declaring_type: String,
    /// Full name of the field's declared type.
    pub field_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Operand {
    None,
    /// Call target, or the constructor for `NewObj`.
    Method(MethodRef),
    Field(FieldRef),
    Type(String),
    Local(u16),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub offset: u32,
    pub opcode: OpCode,
    #[serde(default = "no_operand")]
    pub operand: Operand,
}

fn no_operand() -> Operand {
    Operand::None
}

impl Instruction {
    pub fn new(offset: u32, opcode: OpCode, operand: Operand) -> Self {
        Self {
            offset,
            opcode,
            operand,
        }
    }

    pub fn method(&self) -> Option<&MethodRef> {
        match &self.operand {
            Operand::Method(method) => Some(method),
            _ => None,
        }
    }

    pub fn field(&self) -> Option<&FieldRef> {
        match &self.operand {
            Operand::Field(field) => Some(field),
            _ => None,
        }
    }

    pub fn local(&self) -> Option<u16> {
        match self.operand {
            Operand::Local(slot) => Some(slot),
            _ => None,
        }
    }

    /// Type built by a `NewObj`, taken from its constructor's declaring type.
    pub fn constructed_type(&self) -> Option<&str> {
        if self.opcode != OpCode::NewObj {
            return None;
        }
        match &self.operand {
            Operand::Method(ctor) => Some(ctor.declaring_type.as_str()),
            Operand::Type(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

/// Debug mapping from an instruction offset to a source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencePoint {
    pub offset: u32,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<String>,
    /// `None` for abstract and extern methods.
    #[serde(default)]
    pub body: Option<Vec<Instruction>>,
    #[serde(default)]
    pub sequence_points: Vec<SequencePoint>,
}

impl MethodDef {
    /// Source line for the instruction at `offset`, 0 without debug information.
    pub fn line_for(&self, offset: u32) -> usize {
        self.sequence_points
            .iter()
            .filter(|sp| sp.offset <= offset)
            .max_by_key(|sp| sp.offset)
            .map(|sp| sp.line)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    /// Full name, namespace included.
    pub full_name: String,
    #[serde(default)]
    pub is_interface: bool,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub base_type: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub methods: Vec<MethodDef>,
}

impl TypeDef {
    pub fn simple_name(&self) -> &str {
        simple_name(&self.full_name)
    }

    /// Compiler-generated nested types (async state machines, iterators,
    /// closures) belong to the type they were generated for.
    pub fn is_generated(&self) -> bool {
        source_type_name(&self.full_name) != self.full_name
    }

    /// The method as written in source. `<PlaceOrderAsync>d__3::MoveNext`
    /// and `<PlaceOrderAsync>b__0` both map back to `PlaceOrderAsync`.
    pub fn source_method_name<'a>(&'a self, method: &'a MethodDef) -> &'a str {
        generated_member_name(&method.name)
            .or_else(|| {
                self.full_name
                    .rsplit(['/', '+'])
                    .next()
                    .and_then(generated_member_name)
            })
            .unwrap_or(&method.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDef {
    pub name: String,
    #[serde(default)]
    pub types: Vec<TypeDef>,
}

/// `Orders.Events.OrderPlaced` -> `OrderPlaced`; also drops generic arity
/// (`IHandler`1`), nested-type prefixes (`Outer/Inner`) and trailing
/// compiler-generated segments (`OrderService/<PlaceOrderAsync>d__3`).
/// Never empty for a non-empty name.
pub fn simple_name(full_name: &str) -> &str {
    let declared = source_type_name(full_name);
    let without_arity = declared.split('`').next().unwrap_or(declared);
    let without_args = match without_arity.find('<') {
        Some(start) if start > 0 => &without_arity[..start],
        _ => without_arity,
    };
    let name = without_args
        .rsplit(['.', '/', '+'])
        .next()
        .unwrap_or(without_args);
    if name.is_empty() {
        full_name
    } else {
        name
    }
}

/// Strips nested segments the compiler generated (`<...>`) from the end of
/// a full type name: `Orders.OrderService/<PlaceOrderAsync>d__3` ->
/// `Orders.OrderService`.
pub fn source_type_name(full_name: &str) -> &str {
    let mut name = full_name;
    while let Some(separator) = name.rfind(['/', '+']) {
        if separator == 0 || !name[separator + 1..].starts_with('<') {
            break;
        }
        name = &name[..separator];
    }
    name
}

/// `<PlaceOrderAsync>d__3` -> `PlaceOrderAsync`. `None` for ordinary names
/// and for anonymous ones such as `<>c__DisplayClass0_0`.
pub fn generated_member_name(name: &str) -> Option<&str> {
    let inner = name.strip_prefix('<')?;
    let member = &inner[..inner.find('>')?];
    (!member.is_empty()).then_some(member)
}
