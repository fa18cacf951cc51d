//! Publisher extraction from compiled modules.
//!
//! The reader and the type graph are narrow traits so the tracer can run
//! against hand-built instruction sequences and a fake type hierarchy.

pub mod hierarchy;
pub mod model;
pub mod publishers;
pub mod reader;

pub use hierarchy::{reaches_any, ModuleSet, TypeGraph, TypeShape};
pub use model::{
    FieldRef, Instruction, MethodDef, MethodRef, ModuleDef, OpCode, Operand, SequencePoint, TypeDef,
};
pub use publishers::BytecodePublisherExtractor;
pub use reader::{JsonModuleReader, ModuleReader, MODULE_DUMP_SUFFIX};
