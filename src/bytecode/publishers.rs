use std::sync::Arc;

use super::hierarchy::{reaches_any, TypeGraph};
use super::model::{simple_name, source_type_name, Instruction, MethodDef, ModuleDef, OpCode, TypeDef};
use crate::config::IndicatorSets;
use crate::core::lookback::{find_map_nearest, find_nearest, TRACE_WINDOW};
use crate::core::{PublishSite, UnitOrigin, UNKNOWN_EVENT};

/// Finds publish call sites in compiled method bodies and recovers the
/// published event type by tracing instructions backward from each call.
pub struct BytecodePublisherExtractor {
    indicators: Arc<IndicatorSets>,
}

impl BytecodePublisherExtractor {
    pub fn new(indicators: Arc<IndicatorSets>) -> Self {
        Self { indicators }
    }

    pub fn extract_module(
        &self,
        module: &ModuleDef,
        graph: &dyn TypeGraph,
        origin: &UnitOrigin,
    ) -> Vec<PublishSite> {
        let mut sites = Vec::new();

        for ty in module
            .types
            .iter()
            .filter(|ty| !ty.is_interface && !ty.is_abstract)
        {
            let background_job = self.is_background_job(ty)
                || self
                    .enclosing_type(module, ty)
                    .is_some_and(|owner| self.is_background_job(owner));
            for method in &ty.methods {
                let Some(body) = method.body.as_deref() else {
                    continue;
                };
                for (index, instruction) in body.iter().enumerate() {
                    if !self.is_publish_call(instruction, graph) {
                        continue;
                    }
                    let event_name = self
                        .trace_event_type(body, index, graph)
                        .unwrap_or_else(|| UNKNOWN_EVENT.to_string());
                    sites.push(self.site(ty, method, instruction, event_name, background_job, origin));
                }
            }
        }

        sites
    }

    /// The source type a generated nested type was emitted for, when it is
    /// defined in the same module.
    fn enclosing_type<'m>(&self, module: &'m ModuleDef, ty: &TypeDef) -> Option<&'m TypeDef> {
        if !ty.is_generated() {
            return None;
        }
        let owner = source_type_name(&ty.full_name);
        module.types.iter().find(|candidate| candidate.full_name == owner)
    }

    /// A call-family instruction targeting a publisher method on a type with
    /// publish capability.
    pub fn is_publish_call(&self, instruction: &Instruction, graph: &dyn TypeGraph) -> bool {
        if !instruction.opcode.is_call() {
            return false;
        }
        let Some(target) = instruction.method() else {
            return false;
        };
        self.indicators.is_publisher_method(&target.name)
            && reaches_any(graph, &target.declaring_type, &self.indicators.publisher_types)
    }

    /// Resolve the event type published by the call at `call_index`.
    ///
    /// Tried in order within the trace window: a construction of an event
    /// type; a local load whose slot was last stored right after such a
    /// construction; a field load of an event-typed field.
    pub fn trace_event_type(
        &self,
        body: &[Instruction],
        call_index: usize,
        graph: &dyn TypeGraph,
    ) -> Option<String> {
        self.constructed_event(body, call_index, graph)
            .or_else(|| self.local_event(body, call_index, graph))
            .or_else(|| self.field_event(body, call_index, graph))
    }

    fn constructed_event(&self, body: &[Instruction], call_index: usize, graph: &dyn TypeGraph) -> Option<String> {
        find_map_nearest(body, call_index, Some(TRACE_WINDOW), |_, instruction| {
            instruction
                .constructed_type()
                .filter(|ty| self.is_event_type(ty, graph))
                .map(|ty| simple_name(ty).to_string())
        })
    }

    fn local_event(&self, body: &[Instruction], call_index: usize, graph: &dyn TypeGraph) -> Option<String> {
        let load = find_nearest(body, call_index, Some(TRACE_WINDOW), |instruction| {
            instruction.opcode == OpCode::LoadLocal && instruction.local().is_some()
        })?;
        let slot = body[load].local()?;

        let store = find_nearest(body, load, None, |instruction| {
            instruction.opcode == OpCode::StoreLocal && instruction.local() == Some(slot)
        })?;

        let producer = body.get(store.checked_sub(1)?)?;
        producer
            .constructed_type()
            .filter(|ty| self.is_event_type(ty, graph))
            .map(|ty| simple_name(ty).to_string())
    }

    fn field_event(&self, body: &[Instruction], call_index: usize, graph: &dyn TypeGraph) -> Option<String> {
        find_map_nearest(body, call_index, Some(TRACE_WINDOW), |_, instruction| {
            if !instruction.opcode.is_field_load() {
                return None;
            }
            instruction
                .field()
                .filter(|field| self.is_event_type(&field.field_type, graph))
                .map(|field| simple_name(&field.field_type).to_string())
        })
    }

    /// Event types end with an event suffix or derive from an event base type.
    pub fn is_event_type(&self, type_name: &str, graph: &dyn TypeGraph) -> bool {
        self.indicators.has_event_suffix(simple_name(type_name))
            || reaches_any(graph, type_name, &self.indicators.event_base_types)
    }

    /// A type runs inside a background job if it, or any of its methods, is
    /// annotated with a job marker, or it implements a job interface.
    pub fn is_background_job(&self, ty: &TypeDef) -> bool {
        let job_interface = self.indicators.job_interface_token.as_str();
        ty.attributes.iter().any(|a| self.is_job_attribute(a))
            || (!job_interface.is_empty()
                && ty
                    .interfaces
                    .iter()
                    .any(|i| simple_name(i).contains(job_interface)))
            || ty
                .methods
                .iter()
                .flat_map(|m| m.attributes.iter())
                .any(|a| self.is_job_attribute(a))
    }

    fn is_job_attribute(&self, attribute: &str) -> bool {
        let stripped = attribute.trim_matches(|c: char| matches!(c, '[' | ']' | '(' | ')' | '@') || c.is_whitespace());
        let stripped = stripped.split('(').next().unwrap_or(stripped);
        let name = stripped.strip_suffix("Attribute").unwrap_or(stripped).to_lowercase();
        if name.is_empty() {
            return false;
        }
        self.indicators
            .background_job_markers
            .iter()
            .filter(|m| !m.is_empty())
            .any(|marker| name.contains(&marker.to_lowercase()))
    }

    fn site(
        &self,
        ty: &TypeDef,
        method: &MethodDef,
        instruction: &Instruction,
        event_name: String,
        background_job: bool,
        origin: &UnitOrigin,
    ) -> PublishSite {
        let class_name = ty.simple_name().to_string();
        let context = instruction
            .method()
            .map(|target| format!("{} {}::{}", opcode_label(instruction.opcode), target.declaring_type, target.name))
            .unwrap_or_else(|| opcode_label(instruction.opcode).to_string());

        let site = PublishSite::new(
            event_name,
            origin,
            class_name.clone(),
            ty.source_method_name(method).to_string(),
            method.line_for(instruction.offset),
        )
        .with_context(context);

        if background_job {
            site.in_background_job(class_name)
        } else {
            site
        }
    }
}

fn opcode_label(opcode: OpCode) -> &'static str {
    match opcode {
        OpCode::Call => "call",
        OpCode::CallVirt => "callvirt",
        OpCode::CallIndirect => "calli",
        OpCode::NewObj => "newobj",
        OpCode::LoadLocal => "ldloc",
        OpCode::StoreLocal => "stloc",
        OpCode::LoadField => "ldfld",
        OpCode::LoadStaticField => "ldsfld",
        OpCode::Other => "op",
    }
}
