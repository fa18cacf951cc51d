use std::collections::{HashMap, HashSet, VecDeque};

use super::model::{simple_name, ModuleDef, TypeDef};

/// What the hierarchy walk needs to know about a type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeShape {
    pub name: String,
    pub interfaces: Vec<String>,
    pub base_type: Option<String>,
}

impl TypeShape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base_type = Some(base.into());
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }
}

impl From<&TypeDef> for TypeShape {
    fn from(ty: &TypeDef) -> Self {
        Self {
            name: ty.full_name.clone(),
            interfaces: ty.interfaces.clone(),
            base_type: ty.base_type.clone(),
        }
    }
}

/// Resolves a type reference to its declared shape. `None` means the type is
/// not available, e.g. it lives in a module that was not loaded.
pub trait TypeGraph {
    fn resolve(&self, type_name: &str) -> Option<TypeShape>;
}

/// Shapes keyed by name; lookups try the exact name, then the simple name.
impl TypeGraph for HashMap<String, TypeShape> {
    fn resolve(&self, type_name: &str) -> Option<TypeShape> {
        self.get(type_name)
            .or_else(|| self.get(simple_name(type_name)))
            .cloned()
    }
}

/// All modules loaded for one repository, so references across its
/// assemblies resolve.
#[derive(Debug, Default)]
pub struct ModuleSet {
    modules: Vec<ModuleDef>,
    by_full_name: HashMap<String, (usize, usize)>,
    by_simple_name: HashMap<String, (usize, usize)>,
}

impl ModuleSet {
    pub fn new(modules: Vec<ModuleDef>) -> Self {
        let mut by_full_name = HashMap::new();
        let mut by_simple_name = HashMap::new();
        for (m, module) in modules.iter().enumerate() {
            for (t, ty) in module.types.iter().enumerate() {
                by_full_name.entry(ty.full_name.clone()).or_insert((m, t));
                if ty.is_generated() {
                    continue;
                }
                by_simple_name
                    .entry(ty.simple_name().to_string())
                    .or_insert((m, t));
            }
        }
        Self {
            modules,
            by_full_name,
            by_simple_name,
        }
    }

    pub fn modules(&self) -> &[ModuleDef] {
        &self.modules
    }

    pub fn type_count(&self) -> usize {
        self.by_full_name.len()
    }

    fn lookup(&self, type_name: &str) -> Option<&TypeDef> {
        let (m, t) = self
            .by_full_name
            .get(type_name)
            .or_else(|| self.by_simple_name.get(simple_name(type_name)))?;
        self.modules.get(*m)?.types.get(*t)
    }
}

impl TypeGraph for ModuleSet {
    fn resolve(&self, type_name: &str) -> Option<TypeShape> {
        self.lookup(type_name).map(TypeShape::from)
    }
}

/// Whether `type_name` is, implements, or derives from one of `targets`
/// (compared by simple name). Interfaces and base types are followed
/// transitively. A type the graph cannot resolve counts as a match when its
/// own simple name contains a target.
pub fn reaches_any(graph: &dyn TypeGraph, type_name: &str, targets: &[String]) -> bool {
    let targets: Vec<&str> = targets
        .iter()
        .map(String::as_str)
        .filter(|t| !t.is_empty())
        .collect();
    if targets.is_empty() {
        return false;
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::from([type_name.to_string()]);

    while let Some(current) = queue.pop_front() {
        if !visited.insert(current.clone()) {
            continue;
        }
        let name = simple_name(&current);
        if targets.iter().any(|t| *t == name) {
            return true;
        }

        match graph.resolve(&current) {
            Some(shape) => {
                queue.extend(shape.interfaces);
                queue.extend(shape.base_type);
            }
            None => {
                if targets.iter().any(|t| name.contains(t)) {
                    return true;
                }
            }
        }
    }

    false
}
