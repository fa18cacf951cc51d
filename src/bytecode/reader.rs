use std::fs;
use std::path::Path;

use super::model::ModuleDef;
use crate::error::ExtractError;

/// File suffix of module dumps picked up in bytecode mode.
pub const MODULE_DUMP_SUFFIX: &str = ".module.json";

/// Loads a compiled module into the instruction/type model.
pub trait ModuleReader {
    fn read(&self, path: &Path) -> Result<ModuleDef, ExtractError>;
}

/// Reads module dumps written as JSON (one `ModuleDef` per file).
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonModuleReader;

impl JsonModuleReader {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleReader for JsonModuleReader {
    fn read(&self, path: &Path) -> Result<ModuleDef, ExtractError> {
        let raw = fs::read_to_string(path).map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut module: ModuleDef =
            serde_json::from_str(&raw).map_err(|source| ExtractError::ModuleFormat {
                path: path.to_path_buf(),
                source,
            })?;
        if module.name.is_empty() {
            module.name = module_name(path);
        }
        Ok(module)
    }
}

/// `bin/Debug/Orders.Api.module.json` -> `Orders.Api`
pub fn module_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    file_name
        .strip_suffix(MODULE_DUMP_SUFFIX)
        .unwrap_or(&file_name)
        .to_string()
}
