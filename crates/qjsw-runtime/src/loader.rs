//! Module loader interface
//!
//! Each context carries at most one [`ModuleLoader`]. Imports are resolved
//! through it recursively: the engine asks for a normalized name, then for
//! the module's source text or bytecode, depending on the loader's mode.

use std::rc::{Rc, Weak};

use qjsw_engine::{ModuleProvider, ModuleSource};

use crate::context::ContextShared;

pub(crate) const LOADER_MISSING: &str = "Failed to load module, the ModuleLoader can not be null!";
pub(crate) const STRING_CODE_MISSING: &str = "Failed to load module, cause string code was null!";
pub(crate) const BYTECODE_MISSING: &str = "Failed to load module, cause bytecode was null!";
pub(crate) const MODULE_NAME_MISSING: &str = "Failed to load module, cause moduleName was null!";

/// Supplies modules imported by script code
pub trait ModuleLoader {
    /// Whether modules come back as bytecode rather than source
    fn is_bytecode_mode(&self) -> bool;

    fn module_bytecode(&self, _module_name: &str) -> Option<Vec<u8>> {
        None
    }

    fn module_string_code(&self, _module_name: &str) -> Option<String> {
        None
    }

    /// Resolve `module_name` as imported from `base_name`
    fn normalize_name(&self, base_name: &str, module_name: &str) -> Option<String> {
        Some(normalize_module_name(base_name, module_name))
    }
}

/// Resolve `./` and `../` prefixes against the directory of `base`.
///
/// Bare specifiers pass through unchanged. Leading `../` segments that climb
/// past the base directory are kept.
pub fn normalize_module_name(base: &str, name: &str) -> String {
    if !name.starts_with('.') {
        return name.to_string();
    }

    let mut dir = match base.rfind('/') {
        Some(index) => base[..index].to_string(),
        None => String::new(),
    };
    let mut rest = name;
    loop {
        if let Some(tail) = rest.strip_prefix("./") {
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("../") {
            if dir.is_empty() {
                break;
            }
            match dir.rfind('/') {
                Some(index) => dir.truncate(index),
                None => dir.clear(),
            }
            rest = tail;
        } else {
            break;
        }
    }

    if dir.is_empty() {
        rest.to_string()
    } else {
        format!("{dir}/{rest}")
    }
}

/// Loader serving module source text from a closure
pub struct SourceModuleLoader<F> {
    load: F,
}

impl<F> SourceModuleLoader<F>
where
    F: Fn(&str) -> Option<String>,
{
    pub fn new(load: F) -> Self {
        Self { load }
    }
}

impl<F> ModuleLoader for SourceModuleLoader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn is_bytecode_mode(&self) -> bool {
        false
    }

    fn module_string_code(&self, module_name: &str) -> Option<String> {
        (self.load)(module_name)
    }
}

/// Loader serving precompiled module bytecode from a closure
pub struct BytecodeModuleLoader<F> {
    load: F,
}

impl<F> BytecodeModuleLoader<F>
where
    F: Fn(&str) -> Option<Vec<u8>>,
{
    pub fn new(load: F) -> Self {
        Self { load }
    }
}

impl<F> ModuleLoader for BytecodeModuleLoader<F>
where
    F: Fn(&str) -> Option<Vec<u8>>,
{
    fn is_bytecode_mode(&self) -> bool {
        true
    }

    fn module_bytecode(&self, module_name: &str) -> Option<Vec<u8>> {
        (self.load)(module_name)
    }
}

/// Engine-facing adapter that looks up the context's current loader
pub(crate) struct LoaderBridge {
    pub(crate) context: Weak<ContextShared>,
}

impl LoaderBridge {
    fn loader(&self) -> Result<Rc<dyn ModuleLoader>, String> {
        self.context
            .upgrade()
            .and_then(|shared| shared.module_loader())
            .ok_or_else(|| LOADER_MISSING.to_string())
    }
}

impl ModuleProvider for LoaderBridge {
    fn normalize(&self, base: &str, name: &str) -> Result<String, String> {
        self.loader()?
            .normalize_name(base, name)
            .ok_or_else(|| MODULE_NAME_MISSING.to_string())
    }

    fn load(&self, name: &str) -> Result<ModuleSource, String> {
        let loader = self.loader()?;
        if loader.is_bytecode_mode() {
            loader
                .module_bytecode(name)
                .filter(|bytes| !bytes.is_empty())
                .map(ModuleSource::Bytecode)
                .ok_or_else(|| BYTECODE_MISSING.to_string())
        } else {
            loader
                .module_string_code(name)
                .map(ModuleSource::Source)
                .ok_or_else(|| STRING_CODE_MISSING.to_string())
        }
    }
}
