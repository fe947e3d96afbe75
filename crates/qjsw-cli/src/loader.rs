//! File-system module loader.

use std::path::{Path, PathBuf};

use qjsw_runtime::ModuleLoader;
use qjsw_runtime::loader::normalize_module_name;
use tracing::debug;

/// Serves module source from disk.
///
/// Relative specifiers resolve against the importing module, bare ones
/// against `root`.
#[derive(Debug, Clone)]
pub struct FileModuleLoader {
    root: PathBuf,
}

impl FileModuleLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ModuleLoader for FileModuleLoader {
    fn is_bytecode_mode(&self) -> bool {
        false
    }

    fn module_string_code(&self, module_name: &str) -> Option<String> {
        match std::fs::read_to_string(module_name) {
            Ok(source) => {
                debug!(module = module_name, "module loaded");
                Some(source)
            }
            Err(e) => {
                debug!(module = module_name, error = %e, "module not readable");
                None
            }
        }
    }

    fn normalize_name(&self, base_name: &str, module_name: &str) -> Option<String> {
        if module_name.starts_with('.') {
            return Some(normalize_module_name(base_name, module_name));
        }
        let path = Path::new(module_name);
        if path.is_absolute() {
            return Some(module_name.to_string());
        }
        Some(self.root.join(path).to_string_lossy().into_owned())
    }
}
