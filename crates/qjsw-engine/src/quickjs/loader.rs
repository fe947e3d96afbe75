//! Resolver/loader hooks forwarding imports to the installed module provider

use std::rc::Rc;

use rquickjs::loader::{Loader, Resolver};
use rquickjs::module::Declared;
use rquickjs::{Ctx, Error, Module};
use tracing::debug;

use super::shared::EngineShared;
use crate::engine::ModuleProvider;
use crate::value::ModuleSource;

const NO_PROVIDER: &str = "Failed to load module, no module provider installed!";

fn provider(shared: &EngineShared) -> Result<Rc<dyn ModuleProvider>, String> {
    shared
        .provider
        .borrow()
        .clone()
        .ok_or_else(|| NO_PROVIDER.to_string())
}

pub(crate) struct ProviderResolver {
    pub(crate) shared: Rc<EngineShared>,
}

impl Resolver for ProviderResolver {
    fn resolve<'js>(&mut self, _ctx: &Ctx<'js>, base: &str, name: &str) -> rquickjs::Result<String> {
        provider(&self.shared)
            .and_then(|provider| provider.normalize(base, name))
            .map_err(|message| {
                self.shared.record_module_error(&message);
                Error::new_resolving_message(base, name, message)
            })
    }
}

pub(crate) struct ProviderLoader {
    pub(crate) shared: Rc<EngineShared>,
}

impl Loader for ProviderLoader {
    fn load<'js>(&mut self, ctx: &Ctx<'js>, name: &str) -> rquickjs::Result<Module<'js, Declared>> {
        let source = provider(&self.shared)
            .and_then(|provider| provider.load(name))
            .map_err(|message| {
                self.shared.record_module_error(&message);
                Error::new_loading_message(name, message)
            })?;

        match source {
            ModuleSource::Source(code) => {
                debug!(module = name, "declaring module from source");
                Module::declare(ctx.clone(), name, code)
            }
            ModuleSource::Bytecode(bytes) => {
                debug!(module = name, len = bytes.len(), "loading module bytecode");
                // SAFETY: the bytes come from the host's own bytecode loader;
                // the engine validates the format while reading.
                unsafe { Module::load(ctx.clone(), &bytes) }
            }
        }
    }
}
