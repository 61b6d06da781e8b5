mod engine;
mod pools;
mod sigs;
mod types;

pub use engine::Engine;
pub use pools::PoolService;
pub use sigs::SigService;
pub use types::TypeService;

use crate::config::EngineConfig;
use crate::store::MemoryStore;
use std::sync::Arc;

/// All services wired to one store.
#[derive(Clone)]
pub struct Services {
    pub types: TypeService,
    pub sigs: SigService,
    pub pools: PoolService,
    pub engine: Engine,
}

impl Services {
    pub fn in_memory(config: EngineConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            types: TypeService::new(store.clone()),
            sigs: SigService::new(store.clone()),
            pools: PoolService::new(store.clone(), store.clone()),
            engine: Engine::new(store.clone(), store.clone(), store, config),
        }
    }
}
