//! First-class modules and the import cache (§4.8).

use std::path::PathBuf;

use ahash::AHashMap;

use crate::{heap::HeapId, namespace::GlobalTable};

/// A loaded module: its own global namespace plus the source path it was
/// resolved from, so re-`import`ing the same path returns the cached
/// instance instead of re-running top-level code (§4.8 Invariants: "a
/// module's top level runs at most once per program run").
#[derive(Debug)]
pub struct ModuleObj {
    pub name: HeapId,
    pub path: PathBuf,
    pub globals: GlobalTable,
    /// `None` while the module body is still executing (supports detecting
    /// an import cycle: re-entering a module whose `result_code` is still
    /// `None` is an error, not a silent empty-namespace import).
    pub result_code: Option<ModuleResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleResult {
    Ok,
    Err,
}

impl ModuleObj {
    pub fn new(name: HeapId, path: PathBuf) -> Self {
        Self { name, path, globals: GlobalTable::new(), result_code: None }
    }
}

/// Resolves `import` paths to already-loaded modules, keyed by canonical
/// filesystem path rather than the literal import string, so two different
/// relative spellings of the same file still share one module instance.
#[derive(Debug, Default)]
pub struct ModuleCache {
    by_path: AHashMap<PathBuf, HeapId>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self { by_path: AHashMap::default() }
    }

    pub fn get(&self, path: &std::path::Path) -> Option<HeapId> {
        self.by_path.get(path).copied()
    }

    pub fn insert(&mut self, path: PathBuf, module: HeapId) {
        self.by_path.insert(path, module);
    }

    /// Every loaded module, for GC rooting (§4.6) — a module can remain
    /// reachable purely through the cache even after the `import` alias that
    /// first brought it in has gone out of scope.
    pub fn all_modules(&self) -> impl Iterator<Item = HeapId> + '_ {
        self.by_path.values().copied()
    }

    pub fn is_loading(&self, path: &std::path::Path, heap: &crate::heap::Heap) -> bool {
        self.get(path).is_some_and(|id| match heap.get(id) {
            crate::heap::HeapObject::Module(m) => m.result_code.is_none(),
            _ => false,
        })
    }
}
