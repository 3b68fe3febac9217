//! Lexical type environments (§4.3): a stack of scopes plus a flat table of
//! named type definitions, mirroring the scope-stack shape
//! `saffron::bytecode::compiler::Compiler` uses for locals.

use ahash::AHashMap;

use crate::types::Type;

pub struct TypeEnv {
    scopes: Vec<AHashMap<String, Type>>,
    pub type_defs: AHashMap<String, Type>,
}

impl TypeEnv {
    pub fn new() -> Self {
        Self { scopes: vec![AHashMap::new()], type_defs: AHashMap::new() }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(AHashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn define(&mut self, name: impl Into<String>, ty: Type) {
        self.scopes.last_mut().expect("at least one scope is always active").insert(name.into(), ty);
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}
