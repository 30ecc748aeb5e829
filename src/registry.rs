use crate::{EvalError, EvalResult, Expr, Type};
use hashbrown::HashMap;
use lasso::{Rodeo, RodeoReader, Spur};
use smallvec::SmallVec;
use std::sync::Arc;

/// A named specification function. Parameters are substituted wholesale into
/// `body` at call time.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Arc<str>,
    pub params: SmallVec<[Arc<str>; 4]>,
    pub body: Expr,
    /// Declared return type, used only for type inference.
    pub ret: Option<Type>,
}

impl Function {
    pub fn new<P: Into<Arc<str>>>(
        name: impl Into<Arc<str>>,
        params: impl IntoIterator<Item = P>,
        body: Expr,
    ) -> Self {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
            body,
            ret: None,
        }
    }

    pub fn returning(mut self, ty: Type) -> Self {
        self.ret = Some(ty);
        self
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Collects function definitions and interns their names. Once everything is
/// defined, `build` freezes it into a read-only `Registry`.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    fns: HashMap<Spur, Function>,
    strs: Rodeo<Spur>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, f: Function) -> EvalResult<&mut Self> {
        let key = self.strs.get_or_intern(&*f.name);
        if self.fns.contains_key(&key) {
            return Err(EvalError::DuplicateFunction(f.name.to_string()));
        }
        self.fns.insert(key, f);
        Ok(self)
    }

    pub fn build(self) -> Registry {
        Registry {
            fns: self.fns,
            strs: self.strs.into_reader(),
        }
    }
}

/// The function table for evaluation. It never changes after it's built, so
/// any number of runs can share one by reference.
#[derive(Debug)]
pub struct Registry {
    fns: HashMap<Spur, Function>,
    strs: RodeoReader<Spur>,
}

impl Registry {
    pub fn from_functions(fns: impl IntoIterator<Item = Function>) -> EvalResult<Self> {
        let mut builder = RegistryBuilder::new();
        for f in fns {
            builder.define(f)?;
        }
        Ok(builder.build())
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.strs.get(name).and_then(|key| self.fns.get(&key))
    }

    pub fn lookup(&self, name: &str) -> EvalResult<&Function> {
        self.get(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.fns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }

    /// Function names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fns.keys().map(move |k| self.strs.resolve(k))
    }
}

impl Default for Registry {
    fn default() -> Self {
        RegistryBuilder::new().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident() -> Function {
        Function::new("id", ["x"], Expr::var("x"))
    }

    #[test]
    fn looks_up_by_exact_name() {
        let reg = Registry::from_functions([ident().returning(Type::int())]).unwrap();
        assert_eq!(reg.len(), 1);
        let f = reg.get("id").unwrap();
        assert_eq!(f.arity(), 1);
        assert_eq!(f.ret, Some(Type::int()));
        assert!(reg.get("Id").is_none());
        assert_eq!(
            reg.lookup("nope").unwrap_err(),
            EvalError::UnknownFunction("nope".into())
        );
        assert_eq!(reg.names().collect::<Vec<_>>(), ["id"]);
    }

    #[test]
    fn rejects_duplicate_definitions() {
        let err = Registry::from_functions([ident(), ident()]).unwrap_err();
        assert_eq!(err, EvalError::DuplicateFunction("id".into()));
    }

    #[test]
    fn empty_registry() {
        let reg = Registry::default();
        assert!(reg.is_empty());
        assert!(reg.get("len").is_none());
    }
}
