//! Path-matching chain resolver.

use crate::{pattern::AntPattern, rules::CompiledRules};
use chainring_core::{Chain, ChainResolver};

/// Resolves chains by Ant-style pattern, first match in declaration order.
///
/// No specificity ranking is applied: declare specific patterns (`/a/b`)
/// before general ones (`/a/**`), or the general one will shadow them.
pub struct PathMatchingResolver<E> {
    routes: Vec<(AntPattern, Chain<E>)>,
}

impl<E> PathMatchingResolver<E> {
    /// Create a resolver over compiled rules.
    pub fn new(rules: CompiledRules<E>) -> Self {
        Self {
            routes: rules.into_routes(),
        }
    }

    /// The first chain whose pattern matches `routing_key`.
    pub fn find(&self, routing_key: &str) -> Option<&Chain<E>> {
        self.routes
            .iter()
            .find(|(pattern, _)| pattern.matches(routing_key))
            .map(|(_, chain)| chain)
    }

    /// Patterns in resolution order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(p, _)| p.as_str())
    }

    /// Returns `true` if no route is compiled.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<E> ChainResolver<E> for PathMatchingResolver<E> {
    fn resolve<'a>(&'a self, routing_key: &str, default: &'a Chain<E>) -> &'a Chain<E> {
        match self.find(routing_key) {
            Some(chain) => {
                tracing::trace!(routing_key, pattern = %chain.name(), "resolved configured chain");
                chain
            }
            None => {
                tracing::trace!(routing_key, "no pattern matched; using default chain");
                default
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        registry::HandlerRegistry,
        rules::{RuleCompiler, RuleSet},
    };
    use chainring_core::{BoxError, Delivery};

    fn build(pairs: &[(&str, &str)]) -> (PathMatchingResolver<()>, Chain<()>) {
        let mut registry = HandlerRegistry::new();
        for name in ["a", "b", "c"] {
            registry
                .register_terminal(name, |_: &mut (), _: &Delivery| -> Result<(), BoxError> {
                    Ok(())
                })
                .unwrap();
        }
        let rules = RuleSet::from_pairs(pairs.iter().copied()).unwrap();
        let compiled = RuleCompiler::new(&registry).compile(&rules).unwrap();
        (PathMatchingResolver::new(compiled), registry.default_chain())
    }

    #[test]
    fn first_declared_match_wins() {
        let (resolver, default) = build(&[("/a/b", "a"), ("/a/**", "b")]);
        assert_eq!(resolver.resolve("/a/b", &default).name(), "/a/b");
        assert_eq!(resolver.resolve("/a/c", &default).name(), "/a/**");

        // the general pattern first shadows the specific one
        let (resolver, default) = build(&[("/a/**", "b"), ("/a/b", "a")]);
        assert_eq!(resolver.resolve("/a/b", &default).name(), "/a/**");
    }

    #[test]
    fn falls_back_to_default_chain() {
        let (resolver, default) = build(&[("/orders/**", "a,b")]);
        let chain = resolver.resolve("/users/create", &default);
        assert_eq!(chain.handler_names(), vec!["a", "b", "c"]);
        assert!(resolver.find("/users/create").is_none());
    }

    #[test]
    fn lists_patterns_in_resolution_order() {
        let (resolver, _) = build(&[("/x", "a"), ("/y/*", "b"), ("/**", "c")]);
        assert_eq!(resolver.patterns().collect::<Vec<_>>(), vec!["/x", "/y/*", "/**"]);
    }
}
