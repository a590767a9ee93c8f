//! Routing rules and the rule compiler.
//!
//! A rule maps an Ant-style pattern to an ordered list of handler names:
//!
//! ```text
//! [rules]
//! /orders/**   = validate, persist
//! /users/*/del = guard, audit, persist
//! ```
//!
//! [`RuleSet`] accumulates rules from any number of sources (textual
//! blocks, pre-built mappings, discovered handler rules) in declaration
//! order. It is merged once and then compiled by [`RuleCompiler`] into
//! [`CompiledRules`], an ordered list of `pattern -> Chain` pairs.
//! Compilation is all-or-nothing: one unknown handler name fails the whole
//! rule set and no chain is produced.

use crate::{pattern::AntPattern, registry::HandlerRegistry};
use chainring_core::{Chain, CompileError};
use std::sync::Arc;

/// Section read from a textual rule block when none is named explicitly.
pub const DEFAULT_RULE_SECTION: &str = "rules";

/// A single rule: a pattern and the handler names of its chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Ant-style pattern.
    pub pattern: String,
    /// Handler names, in chain order.
    pub handlers: Vec<String>,
}

impl Rule {
    /// Create a rule from a pattern and a comma-separated handler list.
    pub fn parse(pattern: impl Into<String>, handlers: &str) -> Result<Self, CompileError> {
        let pattern = pattern.into().trim().to_string();
        let handlers = split_handler_list(handlers);
        if handlers.is_empty() {
            return Err(CompileError::EmptyChainDefinition { pattern });
        }
        Ok(Self { pattern, handlers })
    }
}

/// An ordered collection of rules with last-writer-wins merging.
///
/// Re-declaring a pattern replaces its handler list but keeps the pattern's
/// original position, so first-match resolution order stays stable. A
/// replacement that changes the handler list is logged as a warning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// An empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a textual rule block.
    ///
    /// `section` selects the section to read. Without one, the `[rules]`
    /// section is used if present and non-empty, otherwise the unnamed
    /// section before the first header.
    pub fn parse(text: &str, section: Option<&str>) -> Result<Self, CompileError> {
        let ini = Ini::parse(text)?;
        let lines = match section {
            Some(name) => ini.section(name),
            None => ini
                .section(DEFAULT_RULE_SECTION)
                .filter(|s| !s.is_empty())
                .or_else(|| ini.section("")),
        };
        let mut rules = Self::new();
        for (line, pattern, handlers) in lines.map(Vec::as_slice).unwrap_or_default() {
            if pattern.is_empty() {
                return Err(CompileError::EmptyPattern { line: *line });
            }
            rules.insert(Rule::parse(pattern.as_str(), handlers)?);
        }
        Ok(rules)
    }

    /// Build a rule set from `(pattern, comma-separated handlers)` pairs.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, CompileError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut rules = Self::new();
        for (pattern, handlers) in pairs {
            rules.insert(Rule::parse(pattern, handlers)?);
        }
        Ok(rules)
    }

    /// Add a rule, replacing the handler list of an existing pattern.
    pub fn insert(&mut self, rule: Rule) {
        match self.rules.iter_mut().find(|r| r.pattern == rule.pattern) {
            Some(existing) => {
                if existing.handlers != rule.handlers {
                    tracing::warn!(
                        pattern = %rule.pattern,
                        previous = ?existing.handlers,
                        replacement = ?rule.handlers,
                        "rule pattern declared twice; later declaration wins"
                    );
                }
                existing.handlers = rule.handlers;
            }
            None => self.rules.push(rule),
        }
    }

    /// Add a rule from a pattern and handler names.
    pub fn add<I, S>(&mut self, pattern: impl Into<String>, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(Rule {
            pattern: pattern.into(),
            handlers: handlers.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Merge `other` into this set; its rules win on collisions.
    pub fn merge(&mut self, other: RuleSet) {
        for rule in other.rules {
            self.insert(rule);
        }
    }

    /// Rules in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if the set has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Rules compiled against a registry, in declaration order.
pub struct CompiledRules<E> {
    routes: Vec<(AntPattern, Chain<E>)>,
}

impl<E> CompiledRules<E> {
    /// Patterns and their chains, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&AntPattern, &Chain<E>)> {
        self.routes.iter().map(|(p, c)| (p, c))
    }

    /// The chain compiled for an exact pattern string.
    pub fn chain(&self, pattern: &str) -> Option<&Chain<E>> {
        self.routes
            .iter()
            .find(|(p, _)| p.as_str() == pattern)
            .map(|(_, c)| c)
    }

    /// Number of compiled rules.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no rule was compiled.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub(crate) fn into_routes(self) -> Vec<(AntPattern, Chain<E>)> {
        self.routes
    }
}

/// Compiles rule sets into chains using a handler registry.
pub struct RuleCompiler<'r, E> {
    registry: &'r HandlerRegistry<E>,
}

impl<'r, E> RuleCompiler<'r, E> {
    /// A compiler resolving handler names against `registry`.
    pub fn new(registry: &'r HandlerRegistry<E>) -> Self {
        Self { registry }
    }

    /// Compile every rule, failing on the first unknown handler name.
    pub fn compile(&self, rules: &RuleSet) -> Result<CompiledRules<E>, CompileError> {
        let mut routes = Vec::with_capacity(rules.len());
        for rule in rules.iter() {
            let mut handlers = Vec::with_capacity(rule.handlers.len());
            for name in &rule.handlers {
                let entry = self.registry.get(name).map_err(|_| {
                    CompileError::UnresolvedHandlerReference {
                        handler: name.clone(),
                        pattern: rule.pattern.clone(),
                    }
                })?;
                handlers.push(Arc::clone(entry));
            }
            tracing::debug!(pattern = %rule.pattern, chain = ?rule.handlers, "compiled rule");
            routes.push((
                AntPattern::new(rule.pattern.as_str()),
                Chain::new(rule.pattern.as_str(), handlers),
            ));
        }
        Ok(CompiledRules { routes })
    }
}

fn split_handler_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

// ============================================================================
// INI-style rule text
// ============================================================================

type SectionLines = Vec<(usize, String, String)>;

/// Minimal INI reader: `[section]` headers, `key = value` lines, `#` and
/// `;` comments. Keys are split from values at the first `=`.
struct Ini {
    sections: Vec<(String, SectionLines)>,
}

impl Ini {
    fn parse(text: &str) -> Result<Self, CompileError> {
        let mut sections: Vec<(String, SectionLines)> = vec![(String::new(), Vec::new())];
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim().to_string();
                if !sections.iter().any(|(n, _)| *n == name) {
                    sections.push((name.clone(), Vec::new()));
                }
                // move the current section to the end so following lines land in it
                if let Some(pos) = sections.iter().position(|(n, _)| *n == name) {
                    let section = sections.remove(pos);
                    sections.push(section);
                }
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(CompileError::MalformedRule {
                    line: idx + 1,
                    content: line.to_string(),
                });
            };
            if let Some((_, lines)) = sections.last_mut() {
                lines.push((idx + 1, key.trim().to_string(), value.trim().to_string()));
            }
        }
        Ok(Self { sections })
    }

    fn section(&self, name: &str) -> Option<&SectionLines> {
        self.sections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, lines)| lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainring_core::{BoxError, Delivery};

    fn registry(names: &[&str]) -> HandlerRegistry<()> {
        let mut registry = HandlerRegistry::new();
        for name in names {
            registry
                .register_terminal(*name, |_: &mut (), _: &Delivery| -> Result<(), BoxError> {
                    Ok(())
                })
                .unwrap();
        }
        registry
    }

    #[test]
    fn parses_rules_section_in_order() {
        let text = r"
            # ignored
            [rules]
            /orders/** = validate, persist
            /users/*   = notify
        ";
        let rules = RuleSet::parse(text, None).unwrap();
        let patterns: Vec<_> = rules.iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["/orders/**", "/users/*"]);
        assert_eq!(rules.iter().next().unwrap().handlers, vec!["validate", "persist"]);
    }

    #[test]
    fn falls_back_to_unnamed_section() {
        let rules = RuleSet::parse("a/** = x\n[other]\nb = y", None).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.iter().next().unwrap().pattern, "a/**");

        let other = RuleSet::parse("a/** = x\n[other]\nb = y", Some("other")).unwrap();
        assert_eq!(other.iter().next().unwrap().pattern, "b");
    }

    #[test]
    fn splits_on_first_equals_only() {
        let rules = RuleSet::parse("/q = a,b\n/r=c", None).unwrap();
        assert_eq!(rules.len(), 2);
        let err = RuleSet::parse("/q a,b", None).unwrap_err();
        assert_eq!(
            err,
            CompileError::MalformedRule {
                line: 1,
                content: "/q a,b".into()
            }
        );
        assert_eq!(
            RuleSet::parse("/q = , ,", None).unwrap_err(),
            CompileError::EmptyChainDefinition { pattern: "/q".into() }
        );
        assert_eq!(
            RuleSet::parse(" = a", None).unwrap_err(),
            CompileError::EmptyPattern { line: 1 }
        );
    }

    #[test]
    fn later_declaration_wins_but_keeps_position() {
        let mut rules = RuleSet::from_pairs([("/a/**", "x"), ("/b", "y")]).unwrap();
        rules.merge(RuleSet::from_pairs([("/a/**", "z")]).unwrap());
        let collected: Vec<_> = rules
            .iter()
            .map(|r| (r.pattern.as_str(), r.handlers.join(",")))
            .collect();
        assert_eq!(
            collected,
            vec![("/a/**", "z".to_string()), ("/b", "y".to_string())]
        );
    }

    #[test]
    fn compiles_chains_in_declared_order() {
        let registry = registry(&["validate", "persist", "notify"]);
        let rules = RuleSet::from_pairs([("orders/**", "persist, validate")]).unwrap();
        let compiled = RuleCompiler::new(&registry).compile(&rules).unwrap();
        assert_eq!(
            compiled.chain("orders/**").unwrap().handler_names(),
            vec!["persist", "validate"]
        );
    }

    #[test]
    fn unknown_handler_fails_the_whole_set() {
        let registry = registry(&["validate"]);
        let rules = RuleSet::from_pairs([("ok/**", "validate"), ("bad/**", "validate, ghost")])
            .unwrap();
        let err = RuleCompiler::new(&registry).compile(&rules).err().unwrap();
        assert_eq!(
            err,
            CompileError::UnresolvedHandlerReference {
                handler: "ghost".into(),
                pattern: "bad/**".into()
            }
        );
    }
}
