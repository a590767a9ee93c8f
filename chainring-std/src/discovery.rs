//! Explicit handler discovery.
//!
//! Handlers are announced to the engine as [`Component`]s. A component is
//! either a handler, optionally carrying the routing rule it wants to be
//! reachable by, or a dispatcher stage definition. The role is chosen at
//! registration; nothing is inferred from the handler's type.
//!
//! # Rule seeding
//!
//! Handler rules seed the stages' rule sets:
//!
//! - Without explicit stage definitions, every distinct stage id named by a
//!   rule becomes a stage, prioritized in order of first appearance. With no
//!   rules either, a single `default` stage runs the default chain.
//! - With explicit definitions, the rules of each stage id are merged into
//!   the definition of the same name, before the definition's own mapping
//!   and textual block.
//!
//! Handlers declaring the same pattern for the same stage form one chain in
//! declaration order.

use crate::config::StageDefinition;
use crate::rules::RuleSet;
use chainring_core::{ChainHandler, CompileError, EventHandler, HandlerKind};
use std::fmt;

/// Stage id used by rules that do not name one.
pub const DEFAULT_STAGE: &str = "default";

/// The routing rule a handler declares for itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRule {
    /// Ant-style pattern.
    pub pattern: String,
    /// Id of the stage the rule belongs to.
    pub stage: String,
}

impl EventRule {
    /// A rule for the default stage.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self::for_stage(pattern, DEFAULT_STAGE)
    }

    /// A rule for the stage `stage`.
    pub fn for_stage(pattern: impl Into<String>, stage: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            stage: stage.into(),
        }
    }
}

/// A handler announced to the engine.
pub struct HandlerDescriptor<E> {
    /// Registration name.
    pub name: String,
    /// The handler, tagged terminal or chaining.
    pub handler: HandlerKind<E>,
    /// Routing rule declared by the handler, if any.
    pub rule: Option<EventRule>,
    /// Initial enabled state.
    pub enabled: bool,
}

impl<E> HandlerDescriptor<E> {
    /// Describe an enabled handler with no rule.
    pub fn new(name: impl Into<String>, handler: HandlerKind<E>) -> Self {
        Self {
            name: name.into(),
            handler,
            rule: None,
            enabled: true,
        }
    }

    /// Describe a terminal handler.
    pub fn terminal<H: EventHandler<E> + 'static>(name: impl Into<String>, handler: H) -> Self {
        Self::new(name, HandlerKind::terminal(handler))
    }

    /// Describe a chaining handler.
    pub fn chaining<H: ChainHandler<E> + 'static>(name: impl Into<String>, handler: H) -> Self {
        Self::new(name, HandlerKind::chaining(handler))
    }

    /// Route `pattern` in the default stage to this handler.
    pub fn with_rule(self, pattern: impl Into<String>) -> Self {
        self.with_event_rule(EventRule::new(pattern))
    }

    /// Route `pattern` in `stage` to this handler.
    pub fn with_stage_rule(self, pattern: impl Into<String>, stage: impl Into<String>) -> Self {
        self.with_event_rule(EventRule::for_stage(pattern, stage))
    }

    /// Declare `rule` for this handler.
    pub fn with_event_rule(mut self, rule: EventRule) -> Self {
        self.rule = Some(rule);
        self
    }

    /// Register the handler disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl<E> fmt::Debug for HandlerDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("handler", &self.handler)
            .field("rule", &self.rule)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// A component announced to the engine, tagged by role.
#[derive(Debug)]
pub enum Component<E> {
    /// A handler available for chaining.
    Handler(HandlerDescriptor<E>),
    /// A dispatch stage definition.
    Dispatcher(StageDefinition),
}

impl<E> From<HandlerDescriptor<E>> for Component<E> {
    fn from(descriptor: HandlerDescriptor<E>) -> Self {
        Component::Handler(descriptor)
    }
}

impl<E> From<StageDefinition> for Component<E> {
    fn from(definition: StageDefinition) -> Self {
        Component::Dispatcher(definition)
    }
}

/// A stage ready to compile: name, priority and merged rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    /// Stage id.
    pub name: String,
    /// Lower runs first.
    pub priority: i32,
    /// Merged rules of the stage.
    pub rules: RuleSet,
}

/// Seed stage plans from handler rules and explicit definitions.
///
/// `rules` pairs each declared rule with the name of its handler, in
/// declaration order.
pub fn plan_stages(
    rules: &[(EventRule, String)],
    definitions: &[StageDefinition],
) -> Result<Vec<StagePlan>, CompileError> {
    if definitions.is_empty() {
        let mut stage_ids: Vec<&str> = Vec::new();
        for (rule, _) in rules {
            if !stage_ids.contains(&rule.stage.as_str()) {
                stage_ids.push(&rule.stage);
            }
        }
        if stage_ids.is_empty() {
            return Ok(vec![StagePlan {
                name: DEFAULT_STAGE.to_string(),
                priority: 0,
                rules: RuleSet::new(),
            }]);
        }
        return Ok(stage_ids
            .into_iter()
            .zip(0..)
            .map(|(stage, priority)| StagePlan {
                name: stage.to_string(),
                priority,
                rules: seed_rules(rules, stage),
            })
            .collect());
    }

    for (rule, handler) in rules {
        if !definitions.iter().any(|d| d.name == rule.stage) {
            tracing::warn!(
                handler = %handler,
                pattern = %rule.pattern,
                stage = %rule.stage,
                "handler rule names an undefined stage; ignored"
            );
        }
    }
    definitions
        .iter()
        .map(|definition| {
            let mut merged = seed_rules(rules, &definition.name);
            merged.merge(definition.rule_set()?);
            Ok(StagePlan {
                name: definition.name.clone(),
                priority: definition.priority,
                rules: merged,
            })
        })
        .collect()
}

fn seed_rules(rules: &[(EventRule, String)], stage: &str) -> RuleSet {
    let mut seeded: Vec<(String, Vec<String>)> = Vec::new();
    for (rule, handler) in rules.iter().filter(|(r, _)| r.stage == stage) {
        match seeded.iter_mut().find(|(p, _)| *p == rule.pattern) {
            Some((_, handlers)) => handlers.push(handler.clone()),
            None => seeded.push((rule.pattern.clone(), vec![handler.clone()])),
        }
    }
    let mut set = RuleSet::new();
    for (pattern, handlers) in seeded {
        set.add(pattern, handlers);
    }
    set
}
