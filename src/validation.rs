use std::fmt::Display;

use crate::{
    error::{EngineError, ErrorKind, ErrorStrategy},
    parser::ast::*,
    position::Position,
    registry::{ResolverRegistry, TemplateRegistry},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// One finding of the static validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
    pub position: Position,
}

impl Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{}: {} ({})",
            self.severity, self.message, self.position
        ))
    }
}

/// The outcome of validating one template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationResult {
    pub issues: Vec<Issue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|issue| issue.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Warning)
    }

    /// Collapse the result into an error carrying the first error-severity
    /// issue, for callers that want validation to gate execution.
    pub fn into_error(self) -> Option<EngineError> {
        let count = self.errors().count();
        let first = self
            .issues
            .into_iter()
            .find(|issue| issue.severity == Severity::Error)?;

        Some(EngineError::at(
            ErrorKind::ValidationFailed,
            format!("{count} validation error(s), first: {}", first.message),
            first.position,
        ))
    }
}

/// Static validation: a read-only pass over a parsed template. It never
/// executes resolvers and never touches the registries beyond lookups, so
/// running it is free of observable side effects.
pub(crate) fn validate_template(
    template: &TemplateData,
    resolvers: &ResolverRegistry,
    templates: &TemplateRegistry,
) -> ValidationResult {
    let mut validator = Validator {
        resolvers,
        templates,
        issues: vec![],
    };

    if let Some(parent) = &template.inherits {
        if !templates.has(parent) {
            validator.warning(
                format!("parent template '{parent}' is not registered (it may be registered later)"),
                Position::start(),
            );
        }
    }

    validator.check_nodes(&template.root_body, true, false);

    let mut result = ValidationResult {
        issues: validator.issues,
    };
    result
        .issues
        .sort_by_key(|issue| (issue.position.offset, issue.severity));
    result
}

struct Validator<'a> {
    resolvers: &'a ResolverRegistry,
    templates: &'a TemplateRegistry,
    issues: Vec<Issue>,
}

impl Validator<'_> {
    fn error(&mut self, message: impl ToString, position: Position) {
        self.issues.push(Issue {
            severity: Severity::Error,
            message: message.to_string(),
            position,
        });
    }

    fn warning(&mut self, message: impl ToString, position: Position) {
        self.issues.push(Issue {
            severity: Severity::Warning,
            message: message.to_string(),
            position,
        });
    }

    fn check_nodes(&mut self, nodes: &[Node], at_root: bool, in_block: bool) {
        for node in nodes {
            self.check_node(node, at_root, in_block);
        }
    }

    fn check_node(&mut self, node: &Node, at_root: bool, in_block: bool) {
        match node {
            Node::Text(_) | Node::Raw(_) => {}
            Node::Comment(comment) => self.check_nodes(&comment.body, false, in_block),
            Node::Variable(variable) => {
                if variable.name.is_empty() {
                    self.error("prompty.var requires a 'name' attribute", variable.position);
                }
                self.check_on_error(variable.on_error.as_deref(), variable.position);
            }
            Node::Include(include) => {
                if include.template_name.is_empty() {
                    self.error(
                        "prompty.include requires a 'template' attribute",
                        include.position,
                    );
                } else if !self.templates.has(&include.template_name) {
                    self.warning(
                        format!(
                            "template '{}' is not registered (it may be registered later)",
                            include.template_name
                        ),
                        include.position,
                    );
                }
                self.check_on_error(include.attributes.get("on_error"), include.position);
            }
            Node::Extends(extends) => {
                if !at_root {
                    self.error(
                        "prompty.extends must appear at the top level of a template",
                        extends.position,
                    );
                }
                if extends.parent.is_empty() {
                    self.error(
                        "prompty.extends requires a 'template' attribute",
                        extends.position,
                    );
                }
            }
            Node::Block(block) => self.check_nodes(&block.body, false, true),
            Node::ParentCall(parent_call) => {
                if !in_block {
                    self.warning(
                        "prompty.parent outside of a block produces no output",
                        parent_call.position,
                    );
                }
            }
            Node::If(conditional) => {
                for branch in &conditional.branches {
                    self.check_nodes(&branch.body, false, in_block);
                }
                if let Some(else_body) = &conditional.else_body {
                    self.check_nodes(else_body, false, in_block);
                }
            }
            Node::For(for_loop) => {
                if for_loop.item.is_empty() {
                    self.error("prompty.for requires an 'item' attribute", for_loop.position);
                }
                self.check_nodes(&for_loop.body, false, in_block);
            }
            Node::Switch(switch) => {
                for case in &switch.cases {
                    self.check_nodes(&case.body, false, in_block);
                }
                if let Some(default_body) = &switch.default_body {
                    self.check_nodes(default_body, false, in_block);
                }
            }
            Node::Message(message) => {
                if message.role.is_empty() {
                    self.error(
                        "prompty.message requires a 'role' attribute",
                        message.position,
                    );
                }
                self.check_nodes(&message.body, false, in_block);
            }
            Node::ResolverCall(call) => {
                self.check_on_error(call.attributes.get("on_error"), call.position);

                if !self.resolvers.has(&call.tag_name) {
                    self.warning(
                        format!(
                            "no resolver registered for tag '{}' (it may be registered later)",
                            call.tag_name
                        ),
                        call.position,
                    );
                } else if let Some(handle) = self.resolvers.get(&call.tag_name) {
                    if let Err(message) = handle.validate(&call.attributes) {
                        self.error(
                            format!("resolver '{}' rejected the tag: {message}", call.tag_name),
                            call.position,
                        );
                    }
                }

                if let Some(body) = &call.body {
                    self.check_nodes(body, false, in_block);
                }
            }
        }
    }

    fn check_on_error(&mut self, on_error: Option<&str>, position: Position) {
        let Some(raw) = on_error else {
            return;
        };

        if ErrorStrategy::parse(raw).is_none() {
            self.error(
                format!(
                    "invalid on_error value '{raw}' (expected throw, default, remove, keepraw or log)"
                ),
                position,
            );
        }
    }
}
