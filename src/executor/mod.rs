mod inheritance;
mod messages;

pub use messages::{extract_messages, ExtractedMessage};

use std::{collections::BTreeMap, ops::Range, sync::Arc, time::Instant};

use log::{debug, trace};

use crate::{
    context::Context,
    engine::EngineCore,
    error::{EngineError, EngineResult, ErrorKind, ErrorStrategy},
    expression::{Evaluator, Expr, FunctionCaller},
    isolation::{run_isolated, CancelToken},
    parser::ast::*,
    position::Position,
    registry::{check_arity, ResolverContext},
    value::Value,
};

use self::inheritance::{resolve_chain, InheritanceChain};

/// One template on the execution stack: its inheritance chain (if it extends
/// a parent) and the stack of block override levels currently being rendered.
struct TemplateFrame {
    chain: Option<InheritanceChain>,
    block_stack: Vec<(String, usize)>,
}

/// Walks a template AST and produces the output string.
///
/// The walk is single-threaded and cooperative: cancellation, the wall-clock
/// budget and the output cap are checked at every node entry. Plugin calls
/// are dispatched through the isolation envelope.
pub(crate) struct Executor<'e> {
    engine: &'e EngineCore,
    cancel: CancelToken,
    started: Instant,
    output: String,
    iterations: usize,
    include_depth: usize,
    include_chain: Vec<String>,
    template_stack: Vec<Arc<TemplateData>>,
    frames: Vec<TemplateFrame>,
}

impl<'e> Executor<'e> {
    pub fn new(engine: &'e EngineCore, cancel: CancelToken) -> Self {
        Self {
            engine,
            cancel,
            started: Instant::now(),
            output: String::new(),
            iterations: 0,
            include_depth: 0,
            include_chain: vec![],
            template_stack: vec![],
            frames: vec![],
        }
    }

    pub fn run(mut self, template: &Arc<TemplateData>, context: &mut Context) -> EngineResult<String> {
        debug!("executing template ({} root nodes)", template.root_body.len());
        self.execute_template(template, context)?;
        Ok(self.output)
    }

    fn execute_template(
        &mut self,
        template: &Arc<TemplateData>,
        context: &mut Context,
    ) -> EngineResult<()> {
        match &template.inherits {
            Some(parent) => {
                let position = extends_position(template);
                let remaining = self
                    .engine
                    .options
                    .max_depth
                    .saturating_sub(self.include_depth)
                    .max(1);
                let chain = resolve_chain(
                    Arc::clone(template),
                    parent,
                    &self.engine.templates,
                    remaining,
                    position,
                )?;

                let root = Arc::clone(chain.root());
                self.frames.push(TemplateFrame {
                    chain: Some(chain),
                    block_stack: vec![],
                });
                self.template_stack.push(Arc::clone(&root));

                let result = self.execute_nodes(&root.root_body, context);

                self.template_stack.pop();
                self.frames.pop();
                result
            }
            None => {
                self.frames.push(TemplateFrame {
                    chain: None,
                    block_stack: vec![],
                });
                self.template_stack.push(Arc::clone(template));

                let result = self.execute_nodes(&template.root_body, context);

                self.template_stack.pop();
                self.frames.pop();
                result
            }
        }
    }

    fn execute_nodes(&mut self, nodes: &[Node], context: &mut Context) -> EngineResult<()> {
        for node in nodes {
            self.checkpoint(node.position())?;
            self.execute_node(node, context)?;
        }
        Ok(())
    }

    fn execute_node(&mut self, node: &Node, context: &mut Context) -> EngineResult<()> {
        match node {
            Node::Text(text) => self.push_output(&text.content, text.position),
            Node::Raw(raw) => self.push_output(&raw.content, raw.position),
            Node::Comment(_) => Ok(()),
            // An extends marker at the root was consumed by execute_template;
            // a stray nested one produces nothing.
            Node::Extends(_) => Ok(()),
            Node::Variable(variable) => self.execute_variable(variable, context),
            Node::Include(include) => self.execute_include(include, context),
            Node::Block(block) => self.execute_block(block, context),
            Node::ParentCall(parent_call) => self.execute_parent_call(parent_call, context),
            Node::If(conditional) => self.execute_if(conditional, context),
            Node::For(for_loop) => self.execute_for(for_loop, context),
            Node::Switch(switch) => self.execute_switch(switch, context),
            Node::Message(message) => self.execute_message(message, context),
            Node::ResolverCall(call) => self.execute_resolver_call(call, context),
        }
    }

    fn execute_variable(&mut self, variable: &Variable, context: &mut Context) -> EngineResult<()> {
        match context.lookup_path(&variable.name) {
            Some(value) => self.push_output(&value.render(), variable.position),
            None => {
                let error = EngineError::at(
                    ErrorKind::VariableUndefined,
                    format!("variable '{}' is not defined", variable.name),
                    variable.position,
                );
                let strategy =
                    self.effective_strategy(variable.on_error.as_deref(), variable.default.is_some());
                self.recover(error, strategy, variable.default.as_deref(), &variable.span)
            }
        }
    }

    fn execute_include(&mut self, include: &Include, context: &mut Context) -> EngineResult<()> {
        let strategy = self.effective_strategy(
            include.attributes.get("on_error"),
            include.default_value().is_some(),
        );

        let Some(target) = self.engine.templates.get(&include.template_name) else {
            let error = EngineError::at(
                ErrorKind::Registry,
                format!("template '{}' is not registered", include.template_name),
                include.position,
            );
            return self.recover(error, strategy, include.default_value(), &include.span);
        };

        if self.include_chain.contains(&include.template_name) {
            return Err(EngineError::at(
                ErrorKind::Resource,
                format!("include cycle through template '{}'", include.template_name),
                include.position,
            ));
        }

        if self.include_depth + 1 > self.engine.options.max_depth {
            return Err(EngineError::at(
                ErrorKind::Resource,
                format!("include depth exceeds {}", self.engine.options.max_depth),
                include.position,
            ));
        }

        // Bindings are evaluated in the including scope.
        let mut bindings = Vec::with_capacity(include.bindings.len());
        for binding in &include.bindings {
            let value = self.evaluate_expr(&binding.expression, context, binding.position)?;
            bindings.push((binding.name.clone(), value));
        }

        self.include_chain.push(include.template_name.clone());
        self.include_depth += 1;

        let result = if include.isolate {
            let mut child = Context::new();
            child.enter_scope();
            for (name, value) in bindings {
                child.bind(name, value);
            }
            self.execute_template(&target, &mut child)
        } else if let Some(path) = &include.with_path {
            let mut child = Context::with_root(&context.resolve_path(path));
            child.enter_scope();
            for (name, value) in bindings {
                child.bind(name, value);
            }
            self.execute_template(&target, &mut child)
        } else {
            context.enter_scope();
            for (name, value) in bindings {
                context.bind(name, value);
            }
            let result = self.execute_template(&target, context);
            context.exit_scope();
            result
        };

        self.include_depth -= 1;
        self.include_chain.pop();
        result
    }

    fn execute_block(&mut self, block: &BlockDef, context: &mut Context) -> EngineResult<()> {
        let overridden = self
            .frames
            .last()
            .and_then(|frame| frame.chain.as_ref())
            .and_then(|chain| chain.declarers.get(&block.name))
            .is_some();

        if overridden {
            self.execute_block_level(&block.name, 0, context)
        } else {
            self.execute_nodes(&block.body, context)
        }
    }

    fn execute_parent_call(
        &mut self,
        _parent_call: &ParentCall,
        context: &mut Context,
    ) -> EngineResult<()> {
        let Some((name, level)) = self
            .frames
            .last()
            .and_then(|frame| frame.block_stack.last())
            .cloned()
        else {
            // Outside a block override there is no parent body to insert.
            return Ok(());
        };

        self.execute_block_level(&name, level + 1, context)
    }

    /// Render the body a block has at the given override level of the active
    /// inheritance chain; levels past the root-most declarer render nothing.
    fn execute_block_level(
        &mut self,
        name: &str,
        level: usize,
        context: &mut Context,
    ) -> EngineResult<()> {
        let Some(frame) = self.frames.last() else {
            return Ok(());
        };
        let Some(chain) = &frame.chain else {
            return Ok(());
        };
        let Some(declarers) = chain.declarers.get(name) else {
            return Ok(());
        };
        let Some(&template_index) = declarers.get(level) else {
            return Ok(());
        };

        let template = Arc::clone(&chain.chain[template_index]);
        let Some(block) = template.declared_blocks.get(name) else {
            return Ok(());
        };
        let body = block.body.clone();

        if let Some(frame) = self.frames.last_mut() {
            frame.block_stack.push((name.to_owned(), level));
        }
        self.template_stack.push(template);

        let result = self.execute_nodes(&body, context);

        self.template_stack.pop();
        if let Some(frame) = self.frames.last_mut() {
            frame.block_stack.pop();
        }

        result
    }

    fn execute_if(&mut self, conditional: &IfBlock, context: &mut Context) -> EngineResult<()> {
        for branch in &conditional.branches {
            let value = self.evaluate_expr(&branch.condition, context, branch.position)?;
            if value.is_truthy() {
                context.enter_scope();
                let result = self.execute_nodes(&branch.body, context);
                context.exit_scope();
                return result;
            }
        }

        if let Some(else_body) = &conditional.else_body {
            context.enter_scope();
            let result = self.execute_nodes(else_body, context);
            context.exit_scope();
            return result;
        }

        Ok(())
    }

    fn execute_for(&mut self, for_loop: &ForBlock, context: &mut Context) -> EngineResult<()> {
        let collection = self.evaluate_expr(&for_loop.collection, context, for_loop.position)?;

        let items: Vec<Value> = match collection {
            Value::Seq(items) => items,
            // Mapping iteration is sorted by key and yields {key, value}
            // records; item.key recovers the plain string form.
            Value::Map(entries) => entries
                .into_iter()
                .map(|(key, value)| {
                    let mut record = BTreeMap::new();
                    record.insert("key".to_owned(), Value::String(key));
                    record.insert("value".to_owned(), value);
                    Value::Map(record)
                })
                .collect(),
            other => {
                return Err(EngineError::at(
                    ErrorKind::ExprEval,
                    format!("cannot iterate a {}", other.type_name()),
                    for_loop.position,
                ))
            }
        };

        let limit = for_loop.limit.unwrap_or(usize::MAX);

        for (index, item) in items.into_iter().take(limit).enumerate() {
            self.checkpoint(for_loop.position)?;

            self.iterations += 1;
            if self.iterations > self.engine.options.max_iterations {
                return Err(EngineError::at(
                    ErrorKind::Resource,
                    format!(
                        "iteration budget of {} exceeded",
                        self.engine.options.max_iterations
                    ),
                    for_loop.position,
                ));
            }

            context.enter_scope();
            context.bind(&for_loop.item, item);
            if let Some(index_name) = &for_loop.index {
                context.bind(index_name, Value::Int(index as i64));
            }
            let result = self.execute_nodes(&for_loop.body, context);
            context.exit_scope();
            result?;
        }

        Ok(())
    }

    fn execute_switch(&mut self, switch: &SwitchBlock, context: &mut Context) -> EngineResult<()> {
        let scrutinee = self.evaluate_expr(&switch.scrutinee, context, switch.position)?;

        for case in &switch.cases {
            let matched = match &case.test {
                CaseTest::Literal(literal) => scrutinee.render() == *literal,
                CaseTest::Condition(condition) => {
                    context.enter_scope();
                    context.bind("value", scrutinee.clone());
                    let value = self.evaluate_expr(condition, context, case.position);
                    context.exit_scope();
                    value?.is_truthy()
                }
            };

            if matched {
                context.enter_scope();
                let result = self.execute_nodes(&case.body, context);
                context.exit_scope();
                return result;
            }
        }

        if let Some(default_body) = &switch.default_body {
            context.enter_scope();
            let result = self.execute_nodes(default_body, context);
            context.exit_scope();
            return result;
        }

        Ok(())
    }

    fn execute_message(&mut self, message: &MessageBlock, context: &mut Context) -> EngineResult<()> {
        self.push_output(
            &messages::message_open(&message.role, message.cache),
            message.position,
        )?;
        self.execute_nodes(&message.body, context)?;
        self.push_output(&messages::message_close(), message.position)
    }

    fn execute_resolver_call(
        &mut self,
        call: &ResolverCall,
        context: &mut Context,
    ) -> EngineResult<()> {
        let strategy = self.effective_strategy(
            call.attributes.get("on_error"),
            call.default_value().is_some(),
        );

        let Some(handle) = self.engine.resolvers.get(&call.tag_name) else {
            let error = EngineError::at(
                ErrorKind::ResolverUnknown,
                format!("no resolver registered for tag '{}'", call.tag_name),
                call.position,
            );
            return self.recover(error, strategy, call.default_value(), &call.span);
        };

        // The block form hands the resolver its body already rendered.
        let body = match &call.body {
            Some(nodes) => {
                let checkpoint = self.output.len();
                self.execute_nodes(nodes, context)?;
                Some(self.output.split_off(checkpoint))
            }
            None => None,
        };

        let worker_cancel = CancelToken::new();
        let invocation = ResolverContext::new(
            &call.tag_name,
            call.attributes.clone(),
            body,
            context.snapshot(),
            worker_cancel.clone(),
        );

        trace!("dispatching resolver '{}'", call.tag_name);
        let outcome = run_isolated(
            &format!("resolver '{}'", call.tag_name),
            move || handle.resolve(&invocation),
            self.engine.options.resolver_timeout,
            &self.cancel,
            &worker_cancel,
            call.position,
        )?;

        match outcome {
            Ok(text) => self.push_output(&text, call.position),
            Err(message) => {
                let error = EngineError::at(
                    ErrorKind::ResolverFailed,
                    format!("resolver '{}' failed: {message}", call.tag_name),
                    call.position,
                );
                self.recover(error, strategy, call.default_value(), &call.span)
            }
        }
    }

    fn evaluate_expr(
        &self,
        expression: &Expr,
        context: &Context,
        position: Position,
    ) -> EngineResult<Value> {
        let dispatch = FunctionDispatch {
            engine: self.engine,
            cancel: &self.cancel,
            position,
        };

        Evaluator::new(context, &dispatch)
            .evaluate(expression)
            .map_err(|error| match error.position {
                Some(_) => error,
                None => error.with_position(position),
            })
    }

    /// Per-tag `on_error` wins; a present `default` attribute selects the
    /// default strategy; otherwise the engine-wide default applies.
    fn effective_strategy(&self, on_error: Option<&str>, has_default: bool) -> ErrorStrategy {
        if let Some(raw) = on_error {
            if let Some(strategy) = ErrorStrategy::parse(raw) {
                return strategy;
            }
            debug!("ignoring invalid on_error value '{raw}'");
        }

        if has_default {
            return ErrorStrategy::UseDefault;
        }

        self.engine.options.default_error_strategy
    }

    fn recover(
        &mut self,
        error: EngineError,
        strategy: ErrorStrategy,
        default: Option<&str>,
        span: &Range<usize>,
    ) -> EngineResult<()> {
        let position = error.position.unwrap_or_default();

        match strategy {
            ErrorStrategy::Throw => Err(error),
            ErrorStrategy::UseDefault => self.push_output(default.unwrap_or(""), position),
            ErrorStrategy::Remove => Ok(()),
            ErrorStrategy::KeepRaw => {
                let snippet = self
                    .template_stack
                    .last()
                    .map(|template| template.snippet(span).to_owned())
                    .unwrap_or_default();
                self.push_output(&snippet, position)
            }
            ErrorStrategy::Log => {
                self.engine.log_error(&error);
                Ok(())
            }
        }
    }

    /// Cooperative checks performed at every node entry.
    fn checkpoint(&self, position: Position) -> EngineResult<()> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::at(
                ErrorKind::Resource,
                "execution cancelled",
                position,
            ));
        }

        if self.started.elapsed() >= self.engine.options.total_timeout {
            return Err(EngineError::at(
                ErrorKind::Resource,
                format!(
                    "wall-clock budget of {:?} exceeded",
                    self.engine.options.total_timeout
                ),
                position,
            ));
        }

        Ok(())
    }

    fn push_output(&mut self, text: &str, position: Position) -> EngineResult<()> {
        let cap = self.engine.options.max_output_bytes;
        if self.output.len() + text.len() > cap {
            return Err(EngineError::at(
                ErrorKind::Resource,
                format!("output exceeds {cap} bytes"),
                position,
            ));
        }

        self.output.push_str(text);
        Ok(())
    }
}

/// Dispatches expression function calls: arity check, then either a direct
/// call (built-ins) or a trip through the isolation envelope (user
/// functions).
struct FunctionDispatch<'a> {
    engine: &'a EngineCore,
    cancel: &'a CancelToken,
    position: Position,
}

impl FunctionCaller for FunctionDispatch<'_> {
    fn call_function(&self, name: &str, args: Vec<Value>) -> EngineResult<Value> {
        let Some(entry) = self.engine.functions.get(name) else {
            return Err(EngineError::at(
                ErrorKind::ExprEval,
                format!("unknown function '{name}'"),
                self.position,
            ));
        };

        check_arity(entry.handle.as_ref(), args.len())
            .map_err(|message| EngineError::at(ErrorKind::ExprEval, message, self.position))?;

        if entry.builtin {
            return entry
                .handle
                .evaluate(&args)
                .map_err(|message| EngineError::at(ErrorKind::ExprEval, message, self.position));
        }

        let worker_cancel = CancelToken::new();
        let handle = Arc::clone(&entry.handle);
        let outcome = run_isolated(
            &format!("function '{name}'"),
            move || handle.evaluate(&args),
            self.engine.options.function_timeout,
            self.cancel,
            &worker_cancel,
            self.position,
        )?;

        outcome.map_err(|message| {
            EngineError::at(
                ErrorKind::ExprEval,
                format!("function '{name}' failed: {message}"),
                self.position,
            )
        })
    }
}

fn extends_position(template: &TemplateData) -> Position {
    template
        .root_body
        .iter()
        .find_map(|node| match node {
            Node::Extends(marker) => Some(marker.position),
            _ => None,
        })
        .unwrap_or_default()
}
