use std::{
    fmt::Debug,
    sync::Arc,
    time::{Duration, Instant},
};

use log::{debug, warn};

use crate::{
    access::{AccessChecker, AuditEvent, AuditSink, Operation},
    builtins::register_builtins,
    context::Context,
    error::{EngineError, EngineResult, ErrorKind, ErrorStrategy},
    executor::Executor,
    frontmatter::FrontMatter,
    isolation::CancelToken,
    parser::{ast::TemplateData, parse_source, BUILTIN_TAGS},
    position::Position,
    registry::{Function, FunctionRegistry, Resolver, ResolverRegistry, TemplateRegistry},
    validation::{validate_template, Issue, Severity, ValidationResult},
    value::Value,
};

/// Hook invoked by the `log` error strategy; defaults to `log::warn!`.
pub type LoggerHook = Arc<dyn Fn(&EngineError) + Send + Sync>;

/// Engine construction options. The defaults match the documented limits:
/// `{~`/`~}` delimiters, throw-on-error, depth 10, 10 000 iterations,
/// 10 MiB output, 5 s per resolver, 1 s per function, 30 s per execution.
#[derive(Clone)]
pub struct EngineOptions {
    pub open_delim: String,
    pub close_delim: String,
    pub default_error_strategy: ErrorStrategy,
    pub max_depth: usize,
    pub max_iterations: usize,
    pub max_output_bytes: usize,
    pub resolver_timeout: Duration,
    pub function_timeout: Duration,
    pub total_timeout: Duration,
    pub logger: Option<LoggerHook>,
    pub access_checker: Option<Arc<dyn AccessChecker>>,
    pub audit_sink: Option<Arc<dyn AuditSink>>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            open_delim: "{~".to_owned(),
            close_delim: "~}".to_owned(),
            default_error_strategy: ErrorStrategy::Throw,
            max_depth: 10,
            max_iterations: 10_000,
            max_output_bytes: 10 * 1024 * 1024,
            resolver_timeout: Duration::from_secs(5),
            function_timeout: Duration::from_secs(1),
            total_timeout: Duration::from_secs(30),
            logger: None,
            access_checker: None,
            audit_sink: None,
        }
    }
}

impl Debug for EngineOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineOptions")
            .field("open_delim", &self.open_delim)
            .field("close_delim", &self.close_delim)
            .field("default_error_strategy", &self.default_error_strategy)
            .field("max_depth", &self.max_depth)
            .field("max_iterations", &self.max_iterations)
            .field("max_output_bytes", &self.max_output_bytes)
            .field("resolver_timeout", &self.resolver_timeout)
            .field("function_timeout", &self.function_timeout)
            .field("total_timeout", &self.total_timeout)
            .finish_non_exhaustive()
    }
}

/// The shared interior of an engine: options plus the three registries.
/// Templates returned by [`Engine::parse`] hold an `Arc` to it so they stay
/// executable on their own.
pub(crate) struct EngineCore {
    pub options: EngineOptions,
    pub resolvers: ResolverRegistry,
    pub functions: FunctionRegistry,
    pub templates: TemplateRegistry,
}

impl EngineCore {
    pub fn log_error(&self, error: &EngineError) {
        match &self.options.logger {
            Some(hook) => hook(error),
            None => warn!("{error}"),
        }
    }
}

/// The template engine: delimiter configuration, registries and execution.
///
/// Cloning is cheap and shares the registries.
#[derive(Clone)]
pub struct Engine {
    core: Arc<EngineCore>,
}

impl Engine {
    pub fn new() -> Engine {
        Engine::build(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> EngineResult<Engine> {
        if options.open_delim.is_empty() || options.close_delim.is_empty() {
            return Err(EngineError::new(
                ErrorKind::Registry,
                "delimiters cannot be empty",
            ));
        }
        if options.open_delim == options.close_delim {
            return Err(EngineError::new(
                ErrorKind::Registry,
                "open and close delimiters must differ",
            ));
        }
        if options.open_delim.starts_with('\\') || options.open_delim.starts_with('/') {
            return Err(EngineError::new(
                ErrorKind::Registry,
                "the open delimiter cannot start with '\\' or '/'",
            ));
        }

        Ok(Engine::build(options))
    }

    fn build(options: EngineOptions) -> Engine {
        let functions = FunctionRegistry::new();
        // The built-in set registers into an empty registry; this cannot
        // collide.
        if let Err(error) = register_builtins(&functions) {
            warn!("failed to register built-in functions: {error}");
        }

        Engine {
            core: Arc::new(EngineCore {
                options,
                resolvers: ResolverRegistry::new(&BUILTIN_TAGS),
                functions,
                templates: TemplateRegistry::new(),
            }),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.core.options
    }

    // --- resolver registry ---------------------------------------------

    pub fn register_resolver(&self, resolver: Arc<dyn Resolver>) -> EngineResult<()> {
        self.core.resolvers.register(resolver)
    }

    pub fn unregister_resolver(&self, name: &str) -> EngineResult<()> {
        self.core.resolvers.unregister(name)
    }

    pub fn has_resolver(&self, name: &str) -> bool {
        self.core.resolvers.has(name)
    }

    pub fn list_resolvers(&self) -> Vec<String> {
        self.core.resolvers.names()
    }

    pub fn count_resolvers(&self) -> usize {
        self.core.resolvers.count()
    }

    // --- function registry ---------------------------------------------

    pub fn register_function(&self, function: Arc<dyn Function>) -> EngineResult<()> {
        self.core.functions.register(function)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.core.functions.has(name)
    }

    pub fn list_functions(&self) -> Vec<String> {
        self.core.functions.names()
    }

    pub fn count_functions(&self) -> usize {
        self.core.functions.count()
    }

    // --- template registry ---------------------------------------------

    /// Parse `source` and register it under `name` for include/extends.
    pub fn register_template(&self, name: &str, source: &str) -> EngineResult<()> {
        let data = self.parse_data(source)?;
        self.core.templates.register(name, Arc::new(data))
    }

    /// Load a template text from an external source (e.g. a storage
    /// backend) and register it.
    pub fn register_template_from(
        &self,
        source: &dyn crate::access::TemplateSource,
        name: &str,
    ) -> EngineResult<()> {
        let text = source.load(name).map_err(|message| {
            EngineError::new(
                ErrorKind::Registry,
                format!("could not load template '{name}': {message}"),
            )
        })?;

        self.register_template(name, &text)
    }

    pub fn unregister_template(&self, name: &str) -> EngineResult<()> {
        self.core.templates.unregister(name)
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.core.templates.has(name)
    }

    pub fn list_templates(&self) -> Vec<String> {
        self.core.templates.names()
    }

    pub fn count_templates(&self) -> usize {
        self.core.templates.count()
    }

    pub fn get_template(&self, name: &str) -> Option<Template> {
        self.core.templates.get(name).map(|data| Template {
            data,
            core: Arc::clone(&self.core),
        })
    }

    // --- parse / validate / execute ------------------------------------

    pub fn parse(&self, source: &str) -> EngineResult<Template> {
        Ok(Template {
            data: Arc::new(self.parse_data(source)?),
            core: Arc::clone(&self.core),
        })
    }

    fn parse_data(&self, source: &str) -> EngineResult<TemplateData> {
        parse_source(
            source,
            &self.core.options.open_delim,
            &self.core.options.close_delim,
        )
    }

    /// Validate a source document. Parse failures surface as error-severity
    /// issues; the registries are only read.
    pub fn validate(&self, source: &str) -> ValidationResult {
        match self.parse_data(source) {
            Ok(template) => {
                validate_template(&template, &self.core.resolvers, &self.core.templates)
            }
            Err(error) => ValidationResult {
                issues: vec![Issue {
                    severity: Severity::Error,
                    message: error.message.clone(),
                    position: error.position.unwrap_or(Position::start()),
                }],
            },
        }
    }

    /// Parse and execute in one step.
    pub fn execute(
        &self,
        cancel: &CancelToken,
        source: &str,
        data: &Value,
    ) -> EngineResult<String> {
        self.parse(source)?.execute(cancel, data)
    }

    /// Execute a registered template on behalf of `subject`, consulting the
    /// configured access checker first and reporting the outcome to the
    /// audit sink.
    pub fn execute_checked(
        &self,
        cancel: &CancelToken,
        subject: &str,
        template_name: &str,
        data: &Value,
    ) -> EngineResult<String> {
        let started = Instant::now();

        if let Some(checker) = &self.core.options.access_checker {
            let decision = checker.check(Operation::Execute, subject, template_name);
            if !decision.allowed {
                let error = EngineError::new(
                    ErrorKind::Registry,
                    format!(
                        "subject '{subject}' may not execute template '{template_name}': {}",
                        decision.reason.unwrap_or_else(|| "denied".to_owned())
                    ),
                );
                self.audit(subject, template_name, false, started, Some(&error));
                return Err(error);
            }
        }

        let result = match self.get_template(template_name) {
            Some(template) => template.execute(cancel, data),
            None => Err(EngineError::new(
                ErrorKind::Registry,
                format!("template '{template_name}' is not registered"),
            )),
        };

        self.audit(subject, template_name, true, started, result.as_ref().err());
        result
    }

    fn audit(
        &self,
        subject: &str,
        template_name: &str,
        allowed: bool,
        started: Instant,
        error: Option<&EngineError>,
    ) {
        let Some(sink) = &self.core.options.audit_sink else {
            return;
        };

        sink.record(&AuditEvent {
            operation: Operation::Execute,
            subject: subject.to_owned(),
            template_name: template_name.to_owned(),
            allowed,
            duration: started.elapsed(),
            error: error.map(|error| error.to_string()),
        });
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

impl Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.core.options)
            .field("resolvers", &self.core.resolvers.count())
            .field("functions", &self.core.functions.count())
            .field("templates", &self.core.templates.count())
            .finish()
    }
}

/// A parsed template bound to the engine that produced it. Immutable and
/// cheap to clone; executions against it are independent of each other.
#[derive(Clone)]
pub struct Template {
    data: Arc<TemplateData>,
    core: Arc<EngineCore>,
}

impl Template {
    /// Execute against caller data. The data value is only read; a mapping
    /// becomes the root scope, anything else yields an empty root.
    pub fn execute(&self, cancel: &CancelToken, data: &Value) -> EngineResult<String> {
        self.execute_with_context(cancel, Context::with_root(data))
    }

    /// Execute with a prepared context (bindings beyond plain data, e.g.
    /// computed values the application wants in scope).
    pub fn execute_with_context(
        &self,
        cancel: &CancelToken,
        mut context: Context,
    ) -> EngineResult<String> {
        debug!("executing template");
        Executor::new(&self.core, cancel.clone()).run(&self.data, &mut context)
    }

    pub fn source(&self) -> &str {
        &self.data.source
    }

    pub fn front_matter(&self) -> Option<&FrontMatter> {
        self.data.front_matter.as_ref()
    }

    pub fn inherits(&self) -> Option<&str> {
        self.data.inherits.as_deref()
    }
}

impl Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("inherits", &self.data.inherits)
            .field("nodes", &self.data.root_body.len())
            .finish()
    }
}
