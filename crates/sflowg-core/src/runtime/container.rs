//! Plugin Container (C14): registers plugins, exposes task/response-handler
//! dispatch, and runs ordered lifecycle hooks, per spec §4.10.
//!
//! Task/handler "discovery by signature" (spec §4.10) relies on runtime
//! reflection that Rust doesn't have. Per spec §9 ("Reflective dispatch ->
//! explicit descriptors") the Program Emitter (C9) instead generates an
//! explicit call to [`task_trampoline`]/[`handler_trampoline`] per
//! discovered method; the container only ever sees the resulting uniform
//! callables.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::error::{FlowError, FlowErrorKind, HandlerError, RuntimeError};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Capability a registered plugin may implement: run setup before the server
/// starts serving requests.
#[async_trait]
pub trait Initializer: Send + Sync {
    async fn initialize(&self) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// Capability a registered plugin may implement: run teardown after the
/// server stops accepting requests.
#[async_trait]
pub trait Shutdowner: Send + Sync {
    async fn shutdown(&self) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// Minimal per-call context handed to tasks and response handlers in place
/// of a full `*Execution` pointer: the execution id (for logging/metadata)
/// and a cancellation signal.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub execution_id: Uuid,
    pub cancellation: tokio_util::sync::CancellationToken,
}

pub type TaskFn =
    Arc<dyn Fn(TaskContext, HashMap<String, Value>) -> BoxFuture<'static, Result<HashMap<String, Value>, FlowError>> + Send + Sync>;

/// What a response handler produces; the HTTP Frontend (C18) is responsible
/// for turning this into a concrete HTTP response.
#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

pub type ResponseHandlerFn =
    Arc<dyn Fn(HashMap<String, Value>) -> BoxFuture<'static, Result<HandlerOutcome, HandlerError>> + Send + Sync>;

/// Wraps a plugin method reference into a [`TaskFn`] trampoline (spec §9
/// Map<->struct conversion note: this is the "Codec" the generated program
/// invokes for a `MapTask`).
pub fn task_trampoline<P>(
    plugin: Arc<P>,
    method: fn(&P, HashMap<String, Value>) -> Result<HashMap<String, Value>, FlowError>,
) -> TaskFn
where
    P: Send + Sync + 'static,
{
    Arc::new(move |_ctx: TaskContext, args: HashMap<String, Value>| {
        let plugin = plugin.clone();
        Box::pin(async move { method(plugin.as_ref(), args) })
    })
}

/// Wraps a plugin method reference into a [`ResponseHandlerFn`] trampoline.
pub fn handler_trampoline<P>(
    plugin: Arc<P>,
    method: fn(&P, HashMap<String, Value>) -> Result<HandlerOutcome, HandlerError>,
) -> ResponseHandlerFn
where
    P: Send + Sync + 'static,
{
    Arc::new(move |args: HashMap<String, Value>| {
        let plugin = plugin.clone();
        Box::pin(async move { method(plugin.as_ref(), args) })
    })
}

/// Bidirectional map<->struct conversion for a `TypedTask`'s input/output
/// types (spec §9 Codec note): in place of Go's runtime structural
/// reflection, each typed task's input/output pair gets a generated
/// `Codec` implementation instead.
pub trait Codec: Sized {
    fn decode(args: HashMap<String, Value>) -> Result<Self, FlowError>;
    fn encode(self) -> HashMap<String, Value>;
}

/// Wraps a typed plugin method into a [`TaskFn`] trampoline: decodes the
/// incoming argument map into `I`, invokes the method, and encodes its `O`
/// back to a map (spec §4.10 TypedTask).
pub fn typed_task_trampoline<P, I, O>(plugin: Arc<P>, method: fn(&P, I) -> Result<O, FlowError>) -> TaskFn
where
    P: Send + Sync + 'static,
    I: Codec + Send + 'static,
    O: Codec + Send + 'static,
{
    Arc::new(move |_ctx: TaskContext, args: HashMap<String, Value>| {
        let plugin = plugin.clone();
        Box::pin(async move {
            let input = I::decode(args)?;
            let output = method(plugin.as_ref(), input)?;
            Ok(output.encode())
        })
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("plugin '{0}' is already registered")]
    DuplicateRegistration(String),
    #[error("plugin name must not be empty")]
    EmptyName,
    #[error("no plugin registered under '{0}'")]
    NotFound(String),
    #[error("plugin '{name}' is not of the requested type")]
    TypeMismatch { name: String },
}

/// Owns every constructed plugin instance, task/handler registries built
/// once at startup, and ordered lifecycle hooks. Shared read-only across
/// concurrent request executions (spec §5).
pub struct Container {
    plugins: HashMap<String, Arc<dyn Any + Send + Sync>>,
    registration_order: Vec<String>,
    initializers: Vec<(String, Arc<dyn Initializer>)>,
    shutdowners: Vec<(String, Arc<dyn Shutdowner>)>,
    tasks: HashMap<String, TaskFn>,
    handlers: HashMap<String, ResponseHandlerFn>,
}

impl Container {
    pub fn new() -> Self {
        Container {
            plugins: HashMap::new(),
            registration_order: Vec::new(),
            initializers: Vec::new(),
            shutdowners: Vec::new(),
            tasks: HashMap::new(),
            handlers: HashMap::new(),
        }
    }

    /// Registers a plugin under `name`. Every plugin implements both
    /// lifecycle capabilities (with no-op defaults), so registration always
    /// records both an initializer and a shutdowner entry in registration
    /// order.
    pub fn register<P>(&mut self, name: &str, plugin: Arc<P>) -> Result<(), ContainerError>
    where
        P: Initializer + Shutdowner + Send + Sync + 'static,
    {
        if name.is_empty() {
            return Err(ContainerError::EmptyName);
        }
        if self.plugins.contains_key(name) {
            return Err(ContainerError::DuplicateRegistration(name.to_string()));
        }

        let initializer: Arc<dyn Initializer> = plugin.clone();
        let shutdowner: Arc<dyn Shutdowner> = plugin.clone();

        self.registration_order.push(name.to_string());
        self.initializers.push((name.to_string(), initializer));
        self.shutdowners.push((name.to_string(), shutdowner));
        self.plugins.insert(name.to_string(), plugin);
        Ok(())
    }

    pub fn resolve<P: Any + Send + Sync>(&self, name: &str) -> Result<Arc<P>, ContainerError> {
        let entry = self
            .plugins
            .get(name)
            .ok_or_else(|| ContainerError::NotFound(name.to_string()))?;
        entry
            .clone()
            .downcast::<P>()
            .map_err(|_| ContainerError::TypeMismatch { name: name.to_string() })
    }

    pub fn register_task(&mut self, task_name: &str, task: TaskFn) {
        self.tasks.insert(task_name.to_string(), task);
    }

    pub fn register_response_handler(&mut self, handler_name: &str, handler: ResponseHandlerFn) {
        self.handlers.insert(handler_name.to_string(), handler);
    }

    pub fn task(&self, task_name: &str) -> Option<&TaskFn> {
        self.tasks.get(task_name)
    }

    pub fn response_handler(&self, handler_name: &str) -> Option<&ResponseHandlerFn> {
        self.handlers.get(handler_name)
    }

    /// Runs every registered initializer in registration order, failing fast
    /// on the first error (spec §4.10).
    pub async fn initialize(&self) -> Result<(), RuntimeError> {
        for (_name, initializer) in &self.initializers {
            initializer.initialize().await?;
        }
        Ok(())
    }

    /// Runs every registered shutdowner in reverse registration order,
    /// aggregating failures but always attempting every shutdown (spec
    /// §4.10). Logs (rather than returns) individual failures so a single
    /// misbehaving plugin can't block the rest of teardown.
    pub async fn shutdown(&self) {
        for (name, shutdowner) in self.shutdowners.iter().rev() {
            if let Err(err) = shutdowner.shutdown().await {
                log::error!("plugin '{name}' failed to shut down cleanly: {err}");
            }
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingPlugin {
        init_order: Arc<std::sync::Mutex<Vec<&'static str>>>,
        name: &'static str,
    }

    #[async_trait]
    impl Initializer for RecordingPlugin {
        async fn initialize(&self) -> Result<(), RuntimeError> {
            self.init_order.lock().unwrap().push(self.name);
            Ok(())
        }
    }

    #[async_trait]
    impl Shutdowner for RecordingPlugin {
        async fn shutdown(&self) -> Result<(), RuntimeError> {
            self.init_order.lock().unwrap().push(self.name);
            Ok(())
        }
    }

    #[tokio::test]
    async fn initialize_runs_in_registration_order_shutdown_reverses() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut container = Container::new();
        container
            .register("a", Arc::new(RecordingPlugin { init_order: order.clone(), name: "a" }))
            .unwrap();
        container
            .register("b", Arc::new(RecordingPlugin { init_order: order.clone(), name: "b" }))
            .unwrap();

        container.initialize().await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);

        order.lock().unwrap().clear();
        container.shutdown().await;
        assert_eq!(*order.lock().unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn duplicate_registration_rejected() {
        struct Plain;
        #[async_trait::async_trait]
        impl Initializer for Plain {}
        #[async_trait::async_trait]
        impl Shutdowner for Plain {}

        let mut container = Container::new();
        container.register("x", Arc::new(Plain)).unwrap();
        let err = container.register("x", Arc::new(Plain)).unwrap_err();
        assert!(matches!(err, ContainerError::DuplicateRegistration(_)));
    }

    #[derive(Debug, PartialEq)]
    struct Doubled {
        n: i64,
    }

    impl Codec for Doubled {
        fn decode(args: HashMap<String, Value>) -> Result<Self, FlowError> {
            let n = args
                .get("n")
                .and_then(Value::as_i64)
                .ok_or_else(|| FlowError::new(FlowErrorKind::Permanent, "decode_error", "missing field 'n'", "typed"))?;
            Ok(Doubled { n })
        }

        fn encode(self) -> HashMap<String, Value> {
            let mut out = HashMap::new();
            out.insert("n".to_string(), Value::from(self.n));
            out
        }
    }

    #[tokio::test]
    async fn typed_task_trampoline_decodes_invokes_encodes() {
        struct Doubler;
        fn double(_plugin: &Doubler, input: Doubled) -> Result<Doubled, FlowError> {
            Ok(Doubled { n: input.n * 2 })
        }

        let task = typed_task_trampoline(Arc::new(Doubler), double);
        let mut args = HashMap::new();
        args.insert("n".to_string(), Value::from(21));
        let ctx = TaskContext {
            execution_id: Uuid::new_v4(),
            cancellation: tokio_util::sync::CancellationToken::new(),
        };
        let result = task(ctx, args).await.unwrap();
        assert_eq!(result.get("n").and_then(Value::as_i64), Some(42));
    }

    #[tokio::test]
    async fn task_trampoline_invokes_method() {
        struct Echo;
        fn echo(_plugin: &Echo, args: HashMap<String, Value>) -> Result<HashMap<String, Value>, FlowError> {
            Ok(args)
        }
        let task = task_trampoline(Arc::new(Echo), echo);
        let mut args = HashMap::new();
        args.insert("x".to_string(), Value::from(1));
        let ctx = TaskContext {
            execution_id: Uuid::new_v4(),
            cancellation: tokio_util::sync::CancellationToken::new(),
        };
        let result = task(ctx, args.clone()).await.unwrap();
        assert_eq!(result, args);
    }
}
