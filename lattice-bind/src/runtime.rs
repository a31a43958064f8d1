//! Binding Runtime
//!
//! The runtime is the one object callers hold. It owns the expression cache,
//! one [`ContextManager`] per context owner, and the registry of every
//! listener installed on an owner's behalf.
//!
//! # How It Works
//!
//! 1. An owner's manager is created on first use and keyed by the owner's
//!    [`Uid`]. It observes the owner's root object, under which the owner's
//!    context lives at `context` and its resources at `resources`.
//!
//! 2. Every listener is recorded under the uid it was registered for, no
//!    matter which manager it went to. A child binding to a parent's
//!    resource registers on the parent's manager but under its own uid.
//!
//! 3. `dispose(owner)` removes every listener recorded for the owner across
//!    all managers, then tears the owner's manager down: hooks released,
//!    arrays restored, state dropped.
//!
//! Nothing here is global: two runtimes never see each other's managers.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::config::RuntimeConfig;
use crate::error::ExpressionError;
use crate::expr::{Aliases, ParsedExpression, Parser};
use crate::observe::path::{CONTEXT_ROOT, RESOURCES_ROOT};
use crate::observe::{
    AbsolutePath, ContextManager, ListenerHandle, ListenerOptions, RemovalRegistry, Uid,
    CONTEXT_PRIORITY,
};
use crate::value::{ObjectRef, Value};

/// Something that renders against a context: a control, a view, a
/// component.
///
/// The owner's root object holds its context and its named resources:
///
/// ```text
/// { context: <data>, resources: { <name>: { value: <data> } } }
/// ```
#[derive(Clone)]
pub struct ContextOwner {
    uid: Uid,
    root: ObjectRef,
}

impl ContextOwner {
    pub fn new(context: Value) -> Self {
        let root = ObjectRef::from_pairs([
            (CONTEXT_ROOT, context),
            (RESOURCES_ROOT, Value::Object(ObjectRef::new())),
        ]);
        Self {
            uid: Uid::new(),
            root,
        }
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub fn root(&self) -> &ObjectRef {
        &self.root
    }

    pub fn context(&self) -> Value {
        self.root.get_untracked(CONTEXT_ROOT)
    }

    /// Swap the whole context. Observers of paths inside it are refreshed.
    pub fn set_context(&self, context: impl Into<Value>) {
        self.root.set(CONTEXT_ROOT, context);
    }

    /// Publish `value` as the resource `@name`.
    pub fn set_resource(&self, name: &str, value: impl Into<Value>) {
        let resources = self.resources();
        match resources.get_untracked(name) {
            Value::Object(resource) => resource.set("value", value),
            _ => resources.set(name, Value::object([("value", value.into())])),
        }
    }

    pub fn resource(&self, name: &str) -> Value {
        self.resources().get_untracked(name).get_member_untracked("value")
    }

    /// Current resource values by name, as expressions see them through
    /// `@name`.
    pub fn aliases(&self) -> Aliases {
        self.resources()
            .entries()
            .into_iter()
            .map(|(name, resource)| {
                let value = resource.get_member_untracked("value");
                (name, value)
            })
            .collect()
    }

    fn resources(&self) -> ObjectRef {
        match self.root.get_untracked(RESOURCES_ROOT) {
            Value::Object(resources) => resources,
            _ => {
                let resources = ObjectRef::new();
                self.root.set(RESOURCES_ROOT, resources.clone());
                resources
            }
        }
    }
}

impl fmt::Debug for ContextOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextOwner")
            .field("uid", &self.uid)
            .field("context", &self.context())
            .finish()
    }
}

/// A live expression: re-evaluated whenever one of its identifiers changes.
pub struct Binding {
    expression: Rc<ParsedExpression>,
    value: Rc<RefCell<Value>>,
    handles: Rc<RefCell<Vec<ListenerHandle>>>,
}

impl Binding {
    /// The most recently evaluated value.
    pub fn value(&self) -> Value {
        self.value.borrow().clone()
    }

    pub fn expression(&self) -> &ParsedExpression {
        &self.expression
    }

    /// Whether any of the binding's listeners can still fire.
    pub fn is_active(&self) -> bool {
        self.handles.borrow().iter().any(ListenerHandle::is_active)
    }

    /// Stop re-evaluating.
    pub fn unbind(&self) {
        release_all(&self.handles);
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("expression", &self.expression.expression())
            .field("value", &self.value())
            .field("listeners", &self.handles.borrow().len())
            .finish()
    }
}

fn release_all(handles: &RefCell<Vec<ListenerHandle>>) {
    let handles = handles.borrow().clone();
    for handle in &handles {
        handle.remove();
    }
}

pub struct BindingRuntime {
    config: RuntimeConfig,
    parser: Parser,
    managers: RefCell<HashMap<Uid, ContextManager>>,
    registry: RemovalRegistry,
}

impl Default for BindingRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingRuntime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            parser: Parser::with_config(&config),
            config,
            managers: RefCell::new(HashMap::new()),
            registry: RemovalRegistry::default(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn parse(&self, source: &str) -> Rc<ParsedExpression> {
        self.parser.parse(source)
    }

    pub fn try_parse(&self, source: &str) -> Result<Rc<ParsedExpression>, ExpressionError> {
        self.parser.try_parse(source)
    }

    pub fn clear_cache(&self, key: Option<&str>) {
        self.parser.clear_cache(key);
    }

    /// The owner's manager, created on first access.
    pub fn manager(&self, owner: &ContextOwner) -> ContextManager {
        let mut managers = self.managers.borrow_mut();
        managers
            .entry(owner.uid())
            .or_insert_with(|| {
                ContextManager::attached(
                    owner.uid(),
                    Value::Object(owner.root().clone()),
                    &self.config,
                    self.registry.clone(),
                )
            })
            .clone()
    }

    pub fn has_manager(&self, uid: Uid) -> bool {
        self.managers.borrow().contains_key(&uid)
    }

    /// Listeners currently recorded for `uid`, across all managers.
    pub fn listener_count(&self, uid: Uid) -> usize {
        self.registry.count(uid)
    }

    /// Tear down everything the owner installed.
    pub fn dispose(&self, owner: &ContextOwner) {
        self.dispose_uid(owner.uid());
    }

    pub fn dispose_uid(&self, uid: Uid) {
        let handles = self.registry.take(uid);
        for handle in &handles {
            handle.remove();
        }
        let manager = self.managers.borrow_mut().remove(&uid);
        if let Some(manager) = &manager {
            manager.dispose();
        }
        debug!(
            owner = %uid,
            listeners = handles.len(),
            manager = manager.is_some(),
            "disposed owner"
        );
    }

    /// Create missing containers along `path` under the owner's root.
    pub fn create_context(&self, owner: &ContextOwner, path: &str) -> Value {
        ContextManager::create_context(&Value::Object(owner.root().clone()), path)
    }

    /// Run `listener` whenever the owner's whole context is replaced, ahead
    /// of any listener on a path inside it.
    pub fn watch_context<F>(&self, owner: &ContextOwner, listener: F) -> ListenerHandle
    where
        F: Fn(&Value, &Value) + 'static,
    {
        let options = ListenerOptions::new(owner.uid()).priority(CONTEXT_PRIORITY);
        self.manager(owner).observe(CONTEXT_ROOT, options, listener)
    }

    /// Compile `source` and keep its value current.
    ///
    /// Every identifier is qualified against the owner's root and observed
    /// on the owner's manager. When any of them changes the expression is
    /// re-evaluated, and `on_change(new, old)` runs if the result differs.
    /// One-time expressions stop once their value is first defined.
    pub fn bind<F>(&self, owner: &ContextOwner, source: &str, on_change: F) -> Binding
    where
        F: Fn(&Value, &Value) + 'static,
    {
        let expression = self.parse(source);
        let initial = expression.evaluate(&owner.context(), &owner.aliases());
        let value = Rc::new(RefCell::new(initial.clone()));

        if expression.is_constant() || (expression.is_one_time() && initial.is_defined()) {
            return Binding {
                expression,
                value,
                handles: Rc::default(),
            };
        }

        let manager = self.manager(owner);
        let on_change: Rc<dyn Fn(&Value, &Value)> = Rc::new(on_change);
        let options = ListenerOptions::new(owner.uid());
        let one_time = expression.is_one_time();
        let handles: Rc<RefCell<Vec<ListenerHandle>>> = Rc::default();

        let mut targets: Vec<AbsolutePath> = expression
            .identifiers()
            .iter()
            .map(|identifier| AbsolutePath::resolve(identifier, CONTEXT_ROOT))
            .collect();
        targets.extend(
            expression
                .aliases()
                .iter()
                .map(|alias| AbsolutePath::resolve(&format!("@{}", alias), CONTEXT_ROOT)),
        );

        // one-time: every listener goes once the expression is defined
        for target in &targets {
            let expression = Rc::clone(&expression);
            let value = Rc::clone(&value);
            let on_change = Rc::clone(&on_change);
            let siblings = Rc::clone(&handles);
            let owner = owner.clone();
            let handle = manager.observe(target.as_str(), options, move |_, _| {
                let next = expression.evaluate(&owner.context(), &owner.aliases());
                if one_time && next.is_defined() {
                    release_all(&siblings);
                }
                let previous = value.replace(next.clone());
                if !previous.same(&next) {
                    on_change(&next, &previous);
                }
            });
            handles.borrow_mut().push(handle);
        }

        debug!(
            owner = %owner.uid(),
            expression = source,
            identifiers = targets.len(),
            "bound expression"
        );
        Binding {
            expression,
            value,
            handles,
        }
    }
}

impl fmt::Debug for BindingRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingRuntime")
            .field("config", &self.config)
            .field("cached_expressions", &self.parser.cache_len())
            .field("managers", &self.managers.borrow().len())
            .finish()
    }
}
