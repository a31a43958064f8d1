//! Expression Parser
//!
//! Folds the tokenizer's postfix stream into a tree of evaluator closures
//! and collects every context path the expression reads.
//!
//! # Identifier Extraction
//!
//! Alongside each evaluator fragment the parser keeps a *tentative* path:
//! `user` is tentative, and so is `user.name` after a static member access
//! extends it. A path stays tentative only while the value is still a plain
//! dotted read. The moment it is used for anything else (as an operand, a
//! callee, a call argument, a literal element, or the target of a computed
//! index) it is finalized into the identifier set. Whatever is still
//! tentative when the stream ends is flushed the same way.
//!
//! `@name` roots are aliases: the alias name is recorded in `aliases`, and a
//! deeper path such as `@name.field` is also kept as an identifier so the
//! caller can observe it once it has resolved the alias.
//!
//! # Constant Folding
//!
//! An expression without identifiers or aliases cannot observe anything, so
//! it is evaluated once at compile time and its evaluator replaced by one
//! that returns that value.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;
use tracing::{debug, warn};

use super::ops::{self, property_key};
use super::token::{Accessor, Literal, Operator, Token};
use super::tokenizer::tokenize;
use crate::config::RuntimeConfig;
use crate::error::ExpressionError;
use crate::value::{ObjectRef, Value};

/// Named resources an expression can reach through `@name`.
pub type Aliases = HashMap<String, Value>;

/// What an evaluator runs against.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    pub context: &'a Value,
    pub aliases: &'a Aliases,
}

type Evaluator = Rc<dyn Fn(&Scope<'_>) -> Value>;

/// A compiled template expression.
pub struct ParsedExpression {
    expression: String,
    evaluator: Evaluator,
    identifiers: Vec<String>,
    aliases: Vec<String>,
    one_time: bool,
    constant: bool,
    error: Option<ExpressionError>,
}

impl ParsedExpression {
    /// Evaluate against `context`, resolving `@name` through `aliases`.
    pub fn evaluate(&self, context: &Value, aliases: &Aliases) -> Value {
        (self.evaluator)(&Scope { context, aliases })
    }

    /// Evaluate with no aliases in scope.
    pub fn evaluate_in(&self, context: &Value) -> Value {
        self.evaluate(context, &Aliases::new())
    }

    /// The source text this was compiled from.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// De-duplicated context paths read by the expression, relative to its
    /// context. Alias-rooted paths keep their `@name` prefix.
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Set by a leading `=`: observe only until the value is first defined.
    pub fn is_one_time(&self) -> bool {
        self.one_time
    }

    /// Whether the evaluator ignores its context.
    pub fn is_constant(&self) -> bool {
        self.constant
    }

    /// The compile error, for expressions that degraded to `Undefined`.
    pub fn error(&self) -> Option<&ExpressionError> {
        self.error.as_ref()
    }

    fn degraded(source: &str, error: ExpressionError) -> Self {
        Self {
            expression: source.to_string(),
            evaluator: Rc::new(|_: &Scope<'_>| Value::Undefined),
            identifiers: Vec::new(),
            aliases: Vec::new(),
            one_time: false,
            constant: true,
            error: Some(error),
        }
    }
}

impl fmt::Debug for ParsedExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedExpression")
            .field("expression", &self.expression)
            .field("identifiers", &self.identifiers)
            .field("aliases", &self.aliases)
            .field("one_time", &self.one_time)
            .field("constant", &self.constant)
            .field("error", &self.error)
            .finish()
    }
}

/// Compiles expressions and memoizes them by source text.
pub struct Parser {
    cache: RefCell<HashMap<String, Rc<ParsedExpression>>>,
    cache_expressions: bool,
    fold_constants: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::with_config(&RuntimeConfig::default())
    }

    pub fn with_config(config: &RuntimeConfig) -> Self {
        Self {
            cache: RefCell::new(HashMap::new()),
            cache_expressions: config.cache_expressions,
            fold_constants: config.fold_constants,
        }
    }

    /// Compile `source`, or return the cached compilation.
    ///
    /// Malformed input is logged and yields a constant `Undefined`
    /// expression carrying the error.
    pub fn parse(&self, source: &str) -> Rc<ParsedExpression> {
        if let Some(parsed) = self.cache.borrow().get(source) {
            debug!(expression = source, "expression cache hit");
            return Rc::clone(parsed);
        }

        let parsed = match self.compile(source) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(expression = source, error = %err, "failed to compile expression");
                ParsedExpression::degraded(source, err)
            }
        };
        let parsed = Rc::new(parsed);
        if self.cache_expressions {
            self.cache
                .borrow_mut()
                .insert(source.to_string(), Rc::clone(&parsed));
        }
        parsed
    }

    /// Like [`Parser::parse`] but reports compile errors.
    pub fn try_parse(&self, source: &str) -> Result<Rc<ParsedExpression>, ExpressionError> {
        let parsed = self.parse(source);
        match parsed.error() {
            Some(err) => Err(err.clone()),
            None => Ok(parsed),
        }
    }

    /// Evict one cached expression, or all of them.
    pub fn clear_cache(&self, key: Option<&str>) {
        let mut cache = self.cache.borrow_mut();
        match key {
            Some(key) => {
                cache.remove(key);
            }
            None => cache.clear(),
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.borrow().len()
    }

    fn compile(&self, source: &str) -> Result<ParsedExpression, ExpressionError> {
        let trimmed = source.trim();
        let (one_time, body) = match trimmed.strip_prefix('=') {
            Some(rest) if !rest.starts_with('=') => (true, rest),
            _ => (false, trimmed),
        };

        let mut builder = Builder::default();
        for token in tokenize(body)? {
            builder.push(token)?;
        }
        let (evaluator, identifiers, aliases) = builder.finish()?;

        let constant = identifiers.is_empty() && aliases.is_empty();
        let evaluator = if constant && self.fold_constants {
            let value = evaluator(&Scope {
                context: &Value::Null,
                aliases: &Aliases::new(),
            });
            Rc::new(move |_: &Scope<'_>| value.clone()) as Evaluator
        } else {
            evaluator
        };

        debug!(
            expression = source,
            identifiers = identifiers.len(),
            constant,
            "compiled expression"
        );
        Ok(ParsedExpression {
            expression: source.to_string(),
            evaluator,
            identifiers,
            aliases,
            one_time,
            constant,
            error: None,
        })
    }
}

/// One partially built sub-expression.
struct Fragment {
    eval: Evaluator,
    /// Tentative identifier: set while the value is still a plain dotted read.
    path: Option<String>,
    /// Set for literal tokens; static keys extend tentative paths.
    literal: Option<Value>,
    /// Receiver and key of a member or index access, so a call through it can
    /// bind `this`.
    member: Option<(Evaluator, Evaluator)>,
}

impl Fragment {
    fn computed(eval: Evaluator) -> Self {
        Self {
            eval,
            path: None,
            literal: None,
            member: None,
        }
    }

    fn literal(value: Value) -> Self {
        let held = value.clone();
        Self {
            eval: Rc::new(move |_: &Scope<'_>| held.clone()),
            path: None,
            literal: Some(value),
            member: None,
        }
    }

    fn identifier(name: String) -> Self {
        let eval: Evaluator = match name.strip_prefix('@') {
            Some(alias) => {
                let alias = alias.to_string();
                Rc::new(move |s: &Scope<'_>| s.aliases.get(&alias).cloned().unwrap_or_default())
            }
            None => {
                let key = name.clone();
                Rc::new(move |s: &Scope<'_>| s.context.get_member(&key))
            }
        };
        Self {
            eval,
            path: Some(name),
            literal: None,
            member: None,
        }
    }
}

#[derive(Default)]
struct Builder {
    stack: Vec<Fragment>,
    identifiers: IndexSet<String>,
    aliases: IndexSet<String>,
}

impl Builder {
    fn push(&mut self, token: Token) -> Result<(), ExpressionError> {
        let fragment = match token {
            Token::Literal(literal) => Fragment::literal(literal_value(literal)),
            Token::Identifier { name, .. } => Fragment::identifier(name),
            Token::Operator(op) => self.operator(op)?,
            Token::Accessor { kind, args } => match kind {
                Accessor::Member | Accessor::Index => self.access(kind)?,
                Accessor::Call => self.call(args)?,
                Accessor::ArrayLiteral => self.array(args)?,
                Accessor::ObjectLiteral => self.object(args)?,
            },
        };
        self.stack.push(fragment);
        Ok(())
    }

    fn finish(mut self) -> Result<(Evaluator, Vec<String>, Vec<String>), ExpressionError> {
        if self.stack.is_empty() {
            let eval: Evaluator = Rc::new(|_: &Scope<'_>| Value::Undefined);
            return Ok((eval, Vec::new(), Vec::new()));
        }
        if self.stack.len() != 1 {
            return Err(ExpressionError::Unreduced {
                count: self.stack.len(),
            });
        }
        let fragment = self.pop("end")?;
        self.finalize(fragment.path);
        Ok((
            fragment.eval,
            self.identifiers.into_iter().collect(),
            self.aliases.into_iter().collect(),
        ))
    }

    fn pop(&mut self, op: &str) -> Result<Fragment, ExpressionError> {
        self.stack.pop().ok_or_else(|| ExpressionError::MissingOperand {
            op: op.to_string(),
        })
    }

    fn pop_many(&mut self, count: usize, op: &str) -> Result<Vec<Fragment>, ExpressionError> {
        if self.stack.len() < count {
            return Err(ExpressionError::MissingOperand { op: op.to_string() });
        }
        Ok(self.stack.split_off(self.stack.len() - count))
    }

    /// Commit a tentative path to the identifier set.
    fn finalize(&mut self, path: Option<String>) {
        let Some(path) = path else {
            return;
        };
        match path.strip_prefix('@') {
            Some(rest) => {
                let (alias, deeper) = match rest.split_once('.') {
                    Some((alias, _)) => (alias, true),
                    None => (rest, false),
                };
                self.aliases.insert(alias.to_string());
                if deeper {
                    self.identifiers.insert(path);
                }
            }
            None => {
                self.identifiers.insert(path);
            }
        }
    }

    /// Finalize every operand and return their evaluators.
    fn consume(&mut self, fragments: Vec<Fragment>) -> Vec<Evaluator> {
        fragments
            .into_iter()
            .map(|fragment| {
                self.finalize(fragment.path);
                fragment.eval
            })
            .collect()
    }

    fn operator(&mut self, op: Operator) -> Result<Fragment, ExpressionError> {
        let operands = self.pop_many(op.arity(), op.symbol())?;
        let evals = self.consume(operands);
        let eval: Evaluator = match (op, evals.as_slice()) {
            (_, [operand]) => {
                let operand = operand.clone();
                Rc::new(move |s: &Scope<'_>| ops::unary(op, &operand(s)))
            }
            (Operator::And, [left, right]) => {
                let (left, right) = (left.clone(), right.clone());
                Rc::new(move |s: &Scope<'_>| {
                    let value = left(s);
                    if value.truthy() {
                        right(s)
                    } else {
                        value
                    }
                })
            }
            (Operator::Or, [left, right]) => {
                let (left, right) = (left.clone(), right.clone());
                Rc::new(move |s: &Scope<'_>| {
                    let value = left(s);
                    if value.truthy() {
                        value
                    } else {
                        right(s)
                    }
                })
            }
            (_, [left, right]) => {
                let (left, right) = (left.clone(), right.clone());
                Rc::new(move |s: &Scope<'_>| ops::binary(op, &left(s), &right(s)))
            }
            (_, [test, then, otherwise]) => {
                let (test, then, otherwise) = (test.clone(), then.clone(), otherwise.clone());
                Rc::new(move |s: &Scope<'_>| {
                    if test(s).truthy() {
                        then(s)
                    } else {
                        otherwise(s)
                    }
                })
            }
            _ => {
                return Err(ExpressionError::MissingOperand {
                    op: op.symbol().to_string(),
                })
            }
        };
        Ok(Fragment::computed(eval))
    }

    /// `object.name` and `object[key]`. A literal key extends the object's
    /// tentative path; a computed key finalizes both sides.
    fn access(&mut self, kind: Accessor) -> Result<Fragment, ExpressionError> {
        let key = self.pop(kind.symbol())?;
        let object = self.pop(kind.symbol())?;

        let static_key = match &key.literal {
            Some(value @ (Value::String(_) | Value::Number(_))) => Some(property_key(value)),
            _ => None,
        };

        let (object_eval, key_eval) = (object.eval, key.eval);
        let (eval, path): (Evaluator, Option<String>) = match static_key {
            Some(name) => {
                let path = object.path.map(|p| format!("{}.{}", p, name));
                let target = object_eval.clone();
                let eval: Evaluator =
                    Rc::new(move |s: &Scope<'_>| target(s).get_member(&name));
                (eval, path)
            }
            None => {
                self.finalize(object.path);
                self.finalize(key.path);
                let (target, index) = (object_eval.clone(), key_eval.clone());
                let eval: Evaluator = Rc::new(move |s: &Scope<'_>| {
                    let container = target(s);
                    container.get_member(&property_key(&index(s)))
                });
                (eval, None)
            }
        };

        Ok(Fragment {
            eval,
            path,
            literal: None,
            member: Some((object_eval, key_eval)),
        })
    }

    /// `callee(args...)`. Calls through a member access use the resolved
    /// receiver as `this`; bare calls use the context.
    fn call(&mut self, args: usize) -> Result<Fragment, ExpressionError> {
        let arguments = self.pop_many(args, "()")?;
        let arguments = Rc::new(self.consume(arguments));
        let callee = self.pop("()")?;
        self.finalize(callee.path);

        let eval: Evaluator = match callee.member {
            Some((receiver, key)) => Rc::new(move |s: &Scope<'_>| {
                let this = receiver(s);
                let target = this.get_member(&property_key(&key(s)));
                invoke(&target, &this, &arguments, s)
            }),
            None => {
                let target = callee.eval;
                Rc::new(move |s: &Scope<'_>| invoke(&target(s), s.context, &arguments, s))
            }
        };
        Ok(Fragment::computed(eval))
    }

    fn array(&mut self, count: usize) -> Result<Fragment, ExpressionError> {
        let elements = self.pop_many(count, "[]")?;
        let elements = self.consume(elements);
        Ok(Fragment::computed(Rc::new(move |s: &Scope<'_>| {
            Value::array(elements.iter().map(|element| element(s)))
        })))
    }

    fn object(&mut self, pairs: usize) -> Result<Fragment, ExpressionError> {
        let fragments = self.pop_many(pairs * 2, "{}")?;
        let mut keys = Vec::with_capacity(pairs);
        let mut values = Vec::with_capacity(pairs);
        for (i, fragment) in fragments.into_iter().enumerate() {
            if i % 2 == 0 {
                let key = fragment
                    .literal
                    .as_ref()
                    .map(property_key)
                    .ok_or(ExpressionError::MalformedObjectLiteral { pos: 0 })?;
                keys.push(key);
            } else {
                values.push(fragment);
            }
        }
        let values = self.consume(values);
        Ok(Fragment::computed(Rc::new(move |s: &Scope<'_>| {
            let object = ObjectRef::from_pairs(
                keys.iter()
                    .cloned()
                    .zip(values.iter().map(|value| value(s))),
            );
            Value::Object(object)
        })))
    }
}

fn invoke(target: &Value, this: &Value, arguments: &[Evaluator], scope: &Scope<'_>) -> Value {
    match target.as_function() {
        Some(function) => {
            let values: Vec<Value> = arguments.iter().map(|argument| argument(scope)).collect();
            function.call(this, &values)
        }
        None => {
            debug!(target = target.type_name(), "call target is not a function");
            Value::Undefined
        }
    }
}

fn literal_value(literal: Literal) -> Value {
    match literal {
        Literal::Number(n) => Value::Number(n),
        Literal::Str(s) => Value::from(s),
        Literal::Bool(b) => Value::Bool(b),
        Literal::Null => Value::Null,
        Literal::Undefined => Value::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    fn context(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn sorted(ids: &[String]) -> Vec<&str> {
        let mut ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn extracts_identifiers() {
        let parser = Parser::new();
        let parsed = parser.parse("a.b + c[d] * 2");

        assert_eq!(sorted(parsed.identifiers()), vec!["a.b", "c", "d"]);

        let ctx = context(json!({"a": {"b": 1}, "c": {"x": 3}, "d": "x"}));
        assert_eq!(parsed.evaluate_in(&ctx), Value::from(7));
    }

    #[test]
    fn literal_expressions_have_no_identifiers() {
        let parser = Parser::new();
        let parsed = parser.parse("1 + 1");

        assert!(parsed.identifiers().is_empty());
        assert!(parsed.is_constant());
        assert_eq!(parsed.evaluate_in(&Value::Null), Value::from(2));
        assert_eq!(parsed.evaluate_in(&context(json!({"x": 5}))), Value::from(2));
    }

    #[test]
    fn constant_folding_reuses_the_value() {
        let parser = Parser::new();
        let folded = parser.parse("{a: [1, 2]}");
        let first = folded.evaluate_in(&context(json!({})));
        let second = folded.evaluate_in(&context(json!({"a": 9})));
        assert!(first.same(&second));

        let config = RuntimeConfig {
            fold_constants: false,
            ..RuntimeConfig::default()
        };
        let unfolded = Parser::with_config(&config).parse("{a: [1, 2]}");
        let first = unfolded.evaluate_in(&Value::Null);
        let second = unfolded.evaluate_in(&Value::Null);
        assert!(!first.same(&second));
        assert_eq!(first.to_json(), json!({"a": [1, 2]}));
    }

    #[test]
    fn ternary_picks_a_branch() {
        let parser = Parser::new();
        let parsed = parser.parse("a ? b : c");
        assert_eq!(sorted(parsed.identifiers()), vec!["a", "b", "c"]);

        let yes = context(json!({"a": true, "b": "yes", "c": "no"}));
        let no = context(json!({"a": 0, "b": "yes", "c": "no"}));
        assert_eq!(parsed.evaluate_in(&yes), Value::from("yes"));
        assert_eq!(parsed.evaluate_in(&no), Value::from("no"));
    }

    #[test]
    fn malformed_expressions_degrade() {
        let parser = Parser::new();
        let parsed = parser.parse("a ? b");

        assert!(matches!(parsed.error(), Some(ExpressionError::UnbalancedTernary { .. })));
        assert!(parsed.identifiers().is_empty());
        assert!(parsed.evaluate_in(&context(json!({"a": 1, "b": 2}))).is_undefined());
        assert!(parser.try_parse("a ? b").is_err());
        assert!(parser.try_parse("a;").is_err());
    }

    #[test]
    fn cache_round_trip() {
        let parser = Parser::new();
        let first = parser.parse("a + 1");
        let second = parser.parse("a + 1");
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(parser.cache_len(), 1);

        parser.clear_cache(Some("a + 1"));
        let third = parser.parse("a + 1");
        assert!(!Rc::ptr_eq(&first, &third));

        let ctx = context(json!({"a": 4}));
        assert_eq!(first.evaluate_in(&ctx), third.evaluate_in(&ctx));

        parser.parse("b");
        parser.clear_cache(None);
        assert_eq!(parser.cache_len(), 0);
    }

    #[test]
    fn caching_can_be_disabled() {
        let config = RuntimeConfig {
            cache_expressions: false,
            ..RuntimeConfig::default()
        };
        let parser = Parser::with_config(&config);
        let first = parser.parse("a");
        let second = parser.parse("a");
        assert!(!Rc::ptr_eq(&first, &second));
        assert_eq!(parser.cache_len(), 0);
    }

    #[test]
    fn static_indexes_extend_paths() {
        let parser = Parser::new();
        assert_eq!(parser.parse("items[0].name").identifiers(), ["items.0.name"]);
        assert_eq!(parser.parse("items['k']").identifiers(), ["items.k"]);
        assert_eq!(sorted(parser.parse("items[i].name").identifiers()), vec!["i", "items"]);
    }

    #[test]
    fn literal_elements_are_finalized() {
        let parser = Parser::new();
        let parsed = parser.parse("{x: a, y: [b, c.d]}");
        assert_eq!(sorted(parsed.identifiers()), vec!["a", "b", "c.d"]);

        let ctx = context(json!({"a": 1, "b": 2, "c": {"d": 3}}));
        assert_eq!(parsed.evaluate_in(&ctx).to_json(), json!({"x": 1, "y": [2, 3]}));
    }

    #[test]
    fn method_calls_bind_the_receiver() {
        let parser = Parser::new();
        let user = ObjectRef::from_pairs([("first", Value::from("Ada"))]);
        user.set(
            "greet",
            Value::function(|this, args| {
                Value::from(format!("{} {}", args[0], this.get_member("first")))
            }),
        );
        let ctx = Value::object([("user", Value::Object(user))]);

        let parsed = parser.parse("user.greet('Hi')");
        assert_eq!(parsed.identifiers(), ["user.greet"]);
        assert_eq!(parsed.evaluate_in(&ctx), Value::from("Hi Ada"));
    }

    #[test]
    fn bare_calls_use_the_context() {
        let parser = Parser::new();
        let ctx = Value::object([
            ("n", Value::from(4)),
            (
                "scaled",
                Value::function(|this, args| {
                    Value::Number(args[0].to_number() * this.get_member("factor").to_number())
                }),
            ),
            ("factor", Value::from(10)),
        ]);

        let parsed = parser.parse("scaled(n + 1)");
        assert_eq!(sorted(parsed.identifiers()), vec!["n", "scaled"]);
        assert_eq!(parsed.evaluate_in(&ctx), Value::from(50));
        assert!(parser.parse("n(1)").evaluate_in(&ctx).is_undefined());
    }

    #[test]
    fn logical_operators_short_circuit() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let ctx = Value::object([
            ("off", Value::Bool(false)),
            (
                "touch",
                Value::function(move |_, _| {
                    counter.set(counter.get() + 1);
                    Value::Bool(true)
                }),
            ),
        ]);

        let parser = Parser::new();
        assert_eq!(parser.parse("off && touch()").evaluate_in(&ctx), Value::Bool(false));
        assert_eq!(parser.parse("!off || touch()").evaluate_in(&ctx), Value::Bool(true));
        assert_eq!(calls.get(), 0);
        assert_eq!(parser.parse("off || touch()").evaluate_in(&ctx), Value::Bool(true));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn aliases_are_recorded_separately() {
        let parser = Parser::new();
        let parsed = parser.parse("@user.name + suffix");
        assert_eq!(sorted(parsed.identifiers()), vec!["@user.name", "suffix"]);
        assert_eq!(parsed.aliases(), ["user"]);

        let mut aliases = Aliases::new();
        aliases.insert("user".into(), Value::from(json!({"name": "Ada"})));
        let ctx = context(json!({"suffix": "!"}));
        assert_eq!(parsed.evaluate(&ctx, &aliases), Value::from("Ada!"));

        let bare = parser.parse("@flag");
        assert!(bare.identifiers().is_empty());
        assert_eq!(bare.aliases(), ["flag"]);
        assert!(!bare.is_constant());
    }

    #[test]
    fn leading_equals_marks_one_time() {
        let parser = Parser::new();
        let parsed = parser.parse("=a.b");
        assert!(parsed.is_one_time());
        assert_eq!(parsed.identifiers(), ["a.b"]);
        assert!(!parser.parse("a.b").is_one_time());
    }

    #[test]
    fn string_members() {
        let parser = Parser::new();
        let parsed = parser.parse("name.length > 3");
        assert_eq!(parsed.identifiers(), ["name.length"]);
        assert_eq!(parsed.evaluate_in(&context(json!({"name": "Grace"}))), Value::Bool(true));
    }

    #[test]
    fn missing_paths_read_as_undefined() {
        let parser = Parser::new();
        let parsed = parser.parse("a.b.c");
        assert!(parsed.evaluate_in(&context(json!({}))).is_undefined());
        assert!(parsed.evaluate_in(&Value::Null).is_undefined());
    }

    #[test]
    fn empty_source_is_undefined() {
        let parser = Parser::new();
        let parsed = parser.parse("   ");
        assert!(parsed.error().is_none());
        assert!(parsed.evaluate_in(&Value::Null).is_undefined());
    }
}
