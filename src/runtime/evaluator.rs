use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::runtime::context::{GlobalObjectResolver, JoinPoint};
use crate::runtime::expr::RuntimeExpr;
use crate::runtime::serial::{self, DeserializeError, SerializeError};

/// Key prefix for compiled expression blobs in the durable cache.
const CACHE_KEY_PREFIX: &str = "aop_expr_";

/// Durable store for serialized compiled expressions, shared between the
/// compile pass that produces them and the processes that evaluate them.
pub trait ExpressionCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, payload: Vec<u8>);
    fn flush(&self);
}

/// An [`ExpressionCache`] backed by a process-local map. Useful for tests
/// and single-process hosts; real deployments back this trait with
/// whatever durable store survives restarts.
#[derive(Default)]
pub struct InMemoryExpressionCache {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryExpressionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExpressionCache for InMemoryExpressionCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().expect("lock poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, payload: Vec<u8>) {
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(key.to_owned(), payload);
    }

    fn flush(&self) {
        self.entries.write().expect("lock poisoned").clear();
    }
}

/// Evaluating a stored runtime expression failed.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(
        "no compiled runtime expression found for identifier \"{id}\"; flush the compiled \
         expression caches and recompile"
    )]
    MissingExpression { id: String },

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error(transparent)]
    Deserialize(#[from] DeserializeError),
}

/// Evaluates compiled runtime expressions by identifier.
///
/// Expressions are registered once per compile pass and loaded lazily by
/// any process that only evaluates: a memory miss falls back to the
/// durable cache, decodes the blob and memoizes the tree. The memory map
/// uses a coarse lock; duplicate decodes under contention are harmless,
/// duplicate insertion is not.
pub struct RuntimeExpressionEvaluator {
    cache: Arc<dyn ExpressionCache>,
    expressions: RwLock<HashMap<String, Arc<RuntimeExpr>>>,
}

impl RuntimeExpressionEvaluator {
    #[must_use]
    pub fn new(cache: Arc<dyn ExpressionCache>) -> Self {
        RuntimeExpressionEvaluator {
            cache,
            expressions: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a compiled expression under an identifier, writing it
    /// through to the durable cache.
    pub fn add_expression(&self, id: &str, expr: RuntimeExpr) -> Result<(), EvaluationError> {
        let blob = serial::encode(&expr)?;
        self.cache.set(&cache_key(id), blob);
        self.expressions
            .write()
            .expect("lock poisoned")
            .insert(id.to_owned(), Arc::new(expr));
        Ok(())
    }

    /// Whether an expression is registered under the identifier, in memory
    /// or durably.
    #[must_use]
    pub fn has_expression(&self, id: &str) -> bool {
        if self
            .expressions
            .read()
            .expect("lock poisoned")
            .contains_key(id)
        {
            return true;
        }
        self.cache.get(&cache_key(id)).is_some()
    }

    /// Evaluates the expression registered under `id` against one method
    /// invocation.
    pub fn evaluate(
        &self,
        id: &str,
        join_point: &dyn JoinPoint,
        globals: &dyn GlobalObjectResolver,
    ) -> Result<bool, EvaluationError> {
        let expr = self.lookup(id)?;
        Ok(expr.evaluate(join_point, globals))
    }

    /// Drops all durably cached expressions. In-memory entries of already
    /// running evaluators are intentionally left alone; a restarted
    /// process will find the store empty and report missing expressions
    /// until the next compile pass.
    pub fn flush_cache(&self) {
        self.cache.flush();
    }

    fn lookup(&self, id: &str) -> Result<Arc<RuntimeExpr>, EvaluationError> {
        if let Some(expr) = self.expressions.read().expect("lock poisoned").get(id) {
            return Ok(expr.clone());
        }

        let blob = self
            .cache
            .get(&cache_key(id))
            .ok_or_else(|| EvaluationError::MissingExpression { id: id.to_owned() })?;
        let expr = Arc::new(serial::decode(&blob)?);

        let mut expressions = self.expressions.write().expect("lock poisoned");
        Ok(expressions
            .entry(id.to_owned())
            .or_insert(expr)
            .clone())
    }
}

fn cache_key(id: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{id}")
}
