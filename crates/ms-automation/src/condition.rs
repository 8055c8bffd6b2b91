//! Subscription conditions
//!
//! A condition is either a Rust predicate or a one-line expression evaluated
//! with minijinja over the variables `topic`, `state` and `oldState`:
//!
//! ```text
//! state == "muh"
//! state > 20 and (oldState is none or oldState <= 20)
//! ```

use minijinja::{context, Environment};
use ms_core::{ApiError, ApiResult, Payload};
use std::fmt;
use std::sync::Arc;

/// Predicate over `(topic, state, oldState)`
pub type Predicate = Arc<dyn Fn(&str, &Payload, Option<&Payload>) -> bool + Send + Sync>;

/// A filter deciding whether a matching message reaches the handler
#[derive(Clone)]
pub enum Condition {
    Predicate(Predicate),
    Expression(String),
}

impl Condition {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str, &Payload, Option<&Payload>) -> bool + Send + Sync + 'static,
    {
        Condition::Predicate(Arc::new(f))
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Predicate(_) => f.write_str("Predicate(..)"),
            Condition::Expression(expr) => f.debug_tuple("Expression").field(expr).finish(),
        }
    }
}

impl From<&str> for Condition {
    fn from(expression: &str) -> Self {
        Condition::Expression(expression.to_string())
    }
}

impl From<String> for Condition {
    fn from(expression: String) -> Self {
        Condition::Expression(expression)
    }
}

/// Compiles and evaluates condition expressions
pub struct ConditionEngine {
    env: Environment<'static>,
}

impl ConditionEngine {
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
        }
    }

    /// Reject multi-line or unparsable expressions
    pub fn validate(&self, condition: &Condition) -> ApiResult<()> {
        let Condition::Expression(expression) = condition else {
            return Ok(());
        };
        if expression.contains('\n') {
            return Err(ApiError::MultiLineCondition);
        }
        self.env
            .compile_expression(expression)
            .map(|_| ())
            .map_err(|e| ApiError::InvalidCondition {
                expression: expression.clone(),
                message: e.to_string(),
            })
    }

    /// Evaluate a condition against a message
    pub fn evaluate(
        &self,
        condition: &Condition,
        topic: &str,
        state: &Payload,
        old_state: Option<&Payload>,
    ) -> Result<bool, minijinja::Error> {
        match condition {
            Condition::Predicate(predicate) => Ok(predicate(topic, state, old_state)),
            Condition::Expression(expression) => {
                let expr = self.env.compile_expression(expression)?;
                let result = expr.eval(context! {
                    topic => topic,
                    state => state,
                    oldState => old_state,
                })?;
                Ok(result.is_true())
            }
        }
    }
}

impl Default for ConditionEngine {
    fn default() -> Self {
        Self::new()
    }
}
