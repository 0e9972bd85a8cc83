//! Condition evaluation and projection against a single item.

use std::cmp::Ordering;
use std::collections::HashMap;

use dynasql_model::AttributeValue;

use super::ast::{AttributePath, CompareOp, Expr, FunctionName, LogicalOp, Operand};
use super::parser::ExpressionError;

/// An item bound to the placeholder maps of one request.
#[derive(Debug)]
pub struct EvalContext<'a> {
    pub item: &'a HashMap<String, AttributeValue>,
    /// `#name` -> attribute name.
    pub names: &'a HashMap<String, String>,
    /// `:value` -> attribute value.
    pub values: &'a HashMap<String, AttributeValue>,
}

impl EvalContext<'_> {
    /// Evaluate a condition against the item.
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError` if a placeholder cannot be resolved or an
    /// operand has the wrong type for its function.
    pub fn evaluate(&self, expr: &Expr) -> Result<bool, ExpressionError> {
        match expr {
            Expr::Compare { left, op, right } => {
                let (Some(l), Some(r)) = (self.resolve_operand(left)?, self.resolve_operand(right)?)
                else {
                    // A missing attribute compares false, even for `<>`.
                    return Ok(false);
                };
                Ok(compare_values(l, r, *op))
            }
            Expr::Between { value, low, high } => {
                let v = self.resolve_operand(value)?;
                let lo = self.resolve_operand(low)?;
                let hi = self.resolve_operand(high)?;
                let (Some(v), Some(lo), Some(hi)) = (v, lo, hi) else {
                    return Ok(false);
                };
                Ok(compare_values(v, lo, CompareOp::Ge) && compare_values(v, hi, CompareOp::Le))
            }
            Expr::In { value, list } => {
                let Some(v) = self.resolve_operand(value)? else {
                    return Ok(false);
                };
                for candidate in list {
                    if self
                        .resolve_operand(candidate)?
                        .is_some_and(|c| compare_values(v, c, CompareOp::Eq))
                    {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Expr::Logical { op, left, right } => match op {
                LogicalOp::And => Ok(self.evaluate(left)? && self.evaluate(right)?),
                LogicalOp::Or => Ok(self.evaluate(left)? || self.evaluate(right)?),
            },
            Expr::Not(inner) => self.evaluate(inner).map(|v| !v),
            Expr::Function { name, args } => self.eval_function(*name, args),
        }
    }

    fn eval_function(&self, name: FunctionName, args: &[Operand]) -> Result<bool, ExpressionError> {
        let Some(Operand::Path(path)) = args.first() else {
            return Err(ExpressionError::InvalidOperand {
                operation: name.to_string(),
                message: "first argument must be an attribute path".to_owned(),
            });
        };
        let attr = self.resolve_path(path)?;
        match name {
            FunctionName::AttributeExists => Ok(attr.is_some()),
            FunctionName::AttributeNotExists => Ok(attr.is_none()),
            FunctionName::BeginsWith => {
                let prefix = self.second_argument(name, args)?;
                let Some(AttributeValue::S(prefix)) = prefix else {
                    return Err(ExpressionError::TypeMismatch {
                        message: "begins_with prefix must be a string".to_owned(),
                    });
                };
                Ok(attr
                    .and_then(AttributeValue::as_s)
                    .is_some_and(|s| s.starts_with(prefix.as_str())))
            }
            FunctionName::Contains => {
                let (Some(attr), Some(needle)) = (attr, self.second_argument(name, args)?) else {
                    return Ok(false);
                };
                Ok(contains(attr, needle))
            }
        }
    }

    fn second_argument(
        &self,
        name: FunctionName,
        args: &[Operand],
    ) -> Result<Option<&AttributeValue>, ExpressionError> {
        let operand = args.get(1).ok_or_else(|| ExpressionError::InvalidOperand {
            operation: name.to_string(),
            message: "missing second argument".to_owned(),
        })?;
        self.resolve_operand(operand)
    }

    /// Resolve an operand to the value it names, if present.
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError` for an unknown `#name` or `:value`.
    pub fn resolve_operand(
        &self,
        operand: &Operand,
    ) -> Result<Option<&AttributeValue>, ExpressionError> {
        match operand {
            Operand::Path(path) => self.resolve_path(path),
            Operand::Value(name) => {
                let key = format!(":{name}");
                self.values
                    .get(&key)
                    .map(Some)
                    .ok_or(ExpressionError::UnresolvedValue { name: key })
            }
        }
    }

    /// Walk a dotted path through nested maps.
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError` for an unknown `#name` placeholder.
    pub fn resolve_path(
        &self,
        path: &AttributePath,
    ) -> Result<Option<&AttributeValue>, ExpressionError> {
        let mut current: Option<&AttributeValue> = None;
        for (i, segment) in path.segments.iter().enumerate() {
            let name = self.resolve_name(segment)?;
            current = if i == 0 {
                self.item.get(name)
            } else {
                current.and_then(AttributeValue::as_m).and_then(|m| m.get(name))
            };
            if current.is_none() {
                return Ok(None);
            }
        }
        Ok(current)
    }

    /// Substitute a `#name` placeholder; plain names pass through.
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError::UnresolvedName` for an unknown placeholder.
    pub fn resolve_name<'s>(&'s self, segment: &'s str) -> Result<&'s str, ExpressionError> {
        if segment.starts_with('#') {
            self.names
                .get(segment)
                .map(String::as_str)
                .ok_or_else(|| ExpressionError::UnresolvedName {
                    name: segment.to_owned(),
                })
        } else {
            Ok(segment)
        }
    }

    /// Keep only the top-level attributes named by `paths`.
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError` for an unknown `#name` placeholder.
    pub fn apply_projection(
        &self,
        paths: &[AttributePath],
    ) -> Result<HashMap<String, AttributeValue>, ExpressionError> {
        let mut result = HashMap::with_capacity(paths.len());
        for path in paths {
            let Some(top) = path.top() else { continue };
            let name = self.resolve_name(top)?;
            if let Some(value) = self.item.get(name) {
                result.insert(name.to_owned(), value.clone());
            }
        }
        Ok(result)
    }
}

/// Compare two values; values of different types only satisfy `<>`.
#[must_use]
pub fn compare_values(left: &AttributeValue, right: &AttributeValue, op: CompareOp) -> bool {
    let ordering = match (left, right) {
        (AttributeValue::S(a), AttributeValue::S(b)) => a.cmp(b),
        (AttributeValue::B(a), AttributeValue::B(b)) => a.cmp(b),
        (AttributeValue::N(a), AttributeValue::N(b)) => match compare_numbers(a, b) {
            Some(ordering) => ordering,
            None => return false,
        },
        (AttributeValue::Bool(a), AttributeValue::Bool(b)) => {
            return match op {
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
                _ => false,
            };
        }
        _ => return op == CompareOp::Ne && left != right,
    };
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
    }
}

/// Order two decimal strings numerically.
#[must_use]
pub fn compare_numbers(a: &str, b: &str) -> Option<Ordering> {
    let a = a.trim().parse::<f64>().ok()?;
    let b = b.trim().parse::<f64>().ok()?;
    a.partial_cmp(&b)
}

fn contains(haystack: &AttributeValue, needle: &AttributeValue) -> bool {
    match (haystack, needle) {
        (AttributeValue::S(s), AttributeValue::S(sub)) => s.contains(sub.as_str()),
        (AttributeValue::Ss(set), AttributeValue::S(v)) => set.contains(v),
        (AttributeValue::Ns(set), AttributeValue::N(v)) => set
            .iter()
            .any(|n| compare_numbers(n, v) == Some(Ordering::Equal)),
        (AttributeValue::Bs(set), AttributeValue::B(v)) => set.contains(v),
        (AttributeValue::L(list), _) => list.contains(needle),
        _ => false,
    }
}
