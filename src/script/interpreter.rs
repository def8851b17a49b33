//! Tree-walking evaluator.
//!
//! Values are numbers or arrays of numbers with value semantics: assigning an
//! array copies it. Arithmetic works elementwise on equal-length arrays and
//! broadcasts scalars. Division by zero follows IEEE rules.

use crate::domain::bindings::{Bindings, Value};
use crate::domain::ports::ScriptEvaluator;
use crate::script::ast::{BinaryOp, Expr, Stmt, StmtKind, UnaryOp};
use crate::script::parser::parse;
use crate::utils::error::ScriptError;
use std::time::{Duration, Instant};

/// Default step budget: statements plus loop iterations.
pub const DEFAULT_MAX_STEPS: u64 = 10_000_000;

/// Default cap on the length of arrays built by `zeros` and `fill`.
pub const DEFAULT_MAX_ARRAY_LEN: usize = 1_000_000;

/// How many steps pass between wall clock checks.
const CLOCK_INTERVAL: u64 = 1024;

/// Built-in evaluator for the array scripting language.
#[derive(Debug, Clone)]
pub struct ScriptEngine {
    timeout: Option<Duration>,
    max_steps: u64,
    max_array_len: usize,
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(5)), DEFAULT_MAX_STEPS)
    }
}

impl ScriptEngine {
    pub fn new(timeout: Option<Duration>, max_steps: u64) -> Self {
        Self {
            timeout,
            max_steps,
            max_array_len: DEFAULT_MAX_ARRAY_LEN,
        }
    }

    pub fn with_max_array_len(mut self, max_array_len: usize) -> Self {
        self.max_array_len = max_array_len;
        self
    }
}

impl ScriptEvaluator for ScriptEngine {
    fn evaluate(&self, script: &str, bindings: Bindings) -> Result<Bindings, ScriptError> {
        let program = parse(script)?;
        tracing::debug!("Parsed script: {} top-level statements", program.len());

        let mut interpreter = Interpreter {
            env: bindings,
            started: Instant::now(),
            timeout: self.timeout,
            steps: 0,
            max_steps: self.max_steps,
            max_array_len: self.max_array_len,
        };
        interpreter.exec_block(&program)?;
        tracing::debug!(
            "Script finished after {} steps in {:?}",
            interpreter.steps,
            interpreter.started.elapsed()
        );
        Ok(interpreter.env)
    }
}

struct Interpreter {
    env: Bindings,
    started: Instant,
    timeout: Option<Duration>,
    steps: u64,
    max_steps: u64,
    max_array_len: usize,
}

impl Interpreter {
    fn tick(&mut self) -> Result<(), ScriptError> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(ScriptError::StepLimit {
                limit: self.max_steps,
            });
        }
        if let Some(timeout) = self.timeout {
            if self.steps % CLOCK_INTERVAL == 0 && self.started.elapsed() > timeout {
                return Err(ScriptError::Timeout {
                    limit_ms: timeout.as_millis() as u64,
                });
            }
        }
        Ok(())
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<(), ScriptError> {
        for stmt in stmts {
            self.exec(stmt)?;
        }
        Ok(())
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<(), ScriptError> {
        self.tick()?;
        let line = stmt.line;

        match &stmt.kind {
            StmtKind::Assign { name, value } => {
                let value = self.eval(value, line)?;
                self.env.set(name.clone(), value);
            }
            StmtKind::AssignIndex { name, index, value } => {
                let index = self.eval(index, line)?;
                let value = match self.eval(value, line)? {
                    Value::Number(n) => n,
                    other => {
                        return Err(type_error(
                            line,
                            format!("cannot store {} in {}[...]", other.type_name(), name),
                        ))
                    }
                };
                let slot = match self.env.get_mut(name) {
                    Some(Value::Array(values)) => values,
                    Some(Value::Number(_)) => {
                        return Err(type_error(line, format!("{} is not an array", name)))
                    }
                    None => {
                        return Err(ScriptError::UndefinedVariable {
                            line,
                            name: name.clone(),
                        })
                    }
                };
                let i = to_index(&index, slot.len(), line)?;
                slot[i] = value;
            }
            StmtKind::For {
                var,
                start,
                end,
                body,
            } => {
                let start = to_integer(&self.eval(start, line)?, line)?;
                let end = to_integer(&self.eval(end, line)?, line)?;
                let mut i = start;
                while i < end {
                    self.tick()?;
                    self.env.set(var.clone(), Value::Number(i as f64));
                    self.exec_block(body)?;
                    i += 1;
                }
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let taken = match self.eval(cond, line)? {
                    Value::Number(n) => n != 0.0,
                    Value::Array(_) => {
                        return Err(type_error(line, "condition must be a number".to_string()))
                    }
                };
                if taken {
                    self.exec_block(then_branch)?;
                } else {
                    self.exec_block(else_branch)?;
                }
            }
            StmtKind::Expr(expr) => {
                self.eval(expr, line)?;
            }
        }

        Ok(())
    }

    fn eval(&mut self, expr: &Expr, line: usize) -> Result<Value, ScriptError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Var(name) => self
                .env
                .get(name)
                .cloned()
                .ok_or_else(|| ScriptError::UndefinedVariable {
                    line,
                    name: name.clone(),
                }),
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match self.eval(item, line)? {
                        Value::Number(n) => values.push(n),
                        Value::Array(_) => {
                            return Err(type_error(line, "nested arrays are not supported".to_string()))
                        }
                    }
                }
                Ok(Value::Array(values))
            }
            Expr::Index { target, index } => {
                let target = self.eval(target, line)?;
                let index = self.eval(index, line)?;
                match target {
                    Value::Array(values) => {
                        let i = to_index(&index, values.len(), line)?;
                        Ok(Value::Number(values[i]))
                    }
                    Value::Number(_) => Err(type_error(line, "cannot index a number".to_string())),
                }
            }
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => Ok(map_value(self.eval(operand, line)?, |x| -x)),
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, line)?;
                let right = self.eval(right, line)?;
                binary_op(*op, left, right, line)
            }
            Expr::Call { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, line)?);
                }
                call_builtin(name, values, line, self.max_array_len)
            }
        }
    }
}

fn type_error(line: usize, message: String) -> ScriptError {
    ScriptError::Type { line, message }
}

fn to_integer(value: &Value, line: usize) -> Result<i64, ScriptError> {
    match value {
        Value::Number(n) if n.is_finite() => Ok(n.trunc() as i64),
        Value::Number(n) => Err(type_error(line, format!("{} is not a valid integer", n))),
        Value::Array(_) => Err(type_error(line, "expected a number, found array".to_string())),
    }
}

fn to_index(value: &Value, len: usize, line: usize) -> Result<usize, ScriptError> {
    let index = to_integer(value, line)?;
    if index < 0 || index as usize >= len {
        return Err(ScriptError::IndexOutOfBounds { line, index, len });
    }
    Ok(index as usize)
}

fn map_value(value: Value, f: impl Fn(f64) -> f64) -> Value {
    match value {
        Value::Number(n) => Value::Number(f(n)),
        Value::Array(values) => Value::Array(values.into_iter().map(f).collect()),
    }
}

/// Apply `f` elementwise, broadcasting scalars against arrays.
fn zip_values(
    left: Value,
    right: Value,
    line: usize,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Value, ScriptError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(f(a, b))),
        (Value::Array(a), Value::Number(b)) => {
            Ok(Value::Array(a.into_iter().map(|x| f(x, b)).collect()))
        }
        (Value::Number(a), Value::Array(b)) => {
            Ok(Value::Array(b.into_iter().map(|y| f(a, y)).collect()))
        }
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                return Err(ScriptError::LengthMismatch {
                    line,
                    left: a.len(),
                    right: b.len(),
                });
            }
            Ok(Value::Array(a.into_iter().zip(b).map(|(x, y)| f(x, y)).collect()))
        }
    }
}

fn binary_op(op: BinaryOp, left: Value, right: Value, line: usize) -> Result<Value, ScriptError> {
    if op.is_comparison() {
        let (a, b) = match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => (*a, *b),
            _ => {
                return Err(type_error(
                    line,
                    format!(
                        "'{}' compares numbers, found {} and {}",
                        op.symbol(),
                        left.type_name(),
                        right.type_name()
                    ),
                ))
            }
        };
        let result = match op {
            BinaryOp::Eq => a == b,
            BinaryOp::Ne => a != b,
            BinaryOp::Lt => a < b,
            BinaryOp::Le => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        };
        return Ok(Value::Number(if result { 1.0 } else { 0.0 }));
    }

    match op {
        BinaryOp::Add => zip_values(left, right, line, |a, b| a + b),
        BinaryOp::Sub => zip_values(left, right, line, |a, b| a - b),
        BinaryOp::Mul => zip_values(left, right, line, |a, b| a * b),
        _ => zip_values(left, right, line, |a, b| a / b),
    }
}

fn expect_arity(name: &str, args: &[Value], expected: usize, line: usize) -> Result<(), ScriptError> {
    if args.len() != expected {
        return Err(ScriptError::Arity {
            line,
            name: name.to_string(),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

fn array_arg<'a>(name: &str, value: &'a Value, line: usize) -> Result<&'a [f64], ScriptError> {
    value
        .as_array()
        .ok_or_else(|| type_error(line, format!("{}() expects an array", name)))
}

fn length_arg(name: &str, value: &Value, line: usize) -> Result<usize, ScriptError> {
    let n = to_integer(value, line)?;
    usize::try_from(n).map_err(|_| type_error(line, format!("{}() length must not be negative", name)))
}

/// `len` copies of `value`, refusing lengths above `limit` or that cannot be allocated.
fn filled_array(len: usize, value: f64, line: usize, limit: usize) -> Result<Value, ScriptError> {
    let too_large = || ScriptError::ArrayTooLarge { line, len, limit };
    if len > limit {
        return Err(too_large());
    }
    let mut values = Vec::new();
    values.try_reserve_exact(len).map_err(|_| too_large())?;
    values.resize(len, value);
    Ok(Value::Array(values))
}

fn call_builtin(
    name: &str,
    args: Vec<Value>,
    line: usize,
    max_array_len: usize,
) -> Result<Value, ScriptError> {
    match name {
        "zeros" => {
            expect_arity(name, &args, 1, line)?;
            filled_array(length_arg(name, &args[0], line)?, 0.0, line, max_array_len)
        }
        "fill" => {
            expect_arity(name, &args, 2, line)?;
            let n = length_arg(name, &args[0], line)?;
            match args[1] {
                Value::Number(v) => filled_array(n, v, line, max_array_len),
                Value::Array(_) => Err(type_error(line, "fill() value must be a number".to_string())),
            }
        }
        "len" => {
            expect_arity(name, &args, 1, line)?;
            Ok(Value::Number(array_arg(name, &args[0], line)?.len() as f64))
        }
        "sum" => {
            expect_arity(name, &args, 1, line)?;
            Ok(Value::Number(array_arg(name, &args[0], line)?.iter().sum()))
        }
        "cumprod" => {
            expect_arity(name, &args, 1, line)?;
            let mut acc = 1.0;
            let values = array_arg(name, &args[0], line)?
                .iter()
                .map(|x| {
                    acc *= x;
                    acc
                })
                .collect();
            Ok(Value::Array(values))
        }
        "abs" | "sqrt" | "exp" | "ln" => {
            expect_arity(name, &args, 1, line)?;
            let f: fn(f64) -> f64 = match name {
                "abs" => f64::abs,
                "sqrt" => f64::sqrt,
                "exp" => f64::exp,
                _ => f64::ln,
            };
            let mut args = args;
            Ok(map_value(args.remove(0), f))
        }
        "pow" | "min" | "max" => {
            expect_arity(name, &args, 2, line)?;
            let f: fn(f64, f64) -> f64 = match name {
                "pow" => f64::powf,
                "min" => f64::min,
                _ => f64::max,
            };
            let mut args = args.into_iter();
            match (args.next(), args.next()) {
                (Some(a), Some(b)) => zip_values(a, b, line, f),
                _ => Err(type_error(line, format!("{}() expects two arguments", name))),
            }
        }
        _ => Err(ScriptError::UnknownFunction {
            line,
            name: name.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(script: &str) -> Result<Bindings, ScriptError> {
        ScriptEngine::default().evaluate(script, Bindings::new())
    }

    fn array(env: &Bindings, name: &str) -> Vec<f64> {
        env.get(name).and_then(Value::as_array).unwrap().to_vec()
    }

    #[test]
    fn test_elementwise_and_broadcast() {
        let env = run("A = [1, 2, 3]\nB = A * 2 + [1, 1, 1]\nC = 10 - A").unwrap();
        assert_eq!(array(&env, "B"), vec![3.0, 5.0, 7.0]);
        assert_eq!(array(&env, "C"), vec![9.0, 8.0, 7.0]);
    }

    #[test]
    fn test_loop_builds_series() {
        let mut bindings = Bindings::new();
        bindings.set("LL", Value::Number(4.0));
        bindings.set("KI", Value::Array(vec![100.0, 110.0, 121.0, 133.1]));

        let script = "
# growth rate of KI in percent
RATE = zeros(LL)
for t in 1..LL {
    RATE[t] = (KI[t] / KI[t - 1] - 1) * 100
}
";
        let env = ScriptEngine::default().evaluate(script, bindings).unwrap();
        let rate = array(&env, "RATE");
        assert_eq!(rate[0], 0.0);
        for r in &rate[1..] {
            assert!((r - 10.0).abs() < 1e-9);
        }
        assert_eq!(env.get("t"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn test_if_else() {
        let env = run("X = 3\nif X >= 3 { Y = 1 } else { Y = 2 }\nif X != 3 { Z = 1 } else { Z = 0 }").unwrap();
        assert_eq!(env.get("Y"), Some(&Value::Number(1.0)));
        assert_eq!(env.get("Z"), Some(&Value::Number(0.0)));
    }

    #[test]
    fn test_builtins() {
        let env = run(
            "A = fill(3, 2)\nP = cumprod(A)\nS = sum(P)\nN = len(P)\nM = max(P, 5)\nQ = pow(2, 10)\nR = sqrt([4, 9])",
        )
        .unwrap();
        assert_eq!(array(&env, "P"), vec![2.0, 4.0, 8.0]);
        assert_eq!(env.get("S"), Some(&Value::Number(14.0)));
        assert_eq!(env.get("N"), Some(&Value::Number(3.0)));
        assert_eq!(array(&env, "M"), vec![5.0, 5.0, 8.0]);
        assert_eq!(env.get("Q"), Some(&Value::Number(1024.0)));
        assert_eq!(array(&env, "R"), vec![2.0, 3.0]);
    }

    #[test]
    fn test_arrays_are_copied_on_assignment() {
        let env = run("A = [1, 2]\nB = A\nB[0] = 9").unwrap();
        assert_eq!(array(&env, "A"), vec![1.0, 2.0]);
        assert_eq!(array(&env, "B"), vec![9.0, 2.0]);
    }

    #[test]
    fn test_runtime_errors() {
        assert_eq!(
            run("A = B + 1").unwrap_err(),
            ScriptError::UndefinedVariable {
                line: 1,
                name: "B".to_string()
            }
        );
        assert_eq!(
            run("A = [1]\n\nX = A[1]").unwrap_err(),
            ScriptError::IndexOutOfBounds {
                line: 3,
                index: 1,
                len: 1
            }
        );
        assert_eq!(
            run("A = [1, 2] + [1]").unwrap_err(),
            ScriptError::LengthMismatch {
                line: 1,
                left: 2,
                right: 1
            }
        );
        assert!(matches!(
            run("A = nope(1)").unwrap_err(),
            ScriptError::UnknownFunction { .. }
        ));
        assert!(matches!(
            run("A = zeros(1, 2)").unwrap_err(),
            ScriptError::Arity { expected: 1, actual: 2, .. }
        ));
        assert!(matches!(
            run("if [1] { A = 1 }").unwrap_err(),
            ScriptError::Type { .. }
        ));
    }

    #[test]
    fn test_step_limit_stops_runaway_loop() {
        let engine = ScriptEngine::new(None, 1_000);
        let err = engine
            .evaluate("for i in 0..1000000000 { X = i }", Bindings::new())
            .unwrap_err();
        assert_eq!(err, ScriptError::StepLimit { limit: 1_000 });
    }

    #[test]
    fn test_deadline_stops_runaway_loop() {
        let engine = ScriptEngine::new(Some(Duration::from_millis(20)), u64::MAX);
        let err = engine
            .evaluate(
                "for i in 0..1000000000000 { X = i * 2 }",
                Bindings::new(),
            )
            .unwrap_err();
        assert_eq!(err, ScriptError::Timeout { limit_ms: 20 });
    }

    #[test]
    fn test_oversized_arrays_are_refused() {
        assert_eq!(
            run("X = zeros(1e19)").unwrap_err(),
            ScriptError::ArrayTooLarge {
                line: 1,
                len: i64::MAX as usize,
                limit: DEFAULT_MAX_ARRAY_LEN,
            }
        );
        assert!(matches!(
            run("\nX = fill(1e12, 1)").unwrap_err(),
            ScriptError::ArrayTooLarge { line: 2, len: 1_000_000_000_000, .. }
        ));

        let engine = ScriptEngine::default().with_max_array_len(usize::MAX);
        assert!(matches!(
            engine.evaluate("X = zeros(1e19)", Bindings::new()).unwrap_err(),
            ScriptError::ArrayTooLarge { .. }
        ));
    }

    #[test]
    fn test_array_limit_is_configurable() {
        let engine = ScriptEngine::default().with_max_array_len(4);
        let env = engine.evaluate("X = fill(4, 2)", Bindings::new()).unwrap();
        assert_eq!(array(&env, "X"), vec![2.0; 4]);
        assert!(engine.evaluate("X = zeros(5)", Bindings::new()).is_err());
    }
}
