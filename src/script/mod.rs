//! Built-in script evaluator.
//!
//! A small line-oriented array language for deriving extra series from a
//! loaded model:
//!
//! ```text
//! # share of exports in GDP, in percent
//! SHARE = EKS / PKB * 100
//! GAP = zeros(LL)
//! for t in 1..LL {
//!     GAP[t] = PKB[t] - PKB[t - 1]
//! }
//! ```
//!
//! Any array left in the environment after evaluation is imported back into
//! the model by the script bridge.

pub mod ast;
pub mod interpreter;
pub mod lexer;
pub mod parser;

pub use interpreter::{ScriptEngine, DEFAULT_MAX_ARRAY_LEN, DEFAULT_MAX_STEPS};
