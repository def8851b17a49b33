//! Hand-written recursive descent parser.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! program    := sep* (stmt (sep+ | EOF))*
//! stmt       := "for" IDENT "in" expr ".." expr block
//!             | "if" expr block ("else" (if-stmt | block))?
//!             | expr ("=" expr)?
//! comparison := additive (("==" | "!=" | "<" | "<=" | ">" | ">=") additive)?
//! additive   := term (("+" | "-") term)*
//! term       := unary (("*" | "/") unary)*
//! unary      := "-" unary | postfix
//! postfix    := primary ("[" expr "]")*
//! primary    := NUMBER | IDENT | IDENT "(" args ")" | "[" args "]" | "(" expr ")"
//! ```
//!
//! Blocks, brackets and operator chains may nest at most [`MAX_NESTING`]
//! levels deep; deeper input is a parse error.

use crate::script::ast::{BinaryOp, Expr, Stmt, StmtKind, UnaryOp};
use crate::script::lexer::{tokenize, Lexeme, Token};
use crate::utils::error::ScriptError;

pub fn parse(source: &str) -> Result<Vec<Stmt>, ScriptError> {
    let lexemes = tokenize(source)?;
    let mut stream = TokenStream::new(&lexemes);
    let program = stream.statements(None)?;
    Ok(program)
}

/// Limit on parser recursion and on expression tree height.
pub const MAX_NESTING: usize = 128;

struct TokenStream<'src> {
    lexemes: &'src [Lexeme],
    pos: usize,
    depth: usize,
}

impl<'src> TokenStream<'src> {
    fn new(lexemes: &'src [Lexeme]) -> Self {
        Self {
            lexemes,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.lexemes.get(self.pos).map(|l| &l.token)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.lexemes.get(self.pos).map(|l| &l.token);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn line(&self) -> usize {
        self.lexemes
            .get(self.pos)
            .or_else(|| self.lexemes.last())
            .map_or(1, |l| l.line)
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek() == Some(expected)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ScriptError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}', found {}", expected, self.describe_current())))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ScriptError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(format!("expected identifier, found {}", self.describe_current()))),
        }
    }

    fn describe_current(&self) -> String {
        match self.peek() {
            Some(token) => format!("'{}'", token),
            None => "end of script".to_string(),
        }
    }

    fn error(&self, message: String) -> ScriptError {
        ScriptError::Parse {
            line: self.line(),
            message,
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(Token::Newline) | Some(Token::Semi)) {
            self.pos += 1;
        }
    }

    fn skip_newlines(&mut self) {
        while self.eat(&Token::Newline) {}
    }

    /// Statements until `terminator` (or end of input when `None`).
    fn statements(&mut self, terminator: Option<&Token>) -> Result<Vec<Stmt>, ScriptError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            match (self.peek(), terminator) {
                (None, None) => return Ok(stmts),
                (None, Some(t)) => {
                    return Err(self.error(format!("expected '{}' before end of script", t)))
                }
                (Some(token), Some(t)) if token == t => return Ok(stmts),
                _ => {}
            }

            stmts.push(self.statement()?);

            let at_boundary = match self.peek() {
                None | Some(Token::Newline) | Some(Token::Semi) => true,
                Some(token) => terminator == Some(token),
            };
            if !at_boundary {
                return Err(self.error(format!(
                    "expected end of statement, found {}",
                    self.describe_current()
                )));
            }
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        self.skip_newlines();
        self.expect(Token::LBrace)?;
        let body = self.nested(|s| s.statements(Some(&Token::RBrace)))?;
        self.expect(Token::RBrace)?;
        Ok(body)
    }

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        let line = self.line();
        let kind = match self.peek() {
            Some(Token::For) => self.for_statement()?,
            Some(Token::If) => self.if_statement()?,
            _ => self.assignment_or_expr()?,
        };
        Ok(Stmt { line, kind })
    }

    fn for_statement(&mut self) -> Result<StmtKind, ScriptError> {
        self.expect(Token::For)?;
        let var = self.expect_ident()?;
        self.expect(Token::In)?;
        let start = self.expr()?;
        self.expect(Token::DotDot)?;
        let end = self.expr()?;
        let body = self.block()?;
        Ok(StmtKind::For {
            var,
            start,
            end,
            body,
        })
    }

    fn if_statement(&mut self) -> Result<StmtKind, ScriptError> {
        self.expect(Token::If)?;
        let cond = self.expr()?;
        let then_branch = self.block()?;

        let else_branch = if self.eat(&Token::Else) {
            if self.check(&Token::If) {
                vec![self.nested(Self::statement)?]
            } else {
                self.block()?
            }
        } else {
            Vec::new()
        };

        Ok(StmtKind::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn assignment_or_expr(&mut self) -> Result<StmtKind, ScriptError> {
        let target = self.expr()?;
        if !self.eat(&Token::Assign) {
            return Ok(StmtKind::Expr(target));
        }

        let value = self.expr()?;
        match target {
            Expr::Var(name) => Ok(StmtKind::Assign { name, value }),
            Expr::Index { target, index } => match *target {
                Expr::Var(name) => Ok(StmtKind::AssignIndex {
                    name,
                    index: *index,
                    value,
                }),
                _ => Err(self.error("only NAME[index] can be assigned to".to_string())),
            },
            _ => Err(self.error("invalid assignment target".to_string())),
        }
    }

    fn expr(&mut self) -> Result<Expr, ScriptError> {
        Ok(self.comparison()?.expr)
    }

    /// Run `parse` one nesting level deeper, failing past `MAX_NESTING`.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ScriptError>,
    ) -> Result<T, ScriptError> {
        if self.depth >= MAX_NESTING {
            return Err(self.nesting_error());
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn nesting_error(&self) -> ScriptError {
        self.error(format!("expression nested deeper than {} levels", MAX_NESTING))
    }

    /// Bound the height of every built node so evaluation cannot overflow the stack.
    fn node(&self, expr: Expr, children: &[usize]) -> Result<Node, ScriptError> {
        let height = 1 + children.iter().copied().max().unwrap_or(0);
        if height > MAX_NESTING {
            return Err(self.nesting_error());
        }
        Ok(Node { expr, height })
    }

    fn binary_node(&self, op: BinaryOp, left: Node, right: Node) -> Result<Node, ScriptError> {
        let children = [left.height, right.height];
        self.node(binary(op, left.expr, right.expr), &children)
    }

    fn comparison(&mut self) -> Result<Node, ScriptError> {
        let left = self.additive()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.additive()?;
        self.binary_node(op, left, right)
    }

    fn additive(&mut self) -> Result<Node, ScriptError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = self.binary_node(op, left, right)?;
        }
    }

    fn term(&mut self) -> Result<Node, ScriptError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = self.binary_node(op, left, right)?;
        }
    }

    fn unary(&mut self) -> Result<Node, ScriptError> {
        if self.eat(&Token::Minus) {
            let operand = self.nested(Self::unary)?;
            let height = operand.height;
            let expr = Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand.expr),
            };
            return self.node(expr, &[height]);
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Node, ScriptError> {
        let mut node = self.primary()?;
        while self.eat(&Token::LBracket) {
            let index = self.nested(Self::comparison)?;
            self.expect(Token::RBracket)?;
            let children = [node.height, index.height];
            let expr = Expr::Index {
                target: Box::new(node.expr),
                index: Box::new(index.expr),
            };
            node = self.node(expr, &children)?;
        }
        Ok(node)
    }

    fn primary(&mut self) -> Result<Node, ScriptError> {
        match self.peek().cloned() {
            Some(Token::Number(n)) => {
                self.advance();
                self.node(Expr::Number(n), &[])
            }
            Some(Token::Ident(name)) => {
                self.advance();
                if self.eat(&Token::LParen) {
                    let (args, height) = self.nested(|s| s.arguments(Token::RParen))?;
                    self.node(Expr::Call { name, args }, &[height])
                } else {
                    self.node(Expr::Var(name), &[])
                }
            }
            Some(Token::LBracket) => {
                self.advance();
                let (items, height) = self.nested(|s| s.arguments(Token::RBracket))?;
                self.node(Expr::Array(items), &[height])
            }
            Some(Token::LParen) => {
                self.advance();
                self.nested(|s| {
                    s.skip_newlines();
                    let inner = s.comparison()?;
                    s.skip_newlines();
                    s.expect(Token::RParen)?;
                    Ok(inner)
                })
            }
            _ => Err(self.error(format!("expected expression, found {}", self.describe_current()))),
        }
    }

    /// Comma-separated expressions up to `close`, with the tallest item's
    /// height. Newlines are allowed between items.
    fn arguments(&mut self, close: Token) -> Result<(Vec<Expr>, usize), ScriptError> {
        let mut items = Vec::new();
        let mut height = 0;
        self.skip_newlines();
        if self.eat(&close) {
            return Ok((items, height));
        }
        loop {
            self.skip_newlines();
            let item = self.comparison()?;
            height = height.max(item.height);
            items.push(item.expr);
            self.skip_newlines();
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(close.clone())?;
            return Ok((items, height));
        }
    }
}

/// An expression with the height of its tree.
struct Node {
    expr: Expr,
    height: usize,
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expr {
        Expr::Var(name.to_string())
    }

    #[test]
    fn test_precedence() {
        let program = parse("X = 1 + 2 * KI[0]").unwrap();
        let expected = StmtKind::Assign {
            name: "X".to_string(),
            value: binary(
                BinaryOp::Add,
                Expr::Number(1.0),
                binary(
                    BinaryOp::Mul,
                    Expr::Number(2.0),
                    Expr::Index {
                        target: Box::new(var("KI")),
                        index: Box::new(Expr::Number(0.0)),
                    },
                ),
            ),
        };
        assert_eq!(program[0].kind, expected);
    }

    #[test]
    fn test_for_loop_and_index_assignment() {
        let source = "S = zeros(LL)\nfor t in 1..LL {\n  S[t] = S[t - 1] + 1\n}\n";
        let program = parse(source).unwrap();
        assert_eq!(program.len(), 2);

        match &program[1].kind {
            StmtKind::For { var, body, .. } => {
                assert_eq!(var, "t");
                assert_eq!(body.len(), 1);
                assert_eq!(body[0].line, 3);
                assert!(matches!(body[0].kind, StmtKind::AssignIndex { .. }));
            }
            other => panic!("expected for loop, got {:?}", other),
        }
    }

    #[test]
    fn test_if_else_chain() {
        let source = "if LL > 2 { A = 1 } else if LL == 2 { A = 2 } else { A = 3 }";
        let program = parse(source).unwrap();
        match &program[0].kind {
            StmtKind::If { else_branch, .. } => {
                assert!(matches!(else_branch[0].kind, StmtKind::If { .. }));
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_multiline_array_literal_and_semicolons() {
        let program = parse("A = [1,\n 2,\n 3]; B = len(A)").unwrap();
        assert_eq!(program.len(), 2);
        assert_eq!(program[1].line, 3);
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let err = parse("A = 1\nB = (2 + \n").unwrap_err();
        assert!(matches!(err, ScriptError::Parse { line: 3, .. } | ScriptError::Parse { line: 2, .. }));

        let err = parse("A = 1 2").unwrap_err();
        assert!(matches!(err, ScriptError::Parse { line: 1, .. }));

        let err = parse("1 = A").unwrap_err();
        assert!(matches!(err, ScriptError::Parse { .. }));

        let err = parse("for t in 0..3 { A = t").unwrap_err();
        assert!(matches!(err, ScriptError::Parse { .. }));
    }

    #[test]
    fn test_deep_parentheses_are_a_parse_error() {
        let depth = 200_000;
        let source = format!("X = {}1{}", "(".repeat(depth), ")".repeat(depth));
        let err = parse(&source).unwrap_err();
        assert!(matches!(err, ScriptError::Parse { line: 1, ref message } if message.contains("128")));
    }

    #[test]
    fn test_long_operator_chains_are_bounded() {
        let source = format!("X = 1{}", " + 1".repeat(100_000));
        assert!(matches!(parse(&source), Err(ScriptError::Parse { .. })));

        let source = format!("X = {}1", "-".repeat(100_000));
        assert!(matches!(parse(&source), Err(ScriptError::Parse { .. })));

        let source = format!("if 1 {{ }}{}", " else if 1 { }".repeat(10_000));
        assert!(matches!(parse(&source), Err(ScriptError::Parse { .. })));
    }

    #[test]
    fn test_nesting_within_limit_parses() {
        let source = format!("X = {}1{}", "(".repeat(64), ")".repeat(64));
        assert_eq!(parse(&source).unwrap().len(), 1);

        let source = format!("X = 1{}", " + 1".repeat(100));
        assert_eq!(parse(&source).unwrap().len(), 1);
    }
}
