use tracing::debug;

use crate::error::{ParseError, SyntaxSnafu, UnexpectedEofSnafu};
use crate::{DataType, Keyword, Punct, Token, TokenKind, P};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    LogicalNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Ne,
    LogicalAnd,
    LogicalOr,
    BitAnd,
    BitOr,
}

/// Expression tree. Every child is exclusively owned by its parent.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLiteral(i64),
    Identifier(String),
    Unary {
        op: UnaryOp,
        operand: P<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: P<Expr>,
        right: P<Expr>,
    },
    Assign {
        name: String,
        rvalue: P<Expr>,
    },
}

/// One element of the flat statement list. Blocks are not nested
/// containers: they are delimited by `BlockStart`/`BlockEnd` sitting inline,
/// and the body of an `if`, `else` or `while` is the block that follows it.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    FunctionDecl { name: String },
    Declaration {
        ty: DataType,
        name: String,
        init: Option<Expr>,
    },
    If(Expr),
    Else,
    While(Expr),
    Break,
    Continue,
    Return(Expr),
    Print(Expr),
    Expr(Expr),
    BlockStart,
    BlockEnd,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node<Kind> {
    pub kind: Kind,
    pub line: u32,
}

pub type StmtNode = Node<StmtKind>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub stmts: Vec<StmtNode>,
}

pub fn parse(tokens: Vec<Token>) -> Result<Program, ParseError> {
    Parser::new(tokens).parse()
}

#[derive(Default)]
pub struct Parser {
    pub tokens: Vec<Token>,
    pub index: usize,
    // nesting depth of `{` inside the function body
    pub blocks: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|tok| tok.kind) != Some(TokenKind::Eof) {
            let line = tokens.last().map_or(1, |tok| tok.line);
            tokens.push(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                line,
            });
        }
        Self {
            tokens,
            ..Default::default()
        }
    }

    // program = function
    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let mut program = Program::default();
        self.function(&mut program.stmts)?;
        self.ensure_done()?;
        debug!(statements = program.stmts.len(), "parsed program");
        Ok(program)
    }

    // function = type ident "(" ")" "{" stmt* "}"
    fn function(&mut self, stmts: &mut Vec<StmtNode>) -> Result<(), ParseError> {
        if !matches!(self.peek().kind, TokenKind::Type(_)) {
            return Err(self.error("Expected data type"));
        }
        self.advance();

        let line = self.line();
        let name = match self.peek().kind {
            TokenKind::Ident => self.peek().text.clone(),
            _ => return Err(self.error("Expected identifier")),
        };
        self.advance();
        stmts.push(StmtNode {
            kind: StmtKind::FunctionDecl { name: name.clone() },
            line,
        });

        self.skip(
            TokenKind::Punct(Punct::LeftParen),
            &format!("Expected left paren while parsing function: {name}"),
        )?;
        self.skip(
            TokenKind::Punct(Punct::RightParen),
            &format!("Expected right paren while parsing function: {name}"),
        )?;
        self.skip(
            TokenKind::Punct(Punct::LeftBrace),
            &format!("Expected left brace while parsing function: {name}"),
        )?;

        while !(self.peek().is(TokenKind::Punct(Punct::RightBrace)) && self.blocks == 0) {
            stmts.push(self.stmt()?);
        }
        self.advance();
        Ok(())
    }

    // stmt = "{" | "}"
    //      | ("return" | "print") expr ";"
    //      | ("break" | "continue") ";"
    //      | ("if" | "while") "(" expr ")"
    //      | "else"
    //      | type ident ("=" expr)? ";"
    //      | expr ";"
    fn stmt(&mut self) -> Result<StmtNode, ParseError> {
        let line = self.line();
        let kind = match self.peek().kind {
            TokenKind::Punct(Punct::LeftBrace) => {
                self.advance();
                self.blocks += 1;
                StmtKind::BlockStart
            }
            TokenKind::Punct(Punct::RightBrace) => {
                self.advance();
                self.blocks -= 1;
                StmtKind::BlockEnd
            }
            TokenKind::Keyword(Keyword::Return) => {
                self.advance();
                let expr = self.expr()?;
                self.skip_semicolon("No semicolon after the return expression")?;
                StmtKind::Return(expr)
            }
            TokenKind::Keyword(Keyword::Print) => {
                self.advance();
                let expr = self.expr()?;
                self.skip_semicolon("No semicolon after the print expression")?;
                StmtKind::Print(expr)
            }
            TokenKind::Keyword(keyword @ (Keyword::Break | Keyword::Continue)) => {
                self.advance();
                self.skip_semicolon("No semicolon in no op statement")?;
                if keyword == Keyword::Break {
                    StmtKind::Break
                } else {
                    StmtKind::Continue
                }
            }
            TokenKind::Keyword(Keyword::If) => {
                self.advance();
                StmtKind::If(self.condition("if")?)
            }
            TokenKind::Keyword(Keyword::While) => {
                self.advance();
                StmtKind::While(self.condition("while")?)
            }
            TokenKind::Keyword(Keyword::Else) => {
                self.advance();
                StmtKind::Else
            }
            TokenKind::Keyword(Keyword::For | Keyword::Do) => {
                return Err(self.error(&format!(
                    "Unsupported statement '{}'",
                    self.peek().text
                )));
            }
            TokenKind::Type(data_type) => self.declaration(data_type)?,
            TokenKind::Eof => return UnexpectedEofSnafu { line }.fail(),
            _ => {
                let expr = self.expr()?;
                self.skip_semicolon("No semicolon in the simple statement")?;
                StmtKind::Expr(expr)
            }
        };
        Ok(StmtNode { kind, line })
    }

    // condition = "(" expr ")"
    fn condition(&mut self, keyword: &str) -> Result<Expr, ParseError> {
        self.skip(
            TokenKind::Punct(Punct::LeftParen),
            &format!("Missing left paren in the {keyword}"),
        )?;
        let cond = self.expr()?;
        self.skip(
            TokenKind::Punct(Punct::RightParen),
            &format!("Missing right paren in the {keyword}"),
        )?;
        Ok(cond)
    }

    // declaration = type ident ("=" expr)? ";"
    fn declaration(&mut self, data_type: DataType) -> Result<StmtKind, ParseError> {
        self.advance();
        let name = match self.peek().kind {
            TokenKind::Ident => self.peek().text.clone(),
            _ => {
                return Err(self.error(&format!(
                    "Expected identifier after {data_type:?}, got '{}'",
                    self.peek().text
                )))
            }
        };
        self.advance();

        match self.peek().kind {
            TokenKind::Punct(Punct::Eq) => {
                self.advance();
                let init = self.expr()?;
                self.skip_semicolon("No semicolon in the declaration")?;
                Ok(StmtKind::Declaration {
                    ty: data_type,
                    name,
                    init: Some(init),
                })
            }
            TokenKind::Punct(Punct::Semicolon) => {
                self.advance();
                Ok(StmtKind::Declaration {
                    ty: data_type,
                    name,
                    init: None,
                })
            }
            _ => Err(self.error(&format!("Invalid declaration statement: {name}"))),
        }
    }

    // expr = ident "=" logical_or
    //      | logical_or
    pub fn expr(&mut self) -> Result<Expr, ParseError> {
        if self.peek().is(TokenKind::Ident) && self.peek_next().is(TokenKind::Punct(Punct::Eq)) {
            let name = self.peek().text.clone();
            self.advance_n(2);
            let rvalue = P::new(self.logical_or()?);
            return Ok(Expr::Assign { name, rvalue });
        }
        self.logical_or()
    }

    // logical_or = logical_and ("||" logical_and)*
    fn logical_or(&mut self) -> Result<Expr, ParseError> {
        self.binary(&[(Punct::OrOr, BinaryOp::LogicalOr)], Self::logical_and)
    }

    // logical_and = bit_or ("&&" bit_or)*
    fn logical_and(&mut self) -> Result<Expr, ParseError> {
        self.binary(&[(Punct::AndAnd, BinaryOp::LogicalAnd)], Self::bit_or)
    }

    // bit_or = bit_and ("|" bit_and)*
    fn bit_or(&mut self) -> Result<Expr, ParseError> {
        self.binary(&[(Punct::Pipe, BinaryOp::BitOr)], Self::bit_and)
    }

    // bit_and = equality ("&" equality)*
    fn bit_and(&mut self) -> Result<Expr, ParseError> {
        self.binary(&[(Punct::Ampersand, BinaryOp::BitAnd)], Self::equality)
    }

    // equality = relational ("==" relational | "!=" relational)*
    fn equality(&mut self) -> Result<Expr, ParseError> {
        self.binary(
            &[(Punct::EqEq, BinaryOp::Eq), (Punct::Ne, BinaryOp::Ne)],
            Self::relational,
        )
    }

    // relational = add ("<" add | "<=" add | ">" add | ">=" add)*
    fn relational(&mut self) -> Result<Expr, ParseError> {
        self.binary(
            &[
                (Punct::Lt, BinaryOp::Lt),
                (Punct::Lte, BinaryOp::Lte),
                (Punct::Gt, BinaryOp::Gt),
                (Punct::Gte, BinaryOp::Gte),
            ],
            Self::add,
        )
    }

    // add = mul ("+" mul | "-" mul)*
    fn add(&mut self) -> Result<Expr, ParseError> {
        self.binary(
            &[(Punct::Plus, BinaryOp::Add), (Punct::Minus, BinaryOp::Sub)],
            Self::mul,
        )
    }

    // mul = unit ("*" unit | "/" unit | "%" unit)*
    fn mul(&mut self) -> Result<Expr, ParseError> {
        self.binary(
            &[
                (Punct::Star, BinaryOp::Mul),
                (Punct::Slash, BinaryOp::Div),
                (Punct::Modulo, BinaryOp::Mod),
            ],
            Self::unit,
        )
    }

    /// Shared shape of every binary level: one operand of the next level up,
    /// then a left-folded run of `op operand` pairs.
    fn binary(
        &mut self,
        ops: &[(Punct, BinaryOp)],
        operand: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut node = operand(self)?;

        while let TokenKind::Punct(punct) = self.peek().kind {
            let Some(&(_, op)) = ops.iter().find(|(p, _)| *p == punct) else {
                break;
            };
            self.advance();
            let right = operand(self)?;
            node = Expr::Binary {
                op,
                left: P::new(node),
                right: P::new(right),
            };
        }

        Ok(node)
    }

    // unit = num | ident | ("-" | "~" | "!") unit | "(" expr ")"
    fn unit(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                match tok.text.parse::<i64>() {
                    Ok(val) => Ok(Expr::IntLiteral(val)),
                    Err(_) => SyntaxSnafu {
                        line: tok.line,
                        message: format!("Integer constant out of range: {}", tok.text),
                    }
                    .fail(),
                }
            }
            TokenKind::Ident => {
                self.advance();
                Ok(Expr::Identifier(tok.text))
            }
            TokenKind::Punct(punct @ (Punct::Minus | Punct::Tilde | Punct::Bang)) => {
                self.advance();
                let op = match punct {
                    Punct::Minus => UnaryOp::Neg,
                    Punct::Tilde => UnaryOp::Not,
                    _ => UnaryOp::LogicalNot,
                };
                let operand = P::new(self.unit()?);
                Ok(Expr::Unary { op, operand })
            }
            TokenKind::Punct(Punct::LeftParen) => {
                self.advance();
                let expr = self.expr()?;
                self.skip(
                    TokenKind::Punct(Punct::RightParen),
                    "Missing right paren in expression",
                )?;
                Ok(expr)
            }
            TokenKind::Eof => UnexpectedEofSnafu { line: tok.line }.fail(),
            _ => Err(self.error(&format!("Expected expression, got '{}'", tok.text))),
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn peek_next(&self) -> &Token {
        &self.tokens[(self.index + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
    }

    fn advance_n(&mut self, steps: usize) {
        for _ in 0..steps {
            self.advance();
        }
    }

    fn line(&self) -> u32 {
        self.peek().line
    }

    fn skip(&mut self, kind: TokenKind, msg: &str) -> Result<(), ParseError> {
        if !self.peek().is(kind) {
            return Err(self.error(msg));
        }
        self.advance();
        Ok(())
    }

    fn skip_semicolon(&mut self, msg: &str) -> Result<(), ParseError> {
        self.skip(TokenKind::Punct(Punct::Semicolon), msg)
    }

    fn ensure_done(&self) -> Result<(), ParseError> {
        match self.peek().kind {
            TokenKind::Eof => Ok(()),
            _ => Err(self.error(&format!(
                "Unexpected '{}' after the end of the function",
                self.peek().text
            ))),
        }
    }

    fn error(&self, msg: &str) -> ParseError {
        ParseError::Syntax {
            line: self.line(),
            message: msg.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize;
    use insta::assert_snapshot;

    fn expr(src: &str) -> Expr {
        let mut parser = Parser::new(tokenize(src).unwrap());
        let expr = parser.expr().unwrap();
        assert!(parser.peek().is(TokenKind::Eof), "leftover tokens in {src}");
        expr
    }

    fn program(src: &str) -> Result<Program, ParseError> {
        parse(tokenize(src).unwrap())
    }

    fn int(val: i64) -> P<Expr> {
        P::new(Expr::IntLiteral(val))
    }

    fn bin(op: BinaryOp, left: P<Expr>, right: P<Expr>) -> P<Expr> {
        P::new(Expr::Binary { op, left, right })
    }

    fn kinds(program: &Program) -> Vec<StmtKind> {
        program.stmts.iter().map(|stmt| stmt.kind.clone()).collect()
    }

    #[test]
    fn mul_binds_tighter_than_add() {
        assert_eq!(
            expr("1 + 2 * 3"),
            *bin(BinaryOp::Add, int(1), bin(BinaryOp::Mul, int(2), int(3)))
        );
        assert_eq!(
            expr("2 * 3 + 1"),
            *bin(BinaryOp::Add, bin(BinaryOp::Mul, int(2), int(3)), int(1))
        );
    }

    #[test]
    fn left_associative() {
        assert_eq!(
            expr("10 - 2 - 3"),
            *bin(BinaryOp::Sub, bin(BinaryOp::Sub, int(10), int(2)), int(3))
        );
        assert_eq!(
            expr("8 / 4 % 3"),
            *bin(BinaryOp::Mod, bin(BinaryOp::Div, int(8), int(4)), int(3))
        );
    }

    #[test]
    fn precedence_tower() {
        assert_eq!(
            expr("a || b && c == d < e + f * g").to_string(),
            "(|| a (&& b (== c (< d (+ e (* f g))))))"
        );
    }

    #[test]
    fn bitwise_between_logical_and_equality() {
        assert_eq!(expr("a && b | c & d == e").to_string(), "(&& a (| b (& c (== d e))))");
    }

    #[test]
    fn parentheses_override_precedence() {
        assert_eq!(
            expr("(1 + 2) * 3"),
            *bin(BinaryOp::Mul, bin(BinaryOp::Add, int(1), int(2)), int(3))
        );
    }

    #[test]
    fn unary_operators() {
        assert_eq!(expr("-!~x").to_string(), "(- (! (~ x)))");
        assert_eq!(expr("-2 * 3").to_string(), "(* (- 2) 3)");
    }

    #[test]
    fn assignment_lookahead() {
        assert_eq!(expr("x = y + 1").to_string(), "(= x (+ y 1))");
        assert_eq!(expr("x == y").to_string(), "(== x y)");
        assert_eq!(expr("x").to_string(), "x");
    }

    #[test]
    fn flat_statement_list() {
        let program = program(
            "int main() {
                int i = 0;
                while (i < 3) {
                    if (i == 1) { break; } else { i = i + 1; }
                }
                print i;
                return 0;
            }",
        )
        .unwrap();
        assert_snapshot!(program.to_string());
        assert_eq!(
            program.stmts.iter().map(|s| s.line).collect::<Vec<_>>(),
            [1, 2, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4, 5, 6, 7]
        );
    }

    #[test]
    fn block_markers_are_balanced() {
        let program = program("int main() { { { } } { } }").unwrap();
        assert_eq!(
            kinds(&program)[1..],
            [
                StmtKind::BlockStart,
                StmtKind::BlockStart,
                StmtKind::BlockEnd,
                StmtKind::BlockEnd,
                StmtKind::BlockStart,
                StmtKind::BlockEnd,
            ]
        );
    }

    #[test]
    fn declarations() {
        let program = program("int main() { int a; long b = 2; }").unwrap();
        assert_eq!(
            kinds(&program),
            [
                StmtKind::FunctionDecl {
                    name: "main".to_string()
                },
                StmtKind::Declaration {
                    ty: DataType::Int,
                    name: "a".to_string(),
                    init: None
                },
                StmtKind::Declaration {
                    ty: DataType::Long,
                    name: "b".to_string(),
                    init: Some(Expr::IntLiteral(2))
                },
            ]
        );
    }

    #[test]
    fn missing_semicolon() {
        let err = program("int main() {\n  return 1\n}").unwrap_err();
        assert_eq!(err.line(), Some(3));
        assert_eq!(
            err.to_string(),
            "Line 3: No semicolon after the return expression"
        );
    }

    #[test]
    fn missing_paren_in_if() {
        let err = program("int main() {\n if 1 { }\n}").unwrap_err();
        assert_eq!(err.to_string(), "Line 2: Missing left paren in the if");
    }

    #[test]
    fn malformed_declaration() {
        let err = program("int main() { int a b; }").unwrap_err();
        assert_eq!(err.to_string(), "Line 1: Invalid declaration statement: a");
        assert!(program("int main() { int return; }").is_err());
    }

    #[test]
    fn function_header() {
        assert!(program("main() { }").is_err());
        assert!(program("int () { }").is_err());
        assert!(program("int main(int) { }").is_err());
        assert_eq!(
            kinds(&program("void f() { }").unwrap()),
            [StmtKind::FunctionDecl {
                name: "f".to_string()
            }]
        );
    }

    #[test]
    fn trailing_tokens() {
        let err = program("int main() { }\nint other() { }").unwrap_err();
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn unexpected_eof() {
        // the tokenizer never lets an unclosed body through; drive the parser directly
        let tokens: Vec<Token> = tokenize("int main ( ) { return 1 ; }")
            .unwrap()
            .into_iter()
            .filter(|tok| !tok.is(TokenKind::Punct(Punct::RightBrace)))
            .collect();
        assert!(matches!(
            parse(tokens),
            Err(ParseError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn unsupported_statement() {
        let err = program("int main() { for (;;) { } }").unwrap_err();
        assert_eq!(err.to_string(), "Line 1: Unsupported statement 'for'");
    }

    #[test]
    fn literal_out_of_range() {
        assert!(program("int main() { return 99999999999999999999; }").is_err());
        assert_eq!(expr("9223372036854775807"), Expr::IntLiteral(i64::MAX));
    }

    #[test]
    fn missing_operand() {
        let err = program("int main() { return 1 + ; }").unwrap_err();
        assert_eq!(err.to_string(), "Line 1: Expected expression, got ';'");
    }
}
