//! Human-readable dumps of the token stream and the statement list.
//!
//! Expressions print in fully parenthesized prefix form, `(+ 1 (* 2 3))`.
//! Statements print one per line, indented by block depth.

use std::fmt;

use crate::{BinaryOp, DataType, Expr, Program, StmtKind, Token, UnaryOp};

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = format!("{:?}", self.kind);
        write!(f, "{:>4}  {:<24} {}", self.line, kind, self.text)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            DataType::Double => "double",
            DataType::Float => "float",
            DataType::Int => "int",
            DataType::Long => "long",
            DataType::Void => "void",
        })
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "~",
            UnaryOp::LogicalNot => "!",
        })
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
        })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::IntLiteral(val) => write!(f, "{val}"),
            Expr::Identifier(name) => f.write_str(name),
            Expr::Unary { op, operand } => write!(f, "({op} {operand})"),
            Expr::Binary { op, left, right } => write!(f, "({op} {left} {right})"),
            Expr::Assign { name, rvalue } => write!(f, "(= {name} {rvalue})"),
        }
    }
}

impl fmt::Display for StmtKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StmtKind::FunctionDecl { name } => write!(f, "function {name}"),
            StmtKind::Declaration {
                ty,
                name,
                init: None,
            } => write!(f, "{ty} {name}"),
            StmtKind::Declaration {
                ty,
                name,
                init: Some(init),
            } => write!(f, "{ty} {name} = {init}"),
            StmtKind::If(cond) => write!(f, "if {cond}"),
            StmtKind::Else => f.write_str("else"),
            StmtKind::While(cond) => write!(f, "while {cond}"),
            StmtKind::Break => f.write_str("break"),
            StmtKind::Continue => f.write_str("continue"),
            StmtKind::Return(expr) => write!(f, "return {expr}"),
            StmtKind::Print(expr) => write!(f, "print {expr}"),
            StmtKind::Expr(expr) => write!(f, "{expr}"),
            StmtKind::BlockStart => f.write_str("{"),
            StmtKind::BlockEnd => f.write_str("}"),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut depth = 0usize;
        for stmt in &self.stmts {
            if stmt.kind == StmtKind::BlockEnd {
                depth = depth.saturating_sub(1);
            }
            writeln!(f, "{}{}", "  ".repeat(depth), stmt.kind)?;
            if stmt.kind == StmtKind::BlockStart {
                depth += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{parse, tokenize};

    #[test]
    fn token_dump() {
        let tokens = tokenize("x;").unwrap();
        assert_eq!(
            tokens[0].to_string(),
            format!("{:>4}  {:<24} {}", 1, "Ident", "x")
        );
    }

    #[test]
    fn program_dump_indents_blocks() {
        let program = parse(tokenize("int main() { if (!a) { b = -1; } { } }").unwrap()).unwrap();
        assert_eq!(
            program.to_string(),
            "function main\nif (! a)\n{\n  (= b (- 1))\n}\n{\n}\n"
        );
    }

    #[test]
    fn declarations_keep_their_type() {
        let program =
            parse(tokenize("int main() { long a = 1; double b; void c; }").unwrap()).unwrap();
        assert_eq!(
            program.to_string(),
            "function main\nlong a = 1\ndouble b\nvoid c\n"
        );
    }
}
