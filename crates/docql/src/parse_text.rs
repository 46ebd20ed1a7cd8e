//! Recursive-descent parser for the textual (SQL-like) query dialect,
//! compiling straight to the same [`crate::ast::Query`] the JSON-AST
//! dialect produces.

use crate::ast::{
    Expr, JoinKind, Literal, MetaField, OrderTerm, PropertyRef, Query, QuantifierKind,
    ResultColumn, Source,
};
use crate::error::{Error, Result};
use crate::lexer::{tokenize, Tok, Token};

pub fn parse_query(src: &str) -> Result<Query> {
    let tokens = tokenize(src)?;
    let mut p = Parser { tokens, pos: 0 };
    let query = p.parse_select()?;
    p.expect_eof()?;
    Ok(query)
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].offset
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn err(&self, message: impl Into<String>) -> Error {
        Error::Syntax {
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn expect_eof(&mut self) -> Result<()> {
        if matches!(self.peek(), Token::Eof) {
            Ok(())
        } else {
            Err(self.err(format!("unexpected trailing input {:?}", self.peek())))
        }
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s.eq_ignore_ascii_case(kw))
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.is_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.err(format!("expected {kw}, found {:?}", self.peek())))
        }
    }

    fn eat_symbol(&mut self, sym: &str) -> bool {
        if matches!(self.peek(), Token::Symbol(s) if s == sym) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, sym: &str) -> Result<()> {
        if self.eat_symbol(sym) {
            Ok(())
        } else {
            Err(self.err(format!("expected {sym:?}, found {:?}", self.peek())))
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.advance() {
            Token::Ident(s) => Ok(s),
            other => Err(self.err(format!("expected identifier, found {other:?}"))),
        }
    }

    fn parse_select(&mut self) -> Result<Query> {
        self.expect_keyword("SELECT")?;
        let mut query = Query::empty();

        query.distinct = self.eat_keyword("DISTINCT");

        query.what.push(self.parse_result_column()?);
        while self.eat_symbol(",") {
            query.what.push(self.parse_result_column()?);
        }

        if self.eat_keyword("FROM") {
            query.from.push(self.parse_source()?);
            loop {
                let join = if self.eat_keyword("JOIN") {
                    Some(JoinKind::Inner)
                } else if self.eat_keyword("LEFT") {
                    self.eat_keyword("OUTER");
                    self.expect_keyword("JOIN")?;
                    Some(JoinKind::LeftOuter)
                } else if self.eat_keyword("CROSS") {
                    self.expect_keyword("JOIN")?;
                    Some(JoinKind::Cross)
                } else if self.eat_symbol(",") {
                    Some(JoinKind::Inner)
                } else {
                    None
                };
                let Some(join) = join else { break };
                let mut source = self.parse_source()?;
                source.join = Some(join);
                if self.eat_keyword("ON") {
                    source.on = Some(self.parse_expr()?);
                }
                query.from.push(source);
            }
        }

        if self.eat_keyword("WHERE") {
            query.where_ = Some(self.parse_expr()?);
        }

        if self.eat_keyword("GROUP") {
            self.expect_keyword("BY")?;
            query.group_by.push(self.parse_expr()?);
            while self.eat_symbol(",") {
                query.group_by.push(self.parse_expr()?);
            }
        }

        if self.eat_keyword("HAVING") {
            query.having = Some(self.parse_expr()?);
        }

        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            query.order_by.push(self.parse_order_term()?);
            while self.eat_symbol(",") {
                query.order_by.push(self.parse_order_term()?);
            }
        }

        if self.eat_keyword("LIMIT") {
            query.limit = Some(self.parse_additive()?);
        }

        if self.eat_keyword("OFFSET") {
            query.offset = Some(self.parse_additive()?);
        }

        Ok(query)
    }

    fn parse_result_column(&mut self) -> Result<ResultColumn> {
        if self.eat_symbol("*") {
            return Ok(ResultColumn {
                expr: Expr::property(""),
                alias: None,
            });
        }
        let expr = self.parse_expr()?;
        let alias = if self.eat_keyword("AS") {
            Some(self.ident()?)
        } else if let Token::Ident(name) = self.peek().clone() {
            if !is_reserved(&name) {
                self.advance();
                Some(name)
            } else {
                None
            }
        } else {
            None
        };
        Ok(ResultColumn { expr, alias })
    }

    fn parse_source(&mut self) -> Result<Source> {
        if self.eat_keyword("UNNEST") {
            self.expect_symbol("(")?;
            let unnest = self.parse_expr()?;
            self.expect_symbol(")")?;
            let alias = if self.eat_keyword("AS") {
                Some(self.ident()?)
            } else {
                None
            };
            return Ok(Source {
                collection: String::new(),
                alias,
                join: None,
                on: None,
                unnest: Some(unnest),
            });
        }
        let collection = self.ident()?;
        let alias = if self.eat_keyword("AS") {
            Some(self.ident()?)
        } else if let Token::Ident(name) = self.peek().clone() {
            if !is_reserved(&name) {
                self.advance();
                Some(name)
            } else {
                None
            }
        } else {
            None
        };
        Ok(Source {
            collection,
            alias,
            join: None,
            on: None,
            unnest: None,
        })
    }

    fn parse_order_term(&mut self) -> Result<OrderTerm> {
        let expr = self.parse_expr()?;
        let descending = if self.eat_keyword("DESC") {
            true
        } else {
            self.eat_keyword("ASC");
            false
        };
        Ok(OrderTerm { expr, descending })
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat_keyword("OR") {
            let rhs = self.parse_and()?;
            lhs = Expr::op("OR", vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_not()?;
        while self.eat_keyword("AND") {
            let rhs = self.parse_not()?;
            lhs = Expr::op("AND", vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.eat_keyword("NOT") {
            let inner = self.parse_not()?;
            Ok(Expr::op("NOT", vec![inner]))
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let lhs = self.parse_additive()?;

        if self.eat_keyword("BETWEEN") {
            let low = self.parse_additive()?;
            self.expect_keyword("AND")?;
            let high = self.parse_additive()?;
            return Ok(Expr::op("BETWEEN", vec![lhs, low, high]));
        }

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            let op = if negated { "IS NOT NULL" } else { "IS NULL" };
            return Ok(Expr::op(op, vec![lhs]));
        }

        if self.eat_keyword("IN") {
            let rhs = self.parse_in_list()?;
            return Ok(Expr::op("IN", std::iter::once(lhs).chain(rhs).collect()));
        }

        if self.eat_keyword("LIKE") {
            let rhs = self.parse_additive()?;
            return Ok(Expr::op("LIKE", vec![lhs, rhs]));
        }

        let op = match self.peek() {
            Token::Symbol(s) if s == "=" || s == "==" => "=",
            Token::Symbol(s) if s == "!=" || s == "<>" => "!=",
            Token::Symbol(s) if s == "<" => "<",
            Token::Symbol(s) if s == "<=" => "<=",
            Token::Symbol(s) if s == ">" => ">",
            Token::Symbol(s) if s == ">=" => ">=",
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_additive()?;
        Ok(Expr::op(op, vec![lhs, rhs]))
    }

    fn parse_in_list(&mut self) -> Result<Vec<Expr>> {
        self.expect_symbol("(")?;
        let mut items = vec![self.parse_expr()?];
        while self.eat_symbol(",") {
            items.push(self.parse_expr()?);
        }
        self.expect_symbol(")")?;
        Ok(items)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Symbol(s) if s == "+" => "+",
                Token::Symbol(s) if s == "-" => "-",
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::op(op, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Symbol(s) if s == "*" => "*",
                Token::Symbol(s) if s == "/" => "/",
                Token::Symbol(s) if s == "%" => "%",
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::op(op, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.eat_symbol("-") {
            let inner = self.parse_unary()?;
            return Ok(Expr::op("-", vec![inner]));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.peek().clone() {
            Token::Int(i) => {
                self.advance();
                Ok(Expr::Literal(Literal::Int(i)))
            }
            Token::Double(d) => {
                self.advance();
                Ok(Expr::Literal(Literal::Double(d)))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(s)))
            }
            Token::Param(name) => {
                self.advance();
                Ok(Expr::Param(name))
            }
            Token::Symbol(s) if s == "(" => {
                self.advance();
                let e = self.parse_expr()?;
                self.expect_symbol(")")?;
                Ok(e)
            }
            Token::Symbol(s) if s == "." => self.parse_path_expr(String::new()),
            Token::Ident(name) => self.parse_ident_led(name),
            other => Err(self.err(format!("unexpected token {other:?} in expression"))),
        }
    }

    fn parse_ident_led(&mut self, name: String) -> Result<Expr> {
        if name.eq_ignore_ascii_case("NULL") {
            self.advance();
            return Ok(Expr::Literal(Literal::Null));
        }
        if name.eq_ignore_ascii_case("TRUE") {
            self.advance();
            return Ok(Expr::Literal(Literal::Bool(true)));
        }
        if name.eq_ignore_ascii_case("FALSE") {
            self.advance();
            return Ok(Expr::Literal(Literal::Bool(false)));
        }
        if name.eq_ignore_ascii_case("CASE") {
            self.advance();
            return self.parse_case();
        }
        if name.eq_ignore_ascii_case("ANY")
            || name.eq_ignore_ascii_case("EVERY")
            || name.eq_ignore_ascii_case("ANY AND EVERY")
        {
            return self.parse_quantifier(name);
        }

        self.advance();
        if self.eat_symbol("(") {
            let mut args = Vec::new();
            if !self.eat_symbol(")") {
                args.push(self.parse_expr()?);
                while self.eat_symbol(",") {
                    args.push(self.parse_expr()?);
                }
                self.expect_symbol(")")?;
            }
            return Ok(Expr::op(name, args));
        }

        self.parse_path_expr(name)
    }

    /// Greedily consumes `.ident` / `[index]` continuations after an initial
    /// bareword (or a leading bare `.`), building a single property path.
    fn parse_path_expr(&mut self, mut path: String) -> Result<Expr> {
        loop {
            if self.eat_symbol(".") {
                path.push('.');
                path.push_str(&self.ident()?);
                continue;
            }
            if matches!(self.peek(), Token::Symbol(s) if s == "[") {
                self.advance();
                let idx = match self.advance() {
                    Token::Int(i) => i,
                    other => return Err(self.err(format!("expected integer index, found {other:?}"))),
                };
                self.expect_symbol("]")?;
                path.push('[');
                path.push_str(&idx.to_string());
                path.push(']');
                continue;
            }
            break;
        }
        if let Some(meta) = MetaField::from_name(&path) {
            return Ok(Expr::Meta(meta));
        }
        Ok(Expr::Property(PropertyRef { path, table: None }))
    }

    fn parse_quantifier(&mut self, name: String) -> Result<Expr> {
        self.advance();
        let kind = if name.eq_ignore_ascii_case("ANY") {
            QuantifierKind::Any
        } else if name.eq_ignore_ascii_case("EVERY") {
            QuantifierKind::Every
        } else {
            QuantifierKind::AnyAndEvery
        };
        let variable = self.ident()?;
        self.expect_keyword("IN")?;
        let collection = self.parse_expr()?;
        self.expect_keyword("SATISFIES")?;
        let satisfies = self.parse_expr()?;
        self.expect_keyword("END")?;
        Ok(Expr::Quantifier {
            kind,
            variable,
            collection: Box::new(collection),
            satisfies: Box::new(satisfies),
        })
    }

    fn parse_case(&mut self) -> Result<Expr> {
        let operand = if self.is_keyword("WHEN") {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        let mut whens = Vec::new();
        while self.eat_keyword("WHEN") {
            let cond = self.parse_expr()?;
            self.expect_keyword("THEN")?;
            let then = self.parse_expr()?;
            whens.push((cond, then));
        }
        let else_ = if self.eat_keyword("ELSE") {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect_keyword("END")?;
        Ok(Expr::Case {
            operand,
            whens,
            else_,
        })
    }
}

fn is_reserved(word: &str) -> bool {
    const KEYWORDS: &[&str] = &[
        "FROM", "WHERE", "GROUP", "HAVING", "ORDER", "LIMIT", "OFFSET", "JOIN", "LEFT", "CROSS",
        "ON", "AND", "OR", "NOT", "AS", "DESC", "ASC",
    ];
    KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::{Expr, Literal};

    #[test]
    fn parses_simple_select() {
        let q = parse_query("SELECT name, age FROM _ WHERE age >= 21 ORDER BY name").unwrap();
        assert_eq!(q.what.len(), 2);
        assert_eq!(q.from[0].collection, "_");
        assert_eq!(
            q.where_,
            Some(Expr::op(
                ">=",
                vec![Expr::property("age"), Expr::Literal(Literal::Int(21))]
            ))
        );
        assert_eq!(q.order_by[0].expr, Expr::property("name"));
    }

    #[test]
    fn parses_function_call_and_param() {
        let q = parse_query("SELECT UPPER(name) FROM _ WHERE city = $city").unwrap();
        assert_eq!(
            q.what[0].expr,
            Expr::op("UPPER", vec![Expr::property("name")])
        );
        assert_eq!(
            q.where_,
            Some(Expr::op(
                "=",
                vec![Expr::property("city"), Expr::Param("city".to_string())]
            ))
        );
    }

    #[test]
    fn parses_between_and_in() {
        let q = parse_query("SELECT name FROM _ WHERE age BETWEEN 18 AND 65 AND city IN ('SF', 'NYC')").unwrap();
        let Some(Expr::Op { name, args }) = q.where_ else {
            panic!("expected AND")
        };
        assert_eq!(name, "AND");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn parses_meta_field() {
        let q = parse_query("SELECT _id FROM _ WHERE _sequence > 10").unwrap();
        assert_eq!(q.what[0].expr, Expr::Meta(MetaField::Id));
        assert_eq!(
            q.where_,
            Some(Expr::op(
                ">",
                vec![Expr::Meta(MetaField::Sequence), Expr::Literal(Literal::Int(10))]
            ))
        );
    }

    #[test]
    fn parses_any_quantifier() {
        let q = parse_query(
            "SELECT name FROM _ WHERE ANY x IN tags SATISFIES x = 'red' END",
        )
        .unwrap();
        match q.where_.unwrap() {
            Expr::Quantifier { kind, variable, .. } => {
                assert_eq!(kind, QuantifierKind::Any);
                assert_eq!(variable, "x");
            }
            other => panic!("expected Quantifier, got {other:?}"),
        }
    }

    #[test]
    fn syntax_error_reports_offset() {
        let err = parse_query("SELECT name FROM _ WHERE").unwrap_err();
        match err {
            Error::Syntax { .. } => {}
            other => panic!("expected Syntax error, got {other:?}"),
        }
    }
}
