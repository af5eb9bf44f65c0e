//! A small recursive-descent parser. It covers the node kinds `ast`
//! defines but does not attempt a standards-exhaustive grammar: no regular
//! expression literals (ambiguous with division without a stateful
//! goal-symbol tracker), no full destructuring-pattern defaults inside
//! nested array patterns, no modules. This is deliberate: the execution
//! core is the thing under test here, and it only needs a correct AST to
//! run, not a conformant front end.

use ast::*;

use crate::lexer::{LexError, Lexer};
use crate::token::{Keyword, Punct, Token};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("unexpected token {found:?}, expected {expected} at byte offset {offset}")]
    Unexpected {
        found: Token,
        expected: &'static str,
        offset: usize,
    },
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,
    #[error("invalid arrow function parameter list")]
    InvalidArrowParams,
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    cur: Token,
    next_id: NodeId,
}

enum ParenResult {
    Arrow(Vec<Param>),
    Expr(Expression),
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(source);
        let cur = lexer.next_token()?;
        Ok(Parser {
            lexer,
            cur,
            next_id: 0,
        })
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut body = Vec::new();
        while !matches!(self.cur, Token::Eof) {
            body.push(self.parse_statement()?);
        }
        Ok(Program {
            body,
            is_strict: false,
        })
    }

    fn id(&mut self) -> NodeId {
        self.next_id += 1;
        self.next_id
    }

    fn bump(&mut self) -> Result<Token, ParseError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.cur, next))
    }

    fn offset(&self) -> usize {
        self.lexer.index
    }

    fn is_punct(&self, p: Punct) -> bool {
        matches!(&self.cur, Token::Punct(x) if *x == p)
    }

    fn is_keyword(&self, k: Keyword) -> bool {
        matches!(&self.cur, Token::Keyword(x) if *x == k)
    }

    fn expect_punct(&mut self, p: Punct) -> Result<(), ParseError> {
        if self.is_punct(p) {
            self.bump()?;
            Ok(())
        } else {
            Err(ParseError::Unexpected {
                found: self.cur.clone(),
                expected: punct_name(p),
                offset: self.offset(),
            })
        }
    }

    fn eat_semi(&mut self) -> Result<(), ParseError> {
        // Approximates automatic semicolon insertion: a real `;`, an
        // upcoming `}`, or end of input all close the statement.
        if self.is_punct(Punct::Semi) {
            self.bump()?;
        }
        Ok(())
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match self.cur.clone() {
            Token::Identifier(name) => {
                self.bump()?;
                Ok(name)
            }
            other => Err(ParseError::Unexpected {
                found: other,
                expected: "identifier",
                offset: self.offset(),
            }),
        }
    }

    // -------------------------------------------------------------
    // Statements
    // -------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match &self.cur {
            Token::Punct(Punct::LBrace) => Ok(Statement::Block(self.parse_block()?)),
            Token::Punct(Punct::Semi) => {
                let id = self.id();
                self.bump()?;
                Ok(Statement::Empty(id))
            }
            Token::Keyword(Keyword::Var) => self.parse_var_decl_stmt(VariableKind::Var),
            Token::Keyword(Keyword::Let) => self.parse_var_decl_stmt(VariableKind::Let),
            Token::Keyword(Keyword::Const) => self.parse_var_decl_stmt(VariableKind::Const),
            Token::Keyword(Keyword::Function) => {
                Ok(Statement::FunctionDeclaration(self.parse_function(false)?))
            }
            Token::Keyword(Keyword::Class) => Ok(Statement::ClassDeclaration(self.parse_class()?)),
            Token::Keyword(Keyword::If) => self.parse_if(),
            Token::Keyword(Keyword::While) => self.parse_while(),
            Token::Keyword(Keyword::Do) => self.parse_do_while(),
            Token::Keyword(Keyword::For) => self.parse_for(),
            Token::Keyword(Keyword::Return) => self.parse_return(),
            Token::Keyword(Keyword::Break) => self.parse_break(),
            Token::Keyword(Keyword::Continue) => self.parse_continue(),
            Token::Keyword(Keyword::Throw) => self.parse_throw(),
            Token::Keyword(Keyword::Try) => self.parse_try(),
            Token::Keyword(Keyword::Switch) => self.parse_switch(),
            Token::Keyword(Keyword::Debugger) => {
                let id = self.id();
                self.bump()?;
                self.eat_semi()?;
                Ok(Statement::Debugger(id))
            }
            Token::Identifier(name) => {
                let name = name.clone();
                let checkpoint_id = self.next_id;
                let saved = name.clone();
                self.bump()?;
                if self.is_punct(Punct::Colon) {
                    self.bump()?;
                    let body = Box::new(self.parse_statement()?);
                    return Ok(Statement::Labeled(LabeledStatement {
                        node_id: checkpoint_id as NodeId,
                        label: saved,
                        body,
                    }));
                }
                let expr = self.parse_expression_tail(Expression::Identifier(
                    checkpoint_id as NodeId,
                    name,
                ))?;
                self.eat_semi()?;
                Ok(Statement::ExpressionStatement(ExpressionStatement {
                    node_id: self.id(),
                    expression: expr,
                }))
            }
            _ => {
                let node_id = self.id();
                let expression = self.parse_expression()?;
                self.eat_semi()?;
                Ok(Statement::ExpressionStatement(ExpressionStatement {
                    node_id,
                    expression,
                }))
            }
        }
    }

    fn parse_block(&mut self) -> Result<BlockStatement, ParseError> {
        let node_id = self.id();
        self.expect_punct(Punct::LBrace)?;
        let mut body = Vec::new();
        while !self.is_punct(Punct::RBrace) && !matches!(self.cur, Token::Eof) {
            body.push(self.parse_statement()?);
        }
        self.expect_punct(Punct::RBrace)?;
        Ok(BlockStatement { node_id, body })
    }

    fn parse_var_decl_stmt(&mut self, kind: VariableKind) -> Result<Statement, ParseError> {
        let decl = self.parse_var_decl(kind)?;
        self.eat_semi()?;
        Ok(Statement::VariableDeclaration(decl))
    }

    fn parse_var_decl(&mut self, kind: VariableKind) -> Result<VariableDeclaration, ParseError> {
        let node_id = self.id();
        self.bump()?; // var/let/const
        let mut declarations = Vec::new();
        loop {
            let id = self.parse_binding_pattern()?;
            let init = if self.is_punct(Punct::Eq) {
                self.bump()?;
                Some(self.parse_assignment_expr()?)
            } else {
                None
            };
            declarations.push(VariableDeclarator { id, init });
            if self.is_punct(Punct::Comma) {
                self.bump()?;
                continue;
            }
            break;
        }
        Ok(VariableDeclaration {
            node_id,
            kind,
            declarations,
        })
    }

    fn parse_binding_pattern(&mut self) -> Result<BindingPattern, ParseError> {
        match &self.cur {
            Token::Identifier(name) => {
                let name = name.clone();
                self.bump()?;
                Ok(BindingPattern::Identifier(name))
            }
            Token::Punct(Punct::LBracket) => self.parse_array_pattern(),
            Token::Punct(Punct::LBrace) => self.parse_object_pattern(),
            other => Err(ParseError::Unexpected {
                found: other.clone(),
                expected: "binding pattern",
                offset: self.offset(),
            }),
        }
    }

    fn parse_array_pattern(&mut self) -> Result<BindingPattern, ParseError> {
        self.bump()?; // [
        let mut elements = Vec::new();
        while !self.is_punct(Punct::RBracket) {
            if self.is_punct(Punct::Comma) {
                elements.push(None);
                self.bump()?;
                continue;
            }
            if self.is_punct(Punct::DotDotDot) {
                self.bump()?;
                let inner = self.parse_binding_pattern()?;
                elements.push(Some(BindingPattern::Rest(Box::new(inner))));
            } else {
                let mut pat = self.parse_binding_pattern()?;
                if self.is_punct(Punct::Eq) {
                    self.bump()?;
                    let default = self.parse_assignment_expr()?;
                    pat = BindingPattern::Assignment(Box::new(pat), Box::new(default));
                }
                elements.push(Some(pat));
            }
            if self.is_punct(Punct::Comma) {
                self.bump()?;
            }
        }
        self.expect_punct(Punct::RBracket)?;
        Ok(BindingPattern::Array(ArrayPattern { elements }))
    }

    fn parse_object_pattern(&mut self) -> Result<BindingPattern, ParseError> {
        self.bump()?; // {
        let mut properties = Vec::new();
        let mut rest = None;
        while !self.is_punct(Punct::RBrace) {
            if self.is_punct(Punct::DotDotDot) {
                self.bump()?;
                rest = Some(Box::new(self.parse_binding_pattern()?));
                break;
            }
            let key = self.parse_property_key()?;
            let pattern = if self.is_punct(Punct::Colon) {
                self.bump()?;
                self.parse_binding_pattern()?
            } else if let PropertyKeyExpr::Identifier(name) = &key {
                BindingPattern::Identifier(name.clone())
            } else {
                return Err(ParseError::InvalidAssignmentTarget);
            };
            let pattern = if self.is_punct(Punct::Eq) {
                self.bump()?;
                let default = self.parse_assignment_expr()?;
                BindingPattern::Assignment(Box::new(pattern), Box::new(default))
            } else {
                pattern
            };
            properties.push((key, pattern));
            if self.is_punct(Punct::Comma) {
                self.bump()?;
            }
        }
        self.expect_punct(Punct::RBrace)?;
        Ok(BindingPattern::Object(ObjectPattern { properties, rest }))
    }

    fn parse_property_key(&mut self) -> Result<PropertyKeyExpr, ParseError> {
        match self.cur.clone() {
            Token::Identifier(name) => {
                self.bump()?;
                Ok(PropertyKeyExpr::Identifier(name))
            }
            Token::Keyword(kw) => {
                self.bump()?;
                Ok(PropertyKeyExpr::Identifier(keyword_text(kw).to_string()))
            }
            Token::String(s) => {
                self.bump()?;
                Ok(PropertyKeyExpr::Identifier(s))
            }
            Token::Number(n) => {
                self.bump()?;
                Ok(PropertyKeyExpr::Identifier(format!("{n}")))
            }
            Token::Punct(Punct::LBracket) => {
                self.bump()?;
                let expr = self.parse_assignment_expr()?;
                self.expect_punct(Punct::RBracket)?;
                Ok(PropertyKeyExpr::Computed(Box::new(expr)))
            }
            other => Err(ParseError::Unexpected {
                found: other,
                expected: "property key",
                offset: self.offset(),
            }),
        }
    }

    fn parse_if(&mut self) -> Result<Statement, ParseError> {
        let node_id = self.id();
        self.bump()?;
        self.expect_punct(Punct::LParen)?;
        let test = self.parse_expression()?;
        self.expect_punct(Punct::RParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.is_keyword(Keyword::Else) {
            self.bump()?;
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::If(IfStatement {
            node_id,
            test,
            consequent,
            alternate,
        }))
    }

    fn parse_while(&mut self) -> Result<Statement, ParseError> {
        let node_id = self.id();
        self.bump()?;
        self.expect_punct(Punct::LParen)?;
        let test = self.parse_expression()?;
        self.expect_punct(Punct::RParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::While(WhileStatement {
            node_id,
            test,
            body,
        }))
    }

    fn parse_do_while(&mut self) -> Result<Statement, ParseError> {
        let node_id = self.id();
        self.bump()?;
        let body = Box::new(self.parse_statement()?);
        if !self.is_keyword(Keyword::While) {
            return Err(ParseError::Unexpected {
                found: self.cur.clone(),
                expected: "while",
                offset: self.offset(),
            });
        }
        self.bump()?;
        self.expect_punct(Punct::LParen)?;
        let test = self.parse_expression()?;
        self.expect_punct(Punct::RParen)?;
        self.eat_semi()?;
        Ok(Statement::DoWhile(DoWhileStatement {
            node_id,
            test,
            body,
        }))
    }

    fn parse_for(&mut self) -> Result<Statement, ParseError> {
        let node_id = self.id();
        self.bump()?;
        let is_await = if self.is_keyword(Keyword::Await) {
            self.bump()?;
            true
        } else {
            false
        };
        self.expect_punct(Punct::LParen)?;

        let head: Option<ForInit> = if self.is_punct(Punct::Semi) {
            None
        } else if self.is_keyword(Keyword::Var)
            || self.is_keyword(Keyword::Let)
            || self.is_keyword(Keyword::Const)
        {
            let kind = match &self.cur {
                Token::Keyword(Keyword::Var) => VariableKind::Var,
                Token::Keyword(Keyword::Let) => VariableKind::Let,
                _ => VariableKind::Const,
            };
            let node_id = self.id();
            self.bump()?;
            let pattern = self.parse_binding_pattern()?;
            if self.is_keyword(Keyword::In) || self.is_keyword(Keyword::Of) {
                let is_of = self.is_keyword(Keyword::Of);
                self.bump()?;
                let right = self.parse_assignment_expr()?;
                self.expect_punct(Punct::RParen)?;
                let body = Box::new(self.parse_statement()?);
                let left = ForHead::VariableDeclaration(VariableDeclaration {
                    node_id,
                    kind,
                    declarations: vec![VariableDeclarator {
                        id: pattern,
                        init: None,
                    }],
                });
                return Ok(if is_of {
                    Statement::ForOf(ForOfStatement {
                        node_id,
                        left,
                        right,
                        body,
                        is_await,
                    })
                } else {
                    Statement::ForIn(ForInStatement {
                        node_id,
                        left,
                        right,
                        body,
                    })
                });
            }
            let init_expr = if self.is_punct(Punct::Eq) {
                self.bump()?;
                Some(self.parse_assignment_expr()?)
            } else {
                None
            };
            let mut declarations = vec![VariableDeclarator {
                id: pattern,
                init: init_expr,
            }];
            while self.is_punct(Punct::Comma) {
                self.bump()?;
                let pattern = self.parse_binding_pattern()?;
                let init = if self.is_punct(Punct::Eq) {
                    self.bump()?;
                    Some(self.parse_assignment_expr()?)
                } else {
                    None
                };
                declarations.push(VariableDeclarator { id: pattern, init });
            }
            Some(ForInit::VariableDeclaration(VariableDeclaration {
                node_id,
                kind,
                declarations,
            }))
        } else {
            let expr = self.parse_expression()?;
            if self.is_keyword(Keyword::In) || self.is_keyword(Keyword::Of) {
                let is_of = self.is_keyword(Keyword::Of);
                self.bump()?;
                let right = self.parse_assignment_expr()?;
                self.expect_punct(Punct::RParen)?;
                let body = Box::new(self.parse_statement()?);
                let left = ForHead::Pattern(expr_to_binding_pattern(expr)?);
                return Ok(if is_of {
                    Statement::ForOf(ForOfStatement {
                        node_id,
                        left,
                        right,
                        body,
                        is_await,
                    })
                } else {
                    Statement::ForIn(ForInStatement {
                        node_id,
                        left,
                        right,
                        body,
                    })
                });
            }
            Some(ForInit::Expression(expr))
        };

        self.expect_punct(Punct::Semi)?;
        let test = if self.is_punct(Punct::Semi) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punct(Punct::Semi)?;
        let update = if self.is_punct(Punct::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punct(Punct::RParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::For(ForStatement {
            node_id,
            init: head,
            test,
            update,
            body,
        }))
    }

    fn parse_return(&mut self) -> Result<Statement, ParseError> {
        let node_id = self.id();
        self.bump()?;
        let argument = if self.is_punct(Punct::Semi) || self.is_punct(Punct::RBrace) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.eat_semi()?;
        Ok(Statement::Return(ReturnStatement { node_id, argument }))
    }

    fn parse_break(&mut self) -> Result<Statement, ParseError> {
        let node_id = self.id();
        self.bump()?;
        let label = if let Token::Identifier(name) = &self.cur {
            let name = name.clone();
            self.bump()?;
            Some(name)
        } else {
            None
        };
        self.eat_semi()?;
        Ok(Statement::Break(BreakStatement { node_id, label }))
    }

    fn parse_continue(&mut self) -> Result<Statement, ParseError> {
        let node_id = self.id();
        self.bump()?;
        let label = if let Token::Identifier(name) = &self.cur {
            let name = name.clone();
            self.bump()?;
            Some(name)
        } else {
            None
        };
        self.eat_semi()?;
        Ok(Statement::Continue(ContinueStatement { node_id, label }))
    }

    fn parse_throw(&mut self) -> Result<Statement, ParseError> {
        let node_id = self.id();
        self.bump()?;
        let argument = self.parse_expression()?;
        self.eat_semi()?;
        Ok(Statement::Throw(ThrowStatement { node_id, argument }))
    }

    fn parse_try(&mut self) -> Result<Statement, ParseError> {
        let node_id = self.id();
        self.bump()?;
        let block = self.parse_block()?;
        let handler = if self.is_keyword(Keyword::Catch) {
            self.bump()?;
            let param = if self.is_punct(Punct::LParen) {
                self.bump()?;
                let p = self.parse_binding_pattern()?;
                self.expect_punct(Punct::RParen)?;
                Some(p)
            } else {
                None
            };
            let body = self.parse_block()?;
            Some(CatchClause { param, body })
        } else {
            None
        };
        let finalizer = if self.is_keyword(Keyword::Finally) {
            self.bump()?;
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Statement::Try(TryStatement {
            node_id,
            block,
            handler,
            finalizer,
        }))
    }

    fn parse_switch(&mut self) -> Result<Statement, ParseError> {
        let node_id = self.id();
        self.bump()?;
        self.expect_punct(Punct::LParen)?;
        let discriminant = self.parse_expression()?;
        self.expect_punct(Punct::RParen)?;
        self.expect_punct(Punct::LBrace)?;
        let mut cases = Vec::new();
        while !self.is_punct(Punct::RBrace) {
            let test = if self.is_keyword(Keyword::Case) {
                self.bump()?;
                let e = self.parse_expression()?;
                Some(e)
            } else if self.is_keyword(Keyword::Default) {
                self.bump()?;
                None
            } else {
                return Err(ParseError::Unexpected {
                    found: self.cur.clone(),
                    expected: "case or default",
                    offset: self.offset(),
                });
            };
            self.expect_punct(Punct::Colon)?;
            let mut consequent = Vec::new();
            while !self.is_keyword(Keyword::Case)
                && !self.is_keyword(Keyword::Default)
                && !self.is_punct(Punct::RBrace)
            {
                consequent.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, consequent });
        }
        self.expect_punct(Punct::RBrace)?;
        Ok(Statement::Switch(SwitchStatement {
            node_id,
            discriminant,
            cases,
        }))
    }

    // -------------------------------------------------------------
    // Functions and classes
    // -------------------------------------------------------------

    fn parse_function(&mut self, is_async: bool) -> Result<Function, ParseError> {
        let node_id = self.id();
        self.bump()?; // function
        let is_generator = if self.is_punct(Punct::Star) {
            self.bump()?;
            true
        } else {
            false
        };
        let name = if let Token::Identifier(n) = &self.cur {
            let n = n.clone();
            self.bump()?;
            Some(n)
        } else {
            None
        };
        let params = self.parse_params()?;
        let body = FunctionBody::Block(self.parse_block()?.body);
        Ok(Function {
            node_id,
            name,
            params,
            body,
            is_async,
            is_generator,
            is_arrow: false,
            is_strict: false,
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.expect_punct(Punct::LParen)?;
        let mut params = Vec::new();
        while !self.is_punct(Punct::RParen) {
            let is_rest = if self.is_punct(Punct::DotDotDot) {
                self.bump()?;
                true
            } else {
                false
            };
            let pattern = self.parse_binding_pattern()?;
            let default = if self.is_punct(Punct::Eq) {
                self.bump()?;
                Some(self.parse_assignment_expr()?)
            } else {
                None
            };
            params.push(Param {
                pattern,
                default,
                is_rest,
            });
            if self.is_punct(Punct::Comma) {
                self.bump()?;
            }
        }
        self.expect_punct(Punct::RParen)?;
        Ok(params)
    }

    fn parse_class(&mut self) -> Result<Class, ParseError> {
        let node_id = self.id();
        self.bump()?; // class
        let name = if let Token::Identifier(n) = &self.cur {
            let n = n.clone();
            self.bump()?;
            Some(n)
        } else {
            None
        };
        let super_class = if self.is_keyword(Keyword::Extends) {
            self.bump()?;
            Some(Box::new(self.parse_unary_chain()?))
        } else {
            None
        };
        self.expect_punct(Punct::LBrace)?;
        let mut body = Vec::new();
        while !self.is_punct(Punct::RBrace) {
            if self.is_punct(Punct::Semi) {
                self.bump()?;
                continue;
            }
            body.push(self.parse_class_member()?);
        }
        self.expect_punct(Punct::RBrace)?;
        Ok(Class {
            node_id,
            name,
            super_class,
            body,
        })
    }

    fn parse_class_member(&mut self) -> Result<ClassMember, ParseError> {
        let is_static = if self.is_keyword(Keyword::Static) {
            self.bump()?;
            true
        } else {
            false
        };
        let accessor = if self.is_keyword(Keyword::Get) {
            self.bump()?;
            Some(true)
        } else if self.is_keyword(Keyword::Set) {
            self.bump()?;
            Some(false)
        } else {
            None
        };
        let key = self.parse_property_key()?;
        if self.is_punct(Punct::LParen) {
            let node_id = self.id();
            let params = self.parse_params()?;
            let body = FunctionBody::Block(self.parse_block()?.body);
            let func = Function {
                node_id,
                name: None,
                params,
                body,
                is_async: false,
                is_generator: false,
                is_arrow: false,
                is_strict: true,
            };
            let kind = match accessor {
                Some(true) => ClassMemberKind::Getter(func),
                Some(false) => ClassMemberKind::Setter(func),
                None => ClassMemberKind::Method(func),
            };
            return Ok(ClassMember {
                key,
                kind,
                is_static,
            });
        }
        let init = if self.is_punct(Punct::Eq) {
            self.bump()?;
            Some(self.parse_assignment_expr()?)
        } else {
            None
        };
        self.eat_semi()?;
        Ok(ClassMember {
            key,
            kind: ClassMemberKind::Field(init),
            is_static,
        })
    }

    // -------------------------------------------------------------
    // Expressions
    // -------------------------------------------------------------

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        let first = self.parse_assignment_expr()?;
        self.parse_expression_tail(first)
    }

    fn parse_expression_tail(&mut self, first: Expression) -> Result<Expression, ParseError> {
        if !self.is_punct(Punct::Comma) {
            return Ok(first);
        }
        let node_id = self.id();
        let mut expressions = vec![first];
        while self.is_punct(Punct::Comma) {
            self.bump()?;
            expressions.push(self.parse_assignment_expr()?);
        }
        Ok(Expression::Sequence(SequenceExpression {
            node_id,
            expressions,
        }))
    }

    fn parse_assignment_expr(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_conditional()?;
        let op = match &self.cur {
            Token::Punct(Punct::Eq) => Some(AssignmentOperator::Assign),
            Token::Punct(Punct::PlusEq) => Some(AssignmentOperator::AddAssign),
            Token::Punct(Punct::MinusEq) => Some(AssignmentOperator::SubAssign),
            Token::Punct(Punct::StarEq) => Some(AssignmentOperator::MulAssign),
            Token::Punct(Punct::SlashEq) => Some(AssignmentOperator::DivAssign),
            Token::Punct(Punct::PercentEq) => Some(AssignmentOperator::ModAssign),
            Token::Punct(Punct::AmpEq) => Some(AssignmentOperator::BitAndAssign),
            Token::Punct(Punct::PipeEq) => Some(AssignmentOperator::BitOrAssign),
            Token::Punct(Punct::CaretEq) => Some(AssignmentOperator::BitXorAssign),
            Token::Punct(Punct::ShlEq) => Some(AssignmentOperator::ShlAssign),
            Token::Punct(Punct::ShrEq) => Some(AssignmentOperator::ShrAssign),
            Token::Punct(Punct::UShrEq) => Some(AssignmentOperator::UShrAssign),
            Token::Punct(Punct::AmpAmpEq) => Some(AssignmentOperator::LogicalAndAssign),
            Token::Punct(Punct::PipePipeEq) => Some(AssignmentOperator::LogicalOrAssign),
            Token::Punct(Punct::QuestionQuestionEq) => Some(AssignmentOperator::NullishAssign),
            _ => None,
        };
        let Some(operator) = op else {
            return Ok(left);
        };
        let node_id = self.id();
        self.bump()?;
        let right = Box::new(self.parse_assignment_expr()?);
        let target = expr_to_assignment_target(left)?;
        Ok(Expression::Assignment(AssignmentExpression {
            node_id,
            operator,
            left: target,
            right,
        }))
    }

    fn parse_conditional(&mut self) -> Result<Expression, ParseError> {
        let test = self.parse_binary(0)?;
        if !self.is_punct(Punct::QuestionMark) {
            return Ok(test);
        }
        let node_id = self.id();
        self.bump()?;
        let consequent = Box::new(self.parse_assignment_expr()?);
        self.expect_punct(Punct::Colon)?;
        let alternate = Box::new(self.parse_assignment_expr()?);
        Ok(Expression::Conditional(ConditionalExpression {
            node_id,
            test: Box::new(test),
            consequent,
            alternate,
        }))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expression, ParseError> {
        let mut left = self.parse_unary_chain()?;
        loop {
            let Some((prec, right_assoc, kind)) = binary_op_info(&self.cur) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            let node_id = self.id();
            self.bump()?;
            let next_min = if right_assoc { prec } else { prec + 1 };
            let right = self.parse_binary(next_min)?;
            left = match kind {
                OpKind::Binary(operator) => Expression::Binary(BinaryExpression {
                    node_id,
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                }),
                OpKind::Logical(operator) => Expression::Logical(LogicalExpression {
                    node_id,
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                }),
            };
        }
        Ok(left)
    }

    fn parse_unary_chain(&mut self) -> Result<Expression, ParseError> {
        let unary_op = match &self.cur {
            Token::Punct(Punct::Minus) => Some(UnaryOperator::Minus),
            Token::Punct(Punct::Plus) => Some(UnaryOperator::Plus),
            Token::Punct(Punct::Bang) => Some(UnaryOperator::Not),
            Token::Punct(Punct::Tilde) => Some(UnaryOperator::BitNot),
            Token::Keyword(Keyword::TypeOf) => Some(UnaryOperator::TypeOf),
            Token::Keyword(Keyword::Void) => Some(UnaryOperator::Void),
            Token::Keyword(Keyword::Delete) => Some(UnaryOperator::Delete),
            _ => None,
        };
        if let Some(operator) = unary_op {
            let node_id = self.id();
            self.bump()?;
            let argument = Box::new(self.parse_unary_chain()?);
            return Ok(Expression::Unary(UnaryExpression {
                node_id,
                operator,
                argument,
            }));
        }
        if self.is_punct(Punct::PlusPlus) || self.is_punct(Punct::MinusMinus) {
            let operator = if self.is_punct(Punct::PlusPlus) {
                UpdateOperator::Increment
            } else {
                UpdateOperator::Decrement
            };
            let node_id = self.id();
            self.bump()?;
            let argument = Box::new(self.parse_unary_chain()?);
            return Ok(Expression::Update(UpdateExpression {
                node_id,
                operator,
                argument,
                prefix: true,
            }));
        }
        if self.is_keyword(Keyword::Await) {
            let node_id = self.id();
            self.bump()?;
            let argument = Box::new(self.parse_unary_chain()?);
            return Ok(Expression::Await(AwaitExpression { node_id, argument }));
        }
        if self.is_keyword(Keyword::Yield) {
            let node_id = self.id();
            self.bump()?;
            let delegate = if self.is_punct(Punct::Star) {
                self.bump()?;
                true
            } else {
                false
            };
            let argument = if self.is_punct(Punct::Semi)
                || self.is_punct(Punct::RParen)
                || self.is_punct(Punct::RBrace)
                || self.is_punct(Punct::RBracket)
                || self.is_punct(Punct::Comma)
                || matches!(self.cur, Token::Eof)
            {
                None
            } else {
                Some(Box::new(self.parse_assignment_expr()?))
            };
            return Ok(Expression::Yield(YieldExpression {
                node_id,
                argument,
                delegate,
            }));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expression, ParseError> {
        let expr = self.parse_call_or_new()?;
        if self.is_punct(Punct::PlusPlus) || self.is_punct(Punct::MinusMinus) {
            let operator = if self.is_punct(Punct::PlusPlus) {
                UpdateOperator::Increment
            } else {
                UpdateOperator::Decrement
            };
            let node_id = self.id();
            self.bump()?;
            return Ok(Expression::Update(UpdateExpression {
                node_id,
                operator,
                argument: Box::new(expr),
                prefix: false,
            }));
        }
        Ok(expr)
    }

    fn parse_call_or_new(&mut self) -> Result<Expression, ParseError> {
        let mut expr = if self.is_keyword(Keyword::New) {
            let node_id = self.id();
            self.bump()?;
            let callee = Box::new(self.parse_member_only()?);
            let arguments = if self.is_punct(Punct::LParen) {
                self.parse_arguments()?
            } else {
                Vec::new()
            };
            Expression::New(NewExpression {
                node_id,
                callee,
                arguments,
            })
        } else {
            self.parse_primary()?
        };

        loop {
            if self.is_punct(Punct::Dot) {
                let node_id = self.id();
                self.bump()?;
                let name = self.expect_member_name()?;
                expr = Expression::Member(MemberExpression {
                    node_id,
                    object: Box::new(expr),
                    property: MemberProperty::Identifier(name),
                    optional: false,
                });
            } else if self.is_punct(Punct::QuestionDot) {
                let node_id = self.id();
                self.bump()?;
                if self.is_punct(Punct::LParen) {
                    let arguments = self.parse_arguments()?;
                    expr = Expression::Call(CallExpression {
                        node_id,
                        callee: Box::new(expr),
                        arguments,
                        optional: true,
                    });
                } else {
                    let name = self.expect_member_name()?;
                    expr = Expression::Member(MemberExpression {
                        node_id,
                        object: Box::new(expr),
                        property: MemberProperty::Identifier(name),
                        optional: true,
                    });
                }
            } else if self.is_punct(Punct::LBracket) {
                let node_id = self.id();
                self.bump()?;
                let index = self.parse_expression()?;
                self.expect_punct(Punct::RBracket)?;
                expr = Expression::Member(MemberExpression {
                    node_id,
                    object: Box::new(expr),
                    property: MemberProperty::Computed(Box::new(index)),
                    optional: false,
                });
            } else if self.is_punct(Punct::LParen) {
                let node_id = self.id();
                let arguments = self.parse_arguments()?;
                expr = Expression::Call(CallExpression {
                    node_id,
                    callee: Box::new(expr),
                    arguments,
                    optional: false,
                });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Parses a member chain with no call parens, the callee position of
    /// `new Foo.Bar(...)`.
    fn parse_member_only(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.is_punct(Punct::Dot) {
                let node_id = self.id();
                self.bump()?;
                let name = self.expect_member_name()?;
                expr = Expression::Member(MemberExpression {
                    node_id,
                    object: Box::new(expr),
                    property: MemberProperty::Identifier(name),
                    optional: false,
                });
            } else if self.is_punct(Punct::LBracket) {
                let node_id = self.id();
                self.bump()?;
                let index = self.parse_expression()?;
                self.expect_punct(Punct::RBracket)?;
                expr = Expression::Member(MemberExpression {
                    node_id,
                    object: Box::new(expr),
                    property: MemberProperty::Computed(Box::new(index)),
                    optional: false,
                });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn expect_member_name(&mut self) -> Result<String, ParseError> {
        match self.cur.clone() {
            Token::Identifier(name) => {
                self.bump()?;
                Ok(name)
            }
            Token::Keyword(kw) => {
                self.bump()?;
                Ok(keyword_text(kw).to_string())
            }
            other => Err(ParseError::Unexpected {
                found: other,
                expected: "property name",
                offset: self.offset(),
            }),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Argument>, ParseError> {
        self.expect_punct(Punct::LParen)?;
        let mut args = Vec::new();
        while !self.is_punct(Punct::RParen) {
            if self.is_punct(Punct::DotDotDot) {
                self.bump()?;
                args.push(Argument::Spread(self.parse_assignment_expr()?));
            } else {
                args.push(Argument::Expression(self.parse_assignment_expr()?));
            }
            if self.is_punct(Punct::Comma) {
                self.bump()?;
            }
        }
        self.expect_punct(Punct::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        match self.cur.clone() {
            Token::Number(n) => {
                let id = self.id();
                self.bump()?;
                Ok(Expression::Number(id, n))
            }
            Token::BigIntLiteral(digits) => {
                let id = self.id();
                self.bump()?;
                Ok(Expression::BigInt(id, digits))
            }
            Token::String(s) => {
                let id = self.id();
                self.bump()?;
                Ok(Expression::String(id, s))
            }
            Token::Keyword(Keyword::True) => {
                let id = self.id();
                self.bump()?;
                Ok(Expression::Boolean(id, true))
            }
            Token::Keyword(Keyword::False) => {
                let id = self.id();
                self.bump()?;
                Ok(Expression::Boolean(id, false))
            }
            Token::Keyword(Keyword::Null) => {
                let id = self.id();
                self.bump()?;
                Ok(Expression::Null(id))
            }
            Token::Keyword(Keyword::Undefined) => {
                let id = self.id();
                self.bump()?;
                Ok(Expression::Undefined(id))
            }
            Token::Keyword(Keyword::This) => {
                let id = self.id();
                self.bump()?;
                Ok(Expression::This(id))
            }
            Token::Keyword(Keyword::Super) => {
                let id = self.id();
                self.bump()?;
                Ok(Expression::Super(id))
            }
            Token::Keyword(Keyword::Function) => Ok(Expression::Function(self.parse_function(false)?)),
            Token::Keyword(Keyword::Class) => Ok(Expression::Class(self.parse_class()?)),
            Token::Keyword(Keyword::Async) => self.parse_async_primary(),
            Token::Identifier(name) => {
                let id = self.id();
                self.bump()?;
                if self.is_punct(Punct::Arrow) {
                    return self.finish_arrow(
                        vec![Param {
                            pattern: BindingPattern::Identifier(name),
                            default: None,
                            is_rest: false,
                        }],
                        false,
                    );
                }
                Ok(Expression::Identifier(id, name))
            }
            Token::Punct(Punct::LParen) => match self.parse_paren_group()? {
                ParenResult::Arrow(params) => self.finish_arrow(params, false),
                ParenResult::Expr(expr) => Ok(expr),
            },
            Token::Punct(Punct::LBracket) => self.parse_array_literal(),
            Token::Punct(Punct::LBrace) => self.parse_object_literal(),
            other if matches!(other, Token::TemplateChunk(_)) => {
                unreachable!("template literals are handled via the backtick check below")
            }
            other => Err(ParseError::Unexpected {
                found: other,
                expected: "expression",
                offset: self.offset(),
            }),
        }
    }

    fn parse_async_primary(&mut self) -> Result<Expression, ParseError> {
        self.bump()?; // async
        if self.is_keyword(Keyword::Function) {
            return Ok(Expression::Function(self.parse_function(true)?));
        }
        match self.cur.clone() {
            Token::Identifier(name) => {
                self.bump()?;
                self.finish_arrow(
                    vec![Param {
                        pattern: BindingPattern::Identifier(name),
                        default: None,
                        is_rest: false,
                    }],
                    true,
                )
            }
            Token::Punct(Punct::LParen) => match self.parse_paren_group()? {
                ParenResult::Arrow(params) => self.finish_arrow(params, true),
                ParenResult::Expr(_) => Err(ParseError::InvalidArrowParams),
            },
            other => Err(ParseError::Unexpected {
                found: other,
                expected: "async function or arrow parameters",
                offset: self.offset(),
            }),
        }
    }

    fn parse_paren_group(&mut self) -> Result<ParenResult, ParseError> {
        let paren_node_id = self.id();
        self.bump()?; // (
        let mut elements = Vec::new();
        while !self.is_punct(Punct::RParen) {
            if self.is_punct(Punct::DotDotDot) {
                let node_id = self.id();
                self.bump()?;
                let inner = self.parse_assignment_expr()?;
                elements.push(Expression::Spread(node_id, Box::new(inner)));
            } else {
                elements.push(self.parse_assignment_expr()?);
            }
            if self.is_punct(Punct::Comma) {
                self.bump()?;
            } else {
                break;
            }
        }
        self.expect_punct(Punct::RParen)?;
        if self.is_punct(Punct::Arrow) {
            let params = elements
                .into_iter()
                .map(expr_to_param)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(ParenResult::Arrow(params));
        }
        if elements.is_empty() {
            return Err(ParseError::Unexpected {
                found: self.cur.clone(),
                expected: "expression inside parentheses",
                offset: self.offset(),
            });
        }
        if elements.len() == 1 {
            Ok(ParenResult::Expr(Expression::Paren(
                paren_node_id,
                Box::new(elements.into_iter().next().unwrap()),
            )))
        } else {
            Ok(ParenResult::Expr(Expression::Sequence(SequenceExpression {
                node_id: paren_node_id,
                expressions: elements,
            })))
        }
    }

    fn finish_arrow(&mut self, params: Vec<Param>, is_async: bool) -> Result<Expression, ParseError> {
        let node_id = self.id();
        self.expect_punct(Punct::Arrow)?;
        let body = if self.is_punct(Punct::LBrace) {
            FunctionBody::Block(self.parse_block()?.body)
        } else {
            FunctionBody::Expression(Box::new(self.parse_assignment_expr()?))
        };
        Ok(Expression::Function(Function {
            node_id,
            name: None,
            params,
            body,
            is_async,
            is_generator: false,
            is_arrow: true,
            is_strict: false,
        }))
    }

    fn parse_array_literal(&mut self) -> Result<Expression, ParseError> {
        let node_id = self.id();
        self.bump()?; // [
        let mut elements = Vec::new();
        while !self.is_punct(Punct::RBracket) {
            if self.is_punct(Punct::Comma) {
                elements.push(None);
                self.bump()?;
                continue;
            }
            if self.is_punct(Punct::DotDotDot) {
                let spread_id = self.id();
                self.bump()?;
                let inner = self.parse_assignment_expr()?;
                elements.push(Some(Expression::Spread(spread_id, Box::new(inner))));
            } else {
                elements.push(Some(self.parse_assignment_expr()?));
            }
            if self.is_punct(Punct::Comma) {
                self.bump()?;
            }
        }
        self.expect_punct(Punct::RBracket)?;
        Ok(Expression::Array(ArrayExpression { node_id, elements }))
    }

    fn parse_object_literal(&mut self) -> Result<Expression, ParseError> {
        let node_id = self.id();
        self.bump()?; // {
        let mut properties = Vec::new();
        while !self.is_punct(Punct::RBrace) {
            if self.is_punct(Punct::DotDotDot) {
                self.bump()?;
                let expr = self.parse_assignment_expr()?;
                properties.push(ObjectProperty::Spread(expr));
            } else if self.is_keyword(Keyword::Get) {
                self.bump()?;
                let key = self.parse_property_key()?;
                let params = self.parse_params()?;
                let func_id = self.id();
                let body = FunctionBody::Block(self.parse_block()?.body);
                properties.push(ObjectProperty::Getter {
                    key,
                    body: Function {
                        node_id: func_id,
                        name: None,
                        params,
                        body,
                        is_async: false,
                        is_generator: false,
                        is_arrow: false,
                        is_strict: false,
                    },
                });
            } else if self.is_keyword(Keyword::Set) {
                self.bump()?;
                let key = self.parse_property_key()?;
                let params = self.parse_params()?;
                let func_id = self.id();
                let body = FunctionBody::Block(self.parse_block()?.body);
                properties.push(ObjectProperty::Setter {
                    key,
                    body: Function {
                        node_id: func_id,
                        name: None,
                        params,
                        body,
                        is_async: false,
                        is_generator: false,
                        is_arrow: false,
                        is_strict: false,
                    },
                });
            } else {
                let key = self.parse_property_key()?;
                if self.is_punct(Punct::LParen) {
                    let func_id = self.id();
                    let params = self.parse_params()?;
                    let body = FunctionBody::Block(self.parse_block()?.body);
                    properties.push(ObjectProperty::KeyValue {
                        key,
                        value: Expression::Function(Function {
                            node_id: func_id,
                            name: None,
                            params,
                            body,
                            is_async: false,
                            is_generator: false,
                            is_arrow: false,
                            is_strict: false,
                        }),
                        shorthand: false,
                    });
                } else if self.is_punct(Punct::Colon) {
                    self.bump()?;
                    let value = self.parse_assignment_expr()?;
                    properties.push(ObjectProperty::KeyValue {
                        key,
                        value,
                        shorthand: false,
                    });
                } else if let PropertyKeyExpr::Identifier(name) = &key {
                    let id = self.id();
                    properties.push(ObjectProperty::KeyValue {
                        key: key.clone(),
                        value: Expression::Identifier(id, name.clone()),
                        shorthand: true,
                    });
                } else {
                    return Err(ParseError::Unexpected {
                        found: self.cur.clone(),
                        expected: "':' in object literal",
                        offset: self.offset(),
                    });
                }
            }
            if self.is_punct(Punct::Comma) {
                self.bump()?;
            }
        }
        self.expect_punct(Punct::RBrace)?;
        Ok(Expression::Object(ObjectExpression { node_id, properties }))
    }
}

enum OpKind {
    Binary(BinaryOperator),
    Logical(LogicalOperator),
}

fn binary_op_info(tok: &Token) -> Option<(u8, bool, OpKind)> {
    use BinaryOperator::*;
    use Punct::*;
    let Token::Punct(p) = tok else {
        if let Token::Keyword(Keyword::InstanceOf) = tok {
            return Some((10, false, OpKind::Binary(InstanceOf)));
        }
        if let Token::Keyword(Keyword::In) = tok {
            return Some((10, false, OpKind::Binary(In)));
        }
        return None;
    };
    Some(match p {
        PipePipe => (2, false, OpKind::Logical(LogicalOperator::Or)),
        AmpAmp => (3, false, OpKind::Logical(LogicalOperator::And)),
        QuestionQuestion => (2, false, OpKind::Logical(LogicalOperator::NullishCoalescing)),
        Pipe => (4, false, OpKind::Binary(BitOr)),
        Caret => (5, false, OpKind::Binary(BitXor)),
        Amp => (6, false, OpKind::Binary(BitAnd)),
        EqEq => (7, false, OpKind::Binary(Equal)),
        BangEq => (7, false, OpKind::Binary(NotEqual)),
        EqEqEq => (7, false, OpKind::Binary(StrictEqual)),
        BangEqEq => (7, false, OpKind::Binary(StrictNotEqual)),
        Lt => (8, false, OpKind::Binary(Less)),
        LtEq => (8, false, OpKind::Binary(LessEqual)),
        Gt => (8, false, OpKind::Binary(Greater)),
        GtEq => (8, false, OpKind::Binary(GreaterEqual)),
        Shl => (9, false, OpKind::Binary(Shl)),
        Shr => (9, false, OpKind::Binary(Shr)),
        UShr => (9, false, OpKind::Binary(UShr)),
        Plus => (11, false, OpKind::Binary(Add)),
        Minus => (11, false, OpKind::Binary(Sub)),
        Star => (12, false, OpKind::Binary(Mul)),
        Slash => (12, false, OpKind::Binary(Div)),
        Percent => (12, false, OpKind::Binary(Mod)),
        StarStar => (13, true, OpKind::Binary(Exponent)),
        _ => return None,
    })
}

fn expr_to_param(expr: Expression) -> Result<Param, ParseError> {
    match expr {
        Expression::Identifier(_, name) => Ok(Param {
            pattern: BindingPattern::Identifier(name),
            default: None,
            is_rest: false,
        }),
        Expression::Assignment(a) if a.operator == AssignmentOperator::Assign => {
            let pattern = match a.left {
                AssignmentTarget::Identifier(name) => BindingPattern::Identifier(name),
                AssignmentTarget::Pattern(p) => p,
                AssignmentTarget::Member(_) => return Err(ParseError::InvalidArrowParams),
            };
            Ok(Param {
                pattern,
                default: Some(*a.right),
                is_rest: false,
            })
        }
        Expression::Spread(_, inner) => Ok(Param {
            pattern: expr_to_binding_pattern(*inner)?,
            default: None,
            is_rest: true,
        }),
        Expression::Array(_) | Expression::Object(_) => Ok(Param {
            pattern: expr_to_binding_pattern(expr)?,
            default: None,
            is_rest: false,
        }),
        _ => Err(ParseError::InvalidArrowParams),
    }
}

fn expr_to_binding_pattern(expr: Expression) -> Result<BindingPattern, ParseError> {
    match expr {
        Expression::Identifier(_, name) => Ok(BindingPattern::Identifier(name)),
        Expression::Array(arr) => {
            let elements = arr
                .elements
                .into_iter()
                .map(|e| e.map(expr_to_binding_pattern).transpose())
                .collect::<Result<Vec<_>, _>>()?;
            Ok(BindingPattern::Array(ArrayPattern { elements }))
        }
        Expression::Object(obj) => {
            let mut properties = Vec::new();
            let mut rest = None;
            for prop in obj.properties {
                match prop {
                    ObjectProperty::KeyValue { key, value, .. } => {
                        properties.push((key, expr_to_binding_pattern(value)?));
                    }
                    ObjectProperty::Spread(inner) => {
                        rest = Some(Box::new(expr_to_binding_pattern(inner)?));
                    }
                    _ => return Err(ParseError::InvalidAssignmentTarget),
                }
            }
            Ok(BindingPattern::Object(ObjectPattern { properties, rest }))
        }
        Expression::Assignment(a) if a.operator == AssignmentOperator::Assign => {
            let pattern = match a.left {
                AssignmentTarget::Identifier(name) => BindingPattern::Identifier(name),
                AssignmentTarget::Pattern(p) => p,
                AssignmentTarget::Member(_) => return Err(ParseError::InvalidAssignmentTarget),
            };
            Ok(BindingPattern::Assignment(Box::new(pattern), a.right))
        }
        _ => Err(ParseError::InvalidAssignmentTarget),
    }
}

fn expr_to_assignment_target(expr: Expression) -> Result<AssignmentTarget, ParseError> {
    match expr {
        Expression::Identifier(_, name) => Ok(AssignmentTarget::Identifier(name)),
        Expression::Member(m) => Ok(AssignmentTarget::Member(m)),
        Expression::Array(_) | Expression::Object(_) => {
            Ok(AssignmentTarget::Pattern(expr_to_binding_pattern(expr)?))
        }
        _ => Err(ParseError::InvalidAssignmentTarget),
    }
}

fn keyword_text(kw: Keyword) -> &'static str {
    use Keyword::*;
    match kw {
        Await => "await",
        Async => "async",
        Break => "break",
        Case => "case",
        Catch => "catch",
        Class => "class",
        Const => "const",
        Continue => "continue",
        Debugger => "debugger",
        Default => "default",
        Delete => "delete",
        Do => "do",
        Else => "else",
        Export => "export",
        Extends => "extends",
        False => "false",
        Finally => "finally",
        For => "for",
        Function => "function",
        Get => "get",
        If => "if",
        In => "in",
        InstanceOf => "instanceof",
        Import => "import",
        Let => "let",
        New => "new",
        Null => "null",
        Of => "of",
        Return => "return",
        Set => "set",
        Static => "static",
        Super => "super",
        Switch => "switch",
        This => "this",
        Throw => "throw",
        True => "true",
        Try => "try",
        TypeOf => "typeof",
        Undefined => "undefined",
        Var => "var",
        Void => "void",
        While => "while",
        Yield => "yield",
    }
}

fn punct_name(p: Punct) -> &'static str {
    use Punct::*;
    match p {
        LParen => "(",
        RParen => ")",
        LBrace => "{",
        RBrace => "}",
        LBracket => "[",
        RBracket => "]",
        Semi => ";",
        Comma => ",",
        Colon => ":",
        RParen2 => unreachable!(),
        _ => "punctuation",
    }
}
