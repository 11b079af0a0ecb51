//! Recursive-descent parser for the DOT subset.

use super::lexer::{Token, TokenKind};
use crate::error::DesignError;
use std::collections::BTreeMap;

/// Raw netlist collected from a DOT graph, before design assembly.
#[derive(Debug, Default)]
pub(crate) struct Netlist {
    /// Operation name → opcode.
    pub operations: BTreeMap<String, String>,
    /// `(source, destination, operand)`.
    pub ties: Vec<(String, String, u32)>,
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    netlist: Netlist,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            netlist: Netlist::default(),
        }
    }

    fn current(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.current() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> DesignError {
        DesignError::Syntax {
            line: self.line(),
            message: message.into(),
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), DesignError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}, found {:?}", self.current())))
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.current(), TokenKind::Id(s) if s.eq_ignore_ascii_case(keyword))
    }

    fn expect_id(&mut self) -> Result<String, DesignError> {
        match self.current().clone() {
            TokenKind::Id(s) => {
                self.advance();
                Ok(s)
            }
            other => Err(self.error(format!("expected identifier, found {other:?}"))),
        }
    }

    /// `["strict"] "digraph" [id] "{" stmt* "}"`
    pub(crate) fn parse_graph(mut self) -> Result<Netlist, DesignError> {
        if self.at_keyword("strict") {
            self.advance();
        }
        if !self.at_keyword("digraph") {
            return Err(self.error("expected 'digraph'"));
        }
        self.advance();
        if matches!(self.current(), TokenKind::Id(_)) {
            self.advance();
        }
        self.expect(&TokenKind::LBrace, "'{'")?;
        while !self.eat(&TokenKind::RBrace) {
            if *self.current() == TokenKind::Eof {
                return Err(self.error("expected '}'"));
            }
            self.parse_stmt()?;
            self.eat(&TokenKind::Semicolon);
        }
        if *self.current() != TokenKind::Eof {
            return Err(self.error("trailing input after graph"));
        }
        Ok(self.netlist)
    }

    fn parse_stmt(&mut self) -> Result<(), DesignError> {
        if self.at_keyword("graph") || self.at_keyword("node") || self.at_keyword("edge") {
            self.advance();
            self.parse_attr_lists()?;
            return Ok(());
        }
        if self.at_keyword("subgraph") || *self.current() == TokenKind::LBrace {
            return Err(self.error("subgraphs are not supported"));
        }

        let first = self.expect_id()?;
        if self.eat(&TokenKind::Equals) {
            self.expect_id()?;
            return Ok(());
        }

        let mut chain = vec![first];
        loop {
            if self.eat(&TokenKind::Arrow) {
                chain.push(self.expect_id()?);
            } else if *self.current() == TokenKind::UndirectedEdge {
                return Err(self.error("undirected edge in digraph"));
            } else {
                break;
            }
        }
        let attrs = self.parse_attr_lists()?;

        if chain.len() == 1 {
            self.add_node(chain.remove(0), attrs)
        } else {
            self.add_edges(&chain, &attrs)
        }
    }

    fn add_node(
        &mut self,
        name: String,
        attrs: BTreeMap<String, String>,
    ) -> Result<(), DesignError> {
        let Some(opcode) = attrs.get("opcode") else {
            return Err(DesignError::MissingOpcode(name));
        };
        if self.netlist.operations.contains_key(&name) {
            return Err(DesignError::DuplicateOperation(name));
        }
        self.netlist.operations.insert(name, opcode.clone());
        Ok(())
    }

    fn add_edges(
        &mut self,
        chain: &[String],
        attrs: &BTreeMap<String, String>,
    ) -> Result<(), DesignError> {
        for pair in chain.windows(2) {
            let operand = attrs
                .get("operand")
                .and_then(|s| s.parse::<u32>().ok())
                .ok_or_else(|| DesignError::MissingOperand {
                    src: pair[0].clone(),
                    dst: pair[1].clone(),
                })?;
            self.netlist
                .ties
                .push((pair[0].clone(), pair[1].clone(), operand));
        }
        Ok(())
    }

    /// Zero or more `[ a=b, c=d; ... ]` lists, merged.
    fn parse_attr_lists(&mut self) -> Result<BTreeMap<String, String>, DesignError> {
        let mut attrs = BTreeMap::new();
        while self.eat(&TokenKind::LBracket) {
            while !self.eat(&TokenKind::RBracket) {
                let key = self.expect_id()?;
                self.expect(&TokenKind::Equals, "'='")?;
                let value = self.expect_id()?;
                attrs.insert(key, value);
                if !self.eat(&TokenKind::Comma) {
                    self.eat(&TokenKind::Semicolon);
                }
            }
        }
        Ok(attrs)
    }
}
