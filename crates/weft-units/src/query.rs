// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Small search query language over units.
//!
//! `state:translated AND source:save` style: `field:value` terms combined
//! with `AND`, `OR`, `NOT` and parentheses. Adjacent terms combine with an
//! implicit AND. Values with spaces are double-quoted. Compiles to a
//! [`Predicate`] evaluated in memory against unit rows.

use std::str::FromStr;

use weft_db::UnitRecord;

use crate::error::{Result, UnitError};
use crate::state::UnitState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
	And(Box<Predicate>, Box<Predicate>),
	Or(Box<Predicate>, Box<Predicate>),
	Not(Box<Predicate>),
	Term { field: Field, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
	State,
	Source,
	Target,
	Context,
	Explanation,
	Flag,
	Label,
	Pending,
}

impl FromStr for Field {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"state" => Ok(Field::State),
			"source" => Ok(Field::Source),
			"target" => Ok(Field::Target),
			"context" => Ok(Field::Context),
			"explanation" => Ok(Field::Explanation),
			"flag" => Ok(Field::Flag),
			"label" => Ok(Field::Label),
			"pending" => Ok(Field::Pending),
			other => Err(format!("unknown field: {other}")),
		}
	}
}

impl Predicate {
	pub fn matches(&self, unit: &UnitRecord) -> bool {
		match self {
			Predicate::And(a, b) => a.matches(unit) && b.matches(unit),
			Predicate::Or(a, b) => a.matches(unit) || b.matches(unit),
			Predicate::Not(p) => !p.matches(unit),
			Predicate::Term { field, value } => match field {
				Field::State => unit.state == *value,
				Field::Source => contains_ci(&unit.source, value),
				Field::Target => contains_ci(&unit.target, value),
				Field::Context => unit.context.to_lowercase().contains(&value.to_lowercase()),
				Field::Explanation => {
					unit.explanation.to_lowercase().contains(&value.to_lowercase())
				}
				Field::Flag => unit.extra_flags.split(',').any(|f| f.trim() == value),
				Field::Label => unit.labels.iter().any(|l| l == value),
				Field::Pending => unit.pending == (value == "true"),
			},
		}
	}
}

fn contains_ci(texts: &[String], needle: &str) -> bool {
	let needle = needle.to_lowercase();
	texts.iter().any(|t| t.to_lowercase().contains(&needle))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
	LParen,
	RParen,
	And,
	Or,
	Not,
	Term { field: String, value: String },
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
	let mut tokens = Vec::new();
	let mut chars = input.chars().peekable();

	while let Some(&c) = chars.peek() {
		match c {
			c if c.is_whitespace() => {
				chars.next();
			}
			'(' => {
				chars.next();
				tokens.push(Token::LParen);
			}
			')' => {
				chars.next();
				tokens.push(Token::RParen);
			}
			_ => {
				let mut word = String::new();
				while let Some(&c) = chars.peek() {
					if c.is_whitespace() || c == '(' || c == ')' {
						break;
					}
					chars.next();
					word.push(c);
					if c == ':' {
						break;
					}
				}

				if let Some(field) = word.strip_suffix(':') {
					let value = if chars.peek() == Some(&'"') {
						chars.next();
						let mut value = String::new();
						loop {
							match chars.next() {
								Some('"') => break,
								Some(c) => value.push(c),
								None => {
									return Err(UnitError::Query(
										"unterminated quoted value".to_string(),
									))
								}
							}
						}
						value
					} else {
						let mut value = String::new();
						while let Some(&c) = chars.peek() {
							if c.is_whitespace() || c == '(' || c == ')' {
								break;
							}
							chars.next();
							value.push(c);
						}
						value
					};
					tokens.push(Token::Term { field: field.to_string(), value });
				} else {
					match word.to_uppercase().as_str() {
						"AND" => tokens.push(Token::And),
						"OR" => tokens.push(Token::Or),
						"NOT" => tokens.push(Token::Not),
						_ => {
							return Err(UnitError::Query(format!(
								"expected field:value term, found: {word}"
							)))
						}
					}
				}
			}
		}
	}

	Ok(tokens)
}

struct Parser {
	tokens: Vec<Token>,
	pos: usize,
}

impl Parser {
	fn peek(&self) -> Option<&Token> {
		self.tokens.get(self.pos)
	}

	fn next(&mut self) -> Option<Token> {
		let token = self.tokens.get(self.pos).cloned();
		if token.is_some() {
			self.pos += 1;
		}
		token
	}

	fn parse_or(&mut self) -> Result<Predicate> {
		let mut left = self.parse_and()?;
		while self.peek() == Some(&Token::Or) {
			self.next();
			let right = self.parse_and()?;
			left = Predicate::Or(Box::new(left), Box::new(right));
		}
		Ok(left)
	}

	fn parse_and(&mut self) -> Result<Predicate> {
		let mut left = self.parse_unary()?;
		loop {
			match self.peek() {
				Some(Token::And) => {
					self.next();
				}
				// Adjacency is an implicit AND
				Some(Token::LParen) | Some(Token::Not) | Some(Token::Term { .. }) => {}
				_ => break,
			}
			let right = self.parse_unary()?;
			left = Predicate::And(Box::new(left), Box::new(right));
		}
		Ok(left)
	}

	fn parse_unary(&mut self) -> Result<Predicate> {
		match self.peek() {
			Some(Token::Not) => {
				self.next();
				Ok(Predicate::Not(Box::new(self.parse_unary()?)))
			}
			_ => self.parse_primary(),
		}
	}

	fn parse_primary(&mut self) -> Result<Predicate> {
		match self.next() {
			Some(Token::LParen) => {
				let inner = self.parse_or()?;
				match self.next() {
					Some(Token::RParen) => Ok(inner),
					_ => Err(UnitError::Query("missing closing parenthesis".to_string())),
				}
			}
			Some(Token::Term { field, value }) => {
				let field = field.parse::<Field>().map_err(UnitError::Query)?;
				if field == Field::State {
					// Catch typos early rather than matching nothing
					value
						.parse::<UnitState>()
						.map_err(UnitError::Query)?;
				}
				Ok(Predicate::Term { field, value })
			}
			other => Err(UnitError::Query(format!("unexpected token: {other:?}"))),
		}
	}
}

/// Compiles a query string into a predicate.
pub fn parse_query(input: &str) -> Result<Predicate> {
	let tokens = tokenize(input)?;
	if tokens.is_empty() {
		return Err(UnitError::Query("empty query".to_string()));
	}
	let mut parser = Parser { tokens, pos: 0 };
	let predicate = parser.parse_or()?;
	if parser.peek().is_some() {
		return Err(UnitError::Query("trailing tokens after query".to_string()));
	}
	Ok(predicate)
}
