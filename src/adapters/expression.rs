//! Minimal document-store expression support for the in-memory backend.
//!
//! Covers `SET`/`REMOVE` update clauses, `AND`-joined comparisons with
//! `attribute_exists`/`attribute_not_exists`, and projection lists. Names are
//! top-level attributes only; `#name` and `:value` placeholders are resolved
//! against `ExpressionAttributeNames` / `ExpressionAttributeValues`.

use crate::domain::model::Document;
use crate::domain::ports::BackendResult;
use crate::utils::error::BackendError;
use serde_json::{Number, Value};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Name(String),
    Placeholder(String),
    Symbol(&'static str),
}

fn tokenize(input: &str) -> BackendResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '#' || c == ':' || is_ident_char(c) {
            let start = i;
            i += 1;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if word.len() == 1 && (c == '#' || c == ':') {
                return Err(BackendError::validation(format!(
                    "Invalid expression: dangling '{}'",
                    c
                )));
            }
            tokens.push(match c {
                '#' => Token::Name(word),
                ':' => Token::Placeholder(word),
                _ => Token::Ident(word),
            });
            continue;
        }

        let next = chars.get(i + 1).copied();
        let symbol = match (c, next) {
            ('<', Some('>')) => "<>",
            ('<', Some('=')) => "<=",
            ('>', Some('=')) => ">=",
            ('<', _) => "<",
            ('>', _) => ">",
            ('=', _) => "=",
            (',', _) => ",",
            ('(', _) => "(",
            (')', _) => ")",
            ('+', _) => "+",
            ('-', _) => "-",
            _ => {
                return Err(BackendError::validation(format!(
                    "Invalid expression: unsupported character '{}'",
                    c
                )))
            }
        };
        i += symbol.len();
        tokens.push(Token::Symbol(symbol));
    }

    Ok(tokens)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Path(String),
    Value(Value),
}

impl Operand {
    fn evaluate<'a>(&'a self, item: &'a Document) -> Option<&'a Value> {
        match self {
            Operand::Path(attr) => item.get(attr),
            Operand::Value(value) => Some(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arithmetic {
    Add,
    Subtract,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    Set {
        attr: String,
        value: Operand,
        arithmetic: Option<(Arithmetic, Operand)>,
    },
    Remove {
        attr: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        left: Operand,
        comparator: Comparator,
        right: Operand,
    },
    Exists(String),
    NotExists(String),
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    names: Option<&'a Document>,
    values: Option<&'a Document>,
}

impl<'a> Parser<'a> {
    fn new(input: &str, names: Option<&'a Document>, values: Option<&'a Document>) -> BackendResult<Self> {
        Ok(Self {
            tokens: tokenize(input)?,
            pos: 0,
            names,
            values,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> BackendResult<()> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(BackendError::validation(format!(
                "Invalid expression: expected '{}'",
                symbol
            )))
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn path(&mut self) -> BackendResult<String> {
        match self.next() {
            Some(Token::Ident(word)) => Ok(word),
            Some(Token::Name(name)) => self.resolve_name(&name),
            _ => Err(BackendError::validation(
                "Invalid expression: expected an attribute name",
            )),
        }
    }

    fn operand(&mut self) -> BackendResult<Operand> {
        match self.peek() {
            Some(Token::Placeholder(placeholder)) => {
                let placeholder = placeholder.clone();
                self.pos += 1;
                Ok(Operand::Value(self.resolve_value(&placeholder)?))
            }
            _ => Ok(Operand::Path(self.path()?)),
        }
    }

    fn resolve_name(&self, name: &str) -> BackendResult<String> {
        self.names
            .and_then(|names| names.get(name))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                BackendError::validation(format!(
                    "An expression attribute name used in the document path is not defined; attribute name: {}",
                    name
                ))
            })
    }

    fn resolve_value(&self, placeholder: &str) -> BackendResult<Value> {
        self.values
            .and_then(|values| values.get(placeholder))
            .cloned()
            .ok_or_else(|| {
                BackendError::validation(format!(
                    "An expression attribute value used in expression is not defined; attribute value: {}",
                    placeholder
                ))
            })
    }
}

/// `SET a = :v, b = b + :n REMOVE c`
pub fn parse_update(
    expression: &str,
    names: Option<&Document>,
    values: Option<&Document>,
) -> BackendResult<Vec<UpdateAction>> {
    let mut parser = Parser::new(expression, names, values)?;
    let mut actions = Vec::new();

    while !parser.at_end() {
        if parser.peek_keyword("SET") {
            parser.pos += 1;
            loop {
                let attr = parser.path()?;
                parser.expect_symbol("=")?;
                let value = parser.operand()?;
                let arithmetic = if parser.eat_symbol("+") {
                    Some((Arithmetic::Add, parser.operand()?))
                } else if parser.eat_symbol("-") {
                    Some((Arithmetic::Subtract, parser.operand()?))
                } else {
                    None
                };
                actions.push(UpdateAction::Set {
                    attr,
                    value,
                    arithmetic,
                });
                if !parser.eat_symbol(",") {
                    break;
                }
            }
        } else if parser.peek_keyword("REMOVE") {
            parser.pos += 1;
            loop {
                let attr = parser.path()?;
                actions.push(UpdateAction::Remove { attr });
                if !parser.eat_symbol(",") {
                    break;
                }
            }
        } else {
            return Err(BackendError::validation(
                "Invalid UpdateExpression: only SET and REMOVE clauses are supported",
            ));
        }
    }

    if actions.is_empty() {
        return Err(BackendError::validation(
            "Invalid UpdateExpression: The expression can not be empty",
        ));
    }
    Ok(actions)
}

/// `a = :v AND attribute_exists(b)`
pub fn parse_condition(
    expression: &str,
    names: Option<&Document>,
    values: Option<&Document>,
) -> BackendResult<Vec<Condition>> {
    let mut parser = Parser::new(expression, names, values)?;
    let mut conditions = Vec::new();

    loop {
        let condition = if parser.peek_keyword("attribute_exists") {
            parser.pos += 1;
            parser.expect_symbol("(")?;
            let attr = parser.path()?;
            parser.expect_symbol(")")?;
            Condition::Exists(attr)
        } else if parser.peek_keyword("attribute_not_exists") {
            parser.pos += 1;
            parser.expect_symbol("(")?;
            let attr = parser.path()?;
            parser.expect_symbol(")")?;
            Condition::NotExists(attr)
        } else {
            let left = parser.operand()?;
            let comparator = match parser.next() {
                Some(Token::Symbol("=")) => Comparator::Eq,
                Some(Token::Symbol("<>")) => Comparator::Ne,
                Some(Token::Symbol("<")) => Comparator::Lt,
                Some(Token::Symbol("<=")) => Comparator::Le,
                Some(Token::Symbol(">")) => Comparator::Gt,
                Some(Token::Symbol(">=")) => Comparator::Ge,
                _ => {
                    return Err(BackendError::validation(
                        "Invalid condition: expected a comparison operator",
                    ))
                }
            };
            let right = parser.operand()?;
            Condition::Compare {
                left,
                comparator,
                right,
            }
        };
        conditions.push(condition);

        if parser.at_end() {
            break;
        }
        if parser.peek_keyword("AND") {
            parser.pos += 1;
        } else {
            return Err(BackendError::validation(
                "Invalid condition: only AND may join conditions",
            ));
        }
    }

    Ok(conditions)
}

/// `a, #b, c`
pub fn parse_projection(expression: &str, names: Option<&Document>) -> BackendResult<Vec<String>> {
    let mut parser = Parser::new(expression, names, None)?;
    let mut attrs = vec![parser.path()?];
    while parser.eat_symbol(",") {
        attrs.push(parser.path()?);
    }
    if !parser.at_end() {
        return Err(BackendError::validation(
            "Invalid ProjectionExpression: expected a comma-separated attribute list",
        ));
    }
    Ok(attrs)
}

pub fn apply_update(item: &mut Document, actions: &[UpdateAction]) -> BackendResult<()> {
    // 先以更新前的內容計算所有值，再一次寫入
    let snapshot = item.clone();
    for action in actions {
        match action {
            UpdateAction::Set {
                attr,
                value,
                arithmetic,
            } => {
                let base = value.evaluate(&snapshot).cloned().ok_or_else(|| {
                    BackendError::validation(
                        "The provided expression refers to an attribute that does not exist in the item",
                    )
                })?;
                let result = match arithmetic {
                    None => base,
                    Some((op, operand)) => {
                        let other = operand.evaluate(&snapshot).ok_or_else(|| {
                            BackendError::validation(
                                "The provided expression refers to an attribute that does not exist in the item",
                            )
                        })?;
                        calculate(&base, *op, other)?
                    }
                };
                item.insert(attr.clone(), result);
            }
            UpdateAction::Remove { attr } => {
                item.shift_remove(attr);
            }
        }
    }
    Ok(())
}

fn calculate(left: &Value, op: Arithmetic, right: &Value) -> BackendResult<Value> {
    let (Value::Number(a), Value::Number(b)) = (left, right) else {
        return Err(BackendError::validation(
            "An operand in the update expression has an incorrect data type",
        ));
    };

    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        let result = match op {
            Arithmetic::Add => a.checked_add(b),
            Arithmetic::Subtract => a.checked_sub(b),
        };
        if let Some(result) = result {
            return Ok(Value::Number(result.into()));
        }
    }

    let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
    let result = match op {
        Arithmetic::Add => a + b,
        Arithmetic::Subtract => a - b,
    };
    Number::from_f64(result)
        .map(Value::Number)
        .ok_or_else(|| BackendError::validation("Number overflow in update expression"))
}

pub fn matches_all(item: &Document, conditions: &[Condition]) -> bool {
    conditions.iter().all(|condition| matches(item, condition))
}

fn matches(item: &Document, condition: &Condition) -> bool {
    match condition {
        Condition::Exists(attr) => item.contains_key(attr),
        Condition::NotExists(attr) => !item.contains_key(attr),
        Condition::Compare {
            left,
            comparator,
            right,
        } => {
            let (Some(left), Some(right)) = (left.evaluate(item), right.evaluate(item)) else {
                return false;
            };
            match comparator {
                Comparator::Eq => values_equal(left, right),
                Comparator::Ne => !values_equal(left, right),
                ordering => match compare(left, right) {
                    Some(result) => match ordering {
                        Comparator::Lt => result == Ordering::Less,
                        Comparator::Le => result != Ordering::Greater,
                        Comparator::Gt => result == Ordering::Greater,
                        Comparator::Ge => result != Ordering::Less,
                        Comparator::Eq | Comparator::Ne => false,
                    },
                    None => false,
                },
            }
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_parse_set_and_remove() {
        let names = doc(json!({"#n": "name"}));
        let values = doc(json!({":n": "Bob", ":one": 1}));
        let actions = parse_update(
            "SET #n = :n, visits = visits + :one REMOVE legacy, old",
            Some(&names),
            Some(&values),
        )
        .unwrap();

        assert_eq!(actions.len(), 4);
        assert_eq!(
            actions[0],
            UpdateAction::Set {
                attr: "name".to_string(),
                value: Operand::Value(json!("Bob")),
                arithmetic: None,
            }
        );
        assert_eq!(
            actions[3],
            UpdateAction::Remove {
                attr: "old".to_string()
            }
        );
    }

    #[test]
    fn test_apply_update() {
        let values = doc(json!({":one": 1, ":tag": "new"}));
        let actions = parse_update(
            "SET visits = visits + :one, tag = :tag REMOVE legacy",
            None,
            Some(&values),
        )
        .unwrap();

        let mut item = doc(json!({"id": "1", "visits": 41, "legacy": true}));
        apply_update(&mut item, &actions).unwrap();
        assert_eq!(Value::Object(item), json!({"id": "1", "visits": 42, "tag": "new"}));
    }

    #[test]
    fn test_update_on_missing_attribute_fails() {
        let values = doc(json!({":one": 1}));
        let actions = parse_update("SET visits = visits + :one", None, Some(&values)).unwrap();
        let mut item = doc(json!({"id": "1"}));
        assert!(apply_update(&mut item, &actions).is_err());
    }

    #[test]
    fn test_undefined_placeholders_are_rejected() {
        assert!(parse_update("SET a = :missing", None, None).is_err());
        assert!(parse_update("SET #a = b", None, None).is_err());
        assert!(parse_update("ADD a :v", None, None).is_err());
        assert!(parse_update("", None, None).is_err());
        assert!(parse_update("SET a.b = c", None, None).is_err());
    }

    #[test]
    fn test_conditions() {
        let values = doc(json!({":min": 10, ":kind": "book"}));
        let conditions = parse_condition(
            "price >= :min AND kind = :kind AND attribute_not_exists(deleted)",
            None,
            Some(&values),
        )
        .unwrap();

        assert!(matches_all(&doc(json!({"price": 10.0, "kind": "book"})), &conditions));
        assert!(!matches_all(&doc(json!({"price": 9, "kind": "book"})), &conditions));
        assert!(!matches_all(
            &doc(json!({"price": 12, "kind": "book", "deleted": true})),
            &conditions
        ));
        assert!(!matches_all(&doc(json!({"kind": "book"})), &conditions));
    }

    #[test]
    fn test_condition_rejects_or() {
        let values = doc(json!({":a": 1, ":b": 2}));
        assert!(parse_condition("x = :a OR x = :b", None, Some(&values)).is_err());
    }

    #[test]
    fn test_projection() {
        let names = doc(json!({"#s": "status"}));
        assert_eq!(
            parse_projection("id, #s", Some(&names)).unwrap(),
            vec!["id".to_string(), "status".to_string()]
        );
        assert!(parse_projection("id id", None).is_err());
    }
}
