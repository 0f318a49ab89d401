//! Declarative comparisons over daily metrics.
//!
//! Reward rules use flat [`Condition`]s (`metric OP threshold`, all must hold).
//! The feature catalogue loaded from CSV uses [`ConditionExpr`], which adds
//! `and`, `or` and parentheses on top of the same comparisons.

use std::fmt;
use std::io::Read;
use std::str::FromStr;

use serde::Deserialize;

use super::domain::{DailyMetrics, MetricKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Le,
    Ge,
    Lt,
    Gt,
    Eq,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Le => "<=",
            Comparison::Ge => ">=",
            Comparison::Lt => "<",
            Comparison::Gt => ">",
            Comparison::Eq => "==",
        }
    }

    pub fn holds(&self, value: u32, threshold: u32) -> bool {
        match self {
            Comparison::Le => value <= threshold,
            Comparison::Ge => value >= threshold,
            Comparison::Lt => value < threshold,
            Comparison::Gt => value > threshold,
            Comparison::Eq => value == threshold,
        }
    }

    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "<=" => Some(Comparison::Le),
            ">=" => Some(Comparison::Ge),
            "<" => Some(Comparison::Lt),
            ">" => Some(Comparison::Gt),
            "==" => Some(Comparison::Eq),
            _ => None,
        }
    }
}

/// A single `metric OP threshold` comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    pub metric: MetricKey,
    pub comparison: Comparison,
    pub threshold: u32,
}

impl Condition {
    pub fn holds(&self, metrics: &DailyMetrics) -> bool {
        self.comparison
            .holds(metrics.value(self.metric), self.threshold)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.metric,
            self.comparison.symbol(),
            self.threshold
        )
    }
}

impl FromStr for Condition {
    type Err = ConditionParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(raw)?;
        let mut parser = Parser::new(&tokens);
        let condition = parser.comparison()?;
        parser.finish()?;
        Ok(condition)
    }
}

/// Boolean expression tree over comparisons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionExpr {
    Compare(Condition),
    All(Vec<ConditionExpr>),
    Any(Vec<ConditionExpr>),
}

impl ConditionExpr {
    pub fn holds(&self, metrics: &DailyMetrics) -> bool {
        match self {
            ConditionExpr::Compare(condition) => condition.holds(metrics),
            ConditionExpr::All(children) => children.iter().all(|child| child.holds(metrics)),
            ConditionExpr::Any(children) => children.iter().any(|child| child.holds(metrics)),
        }
    }
}

impl FromStr for ConditionExpr {
    type Err = ConditionParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(raw)?;
        let mut parser = Parser::new(&tokens);
        let expr = parser.disjunction()?;
        parser.finish()?;
        Ok(expr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionParseError {
    #[error("condition is empty")]
    Empty,
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("unexpected end of condition")]
    UnexpectedEnd,
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("unknown metric '{0}'")]
    UnknownMetric(String),
    #[error("threshold '{0}' is not a non-negative integer")]
    InvalidThreshold(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Number(String),
    Operator(Comparison),
    Open,
    Close,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(word) | Token::Number(word) => f.write_str(word),
            Token::Operator(op) => f.write_str(op.symbol()),
            Token::Open => f.write_str("("),
            Token::Close => f.write_str(")"),
        }
    }
}

fn tokenize(raw: &str) -> Result<Vec<Token>, ConditionParseError> {
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
        } else if ch == '(' {
            chars.next();
            tokens.push(Token::Open);
        } else if ch == ')' {
            chars.next();
            tokens.push(Token::Close);
        } else if matches!(ch, '<' | '>' | '=') {
            chars.next();
            let mut symbol = ch.to_string();
            if chars.peek() == Some(&'=') {
                chars.next();
                symbol.push('=');
            }
            let op = Comparison::from_symbol(&symbol)
                .ok_or(ConditionParseError::UnexpectedCharacter(ch))?;
            tokens.push(Token::Operator(op));
        } else if ch.is_ascii_digit() || ch == '-' {
            let mut number = String::new();
            while let Some(&next) = chars.peek() {
                if next.is_ascii_alphanumeric() || next == '-' || next == '.' {
                    number.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Number(number));
        } else if ch.is_ascii_alphabetic() || ch == '_' {
            let mut word = String::new();
            while let Some(&next) = chars.peek() {
                if next.is_ascii_alphanumeric() || next == '_' {
                    word.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Word(word));
        } else {
            return Err(ConditionParseError::UnexpectedCharacter(ch));
        }
    }

    if tokens.is_empty() {
        return Err(ConditionParseError::Empty);
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Result<&'a Token, ConditionParseError> {
        let token = self
            .tokens
            .get(self.position)
            .ok_or(ConditionParseError::UnexpectedEnd)?;
        self.position += 1;
        Ok(token)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn finish(&self) -> Result<(), ConditionParseError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(ConditionParseError::UnexpectedToken(token.to_string())),
        }
    }

    fn disjunction(&mut self) -> Result<ConditionExpr, ConditionParseError> {
        let mut branches = vec![self.conjunction()?];
        while self.at_keyword("or") {
            self.position += 1;
            branches.push(self.conjunction()?);
        }
        Ok(collapse(branches, ConditionExpr::Any))
    }

    fn conjunction(&mut self) -> Result<ConditionExpr, ConditionParseError> {
        let mut terms = vec![self.factor()?];
        while self.at_keyword("and") {
            self.position += 1;
            terms.push(self.factor()?);
        }
        Ok(collapse(terms, ConditionExpr::All))
    }

    fn factor(&mut self) -> Result<ConditionExpr, ConditionParseError> {
        if matches!(self.peek(), Some(Token::Open)) {
            self.position += 1;
            let inner = self.disjunction()?;
            return match self.next()? {
                Token::Close => Ok(inner),
                other => Err(ConditionParseError::UnexpectedToken(other.to_string())),
            };
        }
        self.comparison().map(ConditionExpr::Compare)
    }

    fn comparison(&mut self) -> Result<Condition, ConditionParseError> {
        let metric = match self.next()? {
            Token::Word(name) => name
                .parse::<MetricKey>()
                .map_err(|_| ConditionParseError::UnknownMetric(name.clone()))?,
            other => return Err(ConditionParseError::UnexpectedToken(other.to_string())),
        };
        let comparison = match self.next()? {
            Token::Operator(op) => *op,
            other => return Err(ConditionParseError::UnexpectedToken(other.to_string())),
        };
        let threshold = match self.next()? {
            Token::Number(raw) => raw
                .parse::<u32>()
                .map_err(|_| ConditionParseError::InvalidThreshold(raw.clone()))?,
            other => return Err(ConditionParseError::UnexpectedToken(other.to_string())),
        };

        Ok(Condition {
            metric,
            comparison,
            threshold,
        })
    }
}

fn collapse(
    mut items: Vec<ConditionExpr>,
    wrap: fn(Vec<ConditionExpr>) -> ConditionExpr,
) -> ConditionExpr {
    if items.len() == 1 {
        items.remove(0)
    } else {
        wrap(items)
    }
}

/// One row of the feature-condition catalogue.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCondition {
    pub source: String,
    pub expression: ConditionExpr,
}

/// Ordered catalogue whose evaluated flags feed the scorer as `condition_<i>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureConditions {
    conditions: Vec<FeatureCondition>,
}

#[derive(Debug, thiserror::Error)]
pub enum FeatureConditionError {
    #[error("failed to read feature conditions: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid feature condition CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("feature condition row {row} ('{source_text}'): {source}")]
    Parse {
        row: usize,
        source_text: String,
        #[source]
        source: ConditionParseError,
    },
}

/// Only the expression is read; the catalogue's training columns
/// (`label`, `probability`) are ignored.
#[derive(Debug, Deserialize)]
struct ConditionRow {
    condition: String,
}

impl FeatureConditions {
    pub fn new(conditions: Vec<FeatureCondition>) -> Self {
        Self { conditions }
    }

    pub fn from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self, FeatureConditionError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, FeatureConditionError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut conditions = Vec::new();

        for (index, record) in csv_reader.deserialize::<ConditionRow>().enumerate() {
            let row = record?;
            let expression = row.condition.parse::<ConditionExpr>().map_err(|source| {
                FeatureConditionError::Parse {
                    row: index + 1,
                    source_text: row.condition.clone(),
                    source,
                }
            })?;
            conditions.push(FeatureCondition {
                source: row.condition,
                expression,
            });
        }

        Ok(Self { conditions })
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureCondition> {
        self.conditions.iter()
    }

    pub fn feature_name(index: usize) -> String {
        format!("condition_{index}")
    }
}
