// docstore-core/src/query.rs
// Query compilation: a query document is turned into a predicate tree once,
// then evaluated against every candidate document.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};

use crate::config::ClientConfig;
use crate::document::Document;
use crate::error::{DocStoreError, Result};
use crate::value::{Map, Value, NULL};

/// Field-level operators
#[derive(Debug, Clone)]
pub enum Condition {
    Eq(Value),          // $eq
    Ne(Value),          // $ne
    Gt(Value),          // $gt
    Gte(Value),         // $gte
    Lt(Value),          // $lt
    Lte(Value),         // $lte
    In(Vec<Value>),     // $in
    Nin(Vec<Value>),    // $nin
    Exists(bool),       // $exists
    Regex(Regex),       // $regex (+ $options)
    Not(Vec<Condition>), // $not
}

/// Compiled predicate tree
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Matches every document (`{}`)
    All,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Nor(Vec<Predicate>),
    /// All conditions must hold for the value at `path`
    Field { path: String, conditions: Vec<Condition> },
}

/// A compiled query.
#[derive(Debug, Clone)]
pub struct Query {
    predicate: Predicate,
}

impl Query {
    /// Query matching every document.
    pub fn all() -> Self {
        Query { predicate: Predicate::All }
    }

    /// Compile with default limits.
    pub fn parse(query: &Value) -> Result<Self> {
        Self::compile(query, &ClientConfig::default())
    }

    /// Compile a query document.
    pub fn compile(query: &Value, config: &ClientConfig) -> Result<Self> {
        let compiler = Compiler {
            regex_size_limit: config.regex_size_limit,
        };
        let map = query.as_document().ok_or_else(|| {
            DocStoreError::InvalidQuery(format!("query must be a document, got {}", query.type_name()))
        })?;
        Ok(Query {
            predicate: compiler.compile_document(map)?,
        })
    }

    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        Self::parse(&Value::from(json.clone()))
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Does the document match?
    pub fn matches(&self, document: &Document) -> bool {
        self.predicate.matches(document)
    }
}

impl Default for Query {
    fn default() -> Self {
        Self::all()
    }
}

struct Compiler {
    regex_size_limit: usize,
}

impl Compiler {
    fn compile_document(&self, map: &Map) -> Result<Predicate> {
        let mut terms = Vec::with_capacity(map.len());

        for (field, condition) in map {
            if field.starts_with('$') {
                terms.push(self.compile_logical(field, condition)?);
            } else {
                terms.push(Predicate::Field {
                    path: field.clone(),
                    conditions: self.compile_conditions(field, condition)?,
                });
            }
        }

        Ok(match terms.len() {
            0 => Predicate::All,
            1 => terms.remove(0),
            _ => Predicate::And(terms),
        })
    }

    fn compile_logical(&self, op: &str, operand: &Value) -> Result<Predicate> {
        let subqueries = || -> Result<Vec<Predicate>> {
            let arr = operand
                .as_array()
                .ok_or_else(|| DocStoreError::InvalidQuery(format!("{} requires an array", op)))?;
            arr.iter()
                .map(|item| {
                    item.as_document()
                        .ok_or_else(|| {
                            DocStoreError::InvalidQuery(format!("{} entries must be documents", op))
                        })
                        .and_then(|map| self.compile_document(map))
                })
                .collect()
        };

        match op {
            "$and" => Ok(Predicate::And(subqueries()?)),
            "$or" => Ok(Predicate::Or(subqueries()?)),
            "$nor" => Ok(Predicate::Nor(subqueries()?)),
            _ => Err(DocStoreError::InvalidQuery(format!("Unknown logical operator: {}", op))),
        }
    }

    /// A condition is either an operator document or a literal compared for equality.
    fn compile_conditions(&self, field: &str, condition: &Value) -> Result<Vec<Condition>> {
        match condition {
            Value::Document(map) if map.keys().any(|k| k.starts_with('$')) => {
                if let Some(plain) = map.keys().find(|k| !k.starts_with('$')) {
                    return Err(DocStoreError::InvalidQuery(format!(
                        "cannot mix operators and plain field '{}' in condition on '{}'",
                        plain, field
                    )));
                }
                self.compile_operators(map)
            }
            literal => Ok(vec![Condition::Eq(literal.clone())]),
        }
    }

    fn compile_operators(&self, map: &Map) -> Result<Vec<Condition>> {
        let options = match map.get("$options") {
            None => None,
            Some(Value::String(opts)) if map.contains_key("$regex") => Some(opts.as_str()),
            Some(Value::String(_)) => {
                return Err(DocStoreError::InvalidQuery("$options requires $regex".into()))
            }
            Some(_) => return Err(DocStoreError::InvalidQuery("$options requires a string".into())),
        };

        let mut conditions = Vec::with_capacity(map.len());
        for (op, operand) in map {
            let condition = match op.as_str() {
                "$eq" => Condition::Eq(operand.clone()),
                "$ne" => Condition::Ne(operand.clone()),
                "$gt" => Condition::Gt(operand.clone()),
                "$gte" => Condition::Gte(operand.clone()),
                "$lt" => Condition::Lt(operand.clone()),
                "$lte" => Condition::Lte(operand.clone()),
                "$in" => Condition::In(Self::array_operand(op, operand)?),
                "$nin" => Condition::Nin(Self::array_operand(op, operand)?),
                "$exists" => match operand {
                    Value::Bool(b) => Condition::Exists(*b),
                    _ => return Err(DocStoreError::InvalidQuery("$exists requires bool".into())),
                },
                "$regex" => match operand {
                    Value::String(pattern) => Condition::Regex(self.build_regex(pattern, options)?),
                    _ => return Err(DocStoreError::InvalidQuery("$regex requires string".into())),
                },
                "$options" => continue,
                "$not" => match operand {
                    Value::Document(inner) if !inner.is_empty() && inner.keys().all(|k| k.starts_with('$')) => {
                        Condition::Not(self.compile_operators(inner)?)
                    }
                    _ => {
                        return Err(DocStoreError::InvalidQuery(
                            "$not requires an operator document".into(),
                        ))
                    }
                },
                _ => return Err(DocStoreError::InvalidQuery(format!("Unknown operator: {}", op))),
            };
            conditions.push(condition);
        }

        Ok(conditions)
    }

    fn array_operand(op: &str, operand: &Value) -> Result<Vec<Value>> {
        operand
            .as_array()
            .cloned()
            .ok_or_else(|| DocStoreError::InvalidQuery(format!("{} requires array", op)))
    }

    /// The pattern must match the whole string. It is validated on its own
    /// before anchoring, so it cannot break out of the wrapping group.
    fn build_regex(&self, pattern: &str, options: Option<&str>) -> Result<Regex> {
        self.regex_builder(pattern, options)?
            .build()
            .map_err(|e| DocStoreError::InvalidQuery(format!("invalid regex '{}': {}", pattern, e)))?;

        // Under `x` a trailing comment would swallow the closing anchor; scope
        // the flag to the user's pattern and end it with a newline.
        let options = options.unwrap_or_default();
        let anchored = if options.contains('x') {
            format!("\\A(?x:{}\n)\\z", pattern)
        } else {
            format!(r"\A(?:{})\z", pattern)
        };
        let outer: String = options.chars().filter(|c| *c != 'x').collect();
        self.regex_builder(&anchored, Some(&outer))?
            .build()
            .map_err(|e| DocStoreError::InvalidQuery(format!("invalid regex '{}': {}", pattern, e)))
    }

    fn regex_builder(&self, pattern: &str, options: Option<&str>) -> Result<RegexBuilder> {
        let mut builder = RegexBuilder::new(pattern);
        builder.size_limit(self.regex_size_limit);

        for flag in options.unwrap_or_default().chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                other => {
                    return Err(DocStoreError::InvalidQuery(format!("Unknown regex option: {}", other)))
                }
            };
        }
        Ok(builder)
    }
}

impl Predicate {
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Predicate::All => true,
            Predicate::And(terms) => terms.iter().all(|p| p.matches(document)),
            Predicate::Or(terms) => terms.iter().any(|p| p.matches(document)),
            Predicate::Nor(terms) => !terms.iter().any(|p| p.matches(document)),
            Predicate::Field { path, conditions } => {
                let value = document.get_path(path);
                conditions.iter().all(|c| c.matches(value))
            }
        }
    }
}

impl Condition {
    /// `value` is `None` when the field is absent; absent fields compare as `Null`.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let current = value.unwrap_or(&NULL);
        match self {
            Condition::Eq(target) => current == target,
            Condition::Ne(target) => current != target,
            Condition::Gt(target) => current.compare(target) == Some(Ordering::Greater),
            Condition::Gte(target) => {
                matches!(current.compare(target), Some(Ordering::Greater | Ordering::Equal))
            }
            Condition::Lt(target) => current.compare(target) == Some(Ordering::Less),
            Condition::Lte(target) => {
                matches!(current.compare(target), Some(Ordering::Less | Ordering::Equal))
            }
            Condition::In(targets) => targets.contains(current),
            Condition::Nin(targets) => !targets.contains(current),
            Condition::Exists(should_exist) => value.is_some() == *should_exist,
            Condition::Regex(re) => current.as_str().map_or(false, |s| re.is_match(s)),
            Condition::Not(inner) => !inner.iter().all(|c| c.matches(value)),
        }
    }
}
