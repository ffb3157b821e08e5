//! Readiness gate over the feed's five inputs.

use crate::models::{CapturedNotification, FilterRule, IgnoredApp, Scope};

/// One complete set of feed inputs. `raw` always belongs to `scope`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedInputs {
    pub raw: Vec<CapturedNotification>,
    pub ignored: Vec<IgnoredApp>,
    pub rules: Vec<FilterRule>,
    pub query: Option<String>,
    pub scope: Scope,
}

#[derive(Debug, Clone)]
pub enum InputChange {
    /// Rows loaded for `scope`; dropped if the scope has moved on since
    Raw {
        scope: Scope,
        rows: Vec<CapturedNotification>,
    },
    Ignored(Vec<IgnoredApp>),
    Rules(Vec<FilterRule>),
    Query(Option<String>),
    Scope(Scope),
}

#[derive(Debug, Default)]
pub struct PartialInputs {
    raw: Option<Vec<CapturedNotification>>,
    ignored: Option<Vec<IgnoredApp>>,
    rules: Option<Vec<FilterRule>>,
    query: Option<Option<String>>,
    scope: Option<Scope>,
}

impl PartialInputs {
    fn apply(&mut self, change: InputChange) {
        match change {
            InputChange::Raw { scope, rows } => {
                if self.scope.as_ref() == Some(&scope) {
                    self.raw = Some(rows);
                }
            }
            InputChange::Ignored(ignored) => self.ignored = Some(ignored),
            InputChange::Rules(rules) => self.rules = Some(rules),
            InputChange::Query(query) => self.query = Some(query),
            InputChange::Scope(scope) => {
                if self.scope.as_ref() != Some(&scope) {
                    self.raw = None;
                }
                self.scope = Some(scope);
            }
        }
    }

    fn is_complete(&self) -> bool {
        self.raw.is_some()
            && self.ignored.is_some()
            && self.rules.is_some()
            && self.query.is_some()
            && self.scope.is_some()
    }

    fn take_complete(&mut self) -> Option<FeedInputs> {
        if !self.is_complete() {
            return None;
        }
        let partial = std::mem::take(self);
        Some(FeedInputs {
            raw: partial.raw?,
            ignored: partial.ignored?,
            rules: partial.rules?,
            query: partial.query?,
            scope: partial.scope?,
        })
    }
}

/// Holds the latest value of every input and only exposes them once each
/// one has been seen.
///
/// A scope change invalidates the raw rows (they were loaded for the old
/// scope) and closes the gate again until rows for the new scope arrive.
#[derive(Debug)]
pub enum CombineLatest {
    Waiting(PartialInputs),
    Ready(FeedInputs),
}

impl Default for CombineLatest {
    fn default() -> Self {
        Self::new()
    }
}

impl CombineLatest {
    pub fn new() -> Self {
        Self::Waiting(PartialInputs::default())
    }

    /// Apply a change; returns the full input set when the gate is open.
    pub fn apply(&mut self, change: InputChange) -> Option<&FeedInputs> {
        match self {
            Self::Ready(inputs) => match change {
                InputChange::Scope(scope) if scope != inputs.scope => {
                    let FeedInputs {
                        ignored,
                        rules,
                        query,
                        ..
                    } = std::mem::take(inputs);
                    *self = Self::Waiting(PartialInputs {
                        raw: None,
                        ignored: Some(ignored),
                        rules: Some(rules),
                        query: Some(query),
                        scope: Some(scope),
                    });
                }
                InputChange::Raw { scope, rows } => {
                    if scope == inputs.scope {
                        inputs.raw = rows;
                    }
                }
                InputChange::Ignored(ignored) => inputs.ignored = ignored,
                InputChange::Rules(rules) => inputs.rules = rules,
                InputChange::Query(query) => inputs.query = query,
                InputChange::Scope(_) => {}
            },
            Self::Waiting(partial) => {
                partial.apply(change);
                if let Some(inputs) = partial.take_complete() {
                    *self = Self::Ready(inputs);
                }
            }
        }
        self.inputs()
    }

    pub fn inputs(&self) -> Option<&FeedInputs> {
        match self {
            Self::Ready(inputs) => Some(inputs),
            Self::Waiting(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Scope of the latest inputs, whether or not the gate is open.
    pub fn scope(&self) -> Option<&Scope> {
        match self {
            Self::Ready(inputs) => Some(&inputs.scope),
            Self::Waiting(partial) => partial.scope.as_ref(),
        }
    }
}
