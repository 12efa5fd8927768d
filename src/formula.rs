use std::collections::HashMap;
use std::fmt;

use log::{debug, info};

use crate::error::FormulaResult;
use crate::evaluate::{ArithmeticMode, VariableStore};
use crate::expression::Expression;
use crate::lex::tokenize;
use crate::postfix::to_postfix;
use crate::token::Token;
use crate::tree::build;
use crate::validate::{check_variables, validate};

/// A validated formula, ready to be evaluated any number of times.
#[derive(Clone, Debug, PartialEq)]
pub struct Formula {
    root: Expression,
}

impl Formula {
    /// Runs the whole pipeline on `text`: lexing, grammar validation, the
    /// variable whitelist check against `declared`, postfix conversion and tree
    /// construction.
    pub fn parse<S: AsRef<str>>(text: &str, declared: &[S]) -> FormulaResult<Self> {
        let result = Self::check_tokens(text, declared)
            .map(to_postfix)
            .and_then(build)
            .map(|root| Self { root });
        match &result {
            Ok(formula) => debug!("Accepted formula {text:?} as {formula}"),
            Err(e) => debug!("Rejected formula {text:?}: {e}"),
        }
        result
    }

    /// Validates `text` without building a tree.
    pub fn check<S: AsRef<str>>(text: &str, declared: &[S]) -> FormulaResult<()> {
        Self::check_tokens(text, declared).map(|_| ())
    }

    fn check_tokens<S: AsRef<str>>(text: &str, declared: &[S]) -> FormulaResult<Vec<Token>> {
        check_variables(validate(tokenize(text)?)?, declared)
    }

    pub fn expression(&self) -> &Expression {
        &self.root
    }

    pub fn into_expression(self) -> Expression {
        self.root
    }

    pub fn evaluate<S: VariableStore + ?Sized>(
        &self,
        store: &mut S,
        mode: ArithmeticMode,
    ) -> FormulaResult<f64> {
        self.root.evaluate(store, mode)
    }

    /// Same as [`Formula::evaluate`], truncated toward zero.
    pub fn evaluate_int<S: VariableStore + ?Sized>(
        &self,
        store: &mut S,
        mode: ArithmeticMode,
    ) -> FormulaResult<i64> {
        Ok(self.evaluate(store, mode)? as i64)
    }
}

impl From<Expression> for Formula {
    fn from(root: Expression) -> Self {
        Self { root }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.root, f)
    }
}

/// A variable store, an arithmetic mode and the formula they apply to.
#[derive(Clone, Debug, Default)]
pub struct Session {
    variables: HashMap<String, f64>,
    mode: ArithmeticMode,
    formula: Option<Formula>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_formula(formula: Formula, variables: HashMap<String, f64>) -> Self {
        Self {
            variables,
            mode: ArithmeticMode::default(),
            formula: Some(formula),
        }
    }

    pub fn vars(&self) -> &HashMap<String, f64> {
        &self.variables
    }

    pub fn vars_mut(&mut self) -> &mut HashMap<String, f64> {
        &mut self.variables
    }

    pub fn put_var(&mut self, name: impl Into<String>, value: f64) {
        self.variables.insert(name.into(), value);
    }

    pub fn get_var(&self, name: &str) -> Option<f64> {
        self.variables.get(name).copied()
    }

    pub fn mode(&self) -> ArithmeticMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ArithmeticMode) {
        match mode {
            ArithmeticMode::Safe => info!("Operations causing numeric faults will return 0"),
            ArithmeticMode::Strict => info!("Operations causing numeric faults will propagate"),
        }
        self.mode = mode;
    }

    /// Replaces the current formula. On error the previous formula is kept.
    pub fn set_formula<S: AsRef<str>>(&mut self, text: &str, declared: &[S]) -> FormulaResult<()> {
        self.formula = Some(Formula::parse(text, declared)?);
        Ok(())
    }

    pub fn check_formula<S: AsRef<str>>(&self, text: &str, declared: &[S]) -> FormulaResult<()> {
        Formula::check(text, declared)
    }

    pub fn formula(&self) -> Option<&Formula> {
        self.formula.as_ref()
    }

    /// Evaluates the current formula, or returns `None` when none is set.
    pub fn calc_value(&mut self) -> Option<FormulaResult<f64>> {
        let formula = self.formula.as_ref()?;
        Some(formula.evaluate(&mut self.variables, self.mode))
    }

    pub fn calc_value_int(&mut self) -> Option<FormulaResult<i64>> {
        let formula = self.formula.as_ref()?;
        Some(formula.evaluate_int(&mut self.variables, self.mode))
    }

    /// The rendered formula, or `"null"` when none is set.
    pub fn formula_text(&self) -> String {
        match &self.formula {
            Some(formula) => formula.to_string(),
            None => "null".to_string(),
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bindings: Vec<_> = self.variables.iter().collect();
        bindings.sort_by(|a, b| a.0.cmp(b.0));
        writeln!(f, "{}", self.formula_text())?;
        let bindings: Vec<String> = bindings
            .into_iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        write!(f, "[{}]", bindings.join(", "))
    }
}
