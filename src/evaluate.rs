use std::collections::{BTreeMap, HashMap};

use rand::Rng;

use crate::error::{FormulaError, FormulaResult};
use crate::expression::{AggregateOp, BinaryOp, Expression, UnaryOp};

/// Two values closer than this compare equal.
pub const COMPARISON_TOLERANCE: f64 = 1e-5;

/// How numeric domain faults are reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ArithmeticMode {
    /// Division by zero, out-of-domain arguments and `NaN` results become `0`.
    #[default]
    Safe,
    /// Faults propagate as `NaN` or infinite results.
    Strict,
}

impl ArithmeticMode {
    pub fn is_strict(self) -> bool {
        self == Self::Strict
    }
}

/// Name-to-value storage that evaluation reads and aggregates write.
pub trait VariableStore {
    fn get(&self, name: &str) -> Option<f64>;
    fn set(&mut self, name: &str, value: f64);
    fn remove(&mut self, name: &str) -> Option<f64>;
}

impl VariableStore for HashMap<String, f64> {
    fn get(&self, name: &str) -> Option<f64> {
        HashMap::get(self, name).copied()
    }

    fn set(&mut self, name: &str, value: f64) {
        self.insert(name.to_string(), value);
    }

    fn remove(&mut self, name: &str) -> Option<f64> {
        HashMap::remove(self, name)
    }
}

impl VariableStore for BTreeMap<String, f64> {
    fn get(&self, name: &str) -> Option<f64> {
        BTreeMap::get(self, name).copied()
    }

    fn set(&mut self, name: &str, value: f64) {
        self.insert(name.to_string(), value);
    }

    fn remove(&mut self, name: &str) -> Option<f64> {
        BTreeMap::remove(self, name)
    }
}

impl Expression {
    /// Evaluates without any variables. Only literals and reserved names resolve.
    pub fn evaluate_without_vars(&self, mode: ArithmeticMode) -> FormulaResult<f64> {
        self.evaluate(&mut HashMap::<String, f64>::new(), mode)
    }

    /// Calculates the value of the expression.
    ///
    /// Children are evaluated depth-first, left to right. Aggregates bind their
    /// counter in `store` while their body is evaluated and restore whatever
    /// the name held before, even when evaluation fails.
    pub fn evaluate<S: VariableStore + ?Sized>(
        &self,
        store: &mut S,
        mode: ArithmeticMode,
    ) -> FormulaResult<f64> {
        match self {
            Self::Literal(value) => Ok(*value),
            Self::Variable(name) => resolve(name, store),
            Self::Unary(op, only) => {
                let only = only.evaluate(store, mode)?;
                Ok(guard(evaluate_unary(*op, only, mode), mode))
            }
            Self::Binary(op, lhs, rhs) => {
                let lhs = lhs.evaluate(store, mode)?;
                let rhs = rhs.evaluate(store, mode)?;
                Ok(guard(evaluate_binary(*op, lhs, rhs, mode), mode))
            }
            Self::Aggregate {
                op,
                variable,
                limit,
                body,
            } => {
                let limit = limit.evaluate(store, mode)?.floor();
                let previous = store.get(variable);
                let result = accumulate(*op, variable, limit, body, store, mode);
                match previous {
                    Some(value) => store.set(variable, value),
                    None => {
                        store.remove(variable);
                    }
                }
                result
            }
        }
    }
}

fn resolve<S: VariableStore + ?Sized>(name: &str, store: &S) -> FormulaResult<f64> {
    if name == "r" {
        return Ok(rand::thread_rng().gen::<f64>());
    }
    if name.eq_ignore_ascii_case("pi") {
        return Ok(std::f64::consts::PI);
    }
    if name.eq_ignore_ascii_case("e") {
        return Ok(std::f64::consts::E);
    }
    store
        .get(name)
        .ok_or_else(|| FormulaError::UnknownVariable(name.to_string()))
}

fn accumulate<S: VariableStore + ?Sized>(
    op: AggregateOp,
    variable: &str,
    limit: f64,
    body: &Expression,
    store: &mut S,
    mode: ArithmeticMode,
) -> FormulaResult<f64> {
    let mut result = match op {
        AggregateOp::Sum => 0.0,
        AggregateOp::Product => 1.0,
    };
    // Saturating cast: NaN and negative limits run zero iterations.
    let count = limit as u64;
    for counter in 1..=count {
        store.set(variable, counter as f64);
        let value = body.evaluate(store, mode)?;
        match op {
            AggregateOp::Sum => result += value,
            AggregateOp::Product => result *= value,
        }
    }
    Ok(result)
}

/// In safe mode, anything that still came out as `NaN` becomes `0`.
fn guard(value: f64, mode: ArithmeticMode) -> f64 {
    if value.is_nan() && !mode.is_strict() {
        0.0
    } else {
        value
    }
}

fn evaluate_unary(op: UnaryOp, only: f64, mode: ArithmeticMode) -> f64 {
    let safe = !mode.is_strict();
    match op {
        UnaryOp::Negate => -only,
        UnaryOp::Sqrt if safe && only < 0.0 => 0.0,
        UnaryOp::Sqrt => only.sqrt(),
        UnaryOp::Log10 | UnaryOp::Ln if safe && only <= 0.0 => 0.0,
        UnaryOp::Log10 => only.log10(),
        UnaryOp::Ln => only.ln(),
        UnaryOp::Sin => only.sin(),
        UnaryOp::Cos => only.cos(),
        UnaryOp::Tan if safe && only.cos() == 0.0 => 0.0,
        UnaryOp::Tan => only.tan(),
        UnaryOp::Sinh => only.sinh(),
        UnaryOp::Cosh => only.cosh(),
        UnaryOp::Tanh => only.tanh(),
        UnaryOp::Asin | UnaryOp::Acos if safe && only.abs() > 1.0 => 0.0,
        UnaryOp::Asin => only.asin(),
        UnaryOp::Acos => only.acos(),
        UnaryOp::Atan => only.atan(),
        UnaryOp::Abs => only.abs(),
        UnaryOp::Ceil => only.ceil(),
        UnaryOp::Floor => only.floor(),
        UnaryOp::Factorial if safe && !(0.0..=MAX_SAFE_FACTORIAL).contains(&only) => 0.0,
        UnaryOp::Factorial => factorial(only),
    }
}

/// Largest factorial operand accepted in safe mode.
const MAX_SAFE_FACTORIAL: f64 = 12.0;

/// `floor(x)!`, with `1` for anything below 2.
///
/// Stops as soon as the product overflows, so huge operands cannot spin on a
/// factor that no longer decreases.
fn factorial(only: f64) -> f64 {
    if only.is_nan() {
        return only;
    }
    let mut result: f64 = 1.0;
    let mut factor = only.floor();
    while factor > 1.0 && result.is_finite() {
        result *= factor;
        factor -= 1.0;
    }
    result
}

fn evaluate_binary(op: BinaryOp, lhs: f64, rhs: f64, mode: ArithmeticMode) -> f64 {
    let safe = !mode.is_strict();
    match op {
        BinaryOp::Add => lhs + rhs,
        BinaryOp::Sub => lhs - rhs,
        BinaryOp::Mul => lhs * rhs,
        BinaryOp::Div | BinaryOp::Rem if safe && rhs == 0.0 => 0.0,
        BinaryOp::Div => lhs / rhs,
        // Result takes the sign of the divisor.
        BinaryOp::Rem => ((lhs % rhs) + rhs) % rhs,
        BinaryOp::Pow => lhs.powf(rhs),
        BinaryOp::Equal => truth((lhs - rhs).abs() < COMPARISON_TOLERANCE),
        BinaryOp::NotEqual => truth((lhs - rhs).abs() > COMPARISON_TOLERANCE),
        BinaryOp::Greater => truth((lhs - rhs).abs() > COMPARISON_TOLERANCE && lhs > rhs),
        BinaryOp::Less => truth((lhs - rhs).abs() > COMPARISON_TOLERANCE && lhs < rhs),
    }
}

fn truth(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::tokenize;
    use crate::postfix::to_postfix;
    use crate::tree::build;
    use crate::validate::validate;

    fn parse(text: &str) -> Expression {
        build(to_postfix(validate(tokenize(text).unwrap()).unwrap())).unwrap()
    }

    fn safe(text: &str) -> f64 {
        parse(text)
            .evaluate_without_vars(ArithmeticMode::Safe)
            .unwrap()
    }

    fn strict(text: &str) -> f64 {
        parse(text)
            .evaluate_without_vars(ArithmeticMode::Strict)
            .unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-12, "{actual} != {expected}");
    }

    fn vars(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn hand_built_reference_tree() {
        let expr = Expression::binary(
            BinaryOp::Mul,
            Expression::binary(
                BinaryOp::Add,
                Expression::literal(3.0),
                Expression::variable("x"),
            ),
            Expression::binary(
                BinaryOp::Pow,
                Expression::literal(5.0),
                Expression::unary(
                    UnaryOp::Negate,
                    Expression::unary(UnaryOp::Log10, Expression::variable("y")),
                ),
            ),
        );
        let mut store = vars(&[("x", 5.0), ("y", 1.0)]);
        assert_eq!(expr.evaluate(&mut store, ArithmeticMode::Safe).unwrap(), 8.0);
    }

    #[test]
    fn comparisons_are_numeric() {
        let mut store = vars(&[("x", 5.0), ("y", 1.0)]);
        let expr = parse("(x=5)*6+(y%2=1)*4");
        assert_eq!(expr.evaluate(&mut store, ArithmeticMode::Safe).unwrap(), 10.0);
    }

    #[test]
    fn comparison_tolerance() {
        assert_eq!(safe("(0.0000001 = 0)"), 1.0);
        assert_eq!(safe("(0.0001 = 0)"), 0.0);
        assert_eq!(safe("0.0000001 != 0"), 0.0);
        assert_eq!(safe("0.0001 != 0"), 1.0);
        assert_eq!(safe("1.000001 > 1"), 0.0);
        assert_eq!(safe("2 > 1"), 1.0);
        assert_eq!(safe("1 < 2"), 1.0);
        assert_eq!(safe("2 < 1"), 0.0);
    }

    #[test]
    fn left_associative_arithmetic() {
        assert_eq!(safe("8 - 4 - 2"), 2.0);
        assert_eq!(safe("8 / 4 / 2"), 1.0);
        assert_eq!(safe("2 ^ 3 ^ 2"), 64.0);
        assert_eq!(safe("1 + 2 * 3"), 7.0);
        assert_eq!(safe("-2 ^ 2"), 4.0);
    }

    #[test]
    fn remainder_follows_divisor_sign() {
        assert_eq!(safe("7 % 3"), 1.0);
        assert_eq!(safe("-7 % 3"), 2.0);
        assert_eq!(safe("7 % -3"), -2.0);
    }

    #[test]
    fn functions() {
        assert_eq!(safe("sqrt(16)"), 4.0);
        assert_close(safe("log(1000)"), 3.0);
        assert_close(safe("ln(e)"), 1.0);
        assert_eq!(safe("abs(-3) + ceil(1.2) + floor(1.8)"), 6.0);
        assert_eq!(safe("sin(0) + cos(0) + tan(0)"), 1.0);
        assert_eq!(safe("sinh(0) + cosh(0) + tanh(0)"), 1.0);
        assert_close(safe("asin(1)"), std::f64::consts::FRAC_PI_2);
        assert_eq!(safe("acos(1) + atan(0)"), 0.0);
        assert_eq!(safe("PI"), std::f64::consts::PI);
    }

    #[test]
    fn factorial_floors_its_operand() {
        assert_eq!(safe("!(5)"), 120.0);
        assert_eq!(safe("!(5.9)"), 120.0);
        assert_eq!(safe("!(1)"), 1.0);
        assert_eq!(safe("!(0)"), 1.0);
        assert_eq!(safe("!(12)"), 479001600.0);
        assert_eq!(strict("!(-3)"), 1.0);
        assert_eq!(strict("!(13)"), 6227020800.0);
    }

    #[test]
    fn factorial_of_huge_operands_terminates() {
        assert_eq!(safe("!(100000000000000000)"), 0.0);
        assert_eq!(safe("!(10^400)"), 0.0);
        assert_eq!(strict("!(100000000000000000)"), f64::INFINITY);
        assert_eq!(strict("!(10^400)"), f64::INFINITY);
        assert_eq!(strict("!(1/0)"), f64::INFINITY);
        assert!(strict("!(0/0)").is_nan());
    }

    #[test]
    fn safe_mode_zeroes_domain_faults() {
        assert_eq!(safe("(5/0)"), 0.0);
        assert_eq!(safe("5 % 0"), 0.0);
        assert_eq!(safe("sqrt(-1)"), 0.0);
        assert_eq!(safe("log(0)"), 0.0);
        assert_eq!(safe("ln(-2)"), 0.0);
        assert_eq!(safe("asin(2)"), 0.0);
        assert_eq!(safe("acos(-1.5)"), 0.0);
        assert_eq!(safe("(-8) ^ 0.5"), 0.0);
        assert_eq!(safe("!(13)"), 0.0);
        assert_eq!(safe("!(-3)"), 0.0);
        assert_eq!(safe("!(-0.5)"), 0.0);
    }

    #[test]
    fn strict_mode_propagates_domain_faults() {
        assert_eq!(strict("(5/0)"), f64::INFINITY);
        assert!(strict("0/0").is_nan());
        assert!(strict("5 % 0").is_nan());
        assert!(strict("sqrt(-1)").is_nan());
        assert_eq!(strict("log(0)"), f64::NEG_INFINITY);
        assert!(strict("asin(2)").is_nan());
        assert!(strict("(-8) ^ 0.5").is_nan());
    }

    #[test]
    fn random_sample_is_fresh_and_in_range() {
        let expr = parse("r");
        let samples: Vec<f64> = (0..64)
            .map(|_| expr.evaluate_without_vars(ArithmeticMode::Safe).unwrap())
            .collect();
        assert!(samples.iter().all(|s| (0.0..1.0).contains(s)));
        assert!(samples.iter().any(|s| *s != samples[0]));
    }

    #[test]
    fn unknown_variable() {
        assert_eq!(
            parse("x + 1").evaluate_without_vars(ArithmeticMode::Safe),
            Err(FormulaError::UnknownVariable("x".into()))
        );
    }

    #[test]
    fn aggregates() {
        let mut store = vars(&[("n", 4.0)]);
        let sum = parse("sum(i, n, i)");
        assert_eq!(sum.evaluate(&mut store, ArithmeticMode::Safe).unwrap(), 10.0);
        let product = parse("mult(i, n + 0.7, i)");
        assert_eq!(product.evaluate(&mut store, ArithmeticMode::Safe).unwrap(), 24.0);
        // Counter removed afterwards.
        assert_eq!(VariableStore::get(&store, "i"), None);

        assert_eq!(safe("sum(i, 0, i)"), 0.0);
        assert_eq!(safe("mult(i, -2, i)"), 1.0);
        assert_eq!(safe("sum(i, 3, sum(j, i, j))"), 10.0);
        assert_eq!(strict("sum(i, 0/0, i)"), 0.0);
        assert_eq!(strict("mult(i, -1/0, i)"), 1.0);
        assert_eq!(safe("sum(i, 2.999, 1)"), 2.0);
    }

    #[test]
    fn tangent_near_a_pole() {
        let expected = (std::f64::consts::PI / 2.0).tan();
        assert!(expected > 1e16);
        assert_eq!(safe("tan(pi/2)"), expected);
        assert_eq!(strict("tan(pi/2)"), expected);
    }

    #[test]
    fn aggregate_restores_previous_binding() {
        let mut store = vars(&[("i", 42.0)]);
        let expr = parse("sum(i, 3, i) + i");
        assert_eq!(expr.evaluate(&mut store, ArithmeticMode::Safe).unwrap(), 48.0);
        assert_eq!(VariableStore::get(&store, "i"), Some(42.0));
    }

    #[test]
    fn aggregate_restores_binding_on_error() {
        let mut store = vars(&[("i", 42.0)]);
        let expr = parse("sum(i, 3, i + missing)");
        assert_eq!(
            expr.evaluate(&mut store, ArithmeticMode::Safe),
            Err(FormulaError::UnknownVariable("missing".into()))
        );
        assert_eq!(VariableStore::get(&store, "i"), Some(42.0));

        let mut store: HashMap<String, f64> = HashMap::new();
        assert!(expr.evaluate(&mut store, ArithmeticMode::Safe).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn evaluation_does_not_consume_the_tree() {
        let expr = parse("x * 2");
        let mut store = vars(&[("x", 1.0)]);
        assert_eq!(expr.evaluate(&mut store, ArithmeticMode::Safe).unwrap(), 2.0);
        store.set("x", 3.5);
        assert_eq!(expr.evaluate(&mut store, ArithmeticMode::Safe).unwrap(), 7.0);
    }

    #[test]
    fn btree_store() {
        let mut store = BTreeMap::new();
        store.insert("x".to_string(), 2.0);
        let expr = parse("x ^ 10");
        assert_eq!(expr.evaluate(&mut store, ArithmeticMode::Strict).unwrap(), 1024.0);
    }
}
