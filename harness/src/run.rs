use std::time::{Duration, Instant};

use log::{debug, warn};
use pinpoint::{Exception, ExceptionKind, Interpreter, Program, Unwind, Value};

use crate::config::TestCase;

/// Result of one test call.
#[derive(Debug, Clone)]
pub enum Outcome {
    Returned(Value),
    /// Any uncaught exception. The kind is only logged; it plays no part in equality.
    Exceptional(Exception),
    TimedOut,
}

/// Two outcomes agree when both return structurally equal values, both raise,
/// or both time out.
impl PartialEq for Outcome {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Outcome::Returned(a), Outcome::Returned(b)) => a == b,
            (Outcome::Exceptional(_), Outcome::Exceptional(_)) => true,
            (Outcome::TimedOut, Outcome::TimedOut) => true,
            _ => false,
        }
    }
}

impl From<Unwind> for Outcome {
    fn from(unwind: Unwind) -> Self {
        match unwind {
            Unwind::Raise(e) => Outcome::Exceptional(e),
            Unwind::TimedOut => Outcome::TimedOut,
        }
    }
}

/// Run every test against `program`, each with its own deadline.
///
/// # Notes
/// A program whose module body fails to run gives the same failure for every test.
/// Must be called on a thread with `pinpoint::INTERPRETER_STACK_SIZE` of stack.
pub fn run(program: &Program, tests: &[TestCase], timeout: Duration) -> Vec<Outcome> {
    let mut interp = match Interpreter::load(program, Some(Instant::now() + timeout)) {
        Ok(interp) => interp,
        Err(unwind) => {
            let outcome = Outcome::from(unwind);
            match &outcome {
                Outcome::Exceptional(e) => warn!("module body raised {e}"),
                _ => warn!("module body did not finish"),
            }
            return vec![outcome; tests.len()];
        }
    };

    tests
        .iter()
        .map(|test| {
            let Some(function) = interp.resolve(&test.function) else {
                return Outcome::Exceptional(Exception::new(
                    ExceptionKind::NameError,
                    format!("no function named '{}'", test.function),
                ));
            };
            let outcome = match interp.call(function, test.values(), Some(Instant::now() + timeout)) {
                Ok(v) => Outcome::Returned(v),
                Err(unwind) => unwind.into(),
            };
            match &outcome {
                Outcome::Returned(v) => debug!("{test} returned {}", v.repr()),
                Outcome::Exceptional(e) => debug!("{test} raised {}", e.kind.name()),
                Outcome::TimedOut => debug!("{test} timed out"),
            }
            outcome
        })
        .collect()
}

/// Tests whose outcome on the mutant differs from the baseline.
pub fn killed(tests: &[TestCase], baseline: &[Outcome], mutant: &[Outcome]) -> Vec<String> {
    tests
        .iter()
        .zip(baseline.iter().zip(mutant))
        .filter(|(_, (expected, actual))| expected != actual)
        .map(|(test, _)| test.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Arg;
    use pinpoint::parse;

    fn case(function: &str, args: &[i64]) -> TestCase {
        TestCase { function: function.into(), args: args.iter().map(|n| Arg::Int(*n)).collect() }
    }

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[test]
    fn test_outcomes() {
        let program = parse(
            "def ok(a):\n    return a\n\ndef bad(a):\n    return a // 0\n\ndef spin(a):\n    while True:\n        pass\n",
        )
        .unwrap();
        let tests = vec![case("ok", &[1]), case("bad", &[1]), case("spin", &[1]), case("missing", &[])];
        let outcomes = run(&program, &tests, TIMEOUT);
        assert_eq!(outcomes[0], Outcome::Returned(Value::Int(1)));
        assert!(matches!(&outcomes[1], Outcome::Exceptional(e) if e.kind == ExceptionKind::ZeroDivisionError));
        assert_eq!(outcomes[2], Outcome::TimedOut);
        assert!(matches!(outcomes[3], Outcome::Exceptional(_)));
    }

    #[test]
    fn test_killed_lists_differing_tests() {
        let original = parse("def f(a, b):\n    return a + b\n").unwrap();
        let mutant = parse("def f(a, b):\n    return a - b\n").unwrap();
        let tests = vec![case("f", &[5, 0]), case("f", &[2, 2])];
        let baseline = run(&original, &tests, TIMEOUT);
        let outcomes = run(&mutant, &tests, TIMEOUT);
        assert_eq!(killed(&tests, &baseline, &outcomes), vec!["f(2,2)".to_string()]);
    }

    #[test]
    fn test_failing_module_body_fails_every_test() {
        let program = parse("x = 1 // 0\n\ndef f(a):\n    return a\n").unwrap();
        let tests = vec![case("f", &[1]), case("f", &[2])];
        let outcomes = run(&program, &tests, TIMEOUT);
        assert_eq!(outcomes.len(), 2);
        for outcome in outcomes {
            assert!(matches!(outcome, Outcome::Exceptional(e) if e.kind == ExceptionKind::ZeroDivisionError));
        }
    }

    #[test]
    fn test_exceptions_of_any_kind_agree() {
        let a = Outcome::Exceptional(Exception::new(ExceptionKind::ValueError, ""));
        let b = Outcome::Exceptional(Exception::new(ExceptionKind::TypeError, "x"));
        assert_eq!(a, b);
        assert_ne!(a, Outcome::TimedOut);
    }
}
