use std::collections::BTreeSet;
use std::fmt;

use colored::Colorize;
use similar::TextDiff;

/// How a mutant fared against the suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Kills exactly one test.
    Selective(String),
    Weak,
    Strong(usize),
}

impl Verdict {
    pub fn from_killed(mut killed: Vec<String>) -> Self {
        match killed.len() {
            0 => Verdict::Weak,
            1 => Verdict::Selective(killed.remove(0)),
            n => Verdict::Strong(n),
        }
    }
}

pub struct MutantReport {
    pub name: String,
    pub verdict: Verdict,
}

impl fmt::Display for MutantReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.verdict {
            Verdict::Selective(test) => write!(
                f,
                "{} kills exactly one test: {}",
                self.name,
                test.green()
            ),
            Verdict::Weak => write!(f, "{} kills no tests {}", self.name, "(too weak?)".yellow()),
            Verdict::Strong(n) => {
                write!(f, "{} kills {} tests {}", self.name, n, "(too strong?)".red())
            }
        }
    }
}

/// The closing block: every test some mutant killed on its own, sorted.
pub fn summary(reports: &[MutantReport], total_tests: usize) -> String {
    let selective: BTreeSet<&str> = reports
        .iter()
        .filter_map(|r| match &r.verdict {
            Verdict::Selective(t) => Some(t.as_str()),
            _ => None,
        })
        .collect();
    let mut out = String::from("---\n");
    out.push_str(&format!(
        "selectively killed {} of {} tests\n",
        selective.len(),
        total_tests
    ));
    for test in selective {
        out.push_str(&format!("+ {test}\n"));
    }
    out
}

/// Unified diff of a mutant against the original source.
pub fn diff(original: &str, mutant: &str, mutant_name: &str) -> String {
    TextDiff::from_lines(original, mutant)
        .unified_diff()
        .context_radius(2)
        .header("no-mutations.py", mutant_name)
        .to_string()
}
