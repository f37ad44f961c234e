use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use pinpoint::{CategoryWeights, Value};
use serde::Deserialize;

/// Contents of a `--config` or `--suite` file. Every key is optional.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    pub num_mutants: Option<usize>,
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub weights: CategoryWeights,
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

impl HarnessConfig {
    pub fn from_toml(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.weights.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid configuration in {}", path.display()))
    }
}

/// One test: a function of the subject and the arguments to call it with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCase {
    pub function: String,
    #[serde(default)]
    pub args: Vec<Arg>,
}

impl TestCase {
    /// Fresh argument values, so a callee mutating a list cannot affect another run.
    pub fn values(&self) -> Vec<Value> {
        self.args.iter().map(Arg::to_value).collect()
    }
}

/// `f10([8, 6, 7],0)`: arguments as Python's `str()` shows them, joined without spaces.
impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.values().iter().map(|v| v.to_string()).collect();
        write!(f, "{}({})", self.function, args.join(","))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Arg>),
}

impl Arg {
    pub fn to_value(&self) -> Value {
        match self {
            Arg::Bool(b) => Value::Bool(*b),
            Arg::Int(n) => Value::Int(*n),
            Arg::Str(s) => Value::Str(s.clone()),
            Arg::List(items) => Value::list(items.iter().map(Arg::to_value).collect()),
        }
    }
}
