//! Test-plan configuration: TOML document with global defaults and `[[test]]` entries.
//!
//! ```toml
//! [defaults]
//! collections = ["coll_a"]
//! source_queries = ["'bpvolume' in <DBALIAS>"]
//!
//! [defaults.command]
//! tool = "rcvdk"
//! params = [["locale", "english"]]
//!
//! [[test]]
//! threads = 2
//! executions = 10
//! queries = ["apple", "pear"]
//! ```
//!
//! A plan-level problem only invalidates that plan; see [`Config::test_plans`].

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::command::{CommandTemplate, ToolKind};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{plan}: no command descriptor (set [defaults.command] or [test.command])")]
    MissingCommand { plan: String },
    #[error("{plan}: {tool:?} is not a valid command type")]
    UnknownTool { plan: String, tool: String },
    #[error("{plan}: {field} must be a positive integer, got {value:?}")]
    InvalidCount {
        plan: String,
        field: &'static str,
        value: String,
    },
    #[error("{plan}: no queries configured")]
    NoQueries { plan: String },
}

/// Integer or numeric string, as accepted for `threads` and `executions`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Count {
    Int(i64),
    Text(String),
}

impl Count {
    fn parse(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    fn raw(&self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct CommandSection {
    pub tool: String,
    #[serde(default)]
    pub params: Vec<(String, String)>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub source_queries: Vec<String>,
    pub command: Option<CommandSection>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TestSection {
    pub name: Option<String>,
    pub threads: Option<Count>,
    pub executions: Option<Count>,
    #[serde(default)]
    pub queries: Vec<String>,
    pub source_queries: Option<Vec<String>>,
    pub collections: Option<Vec<String>>,
    pub command: Option<CommandSection>,
    pub seed: Option<u64>,
}

/// The whole configuration document.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default, rename = "test")]
    pub tests: Vec<TestSection>,
}

/// Tool family and its named parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub kind: ToolKind,
    pub params: Vec<(String, String)>,
}

/// One validated test plan. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestPlanConfig {
    pub name: String,
    pub threads: usize,
    pub max_executions: usize,
    pub source_queries: Vec<String>,
    pub queries: Vec<String>,
    pub collections: Vec<String>,
    pub command: CommandDescriptor,
    pub seed: Option<u64>,
}

impl TestPlanConfig {
    pub fn command_template(&self) -> CommandTemplate {
        CommandTemplate::new(
            self.command.kind,
            self.command.params.clone(),
            self.collections.clone(),
        )
    }
}

impl Config {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Build every declared plan. Each entry succeeds or fails on its own.
    pub fn test_plans(&self) -> Vec<Result<TestPlanConfig, ConfigError>> {
        self.tests
            .iter()
            .enumerate()
            .map(|(index, test)| self.build_plan(index, test))
            .collect()
    }

    fn build_plan(&self, index: usize, test: &TestSection) -> Result<TestPlanConfig, ConfigError> {
        let name = test
            .name
            .clone()
            .unwrap_or_else(|| format!("test-{}", index + 1));

        // Missing or zero threads means one worker.
        let threads = match &test.threads {
            None => 1,
            Some(count) => match count.parse() {
                Some(0) => 1,
                Some(n) if n > 0 => n as usize,
                _ => {
                    return Err(ConfigError::InvalidCount {
                        plan: name,
                        field: "threads",
                        value: count.raw(),
                    });
                }
            },
        };

        let max_executions = match test.executions.as_ref().map(|c| (c.parse(), c.raw())) {
            Some((Some(n), _)) if n > 0 => n as usize,
            Some((_, raw)) => {
                return Err(ConfigError::InvalidCount {
                    plan: name,
                    field: "executions",
                    value: raw,
                });
            }
            None => {
                return Err(ConfigError::InvalidCount {
                    plan: name,
                    field: "executions",
                    value: String::new(),
                });
            }
        };

        if test.queries.is_empty() {
            return Err(ConfigError::NoQueries { plan: name });
        }

        let section = test
            .command
            .as_ref()
            .or(self.defaults.command.as_ref())
            .ok_or_else(|| ConfigError::MissingCommand { plan: name.clone() })?;
        let kind = section
            .tool
            .parse::<ToolKind>()
            .map_err(|e| ConfigError::UnknownTool {
                plan: name.clone(),
                tool: e.0,
            })?;

        // An empty per-test list falls back to the defaults, as an absent one does.
        let source_queries = test
            .source_queries
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| self.defaults.source_queries.clone());
        let collections = test
            .collections
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| self.defaults.collections.clone());

        Ok(TestPlanConfig {
            name,
            threads,
            max_executions,
            source_queries,
            queries: test.queries.clone(),
            collections,
            command: CommandDescriptor {
                kind,
                params: section.params.clone(),
            },
            seed: test.seed,
        })
    }
}
