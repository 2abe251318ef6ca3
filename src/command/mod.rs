//! Command abstraction: per-tool invocation builders and output parsers.
//!
//! Each supported search client is one [`CommandVariant`] case backed by a type
//! implementing [`SearchTool`]. A [`CommandTemplate`] comes from the test plan;
//! binding it to a query produces a one-shot command that is executed once and
//! discarded.

pub mod broker;
pub mod direct;
pub mod parse;

pub use broker::BrokerClient;
pub use direct::DirectClient;
pub use parse::{DEFAULT_ELAPSED_MS, OutputPatterns, ParsedOutput, parse_output};

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use tracing::warn;

use crate::result::{CommandError, ExecutionError, ExecutionResult, Outcome};
use crate::runner::ProcessRunner;

/// Parameter name that selects the tool rather than being passed to it.
pub const COMMAND_PARAM: &str = "command";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// `rcvdk`: searches collections through the broker servers
    BrokerClient,
    /// `rck2`: searches collections directly on the file system
    DirectClient,
}

impl ToolKind {
    pub fn tool_name(self) -> &'static str {
        match self {
            Self::BrokerClient => broker::TOOL_NAME,
            Self::DirectClient => direct::TOOL_NAME,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tool_name())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0:?} is not a known command type")]
pub struct UnknownTool(pub String);

impl FromStr for ToolKind {
    type Err = UnknownTool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rcvdk" | "rckvdk" | "broker" => Ok(Self::BrokerClient),
            "rck2" | "direct" => Ok(Self::DirectClient),
            _ => Err(UnknownTool(s.to_string())),
        }
    }
}

/// Tool family plus the parameters and collections every run of a plan shares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandTemplate {
    pub kind: ToolKind,
    /// Ordered `(name, value)` pairs; an empty value emits the flag alone
    pub params: Vec<(String, String)>,
    pub collections: Vec<String>,
}

impl CommandTemplate {
    pub fn new(kind: ToolKind, params: Vec<(String, String)>, collections: Vec<String>) -> Self {
        Self {
            kind,
            params,
            collections,
        }
    }

    /// Bind a query pair, producing a ready-to-run command.
    pub fn bind(&self, query: impl Into<String>, source_query: Option<String>) -> CommandVariant {
        CommandVariant::build(self, query.into(), source_query)
    }
}

/// Fields every bound command carries, whatever its tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub params: Vec<(String, String)>,
    pub collections: Vec<String>,
    pub query: String,
    pub source_query: Option<String>,
}

impl Binding {
    /// Source query, if one is bound and non-empty.
    pub fn refinement(&self) -> Option<&str> {
        self.source_query.as_deref().filter(|sq| !sq.is_empty())
    }
}

/// Capabilities of one search client family.
pub trait SearchTool {
    fn tool_name(&self) -> &str;
    fn param_prefix(&self) -> &str;
    fn binding(&self) -> &Binding;
    fn patterns(&self) -> &OutputPatterns;

    /// Script written to the tool's stdin.
    fn input_script(&self) -> String;

    /// Source query the script actually sends, if any. Tools without a
    /// refinement step report none.
    fn applied_source_query(&self) -> Option<&str> {
        None
    }

    /// Tool name, then a prefixed flag (and its value, when non-empty) for each
    /// parameter other than `command`, in declared order.
    fn invocation(&self) -> Vec<String> {
        let binding = self.binding();
        let mut argv = Vec::with_capacity(1 + binding.params.len() * 2);
        argv.push(self.tool_name().to_string());
        for (name, value) in &binding.params {
            if name == COMMAND_PARAM {
                continue;
            }
            argv.push(format!("{}{}", self.param_prefix(), name));
            if !value.is_empty() {
                argv.push(value.clone());
            }
        }
        argv
    }

    fn parse_output(&self, text: &str) -> ParsedOutput {
        parse_output(self.patterns(), text)
    }
}

/// A fully bound, one-shot tool invocation.
#[derive(Clone, Debug)]
pub enum CommandVariant {
    BrokerClient(BrokerClient),
    DirectClient(DirectClient),
}

impl CommandVariant {
    pub fn build(
        template: &CommandTemplate,
        query: String,
        source_query: Option<String>,
    ) -> Self {
        let binding = Binding {
            params: template.params.clone(),
            collections: template.collections.clone(),
            query,
            source_query,
        };
        match template.kind {
            ToolKind::BrokerClient => Self::BrokerClient(BrokerClient::new(binding)),
            ToolKind::DirectClient => Self::DirectClient(DirectClient::new(binding)),
        }
    }

    fn tool(&self) -> &dyn SearchTool {
        match self {
            Self::BrokerClient(c) => c as &dyn SearchTool,
            Self::DirectClient(c) => c as &dyn SearchTool,
        }
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            Self::BrokerClient(_) => ToolKind::BrokerClient,
            Self::DirectClient(_) => ToolKind::DirectClient,
        }
    }

    pub fn query(&self) -> &str {
        &self.tool().binding().query
    }

    pub fn source_query(&self) -> Option<&str> {
        self.tool().binding().source_query.as_deref()
    }

    pub fn build_invocation(&self) -> Vec<String> {
        self.tool().invocation()
    }

    pub fn build_input_script(&self) -> Vec<u8> {
        self.tool().input_script().into_bytes()
    }

    pub fn parse_output(&self, text: &str) -> ParsedOutput {
        self.tool().parse_output(text)
    }

    /// Run the tool once and parse what it printed.
    ///
    /// A launch failure or non-zero exit status is returned as an
    /// [`ExecutionError`] carrying the work item's query.
    pub fn execute(&self, runner: &dyn ProcessRunner) -> Outcome {
        let argv = self.build_invocation();
        let script = self.build_input_script();
        let binding = self.tool().binding();
        let source_query = self.tool().applied_source_query().map(str::to_string);
        let timestamp = Utc::now();
        let fail = |cause: CommandError| ExecutionError {
            timestamp,
            query: binding.query.clone(),
            source_query: source_query.clone(),
            cause,
        };

        let out = match runner.run(&argv, &script) {
            Ok(out) => out,
            Err(e) => {
                warn!(tool = %self.kind(), error = %e, "Failed to launch tool");
                return Err(fail(CommandError::Launch {
                    program: self.tool().tool_name().to_string(),
                    message: e.to_string(),
                }));
            }
        };

        let text = out.text();
        if !out.success() {
            warn!(tool = %self.kind(), status = out.status, query = %binding.query, "Called process failed");
            return Err(fail(CommandError::ProcessExecution {
                argv,
                status: out.status,
                output: text,
            }));
        }

        let parsed = self.parse_output(&text);
        Ok(ExecutionResult::new(
            timestamp,
            binding.query.clone(),
            source_query,
            parsed,
            text,
        ))
    }
}
