//! The command table.
//!
//! Every command the CLI exposes is declared here once, with its arguments
//! and options. Front ends build their parsers from [`COMMANDS`] and hand the
//! parsed values back as an [`Invocation`].

use std::collections::BTreeMap;

use crate::error::{Result, TidemarkError};

/// Which handler an invocation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    MigrateStatus,
    Migrate,
    MigrateRollback,
    MigrateReset,
    MakeMigration,
}

/// A positional argument.
#[derive(Debug)]
pub struct ArgumentSpec {
    pub name: &'static str,
    pub help: &'static str,
    pub required: bool,
}

/// A `--name=<value>` option.
#[derive(Debug)]
pub struct OptionSpec {
    pub name: &'static str,
    pub value_name: &'static str,
    pub help: &'static str,
}

/// One row of the command table.
#[derive(Debug)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: CommandKind,
    pub arguments: &'static [ArgumentSpec],
    pub options: &'static [OptionSpec],
}

pub const CONNECTION_OPTION: &str = "connection";

const CONNECTION: OptionSpec = OptionSpec {
    name: CONNECTION_OPTION,
    value_name: "NAME",
    help: "Connection to use (defaults to the configured default)",
};

pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "migrate:status",
        description: "Show the status of all migrations",
        kind: CommandKind::MigrateStatus,
        arguments: &[],
        options: &[CONNECTION],
    },
    CommandSpec {
        name: "migrate",
        description: "Run the pending migrations",
        kind: CommandKind::Migrate,
        arguments: &[],
        options: &[CONNECTION],
    },
    CommandSpec {
        name: "migrate:rollback",
        description: "Rollback the previous batch of migrations",
        kind: CommandKind::MigrateRollback,
        arguments: &[],
        options: &[CONNECTION],
    },
    CommandSpec {
        name: "migrate:reset",
        description: "Rollback every migration",
        kind: CommandKind::MigrateReset,
        arguments: &[],
        options: &[CONNECTION],
    },
    CommandSpec {
        name: "make:migration",
        description: "Create a new migration file",
        kind: CommandKind::MakeMigration,
        arguments: &[ArgumentSpec {
            name: "name",
            help: "Name of the migration, e.g. create_users_table",
            required: true,
        }],
        options: &[CONNECTION],
    },
];

/// Look up a command by its CLI name.
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

/// A parsed command line, ready to dispatch.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub kind: CommandKind,
    arguments: BTreeMap<String, String>,
    options: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            arguments: BTreeMap::new(),
            options: BTreeMap::new(),
        }
    }

    /// Build an invocation for a command name from the table.
    pub fn for_command(name: &str) -> Result<Self> {
        find(name)
            .map(|spec| Self::new(spec.kind))
            .ok_or_else(|| TidemarkError::UnknownCommand(name.to_string()))
    }

    pub fn with_argument(mut self, name: &str, value: impl Into<String>) -> Self {
        self.arguments.insert(name.to_string(), value.into());
        self
    }

    pub fn with_option(mut self, name: &str, value: impl Into<String>) -> Self {
        self.options.insert(name.to_string(), value.into());
        self
    }

    pub fn argument(&self, name: &str) -> Option<&str> {
        self.arguments.get(name).map(String::as_str)
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    /// A required argument; empty values count as missing.
    pub fn required_argument(&self, name: &str) -> Result<&str> {
        match self.argument(name) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(TidemarkError::MissingArgument(name.to_string())),
        }
    }
}
