//! Command-line interface configuration.

use argh::{EarlyExit, FromArgs};
use std::path::PathBuf;

use crate::{Error, Result};

/// Application built on appbase
#[derive(Debug, PartialEq, FromArgs)]
pub struct Cli {
    /// filename or full path of the settings file (default: '.settings.yml')
    #[argh(option)]
    pub settings: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Option<Command>,
}

/// Built-in subcommands.
#[derive(Debug, PartialEq, FromArgs)]
#[argh(subcommand)]
pub enum Command {
    Version(VersionCmd),
    Info(InfoCmd),
    Init(InitCmd),
    Install(InstallCmd),
    Uninstall(UninstallCmd),
    Run(RunCmd),
}

/// Prints the raw version number.
#[derive(Debug, PartialEq, FromArgs)]
#[argh(subcommand, name = "version")]
pub struct VersionCmd {}

/// Prints info about the application, its build and settings.
#[derive(Debug, PartialEq, FromArgs)]
#[argh(subcommand, name = "info")]
pub struct InfoCmd {}

/// Creates settings file with defaults.
#[derive(Debug, PartialEq, FromArgs)]
#[argh(subcommand, name = "init")]
pub struct InitCmd {}

/// Creates a system service running the web server.
#[derive(Debug, PartialEq, FromArgs)]
#[argh(subcommand, name = "install")]
pub struct InstallCmd {
    /// start the service after boot; it is not started right away (default: true)
    #[argh(option, default = "true")]
    pub autostart: bool,
}

/// Removes the installed system service.
#[derive(Debug, PartialEq, FromArgs)]
#[argh(subcommand, name = "uninstall")]
pub struct UninstallCmd {}

/// Runs the web server.
#[derive(Debug, PartialEq, FromArgs)]
#[argh(subcommand, name = "run")]
pub struct RunCmd {
    /// extended web request logging
    #[argh(switch)]
    pub log_requests: bool,

    /// log SQL queries
    #[argh(switch)]
    pub log_sql: bool,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Version(_) => "version",
            Command::Info(_) => "info",
            Command::Init(_) => "init",
            Command::Install(_) => "install",
            Command::Uninstall(_) => "uninstall",
            Command::Run(_) => "run",
        }
    }

    /// Whether the command refuses to run without a settings file.
    pub fn requires_settings(&self) -> bool {
        !matches!(
            self,
            Command::Version(_) | Command::Info(_) | Command::Init(_)
        )
    }
}

/// Outcome of parsing the command line.
#[derive(Debug, PartialEq)]
pub enum Parsed {
    Cli(Cli),
    /// Help was requested; the text to print.
    Help(String),
}

impl Cli {
    /// Parses `args` (without the executable) for a program called `command_name`.
    ///
    /// `--name=value` is accepted as well as `--name value`, and `--settings`
    /// may follow the subcommand.
    pub fn parse<I, T>(command_name: &str, args: I) -> Result<Parsed>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let args = hoist_settings(split_assignments(args));
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        match Cli::from_args(&[command_name], &args) {
            Ok(cli) => Ok(Parsed::Cli(cli)),
            Err(EarlyExit {
                output,
                status: Ok(()),
            }) => Ok(Parsed::Help(output)),
            Err(EarlyExit { output, .. }) => Err(Error::Usage(output)),
        }
    }

    /// Top-level help text.
    pub fn help(command_name: &str) -> String {
        match Cli::from_args(&[command_name], &["--help"]) {
            Ok(_) => String::new(),
            Err(exit) => exit.output,
        }
    }
}

fn split_assignments<I, T>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let mut split = Vec::new();
    for arg in args.into_iter().map(Into::into) {
        match arg.strip_prefix("--").and_then(|flag| flag.split_once('=')) {
            Some((name, value)) if !name.is_empty() => {
                split.push(format!("--{name}"));
                split.push(value.to_string());
            }
            _ => split.push(arg),
        }
    }
    split
}

/// Moves every `--settings <path>` pair in front of the subcommand.
fn hoist_settings(args: Vec<String>) -> Vec<String> {
    let mut hoisted = Vec::new();
    let mut rest = Vec::new();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--" {
            rest.push(arg);
            rest.extend(args.by_ref());
            break;
        }
        if arg == "--settings" {
            if let Some(value) = args.next() {
                hoisted.push(arg);
                hoisted.push(value);
                continue;
            }
        }
        rest.push(arg);
    }

    hoisted.extend(rest);
    hoisted
}
