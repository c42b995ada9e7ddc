use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use lesson_core::model::{FieldValue, LessonDraft, LessonField, RowIndex, StepName};
use lesson_core::pipeline::Phase;
use services::views::{AssigneeFilter, MatrixSort};
use storage::http::{HttpBackendConfig, DEFAULT_TIMEOUT_SECS};

pub const DEFAULT_POLL_SECS: u64 = 30;

#[derive(Debug)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { command: &'static str, name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    MissingBackend,
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDate { flag: &'static str, raw: String },
    InvalidRow { raw: String },
    InvalidToggle { raw: String },
    InvalidField { raw: String },
    InvalidSort { raw: String },
    InvalidPhase { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { command, name } => {
                write!(f, "{command} requires <{name}>")
            }
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            ArgsError::MissingBackend => {
                write!(f, "no backend configured (set --backend-url, LESSONS_BACKEND_URL or --demo)")
            }
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDate { flag, raw } => {
                write!(f, "invalid {flag} value (expected YYYY-MM-DD): {raw}")
            }
            ArgsError::InvalidRow { raw } => write!(f, "invalid row: {raw}"),
            ArgsError::InvalidToggle { raw } => write!(f, "expected on or off, got: {raw}"),
            ArgsError::InvalidField { raw } => write!(f, "unknown field: {raw}"),
            ArgsError::InvalidSort { raw } => write!(f, "unknown sort: {raw}"),
            ArgsError::InvalidPhase { raw } => write!(f, "unknown phase (expected pre or post): {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_date(flag: &'static str, raw: &str) -> Result<NaiveDate, ArgsError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| ArgsError::InvalidDate {
        flag,
        raw: raw.to_owned(),
    })
}

fn parse_secs(flag: &'static str, raw: &str) -> Result<u64, ArgsError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .ok_or_else(|| ArgsError::InvalidNumber {
            flag,
            raw: raw.to_owned(),
        })
}

fn parse_row(raw: &str) -> Result<RowIndex, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidRow {
        raw: raw.to_owned(),
    })
}

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Report,
    Watch,
    Toggle {
        row: RowIndex,
        step: StepName,
        value: bool,
    },
    Edit {
        row: RowIndex,
        field: LessonField,
        value: FieldValue,
    },
    Add(LessonDraft),
    Delete {
        row: RowIndex,
    },
    Review {
        row: RowIndex,
        step: StepName,
    },
}

#[derive(Debug, Clone)]
pub struct Options {
    pub action: Action,
    pub backend: Option<HttpBackendConfig>,
    pub poll: Duration,
    pub today: Option<NaiveDate>,
    pub json: bool,
    pub demo: bool,
    pub filter: AssigneeFilter,
    pub sort: MatrixSort,
    pub matrix: Option<Phase>,
}

impl Options {
    /// Parse the command line. Flags override `LESSONS_*` environment
    /// variables, which override defaults.
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let env_backend = HttpBackendConfig::from_env();
        let mut backend_url = env_backend.as_ref().map(|config| config.base_url.clone());
        let mut timeout = env_backend
            .as_ref()
            .map_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS), |config| config.timeout);
        let mut poll = std::env::var("LESSONS_POLL_SECS")
            .ok()
            .and_then(|raw| parse_secs("LESSONS_POLL_SECS", &raw).ok())
            .map_or(Duration::from_secs(DEFAULT_POLL_SECS), Duration::from_secs);
        let mut today = None;
        let mut json = false;
        let mut demo = false;
        let mut filter = AssigneeFilter::All;
        let mut sort = MatrixSort::Default;
        let mut matrix = None;

        let mut draft = LessonDraft::default();
        let mut positional: Vec<String> = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--backend-url" => backend_url = Some(require_value(&mut args, "--backend-url")?),
                "--poll-secs" => {
                    let value = require_value(&mut args, "--poll-secs")?;
                    poll = Duration::from_secs(parse_secs("--poll-secs", &value)?);
                }
                "--timeout-secs" => {
                    let value = require_value(&mut args, "--timeout-secs")?;
                    timeout = Duration::from_secs(parse_secs("--timeout-secs", &value)?);
                }
                "--today" => {
                    let value = require_value(&mut args, "--today")?;
                    today = Some(parse_date("--today", &value)?);
                }
                "--json" => json = true,
                "--demo" => demo = true,
                "--filter" => {
                    let value = require_value(&mut args, "--filter")?;
                    filter = value.parse().unwrap_or_default();
                }
                "--sort" => {
                    let value = require_value(&mut args, "--sort")?;
                    sort = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidSort { raw: value.clone() })?;
                }
                "--matrix" => {
                    let value = require_value(&mut args, "--matrix")?;
                    matrix = Some(match value.as_str() {
                        "pre" => Phase::Pre,
                        "post" => Phase::Post,
                        _ => return Err(ArgsError::InvalidPhase { raw: value }),
                    });
                }
                "--assignee" => draft.assignee = require_value(&mut args, "--assignee")?,
                "--title" => draft.title = require_value(&mut args, "--title")?,
                "--start" => {
                    let value = require_value(&mut args, "--start")?;
                    draft.start_date = Some(parse_date("--start", &value)?);
                }
                "--due" => {
                    let value = require_value(&mut args, "--due")?;
                    draft.due_date = Some(parse_date("--due", &value)?);
                }
                "--release" => {
                    let value = require_value(&mut args, "--release")?;
                    draft.release_date = Some(parse_date("--release", &value)?);
                }
                "--step" => {
                    let value = require_value(&mut args, "--step")?;
                    draft.initial_steps.push(StepName::new(value));
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        let action = parse_action(positional, draft)?;
        let backend = backend_url
            .filter(|url| !url.trim().is_empty())
            .map(|url| HttpBackendConfig {
                base_url: url.trim().to_owned(),
                timeout,
            });
        if backend.is_none() && !demo {
            return Err(ArgsError::MissingBackend);
        }

        Ok(Self {
            action,
            backend,
            poll,
            today,
            json,
            demo,
            filter,
            sort,
            matrix,
        })
    }
}

fn parse_action(positional: Vec<String>, draft: LessonDraft) -> Result<Action, ArgsError> {
    let mut words = positional.into_iter();
    let Some(name) = words.next() else {
        return Ok(Action::Report);
    };
    let mut take = |command: &'static str, arg: &'static str| {
        words.next().ok_or(ArgsError::MissingArgument { command, name: arg })
    };

    let action = match name.as_str() {
        "report" => Action::Report,
        "watch" => Action::Watch,
        "toggle" => {
            let row = parse_row(&take("toggle", "row")?)?;
            let step = StepName::new(take("toggle", "step")?);
            let raw = take("toggle", "on|off")?;
            let value = match raw.as_str() {
                "on" | "true" => true,
                "off" | "false" => false,
                _ => return Err(ArgsError::InvalidToggle { raw }),
            };
            Action::Toggle { row, step, value }
        }
        "edit" => {
            let row = parse_row(&take("edit", "row")?)?;
            let raw_field = take("edit", "field")?;
            let field: LessonField = raw_field
                .parse()
                .map_err(|_| ArgsError::InvalidField { raw: raw_field.clone() })?;
            let raw = take("edit", "value")?;
            let value = if field.is_text() {
                FieldValue::Text(raw)
            } else if raw.is_empty() || raw == "none" {
                FieldValue::Date(None)
            } else {
                FieldValue::Date(Some(parse_date("<value>", &raw)?))
            };
            Action::Edit { row, field, value }
        }
        "add" => Action::Add(draft),
        "delete" => Action::Delete {
            row: parse_row(&take("delete", "row")?)?,
        },
        "review" => {
            let row = parse_row(&take("review", "row")?)?;
            let step = StepName::new(take("review", "step")?);
            Action::Review { row, step }
        }
        _ => return Err(ArgsError::UnknownCommand(name)),
    };

    match words.next() {
        Some(extra) => Err(ArgsError::UnknownArg(extra)),
        None => Ok(action),
    }
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  lessons [report]                          Dashboard, review report and narrative");
    eprintln!("  lessons watch                             Refresh and report every poll interval");
    eprintln!("  lessons toggle <row> <step> <on|off>      Check or uncheck a step");
    eprintln!("  lessons edit <row> <field> <value>        Edit assignee, title, start, due or release");
    eprintln!("  lessons add --assignee A --title T [--start D] [--due D] [--release D] [--step S]...");
    eprintln!("  lessons delete <row>                      Delete a lesson");
    eprintln!("  lessons review <row> <step>               Request review for a gate step");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --backend-url <url>       Lesson endpoint (env: LESSONS_BACKEND_URL)");
    eprintln!("  --poll-secs <n>           Watch interval (env: LESSONS_POLL_SECS, default: 30)");
    eprintln!("  --timeout-secs <n>        Request timeout (env: LESSONS_TIMEOUT_SECS, default: 15)");
    eprintln!("  --today <YYYY-MM-DD>      Evaluate schedules as of this day");
    eprintln!("  --filter <assignee|all>   Only report lessons of one assignee");
    eprintln!("  --matrix <pre|post>       Include the step matrix of a phase");
    eprintln!("  --sort <key>              Matrix order: default, progress-asc, progress-desc, assignee");
    eprintln!("  --json                    Machine-readable output");
    eprintln!("  --demo                    Use built-in sample data instead of a backend");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Logging is controlled by RUST_LOG (default: info).");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options, ArgsError> {
        Options::parse(args.iter().map(|s| (*s).to_owned()))
    }

    #[test]
    fn defaults_to_report() {
        let options = parse(&["--demo"]).unwrap();
        assert_eq!(options.action, Action::Report);
        assert!(options.demo);
        assert!(!options.json);
    }

    #[test]
    fn flag_overrides_backend_and_timeout() {
        let options = parse(&[
            "report",
            "--backend-url",
            "https://example.test/exec",
            "--timeout-secs",
            "5",
        ])
        .unwrap();
        let backend = options.backend.unwrap();
        assert_eq!(backend.base_url, "https://example.test/exec");
        assert_eq!(backend.timeout, Duration::from_secs(5));
    }

    #[test]
    fn parses_toggle_and_edit() {
        let options = parse(&["--demo", "toggle", "3", "Script Review", "on"]).unwrap();
        assert_eq!(
            options.action,
            Action::Toggle {
                row: RowIndex::new(3),
                step: StepName::new("Script Review"),
                value: true,
            }
        );

        let options = parse(&["--demo", "edit", "3", "due", "none"]).unwrap();
        assert_eq!(
            options.action,
            Action::Edit {
                row: RowIndex::new(3),
                field: LessonField::DueDate,
                value: FieldValue::Date(None),
            }
        );
    }

    #[test]
    fn add_collects_draft_flags() {
        let options = parse(&[
            "--demo", "add", "--assignee", "Ren", "--title", "Shading", "--due", "2024-06-01",
            "--step", "Kickoff",
        ])
        .unwrap();
        let Action::Add(draft) = options.action else {
            panic!("expected add");
        };
        assert_eq!(draft.assignee, "Ren");
        assert_eq!(draft.due_date, NaiveDate::from_ymd_opt(2024, 6, 1));
        assert_eq!(draft.initial_steps, vec![StepName::new("Kickoff")]);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            parse(&["--demo", "toggle", "x", "Kickoff", "on"]),
            Err(ArgsError::InvalidRow { .. })
        ));
        assert!(matches!(
            parse(&["--demo", "toggle", "2", "Kickoff", "maybe"]),
            Err(ArgsError::InvalidToggle { .. })
        ));
        assert!(matches!(
            parse(&["--demo", "--today", "10/05/2024"]),
            Err(ArgsError::InvalidDate { .. })
        ));
        assert!(matches!(
            parse(&["--demo", "publish"]),
            Err(ArgsError::UnknownCommand(_))
        ));
    }
}
