use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::models::{CameraSettings, CreatorAttributes};
use crate::utils::logging::LogStream;

pub const DEFAULT_LOG_LINES: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Key(KeyCommand),
    Run(RunArgs),
    Logs { stream: LogStream, lines: usize },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyCommand {
    Status,
    Set(String),
    Clear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IdentitySource {
    Photo(PathBuf),
    Create(CreatorAttributes),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunStep {
    Story { scenario: Option<String> },
    Studio(CameraSettings),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunArgs {
    pub source: IdentitySource,
    pub steps: Vec<RunStep>,
    pub out_dir: Option<PathBuf>,
}

pub fn usage() -> &'static str {
    "Usage:
  persona_studio key status | key set <value> | key clear
  persona_studio run (--photo <path> | --create [--random] [--gender <g>] [--age <n>] [--height <cm>] [--weight <kg>]
                      [--build <b>] [--ethnicity <e>] [--eye-color <c>] [--hair-style <s>] [--hair-color <c>]
                      [--fashion <f>] [--vibe <v>])
                     [--story [--scenario <text>]]... [--studio [--rotation <deg>] [--zoom <0-10>] [--vertical <-1..1>] [--wide]]...
                     [--out <dir>]
  persona_studio logs [--timing] [lines]"
}

fn next_value<'a>(args: &'a [String], index: &mut usize, flag: &str) -> Result<&'a str> {
    *index += 1;
    args.get(*index)
        .map(|value| value.as_str())
        .ok_or_else(|| anyhow!("Missing value for {flag}"))
}

fn parse_number<T: std::str::FromStr>(value: &str, flag: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| anyhow!("Invalid {flag} value: {value}"))
}

/// Parses `std::env::args()`; the first element is the program name.
pub fn parse_args(args: &[String]) -> Result<Command> {
    match args.get(1).map(|value| value.as_str()) {
        None | Some("help" | "--help" | "-h") => Ok(Command::Help),
        Some("key") => parse_key_args(&args[2..]),
        Some("logs") => parse_logs_args(&args[2..]),
        Some("run") => parse_run_args(&args[2..]).map(Command::Run),
        Some(other) => Err(anyhow!("Unknown command: {other}\n{}", usage())),
    }
}

fn parse_logs_args(args: &[String]) -> Result<Command> {
    let mut stream = LogStream::Activity;
    let mut lines = DEFAULT_LOG_LINES;
    for arg in args {
        match arg.as_str() {
            "--timing" => stream = LogStream::Timing,
            value => lines = parse_number::<usize>(value, "logs")?,
        }
    }
    Ok(Command::Logs { stream, lines })
}

fn parse_key_args(args: &[String]) -> Result<Command> {
    let command = match args.first().map(|value| value.as_str()) {
        Some("status") | None => KeyCommand::Status,
        Some("set") => {
            let value = args
                .get(1)
                .ok_or_else(|| anyhow!("Missing value for key set"))?;
            KeyCommand::Set(value.clone())
        }
        Some("clear") => KeyCommand::Clear,
        Some(other) => return Err(anyhow!("Unknown key command: {other}\n{}", usage())),
    };
    Ok(Command::Key(command))
}

fn apply_attribute(attrs: &mut CreatorAttributes, flag: &str, value: &str) -> Result<()> {
    match flag {
        "--gender" => attrs.gender = value.parse()?,
        "--age" => attrs.age = parse_number(value, flag)?,
        "--height" => attrs.height_cm = parse_number(value, flag)?,
        "--weight" => attrs.weight_kg = parse_number(value, flag)?,
        "--build" => attrs.build = value.parse()?,
        "--ethnicity" => attrs.ethnicity = value.parse()?,
        "--eye-color" => attrs.eye_color = value.parse()?,
        "--hair-style" => attrs.hair_style = value.parse()?,
        "--hair-color" => attrs.hair_color = value.parse()?,
        "--fashion" => attrs.fashion_style = value.parse()?,
        "--vibe" => attrs.vibe = value.parse()?,
        _ => return Err(anyhow!("Unknown attribute flag: {flag}")),
    }
    Ok(())
}

fn last_studio<'a>(steps: &'a mut [RunStep], flag: &str) -> Result<&'a mut CameraSettings> {
    match steps.last_mut() {
        Some(RunStep::Studio(settings)) => Ok(settings),
        _ => Err(anyhow!("{flag} must follow --studio")),
    }
}

fn parse_run_args(args: &[String]) -> Result<RunArgs> {
    let mut photo: Option<PathBuf> = None;
    let mut create = false;
    let mut random = false;
    let mut overrides: Vec<(String, String)> = Vec::new();
    let mut steps: Vec<RunStep> = Vec::new();
    let mut out_dir = None;

    let mut index = 0;
    while index < args.len() {
        let flag = args[index].as_str();
        match flag {
            "--photo" => {
                photo = Some(PathBuf::from(next_value(args, &mut index, flag)?));
            }
            "--create" => create = true,
            "--random" => random = true,
            "--gender" | "--age" | "--height" | "--weight" | "--build" | "--ethnicity"
            | "--eye-color" | "--hair-style" | "--hair-color" | "--fashion" | "--vibe" => {
                let value = next_value(args, &mut index, flag)?;
                overrides.push((flag.to_string(), value.to_string()));
            }
            "--story" => steps.push(RunStep::Story { scenario: None }),
            "--scenario" => {
                let value = next_value(args, &mut index, flag)?;
                match steps.last_mut() {
                    Some(RunStep::Story { scenario }) => *scenario = Some(value.to_string()),
                    _ => return Err(anyhow!("--scenario must follow --story")),
                }
            }
            "--studio" => steps.push(RunStep::Studio(CameraSettings::default())),
            "--rotation" => {
                let value = parse_number::<i32>(next_value(args, &mut index, flag)?, flag)?;
                last_studio(&mut steps, flag)?.rotation = value;
            }
            "--zoom" => {
                let value = parse_number::<u8>(next_value(args, &mut index, flag)?, flag)?;
                last_studio(&mut steps, flag)?.zoom = value;
            }
            "--vertical" => {
                let value = parse_number::<f32>(next_value(args, &mut index, flag)?, flag)?;
                last_studio(&mut steps, flag)?.vertical = value;
            }
            "--wide" => last_studio(&mut steps, flag)?.is_wide_angle = true,
            "--out" => {
                out_dir = Some(PathBuf::from(next_value(args, &mut index, flag)?));
            }
            other => {
                return Err(anyhow!("Unknown run argument: {other}\n{}", usage()));
            }
        }
        index += 1;
    }

    let source = match (photo, create) {
        (Some(_), true) => return Err(anyhow!("Use either --photo or --create, not both")),
        (Some(path), false) => {
            if random || !overrides.is_empty() {
                return Err(anyhow!("Attribute flags require --create"));
            }
            IdentitySource::Photo(path)
        }
        (None, true) => {
            let mut attrs = if random {
                CreatorAttributes::random(&mut rand::thread_rng())
            } else {
                CreatorAttributes::default()
            };
            for (flag, value) in &overrides {
                apply_attribute(&mut attrs, flag, value)?;
            }
            IdentitySource::Create(attrs)
        }
        (None, false) => return Err(anyhow!("run needs --photo <path> or --create")),
    };

    Ok(RunArgs {
        source,
        steps,
        out_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, Vibe};

    fn args(line: &str) -> Vec<String> {
        std::iter::once("persona_studio")
            .chain(line.split_whitespace())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn parses_key_commands() {
        assert_eq!(
            parse_args(&args("key set abc")).unwrap(),
            Command::Key(KeyCommand::Set("abc".into()))
        );
        assert_eq!(
            parse_args(&args("key")).unwrap(),
            Command::Key(KeyCommand::Status)
        );
        assert!(parse_args(&args("key set")).is_err());
    }

    #[test]
    fn logs_picks_stream_and_line_count() {
        assert_eq!(
            parse_args(&args("logs")).unwrap(),
            Command::Logs {
                stream: LogStream::Activity,
                lines: DEFAULT_LOG_LINES
            }
        );
        assert_eq!(
            parse_args(&args("logs --timing 5")).unwrap(),
            Command::Logs {
                stream: LogStream::Timing,
                lines: 5
            }
        );
        assert!(parse_args(&args("logs many")).is_err());
    }

    #[test]
    fn run_collects_steps_in_order() {
        let command =
            parse_args(&args("run --photo me.png --story --scenario Beach --studio --rotation 45 --zoom 5 --wide --story --out shots"))
                .unwrap();
        let Command::Run(run) = command else {
            panic!("expected run");
        };
        assert_eq!(run.source, IdentitySource::Photo(PathBuf::from("me.png")));
        assert_eq!(run.out_dir, Some(PathBuf::from("shots")));
        assert_eq!(
            run.steps,
            vec![
                RunStep::Story {
                    scenario: Some("Beach".into())
                },
                RunStep::Studio(CameraSettings {
                    rotation: 45,
                    zoom: 5,
                    vertical: 0.0,
                    is_wide_angle: true,
                }),
                RunStep::Story { scenario: None },
            ]
        );
    }

    #[test]
    fn create_applies_overrides_on_defaults() {
        let Command::Run(run) =
            parse_args(&args("run --create --gender man --age 30 --vibe mysterious")).unwrap()
        else {
            panic!("expected run");
        };
        let IdentitySource::Create(attrs) = run.source else {
            panic!("expected create");
        };
        assert_eq!(attrs.gender, Gender::Man);
        assert_eq!(attrs.age, 30);
        assert_eq!(attrs.vibe, Vibe::Mysterious);
        assert_eq!(attrs.height_cm, CreatorAttributes::default().height_cm);
    }

    #[test]
    fn rejects_misplaced_or_conflicting_flags() {
        assert!(parse_args(&args("run --photo a.png --create")).is_err());
        assert!(parse_args(&args("run --photo a.png --age 30")).is_err());
        assert!(parse_args(&args("run --create --scenario Beach")).is_err());
        assert!(parse_args(&args("run --create --zoom 3")).is_err());
        assert!(parse_args(&args("run --story")).is_err());
        assert!(parse_args(&args("run --create --gender robot")).is_err());
    }
}
