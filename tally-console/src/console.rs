//! Console command parsing

use tally_core::{LampChannel, MixerInputId};
use thiserror::Error;

/// Help text shown by `help`
pub const HELP: &str = "\
Commands:
  status                  show switcher, lamps and mapping
  ports                   list serial ports
  connect <address>       connect to a switcher
  disconnect              disconnect from the switcher
  open <port> [baud]      open the lamp panel on a serial port
  open-virtual            drive a simulated lamp panel
  close                   blank and close the lamp panel
  map                     show slot assignments
  map <slot> <lamp|->     assign a slot to a lamp (or clear it)
  test                    light every lamp
  end                     finish the lamp test
  sim program <id>        put an input on program
  sim preview <id>        put an input on preview
  sim live on|off         start or finish a transition
  sim drop                drop the switcher connection
  quit                    exit";

/// Errors from parsing a console line
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("unknown command: {0} (try 'help')")]
    UnknownCommand(String),

    #[error("missing {0}")]
    MissingArgument(&'static str),

    #[error("not a number: {0}")]
    InvalidNumber(String),

    #[error("no such lamp: {0} (lamps are numbered from 1)")]
    InvalidLamp(String),

    #[error("expected 'on' or 'off', got {0}")]
    InvalidToggle(String),
}

/// A parsed console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Help,
    Status,
    Ports,
    Connect(String),
    Disconnect,
    Open { port: String, baud_rate: Option<u32> },
    OpenVirtual,
    Close,
    ShowMap,
    SetSlot { slot: usize, lamp: Option<LampChannel> },
    StartTest,
    EndTest,
    SimProgram(MixerInputId),
    SimPreview(MixerInputId),
    SimLive(bool),
    SimDrop,
    Quit,
}

impl ConsoleCommand {
    /// Parse one input line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>, ConsoleError> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Ok(None);
        };

        let cmd = match word.to_ascii_lowercase().as_str() {
            "help" | "?" => Self::Help,
            "status" => Self::Status,
            "ports" => Self::Ports,
            "connect" => Self::Connect(required(words.next(), "switcher address")?.to_string()),
            "disconnect" => Self::Disconnect,
            "open" => Self::Open {
                port: required(words.next(), "port")?.to_string(),
                baud_rate: words.next().map(number::<u32>).transpose()?,
            },
            "open-virtual" => Self::OpenVirtual,
            "close" => Self::Close,
            "map" => match words.next() {
                None => Self::ShowMap,
                Some(slot) => Self::SetSlot {
                    slot: number(slot)?,
                    lamp: lamp(required(words.next(), "lamp")?)?,
                },
            },
            "test" => Self::StartTest,
            "end" => Self::EndTest,
            "sim" => Self::parse_sim(&mut words)?,
            "quit" | "exit" => Self::Quit,
            other => return Err(ConsoleError::UnknownCommand(other.to_string())),
        };

        Ok(Some(cmd))
    }

    fn parse_sim<'a>(words: &mut impl Iterator<Item = &'a str>) -> Result<Self, ConsoleError> {
        match required(words.next(), "sim action")? {
            "program" => Ok(Self::SimProgram(number(required(words.next(), "input")?)?)),
            "preview" => Ok(Self::SimPreview(number(required(words.next(), "input")?)?)),
            "live" => match required(words.next(), "on|off")? {
                "on" => Ok(Self::SimLive(true)),
                "off" => Ok(Self::SimLive(false)),
                other => Err(ConsoleError::InvalidToggle(other.to_string())),
            },
            "drop" => Ok(Self::SimDrop),
            other => Err(ConsoleError::UnknownCommand(format!("sim {}", other))),
        }
    }
}

fn required<'a>(word: Option<&'a str>, what: &'static str) -> Result<&'a str, ConsoleError> {
    word.ok_or(ConsoleError::MissingArgument(what))
}

fn number<T: std::str::FromStr>(word: &str) -> Result<T, ConsoleError> {
    word.parse()
        .map_err(|_| ConsoleError::InvalidNumber(word.to_string()))
}

/// Operator lamp number (1-based) or `-` for none
fn lamp(word: &str) -> Result<Option<LampChannel>, ConsoleError> {
    if word == "-" {
        return Ok(None);
    }
    let n: u8 = number(word)?;
    n.checked_sub(1)
        .and_then(LampChannel::new)
        .map(Some)
        .ok_or_else(|| ConsoleError::InvalidLamp(word.to_string()))
}
