//! Platform-agnostic command surface and its text parser.

use crate::{domain::Snowflake, errors::Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlobalList {
    Whitelist,
    Blacklist,
}

impl GlobalList {
    pub fn name(self) -> &'static str {
        match self {
            GlobalList::Whitelist => "whitelist",
            GlobalList::Blacklist => "blacklist",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamCommand {
    Create { name: String },
    Delete { name: String },
    /// `channel: None` means the requesting location.
    Subscribe { name: String, channel: Option<Snowflake> },
    Unsubscribe { name: String, channel: Option<Snowflake> },
    Authorize { name: String, id: Snowflake },
    Unauthorize { name: String, id: Snowflake },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListCommand {
    Add(Snowflake),
    Remove(Snowflake),
    View,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    About,
    Stream(StreamCommand),
    List(GlobalList, ListCommand),
}

impl Command {
    /// Short label used in logs and the audit trail.
    pub fn label(&self) -> String {
        match self {
            Command::Help => "help".to_string(),
            Command::About => "about".to_string(),
            Command::Stream(s) => {
                let sub = match s {
                    StreamCommand::Create { .. } => "create",
                    StreamCommand::Delete { .. } => "delete",
                    StreamCommand::Subscribe { .. } => "subscribe",
                    StreamCommand::Unsubscribe { .. } => "unsubscribe",
                    StreamCommand::Authorize { .. } => "authorize",
                    StreamCommand::Unauthorize { .. } => "unauthorize",
                };
                format!("stream {sub}")
            }
            Command::List(list, op) => {
                let sub = match op {
                    ListCommand::Add(_) => "add",
                    ListCommand::Remove(_) => "remove",
                    ListCommand::View => "view",
                };
                format!("{} {sub}", list.name())
            }
        }
    }
}

pub const USAGE: &str = "/about\n\
/stream create <name>\n\
/stream delete <name>\n\
/stream subscribe <name> [channel]\n\
/stream unsubscribe <name> [channel]\n\
/stream authorize <name> <id>\n\
/stream unauthorize <name> <id>\n\
/whitelist add|remove <id>\n\
/whitelist view\n\
/blacklist add|remove <id>\n\
/blacklist view";

/// Split `/cmd@botname rest...` into the lowercased command name and the rest.
pub fn split_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// The `@botname` a command line is addressed to, if any.
pub fn addressee(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    let (_, name) = first.split_once('@')?;
    Some(name).filter(|n| !n.is_empty())
}

/// Parse a full command line. `Ok(None)` means "not one of ours".
pub fn parse(text: &str) -> Result<Option<Command>> {
    let (cmd, rest) = split_command(text);
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match cmd.as_str() {
        "start" | "help" => Command::Help,
        "about" => Command::About,
        "stream" => Command::Stream(parse_stream(&args)?),
        "whitelist" => Command::List(GlobalList::Whitelist, parse_list("whitelist", &args)?),
        "blacklist" => Command::List(GlobalList::Blacklist, parse_list("blacklist", &args)?),
        _ => return Ok(None),
    };
    Ok(Some(command))
}

fn parse_stream(args: &[&str]) -> Result<StreamCommand> {
    let Some((sub, rest)) = args.split_first() else {
        return Err(usage(
            "/stream <create|delete|subscribe|unsubscribe|authorize|unauthorize> <name> ...",
        ));
    };

    let sub = sub.to_lowercase();
    match (sub.as_str(), rest) {
        ("create", [name]) => Ok(StreamCommand::Create {
            name: name.to_string(),
        }),
        ("delete", [name]) => Ok(StreamCommand::Delete {
            name: name.to_string(),
        }),
        ("subscribe", [name]) => Ok(StreamCommand::Subscribe {
            name: name.to_string(),
            channel: None,
        }),
        ("subscribe", [name, channel]) => Ok(StreamCommand::Subscribe {
            name: name.to_string(),
            channel: Some(Snowflake::from(*channel)),
        }),
        ("unsubscribe", [name]) => Ok(StreamCommand::Unsubscribe {
            name: name.to_string(),
            channel: None,
        }),
        ("unsubscribe", [name, channel]) => Ok(StreamCommand::Unsubscribe {
            name: name.to_string(),
            channel: Some(Snowflake::from(*channel)),
        }),
        ("authorize", [name, id]) => Ok(StreamCommand::Authorize {
            name: name.to_string(),
            id: Snowflake::from(*id),
        }),
        ("unauthorize", [name, id]) => Ok(StreamCommand::Unauthorize {
            name: name.to_string(),
            id: Snowflake::from(*id),
        }),
        ("create" | "delete", _) => Err(usage(&format!("/stream {sub} <name>"))),
        ("subscribe" | "unsubscribe", _) => {
            Err(usage(&format!("/stream {sub} <name> [channel]")))
        }
        ("authorize" | "unauthorize", _) => Err(usage(&format!("/stream {sub} <name> <id>"))),
        _ => Err(usage(&format!("unknown stream command: {sub}"))),
    }
}

fn parse_list(list: &str, args: &[&str]) -> Result<ListCommand> {
    let sub = args.first().map(|s| s.to_lowercase()).unwrap_or_default();
    match (sub.as_str(), &args[args.len().min(1)..]) {
        ("add", [id]) => Ok(ListCommand::Add(Snowflake::from(*id))),
        ("remove", [id]) => Ok(ListCommand::Remove(Snowflake::from(*id))),
        ("view", []) => Ok(ListCommand::View),
        ("add" | "remove", _) => Err(usage(&format!("/{list} {sub} <id>"))),
        _ => Err(usage(&format!("/{list} <add|remove|view> [id]"))),
    }
}

fn usage(msg: &str) -> Error {
    Error::Usage(msg.to_string())
}
