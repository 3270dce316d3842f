pub const HELP_TEXT: &str = "\
Commands:
  /help                     show this help
  /clear                    clear the transcript and artifacts
  /cancel                   stop the streaming reply
  /quit                     exit
  /brains                   list installed brains and personas
  /brain [name]             show or select the brain for new turns
  /artifacts                list generated files
  /run                      execute the entry-point artifact
  /chat <text>              one-shot reply without streaming
  /vision <path> [prompt]   describe an image
  /voice <path>             transcribe audio and send it as a turn
  /speak <text> <out.wav>   synthesize speech to a file
  /stats                    show line counters and the active agent";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Clear,
    Cancel,
    Quit,
    Brains,
    Brain(Option<String>),
    Artifacts,
    Run,
    Chat(String),
    Vision { path: String, prompt: Option<String> },
    Voice(String),
    Speak { text: String, out: String },
    Stats,
    Usage(&'static str),
    Unknown(String),
}

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };

    let parsed = match command {
        "/help" => SlashCommand::Help,
        "/clear" => SlashCommand::Clear,
        "/cancel" => SlashCommand::Cancel,
        "/quit" | "/exit" => SlashCommand::Quit,
        "/brains" => SlashCommand::Brains,
        "/brain" => SlashCommand::Brain(non_empty(rest)),
        "/artifacts" => SlashCommand::Artifacts,
        "/run" => SlashCommand::Run,
        "/stats" => SlashCommand::Stats,
        "/chat" => match non_empty(rest) {
            Some(text) => SlashCommand::Chat(text),
            None => SlashCommand::Usage("/chat <text>"),
        },
        "/vision" => match rest.split_once(char::is_whitespace) {
            Some((path, prompt)) => SlashCommand::Vision {
                path: path.to_string(),
                prompt: non_empty(prompt),
            },
            None if !rest.is_empty() => SlashCommand::Vision {
                path: rest.to_string(),
                prompt: None,
            },
            None => SlashCommand::Usage("/vision <path> [prompt]"),
        },
        "/voice" => match non_empty(rest) {
            Some(path) => SlashCommand::Voice(path),
            None => SlashCommand::Usage("/voice <path>"),
        },
        "/speak" => match rest.rsplit_once(char::is_whitespace) {
            Some((text, out)) if !text.trim().is_empty() => SlashCommand::Speak {
                text: text.trim().to_string(),
                out: out.to_string(),
            },
            _ => SlashCommand::Usage("/speak <text> <out.wav>"),
        },
        _ => SlashCommand::Unknown(command.to_string()),
    };

    Some(parsed)
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_slash_command("hello /help"), None);
    }

    #[test]
    fn bare_commands_parse() {
        assert_eq!(parse_slash_command(" /help "), Some(SlashCommand::Help));
        assert_eq!(parse_slash_command("/exit"), Some(SlashCommand::Quit));
        assert_eq!(parse_slash_command("/brain"), Some(SlashCommand::Brain(None)));
        assert_eq!(
            parse_slash_command("/nope x"),
            Some(SlashCommand::Unknown("/nope".to_string()))
        );
    }

    #[test]
    fn argument_commands_split_their_arguments() {
        assert_eq!(
            parse_slash_command("/brain  architect "),
            Some(SlashCommand::Brain(Some("architect".to_string())))
        );
        assert_eq!(
            parse_slash_command("/chat what is rust?"),
            Some(SlashCommand::Chat("what is rust?".to_string()))
        );
        assert_eq!(
            parse_slash_command("/vision cat.png what breed is it"),
            Some(SlashCommand::Vision {
                path: "cat.png".to_string(),
                prompt: Some("what breed is it".to_string()),
            })
        );
        assert_eq!(
            parse_slash_command("/vision cat.png"),
            Some(SlashCommand::Vision {
                path: "cat.png".to_string(),
                prompt: None,
            })
        );
        assert_eq!(
            parse_slash_command("/speak hello there out.wav"),
            Some(SlashCommand::Speak {
                text: "hello there".to_string(),
                out: "out.wav".to_string(),
            })
        );
    }

    #[test]
    fn missing_arguments_report_usage() {
        assert_eq!(
            parse_slash_command("/chat"),
            Some(SlashCommand::Usage("/chat <text>"))
        );
        assert_eq!(
            parse_slash_command("/speak out.wav"),
            Some(SlashCommand::Usage("/speak <text> <out.wav>"))
        );
        assert_eq!(
            parse_slash_command("/voice"),
            Some(SlashCommand::Usage("/voice <path>"))
        );
        assert_eq!(
            parse_slash_command("/vision"),
            Some(SlashCommand::Usage("/vision <path> [prompt]"))
        );
    }
}
