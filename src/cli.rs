use clap::Parser;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Send a prompt to a chat-completion API and print the reply.
#[derive(Parser, Debug, Clone)]
#[command(name = "slm", version, long_about = None)]
pub struct Args {
    /// Model to use
    #[arg(short = 'm', long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Sampling temperature
    #[arg(short = 't', long, default_value_t = DEFAULT_TEMPERATURE, allow_negative_numbers = true)]
    pub temperature: f64,

    /// System prompt
    #[arg(short = 's', long = "system", default_value = "")]
    pub system_prompt: String,

    /// Continue the conversation stored in the history file
    #[arg(short = 'c', long = "continue", default_value_t = false)]
    pub continue_conversation: bool,

    /// Prompt text; read from standard input when omitted
    pub prompt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{Args, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
    use clap::Parser;

    #[test]
    fn defaults_apply_when_no_flags_are_given() {
        let args = Args::try_parse_from(["slm"]).expect("empty invocation should parse");
        assert_eq!(args.model, DEFAULT_MODEL);
        assert_eq!(args.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(args.system_prompt, "");
        assert!(!args.continue_conversation);
        assert_eq!(args.prompt, None);
    }

    #[test]
    fn short_flags_and_positional_prompt_are_parsed() {
        let args = Args::try_parse_from([
            "slm",
            "-m",
            "gpt-4o-mini",
            "-t",
            "1.2",
            "-s",
            "Be terse.",
            "-c",
            "what is ndb?",
        ])
        .expect("flags should parse");

        assert_eq!(args.model, "gpt-4o-mini");
        assert_eq!(args.temperature, 1.2);
        assert_eq!(args.system_prompt, "Be terse.");
        assert!(args.continue_conversation);
        assert_eq!(args.prompt.as_deref(), Some("what is ndb?"));
    }

    #[test]
    fn rejects_more_than_one_positional_prompt() {
        assert!(Args::try_parse_from(["slm", "one", "two"]).is_err());
    }

    #[test]
    fn rejects_non_numeric_temperature() {
        assert!(Args::try_parse_from(["slm", "-t", "warm", "hi"]).is_err());
    }
}
