//! Chat commands and the ordered keyword registry.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{domain::User, formatting::format_response};

/// A keyword-triggered reply.
///
/// Prefixes such as `!` are part of `keyword`; nothing is special-cased.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawChatCommand")]
pub struct ChatCommand {
    pub keyword: String,
    /// Reply template. See [`format_response`] for the placeholders.
    pub response: String,
    /// Fixed number of arguments; there is no variadic form.
    pub arg_count: usize,
    /// Gated on the moderator list.
    pub elevated: bool,
    /// Sent when the argument count does not match. `None` means stay silent.
    pub usage_help: Option<String>,
}

/// On-disk shape: a missing `usageHelp` defaults to the response, while an
/// explicit `null` disables the usage reply.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChatCommand {
    #[serde(default)]
    keyword: String,
    #[serde(default)]
    response: String,
    #[serde(default)]
    arg_count: usize,
    #[serde(default)]
    elevated: bool,
    #[serde(default, deserialize_with = "present_option")]
    usage_help: Option<Option<String>>,
}

fn present_option<'de, D>(d: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(d).map(Some)
}

impl From<RawChatCommand> for ChatCommand {
    fn from(raw: RawChatCommand) -> Self {
        let usage_help = raw.usage_help.unwrap_or_else(|| Some(raw.response.clone()));
        Self {
            keyword: raw.keyword,
            response: raw.response,
            arg_count: raw.arg_count,
            elevated: raw.elevated,
            usage_help,
        }
    }
}

impl ChatCommand {
    pub fn new(keyword: impl Into<String>, response: impl Into<String>, arg_count: usize) -> Self {
        let response = response.into();
        Self {
            keyword: keyword.into(),
            usage_help: Some(response.clone()),
            response,
            arg_count,
            elevated: false,
        }
    }

    /// Build a command the way `!addcommand` does: the arity is half the
    /// number of `%` characters in the template, placeholder names unchecked.
    pub fn from_template(keyword: impl Into<String>, template: impl Into<String>) -> Self {
        let template = template.into();
        let arg_count = template.matches('%').count() / 2;
        Self::new(keyword, template, arg_count)
    }

    pub fn elevated(mut self, elevated: bool) -> Self {
        self.elevated = elevated;
        self
    }

    pub fn with_usage_help(mut self, usage_help: Option<String>) -> Self {
        self.usage_help = usage_help;
        self
    }

    pub fn render<S: AsRef<str>>(&self, args: &[S], sender: &User) -> String {
        format_response(&self.response, self.arg_count, args, sender)
    }
}

impl fmt::Display for ChatCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} | {} args -> {}",
            self.keyword,
            if self.elevated { " | elevated" } else { "" },
            self.arg_count,
            self.response
        )
    }
}

/// Commands in registration order.
///
/// Lookup is a linear first-match scan, so a keyword registered twice keeps
/// resolving to the first entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandRegistry {
    commands: Vec<ChatCommand>,
}

impl CommandRegistry {
    pub fn new(commands: Vec<ChatCommand>) -> Self {
        Self { commands }
    }

    pub fn find(&self, keyword: &str) -> Option<&ChatCommand> {
        self.commands.iter().find(|c| c.keyword == keyword)
    }

    pub fn register(&mut self, command: ChatCommand) {
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatCommand> {
        self.commands.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_registered_keyword_wins() {
        let mut reg = CommandRegistry::default();
        reg.register(ChatCommand::new("!so", "first", 0));
        reg.register(ChatCommand::new("!so", "second", 0));

        assert_eq!(reg.find("!so").map(|c| c.response.as_str()), Some("first"));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn lookup_is_exact_and_case_sensitive() {
        let reg = CommandRegistry::new(vec![ChatCommand::new("!discord", "link", 0)]);
        assert!(reg.find("!discord").is_some());
        assert!(reg.find("!Discord").is_none());
        assert!(reg.find("discord").is_none());
        assert!(reg.find("!discord ").is_none());
    }

    #[test]
    fn template_arity_counts_percent_signs() {
        let cmd = ChatCommand::from_template("test", "Hello %arg0%, %arg1%!");
        assert_eq!(cmd.arg_count, 2);
        assert_eq!(cmd.usage_help.as_deref(), Some("Hello %arg0%, %arg1%!"));
        assert!(!cmd.elevated);

        // Stray percent signs skew the arity.
        let skewed = ChatCommand::from_template("!sale", "100% off, %arg0%");
        assert_eq!(skewed.arg_count, 1);
        let odd = ChatCommand::from_template("!odd", "50% %arg0%");
        assert_eq!(odd.arg_count, 1);
    }

    #[test]
    fn usage_help_defaults_to_response_unless_null() {
        let absent: ChatCommand =
            serde_json::from_str(r#"{"keyword":"!a","response":"resp","argCount":1}"#).unwrap();
        assert_eq!(absent.usage_help.as_deref(), Some("resp"));

        let null: ChatCommand = serde_json::from_str(
            r#"{"keyword":"!a","response":"resp","argCount":1,"usageHelp":null}"#,
        )
        .unwrap();
        assert_eq!(null.usage_help, None);

        let explicit: ChatCommand = serde_json::from_str(
            r#"{"keyword":"!a","response":"resp","usageHelp":"Usage: !a <x>","elevated":true}"#,
        )
        .unwrap();
        assert_eq!(explicit.usage_help.as_deref(), Some("Usage: !a <x>"));
        assert!(explicit.elevated);
        assert_eq!(explicit.arg_count, 0);
    }

    #[test]
    fn suppressed_usage_help_survives_a_save() {
        let cmd = ChatCommand::new("!quiet", "shh %arg0%", 1).with_usage_help(None);
        let json = serde_json::to_string(&cmd).unwrap();
        let back: ChatCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn display_marks_elevated_commands() {
        let cmd = ChatCommand::new("!ban", "banned %arg0%", 1).elevated(true);
        assert_eq!(cmd.to_string(), "!ban | elevated | 1 args -> banned %arg0%");
    }
}
