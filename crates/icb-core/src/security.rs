use crate::{config::Config, domain::User};

// ============== Authorization ==============

/// Whether `user` may run elevated commands and admin actions.
pub fn can_run_elevated(cfg: &Config, user: &User) -> bool {
    cfg.is_moderator(user)
}

/// How many whitespace tokens (keyword included) an admin action needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenRule {
    AtLeast(usize),
    Exactly(usize),
}

impl TokenRule {
    pub fn accepts(self, tokens: usize) -> bool {
        match self {
            TokenRule::AtLeast(n) => tokens >= n,
            TokenRule::Exactly(n) => tokens == n,
        }
    }
}

/// Gate for the built-in admin actions. A `false` here is never reported to chat.
pub fn may_run_admin(cfg: &Config, user: &User, tokens: usize, rule: TokenRule) -> bool {
    can_run_elevated(cfg, user) && rule.accepts(tokens)
}
