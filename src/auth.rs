//! Bearer credentials attached to outbound calls.

/// Supplies the bearer token for the next remote call.
///
/// Called once per request so a provider can hand out refreshed tokens.
/// `None` means the call goes out anonymously.
pub trait TokenProvider: Send + Sync {
  fn bearer_token(&self) -> Option<String>;
}

/// A fixed token (or none at all).
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
  pub fn new(token: impl Into<String>) -> Self {
    Self(Some(token.into()))
  }

  pub fn anonymous() -> Self {
    Self(None)
  }
}

impl TokenProvider for StaticToken {
  fn bearer_token(&self) -> Option<String> {
    self.0.clone()
  }
}

/// Reads the token from the environment on every call.
///
/// Checks FIELDSYNC_TOKEN first, then FIELDSYNC_API_TOKEN as fallback.
#[derive(Debug, Clone)]
pub struct EnvToken {
  vars: Vec<String>,
}

impl EnvToken {
  pub fn new() -> Self {
    Self::with_vars(["FIELDSYNC_TOKEN", "FIELDSYNC_API_TOKEN"])
  }

  pub fn with_vars<I, S>(vars: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      vars: vars.into_iter().map(Into::into).collect(),
    }
  }
}

impl Default for EnvToken {
  fn default() -> Self {
    Self::new()
  }
}

impl TokenProvider for EnvToken {
  fn bearer_token(&self) -> Option<String> {
    self
      .vars
      .iter()
      .filter_map(|var| std::env::var(var).ok())
      .find(|token| !token.trim().is_empty())
  }
}
