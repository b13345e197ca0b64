use crate::cli::Args;

/// Supplies the identity every store read, write and subscription is scoped to.
pub trait SessionContext: Send + Sync {
    fn user_id(&self) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StaticSession {
    user_id: Option<String>,
}

impl StaticSession {
    pub fn authenticated(user_id: impl Into<String>) -> Self {
        Self { user_id: Some(user_id.into()) }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn from_args(args: &Args) -> Self {
        match args.user_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Self::authenticated(id),
            _ => Self::anonymous(),
        }
    }
}

impl SessionContext for StaticSession {
    fn user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn blank_user_id_is_anonymous() {
        let args = Args::try_parse_from(["mechamind", "--user-id", "  "]).unwrap();
        assert_eq!(StaticSession::from_args(&args).user_id(), None);

        let args = Args::try_parse_from(["mechamind", "--user-id", "u1"]).unwrap();
        assert_eq!(StaticSession::from_args(&args).user_id().as_deref(), Some("u1"));
    }
}
