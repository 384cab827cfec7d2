//! Caller identity

/// Who is making a request. Conversations are owned by `user`; callers
/// without one only see anonymous conversations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Caller {
    user: Option<String>,
}

impl Caller {
    /// Blank names are treated as anonymous
    pub fn new(user: Option<impl Into<String>>) -> Self {
        let user = user.map(Into::into).filter(|u: &String| !u.trim().is_empty());
        Self { user }
    }

    pub fn user_named(user: impl Into<String>) -> Self {
        Self::new(Some(user))
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_user_is_anonymous() {
        assert_eq!(Caller::new(Some("  ")), Caller::anonymous());
        assert!(!Caller::new(None::<String>).is_authenticated());
        assert_eq!(Caller::user_named("alice").user(), Some("alice"));
    }
}
