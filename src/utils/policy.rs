// src/utils/policy.rs

use std::{collections::HashSet, sync::Arc};

/// The admin allow-list. Built once from configuration and shared by every
/// admin route through state, so there is exactly one list to maintain.
#[derive(Debug, Clone, Default)]
pub struct AdminPolicy {
    emails: Arc<HashSet<String>>,
}

impl AdminPolicy {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let emails = emails
            .into_iter()
            .map(|e| normalize(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        Self {
            emails: Arc::new(emails),
        }
    }

    /// Emails are compared case-insensitively; a caller without an email is
    /// never an admin.
    pub fn is_admin(&self, email: Option<&str>) -> bool {
        email.is_some_and(|e| self.emails.contains(&normalize(e)))
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_case_insensitively() {
        let policy = AdminPolicy::new(["Admin@G8.dev", " ops@g8.dev "]);
        assert!(policy.is_admin(Some("admin@g8.dev")));
        assert!(policy.is_admin(Some("OPS@g8.dev")));
        assert!(!policy.is_admin(Some("student@g8.dev")));
        assert!(!policy.is_admin(None));
    }

    #[test]
    fn empty_policy_admits_nobody() {
        let policy = AdminPolicy::new(Vec::<String>::new());
        assert!(policy.is_empty());
        assert!(!policy.is_admin(Some("")));
    }
}
