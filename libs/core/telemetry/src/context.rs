//! Request-scoped ambient context.
//!
//! Middleware establishes a [`RequestContext`] at request entry; the log
//! layer reads it at enqueue time and attaches its fields to every record,
//! so dashboards can filter by user, session, organization, intelligence
//! level, and app identity without callers passing those values around.
//!
//! Async code wraps its work in [`scope`]; synchronous code installs a
//! thread-local guard with [`install`]. Re-installing replaces the previous
//! value, and the layer reads the context once per record, so repeated
//! installation never duplicates attributes.

use crate::record::AttributeValue;
use std::cell::RefCell;
use std::future::Future;

/// Identity fields attached to every log record while in scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub organization_id: Option<String>,
    pub intelligence_level: Option<String>,
    pub app_name: Option<String>,
    pub app_version: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_organization_id(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    pub fn with_intelligence_level(mut self, level: impl Into<String>) -> Self {
        self.intelligence_level = Some(level.into());
        self
    }

    pub fn with_app(mut self, name: impl Into<String>, version: Option<String>) -> Self {
        self.app_name = Some(name.into());
        self.app_version = version;
        self
    }

    /// The attribute pairs this context contributes to a record.
    pub fn attributes(&self) -> Vec<(String, AttributeValue)> {
        let mut attrs = Vec::new();
        let mut push = |key: &str, value: &Option<String>| {
            if let Some(value) = value {
                attrs.push((key.to_string(), AttributeValue::Str(value.clone())));
            }
        };
        push("user.id", &self.user_id);
        push("session.id", &self.session_id);
        push("organization.id", &self.organization_id);
        push("intelligence.level", &self.intelligence_level);
        push("client.app.name", &self.app_name);
        push("client.app.version", &self.app_version);
        attrs
    }
}

tokio::task_local! {
    static TASK_CONTEXT: RequestContext;
}

thread_local! {
    static THREAD_CONTEXT: RefCell<Option<RequestContext>> = const { RefCell::new(None) };
}

/// Run a future with the given context as its ambient request context.
pub async fn scope<F: Future>(context: RequestContext, future: F) -> F::Output {
    TASK_CONTEXT.scope(context, future).await
}

/// Install a thread-local context for synchronous code.
///
/// The context is cleared when the returned guard drops. Installing over an
/// existing context replaces it.
pub fn install(context: RequestContext) -> ContextGuard {
    THREAD_CONTEXT.with(|cell| *cell.borrow_mut() = Some(context));
    ContextGuard { _private: () }
}

/// Clears the thread-local context on drop.
pub struct ContextGuard {
    _private: (),
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        THREAD_CONTEXT.with(|cell| *cell.borrow_mut() = None);
    }
}

/// The context visible to the current task or thread, if any.
///
/// A task-scoped context wins over a thread-local one.
pub fn current() -> Option<RequestContext> {
    if let Ok(context) = TASK_CONTEXT.try_with(|context| context.clone()) {
        return Some(context);
    }
    THREAD_CONTEXT.with(|cell| cell.borrow().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RequestContext {
        RequestContext::new()
            .with_user_id("u-1")
            .with_session_id("s-9")
            .with_organization_id("org-2")
            .with_intelligence_level("standard")
            .with_app("answering-service", Some("1.2.3".to_string()))
    }

    #[test]
    fn test_attributes_skip_unset_fields() {
        let attrs = RequestContext::new().with_user_id("u-1").attributes();
        assert_eq!(
            attrs,
            vec![("user.id".to_string(), AttributeValue::Str("u-1".to_string()))]
        );
    }

    #[test]
    fn test_attribute_keys() {
        let keys: Vec<String> = sample().attributes().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "user.id",
                "session.id",
                "organization.id",
                "intelligence.level",
                "client.app.name",
                "client.app.version",
            ]
        );
    }

    #[test]
    fn test_thread_local_install_and_clear() {
        assert!(current().is_none());

        {
            let _guard = install(sample());
            assert_eq!(current().unwrap().user_id.as_deref(), Some("u-1"));

            // Re-installing replaces rather than stacking.
            let _guard2 = install(RequestContext::new().with_user_id("u-2"));
            assert_eq!(current().unwrap().user_id.as_deref(), Some("u-2"));
        }

        assert!(current().is_none());
    }

    #[tokio::test]
    async fn test_task_scope_wins_over_thread_local() {
        let _guard = install(RequestContext::new().with_user_id("thread"));

        let seen = scope(RequestContext::new().with_user_id("task"), async {
            current().unwrap().user_id
        })
        .await;

        assert_eq!(seen.as_deref(), Some("task"));
        assert_eq!(current().unwrap().user_id.as_deref(), Some("thread"));
    }

    #[tokio::test]
    async fn test_scope_clears_after_future_completes() {
        scope(sample(), async {
            assert!(current().is_some());
        })
        .await;
        assert!(current().is_none());
    }
}
