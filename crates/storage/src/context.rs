//! Execution and authentication context.

/// Where the storage service is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Browser/client SDK.
    #[default]
    Client,
    /// Server process using the restricted client SDK.
    Server,
    /// Server process with admin credentials.
    ServerPrivileged,
}

/// Capabilities of the calling environment, consulted at the top of each
/// operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    mode: ExecutionMode,
    display_width: Option<u32>,
}

impl ExecutionContext {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            display_width: None,
        }
    }

    pub fn client() -> Self {
        Self::new(ExecutionMode::Client)
    }

    pub fn server() -> Self {
        Self::new(ExecutionMode::Server)
    }

    pub fn server_privileged() -> Self {
        Self::new(ExecutionMode::ServerPrivileged)
    }

    /// Width of the caller's display, used for `"device"` size requests.
    pub fn with_display_width(mut self, width: u32) -> Self {
        self.display_width = Some(width);
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn is_server_privileged(&self) -> bool {
        self.mode == ExecutionMode::ServerPrivileged
    }

    /// True for any server process, privileged or not.
    pub fn is_server(&self) -> bool {
        matches!(
            self.mode,
            ExecutionMode::Server | ExecutionMode::ServerPrivileged
        )
    }

    pub fn display_width(&self) -> Option<u32> {
        self.display_width
    }
}

/// Identity of the user performing an operation.
pub trait AuthContext: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}

/// No signed-in user.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl AuthContext for Anonymous {
    fn current_user_id(&self) -> Option<String> {
        None
    }
}

/// A fixed user id.
#[derive(Debug, Clone)]
pub struct FixedUser(pub String);

impl FixedUser {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self(user_id.into())
    }
}

impl AuthContext for FixedUser {
    fn current_user_id(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes() {
        let client = ExecutionContext::default();
        assert!(!client.is_server());
        assert!(!client.is_server_privileged());

        let server = ExecutionContext::server();
        assert!(server.is_server());
        assert!(!server.is_server_privileged());

        let admin = ExecutionContext::server_privileged().with_display_width(1280);
        assert!(admin.is_server());
        assert!(admin.is_server_privileged());
        assert_eq!(admin.display_width(), Some(1280));
    }

    #[test]
    fn auth() {
        assert_eq!(Anonymous.current_user_id(), None);
        assert_eq!(FixedUser::new("u1").current_user_id().as_deref(), Some("u1"));
    }
}
