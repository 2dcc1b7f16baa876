//! 当前登录会话
//!
//! 不可变值，通过 `login` / `logout` 产生新的会话，由调用方显式传入上传会话。

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSession {
    token: Option<String>,
}

impl AuthSession {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// 空白 token 视为未登录
    pub fn with_token(token: impl Into<String>) -> Self {
        let token = token.into();
        let token = token.trim();
        Self {
            token: (!token.is_empty()).then(|| token.to_string()),
        }
    }

    pub fn login(self, token: impl Into<String>) -> Self {
        Self::with_token(token)
    }

    pub fn logout(self) -> Self {
        Self::anonymous()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}
