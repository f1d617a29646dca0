//! 任务执行上下文
//!
//! 封装"当前任务以谁的身份、对哪个门户调用 API"这一信息。
//! 每个任务一个实例，随客户端一起传递，不使用进程级全局状态。

use std::fmt::Display;

/// 任务执行上下文
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    /// 控制器认证用的 secret
    pub secret: String,

    /// CRM 门户域名
    pub domain: String,

    /// CRM 访问令牌
    pub auth_token: String,
}

impl ExecutionContext {
    /// 创建新的执行上下文
    pub fn new(
        secret: impl Into<String>,
        domain: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            secret: secret.into(),
            domain: domain.into(),
            auth_token: auth_token.into(),
        }
    }

    /// 覆盖全部字段并返回自身，便于链式调用
    pub fn set(
        &mut self,
        secret: impl Into<String>,
        domain: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> &mut Self {
        self.secret = secret.into();
        self.domain = domain.into();
        self.auth_token = auth_token.into();
        self
    }
}

impl Display for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[门户 {}]", self.domain)
    }
}
