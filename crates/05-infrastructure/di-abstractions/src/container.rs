//! 注入器诊断信息

use crate::annotations::Dependency;
use infrastructure_common::{Lifetime, ScopeTag, Token};
use serde::Serialize;

/// 提供者快照
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSnapshot {
    /// 被提供的令牌
    pub token: Token,
    /// 提供者目标
    pub target: Token,
    /// 依赖槽位
    pub dependencies: Vec<Dependency>,
    /// 是否以 Promise 方式提供
    pub is_promise: bool,
    /// 生命周期
    pub lifetime: Lifetime,
}

/// 注入器节点快照
#[derive(Debug, Clone, Serialize)]
pub struct InjectorSnapshot {
    /// 节点ID
    pub id: uuid::Uuid,
    /// 父节点ID
    pub parent: Option<uuid::Uuid>,
    /// 创建时间
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// 强制创建新实例的作用域
    pub forced_scopes: Vec<ScopeTag>,
    /// 本节点的提供者
    pub providers: Vec<ProviderSnapshot>,
    /// 本节点已缓存的令牌
    pub cached: Vec<Token>,
}

impl InjectorSnapshot {
    /// 序列化为 JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// 注入器统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InjectorStats {
    /// 本节点提供者数量
    pub providers: usize,
    /// 本节点已缓存实例数量
    pub cached_instances: usize,
    /// 节点深度，根节点为 0
    pub depth: usize,
}
