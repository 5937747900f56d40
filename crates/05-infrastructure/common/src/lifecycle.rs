//! 实例生命周期与作用域标记

use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

/// 实例生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Lifetime {
    /// 单例模式 - 在拥有提供者的注入器节点上缓存
    Singleton,
    /// 瞬时模式 - 每次解析都创建新实例
    Transient,
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::Singleton
    }
}

/// 作用域标记
///
/// 标注在提供者上。创建子注入器时可以要求对带有某些标记的提供者强制创建新实例，
/// `TRANSIENT` 标记的提供者永远不缓存。
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ScopeTag(Cow<'static, str>);

impl ScopeTag {
    /// 瞬时作用域
    pub const TRANSIENT: ScopeTag = ScopeTag(Cow::Borrowed("TransientScope"));

    /// 创建作用域标记
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// 标记名称
    pub fn name(&self) -> &str {
        &self.0
    }

    /// 是否为瞬时作用域
    pub fn is_transient(&self) -> bool {
        *self == Self::TRANSIENT
    }
}

impl fmt::Debug for ScopeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeTag({})", self.0)
    }
}

impl fmt::Display for ScopeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Lifetime {
    /// 根据作用域标记确定生命周期
    pub fn from_scopes<'a>(scopes: impl IntoIterator<Item = &'a ScopeTag>) -> Self {
        if scopes.into_iter().any(ScopeTag::is_transient) {
            Self::Transient
        } else {
            Self::Singleton
        }
    }

    /// 是否缓存实例
    pub fn is_cached(self) -> bool {
        matches!(self, Self::Singleton)
    }
}
