//! 作用域管理
//!
//! 每个注入器节点持有一个 `ScopeManager`：节点本地的实例缓存、强制新实例的作用域标记，
//! 以及保证同一节点上单例最多构造一次的构造锁。

use dashmap::DashMap;
use di_abstractions::{Instance, Provider};
use infrastructure_common::{Lifetime, ScopeTag, Token};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::trace;

/// 作用域管理器
#[derive(Debug)]
pub struct ScopeManager {
    /// 强制创建新实例的作用域
    forced_scopes: Vec<ScopeTag>,
    /// 已缓存的实例
    instances: DashMap<Token, Instance>,
    /// 异步构造中的单元
    pending: DashMap<Token, Arc<OnceCell<Instance>>>,
    /// 同步构造锁，同一线程可重入
    construction: ReentrantMutex<()>,
}

impl ScopeManager {
    /// 创建作用域管理器
    pub fn new(forced_scopes: Vec<ScopeTag>) -> Self {
        Self {
            forced_scopes,
            instances: DashMap::new(),
            pending: DashMap::new(),
            construction: ReentrantMutex::new(()),
        }
    }

    /// 强制创建新实例的作用域
    pub fn forced_scopes(&self) -> &[ScopeTag] {
        &self.forced_scopes
    }

    /// 本节点是否对该提供者强制创建新实例
    pub fn forces(&self, provider: &Provider) -> bool {
        provider.has_any_scope(&self.forced_scopes)
    }

    /// 查找缓存实例
    pub fn cached(&self, token: &Token) -> Option<Instance> {
        let instance = self.instances.get(token).map(|entry| entry.value().clone());
        if instance.is_some() {
            trace!("命中缓存: {}", token);
        }
        instance
    }

    /// 按生命周期缓存实例
    ///
    /// 已有实例时保留旧实例并返回它，保证同一节点上同一令牌只有一个单例。
    pub fn store(&self, token: &Token, instance: Instance, lifetime: Lifetime) -> Instance {
        if !lifetime.is_cached() {
            return instance;
        }
        self.instances
            .entry(token.clone())
            .or_insert(instance)
            .value()
            .clone()
    }

    /// 获取同步构造锁
    pub fn lock_construction(&self) -> ReentrantMutexGuard<'_, ()> {
        self.construction.lock()
    }

    /// 异步构造单元，同一令牌的并发异步解析共享一次构造
    pub fn pending(&self, token: &Token) -> Arc<OnceCell<Instance>> {
        self.pending
            .entry(token.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone()
    }

    /// 构造完成后移除异步构造单元
    pub fn clear_pending(&self, token: &Token) {
        self.pending.remove(token);
    }

    /// 已缓存的令牌
    pub fn cached_tokens(&self) -> Vec<Token> {
        self.instances.iter().map(|entry| entry.key().clone()).collect()
    }

    /// 已缓存实例数量
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// 是否没有缓存实例
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl Default for ScopeManager {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
