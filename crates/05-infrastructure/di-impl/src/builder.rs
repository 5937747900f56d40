//! 注入器构建器

use crate::injector::Injector;
use di_abstractions::{global_registry, AnnotationRegistry, Instance, Module, ProviderResolver};
use infrastructure_common::{DependencyResult, InjectorConfig, Token};
use std::sync::Arc;
use tracing::info;

/// 根注入器构建器
///
/// 未指定注册表时使用全局注册表。
#[derive(Debug, Default)]
pub struct InjectorBuilder {
    registry: Option<Arc<AnnotationRegistry>>,
    module: Module,
    config: InjectorConfig,
}

impl InjectorBuilder {
    /// 创建构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用指定注册表
    pub fn registry(mut self, registry: Arc<AnnotationRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// 替换模块
    pub fn module(mut self, module: Module) -> Self {
        self.module = module;
        self
    }

    /// 添加提供者目标
    pub fn provider(mut self, target: impl Into<Token>) -> Self {
        self.module = self.module.provider(target);
        self
    }

    /// 添加值
    pub fn value(mut self, token: impl Into<Token>, instance: Instance) -> Self {
        self.module = self.module.value(token, instance);
        self
    }

    /// 使用指定配置
    pub fn config(mut self, config: InjectorConfig) -> Self {
        self.config = config;
        self
    }

    /// 构建根注入器
    pub fn build(self) -> DependencyResult<Injector> {
        let registry = self.registry.unwrap_or_else(global_registry);
        let resolver = ProviderResolver::new(registry);
        let providers = resolver.collect(&self.module)?;
        info!("构建根注入器，注册了 {} 个提供者", providers.len());
        Ok(Injector::from_parts(
            None,
            providers,
            Vec::new(),
            resolver,
            self.config,
        ))
    }
}
