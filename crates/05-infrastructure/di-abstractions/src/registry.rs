//! 注解注册表
//!
//! 以目标令牌为键的旁路表，保存目标的工厂和注解列表，不修改目标本身。

use crate::annotations::{Annotation, Annotations};
use crate::factory::{Arguments, Factory, Instance};
use dashmap::DashMap;
use infrastructure_common::{ProviderError, Token};
use once_cell::sync::Lazy;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, trace};

/// 目标记录
#[derive(Debug, Clone, Default)]
struct TargetRecord {
    factory: Option<Factory>,
    annotations: Vec<Annotation>,
}

/// 注解注册表
#[derive(Debug, Default)]
pub struct AnnotationRegistry {
    targets: DashMap<Token, TargetRecord>,
}

impl AnnotationRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 定义目标的工厂，重复定义时覆盖旧工厂
    pub fn define(&self, target: impl Into<Token>, factory: Factory) {
        let target = target.into();
        debug!("定义提供者目标: {}", target);
        self.targets.entry(target).or_default().factory = Some(factory);
    }

    /// 给目标附加注解
    ///
    /// 与已有注解合并；已存在的相同注解不会重复添加，所以重复应用是幂等的。
    pub fn annotate(&self, target: impl Into<Token>, annotations: impl IntoIterator<Item = Annotation>) {
        let target = target.into();
        let mut record = self.targets.entry(target.clone()).or_default();
        for annotation in annotations {
            if record.annotations.contains(&annotation) {
                trace!("忽略重复注解: {} {:?}", target, annotation);
                continue;
            }
            record.annotations.push(annotation);
        }
    }

    /// 定义类型化的类目标，目标令牌为 `Token::of::<T>()`
    pub fn define_class<T, F>(
        &self,
        annotations: impl IntoIterator<Item = Annotation>,
        constructor: F,
    ) -> Token
    where
        T: Any + Send + Sync,
        F: Fn(Arguments) -> Result<T, ProviderError> + Send + Sync + 'static,
    {
        let target = Token::of::<T>();
        self.define(target.clone(), Factory::class(constructor));
        self.annotate(target.clone(), annotations);
        target
    }

    /// 定义任意令牌的工厂目标
    pub fn define_factory(
        &self,
        target: impl Into<Token>,
        annotations: impl IntoIterator<Item = Annotation>,
        factory: Factory,
    ) -> Token {
        let target = target.into();
        self.define(target.clone(), factory);
        self.annotate(target.clone(), annotations);
        target
    }

    /// 定义异步工厂目标
    pub fn define_async<F, Fut>(
        &self,
        target: impl Into<Token>,
        annotations: impl IntoIterator<Item = Annotation>,
        factory: F,
    ) -> Token
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Instance, ProviderError>> + Send + 'static,
    {
        self.define_factory(target, annotations, Factory::asynchronous(factory))
    }

    /// 读取目标的结构化注解
    pub fn read_annotations(&self, target: &Token) -> Annotations {
        self.targets
            .get(target)
            .map(|record| Annotations::read(&record.annotations))
            .unwrap_or_default()
    }

    /// 目标的原始注解列表
    pub fn annotations(&self, target: &Token) -> Vec<Annotation> {
        self.targets
            .get(target)
            .map(|record| record.annotations.clone())
            .unwrap_or_default()
    }

    /// 目标的工厂
    pub fn factory(&self, target: &Token) -> Option<Factory> {
        self.targets.get(target).and_then(|record| record.factory.clone())
    }

    /// 目标是否定义了工厂
    pub fn is_defined(&self, target: &Token) -> bool {
        self.targets
            .get(target)
            .is_some_and(|record| record.factory.is_some())
    }

    /// 所有定义了工厂的目标
    pub fn targets(&self) -> Vec<Token> {
        self.targets
            .iter()
            .filter(|entry| entry.factory.is_some())
            .map(|entry| entry.key().clone())
            .collect()
    }
}

/// 全局注解注册表
static GLOBAL_ANNOTATION_REGISTRY: Lazy<Arc<AnnotationRegistry>> =
    Lazy::new(|| Arc::new(AnnotationRegistry::new()));

/// 获取全局注解注册表
pub fn global_registry() -> Arc<AnnotationRegistry> {
    GLOBAL_ANNOTATION_REGISTRY.clone()
}

/// 在全局注册表上附加注解
pub fn annotate(target: impl Into<Token>, annotations: impl IntoIterator<Item = Annotation>) {
    GLOBAL_ANNOTATION_REGISTRY.annotate(target, annotations);
}

/// 在全局注册表上定义类目标
pub fn define_class<T, F>(annotations: impl IntoIterator<Item = Annotation>, constructor: F) -> Token
where
    T: Any + Send + Sync,
    F: Fn(Arguments) -> Result<T, ProviderError> + Send + Sync + 'static,
{
    GLOBAL_ANNOTATION_REGISTRY.define_class(annotations, constructor)
}

/// 在全局注册表上定义工厂目标
pub fn define_factory(
    target: impl Into<Token>,
    annotations: impl IntoIterator<Item = Annotation>,
    factory: Factory,
) -> Token {
    GLOBAL_ANNOTATION_REGISTRY.define_factory(target, annotations, factory)
}
