//! 提供者解析
//!
//! 把令牌映射到负责产生它的工厂及该工厂自身的依赖注解，并维护解析路径用于检测循环依赖。

use crate::annotations::{Annotation, Annotations, Dependency, DependencyKind};
use crate::factory::{Arguments, Factory, Instance};
use crate::registry::AnnotationRegistry;
use async_trait::async_trait;
use futures::future::BoxFuture;
use infrastructure_common::{DependencyError, Lifetime, ProviderError, ScopeTag, Token};
use std::collections::HashMap;
use std::sync::Arc;

/// 依赖解析器 trait
///
/// 注入器实现此 trait，延迟访问器通过它回到注入器。
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    /// 同步解析
    fn get(&self, token: &Token) -> Result<Instance, DependencyError>;

    /// 异步解析
    async fn get_promise(&self, token: &Token) -> Result<Instance, DependencyError>;

    /// 创建一个带局部值的临时解析器
    fn with_locals(
        &self,
        locals: Vec<(Token, Instance)>,
    ) -> Result<Arc<dyn DependencyResolver>, DependencyError>;
}

/// 已解析的提供者
#[derive(Debug, Clone)]
pub struct Provider {
    /// 提供者目标（工厂自身的标识）
    pub target: Token,
    /// 工厂
    pub factory: Factory,
    /// 依赖槽位
    pub params: Vec<Dependency>,
    /// 作用域标记
    pub scopes: Vec<ScopeTag>,
    /// 是否以 Promise 方式提供
    pub is_promise: bool,
}

impl Provider {
    /// 从工厂和注解创建提供者
    pub fn new(target: Token, factory: Factory, annotations: &Annotations) -> Self {
        let is_promise = factory.is_async() || annotations.provides_promise();
        Self {
            target,
            factory,
            params: annotations.params.clone(),
            scopes: annotations.scopes.clone(),
            is_promise,
        }
    }

    /// 值提供者
    pub fn value(token: Token, instance: Instance) -> Self {
        Self {
            target: token,
            factory: Factory::value(instance),
            params: Vec::new(),
            scopes: Vec::new(),
            is_promise: false,
        }
    }

    /// 实例生命周期
    pub fn lifetime(&self) -> Lifetime {
        Lifetime::from_scopes(&self.scopes)
    }

    /// 是否带有指定作用域标记
    pub fn has_scope(&self, tag: &ScopeTag) -> bool {
        self.scopes.contains(tag)
    }

    /// 是否带有任一作用域标记
    pub fn has_any_scope(&self, tags: &[ScopeTag]) -> bool {
        tags.iter().any(|tag| self.has_scope(tag))
    }

    /// 是否含有 Promise 槽位
    pub fn has_promise_params(&self) -> bool {
        self.params
            .iter()
            .any(|dep| dep.kind == DependencyKind::Promise)
    }

    /// 同步调用工厂
    ///
    /// 异步工厂不能同步调用，调用方应先检查 `is_promise`。
    pub fn create(&self, args: Arguments) -> Result<Instance, ProviderError> {
        match &self.factory {
            Factory::Sync(create) => create(args),
            Factory::Async(_) => Err("异步工厂不能同步调用".into()),
        }
    }

    /// 异步调用工厂，同步工厂直接完成
    pub fn create_async(&self, args: Arguments) -> BoxFuture<'static, Result<Instance, ProviderError>> {
        match &self.factory {
            Factory::Sync(create) => Box::pin(futures::future::ready(create(args))),
            Factory::Async(create) => create(args),
        }
    }
}

/// 模块条目
#[derive(Debug, Clone)]
enum ModuleEntry {
    Target(Token),
    Value(Token, Instance),
    Inline(Token, Arc<Provider>),
}

/// 注入器节点提供的内容
#[derive(Debug, Clone, Default)]
pub struct Module {
    entries: Vec<ModuleEntry>,
}

impl Module {
    /// 创建空模块
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册表中的提供者目标，提供它 `provide` 声明的令牌或它自身
    pub fn provider(mut self, target: impl Into<Token>) -> Self {
        self.entries.push(ModuleEntry::Target(target.into()));
        self
    }

    /// 现成的值
    pub fn value(mut self, token: impl Into<Token>, instance: Instance) -> Self {
        self.entries.push(ModuleEntry::Value(token.into(), instance));
        self
    }

    /// 不经过注册表的内联提供者
    pub fn factory(
        mut self,
        token: impl Into<Token>,
        annotations: impl IntoIterator<Item = Annotation>,
        factory: Factory,
    ) -> Self {
        let token = token.into();
        let list: Vec<Annotation> = annotations.into_iter().collect();
        let read = Annotations::read(&list);
        let provider = Provider::new(token.clone(), factory, &read);
        self.entries.push(ModuleEntry::Inline(token, Arc::new(provider)));
        self
    }

    /// 条目数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 提供者解析器
#[derive(Debug, Clone)]
pub struct ProviderResolver {
    registry: Arc<AnnotationRegistry>,
}

impl ProviderResolver {
    /// 创建解析器
    pub fn new(registry: Arc<AnnotationRegistry>) -> Self {
        Self { registry }
    }

    /// 关联的注册表
    pub fn registry(&self) -> &Arc<AnnotationRegistry> {
        &self.registry
    }

    /// 解析注册表目标，返回（被提供的令牌，提供者）
    pub fn resolve_target(&self, target: &Token) -> Result<(Token, Arc<Provider>), DependencyError> {
        let factory = self
            .registry
            .factory(target)
            .ok_or_else(|| DependencyError::UnknownTarget {
                target: target.clone(),
            })?;
        let annotations = self.registry.read_annotations(target);
        let token = annotations
            .provide
            .as_ref()
            .map_or_else(|| target.clone(), |spec| spec.token.clone());
        Ok((token, Arc::new(Provider::new(target.clone(), factory, &annotations))))
    }

    /// 默认提供者：令牌本身是一个已定义的目标
    pub fn default_provider(&self, token: &Token) -> Option<Arc<Provider>> {
        let factory = self.registry.factory(token)?;
        let annotations = self.registry.read_annotations(token);
        Some(Arc::new(Provider::new(token.clone(), factory, &annotations)))
    }

    /// 把模块展开为提供者表，后出现的条目覆盖先出现的
    pub fn collect(&self, module: &Module) -> Result<HashMap<Token, Arc<Provider>>, DependencyError> {
        let mut providers = HashMap::with_capacity(module.len());
        for entry in &module.entries {
            let (token, provider) = match entry {
                ModuleEntry::Target(target) => self.resolve_target(target)?,
                ModuleEntry::Value(token, instance) => (
                    token.clone(),
                    Arc::new(Provider::value(token.clone(), instance.clone())),
                ),
                ModuleEntry::Inline(token, provider) => (token.clone(), provider.clone()),
            };
            providers.insert(token, provider);
        }
        Ok(providers)
    }
}

/// 解析上下文
///
/// 记录当前解析链（注入器节点 + 令牌），用于检测循环依赖和限制深度。
#[derive(Debug, Clone)]
pub struct ResolveContext<N> {
    /// 当前解析链
    resolution_chain: Vec<(N, Token)>,
    /// 最大递归深度
    max_depth: usize,
}

impl<N: PartialEq + Clone> ResolveContext<N> {
    /// 创建新的解析上下文
    pub fn new(max_depth: usize) -> Self {
        Self {
            resolution_chain: Vec::new(),
            max_depth,
        }
    }

    /// 添加节点到解析链
    pub fn push(&mut self, node: N, token: &Token) -> Result<(), DependencyError> {
        if self
            .resolution_chain
            .iter()
            .any(|(n, t)| *n == node && t == token)
        {
            let mut cycle = self.tokens();
            cycle.push(token.clone());
            return Err(DependencyError::CircularDependency { cycle });
        }
        if self.resolution_chain.len() >= self.max_depth {
            return Err(DependencyError::ResolutionDepthExceeded {
                limit: self.max_depth,
                path: self.tokens(),
            });
        }
        self.resolution_chain.push((node, token.clone()));
        Ok(())
    }

    /// 从解析链中移除最后一个节点
    pub fn pop(&mut self) {
        self.resolution_chain.pop();
    }

    /// 当前深度
    pub fn depth(&self) -> usize {
        self.resolution_chain.len()
    }

    /// 解析链上的令牌
    pub fn tokens(&self) -> Vec<Token> {
        self.resolution_chain
            .iter()
            .map(|(_, token)| token.clone())
            .collect()
    }

    /// 解析链上的令牌，末尾附加 `token`
    pub fn tokens_with(&self, token: &Token) -> Vec<Token> {
        let mut tokens = self.tokens();
        tokens.push(token.clone());
        tokens
    }
}
