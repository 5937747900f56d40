//! 注入器
//!
//! 层次化注入器节点与同步解析算法。

use crate::builder::InjectorBuilder;
use crate::scope::ScopeManager;
use async_trait::async_trait;
use di_abstractions::{
    downcast, Argument, Arguments, DependencyKind, DependencyResolver, Instance, InjectorSnapshot,
    InjectorStats, Lazy, Module, Provider, ProviderResolver, ProviderSnapshot, ResolveContext,
};
use infrastructure_common::{DependencyError, DependencyResult, InjectorConfig, ScopeTag, Token};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 注入器节点
pub(crate) struct InjectorNode {
    pub(crate) id: Uuid,
    pub(crate) created_at: chrono::DateTime<chrono::Utc>,
    pub(crate) parent: Option<Injector>,
    pub(crate) depth: usize,
    pub(crate) providers: RwLock<HashMap<Token, Arc<Provider>>>,
    pub(crate) scope: ScopeManager,
    pub(crate) resolver: ProviderResolver,
    pub(crate) config: InjectorConfig,
}

/// 层次化注入器
///
/// 克隆只复制句柄，所有克隆共享同一个节点。
#[derive(Clone)]
pub struct Injector {
    pub(crate) node: Arc<InjectorNode>,
}

impl Injector {
    /// 创建根注入器
    pub fn new(
        registry: Arc<di_abstractions::AnnotationRegistry>,
        module: Module,
    ) -> DependencyResult<Self> {
        InjectorBuilder::new().registry(registry).module(module).build()
    }

    /// 注入器构建器
    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::new()
    }

    pub(crate) fn from_parts(
        parent: Option<Injector>,
        providers: HashMap<Token, Arc<Provider>>,
        forced_scopes: Vec<ScopeTag>,
        resolver: ProviderResolver,
        config: InjectorConfig,
    ) -> Self {
        let depth = parent.as_ref().map_or(0, |p| p.node.depth + 1);
        let node = InjectorNode {
            id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
            parent,
            depth,
            providers: RwLock::new(providers),
            scope: ScopeManager::new(forced_scopes),
            resolver,
            config,
        };
        info!(
            "创建注入器: {} (深度 {}, {} 个提供者)",
            node.id,
            node.depth,
            node.providers.read().len()
        );
        Self {
            node: Arc::new(node),
        }
    }

    /// 节点ID
    pub fn id(&self) -> Uuid {
        self.node.id
    }

    /// 父注入器
    pub fn parent(&self) -> Option<&Injector> {
        self.node.parent.as_ref()
    }

    /// 注入器配置
    pub fn config(&self) -> &InjectorConfig {
        &self.node.config
    }

    /// 同步解析令牌
    pub fn get(&self, token: &Token) -> DependencyResult<Instance> {
        let mut ctx = ResolveContext::new(self.node.config.max_resolution_depth);
        self.get_in(token, &mut ctx)
    }

    /// 同步解析令牌并转换为具体类型
    pub fn get_as<T: Any + Send + Sync>(&self, token: &Token) -> DependencyResult<Arc<T>> {
        downcast(token, self.get(token)?)
    }

    /// 同步解析类型令牌 `Token::of::<T>()`
    pub fn resolve<T: Any + Send + Sync>(&self) -> DependencyResult<Arc<T>> {
        self.get_as(&Token::of::<T>())
    }

    /// 从本节点到根是否有提供者
    pub fn has_provider_for(&self, token: &Token) -> bool {
        let mut node = Some(self);
        while let Some(current) = node {
            if current.node.providers.read().contains_key(token) {
                return true;
            }
            node = current.parent();
        }
        false
    }

    /// 创建子注入器
    pub fn create_child(&self, module: Module) -> DependencyResult<Injector> {
        self.create_child_with_scopes(module, Vec::new())
    }

    /// 创建子注入器，并对带有指定作用域标记的提供者强制创建新实例
    ///
    /// 瞬时作用域总是被强制。祖先上匹配的提供者被复制到子节点，模块中的覆盖在其之上。
    pub fn create_child_with_scopes(
        &self,
        module: Module,
        force_new_instances_of: impl IntoIterator<Item = ScopeTag>,
    ) -> DependencyResult<Injector> {
        let mut scopes: Vec<ScopeTag> = force_new_instances_of.into_iter().collect();
        if !scopes.contains(&ScopeTag::TRANSIENT) {
            scopes.push(ScopeTag::TRANSIENT);
        }

        let mut providers = HashMap::new();
        self.collect_providers_with_scopes(&scopes, &mut providers);
        if !providers.is_empty() {
            debug!("子注入器强制新实例: {} 个提供者", providers.len());
        }
        providers.extend(self.node.resolver.collect(&module)?);

        Ok(Injector::from_parts(
            Some(self.clone()),
            providers,
            scopes,
            self.node.resolver.clone(),
            self.node.config.clone(),
        ))
    }

    fn collect_providers_with_scopes(
        &self,
        scopes: &[ScopeTag],
        collected: &mut HashMap<Token, Arc<Provider>>,
    ) {
        let mut node = Some(self);
        while let Some(current) = node {
            for (token, provider) in current.node.providers.read().iter() {
                if provider.has_any_scope(scopes) && !collected.contains_key(token) {
                    collected.insert(token.clone(), provider.clone());
                }
            }
            node = current.parent();
        }
    }

    /// 本节点快照
    pub fn snapshot(&self) -> InjectorSnapshot {
        let mut providers: Vec<ProviderSnapshot> = self
            .node
            .providers
            .read()
            .iter()
            .map(|(token, provider)| ProviderSnapshot {
                token: token.clone(),
                target: provider.target.clone(),
                dependencies: provider.params.clone(),
                is_promise: provider.is_promise,
                lifetime: provider.lifetime(),
            })
            .collect();
        providers.sort_by(|a, b| a.token.name().cmp(b.token.name()));

        let mut cached = self.node.scope.cached_tokens();
        cached.sort_by(|a, b| a.name().cmp(b.name()));

        InjectorSnapshot {
            id: self.node.id,
            parent: self.parent().map(Injector::id),
            created_at: self.node.created_at,
            forced_scopes: self.node.scope.forced_scopes().to_vec(),
            providers,
            cached,
        }
    }

    /// 本节点统计信息
    pub fn stats(&self) -> InjectorStats {
        InjectorStats {
            providers: self.node.providers.read().len(),
            cached_instances: self.node.scope.len(),
            depth: self.node.depth,
        }
    }

    pub(crate) fn is_injector_token(token: &Token) -> bool {
        *token == Token::of::<Injector>()
    }

    pub(crate) fn self_instance(&self) -> Instance {
        Arc::new(self.clone())
    }

    pub(crate) fn lazy(&self, token: &Token) -> Lazy {
        Lazy::new(token.clone(), Arc::new(self.clone()))
    }

    pub(crate) fn local_provider(&self, token: &Token) -> Option<Arc<Provider>> {
        self.node.providers.read().get(token).cloned()
    }

    /// 找到拥有令牌提供者的节点
    ///
    /// 从本节点向根查找；整条链上都没有提供者时，若令牌本身是已定义的目标则安装默认提供者。
    pub(crate) fn locate(&self, token: &Token) -> Option<(Injector, Arc<Provider>)> {
        if !self.has_provider_for(token) {
            let provider = self.node.resolver.default_provider(token)?;
            return Some(self.install_default(token, provider));
        }
        let mut node = Some(self);
        while let Some(current) = node {
            if let Some(provider) = current.local_provider(token) {
                return Some((current.clone(), provider));
            }
            node = current.parent();
        }
        None
    }

    /// 默认提供者安装在根节点，或最近一个强制其作用域的节点
    fn install_default(&self, token: &Token, provider: Arc<Provider>) -> (Injector, Arc<Provider>) {
        let mut owner = self;
        while let Some(parent) = owner.parent() {
            if owner.node.scope.forces(&provider) {
                break;
            }
            owner = parent;
        }
        debug!("安装默认提供者: {} 于注入器 {}", token, owner.id());
        let installed = owner
            .node
            .providers
            .write()
            .entry(token.clone())
            .or_insert(provider)
            .clone();
        (owner.clone(), installed)
    }

    pub(crate) fn get_in(
        &self,
        token: &Token,
        ctx: &mut ResolveContext<Uuid>,
    ) -> DependencyResult<Instance> {
        if Self::is_injector_token(token) {
            return Ok(self.self_instance());
        }
        if self.node.config.trace_resolution {
            debug!("解析 {} 于注入器 {}", token, self.id());
        }
        let (owner, provider) = self
            .locate(token)
            .ok_or_else(|| DependencyError::NoProvider {
                token: token.clone(),
                path: ctx.tokens_with(token),
            })?;
        owner.instantiate(token, &provider, ctx)
    }

    fn instantiate(
        &self,
        token: &Token,
        provider: &Arc<Provider>,
        ctx: &mut ResolveContext<Uuid>,
    ) -> DependencyResult<Instance> {
        if provider.is_promise {
            return Err(DependencyError::MixedAsyncSync {
                token: token.clone(),
                path: ctx.tokens_with(token),
            });
        }
        if let Some(dep) = provider
            .params
            .iter()
            .find(|dep| dep.kind == DependencyKind::Promise)
        {
            let mut path = ctx.tokens_with(token);
            path.push(dep.token.clone());
            return Err(DependencyError::MixedAsyncSync {
                token: dep.token.clone(),
                path,
            });
        }

        let lifetime = provider.lifetime();
        let scope = &self.node.scope;
        if lifetime.is_cached() {
            if let Some(instance) = scope.cached(token) {
                return Ok(instance);
            }
        }

        let _guard = lifetime.is_cached().then(|| scope.lock_construction());
        if lifetime.is_cached() {
            if let Some(instance) = scope.cached(token) {
                return Ok(instance);
            }
        }

        ctx.push(self.id(), token)?;
        let result = self.build(token, provider, ctx);
        ctx.pop();
        Ok(scope.store(token, result?, lifetime))
    }

    fn build(
        &self,
        token: &Token,
        provider: &Provider,
        ctx: &mut ResolveContext<Uuid>,
    ) -> DependencyResult<Instance> {
        let mut args = Vec::with_capacity(provider.params.len());
        for dep in &provider.params {
            let arg = match dep.kind {
                DependencyKind::Lazy => Argument::Lazy(self.lazy(&dep.token)),
                DependencyKind::Direct
                | DependencyKind::SuperConstructor
                | DependencyKind::Promise => Argument::Value(self.get_in(&dep.token, ctx)?),
            };
            args.push(arg);
        }

        debug!("实例化 {} (提供者 {})", token, provider.target);
        provider.create(Arguments::new(args)).map_err(|e| {
            let err = DependencyError::from_provider(token, &ctx.tokens(), e);
            warn!("实例化 {} 失败: {}", token, err);
            err
        })
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("id", &self.node.id)
            .field("depth", &self.node.depth)
            .field("providers", &self.node.providers.read().len())
            .field("cached", &self.node.scope.len())
            .finish()
    }
}

#[async_trait]
impl DependencyResolver for Injector {
    fn get(&self, token: &Token) -> Result<Instance, DependencyError> {
        Injector::get(self, token)
    }

    async fn get_promise(&self, token: &Token) -> Result<Instance, DependencyError> {
        Injector::get_promise(self, token).await
    }

    fn with_locals(
        &self,
        locals: Vec<(Token, Instance)>,
    ) -> Result<Arc<dyn DependencyResolver>, DependencyError> {
        let module = locals
            .into_iter()
            .fold(Module::new(), |module, (token, instance)| module.value(token, instance));
        Ok(Arc::new(self.create_child(module)?))
    }
}
