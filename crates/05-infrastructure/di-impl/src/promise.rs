//! 异步解析
//!
//! 兄弟依赖各自作为 tokio 任务并发解析，提供者在全部依赖完成后按声明顺序收到参数。
//! 任一依赖失败时整条链立即失败，已启动的兄弟任务继续运行到结束，结果被丢弃。
//!
//! 启动任务之前先沿依赖图做一次循环检查。兄弟任务各自只持有自己的解析链，
//! 经由两个分支形成的循环只能在这里发现。

use crate::injector::Injector;
use di_abstractions::{
    downcast, Argument, Arguments, DependencyKind, Instance, Provider, ResolveContext,
};
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use infrastructure_common::{DependencyError, DependencyResult, ProviderError, Token};
use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};
use uuid::Uuid;

/// 等待中的参数
enum PendingArgument {
    Ready(Argument),
    Spawned(JoinHandle<DependencyResult<Instance>>),
}

fn task_failed(error: JoinError) -> DependencyError {
    DependencyError::TaskFailed {
        message: error.to_string(),
    }
}

impl Injector {
    /// 异步解析令牌
    ///
    /// 首次轮询时解析作为独立任务启动，调用方丢弃返回的 future 不会中止它。
    /// 需要在 tokio 运行时中轮询。
    pub fn get_promise(&self, token: &Token) -> BoxFuture<'static, DependencyResult<Instance>> {
        let injector = self.clone();
        let token = token.clone();
        async move {
            let max_depth = injector.config().max_resolution_depth;
            injector.check_cycles(
                &token,
                &mut ResolveContext::new(max_depth),
                &mut HashSet::new(),
            )?;
            let ctx = ResolveContext::new(max_depth);
            tokio::spawn(injector.resolve_async(token, ctx))
                .await
                .map_err(task_failed)?
        }
        .boxed()
    }

    /// 异步解析类型令牌 `Token::of::<T>()`
    pub async fn resolve_promise<T: Any + Send + Sync>(&self) -> DependencyResult<Arc<T>> {
        let token = Token::of::<T>();
        let instance = self.get_promise(&token).await?;
        downcast(&token, instance)
    }

    /// 沿依赖图检查循环，已缓存的单例和延迟依赖不再展开
    fn check_cycles(
        &self,
        token: &Token,
        ctx: &mut ResolveContext<Uuid>,
        explored: &mut HashSet<(Uuid, Token)>,
    ) -> DependencyResult<()> {
        if Self::is_injector_token(token) {
            return Ok(());
        }
        // 缺失的提供者留给解析阶段报告，路径更完整
        let Some((owner, provider)) = self.locate(token) else {
            return Ok(());
        };
        if provider.lifetime().is_cached() && owner.node.scope.cached(token).is_some() {
            return Ok(());
        }
        let key = (owner.id(), token.clone());
        if explored.contains(&key) {
            return Ok(());
        }

        ctx.push(owner.id(), token)?;
        for dep in provider
            .params
            .iter()
            .filter(|dep| dep.kind != DependencyKind::Lazy)
        {
            owner.check_cycles(&dep.token, ctx, explored)?;
        }
        ctx.pop();
        explored.insert(key);
        Ok(())
    }

    pub(crate) fn resolve_async(
        self,
        token: Token,
        ctx: ResolveContext<Uuid>,
    ) -> BoxFuture<'static, DependencyResult<Instance>> {
        async move {
            if Self::is_injector_token(&token) {
                return Ok(self.self_instance());
            }
            if self.config().trace_resolution {
                debug!("异步解析 {} 于注入器 {}", token, self.id());
            }
            let (owner, provider) =
                self.locate(&token)
                    .ok_or_else(|| DependencyError::NoProvider {
                        path: ctx.tokens_with(&token),
                        token: token.clone(),
                    })?;
            owner.instantiate_async(token, provider, ctx).await
        }
        .boxed()
    }

    async fn instantiate_async(
        self,
        token: Token,
        provider: Arc<Provider>,
        mut ctx: ResolveContext<Uuid>,
    ) -> DependencyResult<Instance> {
        let lifetime = provider.lifetime();
        let scope = &self.node.scope;
        if lifetime.is_cached() {
            if let Some(instance) = scope.cached(&token) {
                return Ok(instance);
            }
        }

        ctx.push(self.id(), &token)?;
        if !lifetime.is_cached() {
            return self.build_async(&token, &provider, &ctx).await;
        }

        let cell = scope.pending(&token);
        let instance = cell
            .get_or_try_init(|| async {
                // 等待期间可能已由同步路径或上一个单元完成
                if let Some(instance) = scope.cached(&token) {
                    return Ok(instance);
                }
                self.build_async(&token, &provider, &ctx).await
            })
            .await?
            .clone();
        let instance = scope.store(&token, instance, lifetime);
        scope.clear_pending(&token);
        Ok(instance)
    }

    async fn build_async(
        &self,
        token: &Token,
        provider: &Provider,
        ctx: &ResolveContext<Uuid>,
    ) -> DependencyResult<Instance> {
        let pending: Vec<PendingArgument> = provider
            .params
            .iter()
            .map(|dep| match dep.kind {
                DependencyKind::Lazy => PendingArgument::Ready(Argument::Lazy(self.lazy(&dep.token))),
                DependencyKind::Direct
                | DependencyKind::Promise
                | DependencyKind::SuperConstructor => PendingArgument::Spawned(tokio::spawn(
                    self.clone().resolve_async(dep.token.clone(), ctx.clone()),
                )),
            })
            .collect();

        let args = try_join_all(pending.into_iter().map(|pending| async move {
            match pending {
                PendingArgument::Ready(arg) => Ok(arg),
                PendingArgument::Spawned(handle) => {
                    handle.await.map_err(task_failed)?.map(Argument::Value)
                }
            }
        }))
        .await?;

        let args = Arguments::new(args);
        if provider.factory.is_async() {
            debug!("异步实例化 {} (提供者 {})", token, provider.target);
            provider
                .create_async(args)
                .await
                .map_err(|e| self.provider_failed(token, ctx, e))
        } else {
            self.construct_locked(token, provider, args, ctx)
        }
    }

    /// 在节点构造锁内调用同步工厂，与同步解析共用一次构造
    fn construct_locked(
        &self,
        token: &Token,
        provider: &Provider,
        args: Arguments,
        ctx: &ResolveContext<Uuid>,
    ) -> DependencyResult<Instance> {
        let lifetime = provider.lifetime();
        let scope = &self.node.scope;
        let _guard = lifetime.is_cached().then(|| scope.lock_construction());
        if lifetime.is_cached() {
            if let Some(instance) = scope.cached(token) {
                return Ok(instance);
            }
        }

        debug!("异步实例化 {} (提供者 {})", token, provider.target);
        let instance = provider
            .create(args)
            .map_err(|e| self.provider_failed(token, ctx, e))?;
        Ok(scope.store(token, instance, lifetime))
    }

    fn provider_failed(
        &self,
        token: &Token,
        ctx: &ResolveContext<Uuid>,
        error: ProviderError,
    ) -> DependencyError {
        let err = DependencyError::from_provider(token, &ctx.tokens(), error);
        warn!("异步实例化 {} 失败: {}", token, err);
        err
    }
}
