//! 提供者工厂与调用参数
//!
//! 工厂接收按声明顺序排列的 [`Arguments`]，返回类型擦除的 [`Instance`]。

use crate::resolver::DependencyResolver;
use futures::future::BoxFuture;
use futures::FutureExt;
use infrastructure_common::{DependencyError, ProviderError, Token};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// 类型擦除的实例
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 同步工厂函数类型
pub type SyncFactoryFn = Arc<dyn Fn(Arguments) -> Result<Instance, ProviderError> + Send + Sync>;

/// 异步工厂函数类型
pub type AsyncFactoryFn =
    Arc<dyn Fn(Arguments) -> BoxFuture<'static, Result<Instance, ProviderError>> + Send + Sync>;

/// 提供者工厂
#[derive(Clone)]
pub enum Factory {
    /// 构造函数或同步工厂
    Sync(SyncFactoryFn),
    /// 返回异步结果的工厂，隐含 Promise 提供方式
    Async(AsyncFactoryFn),
}

impl Factory {
    /// 类型化构造函数
    pub fn class<T, F>(constructor: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Arguments) -> Result<T, ProviderError> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(move |args| {
            constructor(args).map(|value| Arc::new(value) as Instance)
        }))
    }

    /// 返回类型擦除实例的同步工厂
    pub fn function<F>(factory: F) -> Self
    where
        F: Fn(Arguments) -> Result<Instance, ProviderError> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(factory))
    }

    /// 异步工厂
    pub fn asynchronous<F, Fut>(factory: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Instance, ProviderError>> + Send + 'static,
    {
        Self::Async(Arc::new(move |args| factory(args).boxed()))
    }

    /// 总是返回同一个实例的工厂
    pub fn value(instance: Instance) -> Self {
        Self::Sync(Arc::new(move |_| Ok(instance.clone())))
    }

    /// 是否为异步工厂
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Factory::Sync(<function>)"),
            Self::Async(_) => f.write_str("Factory::Async(<function>)"),
        }
    }
}

/// 按需解析的访问器
///
/// 每次调用都重新走一遍解析，因此单例令牌总是返回同一实例，瞬时令牌每次返回新实例。
#[derive(Clone)]
pub struct Lazy {
    token: Token,
    resolver: Arc<dyn DependencyResolver>,
}

impl Lazy {
    /// 创建访问器
    pub fn new(token: Token, resolver: Arc<dyn DependencyResolver>) -> Self {
        Self { token, resolver }
    }

    /// 访问的令牌
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// 同步解析
    pub fn get(&self) -> Result<Instance, DependencyError> {
        self.resolver.get(&self.token)
    }

    /// 同步解析并转换为具体类型
    pub fn get_as<T: Any + Send + Sync>(&self) -> Result<Arc<T>, DependencyError> {
        downcast(&self.token, self.get()?)
    }

    /// 异步解析
    pub async fn get_promise(&self) -> Result<Instance, DependencyError> {
        self.resolver.get_promise(&self.token).await
    }

    /// 带局部值解析
    ///
    /// 局部值只对这一次调用可见，放在一个临时子注入器里。
    pub fn get_with(&self, locals: Vec<(Token, Instance)>) -> Result<Instance, DependencyError> {
        if locals.is_empty() {
            return self.get();
        }
        self.resolver.with_locals(locals)?.get(&self.token)
    }
}

impl fmt::Debug for Lazy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy").field("token", &self.token).finish()
    }
}

/// 单个调用参数
#[derive(Clone, Debug)]
pub enum Argument {
    /// 已解析的实例
    Value(Instance),
    /// 延迟访问器
    Lazy(Lazy),
}

/// 提供者调用参数，顺序与声明的依赖槽位一致
#[derive(Clone, Debug, Default)]
pub struct Arguments {
    items: Vec<Argument>,
}

impl Arguments {
    /// 创建参数列表
    pub fn new(items: Vec<Argument>) -> Self {
        Self { items }
    }

    /// 参数个数
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// 是否没有参数
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 取出类型擦除的实例
    pub fn instance(&self, index: usize) -> Result<Instance, DependencyError> {
        match self.items.get(index) {
            Some(Argument::Value(instance)) => Ok(instance.clone()),
            _ => Err(DependencyError::InvalidArgument {
                index,
                expected: "instance".to_string(),
            }),
        }
    }

    /// 取出具体类型的实例
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, DependencyError> {
        self.instance(index)?
            .downcast::<T>()
            .map_err(|_| DependencyError::InvalidArgument {
                index,
                expected: std::any::type_name::<T>().to_string(),
            })
    }

    /// 取出延迟访问器
    pub fn lazy(&self, index: usize) -> Result<Lazy, DependencyError> {
        match self.items.get(index) {
            Some(Argument::Lazy(lazy)) => Ok(lazy.clone()),
            _ => Err(DependencyError::InvalidArgument {
                index,
                expected: "lazy accessor".to_string(),
            }),
        }
    }
}

impl From<Vec<Argument>> for Arguments {
    fn from(items: Vec<Argument>) -> Self {
        Self::new(items)
    }
}

/// 把类型擦除的实例转换为具体类型
pub fn downcast<T: Any + Send + Sync>(token: &Token, instance: Instance) -> Result<Arc<T>, DependencyError> {
    instance
        .downcast::<T>()
        .map_err(|_| DependencyError::TypeMismatch {
            token: token.clone(),
            expected: std::any::type_name::<T>(),
        })
}
