//! 注解词汇
//!
//! 注解描述一个提供者目标需要哪些依赖、提供哪个令牌以及属于哪些作用域。
//! 依赖槽位统一建模为 [`Dependency`]，解析算法按 [`DependencyKind`] 分派。

use infrastructure_common::{Lifetime, ScopeTag, Token};
use serde::Serialize;

/// 依赖槽位的注入方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DependencyKind {
    /// 直接注入已解析的实例
    Direct,
    /// 等待异步提供者完成后注入其结果
    Promise,
    /// 注入一个按需解析的访问器
    Lazy,
    /// 注入已构造好的父类型实例（两阶段构造）
    SuperConstructor,
}

/// 依赖槽位
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    /// 依赖令牌
    pub token: Token,
    /// 注入方式
    pub kind: DependencyKind,
}

impl Dependency {
    /// 创建依赖槽位
    pub fn new(token: impl Into<Token>, kind: DependencyKind) -> Self {
        Self {
            token: token.into(),
            kind,
        }
    }
}

/// 提供选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvideOptions {
    /// 提供者返回异步结果
    pub as_promise: bool,
}

/// 提供声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvideSpec {
    /// 被提供的令牌
    pub token: Token,
    /// 提供者返回异步结果
    pub as_promise: bool,
}

/// 单条注解
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    /// 依赖槽位（按位置对应参数）
    Inject(Vec<Dependency>),
    /// 声明提供的令牌
    Provide(ProvideSpec),
    /// 作用域标记
    Scope(ScopeTag),
}

fn slots<I, T>(tokens: I, kind: DependencyKind) -> Annotation
where
    I: IntoIterator<Item = T>,
    T: Into<Token>,
{
    Annotation::Inject(
        tokens
            .into_iter()
            .map(|token| Dependency::new(token, kind))
            .collect(),
    )
}

/// 直接依赖
pub fn inject<I, T>(tokens: I) -> Annotation
where
    I: IntoIterator<Item = T>,
    T: Into<Token>,
{
    slots(tokens, DependencyKind::Direct)
}

/// 异步依赖，参数收到的是提供者完成后的值
pub fn inject_promise<I, T>(tokens: I) -> Annotation
where
    I: IntoIterator<Item = T>,
    T: Into<Token>,
{
    slots(tokens, DependencyKind::Promise)
}

/// 延迟依赖，参数收到一个 [`crate::Lazy`] 访问器
pub fn inject_lazy<I, T>(tokens: I) -> Annotation
where
    I: IntoIterator<Item = T>,
    T: Into<Token>,
{
    slots(tokens, DependencyKind::Lazy)
}

/// 父类型槽位
pub fn super_constructor(parent: impl Into<Token>) -> Annotation {
    Annotation::Inject(vec![Dependency::new(
        parent,
        DependencyKind::SuperConstructor,
    )])
}

/// 声明提供的令牌
pub fn provide(token: impl Into<Token>) -> Annotation {
    provide_with(token, ProvideOptions::default())
}

/// 带选项声明提供的令牌
pub fn provide_with(token: impl Into<Token>, options: ProvideOptions) -> Annotation {
    Annotation::Provide(ProvideSpec {
        token: token.into(),
        as_promise: options.as_promise,
    })
}

/// `provide_with(token, ProvideOptions { as_promise: true })` 的简写
pub fn provide_promise(token: impl Into<Token>) -> Annotation {
    provide_with(token, ProvideOptions { as_promise: true })
}

/// 瞬时作用域：永不缓存
pub fn transient_scope() -> Annotation {
    Annotation::Scope(ScopeTag::TRANSIENT)
}

/// 自定义作用域标记
pub fn scope(tag: ScopeTag) -> Annotation {
    Annotation::Scope(tag)
}

/// 从注解列表读出的结构化元数据
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    /// 提供声明，最后一条生效
    pub provide: Option<ProvideSpec>,
    /// 依赖槽位，按注解应用顺序拼接
    pub params: Vec<Dependency>,
    /// 作用域标记
    pub scopes: Vec<ScopeTag>,
}

impl Annotations {
    /// 从注解列表构建
    pub fn read<'a>(annotations: impl IntoIterator<Item = &'a Annotation>) -> Self {
        let mut result = Self::default();
        for annotation in annotations {
            match annotation {
                Annotation::Inject(deps) => result.params.extend(deps.iter().cloned()),
                Annotation::Provide(spec) => result.provide = Some(spec.clone()),
                Annotation::Scope(tag) => {
                    if !result.scopes.contains(tag) {
                        result.scopes.push(tag.clone());
                    }
                }
            }
        }
        result
    }

    /// 是否带有指定作用域标记
    pub fn has_scope(&self, tag: &ScopeTag) -> bool {
        self.scopes.contains(tag)
    }

    /// 实例生命周期
    pub fn lifetime(&self) -> Lifetime {
        Lifetime::from_scopes(&self.scopes)
    }

    /// 是否声明为异步提供
    pub fn provides_promise(&self) -> bool {
        self.provide.as_ref().is_some_and(|spec| spec.as_promise)
    }
}
