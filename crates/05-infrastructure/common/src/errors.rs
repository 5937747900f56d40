//! 错误类型定义

use crate::token::{format_path, Token};
use thiserror::Error;

/// 提供者（工厂/构造函数）抛出的原始错误
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件读取失败: {source}")]
    FileReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("配置解析失败: {source}")]
    ParseError {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },
}

/// 依赖注入错误类型
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("没有为 {token} 注册提供者!{}", format_path(.path))]
    NoProvider { token: Token, path: Vec<Token> },

    #[error("无法实例化循环依赖!{}", format_path(.cycle))]
    CircularDependency { cycle: Vec<Token> },

    #[error("无法同步实例化 {token}: 它以 Promise 方式提供!{}", format_path(.path))]
    MixedAsyncSync { token: Token, path: Vec<Token> },

    #[error("实例化 {token} 时出错!{}, 原始错误: {source}", format_path(.path))]
    ProviderFailed {
        token: Token,
        path: Vec<Token>,
        source: ProviderError,
    },

    #[error("未定义的提供者目标: {target}")]
    UnknownTarget { target: Token },

    #[error("类型不匹配: {token} 不是 {expected}")]
    TypeMismatch {
        token: Token,
        expected: &'static str,
    },

    #[error("参数 {index} 无效: 期望 {expected}")]
    InvalidArgument { index: usize, expected: String },

    #[error("解析深度超过上限 {limit}!{}", format_path(.path))]
    ResolutionDepthExceeded { limit: usize, path: Vec<Token> },

    #[error("异步解析任务异常终止: {message}")]
    TaskFailed { message: String },
}

impl DependencyError {
    /// 包装提供者抛出的错误
    ///
    /// 提供者返回的 `DependencyError` 原样透传，其他错误作为 `source` 保留。
    pub fn from_provider(token: &Token, path: &[Token], error: ProviderError) -> Self {
        match error.downcast::<DependencyError>() {
            Ok(inner) => *inner,
            Err(source) => Self::ProviderFailed {
                token: token.clone(),
                path: path.to_vec(),
                source,
            },
        }
    }

    /// 出错的令牌（如果有）
    pub fn token(&self) -> Option<&Token> {
        match self {
            Self::NoProvider { token, .. }
            | Self::MixedAsyncSync { token, .. }
            | Self::ProviderFailed { token, .. }
            | Self::TypeMismatch { token, .. } => Some(token),
            Self::UnknownTarget { target } => Some(target),
            Self::CircularDependency { cycle } => cycle.last(),
            _ => None,
        }
    }
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type DependencyResult<T> = Result<T, DependencyError>;
