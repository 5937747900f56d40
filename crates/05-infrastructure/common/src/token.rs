//! 依赖令牌定义
//!
//! 令牌用于命名一个依赖。类型令牌按 `TypeId` 比较，命名令牌按字符串比较，
//! 两者互不相等。

use serde::{Serialize, Serializer};
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 依赖令牌
#[derive(Clone)]
pub enum Token {
    /// 类型令牌
    Type {
        /// 类型ID
        id: TypeId,
        /// 完整类型名称（仅用于显示）
        type_name: &'static str,
    },
    /// 命名令牌
    Named(Arc<str>),
}

impl Token {
    /// 从类型创建令牌
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Type {
            id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// 创建命名令牌
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self::Named(name.into())
    }

    /// 是否为类型令牌
    pub fn is_type(&self) -> bool {
        matches!(self, Self::Type { .. })
    }

    /// 获取显示名称（类型令牌不包含模块路径）
    pub fn name(&self) -> &str {
        match self {
            Self::Type { type_name, .. } => short_type_name(type_name),
            Self::Named(name) => name,
        }
    }
}

/// 去掉模块路径，保留泛型参数
fn short_type_name(type_name: &str) -> &str {
    let head = type_name.split('<').next().unwrap_or(type_name);
    match head.rfind("::") {
        Some(pos) => &type_name[pos + 2..],
        None => type_name,
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Type { id: a, .. }, Self::Type { id: b, .. }) => a == b,
            (Self::Named(a), Self::Named(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Type { id, .. } => {
                0u8.hash(state);
                id.hash(state);
            }
            Self::Named(name) => {
                1u8.hash(state);
                name.hash(state);
            }
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type { type_name, .. } => write!(f, "Token::Type({type_name})"),
            Self::Named(name) => write!(f, "Token::Named({name:?})"),
        }
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl From<&'static str> for Token {
    fn from(name: &'static str) -> Self {
        Self::Named(Arc::from(name))
    }
}

impl From<String> for Token {
    fn from(name: String) -> Self {
        Self::Named(Arc::from(name))
    }
}

impl From<&Token> for Token {
    fn from(token: &Token) -> Self {
        token.clone()
    }
}

/// 把解析路径格式化为 ` (A -> B -> C)`，空路径返回空串
pub fn format_path(path: &[Token]) -> String {
    if path.is_empty() {
        return String::new();
    }
    let chain = path
        .iter()
        .map(Token::name)
        .collect::<Vec<_>>()
        .join(" -> ");
    format!(" ({chain})")
}
