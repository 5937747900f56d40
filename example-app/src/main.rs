//! # TodoMVC 组合根
//!
//! 演示如何用注解注册表和层次化注入器组装一个 TodoMVC 应用

use clap::Parser;
use di_abstractions::{
    define_class, define_factory, inject, inject_lazy, provide_promise, scope, transient_scope,
    Factory, Instance, Lazy, Module,
};
use di_impl::Injector;
use infrastructure_common::{InjectorConfig, ScopeTag, Token};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "todo-app")]
#[command(about = "Lorn DI TodoMVC 示例")]
struct Args {
    /// 配置文件路径
    #[arg(short, long, default_value = "config/di.toml")]
    config: String,

    /// 日志级别
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 是否打印根注入器快照
    #[arg(long)]
    snapshot: bool,
}

/// 编辑会话作用域，每个会话子注入器都会新建带此标记的实例
const EDIT_SESSION: &str = "EditSession";

/// 模板令牌
const TEMPLATES: &str = "todoTemplates";

#[derive(Debug, Clone)]
struct Todo {
    title: String,
    completed: bool,
}

/// 待办事项存储
#[derive(Debug, Default)]
struct TodoStore {
    items: Mutex<Vec<Todo>>,
}

impl TodoStore {
    fn add(&self, title: impl Into<String>) {
        self.items.lock().push(Todo {
            title: title.into(),
            completed: false,
        });
    }

    fn toggle(&self, index: usize) {
        if let Some(todo) = self.items.lock().get_mut(index) {
            todo.completed = !todo.completed;
        }
    }

    fn snapshot(&self) -> Vec<Todo> {
        self.items.lock().clone()
    }
}

/// 过滤器
#[derive(Debug)]
struct Filters {
    names: Vec<&'static str>,
}

impl Filters {
    fn apply<'a>(&self, name: &str, todos: &'a [Todo]) -> Vec<&'a Todo> {
        todos
            .iter()
            .filter(|todo| match name {
                "active" => !todo.completed,
                "completed" => todo.completed,
                _ => true,
            })
            .collect()
    }
}

/// 主视图
#[derive(Debug)]
struct AppView {
    store: Arc<TodoStore>,
    templates: Arc<HashMap<&'static str, &'static str>>,
    filters: Lazy,
}

impl AppView {
    fn render(&self, filter: &str) -> anyhow::Result<String> {
        let filters = self.filters.get_as::<Filters>()?;
        let todos = self.store.snapshot();
        let row = self.templates.get("row").copied().unwrap_or("{title}");
        let lines: Vec<String> = filters
            .apply(filter, &todos)
            .into_iter()
            .map(|todo| {
                let mark = if todo.completed { "x" } else { " " };
                row.replace("{mark}", mark).replace("{title}", &todo.title)
            })
            .collect();
        Ok(format!("[{}] ({})\n{}", filter, filters.names.join("|"), lines.join("\n")))
    }
}

/// 每行一个的视图，瞬时作用域
#[derive(Debug)]
struct TodoItemView {
    id: usize,
}

/// 远程待办事项，异步提供
#[derive(Debug)]
struct RemoteTodos {
    titles: Vec<String>,
}

/// 编辑会话，每个会话子注入器独立
#[derive(Debug)]
struct EditSession {
    store: Arc<TodoStore>,
}

/// 在全局注册表上声明所有目标
fn register() {
    define_class::<TodoStore, _>([], |_| Ok(TodoStore::default()));

    define_factory(
        TEMPLATES,
        [],
        Factory::function(|_| {
            let templates: HashMap<&'static str, &'static str> =
                [("row", "[{mark}] {title}"), ("empty", "nothing to do")]
                    .into_iter()
                    .collect();
            Ok(Arc::new(templates) as Instance)
        }),
    );

    define_class::<Filters, _>([], |_| {
        info!("创建过滤器");
        Ok(Filters {
            names: vec!["all", "active", "completed"],
        })
    });

    define_class::<AppView, _>(
        [
            inject([Token::of::<TodoStore>(), Token::from(TEMPLATES)]),
            inject_lazy([Token::of::<Filters>()]),
        ],
        |args| {
            Ok(AppView {
                store: args.get(0)?,
                templates: args.get(1)?,
                filters: args.lazy(2)?,
            })
        },
    );

    let next_id = Arc::new(AtomicUsize::new(1));
    define_class::<TodoItemView, _>([transient_scope()], move |_| {
        Ok(TodoItemView {
            id: next_id.fetch_add(1, Ordering::SeqCst),
        })
    });

    define_factory(
        Token::of::<RemoteTodos>(),
        [provide_promise(Token::of::<RemoteTodos>())],
        Factory::asynchronous(|_| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(Arc::new(RemoteTodos {
                titles: vec!["write docs".to_string(), "review PR".to_string()],
            }) as Instance)
        }),
    );

    define_class::<EditSession, _>(
        [
            inject([Token::of::<TodoStore>()]),
            scope(ScopeTag::new(EDIT_SESSION)),
        ],
        |args| {
            Ok(EditSession {
                store: args.get(0)?,
            })
        },
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日志
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("启动 TodoMVC 示例");

    let config = InjectorConfig::load(&args.config)?;
    info!("注入器配置: {:?}", config);

    register();
    let injector = Injector::builder().config(config).build()?;

    demonstrate_sync(&injector)?;
    demonstrate_async(&injector).await?;
    demonstrate_sessions(&injector)?;

    if args.snapshot {
        println!("{}", injector.snapshot().to_json()?);
    }

    info!("示例结束: {:?}", injector.stats());
    Ok(())
}

/// 同步解析与延迟依赖
fn demonstrate_sync(injector: &Injector) -> anyhow::Result<()> {
    info!("演示同步解析");

    let store = injector.resolve::<TodoStore>()?;
    store.add("buy milk");
    store.add("walk the dog");
    store.toggle(0);

    let view = injector.resolve::<AppView>()?;
    println!("{}", view.render("all")?);
    println!("{}", view.render("active")?);

    let first = injector.resolve::<TodoItemView>()?;
    let second = injector.resolve::<TodoItemView>()?;
    info!("瞬时行视图: {} / {}", first.id, second.id);
    Ok(())
}

/// 异步提供者
async fn demonstrate_async(injector: &Injector) -> anyhow::Result<()> {
    info!("演示异步解析");

    if let Err(e) = injector.resolve::<RemoteTodos>() {
        info!("同步获取异步提供者被拒绝: {}", e);
    }

    let remote = injector.resolve_promise::<RemoteTodos>().await?;
    let store = injector.resolve::<TodoStore>()?;
    for title in &remote.titles {
        store.add(title.clone());
    }
    info!("从远程加载了 {} 条待办事项", remote.titles.len());
    Ok(())
}

/// 编辑会话子注入器
fn demonstrate_sessions(injector: &Injector) -> anyhow::Result<()> {
    info!("演示编辑会话");

    let session = || ScopeTag::new(EDIT_SESSION);
    let first = injector.create_child_with_scopes(Module::new(), [session()])?;
    let second = injector.create_child_with_scopes(Module::new(), [session()])?;

    let a = first.resolve::<EditSession>()?;
    let b = second.resolve::<EditSession>()?;
    info!(
        "会话相互独立: {}, 共享存储: {}",
        !Arc::ptr_eq(&a, &b),
        Arc::ptr_eq(&a.store, &b.store)
    );
    info!("当前共有 {} 条待办事项", a.store.snapshot().len());
    Ok(())
}
