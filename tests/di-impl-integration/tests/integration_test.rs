//! 注入器集成测试：异步解析、延迟解析与层次化覆盖

use di_abstractions::{
    inject, inject_lazy, inject_promise, provide, provide_promise, transient_scope,
    AnnotationRegistry, Factory, Instance, Module,
};
use di_impl::Injector;
use infrastructure_common::{DependencyError, InjectorConfig, ProviderError, Token};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

/// 异步依赖的结果
#[derive(Debug, PartialEq)]
struct Settled(&'static str);

/// 由两个异步依赖组合而成
#[derive(Debug)]
struct Combined {
    first: Arc<Settled>,
    second: Arc<Settled>,
}

/// 定义一个等待通知后才完成的异步提供者
fn gated(
    registry: &AnnotationRegistry,
    name: &'static str,
    gate: Arc<Notify>,
    log: Arc<Mutex<Vec<&'static str>>>,
) {
    registry.define_async(name, [provide_promise(name)], move |_| {
        let gate = gate.clone();
        let log = log.clone();
        async move {
            gate.notified().await;
            log.lock().unwrap().push(name);
            Ok::<Instance, ProviderError>(Arc::new(Settled(name)))
        }
    });
}

async fn settle_tasks() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// 测试提供者在所有依赖完成后才调用，参数保持声明顺序
#[tokio::test]
async fn test_get_promise_waits_for_all_dependencies_in_order() -> anyhow::Result<()> {
    let registry = Arc::new(AnnotationRegistry::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    let (u_gate, v_gate) = (Arc::new(Notify::new()), Arc::new(Notify::new()));
    gated(&registry, "U", u_gate.clone(), log.clone());
    gated(&registry, "V", v_gate.clone(), log.clone());

    let invoked = log.clone();
    registry.define_factory(
        "T",
        [inject_promise(["U", "V"])],
        Factory::class(move |args| {
            invoked.lock().unwrap().push("T");
            Ok(Combined {
                first: args.get::<Settled>(0)?,
                second: args.get::<Settled>(1)?,
            })
        }),
    );

    let injector = Injector::new(registry, Module::new())?;
    let pending = tokio::spawn(injector.get_promise(&Token::from("T")));

    settle_tasks().await;
    assert!(!pending.is_finished());

    v_gate.notify_one();
    settle_tasks().await;
    assert!(!pending.is_finished());
    assert_eq!(*log.lock().unwrap(), vec!["V"]);

    u_gate.notify_one();
    let combined = pending.await??.downcast::<Combined>().expect("Combined");
    assert_eq!(*combined.first, Settled("U"));
    assert_eq!(*combined.second, Settled("V"));
    assert_eq!(*log.lock().unwrap(), vec!["V", "U", "T"]);
    Ok(())
}

/// 测试任一依赖失败时整条链失败
#[tokio::test]
async fn test_get_promise_fails_fast() -> anyhow::Result<()> {
    let registry = Arc::new(AnnotationRegistry::new());
    let slow_done = Arc::new(AtomicUsize::new(0));
    let done = slow_done.clone();
    registry.define_async("Slow", [], move |_| {
        let done = done.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            done.fetch_add(1, Ordering::SeqCst);
            Ok::<Instance, ProviderError>(Arc::new(()))
        }
    });
    registry.define_async("Broken", [], |_| async {
        Err::<Instance, ProviderError>("remote store unavailable".into())
    });
    registry.define_factory("Page", [inject(["Slow", "Broken"])], Factory::value(Arc::new(())));

    let injector = Injector::new(registry, Module::new())?;
    let err = assert_err!(injector.get_promise(&Token::from("Page")).await);
    match err {
        DependencyError::ProviderFailed { token, source, .. } => {
            assert_eq!(token, Token::from("Broken"));
            assert_eq!(source.to_string(), "remote store unavailable");
        }
        other => panic!("unexpected error: {other}"),
    }

    // 已启动的兄弟任务继续运行并缓存结果
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(slow_done.load(Ordering::SeqCst), 1);
    assert_ok!(injector.get_promise(&Token::from("Slow")).await);
    assert_eq!(slow_done.load(Ordering::SeqCst), 1);
    Ok(())
}

/// 测试并发异步解析共享一次构造
#[tokio::test]
async fn test_concurrent_get_promise_constructs_once() -> anyhow::Result<()> {
    let registry = Arc::new(AnnotationRegistry::new());
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    registry.define_async("Remote", [], move |_| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<Instance, ProviderError>(Arc::new(String::from("todos")))
        }
    });

    let injector = Injector::new(registry, Module::new())?;
    let token = Token::from("Remote");
    let results = futures::future::try_join_all((0..5).map(|_| injector.get_promise(&token))).await?;

    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert!(Arc::ptr_eq(&results[0], &injector.get_promise(&token).await?));
    Ok(())
}

/// 测试异步解析同步提供者及其对异步令牌的直接依赖
#[tokio::test]
async fn test_get_promise_resolves_sync_providers() -> anyhow::Result<()> {
    let registry = Arc::new(AnnotationRegistry::new());
    registry.define_async("Remote", [], |_| async {
        Ok::<Instance, ProviderError>(Arc::new(3usize))
    });
    registry.define_factory(
        "Count",
        [inject(["Remote"])],
        Factory::function(|args| Ok(args.instance(0)?)),
    );

    let injector = Injector::new(registry, Module::new())?;
    let count = injector.get_promise(&Token::from("Count")).await?;
    assert_eq!(*count.downcast::<usize>().expect("usize"), 3);

    // 同步解析已缓存的同步令牌
    let cached = assert_ok!(injector.get_as::<usize>(&Token::from("Count")));
    assert_eq!(*cached, 3);

    // Promise 令牌即使已缓存也不能同步获取
    assert!(matches!(
        injector.get(&Token::from("Remote")),
        Err(DependencyError::MixedAsyncSync { .. })
    ));

    let me = injector.resolve_promise::<Injector>().await?;
    assert_eq!(me.id(), injector.id());
    Ok(())
}

/// 测试异步解析中的循环依赖
#[tokio::test]
async fn test_get_promise_detects_cycles() -> anyhow::Result<()> {
    let registry = Arc::new(AnnotationRegistry::new());
    registry.define_factory("A", [inject_promise(["B"])], Factory::value(Arc::new(())));
    registry.define_factory("B", [inject(["A"])], Factory::value(Arc::new(())));

    let injector = Injector::new(registry, Module::new())?;
    let err = assert_err!(injector.get_promise(&Token::from("A")).await);
    match err {
        DependencyError::CircularDependency { cycle } => {
            assert_eq!(cycle, vec![Token::from("A"), Token::from("B"), Token::from("A")]);
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

/// 测试经由兄弟分支形成的循环依赖在异步解析中报错而不是挂起
#[tokio::test]
async fn test_get_promise_detects_cycles_across_siblings() -> anyhow::Result<()> {
    let registry = Arc::new(AnnotationRegistry::new());
    registry.define_factory("A", [inject(["B", "C"])], Factory::value(Arc::new(())));
    registry.define_factory("B", [inject(["C"])], Factory::value(Arc::new(())));
    registry.define_factory("C", [inject(["B"])], Factory::value(Arc::new(())));

    let injector = Injector::new(registry, Module::new())?;
    let result = tokio::time::timeout(
        Duration::from_secs(2),
        injector.get_promise(&Token::from("A")),
    )
    .await?;
    let err = assert_err!(result);
    assert_eq!(err.to_string(), "无法实例化循环依赖! (A -> B -> C -> B)");

    // 同步解析给出同样的循环
    let sync_err = assert_err!(injector.get(&Token::from("A")));
    assert_eq!(sync_err.to_string(), err.to_string());
    assert_eq!(injector.stats().cached_instances, 0);
    Ok(())
}

/// 测试同时异步解析循环两端时都报错
#[tokio::test]
async fn test_concurrent_get_promise_on_cycle_ends() -> anyhow::Result<()> {
    let registry = Arc::new(AnnotationRegistry::new());
    registry.define_factory("A", [inject(["B"])], Factory::value(Arc::new(())));
    registry.define_factory("B", [inject(["A"])], Factory::value(Arc::new(())));

    let injector = Injector::new(registry, Module::new())?;
    let (a, b) = tokio::time::timeout(
        Duration::from_secs(2),
        futures::future::join(
            injector.get_promise(&Token::from("A")),
            injector.get_promise(&Token::from("B")),
        ),
    )
    .await?;

    assert!(matches!(a, Err(DependencyError::CircularDependency { .. })));
    assert!(matches!(b, Err(DependencyError::CircularDependency { .. })));
    Ok(())
}

/// 测试菱形依赖中共享的单例只构造一次
#[tokio::test]
async fn test_get_promise_diamond_builds_shared_dependency_once() -> anyhow::Result<()> {
    let registry = Arc::new(AnnotationRegistry::new());
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    registry.define_async("D", [], move |_| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<Instance, ProviderError>(Arc::new(String::from("shared")))
        }
    });
    registry.define_factory("B", [inject(["D"])], Factory::function(|args| Ok(args.instance(0)?)));
    registry.define_factory("C", [inject(["D"])], Factory::function(|args| Ok(args.instance(0)?)));
    registry.define_factory(
        "A",
        [inject(["B", "C"])],
        Factory::function(|args| {
            let same = Arc::ptr_eq(&args.instance(0)?, &args.instance(1)?);
            Ok(Arc::new(same) as Instance)
        }),
    );

    let injector = Injector::new(registry, Module::new())?;
    let same = tokio::time::timeout(
        Duration::from_secs(2),
        injector.get_promise(&Token::from("A")),
    )
    .await??;

    assert!(*same.downcast::<bool>().expect("bool"));
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(injector.stats().cached_instances, 4);
    Ok(())
}

/// 测试同步与异步同时解析同一单例时工厂只调用一次
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sync_and_async_share_one_construction() -> anyhow::Result<()> {
    let registry = Arc::new(AnnotationRegistry::new());
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    registry.define_class::<Store, _>([], move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        Ok(Store { source: "memory" })
    });

    let injector = Injector::new(registry, Module::new())?;
    let sync_side = injector.clone();
    let handle = std::thread::spawn(move || sync_side.resolve::<Store>());

    let from_async = injector.resolve_promise::<Store>().await?;
    let from_sync = handle
        .join()
        .map_err(|_| anyhow::anyhow!("sync resolution thread panicked"))??;

    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&from_async, &from_sync));
    Ok(())
}

#[derive(Debug)]
struct Filters {
    id: usize,
}

#[derive(Debug)]
struct Router {
    filters: di_abstractions::Lazy,
    rows: di_abstractions::Lazy,
}

fn lazy_registry(built: Arc<AtomicUsize>) -> Arc<AnnotationRegistry> {
    let registry = Arc::new(AnnotationRegistry::new());
    let filters = built.clone();
    registry.define_class::<Filters, _>([], move |_| {
        Ok(Filters {
            id: filters.fetch_add(1, Ordering::SeqCst),
        })
    });
    let rows = built;
    registry.define_factory(
        "Row",
        [transient_scope()],
        Factory::function(move |_| Ok(Arc::new(rows.fetch_add(1, Ordering::SeqCst)) as Instance)),
    );
    registry.define_class::<Router, _>(
        [inject_lazy([Token::of::<Filters>(), Token::from("Row")])],
        |args| {
            Ok(Router {
                filters: args.lazy(0)?,
                rows: args.lazy(1)?,
            })
        },
    );
    registry
}

/// 测试延迟访问器：构造时不解析，单例返回同一实例，瞬时返回新实例
#[test]
fn test_lazy_accessor_honors_scopes() {
    let built = Arc::new(AtomicUsize::new(0));
    let injector = assert_ok!(Injector::new(lazy_registry(built.clone()), Module::new()));

    let router = assert_ok!(injector.resolve::<Router>());
    assert_eq!(built.load(Ordering::SeqCst), 0);

    let first = assert_ok!(router.filters.get_as::<Filters>());
    let second = assert_ok!(router.filters.get_as::<Filters>());
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.id, 0);

    let row_a = assert_ok!(router.rows.get());
    let row_b = assert_ok!(router.rows.get());
    assert!(!Arc::ptr_eq(&row_a, &row_b));
    assert_eq!(router.rows.token(), &Token::from("Row"));
}

/// 测试延迟访问器的局部值与异步解析
#[tokio::test]
async fn test_lazy_accessor_locals_and_promise() -> anyhow::Result<()> {
    let registry = Arc::new(AnnotationRegistry::new());
    registry.define_factory(
        "Greeting",
        [inject(["name"]), transient_scope()],
        Factory::function(|args| {
            let name = args.get::<String>(0)?;
            Ok(Arc::new(format!("hello {name}")) as Instance)
        }),
    );
    registry.define_async("Remote", [], |_| async {
        Ok::<Instance, ProviderError>(Arc::new(7u64))
    });
    registry.define_factory(
        "Holder",
        [inject_lazy(["Greeting", "Remote"])],
        Factory::function(|args| {
            Ok(Arc::new((args.lazy(0)?, args.lazy(1)?)) as Instance)
        }),
    );

    let injector = Injector::new(registry, Module::new())?;
    let holder = injector.get_as::<(di_abstractions::Lazy, di_abstractions::Lazy)>(&Token::from("Holder"))?;
    let (greeting, remote) = (&holder.0, &holder.1);

    let name: Instance = Arc::new(String::from("todo"));
    let hello = greeting.get_with(vec![(Token::from("name"), name)])?;
    assert_eq!(*hello.downcast::<String>().expect("String"), "hello todo");
    assert!(matches!(greeting.get(), Err(DependencyError::NoProvider { .. })));

    assert!(matches!(remote.get(), Err(DependencyError::MixedAsyncSync { .. })));
    let value = remote.get_promise().await?;
    assert_eq!(*value.downcast::<u64>().expect("u64"), 7);
    Ok(())
}

#[derive(Debug)]
struct Store {
    source: &'static str,
}

/// 测试子注入器覆盖异步提供者
#[tokio::test]
async fn test_child_overrides_async_provider() -> anyhow::Result<()> {
    let registry = Arc::new(AnnotationRegistry::new());
    registry.define_async(Token::of::<Store>(), [], |_| async {
        Ok::<Instance, ProviderError>(Arc::new(Store { source: "remote" }))
    });

    let injector = Injector::new(registry, Module::new().provider(Token::of::<Store>()))?;
    let child = injector.create_child(Module::new().factory(
        Token::of::<Store>(),
        [],
        Factory::class(|_| Ok(Store { source: "memory" })),
    ))?;

    assert_eq!(child.resolve_promise::<Store>().await?.source, "memory");
    assert_eq!(assert_ok!(child.resolve::<Store>()).source, "memory");
    assert_eq!(injector.resolve_promise::<Store>().await?.source, "remote");
    assert_eq!(child.stats().cached_instances, 1);
    Ok(())
}

/// 测试配置文件中的解析深度
#[tokio::test]
async fn test_config_limits_async_depth() -> anyhow::Result<()> {
    let registry = Arc::new(AnnotationRegistry::new());
    registry.define_factory("A", [inject(["B"])], Factory::value(Arc::new(())));
    registry.define_factory("B", [], Factory::value(Arc::new(())));

    let config = InjectorConfig::from_toml_str("max_resolution_depth = 1")?;
    let injector = Injector::builder().registry(registry).config(config).build()?;
    let err = assert_err!(injector.get_promise(&Token::from("A")).await);
    assert!(matches!(err, DependencyError::ResolutionDepthExceeded { limit: 1, .. }));
    Ok(())
}

/// 测试 provide 注解使目标提供其他令牌
#[tokio::test]
async fn test_module_target_with_provide_annotation() -> anyhow::Result<()> {
    let registry = Arc::new(AnnotationRegistry::new());
    registry.define_factory(
        "LocalStorageStore",
        [provide(Token::of::<Store>())],
        Factory::class(|_| Ok(Store { source: "localStorage" })),
    );
    let injector = Injector::new(registry, Module::new().provider("LocalStorageStore"))?;
    assert_eq!(injector.resolve_promise::<Store>().await?.source, "localStorage");
    assert!(injector.has_provider_for(&Token::of::<Store>()));
    assert!(!injector.has_provider_for(&Token::from("LocalStorageStore")));
    Ok(())
}
