//! 生命周期集成测试
//!
//! 用内存存储 + Echo Provider 走完整的安装/启用/禁用/卸载流程。

use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;

use crate::descriptor::{PluginDescriptor, ProviderDescriptor};
use crate::lifecycle::events::{LifecycleEvent, LifecycleEventBus, LifecycleEventKind, LifecycleSubscriber};
use crate::lifecycle::manager::{
    InstallError, LifecycleConfig, NoopProgressCallback, PluginLifecycleManager,
};
use crate::lifecycle::status::PluginStatus;
use crate::lifecycle::store::{InstallationStore, MemoryInstallationStore};
use crate::loader::{ProviderBuilderRegistry, ProviderLoader};
use crate::provider::{ModelConfig, ModelProvider, ProviderError};
use crate::registry::{ModelRegistry, NamespaceFactoryRegistry, OptionsHandlerRegistry};
use crate::test_support::{demo_archive, echo_builder, write_zip_archive, EchoProvider};

struct EventRecorder {
    seen: Mutex<Vec<LifecycleEvent>>,
}

impl LifecycleSubscriber for EventRecorder {
    fn on_event(&self, event: &LifecycleEvent) -> Result<(), String> {
        self.seen.lock().push(event.clone());
        Ok(())
    }
}

struct Fixture {
    _dir: TempDir,
    archive: PathBuf,
    manager: Arc<PluginLifecycleManager>,
    builders: Arc<ProviderBuilderRegistry>,
    models: Arc<ModelRegistry>,
    factories: Arc<NamespaceFactoryRegistry>,
    store: Arc<MemoryInstallationStore>,
    events: Arc<EventRecorder>,
    plugins_dir: PathBuf,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let archive = demo_archive(dir.path());
    let plugins_dir = dir.path().join("plugins");

    let builders = Arc::new(ProviderBuilderRegistry::new());
    let models = Arc::new(ModelRegistry::new());
    let factories = Arc::new(NamespaceFactoryRegistry::new());
    let options = Arc::new(OptionsHandlerRegistry::new());
    let store = Arc::new(MemoryInstallationStore::new());
    let bus = Arc::new(LifecycleEventBus::new());
    let events = Arc::new(EventRecorder {
        seen: Mutex::new(Vec::new()),
    });
    bus.subscribe(events.clone());

    let config = LifecycleConfig {
        plugins_dir: plugins_dir.clone(),
        temp_dir: dir.path().join("tmp"),
    };
    let manager = Arc::new(PluginLifecycleManager::new(
        config,
        ProviderLoader::new(Arc::clone(&builders)),
        Arc::clone(&models),
        Arc::clone(&factories),
        options,
        store.clone() as Arc<dyn InstallationStore>,
        bus,
    ));

    Fixture {
        _dir: dir,
        archive,
        manager,
        builders,
        models,
        factories,
        store,
        events,
        plugins_dir,
    }
}

fn event_kinds(fx: &Fixture) -> Vec<LifecycleEventKind> {
    fx.events.seen.lock().iter().map(|e| e.kind.clone()).collect()
}

#[tokio::test]
async fn install_enable_disable_uninstall_full_cycle() {
    let fx = fixture();
    fx.builders.register("com.example.Provider", echo_builder());

    let descriptor = fx
        .manager
        .install("tenant-1", &fx.archive, &NoopProgressCallback)
        .await
        .unwrap();
    assert_eq!(descriptor.id, "demo");
    assert_eq!(
        fx.manager.status("tenant-1", "demo").await,
        PluginStatus::InstalledDisabled
    );
    // 安装不触发模型注册
    assert!(!fx.models.contains_model("demo:demo-chat"));

    fx.manager.enable("tenant-1", "demo").await.unwrap();
    assert_eq!(
        fx.manager.status("tenant-1", "demo").await,
        PluginStatus::InstalledEnabled
    );
    assert!(fx.models.contains_model("demo:demo-chat"));
    assert!(fx.factories.get_factory("demo").is_some());

    fx.manager.disable("tenant-1", "demo").await.unwrap();
    assert_eq!(
        fx.manager.status("tenant-1", "demo").await,
        PluginStatus::InstalledDisabled
    );
    assert!(!fx.models.contains_model("demo:demo-chat"));
    assert!(fx.factories.get_factory("demo").is_none());

    fx.manager.uninstall("tenant-1", "demo").await.unwrap();
    assert_eq!(
        fx.manager.status("tenant-1", "demo").await,
        PluginStatus::NotInstalled
    );
    assert!(!fx.plugins_dir.join("demo").exists());
    assert!(fx.store.get("tenant-1", "demo").await.unwrap().is_none());

    assert_eq!(
        event_kinds(&fx),
        vec![
            LifecycleEventKind::Installed,
            LifecycleEventKind::Enabled,
            LifecycleEventKind::Disabled,
            LifecycleEventKind::Uninstalled,
        ]
    );
}

#[tokio::test]
async fn enable_failure_is_retryable_after_fix() {
    let fx = fixture();
    // 故意不注册构建器，enable 在依赖检查阶段失败

    fx.manager
        .install("tenant-1", &fx.archive, &NoopProgressCallback)
        .await
        .unwrap();

    let err = fx.manager.enable("tenant-1", "demo").await.unwrap_err();
    assert!(matches!(err, InstallError::Load(_)));
    assert_eq!(
        fx.manager.status("tenant-1", "demo").await,
        PluginStatus::EnableFailed
    );
    assert!(!fx.models.contains_model("demo:demo-chat"));

    let kinds = event_kinds(&fx);
    match kinds.last().unwrap() {
        LifecycleEventKind::Error { stage } => assert_eq!(stage, "dependency_check"),
        other => panic!("意外的事件种类: {:?}", other),
    }

    // 修复缺失的入口后重试同一动作
    fx.builders.register("com.example.Provider", echo_builder());
    fx.manager.enable("tenant-1", "demo").await.unwrap();
    assert_eq!(
        fx.manager.status("tenant-1", "demo").await,
        PluginStatus::InstalledEnabled
    );
    assert!(fx.models.contains_model("demo:demo-chat"));
}

#[tokio::test]
async fn enable_before_install_is_rejected_without_side_effects() {
    let fx = fixture();
    fx.builders.register("com.example.Provider", echo_builder());

    let err = fx.manager.enable("tenant-1", "demo").await.unwrap_err();
    assert!(matches!(err, InstallError::State(_)));
    assert!(fx.factories.get_factory("demo").is_none());
    assert!(fx.models.list_models().is_empty());
    assert!(event_kinds(&fx).is_empty());
}

#[tokio::test]
async fn install_rejects_defective_archive_before_any_state_change() {
    let fx = fixture();
    let bad = write_zip_archive(
        fx._dir.path(),
        "bad.zip",
        &[("manifest.json", r#"{"id": "bad", "version": "", "entry": ""}"#)],
    );

    let err = fx
        .manager
        .install("tenant-1", &bad, &NoopProgressCallback)
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::Validation(_)));
    assert_eq!(
        fx.manager.status("tenant-1", "bad").await,
        PluginStatus::NotInstalled
    );
    assert!(fx.store.get("tenant-1", "bad").await.unwrap().is_none());
}

#[tokio::test]
async fn install_bytes_writes_through_temp_dir() {
    let fx = fixture();
    let bytes = std::fs::read(&fx.archive).unwrap();

    let descriptor = fx
        .manager
        .install_bytes("tenant-1", "demo-1.0.zip", &bytes, &NoopProgressCallback)
        .await
        .unwrap();
    assert_eq!(descriptor.id, "demo");
    assert!(fx.plugins_dir.join("demo").join("manifest.json").exists());
}

#[tokio::test]
async fn uninstall_from_enabled_state_deregisters_models() {
    let fx = fixture();
    fx.builders.register("com.example.Provider", echo_builder());

    fx.manager
        .install("tenant-1", &fx.archive, &NoopProgressCallback)
        .await
        .unwrap();
    fx.manager.enable("tenant-1", "demo").await.unwrap();
    assert!(fx.models.contains_model("demo:demo-chat"));

    fx.manager.uninstall("tenant-1", "demo").await.unwrap();
    assert!(!fx.models.contains_model("demo:demo-chat"));
    assert!(fx.factories.get_factory("demo").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_installs_of_same_plugin_are_serialized() {
    let fx = fixture();
    fx.builders.register("com.example.Provider", echo_builder());

    let mut handles = Vec::new();
    for _ in 0..2 {
        let manager = fx.manager.clone();
        let archive = fx.archive.clone();
        handles.push(tokio::spawn(async move {
            manager.install("tenant-1", &archive, &NoopProgressCallback).await
        }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    // 互斥串行：恰好一次安装成功，另一次被状态机拒绝
    let ok = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(ok, 1);
    let err = outcomes.into_iter().find_map(|r| r.err()).unwrap();
    assert!(matches!(err, InstallError::State(_)));

    assert_eq!(
        fx.manager.status("tenant-1", "demo").await,
        PluginStatus::InstalledDisabled
    );
    assert_eq!(event_kinds(&fx), vec![LifecycleEventKind::Installed]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn operations_on_different_plugins_run_in_parallel() {
    let fx = fixture();
    // 两个插件的构建器在同一屏障上会合：
    // 只有两个 enable 真正并行时屏障才会放行
    let barrier = Arc::new(Barrier::new(2));
    for (id, entry) in [("alpha", "com.example.Alpha"), ("beta", "com.example.Beta")] {
        let manifest = format!(
            r#"{{"id": "{id}", "name": "{id}", "version": "1.0", "plugin_type": "model", "entry": "{entry}"}}"#
        );
        let provider = format!(r#"{{"code": "{id}", "supported_model_types": ["chat"]}}"#);
        let archive = write_zip_archive(
            fx._dir.path(),
            &format!("{id}.zip"),
            &[("manifest.json", &manifest), ("provider.json", &provider)],
        );
        fx.manager
            .install("tenant-1", &archive, &NoopProgressCallback)
            .await
            .unwrap();

        let gate = Arc::clone(&barrier);
        fx.builders.register(
            entry,
            Arc::new(move |_plugin: &PluginDescriptor, descriptor: &ProviderDescriptor| {
                gate.wait();
                let provider: Arc<dyn ModelProvider> =
                    Arc::new(EchoProvider::new(descriptor.code.clone()));
                Ok(provider)
            }),
        );
    }

    let alpha = {
        let manager = fx.manager.clone();
        tokio::spawn(async move { manager.enable("tenant-1", "alpha").await })
    };
    let beta = {
        let manager = fx.manager.clone();
        tokio::spawn(async move { manager.enable("tenant-1", "beta").await })
    };

    tokio::time::timeout(Duration::from_secs(10), alpha)
        .await
        .expect("alpha 启用未并行执行")
        .unwrap()
        .unwrap();
    tokio::time::timeout(Duration::from_secs(10), beta)
        .await
        .expect("beta 启用未并行执行")
        .unwrap()
        .unwrap();

    assert!(fx.factories.get_factory("alpha").is_some());
    assert!(fx.factories.get_factory("beta").is_some());
}

#[tokio::test]
async fn enable_failure_event_masks_credentials() {
    let fx = fixture();
    fx.builders.register(
        "com.example.Provider",
        Arc::new(|_plugin: &PluginDescriptor, _descriptor: &ProviderDescriptor| {
            Err(ProviderError::Upstream(
                "上游拒绝: api_key=sk-secret-123".to_string(),
            ))
        }),
    );

    fx.manager
        .install("tenant-1", &fx.archive, &NoopProgressCallback)
        .await
        .unwrap();
    fx.manager.enable("tenant-1", "demo").await.unwrap_err();

    let events = fx.events.seen.lock();
    let message = events.last().unwrap().message.clone().unwrap();
    assert!(message.contains("***"));
    assert!(!message.contains("sk-secret-123"));
}

#[tokio::test]
async fn model_config_update_is_scoped_to_plugin_namespace() {
    let fx = fixture();
    fx.builders.register("com.example.Provider", echo_builder());
    fx.manager
        .install("tenant-1", &fx.archive, &NoopProgressCallback)
        .await
        .unwrap();
    fx.manager.enable("tenant-1", "demo").await.unwrap();

    // 他人命名空间的模型拒绝更新，不发事件
    let err = fx
        .manager
        .update_model_config("tenant-1", "demo", "other:demo-chat", ModelConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::Registration(_)));
    assert!(!event_kinds(&fx).contains(&LifecycleEventKind::ConfigUpdated));

    let mut config = ModelConfig::default();
    config.max_tokens = Some(42);
    fx.manager
        .update_model_config("tenant-1", "demo", "demo:demo-chat", config)
        .await
        .unwrap();

    assert_eq!(
        event_kinds(&fx).last(),
        Some(&LifecycleEventKind::ConfigUpdated)
    );
    let metadata = fx.models.get_model_metadata("demo:demo-chat").unwrap();
    assert_eq!(metadata.config.max_tokens, Some(42));
}

#[tokio::test]
async fn scan_lists_installed_plugins() {
    let fx = fixture();
    fx.manager
        .install("tenant-1", &fx.archive, &NoopProgressCallback)
        .await
        .unwrap();

    let found = fx.manager.scan().await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].1.id, "demo");
}
