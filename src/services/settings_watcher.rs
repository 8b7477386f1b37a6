//! # 设置文件监听服务
//!
//! 设置文件在运行期间被修改时重新读取，并通过 `update-settings` 事件推送给前端。
//! 默认关闭，设置环境变量 `SMART_LOOKUP_WATCH_SETTINGS=1` 后启用。
//!
//! 监听的是设置文件所在目录（非递归）：很多编辑器保存时会先写临时文件再重命名，
//! 直接监听文件本身会在第一次保存后失效。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::models::bridge::UiEvent;
use crate::services::bridge::UiBridge;
use crate::services::settings_store::SettingsStore;

/// 启用监听的环境变量
pub const WATCH_ENV: &str = "SMART_LOOKUP_WATCH_SETTINGS";

/// 合并一次保存产生的多个文件系统事件
const DEBOUNCE: Duration = Duration::from_millis(200);

/// 环境变量是否要求启用监听
pub fn enabled_from_env() -> bool {
    std::env::var(WATCH_ENV)
        .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// 文件系统事件是否与设置文件有关
fn touches_settings(event: &notify::Event, settings_path: &Path) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    let Some(file_name) = settings_path.file_name() else {
        return false;
    };
    event
        .paths
        .iter()
        .any(|path| path.file_name() == Some(file_name))
}

/// 把文件变化通知转换为设置推送
///
/// 每收到一次通知，先等待 `debounce` 并丢弃期间积压的通知，再重新读取设置。
/// 读取成功时推送一次 `UpdateSettings`；文件损坏或被删除时只记录日志，不推送。
/// 发送端全部关闭后返回。
///
/// # 参数
/// - `rx` - 文件变化通知
/// - `store` - 设置存储
/// - `bridge` - 推送通道
/// - `debounce` - 合并连续通知的等待时间
pub async fn forward_changes(
    mut rx: mpsc::UnboundedReceiver<()>,
    store: Arc<SettingsStore>,
    bridge: Arc<dyn UiBridge>,
    debounce: Duration,
) {
    while rx.recv().await.is_some() {
        tokio::time::sleep(debounce).await;
        while rx.try_recv().is_ok() {}

        match store.reload().await {
            Ok(settings) => {
                log::info!("设置文件已变化，重新加载完成");
                bridge.send(UiEvent::UpdateSettings(settings));
            }
            Err(e) => log::warn!("重新加载设置失败，保留当前设置: {}", e),
        }
    }
}

/// 运行中的监听器
///
/// 持有底层 watcher；句柄被丢弃后监听随之停止。
pub struct SettingsWatcher {
    _watcher: RecommendedWatcher,
}

impl SettingsWatcher {
    /// 开始监听设置文件
    ///
    /// # 参数
    /// - `store` - 设置存储，变化时调用其 `reload()`
    /// - `bridge` - 重新加载成功后推送 `UpdateSettings`
    ///
    /// # 错误
    /// 设置文件没有父目录或无法创建监听时返回错误
    pub fn start(store: Arc<SettingsStore>, bridge: Arc<dyn UiBridge>) -> Result<Self, String> {
        let settings_path: PathBuf = store.path().to_path_buf();
        let dir = settings_path
            .parent()
            .ok_or_else(|| format!("设置文件没有父目录: {}", settings_path.display()))?
            .to_path_buf();

        let (tx, rx) = mpsc::unbounded_channel::<()>();
        let filter_path = settings_path.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) if touches_settings(&event, &filter_path) => {
                    let _ = tx.send(());
                }
                Ok(_) => {}
                Err(e) => log::warn!("设置文件监听出错: {}", e),
            }
        })
        .map_err(|e| format!("创建设置文件监听失败: {}", e))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| format!("监听目录失败 {}: {}", dir.display(), e))?;
        log::info!("已开始监听设置文件: {}", settings_path.display());

        tauri::async_runtime::spawn(forward_changes(rx, store, bridge, DEBOUNCE));

        Ok(Self { _watcher: watcher })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    use crate::models::settings::Settings;

    /// 记录所有推送的桥接
    #[derive(Default)]
    struct RecordingBridge {
        events: Mutex<Vec<UiEvent>>,
    }

    impl UiBridge for RecordingBridge {
        fn send(&self, event: UiEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl RecordingBridge {
        fn events(&self) -> Vec<UiEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    async fn loaded_store(dir: &tempfile::TempDir) -> Arc<SettingsStore> {
        let store = Arc::new(SettingsStore::new(dir.path().join(".smart-lookup")));
        store.load().await;
        store
    }

    fn event(kind: EventKind, path: &str) -> notify::Event {
        notify::Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_only_settings_file_events_count() {
        let settings = Path::new("/home/u/.smart-lookup");
        assert!(touches_settings(
            &event(EventKind::Modify(ModifyKind::Any), "/home/u/.smart-lookup"),
            settings
        ));
        assert!(touches_settings(
            &event(EventKind::Create(CreateKind::File), "/home/u/.smart-lookup"),
            settings
        ));
        assert!(!touches_settings(
            &event(EventKind::Modify(ModifyKind::Any), "/home/u/.bashrc"),
            settings
        ));
        assert!(!touches_settings(
            &event(EventKind::Access(AccessKind::Any), "/home/u/.smart-lookup"),
            settings
        ));
    }

    #[tokio::test]
    async fn test_partial_edit_is_merged_and_pushed_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = loaded_store(&dir).await;
        let bridge = Arc::new(RecordingBridge::default());
        tokio::fs::write(store.path(), r#"{"model":"mistral"}"#)
            .await
            .unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        // 一次保存产生的多个通知只触发一次重新加载
        tx.send(()).unwrap();
        tx.send(()).unwrap();
        drop(tx);
        forward_changes(rx, Arc::clone(&store), bridge.clone(), Duration::ZERO).await;

        let mut expected = Settings::default();
        expected.model = "mistral".into();
        assert_eq!(bridge.events(), vec![UiEvent::UpdateSettings(expected.clone())]);
        assert_eq!(store.current(), expected);
    }

    #[tokio::test]
    async fn test_malformed_edit_pushes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = loaded_store(&dir).await;
        let bridge = Arc::new(RecordingBridge::default());
        tokio::fs::write(store.path(), "{ broken").await.unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(()).unwrap();
        drop(tx);
        forward_changes(rx, Arc::clone(&store), bridge.clone(), Duration::ZERO).await;

        assert!(bridge.events().is_empty());
        assert_eq!(store.current(), Settings::default());
    }
}
