//! # 设置相关 Tauri Commands
//!
//! - `get_settings` - 前端启动时请求一次设置，后台通过 `update-settings` 事件推送
//! - `open_settings_file` - 用系统默认编辑器打开 `~/.smart-lookup`

use std::sync::Arc;

use tauri::{AppHandle, State};
use tauri_plugin_opener::OpenerExt;

use crate::models::bridge::UiEvent;
use crate::models::settings::Settings;
use crate::services::bridge::SharedBridge;
use crate::services::settings_store::SettingsStore;

/// 请求推送当前设置
///
/// 设置以 `update-settings` 事件的形式送达前端（前端只监听这一个入口），
/// 同时作为返回值返回，方便调试。
///
/// # 返回值
/// 当前设置的快照
#[tauri::command]
pub async fn get_settings(
    store: State<'_, Arc<SettingsStore>>,
    bridge: State<'_, SharedBridge>,
) -> Result<Settings, String> {
    let settings = store.current();
    bridge.send(UiEvent::UpdateSettings(settings.clone()));
    Ok(settings)
}

/// 在系统默认编辑器中打开设置文件
///
/// 设置文件在启动时已经写入过（缺失时写入默认值），这里不再创建。
///
/// # 错误
/// 系统无法打开文件时返回错误信息
#[tauri::command]
pub async fn open_settings_file(
    app: AppHandle,
    store: State<'_, Arc<SettingsStore>>,
) -> Result<(), String> {
    let path = store.path().to_string_lossy().to_string();
    log::info!("打开设置文件: {}", path);
    app.opener()
        .open_path(path, None::<&str>)
        .map_err(|e| format!("打开设置文件失败: {}", e))
}
