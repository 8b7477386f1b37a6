//! # 窗口 Tauri Commands

use tauri::{AppHandle, Manager};

use crate::models::bridge::ResizeRequest;
use crate::services::window::{self, MAIN_WINDOW};

/// 按前端测量的内容尺寸调整窗口大小
///
/// # 参数
/// - `request` - 宽度可选，高度必填（逻辑像素）
///
/// # 返回值
/// 实际调整了大小时返回 `true`
///
/// # 错误
/// 主窗口不存在或平台调用失败时返回错误信息
#[tauri::command]
pub async fn resize_window(app: AppHandle, request: ResizeRequest) -> Result<bool, String> {
    let main = app
        .get_webview_window(MAIN_WINDOW)
        .ok_or_else(|| "主窗口不存在".to_string())?;
    window::resize(&main, &request).map_err(|e| format!("调整窗口大小失败: {}", e))
}

/// 隐藏窗口
#[tauri::command]
pub async fn hide_window(app: AppHandle) -> Result<(), String> {
    window::hide_main(&app);
    Ok(())
}
