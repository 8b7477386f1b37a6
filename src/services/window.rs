//! # 窗口控制服务
//!
//! 浮窗的显示、隐藏和按内容高度调整大小。窗口外观（无边框、最大尺寸等）
//! 由 `tauri.conf.json` 配置。

use tauri::{AppHandle, LogicalSize, Manager, Runtime, WebviewWindow};

use crate::models::bridge::ResizeRequest;

/// 主窗口标签
pub const MAIN_WINDOW: &str = "main";

/// 计算调整后的窗口尺寸（逻辑像素）
///
/// 只有请求中给出且与当前值不同的维度才算变化；
/// 宽高都没有变化时返回 `None`，不触发实际的窗口调整。
/// 比较按整数像素进行，避免缩放带来的小数误差反复触发调整。
///
/// # 参数
/// - `current` - 当前逻辑尺寸 `(宽, 高)`
/// - `request` - 前端请求的尺寸；小于等于 0 的值视为未给出
pub fn resize_target(current: (f64, f64), request: &ResizeRequest) -> Option<(f64, f64)> {
    let width = request.width.filter(|w| *w > 0.0);
    let height = Some(request.height).filter(|h| *h > 0.0);

    let width_changed = width.is_some_and(|w| w.round() != current.0.round());
    let height_changed = height.is_some_and(|h| h.round() != current.1.round());
    if !width_changed && !height_changed {
        return None;
    }

    Some((width.unwrap_or(current.0), height.unwrap_or(current.1)))
}

/// 按请求调整窗口大小
///
/// # 参数
/// - `window` - 目标窗口
/// - `request` - 前端测量的内容尺寸（逻辑像素）
///
/// # 返回值
/// 实际调整了大小返回 `true`
pub fn resize<R: Runtime>(window: &WebviewWindow<R>, request: &ResizeRequest) -> tauri::Result<bool> {
    let scale = window.scale_factor()?;
    let size = window.inner_size()?.to_logical::<f64>(scale);

    match resize_target((size.width, size.height), request) {
        Some((width, height)) => {
            window.set_size(LogicalSize::new(width, height))?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// 显示主窗口并聚焦
///
/// 全局快捷键触发；失败只记录日志。
pub fn show_main<R: Runtime>(app: &AppHandle<R>) {
    if let Some(window) = app.get_webview_window(MAIN_WINDOW) {
        if let Err(e) = window.show().and_then(|_| window.set_focus()) {
            log::warn!("显示窗口失败: {}", e);
        }
    }
}

/// 隐藏主窗口（不销毁）
pub fn hide_main<R: Runtime>(app: &AppHandle<R>) {
    if let Some(window) = app.get_webview_window(MAIN_WINDOW) {
        if let Err(e) = window.hide() {
            log::warn!("隐藏窗口失败: {}", e);
        }
    }
}
