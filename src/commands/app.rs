//! # 应用级 Tauri Commands
//!
//! - `report_ui_error` - 前端未捕获错误的统一出口（记录日志并弹出提示框）
//! - `open_external_link` - 在系统浏览器中打开输出里的链接

use tauri::AppHandle;
use tauri_plugin_opener::OpenerExt;

use crate::services::bridge;

/// 允许从输出区域打开的链接协议
const ALLOWED_LINK_SCHEMES: &[&str] = &["http://", "https://", "mailto:"];

/// 链接是否允许交给系统打开
pub fn is_external_link(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    ALLOWED_LINK_SCHEMES
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

/// 上报前端未捕获的错误
///
/// # 参数
/// - `message` - 错误描述（通常是 `error.message`）
/// - `source` - 可选的来源信息（文件名、行号或堆栈）
#[tauri::command]
pub async fn report_ui_error(
    app: AppHandle,
    message: String,
    source: Option<String>,
) -> Result<(), String> {
    match &source {
        Some(source) => log::error!("前端未捕获错误: {} ({})", message, source),
        None => log::error!("前端未捕获错误: {}", message),
    }
    bridge::show_notice(&app, "发生错误", &message);
    Ok(())
}

/// 在系统浏览器（或邮件客户端）中打开链接
///
/// # 错误
/// 协议不在白名单内或系统无法打开时返回错误信息
#[tauri::command]
pub async fn open_external_link(app: AppHandle, url: String) -> Result<(), String> {
    if !is_external_link(&url) {
        return Err(format!("不支持的链接: {}", url));
    }
    app.opener()
        .open_url(url.trim(), None::<&str>)
        .map_err(|e| format!("打开链接失败: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_external_link() {
        assert!(is_external_link("https://example.com"));
        assert!(is_external_link("HTTP://example.com"));
        assert!(is_external_link("mailto:a@b.c"));
        assert!(!is_external_link("javascript:alert(1)"));
        assert!(!is_external_link("file:///etc/passwd"));
        assert!(!is_external_link(""));
    }
}
