//! # 路径工具函数
//!
//! 提供设置文件路径的解析：
//! - 获取用户设置文件路径（`~/.smart-lookup`）

use std::path::{Path, PathBuf};

/// 设置文件名（位于用户主目录下）
pub const SETTINGS_FILE_NAME: &str = ".smart-lookup";

/// 获取用户设置文件的绝对路径
///
/// 使用 `dirs` crate 获取跨平台的主目录路径。
///
/// # 错误
/// 如果无法确定用户主目录（如无 HOME 环境变量），返回错误信息。
///
/// # 示例
/// - Windows: `C:\Users\username\.smart-lookup`
/// - Linux/macOS: `/home/username/.smart-lookup`
pub fn get_settings_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or_else(|| "无法获取用户主目录".to_string())?;
    Ok(settings_path_in(&home))
}

/// 在指定目录下拼接设置文件路径
pub fn settings_path_in(dir: &Path) -> PathBuf {
    dir.join(SETTINGS_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_path_in_dir() {
        let path = settings_path_in(Path::new("home"));
        assert_eq!(path, Path::new("home").join(".smart-lookup"));
    }
}
