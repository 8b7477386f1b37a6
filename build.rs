//! # Smart Lookup - Tauri Cargo 构建脚本
//!
//! 在 `cargo build` 编译主项目之前自动执行，由 Tauri 完成：
//! - 读取 `tauri.conf.json` 并生成运行时所需的上下文绑定代码
//! - 处理应用图标、权限清单（`capabilities/`）等静态资源
//! - 在 Windows 平台上生成应用程序清单（manifest）和资源文件（.rc）

/// 构建脚本入口函数
fn main() {
  tauri_build::build()
}
