//! # Tauri Command 处理模块
//!
//! 本模块包含所有注册到 Tauri 的 command 处理函数。
//! 每个子模块对应一个功能域：
//! - `session` - 提交、取消、Escape、清空和复制输出
//! - `settings` - 读取并推送设置、打开设置文件
//! - `window` - 窗口大小调整和隐藏
//! - `app` - 前端错误上报和外部链接

pub mod app;
pub mod session;
pub mod settings;
pub mod window;
