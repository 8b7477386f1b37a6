//! # 数据模型模块
//!
//! 定义与前端 JavaScript 对象一一对应的 Rust 数据结构。
//! - `settings` - 用户设置及其默认值
//! - `session` - 生成会话的状态、视图快照和渲染结果
//! - `bridge` - 后台与前端之间的消息枚举

pub mod bridge;
pub mod session;
pub mod settings;
