//! # Smart Lookup - Tauri 桌面应用原生入口点
//!
//! 仅负责启动应用，插件注册、窗口创建、事件循环等逻辑均位于 `lib.rs`。

// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

fn main() {
  app_lib::run();
}
