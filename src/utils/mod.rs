// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
/// 包括内容哈希、关闭信号与遥测初始化
pub mod content_hash;
pub mod shutdown;
pub mod telemetry;
