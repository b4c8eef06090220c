// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供任务队列、任务表和调度功能
/// 负责采集任务的排队、串行执行与崩溃恢复
pub mod job_board;
pub mod scheduler;
pub mod task_queue;
