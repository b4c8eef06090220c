// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供后台任务处理功能
/// 包括采集任务执行体与周期性维护循环
pub mod collection_worker;
pub mod maintenance_worker;

pub use collection_worker::CollectionJobRunner;
pub use maintenance_worker::MaintenanceWorker;
