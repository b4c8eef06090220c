// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 采集任务（job）：一次采集运行及其状态机
/// - 快照（snapshot）：不可变的天梯采集结果与聚合指标
/// - 角色（character）：天梯原始条目、规范化记录与增强数据
/// - 联赛（league）：联赛信息、类别与变体
pub mod character;
pub mod job;
pub mod league;
pub mod snapshot;
