// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 该模块包含系统的核心业务逻辑服务。
///
/// 包含的服务：
/// - 构筑分类（build_categorizer）：基于关键字规则的纯函数分类
/// - 采集编排（collection_service）：新鲜度判断、分页抓取、持久化与档案增强
/// - 天梯客户端（ladder_client）：外部抓取接口定义
/// - 联赛分类（league_classifier）：挑战联赛发现与联赛类别判定
/// - 速率限制（rate_limiting_service）：多级滑动窗口限流与指数退避
pub mod build_categorizer;
pub mod collection_service;
pub mod ladder_client;
pub mod league_classifier;
pub mod rate_limiting_service;
