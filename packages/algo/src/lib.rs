//! # kapian-algo - 闪卡间隔重复调度核心库
//!
//! 本 crate 提供纯 Rust 实现的调度算法:
//!
//! - **SM-2** - 经典 SuperMemo-2 (重复次数、间隔、易度因子)
//! - **FSRS** - FSRS-4 记忆模型 (稳定性、难度)，支持可注入随机源的 fuzz
//! - **Rating Bridge** - SM-2 质量分 (0-5) 与 FSRS 评分 (1-4) 的互相转换
//! - **Cloze** - 填空卡解析、校验与按字段展开
//!
//! ## 设计理念
//!
//! - **纯函数** - 调度函数无状态、无 I/O，时间与随机源由调用方传入
//! - **强类型评分** - 两种评分刻度是不同类型，越界输入在构造时即被拒绝
//! - **常量参数** - FSRS 权重与 SM-2 常数均为 `const`，运行时不可变
//!
//! ## 模块结构
//!
//! - [`sm2`] - SM-2 调度
//! - [`fsrs`] - FSRS 调度 (遗忘曲线、间隔、fuzz)
//! - [`bridge`] - 评分刻度转换
//! - [`cloze`] - 填空卡解析与展开
//! - [`sanitize`] - 持久化状态清洗
//! - [`types`] - 公共类型和常量
//!
//! ## 使用示例
//!
//! ```rust
//! use chrono::Utc;
//! use kapian_algo::{calculate_sm2, FsrsConfig, FsrsCard, FsrsReview, FsrsScheduler, Sm2Quality};
//!
//! let now = Utc::now();
//! let quality = Sm2Quality::new(5).unwrap();
//! let sm2 = calculate_sm2(quality, 0, 0, 2.5, now);
//! assert_eq!(sm2.interval, 1);
//!
//! let mut scheduler = FsrsScheduler::with_seed(FsrsConfig::without_fuzz(), 42);
//! let review = FsrsReview::new(quality.into());
//! let outcome = scheduler.schedule(&FsrsCard::default(), &review, now);
//! assert!(outcome.card.stability > 0.0);
//! ```

// ============================================================================
// 模块声明
// ============================================================================

pub mod bridge;
pub mod cloze;
pub mod fsrs;
pub mod sanitize;
pub mod sm2;
pub mod types;

// ============================================================================
// 重新导出
// ============================================================================

/// 重新导出所有公共类型
pub use types::*;

/// 重新导出 SM-2 调度
pub use sm2::{calculate_sm2, preview_sm2};

/// 重新导出 FSRS 调度
pub use fsrs::{calculate_fsrs, preview_fsrs, retrievability, FsrsScheduler};

/// 重新导出评分转换
pub use bridge::{fsrs_rating_to_sm2_quality, sm2_quality_to_fsrs_rating};

/// 重新导出填空卡展开
pub use cloze::{
    expand, expand_all, parse_cloze, validate_cloze, Card, CardContent, ClozeData, ClozeField,
    ClozeIssue, StudyCard, StudyCardKind,
};
