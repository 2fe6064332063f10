//! Data Sanitization
//!
//! Persisted scheduling state comes from an external store and may carry
//! missing, NaN or out-of-range values. These helpers map such values back
//! into the ranges the schedulers rely on.
//!
//! Functions:
//! - Ease factor / interval / repetition sanitization (SM-2)
//! - Stability / difficulty sanitization (FSRS)
//! - Config sanitization

use crate::types::{
    FsrsConfig, DEFAULT_DIFFICULTY, DEFAULT_EASE_FACTOR, DEFAULT_MAXIMUM_INTERVAL,
    DEFAULT_REQUEST_RETENTION, MAX_DIFFICULTY, MAX_STABILITY, MIN_DIFFICULTY, MIN_EASE_FACTOR,
    MIN_STABILITY,
};

/// 检查数值是否有效 (非 NaN、非 Inf)
pub fn is_valid_number(x: f64) -> bool {
    x.is_finite()
}

/// 清理 ease factor: 无效值回退到默认值，低于下限时截断到 1.3
pub fn sanitize_ease_factor(ease_factor: f64) -> f64 {
    if !is_valid_number(ease_factor) {
        return DEFAULT_EASE_FACTOR;
    }
    ease_factor.max(MIN_EASE_FACTOR)
}

/// 负数间隔视为 0
pub fn sanitize_interval(interval: i64) -> i64 {
    interval.max(0)
}

/// 清理难度: 缺失或无效时使用默认值 5，否则限制在 [1, 10]
pub fn sanitize_difficulty(difficulty: Option<f64>) -> f64 {
    match difficulty {
        Some(d) if is_valid_number(d) => clamp_difficulty(d),
        _ => DEFAULT_DIFFICULTY,
    }
}

pub fn clamp_difficulty(difficulty: f64) -> f64 {
    difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

/// 稳定性限制在 [0.1, 36500]；NaN 回退到下限，溢出的 +inf 截断到上限
pub fn clamp_stability(stability: f64) -> f64 {
    if stability.is_nan() {
        return MIN_STABILITY;
    }
    stability.clamp(MIN_STABILITY, MAX_STABILITY)
}

/// 清理 FSRS 配置
///
/// - requestRetention 必须在 (0, 1) 内，否则回退到 0.9
/// - maximumInterval 限制在 [1, 36500]
pub fn sanitize_fsrs_config(config: &FsrsConfig) -> FsrsConfig {
    let request_retention = if is_valid_number(config.request_retention)
        && config.request_retention > 0.0
        && config.request_retention < 1.0
    {
        config.request_retention
    } else {
        DEFAULT_REQUEST_RETENTION
    };

    FsrsConfig {
        request_retention,
        maximum_interval: config.maximum_interval.clamp(1, DEFAULT_MAXIMUM_INTERVAL),
        enable_fuzz: config.enable_fuzz,
    }
}
