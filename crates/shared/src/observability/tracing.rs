//! 日志订阅器初始化
//!
//! 基于 tracing-subscriber 构建 EnvFilter + fmt 层，支持 pretty 与 JSON 两种输出。

use anyhow::Result;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use super::ObservabilityConfig;

/// Tracing 资源守卫
pub struct TracingGuard {
    pub service_name: String,
}

/// 初始化 tracing（日志）
///
/// 全局订阅器只能安装一次，重复调用会返回错误。
pub fn init(config: &ObservabilityConfig) -> Result<TracingGuard> {
    let env_filter = build_filter(&config.log_level);

    let fmt_layer = if config.json_logs {
        fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(TracingGuard {
        service_name: config.service_name.clone(),
    })
}

/// 构建环境过滤器：RUST_LOG 优先，其次配置项，最后回退到 info
pub fn build_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_directives() {
        let filter = build_filter("rule_engine=debug,info");
        assert!(!filter.to_string().is_empty());
    }

    #[test]
    fn test_build_filter_falls_back_on_garbage() {
        // 非法指令不应 panic
        let _ = build_filter("==not a directive==");
    }
}
