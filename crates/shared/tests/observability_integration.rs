//! 可观测性与配置模块集成测试
//!
//! 测试 metrics、tracing 初始化以及配置加载的核心功能。

// ============================================================================
// 指标记录测试
// ============================================================================

mod metrics_tests {
    use catalog_shared::observability::metrics::{
        describe_engine_metrics, record_action_skipped, record_batch, record_product_evaluation,
        record_rule_evaluation,
    };

    #[test]
    fn test_record_rule_evaluation() {
        for status in ["not_matched", "applied", "failed"] {
            record_rule_evaluation("brand-prefix", status);
        }
    }

    #[test]
    fn test_record_product_evaluation() {
        record_product_evaluation("google", 0.0004);
        record_product_evaluation("amazon", 0.12);
        record_product_evaluation("", 0.0);
    }

    #[test]
    fn test_record_batch_with_cancellation() {
        record_batch("amazon", 100, 0);
        record_batch("amazon", 100, 40);
        // 取消数大于总数时不应溢出
        record_batch("amazon", 1, 5);
    }

    #[test]
    fn test_describe_then_record() {
        describe_engine_metrics("catalog-export");
        record_action_skipped("apply_margin");
        record_action_skipped("set_category");
    }
}

// ============================================================================
// Tracing 初始化测试
// ============================================================================

mod tracing_tests {
    use catalog_shared::observability::{self, ObservabilityConfig};

    #[test]
    fn test_init_installs_subscriber_once() {
        let config = ObservabilityConfig {
            log_level: "rule_engine=debug,info".to_string(),
            json_logs: true,
            ..ObservabilityConfig::default()
        }
        .with_service_name("catalog-export");

        let guard = observability::init(&config);
        assert!(guard.is_ok());

        // 全局订阅器已安装，再次初始化返回错误
        let again = observability::init(&config);
        assert!(again.is_err());
    }

    #[test]
    fn test_empty_guard() {
        let _guard = observability::ObservabilityGuard::empty();
    }
}

// ============================================================================
// 配置加载测试
// ============================================================================

mod config_tests {
    use catalog_shared::config::{AppConfig, EngineSettings};

    #[test]
    fn test_load_without_files_uses_defaults() {
        let config = AppConfig::load("product-rule-engine").unwrap();
        assert_eq!(config.service_name, "product-rule-engine");
        assert!(config.engine.max_template_depth > 0);
        assert!(config.engine.max_condition_depth > 0);
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = AppConfig {
            engine: EngineSettings {
                batch_workers: Some(0),
                ..EngineSettings::default()
            },
            ..AppConfig::default()
        };

        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT");
        assert!(err.is_caller_fault());
    }

    #[test]
    fn test_engine_settings_deserialize_partial() {
        let settings: EngineSettings =
            serde_json::from_str(r#"{ "batch_workers": 8 }"#).unwrap();
        assert_eq!(settings.batch_workers, Some(8));
        assert_eq!(settings.max_template_depth, 5);
        assert_eq!(settings.parallel_threshold, 64);
    }
}
