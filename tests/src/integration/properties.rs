//! # Dispatch Properties
//!
//! Property tests over the registry's decision points:
//!
//! - unregistered names are always `NOT_FOUND`
//! - a caller lacking the required capability never reaches the Plan
//! - every envelope carries exactly one of `result` / `error`

#[cfg(test)]
mod tests {
    use crate::fixtures::{spy_registry, Spy, CHAT_READ};
    use dispatch_core::{
        AuthContext, ErrorCode, OperationRecord, OperationRegistry, PlanError, PlanTable,
        RegistryConfig, ResultEnvelope, WILDCARD_CAPABILITY,
    };
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use std::future::Future;
    use std::sync::Arc;

    fn block_on<F: Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
            .block_on(fut)
    }

    fn assert_exclusive(env: &ResultEnvelope) {
        assert_eq!(env.success, env.result.is_some());
        assert_eq!(env.success, env.error.is_none());
    }

    fn capability() -> impl Strategy<Value = String> {
        "[a-z]{1,8}:[a-z]{1,8}".prop_filter("distinct from fixture capability", |c| {
            c != CHAT_READ
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        // =====================================================================
        // NOT_FOUND
        // =====================================================================

        #[test]
        fn prop_unregistered_operation_is_not_found(
            domain in "[a-zA-Z]{1,10}",
            method in "[a-zA-Z]{1,10}",
        ) {
            let name = format!("{}:{}", domain, method);
            prop_assume!(!["chat:exportHistory", "chat:fail", "chat:echo"].contains(&name.as_str()));

            let spy = Spy::new();
            let registry = spy_registry(RegistryConfig::development(), &spy);
            let auth = AuthContext::development();
            let env = block_on(registry.invoke(&name, json!({}), Some(&auth)));

            prop_assert_eq!(env.error_code(), Some(ErrorCode::NotFound));
            prop_assert_eq!(
                env.error.as_ref().map(|e| e.message.clone()),
                Some(format!("operation not found: {}", name))
            );
            prop_assert_eq!(&env.operation, &name);
            prop_assert_eq!(spy.calls(), 0);
        }

        #[test]
        fn prop_arbitrary_strings_never_panic(name in ".{0,40}") {
            let spy = Spy::new();
            let registry = spy_registry(RegistryConfig::default(), &spy);
            let env = block_on(registry.invoke(&name, Value::Null, None));
            assert_exclusive(&env);
        }

        // =====================================================================
        // UNAUTHORIZED
        // =====================================================================

        #[test]
        fn prop_missing_capability_never_reaches_plan(
            granted in proptest::collection::vec(capability(), 0..5),
        ) {
            let spy = Spy::new();
            let registry = spy_registry(RegistryConfig::default(), &spy);
            let auth = AuthContext::new("u", "s").with_capabilities(granted);

            let env = block_on(registry.invoke("chat:exportHistory", json!({}), Some(&auth)));

            prop_assert_eq!(env.error_code(), Some(ErrorCode::Unauthorized));
            prop_assert_eq!(spy.calls(), 0);
        }

        #[test]
        fn prop_anonymous_caller_rejected_for_capability(allow_anonymous in any::<bool>()) {
            let spy = Spy::new();
            let config = RegistryConfig {
                allow_anonymous,
                ..RegistryConfig::default()
            };
            let registry = spy_registry(config, &spy);

            let env = block_on(registry.invoke("chat:exportHistory", json!({}), None));

            prop_assert_eq!(env.error_code(), Some(ErrorCode::Unauthorized));
            prop_assert_eq!(spy.calls(), 0);
        }

        #[test]
        fn prop_wildcard_grants_any_capability(required in capability()) {
            let plan = Arc::new(
                PlanTable::new("task").raw_method("run", |_| async { Ok(json!(true)) }),
            );
            let registry = OperationRegistry::new(RegistryConfig::default());
            registry
                .register(OperationRecord::new("task", "run", plan).with_capability(required))
                .unwrap();
            let auth = AuthContext::new("admin", "s").with_capability(WILDCARD_CAPABILITY);

            let env = block_on(registry.invoke("task:run", Value::Null, Some(&auth)));
            prop_assert!(env.success);
        }

        // =====================================================================
        // ENVELOPE SHAPE
        // =====================================================================

        #[test]
        fn prop_envelope_is_exclusive(outcome in prop::result::maybe_ok(any::<i64>(), "[a-z ]{1,20}")) {
            let plan = Arc::new(PlanTable::new("task").raw_method("run", move |_| {
                let outcome = outcome.clone();
                async move {
                    outcome
                        .map(|n| json!(n))
                        .map_err(|msg| PlanError::Failed(anyhow::anyhow!(msg)))
                }
            }));
            let registry = OperationRegistry::new(RegistryConfig::development());
            registry
                .register(OperationRecord::new("task", "run", plan))
                .unwrap();
            let auth = AuthContext::development();

            let env = block_on(registry.invoke("task:run", json!({}), Some(&auth)));

            assert_exclusive(&env);
            prop_assert!(env.timing.is_some());
            if let Some(error) = &env.error {
                prop_assert_eq!(error.code, ErrorCode::ExecutionError);
            }
        }
    }
}
