use std::sync::{Arc, Mutex};

use dispatch::{Dispatch, HookKind, HookOptions, Verdict};
use proptest::prelude::*;
use registry::{OpcodeMap, Platform, ProtocolRegistry};

const PROTOCOL: u32 = 1;

fn dispatch() -> Dispatch {
    tracing_subscriber::fmt().with_test_writer().try_init().ok();
    let mut registry = ProtocolRegistry::new(Platform::Pc);
    registry.insert_map(PROTOCOL, OpcodeMap::new().with("S_TEST", 10));
    Dispatch::new(Arc::new(registry), PROTOCOL).unwrap()
}

proptest! {
    #[test]
    fn execution_follows_order_then_registration(
        hooks in prop::collection::vec((-3i32..3, any::<bool>()), 1..24),
    ) {
        let mut dispatch = dispatch();
        let log = Arc::new(Mutex::new(Vec::new()));
        for (index, (order, wildcard)) in hooks.iter().enumerate() {
            let log = Arc::clone(&log);
            let target = if *wildcard { "*" } else { "S_TEST" };
            dispatch
                .hook(
                    None,
                    target,
                    HookKind::raw(move |_, _, _| {
                        log.lock().unwrap().push(index);
                        Ok(Verdict::Pass)
                    }),
                    HookOptions::new().with_order(*order),
                )
                .unwrap();
        }

        dispatch.handle(vec![4, 0, 10, 0], true, false);

        let mut expected: Vec<usize> = (0..hooks.len()).collect();
        expected.sort_by_key(|&index| (hooks[index].0, index));
        prop_assert_eq!(log.lock().unwrap().clone(), expected);
    }

    #[test]
    fn other_opcodes_only_run_wildcards(
        hooks in prop::collection::vec((-3i32..3, any::<bool>()), 1..24),
    ) {
        let mut dispatch = dispatch();
        let log = Arc::new(Mutex::new(Vec::new()));
        for (index, (order, wildcard)) in hooks.iter().enumerate() {
            let log = Arc::clone(&log);
            let target = if *wildcard { "*" } else { "S_TEST" };
            dispatch
                .hook(
                    None,
                    target,
                    HookKind::raw(move |_, _, _| {
                        log.lock().unwrap().push(index);
                        Ok(Verdict::Pass)
                    }),
                    HookOptions::new().with_order(*order),
                )
                .unwrap();
        }

        dispatch.handle(vec![4, 0, 11, 0], true, false);

        let mut expected: Vec<usize> = (0..hooks.len()).filter(|&i| hooks[i].1).collect();
        expected.sort_by_key(|&index| (hooks[index].0, index));
        prop_assert_eq!(log.lock().unwrap().clone(), expected);
    }
}
