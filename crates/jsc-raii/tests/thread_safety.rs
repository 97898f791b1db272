//! Compile-fail tests for thread safety
//!
//! Values, objects and strings never cross threads. Contexts and groups only
//! do with the `thread-safe` feature.

/// ```compile_fail
/// use jsc_raii::ContextGroup;
/// use std::thread;
///
/// let ctx = ContextGroup::new().create_context();
/// let value = ctx.evaluate_script("42", None, "", 1).unwrap();
/// thread::spawn(move || {
///     // This should fail to compile: Value is !Send
///     let _ = value.to_number();
/// });
/// ```
fn _value_not_send() {}

/// ```compile_fail
/// use jsc_raii::JsString;
/// use std::thread;
///
/// let s = JsString::new("hello");
/// thread::spawn(move || {
///     // This should fail to compile: JsString is !Send
///     let _ = s.len();
/// });
/// ```
fn _string_not_send() {}

/// ```compile_fail
/// use jsc_raii::ContextGroup;
/// use std::sync::Arc;
///
/// let ctx = ContextGroup::new().create_context();
/// let obj = Arc::new(ctx.create_object());
/// let obj2 = obj.clone();
/// std::thread::spawn(move || {
///     // This should fail to compile: Object is !Sync
///     let _ = obj2;
/// });
/// ```
fn _object_not_sync() {}

#[cfg(feature = "thread-safe")]
mod shared {
    use jsc_raii::{Context, ContextGroup};
    use std::sync::Arc;
    use std::thread;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_context_types_are_send_sync() {
        assert_send_sync::<Context>();
        assert_send_sync::<ContextGroup>();
    }

    #[test]
    fn test_group_shared_across_threads() {
        let group = Arc::new(ContextGroup::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let group = Arc::clone(&group);
                thread::spawn(move || {
                    let ctx = group.create_context();
                    let script = format!("{} * 10", i);
                    ctx.evaluate_script(&script, None, "", 1)
                        .unwrap()
                        .to_number()
                        .unwrap()
                })
            })
            .collect();

        let mut results: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        results.sort_by(f64::total_cmp);
        assert_eq!(results, vec![0.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_context_clone_moved_to_thread() {
        let ctx = ContextGroup::new().create_context();
        ctx.evaluate_script("var hits = 0;", None, "", 1).unwrap();
        let remote = ctx.clone();
        thread::spawn(move || {
            remote.evaluate_script("hits += 1;", None, "", 1).unwrap();
        })
        .join()
        .unwrap();
        let hits = ctx.evaluate_script("hits", None, "", 1).unwrap();
        assert_eq!(hits.to_number().unwrap(), 1.0);
    }
}
