use phpstack::Trace;
use phpstack_backtrace::NativeStack;

#[inline(never)]
fn innermost_routine() -> Trace {
    NativeStack::DEFAULT
        .capture_trace()
        .expect("native stack should be capturable in tests")
}

#[test]
fn test_captures_calling_function() {
    let trace = innermost_routine();
    let text = trace.to_trace_string();

    assert!(text.contains("innermost_routine()"), "{text}");
    assert!(trace.current_file().ends_with("native_capture.rs"), "{text}");
}

#[test]
fn test_capture_internals_are_hidden() {
    let trace = innermost_routine();
    let text = trace.to_trace_string();

    assert!(!text.contains("capture_current_stack"), "{text}");
    assert!(!text.contains("capture_trace"), "{text}");
    assert!(!text.contains("{{closure}}"), "{text}");
    assert!(!text.contains("call_once"), "{text}");
}

#[test]
fn test_backtrace_records_have_functions() {
    let trace = innermost_routine();
    let records = trace.backtrace(0, Some(1)).expect("skip is valid");

    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].get("function").map(ToString::to_string).as_deref(),
        Some("innermost_routine")
    );
}
