/// Test driver synthesis
use crate::judge::report::{FIELD_SEPARATOR, RECORD_SEPARATOR};
use crate::utils::py_literal::string_literal;

/// Global the driver leaves its machine-readable report in
pub const REPORT_GLOBAL: &str = "_pybox_report";

/// Python source that imports `module`, runs every attribute starting with
/// `prefix` in `dir()` order, prints the transcript, and stores the report in
/// `report_global`.
///
/// `AssertionError` is reported as FAILED, any other `Exception` as ERROR.
pub fn render_driver(module: &str, prefix: &str, report_global: &str) -> String {
    let rs = string_literal(&RECORD_SEPARATOR.to_string());
    let fs = string_literal(&FIELD_SEPARATOR.to_string());

    format!(
        r#"_pybox_module = __import__({module})
_pybox_records = []
_pybox_passed = 0
_pybox_total = 0


def _pybox_clean(value):
    return str(value).replace({rs}, ' ').replace({fs}, ' ')


def _pybox_record(name, kind, message):
    _pybox_records.append({fs}.join([name, kind, _pybox_clean(message)]))


for _pybox_name in dir(_pybox_module):
    if not _pybox_name.startswith({prefix}):
        continue
    _pybox_total += 1
    try:
        getattr(_pybox_module, _pybox_name)()
    except AssertionError as _pybox_exc:
        print('✗ ' + _pybox_name + ': FAILED - ' + str(_pybox_exc))
        _pybox_record(_pybox_name, 'failed', _pybox_exc)
    except Exception as _pybox_exc:
        print('✗ ' + _pybox_name + ': ERROR - ' + str(_pybox_exc))
        _pybox_record(_pybox_name, 'errored', _pybox_exc)
    else:
        _pybox_passed += 1
        print('✓ ' + _pybox_name + ': PASSED')
        _pybox_record(_pybox_name, 'passed', 'OK')

print('\n' + str(_pybox_passed) + '/' + str(_pybox_total) + ' tests passed')
{report_global} = {rs}.join(_pybox_records)
"#,
        module = string_literal(module),
        prefix = string_literal(prefix),
        rs = rs,
        fs = fs,
        report_global = report_global,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_names_module_prefix_and_report() {
        let source = render_driver("__mission_tests__", "test_", REPORT_GLOBAL);
        assert!(source.starts_with("_pybox_module = __import__('__mission_tests__')"));
        assert!(source.contains("startswith('test_')"));
        assert!(source.contains("_pybox_report = '\\x1e'.join(_pybox_records)"));
    }

    #[test]
    fn test_driver_distinguishes_assertions_from_errors() {
        let source = render_driver("m", "check_", "out");
        let assertion = source.find("except AssertionError").unwrap();
        let other = source.find("except Exception").unwrap();
        assert!(assertion < other);
        assert!(source.contains("': FAILED - '"));
        assert!(source.contains("': ERROR - '"));
        assert!(source.contains("' tests passed'"));
    }

    #[test]
    fn test_driver_escapes_hostile_names() {
        let source = render_driver("x'); import os; ('", "test_", "out");
        assert!(source.contains(r"__import__('x\'); import os; (\'')"));
    }
}
